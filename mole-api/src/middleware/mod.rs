pub mod auth;

pub use auth::{access_middleware, bearer_token, AccessGuard, AuthUser};
