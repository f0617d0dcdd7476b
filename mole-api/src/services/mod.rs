//! Collaborators behind the HTTP layer: key set, token validation,
//! permissions, profile cache, identity provider, object storage and push.

pub mod error;
pub mod identity;
pub mod jwt;
pub mod keys;
pub mod metrics;
pub mod policy;
pub mod profile;
pub mod push;
pub mod storage;

pub use identity::{CognitoIdentityProvider, IdentityError, IdentityProvider, MockIdentityProvider, UserInfo};
pub use jwt::{TokenError, TokenValidator, VerifiedClaims};
pub use keys::{KeySet, KeySetError, KeySource};
pub use policy::PermissionTable;
pub use profile::{AccountStore, InMemoryAccounts, ProfileError, ProfileSynchronizer, PROFILE_TTL};
pub use push::{send_with_retry, FcmProvider, MockPushProvider, PushError, PushMessage, PushProvider};
pub use storage::{MockObjectStorage, ObjectRef, ObjectStorage, S3Storage, StorageError};
