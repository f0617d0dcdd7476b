//! Bearer-token access control.
//!
//! A guarded request moves through header extraction, token validation,
//! the permission check and the profile refresh. The first failing step
//! ends the request; on success the verified claims and the local account
//! are placed in the request extensions for [`AuthUser`].

use axum::{
    async_trait,
    extract::{FromRequestParts, Request, State},
    http::{header, request::Parts, Method},
    middleware::Next,
    response::Response,
};
use service_core::error::{AppError, CODE_MISSING_HEADER};
use uuid::Uuid;

use crate::models::Account;
use crate::services::VerifiedClaims;
use crate::AppState;

const MISSING_HEADER: &str = "The Authorization header is missing.";
const MALFORMED_HEADER: &str = "The Authorization header is malformed.";

/// State of one guarded route: the shared app state plus the permissions
/// the route demands. An empty set only requires a valid token.
#[derive(Clone)]
pub struct AccessGuard {
    state: AppState,
    required: &'static [&'static str],
}

impl AccessGuard {
    pub fn new(state: AppState, required: &'static [&'static str]) -> Self {
        Self { state, required }
    }
}

/// Pull the bearer token from `Authorization`, falling back to `?token=`
/// on GET requests without the header.
pub fn bearer_token(method: &Method, parts_header: Option<&str>, query: Option<&str>) -> Result<String, AppError> {
    let header_value = match parts_header.filter(|h| !h.is_empty()) {
        Some(value) => value.to_string(),
        None => {
            let fallback = (*method == Method::GET)
                .then(|| query_token(query))
                .flatten();
            match fallback {
                Some(token) => format!("Bearer {}", token),
                None => return Err(AppError::unauthenticated(CODE_MISSING_HEADER, MISSING_HEADER)),
            }
        }
    };

    match header_value.split_once(' ') {
        Some(("Bearer", token)) => Ok(token.to_string()),
        _ => Err(AppError::unauthenticated(CODE_MISSING_HEADER, MALFORMED_HEADER)),
    }
}

fn query_token(query: Option<&str>) -> Option<String> {
    let pairs: Vec<(String, String)> = serde_urlencoded::from_str(query?).ok()?;
    pairs
        .into_iter()
        .find(|(key, value)| key == "token" && !value.is_empty())
        .map(|(_, value)| value)
}

pub async fn access_middleware(
    State(guard): State<AccessGuard>,
    mut req: Request,
    next: Next,
) -> Result<Response, AppError> {
    let state = &guard.state;

    let authorization = match req.headers().get(header::AUTHORIZATION) {
        Some(value) => Some(value.to_str().map_err(|_| {
            AppError::unauthenticated(CODE_MISSING_HEADER, MALFORMED_HEADER)
        })?),
        None => None,
    };
    let token = bearer_token(req.method(), authorization, req.uri().query())?;

    let claims = state.validator.validate(&token).map_err(|e| {
        tracing::debug!(error = %e, "Rejected bearer token");
        AppError::from(e)
    })?;

    if !guard.required.is_empty() && !state.permissions.lookup(&claims.groups, guard.required) {
        tracing::warn!(
            subject = %claims.subject,
            groups = ?claims.groups,
            required = ?guard.required,
            "Insufficient permissions"
        );
        return Err(AppError::InsufficientPermissions);
    }

    let account_id = Uuid::parse_str(&claims.subject).map_err(|e| {
        AppError::InternalError(anyhow::anyhow!(
            "Token subject '{}' is not a UUID: {}",
            claims.subject,
            e
        ))
    })?;

    let account = state
        .profiles
        .ensure_fresh(&claims.subject, account_id)
        .await?;

    req.extensions_mut().insert(claims);
    req.extensions_mut().insert(account);

    Ok(next.run(req).await)
}

/// The authenticated caller of a guarded route.
#[derive(Debug, Clone)]
pub struct AuthUser {
    pub claims: VerifiedClaims,
    pub account: Account,
}

impl AuthUser {
    pub fn id(&self) -> Uuid {
        self.account.id
    }
}

#[async_trait]
impl<S> FromRequestParts<S> for AuthUser
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let claims = parts.extensions.get::<VerifiedClaims>().cloned();
        let account = parts.extensions.get::<Account>().cloned();
        match (claims, account) {
            (Some(claims), Some(account)) => Ok(AuthUser { claims, account }),
            _ => Err(AppError::InternalError(anyhow::anyhow!(
                "Auth context missing from request extensions"
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn code_and_message(err: AppError) -> (u16, String) {
        match err {
            AppError::Unauthenticated { code, message } => (code, message),
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn header_must_be_bearer() {
        assert_eq!(
            bearer_token(&Method::POST, Some("Bearer abc.def.ghi"), None).unwrap(),
            "abc.def.ghi"
        );

        let (code, message) =
            code_and_message(bearer_token(&Method::GET, Some("Basic abc"), None).unwrap_err());
        assert_eq!(code, 100);
        assert_eq!(message, MALFORMED_HEADER);

        let (_, message) =
            code_and_message(bearer_token(&Method::GET, Some("Bearer"), None).unwrap_err());
        assert_eq!(message, MALFORMED_HEADER);
    }

    #[test]
    fn missing_header_is_reported() {
        let (code, message) =
            code_and_message(bearer_token(&Method::GET, None, None).unwrap_err());
        assert_eq!(code, 100);
        assert_eq!(message, MISSING_HEADER);
    }

    #[test]
    fn query_token_only_for_get() {
        assert_eq!(
            bearer_token(&Method::GET, None, Some("offset=1&token=abc")).unwrap(),
            "abc"
        );
        assert!(bearer_token(&Method::POST, None, Some("token=abc")).is_err());
        assert!(bearer_token(&Method::GET, None, Some("token=")).is_err());
    }

    #[test]
    fn header_wins_over_query_token() {
        assert_eq!(
            bearer_token(&Method::GET, Some("Bearer from-header"), Some("token=from-query")).unwrap(),
            "from-header"
        );
    }
}
