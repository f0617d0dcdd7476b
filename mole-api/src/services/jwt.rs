use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use chrono::{DateTime, TimeZone, Utc};
use jsonwebtoken::errors::ErrorKind;
use jsonwebtoken::{decode, Algorithm, Validation};
use serde::de::IgnoredAny;
use serde::Deserialize;
use serde_json::Value;
use thiserror::Error;

use super::keys::KeySet;

/// Algorithm every accepted token must be signed with.
pub const ACCEPTED_ALGORITHM: &str = "RS256";

/// Token rejection reasons. The message is returned to the caller as-is.
#[derive(Debug, Error, PartialEq)]
pub enum TokenError {
    #[error("The token is malformed")]
    Malformed,

    #[error("Unexpected signing method: {0}")]
    UnsupportedAlgorithm(String),

    #[error("Key ID missing from the JWT token")]
    MissingKeyId,

    #[error("Key ID has an invalid type")]
    InvalidKeyId,

    #[error("Unknown key ID")]
    UnknownKey,

    #[error("The token signature is invalid")]
    InvalidSignature,

    #[error("Token is expired")]
    Expired,

    #[error("The token is not valid")]
    Invalid,
}

/// Claims of a token that passed every check.
#[derive(Debug, Clone, PartialEq)]
pub struct VerifiedClaims {
    pub subject: String,
    pub groups: Vec<String>,
    pub expiry: DateTime<Utc>,
    pub issued_at: Option<DateTime<Utc>>,
    pub key_id: String,
}

/// `cognito:groups` as it appears on the wire. Anything other than an array
/// counts as no groups; non-string entries are skipped.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum GroupsClaim {
    List(Vec<GroupEntry>),
    Other(IgnoredAny),
}

impl Default for GroupsClaim {
    fn default() -> Self {
        GroupsClaim::List(Vec::new())
    }
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum GroupEntry {
    Name(String),
    Other(IgnoredAny),
}

impl GroupsClaim {
    fn into_names(self) -> Vec<String> {
        match self {
            GroupsClaim::List(entries) => entries
                .into_iter()
                .filter_map(|entry| match entry {
                    GroupEntry::Name(name) => Some(name),
                    GroupEntry::Other(_) => None,
                })
                .collect(),
            GroupsClaim::Other(_) => Vec::new(),
        }
    }
}

#[derive(Debug, Deserialize)]
struct TokenClaims {
    sub: String,
    exp: i64,
    #[serde(default)]
    iat: Option<i64>,
    #[serde(rename = "cognito:groups", default)]
    groups: GroupsClaim,
}

#[derive(Clone)]
pub struct TokenValidator {
    keys: KeySet,
    validation: Validation,
}

impl TokenValidator {
    pub fn new(keys: KeySet) -> Self {
        let mut validation = Validation::new(Algorithm::RS256);
        validation.leeway = 0;
        validation.validate_exp = true;
        validation.validate_aud = false;
        validation.set_required_spec_claims(&["exp", "sub"]);

        Self { keys, validation }
    }

    /// Verify structure, algorithm, key id, signature and expiry, in that
    /// order. No I/O.
    pub fn validate(&self, token: &str) -> Result<VerifiedClaims, TokenError> {
        let header = decode_raw_header(token)?;

        let algorithm = header.get("alg").and_then(Value::as_str).unwrap_or("none");
        if algorithm != ACCEPTED_ALGORITHM {
            return Err(TokenError::UnsupportedAlgorithm(algorithm.to_string()));
        }

        let key_id = match header.get("kid") {
            None | Some(Value::Null) => return Err(TokenError::MissingKeyId),
            Some(Value::String(kid)) => kid.as_str(),
            Some(_) => return Err(TokenError::InvalidKeyId),
        };

        let key = self.keys.lookup(key_id).ok_or(TokenError::UnknownKey)?;

        let data = decode::<TokenClaims>(token, &key.decoding_key, &self.validation).map_err(|e| {
            match e.kind() {
                ErrorKind::ExpiredSignature => TokenError::Expired,
                ErrorKind::InvalidSignature => TokenError::InvalidSignature,
                ErrorKind::InvalidToken | ErrorKind::Base64(_) | ErrorKind::Json(_) | ErrorKind::Utf8(_) => {
                    TokenError::Malformed
                }
                _ => TokenError::Invalid,
            }
        })?;

        let claims = data.claims;
        let expiry = Utc
            .timestamp_opt(claims.exp, 0)
            .single()
            .ok_or(TokenError::Invalid)?;
        let issued_at = claims.iat.and_then(|iat| Utc.timestamp_opt(iat, 0).single());

        Ok(VerifiedClaims {
            subject: claims.sub,
            groups: claims.groups.into_names(),
            expiry,
            issued_at,
            key_id: key.key_id.clone(),
        })
    }
}

/// Parse the JOSE header without interpreting it, so a non-string `kid` can
/// be told apart from a missing one.
fn decode_raw_header(token: &str) -> Result<serde_json::Map<String, Value>, TokenError> {
    let mut segments = token.split('.');
    let (Some(header), Some(_), Some(_), None) =
        (segments.next(), segments.next(), segments.next(), segments.next())
    else {
        return Err(TokenError::Malformed);
    };

    let bytes = URL_SAFE_NO_PAD
        .decode(header)
        .map_err(|_| TokenError::Malformed)?;
    match serde_json::from_slice::<Value>(&bytes) {
        Ok(Value::Object(map)) => Ok(map),
        _ => Err(TokenError::Malformed),
    }
}
