//! Public signing keys, indexed by key id.
//!
//! The set is resolved once at startup from a JWK Set document and shared
//! read-only afterwards. Rotating keys means restarting the process.

use jsonwebtoken::jwk::{AlgorithmParameters, Jwk, JwkSet};
use jsonwebtoken::{Algorithm, DecodingKey};
use serde::Deserialize;
use serde_json::Value;
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum KeySetError {
    #[error("Unable to read the JWK set from {path}: {source}")]
    Read {
        path: String,
        source: std::io::Error,
    },

    #[error("Unable to decode the JWK set: {0}")]
    Decode(#[from] serde_json::Error),

    #[error("Unable to fetch the JWK set: {0}")]
    Fetch(#[from] reqwest::Error),

    #[error("Invalid key material for '{kid}': {source}")]
    Key {
        kid: String,
        source: jsonwebtoken::errors::Error,
    },

    #[error("The JWK set contains no usable keys")]
    Empty,
}

#[derive(Clone)]
pub struct SigningKey {
    pub key_id: String,
    pub algorithm: Algorithm,
    pub decoding_key: DecodingKey,
}

impl std::fmt::Debug for SigningKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SigningKey")
            .field("key_id", &self.key_id)
            .field("algorithm", &self.algorithm)
            .finish()
    }
}

#[derive(Debug, Clone, Default)]
pub struct KeySet {
    keys: Arc<HashMap<String, SigningKey>>,
}

impl KeySet {
    /// Build from a decoded JWK set. Keys without a `kid` and non-RSA keys
    /// are skipped.
    pub fn from_jwks(set: &JwkSet) -> Result<Self, KeySetError> {
        let mut keys = HashMap::new();
        for jwk in &set.keys {
            if let Some(key) = signing_key(jwk)? {
                keys.insert(key.key_id.clone(), key);
            }
        }
        if keys.is_empty() {
            return Err(KeySetError::Empty);
        }
        Ok(Self {
            keys: Arc::new(keys),
        })
    }

    /// Parse a JWK set document, appending `extra` (a single JWK) when given.
    /// Set entries that do not decode as a JWK are skipped; a malformed
    /// `extra` is an error.
    pub fn from_json(document: &str, extra: Option<&str>) -> Result<Self, KeySetError> {
        let raw: RawJwkSet = serde_json::from_str(document)?;
        let mut set = JwkSet {
            keys: raw.keys.into_iter().filter_map(decode_entry).collect(),
        };
        if let Some(extra) = extra {
            let injected: Jwk = serde_json::from_str(extra)?;
            set.keys.push(injected);
        }
        Self::from_jwks(&set)
    }

    pub fn lookup(&self, key_id: &str) -> Option<&SigningKey> {
        self.keys.get(key_id)
    }

    pub fn len(&self) -> usize {
        self.keys.len()
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }
}

#[derive(Deserialize)]
struct RawJwkSet {
    keys: Vec<Value>,
}

fn decode_entry(entry: Value) -> Option<Jwk> {
    let kid = entry
        .get("kid")
        .and_then(Value::as_str)
        .unwrap_or_default()
        .to_string();
    match serde_json::from_value(entry) {
        Ok(jwk) => Some(jwk),
        Err(e) => {
            tracing::warn!(kid = %kid, error = %e, "Skipping undecodable JWK");
            None
        }
    }
}

fn signing_key(jwk: &Jwk) -> Result<Option<SigningKey>, KeySetError> {
    let Some(kid) = jwk.common.key_id.clone() else {
        tracing::warn!("Skipping JWK without a key id");
        return Ok(None);
    };

    match &jwk.algorithm {
        AlgorithmParameters::RSA(rsa) => {
            let decoding_key = DecodingKey::from_rsa_components(&rsa.n, &rsa.e)
                .map_err(|source| KeySetError::Key {
                    kid: kid.clone(),
                    source,
                })?;
            Ok(Some(SigningKey {
                key_id: kid,
                algorithm: Algorithm::RS256,
                decoding_key,
            }))
        }
        _ => {
            tracing::warn!(kid = %kid, "Skipping non-RSA JWK");
            Ok(None)
        }
    }
}

/// Where the JWK set document comes from.
#[derive(Debug, Clone)]
pub enum KeySource {
    File(PathBuf),
    Inline(String),
    Url(String),
}

impl KeySource {
    pub async fn load(&self, extra: Option<&str>) -> Result<KeySet, KeySetError> {
        let document = match self {
            KeySource::File(path) => {
                tokio::fs::read_to_string(path)
                    .await
                    .map_err(|source| KeySetError::Read {
                        path: path.display().to_string(),
                        source,
                    })?
            }
            KeySource::Inline(json) => json.clone(),
            KeySource::Url(url) => {
                reqwest::get(url)
                    .await?
                    .error_for_status()?
                    .text()
                    .await?
            }
        };

        let set = KeySet::from_json(&document, extra)?;
        tracing::info!(keys = set.len(), "Signing keys loaded");
        Ok(set)
    }
}
