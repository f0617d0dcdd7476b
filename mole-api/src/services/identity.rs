//! User attribute lookup against the identity provider.

use async_trait::async_trait;
use aws_config::SdkConfig;
use aws_sdk_cognitoidentityprovider::{
    config::Region, error::DisplayErrorContext, types::AttributeType, Client as CognitoClient,
};
use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum IdentityError {
    #[error("Identity provider request failed: {0}")]
    Request(String),

    #[error("Identity provider unavailable")]
    Unavailable,
}

/// Profile attributes of one user.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct UserInfo {
    pub sub: String,
    pub name: String,
    pub email: String,
    pub phone_number: String,
    pub gender: String,
    pub birthdate: String,
}

impl UserInfo {
    /// Attributes are matched by name; unknown ones are ignored.
    pub fn from_attributes(attributes: &[AttributeType]) -> Self {
        let mut info = Self::default();
        for attribute in attributes {
            let value = attribute.value().unwrap_or_default().to_string();
            match attribute.name() {
                "sub" => info.sub = value,
                "name" => info.name = value,
                "email" => info.email = value,
                "phone_number" => info.phone_number = value,
                "gender" => info.gender = value,
                "birthdate" => info.birthdate = value,
                _ => {}
            }
        }
        info
    }
}

#[async_trait]
pub trait IdentityProvider: Send + Sync {
    async fn user_info(&self, subject: &str) -> Result<UserInfo, IdentityError>;
}

/// Cognito user pool lookup through `AdminGetUser`.
pub struct CognitoIdentityProvider {
    client: CognitoClient,
    user_pool_id: String,
}

impl CognitoIdentityProvider {
    pub fn new(client: CognitoClient, user_pool_id: impl Into<String>) -> Self {
        Self {
            client,
            user_pool_id: user_pool_id.into(),
        }
    }

    pub fn from_sdk_config(
        sdk: &SdkConfig,
        region: &str,
        user_pool_id: impl Into<String>,
        endpoint: Option<&str>,
    ) -> Self {
        let mut builder = aws_sdk_cognitoidentityprovider::config::Builder::from(sdk)
            .region(Region::new(region.to_string()));
        if let Some(endpoint) = endpoint {
            builder = builder.endpoint_url(endpoint);
        }
        Self::new(CognitoClient::from_conf(builder.build()), user_pool_id)
    }
}

#[async_trait]
impl IdentityProvider for CognitoIdentityProvider {
    async fn user_info(&self, subject: &str) -> Result<UserInfo, IdentityError> {
        let output = self
            .client
            .admin_get_user()
            .user_pool_id(&self.user_pool_id)
            .username(subject)
            .send()
            .await
            .map_err(|e| IdentityError::Request(DisplayErrorContext(&e).to_string()))?;

        Ok(UserInfo::from_attributes(output.user_attributes()))
    }
}

/// In-process identity provider for tests. Unknown subjects resolve to a
/// profile carrying only the subject.
#[derive(Default)]
pub struct MockIdentityProvider {
    users: DashMap<String, UserInfo>,
    calls: AtomicU64,
    failing: AtomicBool,
}

impl MockIdentityProvider {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_user(self, info: UserInfo) -> Self {
        self.users.insert(info.sub.clone(), info);
        self
    }

    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    pub fn call_count(&self) -> u64 {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl IdentityProvider for MockIdentityProvider {
    async fn user_info(&self, subject: &str) -> Result<UserInfo, IdentityError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.failing.load(Ordering::SeqCst) {
            return Err(IdentityError::Unavailable);
        }

        Ok(self
            .users
            .get(subject)
            .map(|info| info.clone())
            .unwrap_or_else(|| UserInfo {
                sub: subject.to_string(),
                ..UserInfo::default()
            }))
    }
}
