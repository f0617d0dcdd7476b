//! Read-through cache of identity-provider profiles in the accounts table.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use uuid::Uuid;

use super::identity::{IdentityError, IdentityProvider, UserInfo};
use super::metrics::PROFILE_SYNC_TOTAL;
use crate::models::{Account, AccountProfile};

/// Age after which a cached profile is fetched again.
pub const PROFILE_TTL: Duration = Duration::from_secs(30 * 60);

#[derive(Debug, Error)]
pub enum ProfileError {
    #[error("Account store failure: {0}")]
    Store(anyhow::Error),

    #[error(transparent)]
    Identity(#[from] IdentityError),

    #[error("Identity provider returned subject '{returned}' for '{requested}'")]
    SubjectMismatch { requested: String, returned: String },

    #[error("Account {0} missing after upsert")]
    Vanished(Uuid),
}

#[async_trait]
pub trait AccountStore: Send + Sync {
    async fn find_account(&self, id: Uuid) -> Result<Option<Account>, ProfileError>;

    /// Insert or overwrite the profile attributes, stamping `updated_at`.
    async fn upsert_account(&self, profile: &AccountProfile) -> Result<(), ProfileError>;
}

pub fn is_stale(updated_at: DateTime<Utc>, now: DateTime<Utc>) -> bool {
    updated_at + chrono::Duration::seconds(PROFILE_TTL.as_secs() as i64) < now
}

#[derive(Clone)]
pub struct ProfileSynchronizer {
    accounts: Arc<dyn AccountStore>,
    identity: Arc<dyn IdentityProvider>,
}

impl ProfileSynchronizer {
    pub fn new(accounts: Arc<dyn AccountStore>, identity: Arc<dyn IdentityProvider>) -> Self {
        Self { accounts, identity }
    }

    /// Return the local account for `subject`, refreshing it from the
    /// identity provider when missing or older than [`PROFILE_TTL`].
    pub async fn ensure_fresh(&self, subject: &str, account_id: Uuid) -> Result<Account, ProfileError> {
        if let Some(account) = self.accounts.find_account(account_id).await? {
            if !is_stale(account.updated_at, Utc::now()) {
                return Ok(account);
            }
        }

        let info = match self.identity.user_info(subject).await {
            Ok(info) => info,
            Err(e) => {
                metrics::counter!(PROFILE_SYNC_TOTAL, "outcome" => "failed").increment(1);
                return Err(e.into());
            }
        };

        let profile = to_profile(account_id, info)?;
        self.accounts.upsert_account(&profile).await?;

        metrics::counter!(PROFILE_SYNC_TOTAL, "outcome" => "refreshed").increment(1);
        tracing::info!(account_id = %account_id, "Account profile refreshed");

        self.accounts
            .find_account(account_id)
            .await?
            .ok_or(ProfileError::Vanished(account_id))
    }
}

fn to_profile(account_id: Uuid, info: UserInfo) -> Result<AccountProfile, ProfileError> {
    if !info.sub.is_empty() && Uuid::parse_str(&info.sub).ok() != Some(account_id) {
        return Err(ProfileError::SubjectMismatch {
            requested: account_id.to_string(),
            returned: info.sub,
        });
    }

    Ok(AccountProfile {
        id: account_id,
        name: info.name,
        email: info.email,
        phone: info.phone_number,
        gender: info.gender,
        birth_date: info.birthdate,
    })
}

/// `dashmap`-backed account store for tests.
#[derive(Default)]
pub struct InMemoryAccounts {
    accounts: DashMap<Uuid, Account>,
}

impl InMemoryAccounts {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed an account with a chosen `updated_at`.
    pub fn insert(&self, account: Account) {
        self.accounts.insert(account.id, account);
    }

    pub fn get(&self, id: Uuid) -> Option<Account> {
        self.accounts.get(&id).map(|a| a.clone())
    }
}

#[async_trait]
impl AccountStore for InMemoryAccounts {
    async fn find_account(&self, id: Uuid) -> Result<Option<Account>, ProfileError> {
        Ok(self.get(id))
    }

    async fn upsert_account(&self, profile: &AccountProfile) -> Result<(), ProfileError> {
        let now = Utc::now();
        let created_at = self.get(profile.id).map(|a| a.created_at).unwrap_or(now);
        self.accounts.insert(
            profile.id,
            Account {
                id: profile.id,
                name: profile.name.clone(),
                email: profile.email.clone(),
                phone: profile.phone.clone(),
                gender: profile.gender.clone(),
                birth_date: profile.birth_date.clone(),
                created_at,
                updated_at: now,
            },
        );
        Ok(())
    }
}
