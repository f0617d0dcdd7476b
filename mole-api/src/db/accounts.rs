use async_trait::async_trait;
use service_core::error::AppError;
use tracing::instrument;
use uuid::Uuid;

use super::{db_error, Database};
use crate::models::{Account, AccountProfile};
use crate::services::{AccountStore, ProfileError};

impl Database {
    #[instrument(skip(self))]
    pub async fn find_account(&self, id: Uuid) -> Result<Option<Account>, AppError> {
        sqlx::query_as::<_, Account>(
            r#"
            SELECT id, name, email, phone, gender, birth_date, created_at, updated_at
            FROM accounts
            WHERE id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(db_error("Unable to fetch the account"))
    }

    /// Insert or refresh the cached profile, stamping `updated_at`.
    #[instrument(skip(self, profile), fields(account_id = %profile.id))]
    pub async fn upsert_account(&self, profile: &AccountProfile) -> Result<(), AppError> {
        sqlx::query(
            r#"
            INSERT INTO accounts (id, name, email, phone, gender, birth_date, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, NOW(), NOW())
            ON CONFLICT (id) DO UPDATE SET
                name = EXCLUDED.name,
                email = EXCLUDED.email,
                phone = EXCLUDED.phone,
                gender = EXCLUDED.gender,
                birth_date = EXCLUDED.birth_date,
                updated_at = NOW()
            "#,
        )
        .bind(profile.id)
        .bind(&profile.name)
        .bind(&profile.email)
        .bind(&profile.phone)
        .bind(&profile.gender)
        .bind(&profile.birth_date)
        .execute(&self.pool)
        .await
        .map_err(db_error("Unable to save the account"))?;
        Ok(())
    }
}

#[async_trait]
impl AccountStore for Database {
    async fn find_account(&self, id: Uuid) -> Result<Option<Account>, ProfileError> {
        Database::find_account(self, id)
            .await
            .map_err(|e| ProfileError::Store(anyhow::Error::new(e)))
    }

    async fn upsert_account(&self, profile: &AccountProfile) -> Result<(), ProfileError> {
        Database::upsert_account(self, profile)
            .await
            .map_err(|e| ProfileError::Store(anyhow::Error::new(e)))
    }
}
