use service_core::error::AppError;
use tracing::instrument;
use uuid::Uuid;

use super::{db_error, write_error, Database};
use crate::models::Lesion;

/// Validated lesion fields.
#[derive(Debug, Clone)]
pub struct LesionFields<'a> {
    pub name: &'a str,
    pub body_part_id: Uuid,
    pub body_part_location: &'a str,
}

impl Database {
    #[instrument(skip(self))]
    pub async fn find_lesion(&self, id: Uuid) -> Result<Option<Lesion>, AppError> {
        sqlx::query_as::<_, Lesion>(
            r#"
            SELECT id, account_id, name, body_part_id, body_part_location, created_at, updated_at
            FROM lesions
            WHERE id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(db_error("Unable to fetch the lesion"))
    }

    /// The lesion when it exists and belongs to `account_id`.
    pub async fn find_owned_lesion(
        &self,
        id: Uuid,
        account_id: Uuid,
    ) -> Result<Option<Lesion>, AppError> {
        Ok(self
            .find_lesion(id)
            .await?
            .filter(|lesion| lesion.account_id == account_id))
    }

    #[instrument(skip(self, fields))]
    pub async fn create_lesion(
        &self,
        account_id: Uuid,
        fields: LesionFields<'_>,
    ) -> Result<Lesion, AppError> {
        sqlx::query_as::<_, Lesion>(
            r#"
            INSERT INTO lesions (account_id, name, body_part_id, body_part_location)
            VALUES ($1, $2, $3, $4)
            RETURNING id, account_id, name, body_part_id, body_part_location, created_at, updated_at
            "#,
        )
        .bind(account_id)
        .bind(fields.name)
        .bind(fields.body_part_id)
        .bind(fields.body_part_location)
        .fetch_one(&self.pool)
        .await
        .map_err(write_error("Unable to save the lesion"))
    }

    #[instrument(skip(self, fields))]
    pub async fn update_lesion(&self, id: Uuid, fields: LesionFields<'_>) -> Result<Lesion, AppError> {
        sqlx::query_as::<_, Lesion>(
            r#"
            UPDATE lesions
            SET name = $2, body_part_id = $3, body_part_location = $4, updated_at = NOW()
            WHERE id = $1
            RETURNING id, account_id, name, body_part_id, body_part_location, created_at, updated_at
            "#,
        )
        .bind(id)
        .bind(fields.name)
        .bind(fields.body_part_id)
        .bind(fields.body_part_location)
        .fetch_one(&self.pool)
        .await
        .map_err(write_error("Unable to update the lesion"))
    }

    #[instrument(skip(self))]
    pub async fn delete_lesion(&self, id: Uuid) -> Result<(), AppError> {
        sqlx::query("DELETE FROM lesions WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(db_error("Unable to delete the lesion"))?;
        Ok(())
    }
}
