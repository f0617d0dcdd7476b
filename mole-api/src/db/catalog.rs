//! Body parts and questions: administrator-managed reference data.

use service_core::error::AppError;
use tracing::instrument;
use uuid::Uuid;

use super::{db_error, write_error, Database};
use crate::dtos::{BodyPartInput, QuestionInput};
use crate::models::{BodyPart, Question};

impl Database {
    // -------------------------------------------------------------------------
    // Body parts
    // -------------------------------------------------------------------------

    #[instrument(skip(self, input))]
    pub async fn create_body_part(&self, input: &BodyPartInput) -> Result<BodyPart, AppError> {
        sqlx::query_as::<_, BodyPart>(
            r#"
            INSERT INTO body_parts (name, displayed, image, "order", parent)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING id, name, displayed, image, "order", parent
            "#,
        )
        .bind(&input.name)
        .bind(input.displayed)
        .bind(&input.image)
        .bind(input.order)
        .bind(input.parent)
        .fetch_one(&self.pool)
        .await
        .map_err(write_error("Unable to insert the body part"))
    }

    #[instrument(skip(self, input))]
    pub async fn update_body_part(
        &self,
        id: Uuid,
        input: &BodyPartInput,
    ) -> Result<Option<BodyPart>, AppError> {
        sqlx::query_as::<_, BodyPart>(
            r#"
            UPDATE body_parts
            SET name = $2, displayed = $3, image = $4, "order" = $5, parent = $6
            WHERE id = $1
            RETURNING id, name, displayed, image, "order", parent
            "#,
        )
        .bind(id)
        .bind(&input.name)
        .bind(input.displayed)
        .bind(&input.image)
        .bind(input.order)
        .bind(input.parent)
        .fetch_optional(&self.pool)
        .await
        .map_err(write_error("Unable to update the body part"))
    }

    #[instrument(skip(self))]
    pub async fn delete_body_part(&self, id: Uuid) -> Result<Option<BodyPart>, AppError> {
        sqlx::query_as::<_, BodyPart>(
            r#"
            DELETE FROM body_parts
            WHERE id = $1
            RETURNING id, name, displayed, image, "order", parent
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(write_error("Unable to delete the body part"))
    }

    // -------------------------------------------------------------------------
    // Questions
    // -------------------------------------------------------------------------

    #[instrument(skip(self, input))]
    pub async fn create_question(&self, input: &QuestionInput) -> Result<Question, AppError> {
        sqlx::query_as::<_, Question>(
            r#"
            INSERT INTO questions (name, type, answers, displayed, "order")
            VALUES ($1, $2, $3, $4, $5)
            RETURNING id, name, type, answers, displayed, "order", created_at, updated_at
            "#,
        )
        .bind(&input.name)
        .bind(&input.kind)
        .bind(&input.answers)
        .bind(input.displayed)
        .bind(input.order)
        .fetch_one(&self.pool)
        .await
        .map_err(db_error("Unable to insert the question"))
    }

    #[instrument(skip(self, input))]
    pub async fn update_question(
        &self,
        id: Uuid,
        input: &QuestionInput,
    ) -> Result<Option<Question>, AppError> {
        sqlx::query_as::<_, Question>(
            r#"
            UPDATE questions
            SET name = $2, type = $3, answers = $4, displayed = $5, "order" = $6, updated_at = NOW()
            WHERE id = $1
            RETURNING id, name, type, answers, displayed, "order", created_at, updated_at
            "#,
        )
        .bind(id)
        .bind(&input.name)
        .bind(&input.kind)
        .bind(&input.answers)
        .bind(input.displayed)
        .bind(input.order)
        .fetch_optional(&self.pool)
        .await
        .map_err(db_error("Unable to update the question"))
    }

    #[instrument(skip(self))]
    pub async fn delete_question(&self, id: Uuid) -> Result<Option<Question>, AppError> {
        sqlx::query_as::<_, Question>(
            r#"
            DELETE FROM questions
            WHERE id = $1
            RETURNING id, name, type, answers, displayed, "order", created_at, updated_at
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(db_error("Unable to delete the question"))
    }
}
