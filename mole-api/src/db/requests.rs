use service_core::error::AppError;
use sqlx::{Postgres, Transaction};
use tracing::instrument;
use uuid::Uuid;

use super::{db_error, Database};
use crate::dtos::RespondInput;
use crate::models::{report::STATUS_SUBMITTED, Request, RequestStatus};

const REQUEST_COLUMNS: &str =
    "id, account_id, status, answer_text, answered_by, answered_at, created_at, updated_at";

/// Attach each report to the request and mark it submitted. Every report
/// must sit under a lesion owned by `owner`.
async fn link_reports(
    tx: &mut Transaction<'_, Postgres>,
    request_id: Uuid,
    owner: Uuid,
    report_ids: &[Uuid],
) -> Result<(), AppError> {
    for report_id in report_ids {
        let report_owner: Option<Uuid> = sqlx::query_scalar(
            r#"
            SELECT lesions.account_id
            FROM reports
            JOIN lesions ON lesions.id = reports.lesion_id
            WHERE reports.id = $1
            "#,
        )
        .bind(report_id)
        .fetch_optional(&mut **tx)
        .await
        .map_err(db_error("Unable to fetch the report"))?;

        if report_owner != Some(owner) {
            return Err(AppError::BadRequest(anyhow::anyhow!(
                "Every report in the update has to belong to the user"
            )));
        }

        sqlx::query(
            "UPDATE reports SET request_id = $2, status = $3, updated_at = NOW() WHERE id = $1",
        )
        .bind(report_id)
        .bind(request_id)
        .bind(STATUS_SUBMITTED)
        .execute(&mut **tx)
        .await
        .map_err(db_error("Unable to save a report"))?;
    }
    Ok(())
}

impl Database {
    #[instrument(skip(self))]
    pub async fn find_request(&self, id: Uuid) -> Result<Option<Request>, AppError> {
        sqlx::query_as::<_, Request>(&format!("SELECT {} FROM requests WHERE id = $1", REQUEST_COLUMNS))
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(db_error("Unable to fetch the request"))
    }

    pub async fn find_owned_request(
        &self,
        id: Uuid,
        account_id: Uuid,
    ) -> Result<Option<Request>, AppError> {
        Ok(self
            .find_request(id)
            .await?
            .filter(|request| request.account_id == account_id))
    }

    /// Open a request for `account_id` and link the listed reports to it.
    #[instrument(skip(self, report_ids), fields(reports = report_ids.len()))]
    pub async fn create_request(
        &self,
        account_id: Uuid,
        report_ids: &[Uuid],
    ) -> Result<Request, AppError> {
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(db_error("Unable to begin the transaction"))?;

        let request = sqlx::query_as::<_, Request>(&format!(
            "INSERT INTO requests (account_id, status) VALUES ($1, $2) RETURNING {}",
            REQUEST_COLUMNS
        ))
        .bind(account_id)
        .bind(RequestStatus::Open)
        .fetch_one(&mut *tx)
        .await
        .map_err(db_error("Unable to save the request"))?;

        link_reports(&mut tx, request.id, account_id, report_ids).await?;

        tx.commit()
            .await
            .map_err(db_error("Unable to complete the transaction"))?;

        tracing::info!(request_id = %request.id, account_id = %account_id, "Request created");
        Ok(request)
    }

    /// Change the status of an owned request and link more reports to it.
    #[instrument(skip(self, request, report_ids), fields(request_id = %request.id))]
    pub async fn update_request(
        &self,
        request: &Request,
        status: RequestStatus,
        report_ids: &[Uuid],
    ) -> Result<Request, AppError> {
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(db_error("Unable to begin the transaction"))?;

        let updated = sqlx::query_as::<_, Request>(&format!(
            "UPDATE requests SET status = $2, updated_at = NOW() WHERE id = $1 RETURNING {}",
            REQUEST_COLUMNS
        ))
        .bind(request.id)
        .bind(status)
        .fetch_one(&mut *tx)
        .await
        .map_err(db_error("Unable to save the request"))?;

        link_reports(&mut tx, request.id, request.account_id, report_ids).await?;

        tx.commit()
            .await
            .map_err(db_error("Unable to complete the transaction"))?;

        Ok(updated)
    }

    #[instrument(skip(self))]
    pub async fn delete_request(&self, id: Uuid) -> Result<(), AppError> {
        sqlx::query("DELETE FROM requests WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(db_error("Unable to delete the request"))?;
        Ok(())
    }

    /// Record a doctor's answer: consultation results on the listed reports,
    /// then the request's status and answer fields. Absent answer fields are
    /// stored as NULL.
    #[instrument(skip(self, input), fields(reports = input.reports.len()))]
    pub async fn respond_to_request(
        &self,
        request_id: Uuid,
        input: &RespondInput,
    ) -> Result<Request, AppError> {
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(db_error("Unable to begin the transaction"))?;

        for report in &input.reports {
            let linked: Option<Option<Uuid>> =
                sqlx::query_scalar("SELECT request_id FROM reports WHERE id = $1")
                    .bind(report.id)
                    .fetch_optional(&mut *tx)
                    .await
                    .map_err(db_error("Unable to fetch the report"))?;

            if linked.flatten() != Some(request_id) {
                return Err(AppError::BadRequest(anyhow::anyhow!(
                    "Every report in the update has to belong to the request"
                )));
            }

            sqlx::query(
                "UPDATE reports SET consultation_result = $2, updated_at = NOW() WHERE id = $1",
            )
            .bind(report.id)
            .bind(&report.consultation_result)
            .execute(&mut *tx)
            .await
            .map_err(db_error("Unable to save a report"))?;
        }

        let request = sqlx::query_as::<_, Request>(&format!(
            "UPDATE requests \
             SET status = $2, answer_text = $3, answered_by = $4, answered_at = $5, updated_at = NOW() \
             WHERE id = $1 RETURNING {}",
            REQUEST_COLUMNS
        ))
        .bind(request_id)
        .bind(input.status)
        .bind(&input.answer_text)
        .bind(&input.answered_by)
        .bind(input.answered_at)
        .fetch_optional(&mut *tx)
        .await
        .map_err(db_error("Unable to save the request"))?
        .ok_or_else(|| AppError::NotFound(anyhow::anyhow!("Request not found")))?;

        tx.commit()
            .await
            .map_err(db_error("Unable to complete the transaction"))?;

        tracing::info!(request_id = %request_id, status = request.status.as_str(), "Request answered");
        Ok(request)
    }
}
