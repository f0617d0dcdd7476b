use serde_json::Value;
use service_core::error::AppError;
use sqlx::{Postgres, Transaction};
use std::collections::{HashMap, HashSet};
use tracing::instrument;
use uuid::Uuid;

use super::{db_error, write_error, Database};
use crate::dtos::{AnswerInput, ReportInput};
use crate::models::{Report, ReportAnswer};

const REPORT_COLUMNS: &str =
    "id, request_id, lesion_id, photos, status, consultation_result, created_at, updated_at";

/// Statements that bring a report's stored answers in line with a submitted set.
#[derive(Debug, Default, PartialEq)]
pub struct AnswerDiff {
    pub insert: Vec<(Uuid, Value)>,
    /// Existing answer id with its replacement value.
    pub update: Vec<(Uuid, Value)>,
    pub delete: Vec<Uuid>,
}

impl AnswerDiff {
    pub fn is_empty(&self) -> bool {
        self.insert.is_empty() && self.update.is_empty() && self.delete.is_empty()
    }
}

/// Answers are keyed by question. A new question is inserted, a changed
/// value is updated and a question missing from `incoming` is deleted.
pub fn diff_answers(existing: &[ReportAnswer], incoming: &[AnswerInput]) -> AnswerDiff {
    let stored: HashMap<Uuid, &ReportAnswer> =
        existing.iter().map(|a| (a.question_id, a)).collect();
    let submitted: HashSet<Uuid> = incoming.iter().map(|a| a.question_id).collect();

    let mut diff = AnswerDiff::default();
    for answer in incoming {
        match stored.get(&answer.question_id) {
            None => diff.insert.push((answer.question_id, answer.answer.clone())),
            Some(old) if old.answer != answer.answer => {
                diff.update.push((old.id, answer.answer.clone()))
            }
            Some(_) => {}
        }
    }
    diff.delete = existing
        .iter()
        .filter(|a| !submitted.contains(&a.question_id))
        .map(|a| a.id)
        .collect();
    diff
}

async fn insert_answer(
    tx: &mut Transaction<'_, Postgres>,
    report_id: Uuid,
    question_id: Uuid,
    answer: &Value,
) -> Result<(), AppError> {
    sqlx::query("INSERT INTO report_answers (report_id, question_id, answer) VALUES ($1, $2, $3)")
        .bind(report_id)
        .bind(question_id)
        .bind(answer)
        .execute(&mut **tx)
        .await
        .map_err(write_error("Unable to save an answer"))?;
    Ok(())
}

impl Database {
    #[instrument(skip(self))]
    pub async fn find_report(&self, id: Uuid) -> Result<Option<Report>, AppError> {
        sqlx::query_as::<_, Report>(&format!("SELECT {} FROM reports WHERE id = $1", REPORT_COLUMNS))
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(db_error("Unable to fetch the report"))
    }

    /// Insert the report and its answers in one transaction.
    #[instrument(skip(self, input), fields(answers = input.answers.len()))]
    pub async fn create_report(&self, lesion_id: Uuid, input: &ReportInput) -> Result<Report, AppError> {
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(db_error("Unable to begin the transaction"))?;

        let report = sqlx::query_as::<_, Report>(&format!(
            "INSERT INTO reports (request_id, lesion_id, photos, status) \
             VALUES ($1, $2, $3, $4) RETURNING {}",
            REPORT_COLUMNS
        ))
        .bind(input.request_id)
        .bind(lesion_id)
        .bind(&input.photos)
        .bind(&input.status)
        .fetch_one(&mut *tx)
        .await
        .map_err(write_error("Unable to create the report"))?;

        for answer in &input.answers {
            insert_answer(&mut tx, report.id, answer.question_id, &answer.answer).await?;
        }

        tx.commit()
            .await
            .map_err(db_error("Unable to save the report"))?;

        tracing::info!(report_id = %report.id, lesion_id = %lesion_id, "Report created");
        Ok(report)
    }

    /// Overwrite the report's fields and diff its answers, atomically.
    #[instrument(skip(self, input), fields(answers = input.answers.len()))]
    pub async fn update_report(&self, report_id: Uuid, input: &ReportInput) -> Result<Report, AppError> {
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(db_error("Unable to begin the transaction"))?;

        let report = sqlx::query_as::<_, Report>(&format!(
            "UPDATE reports SET request_id = $2, photos = $3, status = $4, updated_at = NOW() \
             WHERE id = $1 RETURNING {}",
            REPORT_COLUMNS
        ))
        .bind(report_id)
        .bind(input.request_id)
        .bind(&input.photos)
        .bind(&input.status)
        .fetch_one(&mut *tx)
        .await
        .map_err(write_error("Unable to update the report"))?;

        let existing = sqlx::query_as::<_, ReportAnswer>(
            "SELECT id, report_id, question_id, answer FROM report_answers WHERE report_id = $1",
        )
        .bind(report_id)
        .fetch_all(&mut *tx)
        .await
        .map_err(db_error("Unable to acquire the existing answers"))?;

        let diff = diff_answers(&existing, &input.answers);
        tracing::debug!(
            inserted = diff.insert.len(),
            updated = diff.update.len(),
            deleted = diff.delete.len(),
            "Applying answer diff"
        );

        for (question_id, answer) in &diff.insert {
            insert_answer(&mut tx, report_id, *question_id, answer).await?;
        }
        for (answer_id, answer) in &diff.update {
            sqlx::query("UPDATE report_answers SET answer = $2 WHERE id = $1")
                .bind(answer_id)
                .bind(answer)
                .execute(&mut *tx)
                .await
                .map_err(db_error("Unable to update an answer"))?;
        }
        if !diff.delete.is_empty() {
            sqlx::query("DELETE FROM report_answers WHERE id = ANY($1)")
                .bind(&diff.delete)
                .execute(&mut *tx)
                .await
                .map_err(db_error("Unable to delete a removed answer"))?;
        }

        tx.commit()
            .await
            .map_err(db_error("Unable to save the report"))?;

        Ok(report)
    }

    #[instrument(skip(self))]
    pub async fn delete_report(&self, id: Uuid) -> Result<(), AppError> {
        sqlx::query("DELETE FROM reports WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(db_error("Unable to delete the report"))?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn stored(question_id: Uuid, answer: Value) -> ReportAnswer {
        ReportAnswer {
            id: Uuid::new_v4(),
            report_id: Uuid::nil(),
            question_id,
            answer,
        }
    }

    fn submitted(question_id: Uuid, answer: Value) -> AnswerInput {
        AnswerInput {
            question_id,
            answer,
        }
    }

    #[test]
    fn identical_answers_produce_no_statements() {
        let q = Uuid::new_v4();
        let diff = diff_answers(&[stored(q, json!("yes"))], &[submitted(q, json!("yes"))]);
        assert!(diff.is_empty());
    }

    #[test]
    fn diff_inserts_updates_and_deletes_by_question() {
        let (kept, changed, dropped, added) =
            (Uuid::new_v4(), Uuid::new_v4(), Uuid::new_v4(), Uuid::new_v4());
        let existing = vec![
            stored(kept, json!(1)),
            stored(changed, json!({"size": "small"})),
            stored(dropped, json!(true)),
        ];
        let incoming = vec![
            submitted(kept, json!(1)),
            submitted(changed, json!({"size": "large"})),
            submitted(added, json!("new")),
        ];

        let diff = diff_answers(&existing, &incoming);

        assert_eq!(diff.insert, vec![(added, json!("new"))]);
        assert_eq!(diff.update, vec![(existing[1].id, json!({"size": "large"}))]);
        assert_eq!(diff.delete, vec![existing[2].id]);
    }

    #[test]
    fn empty_submission_deletes_everything() {
        let existing = vec![stored(Uuid::new_v4(), json!(1)), stored(Uuid::new_v4(), json!(2))];
        let diff = diff_answers(&existing, &[]);
        assert_eq!(diff.delete.len(), 2);
        assert!(diff.insert.is_empty());
    }
}
