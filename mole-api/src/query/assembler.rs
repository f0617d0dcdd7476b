//! Nesting of composed rows into response shapes.
//!
//! A related entity that was not requested is absent from the JSON; one that
//! was requested but matched nothing is `null`.

use serde::Serialize;
use sqlx::postgres::PgRow;
use sqlx::Row;
use std::collections::HashMap;
use uuid::Uuid;

use super::composer::ListQuery;
use super::listings::{ACCOUNTS, BODY_PARTS, LAST_REPORT, LAST_REQUEST, LESIONS, QUESTIONS};
use crate::models::{decode_joined, Account, BodyPart, Entity, Lesion, Question, Report, ReportAnswer, Request};
use crate::services::storage::{ObjectRef, ObjectStorage, StorageError, PHOTO_URL_TTL};

#[derive(Debug, Clone, Serialize)]
pub struct Page<T> {
    pub data: Vec<T>,
    pub total: i64,
}

/// Read the window count added by [`ListQuery::with_total`]; zero rows means
/// zero total.
pub fn total_count(rows: &[PgRow]) -> Result<i64, sqlx::Error> {
    match rows.first() {
        Some(row) => row.try_get("total_count"),
        None => Ok(0),
    }
}

fn joined<T: Entity>(row: &PgRow, query: &ListQuery, alias: &str) -> Result<Option<Option<T>>, sqlx::Error> {
    if query.is_included(alias) {
        decode_joined::<T>(row, alias).map(Some)
    } else {
        Ok(None)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AnswerView {
    #[serde(flatten)]
    pub answer: ReportAnswer,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub question: Option<Option<Question>>,
}

impl AnswerView {
    pub fn decode(row: &PgRow, query: &ListQuery) -> Result<Self, sqlx::Error> {
        Ok(Self {
            answer: ReportAnswer::decode(row, "")?,
            question: joined(row, query, QUESTIONS)?,
        })
    }

    pub fn without_question(mut self) -> Self {
        self.question = None;
        self
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ReportView {
    #[serde(flatten)]
    pub report: Report,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub lesion: Option<Option<Lesion>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub body_part: Option<Option<BodyPart>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub answers: Option<Vec<AnswerView>>,
}

impl ReportView {
    pub fn new(report: Report) -> Self {
        Self {
            report,
            lesion: None,
            body_part: None,
            answers: None,
        }
    }

    pub fn decode(row: &PgRow, query: &ListQuery) -> Result<Self, sqlx::Error> {
        Ok(Self {
            report: Report::decode(row, "")?,
            lesion: joined(row, query, LESIONS)?,
            body_part: joined(row, query, BODY_PARTS)?,
            answers: None,
        })
    }

    /// Drop joins the caller asked to leave out even though the query
    /// needed them.
    pub fn keep(mut self, lesion: bool, body_part: bool) -> Self {
        if !lesion {
            self.lesion = None;
        }
        if !body_part {
            self.body_part = None;
        }
        self
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LesionView {
    #[serde(flatten)]
    pub lesion: Lesion,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub body_part: Option<Option<BodyPart>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_report: Option<Option<Report>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_request: Option<Option<Request>>,
}

impl LesionView {
    pub fn decode(row: &PgRow, query: &ListQuery) -> Result<Self, sqlx::Error> {
        Ok(Self {
            lesion: Lesion::decode(row, "")?,
            body_part: joined(row, query, BODY_PARTS)?,
            last_report: joined(row, query, LAST_REPORT)?,
            last_request: joined(row, query, LAST_REQUEST)?,
        })
    }

    /// `last_request` needs the report join, and filters may activate any
    /// join; only the relations the caller asked for are returned.
    pub fn keep(mut self, body_part: bool, last_report: bool, last_request: bool) -> Self {
        if !body_part {
            self.body_part = None;
        }
        if !last_report {
            self.last_report = None;
        }
        if !last_request {
            self.last_request = None;
        }
        self
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RequestView {
    #[serde(flatten)]
    pub request: Request,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub account: Option<Option<Account>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reports: Option<Vec<ReportView>>,
}

impl RequestView {
    pub fn new(request: Request) -> Self {
        Self {
            request,
            account: None,
            reports: None,
        }
    }

    pub fn decode(row: &PgRow, query: &ListQuery) -> Result<Self, sqlx::Error> {
        Ok(Self {
            request: Request::decode(row, "")?,
            account: joined(row, query, ACCOUNTS)?,
            reports: None,
        })
    }

    pub fn keep_account(mut self, keep: bool) -> Self {
        if !keep {
            self.account = None;
        }
        self
    }

    /// `skip_answer`: withhold the doctor's answer text.
    pub fn skip_answer(mut self, skip: bool) -> Self {
        if skip {
            self.request.answer_text = None;
        }
        self
    }
}

/// Distribute batch-loaded answers to their reports. Every report gets a
/// list, empty when it has no answers.
pub fn attach_answers(reports: &mut [ReportView], answers: Vec<AnswerView>, include_questions: bool) {
    let mut by_report: HashMap<Uuid, Vec<AnswerView>> = HashMap::new();
    for answer in answers {
        let answer = if include_questions {
            answer
        } else {
            answer.without_question()
        };
        by_report
            .entry(answer.answer.report_id)
            .or_default()
            .push(answer);
    }

    for report in reports.iter_mut() {
        report.answers = Some(by_report.remove(&report.report.id).unwrap_or_default());
    }
}

/// Replace every photo reference with a presigned URL. The first failure
/// aborts the whole response.
pub async fn sign_photos(storage: &dyn ObjectStorage, report: &mut Report) -> Result<(), StorageError> {
    let mut signed = Vec::with_capacity(report.photos.len());
    for photo in &report.photos {
        let object = ObjectRef::parse(photo)?;
        signed.push(storage.presign_get(&object, PHOTO_URL_TTL).await?);
    }
    report.photos = signed;
    Ok(())
}

pub async fn sign_report_photos(
    storage: &dyn ObjectStorage,
    reports: &mut [ReportView],
) -> Result<(), StorageError> {
    for view in reports.iter_mut() {
        sign_photos(storage, &mut view.report).await?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::RequestStatus;
    use crate::services::storage::MockObjectStorage;
    use chrono::{TimeZone, Utc};
    use serde_json::json;

    fn at() -> chrono::DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 3, 1, 12, 0, 0).unwrap()
    }

    fn report(photos: &[&str]) -> Report {
        Report {
            id: Uuid::new_v4(),
            request_id: None,
            lesion_id: Uuid::new_v4(),
            photos: photos.iter().map(|p| p.to_string()).collect(),
            status: None,
            consultation_result: None,
            created_at: at(),
            updated_at: at(),
        }
    }

    fn answer(report_id: Uuid) -> AnswerView {
        AnswerView {
            answer: ReportAnswer {
                id: Uuid::new_v4(),
                report_id,
                question_id: Uuid::new_v4(),
                answer: json!("yes"),
            },
            question: Some(None),
        }
    }

    #[test]
    fn unrequested_relations_are_omitted_and_empty_ones_are_null() {
        let mut view = ReportView::new(report(&[]));
        let json = serde_json::to_value(&view).unwrap();
        assert!(json.get("lesion").is_none());
        assert!(json.get("answers").is_none());
        assert_eq!(json["created_at"], at().timestamp());

        view.lesion = Some(None);
        let json = serde_json::to_value(&view).unwrap();
        assert_eq!(json["lesion"], serde_json::Value::Null);
    }

    #[test]
    fn answers_are_grouped_per_report() {
        let mut reports = vec![ReportView::new(report(&[])), ReportView::new(report(&[]))];
        let first = reports[0].report.id;
        let answers = vec![answer(first), answer(first)];

        attach_answers(&mut reports, answers, false);

        let grouped = reports[0].answers.as_ref().unwrap();
        assert_eq!(grouped.len(), 2);
        assert!(grouped.iter().all(|a| a.question.is_none()));
        assert_eq!(reports[1].answers, Some(Vec::new()));

        let json = serde_json::to_value(&reports[1]).unwrap();
        assert_eq!(json["answers"], json!([]));
    }

    #[test]
    fn skip_answer_nulls_answer_text() {
        let request = Request {
            id: Uuid::new_v4(),
            account_id: Uuid::new_v4(),
            status: RequestStatus::Answered,
            answer_text: Some("Benign".to_string()),
            answered_by: Some("Dr. Who".to_string()),
            answered_at: Some(at()),
            created_at: at(),
            updated_at: at(),
        };

        let view = RequestView::new(request.clone()).skip_answer(true);
        let json = serde_json::to_value(&view).unwrap();
        assert_eq!(json["answer_text"], serde_json::Value::Null);
        assert_eq!(json["answered_by"], "Dr. Who");

        let view = RequestView::new(request).skip_answer(false);
        assert_eq!(view.request.answer_text.as_deref(), Some("Benign"));
    }

    #[tokio::test]
    async fn photos_are_exchanged_for_signed_urls() {
        let storage = MockObjectStorage::new();
        let mut report = report(&["molepatrol-photos/private/a.jpg", "molepatrol-photos/private/b.jpg"]);

        sign_photos(&storage, &mut report).await.unwrap();

        assert_eq!(
            report.photos[0],
            "https://storage.test/molepatrol-photos/private/a.jpg?expires=3600"
        );
        assert_eq!(storage.presign_count(), 2);
    }

    #[tokio::test]
    async fn signing_failure_aborts() {
        let storage = MockObjectStorage::new();
        storage.set_failing(true);
        let mut reports = vec![ReportView::new(report(&["bucket/key.jpg"]))];

        assert!(sign_report_photos(&storage, &mut reports).await.is_err());
        assert_eq!(reports[0].report.photos, vec!["bucket/key.jpg".to_string()]);

        let storage = MockObjectStorage::new();
        let mut broken = report(&["no-key"]);
        assert!(matches!(
            sign_photos(&storage, &mut broken).await,
            Err(StorageError::InvalidReference(_))
        ));
    }
}
