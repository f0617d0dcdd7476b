use chrono::{DateTime, TimeZone, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use uuid::Uuid;
use validator::{Validate, ValidationError};

use crate::models::RequestStatus;

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct LesionInput {
    #[serde(default)]
    pub name: String,
    #[validate(required(message = "body_part_id is required"))]
    pub body_part_id: Option<Uuid>,
    #[serde(default)]
    pub body_part_location: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnswerInput {
    pub question_id: Uuid,
    #[serde(default)]
    pub answer: serde_json::Value,
}

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct ReportInput {
    #[serde(default)]
    pub request_id: Option<Uuid>,
    #[serde(default)]
    pub photos: Vec<String>,
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    #[validate(custom(function = "distinct_questions"))]
    pub answers: Vec<AnswerInput>,
}

fn distinct_questions(answers: &[AnswerInput]) -> Result<(), ValidationError> {
    let mut seen = std::collections::HashSet::new();
    if answers.iter().all(|a| seen.insert(a.question_id)) {
        Ok(())
    } else {
        Err(ValidationError::new("duplicate_question"))
    }
}

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct RequestInput {
    #[serde(default)]
    pub reports: Vec<Uuid>,
}

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct RequestUpdateInput {
    #[validate(custom(function = "user_settable_status"))]
    pub status: RequestStatus,
    #[serde(default)]
    pub reports: Vec<Uuid>,
}

/// Patients may only move a request between `Open` and `Submitted`.
fn user_settable_status(status: &RequestStatus) -> Result<(), ValidationError> {
    match status {
        RequestStatus::Open | RequestStatus::Submitted => Ok(()),
        _ => Err(ValidationError::new("status")),
    }
}

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct RespondReportInput {
    pub id: Uuid,
    #[serde(default)]
    pub consultation_result: Option<String>,
}

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct RespondInput {
    pub status: RequestStatus,
    #[serde(default)]
    pub answer_text: Option<String>,
    #[serde(default)]
    pub answered_by: Option<String>,
    #[serde(default, deserialize_with = "flexible_timestamp")]
    pub answered_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub notify_msg: Option<String>,
    #[serde(default)]
    pub reports: Vec<RespondReportInput>,
}

/// Epoch seconds or an RFC 3339 string; `null` stays absent.
fn flexible_timestamp<'de, D>(deserializer: D) -> Result<Option<DateTime<Utc>>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Raw {
        Seconds(i64),
        Text(String),
    }

    match Option::<Raw>::deserialize(deserializer)? {
        None => Ok(None),
        Some(Raw::Seconds(secs)) => Utc
            .timestamp_opt(secs, 0)
            .single()
            .map(Some)
            .ok_or_else(|| serde::de::Error::custom("answered_at is out of range")),
        Some(Raw::Text(text)) => DateTime::parse_from_rfc3339(&text)
            .map(|at| Some(at.with_timezone(&Utc)))
            .map_err(serde::de::Error::custom),
    }
}
