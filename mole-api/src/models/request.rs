use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::postgres::PgRow;
use sqlx::{FromRow, Row};
use uuid::Uuid;

use super::{column, field, Column, ColumnType, Entity};

/// Lifecycle of a review request: Draft/Open, then Submitted by the patient,
/// then Answered by a doctor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "request_status")]
pub enum RequestStatus {
    Draft,
    Open,
    Submitted,
    Answered,
}

impl RequestStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            RequestStatus::Draft => "Draft",
            RequestStatus::Open => "Open",
            RequestStatus::Submitted => "Submitted",
            RequestStatus::Answered => "Answered",
        }
    }
}

impl std::str::FromStr for RequestStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "Draft" => Ok(RequestStatus::Draft),
            "Open" => Ok(RequestStatus::Open),
            "Submitted" => Ok(RequestStatus::Submitted),
            "Answered" => Ok(RequestStatus::Answered),
            _ => Err(format!("Invalid request status: {}", s)),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
pub struct Request {
    pub id: Uuid,
    pub account_id: Uuid,
    pub status: RequestStatus,
    pub answer_text: Option<String>,
    pub answered_by: Option<String>,
    #[serde(with = "chrono::serde::ts_seconds_option")]
    pub answered_at: Option<DateTime<Utc>>,
    #[serde(with = "chrono::serde::ts_seconds")]
    pub created_at: DateTime<Utc>,
    #[serde(with = "chrono::serde::ts_seconds")]
    pub updated_at: DateTime<Utc>,
}

impl Entity for Request {
    const TABLE: &'static str = "requests";
    const COLUMNS: &'static [Column] = &[
        column("id", ColumnType::Uuid),
        column("account_id", ColumnType::Uuid),
        column("status", ColumnType::Enum),
        column("answer_text", ColumnType::Text),
        column("answered_by", ColumnType::Text),
        column("answered_at", ColumnType::Timestamp),
        column("created_at", ColumnType::Timestamp),
        column("updated_at", ColumnType::Timestamp),
    ];

    fn decode(row: &PgRow, prefix: &str) -> Result<Self, sqlx::Error> {
        let f = |name| field(prefix, name);
        Ok(Self {
            id: row.try_get(f("id").as_str())?,
            account_id: row.try_get(f("account_id").as_str())?,
            status: row.try_get(f("status").as_str())?,
            answer_text: row.try_get(f("answer_text").as_str())?,
            answered_by: row.try_get(f("answered_by").as_str())?,
            answered_at: row.try_get(f("answered_at").as_str())?,
            created_at: row.try_get(f("created_at").as_str())?,
            updated_at: row.try_get(f("updated_at").as_str())?,
        })
    }
}
