use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::postgres::PgRow;
use sqlx::{FromRow, Row};
use uuid::Uuid;

use super::{column, field, Column, ColumnType, Entity};

/// Status a report takes once it is linked to a request.
pub const STATUS_SUBMITTED: &str = "Submitted";

/// A dated set of photos (object references `"<bucket>/<key>"`) about a lesion.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
pub struct Report {
    pub id: Uuid,
    pub request_id: Option<Uuid>,
    pub lesion_id: Uuid,
    pub photos: Vec<String>,
    pub status: Option<String>,
    pub consultation_result: Option<String>,
    #[serde(with = "chrono::serde::ts_seconds")]
    pub created_at: DateTime<Utc>,
    #[serde(with = "chrono::serde::ts_seconds")]
    pub updated_at: DateTime<Utc>,
}

impl Entity for Report {
    const TABLE: &'static str = "reports";
    const COLUMNS: &'static [Column] = &[
        column("id", ColumnType::Uuid),
        column("request_id", ColumnType::Uuid),
        column("lesion_id", ColumnType::Uuid),
        column("photos", ColumnType::TextArray),
        column("status", ColumnType::Text),
        column("consultation_result", ColumnType::Text),
        column("created_at", ColumnType::Timestamp),
        column("updated_at", ColumnType::Timestamp),
    ];

    fn decode(row: &PgRow, prefix: &str) -> Result<Self, sqlx::Error> {
        let f = |name| field(prefix, name);
        Ok(Self {
            id: row.try_get(f("id").as_str())?,
            request_id: row.try_get(f("request_id").as_str())?,
            lesion_id: row.try_get(f("lesion_id").as_str())?,
            photos: row.try_get(f("photos").as_str())?,
            status: row.try_get(f("status").as_str())?,
            consultation_result: row.try_get(f("consultation_result").as_str())?,
            created_at: row.try_get(f("created_at").as_str())?,
            updated_at: row.try_get(f("updated_at").as_str())?,
        })
    }
}
