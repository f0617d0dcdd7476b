use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::postgres::PgRow;
use sqlx::{FromRow, Row};
use uuid::Uuid;

use super::{column, field, Column, ColumnType, Entity};

/// A questionnaire entry shown alongside report photos. `answers` holds the
/// selectable options as free-form JSON.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
pub struct Question {
    pub id: Uuid,
    pub name: String,
    #[serde(rename = "type")]
    #[sqlx(rename = "type")]
    pub kind: String,
    pub answers: serde_json::Value,
    pub displayed: bool,
    pub order: i64,
    #[serde(with = "chrono::serde::ts_seconds")]
    pub created_at: DateTime<Utc>,
    #[serde(with = "chrono::serde::ts_seconds")]
    pub updated_at: DateTime<Utc>,
}

impl Entity for Question {
    const TABLE: &'static str = "questions";
    const COLUMNS: &'static [Column] = &[
        column("id", ColumnType::Uuid),
        column("name", ColumnType::Text),
        column("type", ColumnType::Text),
        column("answers", ColumnType::Json),
        column("displayed", ColumnType::Boolean),
        column("order", ColumnType::Integer),
        column("created_at", ColumnType::Timestamp),
        column("updated_at", ColumnType::Timestamp),
    ];

    fn decode(row: &PgRow, prefix: &str) -> Result<Self, sqlx::Error> {
        let f = |name| field(prefix, name);
        Ok(Self {
            id: row.try_get(f("id").as_str())?,
            name: row.try_get(f("name").as_str())?,
            kind: row.try_get(f("type").as_str())?,
            answers: row.try_get(f("answers").as_str())?,
            displayed: row.try_get(f("displayed").as_str())?,
            order: row.try_get(f("order").as_str())?,
            created_at: row.try_get(f("created_at").as_str())?,
            updated_at: row.try_get(f("updated_at").as_str())?,
        })
    }
}
