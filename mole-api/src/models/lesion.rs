use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::postgres::PgRow;
use sqlx::{FromRow, Row};
use uuid::Uuid;

use super::{column, field, Column, ColumnType, Entity};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
pub struct Lesion {
    pub id: Uuid,
    pub account_id: Uuid,
    pub name: String,
    pub body_part_id: Uuid,
    pub body_part_location: String,
    #[serde(with = "chrono::serde::ts_seconds")]
    pub created_at: DateTime<Utc>,
    #[serde(with = "chrono::serde::ts_seconds")]
    pub updated_at: DateTime<Utc>,
}

impl Entity for Lesion {
    const TABLE: &'static str = "lesions";
    const COLUMNS: &'static [Column] = &[
        column("id", ColumnType::Uuid),
        column("account_id", ColumnType::Uuid),
        column("name", ColumnType::Text),
        column("body_part_id", ColumnType::Uuid),
        column("body_part_location", ColumnType::Text),
        column("created_at", ColumnType::Timestamp),
        column("updated_at", ColumnType::Timestamp),
    ];

    fn decode(row: &PgRow, prefix: &str) -> Result<Self, sqlx::Error> {
        let f = |name| field(prefix, name);
        Ok(Self {
            id: row.try_get(f("id").as_str())?,
            account_id: row.try_get(f("account_id").as_str())?,
            name: row.try_get(f("name").as_str())?,
            body_part_id: row.try_get(f("body_part_id").as_str())?,
            body_part_location: row.try_get(f("body_part_location").as_str())?,
            created_at: row.try_get(f("created_at").as_str())?,
            updated_at: row.try_get(f("updated_at").as_str())?,
        })
    }
}
