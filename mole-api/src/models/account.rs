use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::postgres::PgRow;
use sqlx::{FromRow, Row};
use uuid::Uuid;

use super::{column, field, Column, ColumnType, Entity};

/// Local copy of an identity-provider user. `id` is the token subject.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
pub struct Account {
    pub id: Uuid,
    pub name: String,
    pub email: String,
    pub phone: String,
    pub gender: String,
    pub birth_date: String,
    #[serde(with = "chrono::serde::ts_seconds")]
    pub created_at: DateTime<Utc>,
    #[serde(with = "chrono::serde::ts_seconds")]
    pub updated_at: DateTime<Utc>,
}

/// Attributes written by the profile synchronizer.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AccountProfile {
    pub id: Uuid,
    pub name: String,
    pub email: String,
    pub phone: String,
    pub gender: String,
    pub birth_date: String,
}

impl Entity for Account {
    const TABLE: &'static str = "accounts";
    const COLUMNS: &'static [Column] = &[
        column("id", ColumnType::Uuid),
        column("name", ColumnType::Text),
        column("email", ColumnType::Text),
        column("phone", ColumnType::Text),
        column("gender", ColumnType::Text),
        column("birth_date", ColumnType::Text),
        column("created_at", ColumnType::Timestamp),
        column("updated_at", ColumnType::Timestamp),
    ];

    fn decode(row: &PgRow, prefix: &str) -> Result<Self, sqlx::Error> {
        let f = |name| field(prefix, name);
        Ok(Self {
            id: row.try_get(f("id").as_str())?,
            name: row.try_get(f("name").as_str())?,
            email: row.try_get(f("email").as_str())?,
            phone: row.try_get(f("phone").as_str())?,
            gender: row.try_get(f("gender").as_str())?,
            birth_date: row.try_get(f("birth_date").as_str())?,
            created_at: row.try_get(f("created_at").as_str())?,
            updated_at: row.try_get(f("updated_at").as_str())?,
        })
    }
}
