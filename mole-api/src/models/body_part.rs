use serde::{Deserialize, Serialize};
use sqlx::postgres::PgRow;
use sqlx::{FromRow, Row};
use uuid::Uuid;

use super::{column, field, Column, ColumnType, Entity};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
pub struct BodyPart {
    pub id: Uuid,
    pub name: String,
    pub displayed: bool,
    pub image: String,
    pub order: i32,
    pub parent: Option<Uuid>,
}

impl Entity for BodyPart {
    const TABLE: &'static str = "body_parts";
    const COLUMNS: &'static [Column] = &[
        column("id", ColumnType::Uuid),
        column("name", ColumnType::Text),
        column("displayed", ColumnType::Boolean),
        column("image", ColumnType::Text),
        column("order", ColumnType::Integer),
        column("parent", ColumnType::Uuid),
    ];

    fn decode(row: &PgRow, prefix: &str) -> Result<Self, sqlx::Error> {
        let f = |name| field(prefix, name);
        Ok(Self {
            id: row.try_get(f("id").as_str())?,
            name: row.try_get(f("name").as_str())?,
            displayed: row.try_get(f("displayed").as_str())?,
            image: row.try_get(f("image").as_str())?,
            order: row.try_get(f("order").as_str())?,
            parent: row.try_get(f("parent").as_str())?,
        })
    }
}
