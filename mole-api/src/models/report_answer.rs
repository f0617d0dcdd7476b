use serde::{Deserialize, Serialize};
use sqlx::postgres::PgRow;
use sqlx::{FromRow, Row};
use uuid::Uuid;

use super::{column, field, Column, ColumnType, Entity};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
pub struct ReportAnswer {
    pub id: Uuid,
    pub report_id: Uuid,
    pub question_id: Uuid,
    pub answer: serde_json::Value,
}

impl Entity for ReportAnswer {
    const TABLE: &'static str = "report_answers";
    const COLUMNS: &'static [Column] = &[
        column("id", ColumnType::Uuid),
        column("report_id", ColumnType::Uuid),
        column("question_id", ColumnType::Uuid),
        column("answer", ColumnType::Json),
    ];

    fn decode(row: &PgRow, prefix: &str) -> Result<Self, sqlx::Error> {
        let f = |name| field(prefix, name);
        Ok(Self {
            id: row.try_get(f("id").as_str())?,
            report_id: row.try_get(f("report_id").as_str())?,
            question_id: row.try_get(f("question_id").as_str())?,
            answer: row.try_get(f("answer").as_str())?,
        })
    }
}
