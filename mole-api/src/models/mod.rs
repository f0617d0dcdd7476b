//! Persisted entities.
//!
//! Every entity declares its column list once (`Entity::COLUMNS`). The query
//! composer uses it to render select lists and to whitelist filter targets,
//! and `Entity::decode` reads the same columns back, optionally under a
//! `<prefix>__` alias when the entity arrives through a join.

pub mod account;
pub mod body_part;
pub mod lesion;
pub mod question;
pub mod report;
pub mod report_answer;
pub mod request;

pub use account::{Account, AccountProfile};
pub use body_part::BodyPart;
pub use lesion::Lesion;
pub use question::Question;
pub use report::Report;
pub use report_answer::ReportAnswer;
pub use request::{Request, RequestStatus};

use sqlx::postgres::PgRow;
use sqlx::Row;
use uuid::Uuid;

/// Declared storage type of a column, used to re-type filter operands.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColumnType {
    Uuid,
    Text,
    Integer,
    Boolean,
    Timestamp,
    /// Postgres enum; compared through its text representation.
    Enum,
    Json,
    TextArray,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Column {
    pub name: &'static str,
    pub ty: ColumnType,
}

pub const fn column(name: &'static str, ty: ColumnType) -> Column {
    Column { name, ty }
}

pub trait Entity: Sized {
    const TABLE: &'static str;
    const COLUMNS: &'static [Column];

    /// Read the entity from a row whose columns are named `<prefix>__<col>`,
    /// or plain `<col>` when `prefix` is empty.
    fn decode(row: &PgRow, prefix: &str) -> Result<Self, sqlx::Error>;

    fn column(name: &str) -> Option<&'static Column> {
        Self::COLUMNS.iter().find(|c| c.name == name)
    }
}

/// Result column name for `name` under `prefix`.
pub fn field(prefix: &str, name: &str) -> String {
    if prefix.is_empty() {
        name.to_string()
    } else {
        format!("{}__{}", prefix, name)
    }
}

/// Decode an outer-joined entity; a NULL id means the join matched nothing.
pub fn decode_joined<T: Entity>(row: &PgRow, prefix: &str) -> Result<Option<T>, sqlx::Error> {
    let id: Option<Uuid> = row.try_get(field(prefix, "id").as_str())?;
    match id {
        Some(_) => T::decode(row, prefix).map(Some),
        None => Ok(None),
    }
}
