//! Parametrized read queries over a base entity plus optional joins.
//!
//! Client input never reaches the SQL text: column references are resolved
//! against each relation's declared column list, and every operand is bound.

use chrono::{DateTime, TimeZone, Utc};
use sqlx::{Postgres, QueryBuilder};
use thiserror::Error;
use uuid::Uuid;

use super::filter::{infer_value, FilterClause, FilterError, FilterOp, FilterValue, Operand, Operands};
use crate::models::{field, Column, ColumnType, Entity};

pub const DEFAULT_OFFSET: i64 = 0;
pub const DEFAULT_LIMIT: i64 = 50;

#[derive(Debug, Error)]
pub enum QueryError {
    /// The reference names no whitelisted column. Surfaces as a 500.
    #[error("Unknown column '{0}'")]
    UnknownColumn(String),

    #[error("Invalid value for '{column}': {reason}")]
    InvalidOperand { column: String, reason: String },

    #[error(transparent)]
    Filter(#[from] FilterError),
}

#[derive(Debug, Clone, PartialEq)]
pub enum BindValue {
    Uuid(Uuid),
    Text(String),
    Integer(i64),
    Boolean(bool),
    Timestamp(DateTime<Utc>),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Asc,
    Desc,
}

impl Direction {
    fn sql(&self) -> &'static str {
        match self {
            Direction::Asc => "ASC",
            Direction::Desc => "DESC",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Pagination {
    pub offset: i64,
    pub limit: i64,
}

impl Default for Pagination {
    fn default() -> Self {
        Self {
            offset: DEFAULT_OFFSET,
            limit: DEFAULT_LIMIT,
        }
    }
}

impl Pagination {
    /// Malformed values fall back to the defaults; negatives clamp to zero.
    pub fn parse(offset: Option<&str>, limit: Option<&str>) -> Self {
        let read = |raw: Option<&str>, default: i64| {
            raw.and_then(|v| v.trim().parse::<i64>().ok())
                .unwrap_or(default)
                .max(0)
        };
        Self {
            offset: read(offset, DEFAULT_OFFSET),
            limit: read(limit, DEFAULT_LIMIT),
        }
    }
}

#[derive(Debug, Clone)]
struct Relation {
    table: &'static str,
    alias: &'static str,
    columns: &'static [Column],
    /// Join clause; `None` for the base relation.
    join: Option<&'static str>,
    depends_on: Option<&'static str>,
    active: bool,
}

impl Relation {
    fn prefix(&self) -> &'static str {
        if self.join.is_some() {
            self.alias
        } else {
            ""
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Target {
    alias: &'static str,
    column: &'static Column,
}

impl Target {
    fn sql(&self, as_text: bool) -> String {
        if as_text || self.column.ty == ColumnType::Enum {
            format!("{}.\"{}\"::text", self.alias, self.column.name)
        } else {
            format!("{}.\"{}\"", self.alias, self.column.name)
        }
    }
}

#[derive(Debug, Clone)]
enum Predicate {
    Compare {
        target: Target,
        op: FilterOp,
        values: Vec<BindValue>,
    },
    AnyOf {
        target: Target,
        ids: Vec<Uuid>,
    },
}

#[derive(Debug, Clone)]
pub struct ListQuery {
    relations: Vec<Relation>,
    predicates: Vec<Predicate>,
    default_order: Vec<(Target, Direction)>,
    order: Vec<(Target, Direction)>,
    page: Option<Pagination>,
    total: bool,
}

impl ListQuery {
    /// Start a query over `E`, ordered by `created_at DESC` when it has one.
    pub fn from<E: Entity>() -> Self {
        let base = Relation {
            table: E::TABLE,
            alias: E::TABLE,
            columns: E::COLUMNS,
            join: None,
            depends_on: None,
            active: true,
        };
        let default_order = E::column("created_at")
            .map(|column| {
                vec![(
                    Target {
                        alias: E::TABLE,
                        column,
                    },
                    Direction::Desc,
                )]
            })
            .unwrap_or_default();

        Self {
            relations: vec![base],
            predicates: Vec::new(),
            default_order,
            order: Vec::new(),
            page: None,
            total: false,
        }
    }

    /// Declare a joinable relation. It is only rendered once included or
    /// referenced by a predicate or ordering.
    pub fn join<E: Entity>(self, alias: &'static str, clause: &'static str) -> Self {
        self.declare::<E>(alias, clause, None)
    }

    /// Like [`ListQuery::join`], for joins whose clause references `depends_on`.
    pub fn join_after<E: Entity>(
        self,
        alias: &'static str,
        clause: &'static str,
        depends_on: &'static str,
    ) -> Self {
        self.declare::<E>(alias, clause, Some(depends_on))
    }

    fn declare<E: Entity>(
        mut self,
        alias: &'static str,
        clause: &'static str,
        depends_on: Option<&'static str>,
    ) -> Self {
        self.relations.push(Relation {
            table: E::TABLE,
            alias,
            columns: E::COLUMNS,
            join: Some(clause),
            depends_on,
            active: false,
        });
        self
    }

    pub fn include(mut self, alias: &str, enabled: bool) -> Self {
        if enabled {
            self.activate(alias);
        }
        self
    }

    pub fn is_included(&self, alias: &str) -> bool {
        self.relations
            .iter()
            .any(|r| r.alias == alias && r.active)
    }

    /// Replace the default ordering.
    pub fn default_order(mut self, reference: &str, direction: Direction) -> Result<Self, QueryError> {
        let target = self.resolve(reference)?;
        self.default_order = vec![(target, direction)];
        Ok(self)
    }

    fn base(&self) -> &Relation {
        &self.relations[0]
    }

    fn activate(&mut self, alias: &str) {
        let mut next = Some(alias.to_string());
        while let Some(current) = next.take() {
            if let Some(relation) = self.relations.iter_mut().find(|r| r.alias == current) {
                relation.active = true;
                next = relation.depends_on.map(str::to_string);
            }
        }
    }

    /// Resolve `alias.column` or a bare column of the base relation.
    fn resolve(&mut self, reference: &str) -> Result<Target, QueryError> {
        let (alias, name) = match reference.split_once('.') {
            Some((alias, name)) => (alias, name),
            None => (self.base().alias, reference),
        };
        let name = name.trim_matches('"');

        let relation = self
            .relations
            .iter()
            .find(|r| r.alias == alias)
            .ok_or_else(|| QueryError::UnknownColumn(reference.to_string()))?;
        let columns: &'static [Column] = relation.columns;
        let column = columns
            .iter()
            .find(|c| c.name == name)
            .ok_or_else(|| QueryError::UnknownColumn(reference.to_string()))?;
        let target = Target {
            alias: relation.alias,
            column,
        };

        self.activate(target.alias);
        Ok(target)
    }

    /// Mandatory ownership predicate. Client filters are ANDed with it and
    /// cannot widen it.
    pub fn owned_by(&mut self, reference: &str, account_id: Uuid) -> Result<(), QueryError> {
        let target = self.resolve(reference)?;
        self.predicates.push(Predicate::Compare {
            target,
            op: FilterOp::Eq,
            values: vec![BindValue::Uuid(account_id)],
        });
        Ok(())
    }

    /// Equality on a literal query parameter, typed by the column.
    pub fn where_eq(&mut self, reference: &str, raw: &str) -> Result<(), QueryError> {
        let target = self.resolve(reference)?;
        let operand = Operand {
            raw: raw.to_string(),
            value: infer_value(target.column.name, raw),
        };
        let value = coerce(target, FilterOp::Eq, &operand)?;
        self.predicates.push(Predicate::Compare {
            target,
            op: FilterOp::Eq,
            values: vec![value],
        });
        Ok(())
    }

    pub fn where_any(&mut self, reference: &str, ids: Vec<Uuid>) -> Result<(), QueryError> {
        let target = self.resolve(reference)?;
        self.predicates.push(Predicate::AnyOf { target, ids });
        Ok(())
    }

    pub fn filter(&mut self, clauses: &[FilterClause]) -> Result<(), QueryError> {
        for clause in clauses {
            let target = self.resolve(&clause.column)?;
            let values = match &clause.operands {
                Operands::One(operand) => vec![coerce(target, clause.op, operand)?],
                Operands::Two(low, high) => vec![
                    coerce(target, clause.op, low)?,
                    coerce(target, clause.op, high)?,
                ],
            };
            if clause.op == FilterOp::Between && values.len() != 2 {
                return Err(FilterError::BetweenArity(clause.column.clone()).into());
            }
            self.predicates.push(Predicate::Compare {
                target,
                op: clause.op,
                values,
            });
        }
        Ok(())
    }

    /// `column` or `column ASC|DESC`. Anything unrecognized keeps the default.
    pub fn order_by(&mut self, raw: Option<&str>) {
        let Some(raw) = raw.map(str::trim).filter(|r| !r.is_empty()) else {
            return;
        };

        let mut parts = raw.split_whitespace();
        let column = parts.next().unwrap_or_default();
        let direction = match parts.next().map(|d| d.to_ascii_uppercase()) {
            None => Some(Direction::Asc),
            Some(d) if d == "ASC" => Some(Direction::Asc),
            Some(d) if d == "DESC" => Some(Direction::Desc),
            Some(_) => None,
        };

        match (direction, parts.next()) {
            (Some(direction), None) => match self.resolve(column) {
                Ok(target) => self.order = vec![(target, direction)],
                Err(e) => tracing::debug!(order_by = %raw, error = %e, "Ignoring order_by"),
            },
            _ => tracing::debug!(order_by = %raw, "Ignoring malformed order_by"),
        }
    }

    pub fn paginate(&mut self, page: Pagination) {
        self.page = Some(page);
    }

    /// Add a `total_count` column carrying the unpaginated row count.
    pub fn with_total(&mut self) {
        self.total = true;
    }

    pub fn build(&self) -> QueryBuilder<'static, Postgres> {
        let active: Vec<&Relation> = self.relations.iter().filter(|r| r.active).collect();

        let mut select = Vec::new();
        for relation in &active {
            for column in relation.columns {
                select.push(format!(
                    "{}.\"{}\" AS \"{}\"",
                    relation.alias,
                    column.name,
                    field(relation.prefix(), column.name)
                ));
            }
        }
        if self.total {
            select.push("COUNT(*) OVER() AS \"total_count\"".to_string());
        }

        let base = self.base();
        let mut qb: QueryBuilder<'static, Postgres> = QueryBuilder::new("SELECT ");
        qb.push(select.join(", "));
        qb.push(format!(" FROM {} AS {}", base.table, base.alias));

        for relation in active.iter().filter(|r| r.join.is_some()) {
            if let Some(clause) = relation.join {
                qb.push(" ");
                qb.push(clause);
            }
        }

        for (idx, predicate) in self.predicates.iter().enumerate() {
            qb.push(if idx == 0 { " WHERE " } else { " AND " });
            render_predicate(&mut qb, predicate);
        }

        let order = if self.order.is_empty() {
            &self.default_order
        } else {
            &self.order
        };
        let mut terms: Vec<String> = order
            .iter()
            .map(|(target, direction)| format!("{} {}", target.sql(false), direction.sql()))
            .collect();
        let tie_breaker = format!("{}.\"id\" ASC", base.alias);
        let primary_is_id = order
            .first()
            .is_some_and(|(t, _)| t.alias == base.alias && t.column.name == "id");
        if !primary_is_id {
            terms.push(tie_breaker);
        }
        qb.push(" ORDER BY ");
        qb.push(terms.join(", "));

        if let Some(page) = self.page {
            qb.push(" OFFSET ");
            qb.push_bind(page.offset);
            qb.push(" LIMIT ");
            qb.push_bind(page.limit);
        }

        qb
    }
}

fn render_predicate(qb: &mut QueryBuilder<'static, Postgres>, predicate: &Predicate) {
    match predicate {
        Predicate::Compare { target, op, values } => {
            qb.push(target.sql(op.is_pattern()));
            qb.push(" ");
            qb.push(op.symbol());
            qb.push(" ");
            let mut values = values.iter();
            if let Some(first) = values.next() {
                push_value(qb, first);
            }
            if let Some(second) = values.next() {
                qb.push(" AND ");
                push_value(qb, second);
            }
        }
        Predicate::AnyOf { target, ids } => {
            qb.push(target.sql(false));
            qb.push(" = ANY(");
            qb.push_bind(ids.clone());
            qb.push(")");
        }
    }
}

fn push_value(qb: &mut QueryBuilder<'static, Postgres>, value: &BindValue) {
    match value.clone() {
        BindValue::Uuid(v) => {
            qb.push_bind(v);
        }
        BindValue::Text(v) => {
            qb.push_bind(v);
        }
        BindValue::Integer(v) => {
            qb.push_bind(v);
        }
        BindValue::Boolean(v) => {
            qb.push_bind(v);
        }
        BindValue::Timestamp(v) => {
            qb.push_bind(v);
        }
    }
}

/// Re-type an operand against the column's declared type. Pattern
/// operators always compare text.
fn coerce(target: Target, op: FilterOp, operand: &Operand) -> Result<BindValue, QueryError> {
    let invalid = |reason: &str| QueryError::InvalidOperand {
        column: target.column.name.to_string(),
        reason: reason.to_string(),
    };

    if op.is_pattern() {
        return Ok(BindValue::Text(operand.raw.clone()));
    }

    match (target.column.ty, &operand.value) {
        (ColumnType::Uuid, _) => Uuid::parse_str(&operand.raw)
            .map(BindValue::Uuid)
            .map_err(|_| invalid("expected a UUID")),
        (ColumnType::Text | ColumnType::Enum, _) => Ok(BindValue::Text(operand.raw.clone())),
        (ColumnType::Integer, FilterValue::Integer(n)) => Ok(BindValue::Integer(*n)),
        (ColumnType::Integer, _) => Err(invalid("expected an integer")),
        (ColumnType::Boolean, FilterValue::Boolean(b)) => Ok(BindValue::Boolean(*b)),
        (ColumnType::Boolean, FilterValue::Integer(n)) if *n == 0 || *n == 1 => {
            Ok(BindValue::Boolean(*n == 1))
        }
        (ColumnType::Boolean, _) => Err(invalid("expected a boolean")),
        (ColumnType::Timestamp, FilterValue::Timestamp(at)) => Ok(BindValue::Timestamp(*at)),
        (ColumnType::Timestamp, FilterValue::Integer(n)) => Utc
            .timestamp_opt(*n, 0)
            .single()
            .map(BindValue::Timestamp)
            .ok_or_else(|| invalid("timestamp out of range")),
        (ColumnType::Timestamp, _) => Err(invalid("expected epoch seconds or an RFC 3339 timestamp")),
        (ColumnType::Json | ColumnType::TextArray, _) => {
            Err(invalid("column only supports pattern operators"))
        }
    }
}
