//! `filters[<column>]=<op>:<value>` expressions.
//!
//! Operators: `eq ne like ilike contains icontains gt gte lt lte between`.
//! `between` takes two operands (`between:<a>:<b>`), every other operator
//! takes one. Unknown operators are dropped without error.

use chrono::{DateTime, TimeZone, Utc};
use thiserror::Error;

#[derive(Debug, Error, PartialEq)]
pub enum FilterError {
    #[error("Filter on '{0}' has no operand")]
    MissingOperand(String),

    #[error("Filter 'between' on '{0}' needs two operands")]
    BetweenArity(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FilterOp {
    Eq,
    Ne,
    Like,
    ILike,
    Contains,
    IContains,
    Gt,
    Gte,
    Lt,
    Lte,
    Between,
}

impl FilterOp {
    pub fn parse(raw: &str) -> Option<Self> {
        Some(match raw {
            "eq" => FilterOp::Eq,
            "ne" => FilterOp::Ne,
            "like" => FilterOp::Like,
            "ilike" => FilterOp::ILike,
            "contains" => FilterOp::Contains,
            "icontains" => FilterOp::IContains,
            "gt" => FilterOp::Gt,
            "gte" => FilterOp::Gte,
            "lt" => FilterOp::Lt,
            "lte" => FilterOp::Lte,
            "between" => FilterOp::Between,
            _ => return None,
        })
    }

    /// SQL operator placed between the column and the first operand.
    pub fn symbol(&self) -> &'static str {
        match self {
            FilterOp::Eq => "=",
            FilterOp::Ne => "!=",
            FilterOp::Like | FilterOp::Contains => "LIKE",
            FilterOp::ILike | FilterOp::IContains => "ILIKE",
            FilterOp::Gt => ">",
            FilterOp::Gte => ">=",
            FilterOp::Lt => "<",
            FilterOp::Lte => "<=",
            FilterOp::Between => "BETWEEN",
        }
    }

    pub fn is_pattern(&self) -> bool {
        matches!(
            self,
            FilterOp::Like | FilterOp::ILike | FilterOp::Contains | FilterOp::IContains
        )
    }
}

/// Operand value as inferred from its shape.
#[derive(Debug, Clone, PartialEq)]
pub enum FilterValue {
    Integer(i64),
    Boolean(bool),
    Timestamp(DateTime<Utc>),
    Text(String),
}

#[derive(Debug, Clone, PartialEq)]
pub struct Operand {
    /// Text as supplied (wildcards already applied for `contains`).
    pub raw: String,
    pub value: FilterValue,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Operands {
    One(Operand),
    Two(Operand, Operand),
}

#[derive(Debug, Clone, PartialEq)]
pub struct FilterClause {
    pub column: String,
    pub op: FilterOp,
    pub operands: Operands,
}

/// Infer a typed value: integer (epoch seconds for `*_at` columns), then
/// boolean, then RFC 3339 timestamp, then plain text.
pub fn infer_value(column: &str, raw: &str) -> FilterValue {
    if let Ok(number) = raw.parse::<i64>() {
        if column.ends_with("_at") {
            if let Some(at) = Utc.timestamp_opt(number, 0).single() {
                return FilterValue::Timestamp(at);
            }
        }
        return FilterValue::Integer(number);
    }

    if let Some(flag) = parse_bool(raw) {
        return FilterValue::Boolean(flag);
    }

    if let Ok(at) = DateTime::parse_from_rfc3339(raw) {
        return FilterValue::Timestamp(at.with_timezone(&Utc));
    }

    FilterValue::Text(raw.to_string())
}

pub fn parse_bool(raw: &str) -> Option<bool> {
    match raw {
        "1" | "t" | "T" | "true" | "TRUE" | "True" => Some(true),
        "0" | "f" | "F" | "false" | "FALSE" | "False" => Some(false),
        _ => None,
    }
}

fn operand(column: &str, raw: &str) -> Operand {
    Operand {
        raw: raw.to_string(),
        value: infer_value(column, raw),
    }
}

/// RFC 3339 operands carry their own colons, so prefer a split whose left
/// side is a complete timestamp.
fn split_range(rest: &str) -> Option<(&str, &str)> {
    for (idx, _) in rest.match_indices(':') {
        let (left, right) = (&rest[..idx], &rest[idx + 1..]);
        if !right.is_empty() && DateTime::parse_from_rfc3339(left).is_ok() {
            return Some((left, right));
        }
    }
    rest.split_once(':')
        .filter(|(left, right)| !left.is_empty() && !right.is_empty())
}

/// Parse one `column -> "<op>:<operand>"` entry. `Ok(None)` means the
/// operator is not recognized and the entry is ignored.
pub fn parse_clause(column: &str, expression: &str) -> Result<Option<FilterClause>, FilterError> {
    let (op_raw, rest) = match expression.split_once(':') {
        Some((op, rest)) => (op, Some(rest)),
        None => (expression, None),
    };

    let Some(op) = FilterOp::parse(op_raw) else {
        tracing::debug!(column = %column, operator = %op_raw, "Dropping filter with unknown operator");
        return Ok(None);
    };

    let rest = rest.ok_or_else(|| FilterError::MissingOperand(column.to_string()))?;

    let operands = match op {
        FilterOp::Between => {
            let (low, high) =
                split_range(rest).ok_or_else(|| FilterError::BetweenArity(column.to_string()))?;
            Operands::Two(operand(column, low), operand(column, high))
        }
        FilterOp::Contains | FilterOp::IContains => {
            let pattern = format!("%{}%", rest);
            Operands::One(Operand {
                value: FilterValue::Text(pattern.clone()),
                raw: pattern,
            })
        }
        _ => Operands::One(operand(column, rest)),
    };

    Ok(Some(FilterClause {
        column: column.to_string(),
        op,
        operands,
    }))
}

/// Collect clauses from query pairs, reading keys of the form `filters[col]`.
pub fn parse_filters(pairs: &[(String, String)]) -> Result<Vec<FilterClause>, FilterError> {
    let mut clauses = Vec::new();
    for (key, value) in pairs {
        let Some(column) = key
            .strip_prefix("filters[")
            .and_then(|rest| rest.strip_suffix(']'))
        else {
            continue;
        };
        if column.is_empty() {
            continue;
        }
        if let Some(clause) = parse_clause(column, value)? {
            clauses.push(clause);
        }
    }
    Ok(clauses)
}
