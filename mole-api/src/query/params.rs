use axum::{async_trait, extract::FromRequestParts, http::request::Parts};
use service_core::error::AppError;

use super::composer::{ListQuery, Pagination};
use super::filter::{parse_filters, FilterClause};

/// Raw query-string pairs of a listing request, in order. Repeated and
/// bracketed keys (`filters[col]`) are kept verbatim.
#[derive(Debug, Clone, Default)]
pub struct ListParams {
    pairs: Vec<(String, String)>,
}

impl ListParams {
    pub fn parse(query: Option<&str>) -> Result<Self, AppError> {
        let pairs = match query {
            Some(q) => serde_urlencoded::from_str::<Vec<(String, String)>>(q).map_err(|e| {
                AppError::BadRequest(anyhow::anyhow!("Invalid query string: {}", e))
            })?,
            None => Vec::new(),
        };
        Ok(Self { pairs })
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.pairs
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
            .filter(|v| !v.is_empty())
    }

    /// Flags are on only for the literal string `true`.
    pub fn flag(&self, key: &str) -> bool {
        self.get(key) == Some("true")
    }

    pub fn pagination(&self) -> Pagination {
        Pagination::parse(self.get("offset"), self.get("limit"))
    }

    pub fn order_by(&self) -> Option<&str> {
        self.get("order_by")
    }

    pub fn filters(&self) -> Result<Vec<FilterClause>, AppError> {
        parse_filters(&self.pairs).map_err(|e| AppError::BadRequest(e.into()))
    }

    /// Equality predicates for the endpoint's named parameters, e.g.
    /// `?account_id=<uuid>` narrows on the `account_id` column.
    pub fn narrow(&self, query: &mut ListQuery, columns: &[&str]) -> Result<(), AppError> {
        for column in columns {
            if let Some(value) = self.get(column) {
                query.where_eq(column, value)?;
            }
        }
        Ok(())
    }

    /// Apply the caller's filters, ordering and page window.
    pub fn apply(&self, query: &mut ListQuery) -> Result<(), AppError> {
        query.filter(&self.filters()?)?;
        query.order_by(self.order_by());
        query.paginate(self.pagination());
        Ok(())
    }
}

#[async_trait]
impl<S> FromRequestParts<S> for ListParams
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        ListParams::parse(parts.uri.query())
    }
}
