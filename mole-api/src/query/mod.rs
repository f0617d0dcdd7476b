//! Listing support: filter parsing, query composition, per-endpoint base
//! queries and response assembly.

pub mod assembler;
pub mod composer;
pub mod filter;
pub mod listings;
pub mod params;

pub use assembler::{AnswerView, LesionView, Page, ReportView, RequestView};
pub use composer::{Direction, ListQuery, Pagination, QueryError};
pub use filter::{FilterClause, FilterError, FilterOp};
pub use params::ListParams;
