pub mod catalog;
pub mod doctor;
pub mod health;
pub mod media;
pub mod metrics;
pub mod users;

use service_core::error::AppError;
use uuid::Uuid;

use crate::query::{listings, AnswerView, ReportView};
use crate::AppState;

/// Parse an identifier path segment.
pub(crate) fn parse_id(raw: &str) -> Result<Uuid, AppError> {
    Uuid::parse_str(raw).map_err(|_| AppError::BadRequest(anyhow::anyhow!("Invalid ID supplied")))
}

pub(crate) fn not_found(entity: &str) -> AppError {
    AppError::NotFound(anyhow::anyhow!("{} not found", entity))
}

/// Optional report enrichment shared by every report-returning endpoint.
#[derive(Debug, Clone, Copy, Default)]
pub(crate) struct ReportExtras {
    pub answers: bool,
    pub questions: bool,
    pub temp_urls: bool,
}

impl ReportExtras {
    pub fn from_params(params: &crate::query::ListParams) -> Self {
        Self {
            answers: params.flag("include_answers"),
            questions: params.flag("include_questions"),
            temp_urls: params.flag("temp_urls"),
        }
    }
}

/// Load answers in one batch and swap photo references for signed URLs,
/// as requested.
pub(crate) async fn enrich_reports(
    state: &AppState,
    reports: &mut [ReportView],
    extras: ReportExtras,
) -> Result<(), AppError> {
    if extras.answers && !reports.is_empty() {
        let ids = reports.iter().map(|view| view.report.id).collect();
        let query = listings::answers(ids)?;
        let answers = state.db.list(&query, AnswerView::decode).await?;
        crate::query::assembler::attach_answers(reports, answers, extras.questions);
    }

    if extras.temp_urls {
        crate::query::assembler::sign_report_photos(state.storage.as_ref(), reports).await?;
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::StatusCode;

    #[test]
    fn malformed_ids_are_bad_requests() {
        let err = parse_id("lesion-1").unwrap_err();
        assert_eq!(err.status(), StatusCode::BAD_REQUEST);
        assert_eq!(err.to_string(), "Bad request: Invalid ID supplied");

        let id = Uuid::new_v4();
        assert_eq!(parse_id(&id.to_string()).unwrap(), id);
    }

    #[test]
    fn extras_follow_literal_true() {
        let params = crate::query::ListParams::parse(Some(
            "include_answers=true&include_questions=yes&temp_urls=true",
        ))
        .unwrap();
        let extras = ReportExtras::from_params(&params);
        assert!(extras.answers);
        assert!(!extras.questions);
        assert!(extras.temp_urls);
    }
}
