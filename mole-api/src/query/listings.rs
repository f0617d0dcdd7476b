//! Base queries for each listing, with the joins the endpoints may include.

use uuid::Uuid;

use super::composer::{Direction, ListQuery, QueryError};
use crate::models::{
    Account, BodyPart, Lesion, Question, Report, ReportAnswer, Request,
};

pub const BODY_PARTS: &str = "body_parts";
pub const LESIONS: &str = "lesions";
pub const LAST_REPORT: &str = "last_report";
pub const LAST_REQUEST: &str = "last_request";
pub const ACCOUNTS: &str = "accounts";
pub const QUESTIONS: &str = "questions";

pub fn body_parts() -> Result<ListQuery, QueryError> {
    ListQuery::from::<BodyPart>().default_order("order", Direction::Asc)
}

pub fn questions() -> Result<ListQuery, QueryError> {
    ListQuery::from::<Question>().default_order("order", Direction::Asc)
}

/// Lesions with their body part and their most recent report and that
/// report's request.
pub fn lesions() -> ListQuery {
    ListQuery::from::<Lesion>()
        .join::<BodyPart>(
            BODY_PARTS,
            "LEFT JOIN body_parts AS body_parts ON body_parts.id = lesions.body_part_id",
        )
        .join::<Report>(
            LAST_REPORT,
            "LEFT JOIN LATERAL (\
                SELECT * FROM reports \
                WHERE reports.lesion_id = lesions.id \
                ORDER BY reports.created_at DESC, reports.id DESC \
                LIMIT 1\
            ) AS last_report ON TRUE",
        )
        .join_after::<Request>(
            LAST_REQUEST,
            "LEFT JOIN requests AS last_request ON last_request.id = last_report.request_id",
            LAST_REPORT,
        )
}

pub fn reports() -> ListQuery {
    ListQuery::from::<Report>()
        .join::<Lesion>(
            LESIONS,
            "LEFT JOIN lesions AS lesions ON lesions.id = reports.lesion_id",
        )
        .join_after::<BodyPart>(
            BODY_PARTS,
            "LEFT JOIN body_parts AS body_parts ON body_parts.id = lesions.body_part_id",
            LESIONS,
        )
}

pub fn requests() -> ListQuery {
    ListQuery::from::<Request>().join::<Account>(
        ACCOUNTS,
        "LEFT JOIN accounts AS accounts ON accounts.id = requests.account_id",
    )
}

/// Answers of several reports in one round trip, in questionnaire order.
pub fn answers(report_ids: Vec<Uuid>) -> Result<ListQuery, QueryError> {
    let mut query = ListQuery::from::<ReportAnswer>()
        .join::<Question>(
            QUESTIONS,
            "LEFT JOIN questions AS questions ON questions.id = report_answers.question_id",
        )
        .include(QUESTIONS, true)
        .default_order("questions.order", Direction::Asc)?;
    query.where_any("report_id", report_ids)?;
    Ok(query)
}
