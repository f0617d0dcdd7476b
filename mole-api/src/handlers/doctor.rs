//! Cross-account reads and the consultation response.

use axum::{
    extract::{Path, State},
    Json,
};
use service_core::error::AppError;

use super::{enrich_reports, not_found, parse_id, ReportExtras};
use crate::dtos::{RespondInput, ValidJson};
use crate::models::Request;
use crate::query::assembler::total_count;
use crate::query::listings::{self, ACCOUNTS, BODY_PARTS, LESIONS};
use crate::query::{LesionView, ListParams, Page, ReportView, RequestView};
use crate::services::push::{send_with_retry, PushMessage, PUSH_ATTEMPTS};
use crate::AppState;

pub async fn list_requests(
    State(state): State<AppState>,
    params: ListParams,
) -> Result<Json<Page<RequestView>>, AppError> {
    let include_accounts = params.flag("include_accounts");
    let skip_answer = params.flag("skip_answer");

    let mut query = listings::requests().include(ACCOUNTS, include_accounts);
    params.narrow(&mut query, &["account_id", "status"])?;
    params.apply(&mut query)?;
    query.with_total();

    let rows = state.db.fetch(&query).await?;
    let total = total_count(&rows)?;
    let data = rows
        .iter()
        .map(|row| {
            RequestView::decode(row, &query)
                .map(|view| view.keep_account(include_accounts).skip_answer(skip_answer))
        })
        .collect::<Result<Vec<_>, _>>()?;

    Ok(Json(Page { data, total }))
}

pub async fn get_request(
    State(state): State<AppState>,
    Path(request_id): Path<String>,
    params: ListParams,
) -> Result<Json<RequestView>, AppError> {
    let id = parse_id(&request_id)?;
    let include_account = params.flag("include_account");

    let mut query = listings::requests().include(ACCOUNTS, include_account);
    query.where_eq("id", &id.to_string())?;

    let request = state
        .db
        .list(&query, RequestView::decode)
        .await?
        .into_iter()
        .next()
        .ok_or_else(|| not_found("Request"))?;
    Ok(Json(request.keep_account(include_account)))
}

/// Store the consultation, then notify the owner. Push failures are logged
/// and never change the response.
pub async fn respond(
    State(state): State<AppState>,
    Path(request_id): Path<String>,
    ValidJson(input): ValidJson<RespondInput>,
) -> Result<Json<Request>, AppError> {
    let id = parse_id(&request_id)?;
    state
        .db
        .find_request(id)
        .await?
        .ok_or_else(|| not_found("Request"))?;

    let request = state.db.respond_to_request(id, &input).await?;
    tracing::info!(
        request_id = %request.id,
        status = request.status.as_str(),
        reports = input.reports.len(),
        "Request answered"
    );

    if let Some(text) = input.notify_msg.as_deref().filter(|m| !m.is_empty()) {
        match &state.push {
            Some(push) => {
                let message = PushMessage::text(request.account_id.to_string(), text);
                if let Err(e) = send_with_retry(push.as_ref(), &message, PUSH_ATTEMPTS).await {
                    tracing::warn!(
                        request_id = %request.id,
                        account_id = %request.account_id,
                        error = %e,
                        "Push notification failed"
                    );
                }
            }
            None => {
                tracing::debug!(request_id = %request.id, "Push disabled, notification skipped");
            }
        }
    }

    Ok(Json(request))
}

pub async fn list_reports(
    State(state): State<AppState>,
    params: ListParams,
) -> Result<Json<Vec<ReportView>>, AppError> {
    let include_lesions = params.flag("include_lesions");
    let include_body_parts = params.flag("include_body_parts");

    let mut query = listings::reports()
        .include(LESIONS, include_lesions)
        .include(BODY_PARTS, include_body_parts);
    params.narrow(&mut query, &["request_id", "lesion_id"])?;
    params.apply(&mut query)?;

    let mut reports: Vec<ReportView> = state
        .db
        .list(&query, ReportView::decode)
        .await?
        .into_iter()
        .map(|view| view.keep(include_lesions, include_body_parts))
        .collect();
    enrich_reports(&state, &mut reports, ReportExtras::from_params(&params)).await?;
    Ok(Json(reports))
}

pub async fn get_report(
    State(state): State<AppState>,
    Path(report_id): Path<String>,
    params: ListParams,
) -> Result<Json<ReportView>, AppError> {
    let id = parse_id(&report_id)?;
    let include_lesion = params.flag("include_lesion");
    let include_body_part = params.flag("include_body_part");

    let mut query = listings::reports()
        .include(LESIONS, include_lesion)
        .include(BODY_PARTS, include_body_part);
    query.where_eq("id", &id.to_string())?;

    let report = state
        .db
        .list(&query, ReportView::decode)
        .await?
        .into_iter()
        .next()
        .ok_or_else(|| not_found("Report"))?
        .keep(include_lesion, include_body_part);

    let mut reports = [report];
    enrich_reports(&state, &mut reports, ReportExtras::from_params(&params)).await?;
    let [report] = reports;
    Ok(Json(report))
}

pub async fn list_lesions(
    State(state): State<AppState>,
    params: ListParams,
) -> Result<Json<Vec<LesionView>>, AppError> {
    let include_body_parts = params.flag("include_body_parts");

    let mut query = listings::lesions().include(BODY_PARTS, include_body_parts);
    params.narrow(&mut query, &["account_id", "body_part_id"])?;
    params.apply(&mut query)?;

    let lesions = state.db.list(&query, LesionView::decode).await?;
    Ok(Json(
        lesions
            .into_iter()
            .map(|view| view.keep(include_body_parts, false, false))
            .collect(),
    ))
}

pub async fn get_lesion(
    State(state): State<AppState>,
    Path(lesion_id): Path<String>,
    params: ListParams,
) -> Result<Json<LesionView>, AppError> {
    let id = parse_id(&lesion_id)?;
    let include_body_part = params.flag("include_body_part");

    let mut query = listings::lesions().include(BODY_PARTS, include_body_part);
    query.where_eq("id", &id.to_string())?;

    let lesion = state
        .db
        .list(&query, LesionView::decode)
        .await?
        .into_iter()
        .next()
        .ok_or_else(|| not_found("Lesion"))?;
    Ok(Json(lesion.keep(include_body_part, false, false)))
}
