//! The caller's own account, lesions, reports and requests. Every read is
//! scoped to the caller; rows of other accounts look absent.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use service_core::error::AppError;
use uuid::Uuid;

use super::{enrich_reports, not_found, parse_id, ReportExtras};
use crate::db::LesionFields;
use crate::dtos::{LesionInput, ReportInput, RequestInput, RequestUpdateInput, ValidJson};
use crate::middleware::AuthUser;
use crate::models::{Account, Lesion, Report, Request};
use crate::query::listings::{self, BODY_PARTS, LAST_REPORT, LAST_REQUEST, LESIONS};
use crate::query::{LesionView, ListParams, ReportView, RequestView};
use crate::AppState;

pub async fn me(user: AuthUser) -> Json<Account> {
    Json(user.account)
}

// ============================================================================
// Lesions
// ============================================================================

struct LesionIncludes {
    body_part: bool,
    last_report: bool,
    last_request: bool,
}

impl LesionIncludes {
    fn from_params(params: &ListParams) -> Self {
        Self {
            body_part: params.flag("include_body_parts"),
            last_report: params.flag("include_last_reports"),
            last_request: params.flag("include_last_requests"),
        }
    }

    fn lesions(&self) -> crate::query::ListQuery {
        listings::lesions()
            .include(BODY_PARTS, self.body_part)
            .include(LAST_REPORT, self.last_report)
            .include(LAST_REQUEST, self.last_request)
    }

    fn shape(&self, view: LesionView) -> LesionView {
        view.keep(self.body_part, self.last_report, self.last_request)
    }
}

fn lesion_fields(input: &LesionInput) -> Result<LesionFields<'_>, AppError> {
    let body_part_id = input
        .body_part_id
        .ok_or_else(|| AppError::BadRequest(anyhow::anyhow!("body_part_id is required")))?;
    Ok(LesionFields {
        name: &input.name,
        body_part_id,
        body_part_location: &input.body_part_location,
    })
}

async fn owned_lesion(state: &AppState, raw_id: &str, user: &AuthUser) -> Result<Lesion, AppError> {
    let id = parse_id(raw_id)?;
    state
        .db
        .find_owned_lesion(id, user.id())
        .await?
        .ok_or_else(|| not_found("Lesion"))
}

pub async fn list_lesions(
    State(state): State<AppState>,
    user: AuthUser,
    params: ListParams,
) -> Result<Json<Vec<LesionView>>, AppError> {
    let includes = LesionIncludes::from_params(&params);
    let mut query = includes.lesions();
    query.owned_by("account_id", user.id())?;
    params.apply(&mut query)?;

    let lesions = state.db.list(&query, LesionView::decode).await?;
    Ok(Json(lesions.into_iter().map(|v| includes.shape(v)).collect()))
}

pub async fn get_lesion(
    State(state): State<AppState>,
    user: AuthUser,
    Path(lesion_id): Path<String>,
    params: ListParams,
) -> Result<Json<LesionView>, AppError> {
    let id = parse_id(&lesion_id)?;
    let includes = LesionIncludes::from_params(&params);
    let mut query = includes.lesions();
    query.owned_by("account_id", user.id())?;
    query.where_eq("id", &id.to_string())?;

    let lesion = state
        .db
        .list(&query, LesionView::decode)
        .await?
        .into_iter()
        .next()
        .ok_or_else(|| not_found("Lesion"))?;
    Ok(Json(includes.shape(lesion)))
}

pub async fn create_lesion(
    State(state): State<AppState>,
    user: AuthUser,
    ValidJson(input): ValidJson<LesionInput>,
) -> Result<impl IntoResponse, AppError> {
    let lesion = state.db.create_lesion(user.id(), lesion_fields(&input)?).await?;
    tracing::info!(lesion_id = %lesion.id, account_id = %user.id(), "Lesion created");
    Ok((StatusCode::CREATED, Json(lesion)))
}

pub async fn update_lesion(
    State(state): State<AppState>,
    user: AuthUser,
    Path(lesion_id): Path<String>,
    ValidJson(input): ValidJson<LesionInput>,
) -> Result<Json<Lesion>, AppError> {
    let lesion = owned_lesion(&state, &lesion_id, &user).await?;
    let updated = state.db.update_lesion(lesion.id, lesion_fields(&input)?).await?;
    Ok(Json(updated))
}

pub async fn delete_lesion(
    State(state): State<AppState>,
    user: AuthUser,
    Path(lesion_id): Path<String>,
) -> Result<Json<Lesion>, AppError> {
    let lesion = owned_lesion(&state, &lesion_id, &user).await?;
    state.db.delete_lesion(lesion.id).await?;
    tracing::info!(lesion_id = %lesion.id, "Lesion deleted");
    Ok(Json(lesion))
}

// ============================================================================
// Reports
// ============================================================================

/// A report under one of the caller's lesions.
async fn owned_report(
    state: &AppState,
    lesion: &Lesion,
    raw_id: &str,
) -> Result<Report, AppError> {
    let id = parse_id(raw_id)?;
    state
        .db
        .find_report(id)
        .await?
        .filter(|report| report.lesion_id == lesion.id)
        .ok_or_else(|| not_found("Report"))
}

/// A report may only point at one of the caller's requests.
async fn check_request_link(state: &AppState, input: &ReportInput, owner: Uuid) -> Result<(), AppError> {
    if let Some(request_id) = input.request_id {
        if state.db.find_owned_request(request_id, owner).await?.is_none() {
            return Err(AppError::BadRequest(anyhow::anyhow!("Request not found")));
        }
    }
    Ok(())
}

pub async fn list_reports(
    State(state): State<AppState>,
    user: AuthUser,
    Path(lesion_id): Path<String>,
    params: ListParams,
) -> Result<Json<Vec<ReportView>>, AppError> {
    let lesion = owned_lesion(&state, &lesion_id, &user).await?;
    let mut query = listings::reports();
    query.owned_by("lesions.account_id", user.id())?;
    query.where_eq("lesion_id", &lesion.id.to_string())?;
    params.apply(&mut query)?;

    let mut reports: Vec<ReportView> = state
        .db
        .list(&query, ReportView::decode)
        .await?
        .into_iter()
        .map(|view| view.keep(false, false))
        .collect();
    enrich_reports(&state, &mut reports, ReportExtras::from_params(&params)).await?;
    Ok(Json(reports))
}

pub async fn create_report(
    State(state): State<AppState>,
    user: AuthUser,
    Path(lesion_id): Path<String>,
    ValidJson(input): ValidJson<ReportInput>,
) -> Result<impl IntoResponse, AppError> {
    let lesion = owned_lesion(&state, &lesion_id, &user).await?;
    check_request_link(&state, &input, user.id()).await?;

    let report = state.db.create_report(lesion.id, &input).await?;
    Ok((StatusCode::CREATED, Json(report)))
}

pub async fn update_report(
    State(state): State<AppState>,
    user: AuthUser,
    Path((lesion_id, report_id)): Path<(String, String)>,
    ValidJson(input): ValidJson<ReportInput>,
) -> Result<Json<Report>, AppError> {
    let lesion = owned_lesion(&state, &lesion_id, &user).await?;
    let report = owned_report(&state, &lesion, &report_id).await?;
    check_request_link(&state, &input, user.id()).await?;

    let updated = state.db.update_report(report.id, &input).await?;
    Ok(Json(updated))
}

pub async fn delete_report(
    State(state): State<AppState>,
    user: AuthUser,
    Path((lesion_id, report_id)): Path<(String, String)>,
) -> Result<Json<Report>, AppError> {
    let lesion = owned_lesion(&state, &lesion_id, &user).await?;
    let report = owned_report(&state, &lesion, &report_id).await?;
    state.db.delete_report(report.id).await?;
    tracing::info!(report_id = %report.id, lesion_id = %lesion.id, "Report deleted");
    Ok(Json(report))
}

// ============================================================================
// Requests
// ============================================================================

async fn owned_request(state: &AppState, raw_id: &str, user: &AuthUser) -> Result<Request, AppError> {
    let id = parse_id(raw_id)?;
    state
        .db
        .find_owned_request(id, user.id())
        .await?
        .ok_or_else(|| not_found("Request"))
}

pub async fn list_requests(
    State(state): State<AppState>,
    user: AuthUser,
    params: ListParams,
) -> Result<Json<Vec<RequestView>>, AppError> {
    let skip_answer = params.flag("skip_answer");
    let mut query = listings::requests();
    query.owned_by("account_id", user.id())?;
    params.apply(&mut query)?;

    let requests = state.db.list(&query, RequestView::decode).await?;
    Ok(Json(
        requests
            .into_iter()
            .map(|view| view.keep_account(false).skip_answer(skip_answer))
            .collect(),
    ))
}

pub async fn get_request(
    State(state): State<AppState>,
    user: AuthUser,
    Path(request_id): Path<String>,
    params: ListParams,
) -> Result<Json<RequestView>, AppError> {
    let request = owned_request(&state, &request_id, &user).await?;
    let mut view = RequestView::new(request).skip_answer(params.flag("skip_answer"));

    if params.flag("include_reports") {
        let include_lesions = params.flag("include_lesions");
        let mut query = listings::reports().include(LESIONS, include_lesions);
        query.where_eq("request_id", &view.request.id.to_string())?;

        let mut reports: Vec<ReportView> = state
            .db
            .list(&query, ReportView::decode)
            .await?
            .into_iter()
            .map(|report| report.keep(include_lesions, false))
            .collect();
        enrich_reports(&state, &mut reports, ReportExtras::from_params(&params)).await?;
        view.reports = Some(reports);
    }

    Ok(Json(view))
}

pub async fn create_request(
    State(state): State<AppState>,
    user: AuthUser,
    ValidJson(input): ValidJson<RequestInput>,
) -> Result<impl IntoResponse, AppError> {
    let request = state.db.create_request(user.id(), &input.reports).await?;
    Ok((StatusCode::CREATED, Json(request)))
}

pub async fn update_request(
    State(state): State<AppState>,
    user: AuthUser,
    Path(request_id): Path<String>,
    ValidJson(input): ValidJson<RequestUpdateInput>,
) -> Result<Json<Request>, AppError> {
    let request = owned_request(&state, &request_id, &user).await?;
    let updated = state
        .db
        .update_request(&request, input.status, &input.reports)
        .await?;
    Ok(Json(updated))
}

pub async fn delete_request(
    State(state): State<AppState>,
    user: AuthUser,
    Path(request_id): Path<String>,
) -> Result<Json<Request>, AppError> {
    let request = owned_request(&state, &request_id, &user).await?;
    state.db.delete_request(request.id).await?;
    tracing::info!(request_id = %request.id, "Request deleted");
    Ok(Json(request))
}
