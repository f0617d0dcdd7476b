//! Body parts and questionnaire: public listings, administrator writes.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use service_core::error::AppError;

use super::{not_found, parse_id};
use crate::dtos::{BodyPartInput, QuestionInput, ValidJson};
use crate::models::{BodyPart, Entity, Question};
use crate::query::{listings, ListParams, ListQuery};
use crate::AppState;

/// `displayed=true|false` narrows the list; any other value is ignored.
fn displayed_only(query: &mut ListQuery, params: &ListParams) -> Result<(), AppError> {
    if let Some(value @ ("true" | "false")) = params.get("displayed") {
        query.where_eq("displayed", value)?;
    }
    Ok(())
}

pub async fn list_body_parts(
    State(state): State<AppState>,
    params: ListParams,
) -> Result<Json<Vec<BodyPart>>, AppError> {
    let mut query = listings::body_parts()?;
    displayed_only(&mut query, &params)?;
    params.apply(&mut query)?;

    let body_parts = state.db.list(&query, |row, _| BodyPart::decode(row, "")).await?;
    Ok(Json(body_parts))
}

pub async fn create_body_part(
    State(state): State<AppState>,
    ValidJson(input): ValidJson<BodyPartInput>,
) -> Result<impl IntoResponse, AppError> {
    let body_part = state.db.create_body_part(&input).await?;
    tracing::info!(body_part_id = %body_part.id, "Body part created");
    Ok((StatusCode::CREATED, Json(body_part)))
}

pub async fn update_body_part(
    State(state): State<AppState>,
    Path(id): Path<String>,
    ValidJson(input): ValidJson<BodyPartInput>,
) -> Result<Json<BodyPart>, AppError> {
    let id = parse_id(&id)?;
    let body_part = state
        .db
        .update_body_part(id, &input)
        .await?
        .ok_or_else(|| not_found("Body part"))?;
    Ok(Json(body_part))
}

pub async fn delete_body_part(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<BodyPart>, AppError> {
    let id = parse_id(&id)?;
    let body_part = state
        .db
        .delete_body_part(id)
        .await?
        .ok_or_else(|| not_found("Body part"))?;
    tracing::info!(body_part_id = %id, "Body part deleted");
    Ok(Json(body_part))
}

pub async fn list_questions(
    State(state): State<AppState>,
    params: ListParams,
) -> Result<Json<Vec<Question>>, AppError> {
    let mut query = listings::questions()?;
    displayed_only(&mut query, &params)?;
    params.apply(&mut query)?;

    let questions = state.db.list(&query, |row, _| Question::decode(row, "")).await?;
    Ok(Json(questions))
}

pub async fn create_question(
    State(state): State<AppState>,
    ValidJson(input): ValidJson<QuestionInput>,
) -> Result<impl IntoResponse, AppError> {
    let question = state.db.create_question(&input).await?;
    tracing::info!(question_id = %question.id, "Question created");
    Ok((StatusCode::CREATED, Json(question)))
}

pub async fn update_question(
    State(state): State<AppState>,
    Path(id): Path<String>,
    ValidJson(input): ValidJson<QuestionInput>,
) -> Result<Json<Question>, AppError> {
    let id = parse_id(&id)?;
    let question = state
        .db
        .update_question(id, &input)
        .await?
        .ok_or_else(|| not_found("Question"))?;
    Ok(Json(question))
}

pub async fn delete_question(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<Question>, AppError> {
    let id = parse_id(&id)?;
    let question = state
        .db
        .delete_question(id)
        .await?
        .ok_or_else(|| not_found("Question"))?;
    tracing::info!(question_id = %id, "Question deleted");
    Ok(Json(question))
}
