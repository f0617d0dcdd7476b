pub mod catalog;
pub mod media;
pub mod records;

pub use catalog::{BodyPartInput, QuestionInput};
pub use media::{DataUrl, UploadForm, UploadResponse};
pub use records::{
    AnswerInput, LesionInput, ReportInput, RequestInput, RequestUpdateInput, RespondInput,
    RespondReportInput,
};

use axum::{
    async_trait,
    extract::{rejection::JsonRejection, FromRequest, Request},
};
use serde::de::DeserializeOwned;
use service_core::error::AppError;
use validator::Validate;

/// JSON body that is deserialized and validated before the handler runs.
/// Malformed JSON and failed validation are both client errors.
pub struct ValidJson<T>(pub T);

#[async_trait]
impl<S, T> FromRequest<S> for ValidJson<T>
where
    S: Send + Sync,
    T: DeserializeOwned + Validate,
{
    type Rejection = AppError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let axum::Json(value) = axum::Json::<T>::from_request(req, state)
            .await
            .map_err(|e: JsonRejection| {
                AppError::BadRequest(anyhow::anyhow!("Invalid JSON input: {}", e.body_text()))
            })?;
        value.validate()?;
        Ok(ValidJson(value))
    }
}
