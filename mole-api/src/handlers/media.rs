//! Photo upload and download through object storage.
//!
//! Objects live at `<prefix>/<region>:<account_id>/<file_name>` in the
//! photos bucket. Uploads answer with `{status, url|message}` bodies, so
//! their failures bypass the usual error shape.

use axum::{
    extract::{rejection::FormRejection, Path, State},
    http::StatusCode,
    response::{IntoResponse, Redirect, Response},
    Form, Json,
};
use service_core::error::AppError;

use super::parse_id;
use crate::config::StorageConfig;
use crate::dtos::media::valid_file_name;
use crate::dtos::{DataUrl, UploadForm, UploadResponse};
use crate::middleware::AuthUser;
use crate::services::policy::REPORTS_READ;
use crate::services::storage::{ObjectRef, MEDIA_URL_TTL};
use crate::AppState;

pub fn media_object(storage: &StorageConfig, account_id: &str, file_name: &str) -> ObjectRef {
    ObjectRef::new(
        storage.bucket.clone(),
        format!(
            "{}/{}:{}/{}",
            storage.upload_prefix, storage.region, account_id, file_name
        ),
    )
}

pub async fn download(
    State(state): State<AppState>,
    user: AuthUser,
    Path((account_id, file_name)): Path<(String, String)>,
) -> Result<Redirect, AppError> {
    let owner = parse_id(&account_id)?;
    if !valid_file_name(&file_name) {
        return Err(AppError::BadRequest(anyhow::anyhow!("Invalid file name")));
    }

    if owner != user.id() && !state.permissions.lookup(&user.claims.groups, &[REPORTS_READ]) {
        tracing::warn!(
            account_id = %user.id(),
            owner = %owner,
            "Media access to another account denied"
        );
        return Err(AppError::Forbidden(anyhow::anyhow!(
            "Access to this file is not allowed"
        )));
    }

    let object = media_object(&state.config.storage, &owner.to_string(), &file_name);
    let url = state.storage.presign_get(&object, MEDIA_URL_TTL).await?;
    Ok(Redirect::to(&url))
}

fn upload_failed(message: impl Into<String>) -> Response {
    (
        StatusCode::BAD_REQUEST,
        Json(UploadResponse {
            status: StatusCode::BAD_REQUEST.as_u16(),
            url: None,
            message: Some(message.into()),
        }),
    )
        .into_response()
}

pub async fn upload(
    State(state): State<AppState>,
    user: AuthUser,
    form: Result<Form<UploadForm>, FormRejection>,
) -> Response {
    let Form(form) = match form {
        Ok(form) => form,
        Err(rejection) => return upload_failed(rejection.body_text()),
    };

    let caller = user.id().to_string();
    if let Some(account_id) = form.account_id.as_deref().filter(|a| !a.is_empty()) {
        if account_id != caller {
            return upload_failed("account_id does not match the caller");
        }
    }
    if !valid_file_name(&form.file_name) {
        return upload_failed("Invalid file name");
    }

    let image = match DataUrl::parse(&form.file_base64) {
        Ok(image) => image,
        Err(e) => return upload_failed(e.to_string()),
    };

    let object = media_object(&state.config.storage, &caller, &form.file_name);
    if let Err(e) = state
        .storage
        .put(&object, image.bytes, &image.content_type)
        .await
    {
        tracing::error!(object = %object, error = %e, "Upload to object storage failed");
        return upload_failed("Unable to store the file");
    }

    Json(UploadResponse {
        status: StatusCode::OK.as_u16(),
        url: Some(format!("/media/images/{}/{}", caller, form.file_name)),
        message: None,
    })
    .into_response()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn object_key_includes_region_and_account() {
        let storage = StorageConfig {
            region: "us-west-2".to_string(),
            bucket: "molepatrol-photos".to_string(),
            upload_prefix: "private".to_string(),
            endpoint: None,
        };

        let object = media_object(&storage, "acct", "mole.png");
        assert_eq!(object.bucket, "molepatrol-photos");
        assert_eq!(object.key, "private/us-west-2:acct/mole.png");
    }
}
