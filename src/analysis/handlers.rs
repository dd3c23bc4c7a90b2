use axum::{
    extract::{
        multipart::{MultipartError, MultipartRejection},
        DefaultBodyLimit, Multipart, State,
    },
    http::StatusCode,
    routing::post,
    Json, Router,
};
use tracing::{instrument, warn};

use super::{client::IMAGE_FIELD, dto::TakePictureResponse};
use crate::{allergens, auth::services::AuthUser, error::ApiError, state::AppState};

const MAX_UPLOAD_BYTES: usize = 20 * 1024 * 1024; // 20MB
const DEFAULT_FILENAME: &str = "upload.jpg";

pub fn analysis_routes() -> Router<AppState> {
    Router::new()
        .route("/take-picture", post(take_picture))
        .layer(DefaultBodyLimit::max(MAX_UPLOAD_BYTES))
}

fn no_image() -> ApiError {
    ApiError::Validation("No image uploaded".into())
}

fn multipart_error(e: MultipartError) -> ApiError {
    if e.status() == StatusCode::PAYLOAD_TOO_LARGE {
        warn!("upload exceeds body limit");
        return ApiError::PayloadTooLarge(format!(
            "Image too large (max {} MB)",
            MAX_UPLOAD_BYTES / (1024 * 1024)
        ));
    }
    ApiError::Validation(e.body_text())
}

/// POST /take-picture (multipart, field `image`)
#[instrument(skip(state, auth, multipart))]
pub async fn take_picture(
    State(state): State<AppState>,
    auth: Option<AuthUser>,
    multipart: Result<Multipart, MultipartRejection>,
) -> Result<Json<TakePictureResponse>, ApiError> {
    let mut multipart = multipart.map_err(|_| no_image())?;

    let mut upload = None;
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(multipart_error)?
    {
        if field.name() != Some(IMAGE_FIELD) {
            continue;
        }
        let filename = field
            .file_name()
            .filter(|f| !f.is_empty())
            .unwrap_or(DEFAULT_FILENAME)
            .to_string();
        let content_type = field.content_type().map(str::to_string);
        let data = field
            .bytes()
            .await
            .map_err(multipart_error)?;
        upload = Some((filename, content_type, data));
        break;
    }

    let (filename, content_type, data) = upload.ok_or_else(no_image)?;
    if data.is_empty() {
        return Err(no_image());
    }

    let result = state
        .vision
        .analyze(data, &filename, content_type.as_deref())
        .await?;

    let allergy_report = match auth {
        Some(AuthUser(user_id)) => match state.users.get_by_id(user_id).await {
            Ok(Some(user)) => Some(allergens::check_text(
                state.config.allergy_match,
                &user.allergies,
                &result.analysis,
            )),
            Ok(None) => None,
            Err(e) => {
                warn!(error = %e, %user_id, "profile lookup failed; skipping allergy check");
                None
            }
        },
        None => None,
    };

    Ok(Json(TakePictureResponse {
        success: true,
        result,
        allergy_report,
    }))
}
