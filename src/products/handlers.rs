use axum::{
    extract::{rejection::JsonRejection, Path, State},
    routing::{get, post},
    Json, Router,
};
use tracing::{instrument, warn};

use super::{
    dto::{Product, ProductResponse, TranslateRequest, Translation},
    translate::DEFAULT_TARGET_LANG,
};
use crate::{allergens, auth::services::AuthUser, error::ApiError, state::AppState};

pub fn product_routes() -> Router<AppState> {
    Router::new()
        .route("/products/translate", post(translate))
        .route("/products/:barcode", get(get_product))
        .route("/products/:barcode/similar", get(get_similar))
}

#[instrument(skip(state, auth))]
pub async fn get_product(
    State(state): State<AppState>,
    auth: Option<AuthUser>,
    Path(barcode): Path<String>,
) -> Result<Json<ProductResponse>, ApiError> {
    let product = state.food.fetch_product(&barcode).await?;

    let allergy_report = match auth {
        Some(AuthUser(user_id)) => match state.users.get_by_id(user_id).await {
            Ok(user) => user.map(|u| allergens::check_product(state.config.allergy_match, &u.allergies, &product)),
            Err(e) => {
                warn!(error = %e, %user_id, "profile lookup failed; skipping allergy check");
                None
            }
        },
        None => None,
    };

    Ok(Json(ProductResponse {
        product,
        allergy_report,
    }))
}

#[instrument(skip(state))]
pub async fn get_similar(
    State(state): State<AppState>,
    Path(barcode): Path<String>,
) -> Result<Json<Vec<Product>>, ApiError> {
    let similar = state.food.fetch_similar(&barcode).await?;
    Ok(Json(similar))
}

#[instrument(skip(state, payload))]
pub async fn translate(
    State(state): State<AppState>,
    payload: Result<Json<TranslateRequest>, JsonRejection>,
) -> Result<Json<Translation>, ApiError> {
    let Json(payload) = payload?;
    let text = payload
        .text
        .filter(|t| !t.trim().is_empty())
        .ok_or_else(|| ApiError::Validation("Text is required".into()))?;
    let target = payload
        .target_lang
        .map(|t| t.trim().to_string())
        .filter(|t| !t.is_empty())
        .unwrap_or_else(|| DEFAULT_TARGET_LANG.to_string());

    let translation = state.translator.translate(&text, &target).await?;
    Ok(Json(translation))
}
