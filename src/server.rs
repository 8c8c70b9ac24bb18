use std::sync::Arc;

use axum::extract::{Path, Query, Request, State};
use axum::http::StatusCode;
use axum::middleware::{self, Next};
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::{Json, Router};
use serde::Deserialize;
use serde_json::json;
use tower_http::trace::TraceLayer;
use tracing::error;

use crate::config::Config;
use crate::profile::{Profile, ProfileRepository};
use crate::security::api_key_matches;
use crate::translate::{TranslateClient, TranslationResult};
use crate::validator::Validator;

/// Shared handles, constructed once in `main` and injected here.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub repo: ProfileRepository,
    pub validator: Validator<ProfileRepository>,
    pub translate: TranslateClient,
}

/// HTTP boundary errors. Upstream detail is logged, never sent to the client.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("{0}")]
    InvalidInput(String),
    #[error("{0}")]
    NotFound(String),
    #[error("{0}")]
    Conflict(String),
    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            ApiError::InvalidInput(msg) => (StatusCode::BAD_REQUEST, msg),
            ApiError::NotFound(msg) => (StatusCode::NOT_FOUND, msg),
            ApiError::Conflict(msg) => (StatusCode::CONFLICT, msg),
            ApiError::Internal(err) => {
                error!("Request failed: {:#}", err);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Internal server error".to_string(),
                )
            }
        };

        (status, Json(json!({ "error": message }))).into_response()
    }
}

/// Build the application router.
pub fn router(state: AppState) -> Router {
    let api = Router::new()
        .route("/profiles", get(list_profiles).post(create_profile))
        .route("/profiles/check", get(check_profile))
        .route(
            "/profiles/:phone_number",
            get(get_profile).put(update_profile).delete(delete_profile),
        )
        .route("/translate", axum::routing::post(translate))
        .layer(middleware::from_fn_with_state(state.clone(), require_api_key));

    Router::new()
        .route("/health", get(health))
        .nest("/api", api)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Reject /api requests without the expected `X-Api-Key`. Bypassed entirely
/// when no key is configured (local/dev mode).
async fn require_api_key(
    State(state): State<AppState>,
    request: Request,
    next: Next,
) -> Response {
    let Some(expected) = state.config.api_key.as_deref() else {
        return next.run(request).await;
    };

    let presented = request
        .headers()
        .get("x-api-key")
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default();

    if api_key_matches(presented, expected) {
        next.run(request).await
    } else {
        (
            StatusCode::UNAUTHORIZED,
            Json(json!({ "error": "Unauthorized" })),
        )
            .into_response()
    }
}

async fn health() -> Json<serde_json::Value> {
    Json(json!({ "status": "ok" }))
}

// GET /api/profiles
async fn list_profiles(State(state): State<AppState>) -> Result<Json<Vec<Profile>>, ApiError> {
    let profiles = state.repo.list()?;
    Ok(Json(profiles))
}

// POST /api/profiles
//
// The uniqueness checks are advisory; the conditional create is what actually
// rejects a concurrent duplicate phone number.
async fn create_profile(
    State(state): State<AppState>,
    Json(profile): Json<Profile>,
) -> Result<(StatusCode, Json<serde_json::Value>), ApiError> {
    if profile.phone_number.is_empty() {
        return Err(ApiError::InvalidInput("Phone number is required".to_string()));
    }

    if state
        .validator
        .is_handle_used(profile.flex_worker_handle.as_deref())?
    {
        return Err(ApiError::Conflict("Worker handle is already in use".to_string()));
    }

    if !state.repo.create(&profile)? {
        return Err(ApiError::Conflict("Phone number is already in use".to_string()));
    }

    Ok((StatusCode::CREATED, Json(json!({ "success": true }))))
}

// GET /api/profiles/:phone_number
async fn get_profile(
    State(state): State<AppState>,
    Path(phone_number): Path<String>,
) -> Result<Json<Profile>, ApiError> {
    let profile = state
        .repo
        .get(&phone_number)?
        .ok_or_else(|| ApiError::NotFound("Profile not found".to_string()))?;

    Ok(Json(profile))
}

// PUT /api/profiles/:phone_number
async fn update_profile(
    State(state): State<AppState>,
    Path(phone_number): Path<String>,
    Json(profile): Json<Profile>,
) -> Result<Json<serde_json::Value>, ApiError> {
    if profile.phone_number != phone_number {
        return Err(ApiError::InvalidInput("Phone number mismatch".to_string()));
    }

    state.repo.put(&profile)?;
    Ok(Json(json!({ "success": true })))
}

// DELETE /api/profiles/:phone_number
async fn delete_profile(
    State(state): State<AppState>,
    Path(phone_number): Path<String>,
) -> Result<Json<serde_json::Value>, ApiError> {
    state.repo.delete(&phone_number)?;
    Ok(Json(json!({ "success": true })))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CheckParams {
    phone_number: Option<String>,
    handle: Option<String>,
}

// GET /api/profiles/check?phoneNumber=...&handle=...
async fn check_profile(
    State(state): State<AppState>,
    Query(params): Query<CheckParams>,
) -> Result<Json<serde_json::Value>, ApiError> {
    if params.phone_number.is_none() && params.handle.is_none() {
        return Err(ApiError::InvalidInput("Check requires a field".to_string()));
    }

    // Both checks are independent reads; run them concurrently.
    let phone_validator = state.validator.clone();
    let handle_validator = state.validator.clone();
    let phone_number = params.phone_number.clone();
    let handle = params.handle.clone();

    let (phone_number_used, handle_used) = tokio::try_join!(
        tokio::task::spawn_blocking(move || {
            phone_validator.is_phone_number_used(phone_number.as_deref())
        }),
        tokio::task::spawn_blocking(move || handle_validator.is_handle_used(handle.as_deref())),
    )
    .map_err(|e| ApiError::Internal(anyhow::anyhow!("Check task failed: {}", e)))?;

    Ok(Json(json!({
        "phoneNumberUsed": phone_number_used?,
        "handleUsed": handle_used?,
    })))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct TranslateParams {
    text: String,
    source_language_code: String,
    target_language_code: String,
}

// POST /api/translate
async fn translate(
    State(state): State<AppState>,
    Json(params): Json<TranslateParams>,
) -> Result<Json<TranslationResult>, ApiError> {
    if params.text.is_empty() {
        return Err(ApiError::InvalidInput("Text is required".to_string()));
    }

    let result = state
        .translate
        .translate(
            &params.text,
            &params.source_language_code,
            &params.target_language_code,
        )
        .await?;

    Ok(Json(result))
}
