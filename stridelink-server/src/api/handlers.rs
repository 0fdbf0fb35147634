//! API handler implementations.

use axum::extract::{Path, Query, State};
use axum::http::{header, HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;

use stridelink_core::{Activity, ActivityPatch, VerifiedIdentity};

use crate::api::server::ApiState;
use crate::api::types::{ApiError, CallbackParams, LoginRequest, LoginResponse};

/// Liveness probe.
pub async fn health() -> Json<serde_json::Value> {
    Json(serde_json::json!({ "status": "ok" }))
}

/// `POST /auth/login` — verify the identity assertion and create the
/// account on first login.
///
/// Idempotent: a repeat login for the same subject leaves the stored
/// profile untouched.
pub async fn login(
    State(state): State<ApiState>,
    Json(request): Json<LoginRequest>,
) -> Result<Json<LoginResponse>, ApiError> {
    let identity = state.verifier.verify(&request.id_token).await?;

    let account = state
        .store
        .upsert_profile(&identity.subject, identity.profile())
        .await?;

    tracing::info!("login for subject {}", identity.subject);

    Ok(Json(LoginResponse {
        subject_id: identity.subject.to_string(),
        linked: account.is_linked(),
    }))
}

/// `GET /auth/provider` — redirect an identity-verified user to the
/// provider's consent screen.
pub async fn begin_provider_auth(
    State(state): State<ApiState>,
    headers: HeaderMap,
) -> Result<Response, ApiError> {
    let identity = verified_identity(&state, &headers).await?;

    // Accounts are born from login; make sure one exists before sending
    // the user off to consent.
    state
        .store
        .upsert_profile(&identity.subject, identity.profile())
        .await?;

    let url = state.auth_flow.begin_authorization(&identity.subject)?;
    Ok(found(url.as_str()))
}

/// `GET /auth/provider/callback` — complete the authorization code
/// exchange and bounce the browser back to the frontend.
///
/// No auth header arrives here; the `state` value is the trust boundary.
/// Failures redirect to the error route with a generic message only.
pub async fn provider_callback(
    State(state): State<ApiState>,
    Query(params): Query<CallbackParams>,
) -> Response {
    let code = params.code.unwrap_or_default();
    let oauth_state = params.state.unwrap_or_default();

    match state.auth_flow.complete_authorization(&code, &oauth_state).await {
        Ok(()) => found(&state.frontend.success_url),
        Err(e) => {
            tracing::error!("provider callback failed: {}", e);
            let url = format!(
                "{}?message=provider_connection_failed",
                state.frontend.error_url
            );
            found(&url)
        }
    }
}

/// `GET /api/activities` — list the caller's activities.
pub async fn list_activities(
    State(state): State<ApiState>,
    headers: HeaderMap,
) -> Result<Json<Vec<Activity>>, ApiError> {
    let identity = verified_identity(&state, &headers).await?;
    let activities = state.activities.list_activities(&identity.subject).await?;
    Ok(Json(activities))
}

/// `PUT /api/activities/:id` — apply a partial update to one activity.
pub async fn update_activity(
    State(state): State<ApiState>,
    Path(activity_id): Path<u64>,
    headers: HeaderMap,
    Json(patch): Json<ActivityPatch>,
) -> Result<Json<Activity>, ApiError> {
    let identity = verified_identity(&state, &headers).await?;
    let updated = state
        .activities
        .update_activity(&identity.subject, activity_id, &patch)
        .await?;
    Ok(Json(updated))
}

/// Verify the `Authorization: Bearer` header on a request.
async fn verified_identity(
    state: &ApiState,
    headers: &HeaderMap,
) -> Result<VerifiedIdentity, ApiError> {
    let value = headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .ok_or_else(ApiError::unauthorized)?;

    let bearer = value
        .strip_prefix("Bearer ")
        .ok_or_else(ApiError::unauthorized)?;

    Ok(state.verifier.verify(bearer).await?)
}

/// A plain 302 redirect.
fn found(location: &str) -> Response {
    (StatusCode::FOUND, [(header::LOCATION, location.to_string())]).into_response()
}
