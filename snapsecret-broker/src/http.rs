use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, State};
use axum::http::{HeaderMap, StatusCode, header};
use axum::middleware;
use axum::response::IntoResponse;
use axum::{Extension, Json, Router, routing::get, routing::post};
use snapsecret_spec::{SecretId, SnapSecretError};
use tracing::{Instrument, debug};

use crate::error::{AppError, attach_correlation};
use crate::models::{AccessSecretResponse, CreateSecretRequest, CreateSecretResponse};
use crate::state::AppState;
use crate::telemetry::{CorrelationId, correlation_layer, request_span};

pub const SECRETS_PATH: &str = "/v1/secrets";
const MALFORMED_ID_MESSAGE: &str =
    "Failed to get secret. Secret is either expired or does not exist.";

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/healthz", get(health_check))
        .route(SECRETS_PATH, post(create_secret))
        .route("/v1/secrets/{id}", post(access_secret))
        .layer(middleware::from_fn(correlation_layer))
        .with_state(state)
}

async fn health_check() -> impl IntoResponse {
    (StatusCode::OK, Json(serde_json::json!({ "status": "ok" })))
}

async fn create_secret(
    State(state): State<AppState>,
    Extension(correlation): Extension<CorrelationId>,
    headers: HeaderMap,
    payload: Result<Json<CreateSecretRequest>, JsonRejection>,
) -> Result<impl IntoResponse, AppError> {
    let span = request_span("http.create", &correlation.0);
    async move {
        let Json(request) =
            payload.map_err(|rejection| AppError::invalid_request(rejection.body_text()))?;
        let secret = request.into_secret()?;
        let id = state.engine.submit(secret).await?;
        debug!(secret_id = %id, "secret created");

        let location = secret_location(&headers, &id);
        Ok::<_, AppError>((
            StatusCode::CREATED,
            [(header::LOCATION, location)],
            Json(CreateSecretResponse::new(id)),
        ))
    }
    .instrument(span)
    .await
    .map_err(|err| attach_correlation(err, &correlation))
}

async fn access_secret(
    State(state): State<AppState>,
    Extension(correlation): Extension<CorrelationId>,
    Path(raw_id): Path<String>,
) -> Result<impl IntoResponse, AppError> {
    let span = request_span("http.access", &correlation.0);
    async move {
        // Malformed ids answer like unknown ones, without echoing the input.
        let id = SecretId::new(raw_id)
            .map_err(|_| SnapSecretError::expired_or_not_found(MALFORMED_ID_MESSAGE))?;
        let secret = state.engine.access(&id).await?;
        Ok::<_, AppError>(Json(AccessSecretResponse::from(secret)))
    }
    .instrument(span)
    .await
    .map_err(|err| attach_correlation(err, &correlation))
}

/// `{scheme}://{host}/v1/secrets/{id}`, or a relative path without a `Host`.
fn secret_location(headers: &HeaderMap, id: &SecretId) -> String {
    let path = format!("{SECRETS_PATH}/{id}");
    let host = headers
        .get(header::HOST)
        .and_then(|value| value.to_str().ok())
        .filter(|value| !value.is_empty());
    let Some(host) = host else {
        return path;
    };
    let scheme = headers
        .get("x-forwarded-proto")
        .and_then(|value| value.to_str().ok())
        .filter(|value| matches!(*value, "http" | "https"))
        .unwrap_or("http");
    format!("{scheme}://{host}{path}")
}
