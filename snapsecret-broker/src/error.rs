use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::Serialize;
use snapsecret_spec::{ErrorKind, InvalidSecret, SnapSecretError};
use thiserror::Error;

use crate::telemetry::{CORRELATION_ID_HEADER, CorrelationId, correlation_header_value};

#[derive(Debug, Error)]
pub enum AppErrorKind {
    #[error("invalid request: {0}")]
    InvalidRequest(String),
    #[error(transparent)]
    Engine(SnapSecretError),
}

#[derive(Debug, Error)]
#[error("{kind}")]
pub struct AppError {
    kind: AppErrorKind,
    correlation_id: Option<String>,
}

impl AppError {
    pub fn new(kind: AppErrorKind) -> Self {
        Self {
            kind,
            correlation_id: None,
        }
    }

    pub fn invalid_request<T: Into<String>>(message: T) -> Self {
        Self::new(AppErrorKind::InvalidRequest(message.into()))
    }

    pub fn kind(&self) -> &AppErrorKind {
        &self.kind
    }

    pub fn with_correlation(mut self, id: String) -> Self {
        self.correlation_id = Some(id);
        self
    }

    pub fn status(&self) -> StatusCode {
        match &self.kind {
            AppErrorKind::InvalidRequest(_) => StatusCode::BAD_REQUEST,
            AppErrorKind::Engine(err) => match err.kind() {
                ErrorKind::SecretExpiredOrNotFound => StatusCode::NOT_FOUND,
                ErrorKind::ProviderRequestError => StatusCode::BAD_GATEWAY,
                ErrorKind::Unknown => StatusCode::INTERNAL_SERVER_ERROR,
            },
        }
    }

    fn body(&self) -> ErrorBody<'_> {
        match &self.kind {
            AppErrorKind::InvalidRequest(message) => ErrorBody {
                message: Some(message.as_str()),
                error_type: "InvalidRequest",
            },
            AppErrorKind::Engine(err) => ErrorBody {
                message: err.user_message(),
                error_type: err.kind().as_str(),
            },
        }
    }
}

/// Causes never leave the process; only the user message and kind do.
#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct ErrorBody<'a> {
    message: Option<&'a str>,
    error_type: &'a str,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let mut response = (self.status(), Json(self.body())).into_response();
        if let Some(id) = self.correlation_id.as_deref()
            && let Some(value) = correlation_header_value(id)
        {
            response.headers_mut().insert(CORRELATION_ID_HEADER, value);
        }
        response
    }
}

impl From<SnapSecretError> for AppError {
    fn from(value: SnapSecretError) -> Self {
        AppError::new(AppErrorKind::Engine(value))
    }
}

impl From<InvalidSecret> for AppError {
    fn from(value: InvalidSecret) -> Self {
        AppError::invalid_request(value.to_string())
    }
}

pub fn attach_correlation(err: AppError, correlation: &CorrelationId) -> AppError {
    err.with_correlation(correlation.0.clone())
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn render(err: AppError) -> (StatusCode, serde_json::Value) {
        let response = err.into_response();
        let status = response.status();
        let body = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        (status, serde_json::from_slice(&body).unwrap())
    }

    #[tokio::test]
    async fn engine_kinds_map_to_statuses() {
        let cases = [
            (
                SnapSecretError::expired_or_not_found("gone"),
                StatusCode::NOT_FOUND,
            ),
            (
                SnapSecretError::provider_request("vault said no"),
                StatusCode::BAD_GATEWAY,
            ),
            (
                SnapSecretError::unknown("boom"),
                StatusCode::INTERNAL_SERVER_ERROR,
            ),
        ];
        for (err, expected) in cases {
            let (status, _) = render(err.into()).await;
            assert_eq!(status, expected);
        }
    }

    #[tokio::test]
    async fn body_omits_causes() {
        let err = SnapSecretError::provider_request("Failed to get secret abc")
            .with_cause(anyhow::anyhow!("403 caller lacks secrets/get on vault"));
        let (_, body) = render(AppError::from(err)).await;
        assert_eq!(
            body,
            serde_json::json!({
                "message": "Failed to get secret abc",
                "errorType": "ProviderRequestError",
            })
        );
    }

    #[tokio::test]
    async fn invalid_secret_is_bad_request() {
        let err = AppError::from(InvalidSecret::EmptyText)
            .with_correlation("corr-1".to_string());
        let response = err.into_response();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(response.headers()[CORRELATION_ID_HEADER], "corr-1");
    }
}
