use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// Result alias for lifecycle and store operations.
pub type Result<T> = core::result::Result<T, SnapSecretError>;

/// Externally visible failure families.
///
/// `SecretExpiredOrNotFound` deliberately covers "never existed", "already
/// consumed" and "timed out" so callers cannot tell which one applied.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ErrorKind {
    /// The backend was reachable but refused or failed a well-formed request.
    ProviderRequestError,
    /// The id is unknown, already consumed, or past its expiry.
    SecretExpiredOrNotFound,
    /// Anything else. Always carries the original cause.
    Unknown,
}

impl ErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorKind::ProviderRequestError => "ProviderRequestError",
            ErrorKind::SecretExpiredOrNotFound => "SecretExpiredOrNotFound",
            ErrorKind::Unknown => "Unknown",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Canonical error surface shared by stores, the engine and adapters.
///
/// `Display` renders the kind and the user message only. Causes are kept for
/// diagnostics and must never be written into a response body.
#[derive(Debug, Error)]
#[error("{kind}: {}", .user_message.as_deref().unwrap_or("no details available"))]
pub struct SnapSecretError {
    kind: ErrorKind,
    user_message: Option<String>,
    causes: Vec<anyhow::Error>,
}

impl SnapSecretError {
    pub fn new(kind: ErrorKind) -> Self {
        Self {
            kind,
            user_message: None,
            causes: Vec::new(),
        }
    }

    pub fn provider_request<T: Into<String>>(message: T) -> Self {
        Self::new(ErrorKind::ProviderRequestError).with_user_message(message)
    }

    pub fn expired_or_not_found<T: Into<String>>(message: T) -> Self {
        Self::new(ErrorKind::SecretExpiredOrNotFound).with_user_message(message)
    }

    pub fn unknown<T: Into<String>>(message: T) -> Self {
        Self::new(ErrorKind::Unknown).with_user_message(message)
    }

    pub fn with_user_message<T: Into<String>>(mut self, message: T) -> Self {
        self.user_message = Some(message.into());
        self
    }

    pub fn with_cause<E: Into<anyhow::Error>>(mut self, cause: E) -> Self {
        self.causes.push(cause.into());
        self
    }

    pub fn kind(&self) -> ErrorKind {
        self.kind
    }

    pub fn user_message(&self) -> Option<&str> {
        self.user_message.as_deref()
    }

    pub fn causes(&self) -> &[anyhow::Error] {
        &self.causes
    }

    /// User-safe projection for transport adapters.
    pub fn to_response(&self) -> ErrorResponse {
        ErrorResponse {
            message: self.user_message.clone(),
            error_type: self.kind,
        }
    }
}

/// Body rendered by adapters for any failed operation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ErrorResponse {
    pub message: Option<String>,
    pub error_type: ErrorKind,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_hides_causes() {
        let err = SnapSecretError::provider_request("Failed to get secret")
            .with_cause(anyhow::anyhow!("403 Forbidden: caller lacks get permission"));
        let rendered = err.to_string();
        assert_eq!(rendered, "ProviderRequestError: Failed to get secret");
        assert!(!rendered.contains("403"));
        assert_eq!(err.causes().len(), 1);
    }

    #[test]
    fn response_omits_causes() {
        let err = SnapSecretError::unknown("Failed to expire secret")
            .with_cause(anyhow::anyhow!("connection reset by peer"));
        let body = serde_json::to_value(err.to_response()).unwrap();
        assert_eq!(
            body,
            serde_json::json!({
                "message": "Failed to expire secret",
                "errorType": "Unknown",
            })
        );
    }

    #[test]
    fn kind_without_message_still_displays() {
        let err = SnapSecretError::new(ErrorKind::SecretExpiredOrNotFound);
        assert_eq!(err.kind(), ErrorKind::SecretExpiredOrNotFound);
        assert_eq!(
            err.to_string(),
            "SecretExpiredOrNotFound: no details available"
        );
    }
}
