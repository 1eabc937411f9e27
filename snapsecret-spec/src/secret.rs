use crate::id::{InvalidSecretId, SecretId};
use std::fmt;
use std::time::Duration;
use thiserror::Error;

/// Longest expiry a submitted secret may ask for.
pub const MAX_EXPIRE_IN: Duration = Duration::from_secs(90 * 24 * 60 * 60);

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum InvalidSecret {
    #[error("secret text must not be empty")]
    EmptyText,
    #[error(transparent)]
    Id(#[from] InvalidSecretId),
    #[error("expiry must be greater than zero")]
    ZeroExpiry,
    #[error("expiry must not exceed 90 days")]
    ExpiryTooLong,
}

/// Immutable text secret plus its advisory metadata.
///
/// `prompt` and `answer` travel with the payload but are never enforced by
/// the lifecycle engine.
#[derive(Clone, PartialEq, Eq)]
pub struct Secret {
    id: Option<SecretId>,
    text: String,
    prompt: Option<String>,
    answer: Option<String>,
    expire_in: Option<Duration>,
}

impl Secret {
    /// Plain secret with no id, prompt or explicit expiry.
    pub fn new(text: impl Into<String>) -> Result<Self, InvalidSecret> {
        Self::builder(text).build()
    }

    pub fn builder(text: impl Into<String>) -> SecretBuilder {
        SecretBuilder {
            text: text.into(),
            id: None,
            prompt: None,
            answer: None,
            expire_in: None,
        }
    }

    pub fn id(&self) -> Option<&SecretId> {
        self.id.as_ref()
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn prompt(&self) -> Option<&str> {
        self.prompt.as_deref()
    }

    pub fn answer(&self) -> Option<&str> {
        self.answer.as_deref()
    }

    pub fn expire_in(&self) -> Option<Duration> {
        self.expire_in
    }

    /// Expiry to apply when storing, falling back to the store default.
    pub fn expire_in_or(&self, default: Duration) -> Duration {
        self.expire_in.unwrap_or(default)
    }

    /// Returns a copy carrying `id`. An id that is already set is kept.
    pub fn with_assigned_id(&self, id: SecretId) -> Self {
        let mut assigned = self.clone();
        if assigned.id.is_none() {
            assigned.id = Some(id);
        }
        assigned
    }

    pub fn into_text(self) -> String {
        self.text
    }
}

impl fmt::Debug for Secret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Secret")
            .field("id", &self.id)
            .field("text", &"<redacted>")
            .field("prompt", &self.prompt)
            .field("answer", &self.answer.as_ref().map(|_| "<redacted>"))
            .field("expire_in", &self.expire_in)
            .finish()
    }
}

/// Named optional fields for [`Secret`] construction.
#[derive(Debug, Clone)]
#[must_use]
pub struct SecretBuilder {
    text: String,
    id: Option<String>,
    prompt: Option<String>,
    answer: Option<String>,
    expire_in: Option<Duration>,
}

impl SecretBuilder {
    /// Caller-chosen identifier, e.g. an identity-linked token.
    pub fn id(mut self, id: impl Into<String>) -> Self {
        self.id = Some(id.into());
        self
    }

    pub fn prompt(mut self, prompt: impl Into<String>) -> Self {
        self.prompt = Some(prompt.into());
        self
    }

    pub fn answer(mut self, answer: impl Into<String>) -> Self {
        self.answer = Some(answer.into());
        self
    }

    pub fn expire_in(mut self, expire_in: Duration) -> Self {
        self.expire_in = Some(expire_in);
        self
    }

    pub fn maybe_expire_in(mut self, expire_in: Option<Duration>) -> Self {
        self.expire_in = expire_in;
        self
    }

    pub fn build(self) -> Result<Secret, InvalidSecret> {
        if self.text.is_empty() {
            return Err(InvalidSecret::EmptyText);
        }
        if self.expire_in.is_some_and(|value| value.is_zero()) {
            return Err(InvalidSecret::ZeroExpiry);
        }
        if self.expire_in.is_some_and(|value| value > MAX_EXPIRE_IN) {
            return Err(InvalidSecret::ExpiryTooLong);
        }
        let id = self.id.map(SecretId::new).transpose()?;

        Ok(Secret {
            id,
            text: self.text,
            prompt: self.prompt.filter(|value| !value.is_empty()),
            answer: self.answer.filter(|value| !value.is_empty()),
            expire_in: self.expire_in,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_text_is_rejected() {
        assert_eq!(Secret::new(""), Err(InvalidSecret::EmptyText));
    }

    #[test]
    fn builder_sets_optional_fields() {
        let secret = Secret::builder("hunter2")
            .prompt("favourite colour?")
            .answer("teal")
            .expire_in(Duration::from_secs(90))
            .build()
            .unwrap();

        assert_eq!(secret.text(), "hunter2");
        assert_eq!(secret.prompt(), Some("favourite colour?"));
        assert_eq!(secret.answer(), Some("teal"));
        assert_eq!(secret.expire_in(), Some(Duration::from_secs(90)));
        assert!(secret.id().is_none());
    }

    #[test]
    fn assigned_id_does_not_replace_existing() {
        let secret = Secret::builder("token").id("user-42").build().unwrap();
        let reassigned = secret.with_assigned_id(SecretId::new("other").unwrap());
        assert_eq!(reassigned.id().map(SecretId::as_str), Some("user-42"));

        let anonymous = Secret::new("token").unwrap();
        let assigned = anonymous.with_assigned_id(SecretId::new("fresh").unwrap());
        assert_eq!(assigned.id().map(SecretId::as_str), Some("fresh"));
        assert!(anonymous.id().is_none());
    }

    #[test]
    fn debug_redacts_payload() {
        let secret = Secret::builder("s3cr3t").answer("blue").build().unwrap();
        let rendered = format!("{secret:?}");
        assert!(!rendered.contains("s3cr3t"));
        assert!(!rendered.contains("blue"));
    }

    #[test]
    fn zero_expiry_is_rejected() {
        let err = Secret::builder("x").expire_in(Duration::ZERO).build();
        assert_eq!(err, Err(InvalidSecret::ZeroExpiry));
    }

    #[test]
    fn expiry_is_capped() {
        let at_limit = Secret::builder("x").expire_in(MAX_EXPIRE_IN).build();
        assert!(at_limit.is_ok());

        let beyond = Secret::builder("x")
            .expire_in(MAX_EXPIRE_IN + Duration::from_secs(1))
            .build();
        assert_eq!(beyond, Err(InvalidSecret::ExpiryTooLong));
    }
}
