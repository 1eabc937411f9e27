use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Longest identifier accepted by every supported backend.
pub const MAX_ID_LEN: usize = 127;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum InvalidSecretId {
    #[error("secret id must not be empty")]
    Empty,
    #[error("secret id exceeds {MAX_ID_LEN} characters")]
    TooLong,
    #[error("secret id contains invalid characters: {0}")]
    InvalidCharacters(String),
}

/// Validate a secret identifier against the shared backend charset.
pub fn validate_id(value: &str) -> Result<(), InvalidSecretId> {
    if value.trim().is_empty() {
        return Err(InvalidSecretId::Empty);
    }

    if value.len() > MAX_ID_LEN {
        return Err(InvalidSecretId::TooLong);
    }

    if !value
        .chars()
        .all(|c| matches!(c, 'a'..='z' | 'A'..='Z' | '0'..='9' | '-'))
    {
        return Err(InvalidSecretId::InvalidCharacters(value.to_string()));
    }

    Ok(())
}

/// Opaque retrieval token for a stored secret.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct SecretId(String);

impl SecretId {
    pub fn new(value: impl Into<String>) -> Result<Self, InvalidSecretId> {
        let value = value.into();
        validate_id(&value)?;
        Ok(Self(value))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SecretId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for SecretId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl FromStr for SecretId {
    type Err = InvalidSecretId;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s)
    }
}

impl TryFrom<String> for SecretId {
    type Error = InvalidSecretId;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<SecretId> for String {
    fn from(value: SecretId) -> Self {
        value.0
    }
}
