use serde::{Deserialize, Serialize};
use snapsecret_spec::{Secret, SecretId};
use std::time::Duration;

use crate::error::AppError;

pub const CREATED_MESSAGE: &str = "Successfully created secret";
pub const ACCESSED_MESSAGE: &str = "Secret accessed, it will not be accessible anymore";

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateSecretRequest {
    pub text: String,
    #[serde(default)]
    pub prompt: Option<String>,
    #[serde(default)]
    pub answer: Option<String>,
    /// `"90s"`, `"30m"`, `"1h"`, `"2d"` or `"[d.]hh:mm:ss"`.
    #[serde(default)]
    pub expire_in: Option<String>,
}

impl CreateSecretRequest {
    pub fn into_secret(self) -> Result<Secret, AppError> {
        let expire_in = self
            .expire_in
            .as_deref()
            .filter(|value| !value.trim().is_empty())
            .map(parse_expire_in)
            .transpose()
            .map_err(AppError::invalid_request)?;

        let mut builder = Secret::builder(self.text).maybe_expire_in(expire_in);
        if let Some(prompt) = self.prompt {
            builder = builder.prompt(prompt);
        }
        if let Some(answer) = self.answer {
            builder = builder.answer(answer);
        }
        builder.build().map_err(AppError::from)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateSecretResponse {
    pub id: SecretId,
    pub message: String,
}

impl CreateSecretResponse {
    pub fn new(id: SecretId) -> Self {
        Self {
            id,
            message: CREATED_MESSAGE.to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AccessSecretResponse {
    pub message: String,
    pub secret: String,
}

impl From<Secret> for AccessSecretResponse {
    fn from(secret: Secret) -> Self {
        Self {
            message: ACCESSED_MESSAGE.to_string(),
            secret: secret.into_text(),
        }
    }
}

/// Parses a unit-suffixed duration (`s`, `m`, `h`, `d`) or a `[d.]hh:mm:ss`
/// time span. Zero is rejected later by the secret builder.
pub fn parse_expire_in(raw: &str) -> Result<Duration, String> {
    let value = raw.trim();
    if value.contains(':') {
        return parse_time_span(value);
    }

    let split = value
        .find(|ch: char| !ch.is_ascii_digit())
        .unwrap_or(value.len());
    let (digits, unit) = value.split_at(split);
    let amount: u64 = digits
        .parse()
        .map_err(|_| format!("invalid expireIn `{raw}`"))?;
    let scale = match unit.trim() {
        "" | "s" | "sec" | "secs" => 1,
        "m" | "min" | "mins" => 60,
        "h" | "hr" | "hrs" => 60 * 60,
        "d" | "day" | "days" => 24 * 60 * 60,
        other => return Err(format!("unsupported expireIn unit `{other}`")),
    };
    amount
        .checked_mul(scale)
        .map(Duration::from_secs)
        .ok_or_else(|| format!("expireIn `{raw}` is too large"))
}

fn parse_time_span(value: &str) -> Result<Duration, String> {
    let invalid = || format!("invalid expireIn time span `{value}`");
    let parts: Vec<&str> = value.split(':').collect();
    let [head, minutes, seconds] = parts.as_slice() else {
        return Err(invalid());
    };
    let (days, hours) = match head.split_once('.') {
        Some((days, hours)) => (days, hours),
        None => ("0", *head),
    };

    let field = |text: &str, max: Option<u64>| -> Result<u64, String> {
        let parsed: u64 = text.parse().map_err(|_| invalid())?;
        match max {
            Some(limit) if parsed > limit => Err(invalid()),
            _ => Ok(parsed),
        }
    };
    let days = field(days, None)?;
    let hours = field(hours, Some(23))?;
    let minutes = field(*minutes, Some(59))?;
    let seconds = field(*seconds, Some(59))?;

    days.checked_mul(24 * 60 * 60)
        .and_then(|total| total.checked_add(hours * 60 * 60 + minutes * 60 + seconds))
        .map(Duration::from_secs)
        .ok_or_else(invalid)
}
