use anyhow::{Context, Result};
use serde::Deserialize;
use std::time::{Duration, Instant};
use tokio::sync::Mutex;

const TOKEN_ENDPOINT_TEMPLATE: &str =
    "https://login.microsoftonline.com/{tenant}/oauth2/v2.0/token";
pub const DEFAULT_SCOPE: &str = "https://vault.azure.net/.default";

/// Service principal used for the OAuth2 client credentials flow.
#[derive(Clone)]
pub struct KvAuthConfig {
    pub tenant_id: String,
    pub client_id: String,
    pub client_secret: String,
    pub scope: String,
}

impl KvAuthConfig {
    pub fn from_env() -> Result<Self> {
        let tenant_id =
            std::env::var("AZURE_TENANT_ID").context("missing AZURE_TENANT_ID for Azure auth")?;
        let client_id =
            std::env::var("AZURE_CLIENT_ID").context("missing AZURE_CLIENT_ID for Azure auth")?;
        let client_secret = std::env::var("AZURE_CLIENT_SECRET")
            .context("missing AZURE_CLIENT_SECRET for Azure auth")?;
        let scope = std::env::var("AZURE_KV_SCOPE")
            .ok()
            .filter(|value| !value.trim().is_empty())
            .unwrap_or_else(|| DEFAULT_SCOPE.to_string());

        Ok(Self {
            tenant_id,
            client_id,
            client_secret,
            scope,
        })
    }
}

impl std::fmt::Debug for KvAuthConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KvAuthConfig")
            .field("tenant_id", &self.tenant_id)
            .field("client_id", &self.client_id)
            .field("client_secret", &"<redacted>")
            .field("scope", &self.scope)
            .finish()
    }
}

/// How requests to the vault are authorized.
#[derive(Clone)]
pub enum AzureCredentials {
    ClientSecret(KvAuthConfig),
    /// Pre-issued bearer token, e.g. from `az account get-access-token` or an emulator.
    StaticToken(String),
}

impl std::fmt::Debug for AzureCredentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AzureCredentials::ClientSecret(config) => {
                f.debug_tuple("ClientSecret").field(config).finish()
            }
            AzureCredentials::StaticToken(_) => f.write_str("StaticToken(<redacted>)"),
        }
    }
}

#[derive(Debug, Clone, thiserror::Error)]
pub enum AuthError {
    #[error("token endpoint rejected the request: {status} {body}")]
    Unauthorized {
        status: reqwest::StatusCode,
        body: String,
    },
    #[error("failed to request token: {0}")]
    Request(String),
    #[error("failed to parse token response: {0}")]
    Parse(String),
}

#[derive(Debug)]
pub struct AccessToken {
    pub token: String,
    pub expires_in: Duration,
}

pub async fn request_access_token(
    client: &reqwest::Client,
    cfg: &KvAuthConfig,
) -> Result<AccessToken, AuthError> {
    let url = TOKEN_ENDPOINT_TEMPLATE.replace("{tenant}", &cfg.tenant_id);
    let params = [
        ("client_id", cfg.client_id.as_str()),
        ("client_secret", cfg.client_secret.as_str()),
        ("scope", cfg.scope.as_str()),
        ("grant_type", "client_credentials"),
    ];

    let response = client
        .post(url)
        .form(&params)
        .send()
        .await
        .map_err(|err| AuthError::Request(err.to_string()))?;

    if !response.status().is_success() {
        let status = response.status();
        let body = response.text().await.unwrap_or_default();
        return Err(AuthError::Unauthorized { status, body });
    }

    let payload: TokenResponse = response
        .json()
        .await
        .map_err(|err| AuthError::Parse(err.to_string()))?;

    Ok(AccessToken {
        token: payload.access_token,
        expires_in: cache_lifetime(payload.expires_in),
    })
}

/// Refresh a minute early, but never cache for less than a minute.
fn cache_lifetime(expires_in: Option<u32>) -> Duration {
    let secs = expires_in.unwrap_or(3600).saturating_sub(60).max(60);
    Duration::from_secs(u64::from(secs))
}

#[derive(Deserialize)]
struct TokenResponse {
    access_token: String,
    #[serde(default)]
    expires_in: Option<u32>,
}

struct TokenCache {
    token: String,
    expires_at: Instant,
}

/// Produces `Authorization` header values, caching client-credential tokens
/// until shortly before they expire.
pub(crate) struct AzureAuth {
    cache: Mutex<Option<TokenCache>>,
    credentials: AzureCredentials,
}

impl AzureAuth {
    pub(crate) fn new(credentials: AzureCredentials) -> Self {
        match &credentials {
            AzureCredentials::ClientSecret(config) => tracing::info!(
                tenant_id = %config.tenant_id,
                scope = %config.scope,
                "azure credential: client secret"
            ),
            AzureCredentials::StaticToken(_) => {
                tracing::info!("azure credential: static bearer token")
            }
        }
        Self {
            cache: Mutex::new(None),
            credentials,
        }
    }

    pub(crate) async fn header(&self, http: &reqwest::Client) -> Result<String, AuthError> {
        let config = match &self.credentials {
            AzureCredentials::StaticToken(token) => return Ok(bearer_header(token)),
            AzureCredentials::ClientSecret(config) => config,
        };

        let mut guard = self.cache.lock().await;
        if let Some(cache) = guard.as_ref()
            && Instant::now() < cache.expires_at
        {
            return Ok(bearer_header(&cache.token));
        }

        let token = request_access_token(http, config).await?;
        let header = bearer_header(&token.token);
        *guard = Some(TokenCache {
            token: token.token,
            expires_at: Instant::now() + token.expires_in,
        });
        Ok(header)
    }

    pub(crate) fn scope_hint(&self) -> &str {
        match &self.credentials {
            AzureCredentials::ClientSecret(config) => config.scope.as_str(),
            AzureCredentials::StaticToken(_) => "static token",
        }
    }
}

pub(crate) fn bearer_header(token: &str) -> String {
    let trimmed = token.trim();
    if trimmed.to_ascii_lowercase().starts_with("bearer ") {
        trimmed.to_string()
    } else {
        format!("Bearer {trimmed}")
    }
}
