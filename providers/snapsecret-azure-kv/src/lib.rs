//! Azure Key Vault store backed by the live REST API.
//!
//! Every SnapSecret maps to one Key Vault secret named after its id. The
//! plaintext is the secret value, the expiry is the native `exp` attribute
//! and prompt/answer travel as tags, all written by a single `PUT`. Deletes
//! are followed by a purge of the soft-deleted copy. Authentication uses the
//! OAuth2 client credentials flow or a static bearer token.

mod auth;

pub use auth::{AuthError, AzureCredentials, DEFAULT_SCOPE, KvAuthConfig};

use anyhow::{Context, anyhow};
use async_trait::async_trait;
use auth::AzureAuth;
use reqwest::{Client, Method, Response, StatusCode};
use serde::Deserialize;
use serde_json::{Map, Value, json};
use snapsecret_spec::{
    DEFAULT_EXPIRE_IN, DeleteOutcome, ErrorKind, ResultExt, Secret, SecretId, SecretsStore,
    SnapSecretError,
};
use std::collections::HashMap;
use std::env;
use std::sync::Arc;
use std::time::{Duration, SystemTime, UNIX_EPOCH};
use tracing::{debug, error, info, warn};
use uuid::Uuid;

const SECRETS_API_VERSION: &str = "7.4";
const CONTENT_TYPE: &str = "text/plain";
const PROMPT_TAG: &str = "prompt";
const ANSWER_TAG: &str = "answer";

pub const DEFAULT_TIMEOUT_SECS: u64 = 15;
pub const DEFAULT_PURGE_POLL_ATTEMPTS: u32 = 10;
pub const DEFAULT_PURGE_POLL_INTERVAL: Duration = Duration::from_millis(500);

/// Connection settings for [`AzureKeyVaultStore`].
#[derive(Clone, Debug)]
pub struct AzureKeyVaultConfig {
    pub vault_url: String,
    pub credentials: AzureCredentials,
    pub http_timeout: Duration,
    /// Expiry applied to secrets submitted without one.
    pub default_expire_in: Duration,
    pub purge_poll_attempts: u32,
    pub purge_poll_interval: Duration,
    /// Accept self-signed certificates, e.g. for a local emulator.
    pub tls_insecure_skip_verify: bool,
}

impl AzureKeyVaultConfig {
    pub fn new(vault_url: impl Into<String>, credentials: AzureCredentials) -> Self {
        let vault_url = vault_url.into().trim().trim_end_matches('/').to_string();
        Self {
            tls_insecure_skip_verify: uri_uses_loopback_host(&vault_url),
            vault_url,
            credentials,
            http_timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
            default_expire_in: DEFAULT_EXPIRE_IN,
            purge_poll_attempts: DEFAULT_PURGE_POLL_ATTEMPTS,
            purge_poll_interval: DEFAULT_PURGE_POLL_INTERVAL,
        }
    }

    /// Build the whole configuration from process environment.
    pub fn from_env() -> anyhow::Result<Self> {
        let vault_url = env::var("SNAPSECRET_AZURE_VAULT_URL")
            .or_else(|_| env::var("AZURE_KEYVAULT_URL"))
            .context("set SNAPSECRET_AZURE_VAULT_URL (or AZURE_KEYVAULT_URL) with your Key Vault URL")?;
        let credentials = Self::credentials_from_env(&vault_url)?;
        let mut config = Self::new(vault_url, credentials);

        if let Some(secs) = env::var("SNAPSECRET_AZURE_HTTP_TIMEOUT_SECS")
            .ok()
            .and_then(|value| value.trim().parse::<u64>().ok())
            .filter(|secs| *secs > 0)
        {
            config.http_timeout = Duration::from_secs(secs);
        }
        if let Ok(value) = env::var("AZURE_KEYVAULT_INSECURE_SKIP_VERIFY")
            && !value.trim().is_empty()
        {
            config.tls_insecure_skip_verify =
                matches!(value.trim().to_ascii_lowercase().as_str(), "1" | "true");
        }
        Ok(config)
    }

    /// Static token first, then the service principal variables. A loopback
    /// vault without either falls back to the emulator token.
    pub fn credentials_from_env(vault_url: &str) -> anyhow::Result<AzureCredentials> {
        let static_token = env::var("SNAPSECRET_AZURE_BEARER_TOKEN")
            .or_else(|_| env::var("AZURE_KEYVAULT_BEARER_TOKEN"))
            .ok()
            .map(|value| value.trim().to_string())
            .filter(|value| !value.is_empty());

        if let Some(token) = static_token {
            return Ok(AzureCredentials::StaticToken(token));
        }
        if uri_uses_loopback_host(vault_url) {
            return Ok(AzureCredentials::StaticToken("emulator".to_string()));
        }
        let config = KvAuthConfig::from_env().context(
            "set AZURE_TENANT_ID, AZURE_CLIENT_ID, and AZURE_CLIENT_SECRET (or SNAPSECRET_AZURE_BEARER_TOKEN) to authenticate against Azure Key Vault",
        )?;
        Ok(AzureCredentials::ClientSecret(config))
    }

    fn secret_url(&self, id: &SecretId) -> String {
        format!(
            "{}/secrets/{id}?api-version={SECRETS_API_VERSION}",
            self.vault_url
        )
    }

    fn deleted_secret_url(&self, id: &SecretId) -> String {
        format!(
            "{}/deletedsecrets/{id}?api-version={SECRETS_API_VERSION}",
            self.vault_url
        )
    }
}

fn uri_uses_loopback_host(uri: &str) -> bool {
    let lower = uri.to_ascii_lowercase();
    lower.contains("127.0.0.1") || lower.contains("localhost") || lower.contains("[::1]")
}

/// Failures talking to the vault, before they are projected onto
/// [`SnapSecretError`].
#[derive(Debug, thiserror::Error)]
enum KvError {
    #[error("key vault returned {status}: {body}")]
    Status { status: StatusCode, body: String },
    #[error("{0}")]
    Unauthorized(String),
    #[error("secret {0} already exists")]
    AlreadyExists(SecretId),
    #[error("key vault request failed: {0}")]
    Transport(#[from] reqwest::Error),
    #[error(transparent)]
    Auth(#[from] AuthError),
    #[error("failed to decode key vault response: {0}")]
    Decode(String),
    #[error("deleted secret {id} was not purged after {attempts} attempts")]
    PurgePending { id: SecretId, attempts: u32 },
}

impl KvError {
    /// The vault answered and refused: provider error. Everything else: unknown.
    fn kind(&self) -> ErrorKind {
        match self {
            KvError::Status { .. }
            | KvError::Unauthorized(_)
            | KvError::AlreadyExists(_)
            | KvError::Auth(AuthError::Unauthorized { .. }) => ErrorKind::ProviderRequestError,
            KvError::Transport(_)
            | KvError::Auth(_)
            | KvError::Decode(_)
            | KvError::PurgePending { .. } => ErrorKind::Unknown,
        }
    }

    fn into_error(self, provider_message: String, unknown_message: String) -> SnapSecretError {
        let message = match self.kind() {
            ErrorKind::ProviderRequestError => provider_message,
            _ => unknown_message,
        };
        SnapSecretError::new(self.kind())
            .with_user_message(message)
            .with_cause(self)
    }

    async fn from_response(response: Response) -> Self {
        let status = response.status();
        let body = response.text().await.unwrap_or_default();
        KvError::Status { status, body }
    }
}

#[derive(Debug, Default, Deserialize)]
struct SecretAttributes {
    #[serde(default)]
    enabled: Option<bool>,
    #[serde(default)]
    exp: Option<i64>,
    #[serde(default)]
    nbf: Option<i64>,
}

#[derive(Debug, Deserialize)]
struct SecretBundle {
    value: Option<String>,
    #[serde(default)]
    attributes: SecretAttributes,
    #[serde(default)]
    tags: HashMap<String, String>,
}

impl SecretBundle {
    /// Missing `exp` means the secret never expires. `exp` and `nbf` are
    /// unix seconds; `now_ms` is unix milliseconds.
    fn is_live(&self, now_ms: i64) -> bool {
        let attrs = &self.attributes;
        attrs.enabled != Some(false)
            && attrs.exp.is_none_or(|exp| now_ms < exp.saturating_mul(1000))
            && attrs.nbf.is_none_or(|nbf| nbf.saturating_mul(1000) <= now_ms)
    }

    fn into_secret(mut self, id: &SecretId, now_ms: i64) -> Result<Secret, KvError> {
        let text = self
            .value
            .take()
            .ok_or_else(|| KvError::Decode(format!("secret {id} has no value")))?;
        let remaining = self
            .attributes
            .exp
            .and_then(|exp| u64::try_from(exp.saturating_mul(1000) - now_ms).ok())
            .filter(|millis| *millis > 0)
            .map(Duration::from_millis);

        let mut builder = Secret::builder(text)
            .id(id.as_str())
            .maybe_expire_in(remaining);
        if let Some(prompt) = self.tags.remove(PROMPT_TAG) {
            builder = builder.prompt(prompt);
        }
        if let Some(answer) = self.tags.remove(ANSWER_TAG) {
            builder = builder.answer(answer);
        }
        builder
            .build()
            .map_err(|err| KvError::Decode(format!("secret {id}: {err}")))
    }
}

fn unix_now_ms() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|elapsed| i64::try_from(elapsed.as_millis()).unwrap_or(i64::MAX))
        .unwrap_or_default()
}

/// Key Vault `exp` in unix seconds. The deadline `now_ms + expire_in` is
/// rounded up to the next whole second.
fn expiry_timestamp(now_ms: i64, expire_in: Duration) -> i64 {
    let mut millis = expire_in.as_millis();
    if expire_in.subsec_nanos() % 1_000_000 > 0 {
        millis += 1;
    }
    let deadline = now_ms.saturating_add(i64::try_from(millis).unwrap_or(i64::MAX));
    deadline.saturating_add(999) / 1000
}

fn secret_body(secret: &Secret, exp: i64) -> Value {
    let mut tags = Map::new();
    if let Some(prompt) = secret.prompt() {
        tags.insert(PROMPT_TAG.to_string(), Value::from(prompt));
    }
    if let Some(answer) = secret.answer() {
        tags.insert(ANSWER_TAG.to_string(), Value::from(answer));
    }
    json!({
        "value": secret.text(),
        "contentType": CONTENT_TYPE,
        "attributes": { "enabled": true, "exp": exp },
        "tags": tags,
    })
}

/// [`SecretsStore`] over one Azure Key Vault.
///
/// Key Vault stores `exp` in whole seconds, so a deadline is rounded up to the
/// next second and a secret can stay readable for up to one second past its
/// requested expiry. Reads compare against a millisecond clock.
#[derive(Clone)]
pub struct AzureKeyVaultStore {
    config: Arc<AzureKeyVaultConfig>,
    http: Client,
    auth: Arc<AzureAuth>,
}

impl AzureKeyVaultStore {
    pub fn new(config: AzureKeyVaultConfig) -> anyhow::Result<Self> {
        if config.vault_url.is_empty() {
            return Err(anyhow!("azure key vault url must not be empty"));
        }
        let http = Client::builder()
            .timeout(config.http_timeout)
            .danger_accept_invalid_certs(config.tls_insecure_skip_verify)
            .build()
            .context("failed to build reqwest client for azure key vault")?;
        let auth = Arc::new(AzureAuth::new(config.credentials.clone()));
        Ok(Self {
            config: Arc::new(config),
            http,
            auth,
        })
    }

    pub fn from_env() -> anyhow::Result<Self> {
        Self::new(AzureKeyVaultConfig::from_env()?)
    }

    pub fn config(&self) -> &AzureKeyVaultConfig {
        &self.config
    }

    async fn send(
        &self,
        method: Method,
        url: String,
        body: Option<Value>,
    ) -> Result<Response, KvError> {
        let header = self.auth.header(&self.http).await?;
        let mut builder = self
            .http
            .request(method, url)
            .header(reqwest::header::AUTHORIZATION, header);
        if self.config.tls_insecure_skip_verify {
            builder = builder
                .header("x-ms-keyvault-region", "local")
                .header("x-ms-keyvault-service-version", "1.6.0.0");
        }
        if let Some(payload) = body {
            builder = builder.json(&payload);
        }

        let response = builder.send().await?;
        if response.status() == StatusCode::UNAUTHORIZED {
            let body = response.text().await.unwrap_or_default();
            return Err(KvError::Unauthorized(format!(
                "Azure Key Vault returned 401 Unauthorized. Hint: ensure AZURE_TENANT_ID, AZURE_CLIENT_ID, AZURE_CLIENT_SECRET and the vault URL are configured. Scope used: {}. Key Vault URL: {}. Response body: {body}",
                self.auth.scope_hint(),
                self.config.vault_url
            )));
        }
        Ok(response)
    }

    async fn fetch(&self, id: &SecretId) -> Result<Option<SecretBundle>, KvError> {
        let response = self
            .send(Method::GET, self.config.secret_url(id), None)
            .await?;
        match response.status() {
            StatusCode::NOT_FOUND => Ok(None),
            status if status.is_success() => {
                let body = response.text().await?;
                serde_json::from_str(&body)
                    .map(Some)
                    .map_err(|err| KvError::Decode(err.to_string()))
            }
            _ => Err(KvError::from_response(response).await),
        }
    }

    async fn create(&self, id: &SecretId, secret: &Secret, caller_id: bool) -> Result<(), KvError> {
        // Key Vault silently versions on PUT, so a caller-chosen id is checked first.
        if caller_id
            && let Some(existing) = self.fetch(id).await?
            && existing.is_live(unix_now_ms())
        {
            return Err(KvError::AlreadyExists(id.clone()));
        }

        let expire_in = secret.expire_in_or(self.config.default_expire_in);
        let body = secret_body(secret, expiry_timestamp(unix_now_ms(), expire_in));
        let response = self
            .send(Method::PUT, self.config.secret_url(id), Some(body))
            .await?;
        if !response.status().is_success() {
            return Err(KvError::from_response(response).await);
        }
        debug!(secret_id = %id, ?expire_in, "created secret");
        Ok(())
    }

    async fn remove(&self, id: &SecretId) -> Result<DeleteOutcome, KvError> {
        let response = self
            .send(Method::DELETE, self.config.secret_url(id), None)
            .await?;
        match response.status() {
            // 409: another delete of the same secret is in progress.
            StatusCode::NOT_FOUND | StatusCode::CONFLICT => return Ok(DeleteOutcome::AlreadyGone),
            status if status.is_success() => {}
            _ => return Err(KvError::from_response(response).await),
        }
        info!(secret_id = %id, "deleted secret, purging");
        self.purge(id).await?;
        Ok(DeleteOutcome::Removed)
    }

    /// The deleted copy appears asynchronously, so 404/409 are retried.
    async fn purge(&self, id: &SecretId) -> Result<(), KvError> {
        let attempts = self.config.purge_poll_attempts.max(1);
        for attempt in 1..=attempts {
            let response = self
                .send(Method::DELETE, self.config.deleted_secret_url(id), None)
                .await?;
            match response.status() {
                status if status.is_success() => {
                    info!(secret_id = %id, attempt, "purged secret");
                    return Ok(());
                }
                StatusCode::NOT_FOUND | StatusCode::CONFLICT => {
                    debug!(secret_id = %id, attempt, "deleted secret not purgeable yet");
                    tokio::time::sleep(self.config.purge_poll_interval).await;
                }
                _ => return Err(KvError::from_response(response).await),
            }
        }
        Err(KvError::PurgePending {
            id: id.clone(),
            attempts,
        })
    }
}

#[async_trait]
impl SecretsStore for AzureKeyVaultStore {
    async fn put(&self, secret: &Secret) -> snapsecret_spec::Result<SecretId> {
        let (id, caller_id) = match secret.id() {
            Some(id) => (id.clone(), true),
            None => {
                let generated = SecretId::new(Uuid::new_v4().to_string())
                    .or_unknown("Failed to create secret due to an unknown secrets provider error")?;
                (generated, false)
            }
        };

        match self.create(&id, secret, caller_id).await {
            Ok(()) => Ok(id),
            Err(err) => {
                error!(secret_id = %id, error = %err, "failed to set secret");
                Err(err.into_error(
                    "Failed to create secret due to a secrets provider error".to_string(),
                    "Failed to create secret due to an unknown secrets provider error".to_string(),
                ))
            }
        }
    }

    async fn get(&self, id: &SecretId) -> snapsecret_spec::Result<Option<Secret>> {
        let now = unix_now_ms();
        let fetched = self.fetch(id).await.and_then(|bundle| match bundle {
            Some(bundle) if bundle.is_live(now) => bundle.into_secret(id, now).map(Some),
            Some(_) => {
                warn!(secret_id = %id, "secret is expired or disabled");
                Ok(None)
            }
            None => Ok(None),
        });

        fetched.map_err(|err| {
            error!(secret_id = %id, error = %err, "failed to get secret");
            let message = format!("Failed to get secret {id}");
            err.into_error(message.clone(), message)
        })
    }

    async fn delete(&self, id: &SecretId) -> snapsecret_spec::Result<DeleteOutcome> {
        info!(secret_id = %id, "expiring secret");
        self.remove(id).await.map_err(|err| {
            error!(secret_id = %id, error = %err, "failed to expire secret");
            err.into_error(
                "Failed to expire secret".to_string(),
                "Failed to expire secret due to an unknown secrets provider error".to_string(),
            )
        })
    }
}
