use snapsecret_spec::{DeleteOutcome, Result, Secret, SecretId, SecretsStore, SnapSecretError};
use std::future::Future;
use std::time::Duration;
use tracing::{debug, warn};

/// Default bound on a single store call.
pub const DEFAULT_OPERATION_TIMEOUT: Duration = Duration::from_secs(10);

/// Runtime knobs for [`SnapSecretEngine`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EngineConfig {
    /// Upper bound applied to each individual `put`, `get` and `delete`.
    pub operation_timeout: Duration,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            operation_timeout: DEFAULT_OPERATION_TIMEOUT,
        }
    }
}

#[derive(Debug, Clone, Copy)]
enum Step {
    Put,
    Get,
    Delete,
}

impl Step {
    fn as_str(&self) -> &'static str {
        match self {
            Step::Put => "put",
            Step::Get => "get",
            Step::Delete => "delete",
        }
    }
}

/// Submit/access orchestrator implementing burn-after-reading on top of a
/// [`SecretsStore`].
///
/// The engine keeps no state of its own. Every consistency decision between
/// concurrent callers is delegated to the store's [`DeleteOutcome`].
#[derive(Clone)]
pub struct SnapSecretEngine<S> {
    store: S,
    config: EngineConfig,
}

impl<S> SnapSecretEngine<S>
where
    S: SecretsStore,
{
    pub fn new(store: S) -> Self {
        Self::with_config(store, EngineConfig::default())
    }

    pub fn with_config(store: S, config: EngineConfig) -> Self {
        Self { store, config }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Store `secret` and return its retrieval id.
    pub async fn submit(&self, secret: Secret) -> Result<SecretId> {
        let id = self.bounded(Step::Put, self.store.put(&secret)).await?;
        debug!(secret_id = %id, "secret submitted");
        Ok(id)
    }

    /// Return the secret stored under `id` and destroy it.
    ///
    /// A failed or empty read returns before any delete is attempted. The
    /// plaintext is only handed out once the store confirms this call removed
    /// the live item; any delete failure is returned instead of the secret.
    pub async fn access(&self, id: &SecretId) -> Result<Secret> {
        let secret = match self.bounded(Step::Get, self.store.get(id)).await? {
            Some(secret) => secret,
            None => {
                debug!(secret_id = %id, "secret expired or not found");
                return Err(expired_or_not_found(id));
            }
        };

        let pending = PendingDelete::new(id);
        let outcome = self.bounded(Step::Delete, self.store.delete(id)).await;
        pending.settle();

        match outcome {
            Ok(DeleteOutcome::Removed) => {
                debug!(secret_id = %id, "secret accessed and destroyed");
                Ok(secret)
            }
            Ok(DeleteOutcome::AlreadyGone) => {
                debug!(secret_id = %id, "secret consumed by a concurrent access");
                Err(expired_or_not_found(id))
            }
            Err(err) => {
                warn!(
                    secret_id = %id,
                    kind = %err.kind(),
                    causes = ?err.causes(),
                    "delete failed after read; withholding secret"
                );
                Err(err)
            }
        }
    }

    async fn bounded<T, F>(&self, step: Step, operation: F) -> Result<T>
    where
        F: Future<Output = Result<T>>,
    {
        let limit = self.config.operation_timeout;
        match tokio::time::timeout(limit, operation).await {
            Ok(result) => result,
            Err(_) => Err(SnapSecretError::unknown(
                "Secrets provider did not respond in time",
            )
            .with_cause(anyhow::anyhow!(
                "store {} timed out after {limit:?}",
                step.as_str()
            ))),
        }
    }
}

fn expired_or_not_found(id: &SecretId) -> SnapSecretError {
    SnapSecretError::expired_or_not_found(format!(
        "Failed to get secret {id}. Secret is either expired or does not exist."
    ))
}

/// Logs when an access is dropped while its delete is still in flight.
///
/// The store may or may not have committed the delete; the secret is not
/// handed out and the delete is never retried.
struct PendingDelete<'a> {
    id: &'a SecretId,
    settled: bool,
}

impl<'a> PendingDelete<'a> {
    fn new(id: &'a SecretId) -> Self {
        Self { id, settled: false }
    }

    fn settle(mut self) {
        self.settled = true;
    }
}

impl Drop for PendingDelete<'_> {
    fn drop(&mut self) {
        if !self.settled {
            warn!(
                secret_id = %self.id,
                "access cancelled during delete; secret state is unknown"
            );
        }
    }
}
