use crate::error::Result;
use crate::id::SecretId;
use crate::secret::Secret;
use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;

/// Expiry applied when a submitted secret does not carry one.
pub const DEFAULT_EXPIRE_IN: Duration = Duration::from_secs(60 * 60);

/// Result of a store delete.
///
/// Exactly one concurrent delete of a live item observes `Removed`; every
/// other caller observes `AlreadyGone`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeleteOutcome {
    Removed,
    AlreadyGone,
}

impl DeleteOutcome {
    pub fn removed(&self) -> bool {
        matches!(self, DeleteOutcome::Removed)
    }
}

/// Storage contract implemented by secret backends.
#[async_trait]
pub trait SecretsStore: Send + Sync {
    /// Persist `secret` with its expiry and return the id it can be fetched by.
    ///
    /// Generated ids must be unpredictable.
    async fn put(&self, secret: &Secret) -> Result<SecretId>;

    /// Fetch a live secret. Unknown, consumed and expired ids all yield `None`,
    /// including entries the backend has not physically purged yet.
    async fn get(&self, id: &SecretId) -> Result<Option<Secret>>;

    /// Delete and purge `id`. Deleting an id that is already gone is not an error.
    async fn delete(&self, id: &SecretId) -> Result<DeleteOutcome>;
}

#[async_trait]
impl<T> SecretsStore for Arc<T>
where
    T: SecretsStore + ?Sized,
{
    async fn put(&self, secret: &Secret) -> Result<SecretId> {
        (**self).put(secret).await
    }

    async fn get(&self, id: &SecretId) -> Result<Option<Secret>> {
        (**self).get(id).await
    }

    async fn delete(&self, id: &SecretId) -> Result<DeleteOutcome> {
        (**self).delete(id).await
    }
}

#[async_trait]
impl<T> SecretsStore for Box<T>
where
    T: SecretsStore + ?Sized,
{
    async fn put(&self, secret: &Secret) -> Result<SecretId> {
        (**self).put(secret).await
    }

    async fn get(&self, id: &SecretId) -> Result<Option<Secret>> {
        (**self).get(id).await
    }

    async fn delete(&self, id: &SecretId) -> Result<DeleteOutcome> {
        (**self).delete(id).await
    }
}
