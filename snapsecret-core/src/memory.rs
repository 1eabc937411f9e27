use async_trait::async_trait;
use parking_lot::Mutex;
use snapsecret_spec::{
    DEFAULT_EXPIRE_IN, DeleteOutcome, Result, ResultExt, Secret, SecretId, SecretsStore,
};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::debug;
use uuid::Uuid;

/// Every this many puts, `put` drops expired entries while it holds the lock.
pub const SWEEP_EVERY_PUTS: u64 = 32;

#[derive(Clone)]
struct MemoryEntry {
    secret: Secret,
    expires_at: Instant,
}

impl MemoryEntry {
    fn is_live(&self, now: Instant) -> bool {
        now < self.expires_at
    }
}

#[derive(Default)]
struct Shelf {
    entries: HashMap<SecretId, MemoryEntry>,
    puts: u64,
}

impl Shelf {
    fn evict_expired(&mut self, now: Instant) -> usize {
        let before = self.entries.len();
        self.entries.retain(|_, entry| entry.is_live(now));
        before - self.entries.len()
    }
}

/// In-process store for tests and single-node development.
///
/// Expired entries stay in the map until a delete, a periodic sweep from
/// `put` (every [`SWEEP_EVERY_PUTS`] calls) or [`MemoryStore::purge_expired`]
/// removes them, so reads must check the expiry themselves. Cloning shares
/// the underlying map.
#[derive(Clone)]
pub struct MemoryStore {
    shelf: Arc<Mutex<Shelf>>,
    default_expire_in: Duration,
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::with_default_expiry(DEFAULT_EXPIRE_IN)
    }

    pub fn with_default_expiry(default_expire_in: Duration) -> Self {
        Self {
            shelf: Arc::new(Mutex::new(Shelf::default())),
            default_expire_in,
        }
    }

    pub fn default_expire_in(&self) -> Duration {
        self.default_expire_in
    }

    /// Whether an entry for `id` is physically present, live or not.
    pub fn contains_raw(&self, id: &SecretId) -> bool {
        self.shelf.lock().entries.contains_key(id)
    }

    pub fn len(&self) -> usize {
        self.shelf.lock().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.shelf.lock().entries.is_empty()
    }

    /// Drop every entry whose expiry has passed. Returns how many were removed.
    pub fn purge_expired(&self) -> usize {
        self.shelf.lock().evict_expired(Instant::now())
    }
}

#[async_trait]
impl SecretsStore for MemoryStore {
    async fn put(&self, secret: &Secret) -> Result<SecretId> {
        let id = match secret.id() {
            Some(id) => id.clone(),
            None => {
                SecretId::new(Uuid::new_v4().to_string()).or_unknown("Failed to create secret")?
            }
        };
        let now = Instant::now();
        let expire_in = secret.expire_in_or(self.default_expire_in);
        let expires_at = now
            .checked_add(expire_in)
            .ok_or_else(|| anyhow::anyhow!("expiry {expire_in:?} overflows the clock"))
            .or_provider_request("Failed to create secret due to an invalid expiry")?;

        let mut guard = self.shelf.lock();
        guard.puts += 1;
        if guard.puts % SWEEP_EVERY_PUTS == 0 {
            let evicted = guard.evict_expired(now);
            if evicted > 0 {
                debug!(evicted, "evicted expired secrets");
            }
        }
        if guard.entries.get(&id).is_some_and(|entry| entry.is_live(now)) {
            return Err(anyhow::anyhow!("secret {id} already exists"))
                .or_provider_request("Failed to create secret due to a secrets provider error");
        }
        guard.entries.insert(
            id.clone(),
            MemoryEntry {
                secret: secret.with_assigned_id(id.clone()),
                expires_at,
            },
        );
        drop(guard);

        debug!(secret_id = %id, ?expire_in, "created secret");
        Ok(id)
    }

    async fn get(&self, id: &SecretId) -> Result<Option<Secret>> {
        let now = Instant::now();
        let guard = self.shelf.lock();
        Ok(guard
            .entries
            .get(id)
            .filter(|entry| entry.is_live(now))
            .map(|entry| entry.secret.clone()))
    }

    async fn delete(&self, id: &SecretId) -> Result<DeleteOutcome> {
        let removed = self.shelf.lock().entries.remove(id);
        match removed {
            Some(_) => {
                debug!(secret_id = %id, "removed secret");
                Ok(DeleteOutcome::Removed)
            }
            None => Ok(DeleteOutcome::AlreadyGone),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use snapsecret_spec::ErrorKind;

    #[tokio::test]
    async fn generated_ids_are_unique() {
        let store = MemoryStore::new();
        let a = store.put(&Secret::new("a").unwrap()).await.unwrap();
        let b = store.put(&Secret::new("a").unwrap()).await.unwrap();
        assert_ne!(a, b);
        assert_eq!(store.len(), 2);
    }

    #[tokio::test]
    async fn caller_supplied_id_is_kept() {
        let store = MemoryStore::new();
        let secret = Secret::builder("token").id("user-7").build().unwrap();
        let id = store.put(&secret).await.unwrap();
        assert_eq!(id.as_str(), "user-7");
    }

    #[tokio::test]
    async fn live_id_cannot_be_overwritten() {
        let store = MemoryStore::new();
        let secret = Secret::builder("one").id("fixed").build().unwrap();
        store.put(&secret).await.unwrap();

        let replacement = Secret::builder("two").id("fixed").build().unwrap();
        let err = store.put(&replacement).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::ProviderRequestError);

        let stored = store.get(&SecretId::new("fixed").unwrap()).await.unwrap();
        assert_eq!(stored.unwrap().text(), "one");
    }

    #[tokio::test]
    async fn expired_entry_is_hidden_but_present() {
        let store = MemoryStore::new();
        let secret = Secret::builder("short")
            .expire_in(Duration::from_millis(1))
            .build()
            .unwrap();
        let id = store.put(&secret).await.unwrap();
        tokio::time::sleep(Duration::from_millis(10)).await;

        assert!(store.get(&id).await.unwrap().is_none());
        assert!(store.contains_raw(&id));
        assert_eq!(store.purge_expired(), 1);
        assert!(!store.contains_raw(&id));
    }

    #[tokio::test]
    async fn delete_is_idempotent() {
        let store = MemoryStore::new();
        let id = store.put(&Secret::new("x").unwrap()).await.unwrap();
        assert_eq!(store.delete(&id).await.unwrap(), DeleteOutcome::Removed);
        assert_eq!(store.delete(&id).await.unwrap(), DeleteOutcome::AlreadyGone);
    }

    #[tokio::test]
    async fn later_puts_evict_expired_entries() {
        let store = MemoryStore::new();
        let mut expired = Vec::new();
        for _ in 0..5 {
            let secret = Secret::builder("stale")
                .expire_in(Duration::from_millis(1))
                .build()
                .unwrap();
            expired.push(store.put(&secret).await.unwrap());
        }
        tokio::time::sleep(Duration::from_millis(10)).await;

        for _ in 0..SWEEP_EVERY_PUTS {
            store.put(&Secret::new("fresh").unwrap()).await.unwrap();
        }

        assert!(expired.iter().all(|id| !store.contains_raw(id)));
        assert_eq!(store.len(), SWEEP_EVERY_PUTS as usize);
    }
}
