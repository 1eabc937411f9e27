use anyhow::Result;
use async_trait::async_trait;
use snapsecret_core::MemoryStore;
use snapsecret_spec::{DeleteOutcome, Secret, SecretId, SecretsStore};
use tracing::info;

use crate::config::{StoreConfig, StoreKind};

/// Backend selected once at start-up.
#[derive(Clone)]
pub enum ConfiguredStore {
    Memory(MemoryStore),
    #[cfg(feature = "azure-kv")]
    Azure(snapsecret_provider_azure_kv::AzureKeyVaultStore),
}

impl ConfiguredStore {
    pub fn kind(&self) -> StoreKind {
        match self {
            ConfiguredStore::Memory(_) => StoreKind::Memory,
            #[cfg(feature = "azure-kv")]
            ConfiguredStore::Azure(_) => StoreKind::Azure,
        }
    }
}

pub fn load_store(config: &StoreConfig) -> Result<ConfiguredStore> {
    let store = match config.kind {
        StoreKind::Memory => memory_store(config),
        StoreKind::Azure => {
            #[cfg(feature = "azure-kv")]
            {
                azure_store(config)?
            }

            #[cfg(not(feature = "azure-kv"))]
            {
                anyhow::bail!("azure store requested but azure-kv feature is not enabled");
            }
        }
    };
    info!(store = %store.kind(), "secrets store configured");
    Ok(store)
}

fn memory_store(config: &StoreConfig) -> ConfiguredStore {
    ConfiguredStore::Memory(MemoryStore::with_default_expiry(config.default_expire_in()))
}

#[cfg(feature = "azure-kv")]
fn azure_store(config: &StoreConfig) -> Result<ConfiguredStore> {
    use anyhow::Context;
    use snapsecret_provider_azure_kv::{AzureKeyVaultConfig, AzureKeyVaultStore};

    let vault_url = config
        .azure
        .vault_url
        .as_deref()
        .context("store.azure.vault_url is required for the azure store")?;
    let credentials = AzureKeyVaultConfig::credentials_from_env(vault_url)?;
    let mut azure = AzureKeyVaultConfig::new(vault_url, credentials);
    azure.http_timeout = config.azure.http_timeout();
    azure.default_expire_in = config.default_expire_in();
    azure.purge_poll_attempts = config.azure.purge_poll_attempts;
    azure.purge_poll_interval = config.azure.purge_poll_interval();

    let store = AzureKeyVaultStore::new(azure).context("failed to configure azure key vault store")?;
    Ok(ConfiguredStore::Azure(store))
}

#[async_trait]
impl SecretsStore for ConfiguredStore {
    async fn put(&self, secret: &Secret) -> snapsecret_spec::Result<SecretId> {
        match self {
            ConfiguredStore::Memory(store) => store.put(secret).await,
            #[cfg(feature = "azure-kv")]
            ConfiguredStore::Azure(store) => store.put(secret).await,
        }
    }

    async fn get(&self, id: &SecretId) -> snapsecret_spec::Result<Option<Secret>> {
        match self {
            ConfiguredStore::Memory(store) => store.get(id).await,
            #[cfg(feature = "azure-kv")]
            ConfiguredStore::Azure(store) => store.get(id).await,
        }
    }

    async fn delete(&self, id: &SecretId) -> snapsecret_spec::Result<DeleteOutcome> {
        match self {
            ConfiguredStore::Memory(store) => store.delete(id).await,
            #[cfg(feature = "azure-kv")]
            ConfiguredStore::Azure(store) => store.delete(id).await,
        }
    }
}
