use crate::{
    Capabilities, TestEnv, assert_gone, assert_live, secret_with_id, secret_with_metadata,
    short_lived_secret, small_secret,
};
use anyhow::{Context, Result};
use snapsecret_spec::{DeleteOutcome, ErrorKind, SecretId, SecretsStore};
use std::time::Duration;

/// Runs the shared conformance suite against a store.
pub struct ConformanceSuite<'a, S: SecretsStore + ?Sized> {
    store_name: String,
    store: &'a S,
    caps: Capabilities,
    env: TestEnv,
}

impl<'a, S: SecretsStore + ?Sized> ConformanceSuite<'a, S> {
    pub fn new(store_name: impl Into<String>, store: &'a S, caps: Capabilities) -> Self {
        let store_name = store_name.into();
        Self {
            env: TestEnv::from_env(&store_name),
            store_name,
            store,
            caps,
        }
    }

    pub async fn run(&self) -> Result<()> {
        self.round_trip().await?;
        self.generated_ids_are_distinct().await?;
        self.caller_id_is_kept().await?;
        self.duplicate_live_id_is_rejected().await?;
        self.unknown_id_reads_as_absent().await?;
        self.delete_has_single_winner().await?;
        if self.caps.short_expiry {
            self.expired_reads_as_absent().await?;
        }
        Ok(())
    }

    async fn round_trip(&self) -> Result<()> {
        let secret = secret_with_metadata()?;
        let id = self
            .store
            .put(&secret)
            .await
            .with_context(|| format!("put failed for {}", self.store_name))?;
        assert_live(self.store, &self.store_name, &id, &secret).await?;

        let outcome = self
            .store
            .delete(&id)
            .await
            .with_context(|| format!("delete failed for {}:{id}", self.store_name))?;
        if outcome != DeleteOutcome::Removed {
            anyhow::bail!("first delete of {}:{id} reported {outcome:?}", self.store_name);
        }
        assert_gone(self.store, &self.store_name, &id).await?;

        let again = self
            .store
            .delete(&id)
            .await
            .with_context(|| format!("repeat delete failed for {}:{id}", self.store_name))?;
        if again != DeleteOutcome::AlreadyGone {
            anyhow::bail!("repeat delete of {}:{id} reported {again:?}", self.store_name);
        }
        Ok(())
    }

    async fn generated_ids_are_distinct(&self) -> Result<()> {
        let first = self.store.put(&small_secret()?).await?;
        let second = self.store.put(&small_secret()?).await?;
        let distinct = first != second && !first.as_str().is_empty();
        self.cleanup(&[&first, &second]).await;
        if !distinct {
            anyhow::bail!("{} generated ids {first} and {second}", self.store_name);
        }
        Ok(())
    }

    async fn caller_id_is_kept(&self) -> Result<()> {
        let wanted = self.env.prefix.id("caller");
        let secret = secret_with_id(&wanted)?;
        let id = self.store.put(&secret).await?;
        let result = if id.as_str() == wanted {
            assert_live(self.store, &self.store_name, &id, &secret)
                .await
                .map(|_| ())
        } else {
            Err(anyhow::anyhow!(
                "{} replaced caller id {wanted} with {id}",
                self.store_name
            ))
        };
        self.cleanup(&[&id]).await;
        result
    }

    async fn duplicate_live_id_is_rejected(&self) -> Result<()> {
        let wanted = self.env.prefix.id("duplicate");
        let original = secret_with_id(&wanted)?;
        let id = self.store.put(&original).await?;

        let result = match self.store.put(&secret_with_id(&wanted)?).await {
            Err(err) if err.kind() == ErrorKind::ProviderRequestError => {
                assert_live(self.store, &self.store_name, &id, &original)
                    .await
                    .map(|_| ())
            }
            Err(err) => Err(anyhow::anyhow!(
                "{} rejected duplicate id with {}",
                self.store_name,
                err.kind()
            )),
            Ok(_) => Err(anyhow::anyhow!(
                "{} overwrote live secret {id}",
                self.store_name
            )),
        };
        self.cleanup(&[&id]).await;
        result
    }

    async fn unknown_id_reads_as_absent(&self) -> Result<()> {
        let id = SecretId::new(self.env.prefix.id("missing"))?;
        if self.store.get(&id).await?.is_some() {
            anyhow::bail!("{} returned a secret for unknown id {id}", self.store_name);
        }
        let outcome = self.store.delete(&id).await?;
        if outcome != DeleteOutcome::AlreadyGone {
            anyhow::bail!("{} reported {outcome:?} for unknown id {id}", self.store_name);
        }
        Ok(())
    }

    async fn delete_has_single_winner(&self) -> Result<()> {
        let id = self.store.put(&small_secret()?).await?;
        let (a, b) = tokio::join!(self.store.delete(&id), self.store.delete(&id));
        let removed = [a?, b?].iter().filter(|outcome| outcome.removed()).count();
        if removed != 1 {
            anyhow::bail!(
                "{} reported {removed} winners for concurrent deletes of {id}",
                self.store_name
            );
        }
        Ok(())
    }

    async fn expired_reads_as_absent(&self) -> Result<()> {
        let id = self
            .store
            .put(&short_lived_secret(Duration::from_millis(5))?)
            .await?;
        tokio::time::sleep(Duration::from_millis(50)).await;
        let visible = self.store.get(&id).await?.is_some();
        self.cleanup(&[&id]).await;
        if visible {
            anyhow::bail!("{} returned expired secret {id}", self.store_name);
        }
        Ok(())
    }

    async fn cleanup(&self, ids: &[&SecretId]) {
        if !self.env.cleanup {
            return;
        }
        for id in ids {
            let _ = self.store.delete(id).await;
        }
    }
}
