use crate::retry_async;
use anyhow::{Context, Result};
use snapsecret_spec::{Secret, SecretId, SecretsStore};
use std::time::Duration;

/// Reads `id` until it is visible and checks the payload matches `expected`.
pub async fn assert_live<S: SecretsStore + ?Sized>(
    store: &S,
    store_name: &str,
    id: &SecretId,
    expected: &Secret,
) -> Result<Secret> {
    let got = retry_async(
        || async move {
            match store.get(id).await {
                Ok(Some(secret)) => Ok(secret),
                Ok(None) => Err(anyhow::anyhow!("secret not visible yet")),
                Err(err) => Err(anyhow::Error::new(err)),
            }
        },
        5,
        Duration::from_millis(100),
    )
    .await
    .with_context(|| format!("get failed for {store_name}:{id}"))?;

    if got.text() != expected.text() {
        anyhow::bail!(
            "payload mismatch for {store_name}:{id} ({} vs {} bytes)",
            got.text().len(),
            expected.text().len()
        );
    }
    if got.prompt() != expected.prompt() || got.answer() != expected.answer() {
        anyhow::bail!("metadata mismatch for {store_name}:{id}");
    }
    Ok(got)
}

/// Reads `id` until the store reports it absent.
pub async fn assert_gone<S: SecretsStore + ?Sized>(
    store: &S,
    store_name: &str,
    id: &SecretId,
) -> Result<()> {
    retry_async(
        || async move {
            match store.get(id).await {
                Ok(None) => Ok(()),
                Ok(Some(_)) => Err(anyhow::anyhow!("secret still visible")),
                Err(err) => Err(anyhow::Error::new(err)),
            }
        },
        5,
        Duration::from_millis(150),
    )
    .await
    .with_context(|| format!("expected {store_name}:{id} to be gone"))
}
