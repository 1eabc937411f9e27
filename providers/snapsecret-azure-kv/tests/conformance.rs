#![cfg(feature = "integration")]

use anyhow::Result;
use snapsecret_provider_azure_kv::AzureKeyVaultStore;
use snapsecret_store_tests::{Capabilities, ConformanceSuite, parse_bool_env};

#[tokio::test(flavor = "current_thread")]
#[ignore = "integration test; requires SNAPSECRET_INTEGRATION=1 and a Key Vault"]
async fn conformance_azure() -> Result<()> {
    if !parse_bool_env("SNAPSECRET_INTEGRATION") {
        eprintln!("SNAPSECRET_INTEGRATION=1 not set; skipping conformance");
        return Ok(());
    }
    let store = AzureKeyVaultStore::from_env()?;
    ConformanceSuite::new("azure", &store, Capabilities::default())
        .run()
        .await
}
