use super::{AzureLayer, BrokerConfigLayer};
use anyhow::{Context, Result};
use std::fs;
use std::path::Path;

pub const PROJECT_CONFIG_FILE: &str = "snapsecret.toml";

pub fn load_project_layer(
    root: &Path,
    override_path: Option<&Path>,
) -> Result<Option<BrokerConfigLayer>> {
    if let Some(path) = override_path {
        return load_from_file(path).map(Some);
    }
    let path = root.join(PROJECT_CONFIG_FILE);
    if path.exists() {
        load_from_file(&path).map(Some)
    } else {
        Ok(None)
    }
}

pub fn load_from_file(path: &Path) -> Result<BrokerConfigLayer> {
    let data = fs::read_to_string(path)
        .with_context(|| format!("failed to read config {}", path.display()))?;
    parse_config(&data, path)
}

fn parse_config(data: &str, path: &Path) -> Result<BrokerConfigLayer> {
    if path.extension().is_some_and(|ext| ext == "json") {
        serde_json::from_str(data).with_context(|| format!("invalid json config {}", path.display()))
    } else {
        toml::from_str(data).with_context(|| format!("invalid toml config {}", path.display()))
    }
}

fn env_string(name: &str) -> Option<String> {
    std::env::var(name)
        .ok()
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
}

fn env_parsed<T: std::str::FromStr>(name: &str) -> Option<T> {
    env_string(name).and_then(|value| value.parse().ok())
}

pub fn env_layer() -> BrokerConfigLayer {
    let mut layer = BrokerConfigLayer::default();

    if let Some(value) = env_string("SNAPSECRET_HTTP_BIND") {
        layer.http.get_or_insert_with(Default::default).bind = Some(value);
    }

    if let Some(value) = env_parsed::<u64>("SNAPSECRET_OPERATION_TIMEOUT_MS") {
        layer
            .engine
            .get_or_insert_with(Default::default)
            .operation_timeout_ms = Some(value);
    }

    if let Some(value) = env_string("SNAPSECRET_STORE") {
        layer.store.get_or_insert_with(Default::default).kind = Some(value);
    }
    if let Some(value) = env_parsed::<u64>("SNAPSECRET_DEFAULT_EXPIRE_IN_SECS") {
        layer
            .store
            .get_or_insert_with(Default::default)
            .default_expire_in_secs = Some(value);
    }

    let azure = AzureLayer {
        vault_url: env_string("SNAPSECRET_AZURE_VAULT_URL"),
        http_timeout_secs: env_parsed("SNAPSECRET_AZURE_HTTP_TIMEOUT_SECS"),
        purge_poll_attempts: env_parsed("SNAPSECRET_AZURE_PURGE_POLL_ATTEMPTS"),
        purge_poll_interval_ms: env_parsed("SNAPSECRET_AZURE_PURGE_POLL_INTERVAL_MS"),
    };
    if azure.vault_url.is_some()
        || azure.http_timeout_secs.is_some()
        || azure.purge_poll_attempts.is_some()
        || azure.purge_poll_interval_ms.is_some()
    {
        layer.store.get_or_insert_with(Default::default).azure = Some(azure);
    }

    if let Some(value) = env_string("SNAPSECRET_LOG") {
        layer.telemetry.get_or_insert_with(Default::default).filter = Some(value);
    }
    if let Some(value) = env_parsed::<bool>("SNAPSECRET_LOG_JSON") {
        layer.telemetry.get_or_insert_with(Default::default).json = Some(value);
    }

    layer
}
