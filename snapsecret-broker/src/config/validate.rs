use super::{BrokerConfig, StoreKind};
use anyhow::{Result, bail};
use snapsecret_spec::MAX_EXPIRE_IN;

/// Hard errors that make the configuration unusable.
pub fn check(cfg: &BrokerConfig) -> Result<()> {
    if cfg.store.kind == StoreKind::Azure
        && cfg
            .store
            .azure
            .vault_url
            .as_deref()
            .is_none_or(|url| url.trim().is_empty())
    {
        bail!(
            "store.kind=azure requires store.azure.vault_url (or SNAPSECRET_AZURE_VAULT_URL / --vault-url)"
        );
    }
    if cfg.store.default_expire_in() > MAX_EXPIRE_IN {
        bail!(
            "store.default_expire_in_secs={} exceeds the {}s limit on secret expiry",
            cfg.store.default_expire_in_secs,
            MAX_EXPIRE_IN.as_secs()
        );
    }
    Ok(())
}

pub fn warnings(cfg: &BrokerConfig) -> Vec<String> {
    let mut warnings = Vec::new();

    if cfg.engine.operation_timeout_ms == 0 {
        warnings.push("engine.operation_timeout_ms=0; using the 10000ms default".into());
    } else if cfg.engine.operation_timeout_ms < 100 {
        warnings.push(format!(
            "engine.operation_timeout_ms={}ms is very low",
            cfg.engine.operation_timeout_ms
        ));
    }
    if cfg.store.default_expire_in_secs == 0 {
        warnings.push("store.default_expire_in_secs=0; using the 3600s default".into());
    }
    if cfg.store.kind == StoreKind::Azure {
        let azure = &cfg.store.azure;
        if azure.http_timeout_secs == 0 {
            warnings.push("store.azure.http_timeout_secs=0; using the 15s default".into());
        }
        if azure.purge_poll_attempts == 0 {
            warnings.push("store.azure.purge_poll_attempts=0; a single purge attempt is made".into());
        }
        if azure
            .vault_url
            .as_deref()
            .is_some_and(|url| url.starts_with("http://"))
        {
            warnings.push("store.azure.vault_url is not https".into());
        }
    }

    warnings
}
