use super::{
    AzureLayer, AzureSettings, BrokerConfig, BrokerConfigLayer, ConfigSource, EngineLayer,
    EngineSettings, HttpConfig, HttpLayer, ProvenanceMap, StoreConfig, StoreLayer, StoreKind,
    TelemetryLayer, TelemetrySettings,
};
use anyhow::{Context, Result};
use std::net::SocketAddr;

pub fn apply_layer(
    config: &mut BrokerConfig,
    layer: BrokerConfigLayer,
    source: ConfigSource,
    provenance: &mut ProvenanceMap,
) -> Result<()> {
    if let Some(http) = layer.http {
        apply_http(&mut config.http, http, source, provenance)?;
    }
    if let Some(engine) = layer.engine {
        apply_engine(&mut config.engine, engine, source, provenance);
    }
    if let Some(store) = layer.store {
        apply_store(&mut config.store, store, source, provenance)?;
    }
    if let Some(telemetry) = layer.telemetry {
        apply_telemetry(&mut config.telemetry, telemetry, source, provenance);
    }
    Ok(())
}

fn apply_http(
    target: &mut HttpConfig,
    layer: HttpLayer,
    source: ConfigSource,
    provenance: &mut ProvenanceMap,
) -> Result<()> {
    if let Some(value) = layer.bind {
        target.bind = value
            .parse::<SocketAddr>()
            .with_context(|| format!("invalid http.bind `{value}` from {source:?}"))?;
        provenance.insert("http.bind".into(), source);
    }
    Ok(())
}

fn apply_engine(
    target: &mut EngineSettings,
    layer: EngineLayer,
    source: ConfigSource,
    provenance: &mut ProvenanceMap,
) {
    if let Some(value) = layer.operation_timeout_ms {
        target.operation_timeout_ms = value;
        provenance.insert("engine.operation_timeout_ms".into(), source);
    }
}

fn apply_store(
    target: &mut StoreConfig,
    layer: StoreLayer,
    source: ConfigSource,
    provenance: &mut ProvenanceMap,
) -> Result<()> {
    if let Some(value) = layer.kind {
        target.kind = value
            .parse::<StoreKind>()
            .with_context(|| format!("invalid store.kind from {source:?}"))?;
        provenance.insert("store.kind".into(), source);
    }
    if let Some(value) = layer.default_expire_in_secs {
        target.default_expire_in_secs = value;
        provenance.insert("store.default_expire_in_secs".into(), source);
    }
    if let Some(azure) = layer.azure {
        apply_azure(&mut target.azure, azure, source, provenance);
    }
    Ok(())
}

fn apply_azure(
    target: &mut AzureSettings,
    layer: AzureLayer,
    source: ConfigSource,
    provenance: &mut ProvenanceMap,
) {
    if let Some(value) = layer.vault_url {
        target.vault_url = Some(value);
        provenance.insert("store.azure.vault_url".into(), source);
    }
    if let Some(value) = layer.http_timeout_secs {
        target.http_timeout_secs = value;
        provenance.insert("store.azure.http_timeout_secs".into(), source);
    }
    if let Some(value) = layer.purge_poll_attempts {
        target.purge_poll_attempts = value;
        provenance.insert("store.azure.purge_poll_attempts".into(), source);
    }
    if let Some(value) = layer.purge_poll_interval_ms {
        target.purge_poll_interval_ms = value;
        provenance.insert("store.azure.purge_poll_interval_ms".into(), source);
    }
}

fn apply_telemetry(
    target: &mut TelemetrySettings,
    layer: TelemetryLayer,
    source: ConfigSource,
    provenance: &mut ProvenanceMap,
) {
    if let Some(value) = layer.filter {
        target.filter = value;
        provenance.insert("telemetry.filter".into(), source);
    }
    if let Some(value) = layer.json {
        target.json = value;
        provenance.insert("telemetry.json".into(), source);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn later_layer_overrides_and_records_source() {
        let mut config = BrokerConfig::default();
        let mut provenance = ProvenanceMap::new();

        let file = BrokerConfigLayer {
            engine: Some(EngineLayer {
                operation_timeout_ms: Some(2_000),
            }),
            ..Default::default()
        };
        apply_layer(&mut config, file, ConfigSource::ProjectConfig, &mut provenance).unwrap();

        let env = BrokerConfigLayer {
            engine: Some(EngineLayer {
                operation_timeout_ms: Some(3_000),
            }),
            ..Default::default()
        };
        apply_layer(&mut config, env, ConfigSource::Env, &mut provenance).unwrap();

        assert_eq!(config.engine.operation_timeout_ms, 3_000);
        assert_eq!(
            provenance.get("engine.operation_timeout_ms"),
            Some(&ConfigSource::Env)
        );
        assert!(!provenance.contains_key("http.bind"));
    }

    #[test]
    fn bad_bind_address_names_its_source() {
        let mut config = BrokerConfig::default();
        let mut provenance = ProvenanceMap::new();
        let layer = BrokerConfigLayer {
            http: Some(HttpLayer {
                bind: Some("not-an-address".into()),
            }),
            ..Default::default()
        };
        let err = apply_layer(&mut config, layer, ConfigSource::Cli, &mut provenance)
            .unwrap_err()
            .to_string();
        assert!(err.contains("http.bind"));
        assert!(err.contains("Cli"));
    }
}
