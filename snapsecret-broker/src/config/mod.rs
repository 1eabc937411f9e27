//! Layered broker configuration.
//!
//! Values resolve in this order, later layers winning: built-in defaults,
//! the config file (`snapsecret.toml` in the project root or an explicit
//! `--config` path, TOML or JSON), `SNAPSECRET_*` environment variables and
//! finally CLI flags. The source of every key is kept in [`ProvenanceMap`].

mod explain;
mod loaders;
mod merge;
mod validate;

use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::net::{Ipv4Addr, SocketAddr};
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

pub use explain::ExplainReport;
pub use loaders::{PROJECT_CONFIG_FILE, load_from_file};

pub type ProvenancePath = String;
pub type ProvenanceMap = BTreeMap<ProvenancePath, ConfigSource>;

pub const DEFAULT_BIND_PORT: u16 = 8080;
pub const DEFAULT_OPERATION_TIMEOUT_MS: u64 = 10_000;
pub const DEFAULT_EXPIRE_IN_SECS: u64 = 60 * 60;
pub const DEFAULT_AZURE_HTTP_TIMEOUT_SECS: u64 = 15;
pub const DEFAULT_PURGE_POLL_ATTEMPTS: u32 = 10;
pub const DEFAULT_PURGE_POLL_INTERVAL_MS: u64 = 500;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ConfigSource {
    Default,
    ProjectConfig,
    OverrideConfig,
    Env,
    Cli,
}

/// Which [`snapsecret_spec::SecretsStore`] backs the broker.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StoreKind {
    Memory,
    Azure,
}

impl StoreKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            StoreKind::Memory => "memory",
            StoreKind::Azure => "azure",
        }
    }
}

impl fmt::Display for StoreKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for StoreKind {
    type Err = anyhow::Error;

    fn from_str(value: &str) -> Result<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "memory" | "dev" => Ok(StoreKind::Memory),
            "azure" | "azure-kv" => Ok(StoreKind::Azure),
            other => Err(anyhow::anyhow!(
                "unsupported store kind `{other}` (expected `memory` or `azure`)"
            )),
        }
    }
}

#[derive(Debug, Clone)]
pub struct HttpConfig {
    pub bind: SocketAddr,
}

#[derive(Debug, Clone)]
pub struct EngineSettings {
    pub operation_timeout_ms: u64,
}

impl EngineSettings {
    /// Zero falls back to the default; validation reports it.
    pub fn operation_timeout(&self) -> Duration {
        Duration::from_millis(non_zero_or(
            self.operation_timeout_ms,
            DEFAULT_OPERATION_TIMEOUT_MS,
        ))
    }
}

#[derive(Debug, Clone)]
pub struct AzureSettings {
    pub vault_url: Option<String>,
    pub http_timeout_secs: u64,
    pub purge_poll_attempts: u32,
    pub purge_poll_interval_ms: u64,
}

impl AzureSettings {
    pub fn http_timeout(&self) -> Duration {
        Duration::from_secs(non_zero_or(
            self.http_timeout_secs,
            DEFAULT_AZURE_HTTP_TIMEOUT_SECS,
        ))
    }

    pub fn purge_poll_interval(&self) -> Duration {
        Duration::from_millis(self.purge_poll_interval_ms)
    }
}

#[derive(Debug, Clone)]
pub struct StoreConfig {
    pub kind: StoreKind,
    pub default_expire_in_secs: u64,
    pub azure: AzureSettings,
}

impl StoreConfig {
    pub fn default_expire_in(&self) -> Duration {
        Duration::from_secs(non_zero_or(
            self.default_expire_in_secs,
            DEFAULT_EXPIRE_IN_SECS,
        ))
    }
}

#[derive(Debug, Clone)]
pub struct TelemetrySettings {
    pub filter: String,
    pub json: bool,
}

/// Fully resolved broker settings.
#[derive(Debug, Clone)]
pub struct BrokerConfig {
    pub http: HttpConfig,
    pub engine: EngineSettings,
    pub store: StoreConfig,
    pub telemetry: TelemetrySettings,
}

impl Default for BrokerConfig {
    fn default() -> Self {
        Self {
            http: HttpConfig {
                bind: SocketAddr::from((Ipv4Addr::UNSPECIFIED, DEFAULT_BIND_PORT)),
            },
            engine: EngineSettings {
                operation_timeout_ms: DEFAULT_OPERATION_TIMEOUT_MS,
            },
            store: StoreConfig {
                kind: StoreKind::Memory,
                default_expire_in_secs: DEFAULT_EXPIRE_IN_SECS,
                azure: AzureSettings {
                    vault_url: None,
                    http_timeout_secs: DEFAULT_AZURE_HTTP_TIMEOUT_SECS,
                    purge_poll_attempts: DEFAULT_PURGE_POLL_ATTEMPTS,
                    purge_poll_interval_ms: DEFAULT_PURGE_POLL_INTERVAL_MS,
                },
            },
            telemetry: TelemetrySettings {
                filter: "info".to_string(),
                json: true,
            },
        }
    }
}

fn non_zero_or(value: u64, default: u64) -> u64 {
    if value == 0 { default } else { value }
}

/// Partial configuration as read from one source.
#[derive(Default, Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct BrokerConfigLayer {
    pub http: Option<HttpLayer>,
    pub engine: Option<EngineLayer>,
    pub store: Option<StoreLayer>,
    pub telemetry: Option<TelemetryLayer>,
}

#[derive(Default, Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct HttpLayer {
    pub bind: Option<String>,
}

#[derive(Default, Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct EngineLayer {
    pub operation_timeout_ms: Option<u64>,
}

#[derive(Default, Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct StoreLayer {
    pub kind: Option<String>,
    pub default_expire_in_secs: Option<u64>,
    pub azure: Option<AzureLayer>,
}

#[derive(Default, Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct AzureLayer {
    pub vault_url: Option<String>,
    pub http_timeout_secs: Option<u64>,
    pub purge_poll_attempts: Option<u32>,
    pub purge_poll_interval_ms: Option<u64>,
}

#[derive(Default, Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TelemetryLayer {
    pub filter: Option<String>,
    pub json: Option<bool>,
}

/// Values supplied on the command line.
#[derive(Default, Debug, Clone)]
pub struct CliOverrides {
    pub config_path: Option<PathBuf>,
    pub bind: Option<String>,
    pub store: Option<String>,
    pub vault_url: Option<String>,
    pub log_filter: Option<String>,
}

pub struct ConfigResolver {
    project_root: PathBuf,
    cli_overrides: CliOverrides,
}

impl ConfigResolver {
    pub fn new() -> Self {
        Self {
            project_root: std::env::current_dir().unwrap_or_else(|_| PathBuf::from(".")),
            cli_overrides: CliOverrides::default(),
        }
    }

    pub fn with_project_root(mut self, root: PathBuf) -> Self {
        self.project_root = root;
        self
    }

    pub fn with_config_path(mut self, path: PathBuf) -> Self {
        self.cli_overrides.config_path = Some(path);
        self
    }

    pub fn with_cli_overrides(mut self, overrides: CliOverrides) -> Self {
        self.cli_overrides = overrides;
        self
    }

    pub fn load(&self) -> Result<ResolvedConfig> {
        let mut config = BrokerConfig::default();
        let mut provenance = default_provenance();

        let override_path = self.cli_overrides.config_path.as_deref();
        if let Some(file_layer) = loaders::load_project_layer(&self.project_root, override_path)? {
            let source = if override_path.is_some() {
                ConfigSource::OverrideConfig
            } else {
                ConfigSource::ProjectConfig
            };
            merge::apply_layer(&mut config, file_layer, source, &mut provenance)?;
        }

        merge::apply_layer(
            &mut config,
            loaders::env_layer(),
            ConfigSource::Env,
            &mut provenance,
        )?;

        if let Some(cli_layer) = cli_layer(&self.cli_overrides) {
            merge::apply_layer(&mut config, cli_layer, ConfigSource::Cli, &mut provenance)?;
        }

        validate::check(&config)?;
        let warnings = validate::warnings(&config);

        Ok(ResolvedConfig {
            config,
            provenance,
            warnings,
        })
    }
}

impl Default for ConfigResolver {
    fn default() -> Self {
        Self::new()
    }
}

fn cli_layer(overrides: &CliOverrides) -> Option<BrokerConfigLayer> {
    let mut layer = BrokerConfigLayer::default();
    if let Some(bind) = overrides.bind.as_ref() {
        layer.http.get_or_insert_with(Default::default).bind = Some(bind.clone());
    }
    if let Some(kind) = overrides.store.as_ref() {
        layer.store.get_or_insert_with(Default::default).kind = Some(kind.clone());
    }
    if let Some(url) = overrides.vault_url.as_ref() {
        layer
            .store
            .get_or_insert_with(Default::default)
            .azure
            .get_or_insert_with(Default::default)
            .vault_url = Some(url.clone());
    }
    if let Some(filter) = overrides.log_filter.as_ref() {
        layer.telemetry.get_or_insert_with(Default::default).filter = Some(filter.clone());
    }

    if layer.http.is_some() || layer.store.is_some() || layer.telemetry.is_some() {
        Some(layer)
    } else {
        None
    }
}

const CONFIG_KEYS: &[&str] = &[
    "http.bind",
    "engine.operation_timeout_ms",
    "store.kind",
    "store.default_expire_in_secs",
    "store.azure.vault_url",
    "store.azure.http_timeout_secs",
    "store.azure.purge_poll_attempts",
    "store.azure.purge_poll_interval_ms",
    "telemetry.filter",
    "telemetry.json",
];

fn default_provenance() -> ProvenanceMap {
    CONFIG_KEYS
        .iter()
        .map(|key| (key.to_string(), ConfigSource::Default))
        .collect()
}

pub struct ResolvedConfig {
    pub config: BrokerConfig,
    pub provenance: ProvenanceMap,
    pub warnings: Vec<String>,
}

impl ResolvedConfig {
    pub fn explain(&self) -> ExplainReport<'_> {
        ExplainReport::new(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;
    use tempfile::tempdir;

    #[test]
    #[serial]
    fn defaults_without_any_source() {
        let dir = tempdir().unwrap();
        let resolved = ConfigResolver::new()
            .with_project_root(dir.path().to_path_buf())
            .load()
            .expect("config");
        assert_eq!(resolved.config.http.bind.port(), 8080);
        assert_eq!(resolved.config.store.kind, StoreKind::Memory);
        assert_eq!(
            resolved.config.engine.operation_timeout(),
            Duration::from_secs(10)
        );
        assert_eq!(
            resolved.config.store.default_expire_in(),
            Duration::from_secs(3600)
        );
        assert!(
            resolved
                .provenance
                .values()
                .all(|source| *source == ConfigSource::Default)
        );
    }

    #[test]
    #[serial]
    fn precedence_applies_cli_over_env() {
        let dir = tempdir().unwrap();
        unsafe {
            std::env::set_var("SNAPSECRET_HTTP_BIND", "127.0.0.1:9000");
        }
        let resolved = ConfigResolver::new()
            .with_project_root(dir.path().to_path_buf())
            .with_cli_overrides(CliOverrides {
                bind: Some("127.0.0.1:9100".into()),
                ..Default::default()
            })
            .load();
        unsafe {
            std::env::remove_var("SNAPSECRET_HTTP_BIND");
        }
        let resolved = resolved.expect("config");
        assert_eq!(resolved.config.http.bind.port(), 9100);
        assert_eq!(resolved.provenance["http.bind"], ConfigSource::Cli);
    }

    #[test]
    #[serial]
    fn azure_without_vault_url_is_rejected() {
        let dir = tempdir().unwrap();
        let result = ConfigResolver::new()
            .with_project_root(dir.path().to_path_buf())
            .with_cli_overrides(CliOverrides {
                store: Some("azure".into()),
                ..Default::default()
            })
            .load();
        let err = result.err().expect("azure without vault url must fail");
        assert!(err.to_string().contains("vault_url"));
    }

    #[test]
    fn store_kind_parses_aliases() {
        assert_eq!("Memory".parse::<StoreKind>().unwrap(), StoreKind::Memory);
        assert_eq!("azure-kv".parse::<StoreKind>().unwrap(), StoreKind::Azure);
        assert!("redis".parse::<StoreKind>().is_err());
    }
}
