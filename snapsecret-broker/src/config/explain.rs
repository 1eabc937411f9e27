use super::{ConfigSource, ResolvedConfig, StoreKind};
use std::fmt;
use std::time::Duration;

struct Setting {
    key: &'static str,
    value: String,
    /// Set when a zero value is replaced by the built-in default.
    fallback: Option<Duration>,
}

impl Setting {
    fn plain(key: &'static str, value: impl fmt::Display) -> Self {
        Self {
            key,
            value: value.to_string(),
            fallback: None,
        }
    }

    fn timeout(key: &'static str, configured: u64, effective: Duration) -> Self {
        Self {
            key,
            value: configured.to_string(),
            fallback: (configured == 0).then_some(effective),
        }
    }

    /// `("store.azure", "vault_url")` for `store.azure.vault_url`.
    fn section_and_name(&self) -> (&'static str, &'static str) {
        self.key.rsplit_once('.').unwrap_or(("", self.key))
    }
}

/// `--verbose` rendering of the resolved settings, one block per section.
///
/// Azure settings are only listed when the azure store is selected.
pub struct ExplainReport<'a> {
    resolved: &'a ResolvedConfig,
}

impl<'a> ExplainReport<'a> {
    pub(super) fn new(resolved: &'a ResolvedConfig) -> Self {
        Self { resolved }
    }

    fn settings(&self) -> Vec<Setting> {
        let cfg = &self.resolved.config;
        let mut settings = vec![
            Setting::plain("http.bind", cfg.http.bind),
            Setting::timeout(
                "engine.operation_timeout_ms",
                cfg.engine.operation_timeout_ms,
                cfg.engine.operation_timeout(),
            ),
            Setting::plain("store.kind", cfg.store.kind),
            Setting::timeout(
                "store.default_expire_in_secs",
                cfg.store.default_expire_in_secs,
                cfg.store.default_expire_in(),
            ),
        ];
        if cfg.store.kind == StoreKind::Azure {
            let azure = &cfg.store.azure;
            settings.extend([
                Setting::plain(
                    "store.azure.vault_url",
                    azure.vault_url.as_deref().unwrap_or("<unset>"),
                ),
                Setting::timeout(
                    "store.azure.http_timeout_secs",
                    azure.http_timeout_secs,
                    azure.http_timeout(),
                ),
                Setting::plain("store.azure.purge_poll_attempts", azure.purge_poll_attempts),
                Setting::plain(
                    "store.azure.purge_poll_interval_ms",
                    azure.purge_poll_interval_ms,
                ),
            ]);
        }
        settings.push(Setting::plain("telemetry.filter", &cfg.telemetry.filter));
        settings.push(Setting::plain("telemetry.json", cfg.telemetry.json));
        settings
    }

    fn source(&self, key: &str) -> ConfigSource {
        self.resolved
            .provenance
            .get(key)
            .copied()
            .unwrap_or(ConfigSource::Default)
    }
}

impl fmt::Display for ExplainReport<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut current = None;
        for setting in self.settings() {
            let (section, name) = setting.section_and_name();
            if current != Some(section) {
                writeln!(f, "[{section}]")?;
                current = Some(section);
            }
            write!(f, "  {name} = {} ({:?})", setting.value, self.source(setting.key))?;
            if let Some(effective) = setting.fallback {
                write!(f, " -> default {effective:?}")?;
            }
            writeln!(f)?;
        }
        for warning in &self.resolved.warnings {
            writeln!(f, "warning: {warning}")?;
        }
        Ok(())
    }
}
