use serial_test::serial;
use snapsecret_broker::config::{CliOverrides, ConfigResolver, ConfigSource, StoreKind};
use std::fs;
use std::time::Duration;
use tempfile::TempDir;

fn project_with_config(contents: &str) -> TempDir {
    let dir = TempDir::new().expect("tempdir");
    fs::write(dir.path().join("snapsecret.toml"), contents).expect("write config");
    dir
}

#[test]
#[serial]
fn project_file_is_picked_up() {
    let dir = project_with_config(
        r#"
[http]
bind = "127.0.0.1:7000"

[engine]
operation_timeout_ms = 2500

[store]
kind = "memory"
default_expire_in_secs = 600
"#,
    );
    let resolved = ConfigResolver::new()
        .with_project_root(dir.path().to_path_buf())
        .load()
        .expect("config");

    assert_eq!(resolved.config.http.bind.port(), 7000);
    assert_eq!(
        resolved.config.engine.operation_timeout(),
        Duration::from_millis(2500)
    );
    assert_eq!(
        resolved.config.store.default_expire_in(),
        Duration::from_secs(600)
    );
    assert_eq!(
        resolved.provenance["engine.operation_timeout_ms"],
        ConfigSource::ProjectConfig
    );
    assert_eq!(resolved.provenance["telemetry.filter"], ConfigSource::Default);
}

#[test]
#[serial]
fn env_overrides_file_and_cli_overrides_env() {
    let dir = project_with_config("[store]\nkind = \"memory\"\n");
    unsafe {
        std::env::set_var("SNAPSECRET_STORE", "azure");
        std::env::set_var("SNAPSECRET_AZURE_VAULT_URL", "https://env.vault.azure.net");
    }
    let resolved = ConfigResolver::new()
        .with_project_root(dir.path().to_path_buf())
        .with_cli_overrides(CliOverrides {
            vault_url: Some("https://cli.vault.azure.net".into()),
            ..Default::default()
        })
        .load();
    unsafe {
        std::env::remove_var("SNAPSECRET_STORE");
        std::env::remove_var("SNAPSECRET_AZURE_VAULT_URL");
    }

    let resolved = resolved.expect("config");
    assert_eq!(resolved.config.store.kind, StoreKind::Azure);
    assert_eq!(resolved.provenance["store.kind"], ConfigSource::Env);
    assert_eq!(
        resolved.config.store.azure.vault_url.as_deref(),
        Some("https://cli.vault.azure.net")
    );
    assert_eq!(
        resolved.provenance["store.azure.vault_url"],
        ConfigSource::Cli
    );
}

#[test]
#[serial]
fn explicit_json_config_path_wins_over_project_file() {
    let dir = project_with_config("[telemetry]\nfilter = \"warn\"\n");
    let json_path = dir.path().join("override.json");
    fs::write(&json_path, r#"{"telemetry": {"filter": "debug", "json": false}}"#).unwrap();

    let resolved = ConfigResolver::new()
        .with_project_root(dir.path().to_path_buf())
        .with_config_path(json_path)
        .load()
        .expect("config");
    assert_eq!(resolved.config.telemetry.filter, "debug");
    assert!(!resolved.config.telemetry.json);
    assert_eq!(
        resolved.provenance["telemetry.filter"],
        ConfigSource::OverrideConfig
    );
}

#[test]
#[serial]
fn zero_timeout_is_a_warning_not_an_error() {
    let dir = project_with_config("[engine]\noperation_timeout_ms = 0\n");
    let resolved = ConfigResolver::new()
        .with_project_root(dir.path().to_path_buf())
        .load()
        .expect("config");
    assert_eq!(resolved.warnings.len(), 1);
    assert_eq!(
        resolved.config.engine.operation_timeout(),
        Duration::from_secs(10)
    );
    let report = resolved.explain().to_string();
    assert!(report.contains("warning: engine.operation_timeout_ms=0"));
    assert!(report.contains("operation_timeout_ms = 0 (ProjectConfig) -> default 10s"));
}

#[test]
#[serial]
fn missing_explicit_config_fails() {
    let dir = TempDir::new().unwrap();
    let result = ConfigResolver::new()
        .with_project_root(dir.path().to_path_buf())
        .with_config_path(dir.path().join("absent.toml"))
        .load();
    assert!(result.is_err());
}
