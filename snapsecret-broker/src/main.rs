use clap::Parser;
use snapsecret_broker::config::{CliOverrides, ConfigResolver};
use std::path::PathBuf;
use std::process;
use tracing::warn;

#[derive(Parser)]
#[command(name = "snapsecret-broker", version, about = "Burn-after-reading secrets over HTTP")]
struct BrokerArgs {
    /// Override config file path
    #[arg(long)]
    config: Option<PathBuf>,
    /// Override bind address
    #[arg(long)]
    bind: Option<String>,
    /// Secrets store backend (`memory` or `azure`)
    #[arg(long)]
    store: Option<String>,
    /// Azure Key Vault URL
    #[arg(long)]
    vault_url: Option<String>,
    /// Log filter directive, e.g. `info,snapsecret_core=debug`
    #[arg(long)]
    log: Option<String>,
    /// Print where each setting came from
    #[arg(long)]
    verbose: bool,
}

#[tokio::main]
async fn main() {
    if let Err(err) = real_main().await {
        eprintln!("broker exited with error: {err:#}");
        process::exit(1);
    }
}

async fn real_main() -> anyhow::Result<()> {
    let args = BrokerArgs::parse();
    let overrides = CliOverrides {
        config_path: args.config,
        bind: args.bind,
        store: args.store,
        vault_url: args.vault_url,
        log_filter: args.log,
    };
    let resolved = ConfigResolver::new().with_cli_overrides(overrides).load()?;
    if args.verbose {
        println!("{}", resolved.explain());
    }

    snapsecret_broker::telemetry::init(
        &resolved.config.telemetry.filter,
        resolved.config.telemetry.json,
    )?;
    for warning in &resolved.warnings {
        warn!(%warning, "configuration warning");
    }

    snapsecret_broker::run(resolved.config).await
}
