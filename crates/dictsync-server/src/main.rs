use std::env;

use anyhow::Context;
use dictsync_server::DictRuntime;
use dictsync_server::config::loader::{DEFAULT_CONFIG_PATH, load_config};

/// How the configuration path was determined.
#[derive(Debug, Clone, Copy)]
enum ConfigSource {
    /// From --config CLI argument
    CliArgument,
    /// From DICTSYNC_CONFIG environment variable
    EnvironmentVariable,
    /// Default path (dictsync.toml)
    Default,
}

impl std::fmt::Display for ConfigSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::CliArgument => write!(f, "CLI argument (--config)"),
            Self::EnvironmentVariable => write!(f, "environment variable (DICTSYNC_CONFIG)"),
            Self::Default => write!(f, "default"),
        }
    }
}

#[tokio::main]
async fn main() {
    // Load .env file if present (before anything else)
    if let Err(e) = dotenvy::dotenv() {
        // Not an error if .env doesn't exist - it's optional
        if !matches!(e, dotenvy::Error::Io(ref io_err) if io_err.kind() == std::io::ErrorKind::NotFound)
        {
            eprintln!("Warning: Failed to load .env file: {e}");
        }
    }

    // Initialize tracing early with the default level
    dictsync_server::observability::init_tracing();

    let (config_path, source) = resolve_config_path();
    let cfg = match load_config(Some(&config_path)) {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Configuration error: {e}");
            std::process::exit(2);
        }
    };

    tracing::info!(
        path = %config_path,
        source = %source,
        "Configuration loaded"
    );
    dictsync_server::observability::apply_logging_level(&cfg.logging.level);

    if let Err(err) = run(&cfg).await {
        eprintln!("Server error: {err:#}");
        std::process::exit(1);
    }
}

async fn run(cfg: &dictsync_server::AppConfig) -> anyhow::Result<()> {
    let runtime = DictRuntime::start(cfg)
        .await
        .context("failed to start dictionary runtime")?;

    let snapshot = runtime.cache().snapshot();
    tracing::info!(
        ready = runtime.cache().is_ready(),
        entries = snapshot.as_ref().map_or(0, |s| s.len()),
        types = snapshot.as_ref().map_or(0, |s| s.type_count()),
        "Dictionary cache initialized"
    );

    tokio::signal::ctrl_c()
        .await
        .context("failed to listen for shutdown signal")?;
    tracing::info!("Shutdown signal received");

    runtime.shutdown().await;
    Ok(())
}

/// Resolve the configuration file path.
///
/// Priority order:
/// 1. CLI argument: --config <path>
/// 2. Environment variable: DICTSYNC_CONFIG
/// 3. Default: dictsync.toml
fn resolve_config_path() -> (String, ConfigSource) {
    let mut args = env::args().skip(1);
    while let Some(arg) = args.next() {
        if arg == "--config"
            && let Some(path) = args.next()
        {
            return (path, ConfigSource::CliArgument);
        }
    }

    if let Ok(path) = env::var("DICTSYNC_CONFIG")
        && !path.is_empty()
    {
        return (path, ConfigSource::EnvironmentVariable);
    }

    (DEFAULT_CONFIG_PATH.to_string(), ConfigSource::Default)
}
