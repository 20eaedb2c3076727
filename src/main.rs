// src/main.rs

//! The main entry point for the modproxy daemon.

use anyhow::Result;
use modproxy::config::Config;
use modproxy::server;
use std::env;
use std::path::Path;
use tracing::error;
use tracing_subscriber::filter::EnvFilter;

#[tokio::main]
async fn main() -> Result<()> {
    run_app().await
}

async fn run_app() -> Result<()> {
    const VERSION: &str = env!("CARGO_PKG_VERSION");

    let args: Vec<String> = env::args().collect();

    if args.contains(&"--version".to_string()) {
        println!("modproxy version {VERSION}");
        return Ok(());
    }

    // The configuration file is optional; flags alone are enough to run.
    // An explicitly passed --config that fails to load is fatal.
    let explicit_config = args
        .iter()
        .position(|arg| arg == "--config")
        .and_then(|i| args.get(i + 1))
        .map(|s| s.as_str());

    let mut config = match explicit_config {
        Some(path) => match Config::from_file(path) {
            Ok(cfg) => cfg,
            Err(e) => {
                eprintln!("Failed to load configuration from \"{path}\": {e}");
                std::process::exit(1);
            }
        },
        None if Path::new("modproxy.toml").is_file() => match Config::from_file("modproxy.toml") {
            Ok(cfg) => cfg,
            Err(e) => {
                eprintln!("Failed to load configuration from \"modproxy.toml\": {e}");
                std::process::exit(1);
            }
        },
        None => Config::default(),
    };

    // Command-line flags override the file-based configuration.
    if let Some(listen) = flag_value(&args, "--listen") {
        config.listen = listen;
    }
    if let Some(cachedir) = flag_value(&args, "--cachedir") {
        config.cachedir = cachedir;
    }
    if let Some(proxy) = flag_value(&args, "--proxy") {
        config.proxy = Some(proxy);
    }
    if let Some(exclude) = flag_value(&args, "--exclude") {
        config.exclude = Some(exclude);
    }

    // Setup logging. RUST_LOG takes precedence over the configured level.
    let log_level = std::env::var("RUST_LOG").unwrap_or_else(|_| config.log_level.clone());
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new(log_level))
        .compact()
        .with_ansi(true)
        .init();

    if let Err(e) = server::run(config).await {
        error!("Server runtime error: {}", e);
        return Err(e);
    }

    Ok(())
}

/// Returns the value following a `--flag` argument, if present.
fn flag_value(args: &[String], flag: &str) -> Option<String> {
    args.iter()
        .position(|arg| arg == flag)
        .and_then(|i| args.get(i + 1))
        .cloned()
}
