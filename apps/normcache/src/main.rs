//! # normcache
//!
//! The main binary for the normcache entity store.
//!
//! ## Usage
//!
//! ```bash
//! normcache init
//! normcache write -d hero.document.json -r hero.result.json
//! normcache read -d hero.document.json --json-mode
//! normcache inspect -i Human:1000
//! normcache export -o store.bin
//! ```

use clap::Parser;
use normcache::cli;
use normcache::config::{Config, LogFormat};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

// =============================================================================
// APPLICATION ENTRY POINT
// =============================================================================

fn main() {
    let cli = cli::Cli::parse();

    // The config decides the log format, so it is loaded before tracing exists.
    let config = match cli::resolve_config(&cli) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Error: {}", e);
            std::process::exit(1);
        }
    };

    init_tracing(&config, cli.verbose);

    if let Err(e) = cli::execute(cli.command, &config, cli.json_mode) {
        tracing::error!("Error: {}", e);
        std::process::exit(1);
    }
}

/// NORMCACHE_LOG (or RUST_LOG) sets the filter; NORMCACHE_LOG_FORMAT=json
/// overrides `[log] format`.
fn init_tracing(config: &Config, verbose: bool) {
    let default_filter = if verbose {
        "normcache=debug,normcache_core=debug"
    } else {
        "normcache=info,normcache_core=info"
    };
    let filter = tracing_subscriber::EnvFilter::try_from_env("NORMCACHE_LOG")
        .or_else(|_| tracing_subscriber::EnvFilter::try_from_default_env())
        .unwrap_or_else(|_| default_filter.into());

    let format = match std::env::var("NORMCACHE_LOG_FORMAT").as_deref() {
        Ok("json") => LogFormat::Json,
        Ok("text") => LogFormat::Text,
        _ => config.log.format,
    };

    match format {
        LogFormat::Json => {
            tracing_subscriber::registry()
                .with(filter)
                .with(tracing_subscriber::fmt::layer().json().with_writer(std::io::stderr))
                .init();
        }
        LogFormat::Text => {
            tracing_subscriber::registry()
                .with(filter)
                .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
                .init();
        }
    }
}
