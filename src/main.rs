use std::env;

use clap::Parser;
use tracing_subscriber::prelude::*;
use tracing_subscriber::{EnvFilter, fmt};

use cardbox::cli::commands::Cli;
use cardbox::cli::handlers;
use cardbox::io::config_io;
use cardbox::model::LogConfig;

/// Install the stderr subscriber. `CARDBOX_LOG` and `CARDBOX_LOG_FORMAT`
/// override the workspace's `[log]` settings.
fn init_tracing(log: &LogConfig) {
    let filter = EnvFilter::try_from_env("CARDBOX_LOG")
        .or_else(|_| EnvFilter::try_new(&log.filter))
        .unwrap_or_else(|_| EnvFilter::new("cardbox=warn"));

    let format = env::var("CARDBOX_LOG_FORMAT").unwrap_or_else(|_| log.format.clone());

    let registry = tracing_subscriber::registry().with(filter);

    match format.as_str() {
        "json" => {
            registry
                .with(fmt::layer().json().with_ansi(false).with_writer(std::io::stderr))
                .init();
        }
        _ => {
            registry
                .with(fmt::layer().compact().with_writer(std::io::stderr))
                .init();
        }
    }
}

fn main() {
    let cli = Cli::parse();

    // Logging settings come from the workspace when there is one.
    let log = handlers::start_dir(cli.project_dir.as_deref())
        .ok()
        .and_then(|start| config_io::load_workspace(&start).ok())
        .map(|ws| ws.config.log)
        .unwrap_or_default();
    init_tracing(&log);

    if let Err(e) = handlers::dispatch(cli) {
        eprintln!("error: {}", e);
        std::process::exit(1);
    }
}
