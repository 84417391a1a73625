//! rewind binary.
//!
//! # Usage
//!
//! ```bash
//! rewind list cluster.rwd --at 2024-05-01T12:00:00Z --kind po
//!
//! # Environment variables override the config file
//! REWIND__STORE__MAX_CHAIN_LENGTH=16 rewind stats cluster.rwd
//!
//! # CLI flags override environment variables
//! REWIND__STORE__DELTA_ALGORITHM=suffix rewind --algorithm zstd stats cluster.rwd
//! ```

use std::{
    io::{self, IsTerminal, Write},
    process::ExitCode,
};

use clap::Parser;
use rewind_cli::{
    Cli,
    commands,
    config::{CliConfig, LogFormat, resolved_config_path},
};
use rewind_state::KindRegistry;
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

fn main() -> ExitCode {
    let cli = Cli::parse();

    let config = match CliConfig::load(cli.config.as_deref())
        .and_then(|config| config.with_overrides(&cli.overrides()))
    {
        Ok(config) => config,
        Err(e) => {
            eprintln!("rewind: {e}");
            return ExitCode::FAILURE;
        },
    };

    init_logging(config.log_format);

    if resolved_config_path(cli.config.as_deref()).is_none() {
        tracing::warn!("No config file found, using defaults and REWIND__* overrides");
    }

    let registry = KindRegistry::with_builtin_kinds();
    let stdout = io::stdout();
    let mut out = stdout.lock();
    match commands::run(&cli.command, &config, &registry, &mut out).and_then(|()| {
        out.flush().map_err(|source| rewind_cli::CliError::Output { source })
    }) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!(error = %e, "Command failed");
            eprintln!("rewind: {e}");
            ExitCode::FAILURE
        },
    }
}

/// Initializes the tracing subscriber. Logs go to stderr so command output
/// on stdout stays machine-readable.
fn init_logging(format: LogFormat) {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    let use_json = match format {
        LogFormat::Json => true,
        LogFormat::Text => false,
        LogFormat::Auto => !io::stdout().is_terminal(),
    };

    if use_json {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(
                fmt::layer()
                    .json()
                    .flatten_event(true)
                    .with_current_span(false)
                    .with_writer(io::stderr),
            )
            .init();
    } else {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(fmt::layer().with_writer(io::stderr))
            .init();
    }
}
