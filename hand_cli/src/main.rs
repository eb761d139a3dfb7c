mod cli;
mod error_fmt;
mod rt;
mod run;

use clap::Parser;
use eyre::WrapErr;
use std::path::Path;

use crate::cli::{Cli, Commands, FILE_GUARD, JSON_MODE};
use crate::error_fmt::{exit_code_for_error, format_error_json, humanize};
use crate::run::{RunOpts, build_hand, cmd_health, cmd_run, cmd_self_check, load_config, settings_from};

fn main() {
    let cli = Cli::parse();
    let _ = JSON_MODE.set(cli.json);
    let _ = color_eyre::install();

    if let Err(err) = real_main(cli) {
        if JSON_MODE.get().copied().unwrap_or(false) {
            println!("{}", format_error_json(&err));
        } else {
            eprintln!("{}", humanize(&err));
        }
        tracing::error!(error = %err, "exiting");
        std::process::exit(exit_code_for_error(&err));
    }
}

fn real_main(cli: Cli) -> eyre::Result<()> {
    // Health reports a broken config instead of failing before it prints.
    if let Commands::Health = cli.cmd {
        init_tracing(cli.json, &cli.log_level, &hand_config::Logging::default())?;
        return match load_config(&cli.config) {
            Ok(cfg) => cmd_health(Some(&cfg), None),
            Err(e) => cmd_health(None, Some(&e)),
        };
    }

    let cfg = load_config(&cli.config)?;
    init_tracing(cli.json, &cli.log_level, &cfg.logging)?;
    tracing::debug!(config = %cli.config.display(), "config loaded");

    let settings = settings_from(&cfg, cli.calibration.as_deref())?;
    let (hand, backend) = build_hand(&cfg, settings)?;
    tracing::info!(backend = backend.name(), "hand ready");

    match cli.cmd {
        Commands::Run {
            instructions,
            pose,
            stdin,
            duration_ms,
            rt,
        } => {
            let opts = RunOpts {
                instructions,
                pose,
                stdin,
                duration_ms,
                rt,
            };
            cmd_run(&hand, &opts, cli.json)
        }
        Commands::SelfCheck => cmd_self_check(&hand, cli.json),
        Commands::Health => Ok(()),
    }
}

/// Console logs go to stderr so stdout stays machine-readable.
fn init_tracing(json: bool, level: &str, logging: &hand_config::Logging) -> eyre::Result<()> {
    use tracing_subscriber::{EnvFilter, Layer, fmt, layer::SubscriberExt, util::SubscriberInitExt};

    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(level))
        .wrap_err_with(|| format!("invalid log level {level:?}"))?;
    let console = if json {
        fmt::layer().json().with_writer(std::io::stderr).boxed()
    } else {
        fmt::layer()
            .with_writer(std::io::stderr)
            .with_target(false)
            .boxed()
    };

    let file_layer = match &logging.file {
        Some(path) => {
            let path = Path::new(path);
            let dir = path
                .parent()
                .filter(|p| !p.as_os_str().is_empty())
                .unwrap_or_else(|| Path::new("."));
            let name = path
                .file_name()
                .ok_or_else(|| eyre::eyre!("logging.file has no file name: {}", path.display()))?;
            let appender = match logging.rotation.as_deref().unwrap_or("never") {
                "daily" => tracing_appender::rolling::daily(dir, name),
                "hourly" => tracing_appender::rolling::hourly(dir, name),
                _ => tracing_appender::rolling::never(dir, name),
            };
            let (writer, guard) = tracing_appender::non_blocking(appender);
            let _ = FILE_GUARD.set(guard);
            let file_filter = EnvFilter::try_new(logging.level.as_deref().unwrap_or("info"))
                .wrap_err("invalid logging.level")?;
            Some(
                fmt::layer()
                    .json()
                    .with_ansi(false)
                    .with_writer(writer)
                    .with_filter(file_filter)
                    .boxed(),
            )
        }
        None => None,
    };

    tracing_subscriber::registry()
        .with(console.with_filter(filter))
        .with(file_layer)
        .try_init()
        .map_err(|e| eyre::eyre!("init tracing: {e}"))
}
