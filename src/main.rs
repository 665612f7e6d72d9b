use clap::Parser;
use propcal::cli::{self, Cli};
use propcal::config::{AppConfig, LoggingConfig};
use std::path::{Path, PathBuf};
use tracing_appender::non_blocking::WorkerGuard;
use tracing::{debug, warn};
use tracing_subscriber::EnvFilter;

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let config = if cli.config.is_dir() {
        AppConfig::load_from(&cli.config)?
    } else {
        AppConfig::default_config()
    };

    // Held until exit so buffered file logs are flushed
    let _log_guard = if cli.command.is_quiet() {
        init_logging_simple();
        None
    } else {
        init_logging(&config.logging)
    };

    if let Err(errors) = config.validate() {
        for error in &errors {
            warn!("config: {error}");
        }
        anyhow::bail!("invalid configuration ({} error(s))", errors.len());
    }
    debug!(config_dir = %cli.config.display(), "configuration loaded");

    cli::run(&cli, config)
}

/// Console logging plus an optional daily-rotated file under
/// `PROPCAL_LOG_DIR` (or `logging.dir`).
fn init_logging(logging: &LoggingConfig) -> Option<WorkerGuard> {
    use tracing_subscriber::layer::SubscriberExt;
    use tracing_subscriber::util::SubscriberInitExt;

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        EnvFilter::new(format!("{},propcal=debug", logging.level.to_ascii_lowercase()))
    });

    let log_dir: Option<PathBuf> = std::env::var("PROPCAL_LOG_DIR")
        .ok()
        .map(Into::into)
        .or_else(|| logging.dir.clone());

    // `tracing_appender::rolling::daily` panics if it can't create the
    // initial log file, so preflight writability first.
    let mut guard = None;
    let file_layer = log_dir.as_deref().and_then(|dir: &Path| {
        if let Err(e) = std::fs::create_dir_all(dir) {
            eprintln!(
                "Warning: Could not create log directory {} ({}), file logging disabled",
                dir.display(),
                e
            );
            return None;
        }
        let test_path = dir.join(".propcal_write_test");
        match std::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&test_path)
        {
            Ok(_) => {
                let _ = std::fs::remove_file(&test_path);

                let file_appender = tracing_appender::rolling::daily(dir, "propcal.log");
                let (non_blocking, file_guard) = tracing_appender::non_blocking(file_appender);
                guard = Some(file_guard);

                Some(
                    tracing_subscriber::fmt::layer()
                        .with_writer(non_blocking)
                        .with_ansi(false)
                        .with_target(true),
                )
            }
            Err(e) => {
                eprintln!(
                    "Warning: Could not write to log directory {} ({}), file logging disabled",
                    dir.display(),
                    e
                );
                None
            }
        }
    });

    let (json_layer, console_layer) = if logging.json {
        (
            Some(
                tracing_subscriber::fmt::layer()
                    .json()
                    .with_writer(std::io::stderr),
            ),
            None,
        )
    } else {
        (
            None,
            Some(
                tracing_subscriber::fmt::layer()
                    .with_writer(std::io::stderr)
                    .with_target(true)
                    .with_thread_ids(false)
                    .with_file(false)
                    .with_line_number(false),
            ),
        )
    };

    let file_logging_enabled = file_layer.is_some();
    tracing_subscriber::registry()
        .with(filter)
        .with(console_layer)
        .with(json_layer)
        .with(file_layer)
        .init();

    if let (true, Some(dir)) = (file_logging_enabled, log_dir) {
        eprintln!("Logging to: {}/propcal.log", dir.display());
    }
    guard
}

fn init_logging_simple() {
    // Minimal logging for read-only commands
    let _ = tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_max_level(tracing::Level::WARN)
        .try_init();
}
