use anyhow::Result;
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime};
use tracing::Level;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{EnvFilter, Layer, Registry, fmt, prelude::*};

use crate::config::Config;

const LOG_FILE_PREFIX: &str = "airpods-sanity.log";
const SECONDS_PER_DAY: u64 = 60 * 60 * 24;

/// Logging setup for one process
pub struct LoggingConfig {
    pub level: Level,
    pub file_output: bool,
    pub console_output: bool,
    pub log_dir: Option<PathBuf>,
    pub json_format: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: Level::INFO,
            file_output: true,
            console_output: true,
            log_dir: None,
            json_format: false,
        }
    }
}

impl LoggingConfig {
    /// Daemon logging from the config file; `verbose` forces debug.
    pub fn for_daemon(config: &Config, verbose: bool) -> Self {
        Self {
            level: effective_level(config, verbose),
            file_output: config.logging.file_output,
            console_output: true,
            log_dir: config.logging.directory.clone(),
            json_format: config.logging.json_format,
        }
    }

    /// One-shot commands log to the console only.
    pub fn for_command(config: &Config, verbose: bool) -> Self {
        Self {
            level: effective_level(config, verbose),
            file_output: false,
            console_output: true,
            log_dir: None,
            json_format: false,
        }
    }
}

fn effective_level(config: &Config, verbose: bool) -> Level {
    if verbose {
        Level::DEBUG
    } else {
        config.general.parsed_log_level().unwrap_or(Level::INFO)
    }
}

type BoxedLayer = Box<dyn Layer<Registry> + Send + Sync>;

/// Install the global subscriber. `RUST_LOG` replaces the configured level when set.
///
/// Returns the file writer guard, which must outlive logging, and the log directory in use
pub fn initialize_logging(config: LoggingConfig) -> Result<(Option<WorkerGuard>, Option<PathBuf>)> {
    let filter = crate_filter(config.level);

    let mut layers: Vec<BoxedLayer> = Vec::new();
    if config.console_output {
        layers.push(console_layer(config.json_format));
    }

    let mut guard = None;
    let mut log_dir = None;
    if config.file_output {
        let dir = match config.log_dir {
            Some(dir) => dir,
            None => get_default_log_dir()?,
        };
        std::fs::create_dir_all(&dir)?;

        let (layer, worker_guard) = file_layer(&dir, config.json_format);
        layers.push(layer);
        guard = Some(worker_guard);
        log_dir = Some(dir);
    }

    tracing_subscriber::registry()
        .with(layers)
        .with(filter)
        .init();

    Ok((guard, log_dir))
}

/// Run `f` with console logging at the CLI's level. Covers work done before
/// the configured subscriber exists, such as loading the config file itself.
pub fn with_bootstrap_logging<T>(verbose: bool, f: impl FnOnce() -> T) -> T {
    let level = if verbose { Level::DEBUG } else { Level::INFO };
    let subscriber = tracing_subscriber::registry()
        .with(console_layer(false))
        .with(crate_filter(level));
    tracing::subscriber::with_default(subscriber, f)
}

fn crate_filter(level: Level) -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        EnvFilter::new(format!("airpods_sanity={}", level.as_str().to_lowercase()))
    })
}

fn console_layer(json: bool) -> BoxedLayer {
    if json {
        fmt::layer()
            .json()
            .with_target(true)
            .with_thread_ids(true)
            .boxed()
    } else {
        fmt::layer().with_target(false).boxed()
    }
}

// Rolls daily into "<prefix>.YYYY-MM-DD"
fn file_layer(dir: &Path, json: bool) -> (BoxedLayer, WorkerGuard) {
    let appender = tracing_appender::rolling::daily(dir, LOG_FILE_PREFIX);
    let (writer, guard) = tracing_appender::non_blocking(appender);

    let layer = fmt::layer()
        .with_target(true)
        .with_file(true)
        .with_line_number(true)
        .with_writer(writer);
    let layer = if json {
        layer.json().with_thread_ids(true).boxed()
    } else {
        layer.with_ansi(false).boxed()
    };

    (layer, guard)
}

pub fn get_default_log_dir() -> Result<PathBuf> {
    let home_dir =
        dirs::home_dir().ok_or_else(|| anyhow::anyhow!("Failed to get home directory"))?;
    Ok(home_dir.join(".local/share/airpods-sanity/logs"))
}

/// Remove rolled log files not written to in the last `keep_days` days.
/// Returns how many were removed.
pub fn cleanup_old_logs(log_dir: &Path, keep_days: u64) -> Result<usize> {
    // A retention window reaching past the epoch keeps everything
    let Some(cutoff_time) = keep_days
        .checked_mul(SECONDS_PER_DAY)
        .and_then(|secs| SystemTime::now().checked_sub(Duration::from_secs(secs)))
    else {
        tracing::debug!("keep_days = {} retains every log file", keep_days);
        return Ok(0);
    };

    if !log_dir.exists() {
        return Ok(0);
    }

    let mut cleaned_count = 0;
    for entry in std::fs::read_dir(log_dir)? {
        let entry = entry?;
        let path = entry.path();

        // Daily rolling names files "<prefix>.YYYY-MM-DD"
        let is_ours = path
            .file_name()
            .and_then(|name| name.to_str())
            .is_some_and(|name| name.starts_with(LOG_FILE_PREFIX));
        if !path.is_file() || !is_ours {
            continue;
        }

        let Ok(modified) = entry.metadata().and_then(|m| m.modified()) else {
            continue;
        };
        if modified >= cutoff_time {
            continue;
        }

        match std::fs::remove_file(&path) {
            Ok(()) => {
                cleaned_count += 1;
                tracing::debug!("Removed old log file: {}", path.display());
            }
            Err(e) => {
                tracing::warn!("Failed to remove old log file {}: {}", path.display(), e);
            }
        }
    }

    if cleaned_count > 0 {
        tracing::info!(
            "Cleaned up {} old log files from {}",
            cleaned_count,
            log_dir.display()
        );
    }

    Ok(cleaned_count)
}
