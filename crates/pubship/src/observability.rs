//! Observability setup: structured logging.
//!
//! Log events are written as JSON lines to a daily-rolling file. This module
//! never writes to stdout, which carries command output (and `--json`
//! results). If no log file can be opened, logs go to stderr.

use std::fs::OpenOptions;

use anyhow::{Context, Result, anyhow};
use camino::{Utf8Path, Utf8PathBuf};
use tracing_subscriber::filter::EnvFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

const ENV_LOG_PATH: &str = "PUBSHIP_LOG_PATH";
const ENV_LOG_DIR: &str = "PUBSHIP_LOG_DIR";
const LOG_FILE_SUFFIX: &str = ".jsonl";

/// Configuration for observability setup.
#[derive(Clone, Debug)]
pub struct ObservabilityConfig {
    /// The service name used for the log file name.
    pub service: String,
    /// Directory for JSONL log files from the config file.
    pub log_dir: Option<Utf8PathBuf>,
}

impl ObservabilityConfig {
    /// Create config for this binary with an optional configured log dir.
    pub fn new(log_dir: Option<Utf8PathBuf>) -> Self {
        Self {
            service: env!("CARGO_PKG_NAME").to_string(),
            log_dir,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
struct LogTarget {
    dir: Utf8PathBuf,
    file_name: String,
}

/// Guard that must be held for the lifetime of the application so buffered
/// log lines are flushed on exit.
pub struct ObservabilityGuard {
    _log_guard: tracing_appender::non_blocking::WorkerGuard,
}

/// Install the global subscriber.
///
/// Returns a guard that must be held for the application lifetime.
pub fn init_observability(
    cfg: &ObservabilityConfig,
    env_filter: EnvFilter,
) -> Result<ObservabilityGuard> {
    let (writer, guard) = match resolve_log_target(&cfg.service, cfg.log_dir.as_deref()) {
        Ok(target) => {
            let appender = tracing_appender::rolling::daily(&target.dir, &target.file_name);
            tracing_appender::non_blocking(appender)
        }
        Err(err) => {
            eprintln!("Warning: {err}. Falling back to stderr logging.");
            tracing_appender::non_blocking(std::io::stderr())
        }
    };

    let json_layer = tracing_subscriber::fmt::layer()
        .json()
        .flatten_event(true)
        .with_current_span(true)
        .with_span_list(false)
        .with_ansi(false)
        .with_writer(writer);

    tracing_subscriber::registry()
        .with(env_filter)
        .with(json_layer)
        .try_init()
        .context("a global tracing subscriber is already installed")?;

    tracing::debug!(service = %cfg.service, "observability initialized");
    Ok(ObservabilityGuard { _log_guard: guard })
}

/// Build an `EnvFilter` from CLI flags and environment.
///
/// Priority: quiet flag > verbose flag > `RUST_LOG` > configured level.
pub fn env_filter(quiet: bool, verbose: u8, default_level: &str) -> EnvFilter {
    if quiet {
        return EnvFilter::new("error");
    }

    match verbose {
        0 => EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)),
        1 => EnvFilter::new("debug"),
        _ => EnvFilter::new("trace"),
    }
}

// ============================================================================
// Log Target Resolution
// ============================================================================

fn resolve_log_target(service: &str, config_dir: Option<&Utf8Path>) -> Result<LogTarget> {
    let path_override = std::env::var(ENV_LOG_PATH).ok().map(Utf8PathBuf::from);
    let dir_override = std::env::var(ENV_LOG_DIR).ok().map(Utf8PathBuf::from);
    let data_dir = directories::ProjectDirs::from("", "", service)
        .and_then(|dirs| Utf8PathBuf::from_path_buf(dirs.data_local_dir().join("logs")).ok());

    resolve_log_target_with(
        service,
        path_override,
        dir_override.or_else(|| config_dir.map(Utf8Path::to_path_buf)),
        data_dir,
    )
}

/// Explicit file beats explicit directory beats the platform data dir.
fn resolve_log_target_with(
    service: &str,
    path_override: Option<Utf8PathBuf>,
    dir_override: Option<Utf8PathBuf>,
    data_dir: Option<Utf8PathBuf>,
) -> Result<LogTarget> {
    let target = if let Some(path) = path_override {
        let file_name = path
            .file_name()
            .ok_or_else(|| anyhow!("{ENV_LOG_PATH} must include a file name"))?
            .to_string();
        let dir = path
            .parent()
            .filter(|p| !p.as_str().is_empty())
            .map_or_else(|| Utf8PathBuf::from("."), Utf8Path::to_path_buf);
        LogTarget { dir, file_name }
    } else {
        let dir = dir_override
            .or(data_dir)
            .ok_or_else(|| anyhow!("no log directory available"))?;
        LogTarget {
            dir,
            file_name: format!("{service}{LOG_FILE_SUFFIX}"),
        }
    };

    ensure_writable(&target)?;
    Ok(target)
}

fn ensure_writable(target: &LogTarget) -> Result<()> {
    std::fs::create_dir_all(&target.dir)
        .with_context(|| format!("failed to create log directory {}", target.dir))?;

    let path = target.dir.join(&target.file_name);
    OpenOptions::new()
        .create(true)
        .append(true)
        .open(&path)
        .with_context(|| format!("failed to open log file {path}"))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tmp_dir() -> (tempfile::TempDir, Utf8PathBuf) {
        let tmp = tempfile::TempDir::new().unwrap();
        let dir = Utf8PathBuf::try_from(tmp.path().to_path_buf()).unwrap();
        (tmp, dir)
    }

    #[test]
    fn env_filter_quiet_overrides() {
        assert_eq!(env_filter(true, 2, "info").to_string(), "error");
    }

    #[test]
    fn env_filter_verbose_maps_to_debug_and_trace() {
        assert_eq!(env_filter(false, 1, "info").to_string(), "debug");
        assert_eq!(env_filter(false, 3, "info").to_string(), "trace");
    }

    #[test]
    fn path_override_wins() {
        let (_tmp, dir) = tmp_dir();
        let file = dir.join("custom.jsonl");
        let target = resolve_log_target_with(
            "pubship",
            Some(file),
            Some(dir.join("ignored")),
            Some(dir.join("also-ignored")),
        )
        .unwrap();
        assert_eq!(target.dir, dir);
        assert_eq!(target.file_name, "custom.jsonl");
        assert!(!dir.join("ignored").exists());
    }

    #[test]
    fn dir_override_names_file_after_service() {
        let (_tmp, dir) = tmp_dir();
        let logs = dir.join("logs");
        let target = resolve_log_target_with("pubship", None, Some(logs.clone()), None).unwrap();
        assert_eq!(target.dir, logs);
        assert_eq!(target.file_name, "pubship.jsonl");
        assert!(logs.join("pubship.jsonl").is_file());
    }

    #[test]
    fn data_dir_is_last_resort() {
        let (_tmp, dir) = tmp_dir();
        let target = resolve_log_target_with("pubship", None, None, Some(dir.clone())).unwrap();
        assert_eq!(target.dir, dir);
    }

    #[test]
    fn no_candidates_is_an_error() {
        assert!(resolve_log_target_with("pubship", None, None, None).is_err());
    }
}
