//! File logging for hosts embedding the ledger.
//!
//! # Responsibility
//! - Start the `flexi_logger` file backend once per process from the
//!   `[logging]` config section.
//! - Route panics into the log before the previous hook runs.
//!
//! # Invariants
//! - Log lines use the `event=... module=... status=...` shape and carry ids
//!   and counters, never post or comment bodies.
//! - A second init with identical settings is a no-op; different settings
//!   are rejected while a logger is active.

use crate::config::LoggingConfig;
use flexi_logger::{
    Cleanup, Criterion, FileSpec, LogSpecification, Logger, LoggerHandle, Naming, WriteMode,
};
use log::{error, info, LevelFilter};
use once_cell::sync::OnceCell;
use std::any::Any;
use std::fmt::{self, Display, Formatter};
use std::path::{Path, PathBuf};
use thiserror::Error;

const LOG_FILE_BASENAME: &str = "agora";
const PANIC_PAYLOAD_LIMIT: usize = 160;

static ACTIVE: OnceCell<ActiveLogger> = OnceCell::new();
static PANIC_HOOK: OnceCell<()> = OnceCell::new();

#[derive(Debug, Error, PartialEq, Eq)]
pub enum LoggingError {
    #[error("unsupported log level `{0}`; expected trace|debug|info|warn|error|off")]
    UnknownLevel(String),
    #[error("log dir must be an absolute path, got `{}`", .0.display())]
    RelativeDir(PathBuf),
    #[error("failed to create log dir `{}`: {message}", .path.display())]
    CreateDir { path: PathBuf, message: String },
    #[error("failed to start logger: {0}")]
    Backend(String),
    #[error("logging already active with {active}; refusing {requested}")]
    Conflict { active: String, requested: String },
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct LogSettings {
    level: LevelFilter,
    dir: PathBuf,
    max_file_size_bytes: u64,
    keep_files: usize,
}

impl LogSettings {
    fn resolve(config: &LoggingConfig, dir: &Path) -> Result<Self, LoggingError> {
        let level = match config.level.as_deref() {
            Some(level) => parse_level(level)?,
            None => build_default_level(),
        };
        if !dir.is_absolute() {
            return Err(LoggingError::RelativeDir(dir.to_path_buf()));
        }
        Ok(Self {
            level,
            dir: dir.to_path_buf(),
            max_file_size_bytes: config.max_file_size_mb.max(1).saturating_mul(1024 * 1024),
            keep_files: config.keep_files.max(1),
        })
    }
}

impl Display for LogSettings {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "level={} dir={} max_file_size_bytes={} keep_files={}",
            self.level.to_string().to_ascii_lowercase(),
            self.dir.display(),
            self.max_file_size_bytes,
            self.keep_files
        )
    }
}

struct ActiveLogger {
    settings: LogSettings,
    _handle: LoggerHandle,
}

/// Parses a config level name. `warning` is accepted as `warn`.
pub fn parse_level(value: &str) -> Result<LevelFilter, LoggingError> {
    let trimmed = value.trim();
    let candidate = if trimmed.eq_ignore_ascii_case("warning") {
        "warn"
    } else {
        trimmed
    };
    candidate
        .parse::<LevelFilter>()
        .map_err(|_| LoggingError::UnknownLevel(trimmed.to_string()))
}

/// Starts file logging when `config.dir` is set.
///
/// Returns `Ok(false)` without touching the `log` facade when no directory is
/// configured, so the host can install its own backend.
pub fn init_logging(config: &LoggingConfig) -> Result<bool, LoggingError> {
    let Some(dir) = config.dir.as_deref() else {
        return Ok(false);
    };
    let requested = LogSettings::resolve(config, dir)?;
    let active = ACTIVE.get_or_try_init(|| start(requested.clone()))?;
    if active.settings != requested {
        return Err(LoggingError::Conflict {
            active: active.settings.to_string(),
            requested: requested.to_string(),
        });
    }
    Ok(true)
}

fn start(settings: LogSettings) -> Result<ActiveLogger, LoggingError> {
    std::fs::create_dir_all(&settings.dir).map_err(|err| LoggingError::CreateDir {
        path: settings.dir.clone(),
        message: err.to_string(),
    })?;

    let handle = Logger::with(LogSpecification::builder().default(settings.level).build())
        .log_to_file(
            FileSpec::default()
                .directory(settings.dir.as_path())
                .basename(LOG_FILE_BASENAME),
        )
        .rotate(
            Criterion::Size(settings.max_file_size_bytes),
            Naming::Numbers,
            Cleanup::KeepLogFiles(settings.keep_files),
        )
        .write_mode(WriteMode::BufferAndFlush)
        .append()
        .format_for_files(flexi_logger::detailed_format)
        .start()
        .map_err(|err| LoggingError::Backend(err.to_string()))?;

    install_panic_hook();
    info!(
        "event=ledger_start module=logging status=ok version={} {}",
        env!("CARGO_PKG_VERSION"),
        settings
    );
    Ok(ActiveLogger {
        settings,
        _handle: handle,
    })
}

fn build_default_level() -> LevelFilter {
    if cfg!(debug_assertions) {
        LevelFilter::Debug
    } else {
        LevelFilter::Info
    }
}

fn install_panic_hook() {
    PANIC_HOOK.get_or_init(|| {
        let previous = std::panic::take_hook();
        std::panic::set_hook(Box::new(move |panic| {
            let location = panic
                .location()
                .map(|loc| format!("{}:{}", loc.file(), loc.line()))
                .unwrap_or_else(|| "unknown".to_string());
            error!(
                "event=panic module=logging status=error location={} payload={}",
                location,
                panic_summary(panic.payload())
            );
            previous(panic);
        }));
    });
}

/// One-line, length-capped rendering of a panic payload.
fn panic_summary(payload: &(dyn Any + Send)) -> String {
    let text = payload
        .downcast_ref::<&str>()
        .copied()
        .or_else(|| payload.downcast_ref::<String>().map(String::as_str))
        .unwrap_or("non-string panic payload");
    let mut summary: String = text
        .chars()
        .take(PANIC_PAYLOAD_LIMIT)
        .map(|ch| if ch == '\n' || ch == '\r' { ' ' } else { ch })
        .collect();
    if text.chars().count() > PANIC_PAYLOAD_LIMIT {
        summary.push_str("...");
    }
    summary
}
