/*!
 * Logging and tracing initialization
 *
 * File output goes through [`RotatingFileWriter`], which rolls the active file
 * over to `<file>.1`, `<file>.2`, ... once it reaches the configured size.
 */

use std::fs::{self, File, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use tracing::Level;
use tracing_subscriber::{
    fmt::{self, format::FmtSpan, time::ChronoLocal},
    layer::SubscriberExt,
    util::SubscriberInitExt,
    EnvFilter,
};

use crate::config::{LogFormat, LoggingConfig};
use crate::error::{ProbeError, Result};

/// Timestamp layout of text log lines
pub const LOG_TIME_FORMAT: &str = "%m/%d/%Y %I:%M:%S %p";

/// Initialize structured logging based on configuration
pub fn init_logging(config: &LoggingConfig) -> Result<()> {
    let log_level = effective_level(config);

    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(format!("snowprobe={}", log_level)))
        .map_err(|e| ProbeError::Config(format!("Failed to create log filter: {}", e)))?;

    if let Some(ref log_path) = config.file {
        init_file_logging(log_path, config, env_filter)
    } else {
        init_stderr_logging(env_filter)
    }
}

/// Level used for the `snowprobe` target when `RUST_LOG` is unset
pub fn effective_level(config: &LoggingConfig) -> Level {
    if config.verbose {
        Level::DEBUG
    } else {
        config.level.to_tracing_level()
    }
}

/// Initialize compact logging to stderr, leaving stdout for results
fn init_stderr_logging(env_filter: EnvFilter) -> Result<()> {
    let fmt_layer = fmt::layer()
        .with_writer(io::stderr)
        .with_target(true)
        .with_file(false)
        .with_line_number(false)
        .with_span_events(FmtSpan::NONE)
        .compact();

    tracing_subscriber::registry()
        .with(env_filter)
        .with(fmt_layer)
        .try_init()
        .map_err(|e| ProbeError::Config(format!("Failed to install logger: {}", e)))
}

/// Initialize logging to a size-rotated file
fn init_file_logging(log_path: &Path, config: &LoggingConfig, env_filter: EnvFilter) -> Result<()> {
    let writer = RotatingFileWriter::open(log_path, config.max_bytes, config.backups)
        .map_err(|e| ProbeError::Config(format!("Failed to open log file: {}", e)))?;

    let installed = match config.format {
        LogFormat::Text => {
            let fmt_layer = fmt::layer()
                .with_writer(Mutex::new(writer))
                .with_timer(ChronoLocal::new(LOG_TIME_FORMAT.to_string()))
                .with_target(true)
                .with_file(true)
                .with_line_number(true)
                .with_ansi(false); // No ANSI colors in file

            tracing_subscriber::registry()
                .with(env_filter)
                .with(fmt_layer)
                .try_init()
        }
        LogFormat::Json => {
            let fmt_layer = fmt::layer()
                .with_writer(Mutex::new(writer))
                .with_target(true)
                .with_file(true)
                .with_line_number(true)
                .with_ansi(false)
                .json();

            tracing_subscriber::registry()
                .with(env_filter)
                .with(fmt_layer)
                .try_init()
        }
    };

    installed.map_err(|e| ProbeError::Config(format!("Failed to install logger: {}", e)))
}

/// Append-only log file that rotates by size.
///
/// Rotation never happens when either `max_bytes` or `backups` is zero, and a
/// single write larger than `max_bytes` still lands in one file.
#[derive(Debug)]
pub struct RotatingFileWriter {
    path: PathBuf,
    max_bytes: u64,
    backups: usize,
    file: File,
    written: u64,
}

impl RotatingFileWriter {
    /// Open (or create) the active log file, appending to existing content
    pub fn open(path: &Path, max_bytes: u64, backups: usize) -> io::Result<Self> {
        let file = OpenOptions::new().create(true).append(true).open(path)?;
        let written = file.metadata()?.len();

        Ok(Self {
            path: path.to_path_buf(),
            max_bytes,
            backups,
            file,
            written,
        })
    }

    /// Path of the n-th rotated file
    pub fn backup_path(&self, index: usize) -> PathBuf {
        let mut name = self.path.as_os_str().to_owned();
        name.push(format!(".{}", index));
        PathBuf::from(name)
    }

    fn should_rotate(&self, incoming: usize) -> bool {
        self.max_bytes > 0
            && self.backups > 0
            && self.written > 0
            && self.written + incoming as u64 > self.max_bytes
    }

    fn rotate(&mut self) -> io::Result<()> {
        self.file.flush()?;

        for index in (1..self.backups).rev() {
            let older = self.backup_path(index);
            if older.exists() {
                fs::rename(&older, self.backup_path(index + 1))?;
            }
        }
        fs::rename(&self.path, self.backup_path(1))?;

        self.file = OpenOptions::new()
            .create(true)
            .write(true)
            .truncate(true)
            .open(&self.path)?;
        self.written = 0;
        Ok(())
    }
}

impl Write for RotatingFileWriter {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        if self.should_rotate(buf.len()) {
            self.rotate()?;
        }
        let n = self.file.write(buf)?;
        self.written += n as u64;
        Ok(n)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.file.flush()
    }
}
