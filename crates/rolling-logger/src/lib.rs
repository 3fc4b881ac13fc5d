//! Rolling Logger
//!
//! Installs a `tracing` subscriber that writes to stderr and to a small,
//! circular set of log files:
//!
//! ```text
//! <dir>/<app>.log      (current)
//! <dir>/<app>.log.1    (previous)
//! ...
//! <dir>/<app>.log.N    (oldest, dropped on the next rotation)
//! ```
//!
//! Records emitted through the `log` facade are bridged into the same
//! subscriber, so application code only needs `log::info!` and friends.

use std::fs::{self, File, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;

use tracing::level_filters::LevelFilter;
use tracing_subscriber::fmt::writer::MakeWriterExt;

static INITIALIZED: AtomicBool = AtomicBool::new(false);

const DEFAULT_MAX_FILE_BYTES: u64 = 1024 * 1024;
const DEFAULT_MAX_FILES: usize = 5;

/// Logger configuration
#[derive(Debug, Clone)]
pub struct LoggerConfig {
    /// Directory holding the log files
    pub dir: PathBuf,
    /// Base file name, without extension
    pub app_name: String,
    /// Rotate once the current file would grow past this size
    pub max_file_bytes: u64,
    /// Total number of files kept, current one included
    pub max_files: usize,
    /// Maximum level, e.g. "info" or "debug"
    pub level: String,
    /// Mirror records to stderr
    pub stderr: bool,
}

impl LoggerConfig {
    pub fn new(dir: impl Into<PathBuf>, app_name: &str) -> Self {
        Self {
            dir: dir.into(),
            app_name: app_name.to_string(),
            max_file_bytes: DEFAULT_MAX_FILE_BYTES,
            max_files: DEFAULT_MAX_FILES,
            level: "info".to_string(),
            stderr: true,
        }
    }
}

/// Initialize the global logger with default limits
pub fn init_logger(dir: PathBuf, app_name: &str) -> Result<(), String> {
    init_logger_with(LoggerConfig::new(dir, app_name))
}

/// Level names as accepted in [`LoggerConfig::level`], `off` included
pub fn parse_level(level: &str) -> Result<LevelFilter, String> {
    level.trim().parse().map_err(|_| format!("Invalid log level: {}", level))
}

/// Initialize the global logger
///
/// Fails if a global subscriber was already installed.
pub fn init_logger_with(config: LoggerConfig) -> Result<(), String> {
    let level = parse_level(&config.level)?;

    let writer = RollingWriter::open(
        &config.dir,
        &config.app_name,
        config.max_file_bytes,
        config.max_files,
    )
    .map_err(|e| format!("Failed to open log file: {}", e))?;
    let file = Mutex::new(writer);

    let builder = tracing_subscriber::fmt()
        .with_max_level(level)
        .with_target(true)
        .with_ansi(false);

    let result = if config.stderr {
        builder.with_writer(file.and(io::stderr)).try_init()
    } else {
        builder.with_writer(file).try_init()
    };
    result.map_err(|e| format!("Failed to install logger: {}", e))?;

    INITIALIZED.store(true, Ordering::SeqCst);
    Ok(())
}

/// Whether `init_logger` has completed
pub fn is_initialized() -> bool {
    INITIALIZED.load(Ordering::SeqCst)
}

/// Log an info line, failing if the logger is not installed yet
pub fn info(msg: &str) -> Result<(), String> {
    ensure_initialized()?;
    log::info!("{}", msg);
    Ok(())
}

/// Log an error line, failing if the logger is not installed yet
pub fn error(msg: &str) -> Result<(), String> {
    ensure_initialized()?;
    log::error!("{}", msg);
    Ok(())
}

fn ensure_initialized() -> Result<(), String> {
    if is_initialized() {
        Ok(())
    } else {
        Err("Logger not initialized".to_string())
    }
}

/// Size-bounded file writer rotating through `max_files` files
pub struct RollingWriter {
    dir: PathBuf,
    base: String,
    max_file_bytes: u64,
    max_files: usize,
    file: Option<File>,
    written: u64,
}

impl RollingWriter {
    pub fn open(dir: &Path, app_name: &str, max_file_bytes: u64, max_files: usize) -> io::Result<Self> {
        fs::create_dir_all(dir)?;
        let mut writer = Self {
            dir: dir.to_path_buf(),
            base: format!("{}.log", app_name),
            max_file_bytes: max_file_bytes.max(1),
            max_files: max_files.max(1),
            file: None,
            written: 0,
        };
        writer.open_current()?;
        Ok(writer)
    }

    /// Path of the file currently written to
    pub fn current_path(&self) -> PathBuf {
        self.dir.join(&self.base)
    }

    fn rotated_path(&self, index: usize) -> PathBuf {
        self.dir.join(format!("{}.{}", self.base, index))
    }

    fn open_current(&mut self) -> io::Result<()> {
        let path = self.current_path();
        let file = OpenOptions::new().create(true).append(true).open(&path)?;
        self.written = file.metadata().map(|m| m.len()).unwrap_or(0);
        self.file = Some(file);
        Ok(())
    }

    fn rotate(&mut self) -> io::Result<()> {
        if let Some(mut file) = self.file.take() {
            file.flush()?;
        }

        if self.max_files == 1 {
            fs::remove_file(self.current_path()).or_else(ignore_missing)?;
            return self.open_current();
        }

        // Oldest slot falls off the end
        let oldest = self.rotated_path(self.max_files - 1);
        fs::remove_file(&oldest).or_else(ignore_missing)?;

        for index in (1..self.max_files - 1).rev() {
            let from = self.rotated_path(index);
            if from.exists() {
                fs::rename(&from, self.rotated_path(index + 1))?;
            }
        }
        fs::rename(self.current_path(), self.rotated_path(1)).or_else(ignore_missing)?;

        self.open_current()
    }
}

fn ignore_missing(e: io::Error) -> io::Result<()> {
    if e.kind() == io::ErrorKind::NotFound {
        Ok(())
    } else {
        Err(e)
    }
}

impl Write for RollingWriter {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        if self.written > 0 && self.written + buf.len() as u64 > self.max_file_bytes {
            self.rotate()?;
        }
        if self.file.is_none() {
            self.open_current()?;
        }
        let file = self
            .file
            .as_mut()
            .ok_or_else(|| io::Error::new(io::ErrorKind::Other, "log file unavailable"))?;
        let n = file.write(buf)?;
        self.written += n as u64;
        Ok(n)
    }

    fn flush(&mut self) -> io::Result<()> {
        match self.file.as_mut() {
            Some(file) => file.flush(),
            None => Ok(()),
        }
    }
}
