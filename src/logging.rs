//! Log file location, size-based rotation and subscriber setup.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use tracing_subscriber::EnvFilter;
use xdc_config::config::LogLevel;

/// Size at which the current log file is rotated (10 MB).
pub const DEFAULT_MAX_LOG_SIZE: u64 = 10 * 1024 * 1024;

/// Rotated files kept next to the current one.
pub const DEFAULT_MAX_LOG_FILES: u32 = 5;

/// Platform default log file.
///
/// * macOS: `$HOME/Library/Logs/xdc/xdc.log`
/// * Linux: `$HOME/.local/share/xdc/xdc.log`
/// * Windows: `%APPDATA%/xdc/logs/xdc.log`
/// * Fallback: `<tmp>/xdc/xdc.log`
pub fn default_log_file_path() -> PathBuf {
    #[cfg(target_os = "macos")]
    {
        if let Some(home) = dirs::home_dir() {
            return home.join("Library/Logs/xdc/xdc.log");
        }
    }
    #[cfg(target_os = "linux")]
    {
        if let Some(data) = dirs::data_local_dir() {
            return data.join("xdc").join("xdc.log");
        }
    }
    #[cfg(target_os = "windows")]
    {
        if let Some(appdata) = std::env::var_os("APPDATA") {
            return PathBuf::from(appdata).join("xdc\\logs\\xdc.log");
        }
    }
    std::env::temp_dir().join("xdc").join("xdc.log")
}

/// Create the parent directory of `log_path` when missing.
pub fn ensure_log_dir(log_path: &Path) -> io::Result<()> {
    match log_path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => fs::create_dir_all(parent),
        _ => Ok(()),
    }
}

/// Rotate `log_path` once it reaches `max_size` bytes.
///
/// `xdc.log` becomes `xdc.log.1`, `xdc.log.1` becomes `xdc.log.2` and so on;
/// `xdc.log.<max_files>` is deleted. A missing or small file is left alone.
pub fn rotate_log_files(log_path: &Path, max_size: u64, max_files: u32) -> io::Result<()> {
    let size = match fs::metadata(log_path) {
        Ok(meta) => meta.len(),
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(()),
        Err(e) => return Err(e),
    };
    if size < max_size || max_files == 0 {
        return Ok(());
    }

    let oldest = rotated_path(log_path, max_files);
    if oldest.exists() {
        fs::remove_file(&oldest)?;
    }

    for i in (1..max_files).rev() {
        let from = rotated_path(log_path, i);
        if from.exists() {
            fs::rename(&from, rotated_path(log_path, i + 1))?;
        }
    }

    fs::rename(log_path, rotated_path(log_path, 1))
}

/// Build the subscriber filter. `RUST_LOG` wins over the configured level.
pub fn build_filter(level: LogLevel) -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        EnvFilter::try_new(level.as_str()).unwrap_or_else(|_| EnvFilter::new("info"))
    })
}

/// Install the global subscriber writing to `log_path`.
///
/// Rotation and directory failures are ignored so a read-only home still
/// gets a debugger. When the file cannot be opened logging is disabled.
pub fn init(log_path: &Path, level: LogLevel) -> bool {
    ensure_log_dir(log_path).ok();
    rotate_log_files(log_path, DEFAULT_MAX_LOG_SIZE, DEFAULT_MAX_LOG_FILES).ok();

    let log_file = match fs::OpenOptions::new().create(true).append(true).open(log_path) {
        Ok(file) => file,
        Err(_) => return false,
    };

    tracing_subscriber::fmt()
        .with_writer(std::sync::Mutex::new(log_file))
        .with_ansi(false)
        .with_env_filter(build_filter(level))
        .try_init()
        .is_ok()
}

fn rotated_path(base: &Path, index: u32) -> PathBuf {
    let name = base.file_name().unwrap_or_default().to_string_lossy();
    let parent = base.parent().unwrap_or_else(|| Path::new("."));
    parent.join(format!("{name}.{index}"))
}
