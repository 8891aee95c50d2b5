use std::collections::BTreeMap;
use std::path::PathBuf;

use regex::Regex;
use serde::{Deserialize, Deserializer, Serialize};

/// Log verbosity level.
///
/// Names are read case-insensitively; an unknown name means `Info`.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum LogLevel {
    /// Most verbose.
    Trace,
    /// Debug messages, including every command sent and response read.
    Debug,
    /// Informational messages (default).
    #[default]
    Info,
    /// Warnings only.
    Warn,
    /// Errors only.
    Error,
}

impl LogLevel {
    /// Level for a name such as `"DEBUG"` or `"warn"`.
    pub fn from_name(name: &str) -> Self {
        match name.trim().to_ascii_lowercase().as_str() {
            "trace" => Self::Trace,
            "debug" => Self::Debug,
            "warn" | "warning" => Self::Warn,
            "error" => Self::Error,
            _ => Self::Info,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Trace => "trace",
            Self::Debug => "debug",
            Self::Info => "info",
            Self::Warn => "warn",
            Self::Error => "error",
        }
    }
}

impl<'de> Deserialize<'de> for LogLevel {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let name = String::deserialize(deserializer)?;
        Ok(Self::from_name(&name))
    }
}

/// Debugger connection and variable inspection settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DbgpConfig {
    /// Port the engine connects back to.
    #[serde(default = "default_port")]
    pub port: u16,
    /// Children fetched per lazily expanded variable, 0 = unlimited.
    #[serde(default = "default_max_children")]
    pub max_children: usize,
    /// Nesting depth shown for variables, 0 = unlimited.
    #[serde(default = "default_max_depth")]
    pub max_depth: usize,
    /// Redact values of variables whose name matches `password_pattern`.
    #[serde(default = "default_true")]
    pub hide_password: bool,
    /// Regular expression for password-like variable names.
    #[serde(default = "default_password_pattern")]
    pub password_pattern: String,
    /// Session key the engine is started with.
    #[serde(default = "default_ide_key")]
    pub ide_key: String,
}

fn default_port() -> u16 {
    9000
}
fn default_max_children() -> usize {
    32
}
fn default_max_depth() -> usize {
    1
}
fn default_true() -> bool {
    true
}
fn default_password_pattern() -> String {
    "(?i)password".to_string()
}
fn default_ide_key() -> String {
    "sublime.xdebug".to_string()
}

impl Default for DbgpConfig {
    fn default() -> Self {
        Self {
            port: default_port(),
            max_children: default_max_children(),
            max_depth: default_max_depth(),
            hide_password: true,
            password_pattern: default_password_pattern(),
            ide_key: default_ide_key(),
        }
    }
}

impl DbgpConfig {
    /// The compiled password filter, or `None` when redaction is off.
    pub fn password_filter(&self) -> Option<Regex> {
        if !self.hide_password {
            return None;
        }
        match Regex::new(&self.password_pattern) {
            Ok(re) => Some(re),
            Err(e) => {
                tracing::warn!("ignoring invalid password_pattern: {e}");
                None
            }
        }
    }
}

/// Browser session start/stop settings. Stored only.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BrowserConfig {
    /// Base URL that starts a debug session when opened.
    #[serde(default)]
    pub url: Option<String>,
    /// Only build the URL, do not open it.
    #[serde(default)]
    pub no_execute: bool,
}

/// Logging settings.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LogConfig {
    /// Minimum log level.
    #[serde(default)]
    pub level: LogLevel,
    /// Log file; the platform default when unset.
    #[serde(default)]
    pub file: Option<PathBuf>,
}

/// Top-level configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub dbgp: DbgpConfig,
    /// Server path -> local path.
    #[serde(default)]
    pub path_mapping: BTreeMap<String, String>,
    #[serde(default)]
    pub browser: BrowserConfig,
    #[serde(default)]
    pub log: LogConfig,
}

impl Config {
    /// Path mappings, longest server path first so nested directories win
    /// over their parents.
    pub fn path_mappings(&self) -> Vec<(String, String)> {
        let mut mappings: Vec<(String, String)> = self
            .path_mapping
            .iter()
            .map(|(server, local)| (server.clone(), local.clone()))
            .collect();
        mappings.sort_by(|(a, _), (b, _)| b.len().cmp(&a.len()));
        mappings
    }
}
