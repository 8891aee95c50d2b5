use std::path::{Path, PathBuf};

use crate::config::Config;
use crate::error::ConfigError;
use crate::merge::merge_configs;
use crate::validate::validate;

/// Directory holding a project's own settings.
pub const PROJECT_CONFIG_DIR: &str = ".xdc";

/// Name of the settings file, globally and per project.
pub const CONFIG_FILE_NAME: &str = "config.toml";

/// Content written into a newly created global config file.
const DEFAULT_CONFIG_CONTENT: &str = r#"# xdc configuration
# Uncomment and edit settings below to override defaults.
# A project can override any of these in .xdc/config.toml.

# [dbgp]
# port = 9000
# max_children = 32
# max_depth = 1
# hide_password = true
# password_pattern = "(?i)password"
# ide_key = "sublime.xdebug"

# [path_mapping]
# "/var/www/html" = "/home/me/project"

# [browser]
# url = "http://localhost/"
# no_execute = false

# [log]
# level = "info"
# file = "/tmp/xdc.log"
"#;

/// The global configuration directory, `~/.config/xdc`.
pub fn default_config_dir() -> Option<PathBuf> {
    dirs::home_dir()
        .or_else(|| std::env::var_os("HOME").map(PathBuf::from))
        .map(|home| home.join(".config").join("xdc"))
}

/// Load the layered configuration.
///
/// Defaults are overlaid with `config_dir/config.toml` (created with
/// commented-out defaults when missing), then with the nearest
/// `.xdc/config.toml` at or above `project_dir`. The result is validated.
pub fn load_config(config_dir: &Path, project_dir: Option<&Path>) -> Result<Config, ConfigError> {
    let global_path = config_dir.join(CONFIG_FILE_NAME);

    if !global_path.exists() {
        std::fs::create_dir_all(config_dir)
            .and_then(|()| std::fs::write(&global_path, DEFAULT_CONFIG_CONTENT))
            .map_err(|e| ConfigError::CreateDefault(e.to_string()))?;
        tracing::info!("created default config at {}", global_path.display());
    }

    let mut config = Config::default();

    let global = std::fs::read_to_string(&global_path)?;
    if has_non_comment_content(&global) {
        config = merge_configs(&config, &global)?;
    }

    if let Some(project_path) = project_dir.and_then(find_project_config) {
        tracing::debug!("using project config {}", project_path.display());
        let project = std::fs::read_to_string(&project_path)?;
        config = merge_configs(&config, &project)?;
    }

    check(&config)?;
    Ok(config)
}

/// Parse and validate a TOML string without touching the filesystem.
pub fn load_from_str(toml_str: &str) -> Result<Config, ConfigError> {
    let config: Config = toml::from_str(toml_str).map_err(|e| ConfigError::Parse(e.to_string()))?;
    check(&config)?;
    Ok(config)
}

/// First validation failure, if any.
fn check(config: &Config) -> Result<(), ConfigError> {
    validate(config).map_err(|errors| {
        errors
            .into_iter()
            .next()
            .unwrap_or_else(|| ConfigError::Validation {
                field: "unknown".to_string(),
                message: "validation failed".to_string(),
            })
    })
}

/// Walk from `start` upward looking for `.xdc/config.toml`.
fn find_project_config(start: &Path) -> Option<PathBuf> {
    start
        .ancestors()
        .map(|dir| dir.join(PROJECT_CONFIG_DIR).join(CONFIG_FILE_NAME))
        .find(|candidate| candidate.is_file())
}

fn has_non_comment_content(content: &str) -> bool {
    content.lines().any(|l| {
        let trimmed = l.trim();
        !trimmed.is_empty() && !trimmed.starts_with('#')
    })
}
