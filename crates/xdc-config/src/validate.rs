use regex::Regex;

use crate::config::Config;
use crate::error::ConfigError;

/// Check a [`Config`] and collect every violation.
pub fn validate(config: &Config) -> Result<(), Vec<ConfigError>> {
    let mut errors = Vec::new();
    let mut reject = |field: &str, message: String| {
        errors.push(ConfigError::Validation {
            field: field.to_string(),
            message,
        });
    };

    if config.dbgp.port == 0 {
        reject("dbgp.port", "must not be 0".to_string());
    }

    if config.dbgp.ide_key.trim().is_empty() {
        reject("dbgp.ide_key", "must not be empty".to_string());
    }

    if let Err(e) = Regex::new(&config.dbgp.password_pattern) {
        reject("dbgp.password_pattern", format!("invalid regex: {e}"));
    }

    if let Some(url) = &config.browser.url {
        if url.trim().is_empty() {
            reject("browser.url", "must not be empty when set".to_string());
        }
    }

    for (server, local) in &config.path_mapping {
        if server.trim().is_empty() || local.trim().is_empty() {
            reject(
                "path_mapping",
                format!("empty path in mapping \"{server}\" = \"{local}\""),
            );
        }
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}
