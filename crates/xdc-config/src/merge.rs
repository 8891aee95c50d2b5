use crate::config::Config;
use crate::error::ConfigError;

/// Layer a TOML fragment over `base`.
///
/// Keys present in `overlay_toml` win; everything else keeps the value from
/// `base`. Tables such as `[path_mapping]` are merged key by key, so a
/// project file can add a mapping without repeating the global ones.
pub fn merge_configs(base: &Config, overlay_toml: &str) -> Result<Config, ConfigError> {
    let mut merged = toml::Value::try_from(base).map_err(|e| ConfigError::Parse(e.to_string()))?;
    let overlay: toml::Value =
        toml::from_str(overlay_toml).map_err(|e| ConfigError::Parse(e.to_string()))?;

    merge_values(&mut merged, overlay);

    merged
        .try_into()
        .map_err(|e: toml::de::Error| ConfigError::Parse(e.to_string()))
}

fn merge_values(base: &mut toml::Value, overlay: toml::Value) {
    match (base, overlay) {
        (toml::Value::Table(base_table), toml::Value::Table(overlay_table)) => {
            for (key, value) in overlay_table {
                match base_table.get_mut(&key) {
                    Some(existing) => merge_values(existing, value),
                    None => {
                        base_table.insert(key, value);
                    }
                }
            }
        }
        (slot, value) => *slot = value,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_overlay_keeps_base() {
        let base = Config::default();
        assert_eq!(merge_configs(&base, "").unwrap(), base);
    }

    #[test]
    fn overlay_replaces_scalars() {
        let merged = merge_configs(&Config::default(), "[dbgp]\nport = 9003\nmax_depth = 3\n").unwrap();
        assert_eq!(merged.dbgp.port, 9003);
        assert_eq!(merged.dbgp.max_depth, 3);
        assert_eq!(merged.dbgp.max_children, 32);
        assert_eq!(merged.dbgp.ide_key, "sublime.xdebug");
    }

    #[test]
    fn path_mappings_accumulate() {
        let global = merge_configs(
            &Config::default(),
            "[path_mapping]\n\"/var/www\" = \"/home/dev/site\"\n",
        )
        .unwrap();
        let project = merge_configs(
            &global,
            "[path_mapping]\n\"/opt/lib\" = \"/home/dev/lib\"\n",
        )
        .unwrap();
        assert_eq!(project.path_mapping.len(), 2);
        assert_eq!(project.path_mapping["/var/www"], "/home/dev/site");
    }

    #[test]
    fn overlay_sets_optional_values() {
        let merged = merge_configs(
            &Config::default(),
            "[browser]\nurl = \"http://localhost:8080/\"\n",
        )
        .unwrap();
        assert_eq!(merged.browser.url.as_deref(), Some("http://localhost:8080/"));
        assert!(!merged.browser.no_execute);
    }

    #[test]
    fn invalid_overlay_is_parse_error() {
        let err = merge_configs(&Config::default(), "[dbgp\nport = 1").unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)));
    }

    #[test]
    fn wrong_type_is_parse_error() {
        let err = merge_configs(&Config::default(), "[dbgp]\nport = \"nine\"\n").unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)));
    }
}
