//! Load `[env]` table from `<config dir>/<app>/config.toml`.

use std::collections::HashMap;
use std::path::PathBuf;

use crate::LoadError;

fn user_config_path(app_name: &str) -> Option<PathBuf> {
    let config_dir = dirs::config_dir()?;
    let path = config_dir.join(app_name).join("config.toml");
    if path.exists() {
        Some(path)
    } else {
        None
    }
}

#[derive(serde::Deserialize, Default)]
struct ConfigFile {
    #[serde(default)]
    env: HashMap<String, String>,
}

/// Returns env key-value pairs from the `[env]` section. Missing file or empty section
/// returns an empty map.
pub fn load_env_map(app_name: &str) -> Result<HashMap<String, String>, LoadError> {
    let path = match user_config_path(app_name) {
        Some(p) => p,
        None => return Ok(HashMap::new()),
    };
    let content = std::fs::read_to_string(&path).map_err(LoadError::TomlRead)?;
    let config: ConfigFile = toml::from_str(&content)?;
    Ok(config.env)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_config_returns_empty_map() {
        let map = load_env_map("config-crate-test-nonexistent-12345").unwrap();
        assert!(map.is_empty());
    }

    #[test]
    fn parse_env_table() {
        let content = "[env]\nFOO = \"from_toml\"\nBAR = \"baz\"\n";
        let config: ConfigFile = toml::from_str(content).unwrap();
        assert_eq!(config.env.get("FOO"), Some(&"from_toml".to_string()));
        assert_eq!(config.env.get("BAR"), Some(&"baz".to_string()));
    }
}
