//! Load configuration from a user-level `config.toml` and a project `.env`, then apply to
//! the process environment with priority: **existing env > .env > config.toml**.
//!
//! Agent code reads plain environment variables afterwards (e.g. `TILLER_API_KEY`,
//! `TILLER_BASE_URL`, `TILLER_MODEL`); this crate is the only place that touches files.

mod env_file;
mod user_toml;

use std::path::Path;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum LoadError {
    #[error("read config.toml: {0}")]
    TomlRead(std::io::Error),
    #[error("parse config.toml: {0}")]
    TomlParse(#[from] toml::de::Error),
    #[error("read .env: {0}")]
    DotenvRead(std::io::Error),
}

/// Loads config from the user `config.toml` and optional project `.env`, then sets
/// environment variables only for keys that are **not** already set (so existing env
/// has highest priority).
///
/// Order of precedence when a key is missing in the process environment:
/// 1. Value from project `.env` (current directory or `override_dir` if given)
/// 2. Value from `~/.config/<app_name>/config.toml` `[env]` table
///
/// * `app_name`: e.g. `"tiller"`, used for the config path `~/.config/<app_name>/config.toml`.
/// * `override_dir`: if `Some`, look for `.env` in this directory instead of `std::env::current_dir()`.
pub fn load_and_apply(app_name: &str, override_dir: Option<&Path>) -> Result<(), LoadError> {
    let toml_map = user_toml::load_env_map(app_name)?;
    let dotenv_map = env_file::load_env_map(override_dir).map_err(LoadError::DotenvRead)?;

    let mut keys: std::collections::HashSet<String> = toml_map.keys().cloned().collect();
    keys.extend(dotenv_map.keys().cloned());

    for key in keys {
        if std::env::var(&key).is_ok() {
            continue; // existing env wins
        }
        let value = dotenv_map.get(&key).or_else(|| toml_map.get(&key)).cloned();
        if let Some(v) = value {
            std::env::set_var(&key, v);
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::env;

    fn restore_var(key: &str, prev: Option<String>) {
        match prev {
            Some(v) => env::set_var(key, v),
            None => env::remove_var(key),
        }
    }

    #[test]
    fn existing_env_wins() {
        env::set_var("TILLER_CONFIG_TEST_EXISTING", "from_env");
        let _ = load_and_apply("tiller", None);
        assert_eq!(
            env::var("TILLER_CONFIG_TEST_EXISTING").as_deref(),
            Ok("from_env")
        );
        env::remove_var("TILLER_CONFIG_TEST_EXISTING");
    }

    #[test]
    fn load_and_apply_no_config_ok() {
        let r = load_and_apply("config-crate-nonexistent-app-xyz", None::<&Path>);
        assert!(r.is_ok());
    }

    #[test]
    fn dotenv_value_applied_when_env_missing() {
        let dotenv_dir = tempfile::tempdir().unwrap();
        std::fs::write(
            dotenv_dir.path().join(".env"),
            "TILLER_CONFIG_TEST_DOTENV=from_dotenv\n",
        )
        .unwrap();

        let prev = env::var("TILLER_CONFIG_TEST_DOTENV").ok();
        env::remove_var("TILLER_CONFIG_TEST_DOTENV");

        let _ = load_and_apply("config-crate-nonexistent-app-xyz", Some(dotenv_dir.path()));
        let val = env::var("TILLER_CONFIG_TEST_DOTENV").unwrap();
        restore_var("TILLER_CONFIG_TEST_DOTENV", prev);

        assert_eq!(val, "from_dotenv");
    }
}
