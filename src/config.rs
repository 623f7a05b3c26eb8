// src/config.rs

//! Configuration for `set`
//!
//! Values are layered: built-in defaults, then a TOML file, then `SET_*`
//! environment variables. Command-line flags are applied on top by the
//! binary. Example file:
//!
//! ```toml
//! cellar = "/opt/set/cellar"
//! prefix = "/opt/set"
//! recipe_index = "https://recipes.example.org"
//! keyring = "/etc/set/keys"
//! jobs = 8
//! build_timeout_secs = 3600
//! ```

use crate::error::{Error, Result};
use crate::recipe::kitchen::{default_jobs, KitchenConfig};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::debug;

/// Environment variable naming the config file
pub const CONFIG_ENV: &str = "SET_CONFIG";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Root of per-package install directories
    pub cellar: PathBuf,
    /// Shared prefix receiving the symlink farm
    pub prefix: PathBuf,
    /// Base URL recipes are fetched from by name
    pub recipe_index: Option<String>,
    /// Directory of trusted OpenPGP certificates
    pub keyring: PathBuf,
    /// Where link lock files are kept
    pub lock_dir: PathBuf,
    /// Parent directory of build workspaces
    pub work_dir: PathBuf,
    pub jobs: usize,
    pub build_timeout_secs: Option<u64>,
}

impl Default for Config {
    fn default() -> Self {
        let tmp = std::env::temp_dir();
        Self {
            cellar: dirs::data_dir()
                .map(|d| d.join("set/cellar"))
                .unwrap_or_else(|| PathBuf::from("/usr/local/set/cellar")),
            prefix: dirs::home_dir()
                .map(|d| d.join(".local"))
                .unwrap_or_else(|| PathBuf::from("/usr/local")),
            recipe_index: None,
            keyring: default_config_dir().join("keys"),
            lock_dir: tmp.clone(),
            work_dir: tmp,
            jobs: default_jobs(),
            build_timeout_secs: None,
        }
    }
}

fn default_config_dir() -> PathBuf {
    dirs::config_dir()
        .map(|d| d.join("set"))
        .unwrap_or_else(|| PathBuf::from("/etc/set"))
}

/// `$XDG_CONFIG_HOME/set/config.toml`
pub fn default_config_path() -> PathBuf {
    default_config_dir().join("config.toml")
}

impl Config {
    /// Parse a TOML document; missing keys keep their defaults
    pub fn from_toml(content: &str) -> Result<Self> {
        toml::from_str(content).map_err(|e| Error::Config(e.to_string()))
    }

    /// Read a TOML config file
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            Error::Config(format!("Failed to read config file {}: {}", path.display(), e))
        })?;
        Self::from_toml(&content)
            .map_err(|e| Error::Config(format!("{}: {}", path.display(), e)))
    }

    /// Load the layered configuration from the process environment
    ///
    /// `explicit` (the `--config` flag) wins over `SET_CONFIG`, which wins
    /// over the default path. Only an explicitly named file must exist.
    pub fn load(explicit: Option<&Path>) -> Result<Self> {
        Self::load_with(explicit, |key| std::env::var(key).ok())
    }

    /// [`Config::load`] with a custom environment lookup
    pub fn load_with(
        explicit: Option<&Path>,
        env: impl Fn(&str) -> Option<String>,
    ) -> Result<Self> {
        let named = explicit
            .map(Path::to_path_buf)
            .or_else(|| env(CONFIG_ENV).map(PathBuf::from));

        let mut config = match named {
            Some(path) => Self::from_file(&path)?,
            None => {
                let path = default_config_path();
                if path.is_file() {
                    Self::from_file(&path)?
                } else {
                    Self::default()
                }
            }
        };

        config.apply_env(env);
        config.absolutize()?;
        debug!("Configuration: {:?}", config);
        Ok(config)
    }

    /// Apply `SET_*` overrides
    pub fn apply_env(&mut self, env: impl Fn(&str) -> Option<String>) {
        let non_empty = |key: &str| env(key).filter(|v| !v.is_empty());

        if let Some(v) = non_empty("SET_CELLAR") {
            self.cellar = v.into();
        }
        if let Some(v) = non_empty("SET_PREFIX") {
            self.prefix = v.into();
        }
        if let Some(v) = non_empty("SET_RECIPE_INDEX") {
            self.recipe_index = Some(v);
        }
        if let Some(v) = non_empty("SET_KEYRING") {
            self.keyring = v.into();
        }
        if let Some(v) = non_empty("SET_LOCK_DIR") {
            self.lock_dir = v.into();
        }
        if let Some(v) = non_empty("SET_WORK_DIR") {
            self.work_dir = v.into();
        }
    }

    /// Resolve relative paths against the current directory
    pub fn absolutize(&mut self) -> Result<()> {
        for path in [
            &mut self.cellar,
            &mut self.prefix,
            &mut self.keyring,
            &mut self.lock_dir,
            &mut self.work_dir,
        ] {
            if path.as_os_str().is_empty() {
                return Err(Error::Config("paths must not be empty".to_string()));
            }
            if path.is_relative() {
                *path = std::path::absolute(&*path)?;
            }
        }
        Ok(())
    }

    pub fn build_timeout(&self) -> Option<Duration> {
        self.build_timeout_secs.map(Duration::from_secs)
    }

    /// Kitchen settings derived from this configuration
    pub fn kitchen_config(&self) -> KitchenConfig {
        KitchenConfig {
            cellar: self.cellar.clone(),
            work_dir: self.work_dir.clone(),
            keyring: self.keyring.clone(),
            jobs: self.jobs.max(1),
            timeout: self.build_timeout(),
            ..KitchenConfig::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn env(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_partial_file_keeps_defaults() {
        let config = Config::from_toml("prefix = \"/opt/set\"\njobs = 2\n").unwrap();
        assert_eq!(config.prefix, PathBuf::from("/opt/set"));
        assert_eq!(config.jobs, 2);
        assert_eq!(config.cellar, Config::default().cellar);
        assert!(config.recipe_index.is_none());
    }

    #[test]
    fn test_invalid_toml() {
        let err = Config::from_toml("jobs = \"many\"").unwrap_err();
        assert_eq!(err.kind(), crate::error::ErrorKind::Config);
    }

    #[test]
    fn test_layering() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("config.toml");
        std::fs::write(
            &path,
            "cellar = \"/from/file/cellar\"\nprefix = \"/from/file\"\nbuild_timeout_secs = 60\n",
        )
        .unwrap();

        let config = Config::load_with(
            Some(path.as_path()),
            env(&[("SET_PREFIX", "/from/env"), ("SET_RECIPE_INDEX", "https://r.example.test")]),
        )
        .unwrap();

        assert_eq!(config.cellar, PathBuf::from("/from/file/cellar"));
        assert_eq!(config.prefix, PathBuf::from("/from/env"));
        assert_eq!(config.recipe_index.as_deref(), Some("https://r.example.test"));
        assert_eq!(config.build_timeout(), Some(Duration::from_secs(60)));
    }

    #[test]
    fn test_config_env_names_file() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("alt.toml");
        std::fs::write(&path, "jobs = 5\n").unwrap();

        let config =
            Config::load_with(None, env(&[(CONFIG_ENV, path.to_str().unwrap())])).unwrap();
        assert_eq!(config.jobs, 5);
    }

    #[test]
    fn test_missing_explicit_file_is_error() {
        let err = Config::load_with(Some(Path::new("/nonexistent/set.toml")), env(&[])).unwrap_err();
        assert_eq!(err.kind(), crate::error::ErrorKind::Config);
    }

    #[test]
    fn test_relative_paths_are_absolutized() {
        let mut config = Config::default();
        config.cellar = PathBuf::from("cellar");
        config.absolutize().unwrap();
        assert!(config.cellar.is_absolute());
        assert!(config.cellar.ends_with("cellar"));
    }

    #[test]
    fn test_kitchen_config() {
        let mut config = Config::default();
        config.jobs = 0;
        config.build_timeout_secs = Some(5);
        let kitchen = config.kitchen_config();
        assert_eq!(kitchen.jobs, 1);
        assert_eq!(kitchen.timeout, Some(Duration::from_secs(5)));
        assert_eq!(kitchen.cellar, config.cellar);
        assert!(!kitchen.reinstall);
    }
}
