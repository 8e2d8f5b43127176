//! # Configuration
//!
//! Echo configuration is managed by [`confique`], layered in priority order:
//!
//! 1. **Environment variables**: `ECHO_DATA_DIR`, `ECHO_NOTIFICATIONS`, ...
//! 2. **Config file**: `echo.toml` in the OS config directory (via `directories`),
//!    or the path given explicitly to [`EchoConfig::load_from`].
//! 3. **Compiled defaults**: `#[config(default = ...)]`.
//!
//! ## Available Settings
//!
//! | Key | Env | Default | Description |
//! |-----|-----|---------|-------------|
//! | `data_dir` | `ECHO_DATA_DIR` | OS data dir | Where the file store keeps its collections |
//! | `notifications` | `ECHO_NOTIFICATIONS` | `true` | Create notifications for likes, follows, comments |
//! | `log_filter` | `ECHO_LOG` | `warn` | `tracing` filter used when `RUST_LOG` is unset |
//! | `reconcile_interval_secs` | `ECHO_RECONCILE_INTERVAL` | `0` | Repeat `echo reconcile` every N seconds; 0 runs once |

use crate::error::Result;
use confique::Config;
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

pub const CONFIG_FILE: &str = "echo.toml";

#[derive(Config, Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct EchoConfig {
    /// Directory holding one JSON file per collection.
    #[config(env = "ECHO_DATA_DIR")]
    pub data_dir: Option<PathBuf>,

    #[config(env = "ECHO_NOTIFICATIONS", default = true)]
    pub notifications: bool,

    #[config(env = "ECHO_LOG", default = "warn")]
    pub log_filter: String,

    #[config(env = "ECHO_RECONCILE_INTERVAL", default = 0)]
    pub reconcile_interval_secs: u64,
}

impl Default for EchoConfig {
    fn default() -> Self {
        Self {
            data_dir: None,
            notifications: true,
            log_filter: "warn".to_string(),
            reconcile_interval_secs: 0,
        }
    }
}

fn project_dirs() -> Option<ProjectDirs> {
    ProjectDirs::from("", "", "echo")
}

impl EchoConfig {
    /// Load from the environment and the default config file, if any.
    pub fn load() -> Result<Self> {
        let file = project_dirs().map(|dirs| dirs.config_dir().join(CONFIG_FILE));
        Self::load_from(file.as_deref())
    }

    /// Load from the environment and `file`. A missing file is skipped.
    pub fn load_from(file: Option<&Path>) -> Result<Self> {
        let mut builder = Self::builder().env();
        if let Some(path) = file {
            builder = builder.file(path);
        }
        Ok(builder.load()?)
    }

    /// The configured data directory, else the OS data dir, else `./.echo`.
    pub fn data_dir(&self) -> PathBuf {
        if let Some(dir) = &self.data_dir {
            return dir.clone();
        }
        project_dirs()
            .map(|dirs| dirs.data_dir().to_path_buf())
            .unwrap_or_else(|| PathBuf::from(".echo"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn test_default_config() {
        let config = EchoConfig::default();
        assert!(config.notifications);
        assert_eq!(config.log_filter, "warn");
        assert_eq!(config.reconcile_interval_secs, 0);
        assert!(config.data_dir.is_none());
    }

    #[test]
    fn test_explicit_data_dir_wins() {
        let config = EchoConfig {
            data_dir: Some(PathBuf::from("/tmp/echo-data")),
            ..Default::default()
        };
        assert_eq!(config.data_dir(), PathBuf::from("/tmp/echo-data"));
    }

    #[test]
    fn test_file_values_are_loaded() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join(CONFIG_FILE);
        fs::write(
            &path,
            "notifications = false\nreconcile_interval_secs = 30\n",
        )
        .unwrap();

        let config = EchoConfig::load_from(Some(&path)).unwrap();
        assert!(!config.notifications);
        assert_eq!(config.reconcile_interval_secs, 30);
        assert_eq!(config.log_filter, "warn");
    }

    #[test]
    fn test_missing_file_falls_back_to_defaults() {
        let dir = TempDir::new().unwrap();
        let config = EchoConfig::load_from(Some(&dir.path().join("absent.toml"))).unwrap();
        assert_eq!(config.log_filter, "warn");
    }
}
