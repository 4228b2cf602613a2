//! Run configuration.
//!
//! Everything a run needs is resolved once in `main` into a [`RunConfig`] and
//! passed down explicitly.
//!
//! Inventory files live in a config directory and are picked by name
//! (`<dir>/<name>.json`), or given directly by path. The directory resolves
//! with layered precedence:
//!
//! 1. `--directory` on the command line
//! 2. `TRACE_FINDER_CONFIG_DIR` environment variable
//! 3. [`DEFAULT_CONFIG_DIR`]

use crate::location::HostScope;
use crate::window::TimeWindow;
use std::path::{Path, PathBuf};
use thiserror::Error;
use time::UtcOffset;

/// Default directory holding named inventory files.
pub const DEFAULT_CONFIG_DIR: &str = "/home/oracle/tmp";

/// Environment variable overriding the inventory directory.
pub const CONFIG_DIR_ENV_VAR: &str = "TRACE_FINDER_CONFIG_DIR";

/// Extension appended to named inventories.
const INVENTORY_EXTENSION: &str = "json";

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("{} is not a directory", .0.display())]
    InvalidConfigDir(PathBuf),
    #[error("config file {} not found", .0.display())]
    InventoryMissing(PathBuf),
    #[error("config file {} is not a file", .0.display())]
    InventoryNotAFile(PathBuf),
    #[error("invalid download directory {}", .0.display())]
    InvalidDownloadDir(PathBuf),
}

/// Where the inventory comes from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InventorySource {
    /// `--config <file>`
    File(PathBuf),
    /// `--name <name>` inside the config directory.
    Named {
        name: String,
        directory: Option<PathBuf>,
    },
}

impl InventorySource {
    /// Resolve and validate the inventory file path.
    pub fn resolve(&self) -> Result<PathBuf, ConfigError> {
        self.resolve_with_env(std::env::var(CONFIG_DIR_ENV_VAR).ok())
    }

    /// Internal resolver that accepts the env var value as a parameter for testability.
    fn resolve_with_env(&self, env_value: Option<String>) -> Result<PathBuf, ConfigError> {
        let path = match self {
            InventorySource::File(path) => path.clone(),
            InventorySource::Named { name, directory } => {
                let dir = config_dir(directory.as_deref(), env_value);
                if !dir.is_dir() {
                    return Err(ConfigError::InvalidConfigDir(dir));
                }
                dir.join(format!("{name}.{INVENTORY_EXTENSION}"))
            }
        };

        if !path.exists() {
            return Err(ConfigError::InventoryMissing(path));
        }
        if !path.is_file() {
            return Err(ConfigError::InventoryNotAFile(path));
        }
        Ok(path)
    }
}

/// Pick the config directory: CLI flag, then env var, then the default.
///
/// Empty or whitespace-only values fall through to the next layer.
pub fn config_dir(cli_override: Option<&Path>, env_value: Option<String>) -> PathBuf {
    cli_override
        .filter(|p| !p.as_os_str().is_empty())
        .map(Path::to_path_buf)
        .or_else(|| {
            env_value
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
                .map(PathBuf::from)
        })
        .unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_DIR))
}

/// Resolve the download directory (default: current directory) to an
/// absolute path. It must already exist.
pub fn resolve_download_dir(dir: Option<&Path>) -> Result<PathBuf, ConfigError> {
    let dir = dir.unwrap_or(Path::new("."));
    if !dir.is_dir() {
        return Err(ConfigError::InvalidDownloadDir(dir.to_path_buf()));
    }
    std::fs::canonicalize(dir).map_err(|_| ConfigError::InvalidDownloadDir(dir.to_path_buf()))
}

/// Read-only settings shared by every lookup in a run.
#[derive(Debug, Clone)]
pub struct RunConfig {
    /// Short name of the machine the tool runs on.
    pub current_host: String,
    pub scope: HostScope,
    pub window: TimeWindow,
    /// Offset used to render timestamps.
    pub offset: UtcOffset,
    /// Copy every reported file here when set.
    pub download_dir: Option<PathBuf>,
}

impl RunConfig {
    /// Config for the given host with no filters, no downloads, UTC output.
    pub fn new(current_host: impl Into<String>) -> Self {
        Self {
            current_host: current_host.into(),
            scope: HostScope::All,
            window: TimeWindow::unbounded(),
            offset: UtcOffset::UTC,
            download_dir: None,
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;
    use tempfile::TempDir;

    /// Save, set, and restore an environment variable around a closure.
    /// Uses `unsafe` as required by Rust 2024 edition for `set_var`/`remove_var`.
    fn with_env<F, R>(key: &str, value: &str, f: F) -> R
    where
        F: FnOnce() -> R,
    {
        let orig = std::env::var(key).ok();
        unsafe { std::env::set_var(key, value) };
        let result = f();
        unsafe {
            match orig {
                Some(v) => std::env::set_var(key, v),
                None => std::env::remove_var(key),
            }
        }
        result
    }

    #[test]
    fn test_config_dir_precedence() {
        assert_eq!(
            config_dir(Some(Path::new("/cli")), Some("/env".to_string())),
            PathBuf::from("/cli")
        );
        assert_eq!(
            config_dir(None, Some("/env".to_string())),
            PathBuf::from("/env")
        );
        assert_eq!(config_dir(None, None), PathBuf::from(DEFAULT_CONFIG_DIR));
    }

    #[test]
    fn test_config_dir_blank_env_falls_through() {
        assert_eq!(
            config_dir(None, Some("  ".to_string())),
            PathBuf::from(DEFAULT_CONFIG_DIR)
        );
    }

    #[test]
    fn test_named_inventory_resolves_in_directory() {
        let dir = TempDir::new().unwrap();
        let file = dir.path().join("prod.json");
        std::fs::write(&file, "[]").unwrap();

        let source = InventorySource::Named {
            name: "prod".to_string(),
            directory: Some(dir.path().to_path_buf()),
        };
        assert_eq!(source.resolve_with_env(None).unwrap(), file);
    }

    #[test]
    fn test_named_inventory_uses_env_dir() {
        let dir = TempDir::new().unwrap();
        let file = dir.path().join("prod.json");
        std::fs::write(&file, "[]").unwrap();

        let source = InventorySource::Named {
            name: "prod".to_string(),
            directory: None,
        };
        let env = Some(dir.path().to_string_lossy().into_owned());
        assert_eq!(source.resolve_with_env(env).unwrap(), file);
    }

    #[test]
    #[serial]
    fn test_resolve_reads_env_var() {
        let dir = TempDir::new().unwrap();
        let file = dir.path().join("stage.json");
        std::fs::write(&file, "[]").unwrap();

        let source = InventorySource::Named {
            name: "stage".to_string(),
            directory: None,
        };
        let resolved = with_env(CONFIG_DIR_ENV_VAR, &dir.path().to_string_lossy(), || {
            source.resolve()
        });
        assert_eq!(resolved.unwrap(), file);
    }

    #[test]
    fn test_named_inventory_invalid_dir() {
        let dir = TempDir::new().unwrap();
        let missing = dir.path().join("nope");
        let source = InventorySource::Named {
            name: "prod".to_string(),
            directory: Some(missing.clone()),
        };
        assert_eq!(
            source.resolve_with_env(None),
            Err(ConfigError::InvalidConfigDir(missing))
        );
    }

    #[test]
    fn test_inventory_file_missing_or_not_a_file() {
        let dir = TempDir::new().unwrap();
        let missing = dir.path().join("missing.json");
        assert_eq!(
            InventorySource::File(missing.clone()).resolve_with_env(None),
            Err(ConfigError::InventoryMissing(missing))
        );
        assert_eq!(
            InventorySource::File(dir.path().to_path_buf()).resolve_with_env(None),
            Err(ConfigError::InventoryNotAFile(dir.path().to_path_buf()))
        );
    }

    #[test]
    fn test_resolve_download_dir() {
        let dir = TempDir::new().unwrap();
        let resolved = resolve_download_dir(Some(dir.path())).unwrap();
        assert!(resolved.is_absolute());
        assert_eq!(resolved, std::fs::canonicalize(dir.path()).unwrap());

        let missing = dir.path().join("missing");
        assert_eq!(
            resolve_download_dir(Some(&missing)),
            Err(ConfigError::InvalidDownloadDir(missing))
        );
    }

    #[test]
    fn test_resolve_download_dir_defaults_to_cwd() {
        let resolved = resolve_download_dir(None).unwrap();
        assert_eq!(resolved, std::env::current_dir().unwrap().canonicalize().unwrap());
    }
}
