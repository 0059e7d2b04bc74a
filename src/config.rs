//! Arbiter configuration.
//!
//! Loaded from `~/.gitgc-arbiter/config.toml`. Every key is optional; a
//! missing file means all defaults.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::job::DEFAULT_GIT_DIR;

/// Errors from loading the configuration file.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("could not determine home directory")]
    NoHome,

    #[error("failed to read {path}: {source}")]
    Read { path: PathBuf, source: io::Error },

    #[error("invalid config at {path}: {source}")]
    Parse {
        path: PathBuf,
        source: toml::de::Error,
    },

    #[error("{key} is empty in {path}")]
    Empty { key: &'static str, path: PathBuf },
}

/// Arbiter configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct Config {
    /// Conflict domain used when `--domain` is not given.
    pub default_domain: String,

    /// Repository mount point inside generated jobs.
    pub git_dir: String,

    /// Log filter used when `RUST_LOG` is unset.
    pub log_level: String,

    /// Where domain databases live. Defaults to `~/.gitgc-arbiter/domains/`.
    pub storage_root: Option<PathBuf>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            default_domain: "default".to_string(),
            git_dir: DEFAULT_GIT_DIR.to_string(),
            log_level: "warn".to_string(),
            storage_root: None,
        }
    }
}

impl Config {
    /// Load config from `~/.gitgc-arbiter/config.toml`.
    pub fn load() -> Result<Self, ConfigError> {
        let path = Self::path().ok_or(ConfigError::NoHome)?;
        Self::load_from(&path)
    }

    /// Load config from `path`, falling back to defaults if it doesn't exist.
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        let contents = match fs::read_to_string(path) {
            Ok(c) => c,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(Self::default()),
            Err(source) => {
                return Err(ConfigError::Read {
                    path: path.to_path_buf(),
                    source,
                });
            }
        };

        let config: Self = toml::from_str(&contents).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })?;

        for (key, value) in [
            ("default-domain", &config.default_domain),
            ("git-dir", &config.git_dir),
        ] {
            if value.trim().is_empty() {
                return Err(ConfigError::Empty {
                    key,
                    path: path.to_path_buf(),
                });
            }
        }

        Ok(config)
    }

    /// The config file path: `~/.gitgc-arbiter/config.toml`.
    pub fn path() -> Option<PathBuf> {
        dirs::home_dir().map(|h| h.join(".gitgc-arbiter").join("config.toml"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use tempfile::TempDir;

    fn write_config(contents: &str) -> (TempDir, PathBuf) {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("config.toml");
        fs::write(&path, contents).unwrap();
        (dir, path)
    }

    #[test]
    fn missing_file_yields_defaults() {
        let dir = TempDir::new().unwrap();
        let config = Config::load_from(&dir.path().join("config.toml")).unwrap();
        assert_eq!(config, Config::default());
        assert_eq!(config.git_dir, "/var/gerrit/git");
        assert_eq!(config.log_level, "warn");
    }

    #[test]
    fn partial_file_keeps_other_defaults() {
        let (_dir, path) = write_config("default-domain = \"gerrit-prod\"\n");
        let config = Config::load_from(&path).unwrap();
        assert_eq!(config.default_domain, "gerrit-prod");
        assert_eq!(config.git_dir, DEFAULT_GIT_DIR);
        assert_eq!(config.storage_root, None);
    }

    #[test]
    fn full_file() {
        let (_dir, path) = write_config(
            r#"
default-domain = "gerrit"
git-dir = "/srv/git"
log-level = "debug"
storage-root = "/var/lib/gitgc"
"#,
        );
        let config = Config::load_from(&path).unwrap();
        assert_eq!(config.git_dir, "/srv/git");
        assert_eq!(config.log_level, "debug");
        assert_eq!(config.storage_root, Some(PathBuf::from("/var/lib/gitgc")));
    }

    #[test]
    fn invalid_toml_is_reported() {
        let (_dir, path) = write_config("default-domain = ");
        let err = Config::load_from(&path).unwrap_err();
        assert!(matches!(err, ConfigError::Parse { .. }));
    }

    #[test]
    fn empty_domain_is_rejected() {
        let (_dir, path) = write_config("default-domain = \"\"\n");
        let err = Config::load_from(&path).unwrap_err();
        assert!(matches!(err, ConfigError::Empty { key: "default-domain", .. }));
    }
}
