//! Runtime configuration loaded from TOML.
//!
//! # Invariants
//! - Every key is optional; missing keys take the documented defaults.
//! - Unknown keys are rejected so typos do not silently fall back.
//! - Windows, limits and sizes are strictly positive.

use crate::service::dashboard_service::DashboardSettings;
use crate::storage::{DocumentStore, DEFAULT_MAX_UPLOAD_BYTES};
use serde::{Deserialize, Serialize};
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::path::{Path, PathBuf};

#[derive(Debug)]
pub enum ConfigError {
    Io { path: PathBuf, source: std::io::Error },
    Parse(toml::de::Error),
    Invalid(String),
}

impl Display for ConfigError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Io { path, source } => {
                write!(f, "failed to read config `{}`: {source}", path.display())
            }
            Self::Parse(err) => write!(f, "invalid config: {err}"),
            Self::Invalid(message) => write!(f, "invalid config: {message}"),
        }
    }
}

impl Error for ConfigError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Io { source, .. } => Some(source),
            Self::Parse(err) => Some(err),
            Self::Invalid(_) => None,
        }
    }
}

impl From<toml::de::Error> for ConfigError {
    fn from(value: toml::de::Error) -> Self {
        Self::Parse(value)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ContractVaultConfig {
    pub database_path: PathBuf,
    pub storage_root: PathBuf,
    pub log_level: String,
    /// Absolute directory for rolling log files; logging stays off when unset.
    pub log_dir: Option<PathBuf>,
    pub log_file_max_bytes: u64,
    pub log_file_count: u32,
    pub expiring_window_days: u32,
    pub notice_window_days: u32,
    pub dashboard_item_limit: u32,
    pub page_size: u32,
    pub max_upload_bytes: u64,
}

impl Default for ContractVaultConfig {
    fn default() -> Self {
        let dashboard = DashboardSettings::default();
        Self {
            database_path: PathBuf::from("contractvault.sqlite3"),
            storage_root: PathBuf::from("media"),
            log_level: crate::logging::default_log_level().to_string(),
            log_dir: None,
            log_file_max_bytes: crate::logging::DEFAULT_LOG_FILE_MAX_BYTES,
            log_file_count: crate::logging::DEFAULT_LOG_FILE_COUNT,
            expiring_window_days: dashboard.expiring_window_days,
            notice_window_days: dashboard.notice_window_days,
            dashboard_item_limit: dashboard.item_limit,
            page_size: crate::service::query_service::DEFAULT_PAGE_SIZE,
            max_upload_bytes: DEFAULT_MAX_UPLOAD_BYTES,
        }
    }
}

impl ContractVaultConfig {
    pub fn from_toml(text: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    /// Reads `path`; relative database and storage paths resolve against
    /// the file's directory.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let mut config = Self::from_toml(&text)?;
        if let Some(base) = path.parent() {
            config.database_path = rebase(base, &config.database_path);
            config.storage_root = rebase(base, &config.storage_root);
        }
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let positive = [
            ("expiring_window_days", u64::from(self.expiring_window_days)),
            ("notice_window_days", u64::from(self.notice_window_days)),
            ("dashboard_item_limit", u64::from(self.dashboard_item_limit)),
            ("page_size", u64::from(self.page_size)),
            ("max_upload_bytes", self.max_upload_bytes),
            ("log_file_max_bytes", self.log_file_max_bytes),
            ("log_file_count", u64::from(self.log_file_count)),
        ];
        if let Some((key, _)) = positive.iter().find(|(_, value)| *value == 0) {
            return Err(ConfigError::Invalid(format!("`{key}` must be greater than zero")));
        }
        if let Some(dir) = &self.log_dir {
            if !dir.is_absolute() {
                return Err(ConfigError::Invalid(format!(
                    "`log_dir` must be absolute, got `{}`",
                    dir.display()
                )));
            }
        }
        Ok(())
    }

    pub fn dashboard_settings(&self) -> DashboardSettings {
        DashboardSettings {
            expiring_window_days: self.expiring_window_days,
            notice_window_days: self.notice_window_days,
            item_limit: self.dashboard_item_limit,
        }
    }

    pub fn document_store(&self) -> DocumentStore {
        DocumentStore::new(self.storage_root.clone(), self.max_upload_bytes)
    }
}

fn rebase(base: &Path, path: &Path) -> PathBuf {
    if path.is_absolute() || base.as_os_str().is_empty() {
        path.to_path_buf()
    } else {
        base.join(path)
    }
}

#[cfg(test)]
mod tests {
    use super::{ConfigError, ContractVaultConfig};
    use std::path::PathBuf;

    #[test]
    fn empty_document_uses_defaults() {
        let config = ContractVaultConfig::from_toml("").unwrap();
        assert_eq!(config, ContractVaultConfig::default());
        assert_eq!(config.expiring_window_days, 30);
        assert_eq!(config.dashboard_item_limit, 10);
        assert_eq!(config.page_size, 20);
        assert_eq!(config.max_upload_bytes, 20 * 1024 * 1024);
        assert_eq!(config.log_file_max_bytes, 10 * 1024 * 1024);
        assert_eq!(config.log_file_count, 5);
    }

    #[test]
    fn overrides_and_rejections() {
        let config = ContractVaultConfig::from_toml(
            "page_size = 50\nstorage_root = \"/srv/vault\"\nexpiring_window_days = 60\n",
        )
        .unwrap();
        assert_eq!(config.page_size, 50);
        assert_eq!(config.storage_root, PathBuf::from("/srv/vault"));
        assert_eq!(config.dashboard_settings().expiring_window_days, 60);

        assert!(matches!(
            ContractVaultConfig::from_toml("page_size = 0"),
            Err(ConfigError::Invalid(_))
        ));
        assert!(matches!(
            ContractVaultConfig::from_toml("pagesize = 10"),
            Err(ConfigError::Parse(_))
        ));
        assert!(matches!(
            ContractVaultConfig::from_toml("log_file_count = 0"),
            Err(ConfigError::Invalid(_))
        ));
        assert!(matches!(
            ContractVaultConfig::from_toml("log_dir = \"logs\""),
            Err(ConfigError::Invalid(_))
        ));
    }

    #[test]
    fn relative_paths_follow_the_config_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("vault.toml");
        std::fs::write(&path, "database_path = \"data/vault.db\"\n").unwrap();

        let config = ContractVaultConfig::from_file(&path).unwrap();
        assert_eq!(config.database_path, dir.path().join("data/vault.db"));
        assert_eq!(config.storage_root, dir.path().join("media"));
    }

    #[test]
    fn missing_file_is_io_error() {
        let err = ContractVaultConfig::from_file("/nonexistent/vault.toml").unwrap_err();
        assert!(matches!(err, ConfigError::Io { .. }));
    }
}
