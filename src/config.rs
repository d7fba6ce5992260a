//! Storage configuration
//!
//! Settings come from a JSON file (`appsettings.json` by default) with an
//! `azureStorage` section, and environment variables override the file:
//!
//! ```json
//! {
//!   "azureStorage": {
//!     "storageConnectionString": "DefaultEndpointsProtocol=https;AccountName=...;AccountKey=...",
//!     "storageTableName": "people",
//!     "scanPageSize": 1000
//!   }
//! }
//! ```

use serde::Deserialize;
use std::path::Path;
use tracing::{debug, info};

use crate::error::{Result, TableError};

pub const DEFAULT_SETTINGS_FILE: &str = "appsettings.json";

/// Service maximum for entities per query page
pub const MAX_SCAN_PAGE_SIZE: usize = 1000;

pub const ENV_CONNECTION_STRING: &str = "STORAGE_CONNECTION_STRING";
pub const ENV_AZURE_CONNECTION_STRING: &str = "AZURE_STORAGE_CONNECTION_STRING";
pub const ENV_TABLE_NAME: &str = "STORAGE_TABLE_NAME";
pub const ENV_SCAN_PAGE_SIZE: &str = "STORAGE_SCAN_PAGE_SIZE";

#[derive(Clone)]
pub struct StorageConfig {
    pub connection_string: String,
    pub table_name: String,
    /// Records requested per scan page
    pub scan_page_size: usize,
}

impl std::fmt::Debug for StorageConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StorageConfig")
            .field("connection_string", &"<redacted>")
            .field("table_name", &self.table_name)
            .field("scan_page_size", &self.scan_page_size)
            .finish()
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SettingsFile {
    #[serde(default)]
    azure_storage: StorageSection,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct StorageSection {
    storage_connection_string: Option<String>,
    storage_table_name: Option<String>,
    scan_page_size: Option<usize>,
}

impl StorageConfig {
    pub fn new(connection_string: impl Into<String>, table_name: impl Into<String>) -> Result<Self> {
        let config = Self {
            connection_string: connection_string.into(),
            table_name: table_name.into(),
            scan_page_size: MAX_SCAN_PAGE_SIZE,
        };
        config.validate()?;
        Ok(config)
    }

    /// Load from a settings file, then apply environment overrides.
    ///
    /// A missing file is fine as long as the environment supplies the
    /// required keys.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let json = match std::fs::read_to_string(path) {
            Ok(json) => {
                info!("Loading storage settings from {}", path.display());
                Some(json)
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!("Settings file {} not found, using environment only", path.display());
                None
            }
            Err(e) => return Err(e.into()),
        };

        Self::resolve(json.as_deref(), |name| std::env::var(name).ok())
    }

    /// Build from optional settings JSON and an environment lookup
    pub fn resolve<F>(json: Option<&str>, env: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let section = match json {
            Some(json) => serde_json::from_str::<SettingsFile>(json)?.azure_storage,
            None => StorageSection::default(),
        };

        let connection_string = env(ENV_CONNECTION_STRING)
            .or_else(|| env(ENV_AZURE_CONNECTION_STRING))
            .or(section.storage_connection_string)
            .ok_or_else(|| {
                TableError::ConfigError(format!(
                    "missing storageConnectionString (set azureStorage.storageConnectionString or {})",
                    ENV_CONNECTION_STRING
                ))
            })?;

        let table_name = env(ENV_TABLE_NAME)
            .or(section.storage_table_name)
            .ok_or_else(|| {
                TableError::ConfigError(format!(
                    "missing storageTableName (set azureStorage.storageTableName or {})",
                    ENV_TABLE_NAME
                ))
            })?;

        let scan_page_size = match env(ENV_SCAN_PAGE_SIZE) {
            Some(raw) => raw.parse::<usize>().map_err(|_| {
                TableError::ConfigError(format!("{} is not a number: {}", ENV_SCAN_PAGE_SIZE, raw))
            })?,
            None => section.scan_page_size.unwrap_or(MAX_SCAN_PAGE_SIZE),
        };

        let config = Self {
            connection_string,
            table_name,
            scan_page_size,
        };
        config.validate()?;
        Ok(config)
    }

    pub fn with_scan_page_size(mut self, scan_page_size: usize) -> Result<Self> {
        self.scan_page_size = scan_page_size;
        self.validate()?;
        Ok(self)
    }

    fn validate(&self) -> Result<()> {
        validate_table_name(&self.table_name)?;
        if self.scan_page_size == 0 || self.scan_page_size > MAX_SCAN_PAGE_SIZE {
            return Err(TableError::ConfigError(format!(
                "scanPageSize must be between 1 and {}, got {}",
                MAX_SCAN_PAGE_SIZE, self.scan_page_size
            )));
        }
        Ok(())
    }
}

/// Table names are 3-63 alphanumeric characters and start with a letter
pub fn validate_table_name(name: &str) -> Result<()> {
    let valid_len = (3..=63).contains(&name.len());
    let starts_with_letter = name.chars().next().map_or(false, |c| c.is_ascii_alphabetic());
    let alphanumeric = name.chars().all(|c| c.is_ascii_alphanumeric());

    if valid_len && starts_with_letter && alphanumeric {
        Ok(())
    } else {
        Err(TableError::ConfigError(format!(
            "invalid table name '{}': expected 3-63 alphanumeric characters starting with a letter",
            name
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    const SETTINGS: &str = r#"{
        "azureStorage": {
            "storageConnectionString": "AccountName=fileacct;AccountKey=a2V5",
            "storageTableName": "people"
        }
    }"#;

    fn env_of(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |name| vars.get(name).cloned()
    }

    #[test]
    fn test_settings_file_only() {
        let config = StorageConfig::resolve(Some(SETTINGS), env_of(&[])).unwrap();
        assert_eq!(config.connection_string, "AccountName=fileacct;AccountKey=a2V5");
        assert_eq!(config.table_name, "people");
        assert_eq!(config.scan_page_size, MAX_SCAN_PAGE_SIZE);
    }

    #[test]
    fn test_environment_overrides_file() {
        let env = env_of(&[
            (ENV_CONNECTION_STRING, "AccountName=envacct;AccountKey=a2V5"),
            (ENV_TABLE_NAME, "contacts"),
            (ENV_SCAN_PAGE_SIZE, "50"),
        ]);
        let config = StorageConfig::resolve(Some(SETTINGS), env).unwrap();
        assert_eq!(config.connection_string, "AccountName=envacct;AccountKey=a2V5");
        assert_eq!(config.table_name, "contacts");
        assert_eq!(config.scan_page_size, 50);
    }

    #[test]
    fn test_azure_connection_string_variable() {
        let env = env_of(&[
            (ENV_AZURE_CONNECTION_STRING, "UseDevelopmentStorage=true"),
            (ENV_TABLE_NAME, "people"),
        ]);
        let config = StorageConfig::resolve(None, env).unwrap();
        assert_eq!(config.connection_string, "UseDevelopmentStorage=true");
    }

    #[test]
    fn test_missing_keys() {
        let err = StorageConfig::resolve(None, env_of(&[])).unwrap_err();
        assert!(err.to_string().contains("storageConnectionString"));

        let env = env_of(&[(ENV_CONNECTION_STRING, "UseDevelopmentStorage=true")]);
        let err = StorageConfig::resolve(Some("{}"), env).unwrap_err();
        assert!(err.to_string().contains("storageTableName"));
    }

    #[test]
    fn test_bad_page_size() {
        let json = r#"{"azureStorage": {"storageConnectionString": "x", "storageTableName": "people", "scanPageSize": 0}}"#;
        assert!(StorageConfig::resolve(Some(json), env_of(&[])).is_err());

        let env = env_of(&[(ENV_SCAN_PAGE_SIZE, "lots")]);
        assert!(StorageConfig::resolve(Some(SETTINGS), env).is_err());

        let config = StorageConfig::new("x", "people").unwrap();
        assert!(config.with_scan_page_size(MAX_SCAN_PAGE_SIZE + 1).is_err());
    }

    #[test]
    fn test_malformed_json() {
        let err = StorageConfig::resolve(Some("{not json"), env_of(&[])).unwrap_err();
        assert!(matches!(err, TableError::SerializationError(_)));
    }

    #[test]
    fn test_table_names() {
        assert!(validate_table_name("people").is_ok());
        assert!(validate_table_name("People2024").is_ok());
        assert!(validate_table_name("pe").is_err());
        assert!(validate_table_name("2people").is_err());
        assert!(validate_table_name("people-table").is_err());
        assert!(validate_table_name(&"p".repeat(64)).is_err());
    }

    #[test]
    fn test_load_from_file() {
        let path = std::env::temp_dir().join(format!("people-table-settings-{}.json", std::process::id()));
        std::fs::write(&path, SETTINGS).unwrap();

        let config = StorageConfig::load(&path).unwrap();
        assert_eq!(config.table_name, "people");

        std::fs::remove_file(&path).unwrap();
    }

    #[test]
    fn test_debug_redacts_connection_string() {
        let config = StorageConfig::new("AccountName=a;AccountKey=c2VjcmV0", "people").unwrap();
        assert!(!format!("{:?}", config).contains("c2VjcmV0"));
    }
}
