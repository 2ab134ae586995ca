use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Environment variables that override the storage section, named after the
/// deployment's existing AWS settings.
pub const ENV_ACCESS_KEY_ID: &str = "AWS_ACCESS_KEY_ID";
pub const ENV_SECRET_ACCESS_KEY: &str = "AWS_SECRET_ACCESS_KEY";
pub const ENV_BUCKET_NAME: &str = "AWS_STORAGE_BUCKET_NAME";
pub const ENV_CONFIG_PATH: &str = "TRIPFRIEND_CONFIG";

pub const DEFAULT_RETENTION_DAYS: u32 = 14;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub database: DatabaseConfig,

    #[serde(default)]
    pub storage: StorageConfig,

    #[serde(default)]
    pub retention: RetentionConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    #[serde(default = "default_db_path")]
    pub sqlite_path: PathBuf,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            sqlite_path: default_db_path(),
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum StorageBackend {
    Filesystem,
    S3,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StorageConfig {
    /// Must be chosen explicitly, either here or through
    /// `AWS_STORAGE_BUCKET_NAME`.
    #[serde(default)]
    pub backend: Option<StorageBackend>,

    #[serde(default)]
    pub filesystem: FilesystemStorageConfig,

    #[serde(default)]
    pub s3: Option<S3StorageConfig>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FilesystemStorageConfig {
    /// Directory holding one file per object key.
    #[serde(default = "default_object_dir")]
    pub path: PathBuf,
}

impl Default for FilesystemStorageConfig {
    fn default() -> Self {
        Self {
            path: default_object_dir(),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct S3StorageConfig {
    pub bucket: String,

    #[serde(default)]
    pub access_key_id: Option<String>,

    #[serde(default)]
    pub secret_access_key: Option<String>,

    #[serde(default)]
    pub region: Option<String>,

    /// Custom endpoint for S3-compatible services (MinIO, R2, ...).
    #[serde(default)]
    pub endpoint: Option<String>,

    #[serde(default)]
    pub force_path_style: bool,

    /// Prepended to every photo file key.
    #[serde(default)]
    pub key_prefix: Option<String>,
}

impl S3StorageConfig {
    pub fn object_key(&self, file_key: &str) -> String {
        match &self.key_prefix {
            Some(prefix) => format!("{}{}", prefix, file_key),
            None => file_key.to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetentionConfig {
    /// Photos older than this many days are purged.
    #[serde(default = "default_retention_days")]
    pub retention_days: u32,
}

impl Default for RetentionConfig {
    fn default() -> Self {
        Self {
            retention_days: default_retention_days(),
        }
    }
}

impl RetentionConfig {
    pub fn period(&self) -> chrono::Duration {
        chrono::Duration::days(self.retention_days.into())
    }
}

fn default_retention_days() -> u32 {
    DEFAULT_RETENTION_DAYS
}

fn default_db_path() -> PathBuf {
    Config::data_dir().join("tripfriend.db")
}

fn default_object_dir() -> PathBuf {
    Config::data_dir().join("objects")
}

impl Config {
    /// Load from `TRIPFRIEND_CONFIG` or the default location, then apply
    /// environment overrides. A missing file yields defaults.
    pub fn load() -> Result<Self> {
        let path = std::env::var(ENV_CONFIG_PATH)
            .map(PathBuf::from)
            .unwrap_or_else(|_| Self::config_path());
        Self::load_from(&path)
    }

    pub fn load_from(path: &Path) -> Result<Self> {
        let mut config = if path.exists() {
            let content = std::fs::read_to_string(path)
                .with_context(|| format!("Failed to read config file {}", path.display()))?;
            toml::from_str::<Config>(&content)
                .with_context(|| format!("Failed to parse config file {}", path.display()))?
        } else {
            tracing::warn!("Config file not found at {:?}, using defaults", path);
            Config::default()
        };
        config.apply_env(|key| std::env::var(key).ok());
        Ok(config)
    }

    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content = toml::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Override S3 credentials and bucket from the environment.
    /// Setting a bucket creates the S3 section if the file had none and
    /// switches the backend to S3.
    pub fn apply_env<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        let bucket = lookup(ENV_BUCKET_NAME).filter(|v| !v.is_empty());
        let access_key = lookup(ENV_ACCESS_KEY_ID).filter(|v| !v.is_empty());
        let secret_key = lookup(ENV_SECRET_ACCESS_KEY).filter(|v| !v.is_empty());

        if bucket.is_none() && self.storage.s3.is_none() {
            return;
        }

        let s3 = self.storage.s3.get_or_insert_with(S3StorageConfig::default);
        if let Some(bucket) = bucket {
            s3.bucket = bucket;
            self.storage.backend = Some(StorageBackend::S3);
        }
        if access_key.is_some() {
            s3.access_key_id = access_key;
        }
        if secret_key.is_some() {
            s3.secret_access_key = secret_key;
        }
    }

    pub fn config_dir() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("tripfriend")
    }

    pub fn config_path() -> PathBuf {
        Self::config_dir().join("config.toml")
    }

    pub fn data_dir() -> PathBuf {
        dirs::data_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("tripfriend")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert_eq!(config.retention.retention_days, 14);
        assert_eq!(config.retention.period(), chrono::Duration::days(14));
        assert_eq!(config.storage.backend, None);
        assert!(config.storage.s3.is_none());
    }

    #[test]
    fn test_parse_partial_toml() {
        let config: Config = toml::from_str(
            r#"
            [storage]
            backend = "s3"

            [storage.s3]
            bucket = "trip-photos"
            region = "ap-northeast-2"

            [retention]
            retention_days = 7
            "#,
        )
        .unwrap();

        assert_eq!(config.storage.backend, Some(StorageBackend::S3));
        let s3 = config.storage.s3.unwrap();
        assert_eq!(s3.bucket, "trip-photos");
        assert_eq!(s3.region.as_deref(), Some("ap-northeast-2"));
        assert!(!s3.force_path_style);
        assert_eq!(config.retention.retention_days, 7);
    }

    #[test]
    fn test_env_overrides_credentials() {
        let env: HashMap<&str, &str> = [
            (ENV_BUCKET_NAME, "env-bucket"),
            (ENV_ACCESS_KEY_ID, "AKIA123"),
            (ENV_SECRET_ACCESS_KEY, "shh"),
        ]
        .into_iter()
        .collect();

        let mut config = Config::default();
        config.apply_env(|k| env.get(k).map(|v| v.to_string()));

        assert_eq!(config.storage.backend, Some(StorageBackend::S3));
        let s3 = config.storage.s3.unwrap();
        assert_eq!(s3.bucket, "env-bucket");
        assert_eq!(s3.access_key_id.as_deref(), Some("AKIA123"));
        assert_eq!(s3.secret_access_key.as_deref(), Some("shh"));
    }

    #[test]
    fn test_env_without_bucket_leaves_storage_alone() {
        let mut config = Config::default();
        config.apply_env(|k| (k == ENV_ACCESS_KEY_ID).then(|| "AKIA123".to_string()));
        assert!(config.storage.s3.is_none());
        assert_eq!(config.storage.backend, None);
    }

    #[test]
    fn test_object_key_prefix() {
        let mut s3 = S3StorageConfig {
            bucket: "b".to_string(),
            ..Default::default()
        };
        assert_eq!(s3.object_key("abc"), "abc");
        s3.key_prefix = Some("photos/".to_string());
        assert_eq!(s3.object_key("abc"), "photos/abc");
    }

    #[test]
    fn test_save_and_reload() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("config.toml");

        let mut config = Config::default();
        config.retention.retention_days = 30;
        config.database.sqlite_path = dir.path().join("db.sqlite");
        config.save_to(&path).unwrap();

        let content = std::fs::read_to_string(&path).unwrap();
        let reloaded: Config = toml::from_str(&content).unwrap();
        assert_eq!(reloaded.retention.retention_days, 30);
        assert_eq!(reloaded.database.sqlite_path, dir.path().join("db.sqlite"));
    }
}
