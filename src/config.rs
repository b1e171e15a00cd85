use crate::{
    error::Result,
    storage::{MemoryStorage, Storage},
};
use serde::{Deserialize, Serialize};
use std::{
    fmt,
    path::{Path, PathBuf},
    sync::Arc,
    time::Duration,
};

/// What to do with a move whose columns already have a move in flight
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OverlapPolicy {
    /// Drop the new move
    #[default]
    Reject,
    /// Run the new move once the earlier one resolves
    Queue,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReconcilerConfig {
    pub overlap: OverlapPolicy,
    /// Background refresh period; polling is off when unset or zero
    #[serde(skip_serializing_if = "Option::is_none")]
    pub poll_interval_secs: Option<u64>,
}

impl ReconcilerConfig {
    pub fn poll_interval(&self) -> Option<Duration> {
        self.poll_interval_secs
            .filter(|secs| *secs > 0)
            .map(Duration::from_secs)
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StorageBackend {
    Memory,
    #[default]
    File,
    Sqlite,
}

impl fmt::Display for StorageBackend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Memory => write!(f, "memory"),
            Self::File => write!(f, "file"),
            Self::Sqlite => write!(f, "sqlite"),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    pub backend: StorageBackend,
    /// Project root for `file`, database file for `sqlite`
    #[serde(skip_serializing_if = "Option::is_none")]
    pub path: Option<PathBuf>,
}

/// Crate configuration, usually read from `.planko/config.toml`
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PlankoConfig {
    pub reconciler: ReconcilerConfig,
    pub storage: StorageConfig,
}

impl PlankoConfig {
    pub fn from_toml_str(contents: &str) -> Result<Self> {
        Ok(toml::from_str(contents)?)
    }

    /// Reads a config file, falling back to defaults when it does not exist
    pub async fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        if !path.exists() {
            tracing::debug!(path = %path.display(), "no config file, using defaults");
            return Ok(Self::default());
        }

        let contents = tokio::fs::read_to_string(path).await?;
        Self::from_toml_str(&contents)
    }

    /// Reads `<root>/.planko/config.toml`; a file backend without a path uses `root`
    #[cfg(feature = "file-storage")]
    pub async fn load_project(root: impl AsRef<Path>) -> Result<Self> {
        let root = root.as_ref();
        let config_file = crate::storage::file_storage::JsonFile::new(root).config_file();
        let mut config = Self::load(config_file).await?;
        if config.storage.backend == StorageBackend::File && config.storage.path.is_none() {
            config.storage.path = Some(root.to_path_buf());
        }
        Ok(config)
    }

    /// Opens and initializes the configured storage backend
    pub async fn open_storage(&self) -> Result<Arc<dyn Storage>> {
        let storage: Arc<dyn Storage> = match self.storage.backend {
            StorageBackend::Memory => Arc::new(MemoryStorage::new()),
            StorageBackend::File => self.open_file_storage()?,
            StorageBackend::Sqlite => self.open_sqlite_storage()?,
        };

        storage.initialize().await?;
        tracing::info!(backend = %self.storage.backend, "storage ready");
        Ok(storage)
    }

    #[cfg(feature = "file-storage")]
    fn open_file_storage(&self) -> Result<Arc<dyn Storage>> {
        let root = self
            .storage
            .path
            .clone()
            .unwrap_or_else(|| PathBuf::from("."));
        Ok(Arc::new(crate::storage::FileStorage::new(root)))
    }

    #[cfg(not(feature = "file-storage"))]
    fn open_file_storage(&self) -> Result<Arc<dyn Storage>> {
        Err(crate::error::PlankoError::UnsupportedBackend(StorageBackend::File.to_string()))
    }

    #[cfg(feature = "sqlite-storage")]
    fn open_sqlite_storage(&self) -> Result<Arc<dyn Storage>> {
        let path = self
            .storage
            .path
            .clone()
            .unwrap_or_else(|| PathBuf::from("planko.db"));
        Ok(Arc::new(crate::storage::SqliteStorage::open(path)?))
    }

    #[cfg(not(feature = "sqlite-storage"))]
    fn open_sqlite_storage(&self) -> Result<Arc<dyn Storage>> {
        Err(crate::error::PlankoError::UnsupportedBackend(StorageBackend::Sqlite.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::PlankoError;

    #[test]
    fn test_defaults() {
        let config = PlankoConfig::default();
        assert_eq!(config.reconciler.overlap, OverlapPolicy::Reject);
        assert_eq!(config.reconciler.poll_interval(), None);
        assert_eq!(config.storage.backend, StorageBackend::File);
    }

    #[test]
    fn test_parse_full_config() {
        let config = PlankoConfig::from_toml_str(
            r#"
            [reconciler]
            overlap = "queue"
            poll_interval_secs = 30

            [storage]
            backend = "memory"
            "#,
        )
        .unwrap();

        assert_eq!(config.reconciler.overlap, OverlapPolicy::Queue);
        assert_eq!(
            config.reconciler.poll_interval(),
            Some(Duration::from_secs(30))
        );
        assert_eq!(config.storage.backend, StorageBackend::Memory);
    }

    #[test]
    fn test_partial_config_uses_defaults() {
        let config =
            PlankoConfig::from_toml_str("[reconciler]\npoll_interval_secs = 0\n").unwrap();
        assert_eq!(config.reconciler.poll_interval(), None);
        assert_eq!(config.storage, StorageConfig::default());
    }

    #[test]
    fn test_invalid_config_rejected() {
        let result = PlankoConfig::from_toml_str("[reconciler]\noverlap = \"sometimes\"\n");
        assert!(matches!(result, Err(PlankoError::ConfigError(_))));
    }

    #[tokio::test]
    async fn test_load_missing_file() {
        let temp_dir = tempfile::TempDir::new().unwrap();
        let config = PlankoConfig::load(temp_dir.path().join("config.toml"))
            .await
            .unwrap();
        assert_eq!(config, PlankoConfig::default());
    }

    #[cfg(feature = "file-storage")]
    #[tokio::test]
    async fn test_load_project_defaults_to_root() {
        let temp_dir = tempfile::TempDir::new().unwrap();
        let planko_dir = temp_dir.path().join(".planko");
        tokio::fs::create_dir_all(&planko_dir).await.unwrap();
        tokio::fs::write(
            planko_dir.join("config.toml"),
            "[reconciler]\noverlap = \"queue\"\n",
        )
        .await
        .unwrap();

        let config = PlankoConfig::load_project(temp_dir.path()).await.unwrap();

        assert_eq!(config.reconciler.overlap, OverlapPolicy::Queue);
        assert_eq!(config.storage.path.as_deref(), Some(temp_dir.path()));

        let storage = config.open_storage().await.unwrap();
        assert!(storage.is_initialized().await);
        assert!(planko_dir.join("data.json").exists());
    }

    #[tokio::test]
    async fn test_open_memory_storage() {
        let config = PlankoConfig::from_toml_str("[storage]\nbackend = \"memory\"\n").unwrap();
        let storage = config.open_storage().await.unwrap();
        assert!(storage.is_initialized().await);
        assert!(storage.list_boards().await.unwrap().is_empty());
    }
}
