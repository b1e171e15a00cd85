use crate::{
    error::Result,
    storage::table_storage::{Snapshotter, TableStorage, Tables},
};
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use tokio::fs;

/// Saves tables as a pretty-printed JSON file under `<root>/.planko/`
#[derive(Debug, Clone)]
pub struct JsonFile {
    root_path: PathBuf,
}

impl JsonFile {
    pub const PLANKO_DIR: &'static str = ".planko";
    pub const DATA_FILE: &'static str = "data.json";
    pub const CONFIG_FILE: &'static str = "config.toml";

    pub fn new(project_root: impl AsRef<Path>) -> Self {
        Self {
            root_path: project_root.as_ref().join(Self::PLANKO_DIR),
        }
    }

    pub fn data_file(&self) -> PathBuf {
        self.root_path.join(Self::DATA_FILE)
    }

    pub fn config_file(&self) -> PathBuf {
        self.root_path.join(Self::CONFIG_FILE)
    }

    async fn ensure_directory_exists(&self, path: &Path) -> Result<()> {
        if !path.exists() {
            fs::create_dir_all(path).await?;
        }
        Ok(())
    }
}

#[async_trait]
impl Snapshotter for JsonFile {
    async fn initialize(&self) -> Result<()> {
        self.ensure_directory_exists(&self.root_path).await?;

        if !self.data_file().exists() {
            self.save(&Tables::default()).await?;
        }

        let gitignore_path = self.root_path.join(".gitignore");
        if !gitignore_path.exists() {
            fs::write(gitignore_path, "# Local caches\n*.db\n*.db-*\n*.tmp\n").await?;
        }

        Ok(())
    }

    async fn is_initialized(&self) -> bool {
        self.root_path.exists() && self.data_file().exists()
    }

    async fn load(&self) -> Result<Option<Tables>> {
        let data_file = self.data_file();
        if !data_file.exists() {
            return Ok(None);
        }

        let contents = fs::read_to_string(&data_file).await?;
        let tables: Tables = serde_json::from_str(&contents)?;
        Ok(Some(tables))
    }

    async fn save(&self, tables: &Tables) -> Result<()> {
        self.ensure_directory_exists(&self.root_path).await?;

        let json = serde_json::to_string_pretty(tables)?;
        let tmp = self.root_path.join(format!("{}.tmp", Self::DATA_FILE));
        fs::write(&tmp, json).await?;
        fs::rename(&tmp, self.data_file()).await?;
        tracing::debug!(path = %self.data_file().display(), "saved board data");

        Ok(())
    }
}

/// File-based storage backend
pub type FileStorage = TableStorage<JsonFile>;

impl TableStorage<JsonFile> {
    /// Creates a FileStorage for the given project root
    pub fn new(project_root: impl AsRef<Path>) -> Self {
        Self::with_snapshotter(JsonFile::new(project_root))
    }
}
