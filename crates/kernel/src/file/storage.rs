//! Release file storage backends.
//!
//! Files live in a `<plugin_id>/<release_id>/<filename>` tree.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use async_trait::async_trait;
use tokio::fs;
use tokio::io::{AsyncRead, AsyncWriteExt};
use tracing::{debug, warn};
use uuid::Uuid;

use super::service::ReleaseFileKey;

/// An opened release file ready for streaming.
pub struct OpenedFile {
    pub reader: Box<dyn AsyncRead + Send + Unpin>,
    pub size: u64,
}

/// Release file storage backend trait.
#[async_trait]
pub trait ReleaseStorage: Send + Sync {
    /// Write a release file, replacing any previous content.
    async fn write(&self, key: &ReleaseFileKey, data: &[u8]) -> Result<()>;

    /// Open a release file. `None` if it does not exist.
    async fn open(&self, key: &ReleaseFileKey) -> Result<Option<OpenedFile>>;

    /// Every file of a plugin as `<release_id>/<filename>`, sorted.
    async fn list_plugin_files(&self, plugin_id: Uuid) -> Result<Vec<String>>;

    /// Remove one release directory. Returns whether it existed.
    async fn delete_release(&self, plugin_id: Uuid, release_id: Uuid) -> Result<bool>;

    /// Remove a plugin's whole directory. Returns whether it existed.
    async fn delete_plugin(&self, plugin_id: Uuid) -> Result<bool>;

    /// Plugin ids that have a directory in storage.
    async fn plugin_ids(&self) -> Result<Vec<Uuid>>;
}

/// Local filesystem storage.
#[derive(Debug, Clone)]
pub struct LocalReleaseStorage {
    base_path: PathBuf,
}

impl LocalReleaseStorage {
    pub fn new(base_path: impl Into<PathBuf>) -> Self {
        Self {
            base_path: base_path.into(),
        }
    }

    pub fn base_path(&self) -> &Path {
        &self.base_path
    }

    fn plugin_dir(&self, plugin_id: Uuid) -> PathBuf {
        self.base_path.join(plugin_id.to_string())
    }

    fn release_dir(&self, plugin_id: Uuid, release_id: Uuid) -> PathBuf {
        self.plugin_dir(plugin_id).join(release_id.to_string())
    }

    /// Resolve a key to a path below the base directory.
    ///
    /// Rejects filenames that are not a single normal path component.
    fn path_for(&self, key: &ReleaseFileKey) -> Result<PathBuf> {
        let mut components = Path::new(&key.filename).components();
        match (components.next(), components.next()) {
            (Some(std::path::Component::Normal(_)), None) => {}
            _ => anyhow::bail!("directory traversal not allowed in release filename"),
        }
        Ok(self
            .release_dir(key.plugin_id, key.release_id)
            .join(&key.filename))
    }
}

async fn remove_dir_if_exists(path: &Path) -> Result<bool> {
    match fs::remove_dir_all(path).await {
        Ok(()) => Ok(true),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
        Err(e) => Err(e).with_context(|| format!("failed to remove {}", path.display())),
    }
}

#[async_trait]
impl ReleaseStorage for LocalReleaseStorage {
    async fn write(&self, key: &ReleaseFileKey, data: &[u8]) -> Result<()> {
        let path = self.path_for(key)?;

        // Create parent directories if needed
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)
                .await
                .context("failed to create directories")?;
        }

        let mut file = fs::File::create(&path)
            .await
            .context("failed to create file")?;

        file.write_all(data).await.context("failed to write file")?;

        file.flush().await.context("failed to flush file")?;

        debug!(file_ref = %key, path = ?path, size = data.len(), "release file written");
        Ok(())
    }

    async fn open(&self, key: &ReleaseFileKey) -> Result<Option<OpenedFile>> {
        let path = self.path_for(key)?;
        let file = match fs::File::open(&path).await {
            Ok(file) => file,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e).context("failed to open release file"),
        };
        let metadata = file
            .metadata()
            .await
            .context("failed to read file metadata")?;
        if !metadata.is_file() {
            return Ok(None);
        }

        Ok(Some(OpenedFile {
            reader: Box::new(file),
            size: metadata.len(),
        }))
    }

    async fn list_plugin_files(&self, plugin_id: Uuid) -> Result<Vec<String>> {
        let plugin_dir = self.plugin_dir(plugin_id);
        let mut releases = match fs::read_dir(&plugin_dir).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e).context("failed to read plugin directory"),
        };

        let mut files = Vec::new();
        while let Some(release) = releases
            .next_entry()
            .await
            .context("failed to read plugin directory entry")?
        {
            if !release.file_type().await.is_ok_and(|t| t.is_dir()) {
                continue;
            }
            let release_name = release.file_name().to_string_lossy().into_owned();
            let mut entries = fs::read_dir(release.path())
                .await
                .context("failed to read release directory")?;
            while let Some(entry) = entries
                .next_entry()
                .await
                .context("failed to read release directory entry")?
            {
                if entry.file_type().await.is_ok_and(|t| t.is_file()) {
                    files.push(format!(
                        "{release_name}/{}",
                        entry.file_name().to_string_lossy()
                    ));
                }
            }
        }

        files.sort();
        Ok(files)
    }

    async fn delete_release(&self, plugin_id: Uuid, release_id: Uuid) -> Result<bool> {
        let removed = remove_dir_if_exists(&self.release_dir(plugin_id, release_id)).await?;
        if removed {
            debug!(plugin_id = %plugin_id, release_id = %release_id, "release directory deleted");
        } else {
            warn!(plugin_id = %plugin_id, release_id = %release_id, "release directory not found for deletion");
        }
        Ok(removed)
    }

    async fn delete_plugin(&self, plugin_id: Uuid) -> Result<bool> {
        let removed = remove_dir_if_exists(&self.plugin_dir(plugin_id)).await?;
        if removed {
            debug!(plugin_id = %plugin_id, "plugin directory deleted");
        }
        Ok(removed)
    }

    async fn plugin_ids(&self) -> Result<Vec<Uuid>> {
        let mut entries = match fs::read_dir(&self.base_path).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e).context("failed to read storage directory"),
        };

        let mut ids = Vec::new();
        while let Some(entry) = entries
            .next_entry()
            .await
            .context("failed to read storage directory entry")?
        {
            let name = entry.file_name();
            match Uuid::parse_str(&name.to_string_lossy()) {
                Ok(id) if entry.file_type().await.is_ok_and(|t| t.is_dir()) => ids.push(id),
                _ => debug!(entry = ?name, "ignoring non-plugin entry in storage"),
            }
        }
        Ok(ids)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use tokio::io::AsyncReadExt;

    use super::*;

    fn storage() -> (tempfile::TempDir, LocalReleaseStorage) {
        let dir = tempfile::tempdir().unwrap();
        let storage = LocalReleaseStorage::new(dir.path());
        (dir, storage)
    }

    #[tokio::test]
    async fn write_then_open_streams_content() {
        let (_dir, storage) = storage();
        let key = ReleaseFileKey::new(Uuid::now_v7(), Uuid::now_v7(), "weather.plugin");
        storage.write(&key, b"payload").await.unwrap();

        let mut opened = storage.open(&key).await.unwrap().unwrap();
        assert_eq!(opened.size, 7);
        let mut buf = String::new();
        opened.reader.read_to_string(&mut buf).await.unwrap();
        assert_eq!(buf, "payload");
    }

    #[tokio::test]
    async fn open_missing_file_is_none() {
        let (_dir, storage) = storage();
        let key = ReleaseFileKey::new(Uuid::now_v7(), Uuid::now_v7(), "missing.zip");
        assert!(storage.open(&key).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn traversal_in_filename_is_rejected() {
        let (_dir, storage) = storage();
        let key = ReleaseFileKey {
            plugin_id: Uuid::now_v7(),
            release_id: Uuid::now_v7(),
            filename: "../escape".to_string(),
        };
        assert!(storage.write(&key, b"x").await.is_err());
    }

    #[tokio::test]
    async fn list_and_delete_releases() {
        let (_dir, storage) = storage();
        let plugin = Uuid::now_v7();
        let r1 = Uuid::now_v7();
        let r2 = Uuid::now_v7();
        storage
            .write(&ReleaseFileKey::new(plugin, r1, "a.zip"), b"a")
            .await
            .unwrap();
        storage
            .write(&ReleaseFileKey::new(plugin, r2, "b.zip"), b"b")
            .await
            .unwrap();

        let mut expected = vec![format!("{r1}/a.zip"), format!("{r2}/b.zip")];
        expected.sort();
        assert_eq!(storage.list_plugin_files(plugin).await.unwrap(), expected);

        assert!(storage.delete_release(plugin, r1).await.unwrap());
        assert!(!storage.delete_release(plugin, r1).await.unwrap());
        assert_eq!(
            storage.list_plugin_files(plugin).await.unwrap(),
            vec![format!("{r2}/b.zip")]
        );

        assert!(storage.delete_plugin(plugin).await.unwrap());
        assert!(storage.list_plugin_files(plugin).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn plugin_ids_skip_foreign_entries() {
        let (dir, storage) = storage();
        let plugin = Uuid::now_v7();
        storage
            .write(&ReleaseFileKey::new(plugin, Uuid::now_v7(), "a.zip"), b"a")
            .await
            .unwrap();
        std::fs::create_dir(dir.path().join("not-a-uuid")).unwrap();
        std::fs::write(dir.path().join("README"), b"hi").unwrap();

        assert_eq!(storage.plugin_ids().await.unwrap(), vec![plugin]);
    }
}
