use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use uuid::Uuid;

pub mod filesystem;

pub use filesystem::FilesystemStorage;

/// Error type for storage operations
#[derive(Debug)]
pub enum StorageError {
    Io(std::io::Error),
    Path(String),
    Config(String),
}

impl std::fmt::Display for StorageError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StorageError::Io(e) => write!(f, "IO error: {}", e),
            StorageError::Path(e) => write!(f, "Path error: {}", e),
            StorageError::Config(e) => write!(f, "Configuration error: {}", e),
        }
    }
}

impl std::error::Error for StorageError {}

impl From<std::io::Error> for StorageError {
    fn from(err: std::io::Error) -> Self {
        StorageError::Io(err)
    }
}

pub type StorageResult<T> = Result<T, StorageError>;

/// Storage backend trait for abstracting temporary file operations
///
/// This trait provides a consistent interface for storage operations that can be
/// implemented by different backends (filesystem, cloud storage, etc.)
#[async_trait]
pub trait StorageBackend: Send + Sync + std::fmt::Debug {
    /// Get the base path for this storage backend
    fn base_path(&self) -> &Path;

    /// Whether this backend represents a writable local filesystem root
    /// Defaults to false; concrete backends can override to opt-in.
    fn is_filesystem(&self) -> bool {
        false
    }

    /// Create a subpath relative to the storage root
    fn subpath_str(&self, path: &str) -> PathBuf {
        self.base_path().join(path)
    }

    /// Create a subpath relative to the storage root  
    fn subpath_path(&self, path: &Path) -> PathBuf {
        self.base_path().join(path)
    }

    /// Ensure a directory exists under the storage root, creating it if necessary
    fn ensure_dir_str(&self, path: &str) -> StorageResult<PathBuf> {
        let full_path = self.subpath_str(path);
        std::fs::create_dir_all(&full_path)?;
        Ok(full_path)
    }

    /// Create a temporary directory with a given prefix within a subdirectory
    fn tempdir_in_str(&self, subdir: &str, prefix: &str) -> StorageResult<tempfile::TempDir> {
        let parent = self.ensure_dir_str(subdir)?;
        tempfile::Builder::new()
            .prefix(prefix)
            .tempdir_in(&parent)
            .map_err(StorageError::from)
    }

    /// Write bytes to a file at the given relative path
    async fn write_file_str(&self, path: &str, contents: &[u8]) -> StorageResult<PathBuf> {
        let full_path = self.subpath_str(path);

        // Ensure parent directory exists
        if let Some(parent) = full_path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        tokio::fs::write(&full_path, contents).await?;
        Ok(full_path)
    }

    /// Read bytes from a file at the given relative path
    async fn read_file_str(&self, path: &str) -> StorageResult<Vec<u8>> {
        let full_path = self.subpath_str(path);
        tokio::fs::read(&full_path)
            .await
            .map_err(StorageError::from)
    }

    /// Check if a file exists at the given relative path
    fn exists_str(&self, path: &str) -> bool {
        self.subpath_str(path).exists()
    }

    /// Remove a file or directory at the given relative path
    async fn remove_str(&self, path: &str) -> StorageResult<()> {
        let full_path = self.subpath_str(path);
        if full_path.is_dir() {
            tokio::fs::remove_dir_all(&full_path).await?;
        } else {
            tokio::fs::remove_file(&full_path).await?
        }
        Ok(())
    }
}

/// Content-addressed blob contract used by the rest of the crate.
///
/// An out-of-scope collaborator made concrete enough to compile and test
/// against: blobs are keyed by a UUID plus a content type, stored under a
/// two-level fan-out directory to avoid a single huge directory, and
/// support a byte-range read for the partial-content path of the HTTP
/// engine.
#[async_trait]
pub trait StorageArea: Send + Sync {
    async fn put(&self, id: Uuid, content_type: &str, data: &[u8]) -> StorageResult<()>;

    async fn get(&self, id: Uuid, content_type: &str) -> StorageResult<Vec<u8>>;

    async fn get_range(
        &self,
        id: Uuid,
        content_type: &str,
        start: u64,
        end: u64,
    ) -> StorageResult<Vec<u8>>;

    async fn remove(&self, id: Uuid, content_type: &str) -> StorageResult<()>;

    fn exists(&self, id: Uuid, content_type: &str) -> bool;
}

fn blob_path(id: Uuid, content_type: &str) -> String {
    let hex = id.simple().to_string();
    let (fan1, fan2) = (&hex[0..2], &hex[2..4]);
    let suffix = content_type.replace(['/', '+'], "_");
    format!("blobs/{}/{}/{}.{}", fan1, fan2, hex, suffix)
}

#[async_trait]
impl<T: StorageBackend + ?Sized> StorageArea for T {
    async fn put(&self, id: Uuid, content_type: &str, data: &[u8]) -> StorageResult<()> {
        self.write_file_str(&blob_path(id, content_type), data)
            .await?;
        Ok(())
    }

    async fn get(&self, id: Uuid, content_type: &str) -> StorageResult<Vec<u8>> {
        self.read_file_str(&blob_path(id, content_type)).await
    }

    async fn get_range(
        &self,
        id: Uuid,
        content_type: &str,
        start: u64,
        end: u64,
    ) -> StorageResult<Vec<u8>> {
        use tokio::io::{AsyncReadExt, AsyncSeekExt};

        let full_path = self.subpath_str(&blob_path(id, content_type));
        let mut file = tokio::fs::File::open(&full_path)
            .await
            .map_err(StorageError::from)?;
        file.seek(std::io::SeekFrom::Start(start))
            .await
            .map_err(StorageError::from)?;

        let len = end.saturating_sub(start) as usize;
        let mut buf = vec![0u8; len];
        file.read_exact(&mut buf).await.map_err(StorageError::from)?;
        Ok(buf)
    }

    async fn remove(&self, id: Uuid, content_type: &str) -> StorageResult<()> {
        self.remove_str(&blob_path(id, content_type)).await
    }

    fn exists(&self, id: Uuid, content_type: &str) -> bool {
        self.exists_str(&blob_path(id, content_type))
    }
}

/// Configuration for storage backend
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    #[serde(default = "default_backend")]
    pub backend: String,
    #[serde(default)]
    pub options: std::collections::HashMap<String, serde_json::Value>,
}

impl Default for StorageConfig {
    fn default() -> Self {
        let mut options = std::collections::HashMap::new();
        options.insert(
            "path".to_string(),
            serde_json::Value::String("./tmp".to_string()),
        );

        Self {
            backend: default_backend(),
            options,
        }
    }
}

fn default_backend() -> String {
    "filesystem".to_string()
}

/// Create a storage backend from configuration
pub fn create_storage_backend(config: &StorageConfig) -> StorageResult<Arc<dyn StorageBackend>> {
    match config.backend.as_str() {
        "filesystem" => {
            let path = config
                .options
                .get("path")
                .and_then(|v| v.as_str())
                .unwrap_or("./tmp");

            let storage = FilesystemStorage::new(path)?;
            Ok(Arc::new(storage))
        }
        _ => Err(StorageError::Config(format!(
            "Unknown storage backend: {}",
            config.backend
        ))),
    }
}

#[cfg(test)]
mod storage_area_tests {
    use super::*;
    use tempfile::TempDir;
    use uuid::Uuid;

    #[tokio::test]
    async fn put_get_round_trip() {
        let temp_dir = TempDir::new().unwrap();
        let storage = FilesystemStorage::new(temp_dir.path()).unwrap();
        let id = Uuid::new_v4();

        storage.put(id, "application/dicom", b"blob-bytes").await.unwrap();
        assert!(storage.exists(id, "application/dicom"));

        let data = storage.get(id, "application/dicom").await.unwrap();
        assert_eq!(data, b"blob-bytes");
    }

    #[tokio::test]
    async fn get_range_reads_a_byte_slice() {
        let temp_dir = TempDir::new().unwrap();
        let storage = FilesystemStorage::new(temp_dir.path()).unwrap();
        let id = Uuid::new_v4();

        storage.put(id, "application/octet-stream", b"0123456789").await.unwrap();
        let slice = storage
            .get_range(id, "application/octet-stream", 2, 5)
            .await
            .unwrap();
        assert_eq!(slice, b"234");
    }

    #[tokio::test]
    async fn remove_deletes_the_blob() {
        let temp_dir = TempDir::new().unwrap();
        let storage = FilesystemStorage::new(temp_dir.path()).unwrap();
        let id = Uuid::new_v4();

        storage.put(id, "text/plain", b"x").await.unwrap();
        storage.remove(id, "text/plain").await.unwrap();
        assert!(!storage.exists(id, "text/plain"));
    }

    #[tokio::test]
    async fn different_content_types_do_not_collide() {
        let temp_dir = TempDir::new().unwrap();
        let storage = FilesystemStorage::new(temp_dir.path()).unwrap();
        let id = Uuid::new_v4();

        storage.put(id, "application/dicom", b"a").await.unwrap();
        storage.put(id, "application/json", b"b").await.unwrap();

        assert_eq!(storage.get(id, "application/dicom").await.unwrap(), b"a");
        assert_eq!(storage.get(id, "application/json").await.unwrap(), b"b");
    }
}
