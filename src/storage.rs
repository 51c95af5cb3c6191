use async_trait::async_trait;
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use uuid::Uuid;

/// StorageError
///
/// Failures from the media storage layer. Callers map these onto the generic
/// internal-error response; the detail only ever reaches the logs.
#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("media storage failure: {0}")]
    Backend(String),
}

// 1. MediaStorage Contract
/// MediaStorage
///
/// Abstract contract for storing and serving content images. The concrete
/// implementation is swappable: the filesystem store (FsMediaStorage) in
/// production and local runs, the in-memory mock (MockMediaStorage) in tests.
/// Handlers only ever hold keys; bytes move exclusively through this trait.
#[async_trait]
pub trait MediaStorage: Send + Sync {
    /// Stores `bytes` under `key`, overwriting any previous object.
    async fn put(&self, key: &str, bytes: &[u8]) -> Result<(), StorageError>;

    /// Fetches the object at `key`, or `None` if it does not exist.
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>, StorageError>;

    /// Deletes the object at `key`. Removing a missing object is not an
    /// error, which makes cleanup after record deletion idempotent.
    async fn remove(&self, key: &str) -> Result<(), StorageError>;
}

/// Derives a fresh object key for an uploaded image, e.g. "images/<uuid>.png".
/// The extension comes from the validated MIME type, never from the client's
/// filename.
pub fn image_key(content_type: &str) -> String {
    let extension = match content_type.split(';').next().unwrap_or("").trim() {
        "image/jpeg" => "jpg",
        "image/png" => "png",
        "image/gif" => "gif",
        "image/webp" => "webp",
        _ => "bin",
    };
    format!("images/{}.{}", Uuid::new_v4(), extension)
}

/// Maps a stored key back to a response content type when serving the bytes.
pub fn content_type_for_key(key: &str) -> &'static str {
    match key.rsplit('.').next() {
        Some("jpg") | Some("jpeg") => "image/jpeg",
        Some("png") => "image/png",
        Some("gif") => "image/gif",
        Some("webp") => "image/webp",
        _ => "application/octet-stream",
    }
}

/// sanitize_key
///
/// Prevents path traversal by dropping directory navigation components
/// (`..`, `.`, empty segments) from a key before it touches the filesystem.
fn sanitize_key(key: &str) -> String {
    key.split('/')
        .filter(|segment| !segment.is_empty() && *segment != ".." && *segment != ".")
        .collect::<Vec<_>>()
        .join("/")
}

// 2. The Real Implementation (Filesystem)
/// FsMediaStorage
///
/// Stores objects as plain files under a configured root directory. Keys map
/// to relative paths, so "images/abc.png" lands at `<root>/images/abc.png`.
/// Intermediate directories are created on demand.
#[derive(Clone)]
pub struct FsMediaStorage {
    root: PathBuf,
}

impl FsMediaStorage {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    fn path_for(&self, key: &str) -> PathBuf {
        self.root.join(sanitize_key(key))
    }
}

#[async_trait]
impl MediaStorage for FsMediaStorage {
    async fn put(&self, key: &str, bytes: &[u8]) -> Result<(), StorageError> {
        let path = self.path_for(key);
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        tokio::fs::write(&path, bytes).await?;
        Ok(())
    }

    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>, StorageError> {
        match tokio::fs::read(self.path_for(key)).await {
            Ok(bytes) => Ok(Some(bytes)),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(err) => Err(StorageError::Io(err)),
        }
    }

    async fn remove(&self, key: &str) -> Result<(), StorageError> {
        match tokio::fs::remove_file(self.path_for(key)).await {
            Ok(()) => Ok(()),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(err) => Err(StorageError::Io(err)),
        }
    }
}

// 3. The Mock Implementation (For Tests)
/// MockMediaStorage
///
/// In-memory implementation used by the test suites. Keeps objects in a map
/// so upload-then-serve flows can be exercised without touching the disk, and
/// can be flipped into a failing mode to test the error path.
pub struct MockMediaStorage {
    /// When true, all operations return a simulated failure.
    pub should_fail: bool,
    objects: Mutex<HashMap<String, Vec<u8>>>,
}

impl MockMediaStorage {
    pub fn new() -> Self {
        Self { should_fail: false, objects: Mutex::new(HashMap::new()) }
    }

    pub fn new_failing() -> Self {
        Self { should_fail: true, objects: Mutex::new(HashMap::new()) }
    }

    fn check(&self) -> Result<(), StorageError> {
        if self.should_fail {
            return Err(StorageError::Backend(
                "mock failure requested".to_string(),
            ));
        }
        Ok(())
    }
}

impl Default for MockMediaStorage {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl MediaStorage for MockMediaStorage {
    async fn put(&self, key: &str, bytes: &[u8]) -> Result<(), StorageError> {
        self.check()?;
        self.objects
            .lock()
            .expect("media lock poisoned")
            .insert(sanitize_key(key), bytes.to_vec());
        Ok(())
    }

    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>, StorageError> {
        self.check()?;
        Ok(self
            .objects
            .lock()
            .expect("media lock poisoned")
            .get(&sanitize_key(key))
            .cloned())
    }

    async fn remove(&self, key: &str) -> Result<(), StorageError> {
        self.check()?;
        self.objects
            .lock()
            .expect("media lock poisoned")
            .remove(&sanitize_key(key));
        Ok(())
    }
}

/// MediaState
///
/// The concrete type used to share the media store across the application state.
pub type MediaState = Arc<dyn MediaStorage>;
