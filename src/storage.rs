use async_trait::async_trait;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::fs;
use uuid::Uuid;

// 1. StorageService Contract
/// StorageService
///
/// Abstract contract for the image storage layer. The concrete implementation
/// is swappable: local disk in production, the in-memory mock in tests, so
/// the upload handlers never touch the filesystem directly.
#[async_trait]
pub trait StorageService: Send + Sync {
    /// Ensures the upload directory exists. Called once at startup.
    async fn ensure_upload_dir(&self);

    /// Persists an uploaded image and returns the relative URL path under
    /// which the static file layer serves it (e.g. `/uploads/<uuid>.png`).
    ///
    /// # Arguments
    /// * `filename`: the client-supplied filename, used only for its extension.
    /// * `data`: the raw image bytes.
    async fn save_image(&self, filename: &str, data: &[u8]) -> Result<String, String>;
}

/// StorageState
///
/// The concrete type used to share the storage service across the
/// application state.
pub type StorageState = Arc<dyn StorageService>;

/// sanitize_extension
///
/// Derives a safe file extension from a client-supplied filename. Only
/// alphanumeric extensions survive; anything else (including path traversal
/// attempts) collapses to "bin".
fn sanitize_extension(filename: &str) -> String {
    std::path::Path::new(filename)
        .extension()
        .and_then(std::ffi::OsStr::to_str)
        .filter(|ext| !ext.is_empty() && ext.chars().all(|c| c.is_ascii_alphanumeric()))
        .map(|ext| ext.to_ascii_lowercase())
        .unwrap_or_else(|| "bin".to_string())
}

// 2. The Real Implementation (Local Disk)
/// LocalDiskStorage
///
/// Writes uploads into a single directory on local disk under a fresh UUID
/// name. The directory is statically served by the router under
/// `url_prefix`, and the returned relative path is what gets embedded in the
/// Post record.
#[derive(Clone)]
pub struct LocalDiskStorage {
    root: PathBuf,
    url_prefix: String,
}

impl LocalDiskStorage {
    pub fn new(root: impl Into<PathBuf>, url_prefix: impl Into<String>) -> Self {
        Self {
            root: root.into(),
            url_prefix: url_prefix.into(),
        }
    }
}

#[async_trait]
impl StorageService for LocalDiskStorage {
    async fn ensure_upload_dir(&self) {
        if let Err(e) = fs::create_dir_all(&self.root).await {
            tracing::error!("failed to create upload directory: {:?}", e);
        }
    }

    async fn save_image(&self, filename: &str, data: &[u8]) -> Result<String, String> {
        // The stored name is always server-generated; the client filename
        // only contributes its (sanitized) extension.
        let object_name = format!("{}.{}", Uuid::new_v4(), sanitize_extension(filename));
        let target = self.root.join(&object_name);

        fs::write(&target, data).await.map_err(|e| e.to_string())?;

        Ok(format!("{}/{}", self.url_prefix, object_name))
    }
}

// 3. The Mock Implementation (For Tests)
/// MockStorageService
///
/// In-memory stand-in for `StorageService` used by unit and integration
/// tests. Returns deterministic paths and never touches the filesystem.
#[derive(Clone)]
pub struct MockStorageService {
    /// When true, all operations return a simulated failure.
    pub should_fail: bool,
}

impl MockStorageService {
    pub fn new() -> Self {
        Self { should_fail: false }
    }

    pub fn new_failing() -> Self {
        Self { should_fail: true }
    }
}

impl Default for MockStorageService {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl StorageService for MockStorageService {
    async fn ensure_upload_dir(&self) {
        // No-op in mock environment.
    }

    async fn save_image(&self, filename: &str, _data: &[u8]) -> Result<String, String> {
        if self.should_fail {
            return Err("Mock Storage Error: Simulation requested".to_string());
        }

        Ok(format!(
            "/uploads/mock.{}",
            sanitize_extension(filename)
        ))
    }
}
