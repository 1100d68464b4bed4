use async_trait::async_trait;
use aws_sdk_s3 as s3;
use s3::primitives::ByteStream;
use std::{
    path::{Path, PathBuf},
    sync::Arc,
};
use tokio::sync::Mutex;
use uuid::Uuid;

use crate::error::{AppError, AppResult};

/// Public path prefix under which stored blobs are referenced.
pub const UPLOADS_PREFIX: &str = "/uploads";

/// StorageService
///
/// Abstract contract for where uploaded article images end up. The concrete backend
/// (local disk, S3-compatible bucket, in-memory mock) is chosen at startup and
/// handlers never see the difference: every backend answers with a
/// `/uploads/<name>` reference.
#[async_trait]
pub trait StorageService: Send + Sync {
    /// Prepares the backend (creates the directory or bucket). Idempotent; safe to
    /// call at every startup.
    async fn ensure_ready(&self) -> AppResult<()>;

    /// Persists `bytes` under the already generated `name` and returns the public
    /// reference `/uploads/<name>`.
    async fn store_blob(&self, name: &str, content_type: &str, bytes: Vec<u8>)
    -> AppResult<String>;

    /// Reads back the blob behind `/uploads/<name>`; `None` when nothing is stored
    /// under that name.
    async fn fetch_blob(&self, name: &str) -> AppResult<Option<Blob>>;
}

/// A stored blob as served to clients.
#[derive(Clone, Debug, PartialEq)]
pub struct Blob {
    pub content_type: String,
    pub bytes: Vec<u8>,
}

/// StorageState
///
/// The concrete type used to share the storage service across the application state.
pub type StorageState = Arc<dyn StorageService>;

/// generate_blob_name
///
/// A collision-free file name keeping the (sanitized) extension of the client's file
/// name. Client-provided names never reach the filesystem or bucket otherwise.
pub fn generate_blob_name(original: Option<&str>) -> String {
    let extension = original
        .and_then(|name| Path::new(name).extension())
        .and_then(|ext| ext.to_str())
        .map(|ext| {
            ext.chars()
                .filter(char::is_ascii_alphanumeric)
                .take(10)
                .collect::<String>()
                .to_ascii_lowercase()
        })
        .filter(|ext| !ext.is_empty());

    match extension {
        Some(ext) => format!("{}.{ext}", Uuid::new_v4()),
        None => Uuid::new_v4().to_string(),
    }
}

/// sanitize_key
///
/// Removes directory navigation components (`..`, `.`, empty segments) so a name can
/// never escape the upload root.
fn sanitize_key(key: &str) -> String {
    key.split(['/', '\\'])
        .filter(|segment| !segment.is_empty() && *segment != ".." && *segment != ".")
        .collect::<Vec<_>>()
        .join("/")
}

fn public_reference(name: &str) -> String {
    format!("{UPLOADS_PREFIX}/{name}")
}

/// Content type from the file extension, for backends that keep no metadata.
fn content_type_for(name: &str) -> &'static str {
    let extension = Path::new(name)
        .extension()
        .and_then(|ext| ext.to_str())
        .map(str::to_ascii_lowercase);

    match extension.as_deref() {
        Some("png") => "image/png",
        Some("jpg" | "jpeg") => "image/jpeg",
        Some("gif") => "image/gif",
        Some("webp") => "image/webp",
        Some("avif") => "image/avif",
        Some("svg") => "image/svg+xml",
        _ => "application/octet-stream",
    }
}

// --- Local Disk ---

/// LocalDiskStorage
///
/// Writes blobs below `root`; the router serves that directory at `/uploads`.
#[derive(Clone, Debug)]
pub struct LocalDiskStorage {
    root: PathBuf,
}

impl LocalDiskStorage {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }
}

#[async_trait]
impl StorageService for LocalDiskStorage {
    async fn ensure_ready(&self) -> AppResult<()> {
        tokio::fs::create_dir_all(&self.root).await.map_err(|e| {
            AppError::internal(format!(
                "cannot create upload dir {}: {e}",
                self.root.display()
            ))
        })
    }

    async fn store_blob(
        &self,
        name: &str,
        _content_type: &str,
        bytes: Vec<u8>,
    ) -> AppResult<String> {
        let name = sanitize_key(name).replace('/', "_");
        if name.is_empty() {
            return Err(AppError::validation("Invalid file name"));
        }

        let path = self.root.join(&name);
        tokio::fs::write(&path, bytes)
            .await
            .map_err(|e| AppError::internal(format!("writing {}: {e}", path.display())))?;

        tracing::debug!(path = %path.display(), "blob stored on disk");
        Ok(public_reference(&name))
    }

    async fn fetch_blob(&self, name: &str) -> AppResult<Option<Blob>> {
        let name = sanitize_key(name).replace('/', "_");
        if name.is_empty() {
            return Ok(None);
        }

        let path = self.root.join(&name);
        match tokio::fs::read(&path).await {
            Ok(bytes) => Ok(Some(Blob {
                content_type: content_type_for(&name).to_string(),
                bytes,
            })),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(AppError::internal(format!("reading {}: {e}", path.display()))),
        }
    }
}

// --- S3 ---

/// S3StorageClient
///
/// Stores blobs in an S3-compatible bucket (MinIO locally, Supabase Storage or AWS
/// in production). Objects are keyed `uploads/<name>` and streamed back through the
/// app's own `/uploads` route, so the bucket can stay private.
///
/// `force_path_style(true)` is required for MinIO and Supabase compatibility.
#[derive(Clone)]
pub struct S3StorageClient {
    client: s3::Client,
    bucket_name: String,
}

impl S3StorageClient {
    /// Builds the client from static credentials.
    pub fn new(endpoint: &str, region: &str, access_key: &str, secret_key: &str, bucket: &str) -> Self {
        let credentials =
            s3::config::Credentials::new(access_key, secret_key, None, None, "static");

        let config = s3::Config::builder()
            .credentials_provider(credentials)
            .endpoint_url(endpoint)
            .region(s3::config::Region::new(region.to_string()))
            .behavior_version_latest()
            // Path-style addressing (http://endpoint/bucket/key).
            .force_path_style(true)
            .build();

        Self {
            client: s3::Client::from_conf(config),
            bucket_name: bucket.to_string(),
        }
    }
}

#[async_trait]
impl StorageService for S3StorageClient {
    /// CreateBucket is idempotent from our side: "already owned" answers are ignored.
    async fn ensure_ready(&self) -> AppResult<()> {
        if let Err(e) = self
            .client
            .create_bucket()
            .bucket(&self.bucket_name)
            .send()
            .await
        {
            tracing::debug!(bucket = %self.bucket_name, error = %e, "create_bucket skipped");
        }
        Ok(())
    }

    async fn store_blob(
        &self,
        name: &str,
        content_type: &str,
        bytes: Vec<u8>,
    ) -> AppResult<String> {
        let name = sanitize_key(name);
        let key = format!("uploads/{name}");

        self.client
            .put_object()
            .bucket(&self.bucket_name)
            .key(&key)
            .content_type(content_type)
            .body(ByteStream::from(bytes))
            .send()
            .await
            .map_err(|e| AppError::internal(format!("s3 put_object {key}: {e}")))?;

        tracing::debug!(bucket = %self.bucket_name, key = %key, "blob stored in bucket");
        Ok(public_reference(&name))
    }

    async fn fetch_blob(&self, name: &str) -> AppResult<Option<Blob>> {
        let name = sanitize_key(name);
        if name.is_empty() {
            return Ok(None);
        }
        let key = format!("uploads/{name}");

        let object = match self
            .client
            .get_object()
            .bucket(&self.bucket_name)
            .key(&key)
            .send()
            .await
        {
            Ok(object) => object,
            Err(e) if e.as_service_error().is_some_and(|se| se.is_no_such_key()) => {
                return Ok(None);
            }
            Err(e) => return Err(AppError::internal(format!("s3 get_object {key}: {e}"))),
        };

        let content_type = object
            .content_type()
            .map(str::to_string)
            .unwrap_or_else(|| content_type_for(&name).to_string());

        let bytes = object
            .body
            .collect()
            .await
            .map_err(|e| AppError::internal(format!("s3 reading body of {key}: {e}")))?
            .into_bytes()
            .to_vec();

        Ok(Some(Blob {
            content_type,
            bytes,
        }))
    }
}

// --- Mock ---

/// MockStorageService
///
/// In-memory `StorageService` for tests. Records what was stored and can be told to
/// fail every write.
#[derive(Clone, Default)]
pub struct MockStorageService {
    /// When true, all operations return a simulated failure.
    pub should_fail: bool,
    stored: Arc<Mutex<Vec<StoredBlob>>>,
}

/// A blob captured by [`MockStorageService`].
#[derive(Clone, Debug, PartialEq)]
pub struct StoredBlob {
    pub name: String,
    pub content_type: String,
    pub len: usize,
    pub bytes: Vec<u8>,
}

impl MockStorageService {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn new_failing() -> Self {
        Self {
            should_fail: true,
            ..Self::default()
        }
    }

    pub async fn stored(&self) -> Vec<StoredBlob> {
        self.stored.lock().await.clone()
    }
}

#[async_trait]
impl StorageService for MockStorageService {
    async fn ensure_ready(&self) -> AppResult<()> {
        Ok(())
    }

    async fn store_blob(
        &self,
        name: &str,
        content_type: &str,
        bytes: Vec<u8>,
    ) -> AppResult<String> {
        if self.should_fail {
            return Err(AppError::internal("Mock Storage Error: Simulation requested"));
        }

        let name = sanitize_key(name);
        self.stored.lock().await.push(StoredBlob {
            name: name.clone(),
            content_type: content_type.to_string(),
            len: bytes.len(),
            bytes,
        });

        Ok(public_reference(&name))
    }

    async fn fetch_blob(&self, name: &str) -> AppResult<Option<Blob>> {
        if self.should_fail {
            return Err(AppError::internal("Mock Storage Error: Simulation requested"));
        }

        let name = sanitize_key(name);
        Ok(self
            .stored
            .lock()
            .await
            .iter()
            .rev()
            .find(|blob| blob.name == name)
            .map(|blob| Blob {
                content_type: blob.content_type.clone(),
                bytes: blob.bytes.clone(),
            }))
    }
}
