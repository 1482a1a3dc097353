//! Storage port: the single seam between the site and its backend.
//!
//! Every backend (self-hosted SQLite, Supabase, Firebase) implements
//! [`StoragePort`]. Callers never branch on the provider; they read, write,
//! subscribe and authenticate through the trait object.
//!
//! Subscriptions are RAII handles: a [`Subscription`] stays registered for as
//! long as it is alive and is released when dropped, which also stops any
//! backend listener task feeding it.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::fmt;
use std::path::Path;
use std::sync::{Arc, Mutex};
use thiserror::Error;
use tokio::sync::mpsc;

use crate::config::{Config, Provider};
use crate::model::{NewPortfolioItem, PortfolioItem, SettingsPatch};

pub mod auth;
pub mod firebase;
pub mod local;
pub mod progress;
pub mod supabase;

pub use progress::ProgressTracker;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
    #[error("migration error: {0}")]
    Migrate(#[from] sqlx::migrate::MigrateError),
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("{provider} error {status}: {body}")]
    Remote {
        provider: &'static str,
        status: u16,
        body: String,
    },
    #[error("unexpected response: {0}")]
    Decode(String),
    #[error("not signed in")]
    Unauthenticated,
    #[error("realtime error: {0}")]
    Realtime(String),
}

#[derive(Debug, Error)]
pub enum AuthError {
    #[error("invalid login credentials")]
    InvalidCredentials,
    #[error(transparent)]
    Store(#[from] StoreError),
}

/// A remote resource the sync layer mirrors.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Resource {
    Auth,
    Portfolio,
    Settings,
}

impl Resource {
    pub fn as_str(&self) -> &'static str {
        match self {
            Resource::Auth => "auth",
            Resource::Portfolio => "portfolio",
            Resource::Settings => "settings",
        }
    }
}

/// Opaque credential state issued by a backend's auth service.
#[derive(Clone, PartialEq, Eq)]
pub struct Session {
    pub access_token: String,
    pub refresh_token: Option<String>,
    pub email: String,
    pub expires_at: Option<DateTime<Utc>>,
}

impl Session {
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.expires_at.is_some_and(|at| at <= now)
    }
}

impl fmt::Debug for Session {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Session")
            .field("email", &self.email)
            .field("expires_at", &self.expires_at)
            .finish_non_exhaustive()
    }
}

/// Bucket prefix an upload lands under.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MediaFolder {
    Images,
    Videos,
}

impl MediaFolder {
    pub fn prefix(&self) -> &'static str {
        match self {
            MediaFolder::Images => "images",
            MediaFolder::Videos => "videos",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "image" | "images" => Some(MediaFolder::Images),
            "video" | "videos" => Some(MediaFolder::Videos),
            _ => None,
        }
    }
}

/// A file handed to [`StoragePort::upload_file`].
#[derive(Clone)]
pub struct FileUpload {
    pub folder: MediaFolder,
    pub file_name: String,
    pub content_type: String,
    pub bytes: Vec<u8>,
}

impl FileUpload {
    pub fn new(folder: MediaFolder, file_name: impl Into<String>, bytes: Vec<u8>) -> Self {
        let file_name = file_name.into();
        let content_type = content_type_for(Path::new(&file_name)).to_string();
        Self {
            folder,
            file_name,
            content_type,
            bytes,
        }
    }

    pub fn len(&self) -> u64 {
        self.bytes.len() as u64
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }
}

impl fmt::Debug for FileUpload {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FileUpload")
            .field("folder", &self.folder)
            .field("file_name", &self.file_name)
            .field("content_type", &self.content_type)
            .field("len", &self.bytes.len())
            .finish()
    }
}

/// Where an uploaded file ended up.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredFile {
    /// Object path inside the bucket, e.g. `images/3f2c-drone.jpg`.
    pub path: String,
    pub public_url: String,
}

pub fn content_type_for(file_path: &Path) -> &'static str {
    match file_path
        .extension()
        .and_then(|ext| ext.to_str())
        .map(|s| s.to_ascii_lowercase())
    {
        Some(ext) if ext == "jpg" || ext == "jpeg" => "image/jpeg",
        Some(ext) if ext == "png" => "image/png",
        Some(ext) if ext == "gif" => "image/gif",
        Some(ext) if ext == "webp" => "image/webp",
        Some(ext) if ext == "mp4" => "video/mp4",
        Some(ext) if ext == "mov" => "video/quicktime",
        Some(ext) if ext == "webm" => "video/webm",
        Some(ext) if ext == "avi" => "video/x-msvideo",
        _ => "application/octet-stream",
    }
}

/// Object path for a new upload: `<folder>/<uuid>-<sanitized name>`.
pub fn object_path(folder: MediaFolder, file_name: &str) -> String {
    use once_cell::sync::Lazy;
    use regex::Regex;

    static UNSAFE: Lazy<Regex> =
        Lazy::new(|| Regex::new(r"[^A-Za-z0-9._-]+").expect("valid file name regex"));

    let base = Path::new(file_name)
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or("file");
    let cleaned = UNSAFE.replace_all(base, "-");
    let cleaned = cleaned.trim_matches('-');
    let cleaned = if cleaned.is_empty() { "file" } else { cleaned };
    format!(
        "{}/{}-{}",
        folder.prefix(),
        uuid::Uuid::new_v4().simple(),
        cleaned
    )
}

/// Receiving end of a change feed. Each received signal means "re-read the
/// resource"; bursts are coalesced into a single pending signal.
#[derive(Debug)]
pub struct Subscription {
    resource: Resource,
    rx: mpsc::Receiver<()>,
}

/// Sending end paired with a [`Subscription`].
#[derive(Debug, Clone)]
pub struct ChangeNotifier {
    tx: mpsc::Sender<()>,
}

impl Subscription {
    pub fn channel(resource: Resource) -> (ChangeNotifier, Subscription) {
        let (tx, rx) = mpsc::channel(1);
        (ChangeNotifier { tx }, Subscription { resource, rx })
    }

    pub fn resource(&self) -> Resource {
        self.resource
    }

    /// Wait for the next change. Returns `false` once the feed has ended.
    pub async fn changed(&mut self) -> bool {
        self.rx.recv().await.is_some()
    }

    /// Release the subscription now rather than at end of scope.
    pub fn release(self) {}
}

impl ChangeNotifier {
    /// Signal a change. Returns `false` if the subscriber is gone.
    pub fn notify(&self) -> bool {
        match self.tx.try_send(()) {
            Ok(()) | Err(mpsc::error::TrySendError::Full(())) => true,
            Err(mpsc::error::TrySendError::Closed(())) => false,
        }
    }

    pub fn is_released(&self) -> bool {
        self.tx.is_closed()
    }

    /// Resolves once the subscriber has dropped its handle.
    pub async fn released(&self) {
        self.tx.closed().await
    }
}

/// In-process fan-out used by backends whose change source is local.
#[derive(Debug, Default)]
pub struct ChangeFeed {
    listeners: Mutex<Vec<(Resource, ChangeNotifier)>>,
}

impl ChangeFeed {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn subscribe(&self, resource: Resource) -> Subscription {
        let (notifier, sub) = Subscription::channel(resource);
        self.lock().push((resource, notifier));
        sub
    }

    /// Notify every live listener of `resource` and forget released ones.
    pub fn notify(&self, resource: Resource) {
        self.lock()
            .retain(|(r, n)| if *r == resource { n.notify() } else { !n.is_released() });
    }

    pub fn listener_count(&self, resource: Resource) -> usize {
        self.lock()
            .iter()
            .filter(|(r, n)| *r == resource && !n.is_released())
            .count()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Vec<(Resource, ChangeNotifier)>> {
        self.listeners
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

/// Capability set every backend provides.
#[async_trait]
pub trait StoragePort: Send + Sync {
    /// Short provider name used in logs.
    fn provider(&self) -> &'static str;

    /// Full read of the portfolio collection, newest first.
    async fn read_portfolio(&self) -> Result<Vec<PortfolioItem>, StoreError>;

    /// Read the settings singleton. `None` when the record does not exist.
    async fn read_settings(&self) -> Result<Option<SettingsPatch>, StoreError>;

    async fn subscribe(&self, resource: Resource) -> Result<Subscription, StoreError>;

    /// Insert a portfolio record and return its store-assigned id.
    async fn insert_item(&self, item: &NewPortfolioItem) -> Result<String, StoreError>;

    /// Insert-or-merge the settings singleton.
    async fn upsert_settings(&self, patch: &SettingsPatch) -> Result<(), StoreError>;

    /// Delete a portfolio record. Deleting an absent id succeeds.
    async fn delete_item(&self, id: &str) -> Result<(), StoreError>;

    async fn upload_file(
        &self,
        upload: FileUpload,
        progress: &ProgressTracker,
    ) -> Result<StoredFile, StoreError>;

    /// Remove objects by bucket path. Missing objects are not an error.
    async fn remove_files(&self, paths: &[String]) -> Result<(), StoreError>;

    /// Map a public URL issued by this backend back to its bucket path.
    fn storage_path(&self, public_url: &str) -> Option<String>;

    async fn sign_in(&self, email: &str, password: &str) -> Result<(), AuthError>;

    async fn sign_out(&self) -> Result<(), StoreError>;

    /// Whether a live session is currently held.
    fn session_present(&self) -> bool;
}

/// Build the backend selected in the configuration.
pub async fn connect(cfg: &Config) -> Result<Arc<dyn StoragePort>, StoreError> {
    let store: Arc<dyn StoragePort> = match cfg.backend.provider {
        Provider::Local => {
            let local = cfg
                .backend
                .local
                .as_ref()
                .ok_or_else(|| StoreError::Decode("backend.local missing".into()))?;
            Arc::new(
                local::SqliteStore::connect(
                    &cfg.local_database_url(),
                    cfg.uploads_dir(),
                    &local.public_base,
                    local::Credentials::new(&local.admin_email, &local.admin_password),
                )
                .await?,
            )
        }
        Provider::Supabase => {
            let sb = cfg
                .backend
                .supabase
                .as_ref()
                .ok_or_else(|| StoreError::Decode("backend.supabase missing".into()))?;
            Arc::new(supabase::SupabaseStore::from_config(sb)?)
        }
        Provider::Firebase => {
            let fb = cfg
                .backend
                .firebase
                .as_ref()
                .ok_or_else(|| StoreError::Decode("backend.firebase missing".into()))?;
            Arc::new(firebase::FirebaseStore::from_config(fb))
        }
    };
    tracing::info!(provider = store.provider(), "storage backend ready");
    Ok(store)
}
