//! Self-hosted backend: SQLite tables, uploads on the local filesystem and a
//! single admin account taken from configuration.
use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, Utc};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use sqlx::{Row, SqlitePool};
use std::fmt;
use std::path::{Component, Path, PathBuf};
use std::str::FromStr;
use std::sync::Arc;
use tokio::io::AsyncWriteExt;
use tracing::{instrument, warn};

use super::auth::AuthState;
use super::{
    object_path, AuthError, ChangeFeed, FileUpload, ProgressTracker, Resource, Session,
    StoragePort, StoreError, StoredFile, Subscription,
};
use crate::model::{
    Category, NewPortfolioItem, PortfolioItem, SettingsField, SettingsPatch, SETTINGS_ID,
};

pub type Pool = SqlitePool;

const WRITE_CHUNK: usize = 64 * 1024;

pub async fn init_pool(database_url: &str) -> Result<Pool, StoreError> {
    let normalized = prepare_sqlite_url(database_url);
    if normalized.starts_with("sqlite::memory") {
        // Every connection would get its own empty database otherwise.
        let opts = SqliteConnectOptions::from_str(&normalized)?;
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .min_connections(1)
            .idle_timeout(None)
            .max_lifetime(None)
            .connect_with(opts)
            .await?;
        return Ok(pool);
    }
    let opts = SqliteConnectOptions::from_str(&normalized)?.create_if_missing(true);
    let pool = SqlitePool::connect_with(opts).await?;
    sqlx::query("PRAGMA journal_mode=WAL;").execute(&pool).await?;
    sqlx::query("PRAGMA synchronous=FULL;").execute(&pool).await?;
    Ok(pool)
}

/// Expand a leading `~/` in a file-backed SQLite URL and make sure the parent
/// directory exists. In-memory and non-sqlite URLs pass through.
fn prepare_sqlite_url(url: &str) -> String {
    if !url.starts_with("sqlite:") || url.starts_with("sqlite::memory") {
        return url.to_string();
    }

    let rest = &url["sqlite:".len()..];
    let path_with_query = rest.strip_prefix("//").unwrap_or(rest);
    let (path_part, query_part) = match path_with_query.split_once('?') {
        Some((p, q)) => (p, Some(q)),
        None => (path_with_query, None),
    };
    if path_part.is_empty() {
        return url.to_string();
    }

    let expanded = match (path_part.strip_prefix("~/"), std::env::var("HOME")) {
        (Some(rest), Ok(home)) => format!("{}/{}", home.trim_end_matches('/'), rest),
        _ => path_part.to_string(),
    };

    if let Some(parent) = Path::new(&expanded).parent() {
        if !parent.as_os_str().is_empty() {
            let _ = std::fs::create_dir_all(parent);
        }
    }

    let mut rebuilt = format!("sqlite://{expanded}");
    if let Some(q) = query_part {
        rebuilt.push('?');
        rebuilt.push_str(q);
    }
    rebuilt
}

pub async fn run_migrations(pool: &Pool) -> Result<(), StoreError> {
    sqlx::migrate!("./migrations").run(pool).await?;
    Ok(())
}

/// The one admin account of a self-hosted site.
#[derive(Clone)]
pub struct Credentials {
    email: String,
    password: String,
}

impl Credentials {
    pub fn new(email: &str, password: &str) -> Self {
        Self {
            email: email.trim().to_string(),
            password: password.to_string(),
        }
    }

    fn matches(&self, email: &str, password: &str) -> bool {
        self.email.eq_ignore_ascii_case(email.trim()) && self.password == password
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("email", &self.email)
            .field("password", &"<redacted>")
            .finish()
    }
}

#[derive(Debug)]
pub struct SqliteStore {
    pool: Pool,
    uploads_dir: PathBuf,
    public_base: String,
    credentials: Credentials,
    auth: Arc<AuthState>,
    feed: ChangeFeed,
}

impl SqliteStore {
    pub async fn connect(
        database_url: &str,
        uploads_dir: PathBuf,
        public_base: &str,
        credentials: Credentials,
    ) -> Result<Self, StoreError> {
        let pool = init_pool(database_url).await?;
        Self::open(pool, uploads_dir, public_base, credentials).await
    }

    /// Wrap an existing pool, applying migrations first.
    pub async fn open(
        pool: Pool,
        uploads_dir: PathBuf,
        public_base: &str,
        credentials: Credentials,
    ) -> Result<Self, StoreError> {
        run_migrations(&pool).await?;
        tokio::fs::create_dir_all(&uploads_dir).await?;
        Ok(Self {
            pool,
            uploads_dir,
            public_base: public_base.trim_end_matches('/').to_string(),
            credentials,
            auth: AuthState::new(),
            feed: ChangeFeed::new(),
        })
    }

    pub fn pool(&self) -> &Pool {
        &self.pool
    }

    pub fn uploads_dir(&self) -> &Path {
        &self.uploads_dir
    }

    /// Live listeners on `resource`, for teardown checks.
    pub fn listener_count(&self, resource: Resource) -> usize {
        match resource {
            Resource::Auth => self.auth.listener_count(),
            other => self.feed.listener_count(other),
        }
    }

    fn url_prefix(&self) -> String {
        format!("{}/uploads/", self.public_base)
    }

    fn resolve(&self, path: &str) -> Option<PathBuf> {
        let rel = Path::new(path);
        if rel
            .components()
            .any(|c| !matches!(c, Component::Normal(_)))
        {
            return None;
        }
        Some(self.uploads_dir.join(rel))
    }
}

fn row_to_item(row: &sqlx::sqlite::SqliteRow) -> Result<Option<PortfolioItem>, StoreError> {
    let id: String = row.try_get("id")?;
    let category: String = row.try_get("category")?;
    let Some(category) = Category::parse(&category) else {
        warn!(%id, %category, "skipping portfolio row with unknown category");
        return Ok(None);
    };
    let created_at: Option<String> = row.try_get("created_at")?;
    let created_at = created_at
        .as_deref()
        .and_then(|s| DateTime::parse_from_rfc3339(s).ok())
        .map(|dt| dt.with_timezone(&Utc));
    Ok(Some(PortfolioItem {
        id,
        title: row.try_get("title")?,
        category,
        image: row.try_get("image")?,
        video_url: row
            .try_get::<Option<String>, _>("video_url")?
            .filter(|u| !u.is_empty()),
        created_at,
    }))
}

fn timestamp(now: DateTime<Utc>) -> String {
    now.to_rfc3339_opts(SecondsFormat::Micros, true)
}

#[async_trait]
impl StoragePort for SqliteStore {
    fn provider(&self) -> &'static str {
        "local"
    }

    #[instrument(skip_all)]
    async fn read_portfolio(&self) -> Result<Vec<PortfolioItem>, StoreError> {
        let rows = sqlx::query(
            "SELECT id, title, category, image, video_url, created_at FROM portfolio \
             ORDER BY created_at DESC, rowid DESC",
        )
        .fetch_all(&self.pool)
        .await?;
        let mut items = Vec::with_capacity(rows.len());
        for row in &rows {
            if let Some(item) = row_to_item(row)? {
                items.push(item);
            }
        }
        Ok(items)
    }

    #[instrument(skip_all)]
    async fn read_settings(&self) -> Result<Option<SettingsPatch>, StoreError> {
        let row = sqlx::query("SELECT * FROM settings WHERE id = ?")
            .bind(SETTINGS_ID)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.map(|row| {
            SettingsPatch::from_lookup(|f| {
                row.try_get::<Option<String>, _>(f.column())
                    .ok()
                    .flatten()
            })
        }))
    }

    async fn subscribe(&self, resource: Resource) -> Result<Subscription, StoreError> {
        Ok(match resource {
            Resource::Auth => self.auth.subscribe(),
            other => self.feed.subscribe(other),
        })
    }

    #[instrument(skip_all, fields(title = %item.title))]
    async fn insert_item(&self, item: &NewPortfolioItem) -> Result<String, StoreError> {
        self.auth.token()?;
        let id = uuid::Uuid::new_v4().to_string();
        sqlx::query(
            "INSERT INTO portfolio (id, title, category, image, video_url, created_at) \
             VALUES (?, ?, ?, ?, ?, ?)",
        )
        .bind(&id)
        .bind(&item.title)
        .bind(item.category.as_str())
        .bind(&item.image)
        .bind(item.video_url.as_deref().filter(|u| !u.is_empty()))
        .bind(timestamp(Utc::now()))
        .execute(&self.pool)
        .await?;
        self.feed.notify(Resource::Portfolio);
        Ok(id)
    }

    /// Merge-write of the given columns. Without a session the write may only
    /// create the record when it is absent, which is what first-load
    /// bootstrap needs.
    #[instrument(skip_all, fields(fields = patch.len()))]
    async fn upsert_settings(&self, patch: &SettingsPatch) -> Result<(), StoreError> {
        let authed = self.auth.is_present();
        let fields: Vec<(SettingsField, &str)> = patch.iter().collect();

        let mut columns = vec!["id"];
        columns.extend(fields.iter().map(|(f, _)| f.column()));
        columns.push("updated_at");
        let placeholders = vec!["?"; columns.len()].join(", ");
        let conflict = if authed {
            let sets: Vec<String> = columns[1..]
                .iter()
                .map(|c| format!("{c} = excluded.{c}"))
                .collect();
            format!("DO UPDATE SET {}", sets.join(", "))
        } else {
            "DO NOTHING".to_string()
        };
        let sql = format!(
            "INSERT INTO settings ({}) VALUES ({}) ON CONFLICT(id) {}",
            columns.join(", "),
            placeholders,
            conflict
        );

        let mut q = sqlx::query(&sql).bind(SETTINGS_ID);
        for (_, value) in &fields {
            q = q.bind(*value);
        }
        let done = q.bind(timestamp(Utc::now())).execute(&self.pool).await?;

        if done.rows_affected() == 0 && !authed {
            // The record already exists; an anonymous caller may only
            // converge on what is stored, never overwrite it.
            let same = self
                .read_settings()
                .await?
                .is_some_and(|stored| fields.iter().all(|(f, v)| stored.get(*f) == Some(*v)));
            if !same {
                return Err(StoreError::Unauthenticated);
            }
        }
        if done.rows_affected() > 0 {
            self.feed.notify(Resource::Settings);
        }
        Ok(())
    }

    #[instrument(skip_all, fields(%id))]
    async fn delete_item(&self, id: &str) -> Result<(), StoreError> {
        self.auth.token()?;
        let done = sqlx::query("DELETE FROM portfolio WHERE id = ?")
            .bind(id)
            .execute(&self.pool)
            .await?;
        if done.rows_affected() > 0 {
            self.feed.notify(Resource::Portfolio);
        }
        Ok(())
    }

    #[instrument(skip_all, fields(file = %upload.file_name, len = upload.len()))]
    async fn upload_file(
        &self,
        upload: FileUpload,
        progress: &ProgressTracker,
    ) -> Result<StoredFile, StoreError> {
        self.auth.token()?;
        let path = object_path(upload.folder, &upload.file_name);
        let dest = self
            .resolve(&path)
            .ok_or_else(|| StoreError::Decode(format!("bad object path {path}")))?;
        if let Some(parent) = dest.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }

        let total = upload.len();
        let mut file = tokio::fs::File::create(&dest).await?;
        let mut written = 0u64;
        for chunk in upload.bytes.chunks(WRITE_CHUNK) {
            file.write_all(chunk).await?;
            written += chunk.len() as u64;
            progress.report(written, total);
        }
        file.flush().await?;

        Ok(StoredFile {
            public_url: format!("{}{}", self.url_prefix(), path),
            path,
        })
    }

    #[instrument(skip_all, fields(count = paths.len()))]
    async fn remove_files(&self, paths: &[String]) -> Result<(), StoreError> {
        self.auth.token()?;
        for path in paths {
            let Some(full) = self.resolve(path) else {
                warn!(%path, "refusing to remove path outside uploads");
                continue;
            };
            match tokio::fs::remove_file(&full).await {
                Ok(()) => {}
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
                Err(e) => return Err(e.into()),
            }
        }
        Ok(())
    }

    fn storage_path(&self, public_url: &str) -> Option<String> {
        let rest = public_url.strip_prefix(&self.url_prefix())?;
        (rest.starts_with("images/") || rest.starts_with("videos/")).then(|| rest.to_string())
    }

    #[instrument(skip_all)]
    async fn sign_in(&self, email: &str, password: &str) -> Result<(), AuthError> {
        if !self.credentials.matches(email, password) {
            return Err(AuthError::InvalidCredentials);
        }
        self.auth.set(Some(Session {
            access_token: uuid::Uuid::new_v4().to_string(),
            refresh_token: None,
            email: email.trim().to_string(),
            expires_at: None,
        }));
        Ok(())
    }

    async fn sign_out(&self) -> Result<(), StoreError> {
        self.auth.clear();
        Ok(())
    }

    fn session_present(&self) -> bool {
        self.auth.is_present()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn memory_urls_pass_through() {
        assert_eq!(prepare_sqlite_url("sqlite::memory:"), "sqlite::memory:");
        assert_eq!(prepare_sqlite_url("postgres://x"), "postgres://x");
    }

    #[test]
    fn file_url_creates_parent_dir() {
        let td = tempfile::tempdir().unwrap();
        let db = td.path().join("nested/dir/site.db");
        let url = format!("sqlite://{}?mode=rwc", db.display());
        let out = prepare_sqlite_url(&url);
        assert!(out.starts_with("sqlite://"));
        assert!(out.ends_with("?mode=rwc"));
        assert!(db.parent().unwrap().exists());
    }

    #[test]
    fn credentials_debug_hides_password() {
        let c = Credentials::new("a@b.c", "hunter2");
        assert!(!format!("{:?}", c).contains("hunter2"));
        assert!(c.matches(" A@B.C ", "hunter2"));
        assert!(!c.matches("a@b.c", "Hunter2"));
    }

    #[test]
    fn timestamps_sort_lexicographically() {
        let a: DateTime<Utc> = "2024-01-01T00:00:00.5Z".parse().unwrap();
        let b: DateTime<Utc> = "2024-01-01T00:00:01Z".parse().unwrap();
        assert!(timestamp(a) < timestamp(b));
    }
}
