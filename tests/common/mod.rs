#![allow(dead_code)]

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use aerial_site::model::{NewPortfolioItem, PortfolioItem, SettingsPatch};
use aerial_site::store::{
    object_path, AuthError, ChangeFeed, FileUpload, ProgressTracker, Resource, StoragePort,
    StoreError, StoredFile, Subscription,
};
use async_trait::async_trait;
use chrono::Utc;

pub const ADMIN_EMAIL: &str = "admin@example.com";
pub const ADMIN_PASSWORD: &str = "s3cret";
pub const CDN: &str = "https://cdn.test/";

#[derive(Debug, Default)]
struct State {
    items: Vec<PortfolioItem>,
    settings: Option<SettingsPatch>,
    upserts: Vec<SettingsPatch>,
    removed: Vec<String>,
    next_id: u64,
}

/// In-memory backend that records writes and can be told to fail.
#[derive(Debug, Default)]
pub struct FakeStore {
    state: Mutex<State>,
    feed: ChangeFeed,
    session: AtomicBool,
    pub fail_reads: AtomicBool,
    pub fail_writes: AtomicBool,
    pub fail_sign_in: AtomicBool,
}

fn boom() -> StoreError {
    StoreError::Remote {
        provider: "fake",
        status: 503,
        body: "unavailable".into(),
    }
}

impl FakeStore {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn with_settings(patch: SettingsPatch) -> Arc<Self> {
        let store = Self::default();
        store.state.lock().unwrap().settings = Some(patch);
        Arc::new(store)
    }

    fn state(&self) -> std::sync::MutexGuard<'_, State> {
        self.state.lock().unwrap()
    }

    pub fn fail_reads(&self, on: bool) {
        self.fail_reads.store(on, Ordering::SeqCst);
    }

    pub fn fail_writes(&self, on: bool) {
        self.fail_writes.store(on, Ordering::SeqCst);
    }

    pub fn stored_settings(&self) -> Option<SettingsPatch> {
        self.state().settings.clone()
    }

    pub fn upserts(&self) -> Vec<SettingsPatch> {
        self.state().upserts.clone()
    }

    pub fn items(&self) -> Vec<PortfolioItem> {
        self.state().items.clone()
    }

    pub fn removed(&self) -> Vec<String> {
        self.state().removed.clone()
    }

    pub fn listener_count(&self, resource: Resource) -> usize {
        self.feed.listener_count(resource)
    }

    /// Insert directly, as another client would, and signal the feed.
    pub fn push_remote(&self, item: PortfolioItem) {
        self.state().items.insert(0, item);
        self.feed.notify(Resource::Portfolio);
    }

    fn write_guard(&self) -> Result<(), StoreError> {
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(boom());
        }
        Ok(())
    }
}

#[async_trait]
impl StoragePort for FakeStore {
    fn provider(&self) -> &'static str {
        "fake"
    }

    async fn read_portfolio(&self) -> Result<Vec<PortfolioItem>, StoreError> {
        if self.fail_reads.load(Ordering::SeqCst) {
            return Err(boom());
        }
        Ok(self.items())
    }

    async fn read_settings(&self) -> Result<Option<SettingsPatch>, StoreError> {
        if self.fail_reads.load(Ordering::SeqCst) {
            return Err(boom());
        }
        Ok(self.stored_settings())
    }

    async fn subscribe(&self, resource: Resource) -> Result<Subscription, StoreError> {
        Ok(self.feed.subscribe(resource))
    }

    async fn insert_item(&self, item: &NewPortfolioItem) -> Result<String, StoreError> {
        self.write_guard()?;
        let id = {
            let mut st = self.state();
            st.next_id += 1;
            let id = format!("item-{}", st.next_id);
            st.items.insert(
                0,
                PortfolioItem {
                    id: id.clone(),
                    title: item.title.clone(),
                    category: item.category,
                    image: item.image.clone(),
                    video_url: item.video_url.clone(),
                    created_at: Some(Utc::now()),
                },
            );
            id
        };
        self.feed.notify(Resource::Portfolio);
        Ok(id)
    }

    async fn upsert_settings(&self, patch: &SettingsPatch) -> Result<(), StoreError> {
        self.write_guard()?;
        {
            let mut st = self.state();
            let mut merged = st.settings.clone().unwrap_or_default();
            for (field, value) in patch.iter() {
                merged.set(field, value);
            }
            st.settings = Some(merged);
            st.upserts.push(patch.clone());
        }
        self.feed.notify(Resource::Settings);
        Ok(())
    }

    async fn delete_item(&self, id: &str) -> Result<(), StoreError> {
        self.write_guard()?;
        self.state().items.retain(|item| item.id != id);
        self.feed.notify(Resource::Portfolio);
        Ok(())
    }

    async fn upload_file(
        &self,
        upload: FileUpload,
        progress: &ProgressTracker,
    ) -> Result<StoredFile, StoreError> {
        self.write_guard()?;
        let total = upload.len();
        progress.report(total / 2, total);
        let path = object_path(upload.folder, &upload.file_name);
        progress.report(total, total);
        Ok(StoredFile {
            public_url: format!("{CDN}{path}"),
            path,
        })
    }

    async fn remove_files(&self, paths: &[String]) -> Result<(), StoreError> {
        self.state().removed.extend(paths.iter().cloned());
        Ok(())
    }

    fn storage_path(&self, public_url: &str) -> Option<String> {
        public_url.strip_prefix(CDN).map(str::to_string)
    }

    async fn sign_in(&self, email: &str, password: &str) -> Result<(), AuthError> {
        if self.fail_sign_in.load(Ordering::SeqCst) {
            return Err(AuthError::Store(boom()));
        }
        if email != ADMIN_EMAIL || password != ADMIN_PASSWORD {
            return Err(AuthError::InvalidCredentials);
        }
        self.session.store(true, Ordering::SeqCst);
        self.feed.notify(Resource::Auth);
        Ok(())
    }

    async fn sign_out(&self) -> Result<(), StoreError> {
        self.session.store(false, Ordering::SeqCst);
        self.feed.notify(Resource::Auth);
        Ok(())
    }

    fn session_present(&self) -> bool {
        self.session.load(Ordering::SeqCst)
    }
}

/// Poll `check` until it holds or two seconds pass.
pub async fn eventually<F: FnMut() -> bool>(mut check: F) -> bool {
    let deadline = tokio::time::Instant::now() + Duration::from_secs(2);
    while tokio::time::Instant::now() < deadline {
        if check() {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    check()
}
