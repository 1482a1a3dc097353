//! Sync layer: mirrors portfolio, settings and the session projection from
//! the storage port into local state.
//!
//! Each feed re-reads its whole resource on every signal and replaces the
//! mirrored value wholesale. Read failures are logged and the resource falls
//! back to its default; nothing here ever surfaces an error to a visitor.
use std::sync::Arc;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::model::{PortfolioItem, SettingsPatch, SiteSettings};
use crate::store::{Resource, StoragePort, Subscription};

/// Local copy of the remote state the pages render from.
#[derive(Debug, Clone)]
pub struct SiteMirror {
    inner: Arc<MirrorInner>,
}

#[derive(Debug)]
struct MirrorInner {
    portfolio: watch::Sender<Vec<PortfolioItem>>,
    settings: watch::Sender<SiteSettings>,
    logged_in: watch::Sender<bool>,
}

impl Default for SiteMirror {
    fn default() -> Self {
        Self::new()
    }
}

impl SiteMirror {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(MirrorInner {
                portfolio: watch::channel(Vec::new()).0,
                settings: watch::channel(SiteSettings::default()).0,
                logged_in: watch::channel(false).0,
            }),
        }
    }

    pub fn portfolio(&self) -> Vec<PortfolioItem> {
        self.inner.portfolio.borrow().clone()
    }

    pub fn settings(&self) -> SiteSettings {
        self.inner.settings.borrow().clone()
    }

    pub fn logged_in(&self) -> bool {
        *self.inner.logged_in.borrow()
    }

    pub fn set_portfolio(&self, items: Vec<PortfolioItem>) {
        self.inner.portfolio.send_replace(items);
    }

    pub fn set_settings(&self, settings: SiteSettings) {
        self.inner.settings.send_replace(settings);
    }

    pub fn set_logged_in(&self, present: bool) {
        self.inner.logged_in.send_if_modified(|cur| {
            let changed = *cur != present;
            *cur = present;
            changed
        });
    }
}

pub async fn refresh_portfolio(store: &dyn StoragePort, mirror: &SiteMirror) {
    match store.read_portfolio().await {
        Ok(items) => {
            debug!(count = items.len(), "portfolio refreshed");
            mirror.set_portfolio(items);
        }
        Err(e) => {
            warn!(error = %e, provider = store.provider(), "portfolio read failed; showing empty list");
            mirror.set_portfolio(Vec::new());
        }
    }
}

/// Re-read settings, creating the record with defaults when it is absent.
pub async fn refresh_settings(store: &dyn StoragePort, mirror: &SiteMirror) {
    match store.read_settings().await {
        Ok(Some(patch)) => mirror.set_settings(SiteSettings::default().merged(&patch)),
        Ok(None) => {
            info!("settings record missing; writing defaults");
            let defaults = SiteSettings::default();
            if let Err(e) = store.upsert_settings(&SettingsPatch::from(&defaults)).await {
                warn!(error = %e, "failed to create default settings");
            }
            mirror.set_settings(defaults);
        }
        Err(e) => {
            warn!(error = %e, provider = store.provider(), "settings read failed; using defaults");
            mirror.set_settings(SiteSettings::default());
        }
    }
}

pub fn refresh_auth(store: &dyn StoragePort, mirror: &SiteMirror) {
    mirror.set_logged_in(store.session_present());
}

pub async fn refresh(resource: Resource, store: &dyn StoragePort, mirror: &SiteMirror) {
    match resource {
        Resource::Auth => refresh_auth(store, mirror),
        Resource::Portfolio => refresh_portfolio(store, mirror).await,
        Resource::Settings => refresh_settings(store, mirror).await,
    }
}

/// One-shot read of every resource, for tools that do not keep feeds open.
pub async fn refresh_all(store: &dyn StoragePort, mirror: &SiteMirror) {
    refresh_auth(store, mirror);
    refresh_portfolio(store, mirror).await;
    refresh_settings(store, mirror).await;
}

/// Owner of the three feed tasks. Dropping it (or calling
/// [`shutdown`](Self::shutdown)) aborts the tasks, which releases their
/// subscriptions.
#[derive(Debug)]
pub struct SyncHandle {
    tasks: Vec<(Resource, JoinHandle<()>)>,
}

impl SyncHandle {
    pub async fn activate(store: Arc<dyn StoragePort>, mirror: SiteMirror) -> Self {
        let mut tasks = Vec::with_capacity(3);
        for resource in [Resource::Auth, Resource::Portfolio, Resource::Settings] {
            // Subscribe before the first read so no change slips between them.
            let sub = match store.subscribe(resource).await {
                Ok(sub) => Some(sub),
                Err(e) => {
                    warn!(resource = resource.as_str(), error = %e, "subscribe failed; resource will not live-update");
                    None
                }
            };
            refresh(resource, store.as_ref(), &mirror).await;
            if let Some(sub) = sub {
                let handle = tokio::spawn(follow(store.clone(), mirror.clone(), sub));
                tasks.push((resource, handle));
            }
        }
        info!(feeds = tasks.len(), provider = store.provider(), "sync layer active");
        Self { tasks }
    }

    /// Resources with a live feed.
    pub fn live_feeds(&self) -> Vec<Resource> {
        self.tasks
            .iter()
            .filter(|(_, h)| !h.is_finished())
            .map(|(r, _)| *r)
            .collect()
    }

    pub async fn shutdown(mut self) {
        for (_, task) in self.tasks.drain(..) {
            task.abort();
            let _ = task.await;
        }
        debug!("sync layer stopped");
    }
}

impl Drop for SyncHandle {
    fn drop(&mut self) {
        for (_, task) in &self.tasks {
            task.abort();
        }
    }
}

async fn follow(store: Arc<dyn StoragePort>, mirror: SiteMirror, mut sub: Subscription) {
    let resource = sub.resource();
    while sub.changed().await {
        refresh(resource, store.as_ref(), &mirror).await;
    }
    debug!(resource = resource.as_str(), "feed ended");
}
