//! Process-wide session slot and its change stream.
use chrono::Utc;
use std::sync::{Arc, RwLock};
use tokio::task::JoinHandle;

use super::{ChangeFeed, Resource, Session, StoreError, Subscription};

/// Holds the current session and notifies auth subscribers on every change.
#[derive(Debug, Default)]
pub struct AuthState {
    session: RwLock<Option<Session>>,
    feed: ChangeFeed,
    expiry: std::sync::Mutex<Option<JoinHandle<()>>>,
}

impl AuthState {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn subscribe(&self) -> Subscription {
        self.feed.subscribe(Resource::Auth)
    }

    pub fn listener_count(&self) -> usize {
        self.feed.listener_count(Resource::Auth)
    }

    /// Replace the session and notify. Arms an expiry timer when the session
    /// carries a deadline.
    pub fn set(self: &Arc<Self>, session: Option<Session>) {
        let deadline = session.as_ref().and_then(|s| s.expires_at);
        {
            let mut slot = self
                .session
                .write()
                .unwrap_or_else(|poisoned| poisoned.into_inner());
            *slot = session;
        }
        self.arm_expiry(deadline);
        self.feed.notify(Resource::Auth);
    }

    pub fn clear(self: &Arc<Self>) {
        self.set(None);
    }

    pub fn is_present(&self) -> bool {
        self.read()
            .as_ref()
            .is_some_and(|s| !s.is_expired(Utc::now()))
    }

    /// Access token of a live session.
    pub fn token(&self) -> Result<String, StoreError> {
        match self.read().as_ref() {
            Some(s) if !s.is_expired(Utc::now()) => Ok(s.access_token.clone()),
            _ => Err(StoreError::Unauthenticated),
        }
    }

    /// Access token of a live session, or `fallback` (e.g. an anon key).
    pub fn bearer(&self, fallback: &str) -> String {
        self.token().unwrap_or_else(|_| fallback.to_string())
    }

    fn read(&self) -> std::sync::RwLockReadGuard<'_, Option<Session>> {
        self.session
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn arm_expiry(self: &Arc<Self>, deadline: Option<chrono::DateTime<Utc>>) {
        let mut slot = self
            .expiry
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        if let Some(prev) = slot.take() {
            prev.abort();
        }
        let Some(deadline) = deadline else { return };
        let Ok(handle) = tokio::runtime::Handle::try_current() else {
            return;
        };
        let wait = (deadline - Utc::now()).to_std().unwrap_or_default();
        let weak = Arc::downgrade(self);
        *slot = Some(handle.spawn(async move {
            tokio::time::sleep(wait).await;
            if let Some(state) = weak.upgrade() {
                tracing::info!("session expired");
                {
                    let mut s = state
                        .session
                        .write()
                        .unwrap_or_else(|poisoned| poisoned.into_inner());
                    *s = None;
                }
                state.feed.notify(Resource::Auth);
            }
        }));
    }
}

impl Drop for AuthState {
    fn drop(&mut self) {
        if let Ok(mut slot) = self.expiry.lock() {
            if let Some(h) = slot.take() {
                h.abort();
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn session(expires_in_ms: Option<i64>) -> Session {
        Session {
            access_token: "tok".into(),
            refresh_token: None,
            email: "admin@example.com".into(),
            expires_at: expires_in_ms.map(|ms| Utc::now() + chrono::Duration::milliseconds(ms)),
        }
    }

    #[tokio::test]
    async fn set_and_clear_notify_subscribers() {
        let auth = AuthState::new();
        let mut sub = auth.subscribe();
        auth.set(Some(session(None)));
        assert!(sub.changed().await);
        assert!(auth.is_present());
        assert_eq!(auth.bearer("anon"), "tok");

        auth.clear();
        assert!(sub.changed().await);
        assert!(!auth.is_present());
        assert_eq!(auth.bearer("anon"), "anon");
        assert!(matches!(auth.token(), Err(StoreError::Unauthenticated)));
    }

    #[tokio::test]
    async fn expired_session_is_dropped_and_announced() {
        let auth = AuthState::new();
        auth.set(Some(session(Some(30))));
        let mut sub = auth.subscribe();
        assert!(auth.is_present());
        let fired = tokio::time::timeout(Duration::from_secs(2), sub.changed()).await;
        assert_eq!(fired.ok(), Some(true));
        assert!(!auth.is_present());
        assert!(matches!(auth.token(), Err(StoreError::Unauthenticated)));
    }
}
