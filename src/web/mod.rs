//! HTTP surface: the public landing page and the admin dashboard.
pub mod admin;
pub mod error;
pub mod public;

use std::path::PathBuf;
use std::sync::{Arc, Mutex};

use axum::extract::DefaultBodyLimit;
use axum::http::{header, HeaderMap};
use axum::routing::{get, post};
use axum::Router;
use tower_http::services::ServeDir;
use tower_http::trace::{DefaultMakeSpan, DefaultOnResponse, TraceLayer};
use tracing::Level;

use crate::admin::AdminDashboard;

pub const STYLESHEET: &str = "/static/style.css";
pub const ADMIN_COOKIE: &str = "aerial_admin";

/// Headroom above the upload ceiling for multipart framing and text fields.
const BODY_SLACK: usize = 1024 * 1024;

/// Shared state handed to every handler.
#[derive(Clone)]
pub struct AppState {
    pub dashboard: Arc<AdminDashboard>,
    pub site_title: Arc<str>,
    admin_token: Arc<Mutex<Option<String>>>,
}

impl std::fmt::Debug for AppState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppState")
            .field("dashboard", &self.dashboard)
            .field("site_title", &self.site_title)
            .finish_non_exhaustive()
    }
}

impl AppState {
    pub fn new(dashboard: Arc<AdminDashboard>, site_title: &str) -> Self {
        Self {
            dashboard,
            site_title: Arc::from(site_title),
            admin_token: Arc::new(Mutex::new(None)),
        }
    }

    fn token_slot(&self) -> std::sync::MutexGuard<'_, Option<String>> {
        self.admin_token
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Issue a fresh cookie token, invalidating any earlier one.
    pub fn issue_token(&self) -> String {
        let token = uuid::Uuid::new_v4().simple().to_string();
        *self.token_slot() = Some(token.clone());
        token
    }

    pub fn revoke_token(&self) {
        *self.token_slot() = None;
    }

    /// The request carries the current cookie and the store still holds a
    /// live session.
    pub fn is_admin(&self, headers: &HeaderMap) -> bool {
        let Some(presented) = cookie_value(headers, ADMIN_COOKIE) else {
            return false;
        };
        let matches = self.token_slot().as_deref() == Some(presented.as_str());
        matches && self.dashboard.mirror().logged_in()
    }
}

/// Value of cookie `name` from the `Cookie` headers.
pub fn cookie_value(headers: &HeaderMap, name: &str) -> Option<String> {
    headers
        .get_all(header::COOKIE)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .flat_map(|v| v.split(';'))
        .filter_map(|pair| pair.trim().split_once('='))
        .find(|(k, _)| *k == name)
        .map(|(_, v)| v.to_string())
}

/// Build the router. `uploads_dir` is served under `/uploads` when the
/// local backend keeps files on disk.
pub fn router(state: AppState, uploads_dir: Option<PathBuf>) -> Router {
    let body_limit = usize::try_from(state.dashboard.max_upload_bytes())
        .unwrap_or(usize::MAX)
        .saturating_add(BODY_SLACK);

    let mut app = Router::new()
        .route("/", get(public::landing))
        .route("/orcamento", post(public::submit_quote))
        .route("/healthz", get(public::health))
        .route(STYLESHEET, get(public::stylesheet))
        .route("/admin", get(admin::dashboard))
        .route("/admin/login", get(admin::login_page).post(admin::login))
        .route("/admin/logout", post(admin::logout))
        .route("/admin/portfolio", post(admin::add_item))
        .route(
            "/admin/portfolio/{id}/delete",
            get(admin::confirm_delete).post(admin::delete_item),
        )
        .route("/admin/upload/progress", get(admin::upload_progress))
        .route("/admin/upload/{target}", post(admin::upload))
        .route("/admin/settings", post(admin::update_settings));

    if let Some(dir) = uploads_dir {
        app = app.nest_service("/uploads", ServeDir::new(dir));
    }

    app.layer(DefaultBodyLimit::max(body_limit))
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(DefaultMakeSpan::new().level(Level::INFO))
                .on_response(DefaultOnResponse::new().level(Level::INFO)),
        )
        .with_state(state)
}

/// Resolve on Ctrl-C or SIGTERM.
pub async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::warn!(error = %e, "failed to listen for Ctrl-C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                tracing::warn!(error = %e, "failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => tracing::info!("received SIGINT, shutting down"),
        () = terminate => tracing::info!("received SIGTERM, shutting down"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    #[test]
    fn cookie_lookup_scans_all_pairs() {
        let mut headers = HeaderMap::new();
        headers.append(header::COOKIE, HeaderValue::from_static("a=1; aerial_admin=tok"));
        headers.append(header::COOKIE, HeaderValue::from_static("b=2"));
        assert_eq!(cookie_value(&headers, ADMIN_COOKIE).as_deref(), Some("tok"));
        assert_eq!(cookie_value(&headers, "b").as_deref(), Some("2"));
        assert_eq!(cookie_value(&headers, "c"), None);
    }
}
