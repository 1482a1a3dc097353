use axum::extract::{Query, State};
use axum::http::{header, HeaderMap};
use axum::response::{Html, IntoResponse, Redirect};
use axum::{Form, Json};
use serde::{Deserialize, Serialize};
use tracing::info;

use super::{AppState, STYLESHEET};
use crate::gallery::{GalleryTab, VideoPlayer};
use crate::quote::{self, QuoteRequest};
use crate::render::{self, public::LandingView};

#[derive(Debug, Default, Deserialize)]
pub struct LandingQuery {
    pub tab: Option<String>,
    pub play: Option<String>,
    /// Package id; anything that does not name a package is ignored.
    pub pacote: Option<String>,
}

/// GET / -- the landing page rendered from the mirrored state.
pub async fn landing(
    State(state): State<AppState>,
    headers: HeaderMap,
    Query(q): Query<LandingQuery>,
) -> Html<String> {
    let mirror = state.dashboard.mirror();
    let items = mirror.portfolio();
    let settings = mirror.settings();

    let playing = q.play.as_deref().and_then(|id| VideoPlayer::open(&items, id));
    let tab = if playing.is_some() {
        GalleryTab::Videos
    } else {
        GalleryTab::parse(q.tab.as_deref())
    };

    let mut request = QuoteRequest::default();
    if let Some(pkg) = q
        .pacote
        .as_deref()
        .and_then(|p| p.trim().parse::<u8>().ok())
        .and_then(quote::package)
    {
        request = request.with_package_interest(pkg.title);
    }

    Html(render::public::render_landing(&LandingView {
        site_title: &state.site_title,
        stylesheet: STYLESHEET,
        settings: &settings,
        items: &items,
        tab,
        playing,
        quote: &request,
        logged_in: state.is_admin(&headers),
    }))
}

/// POST /orcamento -- hand the visitor over to WhatsApp with the message.
pub async fn submit_quote(State(state): State<AppState>, Form(req): Form<QuoteRequest>) -> Redirect {
    let number = state.dashboard.mirror().settings().whatsapp_number;
    info!(event_type = %req.event_type, "quote request forwarded");
    Redirect::to(&req.whatsapp_link(&number))
}

pub async fn stylesheet() -> impl IntoResponse {
    (
        [(header::CONTENT_TYPE, "text/css; charset=utf-8")],
        render::DEFAULT_STYLE,
    )
}

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub version: &'static str,
    pub provider: &'static str,
    pub portfolio_items: usize,
}

/// GET /healthz
pub async fn health(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
        provider: state.dashboard.provider(),
        portfolio_items: state.dashboard.mirror().portfolio().len(),
    })
}
