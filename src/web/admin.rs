//! Admin handlers. Every page except login sits behind the session cookie.
use std::collections::HashMap;

use axum::extract::{Multipart, Path, Query, State};
use axum::http::{header, HeaderMap, StatusCode};
use axum::response::{Html, IntoResponse, Redirect, Response};
use axum::{Form, Json};
use serde::{Deserialize, Serialize};
use tracing::warn;

use super::error::{WebError, WebResult};
use super::{AppState, ADMIN_COOKIE, STYLESHEET};
use crate::admin::{PortfolioForm, UploadTarget, ValidationError};
use crate::gallery::GalleryTab;
use crate::model::{Category, SettingsField, SettingsPatch};
use crate::render::admin::{self as pages, AdminTab, DashboardView};

const UPLOAD_FIELD: &str = "file";

fn to_login() -> Response {
    Redirect::to("/admin/login").into_response()
}

fn to_portfolio() -> Response {
    Redirect::to("/admin?tab=portfolio").into_response()
}

#[derive(Debug, Default, Deserialize)]
pub struct DashboardQuery {
    pub tab: Option<String>,
    pub view: Option<String>,
}

/// GET /admin
pub async fn dashboard(
    State(state): State<AppState>,
    headers: HeaderMap,
    Query(q): Query<DashboardQuery>,
) -> Response {
    if !state.is_admin(&headers) {
        return to_login();
    }
    let d = &state.dashboard;
    let sub_tab = GalleryTab::parse(q.view.as_deref());
    let items = d.items(sub_tab);
    let form = d.form();
    let settings = d.mirror().settings();
    let notice = d.take_notice();

    Html(pages::render_dashboard(&DashboardView {
        site_title: &state.site_title,
        stylesheet: STYLESHEET,
        tab: AdminTab::parse(q.tab.as_deref()),
        sub_tab,
        items: &items,
        form: &form,
        settings: &settings,
        notice: notice.as_ref(),
        busy: d.is_busy(),
        progress: d.progress().current(),
        max_upload_mb: d.max_upload_bytes() / (1024 * 1024),
    }))
    .into_response()
}

/// GET /admin/login
pub async fn login_page(State(state): State<AppState>, headers: HeaderMap) -> Response {
    if state.is_admin(&headers) {
        return Redirect::to("/admin").into_response();
    }
    Html(pages::render_login(&state.site_title, STYLESHEET, "", None)).into_response()
}

#[derive(Debug, Deserialize)]
pub struct LoginForm {
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub password: String,
}

/// POST /admin/login
pub async fn login(State(state): State<AppState>, Form(form): Form<LoginForm>) -> Response {
    match state.dashboard.sign_in(&form.email, &form.password).await {
        Ok(()) => {
            let token = state.issue_token();
            let cookie = format!("{ADMIN_COOKIE}={token}; Path=/; HttpOnly; SameSite=Lax");
            ([(header::SET_COOKIE, cookie)], Redirect::to("/admin")).into_response()
        }
        Err(notice) => (
            StatusCode::UNAUTHORIZED,
            Html(pages::render_login(
                &state.site_title,
                STYLESHEET,
                &form.email,
                Some(&notice),
            )),
        )
            .into_response(),
    }
}

/// POST /admin/logout
pub async fn logout(State(state): State<AppState>, headers: HeaderMap) -> Response {
    if !state.is_admin(&headers) {
        return to_login();
    }
    state.dashboard.sign_out().await;
    state.revoke_token();
    let cookie = format!("{ADMIN_COOKIE}=; Path=/; HttpOnly; SameSite=Lax; Max-Age=0");
    ([(header::SET_COOKIE, cookie)], Redirect::to("/")).into_response()
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ItemForm {
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub category: String,
    #[serde(default)]
    pub image: String,
    #[serde(default)]
    pub video_url: String,
}

/// POST /admin/portfolio
pub async fn add_item(
    State(state): State<AppState>,
    headers: HeaderMap,
    Form(input): Form<ItemForm>,
) -> Response {
    if !state.is_admin(&headers) {
        return to_login();
    }
    let d = &state.dashboard;
    let category = Category::parse(&input.category);
    d.set_form(PortfolioForm {
        title: input.title,
        category: category.unwrap_or(d.form().category),
        image: input.image,
        video_url: input.video_url,
    });
    if category.is_none() {
        d.reject(ValidationError::UnknownCategory(input.category));
        return to_portfolio();
    }
    // The outcome is carried by the dashboard notice.
    let _ = d.add_item().await;
    to_portfolio()
}

/// GET /admin/portfolio/{id}/delete -- confirmation page.
pub async fn confirm_delete(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(id): Path<String>,
) -> WebResult<Response> {
    if !state.is_admin(&headers) {
        return Ok(to_login());
    }
    let item = state.dashboard.find_item(&id).ok_or(WebError::NotFound)?;
    Ok(Html(pages::render_confirm_delete(&state.site_title, STYLESHEET, &item)).into_response())
}

/// POST /admin/portfolio/{id}/delete
pub async fn delete_item(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(id): Path<String>,
) -> Response {
    if !state.is_admin(&headers) {
        return to_login();
    }
    let _ = state.dashboard.delete_item(&id).await;
    to_portfolio()
}

/// POST /admin/upload/{target} -- multipart with a single `file` field.
///
/// The progress indicator follows the request body as it arrives, measured
/// against the declared Content-Length.
pub async fn upload(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(target): Path<String>,
    mut multipart: Multipart,
) -> WebResult<Response> {
    if !state.is_admin(&headers) {
        return Ok(to_login());
    }
    let target = UploadTarget::parse(&target).ok_or(WebError::NotFound)?;
    let d = &state.dashboard;
    let limit = d.max_upload_bytes();
    let declared = headers
        .get(header::CONTENT_LENGTH)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.parse::<u64>().ok())
        .unwrap_or(0);

    loop {
        let field = match multipart.next_field().await {
            Ok(Some(field)) => field,
            Ok(None) => return Err(WebError::BadRequest("Nenhum arquivo recebido.".into())),
            Err(e) if e.status() == StatusCode::PAYLOAD_TOO_LARGE => {
                d.reject_oversize();
                return Ok(to_portfolio());
            }
            Err(e) => return Err(WebError::BadRequest(e.body_text())),
        };
        if field.name() != Some(UPLOAD_FIELD) {
            continue;
        }
        let file_name = field.file_name().unwrap_or("upload").to_string();

        let mut field = field;
        let mut bytes = Vec::new();
        let progress = d.begin_transfer();
        loop {
            match field.chunk().await {
                Ok(Some(chunk)) => {
                    if (bytes.len() + chunk.len()) as u64 > limit {
                        d.reject_oversize();
                        return Ok(to_portfolio());
                    }
                    bytes.extend_from_slice(&chunk);
                    progress.report(bytes.len() as u64, declared);
                }
                Ok(None) => break,
                Err(e) if e.status() == StatusCode::PAYLOAD_TOO_LARGE => {
                    d.reject_oversize();
                    return Ok(to_portfolio());
                }
                Err(e) => {
                    progress.fail();
                    warn!(error = %e, "upload body interrupted");
                    return Err(WebError::BadRequest(e.body_text()));
                }
            }
        }
        let _ = d.upload_received(target, &file_name, bytes).await;
        return Ok(to_portfolio());
    }
}

#[derive(Debug, Serialize)]
pub struct ProgressResponse {
    pub percent: Option<u8>,
}

/// GET /admin/upload/progress
pub async fn upload_progress(State(state): State<AppState>, headers: HeaderMap) -> Response {
    if !state.is_admin(&headers) {
        return StatusCode::UNAUTHORIZED.into_response();
    }
    Json(ProgressResponse {
        percent: state.dashboard.progress().current(),
    })
    .into_response()
}

/// POST /admin/settings -- the whole settings form, keyed by camelCase name.
pub async fn update_settings(
    State(state): State<AppState>,
    headers: HeaderMap,
    Form(fields): Form<HashMap<String, String>>,
) -> Response {
    if !state.is_admin(&headers) {
        return to_login();
    }
    let patch = SettingsPatch::from_lookup(|f: SettingsField| fields.get(f.key()).cloned());
    let _ = state.dashboard.update_settings(patch).await;
    Redirect::to("/admin?tab=settings").into_response()
}
