//! Supabase backend: PostgREST tables, Storage bucket, GoTrue auth and the
//! Realtime websocket for change feeds.
use async_trait::async_trait;
use chrono::{DateTime, Duration as ChronoDuration, Utc};
use reqwest::{header, Client, Method, Request, Response, Url};
use serde::Deserialize;
use serde_json::{json, Map, Value};
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use tracing::{instrument, warn};

use super::auth::AuthState;
use super::progress::counting_stream;
use super::{
    object_path, AuthError, FileUpload, ProgressTracker, Resource, Session, StoragePort,
    StoreError, StoredFile, Subscription,
};
use crate::config::SupabaseBackend;
use crate::model::{Category, NewPortfolioItem, PortfolioItem, SettingsPatch, SETTINGS_ID};

pub mod realtime;

const PROVIDER: &str = "supabase";

#[derive(Clone)]
pub struct SupabaseStore {
    http: Client,
    base_url: Url,
    anon_key: String,
    bucket: String,
    reconnect: Duration,
    auth: Arc<AuthState>,
}

impl fmt::Debug for SupabaseStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SupabaseStore")
            .field("base_url", &self.base_url)
            .field("bucket", &self.bucket)
            .finish_non_exhaustive()
    }
}

#[derive(Debug, Deserialize)]
struct PortfolioRow {
    id: Value,
    title: String,
    category: String,
    image: String,
    #[serde(default)]
    video_url: Option<String>,
    #[serde(default)]
    videourl: Option<String>,
    #[serde(default)]
    created_at: Option<DateTime<Utc>>,
}

impl PortfolioRow {
    fn into_item(self) -> Option<PortfolioItem> {
        let id = match self.id {
            Value::String(s) => s,
            other => other.to_string(),
        };
        let Some(category) = Category::parse(&self.category) else {
            warn!(%id, category = %self.category, "skipping portfolio row with unknown category");
            return None;
        };
        Some(PortfolioItem {
            id,
            title: self.title,
            category,
            image: self.image,
            video_url: self.video_url.or(self.videourl).filter(|u| !u.is_empty()),
            created_at: self.created_at,
        })
    }
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    #[serde(default)]
    refresh_token: Option<String>,
    #[serde(default)]
    expires_in: Option<i64>,
    #[serde(default)]
    user: Option<TokenUser>,
}

#[derive(Debug, Deserialize)]
struct TokenUser {
    #[serde(default)]
    email: Option<String>,
}

/// GoTrue error body. Newer servers send `error_code` (older ones a string
/// `code`), legacy ones `error` + `error_description`.
#[derive(Debug, Default, Deserialize)]
struct GoTrueError {
    #[serde(default)]
    error_code: Option<String>,
    #[serde(default)]
    code: Option<Value>,
    #[serde(default)]
    error_description: Option<String>,
    #[serde(default)]
    msg: Option<String>,
}

const INVALID_CREDENTIALS_CODE: &str = "invalid_credentials";
const INVALID_CREDENTIALS_MSG: &str = "Invalid login credentials";

/// Only a wrong email/password pair counts. `invalid_grant` alone also
/// covers unconfirmed e-mail and similar account states.
fn is_invalid_credentials(status: u16, body: &str) -> bool {
    if status != 400 && status != 401 {
        return false;
    }
    let Ok(err) = serde_json::from_str::<GoTrueError>(body) else {
        return false;
    };
    let code = err
        .error_code
        .as_deref()
        .or_else(|| err.code.as_ref().and_then(|c| c.as_str()));
    if let Some(code) = code {
        return code == INVALID_CREDENTIALS_CODE;
    }
    err.error_description
        .as_deref()
        .or(err.msg.as_deref())
        .is_some_and(|m| m == INVALID_CREDENTIALS_MSG)
}

impl SupabaseStore {
    pub fn from_config(cfg: &SupabaseBackend) -> Result<Self, StoreError> {
        let base_url = Url::parse(&cfg.url)
            .map_err(|e| StoreError::Decode(format!("invalid supabase url: {e}")))?;
        Ok(Self::with_base_url(
            base_url,
            cfg.anon_key.clone(),
            cfg.bucket.clone(),
            Duration::from_secs(cfg.reconnect_secs),
        ))
    }

    pub fn with_base_url(
        mut base_url: Url,
        anon_key: String,
        bucket: String,
        reconnect: Duration,
    ) -> Self {
        if !base_url.path().ends_with('/') {
            let path = format!("{}/", base_url.path());
            base_url.set_path(&path);
        }
        let http = Client::builder()
            .user_agent("aerial-site/0.1")
            .no_proxy()
            .build()
            .expect("reqwest client");
        Self {
            http,
            base_url,
            anon_key,
            bucket,
            reconnect,
            auth: AuthState::new(),
        }
    }

    fn endpoint(&self, path: &str) -> Result<Url, StoreError> {
        self.base_url
            .join(path)
            .map_err(|e| StoreError::Decode(format!("invalid endpoint {path}: {e}")))
    }

    fn request(&self, method: Method, path: &str) -> Result<reqwest::RequestBuilder, StoreError> {
        Ok(self
            .http
            .request(method, self.endpoint(path)?)
            .header("apikey", &self.anon_key)
            .header(
                header::AUTHORIZATION,
                format!("Bearer {}", self.auth.bearer(&self.anon_key)),
            ))
    }

    pub fn build_select_portfolio(&self) -> Result<Request, StoreError> {
        Ok(self
            .request(Method::GET, "rest/v1/portfolio")?
            .query(&[("select", "*"), ("order", "created_at.desc")])
            .build()?)
    }

    pub fn build_select_settings(&self) -> Result<Request, StoreError> {
        let filter = format!("eq.{SETTINGS_ID}");
        Ok(self
            .request(Method::GET, "rest/v1/settings")?
            .query(&[("select", "*"), ("id", filter.as_str())])
            .build()?)
    }

    pub fn build_insert(&self, item: &NewPortfolioItem) -> Result<Request, StoreError> {
        let body = json!({
            "title": item.title,
            "category": item.category.as_str(),
            "image": item.image,
            "video_url": item.video_url.as_deref().filter(|u| !u.is_empty()),
        });
        Ok(self
            .request(Method::POST, "rest/v1/portfolio")?
            .header("Prefer", "return=representation")
            .json(&body)
            .build()?)
    }

    pub fn build_upsert_settings(&self, patch: &SettingsPatch) -> Result<Request, StoreError> {
        let mut row = Map::new();
        row.insert("id".into(), Value::String(SETTINGS_ID.into()));
        for (field, value) in patch.iter() {
            row.insert(field.column().into(), Value::String(value.into()));
        }
        Ok(self
            .request(Method::POST, "rest/v1/settings")?
            .query(&[("on_conflict", "id")])
            .header("Prefer", "resolution=merge-duplicates,return=minimal")
            .json(&Value::Array(vec![Value::Object(row)]))
            .build()?)
    }

    pub fn build_delete(&self, id: &str) -> Result<Request, StoreError> {
        Ok(self
            .request(Method::DELETE, "rest/v1/portfolio")?
            .query(&[("id", &format!("eq.{id}"))])
            .build()?)
    }

    pub fn build_sign_in(&self, email: &str, password: &str) -> Result<Request, StoreError> {
        Ok(self
            .http
            .post(self.endpoint("auth/v1/token")?)
            .query(&[("grant_type", "password")])
            .header("apikey", &self.anon_key)
            .json(&json!({ "email": email, "password": password }))
            .build()?)
    }

    fn public_prefix(&self) -> String {
        format!(
            "{}storage/v1/object/public/{}/",
            self.base_url, self.bucket
        )
    }

    pub fn public_url(&self, path: &str) -> String {
        format!("{}{}", self.public_prefix(), path)
    }

    async fn send(&self, request: Request) -> Result<Response, StoreError> {
        let res = self.http.execute(request).await?;
        let status = res.status();
        if !status.is_success() {
            let body = res.text().await.unwrap_or_default();
            return Err(StoreError::Remote {
                provider: PROVIDER,
                status: status.as_u16(),
                body,
            });
        }
        Ok(res)
    }

    fn spawn_feed(&self, resource: Resource) -> Result<Subscription, StoreError> {
        let table = match resource {
            Resource::Portfolio => "portfolio",
            Resource::Settings => "settings",
            Resource::Auth => return Ok(self.auth.subscribe()),
        };
        let url = realtime::websocket_url(&self.base_url, &self.anon_key)?;
        let (notifier, sub) = Subscription::channel(resource);
        let channel = realtime::Channel {
            url,
            table,
            anon_key: self.anon_key.clone(),
            auth: self.auth.clone(),
            reconnect: self.reconnect,
        };
        tokio::spawn(channel.run(notifier));
        Ok(sub)
    }
}

#[async_trait]
impl StoragePort for SupabaseStore {
    fn provider(&self) -> &'static str {
        PROVIDER
    }

    #[instrument(skip_all)]
    async fn read_portfolio(&self) -> Result<Vec<PortfolioItem>, StoreError> {
        let rows: Vec<PortfolioRow> = self
            .send(self.build_select_portfolio()?)
            .await?
            .json()
            .await?;
        Ok(rows.into_iter().filter_map(PortfolioRow::into_item).collect())
    }

    #[instrument(skip_all)]
    async fn read_settings(&self) -> Result<Option<SettingsPatch>, StoreError> {
        let rows: Vec<Map<String, Value>> = self
            .send(self.build_select_settings()?)
            .await?
            .json()
            .await?;
        Ok(rows.into_iter().next().map(|row| {
            SettingsPatch::from_lookup(|f| {
                row.get(f.column())
                    .or_else(|| row.get(f.key()))
                    .and_then(Value::as_str)
                    .map(str::to_string)
            })
        }))
    }

    async fn subscribe(&self, resource: Resource) -> Result<Subscription, StoreError> {
        self.spawn_feed(resource)
    }

    #[instrument(skip_all, fields(title = %item.title))]
    async fn insert_item(&self, item: &NewPortfolioItem) -> Result<String, StoreError> {
        let rows: Vec<PortfolioRow> = self.send(self.build_insert(item)?).await?.json().await?;
        let row = rows
            .into_iter()
            .next()
            .ok_or_else(|| StoreError::Decode("insert returned no row".into()))?;
        Ok(match row.id {
            Value::String(s) => s,
            other => other.to_string(),
        })
    }

    #[instrument(skip_all, fields(fields = patch.len()))]
    async fn upsert_settings(&self, patch: &SettingsPatch) -> Result<(), StoreError> {
        self.send(self.build_upsert_settings(patch)?).await?;
        Ok(())
    }

    #[instrument(skip_all, fields(%id))]
    async fn delete_item(&self, id: &str) -> Result<(), StoreError> {
        self.send(self.build_delete(id)?).await?;
        Ok(())
    }

    #[instrument(skip_all, fields(file = %upload.file_name, len = upload.len()))]
    async fn upload_file(
        &self,
        upload: FileUpload,
        progress: &ProgressTracker,
    ) -> Result<StoredFile, StoreError> {
        let path = object_path(upload.folder, &upload.file_name);
        let total = upload.len();
        let body = reqwest::Body::wrap_stream(counting_stream(upload.bytes, progress.clone()));
        let request = self
            .request(
                Method::POST,
                &format!("storage/v1/object/{}/{}", self.bucket, path),
            )?
            .header(header::CONTENT_TYPE, &upload.content_type)
            .header(header::CONTENT_LENGTH, total)
            .header("x-upsert", "false")
            .header("cache-control", "max-age=3600")
            .body(body)
            .build()?;
        self.send(request).await?;
        Ok(StoredFile {
            public_url: self.public_url(&path),
            path,
        })
    }

    #[instrument(skip_all, fields(count = paths.len()))]
    async fn remove_files(&self, paths: &[String]) -> Result<(), StoreError> {
        if paths.is_empty() {
            return Ok(());
        }
        let request = self
            .request(Method::DELETE, &format!("storage/v1/object/{}", self.bucket))?
            .json(&json!({ "prefixes": paths }))
            .build()?;
        self.send(request).await?;
        Ok(())
    }

    fn storage_path(&self, public_url: &str) -> Option<String> {
        let rest = public_url.strip_prefix(&self.public_prefix())?;
        let rest = rest.split(['?', '#']).next().unwrap_or(rest);
        urlencoding::decode(rest).ok().map(|p| p.into_owned())
    }

    #[instrument(skip_all)]
    async fn sign_in(&self, email: &str, password: &str) -> Result<(), AuthError> {
        let res = self
            .http
            .execute(self.build_sign_in(email, password)?)
            .await
            .map_err(StoreError::from)?;
        let status = res.status();
        if !status.is_success() {
            let body = res.text().await.unwrap_or_default();
            if is_invalid_credentials(status.as_u16(), &body) {
                return Err(AuthError::InvalidCredentials);
            }
            return Err(StoreError::Remote {
                provider: PROVIDER,
                status: status.as_u16(),
                body,
            }
            .into());
        }
        let token: TokenResponse = res.json().await.map_err(StoreError::from)?;
        self.auth.set(Some(Session {
            access_token: token.access_token,
            refresh_token: token.refresh_token,
            email: token
                .user
                .and_then(|u| u.email)
                .unwrap_or_else(|| email.trim().to_string()),
            expires_at: token
                .expires_in
                .map(|secs| Utc::now() + ChronoDuration::seconds(secs)),
        }));
        Ok(())
    }

    #[instrument(skip_all)]
    async fn sign_out(&self) -> Result<(), StoreError> {
        let result = match self.request(Method::POST, "auth/v1/logout") {
            Ok(builder) if self.auth.is_present() => match builder.build() {
                Ok(req) => self.send(req).await.map(|_| ()),
                Err(e) => Err(e.into()),
            },
            Ok(_) => Ok(()),
            Err(e) => Err(e),
        };
        // The local session goes away even if the server call failed.
        self.auth.clear();
        if let Err(e) = &result {
            warn!(error = %e, "remote sign-out failed");
        }
        result
    }

    fn session_present(&self) -> bool {
        self.auth.is_present()
    }
}
