//! Firebase backend: Firestore REST documents, Cloud Storage objects and the
//! Identity Toolkit password sign-in. The REST surface has no push channel,
//! so change feeds poll and signal when a snapshot differs from the last one.
use async_trait::async_trait;
use chrono::{Duration as ChronoDuration, Utc};
use reqwest::{header, Client, Method, Request, Response, StatusCode};
use serde::Deserialize;
use serde_json::{json, Map, Value};
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, instrument, warn};

use super::auth::AuthState;
use super::progress::counting_stream;
use super::{
    object_path, AuthError, ChangeNotifier, FileUpload, ProgressTracker, Resource, Session,
    StoragePort, StoreError, StoredFile, Subscription,
};
use crate::config::FirebaseBackend;
use crate::model::{Category, NewPortfolioItem, PortfolioItem, SettingsPatch, SETTINGS_ID};

pub mod value;

use value::{Document, QueryResult};

const PROVIDER: &str = "firebase";

/// Service roots; overridable so tests and emulators can point elsewhere.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Endpoints {
    pub firestore: String,
    pub identity: String,
    pub storage: String,
}

impl Default for Endpoints {
    fn default() -> Self {
        Self {
            firestore: "https://firestore.googleapis.com/v1".into(),
            identity: "https://identitytoolkit.googleapis.com/v1".into(),
            storage: "https://firebasestorage.googleapis.com/v0".into(),
        }
    }
}

#[derive(Clone)]
pub struct FirebaseStore {
    http: Client,
    endpoints: Endpoints,
    project_id: String,
    api_key: String,
    bucket: String,
    poll_every: Duration,
    auth: Arc<AuthState>,
}

impl fmt::Debug for FirebaseStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FirebaseStore")
            .field("project_id", &self.project_id)
            .field("bucket", &self.bucket)
            .finish_non_exhaustive()
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SignInResponse {
    id_token: String,
    #[serde(default)]
    refresh_token: Option<String>,
    #[serde(default)]
    expires_in: Option<String>,
    #[serde(default)]
    email: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct UploadResponse {
    name: String,
    #[serde(default)]
    download_tokens: Option<String>,
}

fn is_invalid_credentials(body: &str) -> bool {
    let message = serde_json::from_str::<Value>(body)
        .ok()
        .and_then(|v| v["error"]["message"].as_str().map(str::to_string))
        .unwrap_or_default();
    ["INVALID_LOGIN_CREDENTIALS", "INVALID_PASSWORD", "EMAIL_NOT_FOUND"]
        .iter()
        .any(|code| message.starts_with(code))
}

fn item_from_document(doc: &Document) -> Option<PortfolioItem> {
    let id = doc.id().to_string();
    let raw_category = doc.string("category").unwrap_or_default();
    let Some(category) = Category::parse(&raw_category) else {
        warn!(%id, category = %raw_category, "skipping portfolio document with unknown category");
        return None;
    };
    Some(PortfolioItem {
        title: doc.string("title").unwrap_or_default(),
        category,
        image: doc.string("image").unwrap_or_default(),
        video_url: doc
            .string("videoUrl")
            .or_else(|| doc.string("video_url"))
            .filter(|u| !u.is_empty()),
        created_at: doc.timestamp("createdAt").or(doc.create_time),
        id,
    })
}

fn settings_from_document(doc: &Document) -> SettingsPatch {
    SettingsPatch::from_lookup(|f| doc.string(f.key()).or_else(|| doc.string(f.column())))
}

impl FirebaseStore {
    pub fn from_config(cfg: &FirebaseBackend) -> Self {
        Self::with_endpoints(
            Endpoints::default(),
            cfg.project_id.clone(),
            cfg.api_key.clone(),
            cfg.storage_bucket.clone(),
            Duration::from_millis(cfg.poll_interval_ms),
        )
    }

    pub fn with_endpoints(
        endpoints: Endpoints,
        project_id: String,
        api_key: String,
        bucket: String,
        poll_every: Duration,
    ) -> Self {
        let http = Client::builder()
            .user_agent("aerial-site/0.1")
            .no_proxy()
            .build()
            .expect("reqwest client");
        Self {
            http,
            endpoints,
            project_id,
            api_key,
            bucket,
            poll_every,
            auth: AuthState::new(),
        }
    }

    fn database(&self) -> String {
        format!("projects/{}/databases/(default)", self.project_id)
    }

    fn document_name(&self, path: &str) -> String {
        format!("{}/documents/{}", self.database(), path)
    }

    fn firestore(&self, method: Method, suffix: &str) -> reqwest::RequestBuilder {
        let url = format!("{}/{}/documents{}", self.endpoints.firestore, self.database(), suffix);
        let builder = self
            .http
            .request(method, url)
            .query(&[("key", self.api_key.as_str())]);
        self.authorize(builder)
    }

    fn authorize(&self, builder: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match self.auth.token() {
            Ok(token) => builder.header(header::AUTHORIZATION, format!("Bearer {token}")),
            Err(_) => builder,
        }
    }

    fn object_root(&self) -> String {
        format!("{}/b/{}/o", self.endpoints.storage, self.bucket)
    }

    pub fn build_run_query(&self) -> Result<Request, StoreError> {
        let body = json!({
            "structuredQuery": {
                "from": [{ "collectionId": "portfolio" }],
                "orderBy": [{
                    "field": { "fieldPath": "createdAt" },
                    "direction": "DESCENDING"
                }]
            }
        });
        Ok(self.firestore(Method::POST, ":runQuery").json(&body).build()?)
    }

    pub fn build_get_settings(&self) -> Result<Request, StoreError> {
        Ok(self
            .firestore(Method::GET, &format!("/settings/{SETTINGS_ID}"))
            .build()?)
    }

    pub fn build_insert(&self, id: &str, item: &NewPortfolioItem) -> Result<Request, StoreError> {
        let mut fields = Map::new();
        fields.insert("title".into(), value::string(&item.title));
        fields.insert("category".into(), value::string(item.category.as_str()));
        fields.insert("image".into(), value::string(&item.image));
        fields.insert(
            "videoUrl".into(),
            value::string(item.video_url.as_deref().unwrap_or("")),
        );
        let write = json!({
            "update": {
                "name": self.document_name(&format!("portfolio/{id}")),
                "fields": fields
            },
            "currentDocument": { "exists": false },
            "updateTransforms": [
                { "fieldPath": "createdAt", "setToServerValue": "REQUEST_TIME" }
            ]
        });
        Ok(self
            .firestore(Method::POST, ":commit")
            .json(&json!({ "writes": [write] }))
            .build()?)
    }

    pub fn build_merge_settings(&self, patch: &SettingsPatch) -> Result<Request, StoreError> {
        let mut fields = Map::new();
        let mut mask = Vec::with_capacity(patch.len());
        for (field, v) in patch.iter() {
            fields.insert(field.key().into(), value::string(v));
            mask.push(field.key());
        }
        let write = json!({
            "update": {
                "name": self.document_name(&format!("settings/{SETTINGS_ID}")),
                "fields": fields
            },
            "updateMask": { "fieldPaths": mask },
            "updateTransforms": [
                { "fieldPath": "updatedAt", "setToServerValue": "REQUEST_TIME" }
            ]
        });
        Ok(self
            .firestore(Method::POST, ":commit")
            .json(&json!({ "writes": [write] }))
            .build()?)
    }

    pub fn build_delete(&self, id: &str) -> Result<Request, StoreError> {
        Ok(self
            .firestore(Method::DELETE, &format!("/portfolio/{id}"))
            .build()?)
    }

    pub fn build_sign_in(&self, email: &str, password: &str) -> Result<Request, StoreError> {
        Ok(self
            .http
            .post(format!(
                "{}/accounts:signInWithPassword",
                self.endpoints.identity
            ))
            .query(&[("key", self.api_key.as_str())])
            .json(&json!({
                "email": email,
                "password": password,
                "returnSecureToken": true
            }))
            .build()?)
    }

    pub fn public_url(&self, path: &str, token: Option<&str>) -> String {
        let mut url = format!(
            "{}/{}?alt=media",
            self.object_root(),
            urlencoding::encode(path)
        );
        if let Some(token) = token {
            url.push_str("&token=");
            url.push_str(token);
        }
        url
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

    /// Snapshot used to detect changes between polls.
    async fn fingerprint(&self, resource: Resource) -> Result<String, StoreError> {
        Ok(match resource {
            Resource::Portfolio => serde_json::to_string(&self.read_portfolio().await?)?,
            Resource::Settings => format!("{:?}", self.read_settings().await?),
            Resource::Auth => String::new(),
        })
    }

    async fn poll(self, resource: Resource, notifier: ChangeNotifier) {
        let mut last: Option<String> = None;
        let mut ticker = tokio::time::interval(self.poll_every);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        loop {
            tokio::select! {
                _ = notifier.released() => {
                    debug!(resource = resource.as_str(), "poller released");
                    return;
                }
                _ = ticker.tick() => {}
            }
            match self.fingerprint(resource).await {
                Ok(current) => {
                    if last.as_ref().is_some_and(|prev| *prev != current) {
                        notifier.notify();
                    }
                    last = Some(current);
                }
                Err(e) => warn!(resource = resource.as_str(), error = %e, "poll failed"),
            }
        }
    }
}

#[async_trait]
impl StoragePort for FirebaseStore {
    fn provider(&self) -> &'static str {
        PROVIDER
    }

    #[instrument(skip_all)]
    async fn read_portfolio(&self) -> Result<Vec<PortfolioItem>, StoreError> {
        let results: Vec<QueryResult> = self.send(self.build_run_query()?).await?.json().await?;
        Ok(results
            .iter()
            .filter_map(|r| r.document.as_ref())
            .filter_map(item_from_document)
            .collect())
    }

    #[instrument(skip_all)]
    async fn read_settings(&self) -> Result<Option<SettingsPatch>, StoreError> {
        let res = self.http.execute(self.build_get_settings()?).await?;
        if res.status() == StatusCode::NOT_FOUND {
            return Ok(None);
        }
        let status = res.status();
        if !status.is_success() {
            let body = res.text().await.unwrap_or_default();
            return Err(StoreError::Remote {
                provider: PROVIDER,
                status: status.as_u16(),
                body,
            });
        }
        let doc: Document = res.json().await?;
        Ok(Some(settings_from_document(&doc)))
    }

    async fn subscribe(&self, resource: Resource) -> Result<Subscription, StoreError> {
        if resource == Resource::Auth {
            return Ok(self.auth.subscribe());
        }
        let (notifier, sub) = Subscription::channel(resource);
        tokio::spawn(self.clone().poll(resource, notifier));
        Ok(sub)
    }

    #[instrument(skip_all, fields(title = %item.title))]
    async fn insert_item(&self, item: &NewPortfolioItem) -> Result<String, StoreError> {
        let id = uuid::Uuid::new_v4().simple().to_string();
        self.send(self.build_insert(&id, item)?).await?;
        Ok(id)
    }

    #[instrument(skip_all, fields(fields = patch.len()))]
    async fn upsert_settings(&self, patch: &SettingsPatch) -> Result<(), StoreError> {
        self.send(self.build_merge_settings(patch)?).await?;
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
            .authorize(self.http.post(self.object_root()))
            .query(&[("uploadType", "media"), ("name", path.as_str())])
            .header(header::CONTENT_TYPE, &upload.content_type)
            .header(header::CONTENT_LENGTH, total)
            .body(body)
            .build()?;
        let stored: UploadResponse = self.send(request).await?.json().await?;
        let token = stored
            .download_tokens
            .as_deref()
            .and_then(|t| t.split(',').next());
        Ok(StoredFile {
            public_url: self.public_url(&stored.name, token),
            path: stored.name,
        })
    }

    #[instrument(skip_all, fields(count = paths.len()))]
    async fn remove_files(&self, paths: &[String]) -> Result<(), StoreError> {
        for path in paths {
            let url = format!("{}/{}", self.object_root(), urlencoding::encode(path));
            let request = self.authorize(self.http.delete(url)).build()?;
            let res = self.http.execute(request).await?;
            let status = res.status();
            if status == StatusCode::NOT_FOUND {
                continue;
            }
            if !status.is_success() {
                let body = res.text().await.unwrap_or_default();
                return Err(StoreError::Remote {
                    provider: PROVIDER,
                    status: status.as_u16(),
                    body,
                });
            }
        }
        Ok(())
    }

    fn storage_path(&self, public_url: &str) -> Option<String> {
        let prefix = format!("{}/", self.object_root());
        let rest = public_url.strip_prefix(&prefix)?;
        let encoded = rest.split('?').next().unwrap_or(rest);
        urlencoding::decode(encoded).ok().map(|p| p.into_owned())
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
            if is_invalid_credentials(&body) {
                return Err(AuthError::InvalidCredentials);
            }
            return Err(StoreError::Remote {
                provider: PROVIDER,
                status: status.as_u16(),
                body,
            }
            .into());
        }
        let signed: SignInResponse = res.json().await.map_err(StoreError::from)?;
        let expires_at = signed
            .expires_in
            .as_deref()
            .and_then(|s| s.parse::<i64>().ok())
            .map(|secs| Utc::now() + ChronoDuration::seconds(secs));
        self.auth.set(Some(Session {
            access_token: signed.id_token,
            refresh_token: signed.refresh_token,
            email: signed.email.unwrap_or_else(|| email.trim().to_string()),
            expires_at,
        }));
        Ok(())
    }

    /// ID tokens are stateless; dropping the local copy is the whole sign-out.
    async fn sign_out(&self) -> Result<(), StoreError> {
        self.auth.clear();
        Ok(())
    }

    fn session_present(&self) -> bool {
        self.auth.is_present()
    }
}
