//! Admin dashboard operations.
//!
//! Each operation is a single attempt against the storage port. Failures
//! become a user-facing [`Notice`]; nothing is retried. The displayed data
//! changes only when the sync layer echoes the write back.
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;
use thiserror::Error;
use tokio::task::JoinHandle;
use tracing::{info, instrument, warn};

use crate::gallery::{self, GalleryTab};
use crate::model::{Category, NewPortfolioItem, PortfolioItem, SettingsField, SettingsPatch};
use crate::store::{AuthError, FileUpload, MediaFolder, ProgressTracker, StoragePort, StoredFile};
use crate::sync::{self, SiteMirror};

pub const MSG_ITEM_ADDED: &str = "Trabalho adicionado com sucesso!";
pub const MSG_ITEM_SAVE_FAILED: &str = "Erro ao salvar no banco de dados.";
pub const MSG_DELETE_FAILED: &str = "Erro ao excluir item.";
pub const MSG_SETTINGS_SAVED: &str = "Configurações atualizadas com sucesso!";
pub const MSG_SETTINGS_FAILED: &str = "Erro ao salvar configurações.";
pub const MSG_BAD_CREDENTIALS: &str = "E-mail ou senha incorretos.";
pub const MSG_SIGN_IN_FAILED: &str = "Ocorreu um erro ao tentar entrar. Tente novamente.";
pub const MSG_UPLOAD_DONE: &str = "Upload concluído!";
pub const MSG_UPLOAD_FAILED: &str = "Erro ao enviar arquivo. Tente novamente.";
pub const CONFIRM_DELETE: &str = "Tem certeza que deseja excluir este item permanentemente?";
pub const EMPTY_LIST: &str = "Nenhum item encontrado";

/// Settings fields that may be left blank.
const OPTIONAL_SETTINGS: [SettingsField; 2] = [SettingsField::InstagramUrl, SettingsField::FacebookUrl];

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("O campo \"{0}\" é obrigatório.")]
    Missing(&'static str),
    #[error("Categoria inválida: \"{0}\".")]
    UnknownCategory(String),
    #[error("O arquivo excede o limite de {limit_mb} MB.")]
    TooLarge { limit_mb: u64 },
    #[error("O arquivo está vazio.")]
    EmptyFile,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NoticeLevel {
    Success,
    Error,
}

/// A message shown once to the operator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notice {
    pub level: NoticeLevel,
    pub message: String,
}

impl Notice {
    pub fn success(message: impl Into<String>) -> Self {
        Self {
            level: NoticeLevel::Success,
            message: message.into(),
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self {
            level: NoticeLevel::Error,
            message: message.into(),
        }
    }

    pub fn is_error(&self) -> bool {
        self.level == NoticeLevel::Error
    }
}

impl From<ValidationError> for Notice {
    fn from(e: ValidationError) -> Self {
        Notice::error(e.to_string())
    }
}

/// The "add work" form. Category starts at Casamento.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PortfolioForm {
    pub title: String,
    pub category: Category,
    pub image: String,
    pub video_url: String,
}

impl PortfolioForm {
    fn validate(&self) -> Result<NewPortfolioItem, ValidationError> {
        if self.title.trim().is_empty() {
            return Err(ValidationError::Missing("Título"));
        }
        if self.image.trim().is_empty() {
            return Err(ValidationError::Missing("URL da Imagem"));
        }
        let video = self.video_url.trim();
        Ok(NewPortfolioItem {
            title: self.title.trim().to_string(),
            category: self.category,
            image: self.image.trim().to_string(),
            video_url: (!video.is_empty()).then(|| video.to_string()),
        })
    }
}

/// Which form field an upload fills.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UploadTarget {
    Image,
    Video,
}

impl UploadTarget {
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "image" | "imagem" => Some(UploadTarget::Image),
            "video" => Some(UploadTarget::Video),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            UploadTarget::Image => "image",
            UploadTarget::Video => "video",
        }
    }

    fn folder(&self) -> MediaFolder {
        match self {
            UploadTarget::Image => MediaFolder::Images,
            UploadTarget::Video => MediaFolder::Videos,
        }
    }
}

struct BusyGuard<'a>(&'a AtomicBool);

impl<'a> BusyGuard<'a> {
    fn hold(flag: &'a AtomicBool) -> Self {
        flag.store(true, Ordering::SeqCst);
        Self(flag)
    }
}

impl Drop for BusyGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::SeqCst);
    }
}

pub struct AdminDashboard {
    store: Arc<dyn StoragePort>,
    mirror: SiteMirror,
    form: Mutex<PortfolioForm>,
    notice: Mutex<Option<Notice>>,
    progress: ProgressTracker,
    max_upload_bytes: u64,
    busy: AtomicBool,
}

impl std::fmt::Debug for AdminDashboard {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AdminDashboard")
            .field("provider", &self.store.provider())
            .field("max_upload_bytes", &self.max_upload_bytes)
            .finish_non_exhaustive()
    }
}

fn lock<T>(m: &Mutex<T>) -> MutexGuard<'_, T> {
    m.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

impl AdminDashboard {
    pub fn new(
        store: Arc<dyn StoragePort>,
        mirror: SiteMirror,
        max_upload_bytes: u64,
        progress_clear_after: Duration,
    ) -> Self {
        Self {
            store,
            mirror,
            form: Mutex::new(PortfolioForm::default()),
            notice: Mutex::new(None),
            progress: ProgressTracker::new(progress_clear_after),
            max_upload_bytes,
            busy: AtomicBool::new(false),
        }
    }

    pub fn mirror(&self) -> &SiteMirror {
        &self.mirror
    }

    pub fn provider(&self) -> &'static str {
        self.store.provider()
    }

    /// Mirrored item by id.
    pub fn find_item(&self, id: &str) -> Option<PortfolioItem> {
        self.mirror.portfolio().into_iter().find(|item| item.id == id)
    }

    pub fn progress(&self) -> &ProgressTracker {
        &self.progress
    }

    pub fn max_upload_bytes(&self) -> u64 {
        self.max_upload_bytes
    }

    pub fn is_busy(&self) -> bool {
        self.busy.load(Ordering::SeqCst)
    }

    pub fn form(&self) -> PortfolioForm {
        lock(&self.form).clone()
    }

    pub fn set_form(&self, form: PortfolioForm) {
        *lock(&self.form) = form;
    }

    /// Current notice, left in place.
    pub fn notice(&self) -> Option<Notice> {
        lock(&self.notice).clone()
    }

    /// Current notice, cleared after reading.
    pub fn take_notice(&self) -> Option<Notice> {
        lock(&self.notice).take()
    }

    fn announce(&self, notice: Notice) -> Notice {
        *lock(&self.notice) = Some(notice.clone());
        notice
    }

    /// Items for the dashboard sub-tab.
    pub fn items(&self, tab: GalleryTab) -> Vec<PortfolioItem> {
        let all = self.mirror.portfolio();
        gallery::visible(&all, tab).into_iter().cloned().collect()
    }

    /// Insert the current form as a new portfolio item. On success title,
    /// image and video are cleared; category is kept. On failure the form is
    /// left as it was.
    #[instrument(skip_all)]
    pub async fn add_item(&self) -> Result<String, Notice> {
        let item = match self.form().validate() {
            Ok(item) => item,
            Err(e) => return Err(self.announce(e.into())),
        };
        let _busy = BusyGuard::hold(&self.busy);
        match self.store.insert_item(&item).await {
            Ok(id) => {
                info!(%id, title = %item.title, "portfolio item added");
                {
                    let mut form = lock(&self.form);
                    form.title.clear();
                    form.image.clear();
                    form.video_url.clear();
                }
                self.announce(Notice::success(MSG_ITEM_ADDED));
                Ok(id)
            }
            Err(e) => {
                warn!(error = %e, "failed to add portfolio item");
                Err(self.announce(Notice::error(MSG_ITEM_SAVE_FAILED)))
            }
        }
    }

    /// Delete a record, then remove its uploaded files in the background.
    /// The caller is responsible for confirming first. The returned handle
    /// finishes with the file cleanup; short-lived callers await it.
    #[instrument(skip_all, fields(%id))]
    pub async fn delete_item(&self, id: &str) -> Result<Option<JoinHandle<()>>, Notice> {
        let owned: Vec<String> = self
            .mirror
            .portfolio()
            .iter()
            .filter(|item| item.id == id)
            .flat_map(|item| item.media_urls().filter_map(|u| self.store.storage_path(u)).collect::<Vec<_>>())
            .collect();

        if let Err(e) = self.store.delete_item(id).await {
            warn!(error = %e, "failed to delete portfolio item");
            return Err(self.announce(Notice::error(MSG_DELETE_FAILED)));
        }
        info!("portfolio item deleted");

        if owned.is_empty() {
            return Ok(None);
        }
        let store = self.store.clone();
        Ok(Some(tokio::spawn(async move {
            if let Err(e) = store.remove_files(&owned).await {
                warn!(error = %e, files = owned.len(), "uploaded file cleanup failed");
            }
        })))
    }

    /// Show a validation error from input parsed outside the dashboard.
    pub fn reject(&self, e: ValidationError) -> Notice {
        self.announce(e.into())
    }

    /// Notice for a file over the ceiling. The progress indicator resets;
    /// nothing else changes.
    pub fn reject_oversize(&self) -> Notice {
        self.progress.fail();
        self.reject(ValidationError::TooLarge {
            limit_mb: self.max_upload_bytes / (1024 * 1024),
        })
    }

    /// Start the progress indicator for a file that is still arriving. The
    /// receiver reports through [`progress`](Self::progress) and then hands
    /// the bytes to [`upload_received`](Self::upload_received).
    pub fn begin_transfer(&self) -> &ProgressTracker {
        self.progress.start();
        &self.progress
    }

    /// Upload one file and write its public URL into the matching form field.
    pub async fn upload(
        &self,
        target: UploadTarget,
        file_name: &str,
        bytes: Vec<u8>,
    ) -> Result<StoredFile, Notice> {
        self.progress.start();
        self.upload_received(target, file_name, bytes).await
    }

    /// Store a file whose transfer already drove the progress indicator.
    #[instrument(skip_all, fields(target = target.as_str(), file = %file_name))]
    pub async fn upload_received(
        &self,
        target: UploadTarget,
        file_name: &str,
        bytes: Vec<u8>,
    ) -> Result<StoredFile, Notice> {
        if bytes.len() as u64 > self.max_upload_bytes {
            return Err(self.reject_oversize());
        }
        if bytes.is_empty() {
            self.progress.fail();
            return Err(self.reject(ValidationError::EmptyFile));
        }

        let upload = FileUpload::new(target.folder(), file_name, bytes);
        match self.store.upload_file(upload, &self.progress).await {
            Ok(stored) => {
                self.progress.finish();
                {
                    let mut form = lock(&self.form);
                    match target {
                        UploadTarget::Image => form.image = stored.public_url.clone(),
                        UploadTarget::Video => form.video_url = stored.public_url.clone(),
                    }
                }
                info!(path = %stored.path, "upload stored");
                self.announce(Notice::success(MSG_UPLOAD_DONE));
                Ok(stored)
            }
            Err(e) => {
                self.progress.fail();
                warn!(error = %e, "upload failed");
                Err(self.announce(Notice::error(MSG_UPLOAD_FAILED)))
            }
        }
    }

    /// Merge-write the whole settings form.
    #[instrument(skip_all)]
    pub async fn update_settings(&self, patch: SettingsPatch) -> Result<(), Notice> {
        for field in SettingsField::ALL {
            if OPTIONAL_SETTINGS.contains(&field) {
                continue;
            }
            if patch.get(field).map_or(true, |v| v.trim().is_empty()) {
                return Err(self.announce(ValidationError::Missing(field.label()).into()));
            }
        }
        let _busy = BusyGuard::hold(&self.busy);
        match self.store.upsert_settings(&patch).await {
            Ok(()) => {
                info!(fields = patch.len(), "settings updated");
                self.announce(Notice::success(MSG_SETTINGS_SAVED));
                Ok(())
            }
            Err(e) => {
                warn!(error = %e, "failed to update settings");
                Err(self.announce(Notice::error(MSG_SETTINGS_FAILED)))
            }
        }
    }

    /// Sign in. The error notice is returned for the login form and not kept
    /// as a dashboard notice.
    #[instrument(skip_all)]
    pub async fn sign_in(&self, email: &str, password: &str) -> Result<(), Notice> {
        if email.trim().is_empty() {
            return Err(ValidationError::Missing("E-mail").into());
        }
        if password.is_empty() {
            return Err(ValidationError::Missing("Senha").into());
        }
        let result = self.store.sign_in(email, password).await;
        sync::refresh_auth(self.store.as_ref(), &self.mirror);
        match result {
            Ok(()) => {
                info!("admin signed in");
                Ok(())
            }
            Err(AuthError::InvalidCredentials) => Err(Notice::error(MSG_BAD_CREDENTIALS)),
            Err(AuthError::Store(e)) => {
                warn!(error = %e, "sign-in failed");
                Err(Notice::error(MSG_SIGN_IN_FAILED))
            }
        }
    }

    #[instrument(skip_all)]
    pub async fn sign_out(&self) {
        if let Err(e) = self.store.sign_out().await {
            warn!(error = %e, "sign-out reported an error");
        }
        sync::refresh_auth(self.store.as_ref(), &self.mirror);
        self.take_notice();
        info!("admin signed out");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn form_requires_title_and_image() {
        let mut form = PortfolioForm::default();
        assert_eq!(form.category, Category::Casamento);
        assert_eq!(form.validate(), Err(ValidationError::Missing("Título")));
        form.title = "Aniversário".into();
        assert_eq!(form.validate(), Err(ValidationError::Missing("URL da Imagem")));
        form.image = " https://cdn/a.jpg ".into();
        form.video_url = "   ".into();
        let item = form.validate().unwrap();
        assert_eq!(item.image, "https://cdn/a.jpg");
        assert_eq!(item.video_url, None);
    }

    #[test]
    fn oversize_message_names_the_limit() {
        let n: Notice = ValidationError::TooLarge { limit_mb: 50 }.into();
        assert!(n.is_error());
        assert_eq!(n.message, "O arquivo excede o limite de 50 MB.");
    }

    #[test]
    fn upload_targets_parse() {
        assert_eq!(UploadTarget::parse("image"), Some(UploadTarget::Image));
        assert_eq!(UploadTarget::parse("video"), Some(UploadTarget::Video));
        assert_eq!(UploadTarget::parse("audio"), None);
        assert_eq!(UploadTarget::Video.folder(), MediaFolder::Videos);
    }
}
