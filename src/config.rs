//! Configuration loader and validator for the site server and its tools.
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("YAML parse error: {0}")]
    Parse(#[from] serde_yaml::Error),
    #[error("Invalid configuration: {0}")]
    Invalid(&'static str),
}

/// Root configuration struct mirroring the YAML schema exactly.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Config {
    pub app: App,
    pub backend: Backend,
}

/// App-level settings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct App {
    pub data_dir: String,
    pub bind: String,
    #[serde(default = "default_max_upload_mb")]
    pub max_upload_mb: u64,
    #[serde(default = "default_progress_clear_ms")]
    pub progress_clear_ms: u64,
    #[serde(default = "default_site_title")]
    pub site_title: String,
}

fn default_max_upload_mb() -> u64 {
    50
}

fn default_progress_clear_ms() -> u64 {
    1500
}

fn default_site_title() -> String {
    "José Evilânio | Filmagem Aérea".into()
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Provider {
    Local,
    Supabase,
    Firebase,
}

/// Backend selection plus the settings of each provider.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Backend {
    pub provider: Provider,
    #[serde(default)]
    pub local: Option<LocalBackend>,
    #[serde(default)]
    pub supabase: Option<SupabaseBackend>,
    #[serde(default)]
    pub firebase: Option<FirebaseBackend>,
}

/// Self-hosted backend: SQLite tables, files under `data_dir/uploads`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct LocalBackend {
    #[serde(default)]
    pub database_url: Option<String>,
    #[serde(default)]
    pub public_base: String,
    pub admin_email: String,
    pub admin_password: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct SupabaseBackend {
    pub url: String,
    pub anon_key: String,
    pub bucket: String,
    #[serde(default = "default_reconnect_secs")]
    pub reconnect_secs: u64,
}

fn default_reconnect_secs() -> u64 {
    5
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct FirebaseBackend {
    pub project_id: String,
    pub api_key: String,
    pub storage_bucket: String,
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,
}

fn default_poll_interval_ms() -> u64 {
    3000
}

impl App {
    /// `data_dir` with a leading `~/` expanded to `$HOME`.
    pub fn resolved_data_dir(&self) -> String {
        match self.data_dir.strip_prefix("~/") {
            Some(rest) => match std::env::var("HOME") {
                Ok(home) => format!("{}/{}", home.trim_end_matches('/'), rest),
                Err(_) => self.data_dir.clone(),
            },
            None => self.data_dir.clone(),
        }
    }

    pub fn max_upload_bytes(&self) -> u64 {
        self.max_upload_mb * 1024 * 1024
    }

    pub fn progress_clear_after(&self) -> Duration {
        Duration::from_millis(self.progress_clear_ms)
    }
}

impl Config {
    /// Ensure required directories exist (creates `app.data_dir` if missing).
    pub fn ensure_dirs(&self) -> Result<(), std::io::Error> {
        if self.app.data_dir.trim().is_empty() {
            return Ok(());
        }
        fs::create_dir_all(self.app.resolved_data_dir())
    }

    /// SQLite URL for the local backend; `DATABASE_URL` wins when set.
    pub fn local_database_url(&self) -> String {
        if let Ok(url) = std::env::var("DATABASE_URL") {
            return url;
        }
        self.backend
            .local
            .as_ref()
            .and_then(|l| l.database_url.clone())
            .unwrap_or_else(|| format!("sqlite://{}/site.db", self.app.resolved_data_dir()))
    }

    pub fn uploads_dir(&self) -> std::path::PathBuf {
        Path::new(&self.app.resolved_data_dir()).join("uploads")
    }
}

/// Load configuration from a YAML file and validate it.
/// - If `path` is None, uses `config.yaml` in the current working directory.
pub fn load(path: Option<&Path>) -> Result<Config, ConfigError> {
    let path = path.unwrap_or_else(|| Path::new("config.yaml"));
    let content = fs::read_to_string(path)?;
    let cfg: Config = serde_yaml::from_str(&content)?;
    validate(&cfg)?;
    Ok(cfg)
}

/// Validate a configuration instance.
pub fn validate(cfg: &Config) -> Result<(), ConfigError> {
    if cfg.app.data_dir.trim().is_empty() {
        return Err(ConfigError::Invalid("app.data_dir must be non-empty"));
    }
    if cfg.app.bind.parse::<std::net::SocketAddr>().is_err() {
        return Err(ConfigError::Invalid("app.bind must be a socket address like 127.0.0.1:8080"));
    }
    if cfg.app.max_upload_mb == 0 {
        return Err(ConfigError::Invalid("app.max_upload_mb must be > 0"));
    }

    match cfg.backend.provider {
        Provider::Local => {
            let Some(local) = &cfg.backend.local else {
                return Err(ConfigError::Invalid("backend.local is required for provider local"));
            };
            if local.admin_email.trim().is_empty() {
                return Err(ConfigError::Invalid("backend.local.admin_email must be non-empty"));
            }
            if local.admin_password.is_empty() {
                return Err(ConfigError::Invalid("backend.local.admin_password must be non-empty"));
            }
        }
        Provider::Supabase => {
            let Some(sb) = &cfg.backend.supabase else {
                return Err(ConfigError::Invalid("backend.supabase is required for provider supabase"));
            };
            if reqwest::Url::parse(&sb.url).is_err() {
                return Err(ConfigError::Invalid("backend.supabase.url must be a valid URL"));
            }
            if sb.anon_key.trim().is_empty() {
                return Err(ConfigError::Invalid("backend.supabase.anon_key must be non-empty"));
            }
            if sb.bucket.trim().is_empty() {
                return Err(ConfigError::Invalid("backend.supabase.bucket must be non-empty"));
            }
        }
        Provider::Firebase => {
            let Some(fb) = &cfg.backend.firebase else {
                return Err(ConfigError::Invalid("backend.firebase is required for provider firebase"));
            };
            if fb.project_id.trim().is_empty() {
                return Err(ConfigError::Invalid("backend.firebase.project_id must be non-empty"));
            }
            if fb.api_key.trim().is_empty() {
                return Err(ConfigError::Invalid("backend.firebase.api_key must be non-empty"));
            }
            if fb.storage_bucket.trim().is_empty() {
                return Err(ConfigError::Invalid("backend.firebase.storage_bucket must be non-empty"));
            }
            if fb.poll_interval_ms == 0 {
                return Err(ConfigError::Invalid("backend.firebase.poll_interval_ms must be > 0"));
            }
        }
    }

    Ok(())
}

/// Returns a complete example configuration.
pub fn example() -> &'static str {
    r#"app:
  data_dir: "./data"
  bind: "127.0.0.1:8080"
  max_upload_mb: 50
  progress_clear_ms: 1500

backend:
  provider: local

  local:
    public_base: ""
    admin_email: "admin@example.com"
    admin_password: "change-me"

  supabase:
    url: "https://YOUR_PROJECT.supabase.co"
    anon_key: "YOUR_SUPABASE_ANON_KEY"
    bucket: "portfolio"

  firebase:
    project_id: "YOUR_FIREBASE_PROJECT"
    api_key: "YOUR_FIREBASE_WEB_API_KEY"
    storage_bucket: "YOUR_FIREBASE_PROJECT.firebasestorage.app"
    poll_interval_ms: 3000
"#
}
