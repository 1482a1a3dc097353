use anyhow::{Context, Result};
use aerial_site::admin::AdminDashboard;
use aerial_site::config::{self, Provider};
use aerial_site::store;
use aerial_site::sync::{SiteMirror, SyncHandle};
use aerial_site::web::{self, AppState};
use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::info;

#[derive(Debug, Parser)]
#[command(author, version, about = "Aerial videography site with a live-synced admin dashboard")]
struct Args {
    /// Path to YAML config file
    #[arg(long, default_value = "config.yaml")]
    config: PathBuf,

    /// Override `app.bind`
    #[arg(long)]
    bind: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_target(false)
        .compact()
        .init();

    let args = Args::parse();
    let cfg = config::load(Some(&args.config))
        .with_context(|| format!("failed to load {}", args.config.display()))?;
    cfg.ensure_dirs()?;

    let store = store::connect(&cfg).await?;
    let mirror = SiteMirror::new();
    let sync = SyncHandle::activate(store.clone(), mirror.clone()).await;

    let dashboard = Arc::new(AdminDashboard::new(
        store,
        mirror,
        cfg.app.max_upload_bytes(),
        cfg.app.progress_clear_after(),
    ));
    let state = AppState::new(dashboard, &cfg.app.site_title);
    let uploads = (cfg.backend.provider == Provider::Local).then(|| cfg.uploads_dir());
    let app = web::router(state, uploads);

    let bind = args.bind.unwrap_or_else(|| cfg.app.bind.clone());
    let listener = tokio::net::TcpListener::bind(&bind)
        .await
        .with_context(|| format!("failed to bind {bind}"))?;
    info!(%bind, "serving site");

    axum::serve(listener, app)
        .with_graceful_shutdown(web::shutdown_signal())
        .await
        .context("server error")?;

    sync.shutdown().await;
    info!("shutdown complete");
    Ok(())
}
