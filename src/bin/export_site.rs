use anyhow::{Context, Result};
use aerial_site::config::{self, Config};
use aerial_site::gallery::GalleryTab;
use aerial_site::quote::QuoteRequest;
use aerial_site::render::{self, public::LandingView};
use aerial_site::store;
use aerial_site::sync::{self, SiteMirror};
use clap::Parser;
use std::path::{Path, PathBuf};

#[derive(Debug, Parser)]
#[command(
    about = "Render the landing page from the configured backend into a static html/ directory."
)]
struct Args {
    /// Path to YAML config file
    #[arg(long, default_value = "config.yaml")]
    config: PathBuf,

    /// Output directory (defaults to <data_dir>/html)
    #[arg(long)]
    out: Option<PathBuf>,

    /// Gallery tab shown first: photos or videos
    #[arg(long, default_value = "photos")]
    tab: String,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_target(false)
        .compact()
        .init();

    let args = Args::parse();
    let cfg = config::load(Some(&args.config))?;
    run(&cfg, args.out, GalleryTab::parse(Some(&args.tab))).await
}

async fn run(cfg: &Config, out: Option<PathBuf>, tab: GalleryTab) -> Result<()> {
    let store = store::connect(cfg)
        .await
        .context("failed to connect to the storage backend")?;
    let mirror = SiteMirror::new();
    sync::refresh_all(store.as_ref(), &mirror).await;

    let items = mirror.portfolio();
    let settings = mirror.settings();
    let quote = QuoteRequest::default();
    let index_html = render::public::render_landing(&LandingView {
        site_title: &cfg.app.site_title,
        stylesheet: "static/style.css",
        settings: &settings,
        items: &items,
        tab,
        playing: None,
        quote: &quote,
        logged_in: false,
    });

    let out_dir = out.unwrap_or_else(|| PathBuf::from(cfg.app.resolved_data_dir()).join("html"));
    let static_dir = out_dir.join("static");
    tokio::fs::create_dir_all(&static_dir)
        .await
        .with_context(|| format!("failed to create {}", static_dir.display()))?;

    let index_path = out_dir.join("index.html");
    tokio::fs::write(&index_path, index_html)
        .await
        .with_context(|| format!("failed to write {}", index_path.display()))?;

    let css_path = static_dir.join("style.css");
    tokio::fs::write(&css_path, render::DEFAULT_STYLE)
        .await
        .with_context(|| format!("failed to write {}", css_path.display()))?;

    println!("Wrote {} and {}", index_path.display(), css_path.display());
    println!("================================");
    println!("Portfolio items: {}", items.len());
    println!("Index full path: {}", absolute_path(&index_path).display());
    Ok(())
}

fn absolute_path(p: &Path) -> PathBuf {
    if p.is_absolute() {
        p.to_path_buf()
    } else {
        std::env::current_dir()
            .map(|cwd| cwd.join(p))
            .unwrap_or_else(|_| p.to_path_buf())
    }
}
