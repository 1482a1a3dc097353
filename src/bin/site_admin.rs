use std::io::{self, BufRead, Write};
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{anyhow, bail, Context, Result};
use aerial_site::admin::{AdminDashboard, Notice, PortfolioForm, UploadTarget};
use aerial_site::config::{self, Config};
use aerial_site::gallery::{self, GalleryTab};
use aerial_site::model::{Category, SettingsField, SettingsPatch};
use aerial_site::store;
use aerial_site::sync::{self, SiteMirror};
use clap::{Parser, Subcommand};

#[derive(Debug, Parser)]
#[command(author, version, about = "Manage portfolio and site settings from the terminal")]
struct Args {
    /// Path to YAML config file
    #[arg(long, default_value = "config.yaml")]
    config: PathBuf,

    /// Admin e-mail (falls back to SITE_ADMIN_EMAIL); the password is read
    /// from SITE_ADMIN_PASSWORD
    #[arg(long)]
    email: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// List portfolio items, newest first
    List {
        /// Only photos or only videos
        #[arg(long)]
        tab: Option<String>,
    },
    /// Add a portfolio item
    Add {
        #[arg(long)]
        title: String,
        #[arg(long, default_value = "Casamento")]
        category: String,
        #[arg(long)]
        image: String,
        #[arg(long)]
        video_url: Option<String>,
    },
    /// Delete a portfolio item and its uploaded files
    Delete {
        id: String,
        /// Skip the confirmation prompt
        #[arg(long)]
        yes: bool,
    },
    /// Upload a file and print its public URL
    Upload {
        /// image or video
        target: String,
        path: PathBuf,
    },
    /// Show or change site settings
    Settings {
        #[command(subcommand)]
        action: SettingsAction,
    },
}

#[derive(Debug, Subcommand)]
enum SettingsAction {
    Show,
    /// Set one field (camelCase name, e.g. heroTitle)
    Set { field: String, value: String },
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
    cfg.ensure_dirs()?;
    run(&cfg, args.email, args.command).await
}

async fn run(cfg: &Config, email: Option<String>, command: Command) -> Result<()> {
    let store = store::connect(cfg)
        .await
        .context("failed to connect to the storage backend")?;
    let mirror = SiteMirror::new();
    sync::refresh_all(store.as_ref(), &mirror).await;
    let dashboard = Arc::new(AdminDashboard::new(
        store,
        mirror,
        cfg.app.max_upload_bytes(),
        cfg.app.progress_clear_after(),
    ));

    match &command {
        Command::List { tab } => {
            let items = dashboard.mirror().portfolio();
            let shown: Vec<_> = match tab.as_deref() {
                Some(t) => gallery::visible(&items, GalleryTab::parse(Some(t))),
                None => items.iter().collect(),
            };
            if shown.is_empty() {
                println!("{}", aerial_site::admin::EMPTY_LIST);
            }
            for item in shown {
                let kind = if item.is_video() { "video" } else { "photo" };
                println!("{}\t{}\t{}\t{}", item.id, kind, item.category, item.title);
            }
            return Ok(());
        }
        Command::Settings {
            action: SettingsAction::Show,
        } => {
            let settings = dashboard.mirror().settings();
            for field in SettingsField::ALL {
                println!("{:<16} {}", field.key(), settings.get(field));
            }
            return Ok(());
        }
        _ => {}
    }

    sign_in(&dashboard, email).await?;

    let outcome = match command {
        Command::Add {
            title,
            category,
            image,
            video_url,
        } => {
            let category = Category::parse(&category)
                .ok_or_else(|| anyhow!("unknown category '{category}'"))?;
            dashboard.set_form(PortfolioForm {
                title,
                category,
                image,
                video_url: video_url.unwrap_or_default(),
            });
            dashboard.add_item().await.map(|id| println!("{id}"))
        }
        Command::Delete { id, yes } => {
            let item = dashboard
                .find_item(&id)
                .ok_or_else(|| anyhow!("no portfolio item with id '{id}'"))?;
            if !yes && !confirm(&format!("{} [{}]", aerial_site::admin::CONFIRM_DELETE, item.title))? {
                println!("Cancelled");
                dashboard.sign_out().await;
                return Ok(());
            }
            match dashboard.delete_item(&id).await {
                Ok(Some(cleanup)) => {
                    // Failures inside the task are logged there.
                    let _ = cleanup.await;
                    Ok(())
                }
                Ok(None) => Ok(()),
                Err(notice) => Err(notice),
            }
        }
        Command::Upload { target, path } => {
            let target = UploadTarget::parse(&target)
                .ok_or_else(|| anyhow!("target must be 'image' or 'video'"))?;
            let bytes = tokio::fs::read(&path)
                .await
                .with_context(|| format!("failed to read {}", path.display()))?;
            let name = path
                .file_name()
                .and_then(|n| n.to_str())
                .unwrap_or("upload")
                .to_string();
            dashboard
                .upload(target, &name, bytes)
                .await
                .map(|stored| println!("{}", stored.public_url))
        }
        Command::Settings {
            action: SettingsAction::Set { field, value },
        } => {
            let field = SettingsField::from_name(&field)
                .ok_or_else(|| anyhow!("unknown settings field '{field}'"))?;
            let current = dashboard.mirror().settings();
            let patch = SettingsPatch::from(&current).with(field, value);
            dashboard.update_settings(patch).await
        }
        Command::List { .. }
        | Command::Settings {
            action: SettingsAction::Show,
        } => Ok(()),
    };

    let notice = dashboard.take_notice();
    dashboard.sign_out().await;
    report(outcome, notice)
}

async fn sign_in(dashboard: &AdminDashboard, email: Option<String>) -> Result<()> {
    let email = email
        .or_else(|| std::env::var("SITE_ADMIN_EMAIL").ok())
        .ok_or_else(|| anyhow!("--email or SITE_ADMIN_EMAIL is required"))?;
    let password =
        std::env::var("SITE_ADMIN_PASSWORD").context("SITE_ADMIN_PASSWORD is not set")?;
    dashboard
        .sign_in(&email, &password)
        .await
        .map_err(|notice| anyhow!(notice.message))
}

fn report(outcome: Result<(), Notice>, notice: Option<Notice>) -> Result<()> {
    match outcome {
        Ok(()) => {
            if let Some(n) = notice {
                eprintln!("{}", n.message);
            }
            Ok(())
        }
        Err(n) => bail!(n.message),
    }
}

fn confirm(prompt: &str) -> Result<bool> {
    print!("{prompt} [y/N] ");
    io::stdout().flush()?;
    let mut answer = String::new();
    io::stdin().lock().read_line(&mut answer)?;
    Ok(matches!(answer.trim(), "y" | "Y" | "s" | "S"))
}
