mod common;

use std::sync::Arc;

use aerial_site::model::{Category, PortfolioItem, SettingsField, SettingsPatch, SiteSettings};
use aerial_site::store::{Resource, StoragePort};
use aerial_site::sync::{self, SiteMirror, SyncHandle};
use common::{eventually, FakeStore};

fn remote_item(id: &str) -> PortfolioItem {
    PortfolioItem {
        id: id.into(),
        title: format!("Remoto {id}"),
        category: Category::Evento,
        image: format!("https://cdn.test/images/{id}.jpg"),
        video_url: None,
        created_at: None,
    }
}

#[tokio::test]
async fn missing_settings_are_bootstrapped_with_defaults() {
    let store = FakeStore::new();
    let mirror = SiteMirror::new();
    let handle = SyncHandle::activate(store.clone(), mirror.clone()).await;

    assert_eq!(mirror.settings(), SiteSettings::default());
    let stored = store.stored_settings().expect("defaults written");
    assert_eq!(stored, SettingsPatch::from(&SiteSettings::default()));
    assert_eq!(store.upserts().len(), 1);
    handle.shutdown().await;
}

#[tokio::test]
async fn partial_settings_merge_over_defaults() {
    let store = FakeStore::with_settings(
        SettingsPatch::new().with(SettingsField::HeroTitle, "Voando alto"),
    );
    let mirror = SiteMirror::new();
    sync::refresh_all(store.as_ref(), &mirror).await;

    let settings = mirror.settings();
    assert_eq!(settings.hero_title, "Voando alto");
    assert_eq!(settings.email, SiteSettings::default().email);
    assert!(store.upserts().is_empty());
}

#[tokio::test]
async fn read_failures_fall_back_silently() {
    let store = FakeStore::new();
    store.push_remote(remote_item("a"));
    store.fail_reads(true);

    let mirror = SiteMirror::new();
    mirror.set_portfolio(vec![remote_item("stale")]);
    let handle = SyncHandle::activate(store.clone(), mirror.clone()).await;

    assert!(mirror.portfolio().is_empty());
    assert_eq!(mirror.settings(), SiteSettings::default());
    // Feeds stay registered so a later signal can recover.
    assert_eq!(handle.live_feeds().len(), 3);

    store.fail_reads(false);
    store.push_remote(remote_item("b"));
    assert!(eventually(|| mirror.portfolio().len() == 2).await);
    handle.shutdown().await;
}

#[tokio::test]
async fn remote_changes_replace_the_mirror() {
    let store = FakeStore::new();
    let mirror = SiteMirror::new();
    let handle = SyncHandle::activate(store.clone(), mirror.clone()).await;
    assert!(mirror.portfolio().is_empty());

    store.push_remote(remote_item("x1"));
    assert!(eventually(|| !mirror.portfolio().is_empty()).await);
    let ids: Vec<String> = mirror.portfolio().into_iter().map(|i| i.id).collect();
    assert_eq!(ids, vec!["x1".to_string()]);

    store.push_remote(remote_item("x2"));
    assert!(eventually(|| mirror.portfolio().first().map(|i| i.id.as_str() == "x2").unwrap_or(false)).await);
    handle.shutdown().await;
}

#[tokio::test]
async fn session_projection_follows_sign_in() {
    let store = FakeStore::new();
    let mirror = SiteMirror::new();
    let handle = SyncHandle::activate(store.clone(), mirror.clone()).await;
    assert!(!mirror.logged_in());

    store
        .sign_in(common::ADMIN_EMAIL, common::ADMIN_PASSWORD)
        .await
        .unwrap();
    assert!(eventually(|| mirror.logged_in()).await);

    store.sign_out().await.unwrap();
    assert!(eventually(|| !mirror.logged_in()).await);
    handle.shutdown().await;
}

#[tokio::test]
async fn shutdown_releases_every_subscription() {
    let store = FakeStore::new();
    let port: Arc<dyn StoragePort> = store.clone();
    let handle = SyncHandle::activate(port, SiteMirror::new()).await;
    for r in [Resource::Auth, Resource::Portfolio, Resource::Settings] {
        assert_eq!(store.listener_count(r), 1, "{r:?}");
    }

    handle.shutdown().await;
    for r in [Resource::Auth, Resource::Portfolio, Resource::Settings] {
        assert_eq!(store.listener_count(r), 0, "{r:?}");
    }
}

#[tokio::test]
async fn dropping_the_handle_also_releases() {
    let store = FakeStore::new();
    let handle = SyncHandle::activate(store.clone(), SiteMirror::new()).await;
    drop(handle);
    assert!(eventually(|| store.listener_count(Resource::Portfolio) == 0).await);
}
