mod common;

use std::sync::Arc;
use std::time::Duration;

use aerial_site::admin::{
    AdminDashboard, PortfolioForm, UploadTarget, MSG_BAD_CREDENTIALS, MSG_DELETE_FAILED,
    MSG_ITEM_ADDED, MSG_ITEM_SAVE_FAILED, MSG_SETTINGS_FAILED, MSG_SETTINGS_SAVED,
    MSG_SIGN_IN_FAILED, MSG_UPLOAD_DONE, MSG_UPLOAD_FAILED,
};
use aerial_site::gallery::GalleryTab;
use aerial_site::model::{Category, SettingsField, SettingsPatch, SiteSettings};
use aerial_site::sync::{self, SiteMirror};
use common::{eventually, FakeStore, ADMIN_EMAIL, ADMIN_PASSWORD, CDN};

const MIB: u64 = 1024 * 1024;

fn dashboard(store: &Arc<FakeStore>) -> AdminDashboard {
    AdminDashboard::new(store.clone(), SiteMirror::new(), 2 * MIB, Duration::from_millis(50))
}

fn filled_form() -> PortfolioForm {
    PortfolioForm {
        title: "Casamento na praia".into(),
        category: Category::Social,
        image: format!("{CDN}images/abc-praia.jpg"),
        video_url: format!("{CDN}videos/abc-praia.mp4"),
    }
}

#[tokio::test]
async fn add_item_clears_form_but_keeps_category() {
    let store = FakeStore::new();
    let d = dashboard(&store);
    d.set_form(filled_form());

    let id = d.add_item().await.expect("insert succeeds");
    assert_eq!(store.items().len(), 1);
    assert_eq!(store.items()[0].id, id);

    let form = d.form();
    assert!(form.title.is_empty() && form.image.is_empty() && form.video_url.is_empty());
    assert_eq!(form.category, Category::Social);
    assert_eq!(d.take_notice().unwrap().message, MSG_ITEM_ADDED);
    // Without the sync layer the mirror is untouched.
    assert!(d.mirror().portfolio().is_empty());
    assert!(!d.is_busy());
}

#[tokio::test]
async fn add_item_failure_keeps_the_form() {
    let store = FakeStore::new();
    store.fail_writes(true);
    let d = dashboard(&store);
    d.set_form(filled_form());

    let notice = d.add_item().await.unwrap_err();
    assert_eq!(notice.message, MSG_ITEM_SAVE_FAILED);
    assert_eq!(d.form(), filled_form());
    assert!(store.items().is_empty());
}

#[tokio::test]
async fn add_item_rejects_missing_title_without_writing() {
    let store = FakeStore::new();
    let d = dashboard(&store);
    d.set_form(PortfolioForm {
        title: "  ".into(),
        ..filled_form()
    });
    let notice = d.add_item().await.unwrap_err();
    assert!(notice.is_error());
    assert!(notice.message.contains("Título"));
    assert!(store.items().is_empty());
}

#[tokio::test]
async fn delete_removes_record_and_owned_files() {
    let store = FakeStore::new();
    let d = dashboard(&store);
    d.set_form(filled_form());
    let id = d.add_item().await.unwrap();
    sync::refresh_all(store.as_ref(), d.mirror()).await;
    assert_eq!(d.items(GalleryTab::Videos).len(), 1);

    let cleanup = d.delete_item(&id).await.expect("delete succeeds");
    assert!(store.items().is_empty());
    cleanup.expect("item owns uploaded files").await.unwrap();
    let mut removed = store.removed();
    removed.sort();
    assert_eq!(removed, vec!["images/abc-praia.jpg", "videos/abc-praia.mp4"]);
}

#[tokio::test]
async fn delete_of_external_media_has_no_cleanup() {
    let store = FakeStore::new();
    let d = dashboard(&store);
    d.set_form(PortfolioForm {
        image: "https://elsewhere.example/a.jpg".into(),
        video_url: String::new(),
        ..filled_form()
    });
    let id = d.add_item().await.unwrap();
    sync::refresh_all(store.as_ref(), d.mirror()).await;

    assert!(d.delete_item(&id).await.unwrap().is_none());
    assert!(store.items().is_empty());
    assert!(store.removed().is_empty());
}

#[tokio::test]
async fn delete_failure_reports_and_skips_cleanup() {
    let store = FakeStore::new();
    let d = dashboard(&store);
    d.set_form(filled_form());
    let id = d.add_item().await.unwrap();
    sync::refresh_all(store.as_ref(), d.mirror()).await;

    store.fail_writes(true);
    let notice = d.delete_item(&id).await.unwrap_err();
    assert_eq!(notice.message, MSG_DELETE_FAILED);
    tokio::time::sleep(Duration::from_millis(50)).await;
    assert!(store.removed().is_empty());
    assert_eq!(store.items().len(), 1);
}

#[tokio::test]
async fn oversize_upload_is_rejected_before_the_store() {
    let store = FakeStore::new();
    let d = dashboard(&store);
    let notice = d
        .upload(UploadTarget::Image, "big.jpg", vec![0u8; (2 * MIB + 1) as usize])
        .await
        .unwrap_err();
    assert_eq!(notice.message, "O arquivo excede o limite de 2 MB.");
    assert_eq!(d.progress().current(), None);
    assert!(d.form().image.is_empty());
}

#[tokio::test]
async fn upload_fills_the_form_and_progress_clears() {
    let store = FakeStore::new();
    let d = dashboard(&store);
    let stored = d
        .upload(UploadTarget::Video, "voo.mp4", vec![1u8; 4096])
        .await
        .expect("upload succeeds");
    assert!(stored.path.starts_with("videos/"));
    assert_eq!(d.form().video_url, stored.public_url);
    assert_eq!(d.progress().current(), Some(100));
    assert_eq!(d.take_notice().unwrap().message, MSG_UPLOAD_DONE);

    assert!(eventually(|| d.progress().current().is_none()).await);
}

#[tokio::test]
async fn upload_failure_resets_progress() {
    let store = FakeStore::new();
    store.fail_writes(true);
    let d = dashboard(&store);
    let notice = d
        .upload(UploadTarget::Image, "a.png", vec![1u8; 10])
        .await
        .unwrap_err();
    assert_eq!(notice.message, MSG_UPLOAD_FAILED);
    assert_eq!(d.progress().current(), None);
}

#[tokio::test]
async fn settings_require_every_non_social_field() {
    let store = FakeStore::new();
    let d = dashboard(&store);

    let mut patch = SettingsPatch::from(&SiteSettings::default());
    patch.set(SettingsField::Email, " ");
    let notice = d.update_settings(patch).await.unwrap_err();
    assert!(notice.message.contains("E-mail"));
    assert!(store.upserts().is_empty());

    let patch = SettingsPatch::from(&SiteSettings::default())
        .with(SettingsField::InstagramUrl, "")
        .with(SettingsField::FacebookUrl, "");
    d.update_settings(patch.clone()).await.expect("optional fields may be blank");
    assert_eq!(store.upserts(), vec![patch]);
    assert_eq!(d.take_notice().unwrap().message, MSG_SETTINGS_SAVED);

    store.fail_writes(true);
    let notice = d
        .update_settings(SettingsPatch::from(&SiteSettings::default()))
        .await
        .unwrap_err();
    assert_eq!(notice.message, MSG_SETTINGS_FAILED);
}

#[tokio::test]
async fn sign_in_maps_errors_and_updates_projection() {
    let store = FakeStore::new();
    let d = dashboard(&store);

    let notice = d.sign_in(ADMIN_EMAIL, "wrong").await.unwrap_err();
    assert_eq!(notice.message, MSG_BAD_CREDENTIALS);
    assert!(d.notice().is_none());
    assert!(!d.mirror().logged_in());

    store.fail_sign_in.store(true, std::sync::atomic::Ordering::SeqCst);
    let notice = d.sign_in(ADMIN_EMAIL, ADMIN_PASSWORD).await.unwrap_err();
    assert_eq!(notice.message, MSG_SIGN_IN_FAILED);

    store.fail_sign_in.store(false, std::sync::atomic::Ordering::SeqCst);
    d.sign_in(ADMIN_EMAIL, ADMIN_PASSWORD).await.unwrap();
    assert!(d.mirror().logged_in());

    d.sign_out().await;
    assert!(!d.mirror().logged_in());
}
