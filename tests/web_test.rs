mod common;

use std::sync::Arc;
use std::time::Duration;

use aerial_site::admin::{AdminDashboard, MSG_BAD_CREDENTIALS, MSG_ITEM_ADDED};
use aerial_site::store::local::{Credentials, SqliteStore};
use aerial_site::store::StoragePort;
use aerial_site::sync::{SiteMirror, SyncHandle};
use aerial_site::web::{self, AppState};
use axum::body::Body;
use axum::http::{header, Request, Response, StatusCode};
use axum::Router;
use futures::StreamExt;
use http_body_util::BodyExt;
use tower::ServiceExt;

const EMAIL: &str = "drone@example.com";
const PASSWORD: &str = "voar-alto";

struct TestApp {
    router: Router,
    mirror: SiteMirror,
    _sync: SyncHandle,
    _dir: tempfile::TempDir,
}

async fn setup() -> TestApp {
    let dir = tempfile::tempdir().unwrap();
    let uploads = dir.path().join("uploads");
    let store: Arc<dyn StoragePort> = Arc::new(
        SqliteStore::connect(
            "sqlite::memory:",
            uploads.clone(),
            "",
            Credentials::new(EMAIL, PASSWORD),
        )
        .await
        .unwrap(),
    );
    let mirror = SiteMirror::new();
    let sync = SyncHandle::activate(store.clone(), mirror.clone()).await;
    let dashboard = Arc::new(AdminDashboard::new(
        store,
        mirror.clone(),
        4 * 1024 * 1024,
        Duration::from_millis(50),
    ));
    let router = web::router(AppState::new(dashboard, "Teste"), Some(uploads));
    TestApp {
        router,
        mirror,
        _sync: sync,
        _dir: dir,
    }
}

async fn send(app: &TestApp, req: Request<Body>) -> Response<Body> {
    app.router.clone().oneshot(req).await.unwrap()
}

async fn body_text(res: Response<Body>) -> String {
    let bytes = res.into_body().collect().await.unwrap().to_bytes();
    String::from_utf8(bytes.to_vec()).unwrap()
}

fn form_post(uri: &str, body: &str, cookie: Option<&str>) -> Request<Body> {
    let mut req = Request::post(uri).header(header::CONTENT_TYPE, "application/x-www-form-urlencoded");
    if let Some(c) = cookie {
        req = req.header(header::COOKIE, c);
    }
    req.body(Body::from(body.to_string())).unwrap()
}

fn location(res: &Response<Body>) -> String {
    res.headers()
        .get(header::LOCATION)
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default()
        .to_string()
}

async fn login(app: &TestApp) -> String {
    let body = format!("email={}&password={}", urlencoding::encode(EMAIL), PASSWORD);
    let res = send(app, form_post("/admin/login", &body, None)).await;
    assert_eq!(res.status(), StatusCode::SEE_OTHER);
    let set = res
        .headers()
        .get(header::SET_COOKIE)
        .and_then(|v| v.to_str().ok())
        .unwrap()
        .to_string();
    set.split(';').next().unwrap().to_string()
}

#[tokio::test]
async fn landing_renders_default_settings() {
    let app = setup().await;
    let res = send(&app, Request::get("/").body(Body::empty()).unwrap()).await;
    assert_eq!(res.status(), StatusCode::OK);
    let html = body_text(res).await;
    assert!(html.contains("<span class=\"accent\">de Cima</span>"));
    assert!(html.contains("Nenhuma foto encontrada."));
    assert!(html.contains("https://wa.me/5582993716239"));
}

#[tokio::test]
async fn package_link_prefills_the_objective() {
    let app = setup().await;
    let res = send(&app, Request::get("/?pacote=3").body(Body::empty()).unwrap()).await;
    let html = body_text(res).await;
    assert!(html.contains("Interesse no Pacote Completo. </textarea>"));
}

#[tokio::test]
async fn unknown_package_is_ignored() {
    let app = setup().await;
    let res = send(&app, Request::get("/?pacote=abc").body(Body::empty()).unwrap()).await;
    assert_eq!(res.status(), StatusCode::OK);
    assert!(!body_text(res).await.contains("Interesse no"));

    let res = send(&app, Request::get("/?pacote=99").body(Body::empty()).unwrap()).await;
    assert_eq!(res.status(), StatusCode::OK);
}

#[tokio::test]
async fn quote_submission_redirects_to_whatsapp() {
    let app = setup().await;
    let res = send(
        &app,
        form_post("/orcamento", "eventType=Casamento&location=Macei%C3%B3", None),
    )
    .await;
    assert_eq!(res.status(), StatusCode::SEE_OTHER);
    let to = location(&res);
    assert!(to.starts_with("https://wa.me/5582993716239?text="));
    let text = urlencoding::decode(to.split_once("?text=").unwrap().1).unwrap();
    assert!(text.contains("• *Tipo:* Casamento"));
    assert!(text.contains("• *Local:* Maceió"));
    assert!(text.contains("• *Data:* Não informada"));
}

#[tokio::test]
async fn health_reports_provider() {
    let app = setup().await;
    let res = send(&app, Request::get("/healthz").body(Body::empty()).unwrap()).await;
    assert_eq!(res.status(), StatusCode::OK);
    let json: serde_json::Value = serde_json::from_str(&body_text(res).await).unwrap();
    assert_eq!(json["status"], "ok");
    assert_eq!(json["provider"], "local");
}

#[tokio::test]
async fn admin_requires_a_session() {
    let app = setup().await;
    let res = send(&app, Request::get("/admin").body(Body::empty()).unwrap()).await;
    assert_eq!(res.status(), StatusCode::SEE_OTHER);
    assert_eq!(location(&res), "/admin/login");

    let res = send(
        &app,
        form_post("/admin/portfolio", "title=x&image=y", Some("aerial_admin=forged")),
    )
    .await;
    assert_eq!(location(&res), "/admin/login");
}

#[tokio::test]
async fn wrong_password_shows_the_login_error() {
    let app = setup().await;
    let res = send(&app, form_post("/admin/login", "email=drone%40example.com&password=nope", None)).await;
    assert_eq!(res.status(), StatusCode::UNAUTHORIZED);
    assert!(body_text(res).await.contains(MSG_BAD_CREDENTIALS));
}

#[tokio::test]
async fn added_item_reaches_the_public_gallery() {
    let app = setup().await;
    let cookie = login(&app).await;
    assert!(common::eventually(|| app.mirror.logged_in()).await);

    let res = send(
        &app,
        form_post(
            "/admin/portfolio",
            "title=P%C3%B4r+do+sol&category=Ensaio&image=https%3A%2F%2Fcdn.test%2Fsol.jpg&videoUrl=",
            Some(&cookie),
        ),
    )
    .await;
    assert_eq!(res.status(), StatusCode::SEE_OTHER);

    let res = send(
        &app,
        Request::get("/admin").header(header::COOKIE, &cookie).body(Body::empty()).unwrap(),
    )
    .await;
    assert_eq!(res.status(), StatusCode::OK);
    assert!(body_text(res).await.contains(MSG_ITEM_ADDED));

    assert!(common::eventually(|| app.mirror.portfolio().len() == 1).await);
    let res = send(&app, Request::get("/").body(Body::empty()).unwrap()).await;
    assert!(body_text(res).await.contains("Pôr do sol"));
}

#[tokio::test]
async fn unknown_category_is_rejected_with_a_notice() {
    let app = setup().await;
    let cookie = login(&app).await;
    let res = send(
        &app,
        form_post(
            "/admin/portfolio",
            "title=Voo&category=Drone&image=https%3A%2F%2Fcdn.test%2Fv.jpg",
            Some(&cookie),
        ),
    )
    .await;
    assert_eq!(res.status(), StatusCode::SEE_OTHER);

    let res = send(
        &app,
        Request::get("/admin").header(header::COOKIE, &cookie).body(Body::empty()).unwrap(),
    )
    .await;
    let html = body_text(res).await;
    assert!(html.contains("Categoria inválida"));
    assert!(html.contains("value=\"Voo\""));
    tokio::time::sleep(Duration::from_millis(50)).await;
    assert!(app.mirror.portfolio().is_empty());
}

#[tokio::test]
async fn progress_follows_a_slow_upload_body() {
    let app = setup().await;
    let cookie = login(&app).await;

    let boundary = "XSLOWX";
    let mut chunks: Vec<Vec<u8>> = vec![format!(
        "--{boundary}\r\nContent-Disposition: form-data; name=\"file\"; filename=\"voo.mp4\"\r\nContent-Type: video/mp4\r\n\r\n"
    )
    .into_bytes()];
    chunks.extend((0..10).map(|_| vec![b'v'; 2000]));
    chunks.push(format!("\r\n--{boundary}--\r\n").into_bytes());
    let total: usize = chunks.iter().map(Vec::len).sum();
    let body = futures::stream::iter(chunks).then(|chunk| async move {
        tokio::time::sleep(Duration::from_millis(60)).await;
        Ok::<_, std::io::Error>(chunk)
    });

    let req = Request::post("/admin/upload/video")
        .header(header::CONTENT_TYPE, format!("multipart/form-data; boundary={boundary}"))
        .header(header::CONTENT_LENGTH, total)
        .header(header::COOKIE, &cookie)
        .body(Body::from_stream(body))
        .unwrap();
    let router = app.router.clone();
    let upload = tokio::spawn(async move { router.oneshot(req).await.unwrap() });

    let mut during_transfer = Vec::new();
    while !upload.is_finished() {
        let res = send(
            &app,
            Request::get("/admin/upload/progress")
                .header(header::COOKIE, &cookie)
                .body(Body::empty())
                .unwrap(),
        )
        .await;
        let json: serde_json::Value = serde_json::from_str(&body_text(res).await).unwrap();
        if let Some(p) = json["percent"].as_u64() {
            during_transfer.push(p);
        }
        tokio::time::sleep(Duration::from_millis(25)).await;
    }
    let res = upload.await.unwrap();
    assert_eq!(res.status(), StatusCode::SEE_OTHER);
    assert!(
        during_transfer.iter().any(|p| *p > 0 && *p < 100),
        "samples: {during_transfer:?}"
    );
    assert!(during_transfer.windows(2).all(|w| w[0] <= w[1]), "samples: {during_transfer:?}");
}

#[tokio::test]
async fn multipart_upload_is_served_back() {
    let app = setup().await;
    let cookie = login(&app).await;

    let boundary = "XBOUNDARYX";
    let body = format!(
        "--{b}\r\nContent-Disposition: form-data; name=\"file\"; filename=\"logo.png\"\r\nContent-Type: image/png\r\n\r\nPNGDATA\r\n--{b}--\r\n",
        b = boundary
    );
    let req = Request::post("/admin/upload/image")
        .header(header::CONTENT_TYPE, format!("multipart/form-data; boundary={boundary}"))
        .header(header::COOKIE, &cookie)
        .body(Body::from(body))
        .unwrap();
    let res = send(&app, req).await;
    assert_eq!(res.status(), StatusCode::SEE_OTHER);

    let res = send(
        &app,
        Request::get("/admin").header(header::COOKIE, &cookie).body(Body::empty()).unwrap(),
    )
    .await;
    let html = body_text(res).await;
    let start = html.find("value=\"/uploads/images/").expect("image field filled") + "value=\"".len();
    let url = &html[start..start + html[start..].find('"').unwrap()];

    let res = send(&app, Request::get(url).body(Body::empty()).unwrap()).await;
    assert_eq!(res.status(), StatusCode::OK);
    assert_eq!(body_text(res).await, "PNGDATA");
}

#[tokio::test]
async fn logout_without_the_admin_cookie_changes_nothing() {
    let app = setup().await;
    let cookie = login(&app).await;
    assert!(common::eventually(|| app.mirror.logged_in()).await);

    let res = send(&app, form_post("/admin/logout", "", None)).await;
    assert_eq!(location(&res), "/admin/login");
    let res = send(&app, form_post("/admin/logout", "", Some("aerial_admin=forged"))).await;
    assert_eq!(location(&res), "/admin/login");
    assert!(app.mirror.logged_in());

    let res = send(
        &app,
        Request::get("/admin").header(header::COOKIE, &cookie).body(Body::empty()).unwrap(),
    )
    .await;
    assert_eq!(res.status(), StatusCode::OK);
}

#[tokio::test]
async fn logout_clears_the_cookie_and_session() {
    let app = setup().await;
    let cookie = login(&app).await;
    let res = send(&app, form_post("/admin/logout", "", Some(&cookie))).await;
    assert_eq!(res.status(), StatusCode::SEE_OTHER);
    assert!(!app.mirror.logged_in());

    let res = send(
        &app,
        Request::get("/admin").header(header::COOKIE, &cookie).body(Body::empty()).unwrap(),
    )
    .await;
    assert_eq!(location(&res), "/admin/login");
}
