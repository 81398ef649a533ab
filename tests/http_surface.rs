use std::net::SocketAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use chrono::Duration;
use naturelog::db::Database;
use naturelog::encyclopedia::{EncyclopediaCache, SummarySource};
use naturelog::error::AppError;
use naturelog::identity::PasswordHasher;
use naturelog::session::SessionKey;
use naturelog::web::{build_router, AppState};
use tokio::io::{AsyncReadExt, AsyncWriteExt};

const MAX_UPLOAD: usize = 1024;
const BOUNDARY: &str = "naturelogtestboundary";

/// Enough of a PNG for content sniffing.
const PNG_BYTES: &[u8] = b"\x89PNG\r\n\x1a\n\0\0\0\rIHDR\0\0\0\x01\0\0\0\x01\x08\x06\0\0\0";

#[derive(Default)]
struct CountingSource {
    calls: AtomicUsize,
}

impl SummarySource for CountingSource {
    fn fetch_summary(&self, species: &str) -> Result<Option<String>, AppError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(Some(format!("{species} is a semiaquatic mammal.")))
    }
}

struct TestApp {
    addr: SocketAddr,
    state: Arc<AppState>,
    source: Arc<CountingSource>,
}

async fn spawn_app() -> TestApp {
    let db = Database::open_in_memory().expect("open db");
    db.initialize().expect("init schema");
    let source = Arc::new(CountingSource::default());

    let state = Arc::new(AppState {
        db: Arc::new(db),
        sessions: SessionKey::new(b"integration-secret", Duration::hours(1)),
        hasher: PasswordHasher::new(10),
        encyclopedia: Arc::new(EncyclopediaCache::new(source.clone(), Duration::days(30))),
        max_upload_bytes: MAX_UPLOAD,
    });

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("bind");
    let addr = listener.local_addr().expect("local addr");
    let app = build_router(state.clone());
    tokio::spawn(async move {
        axum::serve(listener, app).await.expect("serve");
    });

    TestApp {
        addr,
        state,
        source,
    }
}

struct Reply {
    status: u16,
    headers: Vec<(String, String)>,
    body: Vec<u8>,
}

impl Reply {
    fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    fn text(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }

    /// `name=value` of a cookie this reply sets, ignoring clears.
    fn cookie(&self, name: &str) -> Option<String> {
        self.headers
            .iter()
            .filter(|(k, _)| k.eq_ignore_ascii_case("set-cookie"))
            .filter_map(|(_, v)| v.split(';').next())
            .find(|pair| pair.starts_with(&format!("{name}=")) && !pair.ends_with('='))
            .map(str::to_string)
    }
}

async fn send(
    addr: SocketAddr,
    method: &str,
    path: &str,
    headers: &[(&str, &str)],
    body: &[u8],
) -> Reply {
    let mut stream = tokio::net::TcpStream::connect(addr)
        .await
        .expect("connect server");
    let mut req = format!(
        "{method} {path} HTTP/1.1\r\nHost: {addr}\r\nConnection: close\r\nContent-Length: {}\r\n",
        body.len()
    );
    for (k, v) in headers {
        req.push_str(&format!("{k}: {v}\r\n"));
    }
    req.push_str("\r\n");

    let mut bytes = req.into_bytes();
    bytes.extend_from_slice(body);
    // The server may answer and hang up before an oversized body is sent.
    let _ = stream.write_all(&bytes).await;

    let mut response = Vec::new();
    let mut chunk = [0u8; 8192];
    loop {
        match stream.read(&mut chunk).await {
            Ok(0) => break,
            Ok(n) => response.extend_from_slice(&chunk[..n]),
            Err(_) if !response.is_empty() => break,
            Err(e) => panic!("read response: {e}"),
        }
    }

    let split = response
        .windows(4)
        .position(|w| w == b"\r\n\r\n")
        .expect("http response must have separator");
    let head = String::from_utf8_lossy(&response[..split]).into_owned();
    let body = response[split + 4..].to_vec();

    let mut lines = head.lines();
    let status = lines
        .next()
        .and_then(|line| line.split_whitespace().nth(1))
        .and_then(|s| s.parse::<u16>().ok())
        .expect("http status");
    let headers = lines
        .filter_map(|line| line.split_once(':'))
        .map(|(k, v)| (k.trim().to_string(), v.trim().to_string()))
        .collect();

    Reply {
        status,
        headers,
        body,
    }
}

async fn get(addr: SocketAddr, path: &str, cookie: Option<&str>) -> Reply {
    match cookie {
        Some(cookie) => send(addr, "GET", path, &[("Cookie", cookie)], b"").await,
        None => send(addr, "GET", path, &[], b"").await,
    }
}

async fn post_form(addr: SocketAddr, path: &str, form: &str, cookie: Option<&str>) -> Reply {
    let mut headers = vec![("Content-Type", "application/x-www-form-urlencoded")];
    if let Some(cookie) = cookie {
        headers.push(("Cookie", cookie));
    }
    send(addr, "POST", path, &headers, form.as_bytes()).await
}

async fn register(addr: SocketAddr, username: &str) -> String {
    let reply = post_form(
        addr,
        "/register",
        &format!("username={username}&email={username}%40example.org&password=hunter2"),
        None,
    )
    .await;
    assert_eq!(reply.status, 303);
    assert_eq!(reply.header("location"), Some("/"));
    reply.cookie("naturelog_session").expect("session cookie")
}

fn multipart(fields: &[(&str, &str)], image: Option<&[u8]>) -> Vec<u8> {
    let mut body = Vec::new();
    for (name, value) in fields {
        body.extend_from_slice(
            format!(
                "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"{name}\"\r\n\r\n{value}\r\n"
            )
            .as_bytes(),
        );
    }
    if let Some(data) = image {
        body.extend_from_slice(
            format!(
                "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"image\"; filename=\"otter.png\"\r\nContent-Type: image/png\r\n\r\n"
            )
            .as_bytes(),
        );
        body.extend_from_slice(data);
        body.extend_from_slice(b"\r\n");
    }
    body.extend_from_slice(format!("--{BOUNDARY}--\r\n").as_bytes());
    body
}

async fn upload(addr: SocketAddr, cookie: &str, body: &[u8]) -> Reply {
    let content_type = format!("multipart/form-data; boundary={BOUNDARY}");
    send(
        addr,
        "POST",
        "/upload",
        &[("Content-Type", &content_type), ("Cookie", cookie)],
        body,
    )
    .await
}

#[tokio::test]
async fn register_then_browse_with_session() {
    let app = spawn_app().await;
    let cookie = register(app.addr, "ada").await;

    let home = get(app.addr, "/", Some(&cookie)).await;
    assert_eq!(home.status, 200);
    assert!(home.text().contains("Welcome back, ada"));
}

#[tokio::test]
async fn duplicate_registration_redirects_back() {
    let app = spawn_app().await;
    register(app.addr, "ada").await;

    let again = post_form(
        app.addr,
        "/register",
        "username=ada&email=&password=other",
        None,
    )
    .await;
    assert_eq!(again.status, 303);
    assert_eq!(again.header("location"), Some("/register"));
    assert!(again.cookie("naturelog_session").is_none());
    assert!(again.cookie("naturelog_flash").is_some());
}

#[tokio::test]
async fn login_checks_password() {
    let app = spawn_app().await;
    register(app.addr, "ada").await;

    let wrong = post_form(app.addr, "/login", "username=ada&password=nope", None).await;
    assert_eq!(wrong.status, 303);
    assert_eq!(wrong.header("location"), Some("/login"));
    assert!(wrong.cookie("naturelog_session").is_none());

    let right = post_form(app.addr, "/login", "username=ada&password=hunter2", None).await;
    assert_eq!(right.status, 303);
    assert_eq!(right.header("location"), Some("/"));
    let cookie = right.cookie("naturelog_session").expect("session cookie");
    assert_eq!(get(app.addr, "/profile", Some(&cookie)).await.status, 200);
}

#[tokio::test]
async fn anonymous_and_tampered_sessions_go_to_login() {
    let app = spawn_app().await;
    let anonymous = get(app.addr, "/", None).await;
    assert_eq!(anonymous.status, 303);
    assert_eq!(anonymous.header("location"), Some("/login"));

    let cookie = register(app.addr, "ada").await;
    let mut tampered = cookie.clone();
    tampered.pop();
    tampered.push(if cookie.ends_with('0') { '1' } else { '0' });

    let reply = get(app.addr, "/my_observations", Some(&tampered)).await;
    assert_eq!(reply.status, 303);
    assert_eq!(reply.header("location"), Some("/login"));
}

#[tokio::test]
async fn logout_clears_session() {
    let app = spawn_app().await;
    let cookie = register(app.addr, "ada").await;

    let reply = get(app.addr, "/logout", Some(&cookie)).await;
    assert_eq!(reply.status, 303);
    assert_eq!(reply.header("location"), Some("/login"));
    assert!(reply
        .headers
        .iter()
        .any(|(k, v)| k.eq_ignore_ascii_case("set-cookie")
            && v.starts_with("naturelog_session=;")
            && v.contains("Max-Age=0")));
}

#[tokio::test]
async fn upload_missing_field_persists_nothing() {
    let app = spawn_app().await;
    let cookie = register(app.addr, "ada").await;

    let body = multipart(&[("latitude", "51.5"), ("longitude", "-0.12")], Some(PNG_BYTES));
    let reply = upload(app.addr, &cookie, &body).await;
    assert_eq!(reply.status, 303);
    assert_eq!(reply.header("location"), Some("/upload"));
    assert_eq!(app.state.db.observation_count().unwrap(), 0);
    assert_eq!(app.state.db.image_count().unwrap(), 0);
}

#[tokio::test]
async fn oversized_upload_persists_nothing() {
    let app = spawn_app().await;
    let cookie = register(app.addr, "ada").await;

    let mut big = PNG_BYTES.to_vec();
    big.resize(MAX_UPLOAD * 2, 0);
    let body = multipart(
        &[("species", "Otter"), ("latitude", "51.5"), ("longitude", "-0.12")],
        Some(&big),
    );
    let reply = upload(app.addr, &cookie, &body).await;
    assert_eq!(reply.status, 303);
    assert_eq!(reply.header("location"), Some("/upload"));
    assert_eq!(app.state.db.observation_count().unwrap(), 0);
    assert_eq!(app.state.db.image_count().unwrap(), 0);
}

#[tokio::test]
async fn body_over_request_limit_persists_nothing() {
    let app = spawn_app().await;
    let cookie = register(app.addr, "ada").await;

    let mut huge = PNG_BYTES.to_vec();
    huge.resize(200 * 1024, 0);
    assert!(huge.len() > MAX_UPLOAD + 64 * 1024);
    let body = multipart(
        &[("species", "Otter"), ("latitude", "51.5"), ("longitude", "-0.12")],
        Some(&huge),
    );
    let reply = upload(app.addr, &cookie, &body).await;
    assert_eq!(reply.status, 303);
    assert_eq!(reply.header("location"), Some("/upload"));
    assert!(reply.cookie("naturelog_flash").is_some());
    assert_eq!(app.state.db.observation_count().unwrap(), 0);
    assert_eq!(app.state.db.image_count().unwrap(), 0);
}

#[tokio::test]
async fn uploaded_observation_shows_on_map_and_search() {
    let app = spawn_app().await;
    let cookie = register(app.addr, "ada").await;

    let body = multipart(
        &[
            ("species", "Eurasian Otter"),
            ("latitude", "51.501364"),
            ("longitude", "-0.14189"),
        ],
        Some(PNG_BYTES),
    );
    let reply = upload(app.addr, &cookie, &body).await;
    assert_eq!(reply.status, 303);
    assert_eq!(reply.header("location"), Some("/my_observations"));

    let geo = get(app.addr, "/api/observations?species=otter", None).await;
    assert_eq!(geo.status, 200);
    let json: serde_json::Value = serde_json::from_slice(&geo.body).unwrap();
    assert_eq!(json["type"], "FeatureCollection");
    let features = json["features"].as_array().unwrap();
    assert_eq!(features.len(), 1);
    assert_eq!(
        features[0]["geometry"]["coordinates"],
        serde_json::json!([-0.14189, 51.501364])
    );
    assert_eq!(features[0]["properties"]["uploader"], "ada");

    let image_url = features[0]["properties"]["image_url"].as_str().unwrap();
    let image = get(app.addr, image_url, None).await;
    assert_eq!(image.status, 200);
    assert_eq!(image.header("content-type"), Some("image/png"));
    assert!(image.header("content-disposition").unwrap().starts_with("inline"));
    assert_eq!(image.body, PNG_BYTES);

    let none = get(app.addr, "/api/observations?username=bob", None).await;
    let json: serde_json::Value = serde_json::from_slice(&none.body).unwrap();
    assert!(json["features"].as_array().unwrap().is_empty());

    let search = get(app.addr, "/search?q=OTTER", Some(&cookie)).await;
    assert_eq!(search.status, 200);
    assert!(search.text().contains("1 result(s)"));
    assert!(search.text().contains("Eurasian Otter"));
}

#[tokio::test]
async fn only_owner_can_delete() {
    let app = spawn_app().await;
    let ada = register(app.addr, "ada").await;
    let bob = register(app.addr, "bob").await;

    let body = multipart(
        &[("species", "Heron"), ("latitude", "10"), ("longitude", "20")],
        Some(PNG_BYTES),
    );
    upload(app.addr, &ada, &body).await;
    let id = app.state.db.all_observations().unwrap()[0].id;
    let path = format!("/observations/{id}/delete");

    let denied = post_form(app.addr, &path, "", Some(&bob)).await;
    assert_eq!(denied.status, 303);
    assert_eq!(denied.header("location"), Some("/my_observations"));
    assert_eq!(app.state.db.observation_count().unwrap(), 1);

    let deleted = post_form(app.addr, &path, "", Some(&ada)).await;
    assert_eq!(deleted.status, 303);
    assert_eq!(app.state.db.observation_count().unwrap(), 0);
    assert_eq!(app.state.db.image_count().unwrap(), 0);

    let gone = post_form(app.addr, &path, "", Some(&ada)).await;
    assert_eq!(gone.status, 404);
}

#[tokio::test]
async fn unknown_image_is_404() {
    let app = spawn_app().await;
    assert_eq!(get(app.addr, "/image/does-not-exist", None).await.status, 404);
}

#[tokio::test]
async fn encyclopedia_fetches_once_then_serves_cache() {
    let app = spawn_app().await;

    let first = get(app.addr, "/encyclopedia/Otter", None).await;
    assert_eq!(first.status, 200);
    assert!(first.text().contains("Otter is a semiaquatic mammal."));

    let second = get(app.addr, "/encyclopedia/otter", None).await;
    assert_eq!(second.status, 200);
    assert!(second.text().contains("semiaquatic mammal"));
    assert_eq!(app.source.calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn healthz_is_ok() {
    let app = spawn_app().await;
    let reply = get(app.addr, "/healthz", None).await;
    assert_eq!(reply.status, 200);
    assert_eq!(reply.text(), "ok");
}
