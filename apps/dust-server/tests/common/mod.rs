#![allow(dead_code)]

use axum::http::{HeaderValue, StatusCode, header};
use axum_test::TestServer;
use dust_server::{AppState, config::Config, create_app};
use serde_json::{Value, json};
use tempfile::TempDir;

pub const ADMIN_USERNAME: &str = "root";
pub const ADMIN_PASSWORD: &str = "super-secret";

/// A server over a throwaway data directory. Tenants live under `*.example.com`.
pub struct TestApp {
    pub server: TestServer,
    _data_dir: TempDir,
}

pub async fn spawn_app() -> TestApp {
    let data_dir = TempDir::new().expect("create temp data dir");
    let path = data_dir.path().display().to_string();
    let config = Config::from_lookup(|key| match key {
        "DATA_DIR" => Some(path.clone()),
        "BASE_DOMAIN" => Some("example.com".to_string()),
        "DEV_HOST_ALIASES" => Some("localhost".to_string()),
        _ => None,
    })
    .expect("test config");

    let state = AppState::open(&config).await.expect("open app state");
    let server = TestServer::new(create_app(state)).expect("start test server");
    TestApp {
        server,
        _data_dir: data_dir,
    }
}

pub fn bearer(token: &str) -> HeaderValue {
    HeaderValue::from_str(&format!("Bearer {token}")).expect("valid header value")
}

pub fn host(tenant: &str) -> HeaderValue {
    HeaderValue::from_str(&format!("{tenant}.example.com")).expect("valid host")
}

/// Runs first-time setup and returns a super-admin session token.
pub async fn admin_token(server: &TestServer) -> String {
    let res = server
        .post("/api/auth/setup")
        .json(&json!({ "username": ADMIN_USERNAME, "password": ADMIN_PASSWORD }))
        .await;
    assert_eq!(res.status_code(), StatusCode::OK);

    let res = server
        .post("/api/auth/login")
        .json(&json!({ "username": ADMIN_USERNAME, "password": ADMIN_PASSWORD }))
        .await;
    assert_eq!(res.status_code(), StatusCode::OK);
    let body: Value = res.json();
    body["token"].as_str().expect("token").to_string()
}

pub async fn create_tenant(server: &TestServer, token: &str, slug: &str, password: &str) {
    let res = server
        .post("/api/admin/tenants")
        .add_header(header::AUTHORIZATION, bearer(token))
        .json(&json!({ "slug": slug, "name": slug.to_uppercase(), "password": password }))
        .await;
    assert_eq!(res.status_code(), StatusCode::CREATED);
}

pub async fn create_model(server: &TestServer, token: &str, tenant: &str, model: Value) {
    let res = server
        .post(&format!("/api/admin/tenants/{tenant}/models"))
        .add_header(header::AUTHORIZATION, bearer(token))
        .json(&model)
        .await;
    assert_eq!(res.status_code(), StatusCode::CREATED);
}

pub async fn create_record(
    server: &TestServer,
    token: &str,
    tenant: &str,
    model: &str,
    data: Value,
) -> i64 {
    let res = server
        .post(&format!("/api/admin/tenants/{tenant}/content/{model}"))
        .add_header(header::AUTHORIZATION, bearer(token))
        .json(&data)
        .await;
    assert_eq!(res.status_code(), StatusCode::CREATED);
    let body: Value = res.json();
    body["id"].as_i64().expect("record id")
}

pub fn posts_model() -> Value {
    json!({
        "slug": "posts",
        "name": "Posts",
        "kind": "collection",
        "fields": [
            { "name": "title", "type": "text", "required": true },
            { "name": "body", "type": "markdown" }
        ]
    })
}
