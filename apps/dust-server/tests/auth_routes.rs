mod common;

use axum::http::{HeaderValue, StatusCode, header};
use common::{
    ADMIN_PASSWORD, ADMIN_USERNAME, admin_token, bearer, create_tenant, host, posts_model,
    spawn_app,
};
use serde_json::{Value, json};

#[tokio::test]
async fn test_setup_runs_once() {
    let app = spawn_app().await;
    let server = &app.server;

    let res = server.get("/api/auth/setup-status").await;
    assert_eq!(res.status_code(), StatusCode::OK);
    assert_eq!(res.json::<Value>()["setupComplete"], false);

    let res = server
        .post("/api/auth/setup")
        .json(&json!({ "username": ADMIN_USERNAME, "password": "short" }))
        .await;
    assert_eq!(res.status_code(), StatusCode::BAD_REQUEST);

    let res = server
        .post("/api/auth/setup")
        .json(&json!({ "username": ADMIN_USERNAME, "password": ADMIN_PASSWORD }))
        .await;
    assert_eq!(res.status_code(), StatusCode::OK);

    let res = server.get("/api/auth/setup-status").await;
    assert_eq!(res.json::<Value>()["setupComplete"], true);

    let res = server
        .post("/api/auth/setup")
        .json(&json!({ "username": "other", "password": "another-secret" }))
        .await;
    assert_eq!(res.status_code(), StatusCode::CONFLICT);
}

#[tokio::test]
async fn test_super_admin_login_check_and_logout() {
    let app = spawn_app().await;
    let server = &app.server;

    let res = server
        .post("/api/auth/setup")
        .json(&json!({ "username": ADMIN_USERNAME, "password": ADMIN_PASSWORD }))
        .await;
    assert_eq!(res.status_code(), StatusCode::OK);

    let res = server
        .post("/api/auth/login")
        .json(&json!({ "username": ADMIN_USERNAME, "password": "wrong-password" }))
        .await;
    assert_eq!(res.status_code(), StatusCode::UNAUTHORIZED);
    assert!(res.json::<Value>()["error"].is_string());

    let res = server
        .post("/api/auth/login")
        .json(&json!({ "username": ADMIN_USERNAME, "password": ADMIN_PASSWORD }))
        .await;
    assert_eq!(res.status_code(), StatusCode::OK);
    let token = res.json::<Value>()["token"].as_str().unwrap().to_string();

    let res = server
        .get("/api/auth/check")
        .add_header(header::AUTHORIZATION, bearer(&token))
        .await;
    assert_eq!(res.json::<Value>()["authenticated"], true);

    let res = server.get("/api/auth/check").await;
    assert_eq!(res.json::<Value>()["authenticated"], false);

    let res = server
        .post("/api/auth/logout")
        .add_header(header::AUTHORIZATION, bearer(&token))
        .await;
    assert_eq!(res.status_code(), StatusCode::OK);

    let res = server
        .get("/api/auth/check")
        .add_header(header::AUTHORIZATION, bearer(&token))
        .await;
    assert_eq!(res.json::<Value>()["authenticated"], false);

    let res = server
        .get("/api/admin/tenants")
        .add_header(header::AUTHORIZATION, bearer(&token))
        .await;
    assert_eq!(res.status_code(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_admin_routes_require_a_session() {
    let app = spawn_app().await;
    let server = &app.server;

    let res = server.get("/api/admin/tenants").await;
    assert_eq!(res.status_code(), StatusCode::UNAUTHORIZED);

    let res = server
        .get("/api/admin/tenants")
        .add_header(header::AUTHORIZATION, HeaderValue::from_static("Basic abc"))
        .await;
    assert_eq!(res.status_code(), StatusCode::UNAUTHORIZED);

    let res = server
        .get("/api/admin/tenants")
        .add_header(header::AUTHORIZATION, bearer("not-a-real-token"))
        .await;
    assert_eq!(res.status_code(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_tenant_session_is_scoped_to_its_own_tenant() {
    let app = spawn_app().await;
    let server = &app.server;
    let admin = admin_token(server).await;
    create_tenant(server, &admin, "acme", "acme-password").await;
    create_tenant(server, &admin, "globex", "globex-password").await;

    // Wrong password, then wrong tenant's password.
    for password in ["nope-nope", "globex-password"] {
        let res = server
            .post("/api/tenant/auth/login")
            .add_header(header::HOST, host("acme"))
            .json(&json!({ "password": password }))
            .await;
        assert_eq!(res.status_code(), StatusCode::UNAUTHORIZED);
    }

    let res = server
        .post("/api/tenant/auth/login")
        .add_header(header::HOST, host("acme"))
        .json(&json!({ "password": "acme-password" }))
        .await;
    assert_eq!(res.status_code(), StatusCode::OK);
    let token = res.json::<Value>()["token"].as_str().unwrap().to_string();

    let res = server
        .get("/api/tenant/auth/check")
        .add_header(header::HOST, host("acme"))
        .add_header(header::AUTHORIZATION, bearer(&token))
        .await;
    let body: Value = res.json();
    assert_eq!(body["authenticated"], true);
    assert_eq!(body["tenant"], "acme");

    let res = server
        .get("/api/tenant/auth/check")
        .add_header(header::HOST, host("globex"))
        .add_header(header::AUTHORIZATION, bearer(&token))
        .await;
    assert_eq!(res.json::<Value>()["authenticated"], false);

    let res = server
        .get("/api/auth/check")
        .add_header(header::AUTHORIZATION, bearer(&token))
        .await;
    assert_eq!(res.json::<Value>()["authenticated"], false);

    let res = server
        .post("/api/admin/tenants/acme/models")
        .add_header(header::AUTHORIZATION, bearer(&token))
        .json(&posts_model())
        .await;
    assert_eq!(res.status_code(), StatusCode::CREATED);

    let res = server
        .get("/api/admin/tenants/acme/models")
        .add_header(header::AUTHORIZATION, bearer(&token))
        .await;
    assert_eq!(res.status_code(), StatusCode::OK);
    assert_eq!(res.json::<Value>()["models"].as_array().unwrap().len(), 1);

    let res = server
        .get("/api/admin/tenants/globex/models")
        .add_header(header::AUTHORIZATION, bearer(&token))
        .await;
    assert_eq!(res.status_code(), StatusCode::FORBIDDEN);

    let res = server
        .get("/api/admin/tenants")
        .add_header(header::AUTHORIZATION, bearer(&token))
        .await;
    assert_eq!(res.status_code(), StatusCode::FORBIDDEN);

    let res = server
        .delete("/api/admin/tenants/acme")
        .add_header(header::AUTHORIZATION, bearer(&token))
        .await;
    assert_eq!(res.status_code(), StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn test_tenant_login_needs_a_tenant_host() {
    let app = spawn_app().await;
    let server = &app.server;
    let admin = admin_token(server).await;
    create_tenant(server, &admin, "acme", "acme-password").await;

    for bare in ["example.com", "localhost:3000", "missing.example.com"] {
        let res = server
            .post("/api/tenant/auth/login")
            .add_header(header::HOST, HeaderValue::from_static(bare))
            .json(&json!({ "password": "acme-password" }))
            .await;
        assert_eq!(res.status_code(), StatusCode::NOT_FOUND, "host {bare}");
    }
}

#[tokio::test]
async fn test_deleting_a_tenant_ends_its_sessions() {
    let app = spawn_app().await;
    let server = &app.server;
    let admin = admin_token(server).await;
    create_tenant(server, &admin, "acme", "acme-password").await;

    let res = server
        .post("/api/tenant/auth/login")
        .add_header(header::HOST, host("acme"))
        .json(&json!({ "password": "acme-password" }))
        .await;
    let token = res.json::<Value>()["token"].as_str().unwrap().to_string();

    let res = server
        .delete("/api/admin/tenants/acme")
        .add_header(header::AUTHORIZATION, bearer(&admin))
        .await;
    assert_eq!(res.status_code(), StatusCode::OK);

    let res = server
        .get("/api/admin/tenants/acme/models")
        .add_header(header::AUTHORIZATION, bearer(&token))
        .await;
    assert_eq!(res.status_code(), StatusCode::UNAUTHORIZED);
}
