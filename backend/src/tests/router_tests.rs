use axum::http::StatusCode;
use axum_test::TestServer;
use chrono::Utc;
use jsonwebtoken as jwt;
use serde_json::Value;
use sqlx::postgres::PgPoolOptions;
use uuid::Uuid;

use crate::app;
use crate::auth;
use crate::cfg;
use crate::core;
use crate::services::sso;
use crate::tests::jwt_tests::{TEST_ISSUER, test_jwt_context};

/// Builds a test server around a lazy pool: no connection is made until a
/// handler actually issues a query, so everything that fails in middleware can
/// be tested without a database.
fn create_test_server() -> TestServer {
    let settings = cfg::AppSettings::default();
    let db = PgPoolOptions::new()
        .max_connections(1)
        .connect_lazy("postgres://localhost/pergola_test")
        .unwrap();
    let jwt = test_jwt_context();
    let oauth = sso::OAuthRegistry::from_settings(&settings.oauth).unwrap();
    let http_client = reqwest::Client::builder()
        .redirect(reqwest::redirect::Policy::none())
        .build()
        .expect("Failed to create HTTP client");

    let context = core::Context::new(db, jwt, oauth, http_client, settings);
    let router = app::create_router(context);
    TestServer::new(router).unwrap()
}

fn bearer(token: &str) -> String {
    format!("Bearer {token}")
}

#[tokio::test]
async fn health_needs_no_token() {
    let server = create_test_server();

    let response = server.get("/health").await;
    response.assert_status(StatusCode::OK);
    let body: Value = response.json();
    assert_eq!(body["status"], "ok");
    assert!(body["version"].is_string());
}

#[tokio::test]
async fn api_without_token_is_unauthorized() {
    let server = create_test_server();

    let response = server.get("/api/profile").await;
    response.assert_status(StatusCode::UNAUTHORIZED);
    let body: Value = response.json();
    assert_eq!(body["result"], "error");
    assert_eq!(body["message"], "Missing authorization token");
}

#[tokio::test]
async fn api_with_garbage_token_is_unauthorized() {
    let server = create_test_server();

    let response = server
        .get("/api/profile")
        .add_header("Authorization", bearer("not.a.token"))
        .await;
    response.assert_status(StatusCode::UNAUTHORIZED);
    let body: Value = response.json();
    assert_eq!(body["message"], "Invalid authentication token");
}

#[tokio::test]
async fn api_with_expired_token_says_so() {
    let server = create_test_server();
    let ctx = test_jwt_context();

    let now = Utc::now().timestamp();
    let claims = auth::Claims {
        iss: TEST_ISSUER.to_string(),
        sub: "1".to_string(),
        iat: now - 7200,
        nbf: now - 7200,
        exp: now - 3600,
        jti: Uuid::new_v4().to_string(),
        user_id: 1,
        email: "a@b.c".to_string(),
        tenant_schema: None,
    };
    let header = jwt::Header::new(jwt::Algorithm::ES256);
    let token = jwt::encode(&header, &claims, &ctx.encoding_key).unwrap();

    let response = server
        .get("/api/profile")
        .add_header("Authorization", bearer(&token))
        .await;
    response.assert_status(StatusCode::UNAUTHORIZED);
    let body: Value = response.json();
    assert_eq!(body["message"], "Authentication token has expired");
}

#[tokio::test]
async fn api_without_tenant_is_a_bad_request() {
    let server = create_test_server();
    let ctx = test_jwt_context();
    let token = auth::issue_token(&ctx, 1, "a@b.c", None).unwrap();

    let response = server
        .get("/api/profile")
        .add_header("Authorization", bearer(&token))
        .await;
    response.assert_status(StatusCode::BAD_REQUEST);
    let body: Value = response.json();
    assert_eq!(body["message"], "Tenant not specified");
}

#[tokio::test]
async fn api_with_invalid_tenant_header_is_rejected() {
    let server = create_test_server();
    let ctx = test_jwt_context();
    let token = auth::issue_token(&ctx, 1, "a@b.c", Some("good_tenant")).unwrap();

    // the invalid header must not fall back to the valid token claim
    let response = server
        .get("/api/profile")
        .add_header("Authorization", bearer(&token))
        .add_header("X-Tenant-ID", "bad;tenant")
        .await;
    response.assert_status(StatusCode::BAD_REQUEST);
    let body: Value = response.json();
    assert_eq!(body["message"], "Invalid tenant identifier");
}

#[tokio::test]
async fn users_routes_require_authentication() {
    let server = create_test_server();

    let response = server.get("/users/me").await;
    response.assert_status(StatusCode::UNAUTHORIZED);

    let response = server.get("/users/me/tenants").await;
    response.assert_status(StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn oauth_routes_absent_when_no_provider_is_configured() {
    let server = create_test_server();

    let response = server.get("/auth/oauth/google").await;
    response.assert_status(StatusCode::NOT_FOUND);
}
