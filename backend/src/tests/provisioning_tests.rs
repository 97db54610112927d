//! End-to-end provisioning and isolation tests against a real PostgreSQL
//! server. Ignored by default; set `DATABASE_URL` to a disposable database and
//! run with `cargo test -- --ignored`.

use axum::http::StatusCode;
use axum_test::TestServer;
use serde_json::{Value, json};
use sqlx::postgres::PgPoolOptions;
use uuid::Uuid;

use crate::app;
use crate::cfg;
use crate::core;
use crate::db;
use crate::db::{DbPool, ProviderKind, ScopeError, TenantId};
use crate::routes::profile::ProfileError;
use crate::services::onboarding;
use crate::services::onboarding::{OnboardingError, ProvisionParams};
use crate::services::sso;
use crate::services::sso::ExternalIdentity;
use crate::tests::jwt_tests::test_jwt_context;

async fn test_pool() -> DbPool {
    dotenvy::dotenv().ok();
    let url = std::env::var("DATABASE_URL")
        .unwrap_or_else(|_| "postgres://localhost/pergola_test".to_string());
    let pool = PgPoolOptions::new().max_connections(5).connect(&url).await.unwrap();
    db::migrate_shared_catalog(&pool).await.unwrap();
    pool
}

/// Unique per-run fragment so repeated runs never collide in the catalog.
fn run_id() -> String {
    Uuid::new_v4().simple().to_string()[..10].to_string()
}

/// Full router over a real pool, for handlers that hit the database.
fn create_live_server(pool: DbPool) -> TestServer {
    let settings = cfg::AppSettings::default();
    let jwt = test_jwt_context();
    let oauth = sso::OAuthRegistry::from_settings(&settings.oauth).unwrap();
    let http_client = reqwest::Client::new();
    let context = core::Context::new(pool, jwt, oauth, http_client, settings);
    TestServer::new(app::create_router(context)).unwrap()
}

fn params_for(email: &str) -> ProvisionParams {
    ProvisionParams {
        email: email.to_string(),
        password_hash: Some("$argon2id$fake$hash".to_string()),
        first_name: "Test".to_string(),
        last_name: "User".to_string(),
        ..ProvisionParams::default()
    }
}

#[tokio::test]
#[ignore = "requires a PostgreSQL server (set DATABASE_URL)"]
async fn provisioning_creates_user_tenant_and_namespace() {
    let pool = test_pool().await;
    let id = run_id();

    let provisioned =
        onboarding::provision_user_and_tenant(&pool, &params_for(&format!("u{id}@example.com")))
            .await
            .unwrap();

    assert!(provisioned.tenant_created);
    assert_eq!(provisioned.tenant.schema_name, format!("u{id}"));
    assert_eq!(provisioned.membership.role, db::ROLE_ADMIN);
    assert!(provisioned.membership.primary_tenant);
    assert!(provisioned.tenant.active);

    let tenant: TenantId = provisioned.tenant.schema_name.parse().unwrap();
    let mut conn = pool.acquire().await.unwrap();
    assert!(db::namespace_exists(&mut conn, &tenant).await.unwrap());
}

#[tokio::test]
#[ignore = "requires a PostgreSQL server (set DATABASE_URL)"]
async fn second_user_joining_explicit_tenant_becomes_member() {
    let pool = test_pool().await;
    let id = run_id();
    let tenant: TenantId = format!("team_{id}").parse().unwrap();

    let mut first = params_for(&format!("first{id}@example.com"));
    first.tenant = Some(tenant.clone());
    let first = onboarding::provision_user_and_tenant(&pool, &first).await.unwrap();
    assert!(first.tenant_created);
    assert_eq!(first.membership.role, db::ROLE_ADMIN);

    let mut second = params_for(&format!("second{id}@example.com"));
    second.tenant = Some(tenant.clone());
    let second = onboarding::provision_user_and_tenant(&pool, &second).await.unwrap();
    assert!(!second.tenant_created);
    assert_eq!(second.membership.role, db::ROLE_MEMBER);
    assert!(second.membership.primary_tenant, "primary is per user, not per tenant");
    assert_eq!(second.tenant.schema_name, tenant.as_str());
}

#[tokio::test]
#[ignore = "requires a PostgreSQL server (set DATABASE_URL)"]
async fn duplicate_email_is_rejected_without_leftovers() {
    let pool = test_pool().await;
    let id = run_id();
    let email = format!("dup{id}@example.com");

    onboarding::provision_user_and_tenant(&pool, &params_for(&email)).await.unwrap();
    let err = onboarding::provision_user_and_tenant(&pool, &params_for(&email)).await.unwrap_err();
    assert!(matches!(err, OnboardingError::DuplicateAccount));

    // the failed attempt must not have allocated a suffixed tenant
    let suffixed = db::find_tenant_by_schema(&pool, &format!("dup{id}_1")).await.unwrap();
    assert!(suffixed.is_none());
}

#[tokio::test]
#[ignore = "requires a PostgreSQL server (set DATABASE_URL)"]
async fn derived_slug_collision_joins_the_existing_tenant() {
    let pool = test_pool().await;
    let id = run_id();

    // same email local part at different domains derives the same slug
    let first =
        onboarding::provision_user_and_tenant(&pool, &params_for(&format!("c{id}@one.example")))
            .await
            .unwrap();
    let second =
        onboarding::provision_user_and_tenant(&pool, &params_for(&format!("c{id}@two.example")))
            .await
            .unwrap();

    assert_eq!(first.tenant.schema_name, format!("c{id}"));
    assert_eq!(second.tenant.schema_name, first.tenant.schema_name);
    assert!(!second.tenant_created);
    assert_eq!(first.membership.role, db::ROLE_ADMIN);
    assert_eq!(second.membership.role, db::ROLE_MEMBER);
    assert!(second.membership.primary_tenant);
}

#[tokio::test]
#[ignore = "requires a PostgreSQL server (set DATABASE_URL)"]
async fn failed_namespace_creation_rolls_back_everything() {
    let pool = test_pool().await;
    let id = run_id();
    let tenant: TenantId = format!("orphan_{id}").parse().unwrap();
    let email = format!("orphan{id}@example.com");

    // a namespace with no catalog row, so the catalog insert succeeds and the
    // schema creation collides
    sqlx::query(&format!(r#"CREATE SCHEMA "{}""#, tenant.as_str()))
        .execute(&pool)
        .await
        .unwrap();

    let mut params = params_for(&email);
    params.tenant = Some(tenant.clone());
    let err = onboarding::provision_user_and_tenant(&pool, &params).await.unwrap_err();
    assert!(matches!(err, OnboardingError::ProvisioningFailed(_)));

    // nothing survives the rollback, not even the user row
    assert!(db::find_user_by_email(&pool, &email).await.unwrap().is_none());
    assert!(db::find_tenant_by_schema(&pool, tenant.as_str()).await.unwrap().is_none());
}

#[tokio::test]
#[ignore = "requires a PostgreSQL server (set DATABASE_URL)"]
async fn tenant_data_is_invisible_across_namespaces() {
    let pool = test_pool().await;
    let id = run_id();

    let a = onboarding::provision_user_and_tenant(&pool, &params_for(&format!("iso_a{id}@example.com")))
        .await
        .unwrap();
    let b = onboarding::provision_user_and_tenant(&pool, &params_for(&format!("iso_b{id}@example.com")))
        .await
        .unwrap();
    let tenant_a: TenantId = a.tenant.schema_name.parse().unwrap();
    let tenant_b: TenantId = b.tenant.schema_name.parse().unwrap();

    let update = serde_json::from_value::<db::ProfileUpdate>(serde_json::json!({
        "business_name": "Tenant A Corp"
    }))
    .unwrap();
    db::with_tenant::<_, ProfileError, _>(&pool, &tenant_a, async |conn| {
        db::upsert_profile(conn, &update).await.map_err(ProfileError::from)
    })
    .await
    .unwrap();

    let in_a = db::with_tenant::<_, ProfileError, _>(&pool, &tenant_a, async |conn| {
        db::get_profile(conn).await.map_err(ProfileError::from)
    })
    .await
    .unwrap();
    assert_eq!(in_a.unwrap().business_name, "Tenant A Corp");

    let in_b = db::with_tenant::<_, ProfileError, _>(&pool, &tenant_b, async |conn| {
        db::get_profile(conn).await.map_err(ProfileError::from)
    })
    .await
    .unwrap();
    assert!(in_b.is_none(), "tenant B can see tenant A's profile");
}

#[tokio::test]
#[ignore = "requires a PostgreSQL server (set DATABASE_URL)"]
async fn scope_refuses_unknown_namespaces() {
    let pool = test_pool().await;
    let tenant: TenantId = format!("ghost_{}", run_id()).parse().unwrap();

    let err = db::with_tenant::<(), ScopeError, _>(&pool, &tenant, async |_conn| Ok(()))
        .await
        .unwrap_err();
    assert!(matches!(err, ScopeError::NamespaceNotFound(_)));
}

#[tokio::test]
#[ignore = "requires a PostgreSQL server (set DATABASE_URL)"]
async fn password_reset_request_acknowledges_uniformly() {
    let pool = test_pool().await;
    let id = run_id();
    let email = format!("reset{id}@example.com");
    onboarding::provision_user_and_tenant(&pool, &params_for(&email)).await.unwrap();
    let server = create_live_server(pool);

    let matched = server
        .post("/auth/password-reset/request")
        .json(&json!({ "email": email }))
        .await;
    let missed = server
        .post("/auth/password-reset/request")
        .json(&json!({ "email": format!("nobody{id}@example.com") }))
        .await;

    matched.assert_status(StatusCode::OK);
    missed.assert_status(StatusCode::OK);
    // a matched email must not be observable: identical bodies, no token field
    assert_eq!(matched.text(), missed.text());
    let body: Value = matched.json();
    assert!(body.get("reset_token").is_none());
}

#[tokio::test]
#[ignore = "requires a PostgreSQL server (set DATABASE_URL)"]
async fn oauth_identity_links_to_existing_account_by_email() {
    let pool = test_pool().await;
    let id = run_id();
    let email = format!("link{id}@example.com");

    let provisioned = onboarding::provision_user_and_tenant(&pool, &params_for(&email)).await.unwrap();

    let identity = ExternalIdentity {
        provider: ProviderKind::Google,
        external_id: format!("google-{id}"),
        email: Some(email.clone()),
        first_name: "Test".to_string(),
        last_name: "User".to_string(),
        email_verified: true,
    };
    let (user, created) = onboarding::find_or_create_via_oauth(&pool, &identity).await.unwrap();
    assert!(!created);
    assert_eq!(user.id, provisioned.user.id);

    // second sign-in resolves through the stored external id
    let (again, created) = onboarding::find_or_create_via_oauth(&pool, &identity).await.unwrap();
    assert!(!created);
    assert_eq!(again.id, user.id);
}

#[tokio::test]
#[ignore = "requires a PostgreSQL server (set DATABASE_URL)"]
async fn oauth_without_email_provisions_with_placeholder() {
    let pool = test_pool().await;
    let id = run_id();

    let identity = ExternalIdentity {
        provider: ProviderKind::TikTok,
        external_id: format!("tk{id}"),
        email: None,
        first_name: "Creator".to_string(),
        last_name: String::new(),
        email_verified: false,
    };
    let (user, created) = onboarding::find_or_create_via_oauth(&pool, &identity).await.unwrap();
    assert!(created);
    assert_eq!(user.email, format!("tiktok_tk{id}@placeholder.local"));
    assert!(user.password_hash.is_none());

    let schema = onboarding::primary_tenant_schema(&pool, user.id).await.unwrap();
    assert!(schema.is_some());
}
