use sqlx::Executor;
use sqlx::PgConnection;

use crate::db::TenantId;

/// Creates the tenant's physical namespace and applies the full tenant-scoped
/// schema to it. No `IF NOT EXISTS` on the schema itself: a concurrent
/// duplicate create must surface as a conflict so the provisioning loop can
/// re-check and join the existing tenant instead of silently sharing a
/// half-migrated namespace.
///
/// PostgreSQL DDL is transactional, so when this runs inside the provisioning
/// transaction a failed migration rolls the namespace back with everything else.
pub async fn create_namespace(conn: &mut PgConnection, tenant: &TenantId) -> Result<(), sqlx::Error> {
    conn.execute(sqlx::query(&format!(r#"CREATE SCHEMA "{}""#, tenant.as_str()))).await?;
    migrate_namespace(conn, tenant).await?;
    tracing::info!(tenant = %tenant, "Tenant namespace created and migrated");
    Ok(())
}

/// The conflict check run immediately before namespace creation and on every
/// scope bind. Two concurrent provisioning transactions may both pass this
/// read before either writes; the unique constraint on the tenant catalog is
/// what actually arbitrates that race.
pub async fn namespace_exists(conn: &mut PgConnection, tenant: &TenantId) -> Result<bool, sqlx::Error> {
    sqlx::query_scalar::<_, bool>(
        "SELECT EXISTS (SELECT 1 FROM pg_catalog.pg_namespace WHERE nspname = $1)",
    )
    .bind(tenant.as_str())
    .fetch_one(conn)
    .await
}

/// (Re)applies the current tenant-scoped schema definition. Every statement is
/// `IF NOT EXISTS`, so calling this redundantly is safe; it is also the upgrade
/// path when tenant entity definitions change.
pub async fn migrate_namespace(conn: &mut PgConnection, tenant: &TenantId) -> Result<(), sqlx::Error> {
    // `raw_sql(..).execute(conn)` produces a future the compiler cannot prove
    // `Send` (rust-lang/rust#89976); the method-call form avoids that.
    for statement in tenant_schema_ddl(tenant) {
        conn.execute(sqlx::raw_sql(&statement)).await?;
    }
    Ok(())
}

/// Irreversibly deletes the namespace and every row in it. Only reachable
/// through the operator CLI, never from a request handler.
pub async fn drop_namespace(conn: &mut PgConnection, tenant: &TenantId) -> Result<(), sqlx::Error> {
    tracing::warn!(tenant = %tenant, "Dropping tenant namespace and all contained data");
    conn.execute(sqlx::raw_sql(&format!(r#"DROP SCHEMA IF EXISTS "{}" CASCADE"#, tenant.as_str())))
        .await?;
    Ok(())
}

/// Tenant-scoped DDL. Table names are unqualified on read/write paths (routed
/// by the scoped search path), so the DDL is the only place the schema name
/// appears.
fn tenant_schema_ddl(tenant: &TenantId) -> Vec<String> {
    let schema = tenant.as_str();
    vec![
        format!(
            r#"CREATE TABLE IF NOT EXISTS "{schema}".profiles (
                id            SMALLINT PRIMARY KEY DEFAULT 1 CHECK (id = 1),
                business_name VARCHAR(255) NOT NULL DEFAULT '',
                description   TEXT NOT NULL DEFAULT '',
                logo_url      VARCHAR(512) NOT NULL DEFAULT '',
                website       VARCHAR(255) NOT NULL DEFAULT '',
                phone         VARCHAR(50) NOT NULL DEFAULT '',
                email         VARCHAR(255) NOT NULL DEFAULT '',
                timezone      VARCHAR(50) NOT NULL DEFAULT 'UTC',
                locale        VARCHAR(10) NOT NULL DEFAULT 'en-US',
                created_at    TIMESTAMPTZ NOT NULL DEFAULT NOW(),
                updated_at    TIMESTAMPTZ NOT NULL DEFAULT NOW()
            )"#
        ),
        format!(
            r#"CREATE TABLE IF NOT EXISTS "{schema}".accounts (
                id                 SMALLINT PRIMARY KEY DEFAULT 1 CHECK (id = 1),
                paid_account       BOOLEAN NOT NULL DEFAULT FALSE,
                basic_credits      INTEGER NOT NULL DEFAULT 0,
                premium_credits    INTEGER NOT NULL DEFAULT 0,
                subscription_plan  VARCHAR(50) NOT NULL DEFAULT 'free',
                subscription_start TIMESTAMPTZ,
                subscription_end   TIMESTAMPTZ,
                domain_registered  BOOLEAN NOT NULL DEFAULT FALSE,
                created_at         TIMESTAMPTZ NOT NULL DEFAULT NOW(),
                updated_at         TIMESTAMPTZ NOT NULL DEFAULT NOW()
            )"#
        ),
        format!(
            r#"CREATE TABLE IF NOT EXISTS "{schema}".domains (
                id             BIGSERIAL PRIMARY KEY,
                domain         VARCHAR(255) NOT NULL UNIQUE,
                domain_type    VARCHAR(50) NOT NULL DEFAULT 'subdomain',
                verified       BOOLEAN NOT NULL DEFAULT FALSE,
                verified_at    TIMESTAMPTZ,
                ssl_enabled    BOOLEAN NOT NULL DEFAULT FALSE,
                dns_configured BOOLEAN NOT NULL DEFAULT FALSE,
                "primary"      BOOLEAN NOT NULL DEFAULT FALSE,
                created_at     TIMESTAMPTZ NOT NULL DEFAULT NOW(),
                updated_at     TIMESTAMPTZ NOT NULL DEFAULT NOW()
            )"#
        ),
        format!(
            r#"CREATE TABLE IF NOT EXISTS "{schema}".filesystem (
                id           BIGSERIAL PRIMARY KEY,
                key          VARCHAR(255) NOT NULL,
                data         JSONB NOT NULL,
                content_type VARCHAR(100) NOT NULL DEFAULT 'application/json',
                size         BIGINT NOT NULL DEFAULT 0,
                checksum     VARCHAR(64) NOT NULL DEFAULT '',
                created_at   TIMESTAMPTZ NOT NULL DEFAULT NOW(),
                updated_at   TIMESTAMPTZ NOT NULL DEFAULT NOW()
            )"#
        ),
        format!(
            r#"CREATE INDEX IF NOT EXISTS filesystem_key_idx ON "{schema}".filesystem (key)"#
        ),
        format!(
            r#"CREATE TABLE IF NOT EXISTS "{schema}".chats (
                id         BIGSERIAL PRIMARY KEY,
                chat_id    VARCHAR(36) NOT NULL UNIQUE,
                messages   JSONB NOT NULL DEFAULT '[]',
                chat_stage VARCHAR(50) NOT NULL DEFAULT '',
                last_role  VARCHAR(20) NOT NULL DEFAULT '',
                created_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
                updated_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
            )"#
        ),
    ]
}
