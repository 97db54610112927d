use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

use crate::db::StoreError;

pub const ROLE_ADMIN: &str = "admin";
pub const ROLE_MEMBER: &str = "member";

/// Shared-catalog user↔tenant link. The first membership ever created for a
/// tenant schema carries `admin`, assigned inside the provisioning
/// transaction; there is no separate approval step.
#[derive(Debug, Serialize, Deserialize, FromRow)]
pub struct Membership {
    pub id: i64,
    pub user_id: i64,
    pub tenant_schema: String,
    pub role: String,
    pub primary_tenant: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Membership joined with its tenant row, for the self-service tenant list.
#[derive(Debug, Serialize, Deserialize, FromRow)]
pub struct UserTenant {
    pub tenant_schema: String,
    pub name: String,
    pub display_name: String,
    pub role: String,
    pub primary_tenant: bool,
    pub active: bool,
}

const MEMBERSHIP_COLUMNS: &str =
    "id, user_id, tenant_schema, role, primary_tenant, created_at, updated_at";

pub async fn create_membership(
    db: impl sqlx::PgExecutor<'_>,
    user_id: i64,
    tenant_schema: &str,
    role: &str,
    primary_tenant: bool,
) -> Result<Membership, StoreError> {
    let membership = sqlx::query_as::<_, Membership>(&format!(
        r#"
        INSERT INTO public.user_tenants (user_id, tenant_schema, role, primary_tenant)
        VALUES ($1, $2, $3, $4)
        RETURNING {MEMBERSHIP_COLUMNS}
        "#
    ))
    .bind(user_id)
    .bind(tenant_schema)
    .bind(role)
    .bind(primary_tenant)
    .fetch_one(db)
    .await?;
    Ok(membership)
}

pub async fn count_memberships_for_tenant(
    db: impl sqlx::PgExecutor<'_>,
    tenant_schema: &str,
) -> Result<i64, StoreError> {
    let count = sqlx::query_scalar::<_, i64>(
        "SELECT COUNT(*) FROM public.user_tenants WHERE tenant_schema = $1",
    )
    .bind(tenant_schema)
    .fetch_one(db)
    .await?;
    Ok(count)
}

/// The user's default tenant: the membership flagged primary, or the
/// earliest-created one when none is flagged.
pub async fn find_primary_membership(
    db: impl sqlx::PgExecutor<'_>,
    user_id: i64,
) -> Result<Option<Membership>, StoreError> {
    let membership = sqlx::query_as::<_, Membership>(&format!(
        r#"
        SELECT {MEMBERSHIP_COLUMNS} FROM public.user_tenants
        WHERE user_id = $1
        ORDER BY primary_tenant DESC, created_at ASC
        LIMIT 1
        "#
    ))
    .bind(user_id)
    .fetch_optional(db)
    .await?;
    Ok(membership)
}

pub async fn list_user_tenants(
    db: impl sqlx::PgExecutor<'_>,
    user_id: i64,
) -> Result<Vec<UserTenant>, StoreError> {
    let rows = sqlx::query_as::<_, UserTenant>(
        r"
        SELECT ut.tenant_schema, t.name, t.display_name, ut.role, ut.primary_tenant, t.active
        FROM public.user_tenants ut
        JOIN public.tenants t ON t.schema_name = ut.tenant_schema
        WHERE ut.user_id = $1
        ORDER BY ut.created_at ASC
        ",
    )
    .bind(user_id)
    .fetch_all(db)
    .await?;
    Ok(rows)
}
