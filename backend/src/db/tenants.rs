use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

use crate::db::{StoreError, TenantId};

/// Shared-catalog tenant row. `schema_name` is the immutable primary key;
/// renaming a tenant namespace is a full migration, never a field update.
#[derive(Debug, Serialize, Deserialize, FromRow)]
pub struct Tenant {
    pub schema_name: String,
    pub name: String,
    pub display_name: String,
    pub domain_url: String,
    pub active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug)]
pub struct NewTenant {
    pub schema_name: TenantId,
    pub name: String,
    pub display_name: String,
    pub domain_url: String,
}

const TENANT_COLUMNS: &str = "schema_name, name, display_name, domain_url, active, created_at, updated_at";

pub async fn create_tenant(
    db: impl sqlx::PgExecutor<'_>,
    new_tenant: &NewTenant,
) -> Result<Tenant, StoreError> {
    let tenant = sqlx::query_as::<_, Tenant>(&format!(
        r#"
        INSERT INTO public.tenants (schema_name, name, display_name, domain_url)
        VALUES ($1, $2, $3, $4)
        RETURNING {TENANT_COLUMNS}
        "#
    ))
    .bind(new_tenant.schema_name.as_str())
    .bind(&new_tenant.name)
    .bind(&new_tenant.display_name)
    .bind(&new_tenant.domain_url)
    .fetch_one(db)
    .await?;
    Ok(tenant)
}

pub async fn find_tenant_by_schema(
    db: impl sqlx::PgExecutor<'_>,
    schema_name: &str,
) -> Result<Option<Tenant>, StoreError> {
    let tenant = sqlx::query_as::<_, Tenant>(&format!(
        "SELECT {TENANT_COLUMNS} FROM public.tenants WHERE schema_name = $1"
    ))
    .bind(schema_name)
    .fetch_optional(db)
    .await?;
    Ok(tenant)
}

/// Soft disable; the namespace and its data stay untouched.
pub async fn set_tenant_active(
    db: impl sqlx::PgExecutor<'_>,
    schema_name: &str,
    active: bool,
) -> Result<(), StoreError> {
    let result = sqlx::query(
        "UPDATE public.tenants SET active = $1, updated_at = NOW() WHERE schema_name = $2",
    )
    .bind(active)
    .bind(schema_name)
    .execute(db)
    .await?;
    if result.rows_affected() == 0 {
        return Err(StoreError::TenantNotFound);
    }
    Ok(())
}

pub async fn list_tenants(db: impl sqlx::PgExecutor<'_>) -> Result<Vec<Tenant>, StoreError> {
    let tenants = sqlx::query_as::<_, Tenant>(&format!(
        "SELECT {TENANT_COLUMNS} FROM public.tenants ORDER BY created_at"
    ))
    .fetch_all(db)
    .await?;
    Ok(tenants)
}
