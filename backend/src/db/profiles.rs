use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, PgConnection};

use crate::db::StoreError;

/// Tenant-scoped profile row. The table name is unqualified on purpose: these
/// queries are only valid on a connection bound through `db::with_tenant`,
/// which routes them to the tenant's namespace via the scoped search path.
#[derive(Debug, Serialize, Deserialize, FromRow)]
pub struct TenantProfile {
    pub business_name: String,
    pub description: String,
    pub logo_url: String,
    pub website: String,
    pub phone: String,
    pub email: String,
    pub timezone: String,
    pub locale: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Deserialize)]
pub struct ProfileUpdate {
    #[serde(default)]
    pub business_name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub logo_url: String,
    #[serde(default)]
    pub website: String,
    #[serde(default)]
    pub phone: String,
    #[serde(default)]
    pub email: String,
    #[serde(default = "default_timezone")]
    pub timezone: String,
    #[serde(default = "default_locale")]
    pub locale: String,
}

fn default_timezone() -> String {
    "UTC".to_string()
}

fn default_locale() -> String {
    "en-US".to_string()
}

const PROFILE_COLUMNS: &str = "business_name, description, logo_url, website, phone, email, \
     timezone, locale, created_at, updated_at";

pub async fn get_profile(conn: &mut PgConnection) -> Result<Option<TenantProfile>, StoreError> {
    let profile = sqlx::query_as::<_, TenantProfile>(&format!(
        "SELECT {PROFILE_COLUMNS} FROM profiles WHERE id = 1"
    ))
    .fetch_optional(conn)
    .await?;
    Ok(profile)
}

pub async fn upsert_profile(
    conn: &mut PgConnection,
    update: &ProfileUpdate,
) -> Result<TenantProfile, StoreError> {
    let profile = sqlx::query_as::<_, TenantProfile>(&format!(
        r#"
        INSERT INTO profiles (id, business_name, description, logo_url, website, phone, email, timezone, locale)
        VALUES (1, $1, $2, $3, $4, $5, $6, $7, $8)
        ON CONFLICT (id) DO UPDATE SET
            business_name = EXCLUDED.business_name,
            description   = EXCLUDED.description,
            logo_url      = EXCLUDED.logo_url,
            website       = EXCLUDED.website,
            phone         = EXCLUDED.phone,
            email         = EXCLUDED.email,
            timezone      = EXCLUDED.timezone,
            locale        = EXCLUDED.locale,
            updated_at    = NOW()
        RETURNING {PROFILE_COLUMNS}
        "#
    ))
    .bind(&update.business_name)
    .bind(&update.description)
    .bind(&update.logo_url)
    .bind(&update.website)
    .bind(&update.phone)
    .bind(&update.email)
    .bind(&update.timezone)
    .bind(&update.locale)
    .fetch_one(conn)
    .await?;
    Ok(profile)
}
