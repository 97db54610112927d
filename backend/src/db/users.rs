use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

use crate::db::StoreError;

/// Supported external identity providers. The variants name the user columns
/// holding the provider-specific external id, so provider dispatch never
/// degenerates into string comparisons at the query sites.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProviderKind {
    Google,
    Facebook,
    TikTok,
}

impl ProviderKind {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Google => "google",
            Self::Facebook => "facebook",
            Self::TikTok => "tiktok",
        }
    }

    /// Column of `public.users` holding this provider's external id.
    #[must_use]
    pub const fn id_column(self) -> &'static str {
        match self {
            Self::Google => "google_id",
            Self::Facebook => "facebook_id",
            Self::TikTok => "tiktok_id",
        }
    }

    #[must_use]
    pub fn from_path(raw: &str) -> Option<Self> {
        match raw {
            "google" => Some(Self::Google),
            "facebook" => Some(Self::Facebook),
            "tiktok" => Some(Self::TikTok),
            _ => None,
        }
    }
}

impl std::fmt::Display for ProviderKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Serialize, Deserialize, FromRow)]
pub struct User {
    pub id: i64,
    pub email: String,

    #[serde(skip_serializing)]
    pub password_hash: Option<String>, // Null for accounts created via an identity provider

    pub first_name: String,
    pub last_name: String,
    pub email_verified: bool,
    pub email_verified_at: Option<DateTime<Utc>>,
    pub last_login_at: Option<DateTime<Utc>>,
    pub active: bool,

    #[serde(skip_serializing)]
    pub google_id: Option<String>,

    #[serde(skip_serializing)]
    pub facebook_id: Option<String>,

    #[serde(skip_serializing)]
    pub tiktok_id: Option<String>,

    #[serde(skip_serializing)]
    pub password_reset_token: Option<String>, // SHA-256 of the token actually sent out

    #[serde(skip_serializing)]
    pub password_reset_expires: Option<DateTime<Utc>>,

    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Default)]
pub struct NewUser {
    pub email: String,
    pub password_hash: Option<String>,
    pub first_name: String,
    pub last_name: String,
    pub email_verified: bool,
    pub google_id: Option<String>,
    pub facebook_id: Option<String>,
    pub tiktok_id: Option<String>,
}

const USER_COLUMNS: &str = "id, email, password_hash, first_name, last_name, email_verified, \
     email_verified_at, last_login_at, active, google_id, facebook_id, tiktok_id, \
     password_reset_token, password_reset_expires, created_at, updated_at";

pub async fn create_user(
    db: impl sqlx::PgExecutor<'_>,
    new_user: &NewUser,
) -> Result<User, StoreError> {
    let user = sqlx::query_as::<_, User>(&format!(
        r#"
        INSERT INTO public.users
            (email, password_hash, first_name, last_name, email_verified, google_id, facebook_id, tiktok_id)
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
        RETURNING {USER_COLUMNS}
        "#
    ))
    .bind(&new_user.email)
    .bind(&new_user.password_hash)
    .bind(&new_user.first_name)
    .bind(&new_user.last_name)
    .bind(new_user.email_verified)
    .bind(&new_user.google_id)
    .bind(&new_user.facebook_id)
    .bind(&new_user.tiktok_id)
    .fetch_one(db)
    .await?;
    Ok(user)
}

pub async fn get_user_by_id(db: impl sqlx::PgExecutor<'_>, id: i64) -> Result<User, StoreError> {
    let user = sqlx::query_as::<_, User>(&format!(
        "SELECT {USER_COLUMNS} FROM public.users WHERE id = $1"
    ))
    .bind(id)
    .fetch_optional(db)
    .await?;
    user.ok_or(StoreError::UserNotFound)
}

pub async fn find_user_by_email(
    db: impl sqlx::PgExecutor<'_>,
    email: &str,
) -> Result<Option<User>, StoreError> {
    let user = sqlx::query_as::<_, User>(&format!(
        "SELECT {USER_COLUMNS} FROM public.users WHERE email = $1"
    ))
    .bind(email)
    .fetch_optional(db)
    .await?;
    Ok(user)
}

pub async fn find_user_by_external_id(
    db: impl sqlx::PgExecutor<'_>,
    provider: ProviderKind,
    external_id: &str,
) -> Result<Option<User>, StoreError> {
    let user = sqlx::query_as::<_, User>(&format!(
        "SELECT {USER_COLUMNS} FROM public.users WHERE {} = $1",
        provider.id_column()
    ))
    .bind(external_id)
    .fetch_optional(db)
    .await?;
    Ok(user)
}

/// Attaches the provider's external id to an existing account (email-based
/// dedup path) and records the login.
pub async fn link_external_id(
    db: impl sqlx::PgExecutor<'_>,
    user_id: i64,
    provider: ProviderKind,
    external_id: &str,
) -> Result<(), StoreError> {
    sqlx::query(&format!(
        "UPDATE public.users SET {} = $1, last_login_at = NOW(), updated_at = NOW() WHERE id = $2",
        provider.id_column()
    ))
    .bind(external_id)
    .bind(user_id)
    .execute(db)
    .await?;
    Ok(())
}

pub async fn touch_last_login(
    db: impl sqlx::PgExecutor<'_>,
    user_id: i64,
) -> Result<(), StoreError> {
    sqlx::query("UPDATE public.users SET last_login_at = NOW(), updated_at = NOW() WHERE id = $1")
        .bind(user_id)
        .execute(db)
        .await?;
    Ok(())
}

pub async fn update_user_name(
    db: impl sqlx::PgExecutor<'_>,
    user_id: i64,
    first_name: &str,
    last_name: &str,
) -> Result<User, StoreError> {
    let user = sqlx::query_as::<_, User>(&format!(
        r#"
        UPDATE public.users SET first_name = $1, last_name = $2, updated_at = NOW()
        WHERE id = $3
        RETURNING {USER_COLUMNS}
        "#
    ))
    .bind(first_name)
    .bind(last_name)
    .bind(user_id)
    .fetch_optional(db)
    .await?;
    user.ok_or(StoreError::UserNotFound)
}

pub async fn set_password_reset_token(
    db: impl sqlx::PgExecutor<'_>,
    user_id: i64,
    token_hash: &str,
    expires_at: DateTime<Utc>,
) -> Result<(), StoreError> {
    sqlx::query(
        r"
        UPDATE public.users
        SET password_reset_token = $1, password_reset_expires = $2, updated_at = NOW()
        WHERE id = $3
        ",
    )
    .bind(token_hash)
    .bind(expires_at)
    .bind(user_id)
    .execute(db)
    .await?;
    Ok(())
}

pub async fn find_user_by_reset_token(
    db: impl sqlx::PgExecutor<'_>,
    token_hash: &str,
) -> Result<Option<User>, StoreError> {
    let user = sqlx::query_as::<_, User>(&format!(
        "SELECT {USER_COLUMNS} FROM public.users WHERE password_reset_token = $1"
    ))
    .bind(token_hash)
    .fetch_optional(db)
    .await?;
    Ok(user)
}

/// Replaces the password hash and consumes the reset token.
pub async fn reset_password(
    db: impl sqlx::PgExecutor<'_>,
    user_id: i64,
    password_hash: &str,
) -> Result<(), StoreError> {
    sqlx::query(
        r"
        UPDATE public.users
        SET password_hash = $1, password_reset_token = NULL, password_reset_expires = NULL, updated_at = NOW()
        WHERE id = $2
        ",
    )
    .bind(password_hash)
    .bind(user_id)
    .execute(db)
    .await?;
    Ok(())
}
