use std::fmt;

use serde::Serialize;
use sqlx::{PgConnection, PgPool};
use thiserror::Error;

use crate::db;

pub const TENANT_ID_MIN_LEN: usize = 3;
pub const TENANT_ID_MAX_LEN: usize = 63;

#[derive(Debug, Error)]
#[error("invalid tenant identifier")]
pub struct InvalidTenantId;

/// A validated tenant schema identifier.
///
/// This is the only way a namespace is named anywhere in the crate: the
/// restricted character set makes the value safe to splice into quoted
/// schema-qualified DDL, and parsing is pure so requests with a bad
/// identifier are rejected before any database access.
#[derive(Clone, Debug, Eq, Hash, PartialEq, Serialize)]
#[serde(transparent)]
pub struct TenantId(String);

impl TenantId {
    pub fn parse(raw: &str) -> Result<Self, InvalidTenantId> {
        let len_ok = (TENANT_ID_MIN_LEN..=TENANT_ID_MAX_LEN).contains(&raw.len());
        let chars_ok = raw.chars().all(|c| c.is_ascii_alphanumeric() || c == '_');
        if len_ok && chars_ok {
            Ok(Self(raw.to_string()))
        } else {
            Err(InvalidTenantId)
        }
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for TenantId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl std::str::FromStr for TenantId {
    type Err = InvalidTenantId;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

#[rustfmt::skip]
#[derive(Debug, Error)]
pub enum ScopeError {
    #[error("Tenant namespace does not exist: {0}")]
    NamespaceNotFound(TenantId),

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),
}

/// Runs `f` against a connection bound to the tenant's namespace.
///
/// The scope is a single transaction: the namespace is checked for existence
/// (bind failure returns `NamespaceNotFound` without invoking `f`), the search
/// path is switched with `SET LOCAL` so it dies with the transaction and a
/// pooled connection can never escape carrying a tenant binding, and the
/// transaction commits only when `f` returns `Ok`. `public` is deliberately
/// excluded from the search path: tenant-scoped SQL cannot fall through to a
/// shared-catalog table.
pub async fn with_tenant<T, E, F>(pool: &PgPool, tenant: &TenantId, f: F) -> Result<T, E>
where
    E: From<ScopeError>,
    F: AsyncFnOnce(&mut PgConnection) -> Result<T, E>,
{
    let mut tx = pool.begin().await.map_err(ScopeError::Database)?;

    if !db::namespace_exists(&mut *tx, tenant).await.map_err(ScopeError::Database)? {
        return Err(ScopeError::NamespaceNotFound(tenant.clone()).into());
    }

    sqlx::query(&format!(r#"SET LOCAL search_path TO "{}""#, tenant.as_str()))
        .execute(&mut *tx)
        .await
        .map_err(ScopeError::Database)?;

    let value = f(&mut *tx).await?;

    tx.commit().await.map_err(ScopeError::Database)?;
    Ok(value)
}
