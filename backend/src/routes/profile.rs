use axum::Json;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use serde_json::json;
use thiserror::Error;

use crate::auth::ResolvedTenant;
use crate::core;
use crate::db;
use crate::db::{ProfileUpdate, ScopeError, StoreError};

#[derive(Debug, Error)]
pub enum ProfileError {
    #[error("Tenant namespace does not exist")]
    NamespaceNotFound,

    #[error("Database error: {0}")]
    DatabaseError(String),
}

impl From<ScopeError> for ProfileError {
    fn from(error: ScopeError) -> Self {
        match error {
            ScopeError::NamespaceNotFound(_) => Self::NamespaceNotFound,
            ScopeError::Database(e) => Self::DatabaseError(e.to_string()),
        }
    }
}

impl From<StoreError> for ProfileError {
    fn from(error: StoreError) -> Self {
        Self::DatabaseError(error.to_string())
    }
}

impl IntoResponse for ProfileError {
    fn into_response(self) -> axum::response::Response {
        tracing::error!(
            error_type = %std::any::type_name::<Self>(),
            error_subtype = %std::any::type_name_of_val(&self),
            error_message = %self);

        let (status, error_message) = match self {
            Self::NamespaceNotFound => (StatusCode::BAD_REQUEST, self.to_string()),
            Self::DatabaseError(_) => {
                (StatusCode::INTERNAL_SERVER_ERROR, "Internal server error".to_string())
            }
        };

        let body = Json(json!({
            "result": "error",
            "message": error_message
        }));

        (status, body).into_response()
    }
}

/// The tenant's business profile, read inside the tenant scope. A tenant that
/// has never saved a profile gets the empty defaults rather than a 404.
pub async fn get_profile(
    State(context): State<core::ArcContext>,
    ResolvedTenant(tenant): ResolvedTenant,
) -> Result<impl IntoResponse, ProfileError> {
    let profile = db::with_tenant(&context.db, &tenant, async |conn| {
        db::get_profile(conn).await.map_err(ProfileError::from)
    })
    .await?;

    Ok(Json(json!({"result": "ok", "profile": profile})))
}

pub async fn update_profile(
    State(context): State<core::ArcContext>,
    ResolvedTenant(tenant): ResolvedTenant,
    Json(update): Json<ProfileUpdate>,
) -> Result<impl IntoResponse, ProfileError> {
    let profile = db::with_tenant(&context.db, &tenant, async |conn| {
        db::upsert_profile(conn, &update).await.map_err(ProfileError::from)
    })
    .await?;

    Ok(Json(json!({"result": "ok", "profile": profile})))
}
