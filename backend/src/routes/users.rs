use axum::Json;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use serde::Deserialize;
use serde_json::json;
use thiserror::Error;

use crate::auth::CurrentUser;
use crate::core;
use crate::db;
use crate::db::StoreError;

#[derive(Debug, Error)]
pub enum UserError {
    #[error("User not found")]
    UserNotFound,

    #[error("Database error: {0}")]
    DatabaseError(StoreError),
}

impl From<StoreError> for UserError {
    fn from(error: StoreError) -> Self {
        match error {
            StoreError::UserNotFound => Self::UserNotFound,
            other => Self::DatabaseError(other),
        }
    }
}

impl IntoResponse for UserError {
    fn into_response(self) -> axum::response::Response {
        tracing::error!(
            error_type = %std::any::type_name::<Self>(),
            error_subtype = %std::any::type_name_of_val(&self),
            error_message = %self);

        let (status, error_message) = match self {
            Self::UserNotFound => (StatusCode::NOT_FOUND, self.to_string()),
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

#[derive(Deserialize)]
pub struct UpdateMe {
    #[serde(default)]
    pub first_name: String,

    #[serde(default)]
    pub last_name: String,
}

/// The authenticated user's own account record.
pub async fn get_me(
    State(context): State<core::ArcContext>,
    user: CurrentUser,
) -> Result<impl IntoResponse, UserError> {
    let user = db::get_user_by_id(&context.db, user.user_id).await?;
    Ok(Json(json!({"result": "ok", "user": user})))
}

pub async fn update_me(
    State(context): State<core::ArcContext>,
    user: CurrentUser,
    Json(update): Json<UpdateMe>,
) -> Result<impl IntoResponse, UserError> {
    let user = db::update_user_name(
        &context.db,
        user.user_id,
        update.first_name.trim(),
        update.last_name.trim(),
    )
    .await?;
    Ok(Json(json!({"result": "ok", "user": user})))
}

/// Every tenant the user belongs to, with role and primary flag; this is what
/// a tenant-switcher UI renders.
pub async fn list_my_tenants(
    State(context): State<core::ArcContext>,
    user: CurrentUser,
) -> Result<impl IntoResponse, UserError> {
    let tenants = db::list_user_tenants(&context.db, user.user_id).await?;
    Ok(Json(json!({"result": "ok", "tenants": tenants})))
}
