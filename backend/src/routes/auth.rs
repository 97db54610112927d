use axum::Json;
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Redirect};
use chrono::{Duration, Utc};
use rand::Rng;
use serde::Deserialize;
use serde_json::json;
use sha2::Digest;
use thiserror::Error;

use crate::auth;
use crate::auth::JwtError;
use crate::core;
use crate::db;
use crate::db::{ProviderKind, TenantId, User};
use crate::services::onboarding;
use crate::services::onboarding::OnboardingError;
use crate::services::sso;
use crate::services::sso::SsoError;

const MIN_PASSWORD_LEN: usize = 8;
const RESET_TOKEN_TTL_HOURS: i64 = 1;

#[derive(Deserialize)]
pub struct Register {
    pub email: String,
    pub password: String,

    #[serde(default)]
    pub first_name: String,

    #[serde(default)]
    pub last_name: String,

    /// Exact namespace to create or join; derived from the email when absent.
    #[serde(default)]
    pub tenant: Option<String>,

    #[serde(default)]
    pub tenant_name: Option<String>,
}

#[derive(Deserialize)]
pub struct Login {
    pub email: String,
    pub password: String,
}

#[derive(Deserialize)]
pub struct PasswordResetRequest {
    pub email: String,
}

#[derive(Deserialize)]
pub struct PasswordResetConfirm {
    pub token: String,
    pub new_password: String,
}

#[rustfmt::skip]
#[derive(Debug, Error)]
pub enum AuthError {
    #[error("Invalid credentials")]
    InvalidCredentials,

    #[error("{0}")]
    ValidationFailed(String),

    #[error("Unknown identity provider")]
    UnknownProvider,

    #[error("Password reset token is invalid or expired")]
    InvalidResetToken,

    #[error("JWT error: {0}")]
    JwtError(#[from] JwtError),

    #[error("Password error: {0}")]
    PasswordHashingError(#[from] argon2::password_hash::Error),

    #[error("Database error: {0}")]
    DatabaseError(#[from] db::StoreError),

    #[error(transparent)]
    Onboarding(#[from] OnboardingError),

    #[error(transparent)]
    Sso(#[from] SsoError),
}

impl IntoResponse for AuthError {
    fn into_response(self) -> axum::response::Response {
        tracing::error!(
            error_type = %std::any::type_name::<Self>(),
            error_subtype = %std::any::type_name_of_val(&self),
            error_message = %self);

        #[rustfmt::skip]
        let (status, error_message) = match &self {
            Self::InvalidCredentials => (StatusCode::UNAUTHORIZED, self.to_string()),
            Self::ValidationFailed(_) => (StatusCode::UNPROCESSABLE_ENTITY, self.to_string()),
            Self::UnknownProvider => (StatusCode::NOT_FOUND, self.to_string()),
            Self::InvalidResetToken => (StatusCode::BAD_REQUEST, self.to_string()),
            Self::JwtError(JwtError::EncodingFailed(_) | JwtError::KeyLoadingFailed(_)) => {
                (StatusCode::INTERNAL_SERVER_ERROR, "Internal server error".to_string())
            }
            Self::JwtError(_) => (StatusCode::UNAUTHORIZED, self.to_string()),
            Self::Onboarding(OnboardingError::DuplicateAccount) => (StatusCode::CONFLICT, self.to_string()),
            Self::Sso(SsoError::CsrfValidationFailed | SsoError::SessionNotFound) => {
                (StatusCode::BAD_REQUEST, self.to_string())
            }
            Self::Sso(SsoError::ProviderNotConfigured(_)) => (StatusCode::NOT_FOUND, self.to_string()),
            Self::Sso(_) => (StatusCode::BAD_GATEWAY, "Identity provider request failed".to_string()),
            Self::PasswordHashingError(_)
            | Self::DatabaseError(_)
            | Self::Onboarding(_) => (StatusCode::INTERNAL_SERVER_ERROR, "Internal server error".to_string()),
        };

        let body = Json(json!({
            "result": "error",
            "message": error_message
        }));

        (status, body).into_response()
    }
}

fn validate_email(email: &str) -> Result<(), AuthError> {
    let email = email.trim();
    if email.is_empty() || !email.contains('@') {
        return Err(AuthError::ValidationFailed("A valid email address is required".to_string()));
    }
    Ok(())
}

fn validate_password(password: &str) -> Result<(), AuthError> {
    if password.len() < MIN_PASSWORD_LEN {
        return Err(AuthError::ValidationFailed(format!(
            "Password must be at least {MIN_PASSWORD_LEN} characters"
        )));
    }
    Ok(())
}

fn user_json(user: &User) -> serde_json::Value {
    json!({
        "id": user.id,
        "email": user.email,
        "first_name": user.first_name,
        "last_name": user.last_name,
        "email_verified": user.email_verified,
    })
}

/// Register a new account; provisions a tenant namespace in the same
/// transaction and returns a token already bound to it.
pub async fn register(
    State(context): State<core::ArcContext>,
    Json(request): Json<Register>,
) -> Result<impl IntoResponse, AuthError> {
    validate_email(&request.email)?;
    validate_password(&request.password)?;

    let tenant = match &request.tenant {
        Some(raw) => Some(
            raw.parse::<TenantId>()
                .map_err(|_| AuthError::ValidationFailed("Invalid tenant identifier".to_string()))?,
        ),
        None => None,
    };

    let password_hash = auth::hash_password(&request.password)?;
    let params = onboarding::ProvisionParams {
        email: request.email.trim().to_lowercase(),
        password_hash: Some(password_hash),
        first_name: request.first_name.trim().to_string(),
        last_name: request.last_name.trim().to_string(),
        tenant,
        tenant_name: request.tenant_name.clone(),
        ..onboarding::ProvisionParams::default()
    };

    let provisioned = onboarding::provision_user_and_tenant(&context.db, &params).await?;
    let token = auth::issue_token(
        &context.jwt,
        provisioned.user.id,
        &provisioned.user.email,
        Some(&provisioned.tenant.schema_name),
    )?;

    Ok((
        StatusCode::CREATED,
        Json(json!({
            "result": "ok",
            "token": token,
            "user": user_json(&provisioned.user),
            "tenant": {
                "schema_name": provisioned.tenant.schema_name,
                "name": provisioned.tenant.name,
                "created": provisioned.tenant_created,
                "role": provisioned.membership.role,
            }
        })),
    ))
}

/// Login with email and password. Unknown account, wrong password and
/// disabled account all collapse into the same 401 answer.
pub async fn login(
    State(context): State<core::ArcContext>,
    Json(login): Json<Login>,
) -> Result<impl IntoResponse, AuthError> {
    let email = login.email.trim().to_lowercase();
    let user = db::find_user_by_email(&context.db, &email)
        .await?
        .ok_or(AuthError::InvalidCredentials)?;

    if !auth::verify_password(&login.password, user.password_hash.as_deref()) {
        tracing::warn!(user_id = user.id, "Invalid password");
        return Err(AuthError::InvalidCredentials);
    }
    if !user.active {
        tracing::warn!(user_id = user.id, "Login attempt on disabled account");
        return Err(AuthError::InvalidCredentials);
    }

    db::touch_last_login(&context.db, user.id).await?;
    let tenant_schema = onboarding::primary_tenant_schema(&context.db, user.id).await?;
    let token = auth::issue_token(&context.jwt, user.id, &user.email, tenant_schema.as_deref())?;

    Ok(Json(json!({
        "result": "ok",
        "token": token,
        "user": user_json(&user),
        "tenant_schema": tenant_schema,
    })))
}

/// Start a password reset. The answer is identical whether or not the email
/// matches an account, so the endpoint cannot be used to enumerate users. The
/// token itself never appears in the response; only its SHA-256 is stored.
pub async fn password_reset_request(
    State(context): State<core::ArcContext>,
    Json(request): Json<PasswordResetRequest>,
) -> Result<impl IntoResponse, AuthError> {
    let email = request.email.trim().to_lowercase();

    if let Some(user) = db::find_user_by_email(&context.db, &email).await?
        && user.active
    {
        let token_bytes: [u8; 32] = rand::rng().random();
        let token = hex::encode(token_bytes);
        let token_hash = hex::encode(sha2::Sha256::digest(token.as_bytes()));
        let expires_at = Utc::now() + Duration::hours(RESET_TOKEN_TTL_HOURS);
        db::set_password_reset_token(&context.db, user.id, &token_hash, expires_at).await?;
        tracing::info!(user_id = user.id, "Password reset token issued");
        // TODO: deliver the token by email once a mailer is configured; until
        // then it is only visible in the debug log
        tracing::debug!(user_id = user.id, token, "Password reset token");
    }

    Ok(Json(json!({
        "result": "ok",
        "message": "If the account exists, a password reset has been initiated",
    })))
}

/// Complete a password reset. The token is single use: applying it clears the
/// stored hash and expiry.
pub async fn password_reset_confirm(
    State(context): State<core::ArcContext>,
    Json(request): Json<PasswordResetConfirm>,
) -> Result<impl IntoResponse, AuthError> {
    validate_password(&request.new_password)?;

    let token_hash = hex::encode(sha2::Sha256::digest(request.token.as_bytes()));
    let user = db::find_user_by_reset_token(&context.db, &token_hash)
        .await?
        .ok_or(AuthError::InvalidResetToken)?;

    let expires_ok = user.password_reset_expires.is_some_and(|expires| expires > Utc::now());
    if !expires_ok {
        return Err(AuthError::InvalidResetToken);
    }

    let password_hash = auth::hash_password(&request.new_password)?;
    db::reset_password(&context.db, user.id, &password_hash).await?;
    tracing::info!(user_id = user.id, "Password reset completed");

    Ok(Json(json!({"result": "ok"})))
}

fn provider_from_path(raw: &str) -> Result<ProviderKind, AuthError> {
    ProviderKind::from_path(raw).ok_or(AuthError::UnknownProvider)
}

/// Redirect the browser to the provider's consent screen, recording the CSRF
/// state for the callback.
pub async fn oauth_init(
    State(context): State<core::ArcContext>,
    Path(provider): Path<String>,
) -> Result<impl IntoResponse, AuthError> {
    let provider = provider_from_path(&provider)?;
    let client = context.oauth.get(provider)?;
    let (auth_url, state) = client.authorize_url();

    sso::store_oauth_session(
        &context.oauth_sessions,
        provider,
        state,
        context.settings.oauth.session_timeout_minutes,
    )
    .await;

    tracing::info!(provider = %provider, "Initiating OAuth flow");
    Ok(Redirect::to(auth_url.as_str()))
}

/// Provider callback: validates the CSRF state, trades the code for an
/// identity and signs the user in, provisioning an account and tenant on
/// first sight.
pub async fn oauth_callback(
    State(context): State<core::ArcContext>,
    Path(provider): Path<String>,
    Query(params): Query<sso::AuthRequest>,
) -> Result<impl IntoResponse, AuthError> {
    let provider = provider_from_path(&provider)?;
    sso::take_oauth_session(
        &context.oauth_sessions,
        provider,
        &params.state,
        context.settings.oauth.session_timeout_minutes,
    )
    .await?;

    let client = context.oauth.get(provider)?;
    let access_token = client.exchange_code(&context.http_client, &params.code).await?;
    let identity = client.fetch_identity(&context.http_client, &access_token).await?;

    let (user, created) = onboarding::find_or_create_via_oauth(&context.db, &identity).await?;
    if !user.active {
        tracing::warn!(user_id = user.id, "OAuth login attempt on disabled account");
        return Err(AuthError::InvalidCredentials);
    }

    let tenant_schema = onboarding::primary_tenant_schema(&context.db, user.id).await?;
    let token = auth::issue_token(&context.jwt, user.id, &user.email, tenant_schema.as_deref())?;

    Ok(Json(json!({
        "result": "ok",
        "token": token,
        "user": user_json(&user),
        "tenant_schema": tenant_schema,
        "account_created": created,
    })))
}
