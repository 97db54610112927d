use axum::Json;
use axum::extract::FromRequestParts;
use axum::http;
use axum::http::request::Parts;
use axum::response::IntoResponse;
use base64::Engine;
use chrono::Utc;
use jsonwebtoken as jwt;
use ring::signature::KeyPair as _;
use serde::{Deserialize, Serialize};
use serde_json::json;
use thiserror::Error;
use uuid::Uuid;

use crate::cfg;

#[rustfmt::skip]
#[derive(Debug, Error)]
pub enum JwtError {
    #[error("Missing authorization token")]
    MissingToken,

    #[error("Invalid token")]
    TokenInvalid,

    #[error("Token has expired")]
    TokenExpired,

    #[error("Failed to load signing key: {0}")]
    KeyLoadingFailed(String),

    #[error("Failed to encode JWT token")]
    EncodingFailed(#[source] jwt::errors::Error),
}

impl IntoResponse for JwtError {
    fn into_response(self) -> axum::response::Response {
        tracing::error!(
            error_type = %std::any::type_name::<Self>(),
            error_subtype = %std::any::type_name_of_val(&self),
            error_message = %self);

        #[rustfmt::skip]
        let (status, error_message) = match self {
            Self::MissingToken => (http::StatusCode::UNAUTHORIZED, "Missing authorization token".to_string()),
            Self::TokenInvalid => (http::StatusCode::UNAUTHORIZED, "Invalid authentication token".to_string()),
            Self::TokenExpired => (http::StatusCode::UNAUTHORIZED, "Authentication token has expired".to_string()),
            Self::KeyLoadingFailed(_) | Self::EncodingFailed(_) => (http::StatusCode::INTERNAL_SERVER_ERROR, self.to_string()),
        };

        let body = Json(json!({
            "result": "error",
            "message": error_message
        }));

        (status, body).into_response()
    }
}

/// Token claims. Custom claim names are camelCase on the wire.
#[derive(Debug, Deserialize, Serialize)]
pub struct Claims {
    pub iss: String,
    pub sub: String,
    pub iat: i64,
    pub nbf: i64,
    pub exp: i64,
    pub jti: String,

    #[serde(rename = "userId")]
    pub user_id: i64,

    pub email: String,

    /// Advisory tenant hint; explicit per-request tenant selection wins.
    #[serde(rename = "tenantSchema", default, skip_serializing_if = "Option::is_none")]
    pub tenant_schema: Option<String>,
}

/// ES256 signing context. Constructed once at startup from the configured
/// private key and injected through the app context; tests build their own
/// instances with distinct keys.
#[derive(Clone)]
pub struct JwtContext {
    pub encoding_key: jwt::EncodingKey,
    pub decoding_key: jwt::DecodingKey,
    pub validation: jwt::Validation,
    pub issuer: String,
    pub expiry_seconds: i64,
}

// Manual impl because the key types expose no `Debug`; key material is
// deliberately omitted.
impl std::fmt::Debug for JwtContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("JwtContext")
            .field("validation", &self.validation)
            .field("issuer", &self.issuer)
            .field("expiry_seconds", &self.expiry_seconds)
            .finish_non_exhaustive()
    }
}

impl JwtContext {
    /// Builds the context from settings; the private key arrives as a
    /// base64-encoded PKCS#8 PEM and the verification key is derived from it.
    pub fn new(settings: &cfg::JwtSettings) -> Result<Self, JwtError> {
        let pem = base64::engine::general_purpose::STANDARD
            .decode(settings.private_key.trim())
            .map_err(|e| JwtError::KeyLoadingFailed(format!("base64 decode failed: {e}")))
            .and_then(|bytes| {
                String::from_utf8(bytes)
                    .map_err(|e| JwtError::KeyLoadingFailed(format!("key is not UTF-8: {e}")))
            })?;
        Self::from_private_key_pem(&pem, &settings.issuer, settings.expiry_hours)
    }

    pub fn from_private_key_pem(pem: &str, issuer: &str, expiry_hours: i64) -> Result<Self, JwtError> {
        let encoding_key = jwt::EncodingKey::from_ec_pem(pem.as_bytes())
            .map_err(|e| JwtError::KeyLoadingFailed(format!("invalid EC private key: {e}")))?;

        // jsonwebtoken has no way to derive the public half, so go through
        // ring: parse the PKCS#8 document and take the uncompressed point.
        let der = pem_to_der(pem)?;
        let rng = ring::rand::SystemRandom::new();
        let key_pair = ring::signature::EcdsaKeyPair::from_pkcs8(
            &ring::signature::ECDSA_P256_SHA256_FIXED_SIGNING,
            &der,
            &rng,
        )
        .map_err(|e| JwtError::KeyLoadingFailed(format!("not a PKCS#8 P-256 key: {e}")))?;
        let decoding_key = jwt::DecodingKey::from_ec_der(key_pair.public_key().as_ref());

        // Pinned to ES256: a token declaring any other algorithm fails
        // validation outright (algorithm-confusion defense).
        let mut validation = jwt::Validation::new(jwt::Algorithm::ES256);
        validation.leeway = 0;
        validation.set_issuer(&[issuer]);
        validation.set_required_spec_claims(&["exp", "iss"]);

        Ok(Self {
            encoding_key,
            decoding_key,
            validation,
            issuer: issuer.to_string(),
            expiry_seconds: expiry_hours * 3600,
        })
    }
}

/// Issue a signed bearer token for a user, optionally carrying the tenant
/// schema the session last resolved.
pub fn issue_token(
    ctx: &JwtContext,
    user_id: i64,
    email: &str,
    tenant_schema: Option<&str>,
) -> Result<String, JwtError> {
    let now = Utc::now().timestamp();
    let claims = Claims {
        iss: ctx.issuer.clone(),
        sub: user_id.to_string(),
        iat: now,
        nbf: now,
        exp: now + ctx.expiry_seconds,
        jti: Uuid::new_v4().to_string(),
        user_id,
        email: email.to_string(),
        tenant_schema: tenant_schema.map(ToString::to_string),
    };
    let header = jwt::Header::new(jwt::Algorithm::ES256);
    jwt::encode(&header, &claims, &ctx.encoding_key).map_err(JwtError::EncodingFailed)
}

/// Validate a bearer token. `TokenExpired` only when the expiry check alone
/// failed; every other verification failure collapses into `TokenInvalid` so
/// clients learn nothing about which check broke.
pub fn validate_token(ctx: &JwtContext, token: &str) -> Result<Claims, JwtError> {
    let token_data = jwt::decode::<Claims>(token, &ctx.decoding_key, &ctx.validation)
        .map_err(|e| match e.kind() {
            jwt::errors::ErrorKind::ExpiredSignature => JwtError::TokenExpired,
            _ => JwtError::TokenInvalid,
        })?;
    Ok(token_data.claims)
}

/// Extract and validate the bearer token from request headers. An absent
/// `Authorization` header is reported separately from a malformed one.
pub fn claims_from_headers(ctx: &JwtContext, headers: &http::HeaderMap) -> Result<Claims, JwtError> {
    let auth_header = headers
        .get(http::header::AUTHORIZATION)
        .ok_or(JwtError::MissingToken)?
        .to_str()
        .map_err(|_| JwtError::TokenInvalid)?;

    let (scheme, token) = auth_header.split_once(' ').ok_or(JwtError::TokenInvalid)?;
    if !scheme.eq_ignore_ascii_case("bearer") {
        return Err(JwtError::TokenInvalid);
    }

    validate_token(ctx, token.trim())
}

/// The validated identity of the request, published into request extensions by
/// the authentication middleware.
#[derive(Clone, Debug)]
pub struct CurrentUser {
    pub user_id: i64,
    pub email: String,
    pub tenant_schema: Option<String>,
}

impl From<Claims> for CurrentUser {
    fn from(claims: Claims) -> Self {
        Self {
            user_id: claims.user_id,
            email: claims.email,
            tenant_schema: claims.tenant_schema,
        }
    }
}

impl<S> FromRequestParts<S> for CurrentUser
where
    S: Send + Sync,
{
    type Rejection = JwtError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<Self>()
            .cloned()
            .ok_or(JwtError::MissingToken)
    }
}

/// Strips the PEM armor and base64-decodes the body.
fn pem_to_der(pem: &str) -> Result<Vec<u8>, JwtError> {
    let body: String = pem
        .lines()
        .filter(|line| !line.starts_with("-----"))
        .collect();
    base64::engine::general_purpose::STANDARD
        .decode(body.trim())
        .map_err(|e| JwtError::KeyLoadingFailed(format!("invalid PEM body: {e}")))
}
