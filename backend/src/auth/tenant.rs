use axum::Json;
use axum::extract::FromRequestParts;
use axum::extract::Request;
use axum::http;
use axum::http::request::Parts;
use axum::middleware::Next;
use axum::response::IntoResponse;
use axum::response::Response;
use serde_json::json;
use thiserror::Error;

use crate::auth::CurrentUser;
use crate::db::TenantId;

/// Explicit per-request tenant selection.
pub const TENANT_HEADER: &str = "X-Tenant-ID";

/// Fallback tenant selection for clients that cannot set headers.
pub const TENANT_QUERY_PARAM: &str = "tenant";

/// Route prefixes that operate on the shared catalog and carry no tenant.
pub const TENANT_EXEMPT_PREFIXES: &[&str] = &["/auth", "/users", "/health"];

#[derive(Debug, Error)]
pub enum TenantError {
    #[error("Tenant not specified")]
    TenantRequired,

    #[error("Invalid tenant identifier")]
    InvalidTenantId,
}

impl IntoResponse for TenantError {
    fn into_response(self) -> Response {
        tracing::error!(
            error_type = %std::any::type_name::<Self>(),
            error_subtype = %std::any::type_name_of_val(&self),
            error_message = %self);

        let body = Json(json!({
            "result": "error",
            "message": self.to_string()
        }));

        (http::StatusCode::BAD_REQUEST, body).into_response()
    }
}

#[must_use]
pub fn is_tenant_exempt(path: &str) -> bool {
    TENANT_EXEMPT_PREFIXES
        .iter()
        .any(|prefix| path == *prefix || path.starts_with(&format!("{prefix}/")))
}

/// Picks the tenant for a request: header first, then query parameter, then
/// the token's advisory claim. Empty strings count as absent at every level,
/// and whichever source wins must still parse as a valid tenant id.
pub fn resolve_tenant(
    header: Option<&str>,
    query: Option<&str>,
    claim: Option<&str>,
) -> Result<TenantId, TenantError> {
    let raw = [header, query, claim]
        .into_iter()
        .flatten()
        .map(str::trim)
        .find(|s| !s.is_empty())
        .ok_or(TenantError::TenantRequired)?;
    raw.parse().map_err(|_| TenantError::InvalidTenantId)
}

/// The tenant the request resolved to, published into request extensions by
/// `tenant_middleware`.
#[derive(Clone, Debug)]
pub struct ResolvedTenant(pub TenantId);

impl<S> FromRequestParts<S> for ResolvedTenant
where
    S: Send + Sync,
{
    type Rejection = TenantError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<Self>()
            .cloned()
            .ok_or(TenantError::TenantRequired)
    }
}

fn tenant_query_value(query: Option<&str>) -> Option<String> {
    let query = query?;
    url::form_urlencoded::parse(query.as_bytes())
        .find(|(key, _)| key == TENANT_QUERY_PARAM)
        .map(|(_, value)| value.into_owned())
}

/// Resolves the tenant for every non-exempt request and publishes it as a
/// request extension. Runs after authentication, so the token claim is
/// available as the lowest-precedence source.
pub async fn tenant_middleware(mut request: Request, next: Next) -> Result<Response, TenantError> {
    if is_tenant_exempt(request.uri().path()) {
        return Ok(next.run(request).await);
    }

    let header = request
        .headers()
        .get(TENANT_HEADER)
        .and_then(|v| v.to_str().ok())
        .map(ToString::to_string);
    let query = tenant_query_value(request.uri().query());
    let claim = request
        .extensions()
        .get::<CurrentUser>()
        .and_then(|user| user.tenant_schema.clone());

    let tenant = resolve_tenant(header.as_deref(), query.as_deref(), claim.as_deref())?;
    request.extensions_mut().insert(ResolvedTenant(tenant));
    Ok(next.run(request).await)
}
