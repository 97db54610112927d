use axum::Router;
use axum::extract::Request;
use axum::extract::State;
use axum::middleware;
use axum::middleware::Next;
use axum::response::Response;
use axum::routing::get;
use axum::routing::post;
use tower_http::trace::TraceLayer;

use crate::auth;
use crate::core;
use crate::routes;

/// Assembles the full route tree. Tenant-scoped API routes run behind both the
/// authentication and the tenant-resolution middleware; account self-service
/// routes are authenticated but tenant-exempt; the auth surface and the health
/// probe are public. OAuth routes are mounted only when at least one provider
/// is configured.
pub fn create_router(context: core::ArcContext) -> Router {
    // Middleware runs outermost-first, so authentication is added last: the
    // tenant resolver may fall back to the token's tenant claim.
    let api_routes = Router::new()
        .route(
            "/api/profile",
            get(routes::profile::get_profile).put(routes::profile::update_profile),
        )
        .layer(middleware::from_fn(auth::tenant_middleware))
        .layer(middleware::from_fn_with_state(context.clone(), auth_middleware))
        .with_state(context.clone());

    let user_routes = Router::new()
        .route("/users/me", get(routes::users::get_me).put(routes::users::update_me))
        .route("/users/me/tenants", get(routes::users::list_my_tenants))
        .layer(middleware::from_fn_with_state(context.clone(), auth_middleware))
        .with_state(context.clone());

    let mut auth_routes = Router::new()
        .route("/auth/register", post(routes::auth::register))
        .route("/auth/login", post(routes::auth::login))
        .route("/auth/password-reset/request", post(routes::auth::password_reset_request))
        .route("/auth/password-reset/confirm", post(routes::auth::password_reset_confirm));
    if context.oauth.is_empty() {
        tracing::info!("No OAuth providers configured, OAuth routes not mounted");
    } else {
        auth_routes = auth_routes
            .route("/auth/oauth/{provider}", get(routes::auth::oauth_init))
            .route("/auth/oauth/{provider}/callback", get(routes::auth::oauth_callback));
    }
    let auth_routes = auth_routes.with_state(context.clone());

    let public_routes = Router::new().route("/health", get(routes::health::health_check));

    Router::new()
        .merge(auth_routes)
        .merge(api_routes)
        .merge(user_routes)
        .merge(public_routes)
        .layer(TraceLayer::new_for_http())
}

/// Validates the bearer token and publishes the identity as a request
/// extension for downstream extractors and the tenant resolver.
async fn auth_middleware(
    State(context): State<core::ArcContext>,
    mut request: Request,
    next: Next,
) -> Result<Response, auth::JwtError> {
    let claims = auth::claims_from_headers(&context.jwt, request.headers())?;
    tracing::debug!(
        user_id = claims.user_id,
        email = %claims.email,
        tenant_schema = ?claims.tenant_schema,
        "Authenticated request"
    );
    request.extensions_mut().insert(auth::CurrentUser::from(claims));
    Ok(next.run(request).await)
}
