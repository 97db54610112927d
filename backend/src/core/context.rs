use crate::auth;
use crate::cfg;
use crate::db;
use crate::services::sso;

pub type ArcContext = std::sync::Arc<Context>;

/// Shared application state handed to the router.
pub struct Context {
    pub db: db::DbPool,
    pub jwt: auth::JwtContext,
    pub settings: cfg::AppSettings,
    pub http_client: reqwest::Client,
    pub oauth: sso::OAuthRegistry,
    pub oauth_sessions: sso::OAuthSessionStore,
}

impl Context {
    #[must_use]
    pub fn new(
        db: db::DbPool,
        jwt: auth::JwtContext,
        oauth: sso::OAuthRegistry,
        http_client: reqwest::Client,
        settings: cfg::AppSettings,
    ) -> ArcContext {
        Self {
            db,
            jwt,
            settings,
            http_client,
            oauth,
            oauth_sessions: sso::create_oauth_session_store(),
        }
        .into()
    }
}
