use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use serde::Deserialize;
use serde::Serialize;
use thiserror::Error;
use tokio::sync::RwLock;
use url::Url;

use crate::cfg;
use crate::db::ProviderKind;

#[rustfmt::skip]
#[derive(Debug, Error)]
pub enum SsoError {
    #[error("OAuth2 request failed: {0}")]
    OAuth2RequestFailed(#[from] oauth2::RequestTokenError<oauth2::HttpClientError<oauth2::reqwest::Error>, oauth2::StandardErrorResponse<oauth2::basic::BasicErrorResponseType>>),

    #[error("Failed to parse redirect URI: {0}")]
    InvalidRedirectUri(#[from] url::ParseError),

    #[error("OAuth provider configuration error: {0}")]
    InvalidConfig(String),

    #[error("Provider not configured: {0}")]
    ProviderNotConfigured(String),

    #[error("User info retrieval API call failed: {0}")]
    UserInfoRetrievalApiCallFailed(reqwest::Error),

    #[error("CSRF token validation failed")]
    CsrfValidationFailed,

    #[error("OAuth session expired or not found")]
    SessionNotFound,
}

/// The normalized result of a provider round trip, ready for account lookup
/// or creation. TikTok grants no email scope, so `email` stays `None` there
/// and onboarding substitutes a placeholder address.
#[derive(Debug, Serialize, Deserialize)]
pub struct ExternalIdentity {
    pub provider: ProviderKind,
    pub external_id: String,
    pub email: Option<String>,
    pub first_name: String,
    pub last_name: String,
    pub email_verified: bool,
}

#[derive(Debug, Deserialize)]
pub struct AuthRequest {
    pub code: String,
    pub state: String,
}

#[derive(Debug, Clone)]
pub struct OAuthSession {
    pub provider: ProviderKind,
    pub csrf_token: String,
    pub created_at: DateTime<Utc>,
}

// In-memory store for OAuth sessions (in production, use Redis or database)
pub type OAuthSessionStore = Arc<RwLock<HashMap<String, OAuthSession>>>;

#[must_use]
pub fn create_oauth_session_store() -> OAuthSessionStore {
    Arc::new(RwLock::new(HashMap::new()))
}

// Type alias to simplify the client type spelled out by the builder chain
type OAuth2Client = oauth2::Client<
    oauth2::StandardErrorResponse<oauth2::basic::BasicErrorResponseType>,
    oauth2::StandardTokenResponse<oauth2::EmptyExtraTokenFields, oauth2::basic::BasicTokenType>,
    oauth2::StandardTokenIntrospectionResponse<oauth2::EmptyExtraTokenFields, oauth2::basic::BasicTokenType>,
    oauth2::StandardRevocableToken,
    oauth2::StandardErrorResponse<oauth2::RevocationErrorResponseType>,
    oauth2::EndpointSet,    // HasAuthUrl
    oauth2::EndpointNotSet, // HasDeviceAuthUrl
    oauth2::EndpointNotSet, // HasIntrospectionUrl
    oauth2::EndpointNotSet, // HasRevocationUrl
    oauth2::EndpointSet,    // HasTokenUrl
>;

/// One configured identity provider: the oauth2 client plus everything needed
/// to turn an access token into an [`ExternalIdentity`].
pub struct ProviderClient {
    pub kind: ProviderKind,
    client: OAuth2Client,
    scopes: &'static [&'static str],
}

struct ProviderEndpoints {
    auth_url: &'static str,
    token_url: &'static str,
    scopes: &'static [&'static str],
}

const fn endpoints_for(kind: ProviderKind) -> ProviderEndpoints {
    match kind {
        ProviderKind::Google => ProviderEndpoints {
            auth_url: "https://accounts.google.com/o/oauth2/v2/auth",
            token_url: "https://www.googleapis.com/oauth2/v3/token",
            scopes: &["openid", "email", "profile"],
        },
        ProviderKind::Facebook => ProviderEndpoints {
            auth_url: "https://www.facebook.com/v19.0/dialog/oauth",
            token_url: "https://graph.facebook.com/v19.0/oauth/access_token",
            scopes: &["email", "public_profile"],
        },
        ProviderKind::TikTok => ProviderEndpoints {
            auth_url: "https://www.tiktok.com/v2/auth/authorize/",
            token_url: "https://open.tiktokapis.com/v2/oauth/token/",
            scopes: &["user.info.basic"],
        },
    }
}

impl ProviderClient {
    fn new(
        kind: ProviderKind,
        client_id: &str,
        client_secret: &str,
        redirect_uri: &str,
    ) -> Result<Self, SsoError> {
        let endpoints = endpoints_for(kind);
        let redirect_url = oauth2::RedirectUrl::new(redirect_uri.to_string())?;
        let auth_url = oauth2::AuthUrl::new(endpoints.auth_url.to_string())
            .map_err(|_| SsoError::InvalidConfig(format!("Invalid {kind} auth URL")))?;
        let token_url = oauth2::TokenUrl::new(endpoints.token_url.to_string())
            .map_err(|_| SsoError::InvalidConfig(format!("Invalid {kind} token URL")))?;

        let client = oauth2::basic::BasicClient::new(oauth2::ClientId::new(client_id.to_string()))
            .set_client_secret(oauth2::ClientSecret::new(client_secret.to_string()))
            .set_auth_uri(auth_url)
            .set_token_uri(token_url)
            .set_redirect_uri(redirect_url);

        Ok(Self { kind, client, scopes: endpoints.scopes })
    }

    /// Generate the provider authorize URL with a fresh CSRF state.
    #[must_use]
    pub fn authorize_url(&self) -> (Url, String) {
        let mut request = self.client.authorize_url(oauth2::CsrfToken::new_random);
        for scope in self.scopes {
            request = request.add_scope(oauth2::Scope::new((*scope).to_string()));
        }
        let (auth_url, csrf_token) = request.url();
        (auth_url, csrf_token.secret().clone())
    }

    pub async fn exchange_code(
        &self,
        http_client: &reqwest::Client,
        code: &str,
    ) -> Result<String, SsoError> {
        let token_result = self
            .client
            .exchange_code(oauth2::AuthorizationCode::new(code.to_string()))
            .request_async(http_client)
            .await
            .map_err(|e| {
                tracing::error!(provider = %self.kind, "Failed to exchange authorization code: {e}");
                SsoError::OAuth2RequestFailed(e)
            })?;
        Ok(oauth2::TokenResponse::access_token(&token_result).secret().clone())
    }

    pub async fn fetch_identity(
        &self,
        http_client: &reqwest::Client,
        access_token: &str,
    ) -> Result<ExternalIdentity, SsoError> {
        match self.kind {
            ProviderKind::Google => fetch_google_identity(http_client, access_token).await,
            ProviderKind::Facebook => fetch_facebook_identity(http_client, access_token).await,
            ProviderKind::TikTok => fetch_tiktok_identity(http_client, access_token).await,
        }
    }
}

#[derive(Debug, Deserialize)]
struct GoogleUserInfo {
    id: String,
    email: String,
    #[serde(default)]
    verified_email: bool,
    #[serde(default)]
    given_name: String,
    #[serde(default)]
    family_name: String,
}

async fn fetch_google_identity(
    http_client: &reqwest::Client,
    access_token: &str,
) -> Result<ExternalIdentity, SsoError> {
    let response = http_client
        .get("https://www.googleapis.com/oauth2/v2/userinfo")
        .bearer_auth(access_token)
        .timeout(std::time::Duration::from_secs(10))
        .send()
        .await
        .map_err(SsoError::UserInfoRetrievalApiCallFailed)?;

    if !response.status().is_success() {
        tracing::error!("Google userinfo API returned status: {}", response.status());
        return Err(SsoError::InvalidConfig("Google userinfo API returned error".to_string()));
    }

    let info: GoogleUserInfo = response.json().await.map_err(SsoError::UserInfoRetrievalApiCallFailed)?;
    if info.id.is_empty() || info.email.is_empty() {
        tracing::error!("Invalid user info received from Google: missing email or ID");
        return Err(SsoError::InvalidConfig("Invalid user info from Google".to_string()));
    }

    Ok(ExternalIdentity {
        provider: ProviderKind::Google,
        external_id: info.id,
        email: Some(info.email),
        first_name: info.given_name,
        last_name: info.family_name,
        email_verified: info.verified_email,
    })
}

#[derive(Debug, Deserialize)]
struct FacebookUserInfo {
    id: String,
    #[serde(default)]
    email: Option<String>,
    #[serde(default)]
    first_name: String,
    #[serde(default)]
    last_name: String,
}

async fn fetch_facebook_identity(
    http_client: &reqwest::Client,
    access_token: &str,
) -> Result<ExternalIdentity, SsoError> {
    let response = http_client
        .get("https://graph.facebook.com/me")
        .query(&[("fields", "id,email,first_name,last_name")])
        .bearer_auth(access_token)
        .timeout(std::time::Duration::from_secs(10))
        .send()
        .await
        .map_err(SsoError::UserInfoRetrievalApiCallFailed)?;

    if !response.status().is_success() {
        tracing::error!("Facebook userinfo API returned status: {}", response.status());
        return Err(SsoError::InvalidConfig("Facebook userinfo API returned error".to_string()));
    }

    let info: FacebookUserInfo = response.json().await.map_err(SsoError::UserInfoRetrievalApiCallFailed)?;
    if info.id.is_empty() {
        return Err(SsoError::InvalidConfig("Invalid user info from Facebook".to_string()));
    }

    // Facebook only returns the email when the user granted the scope
    let email_verified = info.email.is_some();
    Ok(ExternalIdentity {
        provider: ProviderKind::Facebook,
        external_id: info.id,
        email: info.email.filter(|e| !e.is_empty()),
        first_name: info.first_name,
        last_name: info.last_name,
        email_verified,
    })
}

#[derive(Debug, Deserialize)]
struct TikTokUserInfoEnvelope {
    data: TikTokUserInfoData,
}

#[derive(Debug, Deserialize)]
struct TikTokUserInfoData {
    user: TikTokUserInfo,
}

#[derive(Debug, Deserialize)]
struct TikTokUserInfo {
    open_id: String,
    #[serde(default)]
    display_name: String,
}

async fn fetch_tiktok_identity(
    http_client: &reqwest::Client,
    access_token: &str,
) -> Result<ExternalIdentity, SsoError> {
    let response = http_client
        .get("https://open.tiktokapis.com/v2/user/info/")
        .query(&[("fields", "open_id,display_name")])
        .bearer_auth(access_token)
        .timeout(std::time::Duration::from_secs(10))
        .send()
        .await
        .map_err(SsoError::UserInfoRetrievalApiCallFailed)?;

    if !response.status().is_success() {
        tracing::error!("TikTok userinfo API returned status: {}", response.status());
        return Err(SsoError::InvalidConfig("TikTok userinfo API returned error".to_string()));
    }

    let envelope: TikTokUserInfoEnvelope =
        response.json().await.map_err(SsoError::UserInfoRetrievalApiCallFailed)?;
    let info = envelope.data.user;
    if info.open_id.is_empty() {
        return Err(SsoError::InvalidConfig("Invalid user info from TikTok".to_string()));
    }

    // TikTok's basic scope carries no email address
    Ok(ExternalIdentity {
        provider: ProviderKind::TikTok,
        external_id: info.open_id,
        email: None,
        first_name: info.display_name,
        last_name: String::new(),
        email_verified: false,
    })
}

/// All providers with complete credentials in the settings. Providers with a
/// missing client id or secret are skipped at startup with a log line rather
/// than failing the boot.
pub struct OAuthRegistry {
    providers: HashMap<ProviderKind, ProviderClient>,
}

impl OAuthRegistry {
    pub fn from_settings(settings: &cfg::OAuthSettings) -> Result<Self, SsoError> {
        let mut providers = HashMap::new();
        let credentials = [
            (ProviderKind::Google, &settings.google_client_id, &settings.google_client_secret, &settings.google_redirect_uri),
            (ProviderKind::Facebook, &settings.facebook_client_id, &settings.facebook_client_secret, &settings.facebook_redirect_uri),
            (ProviderKind::TikTok, &settings.tiktok_client_id, &settings.tiktok_client_secret, &settings.tiktok_redirect_uri),
        ];
        for (kind, client_id, client_secret, redirect_uri) in credentials {
            if client_id.is_empty() || client_secret.is_empty() {
                tracing::info!("OAuth provider {kind} not configured, skipping");
                continue;
            }
            providers.insert(kind, ProviderClient::new(kind, client_id, client_secret, redirect_uri)?);
        }
        Ok(Self { providers })
    }

    pub fn get(&self, kind: ProviderKind) -> Result<&ProviderClient, SsoError> {
        self.providers
            .get(&kind)
            .ok_or_else(|| SsoError::ProviderNotConfigured(kind.to_string()))
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.providers.is_empty()
    }
}

/// Record a pending authorize round trip keyed by its CSRF state, sweeping
/// out sessions older than the configured timeout.
pub async fn store_oauth_session(
    session_store: &OAuthSessionStore,
    provider: ProviderKind,
    state: String,
    timeout_minutes: u64,
) {
    let mut store = session_store.write().await;
    let cutoff = Utc::now() - Duration::minutes(timeout_minutes as i64);
    store.retain(|_, session| session.created_at > cutoff);
    store.insert(
        state.clone(),
        OAuthSession { provider, csrf_token: state, created_at: Utc::now() },
    );
}

/// Validate and consume the callback state. The session must exist, match the
/// provider the callback arrived on, and still be within the timeout window.
pub async fn take_oauth_session(
    session_store: &OAuthSessionStore,
    provider: ProviderKind,
    state: &str,
    timeout_minutes: u64,
) -> Result<OAuthSession, SsoError> {
    let session = {
        let mut store = session_store.write().await;
        store.remove(state).ok_or(SsoError::CsrfValidationFailed)?
    };

    if session.csrf_token != state || session.provider != provider {
        tracing::warn!(provider = %provider, "OAuth state mismatch on callback");
        return Err(SsoError::CsrfValidationFailed);
    }

    let session_age = Utc::now() - session.created_at;
    if session_age > Duration::minutes(timeout_minutes as i64) {
        tracing::warn!("OAuth session expired: age {} minutes", session_age.num_minutes());
        return Err(SsoError::SessionNotFound);
    }

    Ok(session)
}
