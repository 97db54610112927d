use serde::{Deserialize, Serialize};

/// Per-provider OAuth credentials. A provider is registered only when both
/// its client id and secret are present.
#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct OAuthSettings {
    #[serde(default)]
    pub google_client_id: String,

    #[serde(default)]
    pub google_client_secret: String,

    #[serde(default)]
    pub google_redirect_uri: String,

    #[serde(default)]
    pub facebook_client_id: String,

    #[serde(default)]
    pub facebook_client_secret: String,

    #[serde(default)]
    pub facebook_redirect_uri: String,

    #[serde(default)]
    pub tiktok_client_id: String,

    #[serde(default)]
    pub tiktok_client_secret: String,

    #[serde(default)]
    pub tiktok_redirect_uri: String,

    /// Session timeout in minutes for the OAuth authorize/callback round trip
    #[serde(default = "default_session_timeout")]
    pub session_timeout_minutes: u64,
}

const fn default_session_timeout() -> u64 {
    10
}

impl Default for OAuthSettings {
    fn default() -> Self {
        Self {
            google_client_id: String::new(),
            google_client_secret: String::new(),
            google_redirect_uri: "http://localhost:3000/auth/oauth/google/callback".to_string(),
            facebook_client_id: String::new(),
            facebook_client_secret: String::new(),
            facebook_redirect_uri: "http://localhost:3000/auth/oauth/facebook/callback".to_string(),
            tiktok_client_id: String::new(),
            tiktok_client_secret: String::new(),
            tiktok_redirect_uri: "http://localhost:3000/auth/oauth/tiktok/callback".to_string(),
            session_timeout_minutes: default_session_timeout(),
        }
    }
}
