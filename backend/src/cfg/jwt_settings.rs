use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct JwtSettings {
    /// Base64-encoded PKCS#8 PEM ES256 private key.
    /// Verification uses the public key derived from it at startup.
    #[serde(default)]
    pub private_key: String,

    #[serde(default = "default_issuer")]
    pub issuer: String,

    /// Token validity window in hours.
    #[serde(default = "default_expiry_hours")]
    pub expiry_hours: i64,
}

fn default_issuer() -> String {
    "pergola-backend".to_string()
}

const fn default_expiry_hours() -> i64 {
    24
}

impl Default for JwtSettings {
    fn default() -> Self {
        Self {
            private_key: String::new(),
            issuer: default_issuer(),
            expiry_hours: default_expiry_hours(),
        }
    }
}
