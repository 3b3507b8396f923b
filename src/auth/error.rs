use thiserror::Error;

#[derive(Error, Debug)]
pub enum AuthError {
    #[error("Wrong configuration: {0}")]
    Config(String),
    #[error("No active auth or auth is in progress")]
    NotLoggedIn,
    #[error("No login in progress")]
    NoLoginInProgress,
    #[error("Stored session has no refresh token")]
    MissingRefreshToken,
    #[error("Stored session has no id token")]
    MissingIdToken,
    #[error("Invalid JWT format")]
    InvalidJwt,
    #[error("Token exchange failed: {status} {body}")]
    TokenEndpoint {
        status: reqwest::StatusCode,
        body: String,
    },
    #[error("Cant refresh token: {status} {body}")]
    RefreshFailed {
        status: reqwest::StatusCode,
        body: String,
    },
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("Failed to parse JSON: {0}")]
    Json(#[from] serde_json::Error),
    #[error("Invalid URL: {0}")]
    Url(#[from] url::ParseError),
    #[error("Failed to decode base64: {0}")]
    Base64(#[from] base64::DecodeError),
    #[error("Failed to parse config: {0}")]
    Toml(#[from] toml::de::Error),
    #[error("Storage error: {0}")]
    Storage(#[from] std::io::Error),
    #[error("Navigation failed: {0}")]
    Navigation(String),
}
