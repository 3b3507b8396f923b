use std::fmt;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use serde::Deserialize;
use url::Url;

use crate::auth::error::AuthError;

const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 30;

/// Receives a fixed, human readable message whenever a redirect-driven step
/// fails and there is no caller left to return an error to.
#[derive(Clone)]
pub struct ErrorHandler(Arc<dyn Fn(&str) + Send + Sync>);

impl ErrorHandler {
    pub fn new<F>(f: F) -> Self
    where
        F: Fn(&str) + Send + Sync + 'static,
    {
        Self(Arc::new(f))
    }

    pub fn call(&self, message: &str) {
        (self.0)(message)
    }
}

impl Default for ErrorHandler {
    fn default() -> Self {
        Self::new(|message| log::error!("{}", message))
    }
}

impl fmt::Debug for ErrorHandler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("ErrorHandler")
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct AuthConfig {
    /// Realm base URL, e.g. `https://sso.example.com/realms/main`.
    pub authority: String,
    pub client_id: String,
    #[serde(default)]
    pub auto_login: bool,
    /// Redirect URI used inside a native mobile wrapper.
    #[serde(default)]
    pub native_redirect_url: Option<String>,
    /// Redirect URI used inside a desktop shell.
    #[serde(default)]
    pub desktop_redirect_url: Option<String>,
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
    #[serde(skip)]
    pub error_handler: ErrorHandler,
}

fn default_request_timeout_secs() -> u64 {
    DEFAULT_REQUEST_TIMEOUT_SECS
}

impl AuthConfig {
    pub fn new(authority: impl Into<String>, client_id: impl Into<String>) -> Self {
        Self {
            authority: authority.into(),
            client_id: client_id.into(),
            auto_login: false,
            native_redirect_url: None,
            desktop_redirect_url: None,
            request_timeout_secs: DEFAULT_REQUEST_TIMEOUT_SECS,
            error_handler: ErrorHandler::default(),
        }
    }

    pub fn from_toml_str(contents: &str) -> Result<Self, AuthError> {
        let config: AuthConfig = toml::from_str(contents)?;
        config.validate()?;
        Ok(config)
    }

    pub fn load(path: &Path) -> Result<Self, AuthError> {
        let contents = std::fs::read_to_string(path)?;
        Self::from_toml_str(&contents)
    }

    pub fn with_auto_login(mut self, auto_login: bool) -> Self {
        self.auto_login = auto_login;
        self
    }

    pub fn with_native_redirect_url(mut self, url: impl Into<String>) -> Self {
        self.native_redirect_url = Some(url.into());
        self
    }

    pub fn with_desktop_redirect_url(mut self, url: impl Into<String>) -> Self {
        self.desktop_redirect_url = Some(url.into());
        self
    }

    pub fn with_error_handler<F>(mut self, f: F) -> Self
    where
        F: Fn(&str) + Send + Sync + 'static,
    {
        self.error_handler = ErrorHandler::new(f);
        self
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    pub fn validate(&self) -> Result<(), AuthError> {
        if self.authority.trim().is_empty() {
            return Err(AuthError::Config("authority is required".to_string()));
        }
        if self.client_id.trim().is_empty() {
            return Err(AuthError::Config("client_id is required".to_string()));
        }
        Url::parse(&self.authority)
            .map_err(|e| AuthError::Config(format!("authority is not a URL: {}", e)))?;
        Ok(())
    }
}
