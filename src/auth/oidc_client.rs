use url::Url;

use crate::auth::auth_storage::Storage;
use crate::auth::browser::Browser;
use crate::auth::config::AuthConfig;
use crate::auth::error::AuthError;
use crate::auth::token_data::Session;

pub const AUTHORIZATION_ENDPOINT: &str = "/protocol/openid-connect/auth";
pub const TOKEN_ENDPOINT: &str = "/protocol/openid-connect/token";
pub const END_SESSION_ENDPOINT: &str = "/protocol/openid-connect/logout";

/// Storage key of the serialized [`Session`].
pub const SESSION_KEY: &str = "active_auth";
/// Storage key of the redirect URI of the login currently in flight.
pub const LOGIN_MARKER_KEY: &str = "active_auth_redirect_uri";

const CODE_PARAMETER: &str = "code";

/// Whether a login redirect is waiting for its callback. Always read back from
/// storage, since nothing in memory survives the redirect.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum LoginState {
    Anonymous,
    Pending { redirect_uri: String },
}

/// Talks to the provider's authorization, token and end-session endpoints and
/// keeps the session and the login marker in [`Storage`].
pub struct OidcClient<S, B> {
    authority: String,
    client_id: String,
    http: reqwest::Client,
    storage: S,
    browser: B,
}

impl<S: Storage, B: Browser> OidcClient<S, B> {
    pub fn new(config: &AuthConfig, storage: S, browser: B) -> Result<Self, AuthError> {
        config.validate()?;

        let http = reqwest::Client::builder()
            .user_agent(concat!("oidc-redirect/", env!("CARGO_PKG_VERSION")))
            .timeout(config.request_timeout())
            .build()?;

        Ok(Self {
            authority: config.authority.trim_end_matches('/').to_string(),
            client_id: config.client_id.clone(),
            http,
            storage,
            browser,
        })
    }

    pub fn client_id(&self) -> &str {
        &self.client_id
    }

    pub fn storage(&self) -> &S {
        &self.storage
    }

    pub fn browser(&self) -> &B {
        &self.browser
    }

    fn endpoint(&self, path: &str) -> Result<Url, AuthError> {
        Ok(Url::parse(&format!("{}{}", self.authority, path))?)
    }

    pub fn authorization_url(&self, redirect_uri: &str) -> Result<Url, AuthError> {
        let mut url = self.endpoint(AUTHORIZATION_ENDPOINT)?;
        url.query_pairs_mut()
            .append_pair("client_id", &self.client_id)
            .append_pair("redirect_uri", redirect_uri)
            .append_pair("response_type", CODE_PARAMETER);
        Ok(url)
    }

    pub fn end_session_url(&self, redirect_uri: &str) -> Result<Url, AuthError> {
        let mut url = self.endpoint(END_SESSION_ENDPOINT)?;
        url.query_pairs_mut()
            .append_pair("redirect_uri", redirect_uri);
        Ok(url)
    }

    /// Records the login marker and sends the page to the provider.
    pub fn start_login(&self, redirect_uri: &str) -> Result<(), AuthError> {
        let url = self.authorization_url(redirect_uri)?;
        self.storage.set(LOGIN_MARKER_KEY, redirect_uri)?;

        log::info!("Redirecting to authorization endpoint {}", url.path());
        self.browser.navigate(&url)
    }

    /// Drops the local session and sends the page to the end-session endpoint.
    pub fn start_logout(&self, redirect_uri: &str) -> Result<(), AuthError> {
        let url = self.end_session_url(redirect_uri)?;
        self.forget_session()?;

        log::info!("Redirecting to end-session endpoint {}", url.path());
        self.browser.navigate(&url)
    }

    /// Exchanges the `code` of the current URL for tokens.
    ///
    /// Returns `Ok(None)` without any network traffic when the URL carries no
    /// code; the attempt is treated as abandoned and the marker is cleared.
    pub async fn complete_login_callback(&self) -> Result<Option<Session>, AuthError> {
        let current = self.browser.current_url()?;
        let code = current
            .query_pairs()
            .find(|(key, _)| key == CODE_PARAMETER)
            .map(|(_, value)| value.into_owned())
            .filter(|code| !code.is_empty());

        let Some(code) = code else {
            log::debug!("No authorization code in callback URL, dropping login marker");
            self.cancel_login()?;
            return Ok(None);
        };

        let redirect_uri = match self.login_state()? {
            LoginState::Pending { redirect_uri } => redirect_uri,
            LoginState::Anonymous => return Err(AuthError::NoLoginInProgress),
        };

        let params = [
            ("code", code.as_str()),
            ("grant_type", "authorization_code"),
            ("client_id", self.client_id.as_str()),
            ("redirect_uri", redirect_uri.as_str()),
        ];

        let response = self
            .http
            .post(self.endpoint(TOKEN_ENDPOINT)?)
            .form(&params)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            log::error!("Token exchange failed with status {}", status);
            return Err(AuthError::TokenEndpoint { status, body });
        }

        let body = response.text().await?;
        let session = Session::from_token_response(&body)?;

        self.store_session(&session)?;
        self.cancel_login()?;
        log::info!("Authorization code exchanged, session stored");

        Ok(Some(session))
    }

    /// Trades the stored refresh token for a new session. The stored session
    /// is left as it was if the provider rejects the request.
    pub async fn refresh_silently(&self) -> Result<Session, AuthError> {
        let previous = self.get_session()?.ok_or(AuthError::NotLoggedIn)?;
        let refresh_token = previous
            .refresh_token
            .clone()
            .ok_or(AuthError::MissingRefreshToken)?;

        let params = [
            ("refresh_token", refresh_token.as_str()),
            ("grant_type", "refresh_token"),
            ("client_id", self.client_id.as_str()),
        ];

        let response = self
            .http
            .post(self.endpoint(TOKEN_ENDPOINT)?)
            .form(&params)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            log::warn!("Token refresh failed with status {}", status);
            return Err(AuthError::RefreshFailed { status, body });
        }

        let body = response.text().await?;
        let mut session = Session::from_token_response(&body)?;

        // Use old refresh token if new one not provided
        if session.refresh_token.is_none() {
            session.refresh_token = Some(refresh_token);
        }

        self.store_session(&session)?;
        log::debug!("Session refreshed, expires at {}", session.expires_at);

        Ok(session)
    }

    pub fn login_state(&self) -> Result<LoginState, AuthError> {
        Ok(match self.storage.get(LOGIN_MARKER_KEY)? {
            Some(redirect_uri) if !redirect_uri.is_empty() => LoginState::Pending { redirect_uri },
            _ => LoginState::Anonymous,
        })
    }

    pub fn is_login_in_progress(&self) -> Result<bool, AuthError> {
        Ok(matches!(self.login_state()?, LoginState::Pending { .. }))
    }

    pub fn cancel_login(&self) -> Result<(), AuthError> {
        self.storage.remove(LOGIN_MARKER_KEY)
    }

    pub fn get_session(&self) -> Result<Option<Session>, AuthError> {
        match self.storage.get(SESSION_KEY)? {
            Some(raw) => Ok(Some(serde_json::from_str(&raw)?)),
            None => Ok(None),
        }
    }

    pub fn store_session(&self, session: &Session) -> Result<(), AuthError> {
        let json_string = serde_json::to_string(session)?;
        self.storage.set(SESSION_KEY, &json_string)
    }

    pub fn forget_session(&self) -> Result<(), AuthError> {
        self.storage.remove(SESSION_KEY)
    }
}
