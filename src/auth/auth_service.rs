use serde_json::Value;
use url::Url;

use crate::auth::auth_storage::Storage;
use crate::auth::browser::{Browser, Runtime};
use crate::auth::config::{AuthConfig, ErrorHandler};
use crate::auth::error::AuthError;
use crate::auth::oidc_client::{LoginState, OidcClient};
use crate::auth::token_data::Session;

pub const LOGIN_REDIRECT_FAILED: &str = "Auth failed: cant perform login redirect";
pub const LOGOUT_REDIRECT_FAILED: &str = "Auth failed: cant perform logout redirect";
pub const TOKEN_EXCHANGE_FAILED: &str = "Auth failed: cant obtain token";

/// Query parameters the provider adds when it sends the user back.
const CALLBACK_PARAMS: &[&str] = &["code", "session_state"];
const ERROR_PARAMS: &[&str] = &["error", "error_description"];

/// Application-facing entry point. Build one per page load with
/// [`AuthService::start`]; it finishes or restarts whatever login the
/// previous page left behind.
pub struct AuthService<S, B> {
    client: OidcClient<S, B>,
    auto_login: bool,
    redirect_url: Option<String>,
    error_handler: ErrorHandler,
}

impl<S: Storage, B: Browser> AuthService<S, B> {
    /// Builds the service without looking at the current URL.
    pub fn new(config: AuthConfig, storage: S, browser: B) -> Result<Self, AuthError> {
        let client = OidcClient::new(&config, storage, browser)?;

        let redirect_url = match client.browser().runtime() {
            Runtime::Native => config.native_redirect_url,
            Runtime::Desktop => config.desktop_redirect_url,
            Runtime::Web => None,
        };

        Ok(Self {
            client,
            auto_login: config.auto_login,
            redirect_url,
            error_handler: config.error_handler,
        })
    }

    /// Builds the service and runs [`AuthService::reconcile`].
    pub async fn start(config: AuthConfig, storage: S, browser: B) -> Result<Self, AuthError> {
        let service = Self::new(config, storage, browser)?;
        service.reconcile().await?;
        Ok(service)
    }

    pub fn client(&self) -> &OidcClient<S, B> {
        &self.client
    }

    fn redirect_uri(&self) -> Result<String, AuthError> {
        match &self.redirect_url {
            Some(url) => Ok(url.clone()),
            None => Ok(self.client.browser().current_url()?.to_string()),
        }
    }

    pub fn login(&self) {
        if let Err(e) = self
            .redirect_uri()
            .and_then(|uri| self.client.start_login(&uri))
        {
            log::warn!("Login redirect failed: {}", e);
            self.error_handler.call(LOGIN_REDIRECT_FAILED);
        }
    }

    pub fn logout(&self) {
        if let Err(e) = self
            .redirect_uri()
            .and_then(|uri| self.client.start_logout(&uri))
        {
            log::warn!("Logout redirect failed: {}", e);
            self.error_handler.call(LOGOUT_REDIRECT_FAILED);
        }
    }

    /// True when a session record is stored. Expiry is not considered; see
    /// [`Session::is_expired`].
    pub fn is_logged_in(&self) -> bool {
        match self.client.get_session() {
            Ok(session) => session.is_some(),
            Err(e) => {
                log::warn!("Failed to read stored session: {}", e);
                false
            }
        }
    }

    pub fn login_state(&self) -> Result<LoginState, AuthError> {
        self.client.login_state()
    }

    fn require_session(&self) -> Result<Session, AuthError> {
        self.client.get_session()?.ok_or(AuthError::NotLoggedIn)
    }

    pub fn get_token(&self) -> Result<String, AuthError> {
        Ok(self.require_session()?.access_token)
    }

    /// Looks `claim` up in the stored id token. `Ok(None)` if the token does
    /// not carry it.
    pub fn get_user_info(&self, claim: &str) -> Result<Option<Value>, AuthError> {
        self.require_session()?.claim(claim)
    }

    pub async fn try_to_refresh(&self) -> Result<Session, AuthError> {
        if !self.is_logged_in() {
            return Err(AuthError::NotLoggedIn);
        }
        self.client.refresh_silently().await
    }

    /// Startup reconciliation between storage and the current URL.
    ///
    /// - no login pending, no session, auto-login on: start a login
    /// - login pending, no `code` in the URL: drop the stale attempt, clear
    ///   provider error parameters and start over
    /// - login pending with a `code`: exchange it and reload without the
    ///   callback parameters
    pub async fn reconcile(&self) -> Result<(), AuthError> {
        let browser = self.client.browser();
        let current = browser.current_url()?;

        match self.client.login_state()? {
            LoginState::Anonymous => {
                if !self.is_logged_in() && self.auto_login {
                    log::info!("No session, starting automatic login");
                    self.login();
                }
            }
            LoginState::Pending { .. } if !has_query_param(&current, "code") => {
                if let Some(error) = query_param(&current, "error") {
                    log::warn!("Provider returned error: {}", error);
                } else {
                    log::debug!("Stale login attempt, starting over");
                }

                self.client.cancel_login()?;
                browser.replace_url(&strip_query_params(&current, ERROR_PARAMS))?;
                self.login();
            }
            LoginState::Pending { .. } => {
                let stripped = strip_query_params(&current, CALLBACK_PARAMS);

                match self.client.complete_login_callback().await {
                    Ok(_) => {
                        self.client.cancel_login()?;
                        browser.navigate(&stripped)?;
                    }
                    Err(e) => {
                        log::error!("Failed to exchange code for tokens: {}", e);
                        self.client.cancel_login()?;
                        browser.replace_url(&stripped)?;
                        self.error_handler.call(TOKEN_EXCHANGE_FAILED);
                    }
                }
            }
        }

        Ok(())
    }
}

fn query_param(url: &Url, name: &str) -> Option<String> {
    url.query_pairs()
        .find(|(key, _)| key == name)
        .map(|(_, value)| value.into_owned())
}

fn has_query_param(url: &Url, name: &str) -> bool {
    query_param(url, name).is_some_and(|value| !value.is_empty())
}

fn strip_query_params(url: &Url, names: &[&str]) -> Url {
    let kept: Vec<(String, String)> = url
        .query_pairs()
        .filter(|(key, _)| !names.iter().any(|name| key == name))
        .map(|(key, value)| (key.into_owned(), value.into_owned()))
        .collect();

    let mut stripped = url.clone();
    if kept.is_empty() {
        stripped.set_query(None);
    } else {
        stripped.query_pairs_mut().clear().extend_pairs(kept);
    }
    stripped
}
