//! OpenID Connect authorization-code login for applications driven by page
//! redirects.
//!
//! Nothing is kept in memory between page loads: the session and the
//! "login in progress" marker live in a [`Storage`], and every page load
//! builds an [`AuthService`] that reconciles that state with the current URL.
//!
//! ```no_run
//! use oidc_redirect::{AuthConfig, AuthService, FileStorage, Runtime, SystemBrowser};
//!
//! # async fn run() -> Result<(), oidc_redirect::AuthError> {
//! let config = AuthConfig::new("https://sso.example.com/realms/main", "desktop")
//!     .with_desktop_redirect_url("example-desktop://callback")
//!     .with_auto_login(true);
//! let browser = SystemBrowser::new(Runtime::Desktop, url::Url::parse("example-desktop://app/")?);
//! let auth = AuthService::start(config, FileStorage::default_location("example")?, browser).await?;
//!
//! if auth.is_logged_in() {
//!     let _token = auth.get_token()?;
//! }
//! # Ok(())
//! # }
//! ```

pub mod auth;

pub use auth::{
    AuthConfig, AuthError, AuthService, Browser, ErrorHandler, FileStorage, HeadlessBrowser,
    LoginState, MemoryStorage, OidcClient, Runtime, Session, Storage, SystemBrowser,
};
