pub mod auth_service;
pub mod auth_storage;
pub mod browser;
pub mod config;
pub mod error;
pub mod oidc_client;
pub mod token_data;

pub use auth_service::AuthService;
pub use auth_storage::{FileStorage, MemoryStorage, Storage};
pub use browser::{Browser, HeadlessBrowser, Runtime, SystemBrowser};
pub use config::{AuthConfig, ErrorHandler};
pub use error::AuthError;
pub use oidc_client::{LoginState, OidcClient};
pub use token_data::Session;
