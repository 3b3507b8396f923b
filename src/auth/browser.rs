//! Page location and navigation.
//!
//! The redirect flow only needs four things from its host: which runtime it
//! is embedded in, the URL of the current page, a full-page navigation and an
//! in-place history replace. [`Browser`] captures exactly that.

use std::sync::{Arc, Mutex};

use url::Url;

use crate::auth::error::AuthError;

/// Where the application runs. Selects the redirect URI handed to the
/// identity provider.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum Runtime {
    /// Native mobile wrapper with its own URL scheme.
    Native,
    /// Desktop shell with its own URL scheme.
    Desktop,
    /// Plain web page; the current page URL is the redirect URI.
    #[default]
    Web,
}

pub trait Browser {
    fn runtime(&self) -> Runtime;

    fn current_url(&self) -> Result<Url, AuthError>;

    /// Full-page navigation. On a real page the current execution context is
    /// torn down afterwards; callers must not rely on anything running after it.
    fn navigate(&self, url: &Url) -> Result<(), AuthError>;

    /// Rewrites the visible URL without reloading.
    fn replace_url(&self, url: &Url) -> Result<(), AuthError>;
}

impl<T: Browser + ?Sized> Browser for Arc<T> {
    fn runtime(&self) -> Runtime {
        (**self).runtime()
    }

    fn current_url(&self) -> Result<Url, AuthError> {
        (**self).current_url()
    }

    fn navigate(&self, url: &Url) -> Result<(), AuthError> {
        (**self).navigate(url)
    }

    fn replace_url(&self, url: &Url) -> Result<(), AuthError> {
        (**self).replace_url(url)
    }
}

fn lock<T>(mutex: &Mutex<T>) -> Result<std::sync::MutexGuard<'_, T>, AuthError> {
    mutex
        .lock()
        .map_err(|_| AuthError::Navigation("Failed to lock location".to_string()))
}

/// In-memory page: keeps the location and records every navigation.
#[derive(Debug)]
pub struct HeadlessBrowser {
    runtime: Runtime,
    location: Mutex<Url>,
    navigations: Mutex<Vec<Url>>,
}

impl HeadlessBrowser {
    pub fn new(runtime: Runtime, location: Url) -> Self {
        Self {
            runtime,
            location: Mutex::new(location),
            navigations: Mutex::new(Vec::new()),
        }
    }

    pub fn parse(runtime: Runtime, location: &str) -> Result<Self, AuthError> {
        Ok(Self::new(runtime, Url::parse(location)?))
    }

    /// Every URL passed to [`Browser::navigate`], oldest first.
    pub fn navigations(&self) -> Result<Vec<Url>, AuthError> {
        Ok(lock(&self.navigations)?.clone())
    }

    pub fn set_location(&self, url: Url) -> Result<(), AuthError> {
        *lock(&self.location)? = url;
        Ok(())
    }
}

impl Browser for HeadlessBrowser {
    fn runtime(&self) -> Runtime {
        self.runtime
    }

    fn current_url(&self) -> Result<Url, AuthError> {
        Ok(lock(&self.location)?.clone())
    }

    fn navigate(&self, url: &Url) -> Result<(), AuthError> {
        lock(&self.navigations)?.push(url.clone());
        *lock(&self.location)? = url.clone();
        Ok(())
    }

    fn replace_url(&self, url: &Url) -> Result<(), AuthError> {
        *lock(&self.location)? = url.clone();
        Ok(())
    }
}

/// Desktop shells: pages outside the application are opened in the system
/// browser, the provider calls back through the application's URL scheme and
/// the host forwards that deep link with [`SystemBrowser::set_location`].
#[derive(Debug)]
pub struct SystemBrowser {
    runtime: Runtime,
    location: Mutex<Url>,
}

impl SystemBrowser {
    pub fn new(runtime: Runtime, app_url: Url) -> Self {
        Self {
            runtime,
            location: Mutex::new(app_url),
        }
    }

    pub fn set_location(&self, url: Url) -> Result<(), AuthError> {
        log::debug!("Deep link received: {}", url.path());
        *lock(&self.location)? = url;
        Ok(())
    }
}

impl Browser for SystemBrowser {
    fn runtime(&self) -> Runtime {
        self.runtime
    }

    fn current_url(&self) -> Result<Url, AuthError> {
        Ok(lock(&self.location)?.clone())
    }

    fn navigate(&self, url: &Url) -> Result<(), AuthError> {
        let mut location = lock(&self.location)?;
        if same_app(&location, url) {
            *location = url.clone();
            return Ok(());
        }

        webbrowser::open(url.as_str()).map_err(|e| {
            log::warn!("Failed to open browser: {}", e);
            AuthError::Navigation(e.to_string())
        })
    }

    fn replace_url(&self, url: &Url) -> Result<(), AuthError> {
        *lock(&self.location)? = url.clone();
        Ok(())
    }
}

// Custom schemes have opaque origins, so compare the parts directly.
fn same_app(a: &Url, b: &Url) -> bool {
    a.scheme() == b.scheme()
        && a.host_str() == b.host_str()
        && a.port_or_known_default() == b.port_or_known_default()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_headless_records_navigation() {
        let browser = HeadlessBrowser::parse(Runtime::Web, "https://app.example.com/").unwrap();
        let target = Url::parse("https://idp.example.com/auth").unwrap();

        browser.navigate(&target).unwrap();

        assert_eq!(browser.navigations().unwrap(), vec![target.clone()]);
        assert_eq!(browser.current_url().unwrap(), target);
    }

    #[test]
    fn test_headless_replace_does_not_navigate() {
        let browser =
            HeadlessBrowser::parse(Runtime::Web, "https://app.example.com/?error=x").unwrap();
        let clean = Url::parse("https://app.example.com/").unwrap();

        browser.replace_url(&clean).unwrap();

        assert!(browser.navigations().unwrap().is_empty());
        assert_eq!(browser.current_url().unwrap(), clean);
    }

    #[test]
    fn test_navigations_reports_poisoned_lock() {
        let browser = Arc::new(HeadlessBrowser::parse(Runtime::Web, "https://app.example.com/").unwrap());
        let poisoner = browser.clone();
        let _ = std::thread::spawn(move || {
            let _guard = poisoner.navigations.lock().unwrap();
            panic!("poison the navigation log");
        })
        .join();

        assert!(matches!(
            browser.navigations(),
            Err(AuthError::Navigation(_))
        ));
    }

    #[test]
    fn test_system_browser_in_app_navigation() {
        let browser = SystemBrowser::new(
            Runtime::Desktop,
            Url::parse("myapp://localhost/callback?code=abc").unwrap(),
        );
        let stripped = Url::parse("myapp://localhost/callback").unwrap();

        // Same scheme and host: handled in memory, no system browser
        browser.navigate(&stripped).unwrap();
        assert_eq!(browser.current_url().unwrap(), stripped);
    }

    #[test]
    fn test_same_app() {
        let app = Url::parse("myapp://localhost/").unwrap();
        assert!(same_app(&app, &Url::parse("myapp://localhost/x?y=1").unwrap()));
        assert!(!same_app(&app, &Url::parse("https://localhost/").unwrap()));
        assert!(same_app(
            &Url::parse("https://a.example/").unwrap(),
            &Url::parse("https://a.example:443/b").unwrap()
        ));
    }
}
