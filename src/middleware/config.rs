use axum_extra::extract::cookie::Key;
use url::Url;

use super::error::AuthError;
use crate::client::{ProviderClient, ProviderConfig};
use crate::destinations::Destinations;
use crate::gate::GatePolicy;

/// Shared portal settings used by both config and runtime state.
#[derive(Clone)]
pub(crate) struct PortalSettings {
    pub(crate) cookie_key: Key,
    pub(crate) session_cookie_name: String,
    pub(crate) session_ttl_secs: i64,
    pub(crate) secure_cookies: bool,
    pub(crate) auth_path: String,
    pub(crate) site_url: Option<Url>,
    pub(crate) destinations: Destinations,
    pub(crate) policy: GatePolicy,
}

impl PortalSettings {
    fn defaults() -> Self {
        Self {
            cookie_key: Key::generate(),
            session_cookie_name: "__portal_session".into(),
            session_ttl_secs: 3600,
            secure_cookies: true,
            auth_path: "/portal/auth".into(),
            site_url: None,
            destinations: Destinations::default(),
            policy: GatePolicy::default(),
        }
    }
}

/// Portal authentication configuration.
///
/// Required field (`client`) is a constructor parameter.
///
/// Use [`from_env()`](PortalConfig::from_env) for convention-based setup,
/// or [`new()`](PortalConfig::new) with `with_*` methods for full control.
pub struct PortalConfig {
    pub(super) client: ProviderClient,
    pub(super) settings: PortalSettings,
}

impl PortalConfig {
    #[must_use]
    pub fn new(client: ProviderClient) -> Self {
        Self {
            client,
            settings: PortalSettings::defaults(),
        }
    }

    /// Create config from environment variables.
    ///
    /// Reads everything [`ProviderConfig::from_env`] reads, plus:
    ///
    /// # Optional env vars
    /// - `PORTAL_SESSION_TTL_SECS`: session cookie lifetime when the provider gives none
    /// - `DEV_AUTH`: Set to `"1"` or `"true"` to disable secure cookies
    /// - `COOKIE_KEY`: Cookie encryption key bytes
    /// - `PORTAL_SITE_URL`: public origin of the portal, used to build links in emails
    ///
    /// # Errors
    ///
    /// Returns [`AuthError::Config`] if required env vars are missing or values are invalid.
    pub fn from_env() -> Result<Self, AuthError> {
        let provider = ProviderConfig::from_env().map_err(|e| AuthError::Config(e.to_string()))?;

        let dev_auth = matches!(
            std::env::var("DEV_AUTH").as_deref(),
            Ok("1") | Ok("true"),
        );

        let cookie_key = match std::env::var("COOKIE_KEY") {
            Ok(k) => Key::try_from(k.as_bytes()).map_err(|_| {
                AuthError::Config(
                    "COOKIE_KEY is set but invalid (must be at least 64 bytes). \
                     Remove the env var to use an ephemeral key, or provide a valid key."
                        .into(),
                )
            })?,
            Err(_) => Key::generate(),
        };

        let mut config = Self::new(ProviderClient::new(provider))
            .with_cookie_key(cookie_key)
            .with_secure_cookies(!dev_auth);

        if let Ok(ttl) = std::env::var("PORTAL_SESSION_TTL_SECS") {
            let secs: i64 = ttl
                .parse()
                .map_err(|e| AuthError::Config(format!("PORTAL_SESSION_TTL_SECS: {e}")))?;
            config = config.with_session_ttl_secs(secs);
        }

        if let Ok(url_str) = std::env::var("PORTAL_SITE_URL") {
            let url: Url = url_str
                .parse()
                .map_err(|e| AuthError::Config(format!("PORTAL_SITE_URL: {e}")))?;
            config = config.with_site_url(url);
        }

        Ok(config)
    }

    #[must_use]
    pub fn with_cookie_key(mut self, key: Key) -> Self {
        self.settings.cookie_key = key;
        self
    }

    #[must_use]
    pub fn with_session_cookie_name(mut self, name: impl Into<String>) -> Self {
        self.settings.session_cookie_name = name.into();
        self
    }

    #[must_use]
    pub fn with_session_ttl_secs(mut self, secs: i64) -> Self {
        self.settings.session_ttl_secs = secs;
        self
    }

    #[must_use]
    pub fn with_secure_cookies(mut self, secure: bool) -> Self {
        self.settings.secure_cookies = secure;
        self
    }

    #[must_use]
    pub fn with_auth_path(mut self, path: impl Into<String>) -> Self {
        self.settings.auth_path = path.into();
        self
    }

    /// Public origin of the portal. Password-reset emails link to this
    /// origin plus the reset-password destination. Without it the request's
    /// `Host` header is used.
    #[must_use]
    pub fn with_site_url(mut self, url: Url) -> Self {
        self.settings.site_url = Some(url);
        self
    }

    #[must_use]
    pub fn with_destinations(mut self, destinations: Destinations) -> Self {
        self.settings.destinations = destinations;
        self
    }

    #[must_use]
    pub fn with_policy(mut self, policy: GatePolicy) -> Self {
        self.settings.policy = policy;
        self
    }
}
