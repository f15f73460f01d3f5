use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::json;
use url::Url;

use crate::error::{BoxError, Error};
use crate::provider::IdentityProvider;
use crate::types::{Identity, Profile, Session, UserId};

/// Connection settings for a Supabase-compatible backend.
///
/// Required fields are constructor parameters, so there are no runtime "missing field" errors.
///
/// ```rust,ignore
/// use portal_gate::ProviderConfig;
///
/// let config = ProviderConfig::new("https://abc123.supabase.co".parse()?, "anon-key")
///     .with_profiles_table("customer_profiles");
/// ```
#[derive(Debug, Clone)]
#[non_exhaustive]
pub struct ProviderConfig {
    pub(crate) project_url: Url,
    pub(crate) anon_key: String,
    pub(crate) profiles_table: String,
    pub(crate) reset_password_redirect: Option<Url>,
}

impl ProviderConfig {
    #[must_use]
    pub fn new(project_url: Url, anon_key: impl Into<String>) -> Self {
        Self {
            project_url,
            anon_key: anon_key.into(),
            profiles_table: "profiles".into(),
            reset_password_redirect: None,
        }
    }

    /// Create config from environment variables.
    ///
    /// # Required env vars
    /// - `SUPABASE_URL`: project URL (must be a valid URL)
    /// - `SUPABASE_ANON_KEY`: public anon key
    ///
    /// # Optional env vars
    /// - `PORTAL_PROFILES_TABLE`: profiles table name (default `profiles`)
    /// - `PORTAL_RESET_REDIRECT`: absolute URL of the reset-password page
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] if required env vars are missing or URLs are invalid.
    pub fn from_env() -> Result<Self, Error> {
        let url_str = std::env::var("SUPABASE_URL")
            .map_err(|_| Error::Config("SUPABASE_URL is required".into()))?;
        let project_url: Url = url_str
            .parse()
            .map_err(|e| Error::Config(format!("SUPABASE_URL: {e}")))?;
        let anon_key = std::env::var("SUPABASE_ANON_KEY")
            .map_err(|_| Error::Config("SUPABASE_ANON_KEY is required".into()))?;

        let mut config = Self::new(project_url, anon_key);

        if let Ok(table) = std::env::var("PORTAL_PROFILES_TABLE") {
            config = config.with_profiles_table(table);
        }
        if let Ok(url_str) = std::env::var("PORTAL_RESET_REDIRECT") {
            let url: Url = url_str
                .parse()
                .map_err(|e| Error::Config(format!("PORTAL_RESET_REDIRECT: {e}")))?;
            config = config.with_reset_password_redirect(url);
        }

        Ok(config)
    }

    #[must_use]
    pub fn with_profiles_table(mut self, table: impl Into<String>) -> Self {
        self.profiles_table = table.into();
        self
    }

    /// Page the password-reset email links back to.
    #[must_use]
    pub fn with_reset_password_redirect(mut self, url: Url) -> Self {
        self.reset_password_redirect = Some(url);
        self
    }

    #[must_use]
    pub fn reset_password_redirect(&self) -> Option<&Url> {
        self.reset_password_redirect.as_ref()
    }

    #[must_use]
    pub fn project_url(&self) -> &Url {
        &self.project_url
    }

    #[must_use]
    pub fn profiles_table(&self) -> &str {
        &self.profiles_table
    }

    fn endpoint(&self, path: &str) -> Result<Url, Error> {
        self.project_url
            .join(path)
            .map_err(|e| Error::Config(format!("invalid endpoint {path}: {e}")))
    }
}

/// Extra fields stored on the auth user at sign-up.
///
/// The backend copies them into the new `profiles` row.
#[derive(Debug, Clone, Default, Serialize)]
pub struct SignUpMetadata {
    pub full_name: String,
    pub phone: String,
    pub company_name: String,
}

/// Result of [`ProviderClient::sign_up`].
#[derive(Debug, Clone)]
pub enum SignUpOutcome {
    /// Auto-confirmed: the user is signed in.
    SignedIn(Session),
    /// A confirmation email was sent; no session yet.
    ConfirmationSent(Identity),
}

#[derive(Deserialize)]
#[serde(untagged)]
enum SignUpResponse {
    Session(Session),
    User(Identity),
}

/// HTTP client for the backend's auth and `profiles` endpoints.
pub struct ProviderClient {
    config: ProviderConfig,
    http: reqwest::Client,
}

impl ProviderClient {
    #[must_use]
    pub fn new(config: ProviderConfig) -> Self {
        Self {
            config,
            http: reqwest::Client::new(),
        }
    }

    /// Use a custom HTTP client (for connection pool reuse or testing).
    #[must_use]
    pub fn with_http_client(mut self, client: reqwest::Client) -> Self {
        self.http = client;
        self
    }

    #[must_use]
    pub fn config(&self) -> &ProviderConfig {
        &self.config
    }

    /// Sign in with email and password.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Http`] on network failure, or
    /// [`Error::Provider`] if the credentials are rejected.
    pub async fn sign_in_with_password(&self, email: &str, password: &str) -> Result<Session, Error> {
        let mut url = self.config.endpoint("auth/v1/token")?;
        url.query_pairs_mut().append_pair("grant_type", "password");

        let response = self
            .http
            .post(url)
            .header("apikey", &self.config.anon_key)
            .json(&json!({ "email": email, "password": password }))
            .send()
            .await?;

        let response = Self::ensure_success(response, "sign in").await?;
        response.json::<Session>().await.map_err(Into::into)
    }

    /// Register a new user.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Http`] on network failure, [`Error::Provider`] if the
    /// backend refuses the sign-up, or [`Error::Decode`] on an unexpected body.
    pub async fn sign_up(
        &self,
        email: &str,
        password: &str,
        metadata: &SignUpMetadata,
    ) -> Result<SignUpOutcome, Error> {
        let url = self.config.endpoint("auth/v1/signup")?;

        let response = self
            .http
            .post(url)
            .header("apikey", &self.config.anon_key)
            .json(&json!({ "email": email, "password": password, "data": metadata }))
            .send()
            .await?;

        let response = Self::ensure_success(response, "sign up").await?;
        let body = response.text().await?;
        match serde_json::from_str::<SignUpResponse>(&body) {
            Ok(SignUpResponse::Session(session)) => Ok(SignUpOutcome::SignedIn(session)),
            Ok(SignUpResponse::User(user)) => Ok(SignUpOutcome::ConfirmationSent(user)),
            Err(e) => Err(Error::Decode(format!("sign up: {e}"))),
        }
    }

    /// Revoke the session behind `access_token`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Http`] on network failure, or [`Error::Provider`] on
    /// a non-success status.
    pub async fn sign_out(&self, access_token: &str) -> Result<(), Error> {
        let url = self.config.endpoint("auth/v1/logout")?;

        let response = self
            .http
            .post(url)
            .header("apikey", &self.config.anon_key)
            .bearer_auth(access_token)
            .send()
            .await?;

        Self::ensure_success(response, "sign out").await?;
        Ok(())
    }

    /// Send a password-reset email whose link lands on `redirect_to`, or on
    /// the configured reset page when `None`. With neither, the provider
    /// falls back to its own site URL.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Http`] on network failure, or [`Error::Provider`] on
    /// a non-success status.
    pub async fn reset_password(&self, email: &str, redirect_to: Option<&Url>) -> Result<(), Error> {
        let mut url = self.config.endpoint("auth/v1/recover")?;
        if let Some(redirect) = redirect_to.or(self.config.reset_password_redirect.as_ref()) {
            url.query_pairs_mut()
                .append_pair("redirect_to", redirect.as_str());
        }

        let response = self
            .http
            .post(url)
            .header("apikey", &self.config.anon_key)
            .json(&json!({ "email": email }))
            .send()
            .await?;

        Self::ensure_success(response, "password reset").await?;
        Ok(())
    }

    /// Set a new password for the signed-in user (after following a reset link).
    ///
    /// # Errors
    ///
    /// Returns [`Error::Http`] on network failure, or [`Error::Provider`] on
    /// a non-success status.
    pub async fn update_password(&self, access_token: &str, new_password: &str) -> Result<(), Error> {
        let url = self.config.endpoint("auth/v1/user")?;

        let response = self
            .http
            .put(url)
            .header("apikey", &self.config.anon_key)
            .bearer_auth(access_token)
            .json(&json!({ "password": new_password }))
            .send()
            .await?;

        Self::ensure_success(response, "password update").await?;
        Ok(())
    }

    /// Fetch the user behind `access_token`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Http`] on network failure, or [`Error::Provider`] if
    /// the token is invalid or expired.
    pub async fn get_user(&self, access_token: &str) -> Result<Identity, Error> {
        let url = self.config.endpoint("auth/v1/user")?;

        let response = self
            .http
            .get(url)
            .header("apikey", &self.config.anon_key)
            .bearer_auth(access_token)
            .send()
            .await?;

        let response = Self::ensure_success(response, "user lookup").await?;
        response.json::<Identity>().await.map_err(Into::into)
    }

    /// Fetch the profile row for `user_id`. `None` when no row exists.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Http`] on network failure, or [`Error::Provider`] on
    /// a non-success status.
    pub async fn get_profile(
        &self,
        access_token: &str,
        user_id: &UserId,
    ) -> Result<Option<Profile>, Error> {
        let mut url = self.profiles_url()?;
        url.query_pairs_mut()
            .append_pair("id", &format!("eq.{user_id}"))
            .append_pair("select", "*");

        let rows = self
            .fetch_profiles(url, access_token, "profile lookup")
            .await?;
        Ok(rows.into_iter().next())
    }

    /// Profiles awaiting approval, newest first.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Http`] on network failure, or [`Error::Provider`] on
    /// a non-success status (e.g. the caller is not an admin).
    pub async fn list_pending_profiles(&self, access_token: &str) -> Result<Vec<Profile>, Error> {
        let mut url = self.profiles_url()?;
        url.query_pairs_mut()
            .append_pair("is_approved", "eq.false")
            .append_pair("order", "created_at.desc")
            .append_pair("select", "*");

        self.fetch_profiles(url, access_token, "pending profiles")
            .await
    }

    /// Mark a profile approved and stamp `approved_at`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Http`] on network failure, [`Error::Provider`] on a
    /// non-success status, or [`Error::Decode`] if no row was updated.
    pub async fn approve_profile(&self, access_token: &str, user_id: &UserId) -> Result<Profile, Error> {
        let approved_at = time::OffsetDateTime::now_utc()
            .format(&time::format_description::well_known::Rfc3339)
            .map_err(|e| Error::Decode(format!("approved_at: {e}")))?;

        let mut url = self.profiles_url()?;
        url.query_pairs_mut()
            .append_pair("id", &format!("eq.{user_id}"));

        let response = self
            .http
            .patch(url)
            .header("apikey", &self.config.anon_key)
            .header("Prefer", "return=representation")
            .bearer_auth(access_token)
            .json(&json!({ "is_approved": true, "approved_at": approved_at }))
            .send()
            .await?;

        let response = Self::ensure_success(response, "profile approval").await?;
        let rows = response.json::<Vec<Profile>>().await?;
        tracing::info!(user_id = %user_id, "Profile approved");
        rows.into_iter()
            .next()
            .ok_or_else(|| Error::Decode(format!("no profile row for {user_id}")))
    }

    fn profiles_url(&self) -> Result<Url, Error> {
        self.config
            .endpoint(&format!("rest/v1/{}", self.config.profiles_table))
    }

    async fn fetch_profiles(
        &self,
        url: Url,
        access_token: &str,
        operation: &'static str,
    ) -> Result<Vec<Profile>, Error> {
        let response = self
            .http
            .get(url)
            .header("apikey", &self.config.anon_key)
            .bearer_auth(access_token)
            .send()
            .await?;

        let response = Self::ensure_success(response, operation).await?;
        response.json::<Vec<Profile>>().await.map_err(Into::into)
    }

    /// Checks HTTP response status; returns the response on success or an error with details.
    async fn ensure_success(
        response: reqwest::Response,
        operation: &'static str,
    ) -> Result<reqwest::Response, Error> {
        if response.status().is_success() {
            return Ok(response);
        }
        let status = response.status().as_u16();
        let body = response.text().await.unwrap_or_default();
        Err(Error::Provider {
            operation,
            status: Some(status),
            detail: body,
        })
    }
}

/// A request's view of the backend: the shared client plus the caller's
/// access token, if any.
pub struct TokenSession {
    client: Arc<ProviderClient>,
    access_token: Option<String>,
}

impl TokenSession {
    #[must_use]
    pub fn new(client: Arc<ProviderClient>, access_token: Option<String>) -> Self {
        Self {
            client,
            access_token,
        }
    }

    #[must_use]
    pub fn access_token(&self) -> Option<&str> {
        self.access_token.as_deref()
    }

    /// Whether the token resolves to a user. Lookup errors read as `false`.
    ///
    /// A token the provider rejects (401/403) is signed out, not an error.
    pub async fn is_logged_in(&self) -> bool {
        matches!(self.current_identity().await, Ok(Some(_)))
    }

    /// Whether the user's profile is approved. Lookup errors read as `false`.
    pub async fn is_approved(&self) -> bool {
        self.profile_flag(|p| p.is_approved).await
    }

    /// Whether the user's profile is an admin. Lookup errors read as `false`.
    pub async fn is_admin(&self) -> bool {
        self.profile_flag(|p| p.is_admin).await
    }

    async fn profile_flag(&self, flag: impl Fn(&Profile) -> bool) -> bool {
        let Ok(Some(identity)) = self.current_identity().await else {
            return false;
        };
        matches!(self.current_profile(&identity).await, Ok(Some(p)) if flag(&p))
    }
}

impl IdentityProvider for TokenSession {
    async fn current_identity(&self) -> Result<Option<Identity>, BoxError> {
        let Some(token) = &self.access_token else {
            return Ok(None);
        };
        match self.client.get_user(token).await {
            Ok(identity) => Ok(Some(identity)),
            Err(Error::Provider {
                status: Some(401 | 403),
                ..
            }) => {
                tracing::debug!("Access token rejected by provider");
                Ok(None)
            }
            Err(e) => Err(e.into()),
        }
    }

    async fn current_profile(&self, identity: &Identity) -> Result<Option<Profile>, BoxError> {
        let Some(token) = &self.access_token else {
            return Ok(None);
        };
        Ok(self.client.get_profile(token, &identity.id).await?)
    }
}
