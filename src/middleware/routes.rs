use std::sync::Arc;

use axum::Form;
use axum::Router;
use axum::extract::State;
use axum::http::{HeaderMap, header};
use axum::response::{IntoResponse, Redirect, Response};
use axum::routing::{get, post};
use axum_extra::extract::PrivateCookieJar;
use url::Url;

use super::config::PortalConfig;
use super::cookies;
use super::guard::AccessGuard;
use super::state::PortalState;
use super::types::{ForgotPasswordForm, RegisterForm, ResetPasswordForm, SignInForm};
use crate::client::SignUpOutcome;
use crate::destinations::Destinations;
use crate::error::Error;
use crate::events::{SessionChange, SessionEvents};
use crate::gate::Requirement;
use crate::types::Session;

/// Handle to a mounted portal, for guarding pages and watching sessions.
#[derive(Clone)]
pub struct PortalHandle {
    state: PortalState,
}

impl PortalHandle {
    /// State for [`require_access`](super::require_access) on pages with `requirement`.
    #[must_use]
    pub fn guard(&self, requirement: Requirement) -> AccessGuard {
        AccessGuard {
            state: self.state.clone(),
            requirement,
        }
    }

    /// Session changes published by the portal routes.
    #[must_use]
    pub fn events(&self) -> &SessionEvents {
        &self.state.events
    }

    #[must_use]
    pub fn destinations(&self) -> &Destinations {
        &self.state.settings.destinations
    }
}

/// Create the portal authentication router.
pub fn portal_routes(config: PortalConfig) -> (Router, PortalHandle) {
    let auth_path = config.settings.auth_path.clone();

    let state = PortalState {
        client: Arc::new(config.client),
        settings: config.settings,
        events: SessionEvents::new(),
    };

    let router = Router::new()
        .route(&format!("{auth_path}/sign-in"), post(sign_in))
        .route(&format!("{auth_path}/register"), post(register))
        .route(
            &format!("{auth_path}/forgot-password"),
            post(forgot_password),
        )
        .route(
            &format!("{auth_path}/reset-password"),
            post(reset_password),
        )
        .route(
            &format!("{auth_path}/sign-out"),
            get(sign_out).post(sign_out),
        )
        .with_state(state.clone());

    (router, PortalHandle { state })
}

// ── Sign in ────────────────────────────────────────────────────────

async fn sign_in(
    State(state): State<PortalState>,
    jar: PrivateCookieJar,
    Form(form): Form<SignInForm>,
) -> Result<(PrivateCookieJar, Redirect), Response> {
    let destinations = &state.settings.destinations;

    let session = state
        .client
        .sign_in_with_password(&form.email, &form.password)
        .await
        .map_err(|e| {
            tracing::warn!(error = %e, "Sign-in failed");
            redirect_with(destinations.login(), "error", failure_code(&e, "invalid_credentials"))
        })?;

    // A profile that cannot be read yet sends the user to the pending page.
    let profile = match state
        .client
        .get_profile(&session.access_token, &session.user.id)
        .await
    {
        Ok(profile) => profile,
        Err(e) => {
            tracing::warn!(error = %e, user_id = %session.user.id, "Profile lookup after sign-in failed");
            None
        }
    };

    let to = destinations
        .after_sign_in(profile.as_ref(), state.settings.policy)
        .to_string();
    tracing::info!(user_id = %session.user.id, to = %to, "Portal sign-in successful");

    let jar = jar.add(session_cookie(&state, &session));
    state.events.publish(SessionChange::signed_in(session));

    Ok((jar, Redirect::to(&to)))
}

// ── Register ───────────────────────────────────────────────────────

async fn register(
    State(state): State<PortalState>,
    jar: PrivateCookieJar,
    Form(form): Form<RegisterForm>,
) -> Result<(PrivateCookieJar, Redirect), Response> {
    let destinations = &state.settings.destinations;

    let outcome = state
        .client
        .sign_up(&form.email, &form.password, &form.metadata())
        .await
        .map_err(|e| {
            tracing::warn!(error = %e, "Registration failed");
            redirect_with(destinations.register(), "error", failure_code(&e, "sign_up_failed"))
        })?;

    match outcome {
        SignUpOutcome::SignedIn(session) => {
            tracing::info!(user_id = %session.user.id, "Registered and signed in");
            let jar = jar.add(session_cookie(&state, &session));
            state.events.publish(SessionChange::signed_in(session));
            // New accounts always start unapproved.
            Ok((jar, Redirect::to(destinations.pending())))
        }
        SignUpOutcome::ConfirmationSent(user) => {
            tracing::info!(user_id = %user.id, "Registered, confirmation email sent");
            let login = format!("{}?notice=confirm_email", destinations.login());
            Ok((jar, Redirect::to(&login)))
        }
    }
}

// ── Forgot password ────────────────────────────────────────────────

async fn forgot_password(
    State(state): State<PortalState>,
    headers: HeaderMap,
    Form(form): Form<ForgotPasswordForm>,
) -> Response {
    let page = state.settings.destinations.forgot_password();

    // An explicitly configured reset page wins inside the client.
    let link = match state.client.config().reset_password_redirect() {
        Some(_) => None,
        None => reset_link(&state, &headers),
    };

    match state.client.reset_password(&form.email, link.as_ref()).await {
        Ok(()) => redirect_with(page, "notice", "email_sent"),
        Err(e) => {
            tracing::warn!(error = %e, "Password reset request failed");
            redirect_with(page, "error", failure_code(&e, "reset_failed"))
        }
    }
}

// ── Reset password ─────────────────────────────────────────────────

async fn reset_password(
    State(state): State<PortalState>,
    Form(form): Form<ResetPasswordForm>,
) -> Response {
    let destinations = &state.settings.destinations;
    match state
        .client
        .update_password(&form.access_token, &form.password)
        .await
    {
        Ok(()) => {
            tracing::info!("Password updated");
            redirect_with(destinations.login(), "notice", "password_updated")
        }
        Err(e) => {
            tracing::warn!(error = %e, "Password update failed");
            redirect_with(
                destinations.reset_password(),
                "error",
                failure_code(&e, "update_failed"),
            )
        }
    }
}

// ── Sign out ───────────────────────────────────────────────────────

async fn sign_out(
    State(state): State<PortalState>,
    jar: PrivateCookieJar,
) -> (PrivateCookieJar, Redirect) {
    let name = &state.settings.session_cookie_name;

    let mut signed_out = None;
    if let Some(token) = cookies::access_token(&jar, name) {
        match state.client.get_user(&token).await {
            Ok(identity) => signed_out = Some(identity.id),
            Err(e) => tracing::warn!(error = %e, "Could not resolve user during sign-out"),
        }
        if let Err(e) = state.client.sign_out(&token).await {
            tracing::warn!(error = %e, "Token revocation failed during sign-out");
        }
    }

    match signed_out {
        Some(user_id) => {
            tracing::info!(user_id = %user_id, "Portal sign-out");
            state.events.publish(SessionChange::signed_out(user_id));
        }
        None => tracing::info!("Portal sign-out without a known user"),
    }

    let clear_cookie = cookies::clear_session_cookie(name);
    (
        jar.remove(clear_cookie),
        Redirect::to(state.settings.destinations.login()),
    )
}

// ── Helpers ────────────────────────────────────────────────────────

fn session_cookie(
    state: &PortalState,
    session: &Session,
) -> axum_extra::extract::cookie::Cookie<'static> {
    let ttl = session
        .expires_in
        .and_then(|s| i64::try_from(s).ok())
        .unwrap_or(state.settings.session_ttl_secs);
    cookies::session_cookie(
        &state.settings.session_cookie_name,
        &session.access_token,
        ttl,
        state.settings.secure_cookies,
    )
}

/// Absolute URL of the reset-password page: the configured site URL, or
/// the request's `Host` with the scheme implied by the cookie settings.
fn reset_link(state: &PortalState, headers: &HeaderMap) -> Option<Url> {
    let base = match &state.settings.site_url {
        Some(url) => url.clone(),
        None => {
            let host = headers.get(header::HOST)?.to_str().ok()?;
            let scheme = if state.settings.secure_cookies { "https" } else { "http" };
            format!("{scheme}://{host}/").parse().ok()?
        }
    };
    base.join(state.settings.destinations.reset_password()).ok()
}

/// Rejections by the provider keep their specific code; transport failures
/// are reported as the provider being unavailable.
fn failure_code(e: &Error, rejected: &'static str) -> &'static str {
    match e {
        Error::Provider { .. } => rejected,
        _ => "provider_unavailable",
    }
}

fn redirect_with(page: &str, key: &str, code: &str) -> Response {
    let encoded = urlencoding::encode(code);
    Redirect::to(&format!("{page}?{key}={encoded}")).into_response()
}
