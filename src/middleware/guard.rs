use axum::extract::{FromRef, Request, State};
use axum::middleware::Next;
use axum::response::{IntoResponse, Redirect, Response};
use axum_extra::extract::PrivateCookieJar;
use axum_extra::extract::cookie::Key;

use super::cookies;
use super::extractor::PortalUser;
use super::state::PortalState;
use crate::client::TokenSession;
use crate::gate::{DenyCause, Requirement, SessionGate};

/// State for [`require_access`]: the portal plus one page requirement.
///
/// Obtain with [`PortalHandle::guard`](super::PortalHandle::guard).
#[derive(Clone)]
pub struct AccessGuard {
    pub(super) state: PortalState,
    pub(super) requirement: Requirement,
}

impl AccessGuard {
    #[must_use]
    pub fn requirement(&self) -> Requirement {
        self.requirement
    }
}

impl FromRef<AccessGuard> for Key {
    fn from_ref(guard: &AccessGuard) -> Self {
        guard.state.settings.cookie_key.clone()
    }
}

/// Gate a request on the session cookie.
///
/// Mount with `axum::middleware::from_fn_with_state`. Denied requests get a
/// `303 See Other` to the decision's destination. A cookie whose token the
/// provider no longer accepts is cleared on the way to the login page; it is
/// kept when the provider merely failed to answer. Admitted requests carry a
/// [`PortalUser`] in their extensions.
///
/// ```rust,ignore
/// let admin = Router::new()
///     .route("/portal/admin/index.html", get(admin_home))
///     .route_layer(from_fn_with_state(portal.guard(Requirement::admin()), require_access));
/// ```
pub async fn require_access(
    State(guard): State<AccessGuard>,
    jar: PrivateCookieJar,
    mut request: Request,
    next: Next,
) -> Response {
    let settings = &guard.state.settings;
    let token = cookies::access_token(&jar, &settings.session_cookie_name);

    let gate = SessionGate::new(TokenSession::new(guard.state.client.clone(), token.clone()))
        .with_policy(settings.policy);
    let evaluation = gate.evaluate(guard.requirement).await;

    if let Some(to) = evaluation.decision.destination(&settings.destinations) {
        tracing::debug!(
            path = %request.uri().path(),
            to = %to,
            cause = ?evaluation.cause,
            "Access denied"
        );
        let redirect = Redirect::to(to);
        if evaluation.cause == Some(DenyCause::Unauthenticated) && token.is_some() {
            let clear = cookies::clear_session_cookie(&settings.session_cookie_name);
            return (jar.remove(clear), redirect).into_response();
        }
        return redirect.into_response();
    }

    let (Some(identity), Some(access_token)) = (evaluation.identity, token) else {
        // Allow always carries the identity it was decided on.
        return Redirect::to(settings.destinations.login()).into_response();
    };

    request.extensions_mut().insert(PortalUser {
        identity,
        profile: evaluation.profile,
        access_token,
    });
    next.run(request).await
}
