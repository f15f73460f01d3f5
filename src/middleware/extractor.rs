use std::convert::Infallible;

use axum::extract::{FromRequestParts, OptionalFromRequestParts};
use axum::http::request::Parts;

use super::error::AuthError;
use crate::types::{Identity, Profile};

/// User admitted by [`require_access`](super::require_access).
///
/// The guard stores it in the request extensions; use it as an Axum
/// extractor in handlers behind the guard. Returns `401 Unauthorized` when
/// the route is not guarded.
///
/// # Example
///
/// ```rust,ignore
/// async fn dashboard(user: PortalUser) -> impl IntoResponse {
///     let name = user.profile.as_ref().and_then(|p| p.display_name()).unwrap_or("there");
///     format!("Welcome, {name}")
/// }
/// ```
#[derive(Debug, Clone)]
pub struct PortalUser {
    pub identity: Identity,
    /// `None` only on pages that do not require approval.
    pub profile: Option<Profile>,
    /// Provider access token, for further user-scoped calls.
    pub access_token: String,
}

impl PortalUser {
    #[must_use]
    pub fn is_admin(&self) -> bool {
        self.profile.as_ref().is_some_and(|p| p.is_admin)
    }
}

impl<S: Send + Sync> FromRequestParts<S> for PortalUser {
    type Rejection = AuthError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<PortalUser>()
            .cloned()
            .ok_or(AuthError::Unauthenticated)
    }
}

impl<S: Send + Sync> OptionalFromRequestParts<S> for PortalUser {
    type Rejection = Infallible;

    async fn from_request_parts(
        parts: &mut Parts,
        _state: &S,
    ) -> Result<Option<Self>, Self::Rejection> {
        Ok(parts.extensions.get::<PortalUser>().cloned())
    }
}
