use std::future::Future;

use crate::error::BoxError;
use crate::types::{Identity, Profile};

/// Source of the facts the gate decides on.
///
/// Implemented over HTTP by [`TokenSession`](crate::client::TokenSession);
/// tests and other hosts can supply their own. Errors are reported as-is and
/// the gate turns them into a fail-closed redirect, so implementations should
/// not swallow them.
///
/// # Example
///
/// ```rust,ignore
/// impl IdentityProvider for MyPortal {
///     async fn current_identity(&self) -> Result<Option<Identity>, BoxError> {
///         Ok(self.session.as_ref().map(|s| s.user.clone()))
///     }
///
///     async fn current_profile(&self, identity: &Identity) -> Result<Option<Profile>, BoxError> {
///         self.profiles.find(&identity.id).await
///     }
/// }
/// ```
pub trait IdentityProvider: Send + Sync {
    /// The identity bound to the current session, `None` when signed out.
    fn current_identity(
        &self,
    ) -> impl Future<Output = Result<Option<Identity>, BoxError>> + Send;

    /// The profile row for `identity`, `None` when no row exists yet.
    fn current_profile(
        &self,
        identity: &Identity,
    ) -> impl Future<Output = Result<Option<Profile>, BoxError>> + Send;
}
