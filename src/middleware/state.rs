use std::sync::Arc;

use axum::extract::FromRef;
use axum_extra::extract::cookie::Key;

use super::config::PortalSettings;
use crate::client::ProviderClient;
use crate::events::SessionEvents;

/// Shared state for portal route handlers and the access guard.
#[derive(Clone)]
pub(super) struct PortalState {
    pub(super) client: Arc<ProviderClient>,
    pub(super) settings: PortalSettings,
    pub(super) events: SessionEvents,
}

// PrivateCookieJar requires Key to be extractable from state
impl FromRef<PortalState> for Key {
    fn from_ref(state: &PortalState) -> Self {
        state.settings.cookie_key.clone()
    }
}
