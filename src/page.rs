//! One page load's view of the gate.
//!
//! A [`PageGuard`] evaluates at most once and performs the resulting
//! navigation at most once. A fresh navigation means a fresh guard.

use crate::destinations::Destinations;
use crate::gate::{Decision, Evaluation, Requirement, SessionGate};
use crate::provider::IdentityProvider;
use crate::types::{Identity, Profile};

/// Performs client-side navigation.
pub trait Navigator: Send + Sync {
    fn navigate(&self, to: &str);
}

impl<N: Navigator + ?Sized> Navigator for std::sync::Arc<N> {
    fn navigate(&self, to: &str) {
        (**self).navigate(to);
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum GuardState {
    Unchecked,
    Allowed,
    LoginRedirected,
    PendingRedirected,
    DashboardRedirected,
}

impl GuardState {
    #[must_use]
    pub fn is_terminal(self) -> bool {
        !matches!(self, Self::Unchecked)
    }
}

impl From<Decision> for GuardState {
    fn from(decision: Decision) -> Self {
        match decision {
            Decision::Allow => Self::Allowed,
            Decision::RedirectToLogin => Self::LoginRedirected,
            Decision::RedirectToPending => Self::PendingRedirected,
            Decision::RedirectToDashboard => Self::DashboardRedirected,
        }
    }
}

pub struct PageGuard<P, N> {
    gate: SessionGate<P>,
    navigator: N,
    destinations: Destinations,
    current_path: String,
    state: GuardState,
    evaluation: Option<Evaluation>,
}

impl<P: IdentityProvider, N: Navigator> PageGuard<P, N> {
    #[must_use]
    pub fn new(gate: SessionGate<P>, navigator: N, current_path: impl Into<String>) -> Self {
        Self {
            gate,
            navigator,
            destinations: Destinations::default(),
            current_path: current_path.into(),
            state: GuardState::Unchecked,
            evaluation: None,
        }
    }

    #[must_use]
    pub fn with_destinations(mut self, destinations: Destinations) -> Self {
        self.destinations = destinations;
        self
    }

    /// Gate the page. Returns `true` when the page may initialize.
    ///
    /// On denial the navigator is sent to the decision's destination and the
    /// caller must stop initializing. Later calls return the first result
    /// without consulting the provider or navigating again.
    pub async fn check(&mut self, requirement: Requirement) -> bool {
        if let Some(evaluation) = &self.evaluation {
            return evaluation.allowed();
        }

        let evaluation = self.gate.evaluate(requirement).await;

        if let Some(to) = evaluation.decision.destination(&self.destinations) {
            tracing::info!(
                from = %self.current_path,
                to = %to,
                cause = ?evaluation.cause,
                "Redirecting away from protected page"
            );
            self.navigator.navigate(to);
        }

        self.state = evaluation.decision.into();
        let allowed = evaluation.allowed();
        self.evaluation = Some(evaluation);
        allowed
    }

    #[must_use]
    pub fn state(&self) -> GuardState {
        self.state
    }

    #[must_use]
    pub fn current_path(&self) -> &str {
        &self.current_path
    }

    #[must_use]
    pub fn destinations(&self) -> &Destinations {
        &self.destinations
    }

    /// Identity and profile of an allowed page, for rendering the header.
    #[must_use]
    pub fn ready(&self) -> Option<(&Identity, Option<&Profile>)> {
        let evaluation = self.evaluation.as_ref().filter(|e| e.allowed())?;
        let identity = evaluation.identity.as_ref()?;
        Some((identity, evaluation.profile.as_ref()))
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use std::sync::Mutex;
    use std::sync::atomic::Ordering;

    use super::*;
    use crate::gate::tests::FakeProvider;

    /// Records every navigation.
    #[derive(Default)]
    pub(crate) struct RecordingNavigator {
        pub(crate) visits: Mutex<Vec<String>>,
    }

    impl RecordingNavigator {
        pub(crate) fn visits(&self) -> Vec<String> {
            self.visits.lock().unwrap().clone()
        }
    }

    impl Navigator for RecordingNavigator {
        fn navigate(&self, to: &str) {
            self.visits.lock().unwrap().push(to.to_string());
        }
    }

    fn guard(provider: FakeProvider) -> PageGuard<FakeProvider, RecordingNavigator> {
        PageGuard::new(
            SessionGate::new(provider),
            RecordingNavigator::default(),
            "/portal/dashboard.html",
        )
    }

    #[tokio::test]
    async fn allowed_page_does_not_navigate() {
        let mut page = guard(FakeProvider::signed_in(true, false));
        assert_eq!(page.state(), GuardState::Unchecked);

        assert!(page.check(Requirement::approved()).await);
        assert_eq!(page.state(), GuardState::Allowed);
        assert!(page.navigator.visits().is_empty());

        let (identity, profile) = page.ready().unwrap();
        assert_eq!(identity.id.to_string(), "U1");
        assert!(profile.is_some_and(|p| p.is_approved));
    }

    #[tokio::test]
    async fn signed_out_redirects_to_login_once() {
        let mut page = guard(FakeProvider::signed_out());

        assert!(!page.check(Requirement::approved()).await);
        assert!(!page.check(Requirement::approved()).await);

        assert_eq!(page.state(), GuardState::LoginRedirected);
        assert_eq!(page.navigator.visits(), vec!["/portal/login.html"]);
        assert_eq!(page.gate.provider().identity_calls.load(Ordering::SeqCst), 1);
        assert!(page.ready().is_none());
    }

    #[tokio::test]
    async fn unapproved_redirects_to_pending() {
        let mut page = guard(FakeProvider::signed_in(false, false));
        assert!(!page.check(Requirement::approved()).await);
        assert_eq!(page.state(), GuardState::PendingRedirected);
        assert_eq!(page.navigator.visits(), vec!["/portal/pending.html"]);
    }

    #[tokio::test]
    async fn non_admin_redirects_to_configured_dashboard() {
        let mut page = guard(FakeProvider::signed_in(true, false))
            .with_destinations(Destinations::default().with_dashboard("/portal/home"));
        assert!(!page.check(Requirement::admin()).await);
        assert_eq!(page.state(), GuardState::DashboardRedirected);
        assert_eq!(page.navigator.visits(), vec!["/portal/home"]);
    }

    #[tokio::test]
    async fn terminal_state_ignores_later_requirements() {
        let mut page = guard(FakeProvider::signed_in(true, false));
        assert!(page.check(Requirement::approved()).await);
        // The page already initialized; a stricter check needs a new page load.
        assert!(page.check(Requirement::admin()).await);
        assert!(page.state().is_terminal());
        assert!(page.navigator.visits().is_empty());
    }
}
