//! Access decision for a protected portal page.
//!
//! The decision is a pure function of the session's identity, its profile and
//! the page's [`Requirement`]. [`SessionGate`] resolves the first two through
//! an [`IdentityProvider`] and never fails: every lookup error collapses into
//! a redirect, never into [`Decision::Allow`].

use crate::destinations::Destinations;
use crate::provider::IdentityProvider;
use crate::types::{Identity, Profile};

/// What a page demands of the visiting session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Requirement {
    /// Deny non-admin sessions whose profile is not approved.
    pub require_approved: bool,
    /// Only admit sessions whose profile has `is_admin`.
    pub require_admin: bool,
}

impl Default for Requirement {
    fn default() -> Self {
        Self::approved()
    }
}

impl Requirement {
    #[must_use]
    pub const fn new(require_approved: bool, require_admin: bool) -> Self {
        Self {
            require_approved,
            require_admin,
        }
    }

    /// Any signed-in session (e.g. the pending page itself).
    #[must_use]
    pub const fn authenticated() -> Self {
        Self::new(false, false)
    }

    /// Approved customers and admins.
    #[must_use]
    pub const fn approved() -> Self {
        Self::new(true, false)
    }

    /// Admins only.
    #[must_use]
    pub const fn admin() -> Self {
        Self::new(true, true)
    }
}

/// Gate outcome for one page load.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Decision {
    Allow,
    RedirectToLogin,
    RedirectToPending,
    RedirectToDashboard,
}

impl Decision {
    /// `true` only for [`Decision::Allow`].
    #[must_use]
    pub fn allowed(self) -> bool {
        matches!(self, Self::Allow)
    }

    /// Redirect target, `None` for [`Decision::Allow`].
    #[must_use]
    pub fn destination(self, destinations: &Destinations) -> Option<&str> {
        match self {
            Self::Allow => None,
            Self::RedirectToLogin => Some(destinations.login()),
            Self::RedirectToPending => Some(destinations.pending()),
            Self::RedirectToDashboard => Some(destinations.dashboard()),
        }
    }
}

/// Why a session was turned away.
///
/// Several causes share a redirect; they are kept apart so logs can tell a
/// visitor who is not signed in from a provider that is failing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DenyCause {
    Unauthenticated,
    IdentityLookupFailed,
    ProfileMissing,
    ProfileLookupFailed,
    NotApproved,
    NotAdmin,
}

/// Tunable parts of the decision.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GatePolicy {
    pub admin_bypasses_approval: bool,
}

impl GatePolicy {
    pub const ADMIN_BYPASSES_APPROVAL: bool = true;
}

impl Default for GatePolicy {
    fn default() -> Self {
        Self {
            admin_bypasses_approval: Self::ADMIN_BYPASSES_APPROVAL,
        }
    }
}

/// Decide access from already-resolved facts.
///
/// Rules apply in order, first match wins: no identity, admin required,
/// approval required, allow. A missing profile reads as "not approved, not
/// admin".
#[must_use]
pub fn decide(
    identity: Option<&Identity>,
    profile: Option<&Profile>,
    requirement: Requirement,
    policy: GatePolicy,
) -> Decision {
    if identity.is_none() {
        return Decision::RedirectToLogin;
    }

    let is_admin = profile.is_some_and(|p| p.is_admin);
    let is_approved = profile.is_some_and(|p| p.is_approved);

    if requirement.require_admin && !is_admin {
        return Decision::RedirectToDashboard;
    }

    let admin_counts_as_approved = is_admin && policy.admin_bypasses_approval;
    if requirement.require_approved && !admin_counts_as_approved && !is_approved {
        return Decision::RedirectToPending;
    }

    Decision::Allow
}

/// Result of [`SessionGate::evaluate`].
#[derive(Debug, Clone)]
pub struct Evaluation {
    pub decision: Decision,
    /// Set for every decision except [`Decision::Allow`].
    pub cause: Option<DenyCause>,
    pub identity: Option<Identity>,
    pub profile: Option<Profile>,
}

impl Evaluation {
    #[must_use]
    pub fn allowed(&self) -> bool {
        self.decision.allowed()
    }
}

/// Resolves identity and profile, then applies [`decide`].
pub struct SessionGate<P> {
    provider: P,
    policy: GatePolicy,
}

impl<P: IdentityProvider> SessionGate<P> {
    #[must_use]
    pub fn new(provider: P) -> Self {
        Self {
            provider,
            policy: GatePolicy::default(),
        }
    }

    #[must_use]
    pub fn with_policy(mut self, policy: GatePolicy) -> Self {
        self.policy = policy;
        self
    }

    #[must_use]
    pub fn policy(&self) -> GatePolicy {
        self.policy
    }

    #[must_use]
    pub fn provider(&self) -> &P {
        &self.provider
    }

    /// Decide whether the current session may view a page with `requirement`.
    ///
    /// The profile is only looked up once an identity has been found.
    pub async fn evaluate(&self, requirement: Requirement) -> Evaluation {
        let identity = match self.provider.current_identity().await {
            Ok(Some(identity)) => identity,
            Ok(None) => return Self::denied_without_identity(DenyCause::Unauthenticated),
            Err(e) => {
                tracing::warn!(error = %e, "Identity lookup failed");
                return Self::denied_without_identity(DenyCause::IdentityLookupFailed);
            }
        };

        let (profile, lookup_cause) = match self.provider.current_profile(&identity).await {
            Ok(Some(profile)) => (Some(profile), None),
            Ok(None) => (None, Some(DenyCause::ProfileMissing)),
            Err(e) => {
                tracing::warn!(error = %e, user_id = %identity.id, "Profile lookup failed");
                (None, Some(DenyCause::ProfileLookupFailed))
            }
        };

        let decision = decide(Some(&identity), profile.as_ref(), requirement, self.policy);

        let cause = match decision {
            Decision::Allow => None,
            Decision::RedirectToLogin => Some(DenyCause::Unauthenticated),
            Decision::RedirectToDashboard => Some(lookup_cause.unwrap_or(DenyCause::NotAdmin)),
            Decision::RedirectToPending => Some(lookup_cause.unwrap_or(DenyCause::NotApproved)),
        };

        tracing::debug!(
            user_id = %identity.id,
            ?decision,
            ?cause,
            require_approved = requirement.require_approved,
            require_admin = requirement.require_admin,
            "Session gate evaluated"
        );

        Evaluation {
            decision,
            cause,
            identity: Some(identity),
            profile,
        }
    }

    fn denied_without_identity(cause: DenyCause) -> Evaluation {
        Evaluation {
            decision: Decision::RedirectToLogin,
            cause: Some(cause),
            identity: None,
            profile: None,
        }
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use super::*;
    use crate::error::BoxError;

    /// In-memory provider with call counters.
    #[derive(Default)]
    pub(crate) struct FakeProvider {
        pub(crate) identity: Option<Identity>,
        pub(crate) profile: Option<Profile>,
        pub(crate) fail_identity: bool,
        pub(crate) fail_profile: bool,
        pub(crate) identity_calls: AtomicUsize,
        pub(crate) profile_calls: AtomicUsize,
    }

    impl FakeProvider {
        pub(crate) fn signed_out() -> Self {
            Self::default()
        }

        pub(crate) fn signed_in(approved: bool, admin: bool) -> Self {
            Self {
                identity: Some(Identity::new("U1")),
                profile: Some(Profile::new("U1").with_approved(approved).with_admin(admin)),
                ..Self::default()
            }
        }
    }

    impl IdentityProvider for FakeProvider {
        async fn current_identity(&self) -> Result<Option<Identity>, BoxError> {
            self.identity_calls.fetch_add(1, Ordering::SeqCst);
            if self.fail_identity {
                return Err("auth service unavailable".into());
            }
            Ok(self.identity.clone())
        }

        async fn current_profile(&self, _identity: &Identity) -> Result<Option<Profile>, BoxError> {
            self.profile_calls.fetch_add(1, Ordering::SeqCst);
            if self.fail_profile {
                return Err("profiles query failed".into());
            }
            Ok(self.profile.clone())
        }
    }

    const ALL_REQUIREMENTS: [Requirement; 4] = [
        Requirement::new(false, false),
        Requirement::new(true, false),
        Requirement::new(false, true),
        Requirement::new(true, true),
    ];

    fn policy() -> GatePolicy {
        GatePolicy::default()
    }

    #[test]
    fn no_identity_always_redirects_to_login() {
        for req in ALL_REQUIREMENTS {
            for profile in [None, Some(Profile::new("x").with_admin(true))] {
                assert_eq!(
                    decide(None, profile.as_ref(), req, policy()),
                    Decision::RedirectToLogin
                );
            }
        }
    }

    #[test]
    fn admin_implies_approved() {
        let id = Identity::new("U1");
        for approved in [false, true] {
            let profile = Profile::new("U1").with_admin(true).with_approved(approved);
            assert_eq!(
                decide(Some(&id), Some(&profile), Requirement::approved(), policy()),
                Decision::Allow
            );
        }
    }

    #[test]
    fn unapproved_non_admin_goes_to_pending() {
        let id = Identity::new("U1");
        let profile = Profile::new("U1");
        assert_eq!(
            decide(Some(&id), Some(&profile), Requirement::approved(), policy()),
            Decision::RedirectToPending
        );
    }

    #[test]
    fn admin_requirement_ignores_approval() {
        let id = Identity::new("U1");
        for require_approved in [false, true] {
            for approved in [false, true] {
                let profile = Profile::new("U1").with_approved(approved);
                assert_eq!(
                    decide(
                        Some(&id),
                        Some(&profile),
                        Requirement::new(require_approved, true),
                        policy()
                    ),
                    Decision::RedirectToDashboard
                );
            }
        }
    }

    #[test]
    fn no_requirements_allows_any_identity() {
        let id = Identity::new("U1");
        for approved in [false, true] {
            for admin in [false, true] {
                let profile = Profile::new("U1").with_approved(approved).with_admin(admin);
                assert_eq!(
                    decide(Some(&id), Some(&profile), Requirement::authenticated(), policy()),
                    Decision::Allow
                );
            }
        }
        assert_eq!(
            decide(Some(&id), None, Requirement::authenticated(), policy()),
            Decision::Allow
        );
    }

    #[test]
    fn missing_profile_is_unapproved_non_admin() {
        let id = Identity::new("U1");
        assert_eq!(
            decide(Some(&id), None, Requirement::approved(), policy()),
            Decision::RedirectToPending
        );
        assert_eq!(
            decide(Some(&id), None, Requirement::admin(), policy()),
            Decision::RedirectToDashboard
        );
    }

    #[test]
    fn approval_bypass_can_be_disabled() {
        let id = Identity::new("U1");
        let admin = Profile::new("U1").with_admin(true);
        let strict = GatePolicy {
            admin_bypasses_approval: false,
        };
        assert_eq!(
            decide(Some(&id), Some(&admin), Requirement::approved(), strict),
            Decision::RedirectToPending
        );
        assert_eq!(
            decide(Some(&id), Some(&admin.with_approved(true)), Requirement::admin(), strict),
            Decision::Allow
        );
    }

    #[test]
    fn default_requirement_is_approved_only() {
        assert_eq!(Requirement::default(), Requirement::new(true, false));
    }

    #[test]
    fn destinations_per_decision() {
        let d = Destinations::default();
        assert_eq!(Decision::Allow.destination(&d), None);
        assert_eq!(
            Decision::RedirectToLogin.destination(&d),
            Some("/portal/login.html")
        );
        assert_eq!(
            Decision::RedirectToPending.destination(&d),
            Some("/portal/pending.html")
        );
        assert_eq!(
            Decision::RedirectToDashboard.destination(&d),
            Some("/portal/dashboard.html")
        );
    }

    #[tokio::test]
    async fn scenario_signed_out() {
        let gate = SessionGate::new(FakeProvider::signed_out());
        let eval = gate.evaluate(Requirement::approved()).await;

        assert_eq!(eval.decision, Decision::RedirectToLogin);
        assert_eq!(eval.cause, Some(DenyCause::Unauthenticated));
        assert_eq!(gate.provider().profile_calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn scenario_unapproved_customer() {
        let gate = SessionGate::new(FakeProvider::signed_in(false, false));
        let eval = gate.evaluate(Requirement::approved()).await;

        assert_eq!(eval.decision, Decision::RedirectToPending);
        assert_eq!(eval.cause, Some(DenyCause::NotApproved));
    }

    #[tokio::test]
    async fn scenario_unapproved_admin() {
        let gate = SessionGate::new(FakeProvider::signed_in(false, true));
        let eval = gate.evaluate(Requirement::approved()).await;

        assert!(eval.allowed());
        assert_eq!(eval.cause, None);
        assert_eq!(eval.identity.map(|i| i.id.to_string()).as_deref(), Some("U1"));
        assert!(eval.profile.is_some_and(|p| p.is_admin));
    }

    #[tokio::test]
    async fn scenario_approved_customer_on_admin_page() {
        let gate = SessionGate::new(FakeProvider::signed_in(true, false));
        let eval = gate.evaluate(Requirement::new(false, true)).await;

        assert_eq!(eval.decision, Decision::RedirectToDashboard);
        assert_eq!(eval.cause, Some(DenyCause::NotAdmin));
    }

    #[tokio::test]
    async fn identity_failure_fails_closed() {
        let provider = FakeProvider {
            fail_identity: true,
            ..FakeProvider::signed_in(true, true)
        };
        let gate = SessionGate::new(provider);
        let eval = gate.evaluate(Requirement::authenticated()).await;

        assert_eq!(eval.decision, Decision::RedirectToLogin);
        assert_eq!(eval.cause, Some(DenyCause::IdentityLookupFailed));
        assert_eq!(gate.provider().identity_calls.load(Ordering::SeqCst), 1);
        assert_eq!(gate.provider().profile_calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn profile_failure_fails_closed() {
        let provider = FakeProvider {
            fail_profile: true,
            ..FakeProvider::signed_in(true, true)
        };
        let gate = SessionGate::new(provider);

        let eval = gate.evaluate(Requirement::approved()).await;
        assert_eq!(eval.decision, Decision::RedirectToPending);
        assert_eq!(eval.cause, Some(DenyCause::ProfileLookupFailed));

        let eval = gate.evaluate(Requirement::admin()).await;
        assert_eq!(eval.decision, Decision::RedirectToDashboard);
        assert_eq!(eval.cause, Some(DenyCause::ProfileLookupFailed));

        // No retry on failure: one lookup per evaluation.
        assert_eq!(gate.provider().profile_calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn missing_profile_row_goes_to_pending() {
        let provider = FakeProvider {
            profile: None,
            ..FakeProvider::signed_in(false, false)
        };
        let gate = SessionGate::new(provider);
        let eval = gate.evaluate(Requirement::approved()).await;

        assert_eq!(eval.decision, Decision::RedirectToPending);
        assert_eq!(eval.cause, Some(DenyCause::ProfileMissing));
    }

    #[tokio::test]
    async fn evaluate_is_idempotent() {
        let gate = SessionGate::new(FakeProvider::signed_in(false, false));
        let first = gate.evaluate(Requirement::approved()).await;
        let second = gate.evaluate(Requirement::approved()).await;
        assert_eq!(first.decision, second.decision);
        assert_eq!(first.cause, second.cause);
    }
}
