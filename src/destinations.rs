use crate::gate::GatePolicy;
use crate::types::Profile;

/// Fixed pathnames the rest of the site links to.
///
/// The login, pending and dashboard paths are the redirect targets of the
/// gate. The login, register and forgot-password paths are the entry pages a
/// signed-out visitor may sit on without being bounced.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Destinations {
    pub(crate) login: String,
    pub(crate) pending: String,
    pub(crate) dashboard: String,
    pub(crate) register: String,
    pub(crate) forgot_password: String,
    pub(crate) reset_password: String,
}

impl Default for Destinations {
    fn default() -> Self {
        Self {
            login: "/portal/login.html".into(),
            pending: "/portal/pending.html".into(),
            dashboard: "/portal/dashboard.html".into(),
            register: "/portal/register.html".into(),
            forgot_password: "/portal/forgot-password.html".into(),
            reset_password: "/portal/reset-password.html".into(),
        }
    }
}

impl Destinations {
    #[must_use]
    pub fn with_login(mut self, path: impl Into<String>) -> Self {
        self.login = path.into();
        self
    }

    #[must_use]
    pub fn with_pending(mut self, path: impl Into<String>) -> Self {
        self.pending = path.into();
        self
    }

    #[must_use]
    pub fn with_dashboard(mut self, path: impl Into<String>) -> Self {
        self.dashboard = path.into();
        self
    }

    #[must_use]
    pub fn with_register(mut self, path: impl Into<String>) -> Self {
        self.register = path.into();
        self
    }

    #[must_use]
    pub fn with_forgot_password(mut self, path: impl Into<String>) -> Self {
        self.forgot_password = path.into();
        self
    }

    #[must_use]
    pub fn with_reset_password(mut self, path: impl Into<String>) -> Self {
        self.reset_password = path.into();
        self
    }

    #[must_use]
    pub fn login(&self) -> &str {
        &self.login
    }

    #[must_use]
    pub fn pending(&self) -> &str {
        &self.pending
    }

    #[must_use]
    pub fn dashboard(&self) -> &str {
        &self.dashboard
    }

    #[must_use]
    pub fn register(&self) -> &str {
        &self.register
    }

    #[must_use]
    pub fn forgot_password(&self) -> &str {
        &self.forgot_password
    }

    /// Landing page linked from password-reset emails.
    #[must_use]
    pub fn reset_password(&self) -> &str {
        &self.reset_password
    }

    /// Whether `path` is one of the pages a signed-out visitor uses to get in.
    ///
    /// Query string, fragment and a trailing slash are ignored.
    #[must_use]
    pub fn is_entry_page(&self, path: &str) -> bool {
        let path = normalize(path);
        [&self.login, &self.register, &self.forgot_password]
            .into_iter()
            .any(|entry| normalize(entry) == path)
    }

    /// Where to send a visitor right after a successful sign-in.
    ///
    /// Approved customers land on the dashboard, as do admins when `policy`
    /// lets admins bypass approval. Everyone else, including a user whose
    /// profile row does not exist yet, waits on the pending page.
    #[must_use]
    pub fn after_sign_in(&self, profile: Option<&Profile>, policy: GatePolicy) -> &str {
        let admin_counts = |p: &Profile| p.is_admin && policy.admin_bypasses_approval;
        match profile {
            Some(p) if p.is_approved || admin_counts(p) => self.dashboard.as_str(),
            _ => self.pending.as_str(),
        }
    }
}

fn normalize(path: &str) -> &str {
    let end = path.find(['?', '#']).unwrap_or(path.len());
    let path = &path[..end];
    match path.strip_suffix('/') {
        Some(stripped) if !stripped.is_empty() => stripped,
        _ => path,
    }
}
