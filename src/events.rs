//! Session-change notifications and the sign-out watch.
//!
//! The provider (or the sign-out route) publishes [`SessionChange`]s on a
//! [`SessionEvents`] bus. A page controller holds a [`SignOutWatch`] that
//! bounces the page to the login path when that page's user signs out while
//! the page is open, e.g. from another tab. Sign-outs of other users are
//! ignored.

use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;
use tokio::task::JoinHandle;

use crate::destinations::Destinations;
use crate::page::Navigator;
use crate::types::{Session, UserId};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SessionEvent {
    InitialSession,
    SignedIn,
    SignedOut,
    TokenRefreshed,
    UserUpdated,
    PasswordRecovery,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionChange {
    pub event: SessionEvent,
    /// The user the change belongs to.
    #[serde(default)]
    pub user_id: Option<UserId>,
    pub session: Option<Session>,
}

impl SessionChange {
    #[must_use]
    pub fn signed_out(user_id: impl Into<UserId>) -> Self {
        Self {
            event: SessionEvent::SignedOut,
            user_id: Some(user_id.into()),
            session: None,
        }
    }

    #[must_use]
    pub fn signed_in(session: Session) -> Self {
        Self {
            event: SessionEvent::SignedIn,
            user_id: Some(session.user.id.clone()),
            session: Some(session),
        }
    }
}

/// Where a page on `current_path`, open for `watched`, must go after
/// `change`, if anywhere.
///
/// Only a sign-out of `watched` moves the page, and never off an entry page.
/// A change with no user id moves nothing.
#[must_use]
pub fn sign_out_redirect<'a>(
    change: &SessionChange,
    watched: &UserId,
    current_path: &str,
    destinations: &'a Destinations,
) -> Option<&'a str> {
    if change.event != SessionEvent::SignedOut
        || change.user_id.as_ref() != Some(watched)
        || destinations.is_entry_page(current_path)
    {
        return None;
    }
    Some(destinations.login())
}

/// Broadcast bus for session changes.
pub struct SessionEvents {
    sender: broadcast::Sender<SessionChange>,
}

impl SessionEvents {
    #[must_use]
    pub fn new() -> Self {
        Self::with_capacity(64)
    }

    #[must_use]
    pub fn with_capacity(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    pub fn publish(&self, change: SessionChange) {
        tracing::debug!(event = ?change.event, "Publishing session change");
        // No subscribers is fine.
        let _ = self.sender.send(change);
    }

    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<SessionChange> {
        self.sender.subscribe()
    }

    #[must_use]
    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl Default for SessionEvents {
    fn default() -> Self {
        Self::new()
    }
}

impl Clone for SessionEvents {
    fn clone(&self) -> Self {
        Self {
            sender: self.sender.clone(),
        }
    }
}

/// Owned sign-out listener for one page.
///
/// Dropping the handle stops the listener.
pub struct SignOutWatch {
    task: Option<JoinHandle<()>>,
}

impl SignOutWatch {
    /// Start listening on `receiver` for sign-outs of `user_id`. Must be
    /// called inside a tokio runtime.
    pub fn spawn<N>(
        mut receiver: broadcast::Receiver<SessionChange>,
        navigator: N,
        user_id: impl Into<UserId>,
        current_path: impl Into<String>,
        destinations: Destinations,
    ) -> Self
    where
        N: Navigator + 'static,
    {
        let user_id = user_id.into();
        let current_path = current_path.into();
        let task = tokio::spawn(async move {
            loop {
                match receiver.recv().await {
                    Ok(change) => {
                        tracing::debug!(event = ?change.event, "Session changed");
                        if let Some(to) =
                            sign_out_redirect(&change, &user_id, &current_path, &destinations)
                        {
                            tracing::info!(user_id = %user_id, from = %current_path, to = %to, "Session ended, redirecting");
                            navigator.navigate(to);
                        }
                    }
                    Err(broadcast::error::RecvError::Lagged(skipped)) => {
                        tracing::warn!(skipped, "Session change listener lagged");
                    }
                    Err(broadcast::error::RecvError::Closed) => break,
                }
            }
        });
        Self { task: Some(task) }
    }

    /// Stop listening. Idempotent.
    pub fn dispose(&mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
        }
    }

    #[must_use]
    pub fn is_active(&self) -> bool {
        self.task.as_ref().is_some_and(|t| !t.is_finished())
    }
}

impl Drop for SignOutWatch {
    fn drop(&mut self) {
        self.dispose();
    }
}
