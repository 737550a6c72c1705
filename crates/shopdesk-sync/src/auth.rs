//! # Auth Provider Interface
//!
//! The primitives the engine needs from the authentication provider, and the
//! cancellable subscription handle session changes arrive through.
//!
//! ## Session Changes
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                       Session Subscription                              │
//! │                                                                         │
//! │  AuthProvider                          AuthSessionBinder                │
//! │  ────────────                          ─────────────────                │
//! │  watch::Sender<Option<AuthUser>>                                        │
//! │       │                                                                 │
//! │       │  on_session_change()                                           │
//! │       └──────────────────────► SessionSubscription                     │
//! │                                    │ current()   → initial value       │
//! │                                    │ changed()   → next value          │
//! │                                    │ drop        → unsubscribed        │
//! │                                    ▼                                    │
//! │                                Some(user) → session gained             │
//! │                                None       → session lost               │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use async_trait::async_trait;
use thiserror::Error;
use tokio::sync::watch;

use shopdesk_core::SyncSession;

// =============================================================================
// Auth User
// =============================================================================

/// Identity reported by the auth provider.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthUser {
    /// Opaque subject id.
    pub uid: String,
    /// Sign-in identity, if the provider exposes one.
    pub email: Option<String>,
}

impl AuthUser {
    pub fn new(uid: impl Into<String>, email: Option<String>) -> Self {
        AuthUser {
            uid: uid.into(),
            email,
        }
    }

    /// Starts a sync session for this identity.
    pub fn to_session(&self) -> SyncSession {
        SyncSession::new(self.uid.clone(), self.email.clone())
    }
}

// =============================================================================
// Auth Errors
// =============================================================================

/// Failure reported by the auth provider.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AuthError {
    /// No account exists for the identity.
    #[error("No account found for {0}")]
    PrincipalNotFound(String),

    /// The account exists but the secret was rejected.
    #[error("Invalid credentials for {0}")]
    InvalidCredentials(String),

    /// The auth subsystem is not available.
    #[error("Auth provider unavailable: {0}")]
    Unavailable(String),

    /// Any other failure.
    #[error("Auth error: {0}")]
    Other(String),
}

// =============================================================================
// Session Subscription
// =============================================================================

/// Cancellable handle over session changes. Dropping it unsubscribes.
#[derive(Debug)]
pub struct SessionSubscription {
    rx: watch::Receiver<Option<AuthUser>>,
}

impl SessionSubscription {
    pub fn new(rx: watch::Receiver<Option<AuthUser>>) -> Self {
        SessionSubscription { rx }
    }

    /// The identity at the time of the call, marking it as seen.
    pub fn current(&mut self) -> Option<AuthUser> {
        self.rx.borrow_and_update().clone()
    }

    /// Waits for the next change.
    ///
    /// Returns `None` once the provider has gone away.
    pub async fn changed(&mut self) -> Option<Option<AuthUser>> {
        self.rx.changed().await.ok()?;
        Some(self.rx.borrow_and_update().clone())
    }
}

// =============================================================================
// Auth Provider
// =============================================================================

/// Authentication provider primitives.
#[async_trait]
pub trait AuthProvider: Send + Sync {
    /// Resolves once the provider can report session state.
    async fn wait_ready(&self) -> Result<(), AuthError>;

    /// Subscribes to session changes.
    fn on_session_change(&self) -> SessionSubscription;

    /// Signs in with an identity/secret pair.
    async fn sign_in(&self, identity: &str, secret: &str) -> Result<AuthUser, AuthError>;

    /// Creates an account for the pair and signs in.
    async fn provision_account(&self, identity: &str, secret: &str)
        -> Result<AuthUser, AuthError>;

    /// Ends the current session.
    async fn sign_out(&self) -> Result<(), AuthError>;

    /// The identity currently signed in, if any.
    fn current_session(&self) -> Option<AuthUser>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_subscription_sees_changes() {
        let (tx, rx) = watch::channel(None);
        let mut sub = SessionSubscription::new(rx);

        assert_eq!(sub.current(), None);

        tx.send_replace(Some(AuthUser::new("u1", None)));
        assert_eq!(sub.changed().await, Some(Some(AuthUser::new("u1", None))));

        drop(tx);
        assert_eq!(sub.changed().await, None);
    }

    #[test]
    fn test_user_to_session() {
        let user = AuthUser::new("u1", Some("owner@shop.test".into()));
        let session = user.to_session();
        assert_eq!(session.subject_id, "u1");
        assert_eq!(session.identity.as_deref(), Some("owner@shop.test"));
    }
}
