//! Hooks that let the embedding application observe and alter a
//! session's login and disconnect.

use crate::{backend::BackendTarget, identity::ClientIdentity};

/// Fired before the backend connection is opened.
#[derive(Debug, Clone)]
pub struct LoginEvent {
    pub identity: ClientIdentity,
    /// Where the player will be sent. May be replaced.
    pub target: BackendTarget,
    cancel_reason: Option<String>,
}

impl LoginEvent {
    pub fn new(identity: ClientIdentity, target: BackendTarget) -> Self {
        Self {
            identity,
            target,
            cancel_reason: None,
        }
    }

    /// Refuses the login; the player is disconnected with `reason`.
    pub fn cancel(&mut self, reason: impl Into<String>) {
        self.cancel_reason = Some(reason.into());
    }

    pub fn cancel_reason(&self) -> Option<&str> {
        self.cancel_reason.as_deref()
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel_reason.is_some()
    }
}

/// Fired once per session when teardown starts.
#[derive(Debug, Clone)]
pub struct DisconnectEvent {
    pub name: Option<String>,
    /// Shown to the player. May be replaced.
    pub reason: String,
}

pub trait SessionEvents: Send + Sync {
    fn on_login(&self, _event: &mut LoginEvent) {}

    fn on_disconnect(&self, _event: &mut DisconnectEvent) {}
}

pub struct NoEvents;

impl SessionEvents for NoEvents {}
