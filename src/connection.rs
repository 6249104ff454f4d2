//! Connection lifecycle of a session.
//!
//! ```text
//! Idle -> Authenticating -> ConnectingDownstream -> Spawned -> Disconnecting -> Closed
//! ```
//!
//! A session may also be spawned straight from `Authenticating` so that
//! a form can be shown before any backend connection exists, and go
//! back to `Authenticating` from there when the player retries.

use crate::auth::{AuthenticationTask, Credentials};
use std::sync::Arc;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default, strum::Display)]
pub enum ConnectionPhase {
    #[default]
    Idle,
    Authenticating,
    ConnectingDownstream,
    Spawned,
    Disconnecting,
    Closed,
}

impl ConnectionPhase {
    pub fn can_transition_to(self, next: ConnectionPhase) -> bool {
        use ConnectionPhase::*;
        matches!(
            (self, next),
            (Idle, Authenticating)
                | (Authenticating, ConnectingDownstream)
                | (Authenticating, Spawned)
                | (Spawned, Authenticating)
                | (ConnectingDownstream, Spawned)
                | (Idle | Authenticating | ConnectingDownstream | Spawned, Disconnecting)
                | (Disconnecting, Closed)
        )
    }

    /// Whether teardown has started.
    pub fn is_terminal(self) -> bool {
        matches!(self, ConnectionPhase::Disconnecting | ConnectionPhase::Closed)
    }
}

#[derive(Debug, thiserror::Error)]
#[error("illegal connection phase transition {from} -> {to}")]
pub struct InvalidTransition {
    pub from: ConnectionPhase,
    pub to: ConnectionPhase,
}

/// Authentication and backend-connection state of one session.
#[derive(Default)]
pub struct ConnectionManager {
    phase: ConnectionPhase,
    /// Set once the backend accepted the login.
    logged_in: bool,
    /// A connection attempt has been started and not yet failed.
    logging_in: bool,
    credentials: Option<Credentials>,
    auth_task: Option<Arc<AuthenticationTask>>,
    /// Incremented every time a new backend link is opened. Events
    /// tagged with an older value belong to a link that was replaced.
    link_generation: u64,
}

impl ConnectionManager {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn phase(&self) -> ConnectionPhase {
        self.phase
    }

    pub fn transition(&mut self, next: ConnectionPhase) -> Result<(), InvalidTransition> {
        if !self.phase.can_transition_to(next) {
            return Err(InvalidTransition {
                from: self.phase,
                to: next,
            });
        }
        tracing::debug!("Connection phase {} -> {}", self.phase, next);
        self.phase = next;
        Ok(())
    }

    pub fn is_logged_in(&self) -> bool {
        self.logged_in
    }

    pub fn set_logged_in(&mut self, logged_in: bool) {
        self.logged_in = logged_in;
    }

    pub fn is_logging_in(&self) -> bool {
        self.logging_in
    }

    pub fn set_logging_in(&mut self, logging_in: bool) {
        self.logging_in = logging_in;
    }

    /// A login is already underway or complete.
    pub fn is_busy(&self) -> bool {
        self.logged_in || self.logging_in
    }

    pub fn credentials(&self) -> Option<&Credentials> {
        self.credentials.as_ref()
    }

    pub fn set_credentials(&mut self, credentials: Credentials) {
        self.credentials = Some(credentials);
    }

    pub fn auth_task(&self) -> Option<&Arc<AuthenticationTask>> {
        self.auth_task.as_ref()
    }

    pub fn set_auth_task(&mut self, task: Option<Arc<AuthenticationTask>>) {
        self.auth_task = task;
    }

    pub fn link_generation(&self) -> u64 {
        self.link_generation
    }

    pub fn next_link_generation(&mut self) -> u64 {
        self.link_generation += 1;
        self.link_generation
    }
}
