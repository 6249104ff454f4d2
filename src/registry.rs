//! Process-wide table of live sessions.

use crate::session::SessionHandle;
use dashmap::DashMap;
use std::sync::atomic::{AtomicU64, Ordering};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SessionId(u64);

impl SessionId {
    pub fn next() -> Self {
        static NEXT: AtomicU64 = AtomicU64::new(1);
        Self(NEXT.fetch_add(1, Ordering::Relaxed))
    }

    pub fn as_u64(self) -> u64 {
        self.0
    }
}

#[derive(Default)]
pub struct SessionRegistry {
    sessions: DashMap<SessionId, SessionHandle>,
}

impl SessionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, handle: SessionHandle) {
        self.sessions.insert(handle.id(), handle);
    }

    /// Returns whether the session was registered.
    pub fn remove(&self, id: SessionId) -> bool {
        self.sessions.remove(&id).is_some()
    }

    pub fn get(&self, id: SessionId) -> Option<SessionHandle> {
        self.sessions.get(&id).map(|handle| handle.clone())
    }

    /// Finds a session by player name, ignoring case.
    pub fn find_by_name(&self, name: &str) -> Option<SessionHandle> {
        self.sessions
            .iter()
            .find(|entry| {
                entry
                    .value()
                    .name()
                    .is_some_and(|candidate| candidate.eq_ignore_ascii_case(name))
            })
            .map(|entry| entry.value().clone())
    }

    /// Copy of all handles, ordered by id, for iterating without
    /// holding the table.
    pub fn snapshot(&self) -> Vec<SessionHandle> {
        let mut handles: Vec<_> = self.sessions.iter().map(|entry| entry.value().clone()).collect();
        handles.sort_by_key(SessionHandle::id);
        handles
    }

    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }
}
