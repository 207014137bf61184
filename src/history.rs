//! Bounded in-memory session history.
//!
//! Every session created through the bridge is recorded here, oldest first.
//! When the history is full the oldest session is evicted; evicted sessions
//! keep running and keep their callbacks, they are just no longer listed.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tracing::debug;

use crate::models::session::{Session, SessionId, SessionKind};

/// Fixed-capacity FIFO of sessions.
pub struct SessionHistory {
    capacity: usize,
    sessions: Mutex<VecDeque<Arc<Session>>>,
}

impl SessionHistory {
    /// Create a history holding at most `capacity` sessions (minimum one).
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            capacity,
            sessions: Mutex::new(VecDeque::with_capacity(capacity)),
        }
    }

    /// Maximum number of sessions kept.
    #[must_use]
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Record a session, evicting the oldest if full.
    pub fn add(&self, session: Arc<Session>) {
        let mut sessions = self.lock();
        if sessions.len() == self.capacity {
            if let Some(evicted) = sessions.pop_front() {
                debug!(session_id = %evicted.id(), "session evicted from history");
            }
        }
        sessions.push_back(session);
    }

    /// Look up a session by identifier.
    #[must_use]
    pub fn get(&self, id: SessionId) -> Option<Arc<Session>> {
        self.lock().iter().find(|s| s.id() == id).cloned()
    }

    /// Most recently recorded session.
    #[must_use]
    pub fn last(&self) -> Option<Arc<Session>> {
        self.lock().back().cloned()
    }

    /// All recorded sessions, oldest first.
    #[must_use]
    pub fn list(&self) -> Vec<Arc<Session>> {
        self.lock().iter().cloned().collect()
    }

    /// Recorded sessions of one kind, oldest first.
    #[must_use]
    pub fn list_of(&self, kind: SessionKind) -> Vec<Arc<Session>> {
        self.lock()
            .iter()
            .filter(|s| s.kind() == kind)
            .cloned()
            .collect()
    }

    /// Number of recorded sessions.
    #[must_use]
    pub fn len(&self) -> usize {
        self.lock().len()
    }

    /// Whether nothing is recorded.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    /// Forget every recorded session.
    pub fn clear(&self) {
        self.lock().clear();
    }

    fn lock(&self) -> MutexGuard<'_, VecDeque<Arc<Session>>> {
        self.sessions.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
