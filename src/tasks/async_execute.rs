//! Run a session off the caller's thread, then notify its callbacks.
//!
//! Steps run strictly in order on one lane:
//!
//! 1. the executor runs the session to a terminal state;
//! 2. the per-session completion callback, if any, is invoked;
//! 3. the global completion callback for the session kind, if any, is
//!    invoked.
//!
//! Each callback runs inside its own unwind boundary, so a panic in step 2
//! never prevents step 3. The task never mutates session state itself.

use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, info_span};

use crate::callbacks::{notify_complete, CallbackRegistry, CallbackScope, NotifyOutcome};
use crate::executor::{self, Executor};
use crate::models::session::Session;

/// What happened to each completion callback of one session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NotifyReport {
    /// Per-session callback outcome.
    pub session: NotifyOutcome,
    /// Global callback outcome.
    pub global: NotifyOutcome,
}

/// One scheduled session run with callback notification.
pub struct AsyncExecuteTask {
    session: Arc<Session>,
    executor: Arc<dyn Executor>,
    registry: Arc<CallbackRegistry>,
    wait_timeout: Duration,
}

impl AsyncExecuteTask {
    /// Bind a session to the executor and registry that will serve it.
    ///
    /// `wait_timeout` only applies to media information sessions.
    #[must_use]
    pub fn new(
        session: Arc<Session>,
        executor: Arc<dyn Executor>,
        registry: Arc<CallbackRegistry>,
        wait_timeout: Duration,
    ) -> Self {
        Self {
            session,
            executor,
            registry,
            wait_timeout,
        }
    }

    /// Run the session and notify. Blocks the calling lane throughout.
    pub fn run(self) -> NotifyReport {
        let session = &self.session;
        let span = info_span!("async_execute", session_id = %session.id(), kind = ?session.kind());
        let _guard = span.enter();

        executor::execute(self.executor.as_ref(), session, self.wait_timeout);

        let session_outcome = notify_complete(
            &self.registry,
            session.complete_callback(),
            CallbackScope::Session,
            session,
        );

        let global = self.registry.complete_callback(session.kind());
        let global_outcome = notify_complete(
            &self.registry,
            global.as_ref(),
            CallbackScope::Global,
            session,
        );

        debug!(
            state = ?session.state(),
            session_callback = ?session_outcome,
            global_callback = ?global_outcome,
            "session notified"
        );

        NotifyReport {
            session: session_outcome,
            global: global_outcome,
        }
    }
}
