//! Run a session and acknowledge a reply channel.
//!
//! Used by call sites that want a plain "done" over a reply channel rather
//! than callback notification. No completion callbacks are invoked here;
//! the caller reads the terminal session through other means.

use std::sync::Arc;
use std::time::Duration;

use serde_json::Value;
use tracing::{debug, info_span};

use crate::dispatch::{Reply, ResultDispatcher};
use crate::executor::{self, Executor};
use crate::models::session::Session;

/// One scheduled session run answered with an empty success reply.
pub struct SessionExecuteTask {
    session: Arc<Session>,
    executor: Arc<dyn Executor>,
    wait_timeout: Duration,
    dispatcher: ResultDispatcher,
    reply: Option<Reply>,
}

impl SessionExecuteTask {
    /// Bind a session to its executor and the reply channel to acknowledge.
    #[must_use]
    pub fn new(
        session: Arc<Session>,
        executor: Arc<dyn Executor>,
        wait_timeout: Duration,
        dispatcher: ResultDispatcher,
        reply: Option<Reply>,
    ) -> Self {
        Self {
            session,
            executor,
            wait_timeout,
            dispatcher,
            reply,
        }
    }

    /// Run the session, then schedule the acknowledgment.
    pub fn run(self) {
        let span = info_span!("session_execute", session_id = %self.session.id());
        let _guard = span.enter();

        executor::execute(self.executor.as_ref(), &self.session, self.wait_timeout);
        debug!(state = ?self.session.state(), "session finished; acknowledging");
        self.dispatcher.deliver_success(self.reply, Value::Null);
    }
}
