//! Blocking executor abstraction.
//!
//! The [`Executor`] trait is the seam between session scheduling and the
//! work itself. Implementations run synchronously on the calling lane,
//! drive the session through `Running` into a terminal state, and report
//! command failures as session data rather than as errors.

pub mod process;

use std::panic::{self, AssertUnwindSafe};
use std::time::Duration;

use tracing::error;

use crate::callbacks::panic_message;
use crate::models::session::{Session, SessionKind};

/// Runs sessions to completion on the calling thread.
///
/// Each entry point must leave the session in `Completed` or `Failed`
/// before returning. A given session is never passed to two entry points
/// concurrently.
pub trait Executor: Send + Sync {
    /// Run a plain media command.
    fn execute_ffmpeg(&self, session: &Session);

    /// Run a probe-only command.
    fn execute_ffprobe(&self, session: &Session);

    /// Run a probe and parse its output into media information.
    ///
    /// `wait_timeout` bounds how long to wait for output still in transit
    /// after the command exits; exceeding it fails the session.
    fn execute_media_information(&self, session: &Session, wait_timeout: Duration);
}

/// Dispatch `session` to the entry point matching its kind.
///
/// An executor that unwinds is contained here: the panic is logged and the
/// session is forced into `Failed` if it had not reached a terminal state.
pub fn execute(executor: &dyn Executor, session: &Session, wait_timeout: Duration) {
    let result = panic::catch_unwind(AssertUnwindSafe(|| match session.kind() {
        SessionKind::Ffmpeg => executor.execute_ffmpeg(session),
        SessionKind::Ffprobe => executor.execute_ffprobe(session),
        SessionKind::MediaInformation => {
            executor.execute_media_information(session, wait_timeout);
        }
    }));

    if let Err(payload) = result {
        let message = panic_message(payload.as_ref());
        error!(session_id = %session.id(), panic = message, "executor panicked");
        session.abort(format!("executor panicked: {message}"));
    }
}
