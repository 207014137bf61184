//! Process-wide callback registry and best-effort notification.
//!
//! The registry holds one global completion callback per [`SessionKind`] and
//! one global log callback. Slots are last-writer-wins: a setter replaces the
//! slot wholesale and a reader clones the `Arc` out, so a notifying task
//! always sees some complete previously written value (or none). Writers and
//! readers are not ordered against each other; a task may observe a callback
//! that is replaced a moment later. Callback changes are administrative, so
//! that staleness is accepted.
//!
//! Every callback invocation runs inside its own unwind boundary. A panicking
//! callback is logged, counted in [`CallbackRegistry::fault_count`], and
//! never stops the remaining notifications.

use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, OnceLock, PoisonError, RwLock};

use tracing::{debug, error, info, warn};

use crate::models::log::{Log, LogLevel};
use crate::models::session::{Session, SessionId, SessionKind};

/// Completion callback invoked with a terminal session.
pub type CompleteCallback = Arc<dyn Fn(&Session) + Send + Sync>;

/// Log callback invoked once per session log line.
pub type LogCallback = Arc<dyn Fn(&Log) + Send + Sync>;

/// Which slot a callback came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CallbackScope {
    /// Attached to the session at construction.
    Session,
    /// Read from the process-wide registry.
    Global,
}

/// Result of one best-effort notification.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NotifyOutcome {
    /// No callback was registered.
    Absent,
    /// Callback returned normally.
    Delivered,
    /// Callback panicked; the panic was contained.
    Faulted,
}

static GLOBAL: OnceLock<Arc<CallbackRegistry>> = OnceLock::new();

/// Global completion and log callback slots.
#[derive(Default)]
pub struct CallbackRegistry {
    ffmpeg_complete: RwLock<Option<CompleteCallback>>,
    ffprobe_complete: RwLock<Option<CompleteCallback>>,
    media_information_complete: RwLock<Option<CompleteCallback>>,
    log: RwLock<Option<LogCallback>>,
    faults: AtomicU64,
}

impl CallbackRegistry {
    /// Create an empty, independent registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// The process-wide registry, created on first use.
    #[must_use]
    pub fn global() -> Arc<Self> {
        Arc::clone(GLOBAL.get_or_init(|| Arc::new(Self::new())))
    }

    /// Current global completion callback for `kind`.
    #[must_use]
    pub fn complete_callback(&self, kind: SessionKind) -> Option<CompleteCallback> {
        self.complete_slot(kind)
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Replace the global completion callback for `kind`; `None` clears it.
    pub fn set_complete_callback(&self, kind: SessionKind, callback: Option<CompleteCallback>) {
        *self
            .complete_slot(kind)
            .write()
            .unwrap_or_else(PoisonError::into_inner) = callback;
        debug!(?kind, "global complete callback replaced");
    }

    /// Current global log callback.
    #[must_use]
    pub fn log_callback(&self) -> Option<LogCallback> {
        self.log.read().unwrap_or_else(PoisonError::into_inner).clone()
    }

    /// Replace the global log callback; `None` clears it.
    pub fn set_log_callback(&self, callback: Option<LogCallback>) {
        *self.log.write().unwrap_or_else(PoisonError::into_inner) = callback;
    }

    /// Number of callback invocations that panicked since creation.
    #[must_use]
    pub fn fault_count(&self) -> u64 {
        self.faults.load(Ordering::Relaxed)
    }

    fn complete_slot(&self, kind: SessionKind) -> &RwLock<Option<CompleteCallback>> {
        match kind {
            SessionKind::Ffmpeg => &self.ffmpeg_complete,
            SessionKind::Ffprobe => &self.ffprobe_complete,
            SessionKind::MediaInformation => &self.media_information_complete,
        }
    }

    fn record_fault(&self) {
        self.faults.fetch_add(1, Ordering::Relaxed);
    }
}

/// Invoke a completion callback, containing any panic it raises.
pub fn notify_complete(
    registry: &CallbackRegistry,
    callback: Option<&CompleteCallback>,
    scope: CallbackScope,
    session: &Session,
) -> NotifyOutcome {
    let Some(callback) = callback else {
        return NotifyOutcome::Absent;
    };
    isolate(registry, scope, session.id(), "complete", || callback(session))
}

/// Record a log line on the session and fan it out.
///
/// The per-session log callback runs first, then the global one. The line is
/// also printed through `tracing` when the session's redirection strategy
/// asks for it.
pub fn deliver_log(
    registry: &CallbackRegistry,
    session: &Session,
    level: LogLevel,
    message: impl Into<String>,
) {
    let log = session.append_log(level, message);
    let global = registry.log_callback();

    let print = session
        .log_redirection_strategy()
        .should_print(session.log_callback().is_some(), global.is_some());
    if print {
        match log.level {
            LogLevel::Error => error!(session_id = %log.session_id, "{}", log.message),
            LogLevel::Warning | LogLevel::Stderr => {
                warn!(session_id = %log.session_id, "{}", log.message);
            }
            LogLevel::Info | LogLevel::Stdout => {
                info!(session_id = %log.session_id, "{}", log.message);
            }
        }
    }

    if let Some(callback) = session.log_callback() {
        isolate(registry, CallbackScope::Session, log.session_id, "log", || {
            callback(&log);
        });
    }
    if let Some(callback) = global {
        isolate(registry, CallbackScope::Global, log.session_id, "log", || {
            callback(&log);
        });
    }
}

fn isolate(
    registry: &CallbackRegistry,
    scope: CallbackScope,
    session_id: SessionId,
    what: &str,
    call: impl FnOnce(),
) -> NotifyOutcome {
    match panic::catch_unwind(AssertUnwindSafe(call)) {
        Ok(()) => NotifyOutcome::Delivered,
        Err(payload) => {
            registry.record_fault();
            warn!(
                %session_id,
                ?scope,
                callback = what,
                panic = panic_message(payload.as_ref()),
                "exception thrown inside callback"
            );
            NotifyOutcome::Faulted
        }
    }
}

/// Best-effort text of a panic payload.
pub(crate) fn panic_message(payload: &(dyn Any + Send)) -> &str {
    payload
        .downcast_ref::<&str>()
        .copied()
        .or_else(|| payload.downcast_ref::<String>().map(String::as_str))
        .unwrap_or("non-string panic payload")
}
