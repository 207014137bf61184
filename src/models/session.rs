//! Session model and run-state lifecycle.
//!
//! A [`Session`] carries immutable inputs (arguments, callbacks, log policy)
//! fixed at construction, plus run-state that only an executor mutates while
//! the session runs. Once wrapped in an `Arc` the inputs can no longer change;
//! the run-state sits behind a mutex so it can be read from any thread after
//! the executor returns.

use std::fmt::{Display, Formatter};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::log::{Log, LogLevel, LogRedirectionStrategy};
use super::media_information::MediaInformation;
use crate::args::arguments_to_string;
use crate::callbacks::{CompleteCallback, LogCallback};
use crate::{AppError, Result};

static NEXT_SESSION_ID: AtomicU64 = AtomicU64::new(1);

/// Unique, monotonically assigned session identifier.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[serde(transparent)]
pub struct SessionId(u64);

impl SessionId {
    fn next() -> Self {
        Self(NEXT_SESSION_ID.fetch_add(1, Ordering::Relaxed))
    }

    /// Raw numeric value.
    #[must_use]
    pub fn value(self) -> u64 {
        self.0
    }
}

impl From<u64> for SessionId {
    fn from(value: u64) -> Self {
        Self(value)
    }
}

impl Display for SessionId {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Which executor entry point runs the session.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum SessionKind {
    /// Plain media command execution.
    Ffmpeg,
    /// Probe-only execution.
    Ffprobe,
    /// Probe execution whose output is parsed into [`MediaInformation`].
    MediaInformation,
}

/// Lifecycle state of a session.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum SessionState {
    /// Constructed, not yet handed to an executor.
    Created,
    /// Executor is running the command.
    Running,
    /// Command exited with a success return code.
    Completed,
    /// Command exited with an error return code or could not run at all.
    Failed,
}

impl SessionState {
    /// Whether the state is `Completed` or `Failed`.
    #[must_use]
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Completed | Self::Failed)
    }
}

/// Exit status of the wrapped command.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(transparent)]
pub struct ReturnCode(i32);

impl ReturnCode {
    /// Successful exit.
    pub const SUCCESS: Self = Self(0);
    /// Command was cancelled or killed by a signal.
    pub const CANCEL: Self = Self(255);

    /// Wrap a raw exit code.
    #[must_use]
    pub fn new(value: i32) -> Self {
        Self(value)
    }

    /// Raw exit code.
    #[must_use]
    pub fn value(self) -> i32 {
        self.0
    }

    /// Exit code is zero.
    #[must_use]
    pub fn is_value_success(self) -> bool {
        self == Self::SUCCESS
    }

    /// Exit code is neither success nor cancel.
    #[must_use]
    pub fn is_value_error(self) -> bool {
        !self.is_value_success() && !self.is_value_cancel()
    }

    /// Exit code is the cancel marker.
    #[must_use]
    pub fn is_value_cancel(self) -> bool {
        self == Self::CANCEL
    }
}

impl Display for ReturnCode {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug)]
struct RunState {
    start_time: Option<DateTime<Utc>>,
    end_time: Option<DateTime<Utc>>,
    state: SessionState,
    return_code: Option<ReturnCode>,
    fail_reason: Option<String>,
    logs: Vec<Log>,
    media_information: Option<MediaInformation>,
}

/// A requested command execution and its run-state.
pub struct Session {
    id: SessionId,
    kind: SessionKind,
    arguments: Vec<String>,
    create_time: DateTime<Utc>,
    complete_callback: Option<CompleteCallback>,
    log_callback: Option<LogCallback>,
    log_redirection_strategy: LogRedirectionStrategy,
    run: Mutex<RunState>,
}

impl Session {
    /// Construct a session in the `Created` state with a fresh identifier.
    #[must_use]
    pub fn new(kind: SessionKind, arguments: Vec<String>) -> Self {
        Self {
            id: SessionId::next(),
            kind,
            arguments,
            create_time: Utc::now(),
            complete_callback: None,
            log_callback: None,
            log_redirection_strategy: LogRedirectionStrategy::default(),
            run: Mutex::new(RunState {
                start_time: None,
                end_time: None,
                state: SessionState::Created,
                return_code: None,
                fail_reason: None,
                logs: Vec::new(),
                media_information: None,
            }),
        }
    }

    /// Attach the per-session completion callback.
    #[must_use]
    pub fn with_complete_callback(mut self, callback: CompleteCallback) -> Self {
        self.complete_callback = Some(callback);
        self
    }

    /// Attach the per-session log callback.
    #[must_use]
    pub fn with_log_callback(mut self, callback: LogCallback) -> Self {
        self.log_callback = Some(callback);
        self
    }

    /// Override the log redirection policy.
    #[must_use]
    pub fn with_log_redirection_strategy(mut self, strategy: LogRedirectionStrategy) -> Self {
        self.log_redirection_strategy = strategy;
        self
    }

    // ── Immutable inputs ────────────────────────────────

    /// Session identifier.
    #[must_use]
    pub fn id(&self) -> SessionId {
        self.id
    }

    /// Executor entry point for this session.
    #[must_use]
    pub fn kind(&self) -> SessionKind {
        self.kind
    }

    /// `true` for plain executions.
    #[must_use]
    pub fn is_ffmpeg(&self) -> bool {
        self.kind == SessionKind::Ffmpeg
    }

    /// `true` for probe-only executions.
    #[must_use]
    pub fn is_ffprobe(&self) -> bool {
        self.kind == SessionKind::Ffprobe
    }

    /// `true` for media information extraction.
    #[must_use]
    pub fn is_media_information(&self) -> bool {
        self.kind == SessionKind::MediaInformation
    }

    /// Ordered command arguments.
    #[must_use]
    pub fn arguments(&self) -> &[String] {
        &self.arguments
    }

    /// Arguments joined into a single command string.
    #[must_use]
    pub fn command(&self) -> String {
        arguments_to_string(&self.arguments)
    }

    /// Construction timestamp.
    #[must_use]
    pub fn create_time(&self) -> DateTime<Utc> {
        self.create_time
    }

    /// Per-session completion callback.
    #[must_use]
    pub fn complete_callback(&self) -> Option<&CompleteCallback> {
        self.complete_callback.as_ref()
    }

    /// Per-session log callback.
    #[must_use]
    pub fn log_callback(&self) -> Option<&LogCallback> {
        self.log_callback.as_ref()
    }

    /// Log redirection policy.
    #[must_use]
    pub fn log_redirection_strategy(&self) -> LogRedirectionStrategy {
        self.log_redirection_strategy
    }

    // ── Run-state reads ─────────────────────────────────

    /// Current lifecycle state.
    #[must_use]
    pub fn state(&self) -> SessionState {
        self.run().state
    }

    /// When the executor started the session.
    #[must_use]
    pub fn start_time(&self) -> Option<DateTime<Utc>> {
        self.run().start_time
    }

    /// When the session reached a terminal state.
    #[must_use]
    pub fn end_time(&self) -> Option<DateTime<Utc>> {
        self.run().end_time
    }

    /// Elapsed run time, available once the session has ended.
    #[must_use]
    pub fn duration(&self) -> Option<Duration> {
        let run = self.run();
        let (start, end) = (run.start_time?, run.end_time?);
        (end - start).to_std().ok()
    }

    /// Exit status of the command, if it ran to exit.
    #[must_use]
    pub fn return_code(&self) -> Option<ReturnCode> {
        self.run().return_code
    }

    /// Reason recorded when the session failed without (or despite) a return code.
    #[must_use]
    pub fn fail_reason(&self) -> Option<String> {
        self.run().fail_reason.clone()
    }

    /// Copy of all collected log lines.
    #[must_use]
    pub fn logs(&self) -> Vec<Log> {
        self.run().logs.clone()
    }

    /// All log lines joined with newlines.
    #[must_use]
    pub fn all_logs_as_string(&self) -> String {
        let run = self.run();
        run.logs
            .iter()
            .map(|log| log.message.as_str())
            .collect::<Vec<_>>()
            .join("\n")
    }

    /// Standard output lines joined with newlines.
    #[must_use]
    pub fn output(&self) -> String {
        let run = self.run();
        run.logs
            .iter()
            .filter(|log| log.level == LogLevel::Stdout)
            .map(|log| log.message.as_str())
            .collect::<Vec<_>>()
            .join("\n")
    }

    /// Parsed probe output for media information sessions.
    #[must_use]
    pub fn media_information(&self) -> Option<MediaInformation> {
        self.run().media_information.clone()
    }

    /// Serializable copy of inputs and run-state.
    #[must_use]
    pub fn snapshot(&self) -> SessionSnapshot {
        let run = self.run();
        SessionSnapshot {
            session_id: self.id,
            kind: self.kind,
            arguments: self.arguments.clone(),
            create_time: self.create_time,
            start_time: run.start_time,
            end_time: run.end_time,
            state: run.state,
            return_code: run.return_code,
            fail_reason: run.fail_reason.clone(),
            logs: run
                .logs
                .iter()
                .map(|log| log.message.as_str())
                .collect::<Vec<_>>()
                .join("\n"),
        }
    }

    // ── Run-state transitions (executor only) ───────────

    /// Move `Created` → `Running` and stamp the start time.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Executor` if the session is not in `Created`.
    pub fn start_running(&self) -> Result<()> {
        let mut run = self.run();
        if run.state != SessionState::Created {
            return Err(AppError::Executor(format!(
                "session {} cannot start from {:?}",
                self.id, run.state
            )));
        }
        run.state = SessionState::Running;
        run.start_time = Some(Utc::now());
        Ok(())
    }

    /// Move `Running` → `Completed` (success code) or `Failed` (any other code).
    ///
    /// # Errors
    ///
    /// Returns `AppError::Executor` if the session is not `Running`.
    pub fn finish(&self, return_code: ReturnCode) -> Result<()> {
        let mut run = self.run();
        Self::ensure_running(self.id, &run)?;
        run.state = if return_code.is_value_success() {
            SessionState::Completed
        } else {
            SessionState::Failed
        };
        run.return_code = Some(return_code);
        run.end_time = Some(Utc::now());
        Ok(())
    }

    /// Move `Running` → `Failed`, recording the reason and any known code.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Executor` if the session is not `Running`.
    pub fn fail(&self, return_code: Option<ReturnCode>, reason: impl Into<String>) -> Result<()> {
        let mut run = self.run();
        Self::ensure_running(self.id, &run)?;
        run.state = SessionState::Failed;
        run.return_code = return_code;
        run.fail_reason = Some(reason.into());
        run.end_time = Some(Utc::now());
        Ok(())
    }

    /// Append one log line and return the stored entry.
    pub fn append_log(&self, level: LogLevel, message: impl Into<String>) -> Log {
        let log = Log {
            session_id: self.id,
            level,
            message: message.into(),
        };
        self.run().logs.push(log.clone());
        log
    }

    /// Store parsed probe output.
    pub fn set_media_information(&self, information: MediaInformation) {
        self.run().media_information = Some(information);
    }

    /// Force any non-terminal session into `Failed`.
    ///
    /// Used when an executor unwinds without finishing the session. Returns
    /// `false` if the session was already terminal.
    pub(crate) fn abort(&self, reason: impl Into<String>) -> bool {
        let mut run = self.run();
        if run.state.is_terminal() {
            return false;
        }
        let now = Utc::now();
        run.start_time.get_or_insert(now);
        run.state = SessionState::Failed;
        run.fail_reason = Some(reason.into());
        run.end_time = Some(now);
        true
    }

    fn ensure_running(id: SessionId, run: &RunState) -> Result<()> {
        if run.state == SessionState::Running {
            Ok(())
        } else {
            Err(AppError::Executor(format!(
                "session {id} cannot end from {:?}",
                run.state
            )))
        }
    }

    fn run(&self) -> MutexGuard<'_, RunState> {
        self.run.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        let run = self.run();
        f.debug_struct("Session")
            .field("id", &self.id)
            .field("kind", &self.kind)
            .field("arguments", &self.arguments)
            .field("state", &run.state)
            .field("return_code", &run.return_code)
            .field("has_complete_callback", &self.complete_callback.is_some())
            .field("has_log_callback", &self.log_callback.is_some())
            .finish_non_exhaustive()
    }
}

impl Display for Session {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        let run = self.run();
        let fmt_time = |time: Option<DateTime<Utc>>| {
            time.map_or_else(|| "null".to_owned(), |t| t.to_rfc3339())
        };
        write!(
            f,
            "Session{{id={}, kind={:?}, createTime={}, startTime={}, endTime={}, arguments={}, state={:?}, returnCode={}, failReason='{}'}}",
            self.id,
            self.kind,
            self.create_time.to_rfc3339(),
            fmt_time(run.start_time),
            fmt_time(run.end_time),
            arguments_to_string(&self.arguments),
            run.state,
            run.return_code
                .map_or_else(|| "null".to_owned(), |rc| rc.to_string()),
            run.fail_reason.as_deref().unwrap_or_default(),
        )
    }
}

/// Serializable view of a session, used for replies and CLI output.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub struct SessionSnapshot {
    /// Session identifier.
    pub session_id: SessionId,
    /// Executor entry point.
    pub kind: SessionKind,
    /// Command arguments.
    pub arguments: Vec<String>,
    /// Construction timestamp.
    pub create_time: DateTime<Utc>,
    /// Start timestamp.
    pub start_time: Option<DateTime<Utc>>,
    /// End timestamp.
    pub end_time: Option<DateTime<Utc>>,
    /// Lifecycle state.
    pub state: SessionState,
    /// Exit status.
    pub return_code: Option<ReturnCode>,
    /// Failure reason.
    pub fail_reason: Option<String>,
    /// All log text.
    pub logs: String,
}
