//! Call-boundary entry points.
//!
//! [`SessionBridge`] owns the worker lanes, the bounded session history, and
//! the executor every session is handed to. Each session kind gets a
//! synchronous entry point (blocks the caller, returns the terminal session,
//! no callback notification) and an asynchronous one (returns at once, runs
//! the session on a lane, then notifies callbacks). Reply-channel call sites
//! use [`SessionBridge::run_and_acknowledge`] and
//! [`SessionBridge::write_to_pipe`] instead; those answer through a
//! [`ResultDispatcher`] and never touch the channel from a lane.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, info};

use crate::args::parse_arguments;
use crate::callbacks::{CallbackRegistry, CompleteCallback};
use crate::config::GlobalConfig;
use crate::dispatch::{Reply, ResultDispatcher};
use crate::executor::process::ProcessExecutor;
use crate::executor::{self, Executor};
use crate::history::SessionHistory;
use crate::models::session::{Session, SessionId, SessionKind};
use crate::pipes;
use crate::pool::WorkerPool;
use crate::tasks::{AsyncExecuteTask, SessionExecuteTask, WriteToPipeTask};
use crate::Result;

/// Probe arguments placed before the input path of a media information session.
pub const MEDIA_INFORMATION_ARGUMENTS: [&str; 9] = [
    "-v",
    "error",
    "-hide_banner",
    "-print_format",
    "json",
    "-show_format",
    "-show_streams",
    "-show_chapters",
    "-i",
];

/// Full argument list for probing `path`.
#[must_use]
pub fn media_information_arguments(path: &str) -> Vec<String> {
    MEDIA_INFORMATION_ARGUMENTS
        .iter()
        .map(|arg| (*arg).to_owned())
        .chain(std::iter::once(path.to_owned()))
        .collect()
}

/// Front door for creating, running and tracking sessions.
pub struct SessionBridge {
    config: Arc<GlobalConfig>,
    executor: Arc<dyn Executor>,
    registry: Arc<CallbackRegistry>,
    pool: WorkerPool,
    history: SessionHistory,
}

impl SessionBridge {
    /// Build a bridge around an executor and callback registry.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Config` if the configuration is invalid, or
    /// `AppError::Pool` if the worker lanes cannot be started.
    pub fn new(
        config: GlobalConfig,
        executor: Arc<dyn Executor>,
        registry: Arc<CallbackRegistry>,
    ) -> Result<Self> {
        config.validate()?;
        let pool = WorkerPool::new(config.worker_threads)?;
        let history = SessionHistory::new(config.session_history_size);

        info!(
            lanes = config.worker_threads,
            history = config.session_history_size,
            "session bridge ready"
        );

        Ok(Self {
            config: Arc::new(config),
            executor,
            registry,
            pool,
            history,
        })
    }

    /// Build a bridge that runs the configured binaries, notifying through
    /// the process-wide callback registry.
    ///
    /// # Errors
    ///
    /// Same as [`SessionBridge::new`].
    pub fn with_process_executor(config: GlobalConfig) -> Result<Self> {
        let registry = CallbackRegistry::global();
        let executor = Arc::new(ProcessExecutor::new(&config, Arc::clone(&registry)));
        Self::new(config, executor, registry)
    }

    /// Callback registry used for global notifications.
    #[must_use]
    pub fn registry(&self) -> &Arc<CallbackRegistry> {
        &self.registry
    }

    /// Active configuration.
    #[must_use]
    pub fn config(&self) -> &GlobalConfig {
        &self.config
    }

    /// Default worker lanes.
    #[must_use]
    pub fn pool(&self) -> &WorkerPool {
        &self.pool
    }

    // ── Session construction ────────────────────────────

    /// New plain session with the configured log policy.
    #[must_use]
    pub fn ffmpeg_session(&self, arguments: Vec<String>) -> Session {
        self.session(SessionKind::Ffmpeg, arguments)
    }

    /// New probe session with the configured log policy.
    #[must_use]
    pub fn ffprobe_session(&self, arguments: Vec<String>) -> Session {
        self.session(SessionKind::Ffprobe, arguments)
    }

    /// New media information session probing `path`.
    #[must_use]
    pub fn media_information_session(&self, path: &str) -> Session {
        self.session(
            SessionKind::MediaInformation,
            media_information_arguments(path),
        )
    }

    fn session(&self, kind: SessionKind, arguments: Vec<String>) -> Session {
        Session::new(kind, arguments)
            .with_log_redirection_strategy(self.config.log_redirection_strategy)
    }

    // ── Execution ───────────────────────────────────────

    /// Run `session` on the calling thread and return it once terminal.
    ///
    /// Completion callbacks are not invoked on this path.
    pub fn execute_sync(&self, session: Session) -> Arc<Session> {
        let session = self.record(session);
        executor::execute(
            self.executor.as_ref(),
            &session,
            self.config.media_information_timeout(),
        );
        debug!(session_id = %session.id(), state = ?session.state(), "sync execution finished");
        session
    }

    /// Schedule `session` on the default lanes and return immediately.
    ///
    /// Completion callbacks run on the lane after the session ends.
    pub fn execute_async(&self, session: Session) -> Arc<Session> {
        self.execute_async_on(session, &self.pool)
    }

    /// Schedule `session` on a caller-provided pool and return immediately.
    pub fn execute_async_on(&self, session: Session, pool: &WorkerPool) -> Arc<Session> {
        let session = self.record(session);
        let task = AsyncExecuteTask::new(
            Arc::clone(&session),
            Arc::clone(&self.executor),
            Arc::clone(&self.registry),
            self.config.media_information_timeout(),
        );
        drop(pool.submit(move || task.run()));
        debug!(session_id = %session.id(), "session scheduled");
        session
    }

    /// Parse `command` and run it synchronously as a session of `kind`.
    ///
    /// For media information sessions `command` is the full probe command,
    /// not just the input path.
    pub fn execute(&self, kind: SessionKind, command: &str) -> Arc<Session> {
        self.execute_sync(self.session(kind, parse_arguments(command)))
    }

    /// Parse `command` and schedule it as a session of `kind`.
    pub fn execute_command_async(
        &self,
        kind: SessionKind,
        command: &str,
        callback: Option<CompleteCallback>,
    ) -> Arc<Session> {
        let mut session = self.session(kind, parse_arguments(command));
        if let Some(callback) = callback {
            session = session.with_complete_callback(callback);
        }
        self.execute_async(session)
    }

    /// Probe `path` synchronously.
    pub fn get_media_information(&self, path: &str) -> Arc<Session> {
        self.execute_sync(self.media_information_session(path))
    }

    /// Probe `path` on a lane and notify `callback` when done.
    pub fn get_media_information_async(
        &self,
        path: &str,
        callback: Option<CompleteCallback>,
    ) -> Arc<Session> {
        let mut session = self.media_information_session(path);
        if let Some(callback) = callback {
            session = session.with_complete_callback(callback);
        }
        self.execute_async(session)
    }

    // ── Reply-channel call sites ────────────────────────

    /// Run `session` on a lane, then acknowledge `reply` with an empty
    /// success through `dispatcher`.
    pub fn run_and_acknowledge(
        &self,
        session: Session,
        dispatcher: &ResultDispatcher,
        reply: Option<Reply>,
    ) -> Arc<Session> {
        let session = self.record(session);
        let task = SessionExecuteTask::new(
            Arc::clone(&session),
            Arc::clone(&self.executor),
            self.config.media_information_timeout(),
            dispatcher.clone(),
            reply,
        );
        drop(self.pool.submit(move || task.run()));
        session
    }

    /// Copy `input` into `pipe` on a lane and answer `reply` with the exit
    /// code, or with a `WRITE_TO_PIPE_FAILED` error.
    pub fn write_to_pipe(
        &self,
        input: impl Into<PathBuf>,
        pipe: impl Into<PathBuf>,
        dispatcher: &ResultDispatcher,
        reply: Option<Reply>,
    ) {
        let task = WriteToPipeTask::new(input, pipe, dispatcher.clone(), reply);
        drop(self.pool.submit(move || task.run()));
    }

    // ── Named pipes ─────────────────────────────────────

    /// Create a new FIFO in the configured pipe directory.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Pipe` if the FIFO cannot be created.
    pub fn register_new_pipe(&self) -> Result<PathBuf> {
        pipes::register_new_pipe(&self.config.pipe_directory)
    }

    /// Remove a FIFO created by [`SessionBridge::register_new_pipe`].
    ///
    /// # Errors
    ///
    /// Returns `AppError::NotFound` if no pipe exists at `path`, or
    /// `AppError::Pipe` if it cannot be removed.
    pub fn close_pipe(&self, path: &Path) -> Result<()> {
        pipes::close_pipe(path)
    }

    // ── History ─────────────────────────────────────────

    /// Session with the given identifier, if still in history.
    #[must_use]
    pub fn session_by_id(&self, id: SessionId) -> Option<Arc<Session>> {
        self.history.get(id)
    }

    /// Most recently created session.
    #[must_use]
    pub fn last_session(&self) -> Option<Arc<Session>> {
        self.history.last()
    }

    /// Sessions in history, oldest first.
    #[must_use]
    pub fn sessions(&self) -> Vec<Arc<Session>> {
        self.history.list()
    }

    /// Sessions of one kind in history, oldest first.
    #[must_use]
    pub fn sessions_of(&self, kind: SessionKind) -> Vec<Arc<Session>> {
        self.history.list_of(kind)
    }

    /// Forget all sessions in history.
    pub fn clear_sessions(&self) {
        self.history.clear();
    }

    /// Stop accepting work and wait up to `timeout` for running sessions.
    pub fn shutdown(self, timeout: Duration) {
        info!("session bridge shutting down");
        self.pool.shutdown(timeout);
    }

    fn record(&self, session: Session) -> Arc<Session> {
        let session = Arc::new(session);
        self.history.add(Arc::clone(&session));
        session
    }
}
