//! Shared test helpers for integration tests.
//!
//! Provides stub executors with controlled blocking and failure behaviour,
//! a recording reply channel, and bridge construction with an isolated
//! callback registry so tests do not interfere through global state.

use std::sync::mpsc;
use std::sync::{Arc, Mutex};
use std::thread::{self, ThreadId};
use std::time::Duration;

use serde_json::Value;
use session_bridge::callbacks::CallbackRegistry;
use session_bridge::config::GlobalConfig;
use session_bridge::dispatch::ReplyChannel;
use session_bridge::executor::Executor;
use session_bridge::models::session::{ReturnCode, Session};
use session_bridge::SessionBridge;

/// Generous upper bound for waiting on cross-thread signals.
pub const WAIT: Duration = Duration::from_secs(5);

/// Build a small `GlobalConfig` for test isolation.
pub fn test_config() -> GlobalConfig {
    GlobalConfig::from_toml_str(
        r#"
worker_threads = 4
session_history_size = 10
log_redirection_strategy = "never_print_logs"

[timeouts]
media_information_millis = 500
"#,
    )
    .expect("valid test config")
}

/// Bridge over `executor` with a fresh, private registry.
pub fn test_bridge(executor: Arc<dyn Executor>) -> SessionBridge {
    SessionBridge::new(test_config(), executor, Arc::new(CallbackRegistry::new()))
        .expect("bridge")
}

/// Convert string slices into owned arguments.
pub fn args(raw: &[&str]) -> Vec<String> {
    raw.iter().map(|arg| (*arg).to_owned()).collect()
}

/// Executor that completes every session with a fixed code after a delay.
pub struct StubExecutor {
    pub delay: Duration,
    pub return_code: ReturnCode,
    pub seen: Mutex<Vec<Vec<String>>>,
}

impl StubExecutor {
    pub fn succeeding() -> Self {
        Self::with(Duration::ZERO, ReturnCode::SUCCESS)
    }

    pub fn sleeping(delay: Duration) -> Self {
        Self::with(delay, ReturnCode::SUCCESS)
    }

    pub fn with(delay: Duration, return_code: ReturnCode) -> Self {
        Self {
            delay,
            return_code,
            seen: Mutex::new(Vec::new()),
        }
    }

    /// Argument lists of every session run so far.
    pub fn seen(&self) -> Vec<Vec<String>> {
        self.seen.lock().unwrap().clone()
    }

    fn run(&self, session: &Session) {
        self.seen.lock().unwrap().push(session.arguments().to_vec());
        session.start_running().expect("stub start");
        if !self.delay.is_zero() {
            thread::sleep(self.delay);
        }
        session.finish(self.return_code).expect("stub finish");
    }
}

impl Executor for StubExecutor {
    fn execute_ffmpeg(&self, session: &Session) {
        self.run(session);
    }

    fn execute_ffprobe(&self, session: &Session) {
        self.run(session);
    }

    fn execute_media_information(&self, session: &Session, _wait_timeout: Duration) {
        self.run(session);
    }
}

/// Executor that panics after starting the session.
pub struct PanickingExecutor;

impl Executor for PanickingExecutor {
    fn execute_ffmpeg(&self, session: &Session) {
        session.start_running().expect("stub start");
        panic!("executor failure");
    }

    fn execute_ffprobe(&self, session: &Session) {
        self.execute_ffmpeg(session);
    }

    fn execute_media_information(&self, session: &Session, _wait_timeout: Duration) {
        self.execute_ffmpeg(session);
    }
}

/// Answer received by a [`RecordingReply`].
#[derive(Debug, Clone, PartialEq)]
pub enum Answer {
    Success(Value),
    Error { code: String, message: String },
    NotImplemented,
}

/// Reply channel that forwards its answer and answering thread to the test.
pub struct RecordingReply {
    tx: mpsc::Sender<(Answer, ThreadId)>,
}

impl RecordingReply {
    /// A boxed channel plus the receiver its answer arrives on.
    pub fn pair() -> (Box<Self>, mpsc::Receiver<(Answer, ThreadId)>) {
        let (tx, rx) = mpsc::channel();
        (Box::new(Self { tx }), rx)
    }

    fn record(&self, answer: Answer) {
        self.tx.send((answer, thread::current().id())).unwrap();
    }
}

impl ReplyChannel for RecordingReply {
    fn success(self: Box<Self>, value: Value) {
        self.record(Answer::Success(value));
    }

    fn error(self: Box<Self>, code: &str, message: &str, _details: Option<Value>) {
        self.record(Answer::Error {
            code: code.to_owned(),
            message: message.to_owned(),
        });
    }

    fn not_implemented(self: Box<Self>) {
        self.record(Answer::NotImplemented);
    }
}
