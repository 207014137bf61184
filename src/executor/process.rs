//! Child-process executor.
//!
//! Spawns the configured media binaries with the session arguments. Two
//! reader threads forward stdout and stderr lines and a waiter thread
//! forwards the exit status, all over one channel drained on the executor
//! lane. Log callbacks therefore run on the same lane as the executor, in
//! arrival order.
//!
//! Output is framed on `\n` and `\r` so progress reports arrive as they are
//! written. Bytes are decoded lossily and readers keep draining to end of
//! stream, so a child never sees a closed pipe.

use std::io::{BufRead, BufReader, ErrorKind, Read};
use std::process::{Command, ExitStatus, Stdio};
use std::sync::mpsc::{self, RecvTimeoutError, Sender};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use tracing::{info, info_span, warn};

use super::Executor;
use crate::callbacks::{deliver_log, CallbackRegistry};
use crate::config::GlobalConfig;
use crate::models::log::LogLevel;
use crate::models::media_information::MediaInformation;
use crate::models::session::{ReturnCode, Session};

/// Longest log line forwarded in one piece; longer runs are split.
pub const MAX_LINE_BYTES: usize = 64 * 1024;

enum Event {
    Line(LogLevel, String),
    Exited(std::io::Result<ExitStatus>),
}

/// Outcome of draining a child process.
struct Drained {
    status: Option<std::io::Result<ExitStatus>>,
    timed_out: bool,
}

/// Executor that runs `ffmpeg`/`ffprobe` binaries as child processes.
pub struct ProcessExecutor {
    ffmpeg_binary: String,
    ffprobe_binary: String,
    registry: Arc<CallbackRegistry>,
}

impl ProcessExecutor {
    /// Build an executor from configured binary names.
    #[must_use]
    pub fn new(config: &GlobalConfig, registry: Arc<CallbackRegistry>) -> Self {
        Self {
            ffmpeg_binary: config.ffmpeg_binary.clone(),
            ffprobe_binary: config.ffprobe_binary.clone(),
            registry,
        }
    }

    fn run(&self, binary: &str, session: &Session, wait_timeout: Option<Duration>) {
        let span = info_span!("process_execute", session_id = %session.id(), binary);
        let _guard = span.enter();

        if let Err(err) = session.start_running() {
            warn!(%err, "session skipped");
            return;
        }

        let spawned = Command::new(binary)
            .args(session.arguments())
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn();

        let mut child = match spawned {
            Ok(child) => child,
            Err(err) => {
                warn!(%err, "failed to spawn command");
                self.end(session, None, format!("failed to spawn {binary}: {err}"));
                return;
            }
        };

        info!(pid = child.id(), "command started");

        let (tx, rx) = mpsc::channel();
        if let Some(stdout) = child.stdout.take() {
            forward_lines(stdout, LogLevel::Stdout, tx.clone());
        }
        if let Some(stderr) = child.stderr.take() {
            forward_lines(stderr, LogLevel::Stderr, tx.clone());
        }
        thread::spawn(move || {
            let _ = tx.send(Event::Exited(child.wait()));
        });

        let drained = self.drain(session, &rx, wait_timeout);

        let return_code = match drained.status {
            Some(Ok(status)) => status.code().map_or(ReturnCode::CANCEL, ReturnCode::new),
            Some(Err(err)) => {
                self.end(session, None, format!("failed waiting for {binary}: {err}"));
                return;
            }
            None => {
                self.end(session, None, format!("{binary} exit status was not received"));
                return;
            }
        };

        if drained.timed_out {
            self.end(
                session,
                Some(return_code),
                "timed out waiting for output in transmit",
            );
            return;
        }

        if session.is_media_information() && return_code.is_value_success() {
            match MediaInformation::from_json(&session.output()) {
                Ok(information) => session.set_media_information(information),
                Err(err) => {
                    self.end(session, Some(return_code), err.to_string());
                    return;
                }
            }
        }

        if let Err(err) = session.finish(return_code) {
            warn!(%err, "failed to finish session");
        }
        info!(rc = %return_code, state = ?session.state(), "command finished");
    }

    /// Pump log lines until every sender hangs up.
    ///
    /// With a `wait_timeout`, the clock starts once the exit status arrives
    /// and bounds how long remaining output may take.
    fn drain(
        &self,
        session: &Session,
        rx: &mpsc::Receiver<Event>,
        wait_timeout: Option<Duration>,
    ) -> Drained {
        let mut status = None;
        let mut deadline: Option<Instant> = None;

        loop {
            let next = match deadline {
                Some(at) => match rx.recv_timeout(at.saturating_duration_since(Instant::now())) {
                    Ok(event) => Some(event),
                    Err(RecvTimeoutError::Disconnected) => None,
                    Err(RecvTimeoutError::Timeout) => {
                        return Drained {
                            status,
                            timed_out: true,
                        };
                    }
                },
                None => rx.recv().ok(),
            };

            match next {
                Some(Event::Line(level, line)) => deliver_log(&self.registry, session, level, line),
                Some(Event::Exited(exit)) => {
                    status = Some(exit);
                    deadline = wait_timeout.map(|timeout| Instant::now() + timeout);
                }
                None => {
                    return Drained {
                        status,
                        timed_out: false,
                    };
                }
            }
        }
    }

    fn end(&self, session: &Session, return_code: Option<ReturnCode>, reason: impl Into<String>) {
        let reason = reason.into();
        deliver_log(&self.registry, session, LogLevel::Error, reason.clone());
        if let Err(err) = session.fail(return_code, reason) {
            warn!(%err, "failed to fail session");
        }
    }
}

impl Executor for ProcessExecutor {
    fn execute_ffmpeg(&self, session: &Session) {
        self.run(&self.ffmpeg_binary, session, None);
    }

    fn execute_ffprobe(&self, session: &Session) {
        self.run(&self.ffprobe_binary, session, None);
    }

    fn execute_media_information(&self, session: &Session, wait_timeout: Duration) {
        self.run(&self.ffprobe_binary, session, Some(wait_timeout));
    }
}

fn forward_lines<R: Read + Send + 'static>(source: R, level: LogLevel, tx: Sender<Event>) {
    thread::spawn(move || {
        let mut reader = BufReader::new(source);
        let mut framer = LineFramer::default();
        let mut connected = true;
        loop {
            let chunk = match reader.fill_buf() {
                Ok([]) => break,
                Ok(chunk) => chunk,
                Err(err) if err.kind() == ErrorKind::Interrupted => continue,
                Err(err) => {
                    warn!(%err, ?level, "log reader stopped");
                    break;
                }
            };
            let lines = framer.push(chunk);
            let consumed = chunk.len();
            reader.consume(consumed);

            for line in lines {
                connected = connected && tx.send(Event::Line(level, line)).is_ok();
            }
        }
        if let Some(line) = framer.finish().filter(|_| connected) {
            let _ = tx.send(Event::Line(level, line));
        }
    });
}

/// Splits a byte stream into log lines on `\n`, `\r` and `\r\n`.
#[derive(Default)]
struct LineFramer {
    pending: Vec<u8>,
    after_cr: bool,
}

impl LineFramer {
    fn push(&mut self, bytes: &[u8]) -> Vec<String> {
        let mut lines = Vec::new();
        for &byte in bytes {
            match byte {
                b'\n' if self.after_cr => self.after_cr = false,
                b'\n' | b'\r' => {
                    self.after_cr = byte == b'\r';
                    lines.push(self.take());
                }
                _ => {
                    self.after_cr = false;
                    self.pending.push(byte);
                    if self.pending.len() >= MAX_LINE_BYTES {
                        lines.push(self.take());
                    }
                }
            }
        }
        lines
    }

    fn finish(&mut self) -> Option<String> {
        (!self.pending.is_empty()).then(|| self.take())
    }

    fn take(&mut self) -> String {
        let line = String::from_utf8_lossy(&self.pending).into_owned();
        self.pending.clear();
        line
    }
}
