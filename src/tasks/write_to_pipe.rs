//! Copy a file into a named pipe through the shell.
//!
//! The copy is `cat <input> > <pipe>` run by `sh`, blocking until the
//! reader side of the pipe has consumed everything. The exit code is sent
//! back as a success value; an I/O failure (missing input, spawn failure,
//! interrupted wait) is sent back as a `WRITE_TO_PIPE_FAILED` error carrying
//! the failure's message.

use std::fs;
use std::io;
use std::path::PathBuf;
use std::process::Command;
use std::time::Instant;

use serde_json::json;
use tracing::{debug, error, info_span};

use crate::dispatch::{Reply, ResultDispatcher, WRITE_TO_PIPE_FAILED};
use crate::models::session::ReturnCode;

/// Paths are passed as positional parameters, never spliced into the script.
const COPY_SCRIPT: &str = r#"cat "$1" > "$2""#;

/// One scheduled copy into a named pipe.
pub struct WriteToPipeTask {
    input_path: PathBuf,
    pipe_path: PathBuf,
    dispatcher: ResultDispatcher,
    reply: Option<Reply>,
}

impl WriteToPipeTask {
    /// Bind source and pipe paths to the reply channel to answer.
    #[must_use]
    pub fn new(
        input_path: impl Into<PathBuf>,
        pipe_path: impl Into<PathBuf>,
        dispatcher: ResultDispatcher,
        reply: Option<Reply>,
    ) -> Self {
        Self {
            input_path: input_path.into(),
            pipe_path: pipe_path.into(),
            dispatcher,
            reply,
        }
    }

    /// Run the copy and schedule exactly one reply.
    pub fn run(self) {
        let span = info_span!(
            "write_to_pipe",
            input = %self.input_path.display(),
            pipe = %self.pipe_path.display()
        );
        let _guard = span.enter();

        debug!("starting copy to pipe");
        let started = Instant::now();

        match self.copy() {
            Ok(rc) => {
                debug!(
                    rc,
                    seconds = started.elapsed().as_secs(),
                    "copy to pipe completed"
                );
                self.dispatcher.deliver_success(self.reply, json!(rc));
            }
            Err(err) => {
                error!(%err, "copy to pipe failed");
                self.dispatcher.deliver_error(
                    self.reply,
                    WRITE_TO_PIPE_FAILED,
                    &err.to_string(),
                    None,
                );
            }
        }
    }

    fn copy(&self) -> io::Result<i32> {
        // Surface a missing source as a failure rather than a non-zero `cat`.
        fs::metadata(&self.input_path).map_err(|err| {
            io::Error::new(
                err.kind(),
                format!("{}: {err}", self.input_path.display()),
            )
        })?;

        let status = Command::new("sh")
            .arg("-c")
            .arg(COPY_SCRIPT)
            .arg("sh")
            .arg(&self.input_path)
            .arg(&self.pipe_path)
            .status()?;

        Ok(status.code().unwrap_or(ReturnCode::CANCEL.value()))
    }
}
