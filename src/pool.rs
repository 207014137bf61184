//! Worker lanes for blocking session work.
//!
//! Sessions block their lane for the whole command run; nothing here makes
//! the work itself non-blocking. The pool is a tokio runtime whose blocking
//! threads serve as lanes, capped at the configured size. Submissions beyond
//! the cap queue until a lane frees up.

use std::time::Duration;

use tokio::runtime::{Builder, Handle, Runtime};
use tokio::task::JoinHandle;
use tracing::{debug, info};

use crate::{AppError, Result};

/// Bounded set of threads that run blocking jobs.
pub struct WorkerPool {
    runtime: Option<Runtime>,
    handle: Handle,
    lanes: usize,
}

impl WorkerPool {
    /// Build a pool with `lanes` concurrent blocking threads.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Pool` if `lanes` is zero or the runtime cannot
    /// be built.
    pub fn new(lanes: usize) -> Result<Self> {
        if lanes == 0 {
            return Err(AppError::Pool("pool needs at least one lane".into()));
        }

        let runtime = Builder::new_multi_thread()
            .worker_threads(1)
            .max_blocking_threads(lanes)
            .thread_name("session-lane")
            .enable_all()
            .build()
            .map_err(|err| AppError::Pool(format!("failed to build worker runtime: {err}")))?;
        let handle = runtime.handle().clone();

        info!(lanes, "worker pool started");
        Ok(Self {
            runtime: Some(runtime),
            handle,
            lanes,
        })
    }

    /// Number of lanes.
    #[must_use]
    pub fn lanes(&self) -> usize {
        self.lanes
    }

    /// Run `job` on a lane and return immediately.
    ///
    /// The returned handle may be awaited or dropped; dropping it does not
    /// cancel the job.
    pub fn submit<F, R>(&self, job: F) -> JoinHandle<R>
    where
        F: FnOnce() -> R + Send + 'static,
        R: Send + 'static,
    {
        self.handle.spawn_blocking(job)
    }

    /// Wait up to `timeout` for running jobs, then release the lanes.
    ///
    /// Jobs still running after the timeout keep their threads until they
    /// return; they are not interrupted.
    pub fn shutdown(mut self, timeout: Duration) {
        if let Some(runtime) = self.runtime.take() {
            runtime.shutdown_timeout(timeout);
            debug!("worker pool shut down");
        }
    }
}

impl Drop for WorkerPool {
    fn drop(&mut self) {
        if let Some(runtime) = self.runtime.take() {
            runtime.shutdown_background();
        }
    }
}
