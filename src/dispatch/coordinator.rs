//! Dedicated coordination thread.
//!
//! For hosts without an event loop of their own, [`Coordinator`] spawns a
//! named thread that owns the [`DeliveryQueue`] and applies deliveries
//! until shutdown.

use std::thread::{self, JoinHandle, ThreadId};

use tracing::{info, warn};

use super::{channel, ResultDispatcher};
use crate::{AppError, Result};

const THREAD_NAME: &str = "session-coordination";

/// Owns the coordination thread and hands out dispatchers bound to it.
pub struct Coordinator {
    dispatcher: ResultDispatcher,
    thread_id: ThreadId,
    handle: Option<JoinHandle<()>>,
}

impl Coordinator {
    /// Spawn the coordination thread.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Dispatch` if the OS refuses to create the thread.
    pub fn spawn() -> Result<Self> {
        let (dispatcher, queue) = channel();
        let handle = thread::Builder::new()
            .name(THREAD_NAME.into())
            .spawn(move || queue.run())
            .map_err(|err| {
                AppError::Dispatch(format!("failed to spawn coordination thread: {err}"))
            })?;

        let thread_id = handle.thread().id();
        info!(?thread_id, "coordination thread started");

        Ok(Self {
            dispatcher,
            thread_id,
            handle: Some(handle),
        })
    }

    /// A producer handle bound to this coordination thread.
    #[must_use]
    pub fn dispatcher(&self) -> ResultDispatcher {
        self.dispatcher.clone()
    }

    /// Identifier of the coordination thread.
    #[must_use]
    pub fn thread_id(&self) -> ThreadId {
        self.thread_id
    }

    /// Apply everything already queued, then stop and join the thread.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Dispatch` if the coordination thread panicked.
    pub fn shutdown(mut self) -> Result<()> {
        self.dispatcher.request_shutdown();
        match self.handle.take() {
            Some(handle) => handle
                .join()
                .map_err(|_| AppError::Dispatch("coordination thread panicked".into())),
            None => Ok(()),
        }
    }
}

impl Drop for Coordinator {
    fn drop(&mut self) {
        if self.handle.take().is_some() {
            warn!("coordinator dropped without shutdown; thread detached");
            self.dispatcher.request_shutdown();
        }
    }
}
