//! Reply marshalling onto the coordination thread.
//!
//! Reply channels and event sinks belong to one coordination thread and must
//! not be touched from worker lanes. Producers hold a cheap, cloneable
//! [`ResultDispatcher`] that enqueues deliveries on an unbounded channel and
//! returns immediately; the coordination thread drains the queue through a
//! [`DeliveryQueue`] and applies each delivery in order.
//!
//! Deliveries from one producer thread are applied in the order they were
//! enqueued. Deliveries from different producer threads have no relative
//! order.

pub mod coordinator;

use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::thread::{self, ThreadId};

use serde_json::Value;
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TryRecvError;
use tracing::{debug, error, warn};

use crate::callbacks::panic_message;

pub use coordinator::Coordinator;

/// Error code delivered when copying into a named pipe fails.
pub const WRITE_TO_PIPE_FAILED: &str = "WRITE_TO_PIPE_FAILED";

/// Single-use handle for sending one result back to a caller.
///
/// Every method consumes the channel, so a given channel can answer at most
/// once. Implementations are only ever invoked on the coordination thread.
pub trait ReplyChannel: Send {
    /// Answer with a success value.
    fn success(self: Box<Self>, value: Value);

    /// Answer with an error code, message and optional structured details.
    fn error(self: Box<Self>, code: &str, message: &str, details: Option<Value>);

    /// Answer that the requested call is not implemented.
    fn not_implemented(self: Box<Self>);
}

/// Multi-use sink for streaming events to a caller.
pub trait EventSink: Send + Sync {
    /// Emit one event.
    fn success(&self, value: Value);
}

/// Boxed reply channel as passed between layers.
pub type Reply = Box<dyn ReplyChannel>;

enum Delivery {
    Success {
        channel: Option<Reply>,
        value: Value,
    },
    Error {
        channel: Option<Reply>,
        code: String,
        message: String,
        details: Option<Value>,
    },
    NotImplemented {
        channel: Option<Reply>,
    },
    Event {
        sink: Option<Arc<dyn EventSink>>,
        value: Value,
    },
    Shutdown,
}

/// Producer side: enqueues deliveries for the coordination thread.
#[derive(Clone)]
pub struct ResultDispatcher {
    tx: mpsc::UnboundedSender<Delivery>,
}

/// Consumer side: owned by the coordination thread.
pub struct DeliveryQueue {
    rx: mpsc::UnboundedReceiver<Delivery>,
    owner: Option<ThreadId>,
}

/// Create a connected dispatcher/queue pair.
///
/// The queue may be driven by the host's own coordination thread via
/// [`DeliveryQueue::run`] or [`DeliveryQueue::drain`], or handed to a
/// dedicated [`Coordinator`].
#[must_use]
pub fn channel() -> (ResultDispatcher, DeliveryQueue) {
    let (tx, rx) = mpsc::unbounded_channel();
    (ResultDispatcher { tx }, DeliveryQueue { rx, owner: None })
}

impl ResultDispatcher {
    /// Schedule a success reply on the coordination thread.
    ///
    /// An absent `channel` is not an error: the coordination thread logs a
    /// warning instead of replying.
    pub fn deliver_success(&self, channel: Option<Reply>, value: Value) {
        self.enqueue(Delivery::Success { channel, value });
    }

    /// Schedule an error reply on the coordination thread.
    pub fn deliver_error(
        &self,
        channel: Option<Reply>,
        code: &str,
        message: &str,
        details: Option<Value>,
    ) {
        self.enqueue(Delivery::Error {
            channel,
            code: code.to_owned(),
            message: message.to_owned(),
            details,
        });
    }

    /// Schedule a not-implemented reply on the coordination thread.
    pub fn deliver_not_implemented(&self, channel: Option<Reply>) {
        self.enqueue(Delivery::NotImplemented { channel });
    }

    /// Schedule an event on the coordination thread.
    pub fn deliver_event(&self, sink: Option<Arc<dyn EventSink>>, value: Value) {
        self.enqueue(Delivery::Event { sink, value });
    }

    /// Ask the coordination thread to stop after applying everything
    /// enqueued before this call.
    pub fn request_shutdown(&self) {
        self.enqueue(Delivery::Shutdown);
    }

    /// Whether the coordination side is still accepting deliveries.
    #[must_use]
    pub fn is_open(&self) -> bool {
        !self.tx.is_closed()
    }

    fn enqueue(&self, delivery: Delivery) {
        if self.tx.send(delivery).is_err() {
            warn!("coordination queue closed; delivery dropped");
        }
    }
}

impl DeliveryQueue {
    /// Block the current thread applying deliveries until shutdown is
    /// requested or every dispatcher is dropped.
    ///
    /// The calling thread becomes the coordination thread.
    pub fn run(mut self) {
        self.owner = Some(thread::current().id());
        while let Some(delivery) = self.rx.blocking_recv() {
            if !apply(delivery) {
                break;
            }
        }
        self.rx.close();
        debug!("delivery queue stopped");
    }

    /// Apply every delivery currently queued without blocking.
    ///
    /// Returns the number of deliveries applied. For hosts that pump the
    /// queue from their own event loop.
    pub fn drain(&mut self) -> usize {
        let current = thread::current().id();
        if *self.owner.get_or_insert(current) != current {
            error!("delivery queue drained from a second thread");
        }

        let mut applied = 0;
        loop {
            match self.rx.try_recv() {
                Ok(delivery) => {
                    if !apply(delivery) {
                        self.rx.close();
                        break;
                    }
                    applied += 1;
                }
                Err(TryRecvError::Empty | TryRecvError::Disconnected) => break,
            }
        }
        applied
    }
}

/// Apply one delivery. Returns `false` on a shutdown request.
fn apply(delivery: Delivery) -> bool {
    if matches!(delivery, Delivery::Shutdown) {
        return false;
    }

    let result = panic::catch_unwind(AssertUnwindSafe(|| match delivery {
        Delivery::Success {
            channel: Some(channel),
            value,
        } => channel.success(value),
        Delivery::Success {
            channel: None,
            value,
        } => {
            warn!(%value, "can not send successful response on a null method call result");
        }
        Delivery::Error {
            channel: Some(channel),
            code,
            message,
            details,
        } => channel.error(&code, &message, details),
        Delivery::Error {
            channel: None,
            code,
            message,
            ..
        } => {
            warn!(%code, %message, "can not send failure response on a null method call result");
        }
        Delivery::NotImplemented {
            channel: Some(channel),
        } => channel.not_implemented(),
        Delivery::NotImplemented { channel: None } => {
            warn!("can not send not implemented response on a null method call result");
        }
        Delivery::Event {
            sink: Some(sink),
            value,
        } => sink.success(value),
        Delivery::Event { sink: None, value } => {
            warn!(%value, "can not send event on a null event sink");
        }
        Delivery::Shutdown => {}
    }));

    match result {
        Ok(()) => {}
        Err(payload) => {
            error!(
                panic = panic_message(payload.as_ref()),
                "reply channel panicked during delivery"
            );
        }
    }
    true
}
