//! Units of work scheduled onto worker lanes.
//!
//! - [`AsyncExecuteTask`] runs a session and notifies completion callbacks.
//! - [`SessionExecuteTask`] runs a session and acknowledges a reply channel.
//! - [`WriteToPipeTask`] copies a file into a named pipe and replies with
//!   the copy's exit code.

pub mod async_execute;
pub mod session_execute;
pub mod write_to_pipe;

pub use async_execute::{AsyncExecuteTask, NotifyReport};
pub use session_execute::SessionExecuteTask;
pub use write_to_pipe::WriteToPipeTask;
