//! Error types shared across the crate.

use std::fmt::{Display, Formatter};

/// Shared crate result type.
pub type Result<T> = std::result::Result<T, AppError>;

/// Error enumeration covering the infrastructure failure modes.
///
/// Failures of the wrapped command itself are not errors: they are recorded
/// on the session as a terminal `Failed` state with a return code.
#[derive(Debug)]
pub enum AppError {
    /// Configuration parsing or validation failure.
    Config(String),
    /// File-system or process I/O failure.
    Io(String),
    /// Executor contract violation (illegal state transition, spawn failure).
    Executor(String),
    /// Named pipe creation, removal, or copy failure.
    Pipe(String),
    /// Coordination thread is gone or refused a delivery.
    Dispatch(String),
    /// Requested entity does not exist.
    NotFound(String),
    /// Worker pool could not be built or has shut down.
    Pool(String),
}

impl Display for AppError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Config(msg) => write!(f, "config: {msg}"),
            Self::Io(msg) => write!(f, "io: {msg}"),
            Self::Executor(msg) => write!(f, "executor: {msg}"),
            Self::Pipe(msg) => write!(f, "pipe: {msg}"),
            Self::Dispatch(msg) => write!(f, "dispatch: {msg}"),
            Self::NotFound(msg) => write!(f, "not found: {msg}"),
            Self::Pool(msg) => write!(f, "pool: {msg}"),
        }
    }
}

impl std::error::Error for AppError {}

impl From<toml::de::Error> for AppError {
    fn from(err: toml::de::Error) -> Self {
        Self::Config(format!("invalid config: {err}"))
    }
}

impl From<std::io::Error> for AppError {
    fn from(err: std::io::Error) -> Self {
        Self::Io(err.to_string())
    }
}

impl From<serde_json::Error> for AppError {
    fn from(err: serde_json::Error) -> Self {
        Self::Executor(format!("invalid probe output: {err}"))
    }
}
