#![forbid(unsafe_code)]

pub mod args;
pub mod bridge;
pub mod callbacks;
pub mod config;
pub mod dispatch;
pub mod errors;
pub mod executor;
pub mod history;
pub mod models;
pub mod pipes;
pub mod pool;
pub mod tasks;

pub use bridge::SessionBridge;
pub use config::GlobalConfig;
pub use errors::{AppError, Result};
