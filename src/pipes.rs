//! Named pipe creation and removal.

use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};

use tracing::{debug, info};

use crate::{AppError, Result};

static NEXT_PIPE_INDEX: AtomicU64 = AtomicU64::new(1);

/// Create a new FIFO named `fk_pipe_<n>` inside `directory`.
///
/// `directory` is created if missing. Pipe numbers are unique for the
/// lifetime of the process.
///
/// # Errors
///
/// Returns `AppError::Pipe` if the directory or FIFO cannot be created, or
/// on platforms without named pipes.
pub fn register_new_pipe(directory: &Path) -> Result<PathBuf> {
    fs::create_dir_all(directory).map_err(|err| {
        AppError::Pipe(format!(
            "failed to create pipe directory {}: {err}",
            directory.display()
        ))
    })?;

    let index = NEXT_PIPE_INDEX.fetch_add(1, Ordering::Relaxed);
    let path = directory.join(format!("fk_pipe_{index}"));
    make_fifo(&path)?;

    info!(pipe = %path.display(), "named pipe created");
    Ok(path)
}

/// Remove a named pipe.
///
/// # Errors
///
/// Returns `AppError::NotFound` if no pipe exists at `path`, or
/// `AppError::Pipe` if it cannot be removed.
pub fn close_pipe(path: &Path) -> Result<()> {
    fs::remove_file(path).map_err(|err| match err.kind() {
        ErrorKind::NotFound => AppError::NotFound(format!("pipe {}", path.display())),
        _ => AppError::Pipe(format!("failed to remove {}: {err}", path.display())),
    })?;
    debug!(pipe = %path.display(), "named pipe removed");
    Ok(())
}

#[cfg(unix)]
fn make_fifo(path: &Path) -> Result<()> {
    use nix::sys::stat::Mode;

    nix::unistd::mkfifo(path, Mode::S_IRWXU)
        .map_err(|err| AppError::Pipe(format!("mkfifo {} failed: {err}", path.display())))
}

#[cfg(not(unix))]
fn make_fifo(path: &Path) -> Result<()> {
    Err(AppError::Pipe(format!(
        "named pipes are not supported on this platform: {}",
        path.display()
    )))
}
