//! Session log entries and the redirection policy that decides whether a
//! log line is also written through `tracing`.

use serde::{Deserialize, Serialize};

use super::session::SessionId;

/// Origin or severity of a session log line.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum LogLevel {
    /// Line read from the command's standard output.
    Stdout,
    /// Line read from the command's standard error.
    Stderr,
    /// Informational note added by the executor.
    Info,
    /// Warning added by the executor.
    Warning,
    /// Error added by the executor.
    Error,
}

/// One line of session output.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Log {
    /// Session that produced the line.
    pub session_id: SessionId,
    /// Line origin.
    pub level: LogLevel,
    /// Line text without its `\n` or `\r` terminator.
    pub message: String,
}

/// Policy deciding whether session logs are also printed through `tracing`.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum LogRedirectionStrategy {
    /// Print every line.
    AlwaysPrintLogs,
    /// Print only when neither a session nor a global log callback exists.
    #[default]
    PrintLogsWhenNoCallbacksDefined,
    /// Print when no global log callback exists.
    PrintLogsWhenGlobalCallbackNotDefined,
    /// Print when the session has no log callback.
    PrintLogsWhenSessionCallbackNotDefined,
    /// Never print.
    NeverPrintLogs,
}

impl LogRedirectionStrategy {
    /// Decide whether a line should be printed given which log callbacks exist.
    #[must_use]
    pub fn should_print(self, session_callback: bool, global_callback: bool) -> bool {
        match self {
            Self::AlwaysPrintLogs => true,
            Self::PrintLogsWhenNoCallbacksDefined => !session_callback && !global_callback,
            Self::PrintLogsWhenGlobalCallbackNotDefined => !global_callback,
            Self::PrintLogsWhenSessionCallbackNotDefined => !session_callback,
            Self::NeverPrintLogs => false,
        }
    }
}
