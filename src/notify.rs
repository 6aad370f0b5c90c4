//! Transient user notifications.

use std::fmt;

/// Severity of a notification.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Level {
    /// Neutral progress information.
    Info,
    /// An operation completed.
    Success,
    /// Nothing failed, but the user should look.
    Warning,
    /// An operation failed.
    Error,
}

impl fmt::Display for Level {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Info => "info",
            Self::Success => "success",
            Self::Warning => "warning",
            Self::Error => "error",
        })
    }
}

/// Receives notifications raised by long-running operations.
pub trait Notifier: Send + Sync {
    /// Shows a message.
    fn notify(&self, level: Level, message: &str);

    /// Shows an informational message.
    fn info(&self, message: &str) {
        self.notify(Level::Info, message);
    }

    /// Shows a success message.
    fn success(&self, message: &str) {
        self.notify(Level::Success, message);
    }

    /// Shows a warning.
    fn warning(&self, message: &str) {
        self.notify(Level::Warning, message);
    }

    /// Shows an error.
    fn error(&self, message: &str) {
        self.notify(Level::Error, message);
    }
}
