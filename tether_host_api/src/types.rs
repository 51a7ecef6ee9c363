use std::fmt;

use serde::{Deserialize, Serialize};

/// Listener invoked when a branch's thread list changes.
pub type ThreadsListener = Box<dyn Fn() + Send + Sync>;

/// Options forwarded with a provider command.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct CommandOptions {
    /// Text written to the command's standard input.
    #[serde(default)]
    pub stdin: Option<String>,
}

impl CommandOptions {
    /// Options carrying a stdin payload.
    #[must_use]
    pub fn with_stdin(stdin: impl Into<String>) -> Self {
        Self {
            stdin: Some(stdin.into()),
        }
    }
}

/// Handle that releases a registration when disposed or dropped.
#[must_use = "dropping a Disposable releases its registration immediately"]
pub struct Disposable {
    release: Option<Box<dyn FnOnce() + Send>>,
}

impl Disposable {
    /// Wrap a release callback.
    pub fn new(release: impl FnOnce() + Send + 'static) -> Self {
        Self {
            release: Some(Box::new(release)),
        }
    }

    /// A handle with nothing to release.
    pub const fn noop() -> Self {
        Self { release: None }
    }

    /// Release now. Further calls and the eventual drop do nothing.
    pub fn dispose(&mut self) {
        if let Some(release) = self.release.take() {
            release();
        }
    }

    /// Whether the registration is still held.
    pub const fn is_active(&self) -> bool {
        self.release.is_some()
    }
}

impl Drop for Disposable {
    fn drop(&mut self) {
        self.dispose();
    }
}

impl fmt::Debug for Disposable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Disposable")
            .field("active", &self.is_active())
            .finish()
    }
}

/// Errors surfaced by extension hosts.
#[derive(Debug, thiserror::Error)]
pub enum HostError {
    /// No source control with this handle is known to the host.
    #[error("source control {handle} is not registered with the host")]
    UnknownSourceControl {
        /// Handle that failed to resolve.
        handle: u32,
    },
    /// The command ran and exited unsuccessfully.
    #[error("command failed with status {status}: {stderr}")]
    CommandFailed {
        /// Exit code, or "terminated" when killed by a signal.
        status: String,
        /// Trimmed standard error.
        stderr: String,
    },
    /// The command did not finish in time.
    #[error("command timed out after {seconds}s")]
    Timeout {
        /// Configured limit.
        seconds: u64,
    },
    /// Generic failure surfaced by the host.
    #[error("{message}")]
    Failure {
        /// Human-readable error message.
        message: String,
    },
}

impl HostError {
    /// Helper to construct a failure from any displayable message.
    #[must_use]
    pub fn message(message: impl Into<String>) -> Self {
        Self::Failure {
            message: message.into(),
        }
    }
}

/// Convenience result alias for host operations.
pub type HostResult<T> = std::result::Result<T, HostError>;
