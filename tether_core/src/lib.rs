//! Core library for Tether's source-control and code-discussion workflow.
//!
//! The crate is layered around three primary responsibilities:
//! - the SCM model fed by out-of-process extension hosts
//! - keeping discussion anchors stable across revisions
//! - git queries issued through the providers' command channel

#![warn(
    clippy::all,
    clippy::cargo,
    clippy::nursery,
    clippy::pedantic,
    missing_docs
)]
#![cfg_attr(
    not(test),
    deny(
        clippy::dbg_macro,
        clippy::expect_used,
        clippy::panic,
        clippy::print_stderr,
        clippy::todo,
        clippy::unwrap_used
    )
)]

/// Runtime configuration.
pub mod config;
/// Off-thread transformation of anchor ranges.
pub mod diff_worker;
/// Synchronous publish/subscribe primitives.
pub mod event;
/// Git queries layered on provider command execution.
pub mod git;
/// Local repository discovery backed by libgit2.
pub mod repository;
/// Source control model, service and extension-host bridge.
pub mod scm;
/// Tracing subscriber setup.
pub mod telemetry;

pub use tether_api::*;

/// Common result type for the crate.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors surfaced by the core library.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// A provider with the same id is already registered.
    #[error("provider {id} is already registered")]
    DuplicateProvider {
        /// Conflicting provider id.
        id: String,
    },
    /// A group with the same handle already exists in the provider.
    #[error("group {handle} is already registered")]
    DuplicateGroup {
        /// Conflicting handle.
        handle: GroupHandle,
    },
    /// Extension hosts may not use handles reserved for synthesized groups.
    #[error("group handle {handle} is reserved")]
    ReservedGroupHandle {
        /// Rejected handle.
        handle: GroupHandle,
    },
    /// A splice referenced a group the provider does not know.
    #[error("splice references unknown group {handle}")]
    UnknownGroup {
        /// Unknown handle.
        handle: GroupHandle,
    },
    /// The remote URL cannot be reduced to a canonical `host/path` form.
    #[error("unsupported remote url format: {url}")]
    UnsupportedRemoteUrl {
        /// URL as reported by git.
        url: String,
    },
    /// The extension host failed to run a command.
    #[error("host error: {source}")]
    Host {
        /// Error reported by the host.
        #[from]
        source: tether_host_api::HostError,
    },
    /// The provider was disposed while the call was outstanding.
    #[error("provider {id} has been disposed")]
    ProviderDisposed {
        /// Id of the disposed provider.
        id: String,
    },
    /// The diff worker thread is gone.
    #[error("diff worker is not running")]
    DiffWorkerUnavailable,
    /// A worker thread could not be started.
    #[error("failed to spawn worker thread {name}: {source}")]
    WorkerSpawn {
        /// Thread name.
        name: String,
        /// OS error.
        #[source]
        source: std::io::Error,
    },
    /// Underlying git operation failed.
    #[error("git error: {source}")]
    Git {
        /// Original libgit2 error.
        #[from]
        source: git2::Error,
    },
    /// Provided path does not correspond to a git repository.
    #[error("path does not reference a git repository: {path}")]
    NotARepository {
        /// Path that failed to resolve to a repository.
        path: String,
    },
    /// Bare repositories are unsupported.
    #[error("repository at {path} is bare and unsupported")]
    BareRepository {
        /// Path of the repository lacking a working tree.
        path: String,
    },
    /// Filesystem interaction failed.
    #[error("failed to access {path}: {source}")]
    Io {
        /// Filesystem path involved in the failed operation.
        path: String,
        /// Source I/O error returned by the standard library.
        #[source]
        source: std::io::Error,
    },
    /// Configuration could not be parsed.
    #[error("invalid configuration: {message}")]
    Config {
        /// Parser message.
        message: String,
    },
}
