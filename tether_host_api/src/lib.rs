mod types;

use std::sync::Arc;

use async_trait::async_trait;
use tether_api::{SourceControlHandle, Thread};

pub use types::{CommandOptions, Disposable, HostError, HostResult, ThreadsListener};

/// Operations the core forwards to the extension host that owns a source control.
///
/// Every call is addressed by the transport handle the host assigned when it
/// registered the source control.
#[async_trait]
pub trait ExtHostScm: Send + Sync {
    /// Run a provider command (e.g. a git invocation) and return its stdout.
    ///
    /// # Errors
    ///
    /// Implementors surface transport failures and non-zero exits untouched.
    async fn execute_command(
        &self,
        source_control: SourceControlHandle,
        args: Vec<String>,
        options: CommandOptions,
    ) -> HostResult<String>;

    /// Resolve the URI of the pre-change content of `uri`, if any.
    ///
    /// # Errors
    ///
    /// Returns host-defined errors when resolution fails.
    async fn provide_original_resource(
        &self,
        source_control: SourceControlHandle,
        uri: String,
    ) -> HostResult<Option<String>>;

    /// Echo of the input box value after it changed in the core.
    fn input_box_value_changed(&self, source_control: SourceControlHandle, value: &str);
}

/// Source of discussion threads keyed by repository root and branch.
pub trait CommentsSource: Send + Sync {
    /// Obtain the (possibly shared) thread collection for `branch` of `root_uri`.
    fn branch_comments(&self, root_uri: &str, branch: &str) -> Arc<dyn BranchComments>;
}

/// Live collection of threads for one branch.
pub trait BranchComments: Send + Sync {
    /// Current threads.
    fn threads(&self) -> Vec<Thread>;

    /// Ask the backend to reload; listeners fire once new data is in place.
    fn refresh(&self);

    /// Register a listener invoked whenever the thread list changes.
    fn on_did_change_threads(&self, listener: ThreadsListener) -> Disposable;
}
