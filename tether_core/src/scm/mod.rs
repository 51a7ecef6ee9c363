//! Source control model, service and extension-host bridge.
//!
//! Providers are fed by protocol messages from an extension host and expose
//! their state through the [`ScmProvider`] capability interface. The
//! [`ScmService`] owns the resulting repositories and [`MainThreadScm`] routes
//! handle-addressed messages to them.

mod bridge;
mod comments;
mod executor;
mod group;
mod local;
mod provider;
mod resources;
mod service;

use futures::future::BoxFuture;
use serde::Serialize;
use tether_api::{
    GroupFeatures, GroupHandle, GroupSplices, SourceControlFeatures, SourceControlHandle,
};
use tether_host_api::CommandOptions;

use crate::event::Emitter;
use crate::Result;

pub use bridge::MainThreadScm;
pub use comments::{CommentsScmProvider, CommentsSignal, COMMENTS_GROUP_HANDLE};
pub use executor::CommandExecutor;
pub use group::ResourceGroup;
pub use local::{LocalSourceControl, INDEX_GROUP, WORKING_TREE_GROUP};
pub use provider::MainThreadScmProvider;
pub use resources::{Resource, ResourceCollection, SpliceEvent};
pub use service::{InputBox, Repository, RepositoryId, ScmService};

/// What changed on a provider.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProviderEvent {
    /// Source control features were merged.
    Features,
    /// A group was added, removed or reordered.
    Groups,
    /// Resources of at least one group were spliced.
    Resources,
}

/// Capability interface shared by the plain and comments-augmented providers.
///
/// Mutators follow the protocol's tolerance rules: updates addressed to an
/// unknown group do nothing and fire nothing, while splices and registrations
/// report protocol desync as errors.
pub trait ScmProvider: Send {
    /// Transport handle assigned by the extension host.
    fn handle(&self) -> SourceControlHandle;

    /// Unique provider id within the service.
    fn id(&self) -> &str;

    /// Display label.
    fn label(&self) -> &str;

    /// Extension-level id used to select UI behavior.
    fn context_value(&self) -> &str;

    /// Repository root, when the provider has one.
    fn root_uri(&self) -> Option<&str>;

    /// Merged source control features.
    fn features(&self) -> &SourceControlFeatures;

    /// All groups in display order.
    fn groups(&self) -> Vec<&ResourceGroup>;

    /// Group registered under `handle`.
    fn group(&self, handle: GroupHandle) -> Option<&ResourceGroup>;

    /// Groups currently shown: non-empty ones plus empty ones that do not hide.
    fn resources(&self) -> Vec<&ResourceGroup> {
        self.groups()
            .into_iter()
            .filter(|group| group.is_visible())
            .collect()
    }

    /// Merge `features` into the provider.
    fn update_source_control(&mut self, features: SourceControlFeatures);

    /// Append a new empty group.
    ///
    /// # Errors
    ///
    /// Fails when `handle` is already registered or reserved.
    fn register_group(&mut self, handle: GroupHandle, id: String, label: String) -> Result<()>;

    /// Merge group features; unknown handles are ignored.
    fn update_group(&mut self, handle: GroupHandle, features: GroupFeatures);

    /// Rename a group; unknown handles are ignored.
    fn update_group_label(&mut self, handle: GroupHandle, label: String);

    /// Apply per-group splice batches.
    ///
    /// # Errors
    ///
    /// Stops at the first unknown group. Groups processed before it keep their
    /// new resources.
    fn splice_group_resource_states(&mut self, splices: Vec<GroupSplices>) -> Result<()>;

    /// Remove a group; unknown handles are ignored.
    fn unregister_group(&mut self, handle: GroupHandle);

    /// Detached handle for running commands through the extension host.
    fn command_executor(&self) -> CommandExecutor;

    /// Run a provider command and resolve to its stdout.
    fn execute_command(
        &self,
        args: Vec<String>,
        options: CommandOptions,
    ) -> BoxFuture<'static, Result<String>> {
        let executor = self.command_executor();
        Box::pin(async move { executor.execute(args, options).await })
    }

    /// Resolve the pre-change version of `uri`, or `None` without quick diff.
    fn original_resource(&self, uri: String) -> BoxFuture<'static, Result<Option<String>>>;

    /// Provider change notifications.
    fn on_did_change(&self) -> &Emitter<ProviderEvent>;

    /// Thread data for `generation` changed; providers without discussions ignore it.
    fn threads_changed(&mut self, _generation: u64) {}

    /// Release listeners and mark outstanding command futures as stale.
    fn dispose(&mut self);

    /// Serializable view of the provider state.
    fn snapshot(&self) -> ProviderSnapshot {
        ProviderSnapshot {
            handle: self.handle(),
            id: self.id().to_owned(),
            label: self.label().to_owned(),
            context_value: self.context_value().to_owned(),
            root_uri: self.root_uri().map(ToOwned::to_owned),
            features: self.features().clone(),
            groups: self.groups().into_iter().map(GroupSnapshot::from).collect(),
        }
    }
}

/// Point-in-time view of a provider.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProviderSnapshot {
    /// Transport handle.
    pub handle: SourceControlHandle,
    /// Provider id.
    pub id: String,
    /// Display label.
    pub label: String,
    /// Context value.
    pub context_value: String,
    /// Root URI.
    pub root_uri: Option<String>,
    /// Merged features.
    pub features: SourceControlFeatures,
    /// Groups in display order.
    pub groups: Vec<GroupSnapshot>,
}

/// Point-in-time view of a group.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GroupSnapshot {
    /// Group handle.
    pub handle: GroupHandle,
    /// Group id.
    pub id: String,
    /// Display label.
    pub label: String,
    /// Whether the group is listed in the provider's visible resources.
    pub visible: bool,
    /// Resource URIs in order.
    pub resources: Vec<String>,
}

impl From<&ResourceGroup> for GroupSnapshot {
    fn from(group: &ResourceGroup) -> Self {
        Self {
            handle: group.handle(),
            id: group.id().to_owned(),
            label: group.label().to_owned(),
            visible: group.is_visible(),
            resources: group
                .resources()
                .iter()
                .map(|resource| resource.source_uri.clone())
                .collect(),
        }
    }
}
