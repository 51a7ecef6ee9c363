//! Provider-mutation messages sent by an extension host to the core.

use serde::{Deserialize, Serialize};

use super::scm::{
    GroupFeatures, GroupHandle, GroupSplices, SourceControlFeatures, SourceControlHandle,
};

/// One protocol verb together with its arguments.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "method", rename_all = "camelCase")]
pub enum ScmMessage {
    /// Create a provider for `handle`.
    #[serde(rename_all = "camelCase")]
    RegisterSourceControl {
        /// Transport handle chosen by the host.
        handle: SourceControlHandle,
        /// Extension-level identifier (e.g. "git"), used as the context value.
        id: String,
        /// Display label.
        label: String,
        /// Root of the repository, if the provider has one.
        #[serde(default)]
        root_uri: Option<String>,
    },
    /// Merge new provider features.
    #[serde(rename_all = "camelCase")]
    UpdateSourceControl {
        /// Target source control.
        handle: SourceControlHandle,
        /// Fields to overwrite.
        features: SourceControlFeatures,
    },
    /// Dispose the provider and its repository.
    #[serde(rename_all = "camelCase")]
    UnregisterSourceControl {
        /// Target source control.
        handle: SourceControlHandle,
    },
    /// Append a new resource group.
    #[serde(rename_all = "camelCase")]
    RegisterGroup {
        /// Owning source control.
        source_control: SourceControlHandle,
        /// New group handle.
        group: GroupHandle,
        /// Group identifier.
        id: String,
        /// Display label.
        label: String,
    },
    /// Merge new group features.
    #[serde(rename_all = "camelCase")]
    UpdateGroup {
        /// Owning source control.
        source_control: SourceControlHandle,
        /// Target group.
        group: GroupHandle,
        /// Fields to overwrite.
        features: GroupFeatures,
    },
    /// Rename a group.
    #[serde(rename_all = "camelCase")]
    UpdateGroupLabel {
        /// Owning source control.
        source_control: SourceControlHandle,
        /// Target group.
        group: GroupHandle,
        /// New label.
        label: String,
    },
    /// Apply batched resource splices.
    #[serde(rename_all = "camelCase")]
    SpliceResourceStates {
        /// Owning source control.
        source_control: SourceControlHandle,
        /// Splices per group.
        splices: Vec<GroupSplices>,
    },
    /// Remove a group.
    #[serde(rename_all = "camelCase")]
    UnregisterGroup {
        /// Owning source control.
        source_control: SourceControlHandle,
        /// Target group.
        group: GroupHandle,
    },
    /// Replace the input box text.
    #[serde(rename_all = "camelCase")]
    SetInputBoxValue {
        /// Owning source control.
        source_control: SourceControlHandle,
        /// New value.
        value: String,
    },
}

impl ScmMessage {
    /// The source control this message addresses.
    pub const fn source_control(&self) -> SourceControlHandle {
        match self {
            Self::RegisterSourceControl { handle, .. }
            | Self::UpdateSourceControl { handle, .. }
            | Self::UnregisterSourceControl { handle } => *handle,
            Self::RegisterGroup { source_control, .. }
            | Self::UpdateGroup { source_control, .. }
            | Self::UpdateGroupLabel { source_control, .. }
            | Self::SpliceResourceStates { source_control, .. }
            | Self::UnregisterGroup { source_control, .. }
            | Self::SetInputBoxValue { source_control, .. } => *source_control,
        }
    }
}
