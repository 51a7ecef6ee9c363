use std::path::Path;

use tether_api::{
    GroupFeatures, GroupHandle, GroupSplices, RawResourceState, RawSplice, ResourceHandle,
    ScmMessage, SourceControlFeatures, SourceControlHandle,
};
use tracing::debug;

use super::MainThreadScm;
use crate::repository::{Repository, StatusArea, StatusEntry};
use crate::Result;

/// Group holding staged changes.
pub const INDEX_GROUP: GroupHandle = GroupHandle(0);
/// Group holding unstaged and untracked changes.
pub const WORKING_TREE_GROUP: GroupHandle = GroupHandle(1);

/// Publishes a repository on disk as a `git` source control.
///
/// Everything goes through [`MainThreadScm::dispatch`] with the same messages
/// an extension host would send, so the local and remote paths share one model.
#[derive(Debug)]
pub struct LocalSourceControl {
    handle: SourceControlHandle,
    repository: Repository,
    root_uri: String,
}

impl LocalSourceControl {
    /// Discover the repository containing `path`.
    ///
    /// # Errors
    ///
    /// Fails when `path` is not inside a non-bare git repository.
    pub fn open(handle: SourceControlHandle, path: impl AsRef<Path>) -> Result<Self> {
        let repository = Repository::open(path)?;
        let root_uri = repository.root_uri();
        Ok(Self {
            handle,
            repository,
            root_uri,
        })
    }

    /// Handle the source control is registered under.
    #[must_use]
    pub const fn handle(&self) -> SourceControlHandle {
        self.handle
    }

    /// Root URI of the repository.
    #[must_use]
    pub fn root_uri(&self) -> &str {
        &self.root_uri
    }

    /// The underlying repository.
    #[must_use]
    pub const fn repository(&self) -> &Repository {
        &self.repository
    }

    /// Register the source control with its two groups and publish the first status.
    ///
    /// # Errors
    ///
    /// Fails when the handle is already registered or status cannot be read.
    pub fn publish(&self, bridge: &mut MainThreadScm) -> Result<()> {
        let registration = [
            ScmMessage::RegisterSourceControl {
                handle: self.handle,
                id: "git".into(),
                label: "Git".into(),
                root_uri: Some(self.root_uri.clone()),
            },
            ScmMessage::RegisterGroup {
                source_control: self.handle,
                group: INDEX_GROUP,
                id: "index".into(),
                label: "Staged Changes".into(),
            },
            ScmMessage::RegisterGroup {
                source_control: self.handle,
                group: WORKING_TREE_GROUP,
                id: "workingTree".into(),
                label: "Changes".into(),
            },
            ScmMessage::UpdateGroup {
                source_control: self.handle,
                group: INDEX_GROUP,
                features: GroupFeatures {
                    hide_when_empty: Some(true),
                },
            },
        ];
        for message in registration {
            bridge.dispatch(message)?;
        }
        self.refresh(bridge)
    }

    /// Replace both groups with the current status and update count and revision.
    ///
    /// # Errors
    ///
    /// Propagates libgit2 failures while reading status or HEAD.
    pub fn refresh(&self, bridge: &mut MainThreadScm) -> Result<()> {
        let entries = self.repository.status()?;
        let revision = self.repository.head_revision()?;

        let splices = [INDEX_GROUP, WORKING_TREE_GROUP]
            .into_iter()
            .map(|group| {
                let area = if group == INDEX_GROUP {
                    StatusArea::Index
                } else {
                    StatusArea::WorkingTree
                };
                let states: Vec<RawResourceState> = entries
                    .iter()
                    .filter(|entry| entry.area == area)
                    .enumerate()
                    .map(|(index, entry)| self.resource_state(index, entry))
                    .collect();
                let existing = bridge
                    .provider(self.handle)
                    .and_then(|provider| provider.group(group))
                    .map_or(0, |group| group.resources().len());
                GroupSplices(
                    group,
                    vec![RawSplice(0, u32::try_from(existing).unwrap_or(u32::MAX), states)],
                )
            })
            .collect();

        debug!(source_control = %self.handle, changes = entries.len(), "refreshing local status");
        bridge.dispatch(ScmMessage::SpliceResourceStates {
            source_control: self.handle,
            splices,
        })?;
        bridge.dispatch(ScmMessage::UpdateSourceControl {
            handle: self.handle,
            features: SourceControlFeatures {
                count: Some(u32::try_from(entries.len()).unwrap_or(u32::MAX)),
                revision,
                ..SourceControlFeatures::default()
            },
        })
    }

    fn resource_state(&self, index: usize, entry: &StatusEntry) -> RawResourceState {
        RawResourceState(
            ResourceHandle(u32::try_from(index).unwrap_or(u32::MAX)),
            format!("{}/{}", self.root_uri, entry.path),
            Vec::new(),
            entry.kind.label().to_owned(),
            matches!(entry.kind, crate::repository::ChangeKind::Deleted),
            matches!(entry.kind, crate::repository::ChangeKind::Untracked),
            Some(entry.kind.color().to_owned()),
        )
    }
}
