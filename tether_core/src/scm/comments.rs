use std::sync::Arc;

use futures::future::BoxFuture;
use tether_api::{
    GroupFeatures, GroupHandle, GroupSplices, RawResourceState, RawSplice, ResourceHandle,
    SourceControlFeatures, SourceControlHandle, Thread,
};
use tether_host_api::{BranchComments, CommentsSource};
use tokio::sync::mpsc::UnboundedSender;
use tracing::{debug, warn};

use super::{
    CommandExecutor, MainThreadScmProvider, ProviderEvent, ResourceGroup, ScmProvider,
};
use crate::config::CoreConfig;
use crate::event::{Emitter, Subscription};
use crate::{Error, Result};

/// Handle of the synthesized discussions group. Extension handles are never negative.
pub const COMMENTS_GROUP_HANDLE: GroupHandle = GroupHandle(-1);

/// Notification that the threads behind a provider's discussions group changed.
///
/// Branch-comment collections call back from arbitrary threads, so the
/// provider does not re-render from the callback. The bridge receives the
/// signal on its own task and hands it back through
/// [`ScmProvider::threads_changed`]; signals from a superseded branch carry an
/// old generation and are dropped there.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CommentsSignal {
    /// Provider whose threads changed.
    pub source_control: SourceControlHandle,
    /// Branch generation the subscription was created for.
    pub generation: u64,
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum BranchState {
    NoBranch,
    HasBranch(String),
}

struct Discussions {
    source: Arc<dyn CommentsSource>,
    signals: UnboundedSender<CommentsSignal>,
    branch: BranchState,
    generation: u64,
    comments: Option<Arc<dyn BranchComments>>,
    subscription: Option<Subscription>,
}

/// Provider that appends a discussions group listing the current branch's threads.
///
/// The group only exists when the provider's context value matches
/// [`CoreConfig::comparison_context`]; otherwise every call goes straight to
/// the wrapped provider.
pub struct CommentsScmProvider {
    inner: MainThreadScmProvider,
    discussions: Option<Discussions>,
}

impl CommentsScmProvider {
    /// Wrap `inner`, registering the discussions group when the context matches.
    ///
    /// # Errors
    ///
    /// Fails if `inner` already owns the reserved group handle.
    pub fn new(
        mut inner: MainThreadScmProvider,
        config: &CoreConfig,
        source: Arc<dyn CommentsSource>,
        signals: UnboundedSender<CommentsSignal>,
    ) -> Result<Self> {
        if inner.context_value() != config.comparison_context {
            return Ok(Self {
                inner,
                discussions: None,
            });
        }

        inner.register_group(
            COMMENTS_GROUP_HANDLE,
            config.comments_group_id.clone(),
            config.comments_group_label.clone(),
        )?;
        inner.update_group(
            COMMENTS_GROUP_HANDLE,
            GroupFeatures {
                hide_when_empty: Some(true),
            },
        );

        Ok(Self {
            inner,
            discussions: Some(Discussions {
                source,
                signals,
                branch: BranchState::NoBranch,
                generation: 0,
                comments: None,
                subscription: None,
            }),
        })
    }

    /// Whether the discussions group is active.
    #[must_use]
    pub const fn has_discussions(&self) -> bool {
        self.discussions.is_some()
    }

    /// Branch the discussions group currently reflects.
    #[must_use]
    pub fn current_branch(&self) -> Option<&str> {
        match self.discussions.as_ref().map(|d| &d.branch) {
            Some(BranchState::HasBranch(branch)) => Some(branch.as_str()),
            _ => None,
        }
    }

    fn trimmed_root(&self) -> String {
        self.inner
            .root_uri()
            .unwrap_or_default()
            .trim_end_matches('/')
            .to_owned()
    }

    fn switch_branch(&mut self, branch: Option<String>) {
        let root = self.trimmed_root();
        let source_control = self.inner.handle();
        let Some(discussions) = self.discussions.as_mut() else {
            return;
        };

        if let Some(mut previous) = discussions.subscription.take() {
            previous.dispose();
        }
        discussions.comments = None;
        discussions.generation += 1;

        match branch {
            None => {
                debug!(%source_control, "discussions cleared, no branch");
                discussions.branch = BranchState::NoBranch;
            }
            Some(branch) => {
                debug!(%source_control, %branch, "loading discussions for branch");
                let comments = discussions.source.branch_comments(&root, &branch);
                let signals = discussions.signals.clone();
                let generation = discussions.generation;
                let subscription = comments.on_did_change_threads(Box::new(move || {
                    // The receiver only goes away when the bridge is torn down.
                    let _ = signals.send(CommentsSignal {
                        source_control,
                        generation,
                    });
                }));
                comments.refresh();
                discussions.branch = BranchState::HasBranch(branch);
                discussions.comments = Some(comments);
                discussions.subscription = Some(subscription);
            }
        }

        self.render();
    }

    fn render(&mut self) {
        let root = self.trimmed_root();
        let threads: Vec<Thread> = self
            .discussions
            .as_ref()
            .and_then(|discussions| discussions.comments.as_ref())
            .map(|comments| comments.threads())
            .unwrap_or_default();
        let existing = self
            .inner
            .group(COMMENTS_GROUP_HANDLE)
            .map_or(0, |group| group.resources().len());

        let states = threads
            .iter()
            .enumerate()
            .map(|(index, thread)| thread_resource(&root, index, thread))
            .collect();
        let splice = GroupSplices(
            COMMENTS_GROUP_HANDLE,
            vec![RawSplice(0, to_u32(existing), states)],
        );
        if let Err(err) = self.inner.splice_group_resource_states(vec![splice]) {
            warn!(provider = %self.inner.id(), error = %err, "failed to render discussions");
        }
    }
}

fn thread_resource(root: &str, index: usize, thread: &Thread) -> RawResourceState {
    let file = thread.file.trim_start_matches('/');
    RawResourceState(
        ResourceHandle(to_u32(index)),
        format!("{root}/{file}"),
        Vec::new(),
        thread.title.clone(),
        thread.archived,
        false,
        None,
    )
}

fn to_u32(value: usize) -> u32 {
    u32::try_from(value).unwrap_or(u32::MAX)
}

impl ScmProvider for CommentsScmProvider {
    fn handle(&self) -> SourceControlHandle {
        self.inner.handle()
    }

    fn id(&self) -> &str {
        self.inner.id()
    }

    fn label(&self) -> &str {
        self.inner.label()
    }

    fn context_value(&self) -> &str {
        self.inner.context_value()
    }

    fn root_uri(&self) -> Option<&str> {
        self.inner.root_uri()
    }

    fn features(&self) -> &SourceControlFeatures {
        self.inner.features()
    }

    fn groups(&self) -> Vec<&ResourceGroup> {
        self.inner.groups()
    }

    fn group(&self, handle: GroupHandle) -> Option<&ResourceGroup> {
        self.inner.group(handle)
    }

    fn update_source_control(&mut self, features: SourceControlFeatures) {
        self.inner.update_source_control(features);
        if self.discussions.is_none() {
            return;
        }
        let incoming = self
            .inner
            .features()
            .revision
            .as_ref()
            .and_then(|revision| revision.specifier.clone());
        if incoming.as_deref() != self.current_branch() {
            self.switch_branch(incoming);
        }
    }

    fn register_group(&mut self, handle: GroupHandle, id: String, label: String) -> Result<()> {
        if self.discussions.is_none() {
            return self.inner.register_group(handle, id, label);
        }
        if handle.is_reserved() {
            return Err(Error::ReservedGroupHandle { handle });
        }
        self.inner
            .register_group_before(handle, id, label, COMMENTS_GROUP_HANDLE)
    }

    fn update_group(&mut self, handle: GroupHandle, features: GroupFeatures) {
        if self.discussions.is_some() && handle.is_reserved() {
            debug!(group = %handle, "ignoring update for reserved group");
            return;
        }
        self.inner.update_group(handle, features);
    }

    fn update_group_label(&mut self, handle: GroupHandle, label: String) {
        if self.discussions.is_some() && handle.is_reserved() {
            debug!(group = %handle, "ignoring label for reserved group");
            return;
        }
        self.inner.update_group_label(handle, label);
    }

    fn splice_group_resource_states(&mut self, mut splices: Vec<GroupSplices>) -> Result<()> {
        if self.discussions.is_none() {
            return self.inner.splice_group_resource_states(splices);
        }
        let reserved = splices
            .iter()
            .position(|GroupSplices(handle, _)| handle.is_reserved());
        match reserved {
            None => self.inner.splice_group_resource_states(splices),
            Some(index) => {
                let handle = splices[index].0;
                splices.truncate(index);
                self.inner.splice_group_resource_states(splices)?;
                Err(Error::ReservedGroupHandle { handle })
            }
        }
    }

    fn unregister_group(&mut self, handle: GroupHandle) {
        if self.discussions.is_some() && handle.is_reserved() {
            debug!(group = %handle, "ignoring removal of reserved group");
            return;
        }
        self.inner.unregister_group(handle);
    }

    fn command_executor(&self) -> CommandExecutor {
        self.inner.command_executor()
    }

    fn original_resource(&self, uri: String) -> BoxFuture<'static, Result<Option<String>>> {
        self.inner.original_resource(uri)
    }

    fn on_did_change(&self) -> &Emitter<ProviderEvent> {
        self.inner.on_did_change()
    }

    fn threads_changed(&mut self, generation: u64) {
        let Some(discussions) = self.discussions.as_ref() else {
            return;
        };
        if discussions.generation != generation {
            debug!(
                current = discussions.generation,
                generation, "dropping stale discussions notification"
            );
            return;
        }
        self.render();
    }

    fn dispose(&mut self) {
        if let Some(discussions) = self.discussions.as_mut() {
            if let Some(mut subscription) = discussions.subscription.take() {
                subscription.dispose();
            }
            discussions.comments = None;
        }
        self.inner.dispose();
    }
}
