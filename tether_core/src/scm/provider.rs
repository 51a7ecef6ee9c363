use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use futures::future::{self, BoxFuture};
use tether_api::{
    GroupFeatures, GroupHandle, GroupSplices, RawSplice, SourceControlFeatures,
    SourceControlHandle,
};
use tether_host_api::ExtHostScm;
use tracing::debug;

use super::{CommandExecutor, ProviderEvent, ResourceGroup, ScmProvider};
use crate::event::Emitter;
use crate::{Error, Result};

/// Provider whose state is driven by an extension host.
pub struct MainThreadScmProvider {
    handle: SourceControlHandle,
    id: String,
    label: String,
    context_value: String,
    root_uri: Option<String>,
    features: SourceControlFeatures,
    order: Vec<GroupHandle>,
    groups: HashMap<GroupHandle, ResourceGroup>,
    host: Arc<dyn ExtHostScm>,
    alive: Arc<AtomicBool>,
    on_did_change: Emitter<ProviderEvent>,
}

impl MainThreadScmProvider {
    /// Create a provider with no groups and empty features.
    pub fn new(
        handle: SourceControlHandle,
        id: impl Into<String>,
        label: impl Into<String>,
        context_value: impl Into<String>,
        root_uri: Option<String>,
        host: Arc<dyn ExtHostScm>,
    ) -> Self {
        Self {
            handle,
            id: id.into(),
            label: label.into(),
            context_value: context_value.into(),
            root_uri,
            features: SourceControlFeatures::default(),
            order: Vec::new(),
            groups: HashMap::new(),
            host,
            alive: Arc::new(AtomicBool::new(true)),
            on_did_change: Emitter::new(),
        }
    }

    /// Register a group placed just before `anchor` in the group order, or
    /// last when `anchor` is not registered. Fires a single `Groups` event.
    ///
    /// # Errors
    ///
    /// Fails with [`Error::DuplicateGroup`] if `handle` is already registered.
    pub fn register_group_before(
        &mut self,
        handle: GroupHandle,
        id: String,
        label: String,
        anchor: GroupHandle,
    ) -> Result<()> {
        self.insert_group(handle, id, label, Some(anchor))
    }

    fn insert_group(
        &mut self,
        handle: GroupHandle,
        id: String,
        label: String,
        anchor: Option<GroupHandle>,
    ) -> Result<()> {
        if self.groups.contains_key(&handle) {
            return Err(Error::DuplicateGroup { handle });
        }
        self.groups
            .insert(handle, ResourceGroup::new(handle, id, label));
        let position = anchor.and_then(|anchor| self.order.iter().position(|h| *h == anchor));
        match position {
            Some(position) => self.order.insert(position, handle),
            None => self.order.push(handle),
        }
        self.on_did_change.fire(&ProviderEvent::Groups);
        Ok(())
    }

    /// Whether the provider has been disposed.
    #[must_use]
    pub fn is_disposed(&self) -> bool {
        !self.alive.load(Ordering::Acquire)
    }

    fn apply_batches(group: &mut ResourceGroup, batches: &[RawSplice]) -> bool {
        let mut changed = false;
        // Senders compute offsets front to back, so later batches come first.
        for RawSplice(start, delete_count, states) in batches.iter().rev() {
            changed |= group.splice(*start as usize, *delete_count as usize, states);
        }
        changed
    }
}

impl ScmProvider for MainThreadScmProvider {
    fn handle(&self) -> SourceControlHandle {
        self.handle
    }

    fn id(&self) -> &str {
        &self.id
    }

    fn label(&self) -> &str {
        &self.label
    }

    fn context_value(&self) -> &str {
        &self.context_value
    }

    fn root_uri(&self) -> Option<&str> {
        self.root_uri.as_deref()
    }

    fn features(&self) -> &SourceControlFeatures {
        &self.features
    }

    fn groups(&self) -> Vec<&ResourceGroup> {
        self.order
            .iter()
            .filter_map(|handle| self.groups.get(handle))
            .collect()
    }

    fn group(&self, handle: GroupHandle) -> Option<&ResourceGroup> {
        self.groups.get(&handle)
    }

    fn update_source_control(&mut self, features: SourceControlFeatures) {
        if self.features.merge(features) {
            self.on_did_change.fire(&ProviderEvent::Features);
        }
    }

    fn register_group(&mut self, handle: GroupHandle, id: String, label: String) -> Result<()> {
        self.insert_group(handle, id, label, None)
    }

    fn update_group(&mut self, handle: GroupHandle, features: GroupFeatures) {
        let Some(group) = self.groups.get_mut(&handle) else {
            debug!(provider = %self.id, group = %handle, "ignoring update for unknown group");
            return;
        };
        if group.update(features) {
            self.on_did_change.fire(&ProviderEvent::Groups);
        }
    }

    fn update_group_label(&mut self, handle: GroupHandle, label: String) {
        let Some(group) = self.groups.get_mut(&handle) else {
            debug!(provider = %self.id, group = %handle, "ignoring label for unknown group");
            return;
        };
        if group.set_label(label) {
            self.on_did_change.fire(&ProviderEvent::Groups);
        }
    }

    fn splice_group_resource_states(&mut self, splices: Vec<GroupSplices>) -> Result<()> {
        let mut changed = false;
        let mut outcome = Ok(());
        for GroupSplices(handle, batches) in &splices {
            let Some(group) = self.groups.get_mut(handle) else {
                outcome = Err(Error::UnknownGroup { handle: *handle });
                break;
            };
            changed |= Self::apply_batches(group, batches);
        }
        if changed {
            self.on_did_change.fire(&ProviderEvent::Resources);
        }
        outcome
    }

    fn unregister_group(&mut self, handle: GroupHandle) {
        let Some(mut group) = self.groups.remove(&handle) else {
            debug!(provider = %self.id, group = %handle, "ignoring removal of unknown group");
            return;
        };
        self.order.retain(|existing| *existing != handle);
        group.dispose();
        self.on_did_change.fire(&ProviderEvent::Groups);
    }

    fn command_executor(&self) -> CommandExecutor {
        CommandExecutor::new(
            self.id.clone(),
            self.handle,
            Arc::clone(&self.host),
            Arc::clone(&self.alive),
        )
    }

    fn original_resource(&self, uri: String) -> BoxFuture<'static, Result<Option<String>>> {
        if !self.features.has_quick_diff_provider.unwrap_or(false) {
            return Box::pin(future::ready(Ok(None)));
        }
        let executor = self.command_executor();
        Box::pin(async move { executor.original_resource(uri).await })
    }

    fn on_did_change(&self) -> &Emitter<ProviderEvent> {
        &self.on_did_change
    }

    fn dispose(&mut self) {
        self.alive.store(false, Ordering::Release);
        for group in self.groups.values_mut() {
            group.dispose();
        }
        self.on_did_change.clear();
    }
}

impl std::fmt::Debug for MainThreadScmProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MainThreadScmProvider")
            .field("handle", &self.handle)
            .field("id", &self.id)
            .field("context_value", &self.context_value)
            .field("groups", &self.order)
            .finish_non_exhaustive()
    }
}
