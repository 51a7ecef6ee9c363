use tether_api::{GroupFeatures, GroupHandle, RawResourceState};

use super::resources::{Resource, ResourceCollection};
use crate::event::{Emitter, Subscription};

/// A named, ordered collection of resources inside a provider.
#[derive(Debug)]
pub struct ResourceGroup {
    handle: GroupHandle,
    id: String,
    label: String,
    features: GroupFeatures,
    resources: ResourceCollection,
    on_did_change: Emitter<()>,
}

impl ResourceGroup {
    /// Create an empty group with no features set.
    pub fn new(handle: GroupHandle, id: impl Into<String>, label: impl Into<String>) -> Self {
        Self {
            handle,
            id: id.into(),
            label: label.into(),
            features: GroupFeatures::default(),
            resources: ResourceCollection::new(),
            on_did_change: Emitter::new(),
        }
    }

    /// Provider-scoped handle.
    #[must_use]
    pub const fn handle(&self) -> GroupHandle {
        self.handle
    }

    /// Group identifier (e.g. "index").
    #[must_use]
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Display label.
    #[must_use]
    pub fn label(&self) -> &str {
        &self.label
    }

    /// Current features.
    #[must_use]
    pub const fn features(&self) -> &GroupFeatures {
        &self.features
    }

    /// Whether the group hides itself while empty.
    #[must_use]
    pub fn hide_when_empty(&self) -> bool {
        self.features.hide_when_empty.unwrap_or(false)
    }

    /// Whether the group appears in its provider's visible resource list.
    #[must_use]
    pub fn is_visible(&self) -> bool {
        !self.resources.is_empty() || !self.hide_when_empty()
    }

    /// The group's resources.
    #[must_use]
    pub const fn resources(&self) -> &ResourceCollection {
        &self.resources
    }

    /// Merge `features` into the current ones, notifying listeners if
    /// anything changed. Returns whether it did.
    pub fn update(&mut self, features: GroupFeatures) -> bool {
        let changed = self.features.merge(features);
        if changed {
            self.on_did_change.fire(&());
        }
        changed
    }

    /// Replace the label, notifying listeners if it differs.
    pub fn set_label(&mut self, label: impl Into<String>) -> bool {
        let label = label.into();
        if label == self.label {
            return false;
        }
        self.label = label;
        self.on_did_change.fire(&());
        true
    }

    /// Apply one wire splice, building fresh resources from the states.
    ///
    /// Returns whether any resource was removed or inserted.
    pub fn splice(
        &mut self,
        start: usize,
        delete_count: usize,
        states: &[RawResourceState],
    ) -> bool {
        let resources: Vec<Resource> = states
            .iter()
            .map(|state| Resource::from_state(self.handle, state))
            .collect();
        let inserted = !resources.is_empty();
        let removed = self.resources.splice(start, delete_count, resources);
        inserted || !removed.is_empty()
    }

    /// Subscribe to feature and label changes.
    pub fn on_did_change(&self, listener: impl Fn(&()) + Send + Sync + 'static) -> Subscription {
        self.on_did_change.subscribe(listener)
    }

    /// Subscribe to splices of the group's resources.
    pub fn on_did_splice(
        &self,
        listener: impl Fn(&super::resources::SpliceEvent) + Send + Sync + 'static,
    ) -> Subscription {
        self.resources.on_did_splice(listener)
    }

    /// Release listeners of the group and its collection.
    pub fn dispose(&mut self) {
        self.on_did_change.clear();
        self.resources.dispose();
    }
}
