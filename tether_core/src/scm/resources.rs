use tether_api::{GroupHandle, RawResourceState, ResourceDecorations, ResourceHandle};
use tracing::debug;

use crate::event::{Emitter, Subscription};

/// A source-control resource as rendered by the workbench.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Resource {
    /// Handle assigned by the extension host.
    pub handle: ResourceHandle,
    /// Group the resource belongs to.
    pub group: GroupHandle,
    /// URI of the file the resource describes.
    pub source_uri: String,
    /// Icons, tooltip and styling.
    pub decorations: ResourceDecorations,
}

impl Resource {
    /// Build a resource of `group` from its wire tuple.
    #[must_use]
    pub fn from_state(group: GroupHandle, state: &RawResourceState) -> Self {
        Self {
            handle: state.handle(),
            group,
            source_uri: state.uri().to_owned(),
            decorations: state.decorations(),
        }
    }
}

/// Payload fired after a splice was applied.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SpliceEvent {
    /// Index the splice was applied at.
    pub start: usize,
    /// Number of resources actually removed.
    pub delete_count: usize,
    /// Resources inserted at `start`.
    pub resources: Vec<Resource>,
}

/// Ordered resources of one group, mutated only by splices.
#[derive(Debug, Default)]
pub struct ResourceCollection {
    resources: Vec<Resource>,
    on_did_splice: Emitter<SpliceEvent>,
}

impl ResourceCollection {
    /// Create an empty collection.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of resources.
    #[must_use]
    pub fn len(&self) -> usize {
        self.resources.len()
    }

    /// Whether the collection holds no resources.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.resources.is_empty()
    }

    /// Resources in order.
    #[must_use]
    pub fn as_slice(&self) -> &[Resource] {
        &self.resources
    }

    /// Iterate resources in order.
    pub fn iter(&self) -> std::slice::Iter<'_, Resource> {
        self.resources.iter()
    }

    /// Remove `delete_count` resources at `start` and insert `resources` in their place.
    ///
    /// Out-of-range input is clamped: `start` to the current length and
    /// `delete_count` to the number of resources after `start`. Returns the
    /// removed resources. A splice that neither removes nor inserts fires nothing.
    pub fn splice(
        &mut self,
        start: usize,
        delete_count: usize,
        resources: Vec<Resource>,
    ) -> Vec<Resource> {
        let len = self.resources.len();
        let clamped_start = start.min(len);
        let clamped_delete = delete_count.min(len - clamped_start);
        if clamped_start != start || clamped_delete != delete_count {
            debug!(
                start,
                delete_count,
                len,
                "clamped out-of-range splice on resource collection"
            );
        }

        if clamped_delete == 0 && resources.is_empty() {
            return Vec::new();
        }

        let removed: Vec<Resource> = self
            .resources
            .splice(
                clamped_start..clamped_start + clamped_delete,
                resources.iter().cloned(),
            )
            .collect();

        self.on_did_splice.fire(&SpliceEvent {
            start: clamped_start,
            delete_count: removed.len(),
            resources,
        });
        removed
    }

    /// Subscribe to splice events.
    pub fn on_did_splice(
        &self,
        listener: impl Fn(&SpliceEvent) + Send + Sync + 'static,
    ) -> Subscription {
        self.on_did_splice.subscribe(listener)
    }

    /// Release all listeners.
    pub fn dispose(&mut self) {
        self.on_did_splice.clear();
    }
}

impl<'a> IntoIterator for &'a ResourceCollection {
    type Item = &'a Resource;
    type IntoIter = std::slice::Iter<'a, Resource>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}
