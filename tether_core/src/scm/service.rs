use std::collections::{HashMap, HashSet};
use std::fmt;

use tracing::{debug, info};

use super::ScmProvider;
use crate::event::{Emitter, Subscription};
use crate::{Error, Result};

/// Identifier of a repository inside a [`ScmService`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RepositoryId(u64);

impl fmt::Display for RepositoryId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "repo#{}", self.0)
    }
}

/// Commit message input attached to a repository.
#[derive(Debug, Default)]
pub struct InputBox {
    value: String,
    on_did_change: Emitter<String>,
}

impl InputBox {
    /// Current text.
    #[must_use]
    pub fn value(&self) -> &str {
        &self.value
    }

    /// Replace the text; listeners fire only when it actually changes.
    pub fn set_value(&mut self, value: impl Into<String>) {
        let value = value.into();
        if value == self.value {
            return;
        }
        self.value = value;
        self.on_did_change.fire(&self.value);
    }

    /// Subscribe to value changes.
    pub fn on_did_change(&self, listener: impl Fn(&String) + Send + Sync + 'static) -> Subscription {
        self.on_did_change.subscribe(listener)
    }

    fn dispose(&mut self) {
        self.on_did_change.clear();
    }
}

/// A provider paired with its input box.
pub struct Repository {
    id: RepositoryId,
    provider: Box<dyn ScmProvider>,
    input: InputBox,
}

impl Repository {
    /// Service-assigned id.
    #[must_use]
    pub const fn id(&self) -> RepositoryId {
        self.id
    }

    /// The wrapped provider.
    #[must_use]
    pub fn provider(&self) -> &dyn ScmProvider {
        self.provider.as_ref()
    }

    /// Mutable access for the bridge.
    pub fn provider_mut(&mut self) -> &mut dyn ScmProvider {
        self.provider.as_mut()
    }

    /// The input box.
    #[must_use]
    pub const fn input(&self) -> &InputBox {
        &self.input
    }

    /// Mutable input box.
    pub fn input_mut(&mut self) -> &mut InputBox {
        &mut self.input
    }

    fn dispose(&mut self) {
        self.provider.dispose();
        self.input.dispose();
    }
}

impl fmt::Debug for Repository {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Repository")
            .field("id", &self.id)
            .field("provider", &self.provider.id())
            .field("root_uri", &self.provider.root_uri())
            .finish_non_exhaustive()
    }
}

/// Registry of repositories and resource-to-repository lookup.
#[derive(Debug, Default)]
pub struct ScmService {
    next_id: u64,
    provider_ids: HashSet<String>,
    repositories: Vec<Repository>,
    roots: RootIndex,
    on_did_add_repository: Emitter<RepositoryId>,
    on_did_remove_repository: Emitter<RepositoryId>,
}

impl ScmService {
    /// Create an empty service.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Wrap `provider` in a new repository.
    ///
    /// The returned id is the handle for [`ScmService::unregister`].
    ///
    /// # Errors
    ///
    /// Returns [`Error::DuplicateProvider`] when the provider id is taken; the
    /// service is left untouched and `provider` is dropped.
    pub fn register_provider(&mut self, provider: Box<dyn ScmProvider>) -> Result<RepositoryId> {
        if self.provider_ids.contains(provider.id()) {
            return Err(Error::DuplicateProvider {
                id: provider.id().to_owned(),
            });
        }

        let id = RepositoryId(self.next_id);
        self.next_id += 1;
        self.provider_ids.insert(provider.id().to_owned());
        info!(repository = %id, provider = provider.id(), root = ?provider.root_uri(), "registered repository");
        self.repositories.push(Repository {
            id,
            provider,
            input: InputBox::default(),
        });
        self.rebuild_roots();
        self.on_did_add_repository.fire(&id);
        Ok(id)
    }

    /// Deregister and dispose the repository. Unknown ids return `false`.
    pub fn unregister(&mut self, id: RepositoryId) -> bool {
        let Some(position) = self.repositories.iter().position(|repo| repo.id == id) else {
            debug!(repository = %id, "ignoring removal of unknown repository");
            return false;
        };
        let mut repository = self.repositories.remove(position);
        self.provider_ids.remove(repository.provider.id());
        self.rebuild_roots();
        repository.dispose();
        info!(repository = %id, "removed repository");
        self.on_did_remove_repository.fire(&id);
        true
    }

    /// Repository registered under `id`.
    #[must_use]
    pub fn repository(&self, id: RepositoryId) -> Option<&Repository> {
        self.repositories.iter().find(|repo| repo.id == id)
    }

    /// Mutable repository registered under `id`.
    pub fn repository_mut(&mut self, id: RepositoryId) -> Option<&mut Repository> {
        self.repositories.iter_mut().find(|repo| repo.id == id)
    }

    /// Repositories in registration order.
    pub fn repositories(&self) -> impl Iterator<Item = &Repository> {
        self.repositories.iter()
    }

    /// Number of registered repositories.
    #[must_use]
    pub fn len(&self) -> usize {
        self.repositories.len()
    }

    /// Whether no repository is registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.repositories.is_empty()
    }

    /// Repository whose root is the longest prefix of `uri`.
    #[must_use]
    pub fn repository_for_resource(&self, uri: &str) -> Option<&Repository> {
        let id = self.roots.longest_prefix(uri)?;
        self.repository(id)
    }

    /// Subscribe to repository additions.
    pub fn on_did_add_repository(
        &self,
        listener: impl Fn(&RepositoryId) + Send + Sync + 'static,
    ) -> Subscription {
        self.on_did_add_repository.subscribe(listener)
    }

    /// Subscribe to repository removals.
    pub fn on_did_remove_repository(
        &self,
        listener: impl Fn(&RepositoryId) + Send + Sync + 'static,
    ) -> Subscription {
        self.on_did_remove_repository.subscribe(listener)
    }

    fn rebuild_roots(&mut self) {
        self.roots = RootIndex::build(self.repositories.iter().filter_map(|repo| {
            repo.provider.root_uri().map(|root| (root, repo.id))
        }));
    }
}

/// Segment trie over repository roots.
#[derive(Debug, Default)]
struct RootIndex {
    root: RootNode,
}

#[derive(Debug, Default)]
struct RootNode {
    children: HashMap<String, RootNode>,
    repository: Option<RepositoryId>,
}

impl RootIndex {
    fn build<'a>(roots: impl Iterator<Item = (&'a str, RepositoryId)>) -> Self {
        let mut index = Self::default();
        for (root, id) in roots {
            let mut node = &mut index.root;
            for segment in segments(root) {
                node = node.children.entry(segment.to_owned()).or_default();
            }
            // First registration wins when two providers share a root.
            node.repository.get_or_insert(id);
        }
        index
    }

    fn longest_prefix(&self, uri: &str) -> Option<RepositoryId> {
        let mut node = &self.root;
        let mut best = node.repository;
        for segment in segments(uri) {
            match node.children.get(segment) {
                Some(child) => {
                    node = child;
                    best = node.repository.or(best);
                }
                None => break,
            }
        }
        best
    }
}

/// Split a URI into `scheme://authority` followed by its non-empty path segments.
fn segments(uri: &str) -> impl Iterator<Item = &str> {
    let (authority, path) = match uri.find("://") {
        Some(scheme_end) => {
            let rest = &uri[scheme_end + 3..];
            let path_start = rest.find('/').map_or(uri.len(), |i| scheme_end + 3 + i);
            (Some(&uri[..path_start]), &uri[path_start..])
        }
        None => (None, uri),
    };
    authority
        .into_iter()
        .chain(path.split('/').filter(|segment| !segment.is_empty()))
}
