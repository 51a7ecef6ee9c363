use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError, Weak};

use tether_api::Thread;
use tether_host_api::{BranchComments, CommentsSource, Disposable, ThreadsListener};

type Listeners = Mutex<Vec<(u64, Arc<dyn Fn() + Send + Sync>)>>;

/// In-process comments backend keyed by `(root, branch)`.
#[derive(Debug, Default)]
pub struct MemoryComments {
    branches: Mutex<HashMap<(String, String), Arc<MemoryBranchComments>>>,
}

impl MemoryComments {
    /// Create an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// The shared collection for `branch` of `root_uri`, created on first use.
    pub fn branch(&self, root_uri: &str, branch: &str) -> Arc<MemoryBranchComments> {
        let mut branches = self
            .branches
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        Arc::clone(
            branches
                .entry((root_uri.to_owned(), branch.to_owned()))
                .or_default(),
        )
    }

    /// Replace the threads of a branch and notify its listeners.
    pub fn set_threads(&self, root_uri: &str, branch: &str, threads: Vec<Thread>) {
        self.branch(root_uri, branch).set_threads(threads);
    }
}

impl CommentsSource for MemoryComments {
    fn branch_comments(&self, root_uri: &str, branch: &str) -> Arc<dyn BranchComments> {
        self.branch(root_uri, branch)
    }
}

/// Threads of one branch held in memory.
#[derive(Default)]
pub struct MemoryBranchComments {
    threads: Mutex<Vec<Thread>>,
    listeners: Arc<Listeners>,
    next_listener: AtomicU64,
    refreshes: AtomicU64,
}

impl MemoryBranchComments {
    /// Replace the thread list, restoring creation order of each thread's comments.
    pub fn set_threads(&self, mut threads: Vec<Thread>) {
        for thread in &mut threads {
            thread.sort_comments();
        }
        *self.threads.lock().unwrap_or_else(PoisonError::into_inner) = threads;
        self.fire();
    }

    /// Number of `refresh` calls received.
    pub fn refresh_count(&self) -> u64 {
        self.refreshes.load(Ordering::SeqCst)
    }

    /// Number of live listeners.
    pub fn listener_count(&self) -> usize {
        self.listeners
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    fn fire(&self) {
        let snapshot: Vec<_> = self
            .listeners
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .map(|(_, listener)| Arc::clone(listener))
            .collect();
        for listener in snapshot {
            listener();
        }
    }
}

impl BranchComments for MemoryBranchComments {
    fn threads(&self) -> Vec<Thread> {
        self.threads
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    fn refresh(&self) {
        self.refreshes.fetch_add(1, Ordering::SeqCst);
        self.fire();
    }

    fn on_did_change_threads(&self, listener: ThreadsListener) -> Disposable {
        let id = self.next_listener.fetch_add(1, Ordering::Relaxed);
        self.listeners
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push((id, Arc::from(listener)));

        let listeners: Weak<Listeners> = Arc::downgrade(&self.listeners);
        Disposable::new(move || {
            if let Some(listeners) = listeners.upgrade() {
                listeners
                    .lock()
                    .unwrap_or_else(PoisonError::into_inner)
                    .retain(|(existing, _)| *existing != id);
            }
        })
    }
}

impl std::fmt::Debug for MemoryBranchComments {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MemoryBranchComments")
            .field("threads", &self.threads().len())
            .field("listeners", &self.listener_count())
            .finish_non_exhaustive()
    }
}
