use std::collections::HashMap;
use std::sync::Arc;

use tether_api::{
    GroupFeatures, GroupHandle, GroupSplices, ScmMessage, SourceControlFeatures,
    SourceControlHandle,
};
use tether_host_api::{CommentsSource, ExtHostScm};
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};
use tracing::{debug, info, warn};

use super::{
    CommentsScmProvider, CommentsSignal, MainThreadScmProvider, Repository, RepositoryId,
    ScmProvider, ScmService,
};
use crate::config::CoreConfig;
use crate::event::Subscription;
use crate::Result;

/// Main-thread side of the extension-host SCM protocol.
///
/// Messages are applied one at a time and each runs to completion before the
/// next, so the handle tables need no locking. Messages addressed to a
/// handle that is not registered are dropped.
pub struct MainThreadScm {
    config: CoreConfig,
    host: Arc<dyn ExtHostScm>,
    comments: Arc<dyn CommentsSource>,
    service: ScmService,
    repositories: HashMap<SourceControlHandle, RepositoryId>,
    input_subscriptions: HashMap<SourceControlHandle, Subscription>,
    signals_tx: UnboundedSender<CommentsSignal>,
    signals_rx: UnboundedReceiver<CommentsSignal>,
}

impl MainThreadScm {
    /// Create a bridge over an empty service.
    pub fn new(
        config: CoreConfig,
        host: Arc<dyn ExtHostScm>,
        comments: Arc<dyn CommentsSource>,
    ) -> Self {
        let (signals_tx, signals_rx) = mpsc::unbounded_channel();
        Self {
            config,
            host,
            comments,
            service: ScmService::new(),
            repositories: HashMap::new(),
            input_subscriptions: HashMap::new(),
            signals_tx,
            signals_rx,
        }
    }

    /// The underlying service.
    #[must_use]
    pub const fn service(&self) -> &ScmService {
        &self.service
    }

    /// Repository registered under `handle`.
    #[must_use]
    pub fn repository(&self, handle: SourceControlHandle) -> Option<&Repository> {
        let id = self.repositories.get(&handle)?;
        self.service.repository(*id)
    }

    /// Provider registered under `handle`.
    #[must_use]
    pub fn provider(&self, handle: SourceControlHandle) -> Option<&dyn ScmProvider> {
        self.repository(handle).map(Repository::provider)
    }

    /// Apply one protocol message.
    ///
    /// # Errors
    ///
    /// Only registration fails; every other verb logs and tolerates problems.
    pub fn dispatch(&mut self, message: ScmMessage) -> Result<()> {
        match message {
            ScmMessage::RegisterSourceControl {
                handle,
                id,
                label,
                root_uri,
            } => self.register_source_control(handle, &id, &label, root_uri),
            ScmMessage::UpdateSourceControl { handle, features } => {
                self.update_source_control(handle, features);
                Ok(())
            }
            ScmMessage::UnregisterSourceControl { handle } => {
                self.unregister_source_control(handle);
                Ok(())
            }
            ScmMessage::RegisterGroup {
                source_control,
                group,
                id,
                label,
            } => {
                self.register_group(source_control, group, id, label);
                Ok(())
            }
            ScmMessage::UpdateGroup {
                source_control,
                group,
                features,
            } => {
                self.update_group(source_control, group, features);
                Ok(())
            }
            ScmMessage::UpdateGroupLabel {
                source_control,
                group,
                label,
            } => {
                self.update_group_label(source_control, group, label);
                Ok(())
            }
            ScmMessage::SpliceResourceStates {
                source_control,
                splices,
            } => {
                self.splice_resource_states(source_control, splices);
                Ok(())
            }
            ScmMessage::UnregisterGroup {
                source_control,
                group,
            } => {
                self.unregister_group(source_control, group);
                Ok(())
            }
            ScmMessage::SetInputBoxValue {
                source_control,
                value,
            } => {
                self.set_input_box_value(source_control, value);
                Ok(())
            }
        }
    }

    /// Create and register a provider for `handle`.
    ///
    /// The extension id becomes the provider's context value and decides
    /// whether the discussions group is added.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::DuplicateProvider`] if `handle` is already registered.
    pub fn register_source_control(
        &mut self,
        handle: SourceControlHandle,
        id: &str,
        label: &str,
        root_uri: Option<String>,
    ) -> Result<()> {
        let inner = MainThreadScmProvider::new(
            handle,
            format!("scm{handle}"),
            label,
            id,
            root_uri,
            Arc::clone(&self.host),
        );
        let provider: Box<dyn ScmProvider> = if id == self.config.comparison_context {
            Box::new(CommentsScmProvider::new(
                inner,
                &self.config,
                Arc::clone(&self.comments),
                self.signals_tx.clone(),
            )?)
        } else {
            Box::new(inner)
        };

        let repository_id = self.service.register_provider(provider)?;
        let host = Arc::clone(&self.host);
        let subscription = self
            .service
            .repository(repository_id)
            .map(|repository| {
                repository.input().on_did_change(move |value: &String| {
                    host.input_box_value_changed(handle, value);
                })
            })
            .unwrap_or_else(Subscription::noop);

        self.repositories.insert(handle, repository_id);
        self.input_subscriptions.insert(handle, subscription);
        info!(source_control = %handle, context = id, "registered source control");
        Ok(())
    }

    /// Merge provider features.
    pub fn update_source_control(
        &mut self,
        handle: SourceControlHandle,
        features: SourceControlFeatures,
    ) {
        if let Some(repository) = self.repository_mut(handle) {
            repository.provider_mut().update_source_control(features);
        }
    }

    /// Tear down the input subscription, then the repository.
    pub fn unregister_source_control(&mut self, handle: SourceControlHandle) {
        let Some(repository_id) = self.repositories.remove(&handle) else {
            debug!(source_control = %handle, "ignoring unregister for unknown source control");
            return;
        };
        if let Some(mut subscription) = self.input_subscriptions.remove(&handle) {
            subscription.dispose();
        }
        self.service.unregister(repository_id);
        info!(source_control = %handle, "unregistered source control");
    }

    /// Append a group to the provider.
    pub fn register_group(
        &mut self,
        source_control: SourceControlHandle,
        group: GroupHandle,
        id: String,
        label: String,
    ) {
        let Some(repository) = self.repository_mut(source_control) else {
            return;
        };
        if let Err(err) = repository.provider_mut().register_group(group, id, label) {
            warn!(%source_control, %group, error = %err, "rejected group registration");
        }
    }

    /// Merge group features.
    pub fn update_group(
        &mut self,
        source_control: SourceControlHandle,
        group: GroupHandle,
        features: GroupFeatures,
    ) {
        if let Some(repository) = self.repository_mut(source_control) {
            repository.provider_mut().update_group(group, features);
        }
    }

    /// Rename a group.
    pub fn update_group_label(
        &mut self,
        source_control: SourceControlHandle,
        group: GroupHandle,
        label: String,
    ) {
        if let Some(repository) = self.repository_mut(source_control) {
            repository.provider_mut().update_group_label(group, label);
        }
    }

    /// Apply splice batches to the provider's groups.
    pub fn splice_resource_states(
        &mut self,
        source_control: SourceControlHandle,
        splices: Vec<GroupSplices>,
    ) {
        let Some(repository) = self.repository_mut(source_control) else {
            return;
        };
        if let Err(err) = repository
            .provider_mut()
            .splice_group_resource_states(splices)
        {
            warn!(%source_control, error = %err, "splice aborted, provider out of sync with host");
        }
    }

    /// Remove a group.
    pub fn unregister_group(&mut self, source_control: SourceControlHandle, group: GroupHandle) {
        if let Some(repository) = self.repository_mut(source_control) {
            repository.provider_mut().unregister_group(group);
        }
    }

    /// Replace the input box text; the host hears back through the input listener.
    pub fn set_input_box_value(&mut self, source_control: SourceControlHandle, value: String) {
        if let Some(repository) = self.repository_mut(source_control) {
            repository.input_mut().set_value(value);
        }
    }

    /// Apply pending discussions notifications without waiting.
    ///
    /// Returns how many signals were consumed.
    pub fn drain_signals(&mut self) -> usize {
        let mut drained = 0;
        while let Ok(signal) = self.signals_rx.try_recv() {
            self.apply_signal(signal);
            drained += 1;
        }
        drained
    }

    /// Process host messages and discussions notifications until `messages` closes.
    pub async fn run(&mut self, mut messages: UnboundedReceiver<ScmMessage>) {
        loop {
            tokio::select! {
                message = messages.recv() => match message {
                    Some(message) => {
                        if let Err(err) = self.dispatch(message) {
                            warn!(error = %err, "failed to apply scm message");
                        }
                    }
                    None => break,
                },
                Some(signal) = self.signals_rx.recv() => self.apply_signal(signal),
            }
        }
        self.drain_signals();
        debug!("scm message stream closed");
    }

    /// Unregister every source control.
    pub fn dispose(&mut self) {
        let handles: Vec<SourceControlHandle> = self.repositories.keys().copied().collect();
        for handle in handles {
            self.unregister_source_control(handle);
        }
    }

    fn apply_signal(&mut self, signal: CommentsSignal) {
        if let Some(repository) = self.repository_mut(signal.source_control) {
            repository.provider_mut().threads_changed(signal.generation);
        }
    }

    fn repository_mut(&mut self, handle: SourceControlHandle) -> Option<&mut Repository> {
        let Some(id) = self.repositories.get(&handle).copied() else {
            debug!(source_control = %handle, "ignoring message for unknown source control");
            return None;
        };
        self.service.repository_mut(id)
    }
}

impl Drop for MainThreadScm {
    fn drop(&mut self) {
        self.dispose();
    }
}

impl std::fmt::Debug for MainThreadScm {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MainThreadScm")
            .field("source_controls", &self.repositories.len())
            .field("service", &self.service)
            .finish_non_exhaustive()
    }
}
