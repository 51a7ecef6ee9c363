use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tether_api::SourceControlHandle;
use tether_host_api::{CommandOptions, ExtHostScm};
use tracing::debug;

use crate::{Error, Result};

/// Command channel of one provider, usable after the provider is borrowed away.
///
/// Every call checks the provider's liveness flag before it is issued and
/// again once the host answers, so a response that arrives after disposal is
/// dropped instead of being handed to a caller holding stale state.
#[derive(Clone)]
pub struct CommandExecutor {
    provider_id: String,
    source_control: SourceControlHandle,
    host: Arc<dyn ExtHostScm>,
    alive: Arc<AtomicBool>,
}

impl CommandExecutor {
    pub(crate) fn new(
        provider_id: String,
        source_control: SourceControlHandle,
        host: Arc<dyn ExtHostScm>,
        alive: Arc<AtomicBool>,
    ) -> Self {
        Self {
            provider_id,
            source_control,
            host,
            alive,
        }
    }

    /// Whether the owning provider is still registered.
    #[must_use]
    pub fn is_alive(&self) -> bool {
        self.alive.load(Ordering::Acquire)
    }

    /// Run `args` through the extension host and return stdout.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Host`] with the host's failure untouched, or
    /// [`Error::ProviderDisposed`] when the provider went away.
    pub async fn execute(&self, args: Vec<String>, options: CommandOptions) -> Result<String> {
        self.ensure_alive()?;
        debug!(provider = %self.provider_id, ?args, "executing provider command");
        let output = self
            .host
            .execute_command(self.source_control, args, options)
            .await?;
        self.ensure_alive()?;
        Ok(output)
    }

    /// Ask the host for the original version of `uri`.
    ///
    /// # Errors
    ///
    /// Same conditions as [`CommandExecutor::execute`].
    pub async fn original_resource(&self, uri: String) -> Result<Option<String>> {
        self.ensure_alive()?;
        let original = self
            .host
            .provide_original_resource(self.source_control, uri)
            .await?;
        self.ensure_alive()?;
        Ok(original)
    }

    fn ensure_alive(&self) -> Result<()> {
        if self.is_alive() {
            Ok(())
        } else {
            Err(Error::ProviderDisposed {
                id: self.provider_id.clone(),
            })
        }
    }
}

impl fmt::Debug for CommandExecutor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CommandExecutor")
            .field("provider_id", &self.provider_id)
            .field("source_control", &self.source_control)
            .field("alive", &self.is_alive())
            .finish_non_exhaustive()
    }
}
