use std::env;

use serde::{Deserialize, Serialize};

use crate::{Error, Result};

const COMPARISON_CONTEXT_ENV: &str = "TETHER_COMPARISON_CONTEXT";

/// Settings that shape how providers are built and where work runs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CoreConfig {
    /// Context value that selects the comments-augmented provider.
    pub comparison_context: String,
    /// Id of the synthesized discussions group.
    pub comments_group_id: String,
    /// Label of the synthesized discussions group.
    pub comments_group_label: String,
    /// Name given to the diff worker thread.
    pub diff_worker_name: String,
}

impl Default for CoreConfig {
    fn default() -> Self {
        Self {
            comparison_context: "comparison".into(),
            comments_group_id: "discussions".into(),
            comments_group_label: "Discussions".into(),
            diff_worker_name: "tether-diff-worker".into(),
        }
    }
}

impl CoreConfig {
    /// Parse a TOML document; missing keys keep their defaults.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] when the document is not valid TOML for this shape.
    pub fn from_toml_str(source: &str) -> Result<Self> {
        toml::from_str(source).map_err(|err| Error::Config {
            message: err.to_string(),
        })
    }

    /// Apply `TETHER_COMPARISON_CONTEXT` when set.
    #[must_use]
    pub fn with_env_overrides(mut self) -> Self {
        if let Ok(context) = env::var(COMPARISON_CONTEXT_ENV) {
            if !context.trim().is_empty() {
                self.comparison_context = context.trim().to_owned();
            }
        }
        self
    }
}
