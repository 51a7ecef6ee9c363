use serde::{Deserialize, Serialize};

/// Descriptor of the revision a provider currently has checked out.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Revision {
    /// Revision exactly as the user or extension typed it.
    #[serde(default)]
    pub raw_specifier: Option<String>,
    /// Symbolic name, typically the branch (e.g. "main").
    #[serde(default)]
    pub specifier: Option<String>,
    /// Resolved object identifier (e.g. a git SHA).
    #[serde(default)]
    pub id: Option<String>,
}

impl Revision {
    /// Revision naming a branch resolved to `id`.
    pub fn branch(specifier: impl Into<String>, id: Option<String>) -> Self {
        let specifier = specifier.into();
        Self {
            raw_specifier: Some(specifier.clone()),
            specifier: Some(specifier),
            id,
        }
    }
}
