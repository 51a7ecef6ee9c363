use serde::{Deserialize, Serialize};

use super::revision::Revision;

/// Transport identifier of a source control registered by an extension host.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SourceControlHandle(pub u32);

/// Provider-scoped identifier of a resource group.
///
/// Extension hosts only ever assign non-negative values; negative handles are
/// reserved for groups synthesized inside the core.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct GroupHandle(pub i64);

impl GroupHandle {
    /// Whether the handle falls in the range reserved for the core.
    pub const fn is_reserved(self) -> bool {
        self.0 < 0
    }
}

/// Group-scoped identifier of a resource.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ResourceHandle(pub u32);

impl std::fmt::Display for SourceControlHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl std::fmt::Display for GroupHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Wire tuple describing one resource:
/// `(handle, uri, [icon, iconDark?], tooltip, strikeThrough, faded, colorId)`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawResourceState(
    pub ResourceHandle,
    pub String,
    pub Vec<String>,
    pub String,
    pub bool,
    pub bool,
    pub Option<String>,
);

impl RawResourceState {
    /// Handle assigned by the extension host.
    pub const fn handle(&self) -> ResourceHandle {
        self.0
    }

    /// Source URI of the resource.
    pub fn uri(&self) -> &str {
        &self.1
    }

    /// Expand the tuple's decoration fields into a named record.
    pub fn decorations(&self) -> ResourceDecorations {
        let icon = self.2.first().cloned();
        let icon_dark = self.2.get(1).cloned().or_else(|| icon.clone());
        ResourceDecorations {
            icon,
            icon_dark,
            tooltip: self.3.clone(),
            strike_through: self.4,
            faded: self.5,
            color: self.6.clone(),
        }
    }
}

/// Visual metadata attached to a resource.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResourceDecorations {
    /// Icon for light themes.
    #[serde(default)]
    pub icon: Option<String>,
    /// Icon for dark themes; falls back to `icon`.
    #[serde(default)]
    pub icon_dark: Option<String>,
    /// Hover text.
    #[serde(default)]
    pub tooltip: String,
    /// Render the label struck through.
    #[serde(default)]
    pub strike_through: bool,
    /// Render the label faded.
    #[serde(default)]
    pub faded: bool,
    /// Theme color identifier.
    #[serde(default)]
    pub color: Option<String>,
}

/// One splice: remove `delete_count` resources at `start`, insert the states.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawSplice(pub u32, pub u32, pub Vec<RawResourceState>);

/// All splices for one group, in the order the sender generated them.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GroupSplices(pub GroupHandle, pub Vec<RawSplice>);

/// Feature flags of a resource group. `None` fields keep their prior value on update.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GroupFeatures {
    /// Exclude the group from the visible resource list while it is empty.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hide_when_empty: Option<bool>,
}

impl GroupFeatures {
    /// Shallow merge: fields present in `update` overwrite.
    ///
    /// Returns whether any field changed value.
    pub fn merge(&mut self, update: Self) -> bool {
        let before = self.clone();
        if update.hide_when_empty.is_some() {
            self.hide_when_empty = update.hide_when_empty;
        }
        *self != before
    }
}

/// A command surfaced by a provider (accept input, status bar entries).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Command {
    /// Registered command identifier.
    pub id: String,
    /// Display title.
    pub title: String,
    /// Optional hover text.
    #[serde(default)]
    pub tooltip: Option<String>,
    /// Arguments forwarded to the command.
    #[serde(default)]
    pub arguments: Vec<serde_json::Value>,
}

/// Provider-level features. `None` fields keep their prior value on update.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SourceControlFeatures {
    /// Whether the provider can resolve original content for quick diff.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub has_quick_diff_provider: Option<bool>,
    /// Badge count.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub count: Option<u32>,
    /// Initial text for the commit input box.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub commit_template: Option<String>,
    /// Command run when the input box is accepted.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub accept_input_command: Option<Command>,
    /// Command used to switch the current revision.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub set_revision_command: Option<Command>,
    /// URIs of remote resources backing the provider.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub remote_resources: Option<Vec<String>>,
    /// Commands shown in the status bar.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status_bar_commands: Option<Vec<Command>>,
    /// Descriptor of the currently checked out revision.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub revision: Option<Revision>,
}

impl SourceControlFeatures {
    /// Shallow merge: fields present in `update` overwrite.
    ///
    /// Returns whether any field changed value.
    pub fn merge(&mut self, update: Self) -> bool {
        let mut changed = false;
        macro_rules! overwrite {
            ($($field:ident),*) => {
                $(if update.$field.is_some() && update.$field != self.$field {
                    self.$field = update.$field;
                    changed = true;
                })*
            };
        }
        overwrite!(
            has_quick_diff_provider,
            count,
            commit_template,
            accept_input_command,
            set_revision_command,
            remote_resources,
            status_bar_commands,
            revision
        );
        changed
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resource_state_decodes_from_wire_tuple() {
        let json = r#"[7, "file:///repo/a.rs", ["light.svg"], "Modified", true, false, null]"#;
        let state: RawResourceState = serde_json::from_str(json).expect("decode state");

        assert_eq!(state.handle(), ResourceHandle(7));
        assert_eq!(state.uri(), "file:///repo/a.rs");
        let decorations = state.decorations();
        assert_eq!(decorations.icon.as_deref(), Some("light.svg"));
        assert_eq!(decorations.icon_dark.as_deref(), Some("light.svg"));
        assert!(decorations.strike_through);
        assert!(decorations.color.is_none());
    }

    #[test]
    fn group_splices_decode_from_nested_arrays() {
        let json = r#"[2, [[0, 1, [[1, "file:///x", ["a", "b"], "", false, true, "red"]]]]]"#;
        let splices: GroupSplices = serde_json::from_str(json).expect("decode splices");

        assert_eq!(splices.0, GroupHandle(2));
        let RawSplice(start, delete_count, states) = &splices.1[0];
        assert_eq!((*start, *delete_count), (0, 1));
        assert_eq!(states[0].decorations().icon_dark.as_deref(), Some("b"));
    }

    #[test]
    fn features_merge_keeps_unspecified_fields() {
        let mut features = SourceControlFeatures {
            count: Some(3),
            commit_template: Some("template".into()),
            ..SourceControlFeatures::default()
        };
        assert!(features.merge(SourceControlFeatures {
            count: Some(5),
            ..SourceControlFeatures::default()
        }));

        assert_eq!(features.count, Some(5));
        assert_eq!(features.commit_template.as_deref(), Some("template"));
    }

    #[test]
    fn features_merge_reports_unchanged_values() {
        let mut features = SourceControlFeatures {
            count: Some(3),
            ..SourceControlFeatures::default()
        };
        assert!(!features.merge(SourceControlFeatures::default()));
        assert!(!features.merge(SourceControlFeatures {
            count: Some(3),
            ..SourceControlFeatures::default()
        }));
    }

    #[test]
    fn features_use_camel_case_on_the_wire() {
        let features: SourceControlFeatures =
            serde_json::from_str(r#"{"hasQuickDiffProvider": true, "commitTemplate": "x"}"#)
                .expect("decode features");
        assert_eq!(features.has_quick_diff_provider, Some(true));
        assert!(features.revision.is_none());
    }

    #[test]
    fn reserved_group_handles_are_negative() {
        assert!(GroupHandle(-1).is_reserved());
        assert!(!GroupHandle(0).is_reserved());
    }
}
