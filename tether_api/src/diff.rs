use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use super::comments::Range;

/// Full line content of a file at one historical revision.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RevisionLines {
    /// Revision the content was read at.
    pub revision: String,
    /// File content split into lines, without terminators.
    pub lines: Vec<String>,
}

/// An anchor range recorded against a historical revision.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RevisionRange {
    /// Revision the range refers to.
    pub revision: String,
    /// Anchor range in that revision's content.
    pub range: Range,
    /// Text covered by the range when it was recorded.
    #[serde(default)]
    pub range_content: String,
}

/// Request sent to the diff worker.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DiffRequest {
    /// Content for every revision that has anchors.
    pub rev_lines: Vec<RevisionLines>,
    /// Anchors to transform.
    pub rev_ranges: Vec<RevisionRange>,
    /// Current content of the file.
    pub modified_lines: Vec<String>,
}

/// Per revision, the map from serialized original range to transformed range.
pub type DiffResponse = BTreeMap<String, BTreeMap<String, Range>>;
