use std::fmt;

use serde::{Deserialize, Serialize};

/// A zero-based line/character pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Position {
    /// Zero-based line number.
    pub line: u32,
    /// Zero-based character offset within the line.
    pub character: u32,
}

impl Position {
    /// Convenience constructor.
    pub const fn new(line: u32, character: u32) -> Self {
        Self { line, character }
    }
}

/// A range bounded by two positions (inclusive start, exclusive end character).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Range {
    /// Start position.
    pub start: Position,
    /// End position.
    pub end: Position,
}

impl Range {
    /// Construct a range with explicit start and end.
    pub const fn new(start: Position, end: Position) -> Self {
        Self { start, end }
    }

    /// Shorthand for `Range::new(Position::new(..), Position::new(..))`.
    pub const fn lines(start_line: u32, start_character: u32, end_line: u32, end_character: u32) -> Self {
        Self::new(
            Position::new(start_line, start_character),
            Position::new(end_line, end_character),
        )
    }

    /// Stable string form used as a map key in diff-worker responses.
    pub fn key(&self) -> String {
        self.to_string()
    }
}

impl fmt::Display for Range {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}:{}-{}:{}",
            self.start.line, self.start.character, self.end.line, self.end.character
        )
    }
}

/// A comment already published in a discussion thread.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Comment {
    /// Backend identifier.
    pub id: String,
    /// Display name of the author, when known.
    #[serde(default)]
    pub author: Option<String>,
    /// Markdown body.
    pub contents: String,
    /// Unix timestamp (seconds) of creation.
    pub created_at: i64,
}

/// A discussion anchored to a range of a file at a specific revision.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Thread {
    /// Backend identifier.
    pub id: String,
    /// Path of the file relative to the repository root.
    pub file: String,
    /// Thread title, usually the first line of the first comment.
    pub title: String,
    /// Archived threads are still listed but rendered struck through.
    #[serde(default)]
    pub archived: bool,
    /// Anchor range at `revision`.
    pub range: Range,
    /// Revision the anchor was recorded against.
    #[serde(default)]
    pub revision: Option<String>,
    /// Comments ordered by creation time.
    #[serde(default)]
    pub comments: Vec<Comment>,
}

impl Thread {
    /// Restore creation-time order of the comments.
    pub fn sort_comments(&mut self) {
        self.comments.sort_by_key(|comment| comment.created_at);
    }
}
