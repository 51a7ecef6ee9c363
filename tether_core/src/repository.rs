//! Local repository access built on top of libgit2.
//!
//! The extension host owns git for registered providers; this module backs
//! [`crate::scm::LocalSourceControl`], which publishes a repository found on
//! disk through the same protocol a host would use.

use std::fmt;
use std::path::{Path, PathBuf};

use git2::{ErrorClass, ErrorCode, Repository as GitRepository, Status, StatusOptions};
use tether_api::Revision;

use crate::{Error, Result};

/// Which side of the index a change sits on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum StatusArea {
    /// Staged changes.
    Index,
    /// Unstaged changes, untracked files and conflicts.
    WorkingTree,
}

/// Kind of change recorded for a path.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ChangeKind {
    /// New file.
    Added,
    /// Content changed.
    Modified,
    /// File removed.
    Deleted,
    /// File moved.
    Renamed,
    /// File type changed (e.g. file to symlink).
    TypeChange,
    /// Not tracked by git.
    Untracked,
    /// Unresolved merge conflict.
    Conflicted,
}

impl ChangeKind {
    /// Tooltip text.
    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::Added => "Index Added",
            Self::Modified => "Modified",
            Self::Deleted => "Deleted",
            Self::Renamed => "Renamed",
            Self::TypeChange => "Type Changed",
            Self::Untracked => "Untracked",
            Self::Conflicted => "Conflict",
        }
    }

    /// Theme color id used to tint the resource.
    #[must_use]
    pub const fn color(self) -> &'static str {
        match self {
            Self::Added => "gitDecoration.addedResourceForeground",
            Self::Modified | Self::Renamed | Self::TypeChange => {
                "gitDecoration.modifiedResourceForeground"
            }
            Self::Deleted => "gitDecoration.deletedResourceForeground",
            Self::Untracked => "gitDecoration.untrackedResourceForeground",
            Self::Conflicted => "gitDecoration.conflictingResourceForeground",
        }
    }
}

/// One changed path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatusEntry {
    /// Path relative to the repository root, `/`-separated.
    pub path: String,
    /// Index or working tree.
    pub area: StatusArea,
    /// What happened to the path.
    pub kind: ChangeKind,
}

/// Handle to a non-bare repository on disk.
pub struct Repository {
    inner: GitRepository,
    root: PathBuf,
}

impl Repository {
    /// Open the repository containing `path`.
    ///
    /// # Errors
    ///
    /// Returns an error if the path cannot be canonicalized, is not inside a
    /// git repository, or the repository is bare.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let original = path.as_ref();
        let canonical = std::fs::canonicalize(original).map_err(|source| Error::Io {
            path: display_path(original),
            source,
        })?;

        let repo = match GitRepository::discover(&canonical) {
            Ok(repo) => repo,
            Err(err)
                if err.class() == ErrorClass::Repository && err.code() == ErrorCode::NotFound =>
            {
                return Err(Error::NotARepository {
                    path: display_path(&canonical),
                })
            }
            Err(err) => return Err(Error::from(err)),
        };

        let root = repo
            .workdir()
            .map(Path::to_path_buf)
            .ok_or_else(|| Error::BareRepository {
                path: display_path(&canonical),
            })?;

        Ok(Self { inner: repo, root })
    }

    /// Absolute path of the working tree root.
    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// `file://` URI of the root without a trailing slash.
    #[must_use]
    pub fn root_uri(&self) -> String {
        let path = display_path(&self.root);
        format!("file://{}", path.trim_end_matches('/'))
    }

    /// Branch HEAD points at, or `None` when detached or unborn.
    ///
    /// # Errors
    ///
    /// Propagates libgit2 failures other than a missing HEAD.
    pub fn current_branch(&self) -> Result<Option<String>> {
        let Some(head) = self.head()? else {
            return Ok(None);
        };
        if head.is_branch() {
            Ok(head.shorthand().map(str::to_owned))
        } else {
            Ok(None)
        }
    }

    /// Revision of HEAD as advertised in provider features.
    ///
    /// # Errors
    ///
    /// Propagates libgit2 failures while resolving HEAD.
    pub fn head_revision(&self) -> Result<Option<Revision>> {
        let Some(head) = self.head()? else {
            return Ok(None);
        };
        let commit = head.resolve()?.peel_to_commit()?;
        let branch = if head.is_branch() {
            head.shorthand()
        } else {
            None
        };
        Ok(Some(describe_head(branch, commit.id().to_string())))
    }

    /// Changed paths split into index and working tree entries, sorted by path.
    ///
    /// # Errors
    ///
    /// Propagates libgit2 status enumeration failures.
    pub fn status(&self) -> Result<Vec<StatusEntry>> {
        let mut opts = StatusOptions::new();
        opts.include_untracked(true)
            .recurse_untracked_dirs(true)
            .renames_head_to_index(true);

        let statuses = self.inner.statuses(Some(&mut opts))?;
        let mut entries = Vec::new();
        for entry in statuses.iter() {
            let Some(path) = entry.path() else {
                continue;
            };
            let status = entry.status();
            if let Some(kind) = index_change(status) {
                entries.push(StatusEntry {
                    path: path.to_owned(),
                    area: StatusArea::Index,
                    kind,
                });
            }
            if let Some(kind) = working_tree_change(status) {
                entries.push(StatusEntry {
                    path: path.to_owned(),
                    area: StatusArea::WorkingTree,
                    kind,
                });
            }
        }
        entries.sort_by(|a, b| a.area.cmp(&b.area).then_with(|| a.path.cmp(&b.path)));
        Ok(entries)
    }

    fn head(&self) -> Result<Option<git2::Reference<'_>>> {
        match self.inner.head() {
            Ok(head) => Ok(Some(head)),
            Err(err)
                if matches!(
                    (err.class(), err.code()),
                    (
                        ErrorClass::Reference,
                        ErrorCode::NotFound | ErrorCode::UnbornBranch
                    )
                ) =>
            {
                Ok(None)
            }
            Err(err) => Err(Error::from(err)),
        }
    }
}

fn index_change(status: Status) -> Option<ChangeKind> {
    if status.is_conflicted() {
        None
    } else if status.is_index_new() {
        Some(ChangeKind::Added)
    } else if status.is_index_modified() {
        Some(ChangeKind::Modified)
    } else if status.is_index_deleted() {
        Some(ChangeKind::Deleted)
    } else if status.is_index_renamed() {
        Some(ChangeKind::Renamed)
    } else if status.is_index_typechange() {
        Some(ChangeKind::TypeChange)
    } else {
        None
    }
}

fn working_tree_change(status: Status) -> Option<ChangeKind> {
    if status.is_conflicted() {
        Some(ChangeKind::Conflicted)
    } else if status.is_wt_new() {
        Some(ChangeKind::Untracked)
    } else if status.is_wt_modified() {
        Some(ChangeKind::Modified)
    } else if status.is_wt_deleted() {
        Some(ChangeKind::Deleted)
    } else if status.is_wt_renamed() {
        Some(ChangeKind::Renamed)
    } else if status.is_wt_typechange() {
        Some(ChangeKind::TypeChange)
    } else {
        None
    }
}

fn display_path(path: &Path) -> String {
    path.to_path_buf()
        .into_os_string()
        .to_string_lossy()
        .into_owned()
}

impl fmt::Debug for Repository {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Repository")
            .field("root", &self.root)
            .finish_non_exhaustive()
    }
}

/// Revision for a HEAD resolved to `id`. A branch without a UTF-8 name is
/// reported like a detached HEAD.
fn describe_head(branch: Option<&str>, id: String) -> Revision {
    match branch {
        Some(branch) => Revision::branch(branch, Some(id)),
        None => Revision {
            id: Some(id),
            ..Revision::default()
        },
    }
}
