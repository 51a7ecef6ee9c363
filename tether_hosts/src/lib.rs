//! Extension hosts that ship with Tether.

mod git_cli;
mod memory_comments;

pub use git_cli::{GitCliConfig, GitCliHost};
pub use memory_comments::{MemoryBranchComments, MemoryComments};
