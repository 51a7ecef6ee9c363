//! Shared Tether data models consumed by the SCM core and host crates.

pub mod comments;
pub mod diff;
pub mod protocol;
pub mod revision;
pub mod scm;

pub use comments::*;
pub use diff::*;
pub use protocol::*;
pub use revision::*;
pub use scm::*;
