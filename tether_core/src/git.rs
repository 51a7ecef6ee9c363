use tether_host_api::CommandOptions;
use tracing::debug;
use url::Url;

use crate::scm::{CommandExecutor, ScmProvider};
use crate::{Error, Result};

const UNCOMMITTED: &str = "0000000000000000000000000000000000000000";

/// Read-only git queries issued through a provider's command channel.
///
/// The runner never spawns git itself; the extension host that owns the
/// provider runs every command in the repository root.
#[derive(Debug, Clone)]
pub struct GitCommandRunner {
    executor: CommandExecutor,
}

impl GitCommandRunner {
    /// Wrap an executor.
    #[must_use]
    pub const fn new(executor: CommandExecutor) -> Self {
        Self { executor }
    }

    /// Runner for `provider`.
    #[must_use]
    pub fn for_provider(provider: &dyn ScmProvider) -> Self {
        Self::new(provider.command_executor())
    }

    /// Revision a thread spanning `start_line..=end_line` (zero-based) of `file` originates from.
    ///
    /// Returns `None` when any line in the span is uncommitted. Lines from
    /// several commits resolve to their common ancestor.
    ///
    /// # Errors
    ///
    /// Propagates command failures unchanged.
    pub async fn blame_origin(
        &self,
        file: &str,
        start_line: u32,
        end_line: u32,
    ) -> Result<Option<String>> {
        let span = format!(
            "{},{}",
            start_line.saturating_add(1),
            end_line.max(start_line).saturating_add(1)
        );
        let output = self
            .run(["blame", "--root", "-l", "-s", "-L", span.as_str(), "--", file])
            .await?;

        let hashes = blame_hashes(&output);
        if hashes.iter().any(|hash| hash == UNCOMMITTED) {
            debug!(file, "blame span includes uncommitted lines");
            return Ok(None);
        }

        match hashes.as_slice() {
            [] => Ok(None),
            [single] => Ok(Some(single.clone())),
            many => {
                let mut args = vec!["merge-base", "--octopus"];
                args.extend(many.iter().map(String::as_str));
                let base = self.run(args).await?;
                let base = base.trim();
                Ok((!base.is_empty()).then(|| base.to_owned()))
            }
        }
    }

    /// Default remote URL reduced to `host/path`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::UnsupportedRemoteUrl`] for local or unknown URL
    /// shapes, and command failures unchanged.
    pub async fn canonical_remote_url(&self) -> Result<String> {
        let raw = self.run(["ls-remote", "--get-url"]).await?;
        canonicalize_remote_url(&raw)
    }

    /// Content of `path` at `revision`.
    ///
    /// # Errors
    ///
    /// Propagates command failures unchanged.
    pub async fn show_file(&self, revision: &str, path: &str) -> Result<String> {
        let object = format!("{revision}:{path}");
        self.run(["show", object.as_str()]).await
    }

    async fn run<'a>(&self, args: impl IntoIterator<Item = &'a str>) -> Result<String> {
        let args = args.into_iter().map(str::to_owned).collect();
        self.executor.execute(args, CommandOptions::default()).await
    }
}

/// Reduce a git remote URL to `host/path`.
///
/// Accepts SCP-like addresses (`user@host:path`) and `http`, `https`, `git`
/// and `ssh` URLs. A trailing slash, a `.git` suffix and percent-encoding are
/// removed first. Local paths and other schemes are rejected because nobody
/// else can reach them.
///
/// # Errors
///
/// Returns [`Error::UnsupportedRemoteUrl`] for any other shape.
pub fn canonicalize_remote_url(raw: &str) -> Result<String> {
    let unsupported = || Error::UnsupportedRemoteUrl {
        url: raw.trim().to_owned(),
    };

    let trimmed = raw.trim().trim_end_matches('/');
    let trimmed = trimmed
        .strip_suffix(".git")
        .unwrap_or(trimmed)
        .trim_end_matches('/');
    let decoded = urlencoding::decode(trimmed).map_err(|_| unsupported())?;

    if let Some((scheme, _)) = decoded.split_once("://") {
        if !matches!(
            scheme.to_ascii_lowercase().as_str(),
            "http" | "https" | "git" | "ssh"
        ) {
            return Err(unsupported());
        }
        let url = Url::parse(&decoded).map_err(|_| unsupported())?;
        let host = url
            .host_str()
            .filter(|host| !host.is_empty())
            .ok_or_else(unsupported)?;
        let path = urlencoding::decode(url.path()).map_err(|_| unsupported())?;
        return join_host_path(host, &path).ok_or_else(unsupported);
    }

    let (authority, path) = decoded.split_once(':').ok_or_else(unsupported)?;
    if is_drive_letter(authority) {
        return Err(unsupported());
    }
    let host = authority
        .rsplit_once('@')
        .map_or(authority, |(_, host)| host);
    if host.contains('/') || host.contains('\\') || path.contains('\\') {
        return Err(unsupported());
    }
    join_host_path(host, path).ok_or_else(unsupported)
}

/// `C` in `C:/repos/app.git` names a Windows drive, not a host.
fn is_drive_letter(authority: &str) -> bool {
    let mut chars = authority.chars();
    matches!((chars.next(), chars.next()), (Some(c), None) if c.is_ascii_alphabetic())
}

fn join_host_path(host: &str, path: &str) -> Option<String> {
    let path = path.trim_matches('/');
    if host.is_empty() || path.is_empty() {
        return None;
    }
    Some(format!("{host}/{path}"))
}

/// Unique commit hashes of `git blame -l -s` output in first-seen order.
fn blame_hashes(output: &str) -> Vec<String> {
    let mut hashes: Vec<String> = Vec::new();
    for line in output.lines() {
        let Some(token) = line.split_whitespace().next() else {
            continue;
        };
        let hash = token.trim_start_matches('^');
        if !hashes.iter().any(|seen| seen == hash) {
            hashes.push(hash.to_owned());
        }
    }
    hashes
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scp_like_remote_is_canonicalized() {
        assert_eq!(
            canonicalize_remote_url("git@github.com:sourcegraph/sourcegraph.git\n")
                .expect("canonical"),
            "github.com/sourcegraph/sourcegraph"
        );
        assert_eq!(
            canonicalize_remote_url("github.com:owner/repo").expect("canonical"),
            "github.com/owner/repo"
        );
    }

    #[test]
    fn protocol_remote_is_canonicalized() {
        assert_eq!(
            canonicalize_remote_url("https://user@github.com/sourcegraph/sourcegraph/")
                .expect("canonical"),
            "github.com/sourcegraph/sourcegraph"
        );
        assert_eq!(
            canonicalize_remote_url("ssh://git@example.org:2222/team/app.git")
                .expect("canonical"),
            "example.org/team/app"
        );
        assert_eq!(
            canonicalize_remote_url("git://example.org/my%20repo").expect("canonical"),
            "example.org/my repo"
        );
    }

    #[test]
    fn local_remotes_are_rejected() {
        for url in [
            "/foo/bar.git",
            "file:///foo/bar.git",
            "../sibling",
            "ftp://host/x",
            "C:/repos/app.git",
            "d:/work/app",
            "C:\\repos\\app.git",
        ] {
            let err = canonicalize_remote_url(url).expect_err(url);
            assert!(
                matches!(err, Error::UnsupportedRemoteUrl { .. }),
                "unexpected error for {url}: {err}"
            );
        }
    }

    #[test]
    fn blame_hashes_strip_boundary_marker_and_dedupe() {
        let output = "\
^1111111111111111111111111111111111111111 1) first
2222222222222222222222222222222222222222 2) second
1111111111111111111111111111111111111111 3) third
";
        assert_eq!(
            blame_hashes(output),
            vec![
                "1111111111111111111111111111111111111111".to_owned(),
                "2222222222222222222222222222222222222222".to_owned(),
            ]
        );
    }
}
