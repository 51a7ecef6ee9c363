use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use tether_core::git::GitCommandRunner;
use tether_core::scm::{MainThreadScmProvider, ScmProvider};
use tether_core::{Error, SourceControlHandle};
use tether_host_api::{CommandOptions, ExtHostScm, HostError, HostResult};

const ZERO: &str = "0000000000000000000000000000000000000000";
const A: &str = "aaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaa";
const B: &str = "bbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbb";
const BASE: &str = "cccccccccccccccccccccccccccccccccccccccc";

/// Answers commands from a table keyed by the joined argument list.
#[derive(Default)]
struct ScriptedHost {
    replies: Mutex<HashMap<String, HostResult<String>>>,
    calls: Mutex<Vec<Vec<String>>>,
}

impl ScriptedHost {
    fn reply(&self, args: &str, output: &str) {
        self.replies
            .lock()
            .expect("replies lock")
            .insert(args.to_owned(), Ok(output.to_owned()));
    }

    fn fail(&self, args: &str, stderr: &str) {
        self.replies.lock().expect("replies lock").insert(
            args.to_owned(),
            Err(HostError::CommandFailed {
                status: "128".into(),
                stderr: stderr.into(),
            }),
        );
    }

    fn calls(&self) -> Vec<Vec<String>> {
        self.calls.lock().expect("calls lock").clone()
    }
}

#[async_trait]
impl ExtHostScm for ScriptedHost {
    async fn execute_command(
        &self,
        _source_control: SourceControlHandle,
        args: Vec<String>,
        _options: CommandOptions,
    ) -> HostResult<String> {
        let key = args.join(" ");
        self.calls.lock().expect("calls lock").push(args);
        match self.replies.lock().expect("replies lock").remove(&key) {
            Some(reply) => reply,
            None => Err(HostError::Failure {
                message: format!("unexpected command: {key}"),
            }),
        }
    }

    async fn provide_original_resource(
        &self,
        _source_control: SourceControlHandle,
        _uri: String,
    ) -> HostResult<Option<String>> {
        Ok(None)
    }

    fn input_box_value_changed(&self, _source_control: SourceControlHandle, _value: &str) {}
}

fn runner(host: &Arc<ScriptedHost>) -> (MainThreadScmProvider, GitCommandRunner) {
    let provider = MainThreadScmProvider::new(
        SourceControlHandle(1),
        "scm1",
        "Git",
        "git",
        Some("file:///repo".into()),
        host.clone(),
    );
    let runner = GitCommandRunner::for_provider(&provider);
    (provider, runner)
}

fn blame_line(hash: &str, line: u32) -> String {
    format!("{hash} {line}) content\n")
}

#[tokio::test]
async fn blame_with_single_commit_returns_it() {
    let host = Arc::new(ScriptedHost::default());
    host.reply(
        "blame --root -l -s -L 3,4 -- src/lib.rs",
        &(blame_line(A, 3) + &blame_line(&format!("^{A}"), 4)),
    );
    let (_provider, runner) = runner(&host);

    let origin = runner.blame_origin("src/lib.rs", 2, 3).await.expect("blame");

    assert_eq!(origin.as_deref(), Some(A));
    assert_eq!(host.calls().len(), 1);
}

#[tokio::test]
async fn blame_with_uncommitted_line_has_no_origin() {
    let host = Arc::new(ScriptedHost::default());
    host.reply(
        "blame --root -l -s -L 1,3 -- a.rs",
        &(blame_line(A, 1) + &blame_line(ZERO, 2) + &blame_line(B, 3)),
    );
    let (_provider, runner) = runner(&host);

    let origin = runner.blame_origin("a.rs", 0, 2).await.expect("blame");

    assert_eq!(origin, None);
    assert_eq!(host.calls().len(), 1, "no merge-base for uncommitted spans");
}

#[tokio::test]
async fn blame_with_several_commits_uses_merge_base() {
    let host = Arc::new(ScriptedHost::default());
    host.reply(
        "blame --root -l -s -L 1,3 -- a.rs",
        &(blame_line(A, 1) + &blame_line(B, 2) + &blame_line(A, 3)),
    );
    host.reply(&format!("merge-base --octopus {A} {B}"), &format!("{BASE}\n"));
    let (_provider, runner) = runner(&host);

    let origin = runner.blame_origin("a.rs", 0, 2).await.expect("blame");

    assert_eq!(origin.as_deref(), Some(BASE));
}

#[tokio::test]
async fn remote_url_is_canonicalized() {
    let host = Arc::new(ScriptedHost::default());
    host.reply(
        "ls-remote --get-url",
        "git@github.com:sourcegraph/sourcegraph.git\n",
    );
    let (_provider, runner) = runner(&host);

    assert_eq!(
        runner.canonical_remote_url().await.expect("remote"),
        "github.com/sourcegraph/sourcegraph"
    );
}

#[tokio::test]
async fn local_remote_is_reported() {
    let host = Arc::new(ScriptedHost::default());
    host.reply("ls-remote --get-url", "/srv/git/project.git\n");
    let (_provider, runner) = runner(&host);

    let err = runner.canonical_remote_url().await.expect_err("local path");

    assert!(matches!(err, Error::UnsupportedRemoteUrl { ref url } if url == "/srv/git/project.git"));
    assert_eq!(err.to_string(), "unsupported remote url format: /srv/git/project.git");
}

#[tokio::test]
async fn show_file_passes_output_through() {
    let host = Arc::new(ScriptedHost::default());
    host.reply("show abc123:src/main.rs", "fn main() {}\n");
    let (_provider, runner) = runner(&host);

    let content = runner.show_file("abc123", "src/main.rs").await.expect("show");

    assert_eq!(content, "fn main() {}\n");
}

#[tokio::test]
async fn command_failures_propagate_untouched() {
    let host = Arc::new(ScriptedHost::default());
    host.fail("show HEAD:missing.rs", "fatal: path 'missing.rs' does not exist");
    let (_provider, runner) = runner(&host);

    let err = runner.show_file("HEAD", "missing.rs").await.expect_err("failure");

    match err {
        Error::Host {
            source: HostError::CommandFailed { status, stderr },
        } => {
            assert_eq!(status, "128");
            assert!(stderr.contains("does not exist"));
        }
        other => panic!("unexpected error: {other}"),
    }
}

#[tokio::test]
async fn runner_stops_after_provider_disposal() {
    let host = Arc::new(ScriptedHost::default());
    host.reply("show HEAD:a.rs", "a");
    let (mut provider, runner) = runner(&host);

    provider.dispose();
    let err = runner.show_file("HEAD", "a.rs").await.expect_err("disposed");

    assert!(matches!(err, Error::ProviderDisposed { .. }));
    assert!(host.calls().is_empty());
}
