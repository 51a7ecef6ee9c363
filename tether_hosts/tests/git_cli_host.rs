use std::fs;
use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use std::time::{Duration, Instant};

use tempfile::TempDir;
use tether_api::SourceControlHandle;
use tether_host_api::{CommandOptions, ExtHostScm, HostError};
use tether_hosts::{GitCliConfig, GitCliHost};

const HANDLE: SourceControlHandle = SourceControlHandle(1);

static TEST_GUARD: Mutex<()> = Mutex::new(());

#[tokio::test]
async fn runs_commands_in_registered_root() {
    let _lock = TEST_GUARD.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
    let mock = MockGit::new(MockMode::Success);
    let host = mock.host();

    let stdout = host
        .execute_command(
            HANDLE,
            vec!["rev-parse".into(), "--show-toplevel".into()],
            CommandOptions::default(),
        )
        .await
        .expect("execute command");

    let expected = fs::canonicalize(mock.root()).expect("canonical root");
    let reported = fs::canonicalize(stdout.trim()).expect("canonical reported");
    assert_eq!(reported, expected);

    let captured = fs::read_to_string(mock.capture_path()).expect("capture file");
    assert_eq!(captured.trim(), "rev-parse --show-toplevel");
}

#[tokio::test]
async fn forwards_stdin_payload() {
    let _lock = TEST_GUARD.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
    let mock = MockGit::new(MockMode::Success);
    let host = mock.host();

    let stdout = host
        .execute_command(
            HANDLE,
            vec!["hash-object".into(), "--stdin".into()],
            CommandOptions::with_stdin("payload body"),
        )
        .await
        .expect("execute command");

    assert_eq!(stdout, "payload body");
}

#[tokio::test]
async fn large_stdin_payload_does_not_deadlock() {
    let _lock = TEST_GUARD.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
    let mock = MockGit::new(MockMode::Success);
    let host = mock.host();
    let payload = "0123456789abcdef\n".repeat(32 * 1024);

    let stdout = host
        .execute_command(
            HANDLE,
            vec!["hash-object".into(), "--stdin".into()],
            CommandOptions::with_stdin(payload.clone()),
        )
        .await
        .expect("execute command");

    assert_eq!(stdout.len(), payload.len());
    assert_eq!(stdout, payload);
}

#[tokio::test]
async fn reports_non_zero_exit_with_stderr() {
    let _lock = TEST_GUARD.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
    let mock = MockGit::new(MockMode::Fails);
    let host = mock.host();

    let err = host
        .execute_command(HANDLE, vec!["log".into()], CommandOptions::default())
        .await
        .expect_err("command fails");

    match err {
        HostError::CommandFailed { status, stderr } => {
            assert_eq!(status, "128");
            assert_eq!(stderr, "fatal: not a git repository");
        }
        other => panic!("expected CommandFailed, got {other:?}"),
    }
}

#[tokio::test]
async fn hung_command_is_killed_after_timeout() {
    let _lock = TEST_GUARD.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
    let mock = MockGit::new(MockMode::Hangs);
    let host = mock.host_with_timeout(Duration::from_millis(200));

    let started = Instant::now();
    let err = host
        .execute_command(HANDLE, vec!["fetch".into()], CommandOptions::default())
        .await
        .expect_err("command hangs");

    assert!(matches!(err, HostError::Timeout { .. }), "got {err:?}");
    assert!(
        started.elapsed() < Duration::from_secs(3),
        "timeout took {:?}",
        started.elapsed()
    );
}

#[tokio::test]
async fn unregistered_root_is_rejected() {
    let _lock = TEST_GUARD.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
    let mock = MockGit::new(MockMode::Success);
    let host = mock.host();
    host.unregister_root(HANDLE);

    let err = host
        .execute_command(HANDLE, vec!["status".into()], CommandOptions::default())
        .await
        .expect_err("root removed");
    assert!(matches!(err, HostError::UnknownSourceControl { handle: 1 }));
}

#[tokio::test]
async fn original_resource_points_at_head() {
    let _lock = TEST_GUARD.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
    let mock = MockGit::new(MockMode::Success);
    let host = mock.host();

    let original = host
        .provide_original_resource(HANDLE, "file:///repo/src/lib.rs".into())
        .await
        .expect("original resource");
    assert_eq!(
        original.as_deref(),
        Some("git:file:///repo/src/lib.rs?ref=HEAD")
    );
}

struct MockGit {
    root: TempDir,
    script: PathBuf,
    capture: PathBuf,
}

enum MockMode {
    Success,
    Fails,
    Hangs,
}

impl MockGit {
    fn new(mode: MockMode) -> Self {
        let root = TempDir::new().expect("temp dir");
        let script = root.path().join("git_mock.sh");
        let capture = root.path().join("capture.txt");
        write_script(&script, &capture, &mode);
        Self {
            root,
            script,
            capture,
        }
    }

    fn host(&self) -> GitCliHost {
        self.host_with_timeout(Duration::from_secs(10))
    }

    fn host_with_timeout(&self, timeout: Duration) -> GitCliHost {
        let host = GitCliHost::with_config(GitCliConfig {
            binary: self.script.clone().into_os_string(),
            timeout,
        });
        host.register_root(HANDLE, self.root.path());
        host
    }

    fn root(&self) -> &Path {
        self.root.path()
    }

    fn capture_path(&self) -> &Path {
        &self.capture
    }
}

fn write_script(script_path: &Path, capture_path: &Path, mode: &MockMode) {
    let body = match mode {
        MockMode::Success => r#"if [ "$1" = "rev-parse" ]; then
  pwd
  exit 0
fi

if [ "$1" = "hash-object" ]; then
  cat
  exit 0
fi

exit 0"#
            .to_string(),
        MockMode::Fails => r#"echo "fatal: not a git repository" >&2
exit 128"#
            .to_string(),
        MockMode::Hangs => "exec sleep 5".to_string(),
    };

    let content = format!(
        r#"#!/bin/sh

set -eu

printf "%s\n" "$*" > "{capture}"

{body}
"#,
        capture = capture_path.display(),
    );
    fs::write(script_path, content).expect("write mock script");
    let mut perms = fs::metadata(script_path).expect("metadata").permissions();
    perms.set_mode(0o755);
    fs::set_permissions(script_path, perms).expect("set perms");
    fs::write(capture_path, "").expect("init capture");
}
