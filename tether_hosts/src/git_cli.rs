use std::collections::HashMap;
use std::env;
use std::ffi::OsString;
use std::io::{self, Read, Write};
use std::path::{Path, PathBuf};
use std::process::{Child, Command, Stdio};
use std::sync::Mutex;
use std::thread;
use std::time::Duration;

use async_trait::async_trait;
use tether_api::SourceControlHandle;
use tether_host_api::{CommandOptions, ExtHostScm, HostError, HostResult};
use tracing::debug;
use wait_timeout::ChildExt;

const DEFAULT_TIMEOUT_SECS: u64 = 60;
const BINARY_ENV: &str = "TETHER_GIT_BIN";
const TIMEOUT_ENV: &str = "TETHER_GIT_TIMEOUT_SECS";

/// How the git binary is located and bounded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GitCliConfig {
    /// Executable to spawn.
    pub binary: OsString,
    /// Upper bound on a single invocation.
    pub timeout: Duration,
}

impl GitCliConfig {
    /// Read `TETHER_GIT_BIN` and `TETHER_GIT_TIMEOUT_SECS`, falling back to defaults.
    #[must_use]
    pub fn from_env() -> Self {
        let binary = env::var_os(BINARY_ENV).unwrap_or_else(|| OsString::from("git"));
        let seconds = env::var(TIMEOUT_ENV)
            .ok()
            .and_then(|value| value.trim().parse::<u64>().ok())
            .unwrap_or(DEFAULT_TIMEOUT_SECS);
        Self {
            binary,
            timeout: Duration::from_secs(seconds),
        }
    }
}

impl Default for GitCliConfig {
    fn default() -> Self {
        Self {
            binary: OsString::from("git"),
            timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
        }
    }
}

#[derive(Debug, Clone)]
struct GitCli {
    config: GitCliConfig,
}

impl GitCli {
    fn command(&self, cwd: &Path, args: &[String], piped_stdin: bool) -> Command {
        let mut command = Command::new(&self.config.binary);
        command
            .args(args)
            .current_dir(cwd)
            .env("GIT_TERMINAL_PROMPT", "0")
            .stdin(if piped_stdin {
                Stdio::piped()
            } else {
                Stdio::null()
            })
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());
        command
    }

    fn run(&self, cwd: &Path, args: &[String], stdin_payload: Option<&str>) -> HostResult<String> {
        let mut child = self
            .command(cwd, args, stdin_payload.is_some())
            .spawn()
            .map_err(|err| HostError::message(format!("failed to spawn git: {err}")))?;

        // Readers must run before the stdin write: a child stuck on a full
        // stdout stops reading stdin.
        let stdout = child.stdout.take().map(drain);
        let stderr = child.stderr.take().map(drain);

        if let (Some(body), Some(mut pipe)) = (stdin_payload, child.stdin.take()) {
            if let Err(err) = pipe.write_all(body.as_bytes()) {
                reap(&mut child);
                return Err(HostError::message(format!(
                    "failed to write to git stdin: {err}"
                )));
            }
        }

        let status = match child.wait_timeout(self.config.timeout) {
            Ok(Some(status)) => status,
            Ok(None) => {
                reap(&mut child);
                debug!(timeout = ?self.config.timeout, "git timed out");
                return Err(HostError::Timeout {
                    seconds: self.config.timeout.as_secs(),
                });
            }
            Err(err) => {
                reap(&mut child);
                return Err(HostError::message(format!("failed waiting on git: {err}")));
            }
        };

        let stdout = collect(stdout, "stdout")?;
        let stderr = collect(stderr, "stderr")?;
        if status.success() {
            return Ok(stdout);
        }
        Err(HostError::CommandFailed {
            status: status
                .code()
                .map_or_else(|| "terminated".to_owned(), |code| code.to_string()),
            stderr: stderr.trim().to_owned(),
        })
    }
}

type Drain = thread::JoinHandle<io::Result<Vec<u8>>>;

fn drain(mut pipe: impl Read + Send + 'static) -> Drain {
    thread::spawn(move || {
        let mut buffer = Vec::new();
        pipe.read_to_end(&mut buffer)?;
        Ok(buffer)
    })
}

fn reap(child: &mut Child) {
    let _ = child.kill();
    let _ = child.wait();
}

fn collect(handle: Option<Drain>, stream: &str) -> HostResult<String> {
    let Some(handle) = handle else {
        return Ok(String::new());
    };
    let bytes = handle
        .join()
        .map_err(|_| HostError::message(format!("git {stream} reader panicked")))?
        .map_err(|err| HostError::message(format!("failed to read git {stream}: {err}")))?;
    Ok(String::from_utf8_lossy(&bytes).into_owned())
}

/// Host that runs provider commands with the local git binary.
///
/// Each source control handle is bound to the working directory its commands
/// run in; commands for unbound handles are rejected.
#[derive(Debug)]
pub struct GitCliHost {
    cli: GitCli,
    roots: Mutex<HashMap<SourceControlHandle, PathBuf>>,
    input_values: Mutex<HashMap<SourceControlHandle, String>>,
}

impl GitCliHost {
    /// Construct a host configured from the environment.
    #[must_use]
    pub fn new() -> Self {
        Self::with_config(GitCliConfig::from_env())
    }

    /// Construct a host with an explicit configuration.
    #[must_use]
    pub fn with_config(config: GitCliConfig) -> Self {
        Self {
            cli: GitCli { config },
            roots: Mutex::new(HashMap::new()),
            input_values: Mutex::new(HashMap::new()),
        }
    }

    /// Bind `source_control` to the directory its commands run in.
    pub fn register_root(&self, source_control: SourceControlHandle, root: impl Into<PathBuf>) {
        let mut roots = self
            .roots
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner);
        roots.insert(source_control, root.into());
    }

    /// Forget the binding for `source_control`.
    pub fn unregister_root(&self, source_control: SourceControlHandle) {
        let mut roots = self
            .roots
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner);
        roots.remove(&source_control);
    }

    /// Last input box value echoed by the core for `source_control`.
    #[must_use]
    pub fn input_box_value(&self, source_control: SourceControlHandle) -> Option<String> {
        self.input_values
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .get(&source_control)
            .cloned()
    }

    fn root(&self, source_control: SourceControlHandle) -> HostResult<PathBuf> {
        let roots = self
            .roots
            .lock()
            .map_err(|_| HostError::message("git root registry poisoned"))?;
        roots
            .get(&source_control)
            .cloned()
            .ok_or(HostError::UnknownSourceControl {
                handle: source_control.0,
            })
    }
}

impl Default for GitCliHost {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ExtHostScm for GitCliHost {
    async fn execute_command(
        &self,
        source_control: SourceControlHandle,
        args: Vec<String>,
        options: CommandOptions,
    ) -> HostResult<String> {
        let root = self.root(source_control)?;
        let cli = self.cli.clone();
        debug!(%source_control, ?args, "running git");
        tokio::task::spawn_blocking(move || cli.run(&root, &args, options.stdin.as_deref()))
            .await
            .map_err(|err| HostError::message(format!("git task failed: {err}")))?
    }

    async fn provide_original_resource(
        &self,
        source_control: SourceControlHandle,
        uri: String,
    ) -> HostResult<Option<String>> {
        self.root(source_control)?;
        Ok(Some(format!("git:{uri}?ref=HEAD")))
    }

    fn input_box_value_changed(&self, source_control: SourceControlHandle, value: &str) {
        let mut values = self
            .input_values
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner);
        values.insert(source_control, value.to_owned());
    }
}
