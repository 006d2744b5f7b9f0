use crate::{
    types::{T8nInput, T8nOutput, T8nRequest},
    CancelToken, TransitionTool, TransitionToolError,
};
use std::{
    fs,
    io::{self, Read, Write},
    path::{Path, PathBuf},
    process::{Child, ChildStdin, Command, Stdio},
    sync::{
        atomic::{AtomicUsize, Ordering},
        Arc,
    },
    thread,
    time::{Duration, Instant},
};
use tracing::{debug, warn};

/// Interval at which a running evaluator is checked for exit, timeout and
/// cancellation.
const POLL_INTERVAL: Duration = Duration::from_millis(5);

/// Default per-call timeout.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(60);

/// Runs an external `t8n` binary, one process per call.
///
/// The request goes to stdin as a single `{alloc, env, txs}` document and
/// the evaluator writes `{alloc, result, body}` to stdout:
///
/// ```text
/// <binary> [args..] t8n --input.alloc=stdin --input.env=stdin --input.txs=stdin
///     --output.result=stdout --output.alloc=stdout --output.body=stdout
///     --state.fork=<fork> --state.chainid=<id> --state.reward=<reward>
/// ```
#[derive(Debug)]
pub struct ExternalTool {
    binary: PathBuf,
    args: Vec<String>,
    timeout: Duration,
    dump_dir: Option<PathBuf>,
    calls: AtomicUsize,
}

impl ExternalTool {
    /// A client for `binary` with the default timeout.
    pub fn new(binary: impl Into<PathBuf>) -> Self {
        Self {
            binary: binary.into(),
            args: Vec::new(),
            timeout: DEFAULT_TIMEOUT,
            dump_dir: None,
            calls: AtomicUsize::new(0),
        }
    }

    /// Arguments placed before the `t8n` subcommand.
    pub fn with_args(mut self, args: impl IntoIterator<Item = impl Into<String>>) -> Self {
        self.args = args.into_iter().map(Into::into).collect();
        self
    }

    /// Per-call timeout.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Writes every call's input, output and stderr under
    /// `<dir>/<case id>/<call number>/`.
    pub fn with_dump_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.dump_dir = Some(dir.into());
        self
    }

    /// Evaluator binary.
    pub fn binary(&self) -> &Path {
        &self.binary
    }

    fn command(&self, request: &T8nRequest) -> Command {
        let reward = request
            .reward
            .map_or_else(|| "-1".to_string(), |r| r.to_string());
        let mut cmd = Command::new(&self.binary);
        cmd.args(&self.args)
            .arg("t8n")
            .args([
                "--input.alloc=stdin",
                "--input.env=stdin",
                "--input.txs=stdin",
                "--output.result=stdout",
                "--output.alloc=stdout",
                "--output.body=stdout",
            ])
            .arg(format!("--state.fork={}", request.fork))
            .arg(format!("--state.chainid={}", request.chain_id))
            .arg(format!("--state.reward={reward}"))
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());
        cmd
    }

    fn dump(&self, request: &T8nRequest, call: usize, input: &[u8], stdout: &[u8], stderr: &[u8]) {
        let Some(root) = &self.dump_dir else {
            return;
        };
        let dir = root.join(sanitize(&request.case_id)).join(call.to_string());
        let result = fs::create_dir_all(&dir).and_then(|()| {
            fs::write(dir.join("input.json"), input)?;
            fs::write(dir.join("output.json"), stdout)?;
            fs::write(dir.join("stderr.txt"), stderr)
        });
        if let Err(err) = result {
            warn!(dir = %dir.display(), %err, "failed to write t8n dump");
        }
    }
}

/// Keeps a case id usable as a single path component.
fn sanitize(id: &str) -> String {
    id.chars()
        .map(|c| match c {
            '/' | '\\' | ':' | '*' | '?' | '"' | '<' | '>' | '|' => '_',
            c => c,
        })
        .collect()
}

/// Time given to the pipe threads once the evaluator has exited or been
/// killed.
const PIPE_GRACE: Duration = Duration::from_millis(100);

/// Drains a pipe on its own thread so the child never blocks on a full pipe.
fn drain(mut pipe: impl Read + Send + 'static) -> thread::JoinHandle<Vec<u8>> {
    thread::spawn(move || {
        let mut buf = Vec::new();
        let _ = pipe.read_to_end(&mut buf);
        buf
    })
}

/// Writes the request on its own thread. The pipe closes when the write
/// ends; killing the child unblocks a write the child never reads.
fn feed(mut pipe: ChildStdin, input: Arc<[u8]>) -> thread::JoinHandle<io::Result<()>> {
    thread::spawn(move || pipe.write_all(&input))
}

/// Joins a pipe thread unless it is still blocked at `deadline`, which
/// happens when a process started by the evaluator inherited the pipe. Such a
/// thread is detached and ends once that process closes the pipe.
fn join_by<T>(handle: thread::JoinHandle<T>, deadline: Instant) -> Option<T> {
    while !handle.is_finished() {
        if Instant::now() >= deadline {
            debug!("pipe still open past the deadline, detaching its thread");
            return None;
        }
        thread::sleep(POLL_INTERVAL);
    }
    handle.join().ok()
}

/// The pipe threads of a running evaluator.
struct Pipes {
    stdin: Option<thread::JoinHandle<io::Result<()>>>,
    stdout: Option<thread::JoinHandle<Vec<u8>>>,
    stderr: Option<thread::JoinHandle<Vec<u8>>>,
}

impl Pipes {
    fn attach(child: &mut Child, input: Arc<[u8]>) -> Self {
        Self {
            stdin: child.stdin.take().map(|pipe| feed(pipe, input)),
            stdout: child.stdout.take().map(drain),
            stderr: child.stderr.take().map(drain),
        }
    }

    /// Kills the child and reaps the pipe threads within [`PIPE_GRACE`].
    fn kill(self, child: &mut Child) {
        let _ = child.kill();
        let _ = child.wait();
        let deadline = Instant::now() + PIPE_GRACE;
        if let Some(h) = self.stdin {
            join_by(h, deadline);
        }
        if let Some(h) = self.stdout {
            join_by(h, deadline);
        }
        if let Some(h) = self.stderr {
            join_by(h, deadline);
        }
    }
}

impl TransitionTool for ExternalTool {
    fn name(&self) -> String {
        self.binary.display().to_string()
    }

    fn evaluate(
        &self,
        request: &T8nRequest,
        cancel: &CancelToken,
    ) -> Result<T8nOutput, TransitionToolError> {
        if cancel.is_cancelled() {
            return Err(TransitionToolError::Cancelled);
        }
        let call = self.calls.fetch_add(1, Ordering::Relaxed);
        let input: Arc<[u8]> = serde_json::to_vec(&T8nInput::from(request))?.into();
        let spawn_error = |source| TransitionToolError::Spawn {
            binary: self.name(),
            source,
        };

        debug!(
            case = %request.case_id,
            fork = %request.fork,
            txs = request.txs.len(),
            "running t8n"
        );
        let started = Instant::now();
        let deadline = started + self.timeout;
        let mut child = self.command(request).spawn().map_err(spawn_error)?;
        let pipes = Pipes::attach(&mut child, input.clone());

        let status = loop {
            let polled = match child.try_wait() {
                Ok(polled) => polled,
                Err(err) => {
                    pipes.kill(&mut child);
                    return Err(spawn_error(err));
                }
            };
            match polled {
                Some(status) => break status,
                None if cancel.is_cancelled() => {
                    pipes.kill(&mut child);
                    debug!(case = %request.case_id, "t8n killed on cancellation");
                    return Err(TransitionToolError::Cancelled);
                }
                None if Instant::now() >= deadline => {
                    pipes.kill(&mut child);
                    warn!(case = %request.case_id, timeout = ?self.timeout, "t8n timed out");
                    return Err(TransitionToolError::Timeout(self.timeout));
                }
                None => thread::sleep(POLL_INTERVAL),
            }
        };

        // the output is complete only once both pipes reach end of file
        let grace = deadline.max(Instant::now() + PIPE_GRACE);
        let stdout = pipes.stdout.map_or(Some(Vec::new()), |h| join_by(h, grace));
        let stderr = pipes.stderr.map_or(Some(Vec::new()), |h| join_by(h, grace));
        let (Some(stdout), Some(stderr)) = (stdout, stderr) else {
            warn!(case = %request.case_id, "t8n exited but its output pipes stayed open");
            return Err(TransitionToolError::Timeout(self.timeout));
        };
        match pipes.stdin.and_then(|h| join_by(h, grace)) {
            // exited without reading its input; the exit status tells why
            Some(Err(err)) if err.kind() != io::ErrorKind::BrokenPipe => {
                return Err(spawn_error(err));
            }
            _ => {}
        }
        self.dump(request, call, &input, &stdout, &stderr);
        debug!(
            case = %request.case_id,
            elapsed = ?started.elapsed(),
            %status,
            "t8n finished"
        );

        let text = |bytes: &[u8]| String::from_utf8_lossy(bytes).into_owned();
        if !status.success() {
            return Err(TransitionToolError::Exit {
                status: status.to_string(),
                stdout: text(&stdout),
                stderr: text(&stderr),
            });
        }
        serde_json::from_slice(&stdout).map_err(|err| TransitionToolError::MalformedOutput {
            reason: err.to_string(),
            stdout: text(&stdout),
            stderr: text(&stderr),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn case_ids_become_single_path_components() {
        assert_eq!(
            sanitize("tests/transfer[fork_Cancun-state_test]"),
            "tests_transfer[fork_Cancun-state_test]"
        );
    }

    #[test]
    fn missing_binary_is_a_spawn_error() {
        let tool = ExternalTool::new("/nonexistent/evm");
        let request = crate::tests::request();
        assert!(matches!(
            tool.evaluate(&request, &CancelToken::new()),
            Err(TransitionToolError::Spawn { .. })
        ));
    }

    #[test]
    fn cancelled_before_start() {
        let tool = ExternalTool::new("/nonexistent/evm");
        let cancel = CancelToken::new();
        cancel.cancel();
        assert!(matches!(
            tool.evaluate(&crate::tests::request(), &cancel),
            Err(TransitionToolError::Cancelled)
        ));
    }
}
