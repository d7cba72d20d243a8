//! Spawning external processes with combined output capture and a deadline.
//!
//! Every process is started in its own process group. When the deadline
//! passes, the whole group is killed and the child is reaped, so solutions
//! that fork helpers do not leave orphans behind.

use std::io;
use std::process::{ExitStatus, Stdio};
use std::time::Duration;

use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::process::{Child, ChildStderr, ChildStdout, Command};
use tokio::time::Instant;
use tracing::debug;

const CHUNK_SIZE: usize = 8192;

/// Captured result of a process run.
#[derive(Debug, Clone)]
pub struct CapturedOutput {
    /// Exit status, `None` when the process was killed at the deadline.
    pub status: Option<ExitStatus>,
    /// Interleaved stdout and stderr bytes.
    pub output: Vec<u8>,
    /// Whether the deadline expired.
    pub timed_out: bool,
}

impl CapturedOutput {
    /// Lossy UTF-8 view of the combined output.
    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.output).to_string()
    }

    /// Whether the process exited with status zero.
    pub fn success(&self) -> bool {
        self.status.map(|s| s.success()).unwrap_or(false)
    }

    /// Exit code, or -1 when killed or terminated by a signal.
    pub fn exit_code(&self) -> i32 {
        self.status.and_then(|s| s.code()).unwrap_or(-1)
    }
}

/// How long pipes are still drained after the process itself has exited.
///
/// Helpers left running in the background may hold the pipes open forever;
/// they are killed with the process group once this elapses.
const DRAIN_GRACE: Duration = Duration::from_millis(250);

/// Runs `cmd` to completion, capturing stdout and stderr into one buffer.
///
/// With a `deadline`, a process still running at that instant is killed
/// together with its process group and reported with `timed_out` set. The
/// output read before the deadline is kept.
pub async fn run_captured(
    mut cmd: Command,
    deadline: Option<Instant>,
) -> io::Result<CapturedOutput> {
    cmd.stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true);
    #[cfg(unix)]
    {
        cmd.process_group(0);
    }

    let mut child = cmd.spawn()?;
    let mut pipes = OutputPipes {
        stdout: child.stdout.take(),
        stderr: child.stderr.take(),
    };
    let mut output = Vec::new();

    let finished = match deadline {
        Some(at) => tokio::time::timeout_at(at, drive(&mut child, &mut pipes, &mut output))
            .await
            .ok(),
        None => Some(drive(&mut child, &mut pipes, &mut output).await),
    };

    match finished {
        Some(status) => Ok(CapturedOutput {
            status: Some(status?),
            output,
            timed_out: false,
        }),
        None => {
            terminate(&mut child).await;
            Ok(CapturedOutput {
                status: None,
                output,
                timed_out: true,
            })
        }
    }
}

/// Reads output until the child exits, then drains what is left in the pipes
/// for a short while and kills whatever the child left behind.
async fn drive(
    child: &mut Child,
    pipes: &mut OutputPipes,
    output: &mut Vec<u8>,
) -> io::Result<ExitStatus> {
    let status = loop {
        tokio::select! {
            status = child.wait() => break status?,
            chunk = pipes.next_chunk(), if pipes.is_open() => output.extend_from_slice(&chunk),
        }
    };

    if tokio::time::timeout(DRAIN_GRACE, pipes.drain_into(output))
        .await
        .is_err()
    {
        debug!("Pipes still open after exit, killing leftover processes");
    }
    kill_group(child);
    Ok(status)
}

/// The child's output pipes; a pipe is dropped once it reaches EOF.
struct OutputPipes {
    stdout: Option<ChildStdout>,
    stderr: Option<ChildStderr>,
}

impl OutputPipes {
    fn is_open(&self) -> bool {
        self.stdout.is_some() || self.stderr.is_some()
    }

    /// Next chunk from whichever pipe is ready first. Empty when a pipe closed.
    async fn next_chunk(&mut self) -> Vec<u8> {
        let mut out_buf = vec![0u8; CHUNK_SIZE];
        let mut err_buf = vec![0u8; CHUNK_SIZE];

        let (read, from_stdout) = tokio::select! {
            read = read_pipe(self.stdout.as_mut(), &mut out_buf), if self.stdout.is_some() => (read, true),
            read = read_pipe(self.stderr.as_mut(), &mut err_buf), if self.stderr.is_some() => (read, false),
            else => return Vec::new(),
        };

        match read {
            Ok(n) if n > 0 => {
                let mut chunk = if from_stdout { out_buf } else { err_buf };
                chunk.truncate(n);
                chunk
            }
            other => {
                if let Err(e) = other {
                    debug!(error = %e, "Error reading process output");
                }
                if from_stdout {
                    self.stdout = None;
                } else {
                    self.stderr = None;
                }
                Vec::new()
            }
        }
    }

    async fn drain_into(&mut self, output: &mut Vec<u8>) {
        while self.is_open() {
            let chunk = self.next_chunk().await;
            output.extend_from_slice(&chunk);
        }
    }
}

async fn read_pipe<R: AsyncRead + Unpin>(reader: Option<&mut R>, buf: &mut [u8]) -> io::Result<usize> {
    match reader {
        Some(reader) => reader.read(buf).await,
        None => Ok(0),
    }
}

/// Sends `SIGKILL` to the child's process group.
fn kill_group(child: &Child) {
    #[cfg(unix)]
    {
        use nix::sys::signal::{killpg, Signal};
        use nix::unistd::Pid;

        if let Some(pid) = child.id() {
            if let Err(e) = killpg(Pid::from_raw(pid as i32), Signal::SIGKILL) {
                debug!(pid, error = %e, "Failed to kill process group");
            }
        }
    }
}

/// Kills the child's process group, then the child itself, and reaps it.
async fn terminate(child: &mut Child) {
    kill_group(child);
    if let Err(e) = child.kill().await {
        debug!(error = %e, "Failed to kill child process");
    }
}
