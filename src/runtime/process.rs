//! Child process with its output delivered over a channel

use std::collections::BTreeMap;
use std::io::{BufRead, BufReader, Read};
use std::path::Path;
use std::process::{Child, Command, Stdio};
use std::sync::mpsc::{self, Receiver, RecvTimeoutError, Sender};
use std::thread;
use std::time::{Duration, Instant};

use crate::error::{Result, runtime};

use super::runner::CommandLine;

/// How often a waiting process is polled for exit and deadline
const POLL_INTERVAL: Duration = Duration::from_millis(25);

/// Output still in flight after the process exits is collected for at most this long
const DRAIN_GRACE: Duration = Duration::from_secs(1);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stream {
    Stdout,
    Stderr,
}

/// One line of process output
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutputChunk {
    pub stream: Stream,
    pub line: String,
}

/// How a run ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Exit {
    Code(i32),
    TimedOut,
}

#[derive(Debug)]
pub struct RunningProcess {
    child: Child,
    output: Receiver<OutputChunk>,
    deadline: Option<Instant>,
    exit: Option<Exit>,
}

impl RunningProcess {
    /// Spawn `command`; failure to start the program is an OperationError
    pub fn spawn(
        command: &CommandLine,
        cwd: Option<&Path>,
        environment: &BTreeMap<String, String>,
        timeout: Option<Duration>,
    ) -> Result<Self> {
        let mut cmd = Command::new(&command.program);
        cmd.args(&command.args)
            .envs(environment)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());
        if let Some(cwd) = cwd {
            cmd.current_dir(cwd);
        }

        let mut child = cmd.spawn().map_err(|e| {
            runtime::operation(format!("failed to spawn '{}': {e}", command.program))
        })?;

        let (tx, rx) = mpsc::channel();
        if let Some(stdout) = child.stdout.take() {
            forward_lines(stdout, Stream::Stdout, tx.clone());
        }
        if let Some(stderr) = child.stderr.take() {
            forward_lines(stderr, Stream::Stderr, tx);
        }

        Ok(Self {
            child,
            output: rx,
            deadline: timeout.map(|t| Instant::now() + t),
            exit: None,
        })
    }

    /// Next output chunk, or `None` once the process has exited or timed out
    pub fn next_chunk(&mut self) -> Result<Option<OutputChunk>> {
        loop {
            match self.exit {
                Some(Exit::TimedOut) => return Ok(None),
                Some(Exit::Code(_)) => {
                    return Ok(self.output.recv_timeout(DRAIN_GRACE).ok());
                }
                None => {}
            }

            match self.output.recv_timeout(POLL_INTERVAL) {
                Ok(chunk) => return Ok(Some(chunk)),
                Err(RecvTimeoutError::Timeout | RecvTimeoutError::Disconnected) => {}
            }

            if let Some(status) = self
                .child
                .try_wait()
                .map_err(|e| runtime::operation(format!("failed to wait for process: {e}")))?
            {
                self.exit = Some(Exit::Code(exit_code(status)));
                continue;
            }

            if self.deadline.is_some_and(|d| Instant::now() >= d) {
                self.kill();
                self.exit = Some(Exit::TimedOut);
            }
        }
    }

    /// Consume remaining output and report how the process ended
    pub fn wait(mut self) -> Result<Exit> {
        while self.next_chunk()?.is_some() {}
        self.exit
            .take()
            .ok_or_else(|| runtime::operation("process state lost"))
    }

    fn kill(&mut self) {
        if let Err(e) = self.child.kill() {
            tracing::warn!(error = %e, "Failed to kill timed out process");
        }
        let _ = self.child.wait();
    }
}

impl Drop for RunningProcess {
    fn drop(&mut self) {
        if self.exit.is_none() {
            self.kill();
        }
    }
}

/// Forward `pipe` line by line until EOF; bytes that are not UTF-8 are
/// replaced so one bad byte never closes the pipe under the child
fn forward_lines(pipe: impl Read + Send + 'static, stream: Stream, tx: Sender<OutputChunk>) {
    thread::spawn(move || {
        let mut reader = BufReader::new(pipe);
        let mut buf = Vec::new();
        let mut listening = true;
        loop {
            buf.clear();
            match reader.read_until(b'\n', &mut buf) {
                Ok(0) | Err(_) => break,
                Ok(_) => {}
            }
            if !listening {
                continue;
            }
            let line = String::from_utf8_lossy(trim_line_end(&buf)).into_owned();
            listening = tx.send(OutputChunk { stream, line }).is_ok();
        }
    });
}

fn trim_line_end(line: &[u8]) -> &[u8] {
    let line = line.strip_suffix(b"\n").unwrap_or(line);
    line.strip_suffix(b"\r").unwrap_or(line)
}

#[cfg(unix)]
fn exit_code(status: std::process::ExitStatus) -> i32 {
    use std::os::unix::process::ExitStatusExt;
    status
        .code()
        .or_else(|| status.signal().map(|s| 128 + s))
        .unwrap_or(-1)
}

#[cfg(not(unix))]
fn exit_code(status: std::process::ExitStatus) -> i32 {
    status.code().unwrap_or(-1)
}
