// Copyright (c) The pytether Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Spawning test processes and capturing their output.

use crate::{errors::ChildStartError, launch::LaunchSpec};
use bytes::BytesMut;
use camino::Utf8Path;
use std::{io, process::Stdio, sync::Arc, time::Duration};
use tokio::{
    io::{AsyncBufReadExt, AsyncRead, BufReader},
    process::{Child, ChildStderr, ChildStdout, Command},
};

/// The size of each buffered reader's buffer. The (normal) page size on
/// most systems.
const CHUNK_SIZE: usize = 4 * 1024;

/// How long to keep reading output after the process has exited. Pipes may
/// still hold buffered data at that point.
const OUTPUT_DRAIN_TIMEOUT: Duration = Duration::from_millis(100);

/// A `BufReader` over an `AsyncRead` that tracks whether the stream has
/// reached EOF or errored.
struct FusedBufReader<R> {
    reader: BufReader<R>,
    done: bool,
}

impl<R: AsyncRead + Unpin> FusedBufReader<R> {
    fn new(reader: R) -> Self {
        Self {
            reader: BufReader::with_capacity(CHUNK_SIZE, reader),
            done: false,
        }
    }

    async fn fill_buf(&mut self, acc: &mut BytesMut) -> Result<(), io::Error> {
        if self.done {
            return Ok(());
        }

        match self.reader.fill_buf().await {
            Ok(buf) => {
                acc.extend_from_slice(buf);
                if buf.is_empty() {
                    self.done = true;
                }
                let len = buf.len();
                self.reader.consume(len);
                Ok(())
            }
            Err(error) => {
                self.done = true;
                Err(error)
            }
        }
    }

    fn is_done(&self) -> bool {
        self.done
    }
}

/// Output accumulator for a test process.
///
/// Progress is externalized: each [`fill_buf`](Self::fill_buf) call makes
/// one step, and the call is cancel-safe because the underlying
/// [`AsyncBufReadExt::fill_buf`] is.
pub(crate) struct OutputCapture {
    stdout: FusedBufReader<ChildStdout>,
    stderr: FusedBufReader<ChildStderr>,
    stdout_acc: BytesMut,
    stderr_acc: BytesMut,
    errors: Vec<Arc<io::Error>>,
}

impl OutputCapture {
    fn new(stdout: ChildStdout, stderr: ChildStderr) -> Self {
        Self {
            stdout: FusedBufReader::new(stdout),
            stderr: FusedBufReader::new(stderr),
            stdout_acc: BytesMut::with_capacity(CHUNK_SIZE),
            stderr_acc: BytesMut::with_capacity(CHUNK_SIZE),
            errors: Vec::new(),
        }
    }

    pub(crate) fn is_done(&self) -> bool {
        self.stdout.is_done() && self.stderr.is_done()
    }

    /// Waits until either stream makes progress and folds the data into the
    /// accumulators.
    pub(crate) async fn fill_buf(&mut self) {
        let res = tokio::select! {
            res = self.stdout.fill_buf(&mut self.stdout_acc), if !self.stdout.is_done() => res,
            res = self.stderr.fill_buf(&mut self.stderr_acc), if !self.stderr.is_done() => res,
            // Both streams at EOF.
            else => Ok(()),
        };
        if let Err(error) = res {
            self.errors.push(Arc::new(error));
        }
    }

    /// Reads until both streams hit EOF or the drain timeout elapses.
    async fn drain(&mut self) {
        let mut deadline = std::pin::pin!(tokio::time::sleep(OUTPUT_DRAIN_TIMEOUT));
        while !self.is_done() {
            tokio::select! {
                () = self.fill_buf() => {}
                () = &mut deadline => break,
            }
        }
    }

    fn freeze(self) -> CapturedOutput {
        CapturedOutput {
            stdout: String::from_utf8_lossy(&self.stdout_acc).into_owned(),
            stderr: String::from_utf8_lossy(&self.stderr_acc).into_owned(),
            read_errors: self.errors,
        }
    }
}

/// The collected output of a finished (or abandoned) test process.
#[derive(Clone, Debug, Default)]
pub(crate) struct CapturedOutput {
    pub(crate) stdout: String,
    pub(crate) stderr: String,
    pub(crate) read_errors: Vec<Arc<io::Error>>,
}

/// A spawned test process together with its output accumulator.
///
/// The process handle and the accumulator are separate fields so a
/// `select!` can poll both concurrently.
pub(crate) struct TestChild {
    pub(crate) proc: Child,
    pub(crate) output: OutputCapture,
    killed: bool,
}

impl TestChild {
    /// Spawns the process described by `spec` with stdout and stderr piped
    /// and stdin closed.
    pub(crate) fn spawn(spec: &LaunchSpec) -> Result<Self, ChildStartError> {
        // Bare program names go through the OS path search; only an
        // explicit path can be pre-checked for existence.
        if is_explicit_path(&spec.program) && !spec.program.as_std_path().exists() {
            return Err(ChildStartError::ProgramMissing {
                program: spec.program.clone(),
            });
        }

        let mut command = Command::new(&spec.program);
        command
            .args(&spec.args)
            .current_dir(&spec.working_dir)
            .envs(spec.env.iter().map(|(k, v)| (k.as_str(), v.as_str())))
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            // Backstop if the runner abandons the child mid-run.
            .kill_on_drop(true);

        let mut proc = command
            .spawn()
            .map_err(|error| ChildStartError::Spawn(Arc::new(error)))?;
        let stdout = proc.stdout.take().expect("stdout was set");
        let stderr = proc.stderr.take().expect("stderr was set");

        Ok(Self {
            proc,
            output: OutputCapture::new(stdout, stderr),
            killed: false,
        })
    }

    /// Whether [`terminate`](Self::terminate) delivered a kill.
    pub(crate) fn was_killed(&self) -> bool {
        self.killed
    }

    /// Kills the process and reaps it.
    pub(crate) async fn terminate(&mut self) {
        // start_kill fails if the process already exited on its own; in
        // that case the exit status speaks for itself.
        if self.proc.start_kill().is_ok() {
            self.killed = true;
        }
        let _ = self.proc.wait().await;
    }

    /// Drains the remaining output and returns everything captured.
    pub(crate) async fn collect_output(mut self) -> CapturedOutput {
        self.output.drain().await;
        self.output.freeze()
    }
}

fn is_explicit_path(program: &Utf8Path) -> bool {
    program
        .parent()
        .is_some_and(|parent| !parent.as_str().is_empty())
}
