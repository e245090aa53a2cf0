// Copyright (c) The pytether Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! The batch runner: launches each test in its own interpreter process and
//! reports results through a [`ResultSink`].

use crate::{
    cancel::CancelHandle,
    child::{CapturedOutput, TestChild},
    debug::{AttachFlow, DebugChannel, tether_child},
    errors::{DiscoveryError, DisplayErrorChain, RunnerBuildError},
    host::{DebugHost, MessageLevel, ProjectLoader, ResultSink, TestDiscoverer},
    launch::{DebugArgs, LaunchSpec},
    outcome::{RunStats, TestOutcome, TestStatus},
    project::SettingsResolver,
    signal::{SignalHandler, SignalHandlerKind},
    test_id::TestId,
    time::{StopwatchStart, stopwatch},
};
use camino::Utf8PathBuf;
use debug_ignore::DebugIgnore;
use tokio::runtime::Runtime;
use tracing::{debug, info, warn};

/// Configuration for a batch run.
#[derive(Clone, Debug)]
pub struct BatchConfig {
    /// The launcher script handed to the interpreter as its first argument.
    pub launcher_script: Utf8PathBuf,
    /// Debugger options. `None` runs the batch without debugging.
    pub debug: Option<DebugConfig>,
}

/// Debugger options for a batch run.
///
/// These only take effect if a [`DebugHost`] is also installed on the
/// builder; without one the batch silently runs without debugging.
#[derive(Clone, Debug)]
pub struct DebugConfig {
    /// An opaque token identifying the debug session to the host.
    pub transport_id: String,
    /// The debugger's runtime support directory, appended to each test's
    /// module search path.
    pub runtime_dir: Option<Utf8PathBuf>,
}

/// Builder for [`BatchRunner`].
#[derive(Debug)]
pub struct BatchRunnerBuilder {
    config: BatchConfig,
    cancel: Option<CancelHandle>,
    debug_host: DebugIgnore<Option<Box<dyn DebugHost>>>,
}

impl BatchRunnerBuilder {
    /// Creates a new builder with the given configuration.
    pub fn new(config: BatchConfig) -> Self {
        Self {
            config,
            cancel: None,
            debug_host: DebugIgnore(None),
        }
    }

    /// Installs a cancellation handle shared with the host.
    ///
    /// If not set, the runner creates its own; it is then reachable through
    /// [`BatchRunner::cancel_handle`].
    pub fn set_cancel_handle(&mut self, handle: CancelHandle) -> &mut Self {
        self.cancel = Some(handle);
        self
    }

    /// Installs the debugger host driving attach operations.
    pub fn set_debug_host(&mut self, host: Box<dyn DebugHost>) -> &mut Self {
        self.debug_host = DebugIgnore(Some(host));
        self
    }

    /// Creates a new batch runner.
    pub fn build(
        self,
        loader: Box<dyn ProjectLoader>,
        signal_handler: SignalHandlerKind,
    ) -> Result<BatchRunner, RunnerBuildError> {
        let runtime = tokio::runtime::Builder::new_multi_thread()
            .enable_all()
            .thread_name("pytether-runner-worker")
            .build()
            .map_err(RunnerBuildError::RuntimeCreate)?;
        let _guard = runtime.enter();

        // signal_handler.build() must be called from within the guard.
        let signal_handler = signal_handler
            .build()
            .map_err(RunnerBuildError::SignalHandlerSetup)?;

        Ok(BatchRunner {
            inner: RunnerInner {
                config: self.config,
                loader: DebugIgnore(loader),
                debug_host: self.debug_host,
                resolver: SettingsResolver::new(),
                cancel: self.cancel.unwrap_or_default(),
            },
            runtime,
            signal_handler,
        })
    }
}

/// Context for running a batch of tests.
///
/// Created using [`BatchRunnerBuilder::build`].
#[derive(Debug)]
pub struct BatchRunner {
    inner: RunnerInner,
    runtime: Runtime,
    signal_handler: SignalHandler,
}

impl BatchRunner {
    /// Returns a handle that cancels this batch when fired.
    pub fn cancel_handle(&self) -> CancelHandle {
        self.inner.cancel.clone()
    }

    /// Executes the given tests, each one in its own process, reporting
    /// through `sink`.
    pub fn execute(mut self, tests: &[TestId], sink: &mut dyn ResultSink) -> RunStats {
        let stats = self
            .runtime
            .block_on(self.inner.run_batch(self.signal_handler, tests, sink));

        // The child futures hold no state worth waiting for at this point.
        // Shut the runtime down aggressively, being OK with leaked
        // resources.
        self.runtime.shutdown_background();
        stats
    }

    /// Discovers tests from raw source files, then executes them.
    pub fn execute_sources(
        self,
        discoverer: &mut dyn TestDiscoverer,
        sources: &[Utf8PathBuf],
        sink: &mut dyn ResultSink,
    ) -> Result<RunStats, DiscoveryError> {
        let tests = discoverer.discover(sources)?;
        debug!(
            "discovered {} tests from {} source files",
            tests.len(),
            sources.len()
        );
        Ok(self.execute(&tests, sink))
    }
}

#[derive(Debug)]
struct RunnerInner {
    config: BatchConfig,
    loader: DebugIgnore<Box<dyn ProjectLoader>>,
    debug_host: DebugIgnore<Option<Box<dyn DebugHost>>>,
    resolver: SettingsResolver,
    cancel: CancelHandle,
}

impl RunnerInner {
    async fn run_batch(
        &mut self,
        mut signal_handler: SignalHandler,
        tests: &[TestId],
        sink: &mut dyn ResultSink,
    ) -> RunStats {
        // Translate signals into cancellation for the rest of the batch.
        // For a noop handler recv returns None right away and the task
        // exits.
        let signal_cancel = self.cancel.clone();
        let signal_task = tokio::spawn(async move {
            while let Some(event) = signal_handler.recv().await {
                info!("received {event}, cancelling batch");
                signal_cancel.cancel();
            }
        });

        let mut stats = RunStats {
            initial_count: tests.len(),
            ..RunStats::default()
        };
        debug!("running {} tests", tests.len());

        for test in tests {
            if self.cancel.is_cancelled() {
                debug!("batch cancelled, not launching {test}");
                break;
            }
            self.run_test(test, sink, &mut stats).await;
        }

        signal_task.abort();
        stats
    }

    /// Runs a single test to its recorded result.
    ///
    /// Every failure past `record_start` is scoped to this test: the sink
    /// sees a message, a failed result, and an end, and the batch moves on.
    /// The exception is cancellation, which abandons the test after killing
    /// it, leaving only the start record.
    async fn run_test(&mut self, test: &TestId, sink: &mut dyn ResultSink, stats: &mut RunStats) {
        sink.record_start(test);
        let timer = stopwatch();

        let settings = match self
            .resolver
            .resolve(self.loader.0.as_mut(), test.source_file())
        {
            Ok(settings) => settings,
            Err(error) => {
                let chain = DisplayErrorChain::new(&error);
                warn!("cannot run {test}: {chain}");
                sink.send_message(MessageLevel::Error, &format!("cannot run {test}: {chain}"));
                finalize(sink, stats, test, &timer, TestStatus::Failed, CapturedOutput::default());
                return;
            }
        };

        // A debug run needs both the batch-level flag and a host capable of
        // attaching.
        let mut debug = match (&self.config.debug, &mut self.debug_host.0) {
            (Some(options), Some(host)) => Some((options, host)),
            _ => None,
        };

        let channel = if debug.is_some() {
            match DebugChannel::allocate() {
                Ok(channel) => Some(channel),
                Err(error) => {
                    let chain = DisplayErrorChain::new(&error);
                    warn!("cannot allocate debug channel for {test}: {chain}");
                    sink.send_message(
                        MessageLevel::Error,
                        &format!("cannot allocate debug channel for {test}: {chain}"),
                    );
                    finalize(
                        sink,
                        stats,
                        test,
                        &timer,
                        TestStatus::Failed,
                        CapturedOutput::default(),
                    );
                    return;
                }
            }
        } else {
            None
        };

        if let Some((_, host)) = &mut debug {
            // A session left over from an earlier run would shadow the new
            // attach.
            host.detach_all();
        }

        let debug_args = match (&channel, &debug) {
            (Some(channel), Some((options, _))) => Some(DebugArgs {
                channel,
                runtime_dir: options.runtime_dir.as_deref(),
            }),
            _ => None,
        };
        let spec = LaunchSpec::build(test, &settings, &self.config.launcher_script, debug_args);

        // Deliberately not logging the arguments: in a debug run they carry
        // the secret.
        debug!("spawning {} for {test}", spec.program);
        let mut child = match TestChild::spawn(&spec) {
            Ok(child) => child,
            Err(error) => {
                let chain = DisplayErrorChain::new(&error);
                warn!("cannot launch {test}: {chain}");
                sink.send_message(MessageLevel::Error, &format!("cannot launch {test}: {chain}"));
                finalize(sink, stats, test, &timer, TestStatus::Failed, CapturedOutput::default());
                return;
            }
        };

        if let (Some(channel), Some((options, host))) = (&channel, &mut debug) {
            match tether_child(
                host.as_mut(),
                &mut child,
                &options.transport_id,
                channel,
                &self.cancel,
            )
            .await
            {
                AttachFlow::Attached => {}
                AttachFlow::Cancelled => {
                    debug!("batch cancelled while attaching to {test}");
                    return;
                }
                AttachFlow::EarlyExit => {
                    let output = child.collect_output().await;
                    report_stderr_lines(sink, &output);
                    sink.send_message(
                        MessageLevel::Error,
                        &format!("{test} exited before the debugger could attach"),
                    );
                    finalize(sink, stats, test, &timer, TestStatus::Failed, output);
                    return;
                }
                AttachFlow::ExitedWhileAttaching => {
                    let output = child.collect_output().await;
                    sink.send_message(
                        MessageLevel::Error,
                        &format!("{test} exited while the debugger was attaching"),
                    );
                    finalize(sink, stats, test, &timer, TestStatus::Failed, output);
                    return;
                }
                AttachFlow::TransportFailed(error) => {
                    let output = child.collect_output().await;
                    let chain = DisplayErrorChain::new(&error);
                    sink.send_message(
                        MessageLevel::Error,
                        &format!("cannot attach debugger to {test}: {chain}"),
                    );
                    finalize(sink, stats, test, &timer, TestStatus::Failed, output);
                    return;
                }
            }
        }

        let wait_res = loop {
            tokio::select! {
                () = child.output.fill_buf(), if !child.output.is_done() => {}
                res = child.proc.wait() => {
                    // The test finished executing.
                    break res;
                }
                () = self.cancel.cancelled() => {
                    debug!("batch cancelled, killing {test}");
                    child.terminate().await;
                    return;
                }
            }
        };

        let status = match wait_res {
            Ok(exit_status) => TestStatus::from_wait(exit_status, child.was_killed()),
            Err(error) => {
                warn!("error waiting for {test} to exit: {error}");
                TestStatus::Failed
            }
        };
        let output = child.collect_output().await;
        finalize(sink, stats, test, &timer, status, output);
    }
}

/// Forwards non-blank stderr lines to the sink as error messages. Used when
/// a process dies before its debugger attaches, where stderr usually names
/// the reason.
fn report_stderr_lines(sink: &mut dyn ResultSink, output: &CapturedOutput) {
    for line in output.stderr.lines().filter(|line| !line.trim().is_empty()) {
        sink.send_message(MessageLevel::Error, line);
    }
}

fn finalize(
    sink: &mut dyn ResultSink,
    stats: &mut RunStats,
    test: &TestId,
    timer: &StopwatchStart,
    status: TestStatus,
    output: CapturedOutput,
) {
    for error in &output.read_errors {
        debug!("error reading output of {test}: {error}");
    }

    let snapshot = timer.snapshot();
    debug!(
        "{test} finished with status {status:?} in {:.3}s",
        snapshot.duration.as_secs_f64()
    );

    let outcome = TestOutcome {
        test_id: test.clone(),
        start_time: snapshot.start_time.fixed_offset(),
        duration: snapshot.duration,
        status,
        stdout: output.stdout,
        stderr: output.stderr,
    };
    sink.record_result(&outcome);
    sink.record_end(test, status);
    stats.on_test_finished(status);
}
