// Copyright (c) The pytether Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Interfaces to the embedding host.
//!
//! The runner does not discover tests, parse project models, speak the
//! debugger transport protocol, or render results. Those concerns live
//! behind the traits in this module, implemented by whatever hosts the
//! runner: an IDE integration, a CI harness, or the pytether CLI.

use crate::{
    errors::{DebugHostError, DiscoveryError, ProjectLoadError},
    outcome::{TestOutcome, TestStatus},
    test_id::TestId,
};
use camino::{Utf8Path, Utf8PathBuf};
use serde::{Deserialize, Serialize};

/// Severity of a free-form message sent through a [`ResultSink`].
#[derive(Clone, Copy, Debug, Deserialize, Eq, PartialEq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum MessageLevel {
    /// Informational output.
    Info,
    /// A condition worth flagging that does not fail a test by itself.
    Warning,
    /// A failure diagnostic.
    Error,
}

/// Project data produced by a [`ProjectLoader`].
///
/// Paths may be relative; settings resolution makes them absolute against
/// `project_home`.
#[derive(Clone, Debug)]
pub struct RawProject {
    /// The interpreter attached to the project's active environment, if one
    /// is configured.
    pub interpreter: Option<RawInterpreter>,
    /// The directory the project's relative settings are anchored to.
    pub project_home: Utf8PathBuf,
    /// The project's declared working directory, if any.
    pub working_dir: Option<Utf8PathBuf>,
    /// Declared module search path entries. Empty entries are discarded
    /// during resolution.
    pub search_paths: Vec<Utf8PathBuf>,
    /// The name of the environment variable that receives the joined search
    /// path, if the project overrides the default.
    pub path_env_var: Option<String>,
    /// Whether the project targets a windowed (GUI) interpreter.
    pub is_windows_application: bool,
}

/// An interpreter attached to a project environment.
#[derive(Clone, Debug)]
pub struct RawInterpreter {
    /// The console interpreter binary: an absolute path, or a bare name
    /// resolved through `PATH` at spawn time.
    pub path: Utf8PathBuf,
    /// The windowed interpreter binary, if the environment provides one.
    pub windows_path: Option<Utf8PathBuf>,
}

/// Loads project data for test sources.
///
/// Implementations should release any transient project model they build
/// before returning; the runner keeps only the returned [`RawProject`].
pub trait ProjectLoader {
    /// Loads project data for the project containing `source`.
    ///
    /// A [`ProjectLoadError::Parse`] result is recoverable: the runner
    /// treats it as a project with no interpreter configured.
    fn load_project(&mut self, source: &Utf8Path) -> Result<RawProject, ProjectLoadError>;
}

/// Discovers test identifiers from raw source files.
///
/// Invoked once per batch when the batch input is source files rather than
/// already-discovered identifiers.
pub trait TestDiscoverer {
    /// Enumerates the tests defined in `sources`.
    fn discover(&mut self, sources: &[Utf8PathBuf]) -> Result<Vec<TestId>, DiscoveryError>;
}

/// Debugger-side operations used to tether a freshly launched test process.
///
/// The host is only consulted for batches flagged as debug runs; a batch
/// without a host silently runs without debugging.
pub trait DebugHost {
    /// Detaches any session left over from a previous run. Best-effort: the
    /// host may have nothing attached.
    fn detach_all(&mut self);

    /// Attempts to attach the debugger to process `pid` over the allocated
    /// channel.
    ///
    /// Returns `Ok(true)` once the debugger is attached and `Ok(false)` if
    /// the target was not ready yet and the attempt should be retried after
    /// a bounded wait. A transport-level failure is non-retryable for the
    /// test: the runner kills the process and records the test as failed.
    fn attach(
        &mut self,
        pid: u32,
        transport_id: &str,
        secret: &str,
        port: u16,
    ) -> Result<bool, DebugHostError>;
}

/// Receives the results of a batch as it executes.
///
/// Ordering contract: the runner sends exactly one [`record_start`] per
/// attempted test, followed by exactly one [`record_result`] and one
/// [`record_end`] for every test that finishes. A test abandoned by
/// cancellation has only its `record_start`; sinks should treat a missing
/// end as "did not finish".
///
/// [`record_start`]: ResultSink::record_start
/// [`record_result`]: ResultSink::record_result
/// [`record_end`]: ResultSink::record_end
pub trait ResultSink {
    /// Called when a test is about to be launched.
    fn record_start(&mut self, test: &TestId);

    /// Called with the finalized outcome of a test.
    fn record_result(&mut self, outcome: &TestOutcome);

    /// Called after [`record_result`](ResultSink::record_result), closing
    /// out the test.
    fn record_end(&mut self, test: &TestId, status: TestStatus);

    /// Called with free-form diagnostics: launch failures, early-exit
    /// stderr, attach errors.
    fn send_message(&mut self, level: MessageLevel, text: &str);
}
