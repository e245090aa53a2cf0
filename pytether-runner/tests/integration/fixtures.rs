// Copyright (c) The pytether Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

use camino::{Utf8Path, Utf8PathBuf};
use pytether_runner::{
    cancel::CancelHandle,
    errors::{DebugHostError, DiscoveryError, ProjectLoadError},
    host::{
        DebugHost, MessageLevel, ProjectLoader, RawInterpreter, RawProject, ResultSink,
        TestDiscoverer,
    },
    outcome::{TestOutcome, TestStatus},
    runner::BatchConfig,
    test_id::TestId,
};
use std::{
    collections::VecDeque,
    sync::{Arc, Mutex},
};

/// A project loader backed by a closure.
pub(crate) struct FnLoader<F>(pub(crate) F);

impl<F> ProjectLoader for FnLoader<F>
where
    F: FnMut(&Utf8Path) -> Result<RawProject, ProjectLoadError>,
{
    fn load_project(&mut self, source: &Utf8Path) -> Result<RawProject, ProjectLoadError> {
        (self.0)(source)
    }
}

/// A test discoverer backed by a closure.
pub(crate) struct FnDiscoverer<F>(pub(crate) F);

impl<F> TestDiscoverer for FnDiscoverer<F>
where
    F: FnMut(&[Utf8PathBuf]) -> Result<Vec<TestId>, DiscoveryError>,
{
    fn discover(&mut self, sources: &[Utf8PathBuf]) -> Result<Vec<TestId>, DiscoveryError> {
        (self.0)(sources)
    }
}

/// One sink callback, in the order the runner delivered it.
#[derive(Clone, Debug, Eq, PartialEq)]
pub(crate) enum SinkEvent {
    Start(String),
    Result {
        test: String,
        status: TestStatus,
        stdout: String,
        stderr: String,
    },
    End(String, TestStatus),
    Message(MessageLevel, String),
}

/// Records every sink callback. Can fire a cancel handle from within the
/// `record_start` of a named test, to exercise cancellation landing while a
/// test is in flight.
#[derive(Default)]
pub(crate) struct RecordingSink {
    pub(crate) events: Vec<SinkEvent>,
    trip_on_start: Option<(String, CancelHandle)>,
}

impl RecordingSink {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn trip_on_start(&mut self, test: impl Into<String>, handle: CancelHandle) {
        self.trip_on_start = Some((test.into(), handle));
    }

    /// The messages in delivery order, for assertions on diagnostics.
    pub(crate) fn messages(&self) -> Vec<(MessageLevel, String)> {
        self.events
            .iter()
            .filter_map(|event| match event {
                SinkEvent::Message(level, text) => Some((*level, text.clone())),
                _ => None,
            })
            .collect()
    }
}

impl ResultSink for RecordingSink {
    fn record_start(&mut self, test: &TestId) {
        let name = test.to_string();
        if let Some((target, handle)) = &self.trip_on_start
            && *target == name
        {
            handle.cancel();
        }
        self.events.push(SinkEvent::Start(name));
    }

    fn record_result(&mut self, outcome: &TestOutcome) {
        self.events.push(SinkEvent::Result {
            test: outcome.test_id.to_string(),
            status: outcome.status,
            stdout: outcome.stdout.clone(),
            stderr: outcome.stderr.clone(),
        });
    }

    fn record_end(&mut self, test: &TestId, status: TestStatus) {
        self.events.push(SinkEvent::End(test.to_string(), status));
    }

    fn send_message(&mut self, level: MessageLevel, text: &str) {
        self.events.push(SinkEvent::Message(level, text.to_owned()));
    }
}

/// What a [`ScriptedDebugHost`] should answer on each successive attach
/// call. Once the plan runs out, further calls succeed.
#[derive(Clone, Copy, Debug)]
pub(crate) enum AttachPlan {
    NotReady,
    Ready,
    Fail,
}

#[derive(Clone, Debug)]
pub(crate) struct AttachCall {
    pub(crate) pid: u32,
    pub(crate) transport_id: String,
    pub(crate) secret: String,
    pub(crate) port: u16,
}

#[derive(Debug, Default)]
pub(crate) struct HostLog {
    pub(crate) detach_calls: usize,
    pub(crate) attach_calls: Vec<AttachCall>,
}

/// A debug host that follows a scripted sequence of attach answers and
/// logs every call it receives.
pub(crate) struct ScriptedDebugHost {
    plan: VecDeque<AttachPlan>,
    log: Arc<Mutex<HostLog>>,
}

impl ScriptedDebugHost {
    /// Returns the host plus a handle to its call log. The log outlives the
    /// host, which the runner consumes.
    pub(crate) fn new(plan: impl IntoIterator<Item = AttachPlan>) -> (Self, Arc<Mutex<HostLog>>) {
        let log = Arc::new(Mutex::new(HostLog::default()));
        let host = Self {
            plan: plan.into_iter().collect(),
            log: log.clone(),
        };
        (host, log)
    }
}

impl DebugHost for ScriptedDebugHost {
    fn detach_all(&mut self) {
        self.log.lock().unwrap().detach_calls += 1;
    }

    fn attach(
        &mut self,
        pid: u32,
        transport_id: &str,
        secret: &str,
        port: u16,
    ) -> Result<bool, DebugHostError> {
        self.log.lock().unwrap().attach_calls.push(AttachCall {
            pid,
            transport_id: transport_id.to_owned(),
            secret: secret.to_owned(),
            port,
        });
        match self.plan.pop_front() {
            Some(AttachPlan::Ready) | None => Ok(true),
            Some(AttachPlan::NotReady) => Ok(false),
            Some(AttachPlan::Fail) => Err(DebugHostError::new("adapter rejected the connection")),
        }
    }
}

/// Writes a shell script the runner will hand to `/bin/sh` as the launcher.
pub(crate) fn write_launcher(dir: &Utf8Path, name: &str, body: &str) -> Utf8PathBuf {
    let path = dir.join(name);
    std::fs::write(&path, body).unwrap();
    path
}

/// A project whose "interpreter" is `/bin/sh`, rooted at `home`.
pub(crate) fn sh_project(home: &Utf8Path) -> RawProject {
    RawProject {
        interpreter: Some(RawInterpreter {
            path: "/bin/sh".into(),
            windows_path: None,
        }),
        project_home: home.to_owned(),
        working_dir: None,
        search_paths: Vec::new(),
        path_env_var: None,
        is_windows_application: false,
    }
}

pub(crate) fn batch_config(launcher: &Utf8Path) -> BatchConfig {
    BatchConfig {
        launcher_script: launcher.to_owned(),
        debug: None,
    }
}
