// Copyright (c) The pytether Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

use crate::fixtures::*;
use camino::{Utf8Path, Utf8PathBuf};
use camino_tempfile::tempdir;
use pretty_assertions::assert_eq;
use pytether_runner::{
    cancel::CancelHandle,
    errors::{DiscoveryError, ProjectLoadError},
    host::MessageLevel,
    outcome::{RunStats, TestStatus},
    runner::BatchRunnerBuilder,
    signal::SignalHandlerKind,
    test_id::TestId,
};
use std::{
    sync::{
        Arc,
        atomic::{AtomicUsize, Ordering},
    },
    time::{Duration, Instant},
};

#[test]
fn clean_exit_is_reported_as_passed() {
    let dir = tempdir().unwrap();
    let launcher = write_launcher(dir.path(), "launcher.sh", "echo ok\nexit 0\n");
    let home = dir.path().to_owned();

    let runner = BatchRunnerBuilder::new(batch_config(&launcher))
        .build(
            Box::new(FnLoader(move |_: &Utf8Path| Ok(sh_project(&home)))),
            SignalHandlerKind::Noop,
        )
        .unwrap();

    let tests = vec![TestId::new("test_mod.py", "CaseA", "test_ok").unwrap()];
    let mut sink = RecordingSink::new();
    let stats = runner.execute(&tests, &mut sink);

    assert_eq!(
        stats,
        RunStats {
            initial_count: 1,
            finished_count: 1,
            passed: 1,
            failed: 0,
        },
    );
    assert!(stats.is_success());
    assert_eq!(
        sink.events,
        vec![
            SinkEvent::Start("test_mod.py::CaseA::test_ok".to_owned()),
            SinkEvent::Result {
                test: "test_mod.py::CaseA::test_ok".to_owned(),
                status: TestStatus::Passed,
                stdout: "ok\n".to_owned(),
                stderr: String::new(),
            },
            SinkEvent::End("test_mod.py::CaseA::test_ok".to_owned(), TestStatus::Passed),
        ],
    );
}

#[test]
fn nonzero_exit_is_reported_as_failed_with_stderr() {
    let dir = tempdir().unwrap();
    let launcher = write_launcher(
        dir.path(),
        "launcher.sh",
        "echo 'AssertionError: nope' >&2\nexit 1\n",
    );
    let home = dir.path().to_owned();

    let runner = BatchRunnerBuilder::new(batch_config(&launcher))
        .build(
            Box::new(FnLoader(move |_: &Utf8Path| Ok(sh_project(&home)))),
            SignalHandlerKind::Noop,
        )
        .unwrap();

    let tests = vec![TestId::new("test_mod.py", "CaseA", "test_broken").unwrap()];
    let mut sink = RecordingSink::new();
    let stats = runner.execute(&tests, &mut sink);

    assert_eq!(stats.failed, 1);
    assert!(!stats.is_success());
    assert_eq!(
        sink.events,
        vec![
            SinkEvent::Start("test_mod.py::CaseA::test_broken".to_owned()),
            SinkEvent::Result {
                test: "test_mod.py::CaseA::test_broken".to_owned(),
                status: TestStatus::Failed,
                stdout: String::new(),
                stderr: "AssertionError: nope\n".to_owned(),
            },
            SinkEvent::End("test_mod.py::CaseA::test_broken".to_owned(), TestStatus::Failed),
        ],
    );
}

#[test]
fn launcher_receives_module_and_test_selection() {
    let dir = tempdir().unwrap();
    let launcher = write_launcher(dir.path(), "launcher.sh", "printf '%s\\n' \"$@\"\n");
    let home = dir.path().to_owned();

    let runner = BatchRunnerBuilder::new(batch_config(&launcher))
        .build(
            Box::new(FnLoader(move |_: &Utf8Path| Ok(sh_project(&home)))),
            SignalHandlerKind::Noop,
        )
        .unwrap();

    let tests = vec![TestId::new("test_mod.py", "CaseA", "test_ok").unwrap()];
    let mut sink = RecordingSink::new();
    runner.execute(&tests, &mut sink);

    let SinkEvent::Result { stdout, .. } = &sink.events[1] else {
        panic!("expected a result event, got {:?}", sink.events);
    };
    assert_eq!(stdout, "-m\ntest_mod\n-t\nCaseA.test_ok\n");
}

#[test]
fn search_paths_reach_the_child_environment() {
    let dir = tempdir().unwrap();
    let launcher = write_launcher(dir.path(), "launcher.sh", "printf '%s' \"$PYTHONPATH\"\n");
    let home = dir.path().to_owned();
    let expected = home.join("lib");

    let runner = BatchRunnerBuilder::new(batch_config(&launcher))
        .build(
            Box::new(FnLoader(move |_: &Utf8Path| {
                let mut project = sh_project(&home);
                project.search_paths = vec!["lib".into()];
                Ok(project)
            })),
            SignalHandlerKind::Noop,
        )
        .unwrap();

    let tests = vec![TestId::new("test_mod.py", "CaseA", "test_ok").unwrap()];
    let mut sink = RecordingSink::new();
    runner.execute(&tests, &mut sink);

    let SinkEvent::Result { stdout, .. } = &sink.events[1] else {
        panic!("expected a result event, got {:?}", sink.events);
    };
    assert_eq!(stdout, expected.as_str());
}

#[test]
fn settings_are_resolved_once_per_source() {
    let dir = tempdir().unwrap();
    let launcher = write_launcher(dir.path(), "launcher.sh", "exit 0\n");
    let home = dir.path().to_owned();

    let loads = Arc::new(AtomicUsize::new(0));
    let counter = loads.clone();
    let runner = BatchRunnerBuilder::new(batch_config(&launcher))
        .build(
            Box::new(FnLoader(move |_: &Utf8Path| {
                counter.fetch_add(1, Ordering::SeqCst);
                Ok(sh_project(&home))
            })),
            SignalHandlerKind::Noop,
        )
        .unwrap();

    let tests = vec![
        TestId::new("test_mod.py", "CaseA", "test_one").unwrap(),
        TestId::new("test_mod.py", "CaseA", "test_two").unwrap(),
        TestId::new("test_mod.py", "CaseB", "test_three").unwrap(),
    ];
    let mut sink = RecordingSink::new();
    let stats = runner.execute(&tests, &mut sink);

    assert_eq!(stats.passed, 3);
    assert_eq!(loads.load(Ordering::SeqCst), 1, "one load for a shared source");
}

#[test]
fn cancellation_before_the_first_launch_skips_everything() {
    let dir = tempdir().unwrap();
    let launcher = write_launcher(dir.path(), "launcher.sh", "exit 0\n");
    let home = dir.path().to_owned();

    let handle = CancelHandle::new();
    let mut builder = BatchRunnerBuilder::new(batch_config(&launcher));
    builder.set_cancel_handle(handle.clone());
    let runner = builder
        .build(
            Box::new(FnLoader(move |_: &Utf8Path| Ok(sh_project(&home)))),
            SignalHandlerKind::Noop,
        )
        .unwrap();

    handle.cancel();

    let tests = vec![
        TestId::new("test_mod.py", "CaseA", "test_one").unwrap(),
        TestId::new("test_mod.py", "CaseA", "test_two").unwrap(),
    ];
    let mut sink = RecordingSink::new();
    let stats = runner.execute(&tests, &mut sink);

    assert!(sink.events.is_empty(), "{:?}", sink.events);
    assert_eq!(stats.finished_count, 0);
    assert!(stats.is_cancelled());
}

#[test]
fn cancellation_kills_the_test_in_flight_and_skips_the_rest() {
    let dir = tempdir().unwrap();
    // mod_b blocks until killed; everything else exits immediately.
    let launcher = write_launcher(
        dir.path(),
        "launcher.sh",
        "if [ \"$2\" = \"mod_b\" ]; then\n    sleep 10\nfi\nexit 0\n",
    );
    let home = dir.path().to_owned();

    let runner = BatchRunnerBuilder::new(batch_config(&launcher))
        .build(
            Box::new(FnLoader(move |_: &Utf8Path| Ok(sh_project(&home)))),
            SignalHandlerKind::Noop,
        )
        .unwrap();

    let tests = vec![
        TestId::new("mod_a.py", "CaseA", "test_one").unwrap(),
        TestId::new("mod_b.py", "CaseB", "test_two").unwrap(),
        TestId::new("mod_c.py", "CaseC", "test_three").unwrap(),
    ];
    let mut sink = RecordingSink::new();
    sink.trip_on_start("mod_b.py::CaseB::test_two", runner.cancel_handle());

    let started = Instant::now();
    let stats = runner.execute(&tests, &mut sink);

    assert!(
        started.elapsed() < Duration::from_secs(5),
        "cancellation did not interrupt the in-flight test",
    );
    assert_eq!(
        stats,
        RunStats {
            initial_count: 3,
            finished_count: 1,
            passed: 1,
            failed: 0,
        },
    );
    assert!(stats.is_cancelled());
    assert_eq!(
        sink.events,
        vec![
            SinkEvent::Start("mod_a.py::CaseA::test_one".to_owned()),
            SinkEvent::Result {
                test: "mod_a.py::CaseA::test_one".to_owned(),
                status: TestStatus::Passed,
                stdout: String::new(),
                stderr: String::new(),
            },
            SinkEvent::End("mod_a.py::CaseA::test_one".to_owned(), TestStatus::Passed),
            // The in-flight test is killed: start only, no result, no end.
            SinkEvent::Start("mod_b.py::CaseB::test_two".to_owned()),
        ],
    );
}

#[test]
fn missing_interpreter_fails_the_test_and_continues() {
    let dir = tempdir().unwrap();
    let launcher = write_launcher(dir.path(), "launcher.sh", "exit 0\n");
    let home = dir.path().to_owned();

    let runner = BatchRunnerBuilder::new(batch_config(&launcher))
        .build(
            Box::new(FnLoader(move |source: &Utf8Path| {
                let mut project = sh_project(&home);
                if source.as_str().contains("unconfigured") {
                    project.interpreter = None;
                }
                Ok(project)
            })),
            SignalHandlerKind::Noop,
        )
        .unwrap();

    let tests = vec![
        TestId::new("unconfigured.py", "CaseA", "test_one").unwrap(),
        TestId::new("test_mod.py", "CaseA", "test_two").unwrap(),
    ];
    let mut sink = RecordingSink::new();
    let stats = runner.execute(&tests, &mut sink);

    assert_eq!(stats.finished_count, 2, "the batch continues past the failure");
    assert_eq!(stats.failed, 1);
    assert_eq!(stats.passed, 1);

    let messages = sink.messages();
    assert_eq!(messages.len(), 1);
    assert_eq!(messages[0].0, MessageLevel::Error);
    assert!(
        messages[0].1.contains("no Python interpreter"),
        "{}",
        messages[0].1,
    );
    assert_eq!(
        sink.events[..3],
        [
            SinkEvent::Start("unconfigured.py::CaseA::test_one".to_owned()),
            SinkEvent::Message(MessageLevel::Error, messages[0].1.clone()),
            SinkEvent::Result {
                test: "unconfigured.py::CaseA::test_one".to_owned(),
                status: TestStatus::Failed,
                stdout: String::new(),
                stderr: String::new(),
            },
        ],
    );
}

#[test]
fn unparseable_project_data_is_recoverable() {
    let dir = tempdir().unwrap();
    let launcher = write_launcher(dir.path(), "launcher.sh", "exit 0\n");

    let runner = BatchRunnerBuilder::new(batch_config(&launcher))
        .build(
            Box::new(FnLoader(|source: &Utf8Path| {
                Err(ProjectLoadError::Parse {
                    path: source.to_owned(),
                    error: "mangled project model".into(),
                })
            })),
            SignalHandlerKind::Noop,
        )
        .unwrap();

    let tests = vec![
        TestId::new("test_mod.py", "CaseA", "test_one").unwrap(),
        TestId::new("other_mod.py", "CaseB", "test_two").unwrap(),
    ];
    let mut sink = RecordingSink::new();
    let stats = runner.execute(&tests, &mut sink);

    // A parse failure reads as "no interpreter configured" and is scoped to
    // the test: both tests fail, the batch finishes.
    assert_eq!(stats.finished_count, 2);
    assert_eq!(stats.failed, 2);
    for (_, text) in sink.messages() {
        assert!(text.contains("no Python interpreter"), "{text}");
    }
}

#[test]
fn missing_interpreter_binary_fails_the_launch() {
    let dir = tempdir().unwrap();
    let launcher = write_launcher(dir.path(), "launcher.sh", "exit 0\n");
    let home = dir.path().to_owned();

    let runner = BatchRunnerBuilder::new(batch_config(&launcher))
        .build(
            Box::new(FnLoader(move |_: &Utf8Path| {
                let mut project = sh_project(&home);
                project.interpreter.as_mut().unwrap().path =
                    "/nonexistent-interpreter/python3".into();
                Ok(project)
            })),
            SignalHandlerKind::Noop,
        )
        .unwrap();

    let tests = vec![TestId::new("test_mod.py", "CaseA", "test_one").unwrap()];
    let mut sink = RecordingSink::new();
    let stats = runner.execute(&tests, &mut sink);

    assert_eq!(stats.failed, 1);
    let messages = sink.messages();
    assert_eq!(messages.len(), 1);
    assert!(messages[0].1.contains("not found"), "{}", messages[0].1);
}

#[test]
fn execute_sources_discovers_then_runs() {
    let dir = tempdir().unwrap();
    let launcher = write_launcher(dir.path(), "launcher.sh", "exit 0\n");
    let home = dir.path().to_owned();

    let runner = BatchRunnerBuilder::new(batch_config(&launcher))
        .build(
            Box::new(FnLoader(move |_: &Utf8Path| Ok(sh_project(&home)))),
            SignalHandlerKind::Noop,
        )
        .unwrap();

    let mut discoverer = FnDiscoverer(|sources: &[Utf8PathBuf]| {
        assert_eq!(sources.len(), 1);
        assert_eq!(sources[0].as_str(), "test_mod.py");
        Ok(vec![
            TestId::new("test_mod.py", "CaseA", "test_one").unwrap(),
            TestId::new("test_mod.py", "CaseA", "test_two").unwrap(),
        ])
    });

    let mut sink = RecordingSink::new();
    let stats = runner
        .execute_sources(&mut discoverer, &["test_mod.py".into()], &mut sink)
        .unwrap();

    assert_eq!(stats.initial_count, 2);
    assert_eq!(stats.passed, 2);
}

#[test]
fn discovery_errors_abort_before_any_test_runs() {
    let dir = tempdir().unwrap();
    let launcher = write_launcher(dir.path(), "launcher.sh", "exit 0\n");
    let home = dir.path().to_owned();

    let runner = BatchRunnerBuilder::new(batch_config(&launcher))
        .build(
            Box::new(FnLoader(move |_: &Utf8Path| Ok(sh_project(&home)))),
            SignalHandlerKind::Noop,
        )
        .unwrap();

    let mut discoverer =
        FnDiscoverer(|_: &[Utf8PathBuf]| Err(DiscoveryError::new("source scan failed")));

    let mut sink = RecordingSink::new();
    let res = runner.execute_sources(&mut discoverer, &["test_mod.py".into()], &mut sink);

    assert!(res.is_err());
    assert!(sink.events.is_empty());
}
