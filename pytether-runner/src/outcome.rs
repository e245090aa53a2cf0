// Copyright (c) The pytether Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Test outcomes and batch statistics.

use crate::test_id::TestId;
use chrono::{DateTime, FixedOffset};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Whether a test passed or failed.
#[derive(Clone, Copy, Debug, Deserialize, Eq, PartialEq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum TestStatus {
    /// The test process exited cleanly with code zero.
    Passed,
    /// The test process exited non-zero, was killed, or never got as far
    /// as producing an exit code.
    Failed,
}

impl TestStatus {
    /// Returns true if the status is [`Passed`](Self::Passed).
    pub fn is_passed(self) -> bool {
        matches!(self, Self::Passed)
    }

    /// Derives a status from a wait result. A kill delivered by the runner
    /// wins over whatever exit code the process died with.
    pub(crate) fn from_wait(status: std::process::ExitStatus, killed_by_runner: bool) -> Self {
        if killed_by_runner {
            Self::Failed
        } else if status.success() {
            Self::Passed
        } else {
            Self::Failed
        }
    }
}

/// The finalized result of one test.
#[derive(Clone, Debug)]
pub struct TestOutcome {
    /// The test this outcome belongs to.
    pub test_id: TestId,
    /// When the test was started.
    pub start_time: DateTime<FixedOffset>,
    /// Wall-clock time from launch to finalization.
    pub duration: Duration,
    /// The derived status.
    pub status: TestStatus,
    /// Captured standard output, lossily decoded.
    pub stdout: String,
    /// Captured standard error, lossily decoded.
    pub stderr: String,
}

impl TestOutcome {
    /// When the test finished.
    pub fn end_time(&self) -> DateTime<FixedOffset> {
        self.start_time + self.duration
    }
}

/// Counters for a batch run.
#[derive(Copy, Clone, Default, Debug, Eq, PartialEq)]
pub struct RunStats {
    /// The number of tests the batch started with.
    pub initial_count: usize,
    /// The number of tests that ran to a recorded result.
    pub finished_count: usize,
    /// Tests that passed.
    pub passed: usize,
    /// Tests that failed.
    pub failed: usize,
}

impl RunStats {
    /// True if every test in the batch finished and passed.
    pub fn is_success(&self) -> bool {
        self.failed == 0 && self.finished_count == self.initial_count
    }

    /// True if the batch stopped before reaching every test.
    pub fn is_cancelled(&self) -> bool {
        self.finished_count < self.initial_count
    }

    pub(crate) fn on_test_finished(&mut self, status: TestStatus) {
        self.finished_count += 1;
        match status {
            TestStatus::Passed => self.passed += 1,
            TestStatus::Failed => self.failed += 1,
        }
    }
}
