// Copyright (c) The pytether Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

/// Documented exit codes for `pytether` failures.
///
/// Runs may fail for a variety of reasons. This structure documents the exit
/// codes that occur in case of expected failures.
///
/// Unknown/unexpected failures will always result in exit code 1.
pub enum PytetherExitCode {}

impl PytetherExitCode {
    /// No errors occurred and pytether exited normally.
    pub const OK: i32 = 0;

    /// One or more tests failed.
    pub const TEST_RUN_FAILED: i32 = 100;

    /// The run was cancelled before every test finished.
    ///
    /// Matches the shell convention for an interrupted command.
    pub const RUN_CANCELLED: i32 = 130;

    /// A user issue happened while setting up a pytether invocation.
    pub const SETUP_ERROR: i32 = 96;
}
