// Copyright (c) The pytether Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

use crate::{exit_codes::PytetherExitCode, output::StderrStyles};
use camino::Utf8PathBuf;
use owo_colors::OwoColorize;
use pytether_runner::errors::{RunnerBuildError, TestIdError};
use std::error::Error;
use thiserror::Error;
use tracing::error;

pub(crate) type Result<T, E = ExpectedError> = std::result::Result<T, E>;

// Note that the #[error()] strings are mostly placeholder messages -- the
// expected way to print out errors is with the display_to_stderr method,
// which colorizes errors.

/// An error that occurred while setting up or completing a pytether run.
#[derive(Debug, Error)]
#[doc(hidden)]
pub enum ExpectedError {
    #[error("test identifier parse error")]
    TestIdParse {
        input: String,
        #[source]
        err: TestIdError,
    },
    #[error("could not determine current directory")]
    CurrentDir {
        #[source]
        err: std::io::Error,
    },
    #[error("current directory is not valid UTF-8")]
    CurrentDirInvalidUtf8 {
        #[source]
        err: camino::FromPathBufError,
    },
    #[error("project file read error")]
    ProjectFileRead {
        path: Utf8PathBuf,
        #[source]
        err: std::io::Error,
    },
    #[error("project file parse error")]
    ProjectFileParse {
        path: Utf8PathBuf,
        #[source]
        err: Box<toml::de::Error>,
    },
    #[error("runner build error")]
    RunnerBuild {
        #[source]
        err: RunnerBuildError,
    },
    #[error("test run failed")]
    TestRunFailed,
    #[error("test run cancelled")]
    RunCancelled,
}

impl ExpectedError {
    /// Returns the exit code for the process.
    pub fn process_exit_code(&self) -> i32 {
        match self {
            Self::TestIdParse { .. }
            | Self::CurrentDir { .. }
            | Self::CurrentDirInvalidUtf8 { .. }
            | Self::ProjectFileRead { .. }
            | Self::ProjectFileParse { .. }
            | Self::RunnerBuild { .. } => PytetherExitCode::SETUP_ERROR,
            Self::TestRunFailed => PytetherExitCode::TEST_RUN_FAILED,
            Self::RunCancelled => PytetherExitCode::RUN_CANCELLED,
        }
    }

    /// Displays this error to stderr.
    pub fn display_to_stderr(&self, styles: &StderrStyles) {
        let mut next_error = match self {
            Self::TestIdParse { input, err } => {
                error!(
                    "failed to parse test identifier `{}`",
                    input.style(styles.bold)
                );
                Some(err as &dyn Error)
            }
            Self::CurrentDir { err } => {
                error!("could not determine the current directory");
                Some(err as &dyn Error)
            }
            Self::CurrentDirInvalidUtf8 { err } => {
                error!("current directory is not valid UTF-8");
                Some(err as &dyn Error)
            }
            Self::ProjectFileRead { path, err } => {
                error!("failed to read project file `{}`", path.style(styles.bold));
                Some(err as &dyn Error)
            }
            Self::ProjectFileParse { path, err } => {
                error!("failed to parse project file `{}`", path.style(styles.bold));
                Some(err.as_ref() as &dyn Error)
            }
            Self::RunnerBuild { err } => {
                error!("failed to set up the test runner");
                Some(err as &dyn Error)
            }
            Self::TestRunFailed => {
                error!("test run failed");
                None
            }
            Self::RunCancelled => {
                error!("test run cancelled");
                None
            }
        };

        while let Some(err) = next_error {
            error!(target: "pytether::no_heading", "\nCaused by:\n  {}", err);
            next_error = err.source();
        }
    }
}
