// Copyright (c) The pytether Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Errors produced by pytether.

use camino::Utf8PathBuf;
use std::{error, fmt, io, sync::Arc};
use thiserror::Error;

/// An error that occurred while resolving execution settings for a test
/// source.
///
/// Every variant is scoped to a single settings-resolution unit: the batch
/// continues with the next test.
#[derive(Debug, Error)]
pub enum ProjectResolveError {
    /// The project has no usable interpreter configured, or its interpreter
    /// metadata was malformed.
    #[error("no Python interpreter available for the project of `{test_source}`")]
    NoInterpreter {
        /// The test source file the resolution was performed for.
        test_source: Utf8PathBuf,
    },

    /// The project loader failed in a way that is not recoverable for this
    /// source.
    #[error("error loading project settings for `{test_source}`")]
    Load {
        /// The test source file the resolution was performed for.
        test_source: Utf8PathBuf,
        /// The underlying loader error.
        #[source]
        error: ProjectLoadError,
    },
}

/// An error returned by a [`ProjectLoader`](crate::host::ProjectLoader)
/// implementation.
#[derive(Debug, Error)]
pub enum ProjectLoadError {
    /// Project data exists but could not be parsed.
    ///
    /// Settings resolution treats this as a project with no interpreter
    /// rather than a hard failure.
    #[error("project data at `{path}` failed to parse")]
    Parse {
        /// The file or directory the loader attempted to parse.
        path: Utf8PathBuf,
        /// The underlying parse error.
        #[source]
        error: Box<dyn error::Error + Send + Sync>,
    },

    /// An I/O error occurred while reading project data.
    #[error("error reading project data from `{path}`")]
    Io {
        /// The file or directory the loader attempted to read.
        path: Utf8PathBuf,
        /// The underlying error.
        #[source]
        error: io::Error,
    },
}

/// An error that occurred while allocating a debug-attach channel.
#[derive(Debug, Error)]
pub enum PortAllocError {
    /// Every candidate in the scanned window of the dynamic port range was
    /// in use.
    #[error("no free TCP port found in the dynamic port range")]
    NoFreePort,

    /// The snapshot of active local TCP endpoints could not be read.
    #[error("failed to snapshot active TCP endpoints")]
    Snapshot(#[source] io::Error),
}

/// An error that occurred while starting a test process.
#[derive(Clone, Debug, Error)]
pub enum ChildStartError {
    /// The interpreter path does not exist on disk.
    #[error("interpreter `{program}` not found")]
    ProgramMissing {
        /// The interpreter path that was checked.
        program: Utf8PathBuf,
    },

    /// An error occurred while spawning the child process.
    #[error("error spawning child process")]
    Spawn(#[source] Arc<io::Error>),
}

/// A transport-level failure reported by a
/// [`DebugHost`](crate::host::DebugHost).
///
/// Attach treats this as non-retryable: the test process is killed and the
/// test is recorded as failed.
#[derive(Debug, Error)]
#[error("debugger transport failure: {message}")]
pub struct DebugHostError {
    message: String,
    #[source]
    source: Option<Box<dyn error::Error + Send + Sync>>,
}

impl DebugHostError {
    /// Creates a new error from a message.
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            source: None,
        }
    }

    /// Creates a new error from a message and an underlying error.
    pub fn with_source(
        message: impl Into<String>,
        source: impl Into<Box<dyn error::Error + Send + Sync>>,
    ) -> Self {
        Self {
            message: message.into(),
            source: Some(source.into()),
        }
    }
}

/// An error that occurred while discovering tests from source files.
#[derive(Debug, Error)]
#[error("test discovery failed: {message}")]
pub struct DiscoveryError {
    message: String,
    #[source]
    source: Option<Box<dyn error::Error + Send + Sync>>,
}

impl DiscoveryError {
    /// Creates a new error from a message.
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            source: None,
        }
    }

    /// Creates a new error from a message and an underlying error.
    pub fn with_source(
        message: impl Into<String>,
        source: impl Into<Box<dyn error::Error + Send + Sync>>,
    ) -> Self {
        Self {
            message: message.into(),
            source: Some(source.into()),
        }
    }
}

/// An error that occurred while parsing a test identifier.
#[derive(Clone, Debug, Eq, Error, PartialEq)]
pub enum TestIdError {
    /// The identifier does not have the `<source>::<Class>::<method>` shape.
    #[error("invalid test identifier `{input}`: expected `<source>::<Class>::<method>`")]
    InvalidFormat {
        /// The input that failed to parse.
        input: String,
    },

    /// One of the identifier's segments is empty.
    #[error("invalid test identifier `{input}`: empty {segment} segment")]
    EmptySegment {
        /// The input that failed to parse.
        input: String,
        /// The name of the empty segment.
        segment: &'static str,
    },
}

/// An error that occurred while building a
/// [`BatchRunner`](crate::runner::BatchRunner).
///
/// This is the only failure that is fatal to a whole batch; everything after
/// the run loop starts is scoped to a single test.
#[derive(Debug, Error)]
pub enum RunnerBuildError {
    /// Creating the Tokio runtime failed.
    #[error("error creating Tokio runtime")]
    RuntimeCreate(#[source] io::Error),

    /// Registering the signal handler with the runtime failed.
    #[error("error setting up signal handler")]
    SignalHandlerSetup(#[source] io::Error),
}

/// Displays an error and its chain of sources on a single line, separated by
/// colons.
pub struct DisplayErrorChain<'a>(&'a (dyn error::Error + 'static));

impl<'a> DisplayErrorChain<'a> {
    /// Wraps an error for display.
    pub fn new(error: &'a (dyn error::Error + 'static)) -> Self {
        Self(error)
    }
}

impl fmt::Display for DisplayErrorChain<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)?;
        let mut cause = self.0.source();
        while let Some(error) = cause {
            write!(f, ": {error}")?;
            cause = error.source();
        }
        Ok(())
    }
}
