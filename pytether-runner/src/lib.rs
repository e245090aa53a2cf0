// Copyright (c) The pytether Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Core batch-execution logic for pytether.
//!
//! pytether executes previously discovered Python test cases, one isolated
//! interpreter process per test. Each test is launched through a launcher
//! script (`<interpreter> <launcher> -m <module> -t <Class>.<method>`),
//! optionally tethered to a live debugger over an ephemeral TCP port and a
//! random secret, and reported through a host-provided
//! [`ResultSink`](crate::host::ResultSink).
//!
//! The entry point is [`BatchRunnerBuilder`](crate::runner::BatchRunnerBuilder),
//! which pairs a [`ProjectLoader`](crate::host::ProjectLoader) with batch
//! configuration and produces a [`BatchRunner`](crate::runner::BatchRunner).

#![warn(missing_docs)]

pub mod cancel;
mod child;
pub mod debug;
pub mod errors;
pub mod host;
pub mod launch;
pub mod outcome;
mod ports;
pub mod project;
pub mod runner;
pub mod signal;
pub mod test_id;
mod time;
