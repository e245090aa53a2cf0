// Copyright (c) The pytether Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! A batch test runner for Python projects.
//!
//! This crate backs the `pytether` binary: it parses the command line, loads
//! project settings from a `pytether.toml` file, and drives the batch runner
//! in [`pytether_runner`] with console reporting.

#![warn(missing_docs)]

mod dispatch;
mod errors;
mod exit_codes;
mod output;
mod project_file;
mod sink;

#[doc(hidden)]
pub use dispatch::*;
#[doc(hidden)]
pub use errors::*;
#[doc(hidden)]
pub use exit_codes::*;
#[doc(hidden)]
pub use output::OutputContext;
