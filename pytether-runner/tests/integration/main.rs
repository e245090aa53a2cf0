// Copyright (c) The pytether Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Integration tests for the batch runner.
//!
//! These drive real processes, using `/bin/sh` as the interpreter and small
//! shell scripts as stand-ins for the Python launcher.

#[cfg(unix)]
mod basic;
#[cfg(unix)]
mod fixtures;
