// Copyright (c) The pytether Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Identifiers for discovered test cases.

use crate::errors::TestIdError;
use camino::{Utf8Path, Utf8PathBuf};
use serde::{Deserialize, Serialize};
use std::{fmt, str::FromStr};

/// The fully-qualified identifier of one test case.
///
/// A test identifier names the source file the test lives in, the test class,
/// and the test method, and renders as
/// `<source_file>::<ClassName>::<method_name>`. Identifiers are immutable and
/// unique within a batch.
#[derive(Clone, Debug, Deserialize, Eq, Hash, PartialEq, Serialize)]
pub struct TestId {
    source_file: Utf8PathBuf,
    class_name: String,
    method_name: String,
}

impl TestId {
    /// Creates a new test identifier from its parts.
    ///
    /// Fails if any part is empty.
    pub fn new(
        source_file: impl Into<Utf8PathBuf>,
        class_name: impl Into<String>,
        method_name: impl Into<String>,
    ) -> Result<Self, TestIdError> {
        let id = Self {
            source_file: source_file.into(),
            class_name: class_name.into(),
            method_name: method_name.into(),
        };
        if id.source_file.as_str().is_empty() {
            return Err(TestIdError::EmptySegment {
                input: id.to_string(),
                segment: "source",
            });
        }
        if id.class_name.is_empty() {
            return Err(TestIdError::EmptySegment {
                input: id.to_string(),
                segment: "class",
            });
        }
        if id.method_name.is_empty() {
            return Err(TestIdError::EmptySegment {
                input: id.to_string(),
                segment: "method",
            });
        }
        Ok(id)
    }

    /// The source file the test was discovered in.
    pub fn source_file(&self) -> &Utf8Path {
        &self.source_file
    }

    /// The name of the test class.
    pub fn class_name(&self) -> &str {
        &self.class_name
    }

    /// The name of the test method.
    pub fn method_name(&self) -> &str {
        &self.method_name
    }

    /// The module name the launcher imports: the source file name without
    /// its extension.
    pub fn module_name(&self) -> &str {
        self.source_file.file_stem().unwrap_or("")
    }

    /// The `<Class>.<method>` form passed to the launcher's `-t` flag.
    pub fn qualified_method(&self) -> String {
        format!("{}.{}", self.class_name, self.method_name)
    }
}

impl fmt::Display for TestId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}::{}::{}",
            self.source_file, self.class_name, self.method_name
        )
    }
}

impl FromStr for TestId {
    type Err = TestIdError;

    /// Parses `<source>::<Class>::<method>`.
    ///
    /// The method and class are the last two `::`-separated segments; any
    /// earlier `::` belongs to the source path.
    fn from_str(input: &str) -> Result<Self, Self::Err> {
        let mut parts = input.rsplitn(3, "::");
        let (method, class, source) = match (parts.next(), parts.next(), parts.next()) {
            (Some(method), Some(class), Some(source)) => (method, class, source),
            _ => {
                return Err(TestIdError::InvalidFormat {
                    input: input.to_owned(),
                });
            }
        };
        Self::new(source, class, method)
    }
}
