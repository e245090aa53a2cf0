// Copyright (c) The pytether Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Project settings read from a `pytether.toml` file.

use crate::errors::ExpectedError;
use camino::{Utf8Path, Utf8PathBuf};
use pytether_runner::{
    errors::ProjectLoadError,
    host::{ProjectLoader, RawInterpreter, RawProject},
};
use serde::Deserialize;

/// The schema of a `pytether.toml` project file.
///
/// Paths may be relative; they are anchored to the directory containing the
/// project file.
#[derive(Clone, Debug, Default, Deserialize, Eq, PartialEq)]
#[serde(rename_all = "kebab-case", deny_unknown_fields)]
pub struct ProjectFile {
    /// The console interpreter binary.
    pub interpreter: Option<Utf8PathBuf>,
    /// The windowed interpreter binary, used when `windows-application` is
    /// set.
    pub windows_interpreter: Option<Utf8PathBuf>,
    /// Whether the project targets a windowed (GUI) interpreter.
    #[serde(default)]
    pub windows_application: bool,
    /// The working directory tests run in.
    pub working_dir: Option<Utf8PathBuf>,
    /// Module search path entries.
    #[serde(default)]
    pub search_paths: Vec<Utf8PathBuf>,
    /// The environment variable receiving the joined search path.
    pub path_env_var: Option<String>,
}

impl ProjectFile {
    /// Reads and parses a project file.
    pub fn load(path: &Utf8Path) -> Result<Self, ExpectedError> {
        let text = std::fs::read_to_string(path).map_err(|err| ExpectedError::ProjectFileRead {
            path: path.to_owned(),
            err,
        })?;
        toml::from_str(&text).map_err(|err| ExpectedError::ProjectFileParse {
            path: path.to_owned(),
            err: Box::new(err),
        })
    }

    /// Converts the file into the runner's project shape, anchored at
    /// `project_home`.
    pub fn into_raw_project(self, project_home: Utf8PathBuf) -> RawProject {
        RawProject {
            interpreter: self.interpreter.map(|path| RawInterpreter {
                path,
                windows_path: self.windows_interpreter,
            }),
            project_home,
            working_dir: self.working_dir,
            search_paths: self.search_paths,
            path_env_var: self.path_env_var,
            is_windows_application: self.windows_application,
        }
    }
}

/// A [`ProjectLoader`] serving settings from a single project file.
///
/// The file is read and parsed once, up front, so a broken file fails the
/// invocation before any test starts. Every test source resolves to the same
/// project.
#[derive(Clone, Debug)]
pub struct FileProjectLoader {
    project: RawProject,
}

impl FileProjectLoader {
    /// Parses the project file at `path` and builds a loader around it.
    pub fn new(path: &Utf8Path) -> Result<Self, ExpectedError> {
        let file = ProjectFile::load(path)?;
        let project_home = match path.parent() {
            Some(parent) if !parent.as_str().is_empty() => parent.to_owned(),
            _ => Utf8PathBuf::from("."),
        };
        Ok(Self {
            project: file.into_raw_project(project_home),
        })
    }
}

impl ProjectLoader for FileProjectLoader {
    fn load_project(&mut self, _source: &Utf8Path) -> Result<RawProject, ProjectLoadError> {
        Ok(self.project.clone())
    }
}
