// Copyright (c) The pytether Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Resolved per-project launch settings.

use crate::{
    errors::{ProjectLoadError, ProjectResolveError},
    host::ProjectLoader,
};
use camino::{Utf8Path, Utf8PathBuf};
use std::{collections::HashMap, sync::Arc};
use tracing::debug;

/// The environment variable that receives the joined search path when the
/// project does not name one.
pub const DEFAULT_PATH_ENV_VAR: &str = "PYTHONPATH";

/// Launch settings for a single project, fully resolved: every path is
/// absolute and empty entries have been discarded.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct ProjectSettings {
    /// The console interpreter.
    pub interpreter: Utf8PathBuf,
    /// The windowed interpreter, if the environment provides one.
    pub windows_interpreter: Option<Utf8PathBuf>,
    /// Whether tests run under the windowed interpreter when it exists.
    pub is_windows_application: bool,
    /// The project's working directory.
    pub working_dir: Utf8PathBuf,
    /// Module search path entries, in declaration order.
    pub search_paths: Vec<Utf8PathBuf>,
    /// The environment variable the joined search path is assigned to.
    pub path_env_var: String,
}

impl ProjectSettings {
    /// The interpreter test processes are spawned with.
    pub fn effective_interpreter(&self) -> &Utf8Path {
        match &self.windows_interpreter {
            Some(windows) if self.is_windows_application => windows,
            _ => &self.interpreter,
        }
    }
}

/// Memoizes settings resolution per source file.
///
/// Only successful resolutions are cached; a failing source is re-resolved
/// on each attempt so a fixed project takes effect without a restart.
#[derive(Debug, Default)]
pub(crate) struct SettingsResolver {
    cache: HashMap<Utf8PathBuf, Arc<ProjectSettings>>,
}

impl SettingsResolver {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn resolve(
        &mut self,
        loader: &mut dyn ProjectLoader,
        source: &Utf8Path,
    ) -> Result<Arc<ProjectSettings>, ProjectResolveError> {
        if let Some(settings) = self.cache.get(source) {
            return Ok(settings.clone());
        }
        let settings = Arc::new(resolve_uncached(loader, source)?);
        self.cache.insert(source.to_owned(), settings.clone());
        Ok(settings)
    }
}

fn resolve_uncached(
    loader: &mut dyn ProjectLoader,
    source: &Utf8Path,
) -> Result<ProjectSettings, ProjectResolveError> {
    let raw = match loader.load_project(source) {
        Ok(raw) => raw,
        Err(error @ ProjectLoadError::Parse { .. }) => {
            // An unparseable project model is indistinguishable from a
            // project that never configured an interpreter.
            debug!("project model for {source} failed to parse: {error}");
            return Err(ProjectResolveError::NoInterpreter {
                test_source: source.to_owned(),
            });
        }
        Err(error) => {
            return Err(ProjectResolveError::Load {
                test_source: source.to_owned(),
                error,
            });
        }
    };

    let Some(interpreter) = raw.interpreter else {
        return Err(ProjectResolveError::NoInterpreter {
            test_source: source.to_owned(),
        });
    };

    let working_dir = match &raw.working_dir {
        Some(declared) => raw.project_home.join(declared),
        None => raw.project_home.clone(),
    };
    let search_paths = raw
        .search_paths
        .iter()
        .filter(|entry| !entry.as_str().is_empty())
        .map(|entry| raw.project_home.join(entry))
        .collect();
    let path_env_var = raw
        .path_env_var
        .filter(|name| !name.is_empty())
        .unwrap_or_else(|| DEFAULT_PATH_ENV_VAR.to_owned());

    Ok(ProjectSettings {
        interpreter: interpreter.path,
        windows_interpreter: interpreter.windows_path,
        is_windows_application: raw.is_windows_application,
        working_dir,
        search_paths,
        path_env_var,
    })
}
