// Copyright (c) The pytether Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Assembly of the interpreter command line for a single test.

use crate::{debug::DebugChannel, project::ProjectSettings, test_id::TestId};
use camino::{Utf8Path, Utf8PathBuf};

#[cfg(windows)]
const PATH_LIST_SEP: &str = ";";
#[cfg(not(windows))]
const PATH_LIST_SEP: &str = ":";

/// Debug-run additions to a launch: the allocated attach channel and the
/// debugger's runtime support directory.
#[derive(Clone, Copy, Debug)]
pub(crate) struct DebugArgs<'a> {
    pub(crate) channel: &'a DebugChannel,
    pub(crate) runtime_dir: Option<&'a Utf8Path>,
}

/// Everything needed to spawn one test process. Construction is pure; no
/// part of it touches the filesystem.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct LaunchSpec {
    /// The interpreter binary.
    pub program: Utf8PathBuf,
    /// Arguments passed to the interpreter, launcher script first.
    pub args: Vec<String>,
    /// The directory the process starts in.
    pub working_dir: Utf8PathBuf,
    /// Extra environment, merged over the inherited environment.
    pub env: Vec<(String, String)>,
}

impl LaunchSpec {
    pub(crate) fn build(
        test: &TestId,
        settings: &ProjectSettings,
        launcher_script: &Utf8Path,
        debug: Option<DebugArgs<'_>>,
    ) -> Self {
        let working_dir = match test.source_file().parent() {
            Some(parent) if !parent.as_str().is_empty() => settings.working_dir.join(parent),
            _ => settings.working_dir.clone(),
        };

        let mut search_paths = settings.search_paths.clone();
        if working_dir != settings.working_dir {
            // The launcher imports the test module by bare name, so the
            // module's own directory must stay importable.
            search_paths.insert(0, settings.working_dir.clone());
        }
        if let Some(debug) = &debug
            && let Some(runtime_dir) = debug.runtime_dir
        {
            search_paths.push(runtime_dir.to_owned());
        }
        let joined = search_paths
            .iter()
            .map(|path| path.as_str())
            .collect::<Vec<_>>()
            .join(PATH_LIST_SEP);

        let mut args = vec![
            launcher_script.to_string(),
            "-m".to_owned(),
            test.module_name().to_owned(),
            "-t".to_owned(),
            test.qualified_method(),
        ];
        if let Some(debug) = &debug {
            args.push("-s".to_owned());
            args.push(debug.channel.secret().to_owned());
            args.push("-p".to_owned());
            args.push(debug.channel.port().to_string());
        }

        Self {
            program: settings.effective_interpreter().to_owned(),
            args,
            working_dir,
            env: vec![(settings.path_env_var.clone(), joined)],
        }
    }
}
