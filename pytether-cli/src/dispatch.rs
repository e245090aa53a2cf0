// Copyright (c) The pytether Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

use crate::{
    ExpectedError, OutputContext,
    errors::Result,
    exit_codes::PytetherExitCode,
    output::OutputOpts,
    project_file::FileProjectLoader,
    sink::{HumanSink, JsonSink},
};
use camino::Utf8PathBuf;
use clap::{Parser, Subcommand, ValueEnum};
use pytether_runner::{
    runner::{BatchConfig, BatchRunnerBuilder},
    signal::SignalHandlerKind,
    test_id::TestId,
};
use std::{io::BufWriter, time::Instant};
use supports_color::Stream;
use tracing::warn;

/// A batch test runner for Python projects.
#[derive(Debug, Parser)]
#[command(
    version,
    bin_name = "pytether",
    styles = crate::output::clap_styles::style(),
    max_term_width = 100
)]
pub struct PytetherApp {
    #[clap(flatten)]
    output: OutputOpts,

    #[clap(subcommand)]
    command: Command,
}

impl PytetherApp {
    /// Initializes the output context.
    pub fn init_output(&self) -> OutputContext {
        self.output.init()
    }

    /// Executes the command.
    pub fn exec(self, output: OutputContext) -> Result<i32> {
        match self.command {
            Command::Run(opts) => opts.exec(output),
        }
    }
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Run previously discovered tests
    Run(RunOpts),
}

#[derive(Debug, clap::Args)]
struct RunOpts {
    /// Path to the project settings file
    #[arg(long, value_name = "PATH")]
    project: Utf8PathBuf,

    /// Path to the launcher script [default: launcher.py next to the project
    /// file]
    #[arg(long, value_name = "PATH")]
    launcher: Option<Utf8PathBuf>,

    /// Launch tests under a debugger
    #[arg(long)]
    debug: bool,

    /// Format to use for runner events
    #[arg(long, value_enum, default_value_t, value_name = "FMT")]
    message_format: MessageFormatOpts,

    /// Tests to run, as `<source-file>::<class>::<method>`
    #[arg(value_name = "TESTS", required = true)]
    tests: Vec<String>,
}

#[derive(Copy, Clone, Debug, Default, ValueEnum)]
enum MessageFormatOpts {
    #[default]
    Human,
    Json,
}

impl RunOpts {
    fn exec(self, output: OutputContext) -> Result<i32> {
        let tests = self
            .tests
            .iter()
            .map(|input| {
                input.parse::<TestId>().map_err(|err| {
                    ExpectedError::TestIdParse {
                        input: input.clone(),
                        err,
                    }
                })
            })
            .collect::<Result<Vec<_>>>()?;

        let current_dir = std::env::current_dir()
            .map_err(|err| ExpectedError::CurrentDir { err })?;
        let current_dir = Utf8PathBuf::try_from(current_dir)
            .map_err(|err| ExpectedError::CurrentDirInvalidUtf8 { err })?;

        let project_path = current_dir.join(&self.project);
        let launcher_script = match self.launcher {
            Some(path) => current_dir.join(path),
            None => {
                let parent = project_path.parent().unwrap_or("".as_ref());
                parent.join("launcher.py")
            }
        };

        let loader = FileProjectLoader::new(&project_path)?;

        if self.debug {
            // The standalone CLI carries no debug adapter. The runner
            // library accepts a host through BatchRunnerBuilder.
            warn!("no debugger host is configured; running without the debugger");
        }
        let config = BatchConfig {
            launcher_script,
            debug: None,
        };

        let runner = BatchRunnerBuilder::new(config)
            .build(Box::new(loader), SignalHandlerKind::Standard)
            .map_err(|err| ExpectedError::RunnerBuild { err })?;

        let start = Instant::now();
        let stats = match self.message_format {
            MessageFormatOpts::Human => {
                let mut sink = HumanSink::new(BufWriter::new(std::io::stderr()), output.verbose);
                if output.color.should_colorize(Stream::Stderr) {
                    sink.colorize();
                }
                let stats = runner.execute(&tests, &mut sink);
                sink.write_summary(&stats, start.elapsed());
                sink.finish();
                stats
            }
            MessageFormatOpts::Json => {
                let mut sink = JsonSink::new(BufWriter::new(std::io::stdout()));
                let stats = runner.execute(&tests, &mut sink);
                sink.write_summary(&stats, start.elapsed());
                sink.finish();
                stats
            }
        };

        if stats.is_cancelled() {
            return Err(ExpectedError::RunCancelled);
        }
        if !stats.is_success() {
            return Err(ExpectedError::TestRunFailed);
        }
        Ok(PytetherExitCode::OK)
    }
}
