// Copyright (c) The pytether Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Console reporting sinks for batch runs.

use chrono::{DateTime, FixedOffset};
use owo_colors::{OwoColorize, Style, style};
use pytether_runner::{
    host::{MessageLevel, ResultSink},
    outcome::{RunStats, TestOutcome, TestStatus},
    test_id::TestId,
};
use serde::Serialize;
use std::{io::Write, time::Duration};

#[derive(Debug, Default)]
struct Styles {
    count: Style,
    pass: Style,
    fail: Style,
    warning: Style,
}

impl Styles {
    fn colorize(&mut self) {
        self.count = style().bold();
        self.pass = style().green().bold();
        self.fail = style().red().bold();
        self.warning = style().yellow().bold();
    }
}

/// Reports batch progress as human-readable lines on a writer.
///
/// Failed tests have their captured output written inline, right below the
/// status line.
pub struct HumanSink<W> {
    writer: W,
    verbose: bool,
    styles: Styles,
}

impl<W: Write> HumanSink<W> {
    /// Creates a new sink writing to `writer`.
    pub fn new(writer: W, verbose: bool) -> Self {
        Self {
            writer,
            verbose,
            styles: Styles::default(),
        }
    }

    /// Colorizes the sink's output.
    pub fn colorize(&mut self) {
        self.styles.colorize();
    }

    /// Writes the end-of-run summary line.
    pub fn write_summary(&mut self, stats: &RunStats, elapsed: Duration) {
        let summary_style = if stats.is_success() {
            self.styles.pass
        } else {
            self.styles.fail
        };
        let _ = write!(
            self.writer,
            "------------\n{:>12} ",
            "Summary".style(summary_style)
        );
        let _ = write!(self.writer, "[{:>8.3?}s] ", elapsed.as_secs_f64());
        let _ = write!(
            self.writer,
            "{}",
            stats.finished_count.style(self.styles.count)
        );
        if stats.finished_count != stats.initial_count {
            let _ = write!(
                self.writer,
                "/{}",
                stats.initial_count.style(self.styles.count)
            );
        }

        let tests_str = if stats.initial_count == 1 && stats.finished_count == 1 {
            "test"
        } else {
            "tests"
        };
        let _ = write!(
            self.writer,
            " {tests_str} run: {} passed",
            stats.passed.style(self.styles.pass)
        );
        if stats.failed > 0 {
            let _ = write!(
                self.writer,
                ", {} failed",
                stats.failed.style(self.styles.fail)
            );
        }
        let _ = writeln!(self.writer);
    }

    /// Flushes the underlying writer.
    pub fn finish(&mut self) {
        let _ = self.writer.flush();
    }

    fn write_output_block(&mut self, kind: &str, test: &TestId, text: &str) {
        let header_style = self.styles.fail;
        let _ = write!(self.writer, "\n{}", "--- ".style(header_style));
        let _ = write!(self.writer, "{:12}", kind.style(header_style));
        let _ = write!(self.writer, "{test}");
        let _ = writeln!(self.writer, "{}", " ---".style(header_style));
        let _ = self.writer.write_all(text.as_bytes());
        if !text.ends_with('\n') {
            let _ = writeln!(self.writer);
        }
    }
}

impl<W: Write> ResultSink for HumanSink<W> {
    fn record_start(&mut self, test: &TestId) {
        if self.verbose {
            let _ = writeln!(
                self.writer,
                "{:>12} {test}",
                "START".style(self.styles.count)
            );
        }
    }

    fn record_result(&mut self, outcome: &TestOutcome) {
        let passed = outcome.status.is_passed();
        if passed {
            let _ = write!(self.writer, "{:>12} ", "PASS".style(self.styles.pass));
        } else {
            let _ = write!(self.writer, "{:>12} ", "FAIL".style(self.styles.fail));
        }
        let _ = write!(self.writer, "[{:>8.3?}s] ", outcome.duration.as_secs_f64());
        let _ = writeln!(self.writer, "{}", outcome.test_id);

        if !passed {
            if !outcome.stdout.is_empty() {
                self.write_output_block("STDOUT:", &outcome.test_id, &outcome.stdout);
            }
            if !outcome.stderr.is_empty() {
                self.write_output_block("STDERR:", &outcome.test_id, &outcome.stderr);
            }
        }
    }

    fn record_end(&mut self, _test: &TestId, _status: TestStatus) {}

    fn send_message(&mut self, level: MessageLevel, text: &str) {
        let (heading, heading_style) = match level {
            MessageLevel::Info => ("info", self.styles.count),
            MessageLevel::Warning => ("warning", self.styles.warning),
            MessageLevel::Error => ("error", self.styles.fail),
        };
        let _ = writeln!(self.writer, "{}: {text}", heading.style(heading_style));
    }
}

/// Reports batch progress as JSON lines on a writer.
///
/// Each sink callback becomes one object tagged by an `event` field:
/// `started`, `finished`, `ended`, `message`, plus a closing `summary`.
pub struct JsonSink<W> {
    writer: W,
}

#[derive(Serialize)]
#[serde(tag = "event", rename_all = "kebab-case")]
enum Record<'a> {
    #[serde(rename_all = "kebab-case")]
    Started { test: String },
    #[serde(rename_all = "kebab-case")]
    Finished {
        test: String,
        status: TestStatus,
        start_time: DateTime<FixedOffset>,
        duration_secs: f64,
        stdout: &'a str,
        stderr: &'a str,
    },
    #[serde(rename_all = "kebab-case")]
    Ended { test: String, status: TestStatus },
    #[serde(rename_all = "kebab-case")]
    Message { level: MessageLevel, text: &'a str },
    #[serde(rename_all = "kebab-case")]
    Summary {
        initial_count: usize,
        finished_count: usize,
        passed: usize,
        failed: usize,
        duration_secs: f64,
    },
}

impl<W: Write> JsonSink<W> {
    /// Creates a new sink writing to `writer`.
    pub fn new(writer: W) -> Self {
        Self { writer }
    }

    /// Writes the end-of-run summary record.
    pub fn write_summary(&mut self, stats: &RunStats, elapsed: Duration) {
        self.write_record(&Record::Summary {
            initial_count: stats.initial_count,
            finished_count: stats.finished_count,
            passed: stats.passed,
            failed: stats.failed,
            duration_secs: elapsed.as_secs_f64(),
        });
    }

    /// Flushes the underlying writer.
    pub fn finish(&mut self) {
        let _ = self.writer.flush();
    }

    fn write_record(&mut self, record: &Record<'_>) {
        // A record that cannot be written is dropped; the exit code still
        // carries the overall result.
        if serde_json::to_writer(&mut self.writer, record).is_ok() {
            let _ = writeln!(self.writer);
        }
    }
}

impl<W: Write> ResultSink for JsonSink<W> {
    fn record_start(&mut self, test: &TestId) {
        self.write_record(&Record::Started {
            test: test.to_string(),
        });
    }

    fn record_result(&mut self, outcome: &TestOutcome) {
        self.write_record(&Record::Finished {
            test: outcome.test_id.to_string(),
            status: outcome.status,
            start_time: outcome.start_time,
            duration_secs: outcome.duration.as_secs_f64(),
            stdout: &outcome.stdout,
            stderr: &outcome.stderr,
        });
    }

    fn record_end(&mut self, test: &TestId, status: TestStatus) {
        self.write_record(&Record::Ended {
            test: test.to_string(),
            status,
        });
    }

    fn send_message(&mut self, level: MessageLevel, text: &str) {
        self.write_record(&Record::Message { level, text });
    }
}
