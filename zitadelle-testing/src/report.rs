//! Test reporting module
//!
//! The runner emits structured records to a [`ReportSink`]; this module
//! defines those records and the reporters that display or collect them.

use std::cell::RefCell;

use colored::Colorize;
use indicatif::{ProgressBar, ProgressStyle};
use serde::{Deserialize, Serialize};
use tracing::warn;

/// Status shown for a finished test
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TestStatus {
    Success,
    Warning,
    Error,
    Skip,
}

/// Emitted once before the first test runs
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunStart {
    pub label: String,
    pub test_count: usize,
}

/// Emitted once per test
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TestRecord {
    /// Share of the case processed once this test is done, 0-100
    pub percent_complete: usize,

    /// `name:line` of the test
    pub label: String,

    pub status: TestStatus,

    /// Diagnostic text (error trace, stale results)
    pub output: Option<String>,

    /// Skip or expected-failure reason
    pub postmessage: Option<String>,

    pub comment: Option<String>,

    pub duration_ms: u64,
}

/// Emitted once after the run, including an aborted one
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunSummary {
    pub label: String,
    pub total_tests: usize,
    pub passed: usize,
    pub warnings: usize,
    pub errors: usize,
    pub skipped: usize,
    pub elapsed_seconds: f64,
}

/// Every event a sink observes, in owned form
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum ReportEvent {
    RunStarted(RunStart),
    TestFinished(TestRecord),
    RunFinished(RunSummary),
}

/// Receiver of the records a run emits
pub trait ReportSink {
    /// Called before the first test
    fn on_run_start(&self, start: &RunStart);

    /// Called after each test reaches a terminal state
    fn on_test_result(&self, record: &TestRecord);

    /// Called once the run is over
    fn on_run_finish(&self, summary: &RunSummary);
}

/// Integer percentage of `part` in `total`; an empty total is 0%
pub fn percent_of(part: usize, total: usize) -> usize {
    if total == 0 {
        0
    } else {
        part * 100 / total
    }
}

/// Collects every event in memory
#[derive(Debug, Default)]
pub struct MemoryReporter {
    events: RefCell<Vec<ReportEvent>>,
}

impl MemoryReporter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<ReportEvent> {
        self.events.borrow().clone()
    }

    pub fn records(&self) -> Vec<TestRecord> {
        self.events
            .borrow()
            .iter()
            .filter_map(|event| match event {
                ReportEvent::TestFinished(record) => Some(record.clone()),
                _ => None,
            })
            .collect()
    }

    /// Summary of the most recent run
    pub fn summary(&self) -> Option<RunSummary> {
        self.events.borrow().iter().rev().find_map(|event| match event {
            ReportEvent::RunFinished(summary) => Some(summary.clone()),
            _ => None,
        })
    }

    pub fn clear(&self) {
        self.events.borrow_mut().clear();
    }
}

impl ReportSink for MemoryReporter {
    fn on_run_start(&self, start: &RunStart) {
        self.events
            .borrow_mut()
            .push(ReportEvent::RunStarted(start.clone()));
    }

    fn on_test_result(&self, record: &TestRecord) {
        self.events
            .borrow_mut()
            .push(ReportEvent::TestFinished(record.clone()));
    }

    fn on_run_finish(&self, summary: &RunSummary) {
        self.events
            .borrow_mut()
            .push(ReportEvent::RunFinished(summary.clone()));
    }
}

/// JSON test reporter, one object per line on stdout
#[derive(Debug, Default)]
pub struct JsonReporter;

impl JsonReporter {
    pub fn new() -> Self {
        Self
    }

    fn emit(&self, event: ReportEvent) {
        match serde_json::to_string(&event) {
            Ok(json) => println!("{json}"),
            Err(e) => warn!("Failed to serialize report event: {}", e),
        }
    }
}

impl ReportSink for JsonReporter {
    fn on_run_start(&self, start: &RunStart) {
        self.emit(ReportEvent::RunStarted(start.clone()));
    }

    fn on_test_result(&self, record: &TestRecord) {
        self.emit(ReportEvent::TestFinished(record.clone()));
    }

    fn on_run_finish(&self, summary: &RunSummary) {
        self.emit(ReportEvent::RunFinished(summary.clone()));
    }
}

/// Console test reporter
pub struct ConsoleReporter {
    verbose: bool,
    show_platform: bool,
    progress_bar: RefCell<Option<ProgressBar>>,
}

impl ConsoleReporter {
    pub fn new(verbose: bool) -> Self {
        Self {
            verbose,
            show_platform: true,
            progress_bar: RefCell::new(None),
        }
    }

    pub fn with_platform(mut self, show_platform: bool) -> Self {
        self.show_platform = show_platform;
        self
    }

    /// Print above the progress bar when one is drawn
    fn line(&self, text: impl AsRef<str>) {
        match self.progress_bar.borrow().as_ref() {
            Some(pb) => pb.println(text.as_ref()),
            None => println!("{}", text.as_ref()),
        }
    }

    fn header(&self, label: &str) -> String {
        let width = terminal_width().saturating_sub(2);
        format!("{:=^width$}", format!(" {label} "))
    }

    fn print_platform(&self, test_count: usize) {
        self.line(format!(
            "{} {}-{}",
            "platform:".white(),
            std::env::consts::OS,
            std::env::consts::ARCH
        ));
        self.line(format!("{} {}", "family:".white(), std::env::consts::FAMILY));
        self.line(format!(
            "{} {}",
            "zitadelle:".white(),
            env!("CARGO_PKG_VERSION")
        ));
        self.line(format!("{}\n", format!("Collected {test_count} items").white().bold()));
    }

    fn print_test_result(&self, record: &TestRecord) {
        let date = chrono::Local::now().format("%d-%m-%Y %H:%M:%S").to_string();
        let postmessage = record.postmessage.as_deref().unwrap_or("");
        let width = terminal_width()
            .saturating_sub(13 + date.len() + postmessage.len())
            .max(1);

        let label = match &record.comment {
            Some(comment) => format!("{} {}", record.label, comment),
            None => record.label.clone(),
        };
        let label = format!("{label:<width$}");
        let percent = format!("[{:>3}%]", record.percent_complete);

        match record.status {
            TestStatus::Success => self.line(format!(
                "{} {} {}{} {}",
                "PASS".black().bold().on_green(),
                date,
                label.green(),
                postmessage.black().on_blue(),
                percent.green().dimmed()
            )),
            TestStatus::Warning => {
                self.line(format!(
                    "{} {} {}{} {}",
                    "WARN".black().bold().on_yellow(),
                    date,
                    label.yellow(),
                    postmessage.black().on_blue(),
                    percent.yellow().dimmed()
                ));
                if let Some(output) = &record.output {
                    self.line(format!("{}\n", format!(" > {output}").yellow()));
                }
            }
            TestStatus::Error => {
                self.line(format!(
                    "\n{} {} {}{} {}",
                    "ERR ".black().bold().on_red(),
                    date,
                    label.red(),
                    postmessage.black().on_blue(),
                    percent.red().dimmed()
                ));
                self.line(self.header(&format!("ERROR: {}", record.label)).red().bold().to_string());
                if let Some(output) = &record.output {
                    self.line(output.red().to_string());
                }
            }
            TestStatus::Skip => self.line(format!(
                "{} {} {}{} {}",
                "SKIP".black().bold().on_blue(),
                date,
                label.blue(),
                postmessage.black().on_blue(),
                percent.blue().dimmed()
            )),
        }
    }

    fn print_results_table(&self, summary: &RunSummary) {
        let total = summary.total_tests;
        let rows = [
            (summary.passed, "Passed"),
            (summary.warnings, "Warnings"),
            (summary.errors, "Errors"),
            (summary.skipped, "Skipped"),
        ];

        self.line(format!("\n{}", "Tests Result".bold().underline()));
        self.line(format!("{:>6}  {:<18} {:>7}", "N", "Tests encountered", "Percent").cyan().to_string());
        self.line(format!("{:>6}  {:<18} {:>7}", total, "Total", "100%").cyan().to_string());

        for (count, name) in rows {
            let row = format!("{:>6}  {:<18} {:>6}%", count, name, percent_of(count, total));
            let row = match name {
                "Passed" => row.black().bold().on_green(),
                "Warnings" => row.black().bold().on_yellow(),
                "Errors" => row.black().bold().on_red(),
                _ => row.black().bold().on_blue(),
            };
            self.line(row.to_string());
        }
    }
}

impl ReportSink for ConsoleReporter {
    fn on_run_start(&self, start: &RunStart) {
        println!("{}", self.header(&format!("{}: session starts", start.label)).bold());

        if self.show_platform {
            self.print_platform(start.test_count);
        }

        if !self.verbose && start.test_count > 5 {
            let progress_bar = ProgressBar::new(start.test_count as u64);
            let style = ProgressStyle::default_bar()
                .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len}")
                .map(|style| style.progress_chars("#>-"))
                .unwrap_or_else(|_| ProgressStyle::default_bar());
            progress_bar.set_style(style);
            *self.progress_bar.borrow_mut() = Some(progress_bar);
        }
    }

    fn on_test_result(&self, record: &TestRecord) {
        self.print_test_result(record);

        if let Some(pb) = self.progress_bar.borrow().as_ref() {
            pb.inc(1);
        }
    }

    fn on_run_finish(&self, summary: &RunSummary) {
        if let Some(pb) = self.progress_bar.borrow_mut().take() {
            pb.finish_and_clear();
        }

        self.print_results_table(summary);

        println!(
            "{}",
            self.header(&format!(
                "{} tests runned {:.2}s",
                summary.total_tests, summary.elapsed_seconds
            ))
            .cyan()
        );
        println!(
            "{} passed, {} warnings, {} errors, {} skipped",
            summary.passed.to_string().green(),
            summary.warnings.to_string().yellow(),
            summary.errors.to_string().red(),
            summary.skipped.to_string().blue()
        );
    }
}

fn terminal_width() -> usize {
    console::Term::stdout()
        .size_checked()
        .map(|(_, columns)| columns as usize)
        .unwrap_or(80)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(status: TestStatus) -> TestRecord {
        TestRecord {
            percent_complete: 50,
            label: "example_test:12".to_string(),
            status,
            output: None,
            postmessage: None,
            comment: None,
            duration_ms: 3,
        }
    }

    #[test]
    fn test_percent_of() {
        assert_eq!(percent_of(1, 3), 33);
        assert_eq!(percent_of(3, 3), 100);
        assert_eq!(percent_of(0, 0), 0);
        assert_eq!(percent_of(2, 0), 0);
    }

    #[test]
    fn test_memory_reporter_keeps_latest_summary() {
        let reporter = MemoryReporter::new();
        let summary = |passed| RunSummary {
            label: "case".to_string(),
            total_tests: 2,
            passed,
            warnings: 0,
            errors: 0,
            skipped: 0,
            elapsed_seconds: 0.0,
        };

        reporter.on_run_start(&RunStart { label: "case".to_string(), test_count: 2 });
        reporter.on_test_result(&record(TestStatus::Success));
        reporter.on_run_finish(&summary(1));
        reporter.on_run_finish(&summary(2));

        assert_eq!(reporter.events().len(), 4);
        assert_eq!(reporter.records().len(), 1);
        assert_eq!(reporter.summary().map(|s| s.passed), Some(2));

        reporter.clear();
        assert!(reporter.events().is_empty());
    }

    #[test]
    fn test_event_json_shape() {
        let event = ReportEvent::TestFinished(TestRecord {
            postmessage: Some("XFAIL".to_string()),
            ..record(TestStatus::Error)
        });

        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["event"], "test_finished");
        assert_eq!(json["status"], "error");
        assert_eq!(json["postmessage"], "XFAIL");
        assert_eq!(json["percent_complete"], 50);

        let parsed: ReportEvent = serde_json::from_value(json).unwrap();
        assert_eq!(parsed, event);
    }

    #[test]
    fn test_console_header_is_centered() {
        let reporter = ConsoleReporter::new(false);
        let header = reporter.header("session");

        assert!(header.contains(" session "));
        assert!(header.starts_with('='));
        assert!(header.ends_with('='));
    }
}
