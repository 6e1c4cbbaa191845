//! Test runner
//!
//! Walks a case in registration order. For each test the policy gate decides
//! whether it runs, the cycle controller executes it, and the outcome is
//! folded into the case counters and forwarded to the report sink.

use std::collections::BTreeSet;
use std::time::{Duration, Instant};

use tracing::{debug, info, warn};

use crate::case::{Case, TestEntry};
use crate::cycle::{run_cycle, run_cycle_async, CycleOutcome};
use crate::error::{Result, RunError, TestError};
use crate::policy::{self, PolicyDecision};
use crate::report::{percent_of, ReportSink, RunStart, RunSummary, TestRecord, TestStatus};

/// Terminal state of one test
#[derive(Debug)]
pub enum Verdict {
    Passed(CycleOutcome),
    Failed(TestError),
    ExpectedFailure { error: TestError, reason: String },
    Skipped { reason: String },
}

impl Verdict {
    /// Combine the policy decision with what the cycle produced.
    ///
    /// Unclassified errors are handed back for the caller to abort on.
    fn classify(
        decision: PolicyDecision,
        cycle: std::result::Result<CycleOutcome, TestError>,
    ) -> std::result::Result<Self, anyhow::Error> {
        match cycle {
            Ok(outcome) => Ok(Self::Passed(outcome)),
            Err(TestError::Unclassified(error)) => Err(error),
            Err(error) => Ok(match decision {
                PolicyDecision::ExpectFailure(reason) => Self::ExpectedFailure { error, reason },
                _ => Self::Failed(error),
            }),
        }
    }

    pub fn status(&self) -> TestStatus {
        match self {
            Self::Passed(outcome) if outcome.stale.is_empty() => TestStatus::Success,
            Self::Passed(_) => TestStatus::Warning,
            Self::Failed(_) | Self::ExpectedFailure { .. } => TestStatus::Error,
            Self::Skipped { .. } => TestStatus::Skip,
        }
    }

    pub fn output(&self) -> Option<String> {
        match self {
            Self::Passed(outcome) if outcome.stale.is_empty() => None,
            Self::Passed(outcome) => Some(
                outcome
                    .stale
                    .iter()
                    .map(ToString::to_string)
                    .collect::<Vec<_>>()
                    .join("\n"),
            ),
            Self::Failed(error) | Self::ExpectedFailure { error, .. } => Some(error.diagnostic()),
            Self::Skipped { .. } => None,
        }
    }

    pub fn postmessage(&self) -> Option<String> {
        match self {
            Self::ExpectedFailure { reason, .. } | Self::Skipped { reason } => Some(reason.clone()),
            _ => None,
        }
    }
}

/// One run over a case
pub struct Runner<'a> {
    case: &'a mut Case,
    sink: &'a dyn ReportSink,
    tag_filter: BTreeSet<String>,
}

impl<'a> Runner<'a> {
    pub fn new(case: &'a mut Case, sink: &'a dyn ReportSink, tag_filter: &[&str]) -> Self {
        Self {
            case,
            sink,
            tag_filter: tag_filter.iter().map(|tag| tag.to_string()).collect(),
        }
    }

    /// Run every test, blocking on asynchronous ones
    pub fn run(mut self) -> Result<RunSummary> {
        let started = self.start();
        let mut aborted = None;

        for index in 0..self.case.len() {
            let test_started = Instant::now();
            let entry = &self.case.entries()[index];

            let verdict = match self.decide(entry) {
                PolicyDecision::Skip(reason) => Ok(Verdict::Skipped { reason }),
                decision => {
                    Verdict::classify(decision, run_cycle(&entry.handler, &entry.metadata))
                }
            };

            if let Err(error) = self.conclude(index, verdict, test_started.elapsed()) {
                aborted = Some(error);
                break;
            }
        }

        self.finish(started, aborted)
    }

    /// Run every test on the caller's event loop
    pub async fn run_async(mut self) -> Result<RunSummary> {
        let started = self.start();
        let mut aborted = None;

        for index in 0..self.case.len() {
            let test_started = Instant::now();
            let entry = &self.case.entries()[index];

            let verdict = match self.decide(entry) {
                PolicyDecision::Skip(reason) => Ok(Verdict::Skipped { reason }),
                decision => Verdict::classify(
                    decision,
                    run_cycle_async(&entry.handler, &entry.metadata).await,
                ),
            };

            if let Err(error) = self.conclude(index, verdict, test_started.elapsed()) {
                aborted = Some(error);
                break;
            }
        }

        self.finish(started, aborted)
    }

    fn start(&self) -> Instant {
        info!(case = %self.case.label(), tests = self.case.len(), "runner session starts");

        for tag in self.tag_filter.difference(self.case.tags()) {
            warn!(%tag, "excluded tag does not match any registered test");
        }

        self.sink.on_run_start(&RunStart {
            label: self.case.label().to_string(),
            test_count: self.case.len(),
        });

        Instant::now()
    }

    fn decide(&self, entry: &TestEntry) -> PolicyDecision {
        let decision = policy::evaluate(&entry.metadata, &self.tag_filter);
        debug!(test = %entry.name, ?decision, "policy decision");
        decision
    }

    /// Fold a verdict into the counters and emit its record
    fn conclude(
        &mut self,
        index: usize,
        verdict: std::result::Result<Verdict, anyhow::Error>,
        elapsed: Duration,
    ) -> Result<()> {
        let entry = &self.case.entries()[index];

        let verdict = match verdict {
            Ok(verdict) => verdict,
            Err(source) => {
                warn!(test = %entry.name, "unclassified error, aborting run");
                return Err(RunError::Aborted {
                    test: entry.name.clone(),
                    source,
                });
            }
        };

        let record = TestRecord {
            percent_complete: percent_of(index + 1, self.case.len()),
            label: entry.label(),
            status: verdict.status(),
            output: verdict.output(),
            postmessage: verdict.postmessage(),
            comment: entry.metadata.rendered_comment(),
            duration_ms: elapsed.as_millis() as u64,
        };

        let counters = &mut self.case.counters;
        match &verdict {
            Verdict::Passed(outcome) => {
                counters.passed += 1;
                counters.warnings += outcome.stale.len();
                if !outcome.stale.is_empty() {
                    warn!(
                        test = %record.label,
                        stale = outcome.stale.len(),
                        "consecutive launches returned identical results"
                    );
                }
            }
            Verdict::Failed(_) | Verdict::ExpectedFailure { .. } => counters.errors += 1,
            Verdict::Skipped { .. } => counters.skipped += 1,
        }

        debug!(test = %record.label, status = ?record.status, "test finished");
        self.sink.on_test_result(&record);

        Ok(())
    }

    fn finish(self, started: Instant, aborted: Option<RunError>) -> Result<RunSummary> {
        let counters = self.case.counters();
        let summary = RunSummary {
            label: self.case.label().to_string(),
            total_tests: self.case.len(),
            passed: counters.passed,
            warnings: counters.warnings,
            errors: counters.errors,
            skipped: counters.skipped,
            elapsed_seconds: started.elapsed().as_secs_f64(),
        };

        info!(
            case = %summary.label,
            passed = summary.passed,
            warnings = summary.warnings,
            errors = summary.errors,
            skipped = summary.skipped,
            "{} tests runned in {:.2}s",
            summary.total_tests,
            summary.elapsed_seconds
        );
        self.sink.on_run_finish(&summary);

        match aborted {
            Some(error) => Err(error),
            None => Ok(summary),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::TestFailure;

    #[test]
    fn test_classify_respects_expected_failure() {
        let failure = || {
            Err(TestError::Failure {
                failure: TestFailure::new("bad"),
                trace: "bad".to_string(),
            })
        };

        let verdict =
            Verdict::classify(PolicyDecision::ExpectFailure("XFAIL".into()), failure()).unwrap();
        assert_eq!(verdict.status(), TestStatus::Error);
        assert_eq!(verdict.postmessage().as_deref(), Some("XFAIL"));

        let verdict = Verdict::classify(PolicyDecision::Proceed, failure()).unwrap();
        assert!(matches!(verdict, Verdict::Failed(_)));
        assert_eq!(verdict.postmessage(), None);
        let output = verdict.output().unwrap();
        assert!(output.starts_with("TestFailure: bad\n  at "));
        assert!(output.contains("runner.rs:"));
    }

    #[test]
    fn test_classify_hands_back_unclassified() {
        let cycle = Err(TestError::Unclassified(anyhow::anyhow!("boom")));
        let error = Verdict::classify(PolicyDecision::Proceed, cycle).unwrap_err();
        assert_eq!(error.to_string(), "boom");
    }

    #[test]
    fn test_stale_results_make_a_warning() {
        let outcome = CycleOutcome {
            value: 3.into(),
            launches: 2,
            stale: vec![crate::cycle::StaleResult {
                launch: 2,
                value: 3.into(),
            }],
        };

        let verdict = Verdict::Passed(outcome);
        assert_eq!(verdict.status(), TestStatus::Warning);
        assert_eq!(
            verdict.output().as_deref(),
            Some("Last result is equals current result (3 == 3)")
        );
        assert_eq!(Verdict::Passed(CycleOutcome::default()).status(), TestStatus::Success);
    }
}
