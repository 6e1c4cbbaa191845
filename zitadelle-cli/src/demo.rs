//! Demonstration cases bundled with the CLI

use std::time::Duration;

use anyhow::{Context, Result};
use clap::ValueEnum;
use serde_json::Value;
use tracing::info;
use zitadelle_testing::{
    assert_equal, measure, Case, Condition, ExpectedFailureMarker, ParameterSet, RunnerConfig,
    SkipMarker,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum Suite {
    Sync,
    Async,
    All,
}

fn add(a: i64, b: i64) -> i64 {
    a + b
}

fn int(params: &ParameterSet, name: &str, default: i64) -> i64 {
    params.named(name).and_then(Value::as_i64).unwrap_or(default)
}

/// Synchronous case covering fixtures, markers, tags and parameter sweeps
pub fn sync_case() -> Result<Case> {
    let mut case = Case::new("SyncCase");

    let offset = case
        .register_fixture_with(
            "offset",
            ParameterSet::new().kwarg("base", 10),
            |params: &ParameterSet| anyhow::Ok(int(params, "base", 0)),
        )?
        .as_i64()
        .context("offset fixture did not produce an integer")?;

    case.register_test("example_test2", |_| {
        assert!(add(1, 2) == 3);
        anyhow::Ok(3)
    });

    case.mark_skip("example_test3", SkipMarker::because("demonstrates skipping"));
    case.register_test("example_test3", |_| {
        assert_equal(add(1, 2), 4, "1 + 2 should be equal to 3")?;
        anyhow::Ok(4)
    });

    case.register_test("example_test4", move |_| {
        assert_equal(add(offset, 2), 12, "10 + 2 should be equal to 12")?;
        anyhow::Ok(12)
    });

    case.register_test("example_test5", |_| {
        assert!(add(1, 2) == 4, "1 + 2 is not 4");
        anyhow::Ok(4)
    })
    .mark_expected_failure(ExpectedFailureMarker::because("addition is not broken"));

    case.register_test("example_test6", |_| {
        let (sum, _) = measure("example_test6", || add(20, 40));
        assert_eq!(sum, 60);
        anyhow::Ok(sum)
    })
    .tags(["slow"]);

    case.register_test("parametrized", |params: &ParameterSet| {
        let (a, b) = (int(params, "a", 0), int(params, "b", 0));
        assert_equal(add(a, b), a + b, "addition is not commutative with itself")?;
        anyhow::Ok(a + b)
    })
    .comment("adds {a} and {b}")
    .count_of_launchs(2)
    .arguments([
        ParameterSet::new().kwarg("a", 1).kwarg("b", 2),
        ParameterSet::new().kwarg("a", 10).kwarg("b", 2),
    ]);

    Ok(case)
}

/// Asynchronous case awaited on the caller's event loop
pub fn async_case() -> Case {
    let mut case = Case::new("AsyncCase");

    case.register_async_test("example_test1", |params: ParameterSet| async move {
        let a = int(&params, "a", 2);
        tokio::time::sleep(Duration::from_millis(10)).await;
        assert_equal(add(1, a), a + 1, "1 + 2 should be equal to 3")?;
        anyhow::Ok(3)
    })
    .comment("async test example")
    .count_of_launchs(2);

    case.register_async_test("joined", |_| async {
        let (left, right) = tokio::join!(async { add(1, 1) }, async { add(2, 2) });
        assert_equal(left + right, 6, "joined sums should add up to 6")?;
        anyhow::Ok(())
    })
    .tags(["net"]);

    case.register_async_test("platform_specific", |_| async { anyhow::Ok(()) })
        .mark_skip(
            SkipMarker::because("not supported on windows")
                .when(Condition::predicate(|| cfg!(windows))),
        );

    case
}

pub fn run(suite: Suite, config: &RunnerConfig) -> Result<()> {
    let reporter = config.build_reporter();
    let tag_filter = config.tag_filter();

    if matches!(suite, Suite::Sync | Suite::All) {
        let mut case = sync_case()?;
        let summary = case.run(&tag_filter, reporter.as_ref())?;
        info!(case = %summary.label, errors = summary.errors, "case finished");
    }

    if matches!(suite, Suite::Async | Suite::All) {
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .context("Failed to start the event loop")?;

        let mut case = async_case();
        let summary = runtime.block_on(case.run_async(&tag_filter, reporter.as_ref()))?;
        info!(case = %summary.label, errors = summary.errors, "case finished");
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use zitadelle_testing::{MemoryReporter, TestStatus};

    #[test]
    fn test_sync_case_outcome() {
        let mut case = sync_case().unwrap();
        let reporter = MemoryReporter::new();
        let summary = case.run(&[], &reporter).unwrap();

        assert_eq!(summary.total_tests, 6);
        assert_eq!(summary.passed, 4);
        assert_eq!(summary.warnings, 2);
        assert_eq!(summary.errors, 1);
        assert_eq!(summary.skipped, 1);
        assert_eq!(case.fixture("offset"), Some(&Value::from(10)));

        let statuses: Vec<_> = reporter.records().iter().map(|r| r.status).collect();
        assert_eq!(
            statuses,
            vec![
                TestStatus::Success,
                TestStatus::Skip,
                TestStatus::Success,
                TestStatus::Error,
                TestStatus::Success,
                TestStatus::Warning,
            ]
        );
    }

    #[test]
    fn test_sync_case_with_tag_filter() {
        let mut case = sync_case().unwrap();
        let summary = case.run(&["slow"], &MemoryReporter::new()).unwrap();

        assert_eq!(summary.passed, 3);
        assert_eq!(summary.skipped, 2);
    }

    #[test]
    fn test_async_case_outcome() {
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .unwrap();
        let mut case = async_case();
        let summary = runtime
            .block_on(case.run_async(&[], &MemoryReporter::new()))
            .unwrap();

        assert_eq!(summary.total_tests, 3);
        assert_eq!(summary.passed + summary.skipped, 3);
        assert_eq!(summary.warnings, 1);
        assert_eq!(summary.errors, 0);
    }
}
