//! Run cycle controller
//!
//! Executes one test `count_of_launchs` times for each of its parameter
//! sets and watches for consecutive launches returning the same value.

use std::fmt;

use serde::Serialize;
use serde_json::Value;
use tracing::debug;

use crate::error::TestError;
use crate::execution::Handler;
use crate::metadata::{ParameterSet, TestMetadata};

/// A launch returned the same value as the launch right before it
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StaleResult {
    /// 1-based number of the launch that repeated its predecessor
    pub launch: usize,
    pub value: Value,
}

impl fmt::Display for StaleResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Last result is equals current result ({} == {})",
            self.value, self.value
        )
    }
}

/// What a completed cycle produced
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct CycleOutcome {
    /// Value of the last launch
    pub value: Value,
    pub launches: usize,
    pub stale: Vec<StaleResult>,
}

#[derive(Default)]
struct CycleTracker {
    previous: Option<Value>,
    outcome: CycleOutcome,
}

impl CycleTracker {
    fn record(&mut self, value: Value) {
        self.outcome.launches += 1;

        if !value.is_null() && self.previous.as_ref() == Some(&value) {
            debug!(launch = self.outcome.launches, %value, "stale result");
            self.outcome.stale.push(StaleResult {
                launch: self.outcome.launches,
                value: value.clone(),
            });
        }

        self.previous = Some(value.clone());
        self.outcome.value = value;
    }

    fn finish(self) -> CycleOutcome {
        self.outcome
    }
}

/// Run every launch, blocking on asynchronous bodies.
///
/// The first error ends the cycle; no further launches happen.
pub fn run_cycle(handler: &Handler, metadata: &TestMetadata) -> Result<CycleOutcome, TestError> {
    let no_arguments = [ParameterSet::default()];
    let mut tracker = CycleTracker::default();

    for params in parameter_sets(metadata, &no_arguments) {
        for _ in 0..metadata.count_of_launchs {
            tracker.record(handler.invoke(params)?);
        }
    }

    Ok(tracker.finish())
}

/// Run every launch on the caller's event loop
pub async fn run_cycle_async(
    handler: &Handler,
    metadata: &TestMetadata,
) -> Result<CycleOutcome, TestError> {
    let no_arguments = [ParameterSet::default()];
    let mut tracker = CycleTracker::default();

    for params in parameter_sets(metadata, &no_arguments) {
        for _ in 0..metadata.count_of_launchs {
            tracker.record(handler.invoke_async(params).await?);
        }
    }

    Ok(tracker.finish())
}

fn parameter_sets<'a>(
    metadata: &'a TestMetadata,
    no_arguments: &'a [ParameterSet],
) -> &'a [ParameterSet] {
    if metadata.arguments.is_empty() {
        no_arguments
    } else {
        &metadata.arguments
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::TestFailure;
    use std::cell::RefCell;
    use std::rc::Rc;

    fn metadata(count_of_launchs: usize, arguments: Vec<ParameterSet>) -> TestMetadata {
        TestMetadata {
            count_of_launchs,
            arguments,
            ..TestMetadata::default()
        }
    }

    #[test]
    fn test_constant_result_is_stale_after_first_launch() {
        let handler = Handler::from_sync(|_| anyhow::Ok(7));
        let outcome = run_cycle(&handler, &metadata(3, Vec::new())).unwrap();

        assert_eq!(outcome.launches, 3);
        assert_eq!(outcome.value, Value::from(7));
        assert_eq!(
            outcome.stale.iter().map(|s| s.launch).collect::<Vec<_>>(),
            vec![2, 3]
        );
        assert_eq!(
            outcome.stale[0].to_string(),
            "Last result is equals current result (7 == 7)"
        );
    }

    #[test]
    fn test_null_results_are_never_stale() {
        let handler = Handler::from_sync(|_| anyhow::Ok(()));
        let outcome = run_cycle(&handler, &metadata(4, Vec::new())).unwrap();

        assert_eq!(outcome.launches, 4);
        assert!(outcome.stale.is_empty());
    }

    #[test]
    fn test_sweeps_parameter_sets_in_order() {
        let seen = Rc::new(RefCell::new(Vec::new()));
        let log = seen.clone();
        let handler = Handler::from_sync(move |params: &ParameterSet| {
            let a = params.get(0).and_then(Value::as_i64).unwrap_or_default();
            log.borrow_mut().push(a);
            anyhow::Ok(a)
        });

        let sets = vec![ParameterSet::new().arg(1), ParameterSet::new().arg(2)];
        let outcome = run_cycle(&handler, &metadata(2, sets)).unwrap();

        assert_eq!(*seen.borrow(), vec![1, 1, 2, 2]);
        assert_eq!(outcome.value, Value::from(2));
        // 1 -> 1 and 2 -> 2 repeat, 1 -> 2 does not
        assert_eq!(
            outcome.stale.iter().map(|s| s.launch).collect::<Vec<_>>(),
            vec![2, 4]
        );
    }

    #[test]
    fn test_error_stops_remaining_launches() {
        let calls = Rc::new(RefCell::new(0));
        let counter = calls.clone();
        let handler = Handler::from_sync(move |_| -> anyhow::Result<i32> {
            *counter.borrow_mut() += 1;
            if *counter.borrow() == 2 {
                return Err(TestFailure::new("second launch fails").into());
            }
            Ok(*counter.borrow())
        });

        let sets = vec![ParameterSet::new(), ParameterSet::new()];
        let error = run_cycle(&handler, &metadata(3, sets)).unwrap_err();

        assert!(matches!(error, TestError::Failure { .. }));
        assert_eq!(*calls.borrow(), 2);
    }

    #[tokio::test]
    async fn test_async_cycle_on_caller_loop() {
        let handler = Handler::from_async(|_| async {
            tokio::task::yield_now().await;
            anyhow::Ok(3)
        });

        let outcome = run_cycle_async(&handler, &metadata(2, Vec::new()))
            .await
            .unwrap();

        assert_eq!(outcome.launches, 2);
        assert_eq!(outcome.stale.len(), 1);
    }
}
