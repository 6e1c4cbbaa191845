//! Policy gate deciding how a test is treated before it runs

use std::collections::BTreeSet;

use crate::metadata::{Marker, TestMetadata};

pub const TAG_FILTER_REASON: &str = "tag filter match";
pub const DEFAULT_SKIP_REASON: &str = "SkippedTest";
pub const DEFAULT_EXPECTED_FAILURE_REASON: &str = "XFAIL";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PolicyDecision {
    /// Run with no special context
    Proceed,
    /// Do not run; report the reason
    Skip(String),
    /// Run; a test error is an expected failure with this reason
    ExpectFailure(String),
}

/// Decide in fixed order: tag filter, skip marker, expected-failure marker.
pub fn evaluate(metadata: &TestMetadata, tag_filter: &BTreeSet<String>) -> PolicyDecision {
    if !metadata.tags.is_disjoint(tag_filter) {
        return PolicyDecision::Skip(TAG_FILTER_REASON.to_string());
    }

    match &metadata.marker {
        Marker::Skip(marker) if marker.when.evaluate() => PolicyDecision::Skip(
            marker
                .reason
                .clone()
                .unwrap_or_else(|| DEFAULT_SKIP_REASON.to_string()),
        ),
        Marker::ExpectedFailure(marker) if marker.when.evaluate() => PolicyDecision::ExpectFailure(
            marker
                .reason
                .clone()
                .unwrap_or_else(|| DEFAULT_EXPECTED_FAILURE_REASON.to_string()),
        ),
        _ => PolicyDecision::Proceed,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metadata::{Condition, ExpectedFailureMarker, SkipMarker};

    fn filter(tags: &[&str]) -> BTreeSet<String> {
        tags.iter().map(|tag| tag.to_string()).collect()
    }

    fn tagged(tags: &[&str], marker: Marker) -> TestMetadata {
        TestMetadata {
            tags: filter(tags),
            marker,
            ..TestMetadata::default()
        }
    }

    #[test]
    fn test_tag_filter_wins_over_markers() {
        let metadata = tagged(&["slow", "net"], ExpectedFailureMarker::new().into());

        assert_eq!(
            evaluate(&metadata, &filter(&["net"])),
            PolicyDecision::Skip(TAG_FILTER_REASON.to_string())
        );
        assert_eq!(
            evaluate(&metadata, &filter(&["gpu"])),
            PolicyDecision::ExpectFailure(DEFAULT_EXPECTED_FAILURE_REASON.to_string())
        );
    }

    #[test]
    fn test_skip_marker_honours_condition() {
        let active = tagged(&[], SkipMarker::because("not on CI").into());
        let inactive = tagged(&[], SkipMarker::new().when(false).into());
        let defaulted = tagged(&[], SkipMarker::new().into());

        assert_eq!(
            evaluate(&active, &BTreeSet::new()),
            PolicyDecision::Skip("not on CI".to_string())
        );
        assert_eq!(evaluate(&inactive, &BTreeSet::new()), PolicyDecision::Proceed);
        assert_eq!(
            evaluate(&defaulted, &BTreeSet::new()),
            PolicyDecision::Skip(DEFAULT_SKIP_REASON.to_string())
        );
    }

    #[test]
    fn test_expected_failure_predicate() {
        let metadata = tagged(
            &[],
            ExpectedFailureMarker::because("known bug")
                .when(Condition::predicate(|| true))
                .into(),
        );
        assert_eq!(
            evaluate(&metadata, &BTreeSet::new()),
            PolicyDecision::ExpectFailure("known bug".to_string())
        );

        let inactive = tagged(&[], ExpectedFailureMarker::new().when(false).into());
        assert_eq!(evaluate(&inactive, &BTreeSet::new()), PolicyDecision::Proceed);
    }

    #[test]
    fn test_unmarked_proceeds() {
        assert_eq!(
            evaluate(&TestMetadata::default(), &filter(&["anything"])),
            PolicyDecision::Proceed
        );
    }
}
