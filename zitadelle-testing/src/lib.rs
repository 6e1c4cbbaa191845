//! Test registration and execution engine
//!
//! Tests are registered against a [`Case`] together with their metadata
//! (tags, markers, repeat counts, parameter sets). Running the case executes
//! every test in registration order, classifies each outcome and forwards a
//! structured record to a [`ReportSink`].

pub mod assert;
pub mod case;
pub mod config;
pub mod cycle;
pub mod error;
pub mod execution;
pub mod measure;
pub mod metadata;
pub mod policy;
pub mod report;
pub mod runner;

pub use assert::assert_equal;
pub use case::{Case, Counters, Fixture, Registration, TestEntry};
pub use config::{ReporterKind, RunnerConfig};
pub use cycle::{CycleOutcome, StaleResult};
pub use error::{RunError, TestError, TestFailure};
pub use execution::{Handler, HandlerKind};
pub use measure::measure;
pub use metadata::{Condition, ExpectedFailureMarker, Marker, ParameterSet, SkipMarker, TestMetadata};
pub use policy::PolicyDecision;
pub use report::{
    ConsoleReporter, JsonReporter, MemoryReporter, ReportEvent, ReportSink, RunStart, RunSummary,
    TestRecord, TestStatus,
};
pub use runner::{Runner, Verdict};
