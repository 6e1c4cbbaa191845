//! Error types for test execution

use std::fmt::Write as _;
use std::panic::Location;

use thiserror::Error;

pub type Result<T> = std::result::Result<T, RunError>;

/// Domain failure raised by the assertion helpers
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{message}")]
pub struct TestFailure {
    pub message: String,
    /// Where the failure was raised
    pub location: &'static Location<'static>,
}

impl TestFailure {
    #[track_caller]
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            location: Location::caller(),
        }
    }
}

/// Error produced by a single invocation of a test body
#[derive(Error, Debug)]
pub enum TestError {
    #[error("TestFailure: {failure}")]
    Failure { failure: TestFailure, trace: String },

    #[error("AssertionError: {message}")]
    Assertion {
        message: String,
        location: Option<String>,
        trace: Option<String>,
    },

    #[error(transparent)]
    Unclassified(anyhow::Error),
}

impl TestError {
    pub fn assertion(message: impl Into<String>) -> Self {
        Self::Assertion {
            message: message.into(),
            location: None,
            trace: None,
        }
    }

    /// Sort an error returned by a test body into its kind.
    ///
    /// A [`TestFailure`] anywhere in the error (including under added context)
    /// is a test failure; everything else is unclassified.
    pub fn classify(error: anyhow::Error) -> Self {
        let trace = format!("{error:?}");
        match error.downcast::<TestFailure>() {
            Ok(failure) => Self::Failure { failure, trace },
            Err(error) => Self::Unclassified(error),
        }
    }

    /// Whether the runner isolates this error to the failing test
    pub fn is_test_error(&self) -> bool {
        matches!(self, Self::Failure { .. } | Self::Assertion { .. })
    }

    /// Diagnostic text attached to the emitted result record
    pub fn diagnostic(&self) -> String {
        match self {
            Self::Failure { failure, trace } => {
                format!("TestFailure: {trace}\n  at {}", failure.location)
            }
            Self::Assertion {
                message,
                location,
                trace,
            } => {
                let mut text = format!("AssertionError: {message}");
                if let Some(location) = location {
                    let _ = write!(text, "\n  at {location}");
                }
                if let Some(trace) = trace {
                    let _ = write!(text, "\n{trace}");
                }
                text
            }
            Self::Unclassified(error) => format!("{error:?}"),
        }
    }

    pub fn into_anyhow(self) -> anyhow::Error {
        match self {
            Self::Unclassified(error) => error,
            other => anyhow::Error::new(other),
        }
    }
}

/// Error that ends a run or a registration
#[derive(Error, Debug)]
pub enum RunError {
    #[error("test `{test}` raised an unclassified error: {source}")]
    Aborted {
        test: String,
        #[source]
        source: anyhow::Error,
    },

    #[error("fixture `{name}` failed: {source}")]
    Fixture {
        name: String,
        #[source]
        source: anyhow::Error,
    },
}

impl RunError {
    /// Name of the test or fixture that caused the error
    pub fn origin(&self) -> &str {
        match self {
            Self::Aborted { test, .. } => test,
            Self::Fixture { name, .. } => name,
        }
    }
}
