//! Test registry
//!
//! A [`Case`] owns its registered tests in registration order, its eagerly
//! evaluated fixtures, the union of all test tags, and the aggregate
//! counters the runner updates.

use std::collections::{BTreeSet, HashMap};
use std::future::Future;
use std::panic::Location;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::debug;

use crate::error::{Result, RunError};
use crate::execution::Handler;
use crate::metadata::{ExpectedFailureMarker, Marker, ParameterSet, SkipMarker, TestMetadata};
use crate::report::{ReportSink, RunSummary};
use crate::runner::Runner;

/// Aggregate outcome counters of a case.
///
/// Only the runner writes them, and they are never reset: running the same
/// case twice accumulates.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Counters {
    pub passed: usize,
    pub warnings: usize,
    pub errors: usize,
    pub skipped: usize,
}

/// A registered test
#[derive(Debug)]
pub struct TestEntry {
    pub name: String,
    pub line: u32,
    pub handler: Handler,
    pub metadata: TestMetadata,
}

impl TestEntry {
    /// `name:line`, as shown in reports
    pub fn label(&self) -> String {
        format!("{}:{}", self.name, self.line)
    }
}

/// A fixture evaluated at registration
#[derive(Debug)]
pub struct Fixture {
    pub name: String,
    pub value: Value,
    pub metadata: TestMetadata,
}

/// Named, ordered collection of tests with aggregate counters
#[derive(Debug)]
pub struct Case {
    label: String,
    tests: Vec<TestEntry>,
    fixtures: HashMap<String, Fixture>,
    pending_markers: HashMap<String, Marker>,
    tags: BTreeSet<String>,
    pub(crate) counters: Counters,
}

impl Default for Case {
    fn default() -> Self {
        Self::new("TestCase")
    }
}

impl Case {
    pub fn new(label: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            tests: Vec::new(),
            fixtures: HashMap::new(),
            pending_markers: HashMap::new(),
            tags: BTreeSet::new(),
            counters: Counters::default(),
        }
    }

    /// Register a synchronous test.
    ///
    /// Registering a name twice replaces the handler in place (last
    /// registration wins) and keeps any marker already applied.
    #[track_caller]
    pub fn register_test<F, T>(&mut self, name: impl Into<String>, body: F) -> Registration<'_>
    where
        F: Fn(&ParameterSet) -> anyhow::Result<T> + 'static,
        T: Serialize,
    {
        self.insert(name.into(), Handler::from_sync(body), Location::caller())
    }

    /// Register an asynchronous test
    #[track_caller]
    pub fn register_async_test<F, Fut, T>(
        &mut self,
        name: impl Into<String>,
        body: F,
    ) -> Registration<'_>
    where
        F: Fn(ParameterSet) -> Fut + 'static,
        Fut: Future<Output = anyhow::Result<T>> + 'static,
        T: Serialize,
    {
        self.insert(name.into(), Handler::from_async(body), Location::caller())
    }

    fn insert(
        &mut self,
        name: String,
        handler: Handler,
        location: &'static Location<'static>,
    ) -> Registration<'_> {
        let index = match self.tests.iter().position(|entry| entry.name == name) {
            Some(index) => {
                debug!(test = %name, "test registered again, replacing handler");
                let entry = &mut self.tests[index];
                entry.handler = handler;
                entry.line = location.line();
                entry.metadata.reset_registration();
                index
            }
            None => {
                debug!(test = %name, kind = ?handler.kind(), "registering test");
                self.tests.push(TestEntry {
                    name: name.clone(),
                    line: location.line(),
                    handler,
                    metadata: TestMetadata::default(),
                });
                self.tests.len() - 1
            }
        };

        let entry = &mut self.tests[index];
        if let Some(marker) = self.pending_markers.remove(&name) {
            entry.metadata.marker = marker;
        }

        Registration {
            entry,
            case_tags: &mut self.tags,
        }
    }

    /// Attach a skip marker to `name`, registered now or later
    pub fn mark_skip(&mut self, name: &str, marker: SkipMarker) {
        self.set_marker(name, marker.into());
    }

    /// Attach an expected-failure marker to `name`, registered now or later
    pub fn mark_expected_failure(&mut self, name: &str, marker: ExpectedFailureMarker) {
        self.set_marker(name, marker.into());
    }

    fn set_marker(&mut self, name: &str, marker: Marker) {
        match self.tests.iter_mut().find(|entry| entry.name == name) {
            Some(entry) => entry.metadata.marker = marker,
            None => {
                self.pending_markers.insert(name.to_string(), marker);
            }
        }
    }

    /// Evaluate a fixture now and keep its value
    pub fn register_fixture<F, T>(&mut self, name: impl Into<String>, body: F) -> Result<Value>
    where
        F: Fn(&ParameterSet) -> anyhow::Result<T> + 'static,
        T: Serialize,
    {
        self.evaluate_fixture(name.into(), ParameterSet::default(), Handler::from_sync(body))
    }

    /// Evaluate a fixture now with bound arguments
    pub fn register_fixture_with<F, T>(
        &mut self,
        name: impl Into<String>,
        arguments: ParameterSet,
        body: F,
    ) -> Result<Value>
    where
        F: Fn(&ParameterSet) -> anyhow::Result<T> + 'static,
        T: Serialize,
    {
        self.evaluate_fixture(name.into(), arguments, Handler::from_sync(body))
    }

    /// Evaluate an asynchronous fixture now on its own event loop
    pub fn register_async_fixture<F, Fut, T>(
        &mut self,
        name: impl Into<String>,
        body: F,
    ) -> Result<Value>
    where
        F: Fn(ParameterSet) -> Fut + 'static,
        Fut: Future<Output = anyhow::Result<T>> + 'static,
        T: Serialize,
    {
        self.evaluate_fixture(name.into(), ParameterSet::default(), Handler::from_async(body))
    }

    fn evaluate_fixture(
        &mut self,
        name: String,
        arguments: ParameterSet,
        handler: Handler,
    ) -> Result<Value> {
        debug!(fixture = %name, "evaluating fixture");
        let value = handler
            .invoke(&arguments)
            .map_err(|error| RunError::Fixture {
                name: name.clone(),
                source: error.into_anyhow(),
            })?;

        let metadata = TestMetadata {
            arguments: vec![arguments],
            is_fixture: true,
            ..TestMetadata::default()
        };
        self.fixtures.insert(
            name.clone(),
            Fixture {
                name,
                value: value.clone(),
                metadata,
            },
        );

        Ok(value)
    }

    /// Run every test, blocking on asynchronous ones.
    ///
    /// Tests whose tags intersect `tag_filter` are skipped.
    pub fn run(&mut self, tag_filter: &[&str], sink: &dyn ReportSink) -> Result<RunSummary> {
        Runner::new(self, sink, tag_filter).run()
    }

    /// Run every test on the caller's event loop
    pub async fn run_async(
        &mut self,
        tag_filter: &[&str],
        sink: &dyn ReportSink,
    ) -> Result<RunSummary> {
        Runner::new(self, sink, tag_filter).run_async().await
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    pub fn tests(&self) -> impl Iterator<Item = &TestEntry> {
        self.tests.iter()
    }

    pub(crate) fn entries(&self) -> &[TestEntry] {
        &self.tests
    }

    pub fn test(&self, name: &str) -> Option<&TestEntry> {
        self.tests.iter().find(|entry| entry.name == name)
    }

    pub fn len(&self) -> usize {
        self.tests.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tests.is_empty()
    }

    pub fn fixture(&self, name: &str) -> Option<&Value> {
        self.fixtures.get(name).map(|fixture| &fixture.value)
    }

    pub fn fixtures(&self) -> impl Iterator<Item = &Fixture> {
        self.fixtures.values()
    }

    /// Union of the tags of every registered test
    pub fn tags(&self) -> &BTreeSet<String> {
        &self.tags
    }

    pub fn counters(&self) -> Counters {
        self.counters
    }

    pub fn passed(&self) -> usize {
        self.counters.passed
    }

    pub fn warnings(&self) -> usize {
        self.counters.warnings
    }

    pub fn errors(&self) -> usize {
        self.counters.errors
    }

    pub fn skipped(&self) -> usize {
        self.counters.skipped
    }
}

/// Handle returned by registration; each call updates the test's metadata
pub struct Registration<'a> {
    entry: &'a mut TestEntry,
    case_tags: &'a mut BTreeSet<String>,
}

impl<'a> Registration<'a> {
    pub fn comment(self, template: impl Into<String>) -> Self {
        self.entry.metadata.comment = Some(template.into());
        self
    }

    pub fn tags<I, S>(self, tags: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        for tag in tags {
            let tag = tag.into();
            self.case_tags.insert(tag.clone());
            self.entry.metadata.tags.insert(tag);
        }
        self
    }

    pub fn count_of_launchs(self, count: usize) -> Self {
        if count == 0 {
            debug!(test = %self.entry.name, "count_of_launchs of 0 raised to 1");
        }
        self.entry.metadata.count_of_launchs = count.max(1);
        self
    }

    pub fn arguments<I>(self, sets: I) -> Self
    where
        I: IntoIterator<Item = ParameterSet>,
    {
        self.entry.metadata.arguments = sets.into_iter().collect();
        self
    }

    pub fn mark_skip(self, marker: SkipMarker) -> Self {
        self.entry.metadata.marker = marker.into();
        self
    }

    pub fn mark_expected_failure(self, marker: ExpectedFailureMarker) -> Self {
        self.entry.metadata.marker = marker.into();
        self
    }

    pub fn name(&self) -> &str {
        &self.entry.name
    }

    pub fn metadata(&self) -> &TestMetadata {
        &self.entry.metadata
    }
}
