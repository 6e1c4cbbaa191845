//! Metadata attached to registered tests and fixtures

use std::collections::BTreeSet;
use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Positional and keyword arguments for one invocation of a test
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ParameterSet {
    #[serde(default)]
    pub args: Vec<Value>,

    #[serde(default)]
    pub kwargs: Map<String, Value>,
}

impl ParameterSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn arg(mut self, value: impl Into<Value>) -> Self {
        self.args.push(value.into());
        self
    }

    pub fn kwarg(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.kwargs.insert(name.into(), value.into());
        self
    }

    /// Positional argument at `index`
    pub fn get(&self, index: usize) -> Option<&Value> {
        self.args.get(index)
    }

    /// Keyword argument called `name`
    pub fn named(&self, name: &str) -> Option<&Value> {
        self.kwargs.get(name)
    }

    pub fn is_empty(&self) -> bool {
        self.args.is_empty() && self.kwargs.is_empty()
    }
}

/// Condition under which a marker is active, evaluated at run time
pub enum Condition {
    Value(bool),
    Predicate(Box<dyn Fn() -> bool>),
}

impl Condition {
    pub fn predicate(predicate: impl Fn() -> bool + 'static) -> Self {
        Self::Predicate(Box::new(predicate))
    }

    pub fn evaluate(&self) -> bool {
        match self {
            Self::Value(value) => *value,
            Self::Predicate(predicate) => predicate(),
        }
    }
}

impl Default for Condition {
    fn default() -> Self {
        Self::Value(true)
    }
}

impl From<bool> for Condition {
    fn from(value: bool) -> Self {
        Self::Value(value)
    }
}

impl fmt::Debug for Condition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Value(value) => f.debug_tuple("Value").field(value).finish(),
            Self::Predicate(_) => f.write_str("Predicate(..)"),
        }
    }
}

/// Skips the test when its condition holds
#[derive(Debug, Default)]
pub struct SkipMarker {
    pub reason: Option<String>,
    pub when: Condition,
}

impl SkipMarker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn because(reason: impl Into<String>) -> Self {
        Self {
            reason: Some(reason.into()),
            when: Condition::default(),
        }
    }

    pub fn when(mut self, when: impl Into<Condition>) -> Self {
        self.when = when.into();
        self
    }
}

/// Reports a failing test as an expected failure when its condition holds
#[derive(Debug, Default)]
pub struct ExpectedFailureMarker {
    pub reason: Option<String>,
    pub when: Condition,
}

impl ExpectedFailureMarker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn because(reason: impl Into<String>) -> Self {
        Self {
            reason: Some(reason.into()),
            when: Condition::default(),
        }
    }

    pub fn when(mut self, when: impl Into<Condition>) -> Self {
        self.when = when.into();
        self
    }
}

/// Execution policy annotation; a test carries at most one
#[derive(Debug, Default)]
pub enum Marker {
    #[default]
    None,
    Skip(SkipMarker),
    ExpectedFailure(ExpectedFailureMarker),
}

impl From<SkipMarker> for Marker {
    fn from(marker: SkipMarker) -> Self {
        Self::Skip(marker)
    }
}

impl From<ExpectedFailureMarker> for Marker {
    fn from(marker: ExpectedFailureMarker) -> Self {
        Self::ExpectedFailure(marker)
    }
}

/// Metadata owned by one registered test or fixture
#[derive(Debug)]
pub struct TestMetadata {
    /// Freeform annotation; `{name}` placeholders are filled from the
    /// keyword arguments of the first parameter set
    pub comment: Option<String>,

    pub tags: BTreeSet<String>,

    pub arguments: Vec<ParameterSet>,

    /// Runs per parameter set, never zero
    pub count_of_launchs: usize,

    pub marker: Marker,

    pub is_fixture: bool,
}

impl Default for TestMetadata {
    fn default() -> Self {
        Self {
            comment: None,
            tags: BTreeSet::new(),
            arguments: Vec::new(),
            count_of_launchs: 1,
            marker: Marker::None,
            is_fixture: false,
        }
    }
}

impl TestMetadata {
    /// Clear the fields a registration sets, keeping the marker.
    ///
    /// Re-registering a test merges into its existing metadata rather than
    /// replacing it, so a marker applied earlier survives.
    pub fn reset_registration(&mut self) {
        self.comment = None;
        self.tags.clear();
        self.arguments.clear();
        self.count_of_launchs = 1;
    }

    /// Comment with its placeholders filled in
    pub fn rendered_comment(&self) -> Option<String> {
        let template = self.comment.as_deref()?;
        let rendered = match self.arguments.first() {
            Some(bound) => render_comment(template, &bound.kwargs),
            None => template.to_string(),
        };
        Some(rendered)
    }
}

/// Replace `{key}` placeholders with values from `kwargs`.
///
/// Unknown placeholders and unbalanced braces are kept verbatim.
pub fn render_comment(template: &str, kwargs: &Map<String, Value>) -> String {
    let mut rendered = String::with_capacity(template.len());
    let mut rest = template;

    while let Some(open) = rest.find('{') {
        rendered.push_str(&rest[..open]);
        let tail = &rest[open..];

        let Some(close) = tail.find('}') else {
            rendered.push_str(tail);
            return rendered;
        };

        match kwargs.get(&tail[1..close]) {
            Some(Value::String(text)) => rendered.push_str(text),
            Some(value) => rendered.push_str(&value.to_string()),
            None => rendered.push_str(&tail[..=close]),
        }
        rest = &tail[close + 1..];
    }

    rendered.push_str(rest);
    rendered
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;
    use std::rc::Rc;

    #[test]
    fn test_render_comment() {
        let params = ParameterSet::new().kwarg("a", 2).kwarg("who", "world");

        assert_eq!(
            render_comment("adds {a} for {who}", &params.kwargs),
            "adds 2 for world"
        );
        assert_eq!(render_comment("keeps {missing}", &params.kwargs), "keeps {missing}");
        assert_eq!(render_comment("open { brace", &params.kwargs), "open { brace");
        assert_eq!(render_comment("", &params.kwargs), "");
    }

    #[test]
    fn test_rendered_comment_uses_first_parameter_set() {
        let mut metadata = TestMetadata::default();
        metadata.comment = Some("a = {a}".to_string());
        assert_eq!(metadata.rendered_comment().as_deref(), Some("a = {a}"));

        metadata.arguments = vec![
            ParameterSet::new().kwarg("a", 1),
            ParameterSet::new().kwarg("a", 5),
        ];
        assert_eq!(metadata.rendered_comment().as_deref(), Some("a = 1"));
    }

    #[test]
    fn test_condition_predicate_is_lazy() {
        let calls = Rc::new(Cell::new(0));
        let counter = calls.clone();
        let condition = Condition::predicate(move || {
            counter.set(counter.get() + 1);
            false
        });

        assert_eq!(calls.get(), 0);
        assert!(!condition.evaluate());
        assert!(!condition.evaluate());
        assert_eq!(calls.get(), 2);
        assert!(Condition::default().evaluate());
    }

    #[test]
    fn test_reset_registration_keeps_marker() {
        let mut metadata = TestMetadata {
            comment: Some("old".to_string()),
            tags: ["slow".to_string()].into_iter().collect(),
            arguments: vec![ParameterSet::new().arg(1)],
            count_of_launchs: 4,
            marker: SkipMarker::because("flaky").into(),
            is_fixture: false,
        };

        metadata.reset_registration();

        assert!(metadata.comment.is_none());
        assert!(metadata.tags.is_empty());
        assert!(metadata.arguments.is_empty());
        assert_eq!(metadata.count_of_launchs, 1);
        assert!(matches!(metadata.marker, Marker::Skip(_)));
    }
}
