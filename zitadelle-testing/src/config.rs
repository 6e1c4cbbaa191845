//! Runner configuration

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::report::{ConsoleReporter, JsonReporter, ReportSink};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunnerConfig {
    /// Tests carrying any of these tags are skipped
    #[serde(default)]
    pub tag_filter: Vec<String>,

    /// Print every line without a progress bar
    #[serde(default)]
    pub verbose: bool,

    /// Print platform information before the run
    #[serde(default = "default_true")]
    pub show_platform: bool,

    #[serde(default)]
    pub reporter: ReporterKind,
}

impl Default for RunnerConfig {
    fn default() -> Self {
        Self {
            tag_filter: Vec::new(),
            verbose: false,
            show_platform: default_true(),
            reporter: ReporterKind::default(),
        }
    }
}

impl RunnerConfig {
    /// Tag filter in the form `Case::run` takes
    pub fn tag_filter(&self) -> Vec<&str> {
        self.tag_filter.iter().map(String::as_str).collect()
    }

    pub fn build_reporter(&self) -> Box<dyn ReportSink> {
        match self.reporter {
            ReporterKind::Console => {
                Box::new(ConsoleReporter::new(self.verbose).with_platform(self.show_platform))
            }
            ReporterKind::Json => Box::new(JsonReporter::new()),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReporterKind {
    #[default]
    Console,
    Json,
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("unknown reporter `{0}`, expected `console` or `json`")]
pub struct UnknownReporter(pub String);

impl FromStr for ReporterKind {
    type Err = UnknownReporter;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "console" => Ok(Self::Console),
            "json" => Ok(Self::Json),
            _ => Err(UnknownReporter(s.to_string())),
        }
    }
}

impl fmt::Display for ReporterKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Console => f.write_str("console"),
            Self::Json => f.write_str("json"),
        }
    }
}

fn default_true() -> bool {
    true
}
