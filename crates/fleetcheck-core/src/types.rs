//! Check results and metric points shared across fleetcheck crates.

use std::fmt;
use std::time::{SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Serialize};

/// Outcome level of a check.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Level {
    Ok,
    Warning,
    Error,
}

impl Level {
    /// Conventional monitoring-plugin exit status.
    pub fn exit_code(self) -> i32 {
        match self {
            Level::Ok => 0,
            Level::Warning => 1,
            Level::Error => 2,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Level::Ok => "OK",
            Level::Warning => "WARNING",
            Level::Error => "ERROR",
        }
    }
}

impl fmt::Display for Level {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// A single `(dotted-metric-name, value)` observation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Point {
    pub name: String,
    pub value: f64,
}

impl Point {
    pub fn new(name: impl Into<String>, value: f64) -> Self {
        Self {
            name: name.into(),
            value,
        }
    }
}

/// The verdict of one check invocation, handed to the result sink.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CheckResult {
    /// Name the check is registered under; filled in by the registry.
    #[serde(default)]
    pub name: String,
    pub status: Level,
    pub output: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub metrics: Vec<Point>,
    /// Unix timestamp (seconds) when the result was produced.
    pub executed: u64,
}

impl CheckResult {
    pub fn new(status: Level, output: impl Into<String>) -> Self {
        Self {
            name: String::new(),
            status,
            output: output.into(),
            metrics: Vec::new(),
            executed: epoch_secs(),
        }
    }

    pub fn ok(output: impl Into<String>) -> Self {
        Self::new(Level::Ok, output)
    }

    pub fn warning(output: impl Into<String>) -> Self {
        Self::new(Level::Warning, output)
    }

    pub fn error(output: impl Into<String>) -> Self {
        Self::new(Level::Error, output)
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    pub fn with_point(mut self, point: Point) -> Self {
        self.metrics.push(point);
        self
    }
}

/// Accumulates metric points and renders them as a check result.
#[derive(Debug, Clone, Default)]
pub struct Metric {
    points: Vec<Point>,
}

impl Metric {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_point(&mut self, point: Point) {
        self.points.push(point);
    }

    /// Render the points in Graphite plaintext format, one
    /// `name value timestamp` line per point.
    pub fn render_graphite(&self, timestamp: u64) -> String {
        let mut out = String::new();
        for p in &self.points {
            out.push_str(&format!("{} {} {}\n", p.name, p.value, timestamp));
        }
        out
    }

    /// Metric results always report `Ok`; the points are the payload.
    pub fn render(self) -> CheckResult {
        let mut result = CheckResult::ok(String::new());
        result.output = self.render_graphite(result.executed);
        result.metrics = self.points;
        result
    }
}

/// Current unix time in seconds.
pub fn epoch_secs() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs()
}
