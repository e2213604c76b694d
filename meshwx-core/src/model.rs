use std::{collections::BTreeMap, fmt};

use serde_json::Value as Json;

/// Observation keys recognised across all providers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Field {
    Timestamp,
    Temperature,
    FeelsLike,
    Humidity,
    Pressure,
    PressureTrend,
    WindSpeed,
    WindDirection,
    WindCardinal,
    Precipitation,
    PrecipProbability,
    PrecipType,
    LightningStrikes,
    SolarRadiation,
    Condition,
    TemperatureHigh,
    TemperatureLow,
    Sunrise,
    Sunset,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Number(f64),
    Text(String),
}

impl Value {
    fn from_json(json: &Json) -> Option<Self> {
        match json {
            Json::Number(n) => n.as_f64().map(Value::Number),
            Json::String(s) => Some(Value::Text(s.clone())),
            _ => None,
        }
    }
}

/// One row of a provider's field table: where to find a field in the raw payload.
///
/// Paths are JSON pointers (RFC 6901) relative to the object handed to
/// [`Observation::extract`].
#[derive(Debug, Clone, Copy)]
pub struct FieldBinding {
    pub field: Field,
    pub pointer: &'static str,
}

impl FieldBinding {
    pub const fn new(field: Field, pointer: &'static str) -> Self {
        Self { field, pointer }
    }
}

/// A single point-in-time reading. Any field may be absent.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Observation {
    values: BTreeMap<Field, Value>,
}

impl Observation {
    /// Builds an observation from `json` using a provider's binding table.
    ///
    /// Missing keys, nulls and values that are neither numbers nor strings are
    /// left out rather than reported as errors.
    pub fn extract(json: &Json, bindings: &[FieldBinding]) -> Self {
        let values = bindings
            .iter()
            .filter_map(|b| {
                json.pointer(b.pointer)
                    .and_then(Value::from_json)
                    .map(|v| (b.field, v))
            })
            .collect();

        Self { values }
    }

    pub fn insert(&mut self, field: Field, value: Value) {
        self.values.insert(field, value);
    }

    pub fn get(&self, field: Field) -> Option<&Value> {
        self.values.get(&field)
    }

    /// Numeric value of `field`. Numeric strings are accepted since some providers
    /// quote numbers.
    pub fn number(&self, field: Field) -> Option<f64> {
        match self.values.get(&field)? {
            Value::Number(n) => Some(*n),
            Value::Text(s) => s.trim().parse().ok(),
        }
    }

    /// Text value of `field`. Numbers are rendered the way the provider sent them.
    pub fn text(&self, field: Field) -> Option<String> {
        match self.values.get(&field)? {
            Value::Text(s) => Some(s.clone()),
            Value::Number(n) => Some(n.to_string()),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReportKind {
    Conditions,
    Forecast,
    Alerts,
    Daily,
}

impl ReportKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ReportKind::Conditions => "conditions",
            ReportKind::Forecast => "forecast",
            ReportKind::Alerts => "alerts",
            ReportKind::Daily => "daily forecast",
        }
    }
}

impl fmt::Display for ReportKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// How a report's lines are joined into one message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Layout {
    /// `"{heading}: item, item, item"`
    Inline { heading: String },
    /// One line per entry, joined by `separator`.
    Lines { separator: &'static str },
}

/// One logical message, rendered before transport chunking.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Report {
    pub kind: ReportKind,
    layout: Layout,
    lines: Vec<String>,
}

impl Report {
    pub fn inline(kind: ReportKind, heading: impl Into<String>) -> Self {
        Self {
            kind,
            layout: Layout::Inline { heading: heading.into() },
            lines: Vec::new(),
        }
    }

    pub fn lines(kind: ReportKind, separator: &'static str) -> Self {
        Self {
            kind,
            layout: Layout::Lines { separator },
            lines: Vec::new(),
        }
    }

    pub fn push(&mut self, line: impl Into<String>) {
        self.lines.push(line.into());
    }

    /// Pushes `line` only when the value it was built from was present.
    pub fn push_opt(&mut self, line: Option<String>) {
        if let Some(line) = line {
            self.lines.push(line);
        }
    }

    pub fn line_count(&self) -> usize {
        self.lines.len()
    }

    pub fn render(&self) -> String {
        match &self.layout {
            Layout::Inline { heading } if self.lines.is_empty() => heading.clone(),
            Layout::Inline { heading } => format!("{heading}: {}", self.lines.join(", ")),
            Layout::Lines { separator } => self.lines.join(separator),
        }
    }
}

impl fmt::Display for Report {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.render())
    }
}
