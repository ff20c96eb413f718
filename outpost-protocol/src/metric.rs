use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// An error returned when parsing or validating a metric fails.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ParseMetricError {
    /// The metric name is empty.
    #[error("metric name is empty")]
    EmptyName,

    /// The metric type is neither `counter` nor `gauge`.
    #[error("metric type must be counter or gauge")]
    UnknownType,

    /// A counter metric is missing its `delta` field.
    #[error("counter value is empty")]
    MissingDelta,

    /// A gauge metric is missing its `value` field.
    #[error("gauge value is empty")]
    MissingValue,

    /// The textual value does not parse as a signed 64-bit integer.
    #[error("metric value must be integer")]
    InvalidDelta,

    /// The textual value does not parse as a 64-bit float.
    #[error("metric value must be float")]
    InvalidValue,
}

/// The kind of a metric.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MetricKind {
    /// A last-write-wins floating point observation.
    Gauge,
    /// A monotonic sum of signed integer deltas.
    Counter,
}

impl MetricKind {
    /// Returns the lowercase name of this kind as used on the wire.
    pub fn as_str(&self) -> &'static str {
        match self {
            MetricKind::Gauge => "gauge",
            MetricKind::Counter => "counter",
        }
    }
}

impl fmt::Display for MetricKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for MetricKind {
    type Err = ParseMetricError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "gauge" => Ok(MetricKind::Gauge),
            "counter" => Ok(MetricKind::Counter),
            _ => Err(ParseMetricError::UnknownType),
        }
    }
}

/// The value of a validated [`Metric`].
///
/// The variant always matches the metric's kind, which makes illegal
/// wire payloads (a counter with a float value, a gauge without one)
/// unrepresentable past the validation boundary.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum MetricValue {
    /// The replacement value of a gauge.
    Gauge(f64),
    /// The increment of a counter.
    Counter(i64),
}

impl MetricValue {
    /// Returns the kind matching this value.
    pub fn kind(&self) -> MetricKind {
        match self {
            MetricValue::Gauge(_) => MetricKind::Gauge,
            MetricValue::Counter(_) => MetricKind::Counter,
        }
    }
}

impl fmt::Display for MetricValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MetricValue::Gauge(value) => value.fmt(f),
            MetricValue::Counter(delta) => delta.fmt(f),
        }
    }
}

/// A validated metric sample.
#[derive(Debug, Clone, PartialEq)]
pub struct Metric {
    /// The non-empty name of the metric.
    pub id: String,
    /// The value, which determines the kind.
    pub value: MetricValue,
}

impl Metric {
    /// Creates a gauge metric.
    pub fn gauge(id: impl Into<String>, value: f64) -> Self {
        Self {
            id: id.into(),
            value: MetricValue::Gauge(value),
        }
    }

    /// Creates a counter metric.
    pub fn counter(id: impl Into<String>, delta: i64) -> Self {
        Self {
            id: id.into(),
            value: MetricValue::Counter(delta),
        }
    }

    /// Returns the kind of this metric.
    pub fn kind(&self) -> MetricKind {
        self.value.kind()
    }

    /// Parses a metric from the path components of an update request.
    ///
    /// `kind` and `value` are the raw path segments; the value must parse as
    /// a signed integer for counters and as a float for gauges.
    pub fn from_parts(kind: &str, name: &str, value: &str) -> Result<Self, ParseMetricError> {
        if name.is_empty() {
            return Err(ParseMetricError::EmptyName);
        }

        let value = match kind.parse::<MetricKind>()? {
            MetricKind::Counter => MetricValue::Counter(
                value
                    .parse()
                    .map_err(|_| ParseMetricError::InvalidDelta)?,
            ),
            MetricKind::Gauge => MetricValue::Gauge(
                value
                    .parse()
                    .map_err(|_| ParseMetricError::InvalidValue)?,
            ),
        };

        Ok(Self {
            id: name.to_owned(),
            value,
        })
    }
}

/// The permissive wire representation of a metric.
///
/// Serializes to `{"id": ..., "type": ..., "value"?: ..., "delta"?: ...}`
/// with absent value fields omitted. Exactly one of `value`/`delta` must be
/// present and match `kind` for the payload to convert into a [`Metric`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WireMetric {
    /// The metric name.
    pub id: String,
    /// The metric kind.
    #[serde(rename = "type")]
    pub kind: MetricKind,
    /// The gauge value, present iff `kind` is gauge.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<f64>,
    /// The counter increment, present iff `kind` is counter.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub delta: Option<i64>,
}

impl TryFrom<WireMetric> for Metric {
    type Error = ParseMetricError;

    fn try_from(wire: WireMetric) -> Result<Self, Self::Error> {
        if wire.id.is_empty() {
            return Err(ParseMetricError::EmptyName);
        }

        let value = match wire.kind {
            MetricKind::Gauge => {
                MetricValue::Gauge(wire.value.ok_or(ParseMetricError::MissingValue)?)
            }
            MetricKind::Counter => {
                MetricValue::Counter(wire.delta.ok_or(ParseMetricError::MissingDelta)?)
            }
        };

        Ok(Self { id: wire.id, value })
    }
}

impl From<Metric> for WireMetric {
    fn from(metric: Metric) -> Self {
        let kind = metric.kind();
        let (value, delta) = match metric.value {
            MetricValue::Gauge(value) => (Some(value), None),
            MetricValue::Counter(delta) => (None, Some(delta)),
        };

        Self {
            id: metric.id,
            kind,
            value,
            delta,
        }
    }
}
