//! Generated protobuf messages and the gRPC service definition.
//!
//! The wire contract mirrors the JSON one: a `Metric` carries the same four
//! fields as the JSON representation, with `delta`/`value` optional and
//! exactly one of them expected to be present. Conversions to and from the
//! validated [`outpost_protocol::Metric`] live here so both the server and
//! the agent share one mapping.

use outpost_protocol::{MetricValue, ParseMetricError};

tonic::include_proto!("outpost.metrics.v1");

impl From<outpost_protocol::Metric> for Metric {
    fn from(metric: outpost_protocol::Metric) -> Self {
        let mtype = metric.kind().as_str().to_owned();
        let (delta, value) = match metric.value {
            MetricValue::Gauge(value) => (None, Some(value)),
            MetricValue::Counter(delta) => (Some(delta), None),
        };

        Self {
            name: metric.id,
            mtype,
            delta,
            value,
        }
    }
}

impl TryFrom<Metric> for outpost_protocol::Metric {
    type Error = ParseMetricError;

    fn try_from(metric: Metric) -> Result<Self, Self::Error> {
        if metric.name.is_empty() {
            return Err(ParseMetricError::EmptyName);
        }

        let value = match metric.mtype.parse::<outpost_protocol::MetricKind>()? {
            outpost_protocol::MetricKind::Gauge => {
                MetricValue::Gauge(metric.value.ok_or(ParseMetricError::MissingValue)?)
            }
            outpost_protocol::MetricKind::Counter => {
                MetricValue::Counter(metric.delta.ok_or(ParseMetricError::MissingDelta)?)
            }
        };

        Ok(Self {
            id: metric.name,
            value,
        })
    }
}
