//! The metric model shared between the Outpost agent and server.
//!
//! Metrics come in two kinds: *gauges* are last-write-wins floating point
//! observations, *counters* are monotonic sums of signed deltas. On the wire
//! both are carried by [`WireMetric`], a permissive representation in which
//! the value fields are optional. [`Metric`] is the validated form used by
//! everything behind the transports: it holds exactly one value matching its
//! kind and a non-empty id.

#![warn(missing_docs)]

mod metric;
mod snapshot;

pub use self::metric::*;
pub use self::snapshot::*;
