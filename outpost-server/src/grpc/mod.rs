//! The gRPC transport.
//!
//! Exposes the same contract as the HTTP API over
//! [`MetricsService`](outpost_proto::metrics_service_server::MetricsService).
//! The ingestion guards mirror the HTTP middleware chain in the same order:
//! request logging (a tower layer around the whole server), payload hash
//! verification over the wire encoding, RSA decryption of sealed requests,
//! and the trusted-subnet check against the peer address.

mod service;
mod trace;

pub use self::service::*;
pub use self::trace::*;
