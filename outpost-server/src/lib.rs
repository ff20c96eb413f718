//! The Outpost ingestion server.
//!
//! Hosts the HTTP API and, when configured, the gRPC service over a single
//! [`MetricsStore`](outpost_storage::MetricsStore). Inbound requests pass
//! the ordered middleware chain (logging, payload hash, decryption, trusted
//! subnet, decompression) before reaching the handlers; a background flusher
//! persists snapshots through the configured backend. [`run`] wires
//! everything together and blocks until a termination signal.

pub mod endpoints;
pub mod grpc;
pub mod middlewares;
mod service;
pub mod services;

pub use self::service::*;
pub use self::services::{make_app, run, ServerError};
