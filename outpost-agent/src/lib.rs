//! The Outpost metrics agent.
//!
//! Two tickers drive the agent: the poll ticker samples allocator, process
//! and host metrics into a mutex-guarded gauge map and bumps the poll
//! counter; the report ticker drains that map through a bounded worker pool
//! that serializes, compresses, optionally encrypts, signs and ships each
//! metric to the server, over HTTP or gRPC.

pub mod alloc;
mod agent;
mod collector;
mod shipper;

pub use self::agent::*;
pub use self::collector::*;
pub use self::shipper::*;
