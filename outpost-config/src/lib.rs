//! Configuration for the Outpost agent and server.
//!
//! Both binaries share a single [`Config`] value. It is assembled from four
//! layers in increasing precedence: built-in defaults, command line flags,
//! the JSON config file, and environment variables. Flags and environment
//! variables arrive as an [`OverridableConfig`] of raw strings and are
//! parsed when applied, so an invalid override is reported with the field
//! that carried it.

#![warn(missing_docs)]

mod config;

pub use self::config::*;
