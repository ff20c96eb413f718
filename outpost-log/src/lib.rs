//! Logging for the Outpost binaries.
//!
//! This crate wraps `tracing` and `tracing-subscriber` so that the rest of
//! the workspace never depends on them directly. Call [`init`] once at
//! startup, then use the re-exported macros:
//!
//! ```
//! outpost_log::init(&outpost_log::LogConfig::default());
//! outpost_log::info!("agent running");
//! ```
//!
//! Errors are logged as fields, with `%` rendering the error and its
//! source chain through `Display`:
//!
//! ```
//! # let error = std::io::Error::other("boom");
//! outpost_log::error!(error = %error, "can't save snapshot");
//! ```

mod setup;

pub use self::setup::*;

// Re-export the tracing macros under this crate's name so call sites read
// `outpost_log::info!` throughout the workspace.
pub use tracing::{debug, error, info, trace, warn};
