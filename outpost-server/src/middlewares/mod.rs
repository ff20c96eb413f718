//! Middlewares for the HTTP server.
//!
//! The chain order is a contract with the agent. Layers are applied so that
//! an inbound request passes, in order: request/response logging, payload
//! hash verification (over the raw wire bytes), RSA decryption, the
//! trusted-subnet filter, and finally gzip decompression. Responses travel
//! the inverse path, so the hash layer sees the uncompressed response body
//! and response compression happens last.
//!
//! See [`make_app`](crate::services::make_app) for where these are
//! registered.

mod compression;
mod crypto;
mod hash;
mod subnet;
mod trace;

pub use self::compression::*;
pub use self::crypto::*;
pub use self::hash::*;
pub use self::subnet::*;
pub use self::trace::*;
