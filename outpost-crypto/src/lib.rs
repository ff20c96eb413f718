//! Integrity and confidentiality primitives shared by both transports.
//!
//! The HTTP middleware chain and the gRPC service use the same three
//! building blocks, so they live here free of any transport types:
//!
//!  - [`hash`]: keyed payload hashing with HMAC-SHA256, carried in the
//!    `HashSHA256` header or the `hashsha256` call metadata.
//!  - [`keys`]: RSA key loading and PKCS#1 v1.5 encryption of request
//!    payloads.
//!  - [`subnet`]: the trusted-subnet origin check.

#![warn(missing_docs)]

pub mod hash;
pub mod keys;
pub mod subnet;

/// The HTTP header and gRPC metadata name carrying the payload HMAC.
///
/// HTTP header names are case-insensitive, gRPC metadata keys must be
/// lowercase; this constant is valid for both.
pub const HASH_HEADER: &str = "hashsha256";

/// The HTTP header carrying the original client address.
pub const REAL_IP_HEADER: &str = "x-real-ip";
