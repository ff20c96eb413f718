//! Keyed payload hashing.
//!
//! Payloads are authenticated with HMAC-SHA256 over the bytes as they travel
//! on the wire, i.e. after compression and encryption. The digest is hex
//! encoded. An empty key disables hashing entirely.

use hmac::{Hmac, Mac};
use sha2::Sha256;

type HmacSha256 = Hmac<Sha256>;

/// Computes the hex-encoded HMAC-SHA256 of `data` under `key`.
pub fn calculate(key: &[u8], data: &[u8]) -> String {
    let mut mac = HmacSha256::new_from_slice(key).expect("hmac accepts keys of any length");
    mac.update(data);
    hex::encode(mac.finalize().into_bytes())
}

/// Verifies a hex-encoded HMAC-SHA256 digest in constant time.
///
/// Returns `false` for digests that are not valid hex as well as for
/// mismatching ones.
pub fn verify(key: &[u8], data: &[u8], hash: &str) -> bool {
    let Ok(decoded) = hex::decode(hash) else {
        return false;
    };

    let mut mac = HmacSha256::new_from_slice(key).expect("hmac accepts keys of any length");
    mac.update(data);
    mac.verify_slice(&decoded).is_ok()
}
