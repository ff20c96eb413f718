//! RSA key handling.
//!
//! The agent holds the public key and encrypts outgoing payloads, the server
//! holds the private key and decrypts incoming ones. Keys are PEM files: the
//! private key in PKCS#1 form (`RSA PRIVATE KEY`), the public key in PKIX
//! form (`PUBLIC KEY`). Encryption uses PKCS#1 v1.5, which bounds payloads
//! to the key modulus minus padding; shipped payloads are single gzipped
//! metrics and stay well below that bound.

use std::path::Path;

use rsa::pkcs1::DecodeRsaPrivateKey;
use rsa::pkcs8::DecodePublicKey;
use rsa::Pkcs1v15Encrypt;

pub use rsa::{RsaPrivateKey, RsaPublicKey};

/// An error raised when loading or applying RSA keys.
#[derive(Debug, thiserror::Error)]
pub enum KeyError {
    /// The key file could not be read.
    #[error("could not read key file")]
    Io(#[from] std::io::Error),

    /// The private key file is not a PKCS#1 PEM.
    #[error("invalid private key file")]
    InvalidPrivateKey(#[source] rsa::pkcs1::Error),

    /// The public key file is not a PKIX PEM.
    #[error("invalid public key file")]
    InvalidPublicKey(#[source] rsa::pkcs8::spki::Error),

    /// The RSA operation itself failed.
    #[error("rsa operation failed")]
    Rsa(#[from] rsa::Error),
}

/// Loads an RSA private key from a `RSA PRIVATE KEY` PEM file.
pub fn load_private_key(path: impl AsRef<Path>) -> Result<RsaPrivateKey, KeyError> {
    let pem = std::fs::read_to_string(path)?;
    RsaPrivateKey::from_pkcs1_pem(&pem).map_err(KeyError::InvalidPrivateKey)
}

/// Loads an RSA public key from a `PUBLIC KEY` PEM file.
pub fn load_public_key(path: impl AsRef<Path>) -> Result<RsaPublicKey, KeyError> {
    let pem = std::fs::read_to_string(path)?;
    RsaPublicKey::from_public_key_pem(&pem).map_err(KeyError::InvalidPublicKey)
}

/// Encrypts `data` with PKCS#1 v1.5 padding.
pub fn encrypt(public_key: &RsaPublicKey, data: &[u8]) -> Result<Vec<u8>, KeyError> {
    let mut rng = rand::thread_rng();
    Ok(public_key.encrypt(&mut rng, Pkcs1v15Encrypt, data)?)
}

/// Decrypts a PKCS#1 v1.5 ciphertext.
pub fn decrypt(private_key: &RsaPrivateKey, data: &[u8]) -> Result<Vec<u8>, KeyError> {
    Ok(private_key.decrypt(Pkcs1v15Encrypt, data)?)
}
