//! Various hash functions

use sha2::{Digest, Sha512};

/// Calculate the SHA512 hash of `bytes` as a lowercase hex string
pub fn sha512_hex(bytes: &[u8]) -> String {
    let mut hasher = Sha512::new();
    hasher.update(bytes);
    hex::encode(hasher.finalize())
}
