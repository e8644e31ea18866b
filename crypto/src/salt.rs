//! Salt generation

use rand::{RngCore, rngs::OsRng};

/// Generate a random salt of the given size in bytes from the operating
/// system's cryptographically strong source
pub fn generate(size: usize) -> Vec<u8> {
    let mut salt = vec![0u8; size];
    OsRng.fill_bytes(&mut salt);

    salt
}
