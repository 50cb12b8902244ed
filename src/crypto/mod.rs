//! Cryptographic primitives for the rona wire protocol
//!
//! This module provides:
//! - The chained-MD5 key schedule shared with the relay
//! - The per-connection stream cipher
//! - Secure random number generation

mod cipher;
mod kdf;

pub use cipher::Cipher;
pub use kdf::derive_key;

/// Length of the derived cipher seed in bytes
pub const KEY_LEN: usize = 64;

/// Generate cryptographically secure random bytes
pub fn random_bytes(buf: &mut [u8]) {
    use ring::rand::{SecureRandom, SystemRandom};
    let rng = SystemRandom::new();
    rng.fill(buf).expect("Failed to generate random bytes");
}

/// Pick a uniformly random index below `bound` from one machine word of
/// entropy. `bound` must be non-zero.
pub fn random_index(bound: usize) -> usize {
    let mut word = [0u8; std::mem::size_of::<usize>()];
    random_bytes(&mut word);
    usize::from_ne_bytes(word) % bound
}
