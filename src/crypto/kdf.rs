//! Key derivation for the per-connection cipher
//!
//! The relay reproduces the schedule from the cleartext nonce at the tail of
//! the opening frame and its own copy of the shared key, so both ends arrive
//! at the same 64-byte seed without ever sending key material on the wire.

use super::KEY_LEN;
use md5::{Digest, Md5};

/// Derive the 64-byte cipher seed from a connection nonce and a relay's
/// shared key.
///
/// The seed is four chained 16-byte digests:
///
/// ```text
/// k[ 0..16] = MD5(nonce || key)
/// k[16..32] = MD5(k[0..16])
/// k[32..48] = MD5(k[0..32])
/// k[48..64] = MD5(k[0..48])
/// ```
pub fn derive_key(nonce: &[u8], shared_key: &[u8]) -> [u8; KEY_LEN] {
    let mut seed = [0u8; KEY_LEN];

    let mut md5 = Md5::new();
    md5.update(nonce);
    md5.update(shared_key);
    seed[..16].copy_from_slice(&md5.finalize());

    for split in [16, 32, 48] {
        let digest = Md5::digest(&seed[..split]);
        seed[split..split + 16].copy_from_slice(&digest);
    }

    seed
}
