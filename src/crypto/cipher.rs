//! Per-connection stream cipher

use super::KEY_LEN;
use rc4::consts::U64;
use rc4::{KeyInit, Rc4, StreamCipher};

/// Streaming cipher state for one connection.
///
/// A single keystream is shared by both directions: encrypting outbound
/// bytes and decrypting inbound bytes advance the same position, and the
/// relay consumes its copy of the stream in the mirrored order. Splitting
/// this into two independent states would decrypt to garbage at the peer.
pub struct Cipher {
    state: Rc4<U64>,
}

impl Cipher {
    /// Create a cipher from a derived 64-byte seed
    pub fn new(seed: &[u8; KEY_LEN]) -> Self {
        let state = Rc4::new_from_slice(seed).expect("seed length matches the cipher key size");
        Self { state }
    }

    /// Encrypt a byte range in place, advancing the keystream
    pub fn encrypt(&mut self, buf: &mut [u8]) {
        self.state.apply_keystream(buf);
    }

    /// Decrypt a byte range in place, advancing the keystream
    ///
    /// Same transform as [`encrypt`](Self::encrypt); the name reflects
    /// direction, not algorithm.
    pub fn decrypt(&mut self, buf: &mut [u8]) {
        self.state.apply_keystream(buf);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_round_trip() {
        let seed = [0x42u8; KEY_LEN];
        let mut enc = Cipher::new(&seed);
        let mut dec = Cipher::new(&seed);

        let mut buf = *b"Hello, World!";
        enc.encrypt(&mut buf);
        assert_ne!(&buf, b"Hello, World!");

        dec.decrypt(&mut buf);
        assert_eq!(&buf, b"Hello, World!");
    }

    #[test]
    fn test_keystream_continuity() {
        // Enciphering in two chunks must equal enciphering in one.
        let seed = [0x37u8; KEY_LEN];
        let mut whole = Cipher::new(&seed);
        let mut split = Cipher::new(&seed);

        let mut a = [0xAAu8; 64];
        whole.encrypt(&mut a);

        let mut b = [0xAAu8; 64];
        split.encrypt(&mut b[..20]);
        split.encrypt(&mut b[20..]);

        assert_eq!(a, b);
    }

    #[test]
    fn test_shared_state_interleaving() {
        // One local state interleaving encrypt/decrypt must line up with a
        // peer that mirrors the order: peer decrypts what we encrypted, then
        // replies; we decrypt the reply.
        let seed = [0x11u8; KEY_LEN];
        let mut local = Cipher::new(&seed);
        let mut peer = Cipher::new(&seed);

        let mut request = *b"GET / HTTP/1.0\r\n\r\n";
        local.encrypt(&mut request);
        peer.decrypt(&mut request);
        assert_eq!(&request, b"GET / HTTP/1.0\r\n\r\n");

        let mut reply = *b"HTTP/1.0 200 OK\r\n\r\n";
        peer.encrypt(&mut reply);
        local.decrypt(&mut reply);
        assert_eq!(&reply, b"HTTP/1.0 200 OK\r\n\r\n");
    }
}
