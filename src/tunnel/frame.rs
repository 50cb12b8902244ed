//! Opening-frame encoding for the rona wire protocol
//!
//! The first bytes on every relay connection are one fixed 512-byte frame:
//!
//! ```text
//! +-------+------+------+-------+
//! | MAGIC | HOST | PORT | NONCE |
//! +-------+------+------+-------+
//! |   4   | 257  |  15  |  236  |
//! +-------+------+------+-------+
//! ```
//!
//! HOST and PORT are NUL-terminated strings, zero-padded to their field
//! width. MAGIC, HOST and PORT travel encrypted; the NONCE travels in the
//! clear so the relay can derive the same cipher seed from it and the
//! shared key before decrypting the rest.

use crate::crypto::{self, Cipher};
use bytes::{BufMut, BytesMut};

/// Total size of the opening frame
pub const FRAME_SIZE: usize = 512;

/// Frame magic, "Rona" (big-endian on the wire)
pub const MAGIC: u32 = 0x526F6E61;

/// Width of the destination-host field, including the terminating NUL
pub const HOST_FIELD: usize = 257;

/// Width of the destination-port field, including the terminating NUL
pub const PORT_FIELD: usize = 15;

/// Offset of the host field
pub const HOST_OFFSET: usize = 4;

/// Offset of the port field
pub const PORT_OFFSET: usize = HOST_OFFSET + HOST_FIELD;

/// Offset of the nonce; everything before it is encrypted
pub const SEALED_LEN: usize = PORT_OFFSET + PORT_FIELD;

/// Length of the cleartext nonce
pub const NONCE_LEN: usize = FRAME_SIZE - SEALED_LEN;

/// Build the opening frame for a destination and seed the connection cipher.
///
/// Returns the ready-to-send frame (leading [`SEALED_LEN`] bytes already
/// encrypted) together with the cipher, positioned past the sealed prefix,
/// that the connection must keep using for all subsequent traffic.
pub fn opening_frame(host: &str, port: &str, shared_key: &[u8]) -> (BytesMut, Cipher) {
    let mut nonce = [0u8; NONCE_LEN];
    crypto::random_bytes(&mut nonce);

    let mut cipher = Cipher::new(&crypto::derive_key(&nonce, shared_key));

    let host = host.as_bytes();
    let host = &host[..host.len().min(HOST_FIELD - 1)];
    let port = port.as_bytes();
    let port = &port[..port.len().min(PORT_FIELD - 1)];

    let mut frame = BytesMut::with_capacity(FRAME_SIZE);
    frame.put_u32(MAGIC);
    frame.put_slice(host);
    frame.put_bytes(0, HOST_FIELD - host.len());
    frame.put_slice(port);
    frame.put_bytes(0, PORT_FIELD - port.len());
    frame.put_slice(&nonce);

    cipher.encrypt(&mut frame[..SEALED_LEN]);

    (frame, cipher)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crypto::derive_key;

    fn unseal(frame: &[u8], shared_key: &[u8]) -> (Vec<u8>, Cipher) {
        let mut cipher = Cipher::new(&derive_key(&frame[SEALED_LEN..], shared_key));
        let mut head = frame[..SEALED_LEN].to_vec();
        cipher.decrypt(&mut head);
        (head, cipher)
    }

    #[test]
    fn test_frame_size() {
        let (frame, _) = opening_frame("1.2.3.4", "80", b"secret");
        assert_eq!(frame.len(), FRAME_SIZE);
    }

    #[test]
    fn test_sealed_head_recovers() {
        let (frame, _) = opening_frame("1.2.3.4", "80", b"secret");
        let (head, _) = unseal(&frame, b"secret");

        assert_eq!(&head[..4], &MAGIC.to_be_bytes());
        assert_eq!(&head[HOST_OFFSET..HOST_OFFSET + 8], b"1.2.3.4\0");
        assert_eq!(&head[PORT_OFFSET..PORT_OFFSET + 3], b"80\0");
        // padding is all zeros
        assert!(head[HOST_OFFSET + 8..PORT_OFFSET].iter().all(|&b| b == 0));
    }

    #[test]
    fn test_head_is_actually_sealed() {
        let (frame, _) = opening_frame("1.2.3.4", "80", b"secret");
        assert_ne!(&frame[..4], &MAGIC.to_be_bytes());
    }

    #[test]
    fn test_wrong_key_garbles_magic() {
        let (frame, _) = opening_frame("1.2.3.4", "80", b"secret");
        let (head, _) = unseal(&frame, b"not the key");
        assert_ne!(&head[..4], &MAGIC.to_be_bytes());
    }

    #[test]
    fn test_ipv6_host() {
        let (frame, _) = opening_frame("2001:db8::1", "443", b"k");
        let (head, _) = unseal(&frame, b"k");
        assert_eq!(&head[HOST_OFFSET..HOST_OFFSET + 12], b"2001:db8::1\0");
    }

    #[test]
    fn test_long_host_truncated() {
        let long = "h".repeat(400);
        let (frame, _) = opening_frame(&long, "80", b"k");
        assert_eq!(frame.len(), FRAME_SIZE);

        let (head, _) = unseal(&frame, b"k");
        // 256 bytes of host survive; the terminator is still in the field
        assert!(head[HOST_OFFSET..HOST_OFFSET + 256].iter().all(|&b| b == b'h'));
        assert_eq!(head[HOST_OFFSET + 256], 0);
    }

    #[test]
    fn test_cipher_continues_past_frame() {
        // The returned cipher must sit exactly SEALED_LEN bytes into the
        // stream so payload bytes line up at the relay.
        let (frame, mut cipher) = opening_frame("1.2.3.4", "80", b"secret");
        let (_, mut relay_cipher) = unseal(&frame, b"secret");

        let mut payload = *b"GET / HTTP/1.0\r\n\r\n";
        cipher.encrypt(&mut payload);
        relay_cipher.decrypt(&mut payload);
        assert_eq!(&payload, b"GET / HTTP/1.0\r\n\r\n");
    }
}
