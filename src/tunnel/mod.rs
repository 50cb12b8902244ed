//! Per-connection tunnel through a relay
//!
//! A [`Tunnel`] owns one accepted client stream, one relay stream, the
//! pending opening frame and the connection's cipher state. Running it
//! drains the handshake and then forwards both directions until either
//! side closes; dropping it closes both sockets.

mod frame;
mod pump;

pub use frame::{
    opening_frame, FRAME_SIZE, HOST_FIELD, HOST_OFFSET, MAGIC, NONCE_LEN, PORT_FIELD, PORT_OFFSET,
    SEALED_LEN,
};
pub use pump::{Pump, BUF_SIZE};

use crate::crypto::Cipher;
use bytes::BytesMut;
use thiserror::Error;
use tokio::io::{AsyncRead, AsyncWrite, AsyncWriteExt};

/// Tunnel errors
#[derive(Debug, Error)]
pub enum TunnelError {
    #[error("handshake failed: {0}")]
    Handshake(#[source] std::io::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// One forwarded connection: client stream, relay stream, handshake frame
/// and cipher state.
pub struct Tunnel<C, R> {
    client: C,
    relay: R,
    frame: BytesMut,
    cipher: Cipher,
}

impl<C, R> Tunnel<C, R>
where
    C: AsyncRead + AsyncWrite + Unpin,
    R: AsyncRead + AsyncWrite + Unpin,
{
    /// Assemble a tunnel from an accepted client, a dialed relay and the
    /// frame/cipher pair produced by [`opening_frame`].
    pub fn new(client: C, relay: R, frame: BytesMut, cipher: Cipher) -> Self {
        Self {
            client,
            relay,
            frame,
            cipher,
        }
    }

    /// Send the opening frame, then forward both directions until either
    /// side closes or fails.
    ///
    /// The handshake drain survives partial writes; client data is not read
    /// until the full frame is on the wire.
    pub async fn run(mut self) -> Result<(), TunnelError> {
        self.relay
            .write_all(&self.frame)
            .await
            .map_err(TunnelError::Handshake)?;

        Pump::new(&mut self.client, &mut self.relay, &mut self.cipher).await?;
        Ok(())
    }
}
