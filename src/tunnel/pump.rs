//! Bidirectional forwarding between the client and relay sockets
//!
//! Each direction is a half-duplex pipe with one fixed buffer and two
//! sub-states: *feeding* (buffer empty, reading from the source) and
//! *draining* (buffer non-empty, flushing to the destination). A pipe never
//! reads while it still holds unsent bytes, so per-connection memory is
//! bounded at two buffers and TCP flow control couples end to end. The two
//! directions are independent; a stalled write on one never blocks the
//! other.

use crate::crypto::Cipher;
use std::future::Future;
use std::io;
use std::pin::Pin;
use std::task::{ready, Context, Poll};
use tokio::io::{AsyncRead, AsyncWrite, ReadBuf};
use tracing::warn;

/// Per-direction transfer buffer capacity
pub const BUF_SIZE: usize = 8192;

/// Which half-stream a pipe carries; selects the cipher transform and the
/// peer names used in logs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Direction {
    /// client → relay, enciphered on the way out
    Outbound,
    /// relay → client, deciphered on the way in
    Inbound,
}

impl Direction {
    fn source(self) -> &'static str {
        match self {
            Direction::Outbound => "client",
            Direction::Inbound => "relay",
        }
    }

    fn dest(self) -> &'static str {
        match self {
            Direction::Outbound => "relay",
            Direction::Inbound => "client",
        }
    }
}

/// One half-duplex pipe. `pos == cap` is feeding mode, `pos < cap` is
/// draining mode; `buf[pos..cap]` always holds exactly the bytes that have
/// been ciphered but not yet written.
struct Pipe {
    dir: Direction,
    buf: Box<[u8; BUF_SIZE]>,
    pos: usize,
    cap: usize,
}

impl Pipe {
    fn new(dir: Direction) -> Self {
        Self {
            dir,
            buf: Box::new([0u8; BUF_SIZE]),
            pos: 0,
            cap: 0,
        }
    }

    /// Drive this direction until it would block. `Ready(Ok)` is an orderly
    /// close of the source, `Ready(Err)` a failure on either socket; both
    /// end the whole connection.
    fn poll_transfer<R, W>(
        &mut self,
        cx: &mut Context<'_>,
        src: &mut R,
        dst: &mut W,
        cipher: &mut Cipher,
    ) -> Poll<io::Result<()>>
    where
        R: AsyncRead + Unpin,
        W: AsyncWrite + Unpin,
    {
        loop {
            if self.pos == self.cap {
                let mut read_buf = ReadBuf::new(&mut self.buf[..]);
                if let Err(e) = ready!(Pin::new(&mut *src).poll_read(cx, &mut read_buf)) {
                    warn!("{} reset: {}", self.dir.source(), e);
                    return Poll::Ready(Err(e));
                }
                let n = read_buf.filled().len();
                if n == 0 {
                    return Poll::Ready(Ok(()));
                }
                // Cipher exactly the bytes just read, before the first write
                // attempt; a partial write below must not re-cipher them.
                match self.dir {
                    Direction::Outbound => cipher.encrypt(read_buf.filled_mut()),
                    Direction::Inbound => cipher.decrypt(read_buf.filled_mut()),
                }
                self.pos = 0;
                self.cap = n;
            }

            while self.pos < self.cap {
                let n = match ready!(Pin::new(&mut *dst).poll_write(cx, &self.buf[self.pos..self.cap]))
                {
                    Ok(n) => n,
                    Err(e) => {
                        warn!("send to {} failed: {}", self.dir.dest(), e);
                        return Poll::Ready(Err(e));
                    }
                };
                if n == 0 {
                    return Poll::Ready(Err(io::ErrorKind::WriteZero.into()));
                }
                self.pos += n;
            }
        }
    }
}

/// Future that forwards both directions between an established client/relay
/// pair until either side closes or fails.
///
/// Both directions share the connection's single cipher state; see
/// [`Cipher`] for why it must not be split.
pub struct Pump<'a, C, R> {
    client: &'a mut C,
    relay: &'a mut R,
    cipher: &'a mut Cipher,
    outbound: Pipe,
    inbound: Pipe,
}

impl<'a, C, R> Pump<'a, C, R>
where
    C: AsyncRead + AsyncWrite + Unpin,
    R: AsyncRead + AsyncWrite + Unpin,
{
    pub fn new(client: &'a mut C, relay: &'a mut R, cipher: &'a mut Cipher) -> Self {
        Self {
            client,
            relay,
            cipher,
            outbound: Pipe::new(Direction::Outbound),
            inbound: Pipe::new(Direction::Inbound),
        }
    }
}

impl<C, R> Future for Pump<'_, C, R>
where
    C: AsyncRead + AsyncWrite + Unpin,
    R: AsyncRead + AsyncWrite + Unpin,
{
    type Output = io::Result<()>;

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        let this = self.get_mut();

        // Half-close is not attempted: the first EOF or error on either
        // direction tears the whole connection down.
        if let Poll::Ready(res) =
            this.outbound
                .poll_transfer(cx, this.client, this.relay, this.cipher)
        {
            return Poll::Ready(res);
        }
        if let Poll::Ready(res) =
            this.inbound
                .poll_transfer(cx, this.relay, this.client, this.cipher)
        {
            return Poll::Ready(res);
        }

        Poll::Pending
    }
}
