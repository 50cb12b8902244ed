//! Socket-level plumbing
//!
//! Provides:
//! - Relay descriptors: addresses resolved once at startup plus the shared
//!   key bytes used for key derivation
//! - Per-socket options applied to both ends of every connection
//! - The transparent-redirect lookup that recovers a diverted connection's
//!   original destination from the kernel

use crate::config::ServerConfig;
use socket2::SockRef;
use std::io;
use std::net::{IpAddr, Ipv4Addr, Ipv6Addr, SocketAddr};
use std::os::fd::AsRawFd;
use std::time::Duration;
use thiserror::Error;
use tokio::net::{lookup_host, TcpStream};
use tracing::warn;

/// Send/receive timeout applied to every connection socket; the only
/// liveness bound for stuck connections.
pub const IO_TIMEOUT: Duration = Duration::from_secs(10);

/// Shared-key bytes actually used; longer configured keys are cut here
pub const MAX_KEY_LEN: usize = 256;

/// netfilter's original-destination socket options (not exposed by libc)
const SO_ORIGINAL_DST: libc::c_int = 80;
const IP6T_SO_ORIGINAL_DST: libc::c_int = 80;

/// Transport layer errors
#[derive(Debug, Error)]
pub enum TransportError {
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    #[error("cannot resolve {0}:{1}")]
    Resolve(String, String),
}

/// One configured relay: resolved address plus shared key
#[derive(Debug, Clone)]
pub struct RelayServer {
    /// Resolved network address
    pub addr: SocketAddr,
    /// Shared key, at most [`MAX_KEY_LEN`] bytes
    pub key: Vec<u8>,
}

impl RelayServer {
    /// Resolve a configured server entry into a descriptor.
    ///
    /// Runs once at startup; the first resolved address wins. The key is
    /// copied out (capped at [`MAX_KEY_LEN`] bytes) so the configuration
    /// record stays untouched.
    pub async fn resolve(config: &ServerConfig) -> Result<Self, TransportError> {
        let resolve_err =
            || TransportError::Resolve(config.address.clone(), config.port.clone());

        let port: u16 = config.port.parse().map_err(|_| resolve_err())?;
        let addr = lookup_host((config.address.as_str(), port))
            .await
            .map_err(|_| resolve_err())?
            .next()
            .ok_or_else(resolve_err)?;

        let key_bytes = config.key.as_bytes();
        let key = key_bytes[..key_bytes.len().min(MAX_KEY_LEN)].to_vec();

        Ok(Self { addr, key })
    }
}

/// Apply the per-connection socket options: keepalive plus the 10 s
/// send/receive timeouts. Option failures are logged and non-fatal.
pub fn configure(stream: &TcpStream) {
    let sock = SockRef::from(stream);

    if let Err(e) = sock.set_keepalive(true) {
        warn!("set_keepalive failed: {}", e);
    }
    if let Err(e) = sock.set_read_timeout(Some(IO_TIMEOUT)) {
        warn!("set_read_timeout failed: {}", e);
    }
    if let Err(e) = sock.set_write_timeout(Some(IO_TIMEOUT)) {
        warn!("set_write_timeout failed: {}", e);
    }
}

/// Open a connection to a relay and apply the socket options.
pub async fn dial(addr: SocketAddr) -> io::Result<TcpStream> {
    let stream = TcpStream::connect(addr).await?;
    configure(&stream);
    Ok(stream)
}

/// Recover the original destination of a connection the packet filter
/// diverted to us. Tries the IPv6 variant first, then IPv4.
pub fn original_destination(stream: &TcpStream) -> io::Result<SocketAddr> {
    let fd = stream.as_raw_fd();
    query_original_dst(fd, libc::SOL_IPV6, IP6T_SO_ORIGINAL_DST)
        .or_else(|_| query_original_dst(fd, libc::SOL_IP, SO_ORIGINAL_DST))
}

fn query_original_dst(
    fd: std::os::fd::RawFd,
    level: libc::c_int,
    optname: libc::c_int,
) -> io::Result<SocketAddr> {
    let mut addr: libc::sockaddr_storage = unsafe { std::mem::zeroed() };
    let mut len = std::mem::size_of::<libc::sockaddr_storage>() as libc::socklen_t;

    let rc = unsafe {
        libc::getsockopt(
            fd,
            level,
            optname,
            &mut addr as *mut libc::sockaddr_storage as *mut libc::c_void,
            &mut len,
        )
    };
    if rc != 0 {
        return Err(io::Error::last_os_error());
    }

    decode_sockaddr(&addr)
}

fn decode_sockaddr(addr: &libc::sockaddr_storage) -> io::Result<SocketAddr> {
    match addr.ss_family as libc::c_int {
        libc::AF_INET => {
            let v4 = unsafe {
                &*(addr as *const libc::sockaddr_storage as *const libc::sockaddr_in)
            };
            let ip = Ipv4Addr::from(u32::from_be(v4.sin_addr.s_addr));
            Ok(SocketAddr::new(IpAddr::V4(ip), u16::from_be(v4.sin_port)))
        }
        libc::AF_INET6 => {
            let v6 = unsafe {
                &*(addr as *const libc::sockaddr_storage as *const libc::sockaddr_in6)
            };
            let ip = Ipv6Addr::from(v6.sin6_addr.s6_addr);
            Ok(SocketAddr::new(IpAddr::V6(ip), u16::from_be(v6.sin6_port)))
        }
        family => Err(io::Error::new(
            io::ErrorKind::InvalidData,
            format!("unexpected address family {}", family),
        )),
    }
}
