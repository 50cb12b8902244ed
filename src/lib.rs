//! # Rona Redir
//!
//! A transparent TCP redirector. Connections diverted into the local
//! listener by the host packet filter are forwarded through a remote rona
//! relay server, which dials the true destination on the client's behalf.
//!
//! ## How a connection flows
//!
//! ```text
//! ┌──────────┐  REDIRECT   ┌────────────┐   opening frame    ┌─────────┐
//! │  client  │ ──────────► │ rona-redir │ ─────────────────► │  relay  │──► true
//! │          │             │            │   ciphered bytes   │         │    destination
//! │          │ ◄────────── │            │ ◄───────────────── │         │
//! └──────────┘             └────────────┘                    └─────────┘
//! ```
//!
//! The redirector recovers each connection's original destination from the
//! packet filter, picks one relay at random from the configured pool, sends
//! a fixed 512-byte opening frame naming the destination, and then pumps
//! both directions of the byte stream through a per-connection stream
//! cipher. One upstream TCP connection per accepted client; no multiplexing.

pub mod config;
pub mod crypto;
pub mod redir;
pub mod transport;
pub mod tunnel;

pub use config::Config;

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Result type alias
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Transport error: {0}")]
    Transport(#[from] transport::TransportError),

    #[error("Tunnel error: {0}")]
    Tunnel(#[from] tunnel::TunnelError),

    #[error("Configuration error: {0}")]
    Config(String),
}
