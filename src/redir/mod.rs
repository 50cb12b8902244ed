//! Transparent-redirect acceptor
//!
//! Listens on the endpoint the packet filter diverts traffic to. Each
//! accepted connection gets a slot, its original destination, a randomly
//! chosen relay and a spawned [`Tunnel`] task; every failure along the way
//! is connection-scoped and leaves the listener running.

use crate::config::RedirConfig;
use crate::crypto;
use crate::transport::{self, RelayServer, TransportError};
use crate::tunnel::{opening_frame, Tunnel};
use std::io;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::{lookup_host, TcpListener, TcpStream};
use tokio::sync::Semaphore;
use tracing::{debug, info, warn};

/// Upper bound on simultaneously forwarded connections; accepts beyond it
/// are refused, never queued.
pub const MAX_CONNECTIONS: usize = 64;

/// The redirect listener and everything shared across connections
pub struct RedirServer {
    listener: TcpListener,
    relays: Arc<Vec<RelayServer>>,
    slots: Arc<Semaphore>,
}

impl RedirServer {
    /// Resolve the redirect endpoint and bind the listener.
    ///
    /// A single socket of the family the address resolves to first; no
    /// dual-stack.
    pub async fn bind(
        config: &RedirConfig,
        relays: Vec<RelayServer>,
    ) -> Result<Self, TransportError> {
        let resolve_err =
            || TransportError::Resolve(config.address.clone(), config.port.clone());

        let port: u16 = config.port.parse().map_err(|_| resolve_err())?;
        let addr = lookup_host((config.address.as_str(), port))
            .await
            .map_err(|_| resolve_err())?
            .next()
            .ok_or_else(resolve_err)?;

        let listener = TcpListener::bind(addr).await?;

        Ok(Self {
            listener,
            relays: Arc::new(relays),
            slots: Arc::new(Semaphore::new(MAX_CONNECTIONS)),
        })
    }

    /// Address the listener actually bound to
    pub fn local_addr(&self) -> io::Result<SocketAddr> {
        self.listener.local_addr()
    }

    /// Accept connections forever. Every error past this point is scoped to
    /// one connection.
    pub async fn run(&self) {
        loop {
            let (client, peer) = match self.listener.accept().await {
                Ok(pair) => pair,
                Err(e) => {
                    warn!("accept failed: {}", e);
                    continue;
                }
            };

            let permit = match Arc::clone(&self.slots).try_acquire_owned() {
                Ok(permit) => permit,
                Err(_) => {
                    // dropping the socket closes it
                    warn!("connection slots exhausted, rejecting {}", peer);
                    continue;
                }
            };

            transport::configure(&client);

            let relays = Arc::clone(&self.relays);
            tokio::spawn(async move {
                let _permit = permit;
                if let Err(e) = forward(client, &relays).await {
                    debug!("connection from {} closed: {}", peer, e);
                }
            });
        }
    }
}

/// Drive one accepted connection to completion.
async fn forward(client: TcpStream, relays: &[RelayServer]) -> crate::Result<()> {
    let dest = transport::original_destination(&client).map_err(|e| {
        warn!("original destination lookup failed: {}", e);
        e
    })?;
    let host = dest.ip().to_string();
    let port = dest.port().to_string();

    let relay = &relays[crypto::random_index(relays.len())];
    info!("connect {}:{} via {}", host, port, relay.addr);

    let (frame, cipher) = opening_frame(&host, &port, &relay.key);

    let relay_stream = transport::dial(relay.addr).await.map_err(|e| {
        warn!("connect to relay failed: {}", e);
        e
    })?;

    Tunnel::new(client, relay_stream, frame, cipher).run().await?;
    Ok(())
}
