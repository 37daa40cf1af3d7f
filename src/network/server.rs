//! Region TCP Server
//!
//! Accepts player connections and runs one read loop per connection. Each
//! connection also gets a writer task fed by a bounded channel, so handlers
//! and broadcasts never write to a socket directly.

use std::io;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use tokio::io::{AsyncRead, AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::{broadcast, mpsc};
use tokio::time::timeout;
use tracing::{debug, error, info, instrument, warn};

use crate::network::handlers::{ProtocolRouter, HANDOFF_GRACE};
use crate::network::protocol::{Frame, FrameHeader, ServerMessage, EXTENDED_LEN, HEADER_LEN};
use crate::network::session::{ClientSession, ConnectionId};
use crate::world::coordinator::RegionCoordinator;
use crate::world::directory::{DIRECTORY_TIMEOUT, REFRESH_INTERVAL};

/// Default listen port.
pub const DEFAULT_PORT: u16 = 9090;

/// How long a closing connection may spend flushing queued frames.
const FLUSH_TIMEOUT: Duration = Duration::from_secs(1);

/// Server configuration.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Bind address.
    pub bind_addr: SocketAddr,
    /// Outbound frames buffered per connection.
    pub outbound_queue: usize,
    /// Delay between a Handoff and dropping the session.
    pub handoff_grace: Duration,
    /// Endpoint cache refresh interval.
    pub refresh_interval: Duration,
    /// Per-request directory timeout.
    pub directory_timeout: Duration,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: SocketAddr::from(([0, 0, 0, 0], DEFAULT_PORT)),
            outbound_queue: 256,
            handoff_grace: HANDOFF_GRACE,
            refresh_interval: REFRESH_INTERVAL,
            directory_timeout: DIRECTORY_TIMEOUT,
        }
    }
}

/// Region server errors.
#[derive(Debug, thiserror::Error)]
pub enum ServerError {
    /// Failed to bind to address.
    #[error("failed to bind {addr}: {source}")]
    Bind {
        /// Requested address.
        addr: SocketAddr,
        /// Underlying error.
        #[source]
        source: io::Error,
    },

    /// Listener failed.
    #[error("listener error: {0}")]
    Io(#[from] io::Error),
}

/// The region server.
pub struct RegionServer {
    config: ServerConfig,
    router: ProtocolRouter,
    shutdown_tx: broadcast::Sender<()>,
}

impl RegionServer {
    /// Create a server for a region.
    pub fn new(config: ServerConfig, coordinator: Arc<RegionCoordinator>) -> Self {
        let (shutdown_tx, _) = broadcast::channel(1);
        let router = ProtocolRouter::new(coordinator, config.handoff_grace);
        Self {
            config,
            router,
            shutdown_tx,
        }
    }

    /// Configuration in use.
    pub fn config(&self) -> &ServerConfig {
        &self.config
    }

    /// Region served.
    pub fn coordinator(&self) -> &Arc<RegionCoordinator> {
        self.router.coordinator()
    }

    /// Receiver that fires when [`RegionServer::shutdown`] is called.
    pub fn subscribe_shutdown(&self) -> broadcast::Receiver<()> {
        self.shutdown_tx.subscribe()
    }

    /// Sender that triggers shutdown, for signal handlers.
    pub fn shutdown_handle(&self) -> broadcast::Sender<()> {
        self.shutdown_tx.clone()
    }

    /// Bind the configured address and serve until shutdown.
    #[instrument(skip(self), fields(region = %self.coordinator().name()))]
    pub async fn run(&self) -> Result<(), ServerError> {
        let addr = self.config.bind_addr;
        let listener = TcpListener::bind(addr)
            .await
            .map_err(|source| ServerError::Bind { addr, source })?;
        self.run_with_listener(listener).await
    }

    /// Serve on an already bound listener until shutdown.
    pub async fn run_with_listener(&self, listener: TcpListener) -> Result<(), ServerError> {
        let local = listener.local_addr()?;
        info!(addr = %local, "socket_listen");

        let mut shutdown_rx = self.shutdown_tx.subscribe();
        loop {
            tokio::select! {
                result = listener.accept() => {
                    match result {
                        Ok((stream, addr)) => self.handle_connection(stream, addr),
                        Err(e) => error!(error = %e, "socket_accept_error"),
                    }
                }
                _ = shutdown_rx.recv() => {
                    info!("shutdown_signal_received");
                    break;
                }
            }
        }
        Ok(())
    }

    /// Stop accepting and close every connection.
    pub fn shutdown(&self) {
        let _ = self.shutdown_tx.send(());
    }

    /// Number of live connections.
    pub async fn connection_count(&self) -> usize {
        self.coordinator().sessions().len().await
    }

    fn handle_connection(&self, stream: TcpStream, addr: SocketAddr) {
        let router = self.router.clone();
        let queue = self.config.outbound_queue;
        let mut shutdown_rx = self.shutdown_tx.subscribe();

        tokio::spawn(async move {
            let _ = stream.set_nodelay(true);
            let sessions = router.coordinator().sessions().clone();
            let id = ConnectionId::new();
            let (msg_tx, mut msg_rx) = mpsc::channel::<ServerMessage>(queue);
            let closed = sessions.insert(id, msg_tx.clone()).await;
            info!(connection = %id, peer = %addr, "player_connected");

            let (mut reader, mut writer) = stream.into_split();

            let sender_task = tokio::spawn(async move {
                while let Some(msg) = msg_rx.recv().await {
                    let bytes = match msg.encode() {
                        Ok(b) => b,
                        Err(e) => {
                            error!(error = %e, "frame_encode_failed");
                            continue;
                        }
                    };
                    #[cfg(feature = "debug-tracing")]
                    tracing::trace!(frame = %hex::encode(&bytes), "frame_out");
                    if writer.write_all(&bytes).await.is_err() {
                        break;
                    }
                }
                let _ = writer.shutdown().await;
            });

            let mut session = ClientSession::new(id, msg_tx);
            loop {
                tokio::select! {
                    frame = read_frame(&mut reader) => {
                        match frame {
                            Ok(Some(frame)) => {
                                #[cfg(feature = "debug-tracing")]
                                tracing::trace!(
                                    packet_type = frame.header.packet_type,
                                    payload = %hex::encode(&frame.payload),
                                    "frame_in"
                                );
                                let routed = router
                                    .route(&mut session, frame.header.packet_type, &frame.payload)
                                    .await;
                                if let Err(e) = routed {
                                    warn!(connection = %id, error = %e, "malformed_frame");
                                    break;
                                }
                            }
                            Ok(None) => break,
                            Err(e) => {
                                debug!(connection = %id, error = %e, "connection_read_error");
                                break;
                            }
                        }
                    }
                    _ = closed.notified() => {
                        debug!(connection = %id, "session_closed");
                        break;
                    }
                    _ = shutdown_rx.recv() => break,
                }
            }

            let had_id = session.client_id != 0;
            sessions.remove(id).await;
            drop(session);
            if timeout(FLUSH_TIMEOUT, sender_task).await.is_err() {
                debug!(connection = %id, "flush_timeout");
            }
            if had_id {
                router.coordinator().broadcast_snapshot().await;
            }
            info!(connection = %id, peer = %addr, "player_disconnected");
        });
    }
}

/// Read one frame. `Ok(None)` on a clean close before a new frame starts;
/// a close mid-frame is an `UnexpectedEof` error.
pub async fn read_frame<R: AsyncRead + Unpin>(reader: &mut R) -> io::Result<Option<Frame>> {
    let mut prefix = [0u8; HEADER_LEN];
    match reader.read_exact(&mut prefix).await {
        Ok(_) => {}
        Err(e) if e.kind() == io::ErrorKind::UnexpectedEof => return Ok(None),
        Err(e) => return Err(e),
    }

    let extension = if FrameHeader::needs_extension(&prefix) {
        let mut ext = [0u8; EXTENDED_LEN];
        reader.read_exact(&mut ext).await?;
        Some(ext)
    } else {
        None
    };
    let header = FrameHeader::from_parts(&prefix, extension)
        .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))?;

    let mut payload = vec![0u8; header.length];
    reader.read_exact(&mut payload).await?;
    Ok(Some(Frame { header, payload }))
}
