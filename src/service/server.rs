//! # Page Server
//!
//! Accept loop and request dispatcher for the paging protocol.
//!
//! The server owns the backing store and serves exactly one connection at a
//! time; a session's requests are answered strictly in order, so the accept
//! loop awaits each connection to completion before taking the next. The loop
//! itself is async so shutdown (ctrl-c or an explicit channel) can interrupt
//! it between connections.
//!
//! Per connection the dispatcher walks `AwaitingConnect -> Serving -> Closed`:
//! the first request must be a valid CONNECT (otherwise NACK or teardown), the
//! store is allocated before the ACK goes out, and any transport error or
//! protocol violation afterwards tears the connection down and releases the
//! store. The accept loop survives and takes the next client.

use std::sync::Arc;

use bytes::Bytes;
use futures::{SinkExt, StreamExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::mpsc;
use tokio_util::codec::Framed;
use tracing::{debug, error, info, instrument, warn};

use crate::config::ServerConfig;
use crate::error::{NetmemError, Result};
use crate::protocol::{Request, RequestCodec, Response};
use crate::utils::metrics::{ServerMetrics, Timer};

use super::store::BackingStore;

/// A bound paging server, ready to serve connections.
pub struct PageServer {
    config: ServerConfig,
    listener: TcpListener,
    local_addr: std::net::SocketAddr,
    metrics: Arc<ServerMetrics>,
}

impl PageServer {
    /// Validate the configuration and bind the listen socket.
    ///
    /// Binding is separate from serving so callers can bind port 0 and read
    /// the assigned address back with [`local_addr`](Self::local_addr).
    pub async fn bind(config: ServerConfig) -> Result<Self> {
        let errors = config.validate();
        if !errors.is_empty() {
            return Err(NetmemError::Config(format!(
                "Invalid server configuration:\n  - {}",
                errors.join("\n  - ")
            )));
        }

        let listener = TcpListener::bind(&config.address).await?;
        let local_addr = listener.local_addr()?;
        info!(address = %local_addr, page_size = config.page_size, "Page server listening");

        Ok(Self {
            config,
            listener,
            local_addr,
            metrics: Arc::new(ServerMetrics::new()),
        })
    }

    /// The address the listener is bound to.
    pub fn local_addr(&self) -> std::net::SocketAddr {
        self.local_addr
    }

    /// Shared handle to the server's counters.
    pub fn metrics(&self) -> Arc<ServerMetrics> {
        Arc::clone(&self.metrics)
    }

    /// Serve until ctrl-c.
    pub async fn run(self) -> Result<()> {
        // Create internal shutdown channel
        let (shutdown_tx, shutdown_rx) = mpsc::channel::<()>(1);

        // Set up ctrl-c handler that sends to our internal shutdown channel
        tokio::spawn(async move {
            if let Ok(()) = tokio::signal::ctrl_c().await {
                info!("Received CTRL+C signal, shutting down");
                let _ = shutdown_tx.send(()).await;
            }
        });

        self.run_with_shutdown(shutdown_rx).await
    }

    /// Serve until the shutdown channel fires.
    ///
    /// Shutdown is observed between connections; an in-flight session is
    /// never cancelled mid-exchange.
    #[instrument(skip(self, shutdown_rx), fields(address = %self.local_addr))]
    pub async fn run_with_shutdown(self, mut shutdown_rx: mpsc::Receiver<()>) -> Result<()> {
        loop {
            tokio::select! {
                _ = shutdown_rx.recv() => {
                    info!("Shutting down page server");
                    self.metrics.log_metrics();
                    return Ok(());
                }

                accept_result = self.listener.accept() => {
                    match accept_result {
                        Ok((stream, peer)) => {
                            info!(peer = %peer, "Connection established");
                            self.metrics.connection_established();

                            let _timer = Timer::start("serve_connection");
                            match serve_connection(stream, &self.config, &self.metrics).await {
                                Ok(()) => info!(peer = %peer, "Session closed"),
                                Err(e) => {
                                    self.metrics.connection_error();
                                    warn!(peer = %peer, error = %e, "Connection torn down");
                                }
                            }
                        }
                        Err(e) => {
                            error!(error = %e, "Error accepting connection");
                        }
                    }
                }
            }
        }
    }
}

/// Serve one connection to completion.
///
/// Returns `Ok(())` on an orderly close (DISCONNECT, or NACKed handshake) and
/// an error when the connection is torn down. The backing store lives on this
/// stack frame, so it is released whichever way the function leaves.
async fn serve_connection(
    stream: TcpStream,
    config: &ServerConfig,
    metrics: &ServerMetrics,
) -> Result<()> {
    stream.set_nodelay(true)?;
    let mut framed = Framed::new(stream, RequestCodec::new());

    // AwaitingConnect: the first request must be a CONNECT.
    let (page_size, memory_size) = match framed.next().await {
        Some(Ok(Request::Connect {
            page_size,
            memory_size,
        })) => {
            if let Err(reason) = validate_handshake(config, page_size, memory_size) {
                metrics.handshake_rejected();
                warn!(page_size, memory_size, reason, "Rejecting handshake");
                framed.send(Response::Nack).await?;
                return Ok(());
            }
            (page_size, memory_size)
        }
        Some(Ok(other)) => {
            return Err(NetmemError::UnexpectedOpcode {
                opcode: other.opcode().as_byte(),
            })
        }
        Some(Err(e)) => return Err(e),
        None => return Err(NetmemError::PeerClosed),
    };

    // Store is allocated and initialized before the ACK goes out. With
    // persistence configured, a previous session's image is restored so
    // synced pages survive reconnects.
    let mut store = match load_persisted(config, memory_size).await {
        Some(image) => BackingStore::from_contents(page_size, image),
        None => BackingStore::allocate(page_size, memory_size),
    };
    framed.codec_mut().set_page_size(page_size);
    framed.send(Response::Ack).await?;
    debug!(page_size, memory_size, "Handshake accepted, store allocated");

    // Serving: strict request/response, one at a time.
    loop {
        match framed.next().await {
            Some(Ok(Request::Fetch { offset })) => {
                // No status channel ahead of the payload, so an out-of-bounds
                // fetch terminates the connection.
                let page = store.read_page(offset)?;
                let payload = Bytes::copy_from_slice(page);
                framed.send(Response::Page(payload)).await?;
                metrics.page_served();
                debug!(offset = format_args!("{offset:#x}"), "Page served");
            }

            Some(Ok(Request::Sync { offset, data })) => match store.write_page(offset, &data) {
                Ok(()) => {
                    if let Some(path) = &config.persist_path {
                        if let Err(e) = tokio::fs::write(path, store.contents()).await {
                            error!(error = %e, path = %path.display(), "Persist write failed");
                            metrics.sync_rejected();
                            framed.send(Response::SyncErr).await?;
                            continue;
                        }
                    }
                    metrics.sync_accepted();
                    framed.send(Response::SyncOk).await?;
                    debug!(offset = format_args!("{offset:#x}"), "Page synced");
                }
                Err(e) => {
                    warn!(offset = format_args!("{offset:#x}"), error = %e, "Rejecting sync");
                    metrics.sync_rejected();
                    framed.send(Response::SyncErr).await?;
                }
            },

            Some(Ok(Request::Disconnect)) => {
                debug!("Disconnect received");
                return Ok(());
            }

            Some(Ok(req @ Request::Connect { .. })) => {
                return Err(NetmemError::UnexpectedOpcode {
                    opcode: req.opcode().as_byte(),
                })
            }

            Some(Err(e)) => return Err(e),

            None => return Err(NetmemError::PeerClosed),
        }
    }
}

/// Read the persisted store image, if the server keeps one and it matches
/// the negotiated memory size. Anything else falls back to a fresh store.
async fn load_persisted(config: &ServerConfig, memory_size: u64) -> Option<Vec<u8>> {
    let path = config.persist_path.as_ref()?;
    match tokio::fs::read(path).await {
        Ok(image) if image.len() as u64 == memory_size => {
            debug!(path = %path.display(), "Store restored from persist file");
            Some(image)
        }
        Ok(image) => {
            warn!(
                path = %path.display(),
                file_size = image.len(),
                memory_size,
                "Persist file does not match the negotiated size, starting fresh"
            );
            None
        }
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => None,
        Err(e) => {
            warn!(path = %path.display(), error = %e, "Persist file unreadable, starting fresh");
            None
        }
    }
}

/// Check the negotiated geometry against the server's limits.
fn validate_handshake(
    config: &ServerConfig,
    page_size: u64,
    memory_size: u64,
) -> std::result::Result<(), &'static str> {
    if page_size != config.page_size {
        return Err("page size mismatch");
    }
    if memory_size == 0 {
        return Err("zero memory size");
    }
    if memory_size % page_size != 0 {
        return Err("memory size not a multiple of the page size");
    }
    if memory_size > config.max_memory_size {
        return Err("memory size exceeds the server limit");
    }
    Ok(())
}
