//! WebSocket server listener
//!
//! Handles the TCP accept loop and spawns one task per client. Each task
//! performs the upgrade handshake, registers with the hub, runs the delivery
//! loop and unregisters when it ends.

use std::net::SocketAddr;
use std::sync::Arc;

use futures_util::StreamExt;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::{OwnedSemaphorePermit, Semaphore};
use tokio_tungstenite::tungstenite::handshake::server::{ErrorResponse, Request, Response};
use tokio_tungstenite::tungstenite::http::StatusCode;
use tokio_tungstenite::tungstenite::Message;

use crate::error::{Error, Result};
use crate::hub::{DeliveryOutcome, HubHandle};
use crate::server::config::ServerConfig;
use crate::server::transport::WsTransport;

/// WebSocket stream server
pub struct StreamServer {
    config: Arc<ServerConfig>,
    hub: HubHandle,
    connection_semaphore: Option<Arc<Semaphore>>,
}

impl StreamServer {
    /// Create a new server feeding clients from `hub`
    pub fn new(config: ServerConfig, hub: HubHandle) -> Self {
        let connection_semaphore = if config.max_connections > 0 {
            Some(Arc::new(Semaphore::new(config.max_connections)))
        } else {
            None
        };

        Self {
            config: Arc::new(config),
            hub,
            connection_semaphore,
        }
    }

    /// Run the server
    ///
    /// This method only returns if binding fails.
    pub async fn run(&self) -> Result<()> {
        let listener = TcpListener::bind(self.config.bind_addr).await?;
        self.serve(listener).await
    }

    /// Run the server with graceful shutdown
    ///
    /// Stops accepting new clients once `shutdown` resolves. Clients already
    /// connected keep their tasks.
    pub async fn run_until<F>(&self, shutdown: F) -> Result<()>
    where
        F: std::future::Future<Output = ()>,
    {
        let listener = TcpListener::bind(self.config.bind_addr).await?;

        tokio::select! {
            _ = shutdown => {
                tracing::info!("Shutdown signal received");
                Ok(())
            }
            result = self.serve(listener) => result,
        }
    }

    /// Serve clients on an already-bound listener
    pub async fn serve(&self, listener: TcpListener) -> Result<()> {
        let addr = listener.local_addr()?;
        tracing::info!(addr = %addr, path = %self.config.path, "Listening");

        loop {
            match listener.accept().await {
                Ok((socket, peer_addr)) => {
                    self.handle_connection(socket, peer_addr);
                }
                Err(e) => {
                    tracing::error!(error = %e, "Failed to accept connection");
                }
            }
        }
    }

    fn handle_connection(&self, socket: TcpStream, peer_addr: SocketAddr) {
        // Check connection limit
        let permit = if let Some(ref sem) = self.connection_semaphore {
            match sem.clone().try_acquire_owned() {
                Ok(permit) => Some(permit),
                Err(_) => {
                    tracing::warn!(peer = %peer_addr, "Connection rejected: limit reached");
                    return;
                }
            }
        } else {
            None
        };

        if let Err(e) = self.configure_socket(&socket) {
            tracing::error!(peer = %peer_addr, error = %e, "Failed to configure socket");
            return;
        }

        let config = Arc::clone(&self.config);
        let hub = self.hub.clone();

        tokio::spawn(async move {
            if let Err(e) = serve_client(socket, peer_addr, config, hub, permit).await {
                tracing::debug!(peer = %peer_addr, error = %e, "Connection error");
            }
        });
    }

    fn configure_socket(&self, socket: &TcpStream) -> std::io::Result<()> {
        if self.config.tcp_nodelay {
            socket.set_nodelay(true)?;
        }
        Ok(())
    }
}

async fn serve_client(
    socket: TcpStream,
    peer_addr: SocketAddr,
    config: Arc<ServerConfig>,
    hub: HubHandle,
    _permit: Option<OwnedSemaphorePermit>,
) -> Result<()> {
    let path = config.path.clone();
    let check_path = move |req: &Request, resp: Response| {
        if req.uri().path() == path {
            Ok(resp)
        } else {
            let mut err = ErrorResponse::new(Some("Not Found".to_string()));
            *err.status_mut() = StatusCode::NOT_FOUND;
            Err(err)
        }
    };

    let ws = tokio::time::timeout(
        config.handshake_timeout,
        tokio_tungstenite::accept_hdr_async(socket, check_path),
    )
    .await
    .map_err(|_| Error::HandshakeTimeout)??;

    let (sink, mut stream) = ws.split();
    let (conn, outbound) = hub.new_connection();
    let id = conn.id();
    hub.register(conn);

    tracing::info!(peer = %peer_addr, conn = %id, "New connection");

    // Inbound frames carry nothing for us; reading only surfaces close/error.
    let reader_hub = hub.clone();
    let reader = tokio::spawn(async move {
        while let Some(msg) = stream.next().await {
            match msg {
                Ok(Message::Close(_)) => break,
                Ok(_) => {}
                Err(e) => {
                    tracing::debug!(conn = %id, error = %e, "Read failed");
                    break;
                }
            }
        }
        reader_hub.unregister(id);
    });

    let mut transport = WsTransport::new(sink);
    let report = outbound.deliver(&mut transport).await;
    hub.unregister(id);
    reader.abort();

    match report.outcome {
        DeliveryOutcome::Closed => {}
        DeliveryOutcome::WriteFailed(ref e) => {
            tracing::debug!(conn = %id, error = %e, "Delivery stopped on write failure");
        }
    }

    tracing::info!(
        peer = %peer_addr,
        conn = %id,
        messages = report.stats.messages_sent,
        bytes = report.stats.bytes_sent,
        bitrate = report.stats.bitrate(),
        "Connection closed"
    );

    Ok(())
}
