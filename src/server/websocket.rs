//! WebSocket server implementation
//!
//! Accepts participant connections, assigns each a connection id, and pumps
//! messages between the socket and the session hub. Each connection runs in
//! its own task; a failure there never affects other connections or the
//! process.

use std::net::SocketAddr;
use std::sync::Arc;

use futures_util::stream::{SplitSink, SplitStream};
use futures_util::{SinkExt, StreamExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::{broadcast, mpsc};
use tokio_tungstenite::{accept_async, tungstenite::Message, WebSocketStream};
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use super::protocol::{ClientMessage, ServerMessage};
use crate::session::{ConnectionId, SessionHub};

/// Configuration for the WebSocket server
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Address to bind to
    pub bind: String,
    /// Port to listen on
    pub port: u16,
}

impl ServerConfig {
    /// Create a new server configuration
    pub fn new(bind: String, port: u16) -> Self {
        Self { bind, port }
    }

    /// Get the socket address to bind to
    pub fn socket_addr(&self) -> String {
        format!("{}:{}", self.bind, self.port)
    }
}

/// WebSocket server for handling participant connections
pub struct WebSocketServer {
    config: ServerConfig,
    hub: Arc<SessionHub>,
    shutdown_tx: broadcast::Sender<()>,
}

impl WebSocketServer {
    /// Create a new WebSocket server
    pub fn new(config: ServerConfig) -> Self {
        let (shutdown_tx, _) = broadcast::channel(1);
        Self {
            config,
            hub: Arc::new(SessionHub::new()),
            shutdown_tx,
        }
    }

    /// Trigger server shutdown
    pub fn shutdown(&self) {
        let _ = self.shutdown_tx.send(());
    }

    /// Run the WebSocket server
    ///
    /// Binds the configured address and serves connections until a shutdown
    /// signal is received.
    pub async fn run(&self) -> anyhow::Result<()> {
        let addr = self.config.socket_addr();
        let listener = TcpListener::bind(&addr).await?;
        info!("WebSocket server listening on ws://{}", addr);
        self.serve(listener).await
    }

    /// Serve connections from an already-bound listener
    ///
    /// Split out from [`run`](Self::run) so callers can bind an ephemeral
    /// port first.
    pub async fn serve(&self, listener: TcpListener) -> anyhow::Result<()> {
        let mut shutdown_rx = self.shutdown_tx.subscribe();

        loop {
            tokio::select! {
                // Accept new connections
                result = listener.accept() => {
                    match result {
                        Ok((stream, peer_addr)) => {
                            let hub = Arc::clone(&self.hub);
                            let shutdown_rx = self.shutdown_tx.subscribe();

                            tokio::spawn(async move {
                                if let Err(e) = handle_connection(stream, peer_addr, hub, shutdown_rx).await {
                                    error!("Connection error from {}: {}", peer_addr, e);
                                }
                            });
                        }
                        Err(e) => {
                            error!("Failed to accept connection: {}", e);
                        }
                    }
                }
                // Handle shutdown signal
                _ = shutdown_rx.recv() => {
                    info!("Shutdown signal received, stopping server");
                    break;
                }
            }
        }

        let session_count = self.hub.session_count().await;
        if session_count > 0 {
            info!("Waiting for {} active connections to close...", session_count);
        }

        Ok(())
    }
}

/// Handle a single WebSocket connection
///
/// Whatever way the connection ends (close frame, transport error, stream
/// end, shutdown), exactly one `disconnect` reaches the hub before this
/// function returns.
async fn handle_connection(
    stream: TcpStream,
    peer_addr: SocketAddr,
    hub: Arc<SessionHub>,
    shutdown_rx: broadcast::Receiver<()>,
) -> anyhow::Result<()> {
    info!("New connection from {}", peer_addr);

    // Upgrade to WebSocket
    let ws_stream = accept_async(stream).await?;
    let (ws_sender, ws_receiver) = ws_stream.split();

    let connection_id = Uuid::new_v4();
    let (outbound_tx, outbound_rx) = mpsc::unbounded_channel();

    // Admitting the connection sends the current snapshot privately to it.
    hub.connect(connection_id, outbound_tx).await;

    let result = connection_loop(
        connection_id,
        peer_addr,
        &hub,
        ws_sender,
        ws_receiver,
        outbound_rx,
        shutdown_rx,
    )
    .await;

    // A disconnect is final: the session is removed before any further event
    // for this connection could be considered.
    hub.disconnect(connection_id).await;
    info!("Connection from {} closed", peer_addr);
    result
}

/// Pump messages between the socket and the hub until the connection ends
async fn connection_loop(
    connection_id: ConnectionId,
    peer_addr: SocketAddr,
    hub: &SessionHub,
    mut ws_sender: SplitSink<WebSocketStream<TcpStream>, Message>,
    mut ws_receiver: SplitStream<WebSocketStream<TcpStream>>,
    mut outbound_rx: mpsc::UnboundedReceiver<ServerMessage>,
    mut shutdown_rx: broadcast::Receiver<()>,
) -> anyhow::Result<()> {
    loop {
        tokio::select! {
            // Deliver hub messages to this connection, in hub order
            outbound = outbound_rx.recv() => {
                match outbound {
                    Some(message) => {
                        let json = message.to_json()?;
                        ws_sender.send(Message::Text(json)).await?;
                    }
                    // Hub dropped our sender: we were disconnected elsewhere
                    None => break,
                }
            }
            // Receive messages from the participant
            msg = ws_receiver.next() => {
                match msg {
                    Some(Ok(Message::Text(text))) => {
                        debug!("Received message from {}: {}", peer_addr, text);
                        handle_message(&text, connection_id, hub).await;
                    }
                    Some(Ok(Message::Binary(data))) => {
                        warn!("Received binary message from {} ({} bytes), ignoring", peer_addr, data.len());
                    }
                    Some(Ok(Message::Ping(data))) => {
                        ws_sender.send(Message::Pong(data)).await?;
                    }
                    Some(Ok(Message::Pong(_))) => {
                        // Ignore pong messages
                    }
                    Some(Ok(Message::Close(_))) => {
                        info!("Client {} requested close", peer_addr);
                        break;
                    }
                    Some(Ok(Message::Frame(_))) => {
                        // Raw frame, ignore
                    }
                    Some(Err(e)) => {
                        // Abrupt transport failure: treated like an orderly
                        // disconnect by the caller
                        error!("WebSocket error from {}: {}", peer_addr, e);
                        break;
                    }
                    None => {
                        info!("Connection closed by {}", peer_addr);
                        break;
                    }
                }
            }
            // Handle shutdown signal
            _ = shutdown_rx.recv() => {
                info!("Shutdown signal received, closing connection to {}", peer_addr);
                let _ = ws_sender.send(Message::Close(None)).await;
                break;
            }
        }
    }

    Ok(())
}

/// Dispatch one inbound frame to the hub
///
/// A malformed frame is logged and dropped; it never tears down the
/// connection.
async fn handle_message(text: &str, connection_id: ConnectionId, hub: &SessionHub) {
    let message = match ClientMessage::from_json(text) {
        Ok(message) => message,
        Err(e) => {
            warn!("Malformed message from {}: {}", connection_id, e);
            return;
        }
    };

    match message {
        ClientMessage::RegisterCharacter {
            character_id,
            user_name,
        } => {
            hub.register(connection_id, character_id, user_name).await;
        }
        ClientMessage::Move { x, y } => {
            hub.move_to(connection_id, x, y).await;
        }
        ClientMessage::Signal { to, signal } => {
            hub.forward_signal(connection_id, to, signal).await;
        }
    }
}
