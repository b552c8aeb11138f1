//! Network Server
//!
//! TCP server answering parameter requests from other nodes.

use std::net::SocketAddr;
use std::sync::{Arc, RwLock};

use tokio::net::{TcpListener, TcpStream};

use super::{read_message, write_message, Message, WireParams};
use crate::error::{Error, Result};
use crate::obfuscation::ObfuscationParams;

/// Message handler callback type
pub type MessageHandler = Arc<dyn Fn(String, Message) -> Option<Message> + Send + Sync>;

/// Handler answering `ObfuscationRequest` with the current parameters
pub fn params_handler(params: Arc<RwLock<ObfuscationParams>>) -> MessageHandler {
    Arc::new(move |peer_addr: String, message: Message| match message {
        Message::ObfuscationRequest { from } => {
            tracing::debug!("Parameter request from {} ({})", from, peer_addr);
            let reply = match params.read() {
                Ok(current) => Message::ObfuscationResponse { params: WireParams::from(&*current) },
                Err(_) => Message::Error { message: "parameters unavailable".into() },
            };
            Some(reply)
        }
        other => Some(Message::Error {
            message: format!("unexpected {}", other.type_name()),
        }),
    })
}

/// Network server for peer requests
pub struct NetworkServer {
    /// Bind address
    bind_address: String,
    /// Message handler
    handler: MessageHandler,
    /// Shutdown signal
    shutdown: tokio::sync::watch::Sender<bool>,
}

impl NetworkServer {
    /// Create a new network server
    pub fn new(bind_address: String, handler: MessageHandler) -> Self {
        let (shutdown_tx, _) = tokio::sync::watch::channel(false);

        Self {
            bind_address,
            handler,
            shutdown: shutdown_tx,
        }
    }

    /// Bind the listening socket
    pub async fn bind(&self) -> Result<TcpListener> {
        let listener = TcpListener::bind(&self.bind_address).await?;
        tracing::info!("Network server listening on {}", listener.local_addr()?);
        Ok(listener)
    }

    /// Bind and serve until stopped
    pub async fn start(&self) -> Result<()> {
        let listener = self.bind().await?;
        self.serve(listener).await
    }

    /// Serve connections on an already bound listener
    pub async fn serve(&self, listener: TcpListener) -> Result<()> {
        let mut shutdown_rx = self.shutdown.subscribe();
        if *shutdown_rx.borrow() {
            return Ok(());
        }

        loop {
            tokio::select! {
                result = listener.accept() => {
                    match result {
                        Ok((socket, addr)) => {
                            let handler = self.handler.clone();

                            tokio::spawn(async move {
                                if let Err(e) = handle_connection(socket, addr, handler).await {
                                    tracing::warn!("Connection error from {}: {}", addr, e);
                                }
                            });
                        }
                        Err(e) => {
                            tracing::error!("Accept error: {}", e);
                        }
                    }
                }
                _ = shutdown_rx.changed() => {
                    if *shutdown_rx.borrow() {
                        break;
                    }
                }
            }
        }

        tracing::info!("Network server stopped");
        Ok(())
    }

    /// Stop the server
    pub fn stop(&self) {
        self.shutdown.send_replace(true);
    }
}

/// Handle a single connection
async fn handle_connection(
    socket: TcpStream,
    peer_addr: SocketAddr,
    handler: MessageHandler,
) -> Result<()> {
    let (mut reader, mut writer) = socket.into_split();

    loop {
        match read_message(&mut reader).await {
            Ok(message) => {
                tracing::trace!("Received {} from {}", message.type_name(), peer_addr);
                if let Some(response) = handler(peer_addr.to_string(), message) {
                    write_message(&mut writer, &response).await?;
                }
            }
            Err(Error::Io(ref e)) if e.kind() == std::io::ErrorKind::UnexpectedEof => {
                // Connection closed
                break;
            }
            Err(e) => {
                tracing::warn!("Error reading message from {}: {}", peer_addr, e);
                break;
            }
        }
    }

    Ok(())
}
