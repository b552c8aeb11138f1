//! Network Client
//!
//! TCP client for asking other nodes for their parameters.

use std::time::Duration;

use async_trait::async_trait;
use tokio::net::TcpStream;
use tokio::time::timeout;

use super::{read_message, write_message, Message};
use crate::error::{Error, Result};
use crate::key::NodePublic;
use crate::obfuscation::ObfuscationParams;
use crate::sync::{PeerInfo, PeerParamsSource};

/// Network client for connecting to peer nodes
#[derive(Debug, Clone)]
pub struct NetworkClient {
    /// Identity sent with every request
    local: NodePublic,
    /// Connection timeout
    connect_timeout: Duration,
    /// Request timeout
    request_timeout: Duration,
}

impl NetworkClient {
    /// Create a new network client
    pub fn new(local: NodePublic, connect_timeout: Duration, request_timeout: Duration) -> Self {
        Self {
            local,
            connect_timeout,
            request_timeout,
        }
    }

    /// Send a message to a peer and wait for response
    pub async fn send(&self, address: &str, message: Message) -> Result<Message> {
        let result = timeout(self.request_timeout, self.send_inner(address, message)).await;

        match result {
            Ok(inner_result) => inner_result,
            Err(_) => Err(Error::ConnectionTimeout(address.to_string())),
        }
    }

    /// One connection per request
    async fn send_inner(&self, address: &str, message: Message) -> Result<Message> {
        let stream = self.connect(address).await?;
        let (mut reader, mut writer) = stream.into_split();

        write_message(&mut writer, &message).await?;
        read_message(&mut reader).await
    }

    /// Connect to an address
    async fn connect(&self, address: &str) -> Result<TcpStream> {
        let result = timeout(self.connect_timeout, TcpStream::connect(address)).await;

        match result {
            Ok(Ok(stream)) => {
                stream.set_nodelay(true)?;
                Ok(stream)
            }
            Ok(Err(e)) => Err(Error::ConnectionFailed {
                address: address.to_string(),
                reason: e.to_string(),
            }),
            Err(_) => Err(Error::ConnectionTimeout(address.to_string())),
        }
    }
}

#[async_trait]
impl PeerParamsSource for NetworkClient {
    async fn request_params(&self, peer: &PeerInfo) -> Result<ObfuscationParams> {
        let request = Message::ObfuscationRequest { from: self.local };
        match self.send(&peer.address, request).await? {
            Message::ObfuscationResponse { params } => Ok(params.into()),
            Message::Error { message } => Err(Error::PeerRequest {
                peer: peer.label(),
                reason: message,
            }),
            other => {
                tracing::debug!("{} answered with {}", peer.label(), other.type_name());
                Err(Error::UnexpectedResponse(peer.label()))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::network::{params_handler, MessageHandler, NetworkServer};
    use crate::obfuscation::HeaderRange;
    use std::sync::{Arc, RwLock};

    fn client() -> NetworkClient {
        NetworkClient::new(
            NodePublic::from_bytes([9; 32]),
            Duration::from_secs(1),
            Duration::from_secs(2),
        )
    }

    async fn spawn_server(handler: MessageHandler) -> (Arc<NetworkServer>, String) {
        let server = Arc::new(NetworkServer::new("127.0.0.1:0".to_string(), handler));
        let listener = server.bind().await.unwrap();
        let address = listener.local_addr().unwrap().to_string();
        let running = server.clone();
        tokio::spawn(async move { running.serve(listener).await });
        (server, address)
    }

    fn peer(address: String) -> PeerInfo {
        PeerInfo {
            public_key: NodePublic::from_bytes([1; 32]),
            name: "alpha".into(),
            address,
        }
    }

    #[tokio::test]
    async fn test_request_params() {
        let params = ObfuscationParams {
            jc: 4,
            jmin: 64,
            jmax: 96,
            h1: HeaderRange::new(1_000_000, 2_000_000),
            h2: HeaderRange::single(3_000_000),
            h3: HeaderRange::single(4_000_000),
            h4: HeaderRange::single(5_000_000),
            ..Default::default()
        };
        let handler = params_handler(Arc::new(RwLock::new(params.clone())));
        let (server, address) = spawn_server(handler).await;

        let fetched = client().request_params(&peer(address)).await.unwrap();
        assert_eq!(fetched, params);
        server.stop();
    }

    #[tokio::test]
    async fn test_error_reply() {
        let handler: MessageHandler = Arc::new(|_: String, _: Message| {
            Some(Message::Error { message: "not serving".into() })
        });
        let (server, address) = spawn_server(handler).await;

        let err = client().request_params(&peer(address)).await.unwrap_err();
        assert!(matches!(err, Error::PeerRequest { ref reason, .. } if reason == "not serving"));
        assert!(err.is_peer_scoped());
        server.stop();
    }

    #[tokio::test]
    async fn test_connection_failure() {
        let client = NetworkClient::new(
            NodePublic::default(),
            Duration::from_millis(100),
            Duration::from_millis(500),
        );

        // Nothing listens on port 1
        let result = client.request_params(&peer("127.0.0.1:1".into())).await;
        assert!(result.is_err());
        assert!(result.unwrap_err().is_peer_scoped());
    }
}
