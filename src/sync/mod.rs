//! Peer obfuscation discovery and sync
//!
//! Every reachable peer is asked for its obfuscation parameters with a
//! bounded number of requests in flight. Results are reported in the order
//! the peers were given, whatever order the answers arrive in. The operator
//! can then adopt one peer's parameters through a [`SyncSession`].

mod discovery;
mod session;

pub use discovery::{
    discover, discover_until, discover_with, DiscoveryOptions, DiscoveryReport, DiscoveryStats,
    PeerOutcome, MAX_CONCURRENT, PER_PEER_TIMEOUT,
};
pub use session::{SyncOutcome, SyncSession};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::key::NodePublic;
use crate::obfuscation::ObfuscationParams;

/// A reachable peer
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PeerInfo {
    pub public_key: NodePublic,
    #[serde(default)]
    pub name: String,
    /// Where the peer answers parameter requests, e.g. `100.64.0.2:7655`
    pub address: String,
}

impl PeerInfo {
    /// Name for operator output, falling back to the short key
    pub fn label(&self) -> String {
        if self.name.is_empty() {
            self.public_key.short()
        } else {
            self.name.clone()
        }
    }
}

/// Fetches a peer's obfuscation parameters
#[async_trait]
pub trait PeerParamsSource: Send + Sync {
    async fn request_params(&self, peer: &PeerInfo) -> Result<ObfuscationParams>;
}

/// Non-standard parameters reported by one peer
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PeerObfuscation {
    pub peer: PeerInfo,
    pub params: ObfuscationParams,
}
