//! Device and peer configuration snapshots
//!
//! A [`DeviceConfig`] is an immutable snapshot of what a tunnel endpoint
//! should look like. Every desired-state transition builds a new one; the
//! UAPI writer diffs two snapshots.

use std::collections::HashSet;

use ipnet::IpNet;
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::key::{NodePrivate, NodePublic};
use crate::obfuscation::ObfuscationParams;

/// One remote peer known to this endpoint
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PeerConfig {
    /// Peer identity
    pub public_key: NodePublic,

    /// Prefixes routed to this peer, transmitted in this order
    #[serde(default)]
    pub allowed_ips: Vec<IpNet>,

    /// Keepalive interval in seconds, 0 disables it
    #[serde(default)]
    pub persistent_keepalive: u16,

    /// Last endpoint identity known to the device; only used to spot drift
    #[serde(default)]
    pub endpoint_key: NodePublic,
}

impl PeerConfig {
    /// New peer whose endpoint identity is its own public key
    pub fn new(public_key: NodePublic) -> Self {
        Self {
            public_key,
            allowed_ips: Vec::new(),
            persistent_keepalive: 0,
            endpoint_key: public_key,
        }
    }

    pub fn with_allowed_ips(mut self, ips: impl IntoIterator<Item = IpNet>) -> Self {
        self.allowed_ips = ips.into_iter().collect();
        self
    }

    pub fn with_keepalive(mut self, seconds: u16) -> Self {
        self.persistent_keepalive = seconds;
        self
    }
}

/// Set equality of two prefix lists; order and repeats are ignored
pub fn allowed_ips_equal(x: &[IpNet], y: &[IpNet]) -> bool {
    if x == y {
        return true;
    }
    let xs: HashSet<&IpNet> = x.iter().collect();
    let ys: HashSet<&IpNet> = y.iter().collect();
    xs == ys
}

/// Configuration of one tunnel endpoint
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceConfig {
    /// Endpoint private key; the zero key means "nothing configured yet"
    #[serde(default)]
    pub private_key: NodePrivate,

    /// Peers, unique by public key
    #[serde(default)]
    pub peers: Vec<PeerConfig>,

    #[serde(default)]
    pub obfuscation: ObfuscationParams,
}

impl DeviceConfig {
    /// Build a device config, rejecting duplicate peers
    pub fn new(
        private_key: NodePrivate,
        peers: Vec<PeerConfig>,
        obfuscation: ObfuscationParams,
    ) -> Result<Self> {
        let config = Self { private_key, peers, obfuscation };
        config.check_unique_peers()?;
        Ok(config)
    }

    /// Verify that no public key appears twice
    pub fn check_unique_peers(&self) -> Result<()> {
        let mut seen = HashSet::with_capacity(self.peers.len());
        for peer in &self.peers {
            if !seen.insert(peer.public_key) {
                return Err(Error::DuplicatePeer(peer.public_key.to_string()));
            }
        }
        Ok(())
    }

    /// A copy of this config that differs only in its obfuscation parameters
    pub fn with_obfuscation(&self, obfuscation: ObfuscationParams) -> Self {
        Self {
            private_key: self.private_key,
            peers: self.peers.clone(),
            obfuscation,
        }
    }

    pub fn peer(&self, key: &NodePublic) -> Option<&PeerConfig> {
        self.peers.iter().find(|p| &p.public_key == key)
    }

    /// Load a device snapshot from TOML. Peers without an `endpoint_key`
    /// get their own public key.
    pub fn from_toml(content: &str) -> Result<Self> {
        let mut config: DeviceConfig = toml::from_str(content)?;
        config.check_unique_peers()?;
        for peer in &mut config.peers {
            if peer.endpoint_key.is_zero() {
                peer.endpoint_key = peer.public_key;
            }
        }
        Ok(config)
    }

    pub fn load(path: &std::path::Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml(&content)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn key(b: u8) -> NodePublic {
        NodePublic::from_bytes([b; 32])
    }

    fn net(s: &str) -> IpNet {
        s.parse().unwrap()
    }

    #[test]
    fn test_allowed_ips_equal_ignores_order() {
        let a = vec![net("10.0.0.1/32"), net("10.0.0.2/32")];
        let b = vec![net("10.0.0.2/32"), net("10.0.0.1/32")];
        let c = vec![net("10.0.0.1/32"), net("10.0.0.3/32")];
        assert!(allowed_ips_equal(&a, &b));
        assert!(!allowed_ips_equal(&a, &c));
        assert!(!allowed_ips_equal(&a, &a[..1]));
        assert!(allowed_ips_equal(&[], &[]));
    }

    #[test]
    fn test_allowed_ips_equal_is_set_equality() {
        let two = vec![net("10.0.0.1/32"), net("10.0.0.2/32")];
        let repeated = vec![net("10.0.0.1/32"), net("10.0.0.1/32")];
        assert!(!allowed_ips_equal(&two, &repeated));
        assert!(!allowed_ips_equal(&repeated, &two));
        assert!(allowed_ips_equal(&repeated, &two[..1]));
    }

    #[test]
    fn test_duplicate_peers_rejected() {
        let peers = vec![PeerConfig::new(key(1)), PeerConfig::new(key(1))];
        let err = DeviceConfig::new(NodePrivate::default(), peers, ObfuscationParams::default());
        assert!(matches!(err, Err(Error::DuplicatePeer(_))));
    }

    #[test]
    fn test_with_obfuscation_keeps_everything_else() {
        let device = DeviceConfig::new(
            NodePrivate::from_bytes([9; 32]),
            vec![PeerConfig::new(key(1)).with_keepalive(25)],
            ObfuscationParams::default(),
        )
        .unwrap();
        let params = ObfuscationParams { jc: 3, ..Default::default() };
        let next = device.with_obfuscation(params.clone());
        assert_eq!(next.private_key, device.private_key);
        assert_eq!(next.peers, device.peers);
        assert_eq!(next.obfuscation, params);
    }

    #[test]
    fn test_from_toml() {
        let toml = format!(
            r#"
private_key = "{}"

[obfuscation]
jc = 4
h1 = {{ min = 100, max = 200 }}

[[peers]]
public_key = "{}"
allowed_ips = ["10.0.0.1/32", "fd00::1/128"]
persistent_keepalive = 25
"#,
            NodePrivate::from_bytes([2; 32]).to_base64(),
            key(1).to_base64(),
        );
        let device = DeviceConfig::from_toml(&toml).unwrap();
        assert_eq!(device.obfuscation.jc, 4);
        assert_eq!(device.peers[0].allowed_ips.len(), 2);
        assert_eq!(device.peers[0].persistent_keepalive, 25);
        assert_eq!(device.peers[0].endpoint_key, key(1));
    }
}
