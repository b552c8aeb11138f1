//! WolfMask Configuration
//!
//! Node configuration for the `wolfmask` daemon and the `wolfmaskctl`
//! operator tool, loaded from TOML.

use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::PathBuf;
use std::time::Duration;

use crate::key::{NodePrivate, NodePublic};
use crate::obfuscation::Overrides;
use crate::sync::{DiscoveryOptions, PeerInfo};

/// Main WolfMask configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct WolfMaskConfig {
    /// Node-specific configuration
    #[serde(default)]
    pub node: NodeConfig,

    /// Tunnel endpoint configuration
    #[serde(default)]
    pub device: DeviceSection,

    /// Peer discovery configuration
    #[serde(default)]
    pub discovery: DiscoveryConfig,

    /// Values used for obfuscation fields the stored preferences leave unset
    #[serde(default)]
    pub overrides: Overrides,

    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Node-specific configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NodeConfig {
    /// Human-readable node name
    #[serde(default = "default_node_name")]
    pub name: String,

    /// Directory for the key and preferences files
    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,

    /// Private key file (defaults to `<data_dir>/node.key`)
    #[serde(default)]
    pub private_key_file: Option<PathBuf>,

    /// Address to answer parameter requests from peers
    #[serde(default = "default_listen_address")]
    pub listen_address: String,
}

/// Tunnel endpoint configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeviceSection {
    /// UAPI control socket of the running endpoint
    #[serde(default = "default_uapi_socket")]
    pub uapi_socket: PathBuf,

    /// Stored preferences (defaults to `<data_dir>/prefs.toml`)
    #[serde(default)]
    pub prefs_file: Option<PathBuf>,
}

/// Peer discovery configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DiscoveryConfig {
    /// Requests in flight at once
    #[serde(default = "default_max_concurrent")]
    pub max_concurrent: usize,

    /// Time allowed for one peer to answer, in milliseconds
    #[serde(default = "default_per_peer_timeout_ms")]
    pub per_peer_timeout_ms: u64,

    /// TCP connect timeout in milliseconds
    #[serde(default = "default_connect_timeout_ms")]
    pub connect_timeout_ms: u64,

    /// Online peers to query
    #[serde(default)]
    pub peers: Vec<PeerInfo>,
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Log format (json, pretty)
    #[serde(default = "default_log_format")]
    pub format: String,
}

// Default value functions
fn default_node_name() -> String {
    "wolfmask".to_string()
}

fn default_data_dir() -> PathBuf {
    PathBuf::from("/var/lib/wolfmask")
}

fn default_listen_address() -> String {
    "0.0.0.0:7655".to_string()
}

fn default_uapi_socket() -> PathBuf {
    PathBuf::from("/var/run/wireguard/wm0.sock")
}

fn default_max_concurrent() -> usize {
    crate::sync::MAX_CONCURRENT
}

fn default_per_peer_timeout_ms() -> u64 {
    crate::sync::PER_PEER_TIMEOUT.as_millis() as u64
}

fn default_connect_timeout_ms() -> u64 {
    2000
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_format() -> String {
    "pretty".to_string()
}

impl Default for NodeConfig {
    fn default() -> Self {
        Self {
            name: default_node_name(),
            data_dir: default_data_dir(),
            private_key_file: None,
            listen_address: default_listen_address(),
        }
    }
}

impl Default for DeviceSection {
    fn default() -> Self {
        Self {
            uapi_socket: default_uapi_socket(),
            prefs_file: None,
        }
    }
}

impl Default for DiscoveryConfig {
    fn default() -> Self {
        Self {
            max_concurrent: default_max_concurrent(),
            per_peer_timeout_ms: default_per_peer_timeout_ms(),
            connect_timeout_ms: default_connect_timeout_ms(),
            peers: Vec::new(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: default_log_format(),
        }
    }
}

impl WolfMaskConfig {
    /// Load configuration from a TOML file
    pub fn from_file(path: &std::path::Path) -> crate::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_str(&content)
    }

    /// Parse configuration from a TOML string
    pub fn from_str(content: &str) -> crate::Result<Self> {
        let config: WolfMaskConfig = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Validate configuration
    pub fn validate(&self) -> crate::Result<()> {
        if self.node.listen_address.is_empty() {
            return Err(crate::Error::Config("node.listen_address cannot be empty".into()));
        }

        if self.discovery.max_concurrent == 0 {
            return Err(crate::Error::Config("discovery.max_concurrent must be at least 1".into()));
        }

        if self.discovery.per_peer_timeout_ms == 0 {
            return Err(crate::Error::Config("discovery.per_peer_timeout_ms cannot be 0".into()));
        }

        let mut seen = HashSet::new();
        for peer in &self.discovery.peers {
            if peer.address.is_empty() {
                return Err(crate::Error::Config(format!(
                    "discovery peer {} has no address",
                    peer.label()
                )));
            }
            if !seen.insert(peer.public_key) {
                return Err(crate::Error::Config(format!(
                    "discovery peer {} is listed twice",
                    peer.public_key
                )));
            }
        }

        Ok(())
    }

    /// Private key file path
    pub fn private_key_file(&self) -> PathBuf {
        self.node
            .private_key_file
            .clone()
            .unwrap_or_else(|| self.node.data_dir.join("node.key"))
    }

    /// Preferences file path
    pub fn prefs_file(&self) -> PathBuf {
        self.device
            .prefs_file
            .clone()
            .unwrap_or_else(|| self.node.data_dir.join("prefs.toml"))
    }

    /// Discovery limits
    pub fn discovery_options(&self) -> DiscoveryOptions {
        DiscoveryOptions {
            max_concurrent: self.discovery.max_concurrent,
            per_peer_timeout: Duration::from_millis(self.discovery.per_peer_timeout_ms),
        }
    }

    /// Identity sent with discovery requests, derived from the key file.
    /// The zero key when the file cannot be read.
    pub fn local_public_key(&self) -> NodePublic {
        let path = self.private_key_file();
        match NodePrivate::load(&path) {
            Ok(key) => key.public_key(),
            Err(e) => {
                tracing::debug!("No local identity from {}: {}", path.display(), e);
                NodePublic::default()
            }
        }
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_millis(self.discovery.connect_timeout_ms)
    }

    /// Overrides in effect: environment variables first, then `[overrides]`
    pub fn effective_overrides(&self) -> Overrides {
        Overrides::from_env().fill_from(&self.overrides)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::obfuscation::HeaderRange;

    #[test]
    fn test_parse_config() {
        let toml = format!(
            r#"
[node]
name = "edge-1"
data_dir = "/tmp/wolfmask"
listen_address = "0.0.0.0:7655"

[device]
uapi_socket = "/var/run/wireguard/wm0.sock"

[discovery]
per_peer_timeout_ms = 2500

[[discovery.peers]]
public_key = "{}"
name = "edge-2"
address = "100.64.0.2:7655"

[overrides]
jc = 4
h1 = 3847291638
"#,
            NodePublic::from_bytes([2; 32]).to_base64()
        );

        let config = WolfMaskConfig::from_str(&toml).unwrap();
        assert_eq!(config.node.name, "edge-1");
        assert_eq!(config.discovery.peers.len(), 1);
        assert_eq!(config.discovery.max_concurrent, 10);
        assert_eq!(config.discovery_options().per_peer_timeout, Duration::from_millis(2500));
        assert_eq!(config.prefs_file(), PathBuf::from("/tmp/wolfmask/prefs.toml"));
        assert_eq!(config.private_key_file(), PathBuf::from("/tmp/wolfmask/node.key"));
        assert_eq!(config.overrides.jc, Some(4));
        assert_eq!(config.overrides.h1, Some(HeaderRange::single(3847291638)));
    }

    #[test]
    fn test_empty_config_uses_defaults() {
        let config = WolfMaskConfig::from_str("").unwrap();
        assert_eq!(config.node.listen_address, "0.0.0.0:7655");
        assert_eq!(config.discovery.per_peer_timeout_ms, 5000);
        assert_eq!(config.logging.level, "info");
        assert!(config.overrides.is_empty());
    }

    #[test]
    fn test_duplicate_peer_rejected() {
        let key = NodePublic::from_bytes([3; 32]).to_base64();
        let toml = format!(
            r#"
[[discovery.peers]]
public_key = "{key}"
address = "a:1"

[[discovery.peers]]
public_key = "{key}"
address = "b:1"
"#
        );
        assert!(WolfMaskConfig::from_str(&toml).is_err());
    }

    #[test]
    fn test_default_config_serializes() {
        let text = toml::to_string_pretty(&WolfMaskConfig::default()).unwrap();
        let parsed = WolfMaskConfig::from_str(&text).unwrap();
        assert_eq!(parsed.node.name, "wolfmask");
    }
}
