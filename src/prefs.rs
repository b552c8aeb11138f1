//! Preferences store
//!
//! The operator tools never touch a running endpoint directly; they edit the
//! stored preferences and the daemon picks them up on its next start.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::device::{DeviceConfig, PeerConfig};
use crate::error::Result;
use crate::key::NodePrivate;
use crate::obfuscation::ObfuscationParams;

/// Edit operation on the node's stored device configuration
pub trait PrefsEditor: Send + Sync {
    /// Current stored configuration
    fn load(&self) -> Result<DeviceConfig>;

    /// Persist a new desired configuration
    fn apply(&self, desired: &DeviceConfig) -> Result<()>;

    /// Replace only the obfuscation parameters. The parameters must pass
    /// [`ObfuscationParams::validated`]; the new configuration is returned.
    fn edit_obfuscation(&self, params: ObfuscationParams) -> Result<DeviceConfig> {
        let params = params.validated()?;
        let desired = self.load()?.with_obfuscation(params);
        self.apply(&desired)?;
        Ok(desired)
    }
}

/// On-disk layout; the private key lives in its own file
#[derive(Debug, Default, Serialize, Deserialize)]
struct StoredPrefs {
    #[serde(default)]
    obfuscation: ObfuscationParams,
    #[serde(default)]
    peers: Vec<PeerConfig>,
}

/// TOML-backed preferences
#[derive(Debug, Clone)]
pub struct FilePrefsStore {
    path: PathBuf,
    private_key: NodePrivate,
}

impl FilePrefsStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            private_key: NodePrivate::default(),
        }
    }

    /// Key reported in loaded configurations
    pub fn with_private_key(mut self, key: NodePrivate) -> Self {
        self.private_key = key;
        self
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl PrefsEditor for FilePrefsStore {
    fn load(&self) -> Result<DeviceConfig> {
        let stored: StoredPrefs = match std::fs::read_to_string(&self.path) {
            Ok(content) => toml::from_str(&content)?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::debug!("No preferences at {}, using defaults", self.path.display());
                StoredPrefs::default()
            }
            Err(e) => return Err(e.into()),
        };
        let mut config = DeviceConfig::new(self.private_key, stored.peers, stored.obfuscation)?;
        for peer in &mut config.peers {
            if peer.endpoint_key.is_zero() {
                peer.endpoint_key = peer.public_key;
            }
        }
        Ok(config)
    }

    fn apply(&self, desired: &DeviceConfig) -> Result<()> {
        desired.check_unique_peers()?;
        let stored = StoredPrefs {
            obfuscation: desired.obfuscation.clone().validated()?,
            peers: desired.peers.clone(),
        };
        let content = toml::to_string_pretty(&stored)?;

        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        let tmp = self.path.with_extension("toml.tmp");
        std::fs::write(&tmp, content)?;
        std::fs::rename(&tmp, &self.path)?;

        tracing::info!(
            "Saved preferences to {} ({})",
            self.path.display(),
            desired.obfuscation.compact()
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;
    use crate::key::NodePublic;
    use crate::obfuscation::HeaderRange;

    #[test]
    fn test_missing_file_is_standard() {
        let dir = tempfile::tempdir().unwrap();
        let store = FilePrefsStore::new(dir.path().join("prefs.toml"));
        let config = store.load().unwrap();
        assert!(config.obfuscation.is_standard());
        assert!(config.peers.is_empty());
    }

    #[test]
    fn test_edit_obfuscation_keeps_peers() {
        let dir = tempfile::tempdir().unwrap();
        let key = NodePrivate::from_bytes([3; 32]);
        let store = FilePrefsStore::new(dir.path().join("state/prefs.toml")).with_private_key(key);

        let peer = PeerConfig::new(NodePublic::from_bytes([1; 32]))
            .with_allowed_ips(["100.64.0.1/32".parse().unwrap()])
            .with_keepalive(25);
        let initial =
            DeviceConfig::new(key, vec![peer.clone()], ObfuscationParams::default()).unwrap();
        store.apply(&initial).unwrap();

        let params = ObfuscationParams {
            jc: 4,
            jmin: 64,
            jmax: 96,
            h1: HeaderRange::new(100, 200),
            ..Default::default()
        };
        let updated = store.edit_obfuscation(params.clone()).unwrap();
        assert_eq!(updated.peers, vec![peer]);
        assert_eq!(updated.private_key, key);

        let reloaded = store.load().unwrap();
        assert_eq!(reloaded, updated);
        assert_eq!(reloaded.obfuscation, params);

        let content = std::fs::read_to_string(store.path()).unwrap();
        assert!(!content.contains("private_key"));
    }

    #[test]
    fn test_invalid_params_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let store = FilePrefsStore::new(dir.path().join("prefs.toml"));
        let inverted = ObfuscationParams { jmin: 200, jmax: 100, ..Default::default() };
        let result = store.edit_obfuscation(inverted);
        assert!(matches!(result, Err(Error::Params(_))));
        assert!(!store.path().exists());
    }
}
