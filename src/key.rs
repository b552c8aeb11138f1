//! Key material for tunnel endpoints
//!
//! Keys are opaque 32-byte values. They are compared by value, displayed
//! base64 encoded (the form used in config files) and written to the
//! control protocol as untyped lowercase hex.

use std::fmt;
use std::str::FromStr;

use base64::{engine::general_purpose::STANDARD as BASE64, Engine as _};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use x25519_dalek::{PublicKey, StaticSecret};

use crate::error::{Error, Result};

/// Length of every key in bytes
pub const KEY_LEN: usize = 32;

fn decode_key(s: &str) -> Result<[u8; KEY_LEN]> {
    let s = s.trim();
    let bytes = if s.len() == KEY_LEN * 2 {
        hex::decode(s).map_err(|e| Error::InvalidKey(e.to_string()))?
    } else {
        BASE64
            .decode(s)
            .map_err(|e| Error::InvalidKey(e.to_string()))?
    };
    if bytes.len() != KEY_LEN {
        return Err(Error::InvalidKey(format!(
            "expected {} bytes, got {}",
            KEY_LEN,
            bytes.len()
        )));
    }
    let mut key = [0u8; KEY_LEN];
    key.copy_from_slice(&bytes);
    Ok(key)
}

macro_rules! key_type {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Clone, Copy, PartialEq, Eq, Hash, Default, PartialOrd, Ord)]
        pub struct $name([u8; KEY_LEN]);

        impl $name {
            /// Wrap raw key bytes
            pub const fn from_bytes(bytes: [u8; KEY_LEN]) -> Self {
                Self(bytes)
            }

            /// Raw key bytes
            pub fn as_bytes(&self) -> &[u8; KEY_LEN] {
                &self.0
            }

            /// True for the all-zero key, which stands for "no key"
            pub fn is_zero(&self) -> bool {
                self.0 == [0u8; KEY_LEN]
            }

            /// Lowercase hex without any type prefix, as the control protocol expects
            pub fn untyped_hex(&self) -> String {
                hex::encode(self.0)
            }

            /// Base64 form used in configuration files
            pub fn to_base64(&self) -> String {
                BASE64.encode(self.0)
            }

            /// Abbreviated form for log lines
            pub fn short(&self) -> String {
                let mut s = self.to_base64();
                s.truncate(8);
                s
            }
        }

        impl FromStr for $name {
            type Err = Error;

            fn from_str(s: &str) -> Result<Self> {
                decode_key(s).map(Self)
            }
        }

        impl Serialize for $name {
            fn serialize<S: Serializer>(
                &self,
                serializer: S,
            ) -> std::result::Result<S::Ok, S::Error> {
                serializer.serialize_str(&self.to_base64())
            }
        }

        impl<'de> Deserialize<'de> for $name {
            fn deserialize<D: Deserializer<'de>>(
                deserializer: D,
            ) -> std::result::Result<Self, D::Error> {
                let s = String::deserialize(deserializer)?;
                s.parse().map_err(serde::de::Error::custom)
            }
        }
    };
}

key_type!(
    /// A node's public key, the identity peers are keyed by
    NodePublic
);

key_type!(
    /// A node's private key
    NodePrivate
);

impl fmt::Display for NodePublic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_base64())
    }
}

impl fmt::Debug for NodePublic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "NodePublic({})", self.short())
    }
}

// Private keys never end up in logs.
impl fmt::Debug for NodePrivate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_zero() {
            write!(f, "NodePrivate(zero)")
        } else {
            write!(f, "NodePrivate(..)")
        }
    }
}

impl NodePrivate {
    /// Generate a new random private key
    pub fn generate() -> Self {
        Self(StaticSecret::random_from_rng(rand::rngs::OsRng).to_bytes())
    }

    /// X25519 public key for this private key
    pub fn public_key(&self) -> NodePublic {
        NodePublic(PublicKey::from(&StaticSecret::from(self.0)).to_bytes())
    }

    /// Load a private key from a file (base64 or hex encoded)
    pub fn load(path: &std::path::Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        content.parse()
    }

    /// Save the private key to a file with owner-only permissions
    pub fn save(&self, path: &std::path::Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, self.to_base64())?;
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            std::fs::set_permissions(path, std::fs::Permissions::from_mode(0o600))?;
        }
        tracing::info!("Private key saved to {:?}", path);
        Ok(())
    }

    /// Load or generate a private key
    pub fn load_or_generate(path: &std::path::Path) -> Result<Self> {
        if path.exists() {
            tracing::info!("Loading private key from {:?}", path);
            Self::load(path)
        } else {
            tracing::info!("Generating new private key at {:?}", path);
            let key = Self::generate();
            key.save(path)?;
            Ok(key)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_hex_and_base64() {
        let key = NodePublic::from_bytes([7u8; KEY_LEN]);
        let from_hex: NodePublic = key.untyped_hex().parse().unwrap();
        let from_b64: NodePublic = key.to_base64().parse().unwrap();
        assert_eq!(from_hex, key);
        assert_eq!(from_b64, key);
    }

    #[test]
    fn test_untyped_hex_is_lowercase() {
        let key = NodePublic::from_bytes([0xAB; KEY_LEN]);
        assert_eq!(key.untyped_hex(), "ab".repeat(KEY_LEN));
    }

    #[test]
    fn test_reject_wrong_length() {
        assert!("AAAA".parse::<NodePublic>().is_err());
        assert!("not a key".parse::<NodePrivate>().is_err());
    }

    #[test]
    fn test_private_key_debug_is_redacted() {
        let key = NodePrivate::from_bytes([1u8; KEY_LEN]);
        assert_eq!(format!("{:?}", key), "NodePrivate(..)");
        assert!(NodePrivate::default().is_zero());
    }

    #[test]
    fn test_save_and_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("keys").join("private.key");
        let key = NodePrivate::load_or_generate(&path).unwrap();
        let again = NodePrivate::load_or_generate(&path).unwrap();
        assert_eq!(key, again);
        assert!(!key.is_zero());
    }

    #[test]
    fn test_public_key_is_stable() {
        let key = NodePrivate::generate();
        assert_eq!(key.public_key(), key.public_key());
        assert!(!key.public_key().is_zero());
        assert_ne!(key.public_key(), NodePrivate::generate().public_key());
    }
}
