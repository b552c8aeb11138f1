//! WolfMask - Obfuscation Layer Configuration for WireGuard-compatible Tunnels
//!
//! WolfMask manages the obfuscation parameters (junk packets, packet prefixes,
//! header identifiers and signature packets) of a userspace tunnel endpoint
//! and keeps them consistent across the nodes of a mesh.
//!
//! # Architecture
//!
//! A node keeps its desired device configuration in a preferences file. On
//! start the daemon diffs that snapshot against the endpoint's previous one
//! and writes the difference to the endpoint's UAPI socket. Nodes answer
//! parameter requests from each other over a small framed TCP protocol, which
//! lets an operator discover the configurations used elsewhere in the mesh
//! and adopt one.
//!
//! # Features
//!
//! - UAPI directive generation with strict field order and sticky errors
//! - Parameter resolution: stored value, then override, then default
//! - Advisory validation and random parameter generation
//! - Bounded-concurrency peer discovery with per-peer timeouts
//! - Interactive selection and adoption of a peer's parameters

pub mod config;
pub mod device;
pub mod error;
pub mod key;
pub mod network;
pub mod obfuscation;
pub mod prefs;
pub mod prompt;
pub mod setup;
pub mod sync;
pub mod uapi;

pub use config::WolfMaskConfig;
pub use error::{Error, Result};

/// Re-export commonly used types
pub mod prelude {
    pub use crate::config::WolfMaskConfig;
    pub use crate::device::{DeviceConfig, PeerConfig};
    pub use crate::error::{Error, Result};
    pub use crate::key::{NodePrivate, NodePublic};
    pub use crate::obfuscation::{HeaderRange, ObfuscationParams, Overrides};
    pub use crate::prefs::{FilePrefsStore, PrefsEditor};
    pub use crate::sync::{discover, PeerInfo, PeerParamsSource, SyncSession};
    pub use crate::uapi::{write_uapi, UapiSocket};
}
