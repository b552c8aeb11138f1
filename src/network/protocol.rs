//! Peer Protocol
//!
//! Messages exchanged between nodes when one asks another for its
//! obfuscation parameters.

use serde::{Deserialize, Serialize};

use crate::key::NodePublic;
use crate::obfuscation::{HeaderRange, ObfuscationParams};

/// Protocol messages for node communication
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Message {
    /// Ask a peer for its stored obfuscation parameters
    ObfuscationRequest { from: NodePublic },

    /// Parameters of the answering node
    ObfuscationResponse { params: WireParams },

    /// Request could not be served
    Error { message: String },
}

impl Message {
    /// Get message type name for logging
    pub fn type_name(&self) -> &'static str {
        match self {
            Message::ObfuscationRequest { .. } => "ObfuscationRequest",
            Message::ObfuscationResponse { .. } => "ObfuscationResponse",
            Message::Error { .. } => "Error",
        }
    }

    /// Serialize message to bytes
    pub fn serialize(&self) -> Result<Vec<u8>, bincode::Error> {
        bincode::serialize(self)
    }

    /// Deserialize message from bytes
    pub fn deserialize(data: &[u8]) -> Result<Self, bincode::Error> {
        bincode::deserialize(data)
    }
}

/// Fixed-layout parameters for the binary wire format. Every field is
/// always present, unlike the JSON and TOML forms.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct WireParams {
    pub junk: [u16; 3],
    pub prefixes: [u16; 4],
    pub headers: [(u32, u32); 4],
    pub signatures: [String; 5],
}

impl From<&ObfuscationParams> for WireParams {
    fn from(p: &ObfuscationParams) -> Self {
        Self {
            junk: [p.jc, p.jmin, p.jmax],
            prefixes: p.prefixes(),
            headers: p.headers().map(|h| (h.min, h.max)),
            signatures: p.signatures().map(str::to_string),
        }
    }
}

impl From<WireParams> for ObfuscationParams {
    fn from(w: WireParams) -> Self {
        let [jc, jmin, jmax] = w.junk;
        let [i1, i2, i3, i4, i5] = w.signatures;
        let mut params = ObfuscationParams {
            jc,
            jmin,
            jmax,
            i1,
            i2,
            i3,
            i4,
            i5,
            ..Default::default()
        };
        params.set_prefixes(w.prefixes);
        params.set_headers(w.headers.map(|(min, max)| HeaderRange::new(min, max)));
        params
    }
}

/// Frame header for network messages
#[derive(Debug, Clone, Copy)]
pub struct FrameHeader {
    /// Message length
    pub length: u32,
    /// Message checksum
    pub checksum: u32,
}

impl FrameHeader {
    /// Header size in bytes
    pub const SIZE: usize = 8;

    /// Largest body accepted from a peer
    pub const MAX_BODY: u32 = 64 * 1024;

    /// Create a new frame header
    pub fn new(data: &[u8]) -> Self {
        Self {
            length: data.len() as u32,
            checksum: crc32fast::hash(data),
        }
    }

    /// Serialize header to bytes
    pub fn to_bytes(&self) -> [u8; Self::SIZE] {
        let mut bytes = [0u8; Self::SIZE];
        bytes[0..4].copy_from_slice(&self.length.to_le_bytes());
        bytes[4..8].copy_from_slice(&self.checksum.to_le_bytes());
        bytes
    }

    /// Deserialize header from bytes
    pub fn from_bytes(bytes: &[u8; Self::SIZE]) -> Self {
        let [l0, l1, l2, l3, c0, c1, c2, c3] = *bytes;
        Self {
            length: u32::from_le_bytes([l0, l1, l2, l3]),
            checksum: u32::from_le_bytes([c0, c1, c2, c3]),
        }
    }
}
