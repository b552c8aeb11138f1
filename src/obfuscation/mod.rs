//! Obfuscation Parameter Model
//!
//! Holds the tunable knobs of the obfuscation layer together with their
//! defaulting, validation and rendering rules:
//!
//! - `jc`, `jmin`, `jmax`: junk packets sent ahead of a handshake
//! - `s1..s4`: random prefix lengths per message class (all-or-none on `s1`)
//! - `h1..h4`: header identifier ranges per message class (all-or-none on `h1`)
//! - `i1..i5`: signature packets (chain skipped entirely when `i1` is empty)
//!
//! An all-zero [`ObfuscationParams`] is standard WireGuard behaviour.

mod params;
mod overrides;
pub mod validate;
pub mod input;
pub mod generate;

pub use params::{resolve, HeaderRange, ObfuscationParams, ResolvedParams, Source, Unset};
pub use overrides::Overrides;
pub use validate::{Finding, FeatureSummary, Severity};
pub use input::ParamInput;

use thiserror::Error;

/// Header identifiers used when no header range is configured:
/// init, response, cookie and transport messages.
pub const STANDARD_HEADER_TYPES: [u32; 4] = [1, 2, 3, 4];

/// Recommended ceiling for the junk packet count
pub const RECOMMENDED_MAX_JC: u16 = 10;

/// Recommended junk packet size bounds
pub const RECOMMENDED_JUNK_SIZE: std::ops::RangeInclusive<u16> = 64..=1024;

/// Recommended ceiling for prefix lengths
pub const RECOMMENDED_MAX_PREFIX: u16 = 64;

/// Header values below this are easy to fingerprint
pub const WEAK_HEADER_THRESHOLD: u32 = 1_000_000;

/// Hard invariant violations rejected when building parameters
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ParamsError {
    #[error("jmin ({jmin}) is greater than jmax ({jmax})")]
    JunkSizeOrder { jmin: u16, jmax: u16 },

    #[error("h{field} min ({min}) is greater than max ({max})")]
    HeaderOrder { field: usize, min: u32, max: u32 },

    #[error("s{field} is set but s1 is 0; prefix lengths are all-or-none")]
    PrefixChain { field: usize },

    #[error("h{field} is set but h1 is 0; header fields are all-or-none")]
    HeaderChain { field: usize },

    #[error("i{field} is set but i1 is empty; signature packets need i1")]
    SignatureChain { field: usize },
}
