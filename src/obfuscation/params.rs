//! Obfuscation parameter value types

use std::fmt;

use serde::{Deserialize, Deserializer, Serialize, Serializer};

use super::overrides::Overrides;
use super::{ParamsError, STANDARD_HEADER_TYPES};

/// Randomized value space for one protocol-class identifier.
///
/// Collapses to a single value when `min == max`. `{0, 0}` means unset.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct HeaderRange {
    pub min: u32,
    pub max: u32,
}

impl HeaderRange {
    /// A range holding exactly one value
    pub const fn single(value: u32) -> Self {
        Self { min: value, max: value }
    }

    pub const fn new(min: u32, max: u32) -> Self {
        Self { min, max }
    }

    pub fn is_zero(&self) -> bool {
        self.min == 0 && self.max == 0
    }

    pub fn is_single(&self) -> bool {
        self.min == self.max
    }

    /// True when both ranges share at least one value
    pub fn overlaps(&self, other: &HeaderRange) -> bool {
        self.min <= other.max && other.min <= self.max
    }
}

/// Control-protocol form: bare integer for a single value, `min-max` otherwise
impl fmt::Display for HeaderRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_single() {
            write!(f, "{}", self.min)
        } else {
            write!(f, "{}-{}", self.min, self.max)
        }
    }
}

#[derive(Serialize, Deserialize)]
struct RangeObject {
    min: u32,
    max: u32,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum RangeRepr {
    Single(u32),
    Range(RangeObject),
}

impl Serialize for HeaderRange {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        if self.is_single() {
            serializer.serialize_u32(self.min)
        } else {
            RangeObject { min: self.min, max: self.max }.serialize(serializer)
        }
    }
}

impl<'de> Deserialize<'de> for HeaderRange {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        Ok(match RangeRepr::deserialize(deserializer)? {
            RangeRepr::Single(v) => HeaderRange::single(v),
            RangeRepr::Range(r) => HeaderRange::new(r.min, r.max),
        })
    }
}

fn is_zero_u16(v: &u16) -> bool {
    *v == 0
}

fn is_zero_range(v: &HeaderRange) -> bool {
    v.is_zero()
}

/// The obfuscation knob set attached to a device.
///
/// All-zero is exactly standard tunnel behaviour. Peers must agree on the
/// header (`h1..h4`) and prefix (`s1..s4`) fields; junk and signature
/// settings may differ per node.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct ObfuscationParams {
    /// Junk packet count
    #[serde(default, skip_serializing_if = "is_zero_u16")]
    pub jc: u16,
    /// Minimum junk packet size
    #[serde(default, skip_serializing_if = "is_zero_u16")]
    pub jmin: u16,
    /// Maximum junk packet size
    #[serde(default, skip_serializing_if = "is_zero_u16")]
    pub jmax: u16,

    /// Init packet prefix length
    #[serde(default, skip_serializing_if = "is_zero_u16")]
    pub s1: u16,
    /// Response packet prefix length
    #[serde(default, skip_serializing_if = "is_zero_u16")]
    pub s2: u16,
    /// Cookie packet prefix length
    #[serde(default, skip_serializing_if = "is_zero_u16")]
    pub s3: u16,
    /// Transport packet prefix length
    #[serde(default, skip_serializing_if = "is_zero_u16")]
    pub s4: u16,

    /// Signature packets. `i2..i5` only count when `i1` is set.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub i1: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub i2: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub i3: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub i4: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub i5: String,

    /// Header ranges for init, response, cookie and transport messages
    #[serde(default, skip_serializing_if = "is_zero_range")]
    pub h1: HeaderRange,
    #[serde(default, skip_serializing_if = "is_zero_range")]
    pub h2: HeaderRange,
    #[serde(default, skip_serializing_if = "is_zero_range")]
    pub h3: HeaderRange,
    #[serde(default, skip_serializing_if = "is_zero_range")]
    pub h4: HeaderRange,
}

/// Where a resolved value came from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Source {
    /// Non-zero value stored on the device
    Stored,
    /// Process-wide override
    Override,
    /// Documented standard default
    Default,
}

/// Values with a distinguished "unset" zero
pub trait Unset {
    fn is_unset(&self) -> bool;
}

impl Unset for u16 {
    fn is_unset(&self) -> bool {
        *self == 0
    }
}

impl Unset for HeaderRange {
    fn is_unset(&self) -> bool {
        self.is_zero()
    }
}

impl Unset for String {
    fn is_unset(&self) -> bool {
        self.is_empty()
    }
}

/// Resolve one field: a set stored value wins, then a set override, then the default.
pub fn resolve<T: Unset + Clone>(
    stored: &T,
    override_value: Option<&T>,
    default: T,
) -> (T, Source) {
    if !stored.is_unset() {
        return (stored.clone(), Source::Stored);
    }
    match override_value {
        Some(v) if !v.is_unset() => (v.clone(), Source::Override),
        _ => (default, Source::Default),
    }
}

impl ObfuscationParams {
    /// Build parameters, rejecting values that break the all-or-none and
    /// ordering invariants.
    pub fn validated(self) -> Result<Self, ParamsError> {
        if self.jmin > 0 && self.jmax > 0 && self.jmin > self.jmax {
            return Err(ParamsError::JunkSizeOrder { jmin: self.jmin, jmax: self.jmax });
        }

        let prefixes = self.prefixes();
        if prefixes[0] == 0 {
            if let Some(i) = prefixes.iter().position(|s| *s != 0) {
                return Err(ParamsError::PrefixChain { field: i + 1 });
            }
        }

        let headers = self.headers();
        for (i, h) in headers.iter().enumerate() {
            if h.min > h.max {
                return Err(ParamsError::HeaderOrder { field: i + 1, min: h.min, max: h.max });
            }
        }
        if headers[0].is_zero() {
            if let Some(i) = headers.iter().position(|h| !h.is_zero()) {
                return Err(ParamsError::HeaderChain { field: i + 1 });
            }
        }

        let signatures = self.signatures();
        if signatures[0].is_empty() {
            if let Some(i) = signatures.iter().position(|s| !s.is_empty()) {
                return Err(ParamsError::SignatureChain { field: i + 1 });
            }
        }

        Ok(self)
    }

    /// True iff every field is zero or empty
    pub fn is_standard(&self) -> bool {
        self.jc == 0
            && self.jmin == 0
            && self.jmax == 0
            && self.prefixes().iter().all(|s| *s == 0)
            && self.signatures().iter().all(|s| s.is_empty())
            && self.headers().iter().all(HeaderRange::is_zero)
    }

    pub fn prefixes(&self) -> [u16; 4] {
        [self.s1, self.s2, self.s3, self.s4]
    }

    pub fn set_prefixes(&mut self, values: [u16; 4]) {
        [self.s1, self.s2, self.s3, self.s4] = values;
    }

    pub fn headers(&self) -> [HeaderRange; 4] {
        [self.h1, self.h2, self.h3, self.h4]
    }

    pub fn set_headers(&mut self, values: [HeaderRange; 4]) {
        [self.h1, self.h2, self.h3, self.h4] = values;
    }

    pub fn signatures(&self) -> [&str; 5] {
        [
            self.i1.as_str(),
            self.i2.as_str(),
            self.i3.as_str(),
            self.i4.as_str(),
            self.i5.as_str(),
        ]
    }

    pub fn signatures_mut(&mut self) -> [&mut String; 5] {
        [&mut self.i1, &mut self.i2, &mut self.i3, &mut self.i4, &mut self.i5]
    }

    /// Header identifiers as the endpoint will actually use them: unset
    /// fields fall back to the standard message types.
    pub fn effective_headers(&self) -> [HeaderRange; 4] {
        let mut out = self.headers();
        if out[0].is_zero() {
            return STANDARD_HEADER_TYPES.map(HeaderRange::single);
        }
        for (h, std_type) in out.iter_mut().zip(STANDARD_HEADER_TYPES) {
            if h.is_zero() {
                *h = HeaderRange::single(std_type);
            }
        }
        out
    }

    /// Effective value of every field after applying overrides.
    ///
    /// Fields left at their standard default stay zero here; only values
    /// that must be sent to the endpoint are non-zero.
    pub fn resolve(&self, overrides: &Overrides) -> ResolvedParams {
        let (jc, jc_src) = resolve(&self.jc, overrides.jc.as_ref(), 0);
        let (jmin, jmin_src) = resolve(&self.jmin, overrides.jmin.as_ref(), 0);
        let (jmax, jmax_src) = resolve(&self.jmax, overrides.jmax.as_ref(), 0);

        let stored_prefixes = self.prefixes();
        let override_prefixes = overrides.prefixes();
        let prefixes: [(u16, Source); 4] = std::array::from_fn(|i| {
            resolve(&stored_prefixes[i], override_prefixes[i].as_ref(), 0)
        });

        let stored_headers = self.headers();
        let override_headers = overrides.headers();
        let headers: [(HeaderRange, Source); 4] = std::array::from_fn(|i| {
            resolve(&stored_headers[i], override_headers[i].as_ref(), HeaderRange::default())
        });

        let stored_signatures = self.signatures();
        let override_signatures = overrides.signatures();
        let signatures: [(String, Source); 5] = std::array::from_fn(|i| {
            resolve(
                &stored_signatures[i].to_string(),
                override_signatures[i],
                String::new(),
            )
        });

        ResolvedParams {
            jc: (jc, jc_src),
            jmin: (jmin, jmin_src),
            jmax: (jmax, jmax_src),
            prefixes,
            headers,
            signatures,
        }
    }

    /// One-line summary of the non-zero fields
    pub fn compact(&self) -> String {
        let mut parts = Vec::new();
        for (name, value) in [("JC", self.jc), ("JMin", self.jmin), ("JMax", self.jmax)] {
            if value > 0 {
                parts.push(format!("{}={}", name, value));
            }
        }
        for (i, value) in self.prefixes().iter().enumerate() {
            if *value > 0 {
                parts.push(format!("S{}={}", i + 1, value));
            }
        }
        for (i, h) in self.headers().iter().enumerate() {
            if !h.is_zero() {
                parts.push(format!("H{}={}", i + 1, h));
            }
        }
        if !self.i1.is_empty() {
            parts.push(format!("I1={}", truncate(&self.i1, 20)));
        }

        if parts.is_empty() {
            "(standard WireGuard)".to_string()
        } else {
            parts.join(", ")
        }
    }

    /// Multi-line description of every field
    pub fn detailed(&self) -> String {
        let mut out = String::new();
        let mut line = |label: &str, value: &dyn fmt::Display| {
            out.push_str(&format!("  {}: {}\n", label, value));
        };
        line("JC (junk packet count)", &self.jc);
        line("JMin (min junk size)", &self.jmin);
        line("JMax (max junk size)", &self.jmax);
        line("S1 (init packet prefix length)", &self.s1);
        line("S2 (response packet prefix length)", &self.s2);
        line("S3 (cookie packet prefix length)", &self.s3);
        line("S4 (transport packet prefix length)", &self.s4);
        line("I1 (primary signature packet)", &self.i1);
        line("I2 (secondary signature packet)", &self.i2);
        line("I3 (tertiary signature packet)", &self.i3);
        line("I4 (quaternary signature packet)", &self.i4);
        line("I5 (quinary signature packet)", &self.i5);
        line("H1 (header field 1)", &self.h1);
        line("H2 (header field 2)", &self.h2);
        line("H3 (header field 3)", &self.h3);
        line("H4 (header field 4)", &self.h4);
        out
    }

    /// Compact JSON, accepted back by `set`
    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string(self)
    }

    pub fn from_json(s: &str) -> crate::Result<Self> {
        Ok(serde_json::from_str(s)?)
    }
}

fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        s.to_string()
    } else {
        let head: String = s.chars().take(max).collect();
        format!("{}...", head)
    }
}

/// Effective field values with their source, ready for emission
#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedParams {
    pub jc: (u16, Source),
    pub jmin: (u16, Source),
    pub jmax: (u16, Source),
    pub prefixes: [(u16, Source); 4],
    pub headers: [(HeaderRange, Source); 4],
    pub signatures: [(String, Source); 5],
}
