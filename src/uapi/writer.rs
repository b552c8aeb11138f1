//! Device/peer reconciliation

use std::collections::{HashMap, HashSet};
use std::fmt::Display;
use std::io::{self, Write};

use crate::device::{allowed_ips_equal, DeviceConfig, PeerConfig};
use crate::error::{Error, Result};
use crate::key::NodePublic;
use crate::obfuscation::{Overrides, ResolvedParams};

/// Line sink that latches the first write error and drops everything after it
struct Directives<'a, W: Write> {
    out: &'a mut W,
    err: Option<io::Error>,
}

impl<'a, W: Write> Directives<'a, W> {
    fn new(out: &'a mut W) -> Self {
        Self { out, err: None }
    }

    fn set(&mut self, key: &str, value: impl Display) {
        if self.err.is_some() {
            return;
        }
        if let Err(e) = writeln!(self.out, "{}={}", key, value) {
            self.err = Some(e);
        }
    }

    fn peer(&mut self, key: &NodePublic) {
        self.set("public_key", key.untyped_hex());
    }

    fn finish(self) -> Result<()> {
        match self.err {
            Some(e) => Err(Error::Uapi(e)),
            None => Ok(()),
        }
    }
}

/// Write the directives that take an endpoint from `previous` to `desired`.
///
/// Device-level directives are only written when the private key changes.
/// Peers whose endpoint, allowed IPs and keepalive are all unchanged are
/// skipped; peers missing from `desired` are removed after every other peer
/// has been handled. The first write error stops all further output and is
/// returned as [`Error::Uapi`].
pub fn write_uapi<W: Write>(
    previous: &DeviceConfig,
    desired: &DeviceConfig,
    overrides: &Overrides,
    out: &mut W,
) -> Result<()> {
    let mut d = Directives::new(out);

    if previous.private_key != desired.private_key {
        d.set("private_key", desired.private_key.untyped_hex());
        write_obfuscation(&mut d, &desired.obfuscation.resolve(overrides));
    }

    let old: HashMap<NodePublic, &PeerConfig> =
        previous.peers.iter().map(|p| (p.public_key, p)).collect();

    for peer in &desired.peers {
        let prev = old.get(&peer.public_key).copied();

        let set_endpoint = prev.map_or(true, |p| p.endpoint_key != peer.public_key);
        let change_ips =
            prev.map_or(true, |p| !allowed_ips_equal(&p.allowed_ips, &peer.allowed_ips));
        let change_keepalive =
            prev.map_or(0, |p| p.persistent_keepalive) != peer.persistent_keepalive;

        if !set_endpoint && !change_ips && !change_keepalive {
            continue;
        }

        d.peer(&peer.public_key);
        d.set("protocol_version", 1);

        if set_endpoint {
            if let Some(prev) = prev {
                tracing::warn!(
                    "[unexpected] endpoint changed from {} to {}",
                    prev.endpoint_key,
                    peer.public_key
                );
            }
            d.set("endpoint", peer.public_key.untyped_hex());
        }

        if change_ips {
            d.set("replace_allowed_ips", true);
            for ip in &peer.allowed_ips {
                d.set("allowed_ip", ip);
            }
        }

        // Keepalive goes last, after endpoint and allowed IPs
        if change_keepalive {
            d.set("persistent_keepalive_interval", peer.persistent_keepalive);
        }
    }

    let keep: HashSet<NodePublic> = desired.peers.iter().map(|p| p.public_key).collect();
    for peer in previous.peers.iter().filter(|p| !keep.contains(&p.public_key)) {
        d.peer(&peer.public_key);
        d.set("remove", true);
    }

    d.finish()
}

/// Device block for resolved parameters. Each group's tail is dropped when
/// its key field is unset.
fn write_obfuscation<W: Write>(d: &mut Directives<'_, W>, p: &ResolvedParams) {
    for (key, (value, _)) in [("jc", p.jc), ("jmin", p.jmin), ("jmax", p.jmax)] {
        if value > 0 {
            d.set(key, value);
        }
    }

    if p.prefixes[0].0 > 0 {
        for (i, (value, _)) in p.prefixes.iter().enumerate() {
            if *value > 0 {
                d.set(&format!("s{}", i + 1), value);
            }
        }
    }

    if !p.signatures[0].0.is_empty() {
        for (i, (value, _)) in p.signatures.iter().enumerate() {
            if !value.is_empty() {
                d.set(&format!("i{}", i + 1), value);
            }
        }
    }

    if !p.headers[0].0.is_zero() {
        for (i, (value, _)) in p.headers.iter().enumerate() {
            if !value.is_zero() {
                d.set(&format!("h{}", i + 1), value);
            }
        }
    }
}

/// Directive stream as a string
pub fn to_uapi_string(
    previous: &DeviceConfig,
    desired: &DeviceConfig,
    overrides: &Overrides,
) -> Result<String> {
    let mut buf = Vec::new();
    write_uapi(previous, desired, overrides, &mut buf)?;
    String::from_utf8(buf).map_err(|e| Error::Uapi(io::Error::new(io::ErrorKind::InvalidData, e)))
}
