//! Process-wide override values
//!
//! Overrides are consulted only for fields the device leaves at zero. They
//! are read once at startup (environment or the `[overrides]` table of the
//! node config) and passed by reference to whoever resolves parameters.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use super::HeaderRange;

/// Environment variable prefix for override names, e.g. `WOLFMASK_JC`
pub const ENV_PREFIX: &str = "WOLFMASK_";

/// Override values; `None` or zero means "not overridden"
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Overrides {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub jc: Option<u16>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub jmin: Option<u16>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub jmax: Option<u16>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub s1: Option<u16>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub s2: Option<u16>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub s3: Option<u16>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub s4: Option<u16>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub h1: Option<HeaderRange>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub h2: Option<HeaderRange>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub h3: Option<HeaderRange>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub h4: Option<HeaderRange>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub i1: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub i2: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub i3: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub i4: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub i5: Option<String>,
}

impl Overrides {
    /// Read overrides from the process environment
    pub fn from_env() -> Self {
        let vars: HashMap<String, String> = std::env::vars()
            .filter(|(k, _)| k.starts_with(ENV_PREFIX))
            .collect();
        Self::from_map(&vars)
    }

    /// Build overrides from a name → raw value mapping.
    ///
    /// Names are `WOLFMASK_JC`, `WOLFMASK_JMIN`, `WOLFMASK_JMAX`,
    /// `WOLFMASK_S1..S4`, `WOLFMASK_H1..H4` and `WOLFMASK_I1..I5`. Integer
    /// values that fail to parse or do not fit the field are ignored with a
    /// warning.
    pub fn from_map(vars: &HashMap<String, String>) -> Self {
        fn int<T: TryFrom<u64>>(vars: &HashMap<String, String>, name: &str) -> Option<T> {
            let key = format!("{}{}", ENV_PREFIX, name);
            let raw = vars.get(&key)?.trim();
            if raw.is_empty() {
                return None;
            }
            let value = match raw.parse::<u64>() {
                Ok(0) => return None,
                Ok(v) => v,
                Err(e) => {
                    tracing::warn!("Ignoring {}={:?}: {}", key, raw, e);
                    return None;
                }
            };
            match T::try_from(value) {
                Ok(v) => Some(v),
                Err(_) => {
                    tracing::warn!("Ignoring {}={}: out of range", key, value);
                    None
                }
            }
        }
        let u16_field = |name: &str| int::<u16>(vars, name);
        let u32_field = |name: &str| int::<u32>(vars, name);

        let string_field = |name: &str| {
            vars.get(&format!("{}{}", ENV_PREFIX, name))
                .filter(|s| !s.is_empty())
                .cloned()
        };
        let header_field = |name: &str| u32_field(name).map(HeaderRange::single);

        Self {
            jc: u16_field("JC"),
            jmin: u16_field("JMIN"),
            jmax: u16_field("JMAX"),
            s1: u16_field("S1"),
            s2: u16_field("S2"),
            s3: u16_field("S3"),
            s4: u16_field("S4"),
            h1: header_field("H1"),
            h2: header_field("H2"),
            h3: header_field("H3"),
            h4: header_field("H4"),
            i1: string_field("I1"),
            i2: string_field("I2"),
            i3: string_field("I3"),
            i4: string_field("I4"),
            i5: string_field("I5"),
        }
    }

    /// Take every field this set leaves empty from `base`
    pub fn fill_from(self, base: &Overrides) -> Self {
        Self {
            jc: self.jc.or(base.jc),
            jmin: self.jmin.or(base.jmin),
            jmax: self.jmax.or(base.jmax),
            s1: self.s1.or(base.s1),
            s2: self.s2.or(base.s2),
            s3: self.s3.or(base.s3),
            s4: self.s4.or(base.s4),
            h1: self.h1.or(base.h1),
            h2: self.h2.or(base.h2),
            h3: self.h3.or(base.h3),
            h4: self.h4.or(base.h4),
            i1: self.i1.or_else(|| base.i1.clone()),
            i2: self.i2.or_else(|| base.i2.clone()),
            i3: self.i3.or_else(|| base.i3.clone()),
            i4: self.i4.or_else(|| base.i4.clone()),
            i5: self.i5.or_else(|| base.i5.clone()),
        }
    }

    /// `s1..s4` overrides
    pub fn prefixes(&self) -> [Option<u16>; 4] {
        [self.s1, self.s2, self.s3, self.s4]
    }

    /// `h1..h4` overrides
    pub fn headers(&self) -> [Option<HeaderRange>; 4] {
        [self.h1, self.h2, self.h3, self.h4]
    }

    /// `i1..i5` overrides
    pub fn signatures(&self) -> [Option<&String>; 5] {
        [
            self.i1.as_ref(),
            self.i2.as_ref(),
            self.i3.as_ref(),
            self.i4.as_ref(),
            self.i5.as_ref(),
        ]
    }

    /// True when no field is overridden
    pub fn is_empty(&self) -> bool {
        let set16 = |v: &Option<u16>| v.map_or(false, |v| v != 0);
        !(set16(&self.jc)
            || set16(&self.jmin)
            || set16(&self.jmax)
            || self.prefixes().iter().any(set16)
            || self.headers().iter().any(|h| h.map_or(false, |h| !h.is_zero()))
            || self.signatures().iter().any(|s| s.map_or(false, |s| !s.is_empty())))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn vars(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect()
    }

    #[test]
    fn test_from_map() {
        let o = Overrides::from_map(&vars(&[
            ("WOLFMASK_JC", "3"),
            ("WOLFMASK_S2", "12"),
            ("WOLFMASK_H1", "3847291638"),
            ("WOLFMASK_I1", "<b 0xc0000000><c><t>"),
            ("WOLFMASK_JMAX", "lots"),
            ("WOLFMASK_JMIN", "65537"),
            ("WOLFMASK_H2", "4294967301"),
        ]));
        assert_eq!(o.jc, Some(3));
        assert_eq!(o.jmax, None);
        assert_eq!(o.jmin, None);
        assert_eq!(o.h2, None);
        assert_eq!(o.prefixes(), [None, Some(12), None, None]);
        assert_eq!(o.h1, Some(HeaderRange::single(3847291638)));
        assert_eq!(o.i1.as_deref(), Some("<b 0xc0000000><c><t>"));
        assert!(!o.is_empty());
    }

    #[test]
    fn test_empty() {
        assert!(Overrides::default().is_empty());
        let zeroed = vars(&[("WOLFMASK_JC", "0"), ("WOLFMASK_I2", "")]);
        assert!(Overrides::from_map(&zeroed).is_empty());
    }

    #[test]
    fn test_fill_from() {
        let env = Overrides { jc: Some(7), ..Default::default() };
        let file = Overrides {
            jc: Some(2),
            jmin: Some(64),
            i1: Some("<c>".into()),
            ..Default::default()
        };
        let merged = env.fill_from(&file);
        assert_eq!(merged.jc, Some(7));
        assert_eq!(merged.jmin, Some(64));
        assert_eq!(merged.i1.as_deref(), Some("<c>"));
        assert_eq!(merged.jmax, None);
    }

    #[test]
    fn test_toml_table() {
        let o: Overrides = toml::from_str(
            r#"
jc = 4
s1 = 8
h2 = { min = 100, max = 200 }
"#,
        )
        .unwrap();
        assert_eq!(o.jc, Some(4));
        assert_eq!(o.s1, Some(8));
        assert_eq!(o.h2, Some(HeaderRange::new(100, 200)));
        assert_eq!(toml::from_str::<Overrides>(&toml::to_string(&o).unwrap()).unwrap(), o);
    }
}
