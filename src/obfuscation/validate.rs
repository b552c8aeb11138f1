//! Advisory validation
//!
//! Nothing here rejects or repairs a value. Two peers must agree exactly on
//! header and prefix fields, so clamping locally would break the link; the
//! caller decides what to do with the findings.

use std::fmt;

use super::{
    ObfuscationParams, RECOMMENDED_JUNK_SIZE, RECOMMENDED_MAX_JC, RECOMMENDED_MAX_PREFIX,
    WEAK_HEADER_THRESHOLD,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Severity {
    Note,
    Warning,
    Error,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Severity::Note => write!(f, "NOTE"),
            Severity::Warning => write!(f, "WARNING"),
            Severity::Error => write!(f, "ERROR"),
        }
    }
}

/// One advisory result
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Finding {
    pub severity: Severity,
    /// Field the finding is about, e.g. `"jc"`
    pub field: &'static str,
    pub message: String,
}

impl Finding {
    fn new(severity: Severity, field: &'static str, message: impl Into<String>) -> Self {
        Self { severity, field, message: message.into() }
    }
}

impl fmt::Display for Finding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}: {}", self.severity, self.field, self.message)
    }
}

const PREFIX_FIELDS: [&str; 4] = ["s1", "s2", "s3", "s4"];
const HEADER_FIELDS: [&str; 4] = ["h1", "h2", "h3", "h4"];
const SIGNATURE_FIELDS: [&str; 5] = ["i1", "i2", "i3", "i4", "i5"];

/// Check parameters against recommended ranges and the all-or-none rules
pub fn check(params: &ObfuscationParams) -> Vec<Finding> {
    let mut findings = Vec::new();

    if params.jc > RECOMMENDED_MAX_JC {
        findings.push(Finding::new(
            Severity::Warning,
            "jc",
            format!("{} is very high and may impact performance", params.jc),
        ));
    }
    for (field, value) in [("jmin", params.jmin), ("jmax", params.jmax)] {
        if value > 0 && !RECOMMENDED_JUNK_SIZE.contains(&value) {
            findings.push(Finding::new(
                Severity::Warning,
                field,
                format!(
                    "{} is outside the recommended range {}-{}",
                    value,
                    RECOMMENDED_JUNK_SIZE.start(),
                    RECOMMENDED_JUNK_SIZE.end()
                ),
            ));
        }
    }
    if params.jmin > 0 && params.jmax > 0 && params.jmin > params.jmax {
        findings.push(Finding::new(
            Severity::Error,
            "jmin",
            format!("jmin ({}) is greater than jmax ({})", params.jmin, params.jmax),
        ));
    }
    if params.jc == 0 && (params.jmin > 0 || params.jmax > 0) {
        findings.push(Finding::new(
            Severity::Note,
            "jc",
            "junk sizes are set but jc is 0, no junk packets will be sent",
        ));
    }

    let prefixes = params.prefixes();
    for (field, value) in PREFIX_FIELDS.into_iter().zip(prefixes) {
        if value > RECOMMENDED_MAX_PREFIX {
            findings.push(Finding::new(
                Severity::Warning,
                field,
                format!("{} is outside the recommended range 0-{}", value, RECOMMENDED_MAX_PREFIX),
            ));
        }
    }
    if prefixes[0] == 0 {
        for (field, value) in PREFIX_FIELDS.into_iter().zip(prefixes).skip(1) {
            if value != 0 {
                findings.push(Finding::new(
                    Severity::Warning,
                    field,
                    "ignored because s1 is 0 (prefix lengths are all-or-none)",
                ));
            }
        }
    }

    let headers = params.headers();
    for (field, h) in HEADER_FIELDS.into_iter().zip(headers) {
        if h.min > h.max {
            findings.push(Finding::new(
                Severity::Error,
                field,
                format!("min ({}) is greater than max ({})", h.min, h.max),
            ));
        }
    }
    if headers[0].is_zero() {
        for (field, h) in HEADER_FIELDS.into_iter().zip(headers).skip(1) {
            if !h.is_zero() {
                findings.push(Finding::new(
                    Severity::Warning,
                    field,
                    "ignored because h1 is 0 (header fields are all-or-none)",
                ));
            }
        }
    } else {
        if headers.iter().any(|h| !h.is_zero() && h.max < WEAK_HEADER_THRESHOLD) {
            findings.push(Finding::new(
                Severity::Note,
                "h1",
                "header fields should use large 32-bit random values (e.g. 3847291638)",
            ));
        }
        let effective = params.effective_headers();
        for i in 0..effective.len() {
            for j in (i + 1)..effective.len() {
                if effective[i].min <= effective[i].max
                    && effective[j].min <= effective[j].max
                    && effective[i].overlaps(&effective[j])
                {
                    findings.push(Finding::new(
                        Severity::Error,
                        HEADER_FIELDS[j],
                        format!("overlaps {}; header ranges must be disjoint", HEADER_FIELDS[i]),
                    ));
                }
            }
        }
    }

    let signatures = params.signatures();
    if signatures[0].is_empty() {
        for (field, s) in SIGNATURE_FIELDS.into_iter().zip(signatures).skip(1) {
            if !s.is_empty() {
                findings.push(Finding::new(
                    Severity::Warning,
                    field,
                    "ignored because i1 is empty (signature chain starts at i1)",
                ));
            }
        }
    }

    let summary = FeatureSummary::of(params);
    if summary.header && summary.signature {
        findings.push(Finding::new(
            Severity::Note,
            "i1",
            "both header and signature parameters are set; prefer one or the other",
        ));
    }

    findings
}

/// Which feature groups a configuration turns on
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct FeatureSummary {
    pub junk: bool,
    pub prefix: bool,
    pub header: bool,
    pub signature: bool,
}

impl FeatureSummary {
    pub fn of(params: &ObfuscationParams) -> Self {
        Self {
            junk: params.jc != 0 || params.jmin != 0 || params.jmax != 0,
            prefix: params.prefixes().iter().any(|s| *s != 0),
            header: params.headers().iter().any(|h| !h.is_zero()),
            signature: params.signatures().iter().any(|s| !s.is_empty()),
        }
    }

    /// Junk packets alone still interoperate with plain WireGuard peers
    pub fn compatible_with_standard(&self) -> bool {
        !self.prefix && !self.header && !self.signature
    }
}

/// Human-readable validation report
pub fn report(params: &ObfuscationParams) -> String {
    let mut out = String::new();
    if params.is_standard() {
        out.push_str("Status: standard WireGuard mode (all parameters disabled)\n");
        out.push_str("Compatibility: full compatibility with all WireGuard clients\n");
        out.push_str("Network requirement: no special configuration needed on other nodes\n");
        return out;
    }

    let summary = FeatureSummary::of(params);
    let flag = |on: bool| if on { "enabled" } else { "disabled" };
    out.push_str("Status: obfuscation enabled\n");
    out.push_str("Parameter summary:\n");
    out.push_str(&format!("  - Junk packets: {}\n", flag(summary.junk)));
    out.push_str(&format!("  - Prefix lengths (S1-S4): {}\n", flag(summary.prefix)));
    out.push_str(&format!("  - Header parameters (H1-H4): {}\n", flag(summary.header)));
    out.push_str(&format!("  - Signature parameters (I1-I5): {}\n\n", flag(summary.signature)));

    if summary.compatible_with_standard() {
        out.push_str(
            "Compatibility: junk packets only, compatible with standard WireGuard clients\n",
        );
    } else {
        out.push_str("Compatibility: protocol modified, NOT compatible with standard WireGuard\n");
    }

    let findings = check(params);
    if !findings.is_empty() {
        out.push('\n');
        for finding in &findings {
            out.push_str(&format!("{}\n", finding));
        }
    }

    out.push_str("\nNetwork requirement:\n");
    out.push_str("  H1-H4 and S1-S4 MUST be identical on all nodes\n");
    out.push_str("  I1-I5 and JC/JMin/JMax may differ between nodes\n");
    out
}
