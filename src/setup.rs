//! Interactive parameter setup for `wolfmaskctl set`

use std::fmt::Display;
use std::io::{BufRead, Write};

use rand::Rng;

use crate::error::Result;
use crate::obfuscation::generate::random_params;
use crate::obfuscation::input::{apply_header, apply_prefix, parse_header, GroupStep};
use crate::obfuscation::{validate, ObfuscationParams, ParamInput};
use crate::prompt::Prompter;

const PREFIX_LABELS: [&str; 4] = [
    "Init packet prefix length (S1)",
    "Response packet prefix length (S2)",
    "Cookie packet prefix length (S3)",
    "Transport packet prefix length (S4)",
];

const SIGNATURE_LABELS: [&str; 5] = [
    "Primary signature packet (I1)",
    "Secondary signature packet (I2)",
    "Tertiary signature packet (I3)",
    "Quaternary signature packet (I4)",
    "Quinary signature packet (I5)",
];

fn section<R: BufRead, W: Write>(prompter: &mut Prompter<R, W>, title: &str) -> Result<()> {
    prompter.say("")?;
    prompter.say("=".repeat(70))?;
    prompter.say(title)?;
    prompter.say("=".repeat(70))
}

/// Ask for one field showing its current value; `None` on end of input
fn ask_field<R: BufRead, W: Write>(
    prompter: &mut Prompter<R, W>,
    label: &str,
    current: impl Display,
) -> Result<Option<String>> {
    prompter.ask(&format!("{} [{}]: ", label, current))
}

/// Walk the operator through every parameter group starting from `current`.
///
/// Returns `None` when input ends before the walk is finished. The result
/// has not been validated; advisory findings are printed at the end.
pub fn prompt_params<R: BufRead, W: Write, G: Rng + ?Sized>(
    prompter: &mut Prompter<R, W>,
    current: &ObfuscationParams,
    rng: &mut G,
) -> Result<Option<ObfuscationParams>> {
    prompter.say("Configure obfuscation parameters (press Enter to keep the current value).")?;
    prompter.say(
        "H1-H4 and S1-S4 must be IDENTICAL on all nodes. I1-I5 and JC/JMin/JMax can differ.",
    )?;

    let quick = prompter.confirm("Generate random parameters automatically? [Y/n]: ", true)?;
    let Some(quick) = quick else {
        return Ok(None);
    };

    let mut params = current.clone();
    if quick {
        params = random_params(rng);
        prompter.say(format!("Random configuration generated: {}", params.compact()))?;
        prompter.say("Signature packets (I1-I5) can still be set below.")?;
    } else {
        if !prompt_junk(prompter, &mut params, rng)? {
            return Ok(None);
        }
        if !prompt_prefixes(prompter, &mut params, rng)? {
            return Ok(None);
        }
        if !prompt_headers(prompter, &mut params, rng)? {
            return Ok(None);
        }
    }

    if !prompt_signatures(prompter, &mut params)? {
        return Ok(None);
    }

    let findings = validate::check(&params);
    if !findings.is_empty() {
        prompter.say("")?;
        for finding in &findings {
            prompter.say(finding)?;
        }
    }
    Ok(Some(params))
}

fn prompt_junk<R: BufRead, W: Write, G: Rng + ?Sized>(
    prompter: &mut Prompter<R, W>,
    params: &mut ObfuscationParams,
    rng: &mut G,
) -> Result<bool> {
    section(prompter, "Junk packets (JC, JMin, JMax)")?;

    let fields: [(&str, fn(&mut ObfuscationParams) -> &mut u16); 3] = [
        ("Junk packet count (JC)", |p| &mut p.jc),
        ("Min junk packet size in bytes (JMin)", |p| &mut p.jmin),
        ("Max junk packet size in bytes (JMax)", |p| &mut p.jmax),
    ];

    for (index, (label, field)) in fields.iter().enumerate() {
        if index == 1 && params.jc == 0 {
            prompter.say("JC=0: skipping JMin/JMax (no junk packets)")?;
            break;
        }
        let current = *field(params);
        let Some(answer) = ask_field(prompter, label, current)? else {
            return Ok(false);
        };
        match ParamInput::<u16>::parse(&answer) {
            Ok(ParamInput::Random) => {
                let generated = random_params(rng);
                params.jc = generated.jc;
                params.jmin = generated.jmin;
                params.jmax = generated.jmax;
                prompter.say(format!(
                    "Generated JC={}, JMin={}, JMax={}",
                    params.jc, params.jmin, params.jmax
                ))?;
                break;
            }
            Ok(input) => *field(params) = input.or_keep(current),
            Err(e) => prompter.say(format!("{}, keeping current: {}", e, current))?,
        }
    }
    Ok(true)
}

fn prompt_prefixes<R: BufRead, W: Write, G: Rng + ?Sized>(
    prompter: &mut Prompter<R, W>,
    params: &mut ObfuscationParams,
    rng: &mut G,
) -> Result<bool> {
    section(prompter, "Packet prefixes (S1-S4)")?;
    prompter.say("Enter 'random' at any prompt to generate all four. S1 = 0 disables the group.")?;

    for (index, label) in PREFIX_LABELS.iter().enumerate() {
        let current = params.prefixes()[index];
        let Some(answer) = ask_field(prompter, label, current)? else {
            return Ok(false);
        };
        let input = match ParamInput::<u16>::parse(&answer) {
            Ok(input) => input,
            Err(e) => {
                prompter.say(format!("{}, keeping current: {}", e, current))?;
                ParamInput::Keep
            }
        };
        if apply_prefix(params, index, input, rng) == GroupStep::Done {
            if params.s1 == 0 {
                prompter.say("S1 disabled, skipping all prefix fields.")?;
            } else {
                let [s1, s2, s3, s4] = params.prefixes();
                prompter.say(format!("Generated S1={}, S2={}, S3={}, S4={}", s1, s2, s3, s4))?;
            }
            break;
        }
    }
    Ok(true)
}

fn prompt_headers<R: BufRead, W: Write, G: Rng + ?Sized>(
    prompter: &mut Prompter<R, W>,
    params: &mut ObfuscationParams,
    rng: &mut G,
) -> Result<bool> {
    section(prompter, "Header fields (H1-H4)")?;
    prompter.say(
        "Values are a number or a 'min-max' range. \
         'random' generates all four, 'random-single' one value.",
    )?;

    for index in 0..4 {
        let current = params.headers()[index];
        let label = format!("Header field {} (H{})", index + 1, index + 1);
        let Some(answer) = ask_field(prompter, &label, current)? else {
            return Ok(false);
        };
        let input = match parse_header(&answer) {
            Ok(input) => input,
            Err(e) => {
                prompter.say(format!("{}, keeping current: {}", e, current))?;
                ParamInput::Keep
            }
        };
        if apply_header(params, index, input, rng) == GroupStep::Done {
            if params.h1.is_zero() {
                prompter.say("H1 disabled, skipping all header fields.")?;
            } else {
                for (i, h) in params.headers().iter().enumerate() {
                    prompter.say(format!("  H{}: {}", i + 1, h))?;
                }
            }
            break;
        }
    }
    Ok(true)
}

fn prompt_signatures<R: BufRead, W: Write>(
    prompter: &mut Prompter<R, W>,
    params: &mut ObfuscationParams,
) -> Result<bool> {
    section(prompter, "Signature packets (I1-I5)")?;
    prompter.say(
        "Leave I1 empty for standard WireGuard compatibility. Use JSON for long signatures.",
    )?;

    for (index, label) in SIGNATURE_LABELS.iter().enumerate() {
        if index == 1 && params.i1.is_empty() {
            prompter.say("Skipping I2-I5 (I1 is empty)")?;
            break;
        }
        let current = params.signatures()[index].to_string();
        let Some(answer) = ask_field(prompter, label, &current)? else {
            return Ok(false);
        };
        if !answer.is_empty() {
            *params.signatures_mut()[index] = answer;
        }
    }
    Ok(true)
}
