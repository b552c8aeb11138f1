//! Operator input for parameter fields
//!
//! Every prompt answer is one of: keep the current value, use a literal, or
//! generate random values for the whole field group.

use std::str::FromStr;

use rand::Rng;

use super::{generate, HeaderRange, ObfuscationParams};

/// Parsed answer to a single parameter prompt
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParamInput<T> {
    /// Empty answer, leave the field alone
    Keep,
    /// Explicit value
    Literal(T),
    /// Generate random values
    Random,
}

/// Answer that could not be parsed
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("invalid value '{0}'")]
pub struct InvalidInput(pub String);

fn is_random_keyword(text: &str) -> bool {
    matches!(text.to_ascii_lowercase().as_str(), "random" | "rand")
}

impl<T: FromStr> ParamInput<T> {
    /// Parse a prompt answer: empty keeps, `random`/`rand` generates, anything
    /// else must parse as `T`.
    pub fn parse(text: &str) -> Result<Self, InvalidInput> {
        let text = text.trim();
        if text.is_empty() {
            return Ok(ParamInput::Keep);
        }
        if is_random_keyword(text) {
            return Ok(ParamInput::Random);
        }
        text.parse()
            .map(ParamInput::Literal)
            .map_err(|_| InvalidInput(text.to_string()))
    }
}

impl<T> ParamInput<T> {
    /// Literal value or the current one
    pub fn or_keep(self, current: T) -> T {
        match self {
            ParamInput::Literal(v) => v,
            _ => current,
        }
    }
}

/// Header answers additionally accept `min-max` and `random-single`
pub fn parse_header(text: &str) -> Result<ParamInput<HeaderRange>, InvalidInput> {
    let text = text.trim();
    if text.eq_ignore_ascii_case("random-single") {
        return Ok(ParamInput::Literal(HeaderRange::single(rand::thread_rng().gen())));
    }
    if let Some((min, max)) = text.split_once('-') {
        let min: u32 = min.trim().parse().map_err(|_| InvalidInput(text.to_string()))?;
        let max: u32 = max.trim().parse().map_err(|_| InvalidInput(text.to_string()))?;
        if min > max {
            return Err(InvalidInput(text.to_string()));
        }
        return Ok(ParamInput::Literal(HeaderRange::new(min, max)));
    }
    Ok(match ParamInput::<u32>::parse(text)? {
        ParamInput::Keep => ParamInput::Keep,
        ParamInput::Random => ParamInput::Random,
        ParamInput::Literal(v) => ParamInput::Literal(HeaderRange::single(v)),
    })
}

/// Outcome of applying the answer for a group's first field
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GroupStep {
    /// Continue prompting the remaining fields
    Continue,
    /// Group finished (disabled or randomized), skip the remaining prompts
    Done,
}

/// Apply the answer for `s<index+1>`. A zero `s1` disables the whole group and
/// `Random` on any field regenerates all four.
pub fn apply_prefix<R: Rng + ?Sized>(
    params: &mut ObfuscationParams,
    index: usize,
    input: ParamInput<u16>,
    rng: &mut R,
) -> GroupStep {
    let mut values = params.prefixes();
    match input {
        ParamInput::Random => {
            params.set_prefixes(generate::random_prefixes(rng));
            return GroupStep::Done;
        }
        ParamInput::Keep => {}
        ParamInput::Literal(v) => values[index] = v,
    }
    if index == 0 && values[0] == 0 {
        params.set_prefixes([0; 4]);
        return GroupStep::Done;
    }
    params.set_prefixes(values);
    GroupStep::Continue
}

/// Apply the answer for `h<index+1>`; same group rules as [`apply_prefix`].
pub fn apply_header<R: Rng + ?Sized>(
    params: &mut ObfuscationParams,
    index: usize,
    input: ParamInput<HeaderRange>,
    rng: &mut R,
) -> GroupStep {
    let mut values = params.headers();
    match input {
        ParamInput::Random => {
            params.set_headers(generate::random_headers(rng));
            return GroupStep::Done;
        }
        ParamInput::Keep => {}
        ParamInput::Literal(v) => values[index] = v,
    }
    if index == 0 && values[0].is_zero() {
        params.set_headers([HeaderRange::default(); 4]);
        return GroupStep::Done;
    }
    params.set_headers(values);
    GroupStep::Continue
}
