//! Line-oriented operator prompts

use std::fmt::Display;
use std::io::{BufRead, Write};

use crate::error::Result;

/// Question/answer helper over any reader and writer, so interactive flows
/// can be driven from tests.
pub struct Prompter<R, W> {
    input: R,
    output: W,
}

impl<R: BufRead, W: Write> Prompter<R, W> {
    pub fn new(input: R, output: W) -> Self {
        Self { input, output }
    }

    /// Print `question` and read one trimmed line; `None` on end of input
    pub fn ask(&mut self, question: &str) -> Result<Option<String>> {
        write!(self.output, "{}", question)?;
        self.output.flush()?;

        let mut line = String::new();
        if self.input.read_line(&mut line)? == 0 {
            return Ok(None);
        }
        Ok(Some(line.trim().to_string()))
    }

    /// Write one line of output
    pub fn say(&mut self, text: impl Display) -> Result<()> {
        writeln!(self.output, "{}", text)?;
        Ok(())
    }

    /// Yes/no question where an empty answer means `default`. Keeps asking
    /// until the answer is recognised; `None` on end of input.
    pub fn confirm(&mut self, question: &str, default: bool) -> Result<Option<bool>> {
        loop {
            let Some(answer) = self.ask(question)? else {
                return Ok(None);
            };
            match answer.to_ascii_lowercase().as_str() {
                "" => return Ok(Some(default)),
                "y" | "yes" => return Ok(Some(true)),
                "n" | "no" => return Ok(Some(false)),
                _ => self.say("Please answer Y or N.")?,
            }
        }
    }

    pub fn into_output(self) -> W {
        self.output
    }
}
