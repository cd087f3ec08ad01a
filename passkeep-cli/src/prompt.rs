//! Interactive parameter prompts.

use anyhow::{bail, Context, Result};
use std::io::{BufRead, Write};

/// Asks for one named value at a time on `output` and reads the answer from `input`.
pub struct Prompter<R, W> {
    input: R,
    output: W,
}

impl<R: BufRead, W: Write> Prompter<R, W> {
    pub fn new(input: R, output: W) -> Self {
        Self { input, output }
    }

    /// A single token: all whitespace is removed and the result must not be empty.
    pub fn read_token(&mut self, name: &str) -> Result<String> {
        let answer: String = self
            .ask(name)?
            .chars()
            .filter(|c| !c.is_whitespace())
            .collect();
        if answer.is_empty() {
            bail!("{} should not be empty", name);
        }
        Ok(answer)
    }

    /// Free text: only the line ending is removed.
    pub fn read_text(&mut self, name: &str) -> Result<String> {
        let answer = self.ask(name)?;
        if answer.trim().is_empty() {
            bail!("{} should not be empty", name);
        }
        Ok(answer)
    }

    pub fn read_number(&mut self, name: &str, from: u32, to: u32) -> Result<u32> {
        let answer = self.read_token(name)?;
        let value: u32 = answer
            .parse()
            .with_context(|| format!("{} should be a number, got {:?}", name, answer))?;
        if value < from || value > to {
            bail!(
                "{} should be a number between {} and {} inclusively, got {}",
                name,
                from,
                to,
                value
            );
        }
        Ok(value)
    }

    pub fn read_month(&mut self, name: &str) -> Result<u32> {
        self.read_number(name, 1, 12)
    }

    pub fn read_day(&mut self, name: &str) -> Result<u32> {
        self.read_number(name, 1, 31)
    }

    fn ask(&mut self, name: &str) -> Result<String> {
        write!(self.output, "Enter the {}: ", name)?;
        self.output.flush()?;

        let mut line = String::new();
        let read = self
            .input
            .read_line(&mut line)
            .with_context(|| format!("failed to read the {}", name))?;
        if read == 0 {
            bail!("failed to read the {}: end of input", name);
        }

        let trimmed = line.trim_end_matches(['\n', '\r']).len();
        line.truncate(trimmed);
        Ok(line)
    }
}
