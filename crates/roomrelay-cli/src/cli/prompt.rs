//! Interactive operator prompts on stdin.

use anyhow::{bail, Context, Result};
use std::io::{self, BufRead, Write};

/// Use `value` if given, otherwise ask on stdin.
pub fn value_or_ask(value: Option<String>, question: &str) -> Result<String> {
    match value {
        Some(v) => Ok(v.trim().to_string()),
        None => ask(&mut io::stdin().lock(), &mut io::stdout(), question),
    }
}

/// Write `question`, read one line, and return it trimmed. Empty answers are rejected.
pub fn ask<R: BufRead, W: Write>(input: &mut R, output: &mut W, question: &str) -> Result<String> {
    output.write_all(question.as_bytes())?;
    output.flush()?;
    let mut line = String::new();
    let n = input.read_line(&mut line).context("read answer from stdin")?;
    if n == 0 {
        bail!("no answer to {:?} (stdin closed)", question.trim());
    }
    let answer = line.trim().to_string();
    if answer.is_empty() {
        bail!("empty answer to {:?}", question.trim());
    }
    Ok(answer)
}
