//! Terminal confirmation prompt.

use anyhow::Context;
use schemaforge_core::ports::Prompt;
use std::io::{self, BufRead, Write};

/// Asks on stderr and reads the answer from stdin.
///
/// An empty answer or a closed stdin takes the default. Unrecognized answers
/// are asked again.
#[derive(Debug, Default)]
pub struct StdinPrompt;

impl Prompt for StdinPrompt {
    fn confirm(&self, message: &str, default: bool) -> anyhow::Result<bool> {
        let hint = if default { "Y/n" } else { "y/N" };
        let stdin = io::stdin();
        loop {
            eprint!("{} ({}) ", message, hint);
            io::stderr().flush().context("flush prompt")?;
            let mut line = String::new();
            let read = stdin.lock().read_line(&mut line).context("read answer")?;
            if read == 0 {
                return Ok(default);
            }
            match parse_answer(&line, default) {
                Some(answer) => return Ok(answer),
                None => eprintln!("Please answer yes or no."),
            }
        }
    }
}

/// `None` when the answer is neither yes nor no.
pub fn parse_answer(input: &str, default: bool) -> Option<bool> {
    match input.trim().to_ascii_lowercase().as_str() {
        "" => Some(default),
        "y" | "yes" => Some(true),
        "n" | "no" => Some(false),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn answers() {
        assert_eq!(parse_answer("\n", true), Some(true));
        assert_eq!(parse_answer("", false), Some(false));
        assert_eq!(parse_answer("YES\n", false), Some(true));
        assert_eq!(parse_answer(" n ", true), Some(false));
        assert_eq!(parse_answer("maybe", true), None);
    }
}
