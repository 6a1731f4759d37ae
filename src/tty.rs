//! Terminal I/O utilities for CLI.
//!
//! Provides TTY detection and user prompting.

use std::io::{self, BufRead, IsTerminal, Write};

use awsops::deploy::TagChooser;

pub fn is_stdin_tty() -> bool {
    io::stdin().is_terminal()
}

pub fn is_stderr_tty() -> bool {
    io::stderr().is_terminal()
}

/// Prompts are drawn on stderr and answered on stdin.
pub fn can_prompt() -> bool {
    is_stdin_tty() && is_stderr_tty()
}

pub fn prompt(message: &str) -> awsops::Result<String> {
    eprint!("{}", message);
    io::stderr().flush().ok();

    let stdin = io::stdin();
    let mut line = String::new();
    stdin.lock().read_line(&mut line).map_err(|e| {
        awsops::Error::internal_io(e.to_string(), Some("read prompt answer".to_string()))
    })?;

    Ok(line.trim().to_string())
}

/// Print status message to stderr if running in a terminal.
pub fn status(message: &str) {
    if is_stderr_tty() {
        eprintln!("{}", message);
    }
}

/// Resolve an answer to a numbered list: a 1-based index or an exact entry.
/// A number within the list range always selects by position.
fn pick<'a>(answer: &str, options: &'a [String]) -> Option<&'a String> {
    if let Ok(n) = answer.parse::<usize>() {
        if (1..=options.len()).contains(&n) {
            return Some(&options[n - 1]);
        }
    }
    options.iter().find(|o| o.as_str() == answer)
}

fn selection_prompt(count: usize) -> String {
    format!(
        "Select a tag to deploy (1-{} picks by list position, otherwise type the tag; empty to cancel): ",
        count
    )
}

/// Numbered-list tag picker on the terminal.
pub struct PromptChooser;

impl TagChooser for PromptChooser {
    fn choose(&self, repository: &str, tags: &[String]) -> awsops::Result<Option<String>> {
        eprintln!("Tags in {}:", repository);
        for (idx, tag) in tags.iter().enumerate() {
            eprintln!("  {:>3}) {}", idx + 1, tag);
        }

        loop {
            let answer = prompt(&selection_prompt(tags.len()))?;
            if answer.is_empty() {
                return Ok(None);
            }
            match pick(&answer, tags) {
                Some(tag) => return Ok(Some(tag.clone())),
                None => eprintln!("'{}' is not one of the listed tags", answer),
            }
        }
    }
}
