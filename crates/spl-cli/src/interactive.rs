//! Interactive prompts for CLI commands
//!
//! Uses dialoguer for terminal-based confirmation and selection.

use std::io::ErrorKind;

use dialoguer::{Confirm, MultiSelect, Select};
use spl_core::{Error, Prompter};

/// Terminal prompter backing the managers' questions.
#[derive(Debug, Clone, Copy, Default)]
pub struct DialoguerPrompter;

impl Prompter for DialoguerPrompter {
    fn confirm(&self, message: &str, default: bool) -> spl_core::Result<bool> {
        Confirm::new()
            .with_prompt(message)
            .default(default)
            .interact()
            .map_err(prompt_error)
    }

    fn select(&self, message: &str, items: &[String], default: usize) -> spl_core::Result<usize> {
        Select::new()
            .with_prompt(message)
            .items(items)
            .default(default)
            .interact()
            .map_err(prompt_error)
    }

    fn multi_select(
        &self,
        message: &str,
        items: &[String],
        defaults: &[bool],
    ) -> spl_core::Result<Vec<usize>> {
        if items.is_empty() {
            return Ok(Vec::new());
        }
        MultiSelect::new()
            .with_prompt(format!("{message} (space to toggle, enter to confirm)"))
            .items(items)
            .defaults(defaults)
            .interact()
            .map_err(prompt_error)
    }
}

/// Ctrl-C inside a prompt surfaces as an interrupted read.
fn prompt_error(error: dialoguer::Error) -> Error {
    match error {
        dialoguer::Error::IO(io) if io.kind() == ErrorKind::Interrupted => Error::Interrupted,
        other => Error::Prompt(other.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_interrupted_read_maps_to_interrupt() {
        let io = std::io::Error::new(ErrorKind::Interrupted, "read interrupted");
        let error = dialoguer::Error::IO(io);
        assert!(matches!(prompt_error(error), Error::Interrupted));
    }

    #[test]
    fn test_other_errors_map_to_prompt() {
        let error = dialoguer::Error::IO(std::io::Error::new(ErrorKind::BrokenPipe, "closed"));
        assert!(matches!(prompt_error(error), Error::Prompt(_)));
    }

    #[test]
    fn test_empty_multi_select_skips_terminal() {
        let chosen = DialoguerPrompter.multi_select("pick", &[], &[]).unwrap();
        assert!(chosen.is_empty());
    }
}
