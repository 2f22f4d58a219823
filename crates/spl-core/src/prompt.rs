//! The interactive question seam
//!
//! Managers ask through [`Prompter`] so the terminal UI stays in the CLI and
//! tests can script answers.

use crate::Result;

/// Asks the user questions.
pub trait Prompter: Send + Sync {
    fn confirm(&self, message: &str, default: bool) -> Result<bool>;

    /// Index of the chosen item.
    fn select(&self, message: &str, items: &[String], default: usize) -> Result<usize>;

    /// Indices of the chosen items, `defaults` marks preselected ones.
    fn multi_select(&self, message: &str, items: &[String], defaults: &[bool])
    -> Result<Vec<usize>>;
}

/// Answers every question with its default.
#[derive(Debug, Clone, Copy, Default)]
pub struct AcceptDefaults;

impl Prompter for AcceptDefaults {
    fn confirm(&self, _message: &str, default: bool) -> Result<bool> {
        Ok(default)
    }

    fn select(&self, _message: &str, _items: &[String], default: usize) -> Result<usize> {
        Ok(default)
    }

    fn multi_select(
        &self,
        _message: &str,
        items: &[String],
        defaults: &[bool],
    ) -> Result<Vec<usize>> {
        Ok((0..items.len())
            .filter(|i| defaults.get(*i).copied().unwrap_or(false))
            .collect())
    }
}

/// Pick `items` by the indices a [`Prompter::multi_select`] returned.
pub fn pick<T: Clone>(items: &[T], indices: &[usize]) -> Vec<T> {
    indices.iter().filter_map(|i| items.get(*i).cloned()).collect()
}
