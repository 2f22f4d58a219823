//! [`ScriptedPrompter`]: answers questions from a queue.

use std::collections::VecDeque;
use std::sync::Mutex;

use spl_core::{Prompter, Result};

/// One queued answer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Answer {
    Confirm(bool),
    Select(usize),
    MultiSelect(Vec<usize>),
    /// Answer with whatever the question proposes
    Default,
}

/// Pops one [`Answer`] per question and records every message asked.
///
/// An empty queue answers with defaults.
///
/// # Panics
/// Panics when the queued answer does not fit the question kind.
#[derive(Debug, Default)]
pub struct ScriptedPrompter {
    answers: Mutex<VecDeque<Answer>>,
    asked: Mutex<Vec<String>>,
}

impl ScriptedPrompter {
    pub fn new(answers: impl IntoIterator<Item = Answer>) -> Self {
        Self {
            answers: Mutex::new(answers.into_iter().collect()),
            asked: Mutex::new(Vec::new()),
        }
    }

    /// Messages of all questions asked so far.
    pub fn asked(&self) -> Vec<String> {
        self.asked.lock().unwrap().clone()
    }

    /// Answers not consumed yet.
    pub fn remaining(&self) -> usize {
        self.answers.lock().unwrap().len()
    }

    fn next(&self, message: &str) -> Answer {
        self.asked.lock().unwrap().push(message.to_string());
        self.answers
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or(Answer::Default)
    }
}

impl Prompter for ScriptedPrompter {
    fn confirm(&self, message: &str, default: bool) -> Result<bool> {
        match self.next(message) {
            Answer::Confirm(answer) => Ok(answer),
            Answer::Default => Ok(default),
            other => panic!("expected a confirm answer for '{message}', got {other:?}"),
        }
    }

    fn select(&self, message: &str, items: &[String], default: usize) -> Result<usize> {
        match self.next(message) {
            Answer::Select(index) => {
                assert!(index < items.len(), "select index {index} out of range for '{message}'");
                Ok(index)
            }
            Answer::Default => Ok(default),
            other => panic!("expected a select answer for '{message}', got {other:?}"),
        }
    }

    fn multi_select(
        &self,
        message: &str,
        items: &[String],
        defaults: &[bool],
    ) -> Result<Vec<usize>> {
        match self.next(message) {
            Answer::MultiSelect(indices) => Ok(indices),
            Answer::Default => Ok((0..items.len())
                .filter(|i| defaults.get(*i).copied().unwrap_or(false))
                .collect()),
            other => panic!("expected a multi-select answer for '{message}', got {other:?}"),
        }
    }
}
