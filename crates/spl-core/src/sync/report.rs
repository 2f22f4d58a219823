//! Sync run reports

use serde::{Deserialize, Serialize};

/// Report from a sync operation
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncReport {
    /// Whether the run finished without remote errors
    pub success: bool,
    /// Changes applied to the destination
    pub actions: Vec<String>,
    /// Changes declined, simulated or ignored
    pub skipped: Vec<String>,
    /// Remote errors, the run continues past them
    pub errors: Vec<String>,
}

impl SyncReport {
    /// Create an empty successful report
    pub fn new() -> Self {
        Self {
            success: true,
            ..Self::default()
        }
    }

    pub fn action(&mut self, action: impl Into<String>) {
        self.actions.push(action.into());
    }

    pub fn skip(&mut self, reason: impl Into<String>) {
        self.skipped.push(reason.into());
    }

    pub fn error(&mut self, error: impl Into<String>) {
        self.errors.push(error.into());
        self.success = false;
    }

    /// Fold another report into this one.
    pub fn merge(&mut self, other: SyncReport) {
        self.actions.extend(other.actions);
        self.skipped.extend(other.skipped);
        self.errors.extend(other.errors);
        self.success = self.errors.is_empty();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn errors_clear_success() {
        let mut report = SyncReport::new();
        report.action("created");
        assert!(report.success);
        report.error("boom");
        assert!(!report.success);
    }

    #[test]
    fn merge_recomputes_success() {
        let mut report = SyncReport::new();
        let mut failed = SyncReport::new();
        failed.error("boom");
        report.merge(failed);
        assert!(!report.success);
        assert_eq!(report.errors, vec!["boom"]);
    }
}
