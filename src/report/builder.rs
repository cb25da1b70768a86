//! Aggregation of a run into a single report.

use serde::Serialize;

use crate::catalog::LoadError;
use crate::registry::NameConflict;
use crate::verify::{Outcome, VerificationResult, VerificationRun};

/// Counts over a whole run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct Summary {
    /// Examples in the verified registry (completed + skipped).
    pub total: usize,
    pub matched: usize,
    pub mismatched: usize,
    pub failed: usize,
    /// Examples never evaluated because the run was cancelled.
    pub skipped: usize,
    pub schema_errors: usize,
    pub name_conflicts: usize,
}

/// Everything a caller needs to judge a run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Report {
    pub summary: Summary,
    pub load_errors: Vec<LoadError>,
    pub name_conflicts: Vec<NameConflict>,
    /// Every example whose outcome was not a match, in load order.
    pub issues: Vec<VerificationResult>,
    pub cancelled: bool,
}

impl Report {
    pub fn build(
        load_errors: Vec<LoadError>,
        name_conflicts: Vec<NameConflict>,
        run: VerificationRun,
    ) -> Self {
        let mut summary = Summary {
            total: run.results.len() + run.skipped,
            skipped: run.skipped,
            schema_errors: load_errors.len(),
            name_conflicts: name_conflicts.len(),
            ..Default::default()
        };

        let mut issues = Vec::new();
        for result in run.results {
            match result.outcome {
                Outcome::Match => summary.matched += 1,
                Outcome::Mismatch { .. } => {
                    summary.mismatched += 1;
                    issues.push(result);
                }
                Outcome::EvalFailed { .. } => {
                    summary.failed += 1;
                    issues.push(result);
                }
            }
        }

        Self {
            summary,
            load_errors,
            name_conflicts,
            issues,
            cancelled: run.cancelled,
        }
    }

    /// A clean report has no schema errors, no conflicts, no mismatches or
    /// failures, and no skipped examples.
    pub fn is_clean(&self) -> bool {
        let s = &self.summary;
        s.schema_errors == 0
            && s.name_conflicts == 0
            && s.mismatched == 0
            && s.failed == 0
            && s.skipped == 0
    }

    pub fn mismatches(&self) -> impl Iterator<Item = &VerificationResult> {
        self.issues
            .iter()
            .filter(|r| matches!(r.outcome, Outcome::Mismatch { .. }))
    }

    pub fn failures(&self) -> impl Iterator<Item = &VerificationResult> {
        self.issues
            .iter()
            .filter(|r| matches!(r.outcome, Outcome::EvalFailed { .. }))
    }
}
