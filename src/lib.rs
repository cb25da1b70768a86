//! Function reference registry and example verification.
//!
//! Documentation records for the functions and operators of an expression
//! language are loaded and validated ([`catalog`]), indexed by name, group and
//! tag ([`registry`]), and every documented example is run through an
//! external evaluator ([`verify`]). The outcome of a run is a single
//! [`Report`].
//!
//! ```ignore
//! let catalog = Catalog::from_records(records);
//! let eval = Arc::new(evaluator_fn(|expr| my_engine::eval(expr)));
//! let report = catalog.verify(&Verifier::default(), eval).await;
//! assert!(report.is_clean());
//! ```

use std::sync::Arc;

use tokio::sync::watch;

pub mod catalog;
pub mod cli;
pub mod registry;
pub mod report;
pub mod settings;
pub mod verify;

pub use catalog::{FunctionDoc, Kind, LoadError, RawRecord, SchemaViolation};
pub use registry::{NameConflict, Registry};
pub use report::{OutputFormat, Report, Summary};
pub use settings::{discover_settings, load_settings, Settings};
pub use verify::{
    evaluator_fn, CommandEvaluator, EvalError, Evaluator, Outcome, VerificationResult,
    VerificationRun, Verifier,
};

/// A loaded registry together with everything that went wrong loading it.
#[derive(Debug, Default)]
pub struct Catalog {
    pub registry: Registry,
    pub load_errors: Vec<LoadError>,
    pub conflicts: Vec<NameConflict>,
}

impl Catalog {
    /// Validate `records` and index the accepted ones.
    pub fn from_records(records: impl IntoIterator<Item = RawRecord>) -> Self {
        let loaded = catalog::load(records);
        let (registry, conflicts) = Registry::build(loaded.docs);

        tracing::info!(
            functions = registry.len(),
            rejected = loaded.errors.len(),
            conflicts = conflicts.len(),
            "catalog loaded"
        );

        Self {
            registry,
            load_errors: loaded.errors,
            conflicts,
        }
    }

    /// Read records from a JSON file or directory and load them. Files that
    /// could not be parsed are reported as load errors.
    pub fn from_path(path: &std::path::Path) -> Result<Self, catalog::SourceError> {
        let source = catalog::read_records(path)?;
        let mut catalog = Self::from_records(source.records);
        let mut load_errors = source.errors;
        load_errors.append(&mut catalog.load_errors);
        catalog.load_errors = load_errors;
        Ok(catalog)
    }

    /// Keep only the docs matching `keep`. Load errors and conflicts are kept.
    pub fn retain(self, keep: impl FnMut(&FunctionDoc) -> bool) -> Self {
        Self {
            registry: self.registry.select(keep),
            ..self
        }
    }

    /// Report on loading alone, without evaluating any example.
    pub fn into_report(self) -> Report {
        Report::build(self.load_errors, self.conflicts, VerificationRun::default())
    }

    /// Verify every example and report on the whole run.
    pub async fn verify<E: Evaluator>(self, verifier: &Verifier, evaluator: Arc<E>) -> Report {
        let run = verifier.verify(&self.registry, evaluator).await;
        Report::build(self.load_errors, self.conflicts, run)
    }

    /// Like [`Catalog::verify`], stopping early once `cancel` reads `true`.
    pub async fn verify_until<E: Evaluator>(
        self,
        verifier: &Verifier,
        evaluator: Arc<E>,
        cancel: watch::Receiver<bool>,
    ) -> Report {
        let run = verifier
            .verify_until(&self.registry, evaluator, cancel)
            .await;
        Report::build(self.load_errors, self.conflicts, run)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::RawExample;

    fn record(name: &str, expression: &str, returns: &str) -> RawRecord {
        RawRecord {
            name: Some(name.to_string()),
            kind: Some("function".to_string()),
            groups: Some(vec!["Math".to_string()]),
            description: Some("test".to_string()),
            examples: Some(vec![RawExample {
                expression: Some(expression.to_string()),
                returns: Some(returns.to_string()),
                note: None,
            }]),
            ..Default::default()
        }
    }

    #[test]
    fn catalog_collects_errors_and_conflicts() {
        let mut bad = record("broken", "x", "1");
        bad.description = None;

        let catalog = Catalog::from_records(vec![
            record("abs", "abs(-1)", "1"),
            bad,
            record("abs", "abs(-2)", "2"),
        ]);

        assert_eq!(catalog.registry.len(), 1);
        assert_eq!(catalog.load_errors.len(), 1);
        assert_eq!(catalog.conflicts.len(), 1);

        let report = catalog.into_report();
        assert!(!report.is_clean());
        assert_eq!(report.summary.total, 0);
    }

    #[test]
    fn names_match_exactly() {
        let catalog = Catalog::from_records(vec![
            record("upper", "upper('a')", "'A'"),
            record(" upper", "upper('b')", "'B'"),
        ]);

        assert!(catalog.conflicts.is_empty());
        assert_eq!(catalog.registry.len(), 2);
        assert_eq!(
            catalog.registry.by_name("upper").unwrap().examples[0].expected,
            "'A'"
        );
        assert!(catalog.registry.by_name(" upper").is_some());
    }

    #[tokio::test]
    async fn catalog_verify_reports_run() {
        let catalog = Catalog::from_records(vec![
            record("abs", "abs(-1)", "1"),
            record("sqrt", "sqrt(4)", "2"),
        ])
        .retain(|d| d.name == "abs");

        let eval = evaluator_fn(|expr| match expr {
            "abs(-1)" => Ok("1".to_string()),
            _ => Err(EvalError::failed("unsupported")),
        });
        let report = catalog.verify(&Verifier::new(2), Arc::new(eval)).await;

        assert!(report.is_clean());
        assert_eq!(report.summary.total, 1);
        assert_eq!(report.summary.matched, 1);
    }

    #[test]
    fn disk_errors_are_labelled_by_origin() {
        let dir = std::env::temp_dir()
            .join("exprdoc-lib-test")
            .join(format!("origin-{}", std::process::id()));
        let _ = std::fs::remove_dir_all(&dir);
        std::fs::create_dir_all(&dir).unwrap();
        std::fs::write(dir.join("a.json"), "{ not json").unwrap();
        std::fs::write(
            dir.join("b.json"),
            r#"{"name": "f", "type": "function", "groups": ["Math"], "examples": []}"#,
        )
        .unwrap();

        let catalog = Catalog::from_path(&dir).unwrap();
        let labels: Vec<String> = catalog
            .load_errors
            .iter()
            .map(|e| e.record.to_string())
            .collect();

        assert_eq!(labels.len(), 2);
        assert!(labels[0].ends_with("a.json"));
        assert!(labels[1].ends_with("b.json"));
        assert_eq!(catalog.load_errors[0].record.index, 0);
        assert_eq!(catalog.load_errors[1].record.index, 0);

        let _ = std::fs::remove_dir_all(&dir);
    }
}
