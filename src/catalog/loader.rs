//! Validation of raw records into `FunctionDoc`s.

use std::fmt;

use serde::Serialize;
use thiserror::Error;

use super::record::{Argument, Example, FunctionDoc, Kind, RawRecord, RecordRef};

/// A single structural problem with a record.
#[derive(Error, Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "violation", rename_all = "snake_case")]
pub enum SchemaViolation {
    #[error("missing required field `{field}`")]
    MissingField { field: &'static str },

    #[error("field `{field}` is empty")]
    EmptyField { field: &'static str },

    #[error("unrecognized type `{value}` (expected `function` or `operator`)")]
    UnknownKind { value: String },

    #[error("example #{index} has an empty expression")]
    EmptyExpression { index: usize },

    #[error("example #{index} has no expected value")]
    MissingExpected { index: usize },

    #[error("argument #{index} has no name")]
    UnnamedArgument { index: usize },

    /// The record could not be read or deserialized at all.
    #[error("malformed record: {reason}")]
    Malformed { reason: String },
}

/// A rejected record and everything wrong with it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LoadError {
    pub record: RecordRef,
    /// The record's name, when it had a usable one.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    pub violations: Vec<SchemaViolation>,
}

impl fmt::Display for LoadError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.name {
            Some(name) => write!(f, "{} `{}`: ", self.record, name)?,
            None => write!(f, "{}: ", self.record)?,
        }
        for (i, v) in self.violations.iter().enumerate() {
            if i > 0 {
                f.write_str("; ")?;
            }
            write!(f, "{v}")?;
        }
        Ok(())
    }
}

/// Output of [`load`]: the accepted docs and one error per rejected record.
#[derive(Debug, Default)]
pub struct LoadOutcome {
    pub docs: Vec<FunctionDoc>,
    pub errors: Vec<LoadError>,
}

/// Validate a batch of raw records.
///
/// Loading is best-effort: a rejected record never stops the batch, and every
/// violation of a record is reported together. Positions in the input become
/// each record's `RecordRef::index`.
pub fn load(records: impl IntoIterator<Item = RawRecord>) -> LoadOutcome {
    let mut outcome = LoadOutcome::default();

    for (index, raw) in records.into_iter().enumerate() {
        let record = RecordRef {
            index,
            origin: raw.origin.clone(),
        };

        match validate(raw, record.clone()) {
            Ok(doc) => {
                tracing::debug!(name = %doc.name, %record, "loaded record");
                outcome.docs.push(doc);
            }
            Err(error) => {
                tracing::warn!(%error, "rejected record");
                outcome.errors.push(error);
            }
        }
    }

    outcome
}

/// Returns the value unchanged if present and non-blank, recording a violation otherwise.
fn required_text(
    value: Option<String>,
    field: &'static str,
    violations: &mut Vec<SchemaViolation>,
) -> Option<String> {
    match value {
        None => {
            violations.push(SchemaViolation::MissingField { field });
            None
        }
        Some(v) if v.trim().is_empty() => {
            violations.push(SchemaViolation::EmptyField { field });
            None
        }
        Some(v) => Some(v),
    }
}

fn validate(raw: RawRecord, record: RecordRef) -> Result<FunctionDoc, LoadError> {
    let mut violations = Vec::new();

    let name = required_text(raw.name, "name", &mut violations);

    let kind = match raw.kind {
        None => {
            violations.push(SchemaViolation::MissingField { field: "type" });
            None
        }
        Some(value) => {
            let kind = Kind::parse(&value);
            if kind.is_none() {
                violations.push(SchemaViolation::UnknownKind { value });
            }
            kind
        }
    };

    let groups: Vec<String> = match raw.groups {
        None => {
            violations.push(SchemaViolation::MissingField { field: "groups" });
            Vec::new()
        }
        Some(groups) => {
            let groups: Vec<String> = groups
                .into_iter()
                .map(|g| g.trim().to_string())
                .filter(|g| !g.is_empty())
                .collect();
            if groups.is_empty() {
                violations.push(SchemaViolation::EmptyField { field: "groups" });
            }
            groups
        }
    };

    let description = required_text(raw.description, "description", &mut violations);

    let mut arguments = Vec::with_capacity(raw.arguments.len());
    for (index, arg) in raw.arguments.into_iter().enumerate() {
        match arg.arg.filter(|a| !a.trim().is_empty()) {
            Some(name) => arguments.push(Argument {
                name,
                description: arg.description.unwrap_or_default(),
                optional: arg.optional,
                default: arg.default,
            }),
            None => violations.push(SchemaViolation::UnnamedArgument { index }),
        }
    }

    let mut examples = Vec::new();
    match raw.examples {
        None => violations.push(SchemaViolation::MissingField { field: "examples" }),
        Some(raw_examples) if raw_examples.is_empty() => {
            violations.push(SchemaViolation::EmptyField { field: "examples" })
        }
        Some(raw_examples) => {
            for (index, ex) in raw_examples.into_iter().enumerate() {
                let expression = ex.expression.filter(|e| !e.trim().is_empty());
                if expression.is_none() {
                    violations.push(SchemaViolation::EmptyExpression { index });
                }
                if ex.returns.is_none() {
                    violations.push(SchemaViolation::MissingExpected { index });
                }
                if let (Some(expression), Some(expected)) = (expression, ex.returns) {
                    examples.push(Example {
                        expression,
                        expected,
                        note: ex.note,
                    });
                }
            }
        }
    }

    let tags = normalize_tags(raw.tags);

    match (name, kind, description) {
        (Some(name), Some(kind), Some(description)) if violations.is_empty() => Ok(FunctionDoc {
            name,
            kind,
            groups,
            description,
            arguments,
            examples,
            tags,
            origin: record,
        }),
        (name, _, _) => Err(LoadError {
            record,
            name,
            violations,
        }),
    }
}

/// Lowercase, trim, and deduplicate tags, keeping first-seen order.
fn normalize_tags(tags: Vec<String>) -> Vec<String> {
    let mut out: Vec<String> = Vec::with_capacity(tags.len());
    for tag in tags {
        let tag = tag.trim().to_lowercase();
        if !tag.is_empty() && !out.contains(&tag) {
            out.push(tag);
        }
    }
    out
}
