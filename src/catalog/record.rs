//! Record types for documented functions and operators.
//!
//! `RawRecord` is the shape records arrive in (every field optional, so a
//! missing field surfaces as a schema violation instead of a deserialize
//! failure). `FunctionDoc` is the validated, immutable entity produced by the
//! loader.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Where a record came from: its position in load order and, when read from
/// disk, the file it was read from.
///
/// Displays as the origin when there is one, since positions of records read
/// from disk and of files that failed to parse are counted separately.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize)]
pub struct RecordRef {
    /// Zero-based position in the input sequence.
    pub index: usize,
    /// Source location (e.g. `json/array_get.json` or `all.json#3`).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub origin: Option<String>,
}

impl fmt::Display for RecordRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.origin {
            Some(origin) => f.write_str(origin),
            None => write!(f, "record #{}", self.index),
        }
    }
}

/// Whether an entry documents a callable function or an operator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Kind {
    Function,
    Operator,
}

impl Kind {
    /// Parse the record's `type` field. Only the exact lowercase spellings
    /// are recognized.
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "function" => Some(Kind::Function),
            "operator" => Some(Kind::Operator),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Kind::Function => "function",
            Kind::Operator => "operator",
        }
    }
}

impl fmt::Display for Kind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A documented argument, in calling-convention order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Argument {
    /// Argument name (e.g. "pos")
    pub name: String,
    /// What the argument means
    pub description: String,
    /// Whether callers may omit the argument
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    pub optional: bool,
    /// Documented default value, if any
    #[serde(skip_serializing_if = "Option::is_none")]
    pub default: Option<String>,
}

/// A documented example: an expression and the literal text it evaluates to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Example {
    /// Expression source (e.g. "array_get(array('a','b','c'),1)")
    pub expression: String,
    /// Literal textual result (e.g. "'b'"). Never re-interpreted.
    pub expected: String,
    /// Optional remark shown alongside the example
    #[serde(skip_serializing_if = "Option::is_none")]
    pub note: Option<String>,
}

/// Validated documentation for one function or operator.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FunctionDoc {
    /// Function or operator name (e.g. "array_get", "BETWEEN")
    pub name: String,
    pub kind: Kind,
    /// Category labels, in record order; never empty
    pub groups: Vec<String>,
    /// Description of what the function does
    pub description: String,
    pub arguments: Vec<Argument>,
    /// Documented examples; never empty
    pub examples: Vec<Example>,
    /// Lowercase, deduplicated search tags
    pub tags: Vec<String>,
    #[serde(skip)]
    pub origin: RecordRef,
}

impl FunctionDoc {
    /// Check whether this entry carries the given (lowercase) tag.
    pub fn has_tag(&self, tag: &str) -> bool {
        self.tags.iter().any(|t| t == tag)
    }

    /// Render a short calling signature from the argument list,
    /// e.g. `array_get(array, pos)` or `value BETWEEN lower_bound AND upper_bound`.
    pub fn signature(&self) -> String {
        let args: Vec<String> = self
            .arguments
            .iter()
            .map(|a| {
                if a.optional {
                    format!("[{}]", a.name)
                } else {
                    a.name.clone()
                }
            })
            .collect();

        match self.kind {
            Kind::Function => format!("{}({})", self.name, args.join(", ")),
            Kind::Operator => match args.as_slice() {
                [] => self.name.clone(),
                [only] => format!("{} {}", self.name, only),
                [first, rest @ ..] => format!("{} {} {}", first, self.name, rest.join(" ")),
            },
        }
    }
}

/// A documentation record as deserialized from its source.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RawRecord {
    pub name: Option<String>,
    #[serde(rename = "type")]
    pub kind: Option<String>,
    pub groups: Option<Vec<String>>,
    pub description: Option<String>,
    #[serde(default)]
    pub arguments: Vec<RawArgument>,
    pub examples: Option<Vec<RawExample>>,
    #[serde(default)]
    pub tags: Vec<String>,
    /// Set by the source reader; not part of the record itself.
    #[serde(skip)]
    pub origin: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct RawArgument {
    #[serde(alias = "name")]
    pub arg: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub optional: bool,
    #[serde(default)]
    pub default: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct RawExample {
    pub expression: Option<String>,
    #[serde(alias = "expected")]
    pub returns: Option<String>,
    #[serde(default)]
    pub note: Option<String>,
}
