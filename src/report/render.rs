//! Report output formats.

use std::fmt::Write;

use super::builder::Report;
use crate::verify::Outcome;

/// Output format selection
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum OutputFormat {
    /// Human-readable terminal output
    #[default]
    Human,
    /// JSON with the full report structure
    Json,
}

impl std::str::FromStr for OutputFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "human" | "text" => Ok(OutputFormat::Human),
            "json" => Ok(OutputFormat::Json),
            other => Err(format!("unknown output format: {}", other)),
        }
    }
}

/// Render a report in the given format.
pub fn render(report: &Report, format: OutputFormat) -> String {
    match format {
        OutputFormat::Human => render_human(report),
        OutputFormat::Json => render_json(report),
    }
}

/// Pretty-printed JSON.
pub fn render_json(report: &Report) -> String {
    // Report contains only strings, integers and bools, so this cannot fail.
    serde_json::to_string_pretty(report).unwrap_or_else(|e| format!("{{\"error\": \"{e}\"}}"))
}

/// Plain-text summary followed by one line per problem.
pub fn render_human(report: &Report) -> String {
    let s = &report.summary;
    let mut out = String::new();

    let _ = writeln!(
        out,
        "examples: {} total, {} matched, {} mismatched, {} failed, {} skipped",
        s.total, s.matched, s.mismatched, s.failed, s.skipped
    );
    let _ = writeln!(
        out,
        "records:  {} schema errors, {} name conflicts",
        s.schema_errors, s.name_conflicts
    );

    if !report.load_errors.is_empty() {
        let _ = writeln!(out, "\nschema errors:");
        for error in &report.load_errors {
            let _ = writeln!(out, "  {error}");
        }
    }

    if !report.name_conflicts.is_empty() {
        let _ = writeln!(out, "\nname conflicts:");
        for c in &report.name_conflicts {
            let _ = writeln!(out, "  {}: {} duplicates {}", c.name, c.duplicate, c.first);
        }
    }

    let mut mismatches = report.mismatches().peekable();
    if mismatches.peek().is_some() {
        let _ = writeln!(out, "\nmismatches:");
        for r in mismatches {
            if let Outcome::Mismatch { got, expected } = &r.outcome {
                let _ = writeln!(
                    out,
                    "  {} example #{}: {}\n    expected: {}\n    got:      {}",
                    r.function, r.example_index, r.expression, expected, got
                );
            }
        }
    }

    let mut failures = report.failures().peekable();
    if failures.peek().is_some() {
        let _ = writeln!(out, "\nevaluation failures:");
        for r in failures {
            if let Outcome::EvalFailed { error } = &r.outcome {
                let _ = writeln!(
                    out,
                    "  {} example #{}: {}\n    error: {}",
                    r.function, r.example_index, r.expression, error
                );
            }
        }
    }

    if report.cancelled {
        let _ = writeln!(out, "\nrun cancelled before all examples were evaluated");
    }

    let _ = writeln!(
        out,
        "\nresult: {}",
        if report.is_clean() { "clean" } else { "FAILED" }
    );
    out
}
