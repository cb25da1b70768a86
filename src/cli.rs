//! Command-line interface for the `exprdoc` binary.

use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;

use clap::{Args, Parser, Subcommand};
use regex::Regex;
use thiserror::Error;
use tokio::sync::watch;

use crate::catalog::{FunctionDoc, SourceError};
use crate::report::{render, OutputFormat};
use crate::settings::{discover_settings, load_settings, Settings};
use crate::verify::{CommandEvaluator, Verifier};
use crate::Catalog;

/// exprdoc CLI arguments
#[derive(Parser, Debug)]
#[command(name = "exprdoc")]
#[command(author, version, about = "Verify documented examples of an expression language")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    /// Settings file (default: discover exprdoc.toml from the working directory)
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Increase log verbosity (-v info, -vv debug, -vvv trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Load records and evaluate every documented example
    Verify(VerifyArgs),
    /// Load and index records without evaluating examples
    Check(CheckArgs),
    /// Print the reference entry for one function or operator
    Show {
        /// Exact, case-sensitive name
        name: String,
        #[command(flatten)]
        records: RecordArgs,
    },
    /// List functions, optionally by group or tag
    List {
        #[arg(long)]
        group: Option<String>,
        #[arg(long)]
        tag: Option<String>,
        /// Print the known group labels instead of functions
        #[arg(long, conflicts_with_all = ["group", "tag", "tags"])]
        groups: bool,
        /// Print the known tags instead of functions
        #[arg(long, conflicts_with_all = ["group", "tag"])]
        tags: bool,
        #[command(flatten)]
        records: RecordArgs,
    },
}

#[derive(Args, Debug)]
pub struct RecordArgs {
    /// JSON record file or directory (overrides settings)
    #[arg(long)]
    pub records: Option<PathBuf>,
}

#[derive(Args, Debug)]
pub struct OutputArgs {
    /// Output format: human, json
    #[arg(long, default_value = "human")]
    pub format: OutputFormat,

    /// Output file (stdout if not specified)
    #[arg(short, long)]
    pub output: Option<PathBuf>,
}

#[derive(Args, Debug)]
pub struct VerifyArgs {
    #[command(flatten)]
    pub records: RecordArgs,

    #[command(flatten)]
    pub out: OutputArgs,

    /// Only verify functions whose name matches this regex
    #[arg(long)]
    pub filter: Option<String>,

    /// Maximum number of evaluations in flight
    #[arg(short, long)]
    pub jobs: Option<usize>,

    /// Evaluator command; the expression is appended as the last argument
    #[arg(last = true, value_name = "EVALUATOR")]
    pub evaluator: Vec<String>,
}

#[derive(Args, Debug)]
pub struct CheckArgs {
    #[command(flatten)]
    pub records: RecordArgs,

    #[command(flatten)]
    pub out: OutputArgs,
}

/// Errors that stop the CLI before a report can be produced.
#[derive(Error, Debug)]
pub enum CliError {
    #[error("no record path given; pass --records or set [records] path in exprdoc.toml")]
    NoRecords,

    #[error("settings file '{}' does not exist", .0.display())]
    MissingConfig(PathBuf),

    #[error("no evaluator configured; pass one after `--` or set [evaluator] command in exprdoc.toml")]
    NoEvaluator,

    #[error(transparent)]
    Source(#[from] SourceError),

    #[error("invalid --filter pattern: {0}")]
    Filter(#[from] regex::Error),

    #[error("no function named '{0}'")]
    UnknownFunction(String),

    #[error("failed to write '{}': {source}", path.display())]
    Output {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Run the CLI. Returns 0 for a clean report, 1 for a report with problems.
pub async fn run(cli: Cli) -> Result<ExitCode, CliError> {
    let (settings, settings_dir) = match &cli.config {
        Some(path) if !path.is_file() => return Err(CliError::MissingConfig(path.clone())),
        Some(path) => (
            load_settings(path),
            path.parent().map(Path::to_path_buf).unwrap_or_default(),
        ),
        None => {
            let cwd = std::env::current_dir().unwrap_or_else(|_| PathBuf::from("."));
            discover_settings(&cwd)
        }
    };
    tracing::debug!(settings_dir = %settings_dir.display(), "resolved settings");

    match cli.command {
        Command::Verify(args) => run_verify(args, &settings, &settings_dir).await,
        Command::Check(args) => {
            let catalog = load_catalog(&args.records, &settings, &settings_dir)?;
            let report = catalog.into_report();
            emit(&render(&report, args.out.format), &args.out)?;
            Ok(exit_code(report.is_clean()))
        }
        Command::Show { name, records } => {
            let catalog = load_catalog(&records, &settings, &settings_dir)?;
            let doc = catalog
                .registry
                .by_name(&name)
                .ok_or(CliError::UnknownFunction(name.clone()))?;
            print!("{}", format_doc(doc));
            Ok(ExitCode::SUCCESS)
        }
        Command::List {
            group,
            tag,
            groups,
            tags,
            records,
        } => {
            let catalog = load_catalog(&records, &settings, &settings_dir)?;
            let registry = &catalog.registry;
            if groups || tags {
                let labels = if groups { registry.groups() } else { registry.tags() };
                for label in labels {
                    println!("{label}");
                }
                return Ok(ExitCode::SUCCESS);
            }
            let docs: Vec<&FunctionDoc> = match (&group, &tag) {
                (Some(g), Some(t)) => registry
                    .by_group(g)
                    .into_iter()
                    .filter(|d| d.has_tag(&t.to_lowercase()))
                    .collect(),
                (Some(g), None) => registry.by_group(g),
                (None, Some(t)) => registry.by_tag(t),
                (None, None) => registry.iter().collect(),
            };
            for doc in docs {
                println!("{:<24} {:<9} {}", doc.name, doc.kind, doc.groups.join(", "));
            }
            Ok(ExitCode::SUCCESS)
        }
    }
}

async fn run_verify(
    args: VerifyArgs,
    settings: &Settings,
    settings_dir: &Path,
) -> Result<ExitCode, CliError> {
    let evaluator = if args.evaluator.is_empty() {
        settings.command_evaluator()
    } else {
        CommandEvaluator::from_command_line(&args.evaluator)
            .map(|e| e.with_timeout(settings.evaluator_timeout()))
    };
    let evaluator = evaluator.ok_or(CliError::NoEvaluator)?;

    let mut catalog = load_catalog(&args.records, settings, settings_dir)?;
    if let Some(pattern) = &args.filter {
        let re = Regex::new(pattern)?;
        catalog = catalog.retain(|d| re.is_match(&d.name));
    }

    let verifier = match args.jobs.or(settings.concurrency()) {
        Some(n) => Verifier::new(n),
        None => Verifier::default(),
    };
    tracing::info!(
        evaluator = evaluator.program(),
        timeout_ms = evaluator.timeout().as_millis() as u64,
        concurrency = verifier.concurrency(),
        "starting verification"
    );

    let (cancel_tx, cancel_rx) = watch::channel(false);
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::warn!("interrupted; waiting for in-flight examples");
            let _ = cancel_tx.send(true);
        }
    });

    let report = catalog
        .verify_until(&verifier, Arc::new(evaluator), cancel_rx)
        .await;
    emit(&render(&report, args.out.format), &args.out)?;
    Ok(exit_code(report.is_clean()))
}

fn load_catalog(
    args: &RecordArgs,
    settings: &Settings,
    settings_dir: &Path,
) -> Result<Catalog, CliError> {
    let path = args
        .records
        .clone()
        .or_else(|| settings.records_path(settings_dir))
        .ok_or(CliError::NoRecords)?;
    Ok(Catalog::from_path(&path)?)
}

fn emit(text: &str, out: &OutputArgs) -> Result<(), CliError> {
    match &out.output {
        Some(path) => std::fs::write(path, text).map_err(|source| CliError::Output {
            path: path.clone(),
            source,
        }),
        None => {
            print!("{text}");
            Ok(())
        }
    }
}

fn exit_code(clean: bool) -> ExitCode {
    if clean {
        ExitCode::SUCCESS
    } else {
        ExitCode::from(1)
    }
}

/// Plain-text reference entry for one doc.
pub fn format_doc(doc: &FunctionDoc) -> String {
    let mut out = format!("{}\n\n", doc.signature());
    out.push_str(&format!("{} in {}\n\n", doc.kind, doc.groups.join(", ")));
    out.push_str(&format!("{}\n", doc.description));

    if !doc.arguments.is_empty() {
        out.push_str("\narguments:\n");
        for arg in &doc.arguments {
            out.push_str(&format!("  {:<14} {}", arg.name, arg.description));
            if let Some(default) = &arg.default {
                out.push_str(&format!(" (default: {default})"));
            }
            out.push('\n');
        }
    }

    out.push_str("\nexamples:\n");
    for ex in &doc.examples {
        out.push_str(&format!("  {} → {}\n", ex.expression, ex.expected));
        if let Some(note) = &ex.note {
            out.push_str(&format!("    {note}\n"));
        }
    }

    if !doc.tags.is_empty() {
        out.push_str(&format!("\ntags: {}\n", doc.tags.join(", ")));
    }
    out
}
