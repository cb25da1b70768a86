//! Checking documented examples against an evaluator.

use std::collections::HashMap;
use std::sync::Arc;

use serde::Serialize;
use tokio::sync::watch;
use tokio::task::{Id, JoinError, JoinSet};

use super::evaluator::{EvalError, Evaluator};
use crate::registry::Registry;

/// What happened to one example.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum Outcome {
    /// The evaluator's output is byte-for-byte the documented value.
    Match,
    /// The evaluator succeeded with a different value.
    Mismatch { got: String, expected: String },
    /// The evaluator reported an error.
    EvalFailed { error: EvalError },
}

impl Outcome {
    pub fn is_match(&self) -> bool {
        matches!(self, Outcome::Match)
    }
}

/// Outcome of one example of one function.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct VerificationResult {
    pub function: String,
    /// Position of the example within its function's examples.
    pub example_index: usize,
    pub expression: String,
    #[serde(flatten)]
    pub outcome: Outcome,
}

/// All results of a verification run.
///
/// `results` are ordered by function load order, then example order.
/// Examples that were never scheduled because the run was cancelled are
/// counted in `skipped`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct VerificationRun {
    pub results: Vec<VerificationResult>,
    pub skipped: usize,
    pub cancelled: bool,
}

impl From<Vec<VerificationResult>> for VerificationRun {
    fn from(results: Vec<VerificationResult>) -> Self {
        Self {
            results,
            skipped: 0,
            cancelled: false,
        }
    }
}

/// Compare an evaluation result against the documented value.
pub fn compare(expected: &str, result: Result<String, EvalError>) -> Outcome {
    match result {
        Ok(got) if got == expected => Outcome::Match,
        Ok(got) => Outcome::Mismatch {
            got,
            expected: expected.to_string(),
        },
        Err(error) => Outcome::EvalFailed { error },
    }
}

/// One example to evaluate.
struct Job<'a> {
    function: &'a str,
    example_index: usize,
    expression: &'a str,
    expected: &'a str,
}

/// Runs every example in a registry through an evaluator with bounded
/// concurrency.
#[derive(Debug, Clone)]
pub struct Verifier {
    concurrency: usize,
}

impl Default for Verifier {
    fn default() -> Self {
        let concurrency = std::thread::available_parallelism()
            .map(|n| n.get())
            .unwrap_or(4);
        Self::new(concurrency)
    }
}

impl Verifier {
    /// A verifier with at most `concurrency` evaluations in flight (minimum 1).
    pub fn new(concurrency: usize) -> Self {
        Self {
            concurrency: concurrency.max(1),
        }
    }

    pub fn concurrency(&self) -> usize {
        self.concurrency
    }

    /// Verify every example in `registry`.
    pub async fn verify<E: Evaluator>(
        &self,
        registry: &Registry,
        evaluator: Arc<E>,
    ) -> VerificationRun {
        let (_keep_open, cancel) = watch::channel(false);
        self.verify_until(registry, evaluator, cancel).await
    }

    /// Verify every example in `registry` until `cancel` reads `true`.
    ///
    /// After cancellation no new evaluations are started; evaluations already
    /// in flight are awaited and their results returned.
    pub async fn verify_until<E: Evaluator>(
        &self,
        registry: &Registry,
        evaluator: Arc<E>,
        cancel: watch::Receiver<bool>,
    ) -> VerificationRun {
        let jobs: Vec<Job<'_>> = registry
            .iter()
            .flat_map(|doc| {
                doc.examples
                    .iter()
                    .enumerate()
                    .map(move |(example_index, ex)| Job {
                        function: &doc.name,
                        example_index,
                        expression: &ex.expression,
                        expected: &ex.expected,
                    })
            })
            .collect();

        tracing::info!(
            functions = registry.len(),
            examples = jobs.len(),
            concurrency = self.concurrency,
            "verifying examples"
        );

        // One slot per job, filled only by this loop.
        let mut slots: Vec<Option<Outcome>> = (0..jobs.len()).map(|_| None).collect();
        let mut tasks: JoinSet<Result<String, EvalError>> = JoinSet::new();
        let mut in_flight: HashMap<Id, usize> = HashMap::new();
        let mut cancelled = false;

        for (index, job) in jobs.iter().enumerate() {
            while tasks.len() >= self.concurrency {
                if let Some(joined) = tasks.join_next_with_id().await {
                    store(&mut slots, &jobs, &mut in_flight, joined);
                }
            }

            if *cancel.borrow() {
                cancelled = true;
                tracing::warn!(scheduled = index, total = jobs.len(), "verification cancelled");
                break;
            }

            let evaluator = Arc::clone(&evaluator);
            let expression = job.expression.to_string();
            let handle = tasks.spawn(async move { evaluator.evaluate(&expression).await });
            in_flight.insert(handle.id(), index);
        }

        while let Some(joined) = tasks.join_next_with_id().await {
            store(&mut slots, &jobs, &mut in_flight, joined);
        }

        let mut run = VerificationRun {
            cancelled,
            ..Default::default()
        };
        for (job, slot) in jobs.iter().zip(slots) {
            match slot {
                Some(outcome) => run.results.push(VerificationResult {
                    function: job.function.to_string(),
                    example_index: job.example_index,
                    expression: job.expression.to_string(),
                    outcome,
                }),
                None => run.skipped += 1,
            }
        }

        tracing::info!(
            completed = run.results.len(),
            matched = run.results.iter().filter(|r| r.outcome.is_match()).count(),
            skipped = run.skipped,
            "verification finished"
        );
        run
    }
}

fn store(
    slots: &mut [Option<Outcome>],
    jobs: &[Job<'_>],
    in_flight: &mut HashMap<Id, usize>,
    joined: Result<(Id, Result<String, EvalError>), JoinError>,
) {
    let (id, result) = match joined {
        Ok((id, result)) => (id, result),
        Err(e) if e.is_panic() => (
            e.id(),
            Err(EvalError::Panicked {
                message: panic_message(e),
            }),
        ),
        Err(e) => {
            // Aborted by runtime shutdown; the slot stays empty and counts as
            // skipped.
            tracing::error!(error = %e, "verification task lost");
            in_flight.remove(&e.id());
            return;
        }
    };
    let Some(index) = in_flight.remove(&id) else {
        tracing::error!(task = %id, "result for unknown verification task");
        return;
    };

    let job = &jobs[index];
    let outcome = compare(job.expected, result);

    match &outcome {
        Outcome::Match => {}
        Outcome::Mismatch { got, expected } => tracing::debug!(
            function = job.function,
            expression = job.expression,
            %got,
            %expected,
            "example mismatch"
        ),
        Outcome::EvalFailed { error } => tracing::debug!(
            function = job.function,
            expression = job.expression,
            %error,
            "example evaluation failed"
        ),
    }

    slots[index] = Some(outcome);
}

fn panic_message(e: JoinError) -> String {
    let payload = e.into_panic();
    if let Some(msg) = payload.downcast_ref::<&str>() {
        msg.to_string()
    } else if let Some(msg) = payload.downcast_ref::<String>() {
        msg.clone()
    } else {
        "evaluator panicked".to_string()
    }
}
