//! Example verification.
//!
//! This module provides:
//! - `Evaluator`, the single-method capability the verifier calls
//! - `evaluator_fn` and `CommandEvaluator` evaluator backends
//! - `Verifier` to run every documented example with bounded concurrency

mod evaluator;
mod verifier;

pub use evaluator::{
    evaluator_fn, CommandEvaluator, EvalError, Evaluator, FnEvaluator, DEFAULT_TIMEOUT,
};
pub use verifier::{compare, Outcome, VerificationResult, VerificationRun, Verifier};
