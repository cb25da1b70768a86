//! The evaluator capability and its backends.
//!
//! The verifier never knows how expressions are evaluated. Anything that can
//! turn an expression string into its canonical textual result implements
//! [`Evaluator`]: a closure wrapped with [`evaluator_fn`], the process-backed
//! [`CommandEvaluator`], or a caller's own type.

use std::future::Future;
use std::process::Stdio;
use std::time::Duration;

use serde::Serialize;
use thiserror::Error;
use tokio::process::Command;

/// Why an expression could not be evaluated.
#[derive(Error, Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum EvalError {
    /// The evaluator ran and rejected the expression.
    #[error("{message}")]
    Failed { message: String },

    #[error("evaluation timed out after {millis}ms")]
    TimedOut { millis: u64 },

    /// The evaluator could not be invoked at all.
    #[error("evaluator unavailable: {message}")]
    Unavailable { message: String },

    /// The evaluation task panicked.
    #[error("evaluator panicked: {message}")]
    Panicked { message: String },
}

impl EvalError {
    pub fn failed(message: impl Into<String>) -> Self {
        EvalError::Failed {
            message: message.into(),
        }
    }
}

/// Evaluates one expression to its canonical textual form.
///
/// Implementations must be deterministic and side-effect free; the verifier
/// calls them concurrently and never retries.
pub trait Evaluator: Send + Sync + 'static {
    fn evaluate(&self, expression: &str)
        -> impl Future<Output = Result<String, EvalError>> + Send;
}

/// An [`Evaluator`] backed by a synchronous closure.
#[derive(Clone)]
pub struct FnEvaluator<F> {
    f: F,
}

impl<F> std::fmt::Debug for FnEvaluator<F> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FnEvaluator").finish_non_exhaustive()
    }
}

/// Wrap a closure as an [`Evaluator`].
///
/// ```ignore
/// let echo = evaluator_fn(|expr| Ok(expr.to_string()));
/// ```
pub fn evaluator_fn<F>(f: F) -> FnEvaluator<F>
where
    F: Fn(&str) -> Result<String, EvalError> + Send + Sync + 'static,
{
    FnEvaluator { f }
}

impl<F> Evaluator for FnEvaluator<F>
where
    F: Fn(&str) -> Result<String, EvalError> + Send + Sync + 'static,
{
    fn evaluate(
        &self,
        expression: &str,
    ) -> impl Future<Output = Result<String, EvalError>> + Send {
        std::future::ready((self.f)(expression))
    }
}

/// Default per-expression timeout for [`CommandEvaluator`].
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);

/// Evaluates expressions by running an external program once per expression.
///
/// The expression is appended as the last argument. Standard output, minus a
/// single trailing line ending, is the result. A non-zero exit status is an
/// evaluation failure carrying the program's standard error.
#[derive(Debug, Clone)]
pub struct CommandEvaluator {
    program: String,
    args: Vec<String>,
    timeout: Duration,
}

impl CommandEvaluator {
    pub fn new(program: impl Into<String>, args: impl IntoIterator<Item = String>) -> Self {
        Self {
            program: program.into(),
            args: args.into_iter().collect(),
            timeout: DEFAULT_TIMEOUT,
        }
    }

    /// Build from a command line split into words (program first).
    /// Returns `None` for an empty command line.
    pub fn from_command_line(words: &[String]) -> Option<Self> {
        let (program, args) = words.split_first()?;
        Some(Self::new(program.clone(), args.iter().cloned()))
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn program(&self) -> &str {
        &self.program
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    async fn run(&self, expression: &str) -> Result<String, EvalError> {
        let child = Command::new(&self.program)
            .args(&self.args)
            .arg(expression)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| EvalError::Unavailable {
                message: format!("failed to start '{}': {}", self.program, e),
            })?;

        // Dropping the child on timeout kills it.
        let output = match tokio::time::timeout(self.timeout, child.wait_with_output()).await {
            Ok(result) => result.map_err(|e| EvalError::Unavailable {
                message: format!("failed to read output of '{}': {}", self.program, e),
            })?,
            Err(_) => {
                return Err(EvalError::TimedOut {
                    millis: self.timeout.as_millis() as u64,
                })
            }
        };

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
            let message = if stderr.is_empty() {
                format!("'{}' exited with {}", self.program, output.status)
            } else {
                stderr
            };
            return Err(EvalError::Failed { message });
        }

        let stdout = String::from_utf8(output.stdout)
            .map_err(|_| EvalError::failed("evaluator produced non-UTF-8 output"))?;
        Ok(strip_line_ending(stdout))
    }
}

impl Evaluator for CommandEvaluator {
    fn evaluate(
        &self,
        expression: &str,
    ) -> impl Future<Output = Result<String, EvalError>> + Send {
        self.run(expression)
    }
}

/// Remove exactly one trailing `\n` or `\r\n`. Other whitespace is significant.
fn strip_line_ending(mut s: String) -> String {
    if s.ends_with('\n') {
        s.pop();
        if s.ends_with('\r') {
            s.pop();
        }
    }
    s
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn fn_evaluator_calls_closure() {
        let eval = evaluator_fn(|expr| {
            if expr.is_empty() {
                Err(EvalError::failed("empty"))
            } else {
                Ok(expr.to_uppercase())
            }
        });

        assert_eq!(eval.evaluate("true").await, Ok("TRUE".to_string()));
        assert_eq!(eval.evaluate("").await, Err(EvalError::failed("empty")));
    }

    #[test]
    fn strips_single_line_ending() {
        assert_eq!(strip_line_ending("'b'\n".to_string()), "'b'");
        assert_eq!(strip_line_ending("TRUE\r\n".to_string()), "TRUE");
        assert_eq!(strip_line_ending("x\n\n".to_string()), "x\n");
        assert_eq!(strip_line_ending(" 1 ".to_string()), " 1 ");
    }

    #[test]
    fn command_line_requires_program() {
        assert!(CommandEvaluator::from_command_line(&[]).is_none());

        let words = vec!["eval".to_string(), "--quiet".to_string()];
        let eval = CommandEvaluator::from_command_line(&words).unwrap();
        assert_eq!(eval.program(), "eval");
        assert_eq!(eval.timeout(), DEFAULT_TIMEOUT);
    }

    #[test]
    fn error_messages() {
        assert_eq!(EvalError::failed("bad token").to_string(), "bad token");
        assert_eq!(
            EvalError::TimedOut { millis: 250 }.to_string(),
            "evaluation timed out after 250ms"
        );
    }

    #[cfg(unix)]
    fn sh(script: &str) -> CommandEvaluator {
        CommandEvaluator::new("sh", ["-c".to_string(), script.to_string()])
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn command_returns_stdout() {
        // The expression becomes $0 of the script
        let eval = sh("echo \"$0\"");
        assert_eq!(
            eval.evaluate("2 BETWEEN 1 AND 3").await,
            Ok("2 BETWEEN 1 AND 3".to_string())
        );
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn command_failure_carries_stderr() {
        let eval = sh("echo 'parser error' >&2; exit 3");
        assert_eq!(
            eval.evaluate("1 +").await,
            Err(EvalError::failed("parser error"))
        );
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn command_times_out() {
        let eval = sh("sleep 5").with_timeout(Duration::from_millis(100));
        assert_eq!(
            eval.evaluate("1").await,
            Err(EvalError::TimedOut { millis: 100 })
        );
    }

    #[tokio::test]
    async fn missing_program_is_unavailable() {
        let eval = CommandEvaluator::new("exprdoc-no-such-evaluator", Vec::new());
        assert!(matches!(
            eval.evaluate("1").await,
            Err(EvalError::Unavailable { .. })
        ));
    }
}
