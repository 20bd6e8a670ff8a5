use thiserror::Error;

use super::context::ContextSlot;

/// Result of evaluating a single constraint.
#[derive(Debug, Clone, PartialEq)]
pub enum Outcome {
    Satisfied,
    Violated(String),
    /// The constraint could not be evaluated; never a data-quality verdict.
    EvaluationError(ConstraintEvaluationError),
}

impl Outcome {
    pub fn is_satisfied(&self) -> bool {
        matches!(self, Outcome::Satisfied)
    }

    pub fn is_violated(&self) -> bool {
        matches!(self, Outcome::Violated(_))
    }

    pub(crate) fn from_check(passed: bool, message: impl FnOnce() -> String) -> Self {
        if passed {
            Outcome::Satisfied
        } else {
            Outcome::Violated(message())
        }
    }
}

impl From<ConstraintEvaluationError> for Outcome {
    fn from(error: ConstraintEvaluationError) -> Self {
        Outcome::EvaluationError(error)
    }
}

/// Wiring failures raised while evaluating constraints against data.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ConstraintEvaluationError {
    #[error("missing evaluation context: {0}")]
    MissingContext(ContextSlot),
    #[error("no expression evaluator configured")]
    UnresolvedEvaluator,
    #[error("unknown validator '{0}'")]
    UnresolvedValidator(String),
    #[error("dependency field '{0}' is not present in the record")]
    MissingDependency(String),
    #[error("expression '{expression}' failed: {reason}")]
    Expression { expression: String, reason: String },
    #[error("validator '{name}' failed: {reason}")]
    Validator { name: String, reason: String },
}
