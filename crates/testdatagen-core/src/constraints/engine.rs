use tracing::trace;

use crate::value::Value;

use super::context::{EvaluationContext, Record};
use super::outcome::{ConstraintEvaluationError, Outcome};
use super::{Constraint, Severity};

/// A violated constraint together with what it was evaluated against.
#[derive(Debug, Clone)]
pub struct ConstraintViolation {
    pub constraint: Constraint,
    pub value: Value,
    pub field: Option<String>,
    pub record: Option<Record>,
    pub message: String,
    pub severity: Severity,
}

/// A constraint that could not be evaluated.
#[derive(Debug, Clone)]
pub struct EvaluationFailure {
    pub constraint: String,
    pub kind: &'static str,
    pub field: Option<String>,
    pub error: ConstraintEvaluationError,
}

#[derive(Debug, Clone, Default)]
pub struct EvaluationReport {
    pub violations: Vec<ConstraintViolation>,
    pub failures: Vec<EvaluationFailure>,
}

impl EvaluationReport {
    pub fn is_clean(&self) -> bool {
        self.violations.is_empty() && self.failures.is_empty()
    }

    pub fn has_errors(&self) -> bool {
        self.violations
            .iter()
            .any(|violation| violation.severity == Severity::Error)
    }

    pub fn merge(&mut self, other: EvaluationReport) {
        self.violations.extend(other.violations);
        self.failures.extend(other.failures);
    }
}

/// Ordered collection of constraints evaluated together.
#[derive(Debug, Clone, Default)]
pub struct ConstraintSet {
    constraints: Vec<Constraint>,
}

impl ConstraintSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, constraint: Constraint) {
        self.constraints.push(constraint);
    }

    pub fn iter(&self) -> impl Iterator<Item = &Constraint> {
        self.constraints.iter()
    }

    pub fn len(&self) -> usize {
        self.constraints.len()
    }

    pub fn is_empty(&self) -> bool {
        self.constraints.is_empty()
    }

    /// Evaluate every enabled constraint against `value`.
    pub fn evaluate(&self, value: &Value, ctx: &EvaluationContext<'_>) -> EvaluationReport {
        let mut report = EvaluationReport::default();
        for constraint in self.constraints.iter().filter(|constraint| constraint.enabled) {
            match constraint.evaluate(value, ctx) {
                Outcome::Satisfied => {}
                Outcome::Violated(message) => {
                    trace!(constraint = %constraint.name, %message, "constraint violated");
                    report.violations.push(ConstraintViolation {
                        constraint: constraint.clone(),
                        value: value.clone(),
                        field: ctx.field_name.map(str::to_string),
                        record: ctx.record.cloned(),
                        message,
                        severity: constraint.severity,
                    });
                }
                Outcome::EvaluationError(error) => {
                    trace!(constraint = %constraint.name, %error, "constraint not evaluated");
                    report.failures.push(EvaluationFailure {
                        constraint: constraint.name.clone(),
                        kind: constraint.kind.name(),
                        field: ctx.field_name.map(str::to_string),
                        error,
                    });
                }
            }
        }
        report
    }
}

impl FromIterator<Constraint> for ConstraintSet {
    fn from_iter<I: IntoIterator<Item = Constraint>>(iter: I) -> Self {
        Self {
            constraints: iter.into_iter().collect(),
        }
    }
}

impl Extend<Constraint> for ConstraintSet {
    fn extend<I: IntoIterator<Item = Constraint>>(&mut self, iter: I) {
        self.constraints.extend(iter);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::constraints::ConstraintKind;

    #[test]
    fn separates_violations_from_failures_and_skips_disabled() {
        let set: ConstraintSet = [
            Constraint::new("not_null", ConstraintKind::NotNull),
            Constraint::new("rule", ConstraintKind::Expression("value > 0".to_string())),
            Constraint::new("off", ConstraintKind::NotNull).disabled(),
            Constraint::new("soft", ConstraintKind::NotNull).with_severity(Severity::Warning),
        ]
        .into_iter()
        .collect();

        let ctx = EvaluationContext::new().with_field("age");
        let report = set.evaluate(&Value::Null, &ctx);

        assert_eq!(report.violations.len(), 2);
        assert_eq!(report.failures.len(), 1);
        assert_eq!(report.failures[0].error, ConstraintEvaluationError::UnresolvedEvaluator);
        assert_eq!(report.violations[0].field.as_deref(), Some("age"));
        assert_eq!(report.violations[1].severity, Severity::Warning);
        assert!(report.has_errors());
    }
}
