use crate::ast::Params;
use crate::value::Value;

use super::Constraint;
use super::context::{ContextSlot, EvaluationContext};
use super::outcome::{ConstraintEvaluationError, Outcome};

pub(super) fn expression(expression: &str, value: &Value, ctx: &EvaluationContext<'_>) -> Outcome {
    match run_expression(expression, value, ctx) {
        Ok(true) => Outcome::Satisfied,
        Ok(false) => Outcome::Violated(format!("expression '{expression}' evaluated to false")),
        Err(error) => error.into(),
    }
}

pub(super) fn conditional(
    condition: &str,
    then: &Constraint,
    otherwise: Option<&Constraint>,
    value: &Value,
    ctx: &EvaluationContext<'_>,
) -> Outcome {
    match run_expression(condition, value, ctx) {
        Ok(true) => then.evaluate(value, ctx),
        Ok(false) => match otherwise {
            Some(otherwise) => otherwise.evaluate(value, ctx),
            None => Outcome::Satisfied,
        },
        Err(error) => error.into(),
    }
}

pub(super) fn custom(
    validator: &str,
    params: &Params,
    value: &Value,
    ctx: &EvaluationContext<'_>,
) -> Outcome {
    let Some(validators) = ctx.validators else {
        return ConstraintEvaluationError::MissingContext(ContextSlot::Validators).into();
    };
    let Some(named) = validators.get(validator) else {
        return ConstraintEvaluationError::UnresolvedValidator(validator.to_string()).into();
    };
    match named.validate(value, params, ctx.record) {
        Ok(passed) => Outcome::from_check(passed, || {
            format!("value '{value}' rejected by validator '{validator}'")
        }),
        Err(reason) => ConstraintEvaluationError::Validator {
            name: validator.to_string(),
            reason,
        }
        .into(),
    }
}

pub(super) fn dependent_field(
    fields: &[String],
    expression_source: &str,
    value: &Value,
    ctx: &EvaluationContext<'_>,
) -> Outcome {
    if ctx.expressions.is_none() {
        return ConstraintEvaluationError::UnresolvedEvaluator.into();
    }
    let Some(record) = ctx.record else {
        return ConstraintEvaluationError::MissingContext(ContextSlot::Record).into();
    };
    if let Some(missing) = fields.iter().find(|field| !record.contains_key(field.as_str())) {
        return ConstraintEvaluationError::MissingDependency(missing.clone()).into();
    }
    expression(expression_source, value, ctx)
}

fn run_expression(
    expression: &str,
    value: &Value,
    ctx: &EvaluationContext<'_>,
) -> Result<bool, ConstraintEvaluationError> {
    let evaluator = ctx
        .expressions
        .ok_or(ConstraintEvaluationError::UnresolvedEvaluator)?;
    evaluator
        .evaluate(expression, value, ctx.record)
        .map_err(|reason| ConstraintEvaluationError::Expression {
            expression: expression.to_string(),
            reason,
        })
}
