use crate::value::Value;

use super::business;
use super::context::{ContextSlot, EvaluationContext};
use super::outcome::{ConstraintEvaluationError, Outcome};

/// Declared key fields, or the current field when none are declared.
pub(super) fn resolve_key_fields(declared: &[String], field_name: Option<&str>) -> Option<Vec<String>> {
    if !declared.is_empty() {
        return Some(declared.to_vec());
    }
    field_name.map(|field| vec![field.to_string()])
}

/// Values of `fields`, taking the current field from `value` and the rest from the record.
pub(super) fn key_tuple(
    fields: &[String],
    value: &Value,
    ctx: &EvaluationContext<'_>,
) -> Result<Vec<Value>, ConstraintEvaluationError> {
    fields
        .iter()
        .map(|field| {
            if ctx.field_name == Some(field.as_str()) {
                Ok(value.clone())
            } else {
                ctx.record_value(field)
                    .ok_or(ConstraintEvaluationError::MissingContext(ContextSlot::Record))
            }
        })
        .collect()
}

pub(super) fn duplicate_message(fields: &[String], tuple: &[Value]) -> String {
    if let ([field], [value]) = (fields, tuple) {
        return format!("duplicate value '{value}' for '{field}'");
    }
    let values: Vec<String> = tuple.iter().map(ToString::to_string).collect();
    format!(
        "duplicate key ({}) for fields ({})",
        values.join(", "),
        fields.join(", ")
    )
}

pub(super) fn foreign_key(
    source_fields: &[String],
    target_table: &str,
    target_fields: &[String],
    value: &Value,
    ctx: &EvaluationContext<'_>,
) -> Outcome {
    let Some(references) = ctx.references else {
        return ConstraintEvaluationError::MissingContext(ContextSlot::ReferenceResolver).into();
    };

    let single_column = ctx.field_name.and_then(|field| {
        if source_fields.is_empty() {
            Some(0)
        } else {
            source_fields.iter().position(|source| source == field)
        }
    });

    if let Some(index) = single_column {
        if value.is_null() {
            return Outcome::Satisfied;
        }
        let Some(column) = target_fields.get(index) else {
            return Outcome::Violated(format!(
                "no target column for position {index} of reference to '{target_table}'"
            ));
        };
        return Outcome::from_check(references.exists(target_table, column, value), || {
            format!("value '{value}' does not reference an existing {target_table}.{column}")
        });
    }

    if source_fields.is_empty() {
        return ConstraintEvaluationError::MissingContext(ContextSlot::FieldName).into();
    }
    let Some(record) = ctx.record else {
        return ConstraintEvaluationError::MissingContext(ContextSlot::Record).into();
    };
    let tuple: Vec<Value> = source_fields
        .iter()
        .map(|field| record.get(field).cloned().unwrap_or(Value::Null))
        .collect();
    if tuple.iter().any(Value::is_null) {
        return Outcome::Satisfied;
    }
    Outcome::from_check(
        references.exists_composite(target_table, target_fields, &tuple),
        || {
            let values: Vec<String> = tuple.iter().map(ToString::to_string).collect();
            format!(
                "({}) does not reference an existing {target_table}({})",
                values.join(", "),
                target_fields.join(", ")
            )
        },
    )
}

pub(super) fn unique_key(fields: &[String], value: &Value, ctx: &EvaluationContext<'_>) -> Outcome {
    let (fields, tuple) = match collect_key(fields, value, ctx) {
        Ok(key) => key,
        Err(error) => return error.into(),
    };
    if tuple.iter().any(Value::is_null) {
        return Outcome::Satisfied;
    }
    check_duplicate(&fields, &tuple, ctx)
}

pub(super) fn primary_key(fields: &[String], value: &Value, ctx: &EvaluationContext<'_>) -> Outcome {
    let (fields, tuple) = match collect_key(fields, value, ctx) {
        Ok(key) => key,
        Err(error) => return error.into(),
    };
    if let Some((field, _)) = fields.iter().zip(&tuple).find(|(_, value)| value.is_null()) {
        return Outcome::Violated(format!("primary key field '{field}' cannot be null"));
    }
    check_duplicate(&fields, &tuple, ctx)
}

pub(super) fn check(expression: &str, value: &Value, ctx: &EvaluationContext<'_>) -> Outcome {
    if ctx.expressions.is_none() {
        return ConstraintEvaluationError::UnresolvedEvaluator.into();
    }
    if ctx.record.is_none() {
        return ConstraintEvaluationError::MissingContext(ContextSlot::Record).into();
    }
    business::expression(expression, value, ctx)
}

fn collect_key(
    fields: &[String],
    value: &Value,
    ctx: &EvaluationContext<'_>,
) -> Result<(Vec<String>, Vec<Value>), ConstraintEvaluationError> {
    let fields = resolve_key_fields(fields, ctx.field_name)
        .ok_or(ConstraintEvaluationError::MissingContext(ContextSlot::FieldName))?;
    if ctx.existing_keys.is_none() {
        return Err(ConstraintEvaluationError::MissingContext(
            ContextSlot::ExistingKeys,
        ));
    }
    let tuple = key_tuple(&fields, value, ctx)?;
    Ok((fields, tuple))
}

fn check_duplicate(fields: &[String], tuple: &[Value], ctx: &EvaluationContext<'_>) -> Outcome {
    let Some(keys) = ctx.existing_keys else {
        return ConstraintEvaluationError::MissingContext(ContextSlot::ExistingKeys).into();
    };
    Outcome::from_check(!keys.contains(fields, tuple), || {
        duplicate_message(fields, tuple)
    })
}
