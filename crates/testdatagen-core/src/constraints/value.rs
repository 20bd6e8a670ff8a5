use chrono::NaiveDate;
use regex::Regex;

use crate::value::Value;

use super::context::{ContextSlot, EvaluationContext};
use super::outcome::{ConstraintEvaluationError, Outcome};
use super::relationship;

pub(super) fn range(
    value: &Value,
    min: Option<f64>,
    max: Option<f64>,
    inclusive_min: bool,
    inclusive_max: bool,
) -> Outcome {
    if value.is_null() {
        return Outcome::Satisfied;
    }
    let Some(number) = value.as_f64() else {
        return Outcome::Violated(format!("value '{value}' is not numeric"));
    };

    if let Some(min) = min {
        let below = if inclusive_min { number < min } else { number <= min };
        if below {
            let bound = if inclusive_min { ">=" } else { ">" };
            return Outcome::Violated(format!("value {value} must be {bound} {min}"));
        }
    }
    if let Some(max) = max {
        let above = if inclusive_max { number > max } else { number >= max };
        if above {
            let bound = if inclusive_max { "<=" } else { "<" };
            return Outcome::Violated(format!("value {value} must be {bound} {max}"));
        }
    }
    Outcome::Satisfied
}

pub(super) fn length(value: &Value, min: Option<usize>, max: Option<usize>) -> Outcome {
    let len = match value {
        Value::Null => return Outcome::Satisfied,
        Value::Text(text) => text.chars().count(),
        Value::Array(items) => items.len(),
        other => {
            return Outcome::Violated(format!("value '{other}' has no length"));
        }
    };

    if let Some(min) = min
        && len < min
    {
        return Outcome::Violated(format!("length {len} is shorter than minimum {min}"));
    }
    if let Some(max) = max
        && len > max
    {
        return Outcome::Violated(format!("length {len} exceeds maximum {max}"));
    }
    Outcome::Satisfied
}

pub(super) fn pattern(value: &Value, source: &str, regex: &Regex) -> Outcome {
    match value {
        Value::Null => Outcome::Satisfied,
        Value::Text(text) => Outcome::from_check(regex.is_match(text), || {
            format!("value '{text}' does not match pattern '{source}'")
        }),
        other => Outcome::Violated(format!("value '{other}' is not a string")),
    }
}

pub(super) fn enumeration(value: &Value, allowed: &[Value]) -> Outcome {
    if value.is_null() {
        return Outcome::Satisfied;
    }
    Outcome::from_check(
        allowed.iter().any(|candidate| candidate.loosely_equals(value)),
        || {
            let options: Vec<String> = allowed.iter().map(ToString::to_string).collect();
            format!("value '{value}' is not one of [{}]", options.join(", "))
        },
    )
}

pub(super) fn date_range(
    value: &Value,
    min: Option<NaiveDate>,
    max: Option<NaiveDate>,
    format: &str,
) -> Outcome {
    let date = match value {
        Value::Null => return Outcome::Satisfied,
        Value::Date(date) => *date,
        Value::Timestamp(timestamp) => timestamp.date(),
        Value::Text(text) => match NaiveDate::parse_from_str(text, format) {
            Ok(date) => date,
            Err(_) => {
                return Outcome::Violated(format!(
                    "value '{text}' is not a date in format '{format}'"
                ));
            }
        },
        other => return Outcome::Violated(format!("value '{other}' is not a date")),
    };

    if let Some(min) = min
        && date < min
    {
        return Outcome::Violated(format!("date {date} is before {min}"));
    }
    if let Some(max) = max
        && date > max
    {
        return Outcome::Violated(format!("date {date} is after {max}"));
    }
    Outcome::Satisfied
}

pub(super) fn unique(
    value: &Value,
    scope: Option<&[String]>,
    ctx: &EvaluationContext<'_>,
) -> Outcome {
    let scoped = scope.is_some_and(|fields| !fields.is_empty());
    if value.is_null() && !scoped {
        return Outcome::Satisfied;
    }

    // A scoped key is the scope tuple alone; `Constraint::key_fields` records the same list.
    let declared = scope.unwrap_or_default();
    let Some(fields) = relationship::resolve_key_fields(declared, ctx.field_name) else {
        return ConstraintEvaluationError::MissingContext(ContextSlot::FieldName).into();
    };
    let Some(keys) = ctx.existing_keys else {
        return ConstraintEvaluationError::MissingContext(ContextSlot::ExistingKeys).into();
    };
    let tuple = match relationship::key_tuple(&fields, value, ctx) {
        Ok(tuple) => tuple,
        Err(error) => return error.into(),
    };
    if tuple.iter().any(Value::is_null) {
        return Outcome::Satisfied;
    }

    Outcome::from_check(!keys.contains(&fields, &tuple), || {
        relationship::duplicate_message(&fields, &tuple)
    })
}

pub(super) fn not_null(value: &Value) -> Outcome {
    Outcome::from_check(!value.is_null(), || "value cannot be null".to_string())
}
