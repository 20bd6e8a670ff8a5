use chrono::NaiveDate;
use regex::Regex;
use serde_json::Value as Json;

use crate::ast::{ConstraintNode, Params};
use crate::error::ConstraintBuildError;
use crate::types::ConstraintDescriptor;
use crate::value::Value;

use super::{Constraint, ConstraintKind, ReferentialAction, Severity};

const DEFAULT_DATE_FORMAT: &str = "%Y-%m-%d";

/// Parameters every kind accepts; they never reach the variant itself.
const RESERVED: [&str; 4] = ["severity", "enabled", "description", "metadata"];

type BuildResult<T> = Result<T, ConstraintBuildError>;

impl Constraint {
    /// Compile a declared constraint (kind plus DSL parameters).
    pub fn from_descriptor(name: &str, kind: &str, params: &Params) -> BuildResult<Constraint> {
        let kind = build_kind(kind, params)?;
        let mut constraint = Constraint::new(name, kind);

        if let Some(severity) = opt_str(params, "severity")? {
            constraint.severity =
                Severity::parse(severity).ok_or_else(|| ConstraintBuildError::InvalidParameter {
                    name: "severity",
                    reason: format!("unknown severity '{severity}'"),
                })?;
        }
        if let Some(enabled) = opt_bool(params, "enabled")? {
            constraint.enabled = enabled;
        }
        constraint.description = opt_str(params, "description")?.map(str::to_string);
        match params.get("metadata") {
            None | Some(Json::Null) => {}
            Some(Json::Object(map)) => {
                constraint.metadata = map.iter().map(|(k, v)| (k.clone(), v.clone())).collect();
            }
            Some(_) => {
                return Err(invalid("metadata", "expected an object"));
            }
        }
        Ok(constraint)
    }

    pub fn from_node(node: &ConstraintNode) -> BuildResult<Constraint> {
        Self::from_descriptor(&node.name, &node.constraint_type, &node.parameters)
    }

    pub fn from_type_descriptor(descriptor: &ConstraintDescriptor) -> BuildResult<Constraint> {
        Self::from_descriptor(&descriptor.name, &descriptor.kind, &descriptor.parameters)
    }
}

fn build_kind(kind: &str, params: &Params) -> BuildResult<ConstraintKind> {
    let built = match kind {
        "range" => ConstraintKind::Range {
            min: opt_f64(params, "min_value")?,
            max: opt_f64(params, "max_value")?,
            inclusive_min: opt_bool(params, "inclusive_min")?.unwrap_or(true),
            inclusive_max: opt_bool(params, "inclusive_max")?.unwrap_or(true),
        },
        "length" => ConstraintKind::Length {
            min: opt_usize(params, "min_length")?,
            max: opt_usize(params, "max_length")?,
        },
        "pattern" => {
            let source = req_str(params, "pattern")?;
            let regex = Regex::new(&format!("^(?:{source})$"))?;
            ConstraintKind::Pattern {
                source: source.to_string(),
                regex,
            }
        }
        "enum" => {
            let values = params
                .get("values")
                .and_then(Json::as_array)
                .ok_or(ConstraintBuildError::MissingParameter("values"))?;
            ConstraintKind::Enum(values.iter().map(Value::from_json).collect())
        }
        "date_range" => {
            let format = opt_str(params, "format")?.unwrap_or(DEFAULT_DATE_FORMAT);
            ConstraintKind::DateRange {
                min: opt_date(params, "min_date", format)?,
                max: opt_date(params, "max_date", format)?,
                format: format.to_string(),
            }
        }
        "unique" => ConstraintKind::Unique {
            scope: opt_fields(params, "scope")?,
        },
        "not_null" => ConstraintKind::NotNull,
        "expression" => ConstraintKind::Expression(req_str(params, "expression")?.to_string()),
        "conditional" => ConstraintKind::Conditional {
            condition: req_str(params, "condition")?.to_string(),
            then: Box::new(nested(params, "then")?.ok_or(
                ConstraintBuildError::MissingParameter("then"),
            )?),
            otherwise: nested(params, "else")?.map(Box::new),
        },
        "custom" => {
            let validator = req_str(params, "validator")?.to_string();
            let rest = params
                .iter()
                .filter(|(key, _)| key.as_str() != "validator" && !RESERVED.contains(&key.as_str()))
                .map(|(key, value)| (key.clone(), value.clone()))
                .collect();
            ConstraintKind::Custom {
                validator,
                params: rest,
            }
        }
        "dependent_field" => ConstraintKind::DependentField {
            fields: opt_fields(params, "fields")?
                .ok_or(ConstraintBuildError::MissingParameter("fields"))?,
            expression: req_str(params, "expression")?.to_string(),
        },
        "foreign_key" => {
            let source_fields = match opt_fields(params, "source_fields")? {
                Some(fields) => fields,
                None => opt_fields(params, "fields")?.unwrap_or_default(),
            };
            let target_fields = match opt_fields(params, "target_fields")? {
                Some(fields) => fields,
                None => match opt_str(params, "target_field")? {
                    Some(field) => vec![field.to_string()],
                    None if source_fields.is_empty() => vec!["id".to_string()],
                    None => source_fields.clone(),
                },
            };
            if !source_fields.is_empty() && source_fields.len() != target_fields.len() {
                return Err(invalid(
                    "target_fields",
                    "must have as many entries as source_fields",
                ));
            }
            ConstraintKind::ForeignKey {
                source_fields,
                target_table: req_str(params, "target_table")?.to_string(),
                target_fields,
                on_delete: opt_action(params, "on_delete")?,
                on_update: opt_action(params, "on_update")?,
            }
        }
        "unique_key" => ConstraintKind::UniqueKey {
            fields: opt_fields(params, "fields")?.unwrap_or_default(),
        },
        "primary_key" => ConstraintKind::PrimaryKey {
            fields: opt_fields(params, "fields")?.unwrap_or_default(),
        },
        "check" => ConstraintKind::Check(req_str(params, "expression")?.to_string()),
        other => return Err(ConstraintBuildError::UnknownKind(other.to_string())),
    };
    Ok(built)
}

/// Sub-constraint written as `{"kind": ..., "parameters": {...}}`.
fn nested(params: &Params, key: &'static str) -> BuildResult<Option<Constraint>> {
    let Some(raw) = params.get(key) else {
        return Ok(None);
    };
    let object = raw
        .as_object()
        .ok_or_else(|| invalid(key, "expected an object with 'kind'"))?;
    let kind = object
        .get("kind")
        .and_then(Json::as_str)
        .ok_or_else(|| invalid(key, "missing 'kind'"))?;
    let nested_params: Params = match object.get("parameters") {
        Some(Json::Object(map)) => map.iter().map(|(k, v)| (k.clone(), v.clone())).collect(),
        Some(_) => return Err(invalid(key, "'parameters' must be an object")),
        None => Params::new(),
    };
    let name = object.get("name").and_then(Json::as_str).unwrap_or(kind);
    Constraint::from_descriptor(name, kind, &nested_params).map(Some)
}

fn invalid(name: &'static str, reason: &str) -> ConstraintBuildError {
    ConstraintBuildError::InvalidParameter {
        name,
        reason: reason.to_string(),
    }
}

fn present<'a>(params: &'a Params, key: &str) -> Option<&'a Json> {
    params.get(key).filter(|value| !value.is_null())
}

fn opt_str<'a>(params: &'a Params, key: &'static str) -> BuildResult<Option<&'a str>> {
    match present(params, key) {
        None => Ok(None),
        Some(value) => value
            .as_str()
            .map(Some)
            .ok_or_else(|| invalid(key, "expected a string")),
    }
}

fn req_str<'a>(params: &'a Params, key: &'static str) -> BuildResult<&'a str> {
    opt_str(params, key)?.ok_or(ConstraintBuildError::MissingParameter(key))
}

fn opt_bool(params: &Params, key: &'static str) -> BuildResult<Option<bool>> {
    match present(params, key) {
        None => Ok(None),
        Some(value) => value
            .as_bool()
            .map(Some)
            .ok_or_else(|| invalid(key, "expected a boolean")),
    }
}

fn opt_f64(params: &Params, key: &'static str) -> BuildResult<Option<f64>> {
    match present(params, key) {
        None => Ok(None),
        Some(value) => value
            .as_f64()
            .map(Some)
            .ok_or_else(|| invalid(key, "expected a number")),
    }
}

fn opt_usize(params: &Params, key: &'static str) -> BuildResult<Option<usize>> {
    match present(params, key) {
        None => Ok(None),
        Some(value) => value
            .as_u64()
            .and_then(|number| usize::try_from(number).ok())
            .map(Some)
            .ok_or_else(|| invalid(key, "expected a non-negative integer")),
    }
}

fn opt_date(params: &Params, key: &'static str, format: &str) -> BuildResult<Option<NaiveDate>> {
    let Some(raw) = opt_str(params, key)? else {
        return Ok(None);
    };
    NaiveDate::parse_from_str(raw, format)
        .map(Some)
        .map_err(|_| ConstraintBuildError::InvalidDate {
            value: raw.to_string(),
            format: format.to_string(),
        })
}

/// A field list given as an array of names or a single name.
fn opt_fields(params: &Params, key: &'static str) -> BuildResult<Option<Vec<String>>> {
    match present(params, key) {
        None => Ok(None),
        Some(Json::String(field)) => Ok(Some(vec![field.clone()])),
        Some(Json::Array(items)) => items
            .iter()
            .map(|item| {
                item.as_str()
                    .map(str::to_string)
                    .ok_or_else(|| invalid(key, "expected field names"))
            })
            .collect::<BuildResult<Vec<_>>>()
            .map(Some),
        Some(_) => Err(invalid(key, "expected a field name or a list of names")),
    }
}

fn opt_action(params: &Params, key: &'static str) -> BuildResult<ReferentialAction> {
    match opt_str(params, key)? {
        None => Ok(ReferentialAction::default()),
        Some(raw) => ReferentialAction::parse(raw)
            .ok_or_else(|| invalid(key, &format!("unknown referential action '{raw}'"))),
    }
}
