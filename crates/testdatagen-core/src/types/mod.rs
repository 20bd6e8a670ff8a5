//! Type model: primitive, composite, and custom types.
//!
//! Custom types reference their base type by name; the reference is resolved
//! lazily against a [`TypeRegistry`].

mod registry;

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::ast::{ConstraintNode, Params};

pub use registry::TypeRegistry;

/// Category of a registered type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TypeCategory {
    Primitive,
    Composite,
    Custom,
}

impl TypeCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            TypeCategory::Primitive => "primitive",
            TypeCategory::Composite => "composite",
            TypeCategory::Custom => "custom",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "primitive" => Some(TypeCategory::Primitive),
            "composite" => Some(TypeCategory::Composite),
            "custom" => Some(TypeCategory::Custom),
            _ => None,
        }
    }
}

impl fmt::Display for TypeCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Built-in primitive kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PrimitiveKind {
    Integer,
    Decimal,
    String,
    Boolean,
    Date,
    Timestamp,
    Binary,
    Uuid,
    Json,
}

impl PrimitiveKind {
    pub const ALL: [PrimitiveKind; 9] = [
        PrimitiveKind::Integer,
        PrimitiveKind::Decimal,
        PrimitiveKind::String,
        PrimitiveKind::Boolean,
        PrimitiveKind::Date,
        PrimitiveKind::Timestamp,
        PrimitiveKind::Binary,
        PrimitiveKind::Uuid,
        PrimitiveKind::Json,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            PrimitiveKind::Integer => "integer",
            PrimitiveKind::Decimal => "decimal",
            PrimitiveKind::String => "string",
            PrimitiveKind::Boolean => "boolean",
            PrimitiveKind::Date => "date",
            PrimitiveKind::Timestamp => "timestamp",
            PrimitiveKind::Binary => "binary",
            PrimitiveKind::Uuid => "uuid",
            PrimitiveKind::Json => "json",
        }
    }

    pub fn is_numeric(&self) -> bool {
        matches!(self, PrimitiveKind::Integer | PrimitiveKind::Decimal)
    }
}

/// Built-in scalar type with optional bounds and formatting hints.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PrimitiveType {
    pub name: String,
    pub kind: PrimitiveKind,
    pub nullable: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min_value: Option<serde_json::Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_value: Option<serde_json::Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pattern: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub format: Option<String>,
}

impl PrimitiveType {
    pub fn new(kind: PrimitiveKind) -> Self {
        Self {
            name: kind.as_str().to_string(),
            kind,
            nullable: true,
            description: None,
            min_value: None,
            max_value: None,
            pattern: None,
            format: None,
        }
    }
}

/// Composite type shapes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum CompositeKind {
    Array(ArrayType),
    Object(ObjectType),
    Enum(EnumType),
}

/// Array, object, or enum type.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompositeType {
    pub name: String,
    pub nullable: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(flatten)]
    pub kind: CompositeKind,
}

impl CompositeType {
    pub fn is_array(&self) -> bool {
        matches!(self.kind, CompositeKind::Array(_))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ArrayType {
    /// Item type, by registry name.
    pub item_type: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min_items: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_items: Option<u64>,
    #[serde(default)]
    pub unique_items: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ObjectType {
    pub fields: Vec<ObjectField>,
    #[serde(default)]
    pub additional_properties: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ObjectField {
    pub name: String,
    pub type_name: String,
    pub required: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EnumType {
    pub values: Vec<EnumValue>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EnumValue {
    pub name: String,
    pub value: serde_json::Value,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

/// Constraint kind plus parameters, as declared on a custom type.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConstraintDescriptor {
    pub name: String,
    pub kind: String,
    #[serde(default)]
    pub parameters: Params,
}

impl From<&ConstraintNode> for ConstraintDescriptor {
    fn from(node: &ConstraintNode) -> Self {
        Self {
            name: node.name.clone(),
            kind: node.constraint_type.clone(),
            parameters: node.parameters.clone(),
        }
    }
}

/// Named type derived from a base type plus constraints.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CustomType {
    pub name: String,
    /// Base type, by registry name.
    pub base_type: String,
    pub nullable: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default)]
    pub constraints: Vec<ConstraintDescriptor>,
    #[serde(default)]
    pub metadata: BTreeMap<String, serde_json::Value>,
}

/// Any registered type.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "category", rename_all = "snake_case")]
pub enum Type {
    Primitive(PrimitiveType),
    Composite(CompositeType),
    Custom(CustomType),
}

impl Type {
    pub fn name(&self) -> &str {
        match self {
            Type::Primitive(primitive) => &primitive.name,
            Type::Composite(composite) => &composite.name,
            Type::Custom(custom) => &custom.name,
        }
    }

    pub fn category(&self) -> TypeCategory {
        match self {
            Type::Primitive(_) => TypeCategory::Primitive,
            Type::Composite(_) => TypeCategory::Composite,
            Type::Custom(_) => TypeCategory::Custom,
        }
    }

    pub fn nullable(&self) -> bool {
        match self {
            Type::Primitive(primitive) => primitive.nullable,
            Type::Composite(composite) => composite.nullable,
            Type::Custom(custom) => custom.nullable,
        }
    }

    pub fn description(&self) -> Option<&str> {
        match self {
            Type::Primitive(primitive) => primitive.description.as_deref(),
            Type::Composite(composite) => composite.description.as_deref(),
            Type::Custom(custom) => custom.description.as_deref(),
        }
    }

    pub fn as_custom(&self) -> Option<&CustomType> {
        match self {
            Type::Custom(custom) => Some(custom),
            _ => None,
        }
    }

    pub fn primitive_kind(&self) -> Option<PrimitiveKind> {
        match self {
            Type::Primitive(primitive) => Some(primitive.kind),
            _ => None,
        }
    }

    pub fn is_array(&self) -> bool {
        matches!(self, Type::Composite(composite) if composite.is_array())
    }
}

/// Walk a custom-type base chain looking for a revisited name.
///
/// `lookup` maps a type name to its base type name when that type is custom,
/// and to `None` for primitive, composite, or unknown names. The visited set is
/// seeded with `start`. Returns the walked chain ending at the first repeated
/// name.
pub fn find_base_cycle<F>(start: &str, base: &str, lookup: F) -> Option<Vec<String>>
where
    F: Fn(&str) -> Option<String>,
{
    let mut chain = vec![start.to_string()];
    let mut current = base.to_string();

    loop {
        if chain.iter().any(|seen| *seen == current) {
            chain.push(current);
            return Some(chain);
        }
        let next = lookup(&current);
        chain.push(current);
        match next {
            Some(next) => current = next,
            None => return None,
        }
    }
}

/// Check whether a constraint kind may be declared on a type whose chain
/// resolves to `root`. Only `pattern`, `range`, and `length` are restricted;
/// on mismatch the permitted base types are returned.
pub fn check_constraint_compat(kind: &str, root: &Type) -> Result<(), &'static str> {
    let primitive = root.primitive_kind();
    match kind {
        "pattern" => match primitive {
            Some(PrimitiveKind::String) => Ok(()),
            _ => Err("string"),
        },
        "range" => match primitive {
            Some(kind) if kind.is_numeric() => Ok(()),
            _ => Err("integer or decimal"),
        },
        "length" => {
            if primitive == Some(PrimitiveKind::String) || root.is_array() {
                Ok(())
            } else {
                Err("string or array")
            }
        }
        _ => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn chain_lookup(pairs: &'static [(&'static str, &'static str)]) -> impl Fn(&str) -> Option<String> {
        move |name| {
            pairs
                .iter()
                .find(|(custom, _)| *custom == name)
                .map(|(_, base)| base.to_string())
        }
    }

    #[test]
    fn detects_two_step_cycle() {
        let lookup = chain_lookup(&[("A", "B"), ("B", "A")]);
        let chain = find_base_cycle("A", "B", lookup).expect("cycle");
        assert_eq!(chain, vec!["A", "B", "A"]);
    }

    #[test]
    fn detects_cycle_not_involving_start() {
        let lookup = chain_lookup(&[("B", "C"), ("C", "B")]);
        let chain = find_base_cycle("A", "B", lookup).expect("cycle");
        assert_eq!(chain.last().map(String::as_str), Some("B"));
    }

    #[test]
    fn terminating_chain_has_no_cycle() {
        let lookup = chain_lookup(&[("A", "B"), ("B", "C"), ("C", "string")]);
        assert!(find_base_cycle("A", "B", lookup).is_none());
    }

    #[test]
    fn compat_table_restricts_three_kinds() {
        let integer = Type::Primitive(PrimitiveType::new(PrimitiveKind::Integer));
        let string = Type::Primitive(PrimitiveType::new(PrimitiveKind::String));

        assert_eq!(check_constraint_compat("pattern", &integer), Err("string"));
        assert!(check_constraint_compat("pattern", &string).is_ok());
        assert!(check_constraint_compat("range", &integer).is_ok());
        assert!(check_constraint_compat("range", &string).is_err());
        assert!(check_constraint_compat("length", &integer).is_err());
        assert!(check_constraint_compat("unique", &integer).is_ok());
    }
}
