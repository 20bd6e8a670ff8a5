use std::collections::{BTreeMap, BTreeSet};

use tracing::debug;

use crate::ast::TypeNode;
use crate::error::{Error, Result};

use super::{
    ArrayType, CompositeKind, CompositeType, ConstraintDescriptor, CustomType, EnumType, EnumValue,
    ObjectField, ObjectType, PrimitiveKind, PrimitiveType, Type, TypeCategory, find_base_cycle,
};

/// Name-to-type mapping owned by one analysis session.
#[derive(Debug, Clone)]
pub struct TypeRegistry {
    types: BTreeMap<String, Type>,
    seeded: BTreeSet<String>,
}

impl Default for TypeRegistry {
    fn default() -> Self {
        Self::with_primitives()
    }
}

impl TypeRegistry {
    /// Registry seeded with the nine primitives and the bare `enum` composite.
    pub fn with_primitives() -> Self {
        let mut types = BTreeMap::new();
        for kind in PrimitiveKind::ALL {
            let primitive = PrimitiveType::new(kind);
            types.insert(primitive.name.clone(), Type::Primitive(primitive));
        }
        types.insert(
            "enum".to_string(),
            Type::Composite(CompositeType {
                name: "enum".to_string(),
                nullable: true,
                description: None,
                kind: CompositeKind::Enum(EnumType { values: Vec::new() }),
            }),
        );
        let seeded = types.keys().cloned().collect();
        Self { types, seeded }
    }

    /// Drop every entry that was not part of the initial seed.
    pub fn reset(&mut self) {
        let seeded = &self.seeded;
        self.types.retain(|name, _| seeded.contains(name));
        debug!(remaining = self.types.len(), "type registry reset");
    }

    pub fn register(&mut self, ty: Type) -> Result<()> {
        let name = ty.name().to_string();
        if self.types.contains_key(&name) {
            return Err(Error::DuplicateType(name));
        }
        debug!(type_name = %name, category = %ty.category(), "type registered");
        self.types.insert(name, ty);
        Ok(())
    }

    pub fn get(&self, name: &str) -> Option<&Type> {
        self.types.get(name)
    }

    pub fn exists(&self, name: &str) -> bool {
        self.types.contains_key(name)
    }

    /// Registered types in name order, optionally filtered by category.
    pub fn list(&self, category: Option<TypeCategory>) -> Vec<&Type> {
        self.types
            .values()
            .filter(|ty| category.is_none_or(|category| ty.category() == category))
            .collect()
    }

    pub fn len(&self) -> usize {
        self.types.len()
    }

    pub fn is_empty(&self) -> bool {
        self.types.is_empty()
    }

    /// Register a custom type from its declaration.
    ///
    /// The base type must already be registered and the name must be free.
    /// Nothing is inserted when either check fails.
    pub fn register_custom_from_declaration(&mut self, node: &TypeNode) -> Result<&CustomType> {
        if !self.exists(&node.base_type) {
            return Err(Error::UnknownBaseType {
                type_name: node.name.clone(),
                base: node.base_type.clone(),
            });
        }
        if self.exists(&node.name) {
            return Err(Error::DuplicateType(node.name.clone()));
        }

        let custom = CustomType {
            name: node.name.clone(),
            base_type: node.base_type.clone(),
            nullable: true,
            description: None,
            constraints: node.constraints.iter().map(ConstraintDescriptor::from).collect(),
            metadata: BTreeMap::new(),
        };
        debug!(
            type_name = %custom.name,
            base = %custom.base_type,
            constraints = custom.constraints.len(),
            "custom type registered"
        );
        let name = custom.name.clone();
        self.types.insert(name.clone(), Type::Custom(custom));
        match self.types.get(&name) {
            Some(Type::Custom(custom)) => Ok(custom),
            _ => Err(Error::InvalidSchema(format!("type '{name}' vanished after insert"))),
        }
    }

    /// Register `array<item>` for an item type that must already exist.
    pub fn create_array_type(
        &mut self,
        item_type: &str,
        min_items: Option<u64>,
        max_items: Option<u64>,
        unique_items: bool,
    ) -> Result<&Type> {
        let name = format!("array<{item_type}>");
        if !self.exists(item_type) {
            return Err(Error::UnknownBaseType {
                type_name: name,
                base: item_type.to_string(),
            });
        }
        let array = CompositeType {
            name: name.clone(),
            nullable: true,
            description: None,
            kind: CompositeKind::Array(ArrayType {
                item_type: item_type.to_string(),
                min_items,
                max_items,
                unique_items,
            }),
        };
        self.register(Type::Composite(array))?;
        self.lookup_registered(&name)
    }

    pub fn create_object_type(&mut self, name: &str, fields: Vec<ObjectField>) -> Result<&Type> {
        if let Some(field) = fields.iter().find(|field| !self.exists(&field.type_name)) {
            return Err(Error::UnknownBaseType {
                type_name: format!("{name}.{}", field.name),
                base: field.type_name.clone(),
            });
        }
        let object = CompositeType {
            name: name.to_string(),
            nullable: true,
            description: None,
            kind: CompositeKind::Object(ObjectType {
                fields,
                additional_properties: false,
            }),
        };
        self.register(Type::Composite(object))?;
        self.lookup_registered(name)
    }

    pub fn create_enum_type(&mut self, name: &str, values: Vec<EnumValue>) -> Result<&Type> {
        let enumeration = CompositeType {
            name: name.to_string(),
            nullable: true,
            description: None,
            kind: CompositeKind::Enum(EnumType { values }),
        };
        self.register(Type::Composite(enumeration))?;
        self.lookup_registered(name)
    }

    /// Base type name of a custom type; `None` for anything else.
    pub fn base_of(&self, name: &str) -> Option<&str> {
        self.get(name)
            .and_then(Type::as_custom)
            .map(|custom| custom.base_type.as_str())
    }

    /// Base chain cycle starting at a registered custom type, if any.
    pub fn find_cycle(&self, name: &str) -> Option<Vec<String>> {
        let base = self.base_of(name)?;
        find_base_cycle(name, base, |candidate| {
            self.base_of(candidate).map(str::to_string)
        })
    }

    /// Follow the custom chain to its first non-custom type.
    ///
    /// Returns `None` when a name along the chain is missing or the chain cycles.
    pub fn resolve_root(&self, name: &str) -> Option<&Type> {
        let mut visited = BTreeSet::new();
        let mut current = self.get(name)?;
        while let Type::Custom(custom) = current {
            if !visited.insert(custom.name.as_str()) {
                return None;
            }
            current = self.get(&custom.base_type)?;
        }
        Some(current)
    }

    /// Constraint descriptors along a custom chain, root-most first.
    pub fn effective_constraints(&self, name: &str) -> Vec<&ConstraintDescriptor> {
        let mut visited = BTreeSet::new();
        let mut layers = Vec::new();
        let mut current = self.get(name);
        while let Some(Type::Custom(custom)) = current {
            if !visited.insert(custom.name.as_str()) {
                break;
            }
            layers.push(custom.constraints.as_slice());
            current = self.get(&custom.base_type);
        }
        layers.into_iter().rev().flatten().collect()
    }

    fn lookup_registered(&self, name: &str) -> Result<&Type> {
        self.get(name)
            .ok_or_else(|| Error::InvalidSchema(format!("type '{name}' vanished after insert")))
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::ast::ConstraintNode;

    fn type_node(name: &str, base: &str, constraints: Vec<ConstraintNode>) -> TypeNode {
        TypeNode {
            name: name.to_string(),
            base_type: base.to_string(),
            constraints,
            line: 1,
            column: 1,
        }
    }

    fn pattern(value: &str) -> ConstraintNode {
        ConstraintNode {
            name: "pattern".to_string(),
            constraint_type: "pattern".to_string(),
            parameters: [("pattern".to_string(), json!(value))].into_iter().collect(),
            line: 1,
            column: 20,
        }
    }

    #[test]
    fn seeded_with_primitives_and_enum() {
        let registry = TypeRegistry::with_primitives();
        assert_eq!(registry.list(Some(TypeCategory::Primitive)).len(), 9);
        assert_eq!(registry.list(Some(TypeCategory::Composite)).len(), 1);
        assert!(registry.exists("uuid"));
        assert!(registry.exists("enum"));
    }

    #[test]
    fn duplicate_register_fails() {
        let mut registry = TypeRegistry::with_primitives();
        let err = registry
            .register(Type::Primitive(PrimitiveType::new(PrimitiveKind::String)))
            .unwrap_err();
        assert!(matches!(err, Error::DuplicateType(name) if name == "string"));
    }

    #[test]
    fn custom_registration_checks_base_then_name() {
        let mut registry = TypeRegistry::with_primitives();
        let err = registry
            .register_custom_from_declaration(&type_node("Foo", "bar", vec![]))
            .unwrap_err();
        assert!(matches!(err, Error::UnknownBaseType { .. }));
        assert!(!registry.exists("Foo"));

        registry
            .register_custom_from_declaration(&type_node("Email", "string", vec![pattern(".+@.+")]))
            .expect("register Email");
        let err = registry
            .register_custom_from_declaration(&type_node("Email", "integer", vec![]))
            .unwrap_err();
        assert!(matches!(err, Error::DuplicateType(_)));
        assert_eq!(registry.base_of("Email"), Some("string"));
    }

    #[test]
    fn chain_resolution_and_constraint_order() {
        let mut registry = TypeRegistry::with_primitives();
        registry
            .register_custom_from_declaration(&type_node("Email", "string", vec![pattern(".+@.+")]))
            .expect("Email");
        registry
            .register_custom_from_declaration(&type_node(
                "WorkEmail",
                "Email",
                vec![pattern(".+@corp\\.com")],
            ))
            .expect("WorkEmail");

        let root = registry.resolve_root("WorkEmail").expect("root");
        assert_eq!(root.name(), "string");

        let patterns: Vec<_> = registry
            .effective_constraints("WorkEmail")
            .iter()
            .map(|descriptor| descriptor.parameters["pattern"].clone())
            .collect();
        assert_eq!(patterns, vec![json!(".+@.+"), json!(".+@corp\\.com")]);
        assert!(registry.find_cycle("WorkEmail").is_none());
    }

    #[test]
    fn array_factory_requires_item_type() {
        let mut registry = TypeRegistry::with_primitives();
        let array = registry
            .create_array_type("integer", Some(1), None, true)
            .expect("array");
        assert_eq!(array.name(), "array<integer>");
        assert!(array.is_array());
        assert!(registry.create_array_type("missing", None, None, false).is_err());
    }

    #[test]
    fn reset_keeps_only_seeded_entries() {
        let mut registry = TypeRegistry::with_primitives();
        let seeded = registry.len();
        registry
            .register_custom_from_declaration(&type_node("Email", "string", vec![]))
            .expect("Email");
        registry
            .create_enum_type(
                "Status",
                vec![EnumValue {
                    name: "ACTIVE".to_string(),
                    value: json!("active"),
                    description: None,
                }],
            )
            .expect("enum");
        registry.reset();
        assert_eq!(registry.len(), seeded);
        assert!(!registry.exists("Email"));
        assert!(!registry.exists("Status"));
    }
}
