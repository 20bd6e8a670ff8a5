use std::collections::{BTreeMap, BTreeSet};

use testdatagen_core::{SchemaNode, Type, TypeNode, TypeRegistry, find_base_cycle};

/// Where a type name's base chain ends.
#[derive(Debug, Clone, Copy)]
pub(crate) enum ChainEnd<'a> {
    /// First non-custom type of the chain.
    Root(&'a Type),
    /// `custom` names a base type that neither the schema nor the registry knows.
    UnknownBase { custom: &'a str, base: &'a str },
    Cycle,
    /// The name itself is unknown.
    Unknown,
}

/// Type names visible while checking one schema: its own declarations (first
/// occurrence wins) layered over the registry.
pub(crate) struct DeclaredTypes<'a> {
    declared: BTreeMap<&'a str, &'a TypeNode>,
    registry: &'a TypeRegistry,
}

impl<'a> DeclaredTypes<'a> {
    pub(crate) fn new(schema: &'a SchemaNode, registry: &'a TypeRegistry) -> Self {
        let mut declared = BTreeMap::new();
        for node in &schema.types {
            declared.entry(node.name.as_str()).or_insert(node);
        }
        Self { declared, registry }
    }

    pub(crate) fn knows(&self, name: &str) -> bool {
        self.declared.contains_key(name) || self.registry.exists(name)
    }

    /// Base type name when `name` is a custom type. Registered entries take
    /// precedence over declarations that failed to register.
    pub(crate) fn base_of(&self, name: &str) -> Option<&'a str> {
        match self.registry.get(name) {
            Some(ty) => ty.as_custom().map(|custom| custom.base_type.as_str()),
            None => self
                .declared
                .get(name)
                .map(|node| node.base_type.as_str()),
        }
    }

    pub(crate) fn find_cycle(&self, node: &TypeNode) -> Option<Vec<String>> {
        find_base_cycle(&node.name, &node.base_type, |name| {
            self.base_of(name).map(str::to_string)
        })
    }

    /// Follow the base chain of `name` to its end.
    pub(crate) fn chain_end(&self, name: &'a str) -> ChainEnd<'a> {
        let mut visited = BTreeSet::new();
        let mut current = name;
        loop {
            if !visited.insert(current) {
                return ChainEnd::Cycle;
            }
            let Some(base) = self.base_of(current) else {
                return match self.registry.get(current) {
                    Some(ty) => ChainEnd::Root(ty),
                    None => ChainEnd::Unknown,
                };
            };
            if !self.knows(base) {
                return ChainEnd::UnknownBase {
                    custom: current,
                    base,
                };
            }
            current = base;
        }
    }

    /// Kinds of every constraint declared along the custom chain of `name`.
    pub(crate) fn chain_constraint_kinds(&self, name: &'a str) -> BTreeSet<&'a str> {
        let mut kinds = BTreeSet::new();
        let mut visited = BTreeSet::new();
        let mut current = name;
        while visited.insert(current) {
            if let Some(ty) = self.registry.get(current) {
                let Some(custom) = ty.as_custom() else {
                    break;
                };
                kinds.extend(custom.constraints.iter().map(|c| c.kind.as_str()));
                current = custom.base_type.as_str();
            } else if let Some(node) = self.declared.get(current) {
                kinds.extend(node.constraints.iter().map(|c| c.constraint_type.as_str()));
                current = node.base_type.as_str();
            } else {
                break;
            }
        }
        kinds
    }
}
