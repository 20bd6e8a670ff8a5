//! Scoped symbol table.
//!
//! Scopes live in an arena and are addressed by [`ScopeId`]. A parent owns its
//! children through a name map; children only keep the id of their parent for
//! upward lookup.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};
use testdatagen_core::Position;
use tracing::trace;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SymbolKind {
    Schema,
    Table,
    Field,
    Type,
    Constraint,
}

impl SymbolKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            SymbolKind::Schema => "schema",
            SymbolKind::Table => "table",
            SymbolKind::Field => "field",
            SymbolKind::Type => "type",
            SymbolKind::Constraint => "constraint",
        }
    }
}

impl fmt::Display for SymbolKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A declared name with its metadata.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Symbol {
    pub name: String,
    pub kind: SymbolKind,
    /// Declared type name: base type for types, data type for fields.
    pub type_name: Option<String>,
    pub attributes: BTreeMap<String, serde_json::Value>,
    pub line: u32,
    pub column: u32,
}

impl Symbol {
    pub fn new(name: impl Into<String>, kind: SymbolKind, position: Position) -> Self {
        Self {
            name: name.into(),
            kind,
            type_name: None,
            attributes: BTreeMap::new(),
            line: position.line,
            column: position.column,
        }
    }

    pub fn with_type(mut self, type_name: impl Into<String>) -> Self {
        self.type_name = Some(type_name.into());
        self
    }

    pub fn with_attribute(mut self, key: impl Into<String>, value: serde_json::Value) -> Self {
        self.attributes.insert(key.into(), value);
        self
    }

    pub fn position(&self) -> Position {
        Position::new(self.line, self.column)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ScopeId(usize);

#[derive(Debug, Clone)]
pub struct Scope {
    name: String,
    parent: Option<ScopeId>,
    children: BTreeMap<String, ScopeId>,
    symbols: BTreeMap<String, Symbol>,
}

impl Scope {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn parent(&self) -> Option<ScopeId> {
        self.parent
    }

    pub fn symbols(&self) -> impl Iterator<Item = &Symbol> {
        self.symbols.values()
    }

    pub fn child(&self, name: &str) -> Option<ScopeId> {
        self.children.get(name).copied()
    }
}

/// Tree of lexical scopes with a single current-scope cursor.
#[derive(Debug, Clone)]
pub struct SymbolTable {
    scopes: Vec<Scope>,
    current: ScopeId,
}

impl Default for SymbolTable {
    fn default() -> Self {
        Self::new()
    }
}

impl SymbolTable {
    pub const GLOBAL: ScopeId = ScopeId(0);

    pub fn new() -> Self {
        Self {
            scopes: vec![Scope {
                name: "global".to_string(),
                parent: None,
                children: BTreeMap::new(),
                symbols: BTreeMap::new(),
            }],
            current: Self::GLOBAL,
        }
    }

    pub fn current(&self) -> ScopeId {
        self.current
    }

    pub fn scope(&self, id: ScopeId) -> &Scope {
        &self.scopes[id.0]
    }

    /// Descend into the child scope `name`, creating it on first entry.
    pub fn enter_scope(&mut self, name: &str) -> ScopeId {
        let id = match self.scopes[self.current.0].child(name) {
            Some(existing) => existing,
            None => {
                let id = ScopeId(self.scopes.len());
                self.scopes.push(Scope {
                    name: name.to_string(),
                    parent: Some(self.current),
                    children: BTreeMap::new(),
                    symbols: BTreeMap::new(),
                });
                self.scopes[self.current.0]
                    .children
                    .insert(name.to_string(), id);
                id
            }
        };
        trace!(scope = %name, "enter scope");
        self.current = id;
        id
    }

    /// Ascend to the parent scope; a no-op at the global scope.
    pub fn exit_scope(&mut self) {
        if let Some(parent) = self.scopes[self.current.0].parent {
            trace!(scope = %self.scopes[self.current.0].name, "exit scope");
            self.current = parent;
        }
    }

    /// Insert into the current scope, replacing any symbol of the same name.
    pub fn add_symbol(&mut self, symbol: Symbol) -> Option<Symbol> {
        self.scopes[self.current.0]
            .symbols
            .insert(symbol.name.clone(), symbol)
    }

    /// Look up `name` in the current scope only.
    pub fn lookup(&self, name: &str) -> Option<&Symbol> {
        self.scopes[self.current.0].symbols.get(name)
    }

    /// Look up `name` from the current scope up to the global scope.
    pub fn lookup_recursive(&self, name: &str) -> Option<&Symbol> {
        self.lookup_from(self.current, name)
    }

    /// Recursive lookup starting at an arbitrary scope.
    pub fn lookup_from(&self, scope: ScopeId, name: &str) -> Option<&Symbol> {
        let mut cursor = Some(scope);
        while let Some(id) = cursor {
            let scope = &self.scopes[id.0];
            if let Some(symbol) = scope.symbols.get(name) {
                return Some(symbol);
            }
            cursor = scope.parent;
        }
        None
    }

    /// Scope reached by following child names from the global scope.
    pub fn resolve_path(&self, path: &[&str]) -> Option<ScopeId> {
        path.iter().try_fold(Self::GLOBAL, |id, name| {
            self.scopes[id.0].child(name)
        })
    }

    pub fn scope_count(&self) -> usize {
        self.scopes.len()
    }
}
