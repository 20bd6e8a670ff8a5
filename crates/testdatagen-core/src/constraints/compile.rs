use crate::ast::{ConstraintNode, FieldNode, TableNode};
use crate::error::{Error, Result};
use crate::types::{ConstraintDescriptor, TypeRegistry};

use super::{Constraint, ConstraintKind, ConstraintSet};

/// Marker kind meaning "this field may be null"; it compiles to nothing.
const NULLABLE_MARKER: &str = "null";

/// Effective constraint set of a field: constraints inherited through its
/// custom type chain (root-most first), then the field's own constraints, then
/// `NotNull` when the field is declared non-nullable.
pub fn compile_field(registry: &TypeRegistry, field: &FieldNode) -> Result<ConstraintSet> {
    let mut set = ConstraintSet::new();

    for descriptor in registry.effective_constraints(&field.data_type) {
        set.push(compile_descriptor(descriptor)?);
    }
    for node in &field.constraints {
        if node.constraint_type == NULLABLE_MARKER {
            continue;
        }
        set.push(compile_node(node)?);
    }

    let has_not_null = set
        .iter()
        .any(|constraint| matches!(constraint.kind, ConstraintKind::NotNull));
    if !field.nullable && !has_not_null {
        set.push(Constraint::new(
            format!("{}_not_null", field.name),
            ConstraintKind::NotNull,
        ));
    }
    Ok(set)
}

/// Constraints declared on the table itself.
pub fn compile_table(table: &TableNode) -> Result<ConstraintSet> {
    table.constraints.iter().map(compile_node).collect()
}

fn compile_node(node: &ConstraintNode) -> Result<Constraint> {
    Constraint::from_node(node).map_err(|source| Error::InvalidConstraint {
        name: node.name.clone(),
        source,
    })
}

fn compile_descriptor(descriptor: &ConstraintDescriptor) -> Result<Constraint> {
    Constraint::from_type_descriptor(descriptor).map_err(|source| Error::InvalidConstraint {
        name: descriptor.name.clone(),
        source,
    })
}
