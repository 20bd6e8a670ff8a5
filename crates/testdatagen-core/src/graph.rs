use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};

use crate::ast::{ConstraintNode, SchemaNode};

/// Summary of FK graph structure.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FkGraphSummary {
    pub nodes: usize,
    pub edges: usize,
}

/// Table ordering derived from `foreign_key` constraints, parents first.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FkGraphReport {
    pub summary: FkGraphSummary,
    pub topo_order: Option<Vec<String>>,
    pub cycle: Option<Vec<String>>,
}

impl FkGraphReport {
    /// Topological order, or declaration order when the graph has a cycle.
    pub fn order_or_declared(&self, schema: &SchemaNode) -> Vec<String> {
        match &self.topo_order {
            Some(order) => order.clone(),
            None => schema.tables.iter().map(|table| table.name.clone()).collect(),
        }
    }
}

/// Build a deterministic FK dependency report for a schema.
pub fn build_fk_graph_report(schema: &SchemaNode) -> FkGraphReport {
    let graph = build_adjacency(schema);
    let nodes = graph.len();
    let edges = graph.values().map(BTreeSet::len).sum();
    let summary = FkGraphSummary { nodes, edges };

    match toposort(&graph) {
        Ok(order) => FkGraphReport {
            summary,
            topo_order: Some(order),
            cycle: None,
        },
        Err(cycle) => FkGraphReport {
            summary,
            topo_order: None,
            cycle: Some(cycle),
        },
    }
}

fn referenced_table(constraint: &ConstraintNode) -> Option<&str> {
    if constraint.constraint_type != "foreign_key" {
        return None;
    }
    constraint
        .parameters
        .get("target_table")
        .and_then(serde_json::Value::as_str)
}

/// Edges run from referenced (parent) table to referencing (child) table.
fn build_adjacency(schema: &SchemaNode) -> BTreeMap<String, BTreeSet<String>> {
    let mut graph: BTreeMap<String, BTreeSet<String>> = BTreeMap::new();

    for table in &schema.tables {
        graph.entry(table.name.clone()).or_default();

        let field_constraints = table.fields.iter().flat_map(|field| field.constraints.iter());
        for constraint in table.constraints.iter().chain(field_constraints) {
            if let Some(parent) = referenced_table(constraint) {
                graph
                    .entry(parent.to_string())
                    .or_default()
                    .insert(table.name.clone());
            }
        }
    }

    graph
}

fn toposort(graph: &BTreeMap<String, BTreeSet<String>>) -> Result<Vec<String>, Vec<String>> {
    let mut indegree: BTreeMap<&str, usize> =
        graph.keys().map(|node| (node.as_str(), 0)).collect();
    for targets in graph.values() {
        for target in targets {
            *indegree.entry(target.as_str()).or_insert(0) += 1;
        }
    }

    let mut ready: BTreeSet<&str> = indegree
        .iter()
        .filter(|(_, count)| **count == 0)
        .map(|(node, _)| *node)
        .collect();
    let mut order = Vec::with_capacity(graph.len());

    while let Some(node) = ready.pop_first() {
        order.push(node.to_string());
        for target in graph.get(node).into_iter().flatten() {
            if let Some(count) = indegree.get_mut(target.as_str()) {
                *count = count.saturating_sub(1);
                if *count == 0 {
                    ready.insert(target.as_str());
                }
            }
        }
    }

    if order.len() == graph.len() {
        Ok(order)
    } else {
        Err(indegree
            .into_iter()
            .filter(|(_, count)| *count > 0)
            .map(|(node, _)| node.to_string())
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    fn schema(value: serde_json::Value) -> SchemaNode {
        serde_json::from_value(value).expect("schema")
    }

    fn fk_field(name: &str, target: &str) -> serde_json::Value {
        json!({
            "name": name,
            "data_type": "integer",
            "line": 1,
            "column": 1,
            "constraints": [{
                "name": format!("fk_{name}"),
                "constraint_type": "foreign_key",
                "parameters": {"target_table": target},
                "line": 1,
                "column": 1
            }]
        })
    }

    #[test]
    fn toposort_reports_cycle() {
        let schema = schema(json!({
            "name": "app",
            "line": 1,
            "column": 1,
            "tables": [{
                "name": "users",
                "line": 1,
                "column": 1,
                "fields": [fk_field("manager_id", "users")]
            }]
        }));

        let report = build_fk_graph_report(&schema);
        assert!(report.topo_order.is_none());
        assert_eq!(report.cycle, Some(vec!["users".to_string()]));
        assert_eq!(report.order_or_declared(&schema), vec!["users".to_string()]);
    }

    #[test]
    fn toposort_orders_dependencies() {
        let schema = schema(json!({
            "name": "app",
            "line": 1,
            "column": 1,
            "tables": [
                {
                    "name": "orders",
                    "line": 1,
                    "column": 1,
                    "fields": [fk_field("user_id", "users")]
                },
                {
                    "name": "users",
                    "line": 5,
                    "column": 1,
                    "fields": []
                }
            ]
        }));

        let report = build_fk_graph_report(&schema);
        assert_eq!(report.summary.nodes, 2);
        assert_eq!(report.summary.edges, 1);
        assert_eq!(
            report.topo_order,
            Some(vec!["users".to_string(), "orders".to_string()])
        );
    }
}
