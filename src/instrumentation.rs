use std::collections::BTreeMap;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::graph;
use crate::types::{ModelTier, SwarmPlan, TaskStatus};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct GraphNode {
    pub id: String,
    pub agent: String,
    pub model: ModelTier,
    pub status: TaskStatus,
    pub depth: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord)]
pub struct GraphEdge {
    pub from: String,
    pub to: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct GraphExport {
    pub plan: String,
    pub parallelism: String,
    pub nodes: Vec<GraphNode>,
    pub edges: Vec<GraphEdge>,
    pub critical_path: Vec<String>,
}

/// Deterministic view of a plan's dependency graph: nodes sorted by id and
/// edges (blocker → dependent) sorted and deduplicated.
pub fn export_graph(plan: &SwarmPlan) -> GraphExport {
    let dependency_graph = graph::build_graph(plan.tasks());

    let mut nodes: Vec<GraphNode> = plan
        .tasks()
        .iter()
        .filter_map(|task| {
            let node = dependency_graph.node(&task.id)?;
            Some(GraphNode {
                id: task.id.clone(),
                agent: task.agent.clone(),
                model: task.model,
                status: task.status,
                depth: node.depth,
            })
        })
        .collect();
    nodes.sort_by(|a, b| a.id.cmp(&b.id));

    let mut edges: Vec<GraphEdge> = Vec::new();
    for node in dependency_graph.nodes() {
        for dependent in &node.blocks {
            edges.push(GraphEdge {
                from: node.task_id.clone(),
                to: dependent.clone(),
            });
        }
    }
    edges.sort();
    edges.dedup();

    GraphExport {
        plan: plan.name().to_string(),
        parallelism: plan.parallelism().to_string(),
        nodes,
        edges,
        critical_path: graph::critical_path(plan.tasks()),
    }
}

pub fn export_graph_json(plan: &SwarmPlan) -> Result<String> {
    let graph = export_graph(plan);
    serde_json::to_string_pretty(&graph).context("serialize graph json")
}

/// Graphviz rendering. Tasks of equal depth share a rank; critical-path
/// tasks are drawn bold.
pub fn export_graph_dot(plan: &SwarmPlan) -> String {
    let graph = export_graph(plan);
    let mut out = String::new();
    out.push_str("digraph swarm_plan {\n");
    out.push_str("  rankdir=LR;\n");

    for node in &graph.nodes {
        let style = if graph.critical_path.contains(&node.id) {
            ", style=bold"
        } else {
            ""
        };
        out.push_str(&format!(
            "  \"{}\" [label=\"{}\\n{} ({})\"{}];\n",
            escape_dot(&node.id),
            escape_dot(&node.id),
            escape_dot(&node.agent),
            node.model,
            style
        ));
    }

    let mut by_depth: BTreeMap<usize, Vec<&str>> = BTreeMap::new();
    for node in &graph.nodes {
        by_depth.entry(node.depth).or_default().push(&node.id);
    }
    for ids in by_depth.values().filter(|ids| ids.len() > 1) {
        let members: Vec<String> = ids.iter().map(|id| format!("\"{}\"", escape_dot(id))).collect();
        out.push_str(&format!("  {{ rank=same; {}; }}\n", members.join("; ")));
    }

    for edge in &graph.edges {
        out.push_str(&format!(
            "  \"{}\" -> \"{}\";\n",
            escape_dot(&edge.from),
            escape_dot(&edge.to)
        ));
    }

    out.push_str("}\n");
    out
}

fn escape_dot(v: &str) -> String {
    v.replace('\\', "\\\\").replace('"', "\\\"")
}
