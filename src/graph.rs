//! Dependency analysis over a task list.
//!
//! Everything here is pure: functions take `&[SwarmTask]` and return derived
//! data. `blocked_by` is the authoritative edge direction; successor lists are
//! derived from it. When a task id appears more than once, the first
//! occurrence wins (and `validate_dependencies` reports the duplicate).

use serde::Serialize;
use std::collections::{BTreeMap, HashMap, HashSet, VecDeque};

use crate::error::SwarmError;
use crate::types::{DependencyNode, SwarmTask, TaskStatus};

/// Arena of dependency nodes indexed by position, with an id lookup.
#[derive(Debug, Clone, Default)]
pub struct DependencyGraph {
    nodes: Vec<DependencyNode>,
    index: HashMap<String, usize>,
    // Position of each node's task in the input slice.
    positions: Vec<usize>,
    // Distinct predecessors that exist in the graph.
    preds: Vec<Vec<usize>>,
    succs: Vec<Vec<usize>>,
    // Distinct blockers that do not exist in the graph.
    unresolved: Vec<usize>,
}

impl DependencyGraph {
    pub fn nodes(&self) -> &[DependencyNode] {
        &self.nodes
    }

    pub fn node(&self, task_id: &str) -> Option<&DependencyNode> {
        self.index.get(task_id).map(|&idx| &self.nodes[idx])
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn max_depth(&self) -> Option<usize> {
        self.nodes.iter().map(|n| n.depth).max()
    }
}

/// Build the dependency graph for `tasks` and compute node depths.
pub fn build_graph(tasks: &[SwarmTask]) -> DependencyGraph {
    let mut nodes = Vec::with_capacity(tasks.len());
    let mut index: HashMap<String, usize> = HashMap::with_capacity(tasks.len());
    let mut positions = Vec::with_capacity(tasks.len());

    for (pos, task) in tasks.iter().enumerate() {
        if index.contains_key(&task.id) {
            continue;
        }
        index.insert(task.id.clone(), nodes.len());
        positions.push(pos);
        nodes.push(DependencyNode {
            task_id: task.id.clone(),
            depth: 0,
            blocked_by: task.blocked_by.clone(),
            blocks: Vec::new(),
        });
    }

    let n = nodes.len();
    let mut preds: Vec<Vec<usize>> = vec![Vec::new(); n];
    let mut succs: Vec<Vec<usize>> = vec![Vec::new(); n];
    let mut unresolved = vec![0usize; n];

    for (idx, node) in nodes.iter().enumerate() {
        let mut seen: HashSet<&str> = HashSet::new();
        for dep in &node.blocked_by {
            if !seen.insert(dep.as_str()) {
                continue;
            }
            match index.get(dep) {
                Some(&pred) => {
                    preds[idx].push(pred);
                    succs[pred].push(idx);
                }
                None => unresolved[idx] += 1,
            }
        }
    }

    for (idx, node) in nodes.iter_mut().enumerate() {
        node.blocks = succs[idx]
            .iter()
            .map(|&s| tasks[positions[s]].id.clone())
            .collect();
    }

    let mut graph = DependencyGraph {
        nodes,
        index,
        positions,
        preds,
        succs,
        unresolved,
    };
    calculate_depths(&mut graph);
    graph
}

/// Breadth-first depth propagation from every node without predecessors.
///
/// A node is finalized once all of its predecessors are; nodes on a cycle are
/// never finalized and keep whatever depth they last had.
pub fn calculate_depths(graph: &mut DependencyGraph) {
    let mut remaining: Vec<usize> = graph.preds.iter().map(Vec::len).collect();
    let mut queue: VecDeque<usize> = (0..graph.nodes.len())
        .filter(|&idx| remaining[idx] == 0)
        .collect();
    for &idx in &queue {
        graph.nodes[idx].depth = 0;
    }

    while let Some(current) = queue.pop_front() {
        let next_depth = graph.nodes[current].depth + 1;
        for &next in &graph.succs[current] {
            if graph.nodes[next].depth < next_depth {
                graph.nodes[next].depth = next_depth;
            }
            remaining[next] -= 1;
            if remaining[next] == 0 {
                queue.push_back(next);
            }
        }
    }
}

/// Kahn's algorithm. Ties among simultaneously ready tasks keep input order.
///
/// Blockers that do not exist are never satisfied, so they surface as
/// [`SwarmError::Cycle`] together with real cycles. Call [`detect_cycle`] or
/// [`validate_dependencies`] first for a non-failing check.
pub fn topological_sort(tasks: &[SwarmTask]) -> Result<Vec<&SwarmTask>, SwarmError> {
    let graph = build_graph(tasks);
    let mut indegree: Vec<usize> = graph
        .preds
        .iter()
        .zip(&graph.unresolved)
        .map(|(preds, missing)| preds.len() + missing)
        .collect();

    let mut queue: VecDeque<usize> = (0..graph.len()).filter(|&i| indegree[i] == 0).collect();
    let mut order = Vec::with_capacity(graph.len());

    while let Some(current) = queue.pop_front() {
        order.push(&tasks[graph.positions[current]]);
        for &next in &graph.succs[current] {
            indegree[next] -= 1;
            if indegree[next] == 0 {
                queue.push_back(next);
            }
        }
    }

    if order.len() < graph.len() {
        return Err(SwarmError::Cycle {
            sorted: order.len(),
            total: graph.len(),
        });
    }
    Ok(order)
}

/// Task ids grouped by depth, shallowest first. Tasks in one group share no
/// dependency edge and may run concurrently.
pub fn parallel_groups(tasks: &[SwarmTask]) -> Vec<Vec<String>> {
    let graph = build_graph(tasks);
    let mut by_depth: BTreeMap<usize, Vec<String>> = BTreeMap::new();
    for node in graph.nodes() {
        by_depth
            .entry(node.depth)
            .or_default()
            .push(node.task_id.clone());
    }
    by_depth.into_values().collect()
}

/// Pending tasks whose blockers have all completed. No ordering guarantee.
pub fn ready_tasks<'a>(tasks: &'a [SwarmTask], completed_ids: &[String]) -> Vec<&'a SwarmTask> {
    let completed: HashSet<&str> = completed_ids.iter().map(String::as_str).collect();
    tasks
        .iter()
        .filter(|t| t.status == TaskStatus::Pending)
        .filter(|t| t.blocked_by.iter().all(|dep| completed.contains(dep.as_str())))
        .collect()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Color {
    White,
    Gray,
    Black,
}

/// Three-color DFS along `blocked_by` edges. Returns the ids on the first back
/// edge found, from the revisited task to the task that reached it.
///
/// The walk keeps an explicit stack, so chain length is bounded by memory
/// rather than the thread stack.
pub fn detect_cycle(tasks: &[SwarmTask]) -> Option<Vec<String>> {
    let graph = build_graph(tasks);
    let mut color = vec![Color::White; graph.len()];

    for start in 0..graph.len() {
        if color[start] != Color::White {
            continue;
        }
        if let Some(cycle) = visit(&graph, start, &mut color) {
            return Some(cycle);
        }
    }
    None
}

fn visit(graph: &DependencyGraph, start: usize, color: &mut [Color]) -> Option<Vec<String>> {
    // (node, index of the next predecessor to explore); doubles as the DFS path.
    let mut stack: Vec<(usize, usize)> = vec![(start, 0)];
    color[start] = Color::Gray;

    while let Some(top) = stack.last_mut() {
        let (current, next_pred) = *top;
        let Some(&next) = graph.preds[current].get(next_pred) else {
            color[current] = Color::Black;
            stack.pop();
            continue;
        };
        top.1 += 1;

        match color[next] {
            Color::Gray => {
                let pos = stack.iter().position(|&(node, _)| node == next)?;
                return Some(
                    stack[pos..]
                        .iter()
                        .map(|&(idx, _)| graph.nodes[idx].task_id.clone())
                        .collect(),
                );
            }
            Color::White => {
                color[next] = Color::Gray;
                stack.push((next, 0));
            }
            Color::Black => {}
        }
    }
    None
}

/// Longest dependency chain, as task ids from first to last.
///
/// Empty when the tasks cannot be ordered.
pub fn critical_path(tasks: &[SwarmTask]) -> Vec<String> {
    let Ok(order) = topological_sort(tasks) else {
        return Vec::new();
    };

    // Per task: chain length ending here and the predecessor it extends.
    let mut longest: HashMap<&str, (usize, Option<&str>)> = HashMap::with_capacity(order.len());
    let mut best: Option<(&str, usize)> = None;

    for task in order {
        let mut length = 0;
        let mut via = None;
        for dep in &task.blocked_by {
            if let Some(&(candidate, _)) = longest.get(dep.as_str()) {
                if candidate > length {
                    length = candidate;
                    via = Some(dep.as_str());
                }
            }
        }
        length += 1;
        if best.map_or(true, |(_, best_len)| length > best_len) {
            best = Some((task.id.as_str(), length));
        }
        longest.insert(task.id.as_str(), (length, via));
    }

    let mut path = Vec::new();
    let mut cursor = best.map(|(id, _)| id);
    while let Some(id) = cursor {
        path.push(id.to_string());
        cursor = longest.get(id).and_then(|&(_, via)| via);
    }
    path.reverse();
    path
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ValidationResult {
    pub valid: bool,
    pub errors: Vec<String>,
}

/// Report referential problems and cycles as readable messages.
pub fn validate_dependencies(tasks: &[SwarmTask]) -> ValidationResult {
    let mut errors = Vec::new();
    let mut ids: HashSet<&str> = HashSet::with_capacity(tasks.len());
    for task in tasks {
        if !ids.insert(task.id.as_str()) {
            errors.push(format!("duplicate task id '{}'", task.id));
        }
    }

    for task in tasks {
        for dep in &task.blocked_by {
            if *dep == task.id {
                errors.push(format!("task '{}' lists itself in blockedBy", task.id));
            } else if !ids.contains(dep.as_str()) {
                errors.push(format!(
                    "task '{}' is blocked by unknown task '{}'",
                    task.id, dep
                ));
            }
        }
        for dependent in &task.blocks {
            if *dependent == task.id {
                errors.push(format!("task '{}' lists itself in blocks", task.id));
            } else if !ids.contains(dependent.as_str()) {
                errors.push(format!(
                    "task '{}' blocks unknown task '{}'",
                    task.id, dependent
                ));
            }
        }
    }

    if let Some(cycle) = detect_cycle(tasks) {
        let mut rendered = cycle.join(" -> ");
        if let Some(first) = cycle.first() {
            rendered.push_str(" -> ");
            rendered.push_str(first);
        }
        errors.push(format!("dependency cycle detected: {rendered}"));
    }

    ValidationResult {
        valid: errors.is_empty(),
        errors,
    }
}

/// Rebuild every task's `blocks` list from all `blocked_by` lists so the two
/// directions agree. Blockers that do not exist are left for validation.
pub fn link_dependencies(tasks: &mut [SwarmTask]) {
    let known: HashSet<String> = tasks.iter().map(|t| t.id.clone()).collect();
    let mut blocks: HashMap<String, Vec<String>> = HashMap::new();

    for task in tasks.iter() {
        for dep in &task.blocked_by {
            if !known.contains(dep) {
                continue;
            }
            let dependents = blocks.entry(dep.clone()).or_default();
            if !dependents.contains(&task.id) {
                dependents.push(task.id.clone());
            }
        }
    }

    for task in tasks.iter_mut() {
        task.blocks = blocks.remove(&task.id).unwrap_or_default();
    }
}
