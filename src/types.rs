use chrono::{DateTime, Utc};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use std::fmt;

use crate::graph;

/// Execution status of a single task.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize, JsonSchema,
)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    #[default]
    Pending,
    InProgress,
    Completed,
    Failed,
}

impl TaskStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            TaskStatus::Pending => "pending",
            TaskStatus::InProgress => "in_progress",
            TaskStatus::Completed => "completed",
            TaskStatus::Failed => "failed",
        }
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, TaskStatus::Completed | TaskStatus::Failed)
    }
}

impl fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(self.as_str())
    }
}

/// Capability/cost tier of the model a worker runs on. Ordered cheapest first.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    PartialOrd,
    Ord,
    Default,
    Serialize,
    Deserialize,
    JsonSchema,
)]
#[serde(rename_all = "lowercase")]
pub enum ModelTier {
    Haiku,
    #[default]
    Sonnet,
    Opus,
}

impl ModelTier {
    pub fn as_str(self) -> &'static str {
        match self {
            ModelTier::Haiku => "haiku",
            ModelTier::Sonnet => "sonnet",
            ModelTier::Opus => "opus",
        }
    }

    /// USD per million (input, output) tokens.
    pub fn price_per_million(self) -> (f64, f64) {
        match self {
            ModelTier::Haiku => (0.25, 1.25),
            ModelTier::Sonnet => (3.0, 15.0),
            ModelTier::Opus => (15.0, 75.0),
        }
    }
}

impl fmt::Display for ModelTier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Execution strategy hint attached to a plan.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize, JsonSchema,
)]
#[serde(rename_all = "lowercase")]
pub enum Parallelism {
    #[default]
    Sequential,
    Parallel,
    Hybrid,
}

impl Parallelism {
    pub fn as_str(self) -> &'static str {
        match self {
            Parallelism::Sequential => "sequential",
            Parallelism::Parallel => "parallel",
            Parallelism::Hybrid => "hybrid",
        }
    }
}

impl fmt::Display for Parallelism {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Lifecycle of an in-flight plan.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "lowercase")]
pub enum SwarmStatus {
    #[default]
    Active,
    Completed,
    Stopped,
}

/// Final status recorded in the history log.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "lowercase")]
pub enum ExecutionStatus {
    Completed,
    Stopped,
    Failed,
}

impl fmt::Display for ExecutionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            ExecutionStatus::Completed => "completed",
            ExecutionStatus::Stopped => "stopped",
            ExecutionStatus::Failed => "failed",
        })
    }
}

/// Token and cost accounting for one finished task.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct TaskCostEntry {
    pub task_id: String,
    pub agent: String,
    pub model: ModelTier,
    pub input_tokens: u64,
    pub output_tokens: u64,
    pub cost: f64,
}

impl TaskCostEntry {
    /// Build an entry whose `cost` is derived from the tier's token prices.
    pub fn compute(
        task_id: impl Into<String>,
        agent: impl Into<String>,
        model: ModelTier,
        input_tokens: u64,
        output_tokens: u64,
    ) -> Self {
        let (input_price, output_price) = model.price_per_million();
        let cost = (input_tokens as f64 * input_price + output_tokens as f64 * output_price)
            / 1_000_000.0;
        Self {
            task_id: task_id.into(),
            agent: agent.into(),
            model,
            input_tokens,
            output_tokens,
            cost,
        }
    }
}

/// A schedulable unit of work.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct SwarmTask {
    pub id: String,
    pub subject: String,
    pub description: String,
    #[serde(default)]
    pub status: TaskStatus,
    pub agent: String,
    pub model: ModelTier,
    #[serde(default)]
    pub blocked_by: Vec<String>,
    #[serde(default)]
    pub blocks: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub owner: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cost: Option<TaskCostEntry>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<JsonValue>,
    pub created_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub started_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<DateTime<Utc>>,
}

impl SwarmTask {
    pub fn new(
        id: impl Into<String>,
        subject: impl Into<String>,
        description: impl Into<String>,
        agent: impl Into<String>,
        model: ModelTier,
    ) -> Self {
        Self {
            id: id.into(),
            subject: subject.into(),
            description: description.into(),
            status: TaskStatus::Pending,
            agent: agent.into(),
            model,
            blocked_by: Vec::new(),
            blocks: Vec::new(),
            owner: None,
            cost: None,
            metadata: None,
            created_at: Utc::now(),
            started_at: None,
            completed_at: None,
        }
    }

    pub fn with_blocked_by<I, S>(mut self, blockers: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.blocked_by = blockers.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_status(mut self, status: TaskStatus) -> Self {
        self.status = status;
        self
    }
}

/// A named, ordered collection of tasks with a parallelism mode.
///
/// Construction goes through [`SwarmPlan::new`], which back-fills every
/// task's `blocks` from all `blocked_by` lists. The task set and its edges are
/// read-only afterwards; only status/cost/timestamp fields change, and only
/// through the persistence layer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct SwarmPlan {
    id: String,
    name: String,
    tasks: Vec<SwarmTask>,
    parallelism: Parallelism,
    created_at: DateTime<Utc>,
}

impl SwarmPlan {
    pub fn new(name: impl Into<String>, mut tasks: Vec<SwarmTask>, parallelism: Parallelism) -> Self {
        graph::link_dependencies(&mut tasks);
        Self {
            id: new_id("plan"),
            name: name.into(),
            tasks,
            parallelism,
            created_at: Utc::now(),
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn tasks(&self) -> &[SwarmTask] {
        &self.tasks
    }

    pub fn parallelism(&self) -> Parallelism {
        self.parallelism
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn task(&self, id: &str) -> Option<&SwarmTask> {
        self.tasks.iter().find(|t| t.id == id)
    }

    pub(crate) fn task_mut(&mut self, id: &str) -> Option<&mut SwarmTask> {
        self.tasks.iter_mut().find(|t| t.id == id)
    }
}

/// Derived view of one task inside a dependency graph. Never persisted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DependencyNode {
    pub task_id: String,
    pub depth: usize,
    pub blocked_by: Vec<String>,
    pub blocks: Vec<String>,
}

/// Mutable execution record of one in-flight plan.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct SwarmState {
    pub id: String,
    pub name: String,
    pub status: SwarmStatus,
    pub plan: SwarmPlan,
    #[serde(default)]
    pub completed_tasks: Vec<String>,
    #[serde(default)]
    pub failed_tasks: Vec<String>,
    #[serde(default)]
    pub total_cost: f64,
    pub started_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<DateTime<Utc>>,
}

impl SwarmState {
    pub fn new(name: impl Into<String>, plan: SwarmPlan) -> Self {
        Self {
            id: new_id("swarm"),
            name: name.into(),
            status: SwarmStatus::Active,
            plan,
            completed_tasks: Vec::new(),
            failed_tasks: Vec::new(),
            total_cost: 0.0,
            started_at: Utc::now(),
            completed_at: None,
        }
    }

    /// True when nothing is running and no pending task can become ready.
    pub fn is_exhausted(&self) -> bool {
        let tasks = self.plan.tasks();
        let running = tasks.iter().any(|t| t.status == TaskStatus::InProgress);
        !running && graph::ready_tasks(tasks, &self.completed_tasks).is_empty()
    }
}

/// Append-only summary of a finished plan, stored in the history log.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SwarmExecution {
    pub id: String,
    pub name: String,
    pub plan_id: String,
    pub status: ExecutionStatus,
    pub total_tasks: usize,
    pub completed_tasks: usize,
    pub failed_tasks: usize,
    pub total_cost: f64,
    pub started_at: DateTime<Utc>,
    pub completed_at: DateTime<Utc>,
    pub duration_ms: i64,
}

pub(crate) fn new_id(prefix: &str) -> String {
    format!(
        "{prefix}-{}-{:08x}",
        Utc::now().timestamp_millis(),
        rand::random::<u32>()
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn model_tiers_are_ordered_by_capability() {
        assert!(ModelTier::Haiku < ModelTier::Sonnet);
        assert!(ModelTier::Sonnet < ModelTier::Opus);
    }

    #[test]
    fn task_status_serializes_snake_case() {
        let json = serde_json::to_string(&TaskStatus::InProgress).unwrap();
        assert_eq!(json, "\"in_progress\"");
        let parsed: TaskStatus = serde_json::from_str("\"failed\"").unwrap();
        assert_eq!(parsed, TaskStatus::Failed);
    }

    #[test]
    fn task_serializes_camel_case_edges() {
        let task = SwarmTask::new("b", "B", "do b", "executor", ModelTier::Sonnet)
            .with_blocked_by(["a"]);
        let value = serde_json::to_value(&task).unwrap();
        assert_eq!(value["blockedBy"], serde_json::json!(["a"]));
        assert_eq!(value["blocks"], serde_json::json!([]));
        assert!(value.get("startedAt").is_none());
    }

    #[test]
    fn plan_new_backfills_blocks() {
        let plan = SwarmPlan::new(
            "p",
            vec![
                SwarmTask::new("a", "A", "", "explore", ModelTier::Haiku),
                SwarmTask::new("b", "B", "", "executor", ModelTier::Sonnet).with_blocked_by(["a"]),
            ],
            Parallelism::Sequential,
        );
        assert_eq!(plan.task("a").unwrap().blocks, vec!["b".to_string()]);
        assert!(plan.task("b").unwrap().blocks.is_empty());
        assert!(plan.id().starts_with("plan-"));
    }

    #[test]
    fn cost_entry_uses_tier_prices() {
        let entry = TaskCostEntry::compute("t", "executor", ModelTier::Sonnet, 1_000_000, 100_000);
        assert!((entry.cost - 4.5).abs() < 1e-9, "cost was {}", entry.cost);

        let cheap = TaskCostEntry::compute("t", "explore", ModelTier::Haiku, 1_000_000, 0);
        assert!((cheap.cost - 0.25).abs() < 1e-9);
    }

    #[test]
    fn state_is_exhausted_when_remaining_work_is_blocked_by_failure() {
        let plan = SwarmPlan::new(
            "p",
            vec![
                SwarmTask::new("a", "A", "", "explore", ModelTier::Haiku)
                    .with_status(TaskStatus::Failed),
                SwarmTask::new("b", "B", "", "executor", ModelTier::Sonnet).with_blocked_by(["a"]),
            ],
            Parallelism::Sequential,
        );
        let mut state = SwarmState::new("p", plan);
        state.failed_tasks.push("a".to_string());
        assert!(state.is_exhausted());
    }

    #[test]
    fn state_is_not_exhausted_while_a_task_runs() {
        let plan = SwarmPlan::new(
            "p",
            vec![SwarmTask::new("a", "A", "", "explore", ModelTier::Haiku)
                .with_status(TaskStatus::InProgress)],
            Parallelism::Sequential,
        );
        let state = SwarmState::new("p", plan);
        assert!(!state.is_exhausted());
    }
}
