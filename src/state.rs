//! Durable storage for in-flight swarms and the shared history log.
//!
//! Layout under the storage root:
//!
//! ```text
//! <root>/<name>/state.json   one per active swarm
//! <root>/history.json        JSON array of finished executions
//! ```
//!
//! Every write goes to a uniquely named temp file in the target directory,
//! is fsync'd, and is renamed over the destination. There is no cross-process
//! lock: two processes saving the same swarm race and the last rename wins.

use anyhow::{anyhow, Context, Result};
use chrono::Utc;
use serde::Serialize;
use serde_json::Value as JsonValue;
use std::fs;
use std::io::{ErrorKind, Write};
use std::path::{Component, Path, PathBuf};
use tracing::{debug, info, warn};

use crate::error::SwarmError;
use crate::schema;
use crate::types::{
    ExecutionStatus, SwarmExecution, SwarmState, SwarmStatus, TaskCostEntry, TaskStatus,
};

const STATE_FILE: &str = "state.json";
const HISTORY_FILE: &str = "history.json";

#[derive(Debug, Clone)]
pub struct SwarmStore {
    root: PathBuf,
}

impl SwarmStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn state_path(&self, name: &str) -> Result<PathBuf> {
        validate_name(name)?;
        Ok(self.root.join(name).join(STATE_FILE))
    }

    pub fn history_path(&self) -> PathBuf {
        self.root.join(HISTORY_FILE)
    }

    /// Create the swarm directory with placeholder files where missing.
    pub fn init(&self, name: &str) -> Result<()> {
        let state_path = self.state_path(name)?;
        if let Some(dir) = state_path.parent() {
            fs::create_dir_all(dir)
                .with_context(|| format!("create swarm directory '{}'", dir.display()))?;
        }
        if !state_path.exists() {
            write_json_atomic(&state_path, &serde_json::json!({}))?;
        }
        let history_path = self.history_path();
        if !history_path.exists() {
            write_json_atomic(&history_path, &serde_json::json!([]))?;
        }
        debug!(swarm = %name, root = %self.root.display(), "initialized swarm storage");
        Ok(())
    }

    pub fn save(&self, state: &SwarmState) -> Result<()> {
        let path = self.state_path(&state.name)?;
        write_json_atomic(&path, state)
            .with_context(|| format!("save swarm state '{}'", state.name))
    }

    /// Load a swarm's state. Missing, placeholder or corrupt files read as
    /// `None`; corruption is logged.
    pub fn load(&self, name: &str) -> Option<SwarmState> {
        let path = match self.state_path(name) {
            Ok(path) => path,
            Err(err) => {
                warn!(swarm = %name, error = %err, "refusing to load swarm state");
                return None;
            }
        };

        let text = match fs::read_to_string(&path) {
            Ok(text) => text,
            Err(err) if err.kind() == ErrorKind::NotFound => return None,
            Err(err) => {
                warn!(path = %path.display(), error = %err, "failed to read swarm state");
                return None;
            }
        };

        let value: JsonValue = match serde_json::from_str(&text) {
            Ok(value) => value,
            Err(err) => {
                warn!(path = %path.display(), error = %err, "swarm state is not valid JSON");
                return None;
            }
        };
        if value.as_object().is_some_and(|obj| obj.is_empty()) {
            return None;
        }
        if let Err(err) = schema::validate_state_value(&value) {
            warn!(path = %path.display(), error = %err, "swarm state failed schema validation");
            return None;
        }
        match serde_json::from_value(value) {
            Ok(state) => Some(state),
            Err(err) => {
                warn!(path = %path.display(), error = %err, "failed to decode swarm state");
                None
            }
        }
    }

    fn load_required(&self, name: &str) -> Result<SwarmState> {
        validate_name(name)?;
        self.load(name).ok_or_else(|| {
            anyhow::Error::from(SwarmError::StateNotFound {
                name: name.to_string(),
            })
        })
    }

    /// Mark a task completed and attach its cost. Recording the same task
    /// twice replaces the earlier cost.
    pub fn record_task_completion(
        &self,
        name: &str,
        task_id: &str,
        cost: TaskCostEntry,
    ) -> Result<SwarmState> {
        let mut state = self.load_required(name)?;
        let amount = cost.cost;
        let task = state
            .plan
            .task_mut(task_id)
            .ok_or_else(|| anyhow!("task '{task_id}' is not part of swarm '{name}'"))?;
        task.status = TaskStatus::Completed;
        task.cost = Some(cost);
        task.completed_at = Some(Utc::now());

        if !state.completed_tasks.iter().any(|id| id == task_id) {
            state.completed_tasks.push(task_id.to_string());
        }
        state.failed_tasks.retain(|id| id != task_id);
        state.total_cost = state
            .plan
            .tasks()
            .iter()
            .filter_map(|t| t.cost.as_ref())
            .map(|c| c.cost)
            .sum();

        self.save(&state)?;
        info!(
            swarm = %name,
            task = %task_id,
            cost = amount,
            total_cost = state.total_cost,
            "recorded task completion"
        );
        Ok(state)
    }

    pub fn record_task_failure(&self, name: &str, task_id: &str) -> Result<SwarmState> {
        let mut state = self.load_required(name)?;
        let task = state
            .plan
            .task_mut(task_id)
            .ok_or_else(|| anyhow!("task '{task_id}' is not part of swarm '{name}'"))?;
        task.status = TaskStatus::Failed;
        task.completed_at = Some(Utc::now());

        if !state.failed_tasks.iter().any(|id| id == task_id) {
            state.failed_tasks.push(task_id.to_string());
        }

        self.save(&state)?;
        warn!(swarm = %name, task = %task_id, "recorded task failure");
        Ok(state)
    }

    /// Halt scheduling. In-flight tasks are left alone.
    pub fn stop(&self, name: &str) -> Result<SwarmState> {
        let mut state = self.load_required(name)?;
        state.status = SwarmStatus::Stopped;
        self.save(&state)?;
        info!(swarm = %name, "stopped swarm");
        Ok(state)
    }

    /// Archive a finished swarm into the history log and remove its state.
    pub fn record_swarm_completion(&self, state: &SwarmState) -> Result<SwarmExecution> {
        let state_path = self.state_path(&state.name)?;
        let completed_at = Utc::now();
        let status = if state.status == SwarmStatus::Stopped {
            ExecutionStatus::Stopped
        } else if !state.failed_tasks.is_empty() {
            ExecutionStatus::Failed
        } else {
            ExecutionStatus::Completed
        };

        let execution = SwarmExecution {
            id: state.id.clone(),
            name: state.name.clone(),
            plan_id: state.plan.id().to_string(),
            status,
            total_tasks: state.plan.tasks().len(),
            completed_tasks: state.completed_tasks.len(),
            failed_tasks: state.failed_tasks.len(),
            total_cost: state.total_cost,
            started_at: state.started_at,
            completed_at,
            duration_ms: (completed_at - state.started_at).num_milliseconds(),
        };

        let mut history = self.history();
        history.push(execution.clone());
        write_json_atomic(&self.history_path(), &history).context("append swarm history")?;

        match fs::remove_file(&state_path) {
            Ok(()) => {}
            Err(err) if err.kind() == ErrorKind::NotFound => {}
            Err(err) => {
                return Err(err)
                    .with_context(|| format!("remove swarm state '{}'", state_path.display()))
            }
        }
        if let Some(dir) = state_path.parent() {
            // Fails harmlessly when the directory still holds other files.
            let _ = fs::remove_dir(dir);
        }

        info!(
            swarm = %state.name,
            status = %execution.status,
            completed = execution.completed_tasks,
            failed = execution.failed_tasks,
            total_cost = execution.total_cost,
            duration_ms = execution.duration_ms,
            "archived swarm execution"
        );
        Ok(execution)
    }

    /// All swarms with a loadable state, sorted by name.
    pub fn active_swarms(&self) -> Result<Vec<SwarmState>> {
        let entries = match fs::read_dir(&self.root) {
            Ok(entries) => entries,
            Err(err) if err.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
            Err(err) => {
                return Err(err)
                    .with_context(|| format!("list swarm root '{}'", self.root.display()))
            }
        };

        let mut swarms = Vec::new();
        for entry in entries {
            let entry = entry.with_context(|| format!("list swarm root '{}'", self.root.display()))?;
            if !entry.file_type().map(|t| t.is_dir()).unwrap_or(false) {
                continue;
            }
            let Some(name) = entry.file_name().to_str().map(str::to_string) else {
                continue;
            };
            if let Some(state) = self.load(&name) {
                swarms.push(state);
            }
        }
        swarms.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(swarms)
    }

    /// Finished executions, oldest first. A missing or corrupt log reads as
    /// empty.
    pub fn history(&self) -> Vec<SwarmExecution> {
        let path = self.history_path();
        let text = match fs::read_to_string(&path) {
            Ok(text) => text,
            Err(err) if err.kind() == ErrorKind::NotFound => return Vec::new(),
            Err(err) => {
                warn!(path = %path.display(), error = %err, "failed to read swarm history");
                return Vec::new();
            }
        };
        match serde_json::from_str(&text) {
            Ok(history) => history,
            Err(err) => {
                warn!(path = %path.display(), error = %err, "swarm history is corrupt");
                Vec::new()
            }
        }
    }
}

/// Names become directory names, so they must be one plain path component.
pub fn validate_name(name: &str) -> Result<(), SwarmError> {
    let invalid = |reason| SwarmError::InvalidName {
        name: name.to_string(),
        reason,
    };
    if name.trim().is_empty() {
        return Err(invalid("must not be empty"));
    }
    if name.contains('/') || name.contains('\\') {
        return Err(invalid("must not contain path separators"));
    }
    let mut components = Path::new(name).components();
    match (components.next(), components.next()) {
        (Some(Component::Normal(_)), None) => Ok(()),
        _ => Err(invalid("must be a single plain path component")),
    }
}

/// Serialize `value` to `path` through a temp file and an atomic rename.
pub(crate) fn write_json_atomic<T: Serialize + ?Sized>(path: &Path, value: &T) -> Result<()> {
    let dir = match path.parent() {
        Some(dir) if !dir.as_os_str().is_empty() => dir,
        _ => Path::new("."),
    };
    fs::create_dir_all(dir).with_context(|| format!("create directory '{}'", dir.display()))?;

    let file_name = path
        .file_name()
        .and_then(|n| n.to_str())
        .ok_or_else(|| anyhow!("invalid target path '{}'", path.display()))?;
    let tmp = dir.join(format!(
        ".{file_name}.{}.{:08x}.tmp",
        std::process::id(),
        rand::random::<u32>()
    ));

    let mut body = serde_json::to_vec_pretty(value)
        .with_context(|| format!("serialize '{}'", path.display()))?;
    body.push(b'\n');

    let result = (|| -> Result<()> {
        let mut file = fs::File::create(&tmp)
            .with_context(|| format!("create temp file '{}'", tmp.display()))?;
        file.write_all(&body)
            .with_context(|| format!("write temp file '{}'", tmp.display()))?;
        file.sync_all()
            .with_context(|| format!("sync temp file '{}'", tmp.display()))?;
        fs::rename(&tmp, path).with_context(|| {
            format!("rename '{}' to '{}'", tmp.display(), path.display())
        })?;
        Ok(())
    })();

    if result.is_err() {
        let _ = fs::remove_file(&tmp);
    }
    result
}
