//! The plan → dispatch → record → recompute loop.
//!
//! The orchestrator never runs a task itself. It hands spawn configs to a
//! [`Dispatcher`] and returns; completions come back through
//! [`Orchestrator::complete_task`] or [`Orchestrator::fail_task`].

use anyhow::Result;
use chrono::Utc;
use std::path::PathBuf;
use tracing::{info, warn};

use crate::bounded_executor::{run_bounded, Job};
use crate::config::SwarmConfig;
use crate::dispatch::{create_spawn_config_in, SpawnConfig, WorkerContext};
use crate::error::SwarmError;
use crate::graph;
use crate::settings;
use crate::state::{validate_name, SwarmStore};
use crate::types::{SwarmExecution, SwarmPlan, SwarmState, SwarmStatus, TaskCostEntry, TaskStatus};

/// Binding to whatever actually runs a worker.
pub trait Dispatcher: Send + Sync {
    fn dispatch(&self, config: &SpawnConfig) -> Result<()>;
}

pub struct Orchestrator<D: Dispatcher> {
    store: SwarmStore,
    dispatcher: D,
    max_parallel: usize,
    agent_namespace: String,
    settings_path: Option<PathBuf>,
}

impl<D: Dispatcher> Orchestrator<D> {
    pub fn new(config: &SwarmConfig, dispatcher: D) -> Self {
        Self {
            store: SwarmStore::new(config.state_dir.clone()),
            dispatcher,
            max_parallel: config.max_parallel.max(1),
            agent_namespace: config.agent_namespace.clone(),
            settings_path: config.settings_path.clone(),
        }
    }

    pub fn store(&self) -> &SwarmStore {
        &self.store
    }

    pub fn dispatcher(&self) -> &D {
        &self.dispatcher
    }

    /// Validate `plan`, persist its initial state under `name`, and link the
    /// settings task list when a settings file is configured.
    pub fn start(&self, name: &str, plan: SwarmPlan) -> Result<SwarmState> {
        validate_name(name)?;
        let validation = graph::validate_dependencies(plan.tasks());
        if !validation.valid {
            return Err(SwarmError::InvalidPlan {
                name: name.to_string(),
                errors: validation.errors,
            }
            .into());
        }
        if self.store.load(name).is_some() {
            return Err(SwarmError::AlreadyActive {
                name: name.to_string(),
            }
            .into());
        }

        self.store.init(name)?;
        let state = SwarmState::new(name, plan);
        self.store.save(&state)?;
        if let Some(path) = &self.settings_path {
            settings::set_task_list_id(path, name)?;
        }

        info!(
            swarm = %name,
            plan = state.plan.name(),
            tasks = state.plan.tasks().len(),
            "started swarm"
        );
        Ok(state)
    }

    /// Dispatch every ready task of an active swarm and return their ids.
    ///
    /// Ready tasks are marked in progress and saved before any dispatcher
    /// call, so completions recorded while the batch is running are kept.
    /// Dispatch failures are recorded as task failures rather than returned.
    pub fn dispatch_ready(&self, name: &str, ctx: Option<&WorkerContext>) -> Result<Vec<String>> {
        let mut state = self.load_required(name)?;
        if state.status != SwarmStatus::Active {
            info!(swarm = %name, "swarm is not active; nothing dispatched");
            return Ok(Vec::new());
        }

        let configs: Vec<SpawnConfig> = graph::ready_tasks(state.plan.tasks(), &state.completed_tasks)
            .into_iter()
            .map(|task| create_spawn_config_in(&self.agent_namespace, task, ctx))
            .collect();
        if configs.is_empty() {
            return Ok(Vec::new());
        }

        let now = Utc::now();
        for config in &configs {
            if let Some(task) = state.plan.task_mut(&config.task_id) {
                task.status = TaskStatus::InProgress;
                task.started_at = Some(now);
            }
        }
        self.store.save(&state)?;

        let dispatcher = &self.dispatcher;
        let jobs: Vec<Job<'_, Result<()>>> = configs
            .iter()
            .map(|config| Box::new(move || dispatcher.dispatch(config)) as Job<'_, Result<()>>)
            .collect();
        let outcomes = run_bounded(self.max_parallel, jobs)?;

        let mut dispatched = Vec::new();
        for (config, outcome) in configs.iter().zip(outcomes) {
            match outcome {
                Ok(()) => dispatched.push(config.task_id.clone()),
                Err(err) => {
                    warn!(swarm = %name, task = %config.task_id, error = %format!("{err:#}"), "dispatch failed");
                    self.store.record_task_failure(name, &config.task_id)?;
                }
            }
        }

        info!(swarm = %name, dispatched = dispatched.len(), "dispatched ready tasks");
        Ok(dispatched)
    }

    pub fn complete_task(&self, name: &str, task_id: &str, cost: TaskCostEntry) -> Result<SwarmState> {
        self.store.record_task_completion(name, task_id, cost)
    }

    pub fn fail_task(&self, name: &str, task_id: &str) -> Result<SwarmState> {
        self.store.record_task_failure(name, task_id)
    }

    pub fn stop(&self, name: &str) -> Result<SwarmState> {
        self.store.stop(name)
    }

    /// Archive the swarm to history and unlink the settings task list.
    pub fn finish(&self, name: &str) -> Result<SwarmExecution> {
        let state = self.load_required(name)?;
        if state.status == SwarmStatus::Active && !state.is_exhausted() {
            warn!(swarm = %name, "finishing swarm with work still pending");
        }
        let execution = self.store.record_swarm_completion(&state)?;
        if let Some(path) = &self.settings_path {
            settings::clear_task_list_id(path)?;
        }
        Ok(execution)
    }

    fn load_required(&self, name: &str) -> Result<SwarmState> {
        validate_name(name)?;
        self.store.load(name).ok_or_else(|| {
            anyhow::Error::from(SwarmError::StateNotFound {
                name: name.to_string(),
            })
        })
    }
}
