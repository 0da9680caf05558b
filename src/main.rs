use anyhow::{anyhow, Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

use swarm::classification::Classification;
use swarm::config::SwarmConfig;
use swarm::dispatch::{SpawnConfig, WorkerContext};
use swarm::graph;
use swarm::instrumentation;
use swarm::orchestrator::{Dispatcher, Orchestrator};
use swarm::planner;
use swarm::schema;
use swarm::types::{SwarmPlan, SwarmState, TaskCostEntry};
use swarm::SwarmError;

/// Swarm: plan, dispatch and track dependent agent tasks.
#[derive(Parser, Debug)]
#[command(name = "swarm")]
#[command(about = "Swarm task orchestration engine", long_about = None)]
struct Cli {
    /// Enable debug logging
    #[arg(long, global = true)]
    debug: bool,

    /// Storage root (overrides SWARM_STATE_DIR)
    #[arg(long, global = true)]
    state_dir: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, ValueEnum)]
enum PlanFormat {
    Text,
    Json,
    Dot,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Build a plan from a classification file and print it
    Plan {
        /// Classification record (JSON or YAML)
        classification: PathBuf,

        #[arg(long, value_enum, default_value_t = PlanFormat::Text)]
        format: PlanFormat,
    },
    /// Build a plan and persist it as a new active swarm
    Start {
        name: String,
        classification: PathBuf,
    },
    /// Emit spawn configs (one JSON object per line) for every ready task
    Dispatch {
        name: String,

        /// Shared context passed to every worker
        #[arg(long)]
        context: Option<String>,

        /// Constraint line for workers (repeatable)
        #[arg(long = "constraint")]
        constraints: Vec<String>,
    },
    /// Record a task as completed
    Complete {
        name: String,
        task: String,

        #[arg(long, default_value_t = 0)]
        input_tokens: u64,

        #[arg(long, default_value_t = 0)]
        output_tokens: u64,
    },
    /// Record a task as failed
    Fail { name: String, task: String },
    /// Stop scheduling new tasks
    Stop { name: String },
    /// Archive the swarm into history and remove its state
    Finish { name: String },
    /// Show the state of one swarm
    Status {
        name: String,

        #[arg(long)]
        json: bool,
    },
    /// List active swarms
    Active,
    /// Print the execution history as JSON
    History,
    /// Print the JSON schema that state.json is validated against
    Schema,
}

/// Hands spawn configs to whoever reads stdout.
struct StdoutDispatcher;

impl Dispatcher for StdoutDispatcher {
    fn dispatch(&self, config: &SpawnConfig) -> Result<()> {
        let line = serde_json::to_string(config).context("serialize spawn config")?;
        println!("{line}");
        Ok(())
    }
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let filter = if cli.debug {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .without_time()
        .with_writer(std::io::stderr)
        .init();

    let mut config = SwarmConfig::from_env()?;
    if let Some(dir) = cli.state_dir {
        config.state_dir = dir;
    }
    let orchestrator = Orchestrator::new(&config, StdoutDispatcher);

    match cli.command {
        Command::Plan {
            classification,
            format,
        } => {
            let plan = planner::create_swarm_plan(&Classification::load(&classification)?);
            match format {
                PlanFormat::Text => print_plan(&plan),
                PlanFormat::Json => println!("{}", instrumentation::export_graph_json(&plan)?),
                PlanFormat::Dot => print!("{}", instrumentation::export_graph_dot(&plan)),
            }
        }
        Command::Start {
            name,
            classification,
        } => {
            let plan = planner::create_swarm_plan(&Classification::load(&classification)?);
            let state = orchestrator.start(&name, plan)?;
            println!(
                "started swarm '{}' ({} tasks, {})",
                state.name,
                state.plan.tasks().len(),
                state.plan.parallelism()
            );
        }
        Command::Dispatch {
            name,
            context,
            constraints,
        } => {
            let ctx = WorkerContext {
                context,
                previous_results: Vec::new(),
                constraints,
            };
            orchestrator.dispatch_ready(&name, Some(&ctx))?;
        }
        Command::Complete {
            name,
            task,
            input_tokens,
            output_tokens,
        } => {
            let state = orchestrator
                .store()
                .load(&name)
                .ok_or_else(|| SwarmError::StateNotFound { name: name.clone() })?;
            let planned = state
                .plan
                .task(&task)
                .ok_or_else(|| anyhow!("task '{task}' is not part of swarm '{name}'"))?;
            let cost = TaskCostEntry::compute(
                &task,
                &planned.agent,
                planned.model,
                input_tokens,
                output_tokens,
            );
            let state = orchestrator.complete_task(&name, &task, cost)?;
            println!(
                "completed '{task}' ({}/{} done, total cost ${:.4})",
                state.completed_tasks.len(),
                state.plan.tasks().len(),
                state.total_cost
            );
        }
        Command::Fail { name, task } => {
            orchestrator.fail_task(&name, &task)?;
            println!("failed '{task}'");
        }
        Command::Stop { name } => {
            orchestrator.stop(&name)?;
            println!("stopped swarm '{name}'");
        }
        Command::Finish { name } => {
            let execution = orchestrator.finish(&name)?;
            println!(
                "finished swarm '{}': {} ({}/{} completed, {} failed, ${:.4}, {} ms)",
                execution.name,
                execution.status,
                execution.completed_tasks,
                execution.total_tasks,
                execution.failed_tasks,
                execution.total_cost,
                execution.duration_ms
            );
        }
        Command::Status { name, json } => {
            let state = orchestrator
                .store()
                .load(&name)
                .ok_or_else(|| SwarmError::StateNotFound { name: name.clone() })?;
            if json {
                println!("{}", serde_json::to_string_pretty(&state)?);
            } else {
                print_status(&state);
            }
        }
        Command::Active => {
            for state in orchestrator.store().active_swarms()? {
                println!(
                    "{}  {:?}  {}/{} completed",
                    state.name,
                    state.status,
                    state.completed_tasks.len(),
                    state.plan.tasks().len()
                );
            }
        }
        Command::History => {
            let history = orchestrator.store().history();
            println!("{}", serde_json::to_string_pretty(&history)?);
        }
        Command::Schema => {
            println!("{}", serde_json::to_string_pretty(schema::state_schema_json())?);
        }
    }

    Ok(())
}

fn print_plan(plan: &SwarmPlan) {
    println!("Swarm plan: {}", plan.name());
    println!("  parallelism: {}", plan.parallelism());
    println!("  tasks:       {}", plan.tasks().len());
    for (idx, group) in graph::parallel_groups(plan.tasks()).iter().enumerate() {
        println!("  wave {idx}:");
        for id in group {
            if let Some(task) = plan.task(id) {
                let deps = if task.blocked_by.is_empty() {
                    String::new()
                } else {
                    format!("  after={}", task.blocked_by.join(","))
                };
                println!(
                    "    {id}  agent={} model={}{deps}  {}",
                    task.agent, task.model, task.subject
                );
            }
        }
    }
    let critical = graph::critical_path(plan.tasks());
    println!("  critical path: {}", critical.join(" -> "));
}

fn print_status(state: &SwarmState) {
    println!("Swarm: {} ({:?})", state.name, state.status);
    println!(
        "  completed: {}/{}  failed: {}  cost: ${:.4}",
        state.completed_tasks.len(),
        state.plan.tasks().len(),
        state.failed_tasks.len(),
        state.total_cost
    );
    for task in state.plan.tasks() {
        println!("    {:<14} {:<12} {}", task.id, task.status, task.agent);
    }
    let ready: Vec<&str> = graph::ready_tasks(state.plan.tasks(), &state.completed_tasks)
        .iter()
        .map(|t| t.id.as_str())
        .collect();
    if !ready.is_empty() {
        println!("  ready: {}", ready.join(", "));
    }
}
