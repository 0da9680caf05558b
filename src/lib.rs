//! Swarm task orchestration engine.
//!
//! This crate turns a classified request into a dependency-linked task plan
//! (`planner`), analyses that plan (`graph`), builds worker spawn
//! configurations (`dispatch`), and keeps crash-safe execution state and
//! history on disk (`state`). The `orchestrator` ties these together around an
//! injected `Dispatcher`; the `swarm` CLI is a thin driver over it.
//!
//! Invariants:
//! - `blocks` always mirrors `blocked_by` for plans built with `SwarmPlan::new`
//! - topological order is stable: ready ties keep input order
//! - state files are replaced by atomic rename, never written in place
//! - one ready wave is dispatched with bounded parallelism

pub mod bounded_executor;
pub mod classification;
pub mod config;
pub mod dispatch;
pub mod error;
pub mod graph;
pub mod instrumentation;
pub mod orchestrator;
pub mod planner;
pub mod schema;
pub mod settings;
pub mod state;
pub mod types;

pub use error::SwarmError;
