use thiserror::Error;

/// Typed failures surfaced by the orchestration engine.
///
/// I/O-bearing functions return `anyhow::Result`; these variants travel inside
/// the `anyhow::Error` and can be recovered with `downcast_ref::<SwarmError>()`.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum SwarmError {
    #[error("graph contains a cycle ({sorted} of {total} tasks ordered)")]
    Cycle { sorted: usize, total: usize },

    #[error("no active swarm state named '{name}'")]
    StateNotFound { name: String },

    #[error("swarm '{name}' is already active")]
    AlreadyActive { name: String },

    #[error("invalid swarm name '{name}': {reason}")]
    InvalidName { name: String, reason: &'static str },

    #[error("swarm plan '{name}' failed dependency validation:\n{}", errors.join("\n"))]
    InvalidPlan { name: String, errors: Vec<String> },
}
