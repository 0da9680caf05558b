use anyhow::{anyhow, Result};
use std::env;
use std::path::PathBuf;

use crate::dispatch::DEFAULT_AGENT_NAMESPACE;

pub const DEFAULT_STATE_DIR: &str = ".swarm";
pub const DEFAULT_MAX_PARALLEL: usize = 4;

/// Runtime knobs, read from `SWARM_*` environment variables.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SwarmConfig {
    /// Storage root for per-swarm state and the history log.
    pub state_dir: PathBuf,
    /// Settings file whose `env.SWARM_TASK_LIST_ID` tracks the active swarm.
    pub settings_path: Option<PathBuf>,
    /// Upper bound on concurrent dispatches within one ready wave.
    pub max_parallel: usize,
    pub agent_namespace: String,
}

impl Default for SwarmConfig {
    fn default() -> Self {
        Self {
            state_dir: PathBuf::from(DEFAULT_STATE_DIR),
            settings_path: None,
            max_parallel: DEFAULT_MAX_PARALLEL,
            agent_namespace: DEFAULT_AGENT_NAMESPACE.to_string(),
        }
    }
}

impl SwarmConfig {
    pub fn from_env() -> Result<Self> {
        let mut config = Self::default();

        if let Some(dir) = non_empty_var("SWARM_STATE_DIR") {
            config.state_dir = PathBuf::from(dir);
        }
        config.settings_path = non_empty_var("SWARM_SETTINGS_PATH").map(PathBuf::from);
        config.max_parallel = max_parallel()?;
        if let Some(namespace) = non_empty_var("SWARM_AGENT_NAMESPACE") {
            if namespace.contains(':') || namespace.chars().any(char::is_whitespace) {
                return Err(anyhow!(
                    "invalid SWARM_AGENT_NAMESPACE: '{namespace}' (must not contain ':' or whitespace)"
                ));
            }
            config.agent_namespace = namespace;
        }

        Ok(config)
    }
}

fn non_empty_var(key: &str) -> Option<String> {
    env::var(key).ok().filter(|v| !v.trim().is_empty())
}

fn max_parallel() -> Result<usize> {
    let Some(v) = non_empty_var("SWARM_MAX_PARALLEL") else {
        return Ok(DEFAULT_MAX_PARALLEL);
    };
    let parsed: usize = v.trim().parse().map_err(|_| {
        anyhow!("invalid SWARM_MAX_PARALLEL: '{v}' (must be a positive integer)")
    })?;
    if parsed == 0 {
        return Err(anyhow!(
            "invalid SWARM_MAX_PARALLEL: '{v}' (must be a positive integer)"
        ));
    }
    Ok(parsed)
}
