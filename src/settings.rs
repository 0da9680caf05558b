//! Links the active swarm to an external task tracker through a single field
//! of a JSON settings file: `env.SWARM_TASK_LIST_ID`.

use anyhow::{anyhow, Context, Result};
use serde_json::{Map, Value as JsonValue};
use std::fs;
use std::io::ErrorKind;
use std::path::Path;
use tracing::debug;

use crate::state::write_json_atomic;

pub const TASK_LIST_ENV_KEY: &str = "SWARM_TASK_LIST_ID";

fn read_settings(path: &Path) -> Result<Option<Map<String, JsonValue>>> {
    let text = match fs::read_to_string(path) {
        Ok(text) => text,
        Err(err) if err.kind() == ErrorKind::NotFound => return Ok(None),
        Err(err) => {
            return Err(err).with_context(|| format!("read settings '{}'", path.display()))
        }
    };
    if text.trim().is_empty() {
        return Ok(Some(Map::new()));
    }
    let value: JsonValue = serde_json::from_str(&text)
        .with_context(|| format!("parse settings '{}'", path.display()))?;
    match value {
        JsonValue::Object(map) => Ok(Some(map)),
        _ => Err(anyhow!(
            "settings '{}' must contain a JSON object",
            path.display()
        )),
    }
}

/// Set `env.SWARM_TASK_LIST_ID`, keeping every other key.
pub fn set_task_list_id(path: &Path, id: &str) -> Result<()> {
    let mut settings = read_settings(path)?.unwrap_or_default();
    let env = settings
        .entry("env")
        .or_insert_with(|| JsonValue::Object(Map::new()));
    let Some(env) = env.as_object_mut() else {
        return Err(anyhow!(
            "settings '{}': 'env' must be a JSON object",
            path.display()
        ));
    };
    env.insert(
        TASK_LIST_ENV_KEY.to_string(),
        JsonValue::String(id.to_string()),
    );
    write_json_atomic(path, &settings)?;
    debug!(path = %path.display(), task_list = %id, "linked task list");
    Ok(())
}

/// Remove `env.SWARM_TASK_LIST_ID`. A missing file or key is not an error.
pub fn clear_task_list_id(path: &Path) -> Result<()> {
    let Some(mut settings) = read_settings(path)? else {
        return Ok(());
    };
    let removed = settings
        .get_mut("env")
        .and_then(JsonValue::as_object_mut)
        .and_then(|env| env.remove(TASK_LIST_ENV_KEY));
    if removed.is_some() {
        write_json_atomic(path, &settings)?;
        debug!(path = %path.display(), "cleared task list link");
    }
    Ok(())
}

pub fn task_list_id(path: &Path) -> Result<Option<String>> {
    Ok(read_settings(path)?.and_then(|settings| {
        settings
            .get("env")
            .and_then(|env| env.get(TASK_LIST_ENV_KEY))
            .and_then(JsonValue::as_str)
            .map(str::to_string)
    }))
}
