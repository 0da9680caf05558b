use serde::{Deserialize, Serialize};

use crate::classification::{Complexity, Domain};
use crate::types::{ModelTier, SwarmTask};

pub const DEFAULT_AGENT_NAMESPACE: &str = "swarm";

/// Agents cheap enough to run on haiku even for simple work.
const LIGHTWEIGHT_AGENTS: &[&str] = &["explore", "writer", "executor-low"];

/// Domain priority, highest first, with the agent each one maps to.
const DOMAIN_AGENTS: &[(Domain, &str)] = &[
    (Domain::Security, "security-reviewer"),
    (Domain::Testing, "qa-tester"),
    (Domain::Frontend, "designer"),
    (Domain::Documentation, "writer"),
    (Domain::Backend, "executor"),
    (Domain::Database, "executor"),
    (Domain::Devops, "executor"),
    (Domain::General, "executor"),
];

const GENERAL_AGENT: &str = "executor";

/// Optional material handed to a worker alongside its task.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct WorkerContext {
    pub context: Option<String>,
    pub previous_results: Vec<String>,
    pub constraints: Vec<String>,
}

/// Everything the external executor needs to run one task.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SpawnConfig {
    pub subagent_type: String,
    pub model: ModelTier,
    pub prompt: String,
    pub run_in_background: bool,
    pub task_id: String,
}

pub fn select_model(complexity: Complexity, agent: &str) -> ModelTier {
    match complexity {
        Complexity::Trivial => ModelTier::Haiku,
        Complexity::Simple if LIGHTWEIGHT_AGENTS.contains(&agent) => ModelTier::Haiku,
        Complexity::Simple | Complexity::Moderate => ModelTier::Sonnet,
        Complexity::Complex | Complexity::Architectural => ModelTier::Opus,
        Complexity::Unknown => ModelTier::Sonnet,
    }
}

pub fn agent_for_domain(domains: &[Domain]) -> &'static str {
    DOMAIN_AGENTS
        .iter()
        .find(|(domain, _)| domains.contains(domain))
        .map(|(_, agent)| *agent)
        .unwrap_or(GENERAL_AGENT)
}

pub fn generate_worker_prompt(task: &SwarmTask, ctx: Option<&WorkerContext>) -> String {
    let mut out = String::new();

    out.push_str(&format!(
        "You are a swarm worker acting as the '{}' agent (task {}).\n\n",
        task.agent, task.id
    ));

    out.push_str("## Task\n");
    out.push_str(&task.subject);
    out.push('\n');
    if !task.description.trim().is_empty() {
        out.push('\n');
        out.push_str(task.description.trim());
        out.push('\n');
    }
    out.push('\n');

    out.push_str("## Context\n");
    match ctx.and_then(|c| c.context.as_deref()).map(str::trim) {
        Some(text) if !text.is_empty() => out.push_str(text),
        _ => out.push_str("No additional context provided."),
    }
    out.push_str("\n\n");

    if let Some(ctx) = ctx {
        let previous: Vec<&str> = ctx
            .previous_results
            .iter()
            .map(|r| r.trim())
            .filter(|r| !r.is_empty())
            .collect();
        if !previous.is_empty() {
            out.push_str("## Previous Results\n");
            for result in previous {
                out.push_str(result);
                out.push_str("\n\n");
            }
        }
    }

    out.push_str("## Instructions\n");
    out.push_str("- Focus only on the task above; other workers own the rest of the plan.\n");
    out.push_str("- Read the relevant code before changing it.\n");
    out.push_str("- Keep changes minimal and consistent with the surrounding style.\n");
    out.push_str("- Report blockers instead of guessing.\n\n");

    if let Some(ctx) = ctx {
        let constraints: Vec<&str> = ctx
            .constraints
            .iter()
            .map(|c| c.trim())
            .filter(|c| !c.is_empty())
            .collect();
        if !constraints.is_empty() {
            out.push_str("## Constraints\n");
            for constraint in constraints {
                out.push_str("- ");
                out.push_str(constraint);
                out.push('\n');
            }
            out.push('\n');
        }
    }

    out.push_str("## On Completion\n");
    out.push_str("- [ ] Summarize what was done\n");
    out.push_str("- [ ] List files created or modified\n");
    out.push_str("- [ ] Note open issues or follow-up work\n");
    out.push_str(&format!("- [ ] Mark task {} as completed\n", task.id));

    out.trim().to_string()
}

pub fn create_spawn_config(task: &SwarmTask, ctx: Option<&WorkerContext>) -> SpawnConfig {
    create_spawn_config_in(DEFAULT_AGENT_NAMESPACE, task, ctx)
}

/// Like [`create_spawn_config`] with an explicit agent namespace.
pub fn create_spawn_config_in(
    namespace: &str,
    task: &SwarmTask,
    ctx: Option<&WorkerContext>,
) -> SpawnConfig {
    SpawnConfig {
        subagent_type: format!("{namespace}:{}", task.agent),
        model: task.model,
        prompt: generate_worker_prompt(task, ctx),
        run_in_background: true,
        task_id: task.id.clone(),
    }
}

pub fn build_batch_spawn_configs<'a, I>(tasks: I, ctx: Option<&WorkerContext>) -> Vec<SpawnConfig>
where
    I: IntoIterator<Item = &'a SwarmTask>,
{
    tasks
        .into_iter()
        .map(|task| create_spawn_config(task, ctx))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn task() -> SwarmTask {
        SwarmTask::new(
            "impl-1",
            "Implement parser",
            "Write the tokenizer.",
            "executor",
            ModelTier::Sonnet,
        )
    }

    #[test]
    fn select_model_table() {
        assert_eq!(select_model(Complexity::Trivial, "architect"), ModelTier::Haiku);
        assert_eq!(select_model(Complexity::Simple, "explore"), ModelTier::Haiku);
        assert_eq!(select_model(Complexity::Simple, "executor-low"), ModelTier::Haiku);
        assert_eq!(select_model(Complexity::Simple, "executor"), ModelTier::Sonnet);
        assert_eq!(select_model(Complexity::Moderate, "explore"), ModelTier::Sonnet);
        assert_eq!(select_model(Complexity::Complex, "writer"), ModelTier::Opus);
        assert_eq!(select_model(Complexity::Architectural, "executor"), ModelTier::Opus);
        assert_eq!(select_model(Complexity::Unknown, "executor"), ModelTier::Sonnet);
    }

    #[test]
    fn agent_for_domain_follows_priority() {
        assert_eq!(
            agent_for_domain(&[Domain::Backend, Domain::Testing, Domain::Security]),
            "security-reviewer"
        );
        assert_eq!(agent_for_domain(&[Domain::Frontend, Domain::Testing]), "qa-tester");
        assert_eq!(agent_for_domain(&[Domain::Documentation]), "writer");
        assert_eq!(agent_for_domain(&[]), "executor");
        assert_eq!(agent_for_domain(&[Domain::Other]), "executor");
    }

    #[test]
    fn prompt_without_context_uses_placeholder_and_omits_optional_sections() {
        let prompt = generate_worker_prompt(&task(), None);
        assert!(prompt.starts_with("You are a swarm worker acting as the 'executor' agent"));
        assert!(prompt.contains("## Task\nImplement parser"));
        assert!(prompt.contains("No additional context provided."));
        assert!(!prompt.contains("## Previous Results"));
        assert!(!prompt.contains("## Constraints"));
        assert!(prompt.contains("## Instructions"));
        assert!(prompt.ends_with("- [ ] Mark task impl-1 as completed"));
    }

    #[test]
    fn prompt_includes_previous_results_and_constraints_in_order() {
        let ctx = WorkerContext {
            context: Some("Repo uses nom.".to_string()),
            previous_results: vec!["Explorer found lexer.rs".to_string(), "  ".to_string()],
            constraints: vec!["No new dependencies".to_string()],
        };
        let prompt = generate_worker_prompt(&task(), Some(&ctx));
        let context_at = prompt.find("Repo uses nom.").unwrap();
        let previous_at = prompt.find("## Previous Results").unwrap();
        let instructions_at = prompt.find("## Instructions").unwrap();
        let constraints_at = prompt.find("## Constraints\n- No new dependencies").unwrap();
        let completion_at = prompt.find("## On Completion").unwrap();
        assert!(context_at < previous_at);
        assert!(previous_at < instructions_at);
        assert!(instructions_at < constraints_at);
        assert!(constraints_at < completion_at);
    }

    #[test]
    fn empty_lists_in_context_are_omitted() {
        let ctx = WorkerContext {
            context: Some("   ".to_string()),
            previous_results: vec![],
            constraints: vec![" ".to_string()],
        };
        let prompt = generate_worker_prompt(&task(), Some(&ctx));
        assert!(prompt.contains("No additional context provided."));
        assert!(!prompt.contains("## Previous Results"));
        assert!(!prompt.contains("## Constraints"));
    }

    #[test]
    fn spawn_config_is_namespaced_and_camel_case() {
        let config = create_spawn_config(&task(), None);
        assert_eq!(config.subagent_type, "swarm:executor");
        assert_eq!(config.model, ModelTier::Sonnet);
        assert!(config.run_in_background);
        assert_eq!(config.task_id, "impl-1");

        let value = serde_json::to_value(&config).unwrap();
        assert_eq!(value["subagentType"], "swarm:executor");
        assert_eq!(value["runInBackground"], true);
        assert_eq!(value["model"], "sonnet");

        let custom = create_spawn_config_in("team", &task(), None);
        assert_eq!(custom.subagent_type, "team:executor");
    }

    #[test]
    fn batch_configs_preserve_order() {
        let tasks = vec![
            task(),
            SwarmTask::new("test-1", "Test", "", "qa-tester", ModelTier::Haiku),
        ];
        let configs = build_batch_spawn_configs(&tasks, None);
        let ids: Vec<&str> = configs.iter().map(|c| c.task_id.as_str()).collect();
        assert_eq!(ids, vec!["impl-1", "test-1"]);
        assert_eq!(configs[1].model, ModelTier::Haiku);
    }
}
