//! Turns a classified request into a dependency-linked task plan.
//!
//! Every builder produces a fixed task shape per intent; the classification
//! only picks the shape, the model tiers and (for research) the fan-out.

use serde::Serialize;
use tracing::{debug, info};

use crate::classification::{Classification, Complexity, Domain, IntentType};
use crate::dispatch::select_model;
use crate::types::{ModelTier, Parallelism, SwarmPlan, SwarmTask};

/// Apply the escalation rules to the classifier's complexity label.
///
/// Each rule is checked against the current (possibly escalated) value and
/// only ever moves one step up.
pub fn classify_complexity(classification: &Classification) -> Complexity {
    let mut complexity = classification.complexity;

    if classification.signals.wants_thorough && complexity == Complexity::Simple {
        complexity = Complexity::Moderate;
    }
    if classification.domains.len() >= 3 && complexity == Complexity::Moderate {
        complexity = Complexity::Complex;
    }
    if classification.signals.wants_planning && complexity == Complexity::Complex {
        complexity = Complexity::Architectural;
    }

    complexity
}

pub fn should_decompose(complexity: Complexity) -> bool {
    !matches!(complexity, Complexity::Trivial | Complexity::Simple)
}

/// Advisory subtask count for a (complexity, intent) pair. Never enforced.
pub fn suggested_subtasks(complexity: Complexity, intent: IntentType) -> usize {
    use IntentType::*;
    match complexity {
        Complexity::Trivial | Complexity::Simple => 1,
        Complexity::Moderate | Complexity::Unknown => match intent {
            Debugging | Research | Review => 3,
            Implementation => 5,
            _ => 4,
        },
        Complexity::Complex => match intent {
            Debugging | Research => 5,
            Review => 4,
            Implementation | Refactoring => 7,
            _ => 6,
        },
        Complexity::Architectural => match intent {
            Debugging | Research => 6,
            Review => 5,
            Refactoring => 9,
            Implementation => 10,
            _ => 8,
        },
    }
}

/// A pending task with an empty `blocks` list; [`SwarmPlan::new`] fills it.
pub fn create_task_template(
    id: &str,
    subject: &str,
    description: &str,
    agent: &str,
    model: ModelTier,
    blocked_by: &[&str],
) -> SwarmTask {
    SwarmTask::new(id, subject, description, agent, model).with_blocked_by(blocked_by.iter().copied())
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SwarmRecommendation {
    pub decompose: bool,
    pub suggested_subtasks: usize,
    pub parallelism: Parallelism,
}

pub fn swarm_recommendation(classification: &Classification) -> SwarmRecommendation {
    let complexity = classify_complexity(classification);
    let decompose = should_decompose(complexity);
    let parallelism = if !decompose {
        Parallelism::Sequential
    } else {
        match classification.intent {
            IntentType::Research => Parallelism::Parallel,
            IntentType::Debugging => Parallelism::Sequential,
            _ => Parallelism::Hybrid,
        }
    };

    SwarmRecommendation {
        decompose,
        suggested_subtasks: suggested_subtasks(complexity, classification.intent),
        parallelism,
    }
}

/// Entry point: pick a builder for the classification and return its plan.
pub fn create_swarm_plan(classification: &Classification) -> SwarmPlan {
    let complexity = classify_complexity(classification);
    if complexity != classification.complexity {
        debug!(
            from = classification.complexity.as_str(),
            to = complexity.as_str(),
            "escalated complexity"
        );
    }

    let plan = if !should_decompose(complexity) || classification.intent == IntentType::Conversation {
        build_simple_plan(classification)
    } else {
        match classification.intent {
            IntentType::Debugging => build_debugging_plan(classification, complexity),
            IntentType::Refactoring | IntentType::Maintenance => {
                build_refactoring_plan(classification, complexity)
            }
            IntentType::Research | IntentType::Planning => {
                build_research_plan(classification, complexity)
            }
            IntentType::Review => build_review_plan(classification, complexity),
            IntentType::Implementation | IntentType::Conversation | IntentType::Other => {
                build_implementation_plan(classification, complexity)
            }
        }
    };

    info!(
        plan = plan.name(),
        intent = classification.intent.as_str(),
        complexity = complexity.as_str(),
        tasks = plan.tasks().len(),
        parallelism = %plan.parallelism(),
        "created swarm plan"
    );
    plan
}

fn plan_name(classification: &Classification) -> String {
    format!("{}-swarm", classification.intent.as_str())
}

fn explore_task(id: &str, subject: &str, description: &str) -> SwarmTask {
    create_task_template(id, subject, description, "explore", ModelTier::Haiku, &[])
}

fn architect_task(id: &str, subject: &str, description: &str, blocked_by: &[&str]) -> SwarmTask {
    create_task_template(id, subject, description, "architect", ModelTier::Opus, blocked_by)
}

fn worker_task(
    complexity: Complexity,
    id: &str,
    subject: &str,
    description: &str,
    agent: &str,
    blocked_by: &[&str],
) -> SwarmTask {
    create_task_template(
        id,
        subject,
        description,
        agent,
        select_model(complexity, agent),
        blocked_by,
    )
}

/// explore → architect → {implement, test} → verify
pub fn build_implementation_plan(classification: &Classification, complexity: Complexity) -> SwarmPlan {
    let tasks = vec![
        explore_task(
            "explore",
            "Explore codebase",
            "Map the files, modules and conventions the change touches.",
        ),
        architect_task(
            "architect",
            "Design implementation",
            "Produce a concrete implementation plan from the exploration findings.",
            &["explore"],
        ),
        worker_task(
            complexity,
            "implement",
            "Implement changes",
            "Carry out the implementation plan.",
            "executor",
            &["architect"],
        ),
        worker_task(
            complexity,
            "test",
            "Write tests",
            "Write tests covering the planned behavior.",
            "qa-tester",
            &["architect"],
        ),
        architect_task(
            "verify",
            "Verify implementation",
            "Check the implementation and tests against the plan and resolve gaps.",
            &["implement", "test"],
        ),
    ];
    SwarmPlan::new(plan_name(classification), tasks, Parallelism::Hybrid)
}

fn build_sequential_fix_plan(
    classification: &Classification,
    complexity: Complexity,
    explore: (&str, &str),
    architect: (&str, &str),
    implement: (&str, &str),
    test: (&str, &str),
) -> SwarmPlan {
    let tasks = vec![
        explore_task("explore", explore.0, explore.1),
        architect_task("architect", architect.0, architect.1, &["explore"]),
        worker_task(
            complexity,
            "implement",
            implement.0,
            implement.1,
            "executor",
            &["architect"],
        ),
        worker_task(complexity, "test", test.0, test.1, "qa-tester", &["implement"]),
    ];
    SwarmPlan::new(plan_name(classification), tasks, Parallelism::Sequential)
}

/// explore → architect → implement → test, strictly sequential.
pub fn build_debugging_plan(classification: &Classification, complexity: Complexity) -> SwarmPlan {
    build_sequential_fix_plan(
        classification,
        complexity,
        (
            "Reproduce and locate",
            "Reproduce the failure and collect the code paths involved.",
        ),
        (
            "Diagnose root cause",
            "Identify the root cause and decide on a fix.",
        ),
        ("Apply fix", "Implement the fix for the diagnosed root cause."),
        (
            "Add regression test",
            "Add a test that fails without the fix and passes with it.",
        ),
    )
}

/// Same shape as debugging, with refactoring wording.
pub fn build_refactoring_plan(classification: &Classification, complexity: Complexity) -> SwarmPlan {
    build_sequential_fix_plan(
        classification,
        complexity,
        (
            "Survey current structure",
            "Map the code to be restructured and its callers.",
        ),
        (
            "Plan refactoring",
            "Define the target structure and a safe sequence of steps.",
        ),
        (
            "Refactor code",
            "Apply the refactoring without changing behavior.",
        ),
        (
            "Verify behavior",
            "Run and extend tests to confirm behavior is unchanged.",
        ),
    )
}

/// One explore per domain (or a few generic ones) → synthesize.
pub fn build_research_plan(classification: &Classification, complexity: Complexity) -> SwarmPlan {
    let mut domains: Vec<Domain> = Vec::new();
    for domain in &classification.domains {
        if !domains.contains(domain) {
            domains.push(*domain);
        }
    }

    let mut tasks = Vec::new();
    if domains.len() >= 2 {
        for domain in &domains {
            let name = domain.as_str();
            tasks.push(explore_task(
                &format!("explore-{name}"),
                &format!("Research {name}"),
                &format!("Collect findings relevant to the {name} aspects of the question."),
            ));
        }
    } else {
        let count = match complexity {
            Complexity::Complex | Complexity::Architectural => 3,
            _ => 2,
        };
        for n in 1..=count {
            tasks.push(explore_task(
                &format!("explore-{n}"),
                &format!("Research angle {n}"),
                "Collect findings from an independent angle on the question.",
            ));
        }
    }

    let explore_ids: Vec<String> = tasks.iter().map(|t| t.id.clone()).collect();
    let blockers: Vec<&str> = explore_ids.iter().map(String::as_str).collect();
    tasks.push(worker_task(
        complexity,
        "synthesize",
        "Synthesize findings",
        "Merge the research findings into one answer with sources.",
        "writer",
        &blockers,
    ));

    SwarmPlan::new(plan_name(classification), tasks, Parallelism::Hybrid)
}

/// explore → {security, architecture} → synthesize
pub fn build_review_plan(classification: &Classification, complexity: Complexity) -> SwarmPlan {
    let tasks = vec![
        explore_task(
            "explore",
            "Gather review scope",
            "Collect the changes under review and their surrounding code.",
        ),
        worker_task(
            complexity,
            "security",
            "Security review",
            "Review the changes for security issues.",
            "security-reviewer",
            &["explore"],
        ),
        architect_task(
            "architecture",
            "Architecture review",
            "Review the changes for design and maintainability issues.",
            &["explore"],
        ),
        worker_task(
            complexity,
            "synthesize",
            "Synthesize review",
            "Combine the review findings into one prioritized report.",
            "writer",
            &["security", "architecture"],
        ),
    ];
    SwarmPlan::new(plan_name(classification), tasks, Parallelism::Hybrid)
}

/// Single task for requests that do not warrant decomposition.
pub fn build_simple_plan(classification: &Classification) -> SwarmPlan {
    let agent = classification
        .recommendation
        .agents
        .first()
        .map(String::as_str)
        .unwrap_or("executor");
    let task = create_task_template(
        "task",
        "Handle request",
        "Complete the request directly.",
        agent,
        classification.recommendation.model_tier,
        &[],
    );
    SwarmPlan::new(plan_name(classification), vec![task], Parallelism::Sequential)
}
