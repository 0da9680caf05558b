use std::collections::{HashMap, HashSet};

use swarm::graph::{
    build_graph, critical_path, detect_cycle, link_dependencies, parallel_groups, ready_tasks,
    topological_sort, validate_dependencies,
};
use swarm::types::{ModelTier, SwarmTask, TaskStatus};
use swarm::SwarmError;

/// Small deterministic generator so property checks are reproducible.
struct XorShift(u64);

impl XorShift {
    fn next(&mut self) -> u64 {
        let mut x = self.0;
        x ^= x << 13;
        x ^= x >> 7;
        x ^= x << 17;
        self.0 = x;
        x
    }

    fn below(&mut self, n: usize) -> usize {
        (self.next() % n as u64) as usize
    }
}

fn task(id: &str, blocked_by: &[&str]) -> SwarmTask {
    SwarmTask::new(id, id, "", "executor", ModelTier::Sonnet)
        .with_blocked_by(blocked_by.iter().copied())
}

/// Random DAG: task `t{i}` may only depend on `t{j}` with `j < i`. The input
/// order is shuffled so it is not already topological.
fn random_dag(seed: u64, n: usize) -> Vec<SwarmTask> {
    let mut rng = XorShift(seed.max(1));
    let mut tasks: Vec<SwarmTask> = (0..n)
        .map(|i| {
            let mut deps = Vec::new();
            for j in 0..i {
                if rng.below(4) == 0 {
                    deps.push(format!("t{j}"));
                }
            }
            SwarmTask::new(format!("t{i}"), "", "", "executor", ModelTier::Sonnet)
                .with_blocked_by(deps)
        })
        .collect();
    for i in (1..tasks.len()).rev() {
        let j = rng.below(i + 1);
        tasks.swap(i, j);
    }
    link_dependencies(&mut tasks);
    tasks
}

fn seeds() -> impl Iterator<Item = (u64, usize)> {
    (1..=40u64).map(|seed| (seed * 7919, 1 + (seed as usize % 13)))
}

#[test]
fn topological_sort_is_a_linear_extension() {
    for (seed, n) in seeds() {
        let tasks = random_dag(seed, n);
        let order = topological_sort(&tasks).expect("dag sorts");
        assert_eq!(order.len(), tasks.len());

        let position: HashMap<&str, usize> = order
            .iter()
            .enumerate()
            .map(|(i, t)| (t.id.as_str(), i))
            .collect();
        for t in &tasks {
            for dep in &t.blocked_by {
                assert!(
                    position[dep.as_str()] < position[t.id.as_str()],
                    "seed {seed}: {dep} must precede {}",
                    t.id
                );
            }
        }
    }
}

#[test]
fn parallel_groups_partition_tasks_and_respect_edges() {
    for (seed, n) in seeds() {
        let tasks = random_dag(seed, n);
        let groups = parallel_groups(&tasks);

        let mut group_of: HashMap<&str, usize> = HashMap::new();
        for (idx, group) in groups.iter().enumerate() {
            assert!(!group.is_empty());
            for id in group {
                assert!(group_of.insert(id.as_str(), idx).is_none(), "{id} listed twice");
            }
        }
        assert_eq!(group_of.len(), tasks.len());

        for t in &tasks {
            for dep in &t.blocked_by {
                assert!(group_of[dep.as_str()] < group_of[t.id.as_str()]);
            }
        }
    }
}

#[test]
fn critical_path_length_matches_max_depth() {
    for (seed, n) in seeds() {
        let tasks = random_dag(seed, n);
        let graph = build_graph(&tasks);
        let path = critical_path(&tasks);
        assert_eq!(path.len(), 1 + graph.max_depth().unwrap(), "seed {seed}");

        let by_id: HashMap<&str, &SwarmTask> = tasks.iter().map(|t| (t.id.as_str(), t)).collect();
        for pair in path.windows(2) {
            assert!(by_id[pair[1].as_str()].blocked_by.contains(&pair[0]));
        }
    }
}

#[test]
fn cycle_detection_agrees_with_validation() {
    for (seed, n) in seeds() {
        let mut tasks = random_dag(seed, n);
        assert!(detect_cycle(&tasks).is_none());
        assert!(validate_dependencies(&tasks).valid);

        // Close a loop between the first and last task in topological order.
        if tasks.len() < 2 {
            continue;
        }
        let sorted: Vec<String> = topological_sort(&tasks)
            .unwrap()
            .iter()
            .map(|t| t.id.clone())
            .collect();
        let first = sorted[0].clone();
        let last = sorted[sorted.len() - 1].clone();
        let last_task = tasks.iter_mut().find(|t| t.id == last).unwrap();
        if !last_task.blocked_by.contains(&first) {
            last_task.blocked_by.push(first.clone());
        }
        tasks.iter_mut().find(|t| t.id == first).unwrap().blocked_by.push(last.clone());
        link_dependencies(&mut tasks);

        let cycle = detect_cycle(&tasks).expect("cycle after closing loop");
        assert!(!validate_dependencies(&tasks).valid);
        assert!(topological_sort(&tasks).is_err());

        let by_id: HashMap<&str, &SwarmTask> = tasks.iter().map(|t| (t.id.as_str(), t)).collect();
        for k in 0..cycle.len() {
            let here = &cycle[k];
            let next = &cycle[(k + 1) % cycle.len()];
            assert!(
                by_id[here.as_str()].blocked_by.contains(next),
                "seed {seed}: {here} should wait on {next}"
            );
        }
    }
}

#[test]
fn ready_tasks_are_exactly_the_unblocked_pending_ones() {
    for (seed, n) in seeds() {
        let mut rng = XorShift(seed + 3);
        let mut tasks = random_dag(seed, n);
        let mut completed = Vec::new();
        for t in tasks.iter_mut() {
            match rng.below(3) {
                0 => {
                    t.status = TaskStatus::Completed;
                    completed.push(t.id.clone());
                }
                1 => t.status = TaskStatus::InProgress,
                _ => {}
            }
        }

        let done: HashSet<&str> = completed.iter().map(String::as_str).collect();
        let ready: HashSet<&str> = ready_tasks(&tasks, &completed)
            .iter()
            .map(|t| t.id.as_str())
            .collect();
        for t in &tasks {
            let unblocked = t.blocked_by.iter().all(|d| done.contains(d.as_str()));
            let expected = t.status == TaskStatus::Pending && unblocked;
            assert_eq!(ready.contains(t.id.as_str()), expected, "seed {seed}: {}", t.id);
        }
    }
}

#[test]
fn diamond_scenario() {
    let mut tasks = vec![
        task("a", &[]),
        task("b", &[]),
        task("c", &["a", "b"]),
        task("d", &["c"]),
    ];
    link_dependencies(&mut tasks);

    assert_eq!(
        parallel_groups(&tasks),
        vec![
            vec!["a".to_string(), "b".to_string()],
            vec!["c".to_string()],
            vec!["d".to_string()],
        ]
    );
    let path = critical_path(&tasks);
    assert_eq!(path.len(), 3);
    assert_eq!(&path[1..], &["c".to_string(), "d".to_string()]);
}

#[test]
fn self_loop_scenario() {
    let mut a = task("a", &["a"]);
    a.blocks = vec!["a".to_string()];
    let tasks = vec![a];

    let result = validate_dependencies(&tasks);
    let self_refs = result
        .errors
        .iter()
        .filter(|e| e.contains("lists itself"))
        .count();
    assert_eq!(self_refs, 2);
    assert!(detect_cycle(&tasks).unwrap().contains(&"a".to_string()));
}

#[test]
fn empty_and_dangling_inputs_degrade_gracefully() {
    assert!(parallel_groups(&[]).is_empty());
    assert!(critical_path(&[]).is_empty());
    assert!(topological_sort(&[]).unwrap().is_empty());
    assert!(detect_cycle(&[]).is_none());
    assert!(validate_dependencies(&[]).valid);

    let tasks = vec![task("a", &["missing"]), task("b", &["a"])];
    let graph = build_graph(&tasks);
    assert_eq!(graph.node("a").unwrap().depth, 0);
    assert_eq!(graph.node("b").unwrap().depth, 1);
    assert!(matches!(
        topological_sort(&tasks),
        Err(SwarmError::Cycle { sorted: 0, total: 2 })
    ));
    assert!(critical_path(&tasks).is_empty());
    assert!(detect_cycle(&tasks).is_none());
}

/// `t{i}` blocked by `t{i-1}`, listed last task first.
fn long_chain(n: usize) -> Vec<SwarmTask> {
    (0..n)
        .rev()
        .map(|i| {
            let deps: Vec<String> = if i == 0 {
                Vec::new()
            } else {
                vec![format!("t{}", i - 1)]
            };
            SwarmTask::new(format!("t{i}"), "", "", "executor", ModelTier::Sonnet)
                .with_blocked_by(deps)
        })
        .collect()
}

#[test]
fn long_chains_do_not_exhaust_the_stack() {
    const N: usize = 120_000;
    let tasks = long_chain(N);

    assert!(detect_cycle(&tasks).is_none());
    assert!(validate_dependencies(&tasks).valid);

    let path = critical_path(&tasks);
    assert_eq!(path.len(), N);
    assert_eq!(path.first().map(String::as_str), Some("t0"));
    assert_eq!(path.last().map(String::as_str), Some("t119999"));
}

#[test]
fn long_cycle_is_reported_in_full() {
    const N: usize = 120_000;
    let mut tasks = long_chain(N);
    let first = tasks.last_mut().expect("t0");
    first.blocked_by = vec![format!("t{}", N - 1)];

    let cycle = detect_cycle(&tasks).expect("closed chain is a cycle");
    assert_eq!(cycle.len(), N);
    assert!(!validate_dependencies(&tasks).valid);
    assert!(critical_path(&tasks).is_empty());
}
