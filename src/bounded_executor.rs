use anyhow::{anyhow, Result};
use std::collections::VecDeque;
use std::sync::{mpsc, Mutex};

/// A unit of work for [`run_bounded`]. Jobs may borrow from the caller.
pub type Job<'a, T> = Box<dyn FnOnce() -> T + Send + 'a>;

/// Run `jobs` on at most `max_parallel` scoped worker threads.
///
/// Outputs come back in job order regardless of completion order. A panicking
/// job fails the whole batch.
pub fn run_bounded<'a, T: Send + 'a>(max_parallel: usize, jobs: Vec<Job<'a, T>>) -> Result<Vec<T>> {
    if max_parallel == 0 {
        return Err(anyhow!("max_parallel must be >= 1"));
    }
    if jobs.is_empty() {
        return Ok(Vec::new());
    }

    let expected = jobs.len();
    let worker_count = max_parallel.min(expected);
    let queue: Mutex<VecDeque<(usize, Job<'a, T>)>> =
        Mutex::new(jobs.into_iter().enumerate().collect());
    let (tx, rx) = mpsc::channel::<(usize, T)>();

    let panicked = std::thread::scope(|scope| {
        let handles: Vec<_> = (0..worker_count)
            .map(|_| {
                let tx = tx.clone();
                let queue = &queue;
                scope.spawn(move || loop {
                    let next = match queue.lock() {
                        Ok(mut q) => q.pop_front(),
                        Err(poisoned) => poisoned.into_inner().pop_front(),
                    };
                    let Some((index, job)) = next else {
                        break;
                    };
                    if tx.send((index, job())).is_err() {
                        break;
                    }
                })
            })
            .collect();
        drop(tx);
        handles.into_iter().any(|h| h.join().is_err())
    });

    if panicked {
        return Err(anyhow!("bounded executor worker panicked"));
    }

    let mut out: Vec<(usize, T)> = rx.into_iter().collect();
    if out.len() != expected {
        return Err(anyhow!(
            "bounded executor output count mismatch (expected {expected}, got {})",
            out.len()
        ));
    }
    out.sort_by_key(|(index, _)| *index);
    Ok(out.into_iter().map(|(_, v)| v).collect())
}
