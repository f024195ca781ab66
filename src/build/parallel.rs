//! Parallel task execution.
//!
//! Tasks in a plan are independent (each owns its destination subtree), so
//! they all run in a single wave on scoped worker threads. Workers pull the
//! next task index from a shared counter; results come back in plan order
//! regardless of completion order.
//!
//! # Example
//!
//! ```ignore
//! use assetline::build::{ParallelExecutor, TaskPlan};
//! use assetline::tasks::run_task;
//!
//! let plan = TaskPlan::from_context(&ctx);
//! let results = ParallelExecutor::new()
//!     .with_jobs(4)  // Use 4 parallel workers
//!     .execute(plan.tasks(), |task| run_task(task, &ctx));
//! ```

use crate::build::{TaskDefinition, TaskResult};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

/// Default number of parallel jobs (uses available parallelism).
pub fn default_jobs() -> usize {
    std::thread::available_parallelism().map(|n| n.get()).unwrap_or(1)
}

/// Runs a set of tasks on at most `jobs` worker threads.
#[derive(Debug, Clone)]
pub struct ParallelExecutor {
    jobs: usize,
}

impl Default for ParallelExecutor {
    fn default() -> Self {
        Self::new()
    }
}

impl ParallelExecutor {
    pub fn new() -> Self {
        Self { jobs: default_jobs() }
    }

    /// Set the number of parallel jobs (at least one).
    pub fn with_jobs(mut self, jobs: usize) -> Self {
        self.jobs = jobs.max(1);
        self
    }

    pub fn jobs(&self) -> usize {
        self.jobs
    }

    /// Run every task and return the results in input order.
    ///
    /// A failing task does not stop the others.
    pub fn execute<F>(&self, tasks: &[TaskDefinition], run: F) -> Vec<TaskResult>
    where
        F: Fn(&TaskDefinition) -> TaskResult + Sync,
    {
        if tasks.is_empty() {
            return Vec::new();
        }

        // For single-threaded or single-task runs, just execute sequentially
        if self.jobs == 1 || tasks.len() == 1 {
            return tasks.iter().map(&run).collect();
        }

        let results: Mutex<Vec<(usize, TaskResult)>> = Mutex::new(Vec::with_capacity(tasks.len()));
        let next_idx = AtomicUsize::new(0);
        let num_workers = self.jobs.min(tasks.len());

        std::thread::scope(|s| {
            for _ in 0..num_workers {
                let (results, next_idx, run) = (&results, &next_idx, &run);
                s.spawn(move || loop {
                    let idx = next_idx.fetch_add(1, Ordering::SeqCst);
                    if idx >= tasks.len() {
                        break;
                    }
                    let result = run(&tasks[idx]);
                    results.lock().unwrap_or_else(|e| e.into_inner()).push((idx, result));
                });
            }
        });

        // Sort results by original index to maintain deterministic order
        let mut results = results.into_inner().unwrap_or_else(|e| e.into_inner());
        results.sort_by_key(|(idx, _)| *idx);
        results.into_iter().map(|(_, r)| r).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::build::{BuildContext, TaskKind, TaskPlan};
    use crate::config::default_config;
    use std::path::PathBuf;
    use std::sync::atomic::AtomicUsize;
    use std::thread;
    use std::time::Duration;

    fn plan() -> TaskPlan {
        TaskPlan::from_context(&BuildContext::new(default_config(), PathBuf::from("/p")))
    }

    fn ok(task: &TaskDefinition) -> TaskResult {
        TaskResult::success(task.id.clone(), task.kind, vec![])
    }

    #[test]
    fn test_jobs_at_least_one() {
        assert_eq!(ParallelExecutor::new().with_jobs(0).jobs(), 1);
        assert_eq!(ParallelExecutor::new().with_jobs(3).jobs(), 3);
        assert!(default_jobs() >= 1);
    }

    #[test]
    fn test_empty() {
        let results = ParallelExecutor::new().execute(&[], ok);
        assert!(results.is_empty());
    }

    #[test]
    fn test_results_in_plan_order() {
        let plan = plan();
        // Earlier tasks finish last
        let results = ParallelExecutor::new().with_jobs(6).execute(plan.tasks(), |task| {
            let position = TaskKind::ALL.iter().position(|k| *k == task.kind).unwrap_or(0);
            thread::sleep(Duration::from_millis((6 - position as u64) * 5));
            ok(task)
        });
        let ids: Vec<_> = results.iter().map(|r| r.task_id.as_str()).collect();
        assert_eq!(ids, vec!["templates", "styles", "scripts", "fonts", "images", "sprite"]);
    }

    #[test]
    fn test_failure_does_not_cancel_siblings() {
        let plan = plan();
        let ran = AtomicUsize::new(0);
        let results = ParallelExecutor::new().with_jobs(2).execute(plan.tasks(), |task| {
            ran.fetch_add(1, Ordering::SeqCst);
            if task.kind == TaskKind::Styles {
                TaskResult::failed(task.id.clone(), task.kind, "boom".to_string())
            } else {
                ok(task)
            }
        });
        assert_eq!(ran.load(Ordering::SeqCst), plan.len());
        assert_eq!(results.iter().filter(|r| r.status.is_failure()).count(), 1);
    }

    #[test]
    fn test_sequential_with_one_job() {
        let plan = plan();
        let results = ParallelExecutor::new().with_jobs(1).execute(plan.tasks(), ok);
        assert_eq!(results.len(), plan.len());
    }
}
