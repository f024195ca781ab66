//! Watch mode for automatic rebuilds on file changes
//!
//! A [`WatchSession`] holds one debounced subscription per task. A batch of
//! changes re-runs only the tasks whose watch globs match, then reports the
//! files and tasks that recovered from earlier errors.

use crate::build::{BuildPipeline, BuildResult, TaskDefinition, TaskPlan};
use crate::config::schema::WatchConfig;
use glob::Pattern;
use notify::{RecommendedWatcher, RecursiveMode, Watcher};
use notify_debouncer_mini::{new_debouncer, DebounceEventResult, DebouncedEventKind, Debouncer};
use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{channel, Receiver, RecvTimeoutError};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

/// How often the loop checks for a stop request.
const POLL_INTERVAL: Duration = Duration::from_millis(200);

/// Error during watch mode
#[derive(Debug, Error)]
pub enum WatchError {
    #[error("failed to initialize file watcher: {0}")]
    WatcherInit(#[source] notify::Error),
    #[error("failed to watch {}: {source}", .path.display())]
    WatchPath {
        path: PathBuf,
        #[source]
        source: notify::Error,
    },
    #[error("invalid watch glob '{pattern}': {source}")]
    Pattern {
        pattern: String,
        #[source]
        source: glob::PatternError,
    },
}

/// A (watch globs → task) subscription
#[derive(Debug, Clone)]
pub struct WatchBinding {
    pub task_id: String,
    /// Directories handed to the file watcher
    pub roots: Vec<PathBuf>,
    patterns: Vec<Pattern>,
}

impl WatchBinding {
    pub fn for_task(task: &TaskDefinition) -> Result<Self, WatchError> {
        let patterns = task
            .watch
            .iter()
            .map(|p| {
                Pattern::new(p).map_err(|source| WatchError::Pattern { pattern: p.clone(), source })
            })
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self {
            task_id: task.id.clone(),
            roots: task.watch_roots().into_iter().map(Path::to_path_buf).collect(),
            patterns,
        })
    }

    /// Whether a changed path belongs to this binding's task.
    pub fn owns(&self, path: &Path) -> bool {
        self.patterns.iter().any(|p| p.matches_path(path))
    }
}

/// Tracks files with errors across rebuilds for recovery detection
#[derive(Debug, Default)]
pub struct ErrorTracker {
    /// Files with errors, per task
    files_with_errors: HashMap<String, HashSet<PathBuf>>,
    failed_tasks: HashSet<String>,
}

/// What an update found fixed
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct Recovery {
    pub files: Vec<PathBuf>,
    pub tasks: Vec<String>,
}

impl ErrorTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record the tasks in `result` and return what they fixed. Tasks not in
    /// the result keep their previous state.
    pub fn update(&mut self, result: &BuildResult) -> Recovery {
        let mut recovery = Recovery::default();

        for task in &result.tasks {
            let current: HashSet<PathBuf> = task.errors.iter().map(|e| e.file.clone()).collect();
            let previous = self.files_with_errors.insert(task.task_id.clone(), current);
            if let Some(previous) = previous {
                let current = &self.files_with_errors[&task.task_id];
                let mut fixed: Vec<PathBuf> = previous.difference(current).cloned().collect();
                fixed.sort();
                recovery.files.extend(fixed);
            }

            if task.status.is_failure() {
                self.failed_tasks.insert(task.task_id.clone());
            } else if self.failed_tasks.remove(&task.task_id) {
                recovery.tasks.push(task.task_id.clone());
            }
        }

        recovery
    }

    pub fn has_errors(&self) -> bool {
        !self.failed_tasks.is_empty() || self.files_with_errors.values().any(|f| !f.is_empty())
    }

    /// Number of files with errors
    pub fn error_count(&self) -> usize {
        self.files_with_errors.values().map(HashSet::len).sum()
    }
}

/// Clear the terminal screen
fn clear_screen() {
    // ANSI escape code to clear screen and move cursor to top-left
    print!("\x1B[2J\x1B[1;1H");
}

/// Requests a running session loop to return.
#[derive(Debug, Clone)]
pub struct StopHandle(Arc<AtomicBool>);

impl StopHandle {
    pub fn stop(&self) {
        self.0.store(true, Ordering::SeqCst);
    }
}

type TaskEvents = (String, DebounceEventResult);

/// The set of live watch subscriptions and the rebuild loop.
pub struct WatchSession {
    bindings: Vec<WatchBinding>,
    debouncers: Vec<Debouncer<RecommendedWatcher>>,
    events: Receiver<TaskEvents>,
    stopped: Arc<AtomicBool>,
    tracker: ErrorTracker,
    clear_screen: bool,
}

impl WatchSession {
    /// Register one debounced subscription per task in `plan`.
    ///
    /// Source directories that do not exist yet are not watched.
    pub fn start(plan: &TaskPlan, config: &WatchConfig) -> Result<Self, WatchError> {
        let (tx, events) = channel::<TaskEvents>();
        let debounce = Duration::from_millis(u64::from(config.debounce_ms));

        let mut bindings = Vec::new();
        let mut debouncers = Vec::new();
        for task in plan.tasks() {
            let binding = WatchBinding::for_task(task)?;
            let task_id = task.id.clone();
            let tx = tx.clone();
            let mut debouncer = new_debouncer(debounce, move |result: DebounceEventResult| {
                let _ = tx.send((task_id.clone(), result));
            })
            .map_err(WatchError::WatcherInit)?;

            for root in &binding.roots {
                if !root.is_dir() {
                    tracing::debug!(task = %task.id, dir = %root.display(), "not watching missing directory");
                    continue;
                }
                debouncer
                    .watcher()
                    .watch(root, RecursiveMode::Recursive)
                    .map_err(|source| WatchError::WatchPath { path: root.clone(), source })?;
            }

            bindings.push(binding);
            debouncers.push(debouncer);
        }

        Ok(Self {
            bindings,
            debouncers,
            events,
            stopped: Arc::new(AtomicBool::new(false)),
            tracker: ErrorTracker::new(),
            clear_screen: config.clear_screen,
        })
    }

    pub fn bindings(&self) -> &[WatchBinding] {
        &self.bindings
    }

    pub fn stop_handle(&self) -> StopHandle {
        StopHandle(Arc::clone(&self.stopped))
    }

    /// Seed the error tracker with the initial build.
    pub fn record(&mut self, result: &BuildResult) {
        self.tracker.update(result);
    }

    /// Ids of tasks owning any of the paths, in plan order.
    pub fn owners(&self, paths: &[PathBuf]) -> Vec<String> {
        self.bindings
            .iter()
            .filter(|b| paths.iter().any(|p| b.owns(p)))
            .map(|b| b.task_id.clone())
            .collect()
    }

    /// Re-run the tasks owning `changed`. Returns `None` when no task owns
    /// any of them.
    pub fn rebuild(&mut self, pipeline: &BuildPipeline, changed: &[PathBuf]) -> Option<BuildResult> {
        let owners = self.owners(changed);
        if owners.is_empty() {
            return None;
        }

        if self.clear_screen {
            clear_screen();
        }
        for path in changed {
            tracing::info!(file = %path.display(), "changed");
        }

        let result = match pipeline.run_tasks(&owners) {
            Ok(result) => result,
            Err(e) => {
                tracing::error!(error = %e, "rebuild failed");
                return None;
            }
        };

        let recovery = self.tracker.update(&result);
        for file in &recovery.files {
            tracing::info!(file = %file.display(), "fixed");
        }
        for task in &recovery.tasks {
            tracing::info!(task = %task, "recovered");
        }
        Some(result)
    }

    /// Block, rebuilding on every batch of changes, until stopped.
    pub fn run(&mut self, pipeline: &BuildPipeline) {
        let roots: Vec<String> = self
            .bindings
            .iter()
            .flat_map(|b| b.roots.iter().map(|r| r.display().to_string()))
            .collect();
        tracing::info!(dirs = %roots.join(", "), "watching for changes");

        while !self.stopped.load(Ordering::SeqCst) {
            let first = match self.events.recv_timeout(POLL_INTERVAL) {
                Ok(batch) => batch,
                Err(RecvTimeoutError::Timeout) => continue,
                Err(RecvTimeoutError::Disconnected) => break,
            };

            // Subscriptions that fired together form one batch
            let mut batch = vec![first];
            batch.extend(self.events.try_iter());

            let mut changed: Vec<PathBuf> = Vec::new();
            for (task_id, result) in batch {
                match result {
                    Ok(events) => changed.extend(
                        events
                            .into_iter()
                            .filter(|e| {
                                matches!(e.kind, DebouncedEventKind::Any | DebouncedEventKind::AnyContinuous)
                            })
                            .map(|e| e.path),
                    ),
                    Err(error) => {
                        // Watch error (non-fatal) - log but continue watching
                        tracing::warn!(task = %task_id, error = %error, "watch error");
                    }
                }
            }
            changed.sort();
            changed.dedup();

            if !changed.is_empty() {
                self.rebuild(pipeline, &changed);
            }
        }
    }

    /// Release every subscription. The loop returns on its next poll.
    pub fn stop(&mut self) {
        self.stopped.store(true, Ordering::SeqCst);
        self.debouncers.clear();
        self.bindings.clear();
    }
}
