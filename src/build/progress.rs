//! Build progress reporting.
//!
//! Task runs emit [`ProgressEvent`]s to every registered
//! [`ProgressReporter`]. The dev server's live-reload hub is one such
//! reporter; [`LogProgress`] turns events into `tracing` records.
//!
//! # Example
//!
//! ```ignore
//! use assetline::build::progress::{LogProgress, ProgressEvent, ProgressReporter};
//!
//! let reporter = LogProgress::new();
//! reporter.report(ProgressEvent::BuildStarted { total_tasks: 6 });
//! reporter.report(ProgressEvent::TaskStarted { task_id: "styles".to_string() });
//! ```

use crate::build::{TaskKind, TaskStatus};
use std::path::PathBuf;
use std::sync::Mutex;

/// Events that can be reported during a build.
#[derive(Debug, Clone, PartialEq)]
pub enum ProgressEvent {
    /// A group of tasks started
    BuildStarted {
        /// Number of tasks in the group
        total_tasks: usize,
    },
    /// A task run started
    TaskStarted { task_id: String },
    /// A task run completed
    TaskCompleted {
        task_id: String,
        kind: TaskKind,
        status: TaskStatus,
        /// Files written by this run
        outputs: Vec<PathBuf>,
        duration_ms: u64,
    },
    /// A warning was generated
    Warning {
        /// Task that generated the warning (if applicable)
        task_id: Option<String>,
        message: String,
    },
    /// An error occurred
    Error {
        /// Task that generated the error (if applicable)
        task_id: Option<String>,
        message: String,
    },
    /// The group finished
    BuildCompleted {
        /// Whether every task succeeded
        success: bool,
        duration_ms: u64,
        succeeded: usize,
        skipped: usize,
        failed: usize,
    },
}

/// Trait for progress reporters.
pub trait ProgressReporter: Send + Sync {
    /// Report a progress event.
    fn report(&self, event: ProgressEvent);

    /// Check if this reporter wants verbose output.
    fn is_verbose(&self) -> bool {
        false
    }
}

/// A progress reporter that discards all events.
#[derive(Debug, Default)]
pub struct NullProgress;

impl NullProgress {
    /// Create a new null progress reporter.
    pub fn new() -> Self {
        Self
    }
}

impl ProgressReporter for NullProgress {
    fn report(&self, _event: ProgressEvent) {}
}

/// Writes events as structured `tracing` records.
#[derive(Debug, Default)]
pub struct LogProgress {
    verbose: bool,
}

impl LogProgress {
    pub fn new() -> Self {
        Self::default()
    }

    /// Also log task starts.
    pub fn with_verbose(mut self, verbose: bool) -> Self {
        self.verbose = verbose;
        self
    }
}

impl ProgressReporter for LogProgress {
    fn report(&self, event: ProgressEvent) {
        match event {
            ProgressEvent::BuildStarted { total_tasks } => {
                tracing::info!(tasks = total_tasks, "running tasks");
            }
            ProgressEvent::TaskStarted { task_id } => {
                if self.verbose {
                    tracing::debug!(task = %task_id, "task started");
                }
            }
            ProgressEvent::TaskCompleted { task_id, status, outputs, duration_ms, .. } => {
                match status {
                    TaskStatus::Failed(err) => {
                        tracing::error!(task = %task_id, duration_ms, "task failed: {}", err);
                    }
                    TaskStatus::Skipped => {
                        tracing::info!(task = %task_id, "task skipped");
                    }
                    TaskStatus::Success => {
                        tracing::info!(
                            task = %task_id,
                            duration_ms,
                            outputs = outputs.len(),
                            "finished {} in {}",
                            task_id,
                            format_duration(duration_ms)
                        );
                    }
                }
            }
            ProgressEvent::Warning { task_id, message } => match task_id {
                Some(id) => tracing::warn!(task = %id, "{}", message),
                None => tracing::warn!("{}", message),
            },
            ProgressEvent::Error { task_id, message } => match task_id {
                Some(id) => tracing::error!(task = %id, "{}", message),
                None => tracing::error!("{}", message),
            },
            ProgressEvent::BuildCompleted { success, duration_ms, succeeded, skipped, failed } => {
                if success {
                    tracing::info!(
                        succeeded,
                        skipped,
                        duration_ms,
                        "all tasks done in {}",
                        format_duration(duration_ms)
                    );
                } else {
                    tracing::error!(succeeded, skipped, failed, duration_ms, "tasks failed");
                }
            }
        }
    }

    fn is_verbose(&self) -> bool {
        self.verbose
    }
}

/// Keeps every event in memory, in arrival order.
#[derive(Debug, Default)]
pub struct RecordingProgress {
    events: Mutex<Vec<ProgressEvent>>,
}

impl RecordingProgress {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of the events seen so far.
    pub fn events(&self) -> Vec<ProgressEvent> {
        self.events.lock().map(|e| e.clone()).unwrap_or_default()
    }

    /// Ids of completed tasks, in completion order.
    pub fn completed_tasks(&self) -> Vec<String> {
        self.events()
            .into_iter()
            .filter_map(|e| match e {
                ProgressEvent::TaskCompleted { task_id, .. } => Some(task_id),
                _ => None,
            })
            .collect()
    }
}

impl ProgressReporter for RecordingProgress {
    fn report(&self, event: ProgressEvent) {
        if let Ok(mut events) = self.events.lock() {
            events.push(event);
        }
    }
}

/// Format a duration in milliseconds to a human-readable string.
pub fn format_duration(ms: u64) -> String {
    if ms < 1000 {
        format!("{}ms", ms)
    } else if ms < 60_000 {
        format!("{:.1}s", ms as f64 / 1000.0)
    } else {
        let minutes = ms / 60_000;
        let seconds = (ms % 60_000) / 1000;
        format!("{}m {}s", minutes, seconds)
    }
}
