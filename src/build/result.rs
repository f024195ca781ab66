//! Build result types.
//!
//! Contains types for representing the outcome of task runs.

use crate::build::TaskKind;
use std::path::PathBuf;
use std::time::Duration;

/// Status of a single task run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TaskStatus {
    /// Task succeeded
    Success,
    /// Task was not run (dry run)
    Skipped,
    /// Task failed with error
    Failed(String),
}

impl TaskStatus {
    /// Check if the status indicates success.
    pub fn is_success(&self) -> bool {
        matches!(self, TaskStatus::Success | TaskStatus::Skipped)
    }

    /// Check if the status indicates failure.
    pub fn is_failure(&self) -> bool {
        matches!(self, TaskStatus::Failed(_))
    }
}

impl std::fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TaskStatus::Success => write!(f, "success"),
            TaskStatus::Skipped => write!(f, "skipped"),
            TaskStatus::Failed(err) => write!(f, "failed: {}", err),
        }
    }
}

/// A problem tied to one source file
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileError {
    /// Path to the file containing the error
    pub file: PathBuf,
    /// Line number (1-indexed, None if unknown)
    pub line: Option<usize>,
    /// Column number (1-indexed, None if unknown)
    pub column: Option<usize>,
    pub message: String,
}

impl FileError {
    /// Create a new error with file and message
    pub fn new(file: impl Into<PathBuf>, message: impl Into<String>) -> Self {
        Self { file: file.into(), line: None, column: None, message: message.into() }
    }

    /// Create an error with full location information
    pub fn with_location(
        file: impl Into<PathBuf>,
        line: usize,
        column: usize,
        message: impl Into<String>,
    ) -> Self {
        Self { file: file.into(), line: Some(line), column: Some(column), message: message.into() }
    }
}

impl std::fmt::Display for FileError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.file.display())?;
        if let Some(line) = self.line {
            write!(f, ":{}", line)?;
            if let Some(col) = self.column {
                write!(f, ":{}", col)?;
            }
        }
        write!(f, ": {}", self.message)
    }
}

/// Result of running a single task.
#[derive(Debug, Clone)]
pub struct TaskResult {
    pub task_id: String,
    pub kind: TaskKind,
    pub status: TaskStatus,
    /// Sources the run looked at
    pub sources: Vec<PathBuf>,
    /// Output files produced
    pub outputs: Vec<PathBuf>,
    /// Per-file problems that did not stop the task
    pub errors: Vec<FileError>,
    pub warnings: Vec<String>,
    pub duration: Duration,
}

impl TaskResult {
    fn with_status(task_id: String, kind: TaskKind, status: TaskStatus) -> Self {
        Self {
            task_id,
            kind,
            status,
            sources: vec![],
            outputs: vec![],
            errors: vec![],
            warnings: vec![],
            duration: Duration::ZERO,
        }
    }

    /// Create a successful result.
    pub fn success(task_id: String, kind: TaskKind, outputs: Vec<PathBuf>) -> Self {
        let mut result = Self::with_status(task_id, kind, TaskStatus::Success);
        result.outputs = outputs;
        result
    }

    /// Create a skipped result.
    pub fn skipped(task_id: String, kind: TaskKind) -> Self {
        Self::with_status(task_id, kind, TaskStatus::Skipped)
    }

    /// Create a failed result.
    pub fn failed(task_id: String, kind: TaskKind, error: String) -> Self {
        Self::with_status(task_id, kind, TaskStatus::Failed(error))
    }

    pub fn with_sources(mut self, sources: Vec<PathBuf>) -> Self {
        self.sources = sources;
        self
    }

    pub fn with_errors(mut self, errors: Vec<FileError>) -> Self {
        self.errors = errors;
        self
    }

    pub fn with_warnings(mut self, warnings: Vec<String>) -> Self {
        self.warnings = warnings;
        self
    }

    pub fn with_duration(mut self, duration: Duration) -> Self {
        self.duration = duration;
        self
    }

    /// Check if this result is successful.
    pub fn is_success(&self) -> bool {
        self.status.is_success()
    }
}

/// Result of a complete build run.
#[derive(Debug, Default, Clone)]
pub struct BuildResult {
    /// Results for each task, in plan order
    pub tasks: Vec<TaskResult>,
    /// Total build duration
    pub total_duration: Duration,
}

impl BuildResult {
    /// Create a new empty build result.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a task result.
    pub fn add_result(&mut self, result: TaskResult) {
        self.tasks.push(result);
    }

    /// Set the total duration.
    pub fn with_duration(mut self, duration: Duration) -> Self {
        self.total_duration = duration;
        self
    }

    /// Get the number of successful tasks.
    pub fn success_count(&self) -> usize {
        self.tasks.iter().filter(|r| matches!(r.status, TaskStatus::Success)).count()
    }

    /// Get the number of skipped tasks.
    pub fn skipped_count(&self) -> usize {
        self.tasks.iter().filter(|r| matches!(r.status, TaskStatus::Skipped)).count()
    }

    /// Get the number of failed tasks.
    pub fn failed_count(&self) -> usize {
        self.tasks.iter().filter(|r| r.status.is_failure()).count()
    }

    /// Check if the overall build succeeded (no failures).
    pub fn is_success(&self) -> bool {
        self.failed_count() == 0
    }

    /// Get all outputs produced.
    pub fn all_outputs(&self) -> Vec<&PathBuf> {
        self.tasks.iter().flat_map(|r| r.outputs.iter()).collect()
    }

    /// Get all per-file errors.
    pub fn all_errors(&self) -> Vec<&FileError> {
        self.tasks.iter().flat_map(|r| r.errors.iter()).collect()
    }

    /// Get all warnings.
    pub fn all_warnings(&self) -> Vec<&String> {
        self.tasks.iter().flat_map(|r| r.warnings.iter()).collect()
    }

    /// Get failed task results.
    pub fn failures(&self) -> Vec<&TaskResult> {
        self.tasks.iter().filter(|r| r.status.is_failure()).collect()
    }

    /// The failure reported first in the summary.
    pub fn first_failure(&self) -> Option<&TaskResult> {
        self.tasks.iter().find(|r| r.status.is_failure())
    }

    /// Format a summary of the build result.
    pub fn summary(&self) -> String {
        let mut lines = Vec::new();

        let success = self.success_count();
        let skipped = self.skipped_count();
        let failed = self.failed_count();
        let total = self.tasks.len();

        if failed > 0 {
            lines.push(format!(
                "Build failed: {} succeeded, {} skipped, {} failed ({} total)",
                success, skipped, failed, total
            ));
            for task in self.failures() {
                lines.push(format!("  - {}: {}", task.task_id, task.status));
            }
        } else {
            let outputs = self.all_outputs().len();
            lines.push(format!(
                "Build succeeded: {} tasks, {} files written in {:?}",
                total, outputs, self.total_duration
            ));
        }

        let errors = self.all_errors();
        if !errors.is_empty() {
            lines.push(format!("File errors ({}):", errors.len()));
            for error in &errors {
                lines.push(format!("  - {}", error));
            }
        }

        let warnings = self.all_warnings();
        if !warnings.is_empty() {
            lines.push(format!("Warnings ({}):", warnings.len()));
            for warning in warnings.iter().take(5) {
                lines.push(format!("  - {}", warning));
            }
            if warnings.len() > 5 {
                lines.push(format!("  ... and {} more", warnings.len() - 5));
            }
        }

        lines.join("\n")
    }
}
