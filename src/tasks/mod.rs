//! Pipeline tasks
//!
//! Each task is a function of (definition, context) returning what it read,
//! what it wrote, and the per-file problems it hit. [`run_task`] wraps that
//! into a [`TaskResult`], applying strict mode and timing.

pub mod fonts;
pub mod images;
pub mod scripts;
pub mod sprite;
pub mod styles;
pub mod templates;

use crate::build::{BuildContext, DiscoveryError, FileError, TaskDefinition, TaskKind, TaskResult};
use crate::sourcemap::SourceMapError;
use crate::svg::SvgError;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Instant;
use thiserror::Error;

/// Error that aborts a task run
#[derive(Debug, Error)]
pub enum TaskError {
    #[error("{0}")]
    Discovery(#[from] DiscoveryError),
    #[error("{}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid browser query: {0}")]
    Browsers(String),
    #[error("template error: {0}")]
    Template(String),
    #[error("{}: {message}", .file.display())]
    Script { file: PathBuf, message: String },
    #[error("{}: {message}", .file.display())]
    Image { file: PathBuf, message: String },
    #[error("{}: {source}", .file.display())]
    Svg {
        file: PathBuf,
        #[source]
        source: SvgError,
    },
    #[error("{}: {source}", .file.display())]
    SourceMap {
        file: PathBuf,
        #[source]
        source: SourceMapError,
    },
    #[error("{0} problem(s) in strict mode")]
    Strict(usize),
}

impl TaskError {
    pub(crate) fn io(path: &Path) -> impl FnOnce(std::io::Error) -> TaskError + '_ {
        move |source| TaskError::Io { path: path.to_path_buf(), source }
    }
}

/// What a task run read, wrote and reported.
#[derive(Debug, Default, Clone)]
pub struct TaskOutcome {
    pub sources: Vec<PathBuf>,
    pub outputs: Vec<PathBuf>,
    pub errors: Vec<FileError>,
    pub warnings: Vec<String>,
}

impl TaskOutcome {
    pub fn merge(&mut self, other: TaskOutcome) {
        self.sources.extend(other.sources);
        self.outputs.extend(other.outputs);
        self.errors.extend(other.errors);
        self.warnings.extend(other.warnings);
    }
}

/// Write a file, creating parent directories.
pub(crate) fn write_output(path: &Path, contents: impl AsRef<[u8]>) -> Result<(), TaskError> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).map_err(TaskError::io(parent))?;
    }
    fs::write(path, contents).map_err(TaskError::io(path))
}

/// Render an error with its `source()` chain, outermost first.
pub(crate) fn error_chain(error: &dyn std::error::Error) -> String {
    let mut message = error.to_string();
    let mut current = error.source();
    while let Some(cause) = current {
        let text = cause.to_string();
        if !message.contains(&text) {
            message.push_str(": ");
            message.push_str(&text);
        }
        current = cause.source();
    }
    message
}

fn dispatch(task: &TaskDefinition, ctx: &BuildContext) -> Result<TaskOutcome, TaskError> {
    match task.kind {
        TaskKind::Templates => templates::run(task, ctx),
        TaskKind::Styles => styles::run(task, ctx),
        TaskKind::Scripts => scripts::run(task, ctx),
        TaskKind::Fonts => fonts::run(task, ctx),
        TaskKind::Images => images::run(task, ctx),
        TaskKind::Sprite => sprite::run(task, ctx),
    }
}

/// Run one task and turn its outcome into a [`TaskResult`].
///
/// Task errors become a failed result; sibling tasks are not affected. In
/// strict mode any per-file error also fails the task. Nothing is logged
/// here; the pipeline reports the result.
pub fn run_task(task: &TaskDefinition, ctx: &BuildContext) -> TaskResult {
    let start = Instant::now();
    let _span = tracing::debug_span!("task", task = %task.id).entered();

    let result = match dispatch(task, ctx) {
        Ok(outcome) => {
            let strict_failure = ctx.is_strict() && !outcome.errors.is_empty();
            let result = if strict_failure {
                let error = TaskError::Strict(outcome.errors.len());
                TaskResult::failed(task.id.clone(), task.kind, error.to_string())
            } else {
                TaskResult::success(task.id.clone(), task.kind, outcome.outputs)
            };
            result
                .with_sources(outcome.sources)
                .with_errors(outcome.errors)
                .with_warnings(outcome.warnings)
        }
        Err(error) => TaskResult::failed(task.id.clone(), task.kind, error_chain(&error)),
    };

    result.with_duration(start.elapsed())
}
