//! Build pipeline orchestration.
//!
//! The pipeline plans the enabled tasks, runs them as one parallel group and
//! reports every step to the registered progress reporters.

use crate::build::progress::{ProgressEvent, ProgressReporter};
use crate::build::{BuildContext, BuildResult, ParallelExecutor, TaskDefinition, TaskPlan, TaskResult};
use crate::tasks::run_task;
use std::fs;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;
use thiserror::Error;

/// Error that prevents a task group from running at all.
#[derive(Debug, Error)]
pub enum BuildError {
    #[error("cannot create output directory {}: {source}", .path.display())]
    OutputDir {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("unknown task '{0}'")]
    UnknownTask(String),
}

/// Build pipeline for executing builds.
pub struct BuildPipeline {
    context: BuildContext,
    executor: ParallelExecutor,
    /// List the plan without running tasks
    dry_run: bool,
    reporters: Vec<Arc<dyn ProgressReporter>>,
}

impl BuildPipeline {
    /// Create a new build pipeline.
    pub fn new(context: BuildContext) -> Self {
        Self { context, executor: ParallelExecutor::new(), dry_run: false, reporters: Vec::new() }
    }

    /// Limit the number of tasks running at once.
    pub fn with_jobs(mut self, jobs: usize) -> Self {
        self.executor = self.executor.with_jobs(jobs);
        self
    }

    /// Set dry-run mode (every task is reported as skipped).
    pub fn with_dry_run(mut self, dry_run: bool) -> Self {
        self.dry_run = dry_run;
        self
    }

    /// Register a progress reporter.
    pub fn with_reporter(mut self, reporter: Arc<dyn ProgressReporter>) -> Self {
        self.reporters.push(reporter);
        self
    }

    pub fn context(&self) -> &BuildContext {
        &self.context
    }

    /// The tasks a full build would run.
    pub fn plan(&self) -> TaskPlan {
        TaskPlan::from_context(&self.context)
    }

    /// Run every planned task once.
    pub fn build(&self) -> Result<BuildResult, BuildError> {
        self.run_plan(&self.plan())
    }

    /// Run only the named tasks (used by watch-triggered rebuilds).
    pub fn run_tasks(&self, ids: &[String]) -> Result<BuildResult, BuildError> {
        let plan = self.plan();
        if let Some(unknown) = ids.iter().find(|id| plan.get(id).is_none()) {
            return Err(BuildError::UnknownTask(unknown.clone()));
        }
        self.run_plan(&plan.subset(ids))
    }

    fn report(&self, event: ProgressEvent) {
        for reporter in &self.reporters {
            reporter.report(event.clone());
        }
    }

    /// Run a plan as one parallel group and join the results.
    pub fn run_plan(&self, plan: &TaskPlan) -> Result<BuildResult, BuildError> {
        let start = Instant::now();

        if !self.dry_run {
            let out_dir = self.context.out_dir();
            fs::create_dir_all(&out_dir)
                .map_err(|source| BuildError::OutputDir { path: out_dir, source })?;
        }

        self.report(ProgressEvent::BuildStarted { total_tasks: plan.len() });
        let results = self.executor.execute(plan.tasks(), |task| self.execute_task(task));

        let mut result = BuildResult::new();
        for task_result in results {
            result.add_result(task_result);
        }
        let result = result.with_duration(start.elapsed());

        self.report(ProgressEvent::BuildCompleted {
            success: result.is_success(),
            duration_ms: result.total_duration.as_millis() as u64,
            succeeded: result.success_count(),
            skipped: result.skipped_count(),
            failed: result.failed_count(),
        });

        Ok(result)
    }

    /// Run a single task, reporting its start, problems and completion.
    fn execute_task(&self, task: &TaskDefinition) -> TaskResult {
        self.report(ProgressEvent::TaskStarted { task_id: task.id.clone() });

        let result = if self.dry_run {
            TaskResult::skipped(task.id.clone(), task.kind)
        } else {
            run_task(task, &self.context)
        };

        for error in &result.errors {
            self.report(ProgressEvent::Error {
                task_id: Some(task.id.clone()),
                message: error.to_string(),
            });
        }
        for warning in &result.warnings {
            self.report(ProgressEvent::Warning {
                task_id: Some(task.id.clone()),
                message: warning.clone(),
            });
        }

        self.report(ProgressEvent::TaskCompleted {
            task_id: task.id.clone(),
            kind: task.kind,
            status: result.status.clone(),
            outputs: result.outputs.clone(),
            duration_ms: result.duration.as_millis() as u64,
        });

        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::build::progress::RecordingProgress;
    use crate::build::TaskStatus;
    use crate::config::default_config;
    use tempfile::TempDir;

    fn create_test_context() -> (TempDir, BuildContext) {
        let temp = TempDir::new().unwrap();
        let ctx = BuildContext::new(default_config(), temp.path().to_path_buf());
        (temp, ctx)
    }

    fn write(temp: &TempDir, rel: &str, content: &str) {
        let path = temp.path().join(rel);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, content).unwrap();
    }

    #[test]
    fn test_build_pipeline_empty_build() {
        let (temp, ctx) = create_test_context();
        let result = BuildPipeline::new(ctx).build().unwrap();

        assert!(result.is_success());
        assert_eq!(result.tasks.len(), 6);
        assert!(result.all_outputs().is_empty());
        assert!(temp.path().join("dist").is_dir());
    }

    #[test]
    fn test_build_pipeline_dry_run() {
        let (temp, ctx) = create_test_context();
        write(&temp, "src/fonts/a.woff2", "font");

        let result = BuildPipeline::new(ctx).with_dry_run(true).build().unwrap();
        assert_eq!(result.skipped_count(), 6);
        assert!(!temp.path().join("dist").exists());
    }

    #[test]
    fn test_reports_events() {
        let (temp, ctx) = create_test_context();
        write(&temp, "src/fonts/a.woff2", "font");
        write(&temp, "src/js/app.js", "var a = 1;\nwindow.a = a;\n");

        let recorder = Arc::new(RecordingProgress::new());
        let pipeline = BuildPipeline::new(ctx).with_jobs(2).with_reporter(recorder.clone());
        pipeline.build().unwrap();

        let events = recorder.events();
        assert_eq!(events.first(), Some(&ProgressEvent::BuildStarted { total_tasks: 6 }));
        assert!(matches!(events.last(), Some(ProgressEvent::BuildCompleted { success: true, .. })));

        let mut completed = recorder.completed_tasks();
        completed.sort();
        assert_eq!(completed, vec!["fonts", "images", "scripts", "sprite", "styles", "templates"]);

        assert!(events.iter().any(|e| matches!(
            e,
            ProgressEvent::Warning { task_id: Some(id), message } if id == "scripts" && message.contains("no-var")
        )));
        assert!(events.iter().any(|e| matches!(
            e,
            ProgressEvent::TaskCompleted { task_id, outputs, .. } if task_id == "fonts" && outputs.len() == 1
        )));
    }

    #[test]
    fn test_failed_task_does_not_stop_others() {
        let (temp, ctx) = create_test_context();
        write(&temp, "src/js/broken.js", "function (\n");
        write(&temp, "src/fonts/a.woff2", "font");

        let result = BuildPipeline::new(ctx).build().unwrap();
        assert!(!result.is_success());
        assert_eq!(result.failed_count(), 1);
        assert_eq!(result.first_failure().unwrap().task_id, "scripts");
        assert!(temp.path().join("dist/fonts/a.woff2").exists());
    }

    #[test]
    fn test_run_tasks_subset() {
        let (temp, ctx) = create_test_context();
        write(&temp, "src/fonts/a.woff2", "font");
        write(&temp, "src/js/app.js", "window.a = 1;\n");

        let pipeline = BuildPipeline::new(ctx);
        let result = pipeline.run_tasks(&["fonts".to_string()]).unwrap();

        assert_eq!(result.tasks.len(), 1);
        assert_eq!(result.tasks[0].status, TaskStatus::Success);
        assert!(temp.path().join("dist/fonts/a.woff2").exists());
        assert!(!temp.path().join("dist/js").exists());
    }

    #[test]
    fn test_run_tasks_unknown_id() {
        let (_temp, ctx) = create_test_context();
        let err = BuildPipeline::new(ctx).run_tasks(&["gulp".to_string()]).unwrap_err();
        assert!(matches!(err, BuildError::UnknownTask(id) if id == "gulp"));
    }

    #[test]
    fn test_filter_from_context() {
        let (_temp, ctx) = create_test_context();
        let ctx = ctx.with_filter(vec![crate::build::TaskKind::Sprite]);
        let result = BuildPipeline::new(ctx).build().unwrap();
        assert_eq!(result.tasks.len(), 1);
        assert_eq!(result.tasks[0].task_id, "sprite");
    }
}
