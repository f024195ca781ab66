//! Build command implementation

use std::path::Path;
use std::process::ExitCode;
use std::sync::Arc;

use super::{config_failure, load_project, EXIT_ERROR, EXIT_SUCCESS};
use crate::build::progress::LogProgress;
use crate::build::{BuildContext, BuildPipeline, TaskKind, TaskPlan};
use crate::config::loader::CliOverrides;

/// Flags of the build command
#[derive(Debug, Default, Clone)]
pub struct BuildOptions {
    pub only: Vec<TaskKind>,
    pub strict: bool,
    pub jobs: Option<usize>,
    pub dry_run: bool,
    pub verbose: bool,
}

/// Run the build command
pub fn run_build(config: Option<&Path>, overrides: &CliOverrides, options: BuildOptions) -> ExitCode {
    ExitCode::from(build_status(config, overrides, options))
}

fn build_status(config: Option<&Path>, overrides: &CliOverrides, options: BuildOptions) -> u8 {
    let (config, project_root) = match load_project(config, overrides) {
        Ok(loaded) => loaded,
        Err(e) => return config_failure(&e),
    };

    let mut context = BuildContext::new(config, project_root)
        .with_strict(options.strict)
        .with_verbose(options.verbose);
    if !options.only.is_empty() {
        context = context.with_filter(options.only.clone());
    }

    let mut pipeline = BuildPipeline::new(context).with_dry_run(options.dry_run);
    if let Some(jobs) = options.jobs {
        pipeline = pipeline.with_jobs(jobs);
    }

    if options.dry_run {
        print_plan(&pipeline.plan());
        return EXIT_SUCCESS;
    }

    let pipeline = pipeline.with_reporter(Arc::new(LogProgress::new().with_verbose(options.verbose)));
    match pipeline.build() {
        Ok(result) => {
            if result.is_success() {
                println!("{}", result.summary());
                EXIT_SUCCESS
            } else {
                if let Some(first) = result.first_failure() {
                    eprintln!("{}: {}", first.task_id, first.status);
                }
                eprintln!("{}", result.summary());
                EXIT_ERROR
            }
        }
        Err(e) => {
            eprintln!("Build error: {}", e);
            EXIT_ERROR
        }
    }
}

/// Print what a build would run.
fn print_plan(plan: &TaskPlan) {
    println!("Dry run - would run {} task(s):", plan.len());
    for task in plan.tasks() {
        println!("  {}", task.id);
        for set in &task.sets {
            println!(
                "    {} -> {}",
                set.root.join(&set.pattern).display(),
                set.dest.display()
            );
        }
    }
}
