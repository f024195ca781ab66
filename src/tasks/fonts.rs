//! Byte-identical copy of fonts and other static files.

use super::{TaskError, TaskOutcome};
use crate::build::{discover_files, mirror_path, BuildContext, TaskDefinition};
use std::fs;

pub fn run(task: &TaskDefinition, _ctx: &BuildContext) -> Result<TaskOutcome, TaskError> {
    let mut outcome = TaskOutcome::default();

    for set in &task.sets {
        for source in discover_files(&set.root, &set.pattern)? {
            let output = mirror_path(&source, &set.root, &set.dest, None)?;
            if let Some(parent) = output.parent() {
                fs::create_dir_all(parent).map_err(TaskError::io(parent))?;
            }
            fs::copy(&source, &output).map_err(TaskError::io(&source))?;

            outcome.sources.push(source);
            outcome.outputs.push(output);
        }
    }

    Ok(outcome)
}
