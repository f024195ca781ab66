//! Dev command: build once, then serve the output and rebuild on change

use std::path::Path;
use std::process::ExitCode;
use std::sync::Arc;

use super::{config_failure, load_project, EXIT_ERROR, EXIT_SUCCESS};
use crate::build::progress::LogProgress;
use crate::build::{BuildContext, BuildPipeline, BuildResult, TaskKind};
use crate::config::loader::CliOverrides;
use crate::serve::{DevServer, LiveReload, ServerHandle};
use crate::watch::WatchSession;

/// Everything the watch loop needs once the initial group has settled.
struct DevRun {
    pipeline: BuildPipeline,
    initial: BuildResult,
    server: ServerHandle,
}

/// Run the dev command
pub fn run_dev(config: Option<&Path>, overrides: &CliOverrides, only: &[TaskKind], verbose: bool) -> ExitCode {
    let run = match start(config, overrides, only, verbose) {
        Ok(run) => run,
        Err(code) => return ExitCode::from(code),
    };

    let watch_config = run.pipeline.context().config().watch.clone();
    let mut session = match WatchSession::start(&run.pipeline.plan(), &watch_config) {
        Ok(session) => session,
        Err(e) => {
            eprintln!("Watch error: {}", e);
            return ExitCode::from(EXIT_ERROR);
        }
    };
    session.record(&run.initial);

    println!("Serving {} (Ctrl+C to stop)", run.server.url());
    session.run(&run.pipeline);
    drop(run.server);
    ExitCode::from(EXIT_SUCCESS)
}

/// Run the initial group and, once it has settled, start the server.
///
/// A failed build is reported but does not stop the server from starting.
fn start(
    config: Option<&Path>,
    overrides: &CliOverrides,
    only: &[TaskKind],
    verbose: bool,
) -> Result<DevRun, u8> {
    let (config, project_root) = load_project(config, overrides).map_err(|e| config_failure(&e))?;
    let serve_config = config.serve.clone();

    let mut context = BuildContext::new(config, project_root).with_verbose(verbose);
    if !only.is_empty() {
        context = context.with_filter(only.to_vec());
    }
    let out_dir = context.out_dir();

    let reload = serve_config.live_reload.then(|| LiveReload::new(out_dir.clone()));
    let mut pipeline =
        BuildPipeline::new(context).with_reporter(Arc::new(LogProgress::new().with_verbose(verbose)));
    if let Some(reload) = &reload {
        pipeline = pipeline.with_reporter(Arc::new(reload.clone()));
    }

    let initial = match pipeline.build() {
        Ok(result) => result,
        Err(e) => {
            eprintln!("Build error: {}", e);
            return Err(EXIT_ERROR);
        }
    };
    if initial.is_success() {
        println!("{}", initial.summary());
    } else {
        eprintln!("{}", initial.summary());
    }

    let mut server = DevServer::new(out_dir, &serve_config);
    if let Some(reload) = reload {
        server = server.with_live_reload(reload);
    }
    let server = server.start().map_err(|e| {
        eprintln!("Server error: {}", e);
        EXIT_ERROR
    })?;

    Ok(DevRun { pipeline, initial, server })
}
