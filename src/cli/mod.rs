//! Command-line interface implementation
//!
//! This module provides the CLI entry point and dispatches to submodules
//! for specific command implementations.

mod build;
mod dev;

use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use tracing_subscriber::EnvFilter;

use crate::build::TaskKind;
use crate::config::loader::{
    ensure_valid, find_config, load_config, merge_cli_overrides, CliOverrides,
};
use crate::config::{AssetConfig, ConfigError};

/// Exit codes
pub(crate) const EXIT_SUCCESS: u8 = 0;
pub(crate) const EXIT_ERROR: u8 = 1;
pub(crate) const EXIT_INVALID_CONFIG: u8 = 2;

/// assetline - build and serve front-end assets
#[derive(Debug, Parser)]
#[command(name = "assetline")]
#[command(about = "Compile templates, styles, scripts and images into a deployable site")]
#[command(version)]
pub struct Cli {
    /// Config file (default: nearest assetline.toml upwards)
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Log debug output (RUST_LOG overrides)
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Command to run (default: dev)
    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Run every enabled task once
    Build {
        /// Only run these tasks
        #[arg(long, value_enum, num_args = 1..)]
        only: Vec<TaskKind>,

        /// Fail tasks with lint errors
        #[arg(long)]
        strict: bool,

        /// Override source root
        #[arg(long)]
        src: Option<PathBuf>,

        /// Override output root
        #[arg(long)]
        out: Option<PathBuf>,

        /// Maximum tasks running at once (default: available cores)
        #[arg(long, short = 'j')]
        jobs: Option<usize>,

        /// List the task plan without running it
        #[arg(long)]
        dry_run: bool,
    },
    /// Build, then serve the output and rebuild on change
    Dev {
        /// Only run and watch these tasks
        #[arg(long, value_enum, num_args = 1..)]
        only: Vec<TaskKind>,

        /// Override source root
        #[arg(long)]
        src: Option<PathBuf>,

        /// Override output root
        #[arg(long)]
        out: Option<PathBuf>,

        /// Override server host
        #[arg(long)]
        host: Option<String>,

        /// Override server port
        #[arg(long)]
        port: Option<u16>,

        /// Disable live reload
        #[arg(long)]
        no_reload: bool,
    },
}

/// Parse arguments, set up logging and run the selected command.
pub fn run() -> ExitCode {
    let cli = Cli::parse();
    init_logging(cli.verbose);
    execute(cli)
}

/// Run an already parsed command line.
pub fn execute(cli: Cli) -> ExitCode {
    let command = cli.command.unwrap_or(Commands::Dev {
        only: Vec::new(),
        src: None,
        out: None,
        host: None,
        port: None,
        no_reload: false,
    });

    match command {
        Commands::Build { only, strict, src, out, jobs, dry_run } => {
            let overrides = CliOverrides { src, out, ..Default::default() };
            build::run_build(
                cli.config.as_deref(),
                &overrides,
                build::BuildOptions { only, strict, jobs, dry_run, verbose: cli.verbose },
            )
        }
        Commands::Dev { only, src, out, host, port, no_reload } => {
            let overrides = CliOverrides {
                src,
                out,
                host,
                port,
                live_reload: no_reload.then_some(false),
            };
            dev::run_dev(cli.config.as_deref(), &overrides, &only, cli.verbose)
        }
    }
}

/// Install the tracing subscriber: `info` by default, `debug` with `-v`.
pub fn init_logging(verbose: bool) {
    let default = if verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    let _ = tracing_subscriber::fmt().with_env_filter(filter).with_target(false).try_init();
}

/// Load the configuration, apply overrides and find the project root.
///
/// An explicit path wins; otherwise the nearest `assetline.toml` is used, and
/// without one the defaults are rooted at the working directory.
pub(crate) fn load_project(
    explicit: Option<&Path>,
    overrides: &CliOverrides,
) -> Result<(AssetConfig, PathBuf), ConfigError> {
    let config_path = explicit.map(Path::to_path_buf).or_else(find_config);
    let mut config = load_config(config_path.as_deref())?;

    let cwd = std::env::current_dir()?;
    let project_root = match &config_path {
        Some(path) => {
            tracing::debug!(config = %path.display(), "using config");
            match path.parent() {
                // Watch events carry absolute paths
                Some(parent) if !parent.as_os_str().is_empty() => cwd.join(parent),
                _ => cwd,
            }
        }
        None => {
            tracing::debug!("no assetline.toml found, using defaults");
            cwd
        }
    };

    merge_cli_overrides(&mut config, overrides);
    ensure_valid(&config)?;
    Ok((config, project_root))
}

/// Print a config problem and pick the exit code for it.
pub(crate) fn config_failure(error: &ConfigError) -> u8 {
    eprintln!("{}", error);
    EXIT_INVALID_CONFIG
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_no_command_means_dev() {
        let cli = Cli::try_parse_from(["assetline"]).unwrap();
        assert!(cli.command.is_none());
        assert!(!cli.verbose);
    }

    #[test]
    fn test_build_flags() {
        let cli = Cli::try_parse_from([
            "assetline",
            "-v",
            "build",
            "--only",
            "styles",
            "scripts",
            "--strict",
            "--jobs",
            "2",
            "--out",
            "public",
        ])
        .unwrap();
        assert!(cli.verbose);
        match cli.command {
            Some(Commands::Build { only, strict, jobs, out, dry_run, .. }) => {
                assert_eq!(only, vec![TaskKind::Styles, TaskKind::Scripts]);
                assert!(strict);
                assert!(!dry_run);
                assert_eq!(jobs, Some(2));
                assert_eq!(out, Some(PathBuf::from("public")));
            }
            other => panic!("expected build, got {:?}", other),
        }
    }

    #[test]
    fn test_dev_flags() {
        let cli = Cli::try_parse_from([
            "assetline",
            "dev",
            "--port",
            "9000",
            "--host",
            "0.0.0.0",
            "--no-reload",
            "--config",
            "site/assetline.toml",
        ])
        .unwrap();
        assert_eq!(cli.config, Some(PathBuf::from("site/assetline.toml")));
        match cli.command {
            Some(Commands::Dev { port, host, no_reload, only, .. }) => {
                assert_eq!(port, Some(9000));
                assert_eq!(host.as_deref(), Some("0.0.0.0"));
                assert!(no_reload);
                assert!(only.is_empty());
            }
            other => panic!("expected dev, got {:?}", other),
        }
    }

    #[test]
    fn test_unknown_task_rejected() {
        assert!(Cli::try_parse_from(["assetline", "build", "--only", "fonts", "videos"]).is_err());
    }

    #[test]
    fn test_load_project_explicit_config() {
        let temp = tempfile::TempDir::new().unwrap();
        let path = temp.path().join("assetline.toml");
        std::fs::write(&path, "[project]\nname = \"site\"\nout = \"public\"\n").unwrap();

        let overrides = CliOverrides { src: Some(PathBuf::from("assets")), ..Default::default() };
        let (config, root) = load_project(Some(&path), &overrides).unwrap();
        assert_eq!(root, temp.path());
        assert_eq!(config.project.out, PathBuf::from("public"));
        assert_eq!(config.project.src, PathBuf::from("assets"));
    }

    #[test]
    fn test_load_project_rejects_invalid_override() {
        let temp = tempfile::TempDir::new().unwrap();
        let path = temp.path().join("assetline.toml");
        std::fs::write(&path, "[project]\nname = \"site\"\n").unwrap();

        let overrides = CliOverrides { port: Some(0), ..Default::default() };
        let err = load_project(Some(&path), &overrides).unwrap_err();
        assert!(matches!(err, ConfigError::Validation(_)));
    }
}
