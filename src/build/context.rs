//! Build context containing configuration and state for a build.

use crate::build::TaskKind;
use crate::config::AssetConfig;
use std::path::{Path, PathBuf};

/// Build context containing configuration and paths for a build operation.
///
/// The context provides access to all information needed to run tasks,
/// including the configuration, project root, and output directories.
#[derive(Debug, Clone)]
pub struct BuildContext {
    /// The loaded configuration
    config: AssetConfig,
    /// Project root directory (where assetline.toml is located)
    project_root: PathBuf,
    /// Per-file problems and lint errors fail their task
    strict: bool,
    verbose: bool,
    /// Optional filter to run specific tasks only
    task_filter: Option<Vec<TaskKind>>,
}

impl BuildContext {
    /// Create a new build context.
    ///
    /// # Arguments
    /// - `config` - The loaded configuration
    /// - `project_root` - The project root directory
    pub fn new(config: AssetConfig, project_root: PathBuf) -> Self {
        Self { config, project_root, strict: false, verbose: false, task_filter: None }
    }

    /// Get the configuration.
    pub fn config(&self) -> &AssetConfig {
        &self.config
    }

    /// Get the project root directory.
    pub fn project_root(&self) -> &Path {
        &self.project_root
    }

    /// Get the source directory (resolved to absolute path).
    pub fn src_dir(&self) -> PathBuf {
        self.resolve_path(&self.config.project.src)
    }

    /// Get the output directory (resolved to absolute path).
    pub fn out_dir(&self) -> PathBuf {
        self.resolve_path(&self.config.project.out)
    }

    /// A directory under the source root.
    pub fn source(&self, relative: &Path) -> PathBuf {
        self.src_dir().join(relative)
    }

    /// A directory under the output root.
    pub fn dest(&self, relative: &Path) -> PathBuf {
        if relative == Path::new(".") {
            self.out_dir()
        } else {
            self.out_dir().join(relative)
        }
    }

    pub fn is_strict(&self) -> bool {
        self.strict
    }

    pub fn is_verbose(&self) -> bool {
        self.verbose
    }

    /// Set strict mode.
    pub fn with_strict(mut self, strict: bool) -> Self {
        self.strict = strict;
        self
    }

    /// Set verbose mode.
    pub fn with_verbose(mut self, verbose: bool) -> Self {
        self.verbose = verbose;
        self
    }

    /// Set task filter to run only specific tasks.
    pub fn with_filter(mut self, tasks: Vec<TaskKind>) -> Self {
        self.task_filter = if tasks.is_empty() { None } else { Some(tasks) };
        self
    }

    /// Get the task filter.
    pub fn task_filter(&self) -> Option<&[TaskKind]> {
        self.task_filter.as_deref()
    }

    /// Resolve a path relative to the project root.
    ///
    /// If the path is absolute, returns it unchanged.
    /// If relative, joins it with the project root.
    pub fn resolve_path(&self, path: &Path) -> PathBuf {
        crate::config::loader::resolve_path(&self.project_root, path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::default_config;

    fn context() -> BuildContext {
        BuildContext::new(default_config(), PathBuf::from("/project"))
    }

    #[test]
    fn test_build_context_new() {
        let ctx = context();
        assert_eq!(ctx.project_root(), Path::new("/project"));
        assert!(!ctx.is_strict());
        assert!(!ctx.is_verbose());
        assert!(ctx.task_filter().is_none());
    }

    #[test]
    fn test_build_context_builders() {
        let ctx = context().with_strict(true).with_verbose(true);
        assert!(ctx.is_strict());
        assert!(ctx.is_verbose());
    }

    #[test]
    fn test_build_context_with_filter() {
        let ctx = context().with_filter(vec![TaskKind::Styles]);
        assert_eq!(ctx.task_filter(), Some(&[TaskKind::Styles][..]));

        let ctx = context().with_filter(vec![]);
        assert!(ctx.task_filter().is_none());
    }

    #[test]
    fn test_build_context_dirs() {
        let ctx = context();
        assert_eq!(ctx.src_dir(), PathBuf::from("/project/src"));
        assert_eq!(ctx.out_dir(), PathBuf::from("/project/dist"));
        assert_eq!(ctx.source(Path::new("scss")), PathBuf::from("/project/src/scss"));
        assert_eq!(ctx.dest(Path::new("css")), PathBuf::from("/project/dist/css"));
        assert_eq!(ctx.dest(Path::new(".")), PathBuf::from("/project/dist"));
    }

    #[test]
    fn test_build_context_absolute_out() {
        let mut config = default_config();
        config.project.out = PathBuf::from("/srv/www");
        let ctx = BuildContext::new(config, PathBuf::from("/project"));
        assert_eq!(ctx.out_dir(), PathBuf::from("/srv/www"));
    }
}
