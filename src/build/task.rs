//! Task definitions.
//!
//! A task is one stage of the asset pipeline: it reads a fixed set of source
//! globs and writes under a fixed destination directory. Definitions are
//! derived from configuration and carry no state between runs.

use crate::build::discovery::rooted_pattern;
use crate::build::BuildContext;
use glob::Pattern;
use std::path::{Path, PathBuf};
use std::str::FromStr;

/// Kind of task.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, clap::ValueEnum)]
pub enum TaskKind {
    /// Page templates rendered to markup
    Templates,
    /// SCSS compiled to CSS
    Styles,
    /// Linted and minified scripts
    Scripts,
    /// Byte-identical font copies
    Fonts,
    /// Optimized raster and vector images
    Images,
    /// Merged SVG symbol sprite
    Sprite,
}

impl TaskKind {
    /// Every kind, in plan order.
    pub const ALL: [TaskKind; 6] = [
        TaskKind::Templates,
        TaskKind::Styles,
        TaskKind::Scripts,
        TaskKind::Fonts,
        TaskKind::Images,
        TaskKind::Sprite,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            TaskKind::Templates => "templates",
            TaskKind::Styles => "styles",
            TaskKind::Scripts => "scripts",
            TaskKind::Fonts => "fonts",
            TaskKind::Images => "images",
            TaskKind::Sprite => "sprite",
        }
    }
}

impl std::fmt::Display for TaskKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for TaskKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        TaskKind::ALL.into_iter().find(|k| k.as_str() == s).ok_or_else(|| {
            let names: Vec<_> = TaskKind::ALL.iter().map(|k| k.as_str()).collect();
            format!("unknown task '{}' (expected one of: {})", s, names.join(", "))
        })
    }
}

/// One source root with its compile glob and destination.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceSet {
    /// Label used in logs (image set name, or the task id)
    pub name: String,
    /// Absolute source root
    pub root: PathBuf,
    /// Compile glob, relative to `root`
    pub pattern: String,
    /// Absolute destination root
    pub dest: PathBuf,
}

impl SourceSet {
    fn new(name: &str, root: PathBuf, pattern: &str, dest: PathBuf) -> Self {
        Self { name: name.to_string(), root, pattern: pattern.to_string(), dest }
    }
}

/// A task ready to run.
#[derive(Debug, Clone)]
pub struct TaskDefinition {
    /// Unique identifier (the kind name)
    pub id: String,
    pub kind: TaskKind,
    /// Source roots, compile globs and destinations
    pub sets: Vec<SourceSet>,
    /// Absolute glob patterns whose changes re-run this task
    pub watch: Vec<String>,
}

impl TaskDefinition {
    /// Create a definition with watch globs defaulting to the compile globs.
    pub fn new(kind: TaskKind, sets: Vec<SourceSet>) -> Self {
        let watch = sets.iter().map(|s| rooted_pattern(&s.root, &s.pattern)).collect();
        Self { id: kind.to_string(), kind, sets, watch }
    }

    /// Replace the watch globs.
    pub fn with_watch(mut self, watch: Vec<String>) -> Self {
        self.watch = watch;
        self
    }

    /// First source root.
    pub fn src_root(&self) -> Option<&Path> {
        self.sets.first().map(|s| s.root.as_path())
    }

    /// First destination root.
    pub fn dest_root(&self) -> Option<&Path> {
        self.sets.first().map(|s| s.dest.as_path())
    }

    /// Source directories that must be watched for this task.
    pub fn watch_roots(&self) -> Vec<&Path> {
        self.sets.iter().map(|s| s.root.as_path()).collect()
    }

    /// Whether a changed path belongs to this task.
    pub fn owns(&self, path: &Path) -> bool {
        self.watch
            .iter()
            .filter_map(|p| Pattern::new(p).ok())
            .any(|pattern| pattern.matches_path(path))
    }

    /// Check if this task matches a filter.
    pub fn matches_filter(&self, filter: &[TaskKind]) -> bool {
        filter.contains(&self.kind)
    }
}

/// The set of tasks a run will execute.
#[derive(Debug, Default, Clone)]
pub struct TaskPlan {
    tasks: Vec<TaskDefinition>,
}

impl TaskPlan {
    /// Create a new empty plan.
    pub fn new() -> Self {
        Self { tasks: vec![] }
    }

    /// Plan every enabled task, honoring the context's task filter.
    pub fn from_context(ctx: &BuildContext) -> Self {
        let config = ctx.config();
        let mut plan = Self::new();

        if config.templates.enabled {
            let root = ctx.source(&config.templates.dir);
            let watch = vec![rooted_pattern(&root, &config.templates.pattern)];
            let set = SourceSet::new(
                "templates",
                root,
                &config.templates.pages,
                ctx.dest(&config.templates.dest),
            );
            plan.add_task(TaskDefinition::new(TaskKind::Templates, vec![set]).with_watch(watch));
        }

        if config.styles.enabled {
            let set = SourceSet::new(
                "styles",
                ctx.source(&config.styles.dir),
                &config.styles.pattern,
                ctx.dest(&config.styles.dest),
            );
            plan.add_task(TaskDefinition::new(TaskKind::Styles, vec![set]));
        }

        if config.scripts.enabled {
            let set = SourceSet::new(
                "scripts",
                ctx.source(&config.scripts.dir),
                &config.scripts.pattern,
                ctx.dest(&config.scripts.dest),
            );
            plan.add_task(TaskDefinition::new(TaskKind::Scripts, vec![set]));
        }

        if config.fonts.enabled {
            let set = SourceSet::new(
                "fonts",
                ctx.source(&config.fonts.dir),
                &config.fonts.pattern,
                ctx.dest(&config.fonts.dest),
            );
            plan.add_task(TaskDefinition::new(TaskKind::Fonts, vec![set]));
        }

        if config.images.enabled && !config.images.sets.is_empty() {
            let sets = config
                .images
                .sets
                .iter()
                .map(|s| SourceSet::new(&s.name, ctx.source(&s.src), &s.pattern, ctx.dest(&s.dest)))
                .collect();
            plan.add_task(TaskDefinition::new(TaskKind::Images, sets));
        }

        if config.sprite.enabled {
            let set = SourceSet::new(
                "sprite",
                ctx.source(&config.sprite.dir),
                &config.sprite.pattern,
                ctx.dest(&config.sprite.dest),
            );
            plan.add_task(TaskDefinition::new(TaskKind::Sprite, vec![set]));
        }

        match ctx.task_filter() {
            Some(filter) => plan.filter(filter),
            None => plan,
        }
    }

    /// Add a task to the plan.
    pub fn add_task(&mut self, task: TaskDefinition) {
        self.tasks.push(task);
    }

    pub fn tasks(&self) -> &[TaskDefinition] {
        &self.tasks
    }

    pub fn get(&self, id: &str) -> Option<&TaskDefinition> {
        self.tasks.iter().find(|t| t.id == id)
    }

    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }

    /// Keep only tasks of the given kinds.
    pub fn filter(mut self, kinds: &[TaskKind]) -> Self {
        if kinds.is_empty() {
            return self;
        }
        self.tasks.retain(|t| t.matches_filter(kinds));
        self
    }

    /// A plan with only the named tasks, in plan order.
    pub fn subset(&self, ids: &[String]) -> Self {
        Self { tasks: self.tasks.iter().filter(|t| ids.contains(&t.id)).cloned().collect() }
    }

    /// Ids of the tasks owning any of the changed paths.
    pub fn owners<'a>(&self, paths: impl IntoIterator<Item = &'a Path>) -> Vec<String> {
        let paths: Vec<&Path> = paths.into_iter().collect();
        self.tasks
            .iter()
            .filter(|t| paths.iter().any(|p| t.owns(p)))
            .map(|t| t.id.clone())
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::default_config;

    fn context() -> BuildContext {
        BuildContext::new(default_config(), PathBuf::from("/p"))
    }

    #[test]
    fn test_task_kind_display_and_parse() {
        for kind in TaskKind::ALL {
            assert_eq!(kind.to_string().parse::<TaskKind>().unwrap(), kind);
        }
        let err = "pug".parse::<TaskKind>().unwrap_err();
        assert!(err.contains("templates"));
    }

    #[test]
    fn test_plan_defaults() {
        let plan = TaskPlan::from_context(&context());
        let ids: Vec<_> = plan.tasks().iter().map(|t| t.id.as_str()).collect();
        assert_eq!(ids, vec!["templates", "styles", "scripts", "fonts", "images", "sprite"]);

        let styles = plan.get("styles").unwrap();
        assert_eq!(styles.src_root(), Some(Path::new("/p/src/scss")));
        assert_eq!(styles.dest_root(), Some(Path::new("/p/dist/css")));

        let templates = plan.get("templates").unwrap();
        assert_eq!(templates.sets[0].pattern, "pages/**/*.html");
        assert_eq!(templates.dest_root(), Some(Path::new("/p/dist")));

        let images = plan.get("images").unwrap();
        assert_eq!(images.sets.len(), 2);
        assert_eq!(images.watch.len(), 2);
    }

    #[test]
    fn test_plan_skips_disabled() {
        let mut config = default_config();
        config.sprite.enabled = false;
        config.fonts.enabled = false;
        let plan = TaskPlan::from_context(&BuildContext::new(config, PathBuf::from("/p")));
        assert_eq!(plan.len(), 4);
        assert!(plan.get("sprite").is_none());
    }

    #[test]
    fn test_plan_filter() {
        let ctx = context().with_filter(vec![TaskKind::Styles, TaskKind::Scripts]);
        let plan = TaskPlan::from_context(&ctx);
        assert_eq!(plan.len(), 2);
        assert!(plan.get("styles").is_some());
        assert!(plan.get("scripts").is_some());
    }

    #[test]
    fn test_owners() {
        let plan = TaskPlan::from_context(&context());

        let owners = plan.owners([Path::new("/p/src/scss/base/_vars.scss")]);
        assert_eq!(owners, vec!["styles"]);

        // Partials and layouts re-render pages
        let owners = plan.owners([Path::new("/p/src/templates/layouts/base.html")]);
        assert_eq!(owners, vec!["templates"]);

        let owners = plan.owners([Path::new("/p/src/pic/photo.jpg"), Path::new("/p/src/js/app.js")]);
        assert_eq!(owners, vec!["scripts", "images"]);

        let owners = plan.owners([Path::new("/p/README.md")]);
        assert!(owners.is_empty());
    }

    #[test]
    fn test_subset_keeps_plan_order() {
        let plan = TaskPlan::from_context(&context());
        let subset = plan.subset(&["sprite".to_string(), "styles".to_string()]);
        let ids: Vec<_> = subset.tasks().iter().map(|t| t.id.as_str()).collect();
        assert_eq!(ids, vec!["styles", "sprite"]);
    }
}
