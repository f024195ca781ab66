//! Page template rendering
//!
//! Every template under the templates directory is loaded so pages can
//! extend layouts and include partials; only pages are rendered.

use super::{error_chain, write_output, TaskError, TaskOutcome};
use crate::build::{discover_files, mirror_path, BuildContext, TaskDefinition};
use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use tera::{Context, Tera};

/// Literal directory prefix of a glob (`pages/**/*.html` → `pages`).
fn glob_base(pattern: &str) -> PathBuf {
    pattern
        .split('/')
        .take_while(|part| !part.contains(['*', '?', '[', '{']))
        .collect()
}

/// Template name for a file: its path relative to the root, `/`-separated.
fn template_name(path: &Path, root: &Path) -> String {
    let relative = path.strip_prefix(root).unwrap_or(path);
    relative.components().map(|c| c.as_os_str().to_string_lossy()).collect::<Vec<_>>().join("/")
}

/// Trim trailing whitespace, collapse blank-line runs, end with one newline.
pub fn tidy(markup: &str) -> String {
    let mut out = String::with_capacity(markup.len());
    let mut blank_run = false;
    for line in markup.trim_start_matches('\n').lines() {
        let line = line.trim_end();
        if line.is_empty() {
            if !blank_run && !out.is_empty() {
                out.push('\n');
            }
            blank_run = true;
            continue;
        }
        blank_run = false;
        out.push_str(line);
        out.push('\n');
    }
    while out.ends_with("\n\n") {
        out.pop();
    }
    out
}

pub fn run(task: &TaskDefinition, ctx: &BuildContext) -> Result<TaskOutcome, TaskError> {
    let config = &ctx.config().templates;
    let mut outcome = TaskOutcome::default();

    for set in &task.sets {
        if !set.root.is_dir() {
            tracing::debug!(dir = %set.root.display(), "no templates directory");
            continue;
        }

        let all = discover_files(&set.root, &config.pattern)?;
        let pages = discover_files(&set.root, &set.pattern)?;
        if pages.is_empty() {
            continue;
        }

        let mut tera = Tera::default();
        let loadable: BTreeSet<&PathBuf> = all.iter().chain(pages.iter()).collect();
        let files: Vec<(PathBuf, Option<String>)> = loadable
            .into_iter()
            .map(|path| (path.clone(), Some(template_name(path, &set.root))))
            .collect();
        tera.add_template_files(files).map_err(|e| TaskError::Template(error_chain(&e)))?;

        let context =
            Context::from_serialize(&config.data).map_err(|e| TaskError::Template(error_chain(&e)))?;
        let pages_root = set.root.join(glob_base(&set.pattern));

        for page in pages {
            let name = template_name(&page, &set.root);
            let html = tera
                .render(&name, &context)
                .map_err(|e| TaskError::Template(format!("{}: {}", name, error_chain(&e))))?;
            let html = if config.pretty { tidy(&html) } else { html };

            let output = mirror_path(&page, &pages_root, &set.dest, Some("html"))?;
            write_output(&output, html)?;
            tracing::debug!(page = %name, output = %output.display(), "rendered");

            outcome.sources.push(page);
            outcome.outputs.push(output);
        }
    }

    Ok(outcome)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::build::TaskPlan;
    use crate::config::default_config;
    use std::fs;
    use tempfile::TempDir;

    fn write(root: &Path, rel: &str, content: &str) {
        let path = root.join(rel);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, content).unwrap();
    }

    fn run_in(temp: &TempDir, config: crate::config::AssetConfig) -> Result<TaskOutcome, TaskError> {
        let ctx = BuildContext::new(config, temp.path().to_path_buf());
        let plan = TaskPlan::from_context(&ctx);
        run(plan.get("templates").unwrap(), &ctx)
    }

    #[test]
    fn test_glob_base() {
        assert_eq!(glob_base("pages/**/*.html"), PathBuf::from("pages"));
        assert_eq!(glob_base("site/en/*.html"), PathBuf::from("site/en"));
        assert_eq!(glob_base("**/*.html"), PathBuf::new());
    }

    #[test]
    fn test_tidy() {
        let input = "\n<html>   \n\n\n  <body>\t\n\n</body>\n</html>\n\n\n";
        assert_eq!(tidy(input), "<html>\n\n  <body>\n\n</body>\n</html>\n");
    }

    #[test]
    fn test_render_pages_with_layout_and_data() {
        let temp = TempDir::new().unwrap();
        let templates = temp.path().join("src/templates");
        write(
            &templates,
            "layouts/base.html",
            "<html>\n<title>{{ title }}</title>\n<body>{% block content %}{% endblock content %}</body>\n</html>\n",
        );
        write(&templates, "partials/nav.html", "<nav>menu</nav>");
        write(
            &templates,
            "pages/index.html",
            "{% extends \"layouts/base.html\" %}{% block content %}{% include \"partials/nav.html\" %}home{% endblock content %}",
        );
        write(&templates, "pages/about/team.html", "<p>{{ title }} team</p>\n\n\n");

        let mut config = default_config();
        config.templates.data.insert("title".to_string(), toml::Value::String("Acme".to_string()));
        let outcome = run_in(&temp, config).unwrap();

        assert_eq!(outcome.outputs.len(), 2);
        let index = fs::read_to_string(temp.path().join("dist/index.html")).unwrap();
        assert!(index.contains("<title>Acme</title>"));
        assert!(index.contains("<nav>menu</nav>home"));

        let team = fs::read_to_string(temp.path().join("dist/about/team.html")).unwrap();
        assert_eq!(team, "<p>Acme team</p>\n");

        // Layouts and partials are never emitted
        assert!(!temp.path().join("dist/layouts").exists());
        assert!(!temp.path().join("dist/partials").exists());
    }

    #[test]
    fn test_render_error_aborts_task() {
        let temp = TempDir::new().unwrap();
        let templates = temp.path().join("src/templates");
        write(&templates, "pages/index.html", "{{ missing_variable }}");

        let err = run_in(&temp, default_config()).unwrap_err();
        assert!(matches!(err, TaskError::Template(_)));
        assert!(err.to_string().contains("index.html"));
    }

    #[test]
    fn test_syntax_error_aborts_task() {
        let temp = TempDir::new().unwrap();
        let templates = temp.path().join("src/templates");
        write(&templates, "pages/index.html", "{% if %}");

        assert!(matches!(run_in(&temp, default_config()), Err(TaskError::Template(_))));
    }

    #[test]
    fn test_not_pretty_keeps_whitespace() {
        let temp = TempDir::new().unwrap();
        write(&temp.path().join("src/templates"), "pages/a.html", "<p>x</p>   \n\n\n");

        let mut config = default_config();
        config.templates.pretty = false;
        run_in(&temp, config).unwrap();

        let out = fs::read_to_string(temp.path().join("dist/a.html")).unwrap();
        assert_eq!(out, "<p>x</p>   \n\n\n");
    }
}
