//! Script linting and minification
//!
//! Lint findings never stop the task; a syntax error does, since nothing
//! can be minified from it.

use super::{write_output, TaskError, TaskOutcome};
use crate::build::{discover_files, mirror_path, BuildContext, FileError, TaskDefinition};
use crate::config::{ScriptsConfig, SourceMapMode};
use crate::lint::{LintFinding, Linter};
use crate::sourcemap::{self, CommentStyle, MapSource};
use oxc_allocator::Allocator;
use oxc_codegen::{Codegen, CodegenOptions};
use oxc_minifier::{CompressOptions, MangleOptions, Minifier, MinifierOptions};
use oxc_parser::Parser;
use oxc_span::SourceType;
use std::fs;
use std::path::{Path, PathBuf};

/// Generated code and its raw source map.
struct Generated {
    code: String,
    map: Option<String>,
}

/// Parse, optionally minify, and print one script.
fn generate(source: &Path, text: &str, config: &ScriptsConfig) -> Result<Generated, TaskError> {
    let allocator = Allocator::default();
    let source_type = SourceType::from_path(source).unwrap_or_default();
    let ret = Parser::new(&allocator, text, source_type).parse();
    if let Some(error) = ret.errors.first() {
        return Err(TaskError::Script {
            file: source.to_path_buf(),
            message: format!("syntax error: {}", error.message),
        });
    }
    let mut program = ret.program;

    let symbol_table = if config.minify {
        let options = MinifierOptions {
            mangle: config.mangle.then(MangleOptions::default),
            compress: Some(CompressOptions::default()),
        };
        Minifier::new(options).build(&allocator, &mut program).symbol_table
    } else {
        None
    };

    let options = CodegenOptions {
        minify: config.minify,
        source_map_path: (config.source_maps != SourceMapMode::None)
            .then(|| source.to_path_buf()),
        ..CodegenOptions::default()
    };
    let printed = Codegen::new().with_options(options).with_symbol_table(symbol_table).build(&program);

    Ok(Generated { code: printed.code, map: printed.map.map(|map| map.to_json_string()) })
}

fn record_findings(findings: Vec<LintFinding>, outcome: &mut TaskOutcome) {
    for finding in findings {
        if finding.is_error() {
            outcome.errors.push(FileError::with_location(
                &finding.file,
                finding.line,
                finding.column,
                format!("[{}] {}", finding.rule, finding.message),
            ));
        } else {
            outcome.warnings.push(finding.to_string());
        }
    }
}

fn process(
    source: &Path,
    output: &Path,
    config: &ScriptsConfig,
    linter: &Linter,
    outcome: &mut TaskOutcome,
) -> Result<Vec<PathBuf>, TaskError> {
    let text = fs::read_to_string(source).map_err(TaskError::io(source))?;
    record_findings(linter.lint(source, &text), outcome);

    let generated = generate(source, &text, config)?;
    let mut written = vec![output.to_path_buf()];

    let code = match generated.map {
        Some(map) if config.source_maps != SourceMapMode::None => {
            let map = sourcemap::relink(&map, output, &[MapSource::new(source, &text)])
                .map_err(|e| TaskError::SourceMap { file: source.to_path_buf(), source: e })?;
            let finalized =
                sourcemap::attach(generated.code, output, map, config.source_maps, CommentStyle::Js);
            if let Some((map_path, map_json)) = finalized.map_file {
                write_output(&map_path, map_json)?;
                written.push(map_path);
            }
            finalized.code
        }
        _ => generated.code,
    };

    write_output(output, code)?;
    Ok(written)
}

pub fn run(task: &TaskDefinition, ctx: &BuildContext) -> Result<TaskOutcome, TaskError> {
    let config = &ctx.config().scripts;
    let linter = Linter::new(&config.lint);
    let mut outcome = TaskOutcome::default();

    for set in &task.sets {
        for source in discover_files(&set.root, &set.pattern)? {
            let output = mirror_path(&source, &set.root, &set.dest, None)?;
            outcome.sources.push(source.clone());
            let written = process(&source, &output, config, &linter, &mut outcome)?;
            outcome.outputs.extend(written);
        }
    }

    Ok(outcome)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::build::TaskPlan;
    use crate::config::{default_config, AssetConfig, RuleLevel};
    use tempfile::TempDir;

    const ADD: &str = "function add(first, second) {\n  return first + second;\n}\nwindow.total = add(1, 2);\n";

    fn write(root: &Path, rel: &str, content: &str) {
        let path = root.join(rel);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, content).unwrap();
    }

    fn run_with(temp: &TempDir, config: AssetConfig) -> Result<TaskOutcome, TaskError> {
        let ctx = BuildContext::new(config, temp.path().to_path_buf());
        let plan = TaskPlan::from_context(&ctx);
        run(plan.get("scripts").unwrap(), &ctx)
    }

    #[test]
    fn test_minify_mangle_and_external_map() {
        let temp = TempDir::new().unwrap();
        write(&temp.path().join("src/js"), "app.js", ADD);

        let outcome = run_with(&temp, default_config()).unwrap();
        let js_path = temp.path().join("dist/js/app.js");
        let map_path = temp.path().join("dist/js/app.js.map");
        assert_eq!(outcome.outputs, vec![js_path.clone(), map_path.clone()]);

        let js = fs::read_to_string(js_path).unwrap();
        assert!(!js.contains("first"));
        assert!(js.contains("window.total"));
        assert!(js.ends_with("//# sourceMappingURL=app.js.map\n"));

        let map: serde_json::Value =
            serde_json::from_str(&fs::read_to_string(map_path).unwrap()).unwrap();
        assert_eq!(map["sources"][0], "../../src/js/app.js");
        assert_eq!(map["sourcesContent"][0], ADD);
        assert_eq!(map["file"], "app.js");
    }

    #[test]
    fn test_nested_sources_are_mirrored() {
        let temp = TempDir::new().unwrap();
        write(&temp.path().join("src/js"), "vendor/lib.js", "window.lib = 1;\n");

        let mut config = default_config();
        config.scripts.source_maps = SourceMapMode::None;
        let outcome = run_with(&temp, config).unwrap();

        assert_eq!(outcome.outputs, vec![temp.path().join("dist/js/vendor/lib.js")]);
    }

    #[test]
    fn test_without_minify_keeps_names() {
        let temp = TempDir::new().unwrap();
        write(&temp.path().join("src/js"), "app.js", ADD);

        let mut config = default_config();
        config.scripts.minify = false;
        config.scripts.source_maps = SourceMapMode::None;
        run_with(&temp, config).unwrap();

        let js = fs::read_to_string(temp.path().join("dist/js/app.js")).unwrap();
        assert!(js.contains("first + second"));
        assert!(!js.contains("sourceMappingURL"));
    }

    #[test]
    fn test_lint_findings_do_not_block() {
        let temp = TempDir::new().unwrap();
        write(&temp.path().join("src/js"), "app.js", "var a = 1;\ndebugger;\nwindow.a = a;\n");

        let outcome = run_with(&temp, default_config()).unwrap();
        assert!(temp.path().join("dist/js/app.js").exists());

        assert_eq!(outcome.errors.len(), 1);
        assert_eq!(outcome.errors[0].line, Some(2));
        assert!(outcome.errors[0].message.contains("no-debugger"));

        assert_eq!(outcome.warnings.len(), 1);
        assert!(outcome.warnings[0].contains("[no-var]"));
    }

    #[test]
    fn test_rule_levels_from_config() {
        let temp = TempDir::new().unwrap();
        write(&temp.path().join("src/js"), "app.js", "debugger;\n");

        let mut config = default_config();
        config.scripts.lint.rules.insert("no-debugger".to_string(), RuleLevel::Off);
        let outcome = run_with(&temp, config).unwrap();
        assert!(outcome.errors.is_empty());
        assert!(outcome.warnings.is_empty());
    }

    #[test]
    fn test_syntax_error_fails_task() {
        let temp = TempDir::new().unwrap();
        write(&temp.path().join("src/js"), "broken.js", "function (\n");

        let err = run_with(&temp, default_config()).unwrap_err();
        assert!(matches!(err, TaskError::Script { .. }));
        assert!(err.to_string().contains("broken.js"));
        assert!(!temp.path().join("dist/js/broken.js").exists());
    }
}
