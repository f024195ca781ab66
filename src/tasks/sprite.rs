//! SVG symbol sprite
//!
//! Every icon becomes a `<symbol>` in one document, keyed by its file stem.

use super::{write_output, TaskError, TaskOutcome};
use crate::build::{discover_files, BuildContext, TaskDefinition};
use crate::config::SpriteConfig;
use crate::svg::{self, Element, Node, SVG_NAMESPACE};
use std::collections::HashSet;
use std::fs;
use std::path::Path;

const XLINK_NAMESPACE: &str = "http://www.w3.org/1999/xlink";

fn uses_xlink(element: &Element) -> bool {
    element.attributes.iter().any(|(k, _)| k.starts_with("xlink:"))
        || element.elements().any(uses_xlink)
}

/// Turn one icon document into a symbol.
fn symbol_from(path: &Path, source: &str, config: &SpriteConfig) -> Result<Element, TaskError> {
    let mut icon =
        svg::parse(source).map_err(|source| TaskError::Svg { file: path.to_path_buf(), source })?;
    svg::strip_editor_data(&mut icon);
    svg::strip(&mut icon, &config.strip_elements, &config.strip_attributes);

    let stem = path.file_stem().map(|s| s.to_string_lossy()).unwrap_or_default();
    let mut symbol = Element::new("symbol");
    symbol.set_attr("id", &format!("{}{}", config.id_prefix, stem));
    if let Some(view_box) = icon.view_box() {
        symbol.set_attr("viewBox", &view_box);
    }
    symbol.children = icon.children;
    Ok(symbol)
}

pub fn run(task: &TaskDefinition, ctx: &BuildContext) -> Result<TaskOutcome, TaskError> {
    let config = &ctx.config().sprite;
    let mut outcome = TaskOutcome::default();

    for set in &task.sets {
        let icons = discover_files(&set.root, &set.pattern)?;
        if icons.is_empty() {
            continue;
        }

        let mut root = Element::new("svg");
        root.set_attr("xmlns", SVG_NAMESPACE);
        let mut seen = HashSet::new();

        for path in icons {
            let source = fs::read_to_string(&path).map_err(TaskError::io(&path))?;
            let symbol = symbol_from(&path, &source, config)?;
            let id = symbol.attr("id").unwrap_or_default().to_string();
            if !seen.insert(id.clone()) {
                outcome.warnings.push(format!(
                    "{}: duplicate symbol id '{}', icon skipped",
                    path.display(),
                    id
                ));
                continue;
            }
            root.children.push(Node::Element(symbol));
            outcome.sources.push(path);
        }

        if uses_xlink(&root) {
            root.set_attr("xmlns:xlink", XLINK_NAMESPACE);
        }

        let output = set.dest.join(&config.file);
        let markup = svg::write(&root, Some(config.indent))
            .map_err(|source| TaskError::Svg { file: output.clone(), source })?;
        write_output(&output, markup)?;
        tracing::debug!(symbols = seen.len(), output = %output.display(), "sprite written");
        outcome.outputs.push(output);
    }

    Ok(outcome)
}
