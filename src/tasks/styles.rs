//! Style sheet compilation
//!
//! SCSS is compiled with `grass`; the resulting CSS goes through
//! `lightningcss` for vendor-prefix normalization, minification and the
//! source map. A file that fails to compile is recorded and skipped.
//!
//! `grass` emits no source map, so style maps point at the compiled CSS
//! (`app.scss.css`, embedded) and list the `.scss` after it for reference.

use super::{write_output, TaskError, TaskOutcome};
use crate::build::{discover_files, mirror_path, BuildContext, FileError, TaskDefinition};
use crate::config::{SourceMapMode, StylesConfig};
use crate::sourcemap::{self, CommentStyle, MapSource};
use lightningcss::properties::{Property, PropertyId};
use lightningcss::rules::{CssRule, CssRuleList};
use lightningcss::stylesheet::{MinifyOptions, ParserOptions, PrinterOptions, StyleSheet};
use lightningcss::targets::{Browsers, Targets};
use lightningcss::traits::IntoOwned;
use lightningcss::vendor_prefix::VendorPrefix;
use parcel_sourcemap::SourceMap;
use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};

/// Legacy flexbox properties, which have no standard spelling.
const PREFIX_ONLY: &[&str] = &[
    "box-orient",
    "box-direction",
    "box-ordinal-group",
    "box-align",
    "box-flex",
    "box-flex-group",
    "box-pack",
    "box-lines",
    "flex-pack",
    "flex-order",
    "flex-align",
    "flex-item-align",
    "flex-line-pack",
    "flex-positive",
    "flex-negative",
    "flex-preferred-size",
];

/// Files starting with `_` are only ever imported.
pub fn is_partial(path: &Path) -> bool {
    path.file_name().and_then(|n| n.to_str()).is_some_and(|n| n.starts_with('_'))
}

/// Resolve browserslist queries into lightningcss targets.
pub fn resolve_targets(config: &StylesConfig) -> Result<Targets, TaskError> {
    if !config.postprocess {
        return Ok(Targets::default());
    }
    let browsers = Browsers::from_browserslist(config.browsers.iter().map(String::as_str))
        .map_err(|e| TaskError::Browsers(e.to_string()))?;
    Ok(Targets { browsers, ..Targets::default() })
}

/// Find `line:column` in a compiler message (e.g. `app.scss 3:12  root stylesheet`).
fn location_in(message: &str) -> Option<(usize, usize)> {
    message.lines().rev().find_map(|line| {
        line.split_whitespace().find_map(|token| {
            let (line, column) = token.split_once(':')?;
            Some((line.parse().ok()?, column.parse().ok()?))
        })
    })
}

fn compile_error(source: &Path, message: String) -> FileError {
    let headline = message
        .lines()
        .next()
        .unwrap_or_default()
        .trim_start_matches("Error: ")
        .to_string();
    match location_in(&message) {
        Some((line, column)) => FileError::with_location(source, line, column, headline),
        None => FileError::new(source, headline),
    }
}

fn is_prefixed(prefix: VendorPrefix) -> bool {
    !prefix.is_empty() && !prefix.contains(VendorPrefix::None)
}

/// The same declaration under its standard name, or `None` if the value
/// does not parse there.
fn unprefixed<'i>(property: &Property<'i>, id: PropertyId<'i>) -> Option<Property<'i>> {
    let value = property.value_to_css_string(PrinterOptions::default()).ok()?;
    let parsed =
        Property::parse_string(id.with_prefix(VendorPrefix::None), &value, ParserOptions::default()).ok()?;
    Some(parsed.into_owned())
}

fn unprefix_block(declarations: &mut [Property<'_>]) {
    let standard: HashSet<String> = declarations
        .iter()
        .map(Property::property_id)
        .filter(|id| !is_prefixed(id.prefix()))
        .map(|id| id.name().to_string())
        .collect();

    for property in declarations.iter_mut() {
        let id = property.property_id();
        if !is_prefixed(id.prefix()) || standard.contains(id.name()) || PREFIX_ONLY.contains(&id.name()) {
            continue;
        }
        if let Some(rewritten) = unprefixed(property, id) {
            *property = rewritten;
        }
    }
}

/// Move prefixed declarations without a standard twin in their block to the
/// standard property. Minifying against the targets adds back any prefix the
/// targets still need.
fn unprefix_lone(rules: &mut CssRuleList<'_>) {
    for rule in rules.0.iter_mut() {
        match rule {
            CssRule::Style(style) => {
                unprefix_block(&mut style.declarations.declarations);
                unprefix_block(&mut style.declarations.important_declarations);
                unprefix_lone(&mut style.rules);
            }
            CssRule::Media(media) => unprefix_lone(&mut media.rules),
            CssRule::Supports(supports) => unprefix_lone(&mut supports.rules),
            _ => {}
        }
    }
}

/// Name the compiled CSS is embedded under in the map (`app.scss.css`).
fn compiled_path(source: &Path) -> PathBuf {
    let mut name = source.file_name().map(|n| n.to_os_string()).unwrap_or_default();
    name.push(".css");
    source.with_file_name(name)
}

enum Failure {
    /// Recorded against the file; the task moves on
    File(FileError),
    /// Ends the task run
    Task(TaskError),
}

impl From<TaskError> for Failure {
    fn from(error: TaskError) -> Self {
        Failure::Task(error)
    }
}

/// Compile one sheet and write its outputs.
fn compile(
    source: &Path,
    output: &Path,
    load_path: &Path,
    config: &StylesConfig,
    targets: Targets,
) -> Result<Vec<PathBuf>, Failure> {
    let scss = fs::read_to_string(source).map_err(TaskError::io(source))?;

    let options = grass::Options::default().style(grass::OutputStyle::Expanded).load_path(load_path);
    let css = grass::from_path(source, &options)
        .map_err(|e| Failure::File(compile_error(source, e.to_string())))?;

    let filename = source.to_string_lossy().into_owned();
    let wants_map = config.source_maps != SourceMapMode::None;
    let mut map = SourceMap::new("/");
    if wants_map {
        let index = map.add_source(&filename);
        map.set_source_content(index as usize, &css)
            .map_err(|e| Failure::File(FileError::new(source, e.to_string())))?;
    }

    let printed = {
        let mut sheet =
            StyleSheet::parse(&css, ParserOptions { filename, ..ParserOptions::default() })
                .map_err(|e| {
                    let location = e.loc.as_ref().map(|l| (l.line, l.column));
                    Failure::File(css_error(source, &e.to_string(), location))
                })?;
        if config.postprocess {
            unprefix_lone(&mut sheet.rules);
        }
        // Minifying merges rules; it also applies the prefix targets
        if config.minify || config.postprocess {
            sheet
                .minify(MinifyOptions { targets, ..MinifyOptions::default() })
                .map_err(|e| Failure::File(FileError::new(source, e.to_string())))?;
        }
        sheet
            .to_css(PrinterOptions {
                minify: config.minify,
                source_map: if wants_map { Some(&mut map) } else { None },
                targets,
                ..PrinterOptions::default()
            })
            .map_err(|e| Failure::File(FileError::new(source, e.to_string())))?
    };

    let mut written = Vec::new();
    let code = if wants_map {
        let json = map.to_json(None).map_err(|e| Failure::File(FileError::new(source, e.to_string())))?;
        let compiled = compiled_path(source);
        let sources = [MapSource::new(&compiled, &css), MapSource::new(source, &scss)];
        let json = sourcemap::relink(&json, output, &sources).map_err(|e| {
            Failure::Task(TaskError::SourceMap { file: source.to_path_buf(), source: e })
        })?;
        let finalized =
            sourcemap::attach(printed.code, output, json, config.source_maps, CommentStyle::Css);
        if let Some((map_path, map_json)) = finalized.map_file {
            write_output(&map_path, map_json)?;
            written.push(map_path);
        }
        finalized.code
    } else {
        printed.code
    };

    write_output(output, code)?;
    written.insert(0, output.to_path_buf());
    Ok(written)
}

fn css_error(source: &Path, message: &str, location: Option<(u32, u32)>) -> FileError {
    match location {
        Some((line, column)) => {
            FileError::with_location(source, line as usize + 1, column as usize, message)
        }
        None => FileError::new(source, message),
    }
}

pub fn run(task: &TaskDefinition, ctx: &BuildContext) -> Result<TaskOutcome, TaskError> {
    let config = &ctx.config().styles;
    let targets = resolve_targets(config)?;
    let mut outcome = TaskOutcome::default();

    for set in &task.sets {
        for source in discover_files(&set.root, &set.pattern)? {
            if is_partial(&source) {
                continue;
            }
            let output = mirror_path(&source, &set.root, &set.dest, Some("css"))?;
            outcome.sources.push(source.clone());

            match compile(&source, &output, &set.root, config, targets) {
                Ok(files) => outcome.outputs.extend(files),
                Err(Failure::File(error)) => outcome.errors.push(error),
                Err(Failure::Task(error)) => return Err(error),
            }
        }
    }

    Ok(outcome)
}
