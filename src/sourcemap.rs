//! Source map finalization shared by the style and script tasks.

use crate::config::SourceMapMode;
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use serde_json::Value;
use std::path::{Component, Path, PathBuf};
use thiserror::Error;

/// Error finalizing a source map
#[derive(Debug, Error)]
pub enum SourceMapError {
    #[error("invalid source map JSON: {0}")]
    Json(#[from] serde_json::Error),
    #[error("source map is not a JSON object")]
    NotAnObject,
}

/// Comment syntax used for the `sourceMappingURL` trailer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommentStyle {
    Css,
    Js,
}

impl CommentStyle {
    fn trailer(self, url: &str) -> String {
        match self {
            CommentStyle::Css => format!("/*# sourceMappingURL={} */\n", url),
            CommentStyle::Js => format!("//# sourceMappingURL={}\n", url),
        }
    }
}

/// Compiled output with its map attached per [`SourceMapMode`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Finalized {
    pub code: String,
    /// Separate map file to write, in external mode
    pub map_file: Option<(PathBuf, String)>,
}

/// Path of the external map for an output file (`app.css` → `app.css.map`).
pub fn map_path_for(output: &Path) -> PathBuf {
    let mut name = output.file_name().map(|n| n.to_os_string()).unwrap_or_default();
    name.push(".map");
    output.with_file_name(name)
}

/// Relative path from `from_dir` to `to`, with forward slashes.
///
/// Both paths must be absolute or both relative to the same base.
pub fn relative_path(from_dir: &Path, to: &Path) -> String {
    let from: Vec<Component> = from_dir.components().collect();
    let target: Vec<Component> = to.components().collect();
    let common = from.iter().zip(target.iter()).take_while(|(a, b)| a == b).count();

    let mut parts: Vec<String> = Vec::new();
    parts.extend(std::iter::repeat("..".to_string()).take(from.len() - common));
    parts.extend(target[common..].iter().map(|c| c.as_os_str().to_string_lossy().into_owned()));
    parts.join("/")
}

/// One `sources` entry with its embedded text.
#[derive(Debug, Clone, Copy)]
pub struct MapSource<'a> {
    pub path: &'a Path,
    pub content: &'a str,
}

impl<'a> MapSource<'a> {
    pub fn new(path: &'a Path, content: &'a str) -> Self {
        Self { path, content }
    }
}

/// Point a generated map at its sources.
///
/// `sources` is replaced in order, so the first entry takes source index 0
/// of the existing mappings. Paths are relative to the directory the map is
/// served from (the output's directory), `sourcesContent` embeds each text,
/// and `file` names the output.
pub fn relink(
    map_json: &str,
    output: &Path,
    sources: &[MapSource<'_>],
) -> Result<String, SourceMapError> {
    let mut map: Value = serde_json::from_str(map_json)?;
    let object = map.as_object_mut().ok_or(SourceMapError::NotAnObject)?;

    let map_dir = output.parent().unwrap_or_else(|| Path::new(""));
    let paths: Vec<String> = sources.iter().map(|s| relative_path(map_dir, s.path)).collect();
    let contents: Vec<String> = sources.iter().map(|s| s.content.to_string()).collect();
    object.insert("sources".into(), Value::from(paths));
    object.insert("sourcesContent".into(), Value::from(contents));
    if let Some(name) = output.file_name() {
        object.insert("file".into(), Value::from(name.to_string_lossy().into_owned()));
    }

    Ok(serde_json::to_string(&map)?)
}

/// Attach a finalized map to compiled code.
pub fn attach(
    mut code: String,
    output: &Path,
    map_json: String,
    mode: SourceMapMode,
    style: CommentStyle,
) -> Finalized {
    if !code.is_empty() && !code.ends_with('\n') {
        code.push('\n');
    }
    match mode {
        SourceMapMode::None => Finalized { code, map_file: None },
        SourceMapMode::Inline => {
            let url = format!("data:application/json;charset=utf-8;base64,{}", STANDARD.encode(map_json));
            code.push_str(&style.trailer(&url));
            Finalized { code, map_file: None }
        }
        SourceMapMode::External => {
            let map_path = map_path_for(output);
            let url = map_path
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_default();
            code.push_str(&style.trailer(&url));
            Finalized { code, map_file: Some((map_path, map_json)) }
        }
    }
}
