//! Image optimization over every configured image set.
//!
//! Sets and the files inside them are processed on the rayon pool. All sets
//! are joined before the first failure (in set order) is returned.

use super::{write_output, TaskError, TaskOutcome};
use crate::build::{discover_files, mirror_path, BuildContext, SourceSet, TaskDefinition};
use crate::config::ImagesConfig;
use crate::svg;
use image::codecs::jpeg::JpegEncoder;
use image::{ColorType, ImageFormat};
use rayon::prelude::*;
use std::fs;
use std::path::{Path, PathBuf};

/// How a file is treated, by extension.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImageKind {
    Jpeg,
    Png,
    Svg,
    /// GIFs and anything unrecognized
    Verbatim,
}

impl ImageKind {
    pub fn from_path(path: &Path) -> Self {
        let ext = path.extension().and_then(|e| e.to_str()).map(|e| e.to_ascii_lowercase());
        match ext.as_deref() {
            Some("jpg" | "jpeg") => ImageKind::Jpeg,
            Some("png") => ImageKind::Png,
            Some("svg") => ImageKind::Svg,
            _ => ImageKind::Verbatim,
        }
    }
}

fn image_error(path: &Path, message: impl ToString) -> TaskError {
    TaskError::Image { file: path.to_path_buf(), message: message.to_string() }
}

/// Baseline encoding at `quality`.
fn reencode_jpeg(data: &[u8], quality: u8) -> Result<Vec<u8>, String> {
    let decoded =
        image::load_from_memory_with_format(data, ImageFormat::Jpeg).map_err(|e| e.to_string())?;
    let rgb = decoded.to_rgb8();
    let mut out = Vec::new();
    JpegEncoder::new_with_quality(&mut out, quality.clamp(1, 100))
        .encode(rgb.as_raw(), rgb.width(), rgb.height(), ColorType::Rgb8)
        .map_err(|e| e.to_string())?;
    Ok(out)
}

fn reencode_png(data: &[u8], level: u8) -> Result<Vec<u8>, String> {
    oxipng::optimize_from_memory(data, &oxipng::Options::from_preset(level.min(6)))
        .map_err(|e| e.to_string())
}

/// Optimized bytes for one file. Re-encoded rasters are kept only when
/// smaller than the source.
pub fn optimize_bytes(path: &Path, data: Vec<u8>, config: &ImagesConfig) -> Result<Vec<u8>, TaskError> {
    let smaller = |candidate: Vec<u8>, original: Vec<u8>| {
        if candidate.len() < original.len() {
            candidate
        } else {
            original
        }
    };

    match ImageKind::from_path(path) {
        ImageKind::Jpeg => {
            let encoded = reencode_jpeg(&data, config.jpeg_quality).map_err(|e| image_error(path, e))?;
            Ok(smaller(encoded, data))
        }
        ImageKind::Png => {
            let encoded = reencode_png(&data, config.png_level).map_err(|e| image_error(path, e))?;
            Ok(smaller(encoded, data))
        }
        ImageKind::Svg => {
            let text = String::from_utf8(data).map_err(|e| image_error(path, e))?;
            let optimized = svg::optimize(&text, config.svg)
                .map_err(|source| TaskError::Svg { file: path.to_path_buf(), source })?;
            Ok(optimized.into_bytes())
        }
        ImageKind::Verbatim => Ok(data),
    }
}

fn optimize_file(
    source: &Path,
    set: &SourceSet,
    config: &ImagesConfig,
) -> Result<PathBuf, TaskError> {
    let output = mirror_path(source, &set.root, &set.dest, None)?;
    let data = fs::read(source).map_err(TaskError::io(source))?;
    let before = data.len();
    let bytes = optimize_bytes(source, data, config)?;
    tracing::debug!(
        file = %source.display(),
        before,
        after = bytes.len(),
        "optimized"
    );
    write_output(&output, bytes)?;
    Ok(output)
}

fn run_set(set: &SourceSet, config: &ImagesConfig) -> Result<TaskOutcome, TaskError> {
    let sources = discover_files(&set.root, &set.pattern)?;
    let outputs = sources
        .par_iter()
        .map(|source| optimize_file(source, set, config))
        .collect::<Result<Vec<_>, _>>()?;
    tracing::debug!(set = %set.name, files = outputs.len(), "image set done");
    Ok(TaskOutcome { sources, outputs, ..TaskOutcome::default() })
}

pub fn run(task: &TaskDefinition, ctx: &BuildContext) -> Result<TaskOutcome, TaskError> {
    let config = &ctx.config().images;
    let results: Vec<Result<TaskOutcome, TaskError>> =
        task.sets.par_iter().map(|set| run_set(set, config)).collect();

    let mut outcome = TaskOutcome::default();
    let mut first_error = None;
    for result in results {
        match result {
            Ok(set_outcome) => outcome.merge(set_outcome),
            Err(error) => {
                if first_error.is_none() {
                    first_error = Some(error);
                } else {
                    tracing::error!("{}", error);
                }
            }
        }
    }

    match first_error {
        Some(error) => Err(error),
        None => Ok(outcome),
    }
}
