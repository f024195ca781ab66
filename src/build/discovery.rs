//! Source file discovery for the build system.
//!
//! Resolves a task's source globs against its source root and maps every
//! matched source to its mirrored output path.

use glob::{glob, Pattern};
use std::path::{Path, PathBuf};

/// Error during source discovery.
#[derive(Debug)]
pub enum DiscoveryError {
    /// Invalid glob pattern
    InvalidPattern(String, glob::PatternError),
    /// Source path outside of its declared root
    OutsideRoot(PathBuf),
    /// IO error during file enumeration
    Io(std::io::Error),
}

impl std::fmt::Display for DiscoveryError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DiscoveryError::InvalidPattern(pattern, err) => {
                write!(f, "Invalid glob pattern '{}': {}", pattern, err)
            }
            DiscoveryError::OutsideRoot(path) => {
                write!(f, "Source {} is outside of its source root", path.display())
            }
            DiscoveryError::Io(err) => write!(f, "IO error during discovery: {}", err),
        }
    }
}

impl std::error::Error for DiscoveryError {}

impl From<std::io::Error> for DiscoveryError {
    fn from(err: std::io::Error) -> Self {
        DiscoveryError::Io(err)
    }
}

/// Join a literal directory and a glob pattern into one pattern string.
///
/// Glob metacharacters in the directory are escaped.
pub fn rooted_pattern(root: &Path, pattern: &str) -> String {
    let root = Pattern::escape(&root.to_string_lossy());
    format!("{}/{}", root.trim_end_matches('/'), pattern)
}

/// Discover source files matching a glob pattern.
///
/// # Arguments
/// - `base_dir` - Base directory to resolve patterns from
/// - `pattern` - Glob pattern to match
///
/// # Returns
/// Matching regular files, sorted. A missing base directory yields nothing.
pub fn discover_files(base_dir: &Path, pattern: &str) -> Result<Vec<PathBuf>, DiscoveryError> {
    let full_pattern = rooted_pattern(base_dir, pattern);

    let paths =
        glob(&full_pattern).map_err(|e| DiscoveryError::InvalidPattern(pattern.to_string(), e))?;

    let mut files = Vec::new();
    for entry in paths {
        match entry {
            Ok(path) => {
                if path.is_file() {
                    files.push(path);
                }
            }
            Err(e) => {
                // Unreadable entries are skipped
                tracing::warn!(error = %e, "error reading path during discovery");
            }
        }
    }

    files.sort();
    Ok(files)
}

/// Output path for `source`: `dest_root / relative(source, src_root)`, with
/// the extension optionally replaced.
pub fn mirror_path(
    source: &Path,
    src_root: &Path,
    dest_root: &Path,
    extension: Option<&str>,
) -> Result<PathBuf, DiscoveryError> {
    let relative = source
        .strip_prefix(src_root)
        .map_err(|_| DiscoveryError::OutsideRoot(source.to_path_buf()))?;
    let mut output = dest_root.join(relative);
    if let Some(ext) = extension {
        output.set_extension(ext);
    }
    Ok(output)
}
