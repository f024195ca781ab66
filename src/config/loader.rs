//! Configuration loading and discovery for `assetline.toml`
//!
//! Provides functions to find, load, and merge configuration.

use super::schema::{
    AssetConfig, FontsConfig, ImagesConfig, ProjectConfig, ScriptsConfig, ServeConfig,
    SpriteConfig, StylesConfig, TemplatesConfig, WatchConfig,
};
use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Name of the project configuration file.
pub const CONFIG_FILE: &str = "assetline.toml";

/// Configuration loading error
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum ConfigError {
    /// File I/O error
    #[error("Failed to read config: {0}")]
    Io(#[from] std::io::Error),
    /// TOML parsing error
    #[error("Failed to parse assetline.toml: {0}")]
    Parse(#[from] toml::de::Error),
    /// Validation error
    #[error("Config validation failed:\n{}", .0.iter().map(|e| format!("  - {}", e)).collect::<Vec<_>>().join("\n"))]
    Validation(Vec<String>),
}

/// CLI arguments that can override config values
#[derive(Debug, Default, Clone)]
pub struct CliOverrides {
    /// Override output root
    pub out: Option<PathBuf>,
    /// Override source root
    pub src: Option<PathBuf>,
    /// Override dev server host
    pub host: Option<String>,
    /// Override dev server port
    pub port: Option<u16>,
    /// Enable or disable live reload
    pub live_reload: Option<bool>,
}

/// Find assetline.toml by walking up from the current working directory.
pub fn find_config() -> Option<PathBuf> {
    env::current_dir().ok().and_then(find_config_from)
}

/// Find assetline.toml by walking up from a specific directory.
pub fn find_config_from(start: PathBuf) -> Option<PathBuf> {
    let mut current = start;

    loop {
        let config_path = current.join(CONFIG_FILE);
        if config_path.exists() {
            return Some(config_path);
        }

        if !current.pop() {
            return None;
        }
    }
}

/// Load configuration from an assetline.toml file.
///
/// If a path is provided, loads from that file. Otherwise, uses `find_config()`
/// to locate the config file. If no config file is found, returns a default
/// configuration.
pub fn load_config(path: Option<&Path>) -> Result<AssetConfig, ConfigError> {
    let config_path = match path {
        Some(p) => Some(p.to_path_buf()),
        None => find_config(),
    };

    match config_path {
        Some(p) => load_config_file(&p),
        None => Ok(default_config()),
    }
}

/// Load configuration from a specific file path.
fn load_config_file(path: &Path) -> Result<AssetConfig, ConfigError> {
    let contents = fs::read_to_string(path)?;
    let config: AssetConfig = toml::from_str(&contents)?;
    ensure_valid(&config)?;
    Ok(config)
}

/// Run validation and turn the collected problems into a single error.
pub fn ensure_valid(config: &AssetConfig) -> Result<(), ConfigError> {
    let errors = config.validate();
    if errors.is_empty() {
        Ok(())
    } else {
        Err(ConfigError::Validation(errors.into_iter().map(|e| e.to_string()).collect()))
    }
}

/// Create a default configuration when no assetline.toml is found.
///
/// The project name is taken from the current directory name.
pub fn default_config() -> AssetConfig {
    let project_name = env::current_dir()
        .ok()
        .and_then(|p| p.file_name().map(|n| n.to_string_lossy().into_owned()))
        .unwrap_or_else(|| "site".to_string());

    AssetConfig {
        project: ProjectConfig {
            name: project_name,
            src: PathBuf::from("src"),
            out: PathBuf::from("dist"),
        },
        templates: TemplatesConfig::default(),
        styles: StylesConfig::default(),
        scripts: ScriptsConfig::default(),
        fonts: FontsConfig::default(),
        images: ImagesConfig::default(),
        sprite: SpriteConfig::default(),
        serve: ServeConfig::default(),
        watch: WatchConfig::default(),
    }
}

/// Merge CLI overrides into a configuration.
///
/// CLI arguments take precedence over config file values.
pub fn merge_cli_overrides(config: &mut AssetConfig, overrides: &CliOverrides) {
    if let Some(ref out) = overrides.out {
        config.project.out = out.clone();
    }
    if let Some(ref src) = overrides.src {
        config.project.src = src.clone();
    }
    if let Some(ref host) = overrides.host {
        config.serve.host = host.clone();
    }
    if let Some(port) = overrides.port {
        config.serve.port = port;
    }
    if let Some(live_reload) = overrides.live_reload {
        config.serve.live_reload = live_reload;
    }
}

/// Resolve a path relative to the project root.
///
/// If the path is absolute, returns it unchanged.
/// If relative, joins it with the project root.
pub fn resolve_path(project_root: &Path, path: &Path) -> PathBuf {
    if path.is_absolute() {
        path.to_path_buf()
    } else {
        project_root.join(path)
    }
}
