//! Configuration schema types for `assetline.toml`
//!
//! Defines the structure and validation rules for an assetline project.
//! Every section is optional; omitted fields fall back to the layout the
//! pipeline has always used (`src/` → `dist/`).

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};

use crate::lint::RULE_NAMES;

/// Severity assigned to a lint rule
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RuleLevel {
    /// Report as an error (fails the task in strict builds)
    Error,
    /// Report as a warning
    Warn,
    /// Rule disabled
    Off,
}

impl Default for RuleLevel {
    fn default() -> Self {
        Self::Warn
    }
}

/// How source maps are emitted next to compiled output
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum SourceMapMode {
    /// Separate `<file>.map` next to the output
    #[default]
    External,
    /// Base64 data URL appended to the output
    Inline,
    /// No source map
    None,
}

/// Project metadata section
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProjectConfig {
    /// Project name (required)
    pub name: String,
    /// Source root
    #[serde(default = "default_src")]
    pub src: PathBuf,
    /// Output root
    #[serde(default = "default_out")]
    pub out: PathBuf,
}

fn default_src() -> PathBuf {
    PathBuf::from("src")
}

fn default_out() -> PathBuf {
    PathBuf::from("dist")
}

fn default_true() -> bool {
    true
}

/// Page template settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TemplatesConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,
    /// Template directory, relative to the source root
    #[serde(default = "default_templates_dir")]
    pub dir: PathBuf,
    /// Glob of rendered pages, relative to `dir`
    #[serde(default = "default_pages")]
    pub pages: String,
    /// Glob of every loadable template (layouts and partials included)
    #[serde(default = "default_templates_pattern")]
    pub pattern: String,
    /// Output directory, relative to the output root
    #[serde(default = "default_templates_dest")]
    pub dest: PathBuf,
    /// Tidy whitespace of rendered markup
    #[serde(default = "default_true")]
    pub pretty: bool,
    /// Global variables available to every page
    #[serde(default)]
    pub data: toml::Table,
}

fn default_templates_dir() -> PathBuf {
    PathBuf::from("templates")
}

fn default_pages() -> String {
    "pages/**/*.html".to_string()
}

fn default_templates_pattern() -> String {
    "**/*.html".to_string()
}

fn default_templates_dest() -> PathBuf {
    PathBuf::from(".")
}

impl Default for TemplatesConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            dir: default_templates_dir(),
            pages: default_pages(),
            pattern: default_templates_pattern(),
            dest: default_templates_dest(),
            pretty: true,
            data: toml::Table::new(),
        }
    }
}

/// Style sheet settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StylesConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(default = "default_styles_dir")]
    pub dir: PathBuf,
    #[serde(default = "default_styles_pattern")]
    pub pattern: String,
    #[serde(default = "default_styles_dest")]
    pub dest: PathBuf,
    /// Normalize vendor prefixes against `browsers`
    #[serde(default = "default_true")]
    pub postprocess: bool,
    /// Browserslist queries used by post-processing
    #[serde(default = "default_browsers")]
    pub browsers: Vec<String>,
    /// Minify output. With `postprocess` on, rules are still merged when this is off.
    #[serde(default = "default_true")]
    pub minify: bool,
    #[serde(default)]
    pub source_maps: SourceMapMode,
}

fn default_styles_dir() -> PathBuf {
    PathBuf::from("scss")
}

fn default_styles_pattern() -> String {
    "**/*.scss".to_string()
}

fn default_styles_dest() -> PathBuf {
    PathBuf::from("css")
}

fn default_browsers() -> Vec<String> {
    vec![
        "chrome >= 110".to_string(),
        "edge >= 110".to_string(),
        "firefox >= 110".to_string(),
        "safari >= 16".to_string(),
    ]
}

impl Default for StylesConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            dir: default_styles_dir(),
            pattern: default_styles_pattern(),
            dest: default_styles_dest(),
            postprocess: true,
            browsers: default_browsers(),
            minify: true,
            source_maps: SourceMapMode::default(),
        }
    }
}

/// Script lint settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LintConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,
    /// Per-rule severity overrides
    #[serde(default)]
    pub rules: BTreeMap<String, RuleLevel>,
}

impl Default for LintConfig {
    fn default() -> Self {
        Self { enabled: true, rules: BTreeMap::new() }
    }
}

/// Script settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScriptsConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(default = "default_scripts_dir")]
    pub dir: PathBuf,
    #[serde(default = "default_scripts_pattern")]
    pub pattern: String,
    #[serde(default = "default_scripts_dest")]
    pub dest: PathBuf,
    #[serde(default = "default_true")]
    pub minify: bool,
    /// Rename local bindings while minifying
    #[serde(default = "default_true")]
    pub mangle: bool,
    #[serde(default)]
    pub source_maps: SourceMapMode,
    #[serde(default)]
    pub lint: LintConfig,
}

fn default_scripts_dir() -> PathBuf {
    PathBuf::from("js")
}

fn default_scripts_pattern() -> String {
    "**/*.js".to_string()
}

fn default_scripts_dest() -> PathBuf {
    PathBuf::from("js")
}

impl Default for ScriptsConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            dir: default_scripts_dir(),
            pattern: default_scripts_pattern(),
            dest: default_scripts_dest(),
            minify: true,
            mangle: true,
            source_maps: SourceMapMode::default(),
            lint: LintConfig::default(),
        }
    }
}

/// Font copy settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FontsConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(default = "default_fonts_dir")]
    pub dir: PathBuf,
    #[serde(default = "default_any_pattern")]
    pub pattern: String,
    #[serde(default = "default_fonts_dir")]
    pub dest: PathBuf,
}

fn default_fonts_dir() -> PathBuf {
    PathBuf::from("fonts")
}

fn default_any_pattern() -> String {
    "**/*".to_string()
}

impl Default for FontsConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            dir: default_fonts_dir(),
            pattern: default_any_pattern(),
            dest: default_fonts_dir(),
        }
    }
}

/// One image source directory and where its optimized copies go
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImageSetConfig {
    pub name: String,
    pub src: PathBuf,
    pub dest: PathBuf,
    #[serde(default = "default_any_pattern")]
    pub pattern: String,
}

impl ImageSetConfig {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            src: PathBuf::from(name),
            dest: PathBuf::from(name),
            pattern: default_any_pattern(),
        }
    }
}

/// Vector image simplification options
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SvgOptions {
    /// Drop a viewBox that only restates width/height
    #[serde(default = "default_true")]
    pub remove_viewbox: bool,
    /// Drop ids nothing references
    #[serde(default)]
    pub cleanup_ids: bool,
}

impl Default for SvgOptions {
    fn default() -> Self {
        Self { remove_viewbox: true, cleanup_ids: false }
    }
}

/// Image optimization settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ImagesConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(default = "default_image_sets")]
    pub sets: Vec<ImageSetConfig>,
    /// JPEG re-encode quality (1-100). Re-encoded JPEGs are baseline, not progressive.
    #[serde(default = "default_jpeg_quality")]
    pub jpeg_quality: u8,
    /// PNG optimization preset (0-6)
    #[serde(default = "default_png_level")]
    pub png_level: u8,
    #[serde(default)]
    pub svg: SvgOptions,
}

fn default_image_sets() -> Vec<ImageSetConfig> {
    vec![ImageSetConfig::new("images"), ImageSetConfig::new("pic")]
}

fn default_jpeg_quality() -> u8 {
    75
}

fn default_png_level() -> u8 {
    5
}

impl Default for ImagesConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            sets: default_image_sets(),
            jpeg_quality: default_jpeg_quality(),
            png_level: default_png_level(),
            svg: SvgOptions::default(),
        }
    }
}

/// SVG sprite settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SpriteConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(default = "default_sprite_dir")]
    pub dir: PathBuf,
    #[serde(default = "default_sprite_pattern")]
    pub pattern: String,
    #[serde(default = "default_sprite_dest")]
    pub dest: PathBuf,
    /// Sprite file name inside `dest`
    #[serde(default = "default_sprite_file")]
    pub file: String,
    /// Prefix prepended to every symbol id
    #[serde(default)]
    pub id_prefix: String,
    #[serde(default = "default_indent")]
    pub indent: usize,
    #[serde(default = "default_strip_elements")]
    pub strip_elements: Vec<String>,
    #[serde(default = "default_strip_attributes")]
    pub strip_attributes: Vec<String>,
}

fn default_sprite_dir() -> PathBuf {
    PathBuf::from("svg")
}

fn default_sprite_pattern() -> String {
    "**/*.svg".to_string()
}

fn default_sprite_dest() -> PathBuf {
    PathBuf::from("pic")
}

fn default_sprite_file() -> String {
    "sprite.svg".to_string()
}

fn default_indent() -> usize {
    2
}

fn default_strip_elements() -> Vec<String> {
    vec!["title".to_string(), "desc".to_string()]
}

fn default_strip_attributes() -> Vec<String> {
    ["fill", "stroke", "style", "class"].iter().map(|s| s.to_string()).collect()
}

impl Default for SpriteConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            dir: default_sprite_dir(),
            pattern: default_sprite_pattern(),
            dest: default_sprite_dest(),
            file: default_sprite_file(),
            id_prefix: String::new(),
            indent: default_indent(),
            strip_elements: default_strip_elements(),
            strip_attributes: default_strip_attributes(),
        }
    }
}

/// Development server settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServeConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
    /// Inject the reload client and push reload messages
    #[serde(default = "default_true")]
    pub live_reload: bool,
}

fn default_host() -> String {
    "127.0.0.1".to_string()
}

fn default_port() -> u16 {
    3000
}

impl Default for ServeConfig {
    fn default() -> Self {
        Self { host: default_host(), port: default_port(), live_reload: true }
    }
}

/// Watch mode configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WatchConfig {
    /// Debounce delay in milliseconds
    #[serde(default = "default_debounce_ms")]
    pub debounce_ms: u32,
    /// Clear terminal between rebuilds
    #[serde(default)]
    pub clear_screen: bool,
}

fn default_debounce_ms() -> u32 {
    100
}

impl Default for WatchConfig {
    fn default() -> Self {
        Self { debounce_ms: 100, clear_screen: false }
    }
}

/// Complete assetline.toml configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AssetConfig {
    /// Project metadata (required)
    pub project: ProjectConfig,
    #[serde(default)]
    pub templates: TemplatesConfig,
    #[serde(default)]
    pub styles: StylesConfig,
    #[serde(default)]
    pub scripts: ScriptsConfig,
    #[serde(default)]
    pub fonts: FontsConfig,
    #[serde(default)]
    pub images: ImagesConfig,
    #[serde(default)]
    pub sprite: SpriteConfig,
    #[serde(default)]
    pub serve: ServeConfig,
    #[serde(default)]
    pub watch: WatchConfig,
}

/// A single validation problem
#[derive(Debug, Clone)]
pub struct ConfigValidationError {
    /// Dotted path of the offending field
    pub field: String,
    pub message: String,
}

impl std::fmt::Display for ConfigValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

impl AssetConfig {
    /// Validate the configuration and return all errors found.
    pub fn validate(&self) -> Vec<ConfigValidationError> {
        let mut errors = Vec::new();
        let mut error = |field: &str, message: String| {
            errors.push(ConfigValidationError { field: field.to_string(), message });
        };

        if self.project.name.trim().is_empty() {
            error("project.name", "must not be empty".to_string());
        }

        if self.images.jpeg_quality == 0 || self.images.jpeg_quality > 100 {
            error(
                "images.jpeg_quality",
                format!("must be between 1 and 100, got {}", self.images.jpeg_quality),
            );
        }
        if self.images.png_level > 6 {
            error(
                "images.png_level",
                format!("must be between 0 and 6, got {}", self.images.png_level),
            );
        }

        let mut set_names = HashMap::new();
        for (i, set) in self.images.sets.iter().enumerate() {
            if set.name.trim().is_empty() {
                error(&format!("images.sets[{}].name", i), "must not be empty".to_string());
            } else if let Some(first) = set_names.insert(set.name.as_str(), i) {
                error(
                    &format!("images.sets[{}].name", i),
                    format!("'{}' is already used by images.sets[{}]", set.name, first),
                );
            }
        }

        if self.styles.enabled && self.styles.postprocess && self.styles.browsers.is_empty() {
            error("styles.browsers", "post-processing needs at least one query".to_string());
        }

        for rule in self.scripts.lint.rules.keys() {
            if !RULE_NAMES.contains(&rule.as_str()) {
                error(
                    &format!("scripts.lint.rules.{}", rule),
                    format!("unknown rule (available: {})", RULE_NAMES.join(", ")),
                );
            }
        }

        if self.sprite.enabled {
            if self.sprite.indent == 0 {
                error("sprite.indent", "must be greater than 0".to_string());
            }
            if self.sprite.file.trim().is_empty() || self.sprite.file.contains(['/', '\\']) {
                error("sprite.file", "must be a plain file name".to_string());
            }
        }

        if self.serve.port == 0 {
            error("serve.port", "must not be 0".to_string());
        }

        for (field, message) in self.destination_conflicts() {
            error(&field, message);
        }

        errors
    }

    /// Check if the configuration is valid.
    pub fn is_valid(&self) -> bool {
        self.validate().is_empty()
    }

    /// Destination directories owned by directory-mirroring tasks.
    ///
    /// The template task writes markup into the output root and the sprite
    /// task writes a single file, so neither claims a directory here.
    fn owned_destinations(&self) -> Vec<(String, &Path)> {
        let mut owned = Vec::new();
        if self.styles.enabled {
            owned.push(("styles.dest".to_string(), self.styles.dest.as_path()));
        }
        if self.scripts.enabled {
            owned.push(("scripts.dest".to_string(), self.scripts.dest.as_path()));
        }
        if self.fonts.enabled {
            owned.push(("fonts.dest".to_string(), self.fonts.dest.as_path()));
        }
        if self.images.enabled {
            for (i, set) in self.images.sets.iter().enumerate() {
                owned.push((format!("images.sets[{}].dest", i), set.dest.as_path()));
            }
        }
        owned
    }

    fn destination_conflicts(&self) -> Vec<(String, String)> {
        let owned = self.owned_destinations();
        let mut conflicts = Vec::new();

        for (i, (field, dest)) in owned.iter().enumerate() {
            if dest.as_os_str().is_empty() || *dest == Path::new(".") {
                conflicts.push((field.clone(), "must not be the output root".to_string()));
                continue;
            }
            for (other_field, other) in owned.iter().skip(i + 1) {
                if dest.starts_with(other) || other.starts_with(dest) {
                    conflicts.push((
                        field.clone(),
                        format!("overlaps {} ({})", other_field, other.display()),
                    ));
                }
            }
        }

        if self.sprite.enabled {
            for (field, dest) in &owned {
                if !field.starts_with("images.") && self.sprite.dest.starts_with(dest) {
                    conflicts.push((
                        "sprite.dest".to_string(),
                        format!("sprite file would be written inside {}", field),
                    ));
                }
            }
        }

        conflicts
    }
}
