//! Theme configuration and layered override resolution.
//!
//! A theme's effective configuration is assembled from three layers with a
//! fixed precedence:
//!
//! 1. defaults (derived from `BundlerOptions`)
//! 2. construction-time settings (passed by the caller or the coordinator)
//! 3. the on-disk `{themeName}.config.json` file
//!
//! Later layers win field by field, except for the theme root directory,
//! which is fixed when the theme is constructed and never overridden by the
//! file layer.

use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use themes_runtime::{RuntimeError, StyleRuntime};

use crate::error::{BundlerError, Result};

/// Default debounce window for theme rebuilds.
pub const DEFAULT_DEBOUNCE: Duration = Duration::from_millis(100);

/// Default latency for the filesystem watcher.
pub const DEFAULT_WATCH_LATENCY: Duration = Duration::from_millis(50);

/// Stylesheet family of a theme's member files.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ThemeExtension {
    /// Plain CSS, no transpile step.
    #[default]
    Css,
    /// LESS, transpiled with `lessc`.
    Less,
    /// SCSS, transpiled with grass.
    Scss,
}

impl ThemeExtension {
    /// File extension without the leading dot.
    pub fn as_str(&self) -> &'static str {
        match self {
            ThemeExtension::Css => "css",
            ThemeExtension::Less => "less",
            ThemeExtension::Scss => "scss",
        }
    }

    /// Whether bundles of this family go through an external transpile step.
    pub fn is_transpiled(&self) -> bool {
        !matches!(self, ThemeExtension::Css)
    }

    /// Check whether `path` carries this extension.
    pub fn matches(&self, path: &Path) -> bool {
        path.extension().is_some_and(|ext| ext == self.as_str())
    }
}

impl FromStr for ThemeExtension {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "css" => Ok(ThemeExtension::Css),
            "less" => Ok(ThemeExtension::Less),
            "scss" => Ok(ThemeExtension::Scss),
            other => Err(format!("unknown stylesheet extension: {}", other)),
        }
    }
}

impl fmt::Display for ThemeExtension {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Build mode. Production always writes minified output.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Mode {
    #[default]
    Development,
    Production,
}

impl Mode {
    pub fn is_production(&self) -> bool {
        matches!(self, Mode::Production)
    }
}

impl FromStr for Mode {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "development" => Ok(Mode::Development),
            "production" => Ok(Mode::Production),
            other => Err(format!("unknown mode: {}", other)),
        }
    }
}

/// Middle segment of the unminified artifact name (`{name}.{label}.{ext}`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OutputLabel {
    #[default]
    Bundled,
    Compiled,
}

impl OutputLabel {
    pub fn as_str(&self) -> &'static str {
        match self {
            OutputLabel::Bundled => "bundled",
            OutputLabel::Compiled => "compiled",
        }
    }
}

/// Process-level settings threaded from the coordinator into every unit.
#[derive(Debug, Clone)]
pub struct BundlerOptions {
    pub mode: Mode,
    pub verbose: bool,
    /// Length of the per-theme debounce window.
    pub debounce: Duration,
    pub output_label: OutputLabel,
    /// Latency of the underlying filesystem watcher.
    pub watch_latency: Duration,
}

impl Default for BundlerOptions {
    fn default() -> Self {
        Self {
            mode: Mode::Development,
            verbose: false,
            debounce: DEFAULT_DEBOUNCE,
            output_label: OutputLabel::Bundled,
            watch_latency: DEFAULT_WATCH_LATENCY,
        }
    }
}

impl BundlerOptions {
    pub fn with_mode(mut self, mode: Mode) -> Self {
        self.mode = mode;
        self
    }

    pub fn with_verbose(mut self, verbose: bool) -> Self {
        self.verbose = verbose;
        self
    }

    pub fn with_debounce(mut self, debounce: Duration) -> Self {
        self.debounce = debounce;
        self
    }

    pub fn with_output_label(mut self, label: OutputLabel) -> Self {
        self.output_label = label;
        self
    }
}

/// One configuration layer. Every field is optional; `None` defers to the
/// layer below.
///
/// This is both the shape callers use to declare a theme and the schema of
/// the on-disk `{themeName}.config.json` file.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ThemeSettings {
    /// Theme root directory.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub path: Option<PathBuf>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub extension: Option<ThemeExtension>,

    /// Member files relative to the theme root, without extension.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub includes: Option<Vec<String>>,

    /// External glob patterns (normally inherited from the coordinator).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub patterns: Option<Vec<String>>,

    /// Explicit location of the theme's config file.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub config_file: Option<PathBuf>,

    /// Explicit unminified output path.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub target: Option<PathBuf>,

    /// Explicit minified output path.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub minified_target: Option<PathBuf>,

    /// Root directory of a theme prepended to this one.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub base_theme: Option<PathBuf>,

    /// Output file of the shared common theme (injected by the coordinator).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub common_theme_file: Option<PathBuf>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub export_path: Option<PathBuf>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub verbose: Option<bool>,
}

impl ThemeSettings {
    /// Settings for a theme rooted at `path`, everything else deferred.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: Some(path.into()),
            ..Default::default()
        }
    }

    /// Bottom layer: the values a theme gets when nobody says otherwise.
    pub fn defaults(options: &BundlerOptions) -> Self {
        Self {
            extension: Some(ThemeExtension::Css),
            includes: Some(Vec::new()),
            patterns: Some(Vec::new()),
            verbose: Some(options.verbose),
            ..Default::default()
        }
    }

    /// Put `upper` on top of `self`: every field set in `upper` wins.
    pub fn overlay(self, upper: ThemeSettings) -> ThemeSettings {
        ThemeSettings {
            path: upper.path.or(self.path),
            extension: upper.extension.or(self.extension),
            includes: upper.includes.or(self.includes),
            patterns: upper.patterns.or(self.patterns),
            config_file: upper.config_file.or(self.config_file),
            target: upper.target.or(self.target),
            minified_target: upper.minified_target.or(self.minified_target),
            base_theme: upper.base_theme.or(self.base_theme),
            common_theme_file: upper.common_theme_file.or(self.common_theme_file),
            export_path: upper.export_path.or(self.export_path),
            verbose: upper.verbose.or(self.verbose),
        }
    }

    /// Load a settings layer from a JSON file.
    ///
    /// A missing file is not an error and yields `Ok(None)`.
    pub fn load(runtime: &dyn StyleRuntime, path: &Path) -> Result<Option<ThemeSettings>> {
        if !runtime.is_file(path)? {
            return Ok(None);
        }
        let content = runtime.file_read_string(path)?;
        let settings = serde_json::from_str(&content).map_err(|e| BundlerError::ConfigParse {
            path: path.to_path_buf(),
            message: e.to_string(),
        })?;
        Ok(Some(settings))
    }

    /// Persist this layer as pretty-printed JSON.
    pub fn save(&self, runtime: &dyn StyleRuntime, path: &Path) -> Result<()> {
        let content =
            serde_json::to_string_pretty(self).map_err(|e| BundlerError::ConfigParse {
                path: path.to_path_buf(),
                message: e.to_string(),
            })?;
        runtime
            .file_write(path, content.as_bytes())
            .map_err(|source| BundlerError::Write {
                path: path.to_path_buf(),
                source,
            })
    }
}

/// Fully resolved configuration of one theme.
#[derive(Debug, Clone, PartialEq)]
pub struct ThemeConfig {
    pub root: PathBuf,
    pub extension: ThemeExtension,
    pub includes: Vec<String>,
    pub patterns: Vec<String>,
    pub config_file: Option<PathBuf>,
    pub target: Option<PathBuf>,
    pub minified_target: Option<PathBuf>,
    pub base_theme: Option<PathBuf>,
    pub common_theme_file: Option<PathBuf>,
    pub export_path: Option<PathBuf>,
    pub verbose: bool,
}

impl ThemeConfig {
    /// Resolve the three layers into a concrete configuration.
    ///
    /// Precedence is `defaults < constructor < file`. The `path` field of the
    /// file layer is ignored; `root` is the pinned theme directory.
    pub fn resolve(
        root: PathBuf,
        defaults: ThemeSettings,
        constructor: ThemeSettings,
        file: Option<ThemeSettings>,
    ) -> ThemeConfig {
        let mut merged = defaults.overlay(constructor);
        if let Some(mut file) = file {
            file.path = None;
            merged = merged.overlay(file);
        }

        ThemeConfig {
            root,
            extension: merged.extension.unwrap_or_default(),
            includes: merged.includes.unwrap_or_default(),
            patterns: merged.patterns.unwrap_or_default(),
            config_file: merged.config_file,
            target: merged.target,
            minified_target: merged.minified_target,
            base_theme: merged.base_theme,
            common_theme_file: merged.common_theme_file,
            export_path: merged.export_path,
            verbose: merged.verbose.unwrap_or(false),
        }
    }
}

/// Configuration of a whole theme set, as consumed by `ThemeSetCoordinator`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ThemeSetConfig {
    /// Member themes in build order. Only `path` is required.
    pub themes: Vec<ThemeSettings>,

    /// External glob patterns shared by every theme.
    pub patterns: Vec<String>,

    /// Minify every theme on batch builds.
    pub minify: bool,

    /// Root directory of the common theme.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub common_theme_path: Option<PathBuf>,

    /// Directories watched for externally-patterned files. Defaults to the
    /// working directory.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub watch_paths: Option<Vec<PathBuf>>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub export_path: Option<PathBuf>,
}

impl ThemeSetConfig {
    /// Load a theme set description from a JSON file.
    pub fn load(runtime: &dyn StyleRuntime, path: &Path) -> Result<ThemeSetConfig> {
        if !runtime.is_file(path)? {
            return Err(RuntimeError::NotFound(path.to_path_buf()).into());
        }
        let content = runtime.file_read_string(path)?;
        serde_json::from_str(&content).map_err(|e| BundlerError::ConfigParse {
            path: path.to_path_buf(),
            message: e.to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;
    use themes_runtime::NativeRuntime;

    #[test]
    fn test_extension_from_str() {
        assert_eq!("css".parse::<ThemeExtension>().unwrap(), ThemeExtension::Css);
        assert_eq!("scss".parse::<ThemeExtension>().unwrap(), ThemeExtension::Scss);
        assert_eq!("less".parse::<ThemeExtension>().unwrap(), ThemeExtension::Less);
        assert!("sass".parse::<ThemeExtension>().is_err());
    }

    #[test]
    fn test_extension_is_transpiled() {
        assert!(!ThemeExtension::Css.is_transpiled());
        assert!(ThemeExtension::Less.is_transpiled());
        assert!(ThemeExtension::Scss.is_transpiled());
    }

    #[test]
    fn test_overlay_upper_wins() {
        let lower = ThemeSettings {
            extension: Some(ThemeExtension::Css),
            includes: Some(vec!["a".into()]),
            verbose: Some(false),
            ..Default::default()
        };
        let upper = ThemeSettings {
            includes: Some(vec!["b".into(), "c".into()]),
            ..Default::default()
        };

        let merged = lower.overlay(upper);
        assert_eq!(merged.extension, Some(ThemeExtension::Css));
        assert_eq!(merged.includes, Some(vec!["b".to_string(), "c".to_string()]));
        assert_eq!(merged.verbose, Some(false));
    }

    #[test]
    fn test_resolve_precedence() {
        let options = BundlerOptions::default().with_verbose(true);
        let constructor = ThemeSettings {
            extension: Some(ThemeExtension::Less),
            includes: Some(vec!["ctor".into()]),
            target: Some(PathBuf::from("/out/ctor.css")),
            ..ThemeSettings::new("/themes/dark")
        };
        let file = ThemeSettings {
            extension: Some(ThemeExtension::Scss),
            includes: Some(vec!["file".into()]),
            ..Default::default()
        };

        let config = ThemeConfig::resolve(
            PathBuf::from("/themes/dark"),
            ThemeSettings::defaults(&options),
            constructor,
            Some(file),
        );

        assert_eq!(config.extension, ThemeExtension::Scss);
        assert_eq!(config.includes, vec!["file".to_string()]);
        assert_eq!(config.target, Some(PathBuf::from("/out/ctor.css")));
        assert!(config.verbose);
    }

    #[test]
    fn test_resolve_pins_root() {
        let file = ThemeSettings {
            path: Some(PathBuf::from("/somewhere/else")),
            ..Default::default()
        };
        let config = ThemeConfig::resolve(
            PathBuf::from("/themes/dark"),
            ThemeSettings::defaults(&BundlerOptions::default()),
            ThemeSettings::new("/themes/dark"),
            Some(file),
        );
        assert_eq!(config.root, PathBuf::from("/themes/dark"));
    }

    #[test]
    fn test_resolve_defaults() {
        let config = ThemeConfig::resolve(
            PathBuf::from("/themes/dark"),
            ThemeSettings::defaults(&BundlerOptions::default()),
            ThemeSettings::default(),
            None,
        );
        assert_eq!(config.extension, ThemeExtension::Css);
        assert!(config.includes.is_empty());
        assert!(config.patterns.is_empty());
        assert!(!config.verbose);
    }

    #[test]
    fn test_settings_json_roundtrip_keeps_include_order() {
        let temp = TempDir::new().unwrap();
        let rt = NativeRuntime::new();
        let path = temp.path().join("dark.config.json");
        std::fs::write(&path, r#"{"includes": ["vars", "base", "layout"]}"#).unwrap();

        let loaded = ThemeSettings::load(&rt, &path).unwrap().unwrap();
        assert_eq!(
            loaded.includes,
            Some(vec!["vars".into(), "base".into(), "layout".into()])
        );

        loaded.save(&rt, &path).unwrap();
        let reloaded = ThemeSettings::load(&rt, &path).unwrap().unwrap();
        assert_eq!(reloaded, loaded);
    }

    #[test]
    fn test_settings_camel_case_fields() {
        let json = r#"{
            "extension": "scss",
            "minifiedTarget": "/out/dark.min.css",
            "baseTheme": "../default",
            "commonThemeFile": "/themes/common/common.bundled.css"
        }"#;
        let settings: ThemeSettings = serde_json::from_str(json).unwrap();
        assert_eq!(settings.extension, Some(ThemeExtension::Scss));
        assert_eq!(
            settings.minified_target,
            Some(PathBuf::from("/out/dark.min.css"))
        );
        assert_eq!(settings.base_theme, Some(PathBuf::from("../default")));
        assert!(settings.common_theme_file.is_some());
    }

    #[test]
    fn test_load_missing_file_is_none() {
        let temp = TempDir::new().unwrap();
        let rt = NativeRuntime::new();
        let loaded = ThemeSettings::load(&rt, &temp.path().join("none.config.json")).unwrap();
        assert!(loaded.is_none());
    }

    #[test]
    fn test_load_invalid_json_is_error() {
        let temp = TempDir::new().unwrap();
        let rt = NativeRuntime::new();
        let path = temp.path().join("bad.config.json");
        std::fs::write(&path, "{ not json").unwrap();
        let result = ThemeSettings::load(&rt, &path);
        assert!(matches!(result, Err(BundlerError::ConfigParse { .. })));
    }

    #[test]
    fn test_theme_set_config_from_json() {
        let json = r#"{
            "themes": [{ "path": "themes/default" }, { "path": "themes/dark" }],
            "patterns": ["{cwd}/components/**/*"],
            "minify": true,
            "commonThemePath": "themes/common"
        }"#;
        let config: ThemeSetConfig = serde_json::from_str(json).unwrap();
        assert_eq!(config.themes.len(), 2);
        assert_eq!(config.patterns, vec!["{cwd}/components/**/*".to_string()]);
        assert!(config.minify);
        assert_eq!(config.common_theme_path, Some(PathBuf::from("themes/common")));
        assert!(config.watch_paths.is_none());
    }
}
