//! A single theme's build lifecycle.
//!
//! A `ThemeUnit` discovers its member files, merges them in cascade order,
//! writes the bundle, optionally transpiles and minifies it, exports the
//! artifacts and watches its sources for changes.
//!
//! The merged stylesheet is assembled in a fixed order, later fragments
//! overriding earlier rules:
//!
//! 1. base theme output (freshly rebuilt)
//! 2. common theme output
//! 3. declared includes, in config order
//! 4. external pattern matches, in pattern order then glob order

use std::future::Future;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, Weak};

use futures::FutureExt;
use futures::future::BoxFuture;
use themes_runtime::{NativeRuntime, RuntimeError, StyleRuntime};
use tokio::time::Instant;
use tracing::{debug, error, info, warn};
use walkdir::WalkDir;

use crate::config::{BundlerOptions, ThemeConfig, ThemeExtension, ThemeSettings};
use crate::debounce::DebounceWindow;
use crate::error::{BundlerError, Result};
use crate::pattern::{PatternResolver, normalize_path};
use crate::transform::{NativeTransformer, Transformer};
use crate::watch::{ChangeKind, FileWatcher, WatchConfig, WatchRegistration};

/// Asset directories copied next to exported bundles.
const EXPORTED_ASSET_DIRS: &[&str] = &["fonts", "images"];

/// Callback invoked after a watched change has been handled.
pub type ChangeCallback = Arc<dyn Fn(PathBuf, ChangeKind) -> BoxFuture<'static, ()> + Send + Sync>;

/// Wrap an async closure as a `ChangeCallback`.
pub fn change_callback<F, Fut>(f: F) -> ChangeCallback
where
    F: Fn(PathBuf, ChangeKind) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = ()> + Send + 'static,
{
    Arc::new(move |path: PathBuf, kind: ChangeKind| f(path, kind).boxed())
}

/// Files written by a successful build.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuildArtifacts {
    /// Unminified merged output.
    pub target: PathBuf,
    /// Plain-CSS output: the transpiled sibling, or `target` for CSS themes.
    pub css: PathBuf,
    pub minified: Option<PathBuf>,
    pub export_dir: Option<PathBuf>,
}

/// Result of a `build()` call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BuildOutcome {
    /// A debounce window was open; nothing was done.
    Skipped,
    /// The theme has no content; nothing was written.
    NoContent,
    Built(BuildArtifacts),
}

impl BuildOutcome {
    pub fn is_built(&self) -> bool {
        matches!(self, BuildOutcome::Built(_))
    }

    pub fn artifacts(&self) -> Option<&BuildArtifacts> {
        match self {
            BuildOutcome::Built(artifacts) => Some(artifacts),
            _ => None,
        }
    }
}

pub struct ThemeUnit {
    name: String,
    config: ThemeConfig,
    options: BundlerOptions,
    runtime: Arc<dyn StyleRuntime>,
    transformer: Arc<dyn Transformer>,
    resolver: PatternResolver,
    base_theme: Option<Arc<ThemeUnit>>,
    debounce: Mutex<DebounceWindow>,
}

impl std::fmt::Debug for ThemeUnit {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ThemeUnit")
            .field("name", &self.name)
            .field("config", &self.config)
            .field("base_theme", &self.base_theme.as_ref().map(|b| b.name()))
            .finish_non_exhaustive()
    }
}

impl ThemeUnit {
    /// Construct and initialize a theme.
    ///
    /// Never fails: an invalid root, a missing or unreadable config file and
    /// a missing base theme are logged, and the unit is built from whatever
    /// configuration could be resolved.
    pub fn new(
        settings: ThemeSettings,
        options: BundlerOptions,
        runtime: Arc<dyn StyleRuntime>,
        transformer: Arc<dyn Transformer>,
    ) -> Self {
        Self::initialize(settings, options, runtime, transformer, &mut Vec::new())
    }

    /// Construct a theme backed by the local file system and the native
    /// transpilers.
    pub fn native(settings: ThemeSettings, options: BundlerOptions) -> Self {
        Self::new(
            settings,
            options,
            Arc::new(NativeRuntime::new()),
            Arc::new(NativeTransformer),
        )
    }

    fn initialize(
        settings: ThemeSettings,
        options: BundlerOptions,
        runtime: Arc<dyn StyleRuntime>,
        transformer: Arc<dyn Transformer>,
        ancestors: &mut Vec<PathBuf>,
    ) -> Self {
        let cwd = runtime.cwd().unwrap_or_else(|e| {
            warn!(error = %e, "Could not determine working directory");
            PathBuf::new()
        });

        let root = match &settings.path {
            Some(path) if path.is_absolute() => normalize_path(path),
            Some(path) => normalize_path(&cwd.join(path)),
            None => cwd.clone(),
        };
        let name = root
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();

        if !runtime.is_dir(&root).unwrap_or(false) {
            warn!(theme = %name, path = %root.display(), "Invalid path in theme config");
        }

        let config_file = match &settings.config_file {
            Some(file) if file.is_absolute() => normalize_path(file),
            Some(file) => normalize_path(&root.join(file)),
            None => root.join(format!("{}.config.json", name)),
        };
        let file_settings = match ThemeSettings::load(runtime.as_ref(), &config_file) {
            Ok(Some(file)) => Some(file),
            Ok(None) => {
                debug!(theme = %name, path = %config_file.display(), "Config file not found");
                None
            }
            Err(e) => {
                warn!(theme = %name, error = %e, "Ignoring unreadable theme config");
                None
            }
        };

        let mut config = ThemeConfig::resolve(
            root.clone(),
            ThemeSettings::defaults(&options),
            settings,
            file_settings,
        );
        config.config_file = Some(config_file);

        let resolver = PatternResolver::new(cwd, root.clone(), name.clone(), config.extension);

        ancestors.push(root.clone());
        let base_theme = config.base_theme.as_ref().and_then(|base| {
            let base_root = if base.is_absolute() {
                normalize_path(base)
            } else {
                normalize_path(&root.join(base))
            };
            if ancestors.contains(&base_root) {
                warn!(theme = %name, base = %base_root.display(), "Base theme cycle ignored");
                return None;
            }
            if !runtime.is_dir(&base_root).unwrap_or(false) {
                warn!(theme = %name, base = %base_root.display(), "Base theme does not exist");
            }
            let base_settings = ThemeSettings {
                extension: Some(config.extension),
                ..ThemeSettings::new(base_root)
            };
            Some(Arc::new(Self::initialize(
                base_settings,
                options.clone(),
                runtime.clone(),
                transformer.clone(),
                ancestors,
            )))
        });
        ancestors.pop();

        let debounce = Mutex::new(DebounceWindow::new(options.debounce));

        Self {
            name,
            config,
            options,
            runtime,
            transformer,
            resolver,
            base_theme,
            debounce,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn root(&self) -> &Path {
        &self.config.root
    }

    pub fn extension(&self) -> ThemeExtension {
        self.config.extension
    }

    pub fn config(&self) -> &ThemeConfig {
        &self.config
    }

    pub fn base_theme(&self) -> Option<&Arc<ThemeUnit>> {
        self.base_theme.as_ref()
    }

    pub fn config_file(&self) -> Option<&Path> {
        self.config.config_file.as_deref()
    }

    /// Unminified output: `{root}/{name}.{label}.{ext}` unless configured.
    pub fn target_file(&self) -> PathBuf {
        self.config.target.clone().unwrap_or_else(|| {
            self.config.root.join(format!(
                "{}.{}.{}",
                self.name,
                self.options.output_label.as_str(),
                self.config.extension
            ))
        })
    }

    /// Plain-CSS sibling produced by the transpile step.
    pub fn transpiled_target_file(&self) -> PathBuf {
        self.target_file().with_extension("css")
    }

    /// Minified output: `{root}/{name}.min.{ext}` unless configured, always
    /// `.css` for transpiled families.
    pub fn minified_target_file(&self) -> PathBuf {
        let file = self.config.minified_target.clone().unwrap_or_else(|| {
            self.config
                .root
                .join(format!("{}.min.{}", self.name, self.config.extension))
        });
        if self.config.extension.is_transpiled() {
            file.with_extension("css")
        } else {
            file
        }
    }

    /// Configured patterns, theme-qualified when `add_suffix` is set.
    pub fn patterns(&self, add_suffix: bool) -> Vec<String> {
        self.config
            .patterns
            .iter()
            .map(|pattern| self.resolver.apply(pattern, add_suffix))
            .collect()
    }

    /// The common theme's output, unless this theme is the common theme or
    /// the file is not usable.
    fn common_theme_file(&self) -> Option<PathBuf> {
        let file = self.config.common_theme_file.as_ref()?;
        if *file == self.target_file() {
            return None;
        }
        match self.runtime.is_file(file) {
            Ok(true) => Some(file.clone()),
            _ => {
                warn!(theme = %self.name, path = %file.display(), "Common theme file does not exist");
                None
            }
        }
    }

    fn include_files(&self) -> Vec<PathBuf> {
        self.config
            .includes
            .iter()
            .map(|include| {
                self.config
                    .root
                    .join(format!("{}.{}", include, self.config.extension))
            })
            .collect()
    }

    /// Member files in merge order: common file, includes, pattern matches.
    ///
    /// Non-existent paths are dropped. A file matched by two patterns is
    /// listed twice.
    pub fn get_files(&self) -> Vec<PathBuf> {
        self.common_theme_file()
            .into_iter()
            .chain(self.include_files())
            .chain(
                self.resolver
                    .resolve_all(self.runtime.as_ref(), &self.config.patterns),
            )
            .filter(|file| {
                let exists = self.runtime.is_file(file).unwrap_or(false);
                if !exists {
                    debug!(theme = %self.name, path = %file.display(), "Skipping missing file");
                }
                exists
            })
            .collect()
    }

    /// Content a member file contributes to the merge.
    fn read_fragment(&self, file: &Path) -> Result<Option<String>> {
        let own_artifact_suffix = format!(
            ".{}.{}",
            self.options.output_label.as_str(),
            self.config.extension
        );
        let is_common = self.config.common_theme_file.as_deref() == Some(file);
        if !is_common && file.to_string_lossy().ends_with(&own_artifact_suffix) {
            return Ok(None);
        }

        let content = self.runtime.file_read_string(file)?;
        if content.is_empty() {
            self.log_verbose(&format!("No stylesheet content in {}", file.display()));
            return Ok(None);
        }

        if self.options.mode.is_production() {
            Ok(Some(content))
        } else {
            Ok(Some(format!(
                "\r\n/*\r\n File: {}  \r\n*/\r\n{}",
                file.display(),
                content
            )))
        }
    }

    /// Concatenate this theme's own fragments (common, includes, patterns).
    fn merge_own(&self) -> Result<String> {
        let mut merged = String::new();
        for file in self.get_files() {
            if let Some(fragment) = self.read_fragment(&file)? {
                merged.push_str(&fragment);
            }
        }
        Ok(merged)
    }

    /// Rebuild the base theme and return its unminified output.
    async fn base_content(&self) -> Result<String> {
        let Some(base) = &self.base_theme else {
            return Ok(String::new());
        };
        base.build_boxed(None).await?;
        let target = base.target_file();
        if !self.runtime.is_file(&target)? {
            debug!(theme = %self.name, base = %base.name(), "Base theme produced no output");
            return Ok(String::new());
        }
        Ok(self.runtime.file_read_string(&target)?)
    }

    /// Compute the merged stylesheet.
    ///
    /// Empty when the theme has no content of its own; the base theme is
    /// only rebuilt when there is something to prepend it to.
    pub async fn merge(&self) -> Result<String> {
        let own = self.merge_own()?;
        if own.is_empty() {
            return Ok(own);
        }
        let mut merged = self.base_content().await?;
        merged.push_str(&own);
        Ok(merged)
    }

    fn build_boxed(&self, minify: Option<bool>) -> BoxFuture<'_, Result<BuildOutcome>> {
        self.build(minify).boxed()
    }

    /// Build the theme.
    ///
    /// `minify` forces (or, with `Some(false)`, does not force) a minified
    /// output; production mode always minifies.
    pub async fn build(&self, minify: Option<bool>) -> Result<BuildOutcome> {
        let opened = self
            .debounce
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .try_open(Instant::now());
        if !opened {
            self.log_verbose("Debouncing theme build");
            return Ok(BuildOutcome::Skipped);
        }

        self.log_verbose("Compiling theme");
        let styles = self.merge().await?;
        if styles.is_empty() {
            self.log_verbose("No stylesheet content found");
            return Ok(BuildOutcome::NoContent);
        }

        let target = self.target_file();
        self.write(&target, styles.as_bytes())?;

        let css_file = if self.config.extension.is_transpiled() {
            let css_file = self.transpiled_target_file();
            self.transformer
                .transpile(
                    self.runtime.as_ref(),
                    self.config.extension,
                    &target,
                    &css_file,
                )
                .map_err(|source| BundlerError::Transform {
                    theme: self.name.clone(),
                    source,
                })?;
            if !self.runtime.is_file(&css_file)? {
                return Err(BundlerError::MissingArtifact(css_file));
            }
            css_file
        } else {
            target.clone()
        };

        let minified = if self.options.mode.is_production() || minify == Some(true) {
            let css = self.read_artifact(&css_file)?;
            let code = self.transformer.minify(&css, &target).map_err(|source| {
                BundlerError::Transform {
                    theme: self.name.clone(),
                    source,
                }
            })?;
            let minified_target = self.minified_target_file();
            self.write(&minified_target, code.as_bytes())?;
            Some(minified_target)
        } else {
            None
        };

        let export_dir = self.export(&css_file, minified.as_deref())?;

        info!(theme = %self.name, target = %target.display(), "Theme built");
        Ok(BuildOutcome::Built(BuildArtifacts {
            target,
            css: css_file,
            minified,
            export_dir,
        }))
    }

    /// Read an output of an earlier build step, failing if it is missing.
    fn read_artifact(&self, path: &Path) -> Result<String> {
        if !self.runtime.is_file(path)? {
            return Err(BundlerError::MissingArtifact(path.to_path_buf()));
        }
        Ok(self.runtime.file_read_string(path)?)
    }

    fn write(&self, path: &Path, contents: &[u8]) -> Result<()> {
        let write_error = |source: RuntimeError| BundlerError::Write {
            path: path.to_path_buf(),
            source,
        };
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() && !self.runtime.is_dir(parent).unwrap_or(false) {
                self.runtime.dir_create(parent, true).map_err(write_error)?;
            }
        }
        self.runtime.file_write(path, contents).map_err(write_error)
    }

    /// Copy the outputs and asset directories into `{exportPath}/{name}/`.
    fn export(&self, css_file: &Path, minified: Option<&Path>) -> Result<Option<PathBuf>> {
        let Some(export_path) = &self.config.export_path else {
            return Ok(None);
        };
        let export_dir = export_path.join(&self.name);
        self.runtime.dir_create(&export_dir, true)?;

        if self.runtime.is_file(css_file)? {
            let dest = export_dir.join(format!(
                "{}.{}.css",
                self.name,
                self.options.output_label.as_str()
            ));
            self.runtime.file_copy(css_file, &dest)?;
        }
        if let Some(minified) = minified {
            let dest = export_dir.join(format!("{}.min.css", self.name));
            self.runtime.file_copy(minified, &dest)?;
        }

        for dir in EXPORTED_ASSET_DIRS {
            self.copy_tree(&self.config.root.join(dir), &export_dir.join(dir))?;
        }

        debug!(theme = %self.name, path = %export_dir.display(), "Exported theme");
        Ok(Some(export_dir))
    }

    fn copy_tree(&self, origin: &Path, destination: &Path) -> Result<()> {
        if !self.runtime.is_dir(origin)? {
            return Ok(());
        }
        for entry in WalkDir::new(origin).follow_links(false) {
            let entry = entry.map_err(|e| RuntimeError::Io(e.into()))?;
            let Ok(relative) = entry.path().strip_prefix(origin) else {
                continue;
            };
            let dest = destination.join(relative);
            if entry.file_type().is_dir() {
                self.runtime.dir_create(&dest, true)?;
            } else if entry.file_type().is_file() {
                self.runtime.file_copy(entry.path(), &dest)?;
            }
        }
        Ok(())
    }

    /// Delete this theme's output artifacts. Missing files are fine.
    pub fn cleanup(&self) -> Result<()> {
        let mut files = vec![self.target_file(), self.minified_target_file()];
        if self.config.extension.is_transpiled() {
            files.push(self.transpiled_target_file());
        }
        for file in files {
            if self.runtime.is_file(&file)? {
                self.runtime.file_remove(&file)?;
                debug!(theme = %self.name, path = %file.display(), "Removed artifact");
            }
        }
        Ok(())
    }

    /// Whether a changed file under the theme root should trigger a rebuild.
    fn is_member_change(&self, path: &Path) -> bool {
        if !self.config.extension.matches(path) {
            return false;
        }
        let own_outputs = [
            self.target_file(),
            self.minified_target_file(),
            self.transpiled_target_file(),
        ];
        !own_outputs
            .iter()
            .any(|output| output.file_name().is_some() && output.file_name() == path.file_name())
    }

    /// Watch the theme root and every pattern directory.
    ///
    /// Matching changes rebuild the theme (unless `trigger_build` is false)
    /// and then invoke `on_change`. A base theme is watched too, with its
    /// changes rebuilding this theme. Watch roots that cannot be watched are
    /// logged and skipped.
    pub fn watch(
        self: &Arc<Self>,
        on_change: Option<ChangeCallback>,
        trigger_build: bool,
    ) -> Vec<WatchRegistration> {
        let mut registrations = Vec::new();

        if let Some(base) = &self.base_theme {
            let this: Weak<ThemeUnit> = Arc::downgrade(self);
            let rebuild = change_callback(move |_path, _kind| {
                let this = this.clone();
                async move {
                    if let Some(this) = this.upgrade() {
                        if let Err(e) = this.build(None).await {
                            error!(theme = %this.name, error = %e, "Rebuild after base theme change failed");
                        }
                    }
                }
            });
            registrations.extend(base.watch(Some(rebuild), false));
        }

        registrations.extend(self.spawn_watch(
            self.config.root.clone(),
            |unit: &ThemeUnit, path: &Path| unit.is_member_change(path),
            on_change.clone(),
            trigger_build,
        ));

        for pattern in &self.config.patterns {
            let root = self.resolver.watch_root(pattern);
            if !self.runtime.is_dir(&root).unwrap_or(false) {
                debug!(theme = %self.name, path = %root.display(), "Pattern directory does not exist");
                continue;
            }
            registrations.extend(self.spawn_watch(
                root,
                |unit: &ThemeUnit, path: &Path| unit.resolver.owns(path),
                on_change.clone(),
                trigger_build,
            ));
        }

        registrations
    }

    fn spawn_watch(
        self: &Arc<Self>,
        root: PathBuf,
        filter: fn(&ThemeUnit, &Path) -> bool,
        on_change: Option<ChangeCallback>,
        trigger_build: bool,
    ) -> Option<WatchRegistration> {
        let config = WatchConfig {
            latency: self.options.watch_latency,
        };
        let mut watcher = match FileWatcher::new(&root, config) {
            Ok(watcher) => watcher,
            Err(e) => {
                warn!(theme = %self.name, error = %e, "Could not watch theme files");
                return None;
            }
        };

        let unit = Arc::clone(self);
        let handle = tokio::spawn(async move {
            while let Some(event) = watcher.recv().await {
                if !filter(unit.as_ref(), &event.path) {
                    continue;
                }
                debug!(theme = %unit.name, path = %event.path.display(), "Theme file changed");
                if trigger_build {
                    if let Err(e) = unit.build(None).await {
                        error!(theme = %unit.name, error = %e, "Theme rebuild failed");
                    }
                }
                if let Some(callback) = &on_change {
                    callback(event.path, event.kind).await;
                }
            }
        });

        Some(WatchRegistration::new(root, handle))
    }

    fn log_verbose(&self, message: &str) {
        if self.config.verbose {
            info!(theme = %self.name, "{}", message);
        } else {
            debug!(theme = %self.name, "{}", message);
        }
    }
}
