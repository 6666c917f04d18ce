//! Orchestration of a whole theme set.
//!
//! The coordinator owns the member themes plus at most one common theme whose
//! output is the first fragment of every member. The common theme is always
//! constructed and built before the members: members are configured with its
//! output path and read that file when they merge.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use futures::future::join_all;
use themes_runtime::{NativeRuntime, StyleRuntime};
use tracing::{debug, error, info, warn};

use crate::config::{BundlerOptions, ThemeSetConfig, ThemeSettings};
use crate::error::Result;
use crate::pattern::{normalize_path, sub_extension};
use crate::transform::{NativeTransformer, Transformer};
use crate::unit::{BuildOutcome, ThemeUnit, change_callback};
use crate::watch::{FileWatcher, WatchConfig, WatchRegistration};

/// Outcome of one member build in a batch.
#[derive(Debug)]
pub struct ThemeBuildResult {
    pub theme: String,
    pub result: Result<BuildOutcome>,
}

impl ThemeBuildResult {
    pub fn is_err(&self) -> bool {
        self.result.is_err()
    }
}

/// What `initialize()` did.
#[derive(Debug)]
pub struct Initialized {
    pub builds: Vec<ThemeBuildResult>,
    /// Empty unless watching was requested.
    pub registrations: Vec<WatchRegistration>,
}

pub struct ThemeSetCoordinator {
    config: ThemeSetConfig,
    options: BundlerOptions,
    runtime: Arc<dyn StyleRuntime>,
    common: Option<Arc<ThemeUnit>>,
    themes: Vec<Arc<ThemeUnit>>,
    by_name: HashMap<String, Arc<ThemeUnit>>,
}

impl std::fmt::Debug for ThemeSetCoordinator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ThemeSetCoordinator")
            .field("common", &self.common.as_ref().map(|c| c.name()))
            .field(
                "themes",
                &self.themes.iter().map(|t| t.name()).collect::<Vec<_>>(),
            )
            .finish_non_exhaustive()
    }
}

impl ThemeSetCoordinator {
    /// Construct the common theme, then every member theme.
    ///
    /// Members whose directory does not exist, or whose name is already
    /// taken, are logged and left out of the set.
    pub fn new(
        config: ThemeSetConfig,
        options: BundlerOptions,
        runtime: Arc<dyn StyleRuntime>,
        transformer: Arc<dyn Transformer>,
    ) -> Self {
        let cwd = runtime.cwd().unwrap_or_default();
        let resolve = |path: &Path| normalize_path(&cwd.join(path));

        let common = config.common_theme_path.as_ref().and_then(|path| {
            let root = resolve(path);
            if !runtime.is_dir(&root).unwrap_or(false) {
                warn!(path = %root.display(), "Common theme directory does not exist");
                return None;
            }
            let settings = ThemeSettings {
                patterns: Some(config.patterns.clone()),
                export_path: config.export_path.clone(),
                ..ThemeSettings::new(root)
            };
            Some(Arc::new(ThemeUnit::new(
                settings,
                options.clone(),
                runtime.clone(),
                transformer.clone(),
            )))
        });

        let common_theme_file = common.as_ref().map(|c| c.target_file());

        let mut themes = Vec::new();
        let mut by_name = HashMap::new();
        for settings in &config.themes {
            let Some(path) = &settings.path else {
                warn!("Theme declared without a path");
                continue;
            };
            let root = resolve(path);
            if !runtime.is_dir(&root).unwrap_or(false) {
                warn!(path = %root.display(), "Theme directory does not exist");
                continue;
            }
            if common.as_ref().is_some_and(|c| c.root() == root) {
                warn!(path = %root.display(), "Common theme listed as a member theme");
                continue;
            }

            let settings = ThemeSettings {
                path: Some(root),
                patterns: Some(config.patterns.clone()),
                export_path: config.export_path.clone().or(settings.export_path.clone()),
                common_theme_file: common_theme_file.clone(),
                ..settings.clone()
            };
            let unit = Arc::new(ThemeUnit::new(
                settings,
                options.clone(),
                runtime.clone(),
                transformer.clone(),
            ));

            if by_name.contains_key(unit.name()) {
                warn!(theme = %unit.name(), "Duplicate theme name");
                continue;
            }
            by_name.insert(unit.name().to_string(), unit.clone());
            themes.push(unit);
        }

        info!(
            themes = themes.len(),
            common = common.is_some(),
            "Theme set configured"
        );

        Self {
            config,
            options,
            runtime,
            common,
            themes,
            by_name,
        }
    }

    /// Coordinator over the local file system and the native transpilers.
    pub fn native(config: ThemeSetConfig, options: BundlerOptions) -> Self {
        Self::new(
            config,
            options,
            Arc::new(NativeRuntime::new()),
            Arc::new(NativeTransformer),
        )
    }

    pub fn config(&self) -> &ThemeSetConfig {
        &self.config
    }

    /// Member themes in configuration order.
    pub fn themes(&self) -> &[Arc<ThemeUnit>] {
        &self.themes
    }

    pub fn theme(&self, name: &str) -> Option<&Arc<ThemeUnit>> {
        self.by_name.get(name)
    }

    pub fn common_theme(&self) -> Option<&Arc<ThemeUnit>> {
        self.common.as_ref()
    }

    /// Build the common theme, then every member concurrently.
    ///
    /// A failed common build is returned as an error and no member is
    /// started. Member failures are reported per theme and do not affect
    /// sibling builds.
    pub async fn bundle_all(&self, minify: bool) -> Result<Vec<ThemeBuildResult>> {
        let minify = minify || self.config.minify;
        if let Some(common) = &self.common {
            let outcome = common.build(minify.then_some(true)).await.inspect_err(|e| {
                error!(theme = %common.name(), error = %e, "Common theme build failed");
            })?;
            debug!(theme = %common.name(), ?outcome, "Common theme finished");
        }
        Ok(build_members(&self.themes, minify).await)
    }

    /// Build every member concurrently without touching the common theme.
    pub async fn bundle_members(&self, minify: bool) -> Vec<ThemeBuildResult> {
        build_members(&self.themes, minify || self.config.minify).await
    }

    /// Watch the common theme, every member and the configured watch paths.
    ///
    /// A change to the common theme rebuilds it and then every member.
    /// Changes under the watch paths are routed by sub-extension to the
    /// theme of that name.
    pub fn watch_all(&self) -> Vec<WatchRegistration> {
        let mut registrations = Vec::new();
        let router = Arc::new(Router {
            common: self.common.clone(),
            members: self.themes.clone(),
            by_name: self.by_name.clone(),
            minify: self.config.minify,
        });

        if let Some(common) = &self.common {
            let router = router.clone();
            let rebuild_members = change_callback(move |_path, _kind| {
                let router = router.clone();
                async move {
                    router.rebuild_members().await;
                }
            });
            registrations.extend(common.watch(Some(rebuild_members), true));
        }

        for theme in &self.themes {
            registrations.extend(theme.watch(None, true));
        }

        let watch_paths = match &self.config.watch_paths {
            Some(paths) => paths.clone(),
            None => self.runtime.cwd().map(|cwd| vec![cwd]).unwrap_or_default(),
        };
        for path in watch_paths {
            if let Some(registration) = self.watch_path(path, router.clone()) {
                registrations.push(registration);
            }
        }

        info!(watches = registrations.len(), "Watching theme set");
        registrations
    }

    fn watch_path(&self, path: PathBuf, router: Arc<Router>) -> Option<WatchRegistration> {
        let config = WatchConfig {
            latency: self.options.watch_latency,
        };
        let mut watcher = match FileWatcher::new(&path, config) {
            Ok(watcher) => watcher,
            Err(e) => {
                warn!(path = %path.display(), error = %e, "Could not watch path");
                return None;
            }
        };
        let handle = tokio::spawn(async move {
            while let Some(event) = watcher.recv().await {
                router.route(&event.path).await;
            }
        });
        Some(WatchRegistration::new(path, handle))
    }

    /// Remove the artifacts of the common theme, then of every member.
    pub fn cleanup_all(&self) -> Result<()> {
        if let Some(common) = &self.common {
            common.cleanup()?;
        }
        for theme in &self.themes {
            theme.cleanup()?;
        }
        Ok(())
    }

    /// Clean up, build everything and optionally start watching.
    pub async fn initialize(&self, watch: bool) -> Result<Initialized> {
        self.cleanup_all()?;
        let builds = self.bundle_all(self.config.minify).await?;
        let registrations = if watch { self.watch_all() } else { Vec::new() };
        Ok(Initialized {
            builds,
            registrations,
        })
    }
}

async fn build_members(themes: &[Arc<ThemeUnit>], minify: bool) -> Vec<ThemeBuildResult> {
    let builds = themes.iter().map(|theme| async move {
        let result = theme.build(minify.then_some(true)).await;
        if let Err(e) = &result {
            error!(theme = %theme.name(), error = %e, "Theme build failed");
        }
        ThemeBuildResult {
            theme: theme.name().to_string(),
            result,
        }
    });
    join_all(builds).await
}

/// Shared view of the set used by watch tasks.
struct Router {
    common: Option<Arc<ThemeUnit>>,
    members: Vec<Arc<ThemeUnit>>,
    by_name: HashMap<String, Arc<ThemeUnit>>,
    /// The set's `minify` setting, applied to chained member rebuilds.
    minify: bool,
}

impl Router {
    async fn rebuild_members(&self) {
        build_members(&self.members, self.minify).await;
    }

    /// Rebuild the theme a changed file belongs to, if any.
    async fn route(&self, path: &Path) {
        let Some(name) = sub_extension(path) else {
            return;
        };

        if let Some(common) = self.common.as_ref().filter(|c| c.name() == name) {
            if !common.extension().matches(path) {
                return;
            }
            debug!(theme = %name, path = %path.display(), "Routing change to common theme");
            match common.build(None).await {
                Ok(_) => self.rebuild_members().await,
                Err(e) => error!(theme = %name, error = %e, "Common theme rebuild failed"),
            }
            return;
        }

        let Some(theme) = self.by_name.get(name) else {
            return;
        };
        if !theme.extension().matches(path) {
            return;
        }
        debug!(theme = %name, path = %path.display(), "Routing change");
        if let Err(e) = theme.build(None).await {
            error!(theme = %name, error = %e, "Theme rebuild failed");
        }
    }
}
