//! themes-bundler: theme resolution and incremental stylesheet builds
//!
//! This crate provides:
//! - Layered theme configuration (defaults, caller settings, on-disk JSON)
//! - Theme-qualified glob pattern resolution for externally-located files
//! - Per-theme merge, transpile, minify and export (`ThemeUnit`)
//! - Ordered batch builds and aggregate watching of a theme set
//!   (`ThemeSetCoordinator`)

pub mod config;
pub mod coordinator;
pub mod debounce;
pub mod error;
pub mod pattern;
pub mod transform;
pub mod unit;
pub mod watch;

pub use config::{
    BundlerOptions, Mode, OutputLabel, ThemeConfig, ThemeExtension, ThemeSetConfig, ThemeSettings,
};
pub use coordinator::{Initialized, ThemeBuildResult, ThemeSetCoordinator};
pub use error::{BundlerError, Result};
pub use pattern::PatternResolver;
pub use transform::{NativeTransformer, Transformer};
pub use unit::{BuildArtifacts, BuildOutcome, ChangeCallback, ThemeUnit, change_callback};
pub use watch::{ChangeKind, WatchRegistration};
