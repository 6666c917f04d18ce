//! The external stylesheet transform seam.
//!
//! Transpilers and minifiers are opaque to the bundler: it hands them a
//! file or a string and persists whatever comes back.

use std::path::Path;

use themes_runtime::{
    RuntimeError, RuntimeResult, StyleRuntime, compile_less_file, compile_scss_file, minify_css,
};

use crate::config::ThemeExtension;

/// External transpile and minify steps.
pub trait Transformer: Send + Sync {
    /// Transpile `source` (of family `extension`) into plain CSS at `dest`.
    fn transpile(
        &self,
        runtime: &dyn StyleRuntime,
        extension: ThemeExtension,
        source: &Path,
        dest: &Path,
    ) -> RuntimeResult<()>;

    /// Minify CSS text. `filename` names the artifact for diagnostics.
    fn minify(&self, css: &str, filename: &Path) -> RuntimeResult<String>;
}

/// grass for SCSS and minification, `lessc` for LESS.
#[derive(Debug, Default, Clone, Copy)]
pub struct NativeTransformer;

impl Transformer for NativeTransformer {
    fn transpile(
        &self,
        runtime: &dyn StyleRuntime,
        extension: ThemeExtension,
        source: &Path,
        dest: &Path,
    ) -> RuntimeResult<()> {
        match extension {
            ThemeExtension::Scss => compile_scss_file(runtime, source, dest),
            ThemeExtension::Less => compile_less_file(runtime, source, dest),
            ThemeExtension::Css => Err(RuntimeError::NotSupported(format!(
                "{} is plain CSS and has no transpile step",
                source.display()
            ))),
        }
    }

    fn minify(&self, css: &str, filename: &Path) -> RuntimeResult<String> {
        minify_css(css).map_err(|e| match e {
            RuntimeError::SassError(message) => {
                RuntimeError::SassError(format!("{}: {}", filename.display(), message))
            }
            other => other,
        })
    }
}
