//! SASS compilation and CSS minification using the grass crate.
//!
//! grass is a pure Rust implementation of Sass targeting dart-sass 1.54.3.
//! Because plain CSS is valid SCSS, the same compiler doubles as the
//! minifier: compiling a stylesheet with `OutputStyle::Compressed` strips
//! whitespace and non-preserved comments.
//!
//! Key components:
//! - `RuntimeFs`: Adapter implementing `grass::Fs` for our `StyleRuntime`
//! - `compile_scss_file`: transpile a `.scss` file into a `.css` sibling
//! - `minify_css`: whitespace-reduce stylesheet text

use std::fmt::Debug;
use std::io;
use std::path::Path;

use grass::{Options, OutputStyle};

use crate::traits::{RuntimeError, RuntimeResult, StyleRuntime};

/// Adapter that implements `grass::Fs` using a `StyleRuntime`.
///
/// This routes `@use`/`@import` resolution through the same runtime the
/// bundler uses for everything else.
pub struct RuntimeFs<'a> {
    runtime: &'a dyn StyleRuntime,
}

impl<'a> RuntimeFs<'a> {
    /// Create a new RuntimeFs adapter wrapping the given runtime.
    pub fn new(runtime: &'a dyn StyleRuntime) -> Self {
        Self { runtime }
    }
}

impl Debug for RuntimeFs<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RuntimeFs")
            .field("runtime", &"<StyleRuntime>")
            .finish()
    }
}

impl grass::Fs for RuntimeFs<'_> {
    fn is_dir(&self, path: &Path) -> bool {
        self.runtime.is_dir(path).unwrap_or(false)
    }

    fn is_file(&self, path: &Path) -> bool {
        self.runtime.is_file(path).unwrap_or(false)
    }

    fn read(&self, path: &Path) -> io::Result<Vec<u8>> {
        self.runtime
            .file_read(path)
            .map_err(|e| io::Error::other(e.to_string()))
    }
}

/// Transpile an SCSS file to CSS and write the result to `dest`.
///
/// The source file's directory is added as a load path so relative
/// `@use`/`@import` statements resolve the same way dart-sass would.
///
/// # Errors
///
/// Returns `RuntimeError::NotFound` if `source` does not exist,
/// `RuntimeError::SassError` on compilation failure, or an I/O error if
/// the destination cannot be written.
pub fn compile_scss_file(
    runtime: &dyn StyleRuntime,
    source: &Path,
    dest: &Path,
) -> RuntimeResult<()> {
    if !runtime.is_file(source)? {
        return Err(RuntimeError::NotFound(source.to_path_buf()));
    }

    let fs = RuntimeFs::new(runtime);
    let mut options = Options::default().fs(&fs).style(OutputStyle::Expanded);
    if let Some(parent) = source.parent() {
        options = options.load_path(parent);
    }

    let css =
        grass::from_path(source, &options).map_err(|e| RuntimeError::SassError(e.to_string()))?;
    runtime.file_write(dest, css.as_bytes())
}

/// Minify stylesheet text.
///
/// # Returns
///
/// Compressed CSS on success, `RuntimeError::SassError` if the input could
/// not be parsed.
pub fn minify_css(css: &str) -> RuntimeResult<String> {
    let options = Options::default().style(OutputStyle::Compressed);
    grass::from_string(css, &options).map_err(|e| RuntimeError::SassError(e.to_string()))
}
