/*
 * themes-runtime
 *
 * Runtime abstraction layer for the themes bundler.
 *
 * Every file the bundler reads, writes, copies or removes goes through the
 * `StyleRuntime` trait, so tests can observe or intercept that I/O and the
 * core can be hosted on a different file-system backend.
 *
 * The crate also hosts the external stylesheet collaborators:
 *
 * - SCSS to CSS transpilation via grass
 * - LESS to CSS transpilation via the `lessc` binary
 * - CSS minification via grass' compressed output style
 */

mod less_native;
mod native;
mod traits;

pub mod sass_native;

pub use less_native::{LESSC_ENV_VAR, compile_less_file};
pub use native::NativeRuntime;
pub use sass_native::{compile_scss_file, minify_css};
pub use traits::{CommandOutput, PathKind, RuntimeError, RuntimeResult, StyleRuntime};

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_native_runtime_file_operations() {
        let rt = NativeRuntime::new();
        let temp = tempfile::TempDir::new().unwrap();

        let file_path = temp.path().join("test.css");
        rt.file_write(&file_path, b"a{}").unwrap();

        assert!(rt.path_exists(&file_path, None).unwrap());
        assert!(rt.is_file(&file_path).unwrap());
        assert!(!rt.is_dir(&file_path).unwrap());
        assert_eq!(rt.file_read(&file_path).unwrap(), b"a{}");
    }

    #[test]
    fn test_cwd_is_absolute() {
        let rt = NativeRuntime::new();
        assert!(rt.cwd().unwrap().is_absolute());
    }
}
