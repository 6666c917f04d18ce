/*
 * common/mod.rs
 *
 * Shared fixtures for the themes-bundler integration tests.
 */

#![allow(dead_code)]

use std::io;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use themes_bundler::{ThemeExtension, Transformer};
use themes_runtime::{
    CommandOutput, NativeRuntime, PathKind, RuntimeError, RuntimeResult, StyleRuntime,
};

/// A file-system operation observed by `RecordingRuntime`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Op {
    Write(PathBuf),
    Copy(PathBuf),
    Remove(PathBuf),
}

/// Decorator over `NativeRuntime` that records mutating operations, pins the
/// working directory and can be told to fail writes.
pub struct RecordingRuntime {
    inner: NativeRuntime,
    cwd: PathBuf,
    ops: Mutex<Vec<Op>>,
    fail_writes_containing: Mutex<Option<String>>,
}

impl RecordingRuntime {
    pub fn new(cwd: &Path) -> Self {
        Self {
            inner: NativeRuntime::new(),
            cwd: cwd.to_path_buf(),
            ops: Mutex::new(Vec::new()),
            fail_writes_containing: Mutex::new(None),
        }
    }

    pub fn ops(&self) -> Vec<Op> {
        self.ops.lock().unwrap().clone()
    }

    pub fn writes(&self) -> Vec<PathBuf> {
        self.ops()
            .into_iter()
            .filter_map(|op| match op {
                Op::Write(path) => Some(path),
                _ => None,
            })
            .collect()
    }

    /// Index of the first write to `path`.
    pub fn write_index(&self, path: &Path) -> Option<usize> {
        self.writes().iter().position(|p| p == path)
    }

    pub fn clear(&self) {
        self.ops.lock().unwrap().clear();
    }

    /// Fail every write whose path contains `fragment`.
    pub fn fail_writes_containing(&self, fragment: &str) {
        *self.fail_writes_containing.lock().unwrap() = Some(fragment.to_string());
    }

    fn record(&self, op: Op) {
        self.ops.lock().unwrap().push(op);
    }
}

impl StyleRuntime for RecordingRuntime {
    fn file_read(&self, path: &Path) -> RuntimeResult<Vec<u8>> {
        self.inner.file_read(path)
    }

    fn file_write(&self, path: &Path, contents: &[u8]) -> RuntimeResult<()> {
        if let Some(fragment) = self.fail_writes_containing.lock().unwrap().as_deref() {
            if path.to_string_lossy().contains(fragment) {
                return Err(RuntimeError::Io(io::Error::new(
                    io::ErrorKind::PermissionDenied,
                    "write refused by test runtime",
                )));
            }
        }
        self.record(Op::Write(path.to_path_buf()));
        self.inner.file_write(path, contents)
    }

    fn path_exists(&self, path: &Path, kind: Option<PathKind>) -> RuntimeResult<bool> {
        self.inner.path_exists(path, kind)
    }

    fn file_copy(&self, src: &Path, dst: &Path) -> RuntimeResult<()> {
        self.record(Op::Copy(dst.to_path_buf()));
        self.inner.file_copy(src, dst)
    }

    fn file_remove(&self, path: &Path) -> RuntimeResult<()> {
        self.record(Op::Remove(path.to_path_buf()));
        self.inner.file_remove(path)
    }

    fn dir_create(&self, path: &Path, recursive: bool) -> RuntimeResult<()> {
        self.inner.dir_create(path, recursive)
    }

    fn cwd(&self) -> RuntimeResult<PathBuf> {
        Ok(self.cwd.clone())
    }

    fn exec_command(&self, command: &str, args: &[&str]) -> RuntimeResult<CommandOutput> {
        self.inner.exec_command(command, args)
    }

    fn env_get(&self, name: &str) -> RuntimeResult<Option<String>> {
        self.inner.env_get(name)
    }
}

/// Transformer that needs no external tools.
///
/// Transpiling prefixes the source with a marker comment; minifying
/// collapses whitespace. With `skip_transpile_output` the transpile step
/// "succeeds" without producing its output file.
#[derive(Debug, Default)]
pub struct FakeTransformer {
    pub skip_transpile_output: bool,
    pub transpiled: Mutex<Vec<PathBuf>>,
    pub minified: Mutex<Vec<PathBuf>>,
}

pub const TRANSPILED_MARKER: &str = "/* transpiled */";

impl Transformer for FakeTransformer {
    fn transpile(
        &self,
        runtime: &dyn StyleRuntime,
        _extension: ThemeExtension,
        source: &Path,
        dest: &Path,
    ) -> RuntimeResult<()> {
        self.transpiled.lock().unwrap().push(source.to_path_buf());
        if self.skip_transpile_output {
            return Ok(());
        }
        let content = runtime.file_read_string(source)?;
        runtime.file_write(dest, format!("{}\n{}", TRANSPILED_MARKER, content).as_bytes())
    }

    fn minify(&self, css: &str, filename: &Path) -> RuntimeResult<String> {
        self.minified.lock().unwrap().push(filename.to_path_buf());
        Ok(css.split_whitespace().collect::<Vec<_>>().join(" "))
    }
}

/// Write `contents` to `root/relative`, creating parent directories.
pub fn write_file(root: &Path, relative: &str, contents: &str) -> PathBuf {
    let path = root.join(relative);
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).unwrap();
    }
    std::fs::write(&path, contents).unwrap();
    path
}

pub fn read_file(path: &Path) -> String {
    std::fs::read_to_string(path).unwrap()
}

/// Position of `needle` in `haystack`, panicking with context when absent.
pub fn position(haystack: &str, needle: &str) -> usize {
    haystack
        .find(needle)
        .unwrap_or_else(|| panic!("{:?} not found in:\n{}", needle, haystack))
}
