/*
 * traits.rs
 *
 * The StyleRuntime capability trait and its error type.
 */

use std::io;
use std::path::{Path, PathBuf};

pub type RuntimeResult<T> = Result<T, RuntimeError>;

/// Failure of a file-system, process or compiler operation.
#[derive(Debug)]
pub enum RuntimeError {
    Io(io::Error),

    /// An input file or executable does not exist
    NotFound(PathBuf),

    /// The operation cannot be performed here (no `lessc` on this machine,
    /// or a stylesheet family without a transpiler)
    NotSupported(String),

    /// An external compiler exited unsuccessfully
    ProcessFailed {
        /// Exit status, -1 when the process was killed by a signal
        code: i32,
        /// Captured stderr
        message: String,
    },

    /// grass rejected the stylesheet
    SassError(String),
}

impl std::fmt::Display for RuntimeError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RuntimeError::Io(e) => write!(f, "I/O error: {}", e),
            RuntimeError::NotFound(path) => write!(f, "{} does not exist", path.display()),
            RuntimeError::NotSupported(msg) => write!(f, "not supported: {}", msg),
            RuntimeError::ProcessFailed { code, message } => {
                write!(f, "compiler exited with status {}: {}", code, message.trim_end())
            }
            RuntimeError::SassError(msg) => write!(f, "SCSS error: {}", msg),
        }
    }
}

impl std::error::Error for RuntimeError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            RuntimeError::Io(e) => Some(e),
            _ => None,
        }
    }
}

impl From<io::Error> for RuntimeError {
    fn from(e: io::Error) -> Self {
        RuntimeError::Io(e)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PathKind {
    File,
    Directory,
}

/// Exit status and captured streams of an external compiler run.
#[derive(Debug, Clone)]
pub struct CommandOutput {
    pub code: i32,
    pub stdout: Vec<u8>,
    pub stderr: Vec<u8>,
}

impl CommandOutput {
    pub fn success(&self) -> bool {
        self.code == 0
    }

    pub fn stderr_string(&self) -> String {
        String::from_utf8_lossy(&self.stderr).into_owned()
    }
}

/// Everything the bundler needs from its host.
///
/// Theme discovery, merging, artifact writes, exports and cleanup all go
/// through this trait. Tests wrap `NativeRuntime` in a decorator to record
/// writes or make them fail.
pub trait StyleRuntime: Send + Sync {
    // ── files ──────────────────────────────────────────────────────────────

    fn file_read(&self, path: &Path) -> RuntimeResult<Vec<u8>>;

    /// Read a stylesheet as UTF-8 text.
    fn file_read_string(&self, path: &Path) -> RuntimeResult<String> {
        String::from_utf8(self.file_read(path)?).map_err(|e| {
            RuntimeError::Io(io::Error::new(
                io::ErrorKind::InvalidData,
                format!("{} is not valid UTF-8: {}", path.display(), e),
            ))
        })
    }

    /// Create or truncate `path` and write `contents`.
    fn file_write(&self, path: &Path, contents: &[u8]) -> RuntimeResult<()>;

    /// Whether `path` exists, and is of `kind` when one is given.
    ///
    /// A missing path is `Ok(false)`, never an error.
    fn path_exists(&self, path: &Path, kind: Option<PathKind>) -> RuntimeResult<bool>;

    fn is_file(&self, path: &Path) -> RuntimeResult<bool> {
        self.path_exists(path, Some(PathKind::File))
    }

    fn is_dir(&self, path: &Path) -> RuntimeResult<bool> {
        self.path_exists(path, Some(PathKind::Directory))
    }

    /// Copy `src` over `dst`. The parent of `dst` must exist.
    fn file_copy(&self, src: &Path, dst: &Path) -> RuntimeResult<()>;

    fn file_remove(&self, path: &Path) -> RuntimeResult<()>;

    // ── directories ────────────────────────────────────────────────────────

    fn dir_create(&self, path: &Path, recursive: bool) -> RuntimeResult<()>;

    /// Base for `{cwd}` pattern expansion and relative theme paths.
    fn cwd(&self) -> RuntimeResult<PathBuf>;

    // ── processes ──────────────────────────────────────────────────────────

    /// Run `command` to completion, capturing stdout and stderr.
    ///
    /// A non-zero exit is reported through `CommandOutput::code`, not as an
    /// error; a command that cannot be spawned because it does not exist is
    /// `NotFound`.
    fn exec_command(&self, command: &str, args: &[&str]) -> RuntimeResult<CommandOutput>;

    fn env_get(&self, name: &str) -> RuntimeResult<Option<String>>;

    /// Locate an executable: the file named by `env_var` if set, otherwise
    /// nothing. `NativeRuntime` additionally searches PATH.
    fn find_binary(&self, name: &str, env_var: &str) -> Option<PathBuf> {
        let _ = name;
        let path = PathBuf::from(self.env_get(env_var).ok().flatten()?);
        self.is_file(&path).unwrap_or(false).then_some(path)
    }
}
