/*
 * native.rs
 *
 * NativeRuntime: full system access using std.
 */

use std::fs;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};

use crate::traits::{CommandOutput, PathKind, RuntimeError, RuntimeResult, StyleRuntime};

/// Runtime backed by the local file system and process table.
#[derive(Debug, Default, Clone, Copy)]
pub struct NativeRuntime;

impl NativeRuntime {
    pub fn new() -> Self {
        Self
    }
}

impl StyleRuntime for NativeRuntime {
    fn file_read(&self, path: &Path) -> RuntimeResult<Vec<u8>> {
        Ok(fs::read(path)?)
    }

    fn file_write(&self, path: &Path, contents: &[u8]) -> RuntimeResult<()> {
        Ok(fs::write(path, contents)?)
    }

    fn path_exists(&self, path: &Path, kind: Option<PathKind>) -> RuntimeResult<bool> {
        let metadata = match fs::metadata(path) {
            Ok(metadata) => metadata,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(false),
            Err(e) => return Err(e.into()),
        };
        Ok(match kind {
            None => true,
            Some(PathKind::File) => metadata.is_file(),
            Some(PathKind::Directory) => metadata.is_dir(),
        })
    }

    fn file_copy(&self, src: &Path, dst: &Path) -> RuntimeResult<()> {
        fs::copy(src, dst)?;
        Ok(())
    }

    fn file_remove(&self, path: &Path) -> RuntimeResult<()> {
        Ok(fs::remove_file(path)?)
    }

    fn dir_create(&self, path: &Path, recursive: bool) -> RuntimeResult<()> {
        if recursive {
            fs::create_dir_all(path)?;
        } else {
            fs::create_dir(path)?;
        }
        Ok(())
    }

    fn cwd(&self) -> RuntimeResult<PathBuf> {
        Ok(std::env::current_dir()?)
    }

    fn exec_command(&self, command: &str, args: &[&str]) -> RuntimeResult<CommandOutput> {
        let output = Command::new(command)
            .args(args)
            .stdin(Stdio::null())
            .output()
            .map_err(|e| {
                if e.kind() == std::io::ErrorKind::NotFound {
                    RuntimeError::NotFound(PathBuf::from(command))
                } else {
                    RuntimeError::Io(e)
                }
            })?;

        Ok(CommandOutput {
            code: output.status.code().unwrap_or(-1),
            stdout: output.stdout,
            stderr: output.stderr,
        })
    }

    fn env_get(&self, name: &str) -> RuntimeResult<Option<String>> {
        Ok(std::env::var(name).ok())
    }

    fn find_binary(&self, name: &str, env_var: &str) -> Option<PathBuf> {
        if let Ok(Some(path_str)) = self.env_get(env_var) {
            let path = PathBuf::from(path_str);
            if self.is_file(&path).unwrap_or(false) {
                return Some(path);
            }
        }
        which::which(name).ok()
    }
}
