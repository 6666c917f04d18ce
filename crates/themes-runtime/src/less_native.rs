//! LESS compilation through the external `lessc` binary.
//!
//! There is no LESS compiler in the Rust ecosystem, so the transpile step
//! shells out to the reference implementation. The binary is located via
//! `THEMES_LESSC` first, then PATH.

use std::path::Path;

use crate::traits::{RuntimeError, RuntimeResult, StyleRuntime};

/// Environment variable that may point at a specific `lessc` binary.
pub const LESSC_ENV_VAR: &str = "THEMES_LESSC";

/// Transpile a LESS file to CSS and write the result to `dest`.
///
/// Equivalent to `lessc <source> > <dest>`.
pub fn compile_less_file(
    runtime: &dyn StyleRuntime,
    source: &Path,
    dest: &Path,
) -> RuntimeResult<()> {
    if !runtime.is_file(source)? {
        return Err(RuntimeError::NotFound(source.to_path_buf()));
    }

    let lessc = runtime.find_binary("lessc", LESSC_ENV_VAR).ok_or_else(|| {
        RuntimeError::NotSupported(format!(
            "lessc not found on PATH (set {} to override)",
            LESSC_ENV_VAR
        ))
    })?;

    let source_arg = source.to_string_lossy();
    let output = runtime.exec_command(&lessc.to_string_lossy(), &[source_arg.as_ref()])?;
    if !output.success() {
        return Err(RuntimeError::ProcessFailed {
            code: output.code,
            message: output.stderr_string(),
        });
    }

    runtime.file_write(dest, &output.stdout)
}
