//! Error types for themes-bundler

use std::path::PathBuf;

use themes_runtime::RuntimeError;

#[derive(Debug, thiserror::Error)]
pub enum BundlerError {
    #[error("Runtime error: {0}")]
    Runtime(#[from] RuntimeError),

    #[error("Failed to parse theme config {path}: {message}")]
    ConfigParse { path: PathBuf, message: String },

    #[error("Failed to write {path}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: RuntimeError,
    },

    #[error("Transform failed for theme '{theme}': {source}")]
    Transform {
        theme: String,
        #[source]
        source: RuntimeError,
    },

    #[error("Expected build artifact is missing: {0}")]
    MissingArtifact(PathBuf),

    #[error("Watch error: {0}")]
    Watch(String),
}

pub type Result<T> = std::result::Result<T, BundlerError>;
