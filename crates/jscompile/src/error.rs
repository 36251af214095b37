//! Error taxonomy for a single build invocation.
//!
//! Every failure aborts the pipeline; nothing is retried. Each variant knows
//! which [`Stage`] produced it so the CLI can name the failing stage.

use std::fmt;
use std::io;
use std::path::PathBuf;

use thiserror::Error;

/// Result alias used throughout the pipeline
pub type BuildResult<T> = Result<T, BuildError>;

/// Pipeline stage an error originated from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Request,
    Manifest,
    Aggregate,
    Minify,
    Emit,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Request => "request",
            Self::Manifest => "manifest",
            Self::Aggregate => "aggregate",
            Self::Minify => "minify",
            Self::Emit => "emit",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Error)]
pub enum BuildError {
    /// Bad option combination, e.g. no include sets requested
    #[error("invalid build request: {reason}")]
    InvalidRequest { reason: String },

    #[error("include set '{name}' not found: {path:?}")]
    ManifestNotFound { name: String, path: PathBuf },

    #[error("failed to read include set '{name}' from {path:?}")]
    ManifestUnreadable {
        name: String,
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// The manifest exists but is not a JSON array of strings
    #[error("include set '{name}' in {path:?} is not a JSON array of file paths")]
    ManifestParseError {
        name: String,
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("failed to read source file {path:?}")]
    SourceFileUnreadable {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// The intermediate concatenation could not be created or written
    #[error("failed to write intermediate artifact {path:?}")]
    ArtifactWriteError {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("minifier failed ({}){}", describe_exit(.exit_code), describe_diagnostics(.diagnostics))]
    MinificationFailed {
        exit_code: Option<i32>,
        diagnostics: String,
    },

    #[error("failed to write {path:?}")]
    OutputWriteError {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

impl BuildError {
    /// The pipeline stage that failed
    pub const fn stage(&self) -> Stage {
        match self {
            Self::InvalidRequest { .. } => Stage::Request,
            Self::ManifestNotFound { .. }
            | Self::ManifestUnreadable { .. }
            | Self::ManifestParseError { .. } => Stage::Manifest,
            Self::SourceFileUnreadable { .. } | Self::ArtifactWriteError { .. } => {
                Stage::Aggregate
            }
            Self::MinificationFailed { .. } => Stage::Minify,
            Self::OutputWriteError { .. } => Stage::Emit,
        }
    }

    pub(crate) fn invalid_request(reason: impl Into<String>) -> Self {
        Self::InvalidRequest {
            reason: reason.into(),
        }
    }

    pub(crate) fn artifact_write(path: impl Into<PathBuf>, source: io::Error) -> Self {
        Self::ArtifactWriteError {
            path: path.into(),
            source,
        }
    }

    pub(crate) fn output_write(path: impl Into<PathBuf>, source: io::Error) -> Self {
        Self::OutputWriteError {
            path: path.into(),
            source,
        }
    }
}

fn describe_exit(exit_code: &Option<i32>) -> String {
    match exit_code {
        Some(code) => format!("exit code {code}"),
        None => "no exit code".to_owned(),
    }
}

fn describe_diagnostics(diagnostics: &str) -> String {
    let trimmed = diagnostics.trim_end();
    if trimmed.is_empty() {
        String::new()
    } else {
        format!(":\n{trimmed}")
    }
}
