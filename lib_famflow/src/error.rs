use std::{path::PathBuf, time::Duration};

use thiserror::Error;

use crate::store::ArtifactKind;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Error)]
pub enum Error {
    #[error("File not found: {0:?}")]
    NotFound(PathBuf),

    #[error("Parse error in {path:?} on line {line}: {reason}")]
    Parse {
        path: PathBuf,
        line: usize,
        reason: String,
    },

    #[error("The executable {tool:?} was not found on the search path")]
    ToolNotFound { tool: String },

    #[error("Family {family}: the {kind} artifact {path:?} is missing")]
    InputMissing {
        family: String,
        kind: ArtifactKind,
        path: PathBuf,
    },

    #[error("Family {family}: {tool} failed ({detail})")]
    ToolExecutionFailed {
        family: String,
        tool: String,
        /// Exit code of the process, if it exited normally.
        status: Option<i32>,
        detail: String,
    },

    #[error("Family {family}: {tool} did not finish within {timeout:?}")]
    Timeout {
        family: String,
        tool: String,
        timeout: Duration,
    },

    #[error("Family {family}: malformed tree in {path:?}: {source}")]
    MalformedTree {
        family: String,
        path: PathBuf,
        #[source]
        source: lib_famshow::error::Error,
    },

    #[error("Unable to load the shared resource {path:?}: {reason}")]
    ResourceLoadFailed { path: PathBuf, reason: String },

    #[error("Invalid configuration: {0}")]
    Config(String),

    #[error("Unable to create the worker pool: {0}")]
    WorkerPool(#[from] rayon::ThreadPoolBuildError),

    #[error("I/O error on {path:?}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl Error {
    /// Fatal errors abort the whole run, all others only concern a single family.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            Self::ToolNotFound { .. }
                | Self::ResourceLoadFailed { .. }
                | Self::Config(_)
                | Self::WorkerPool(_)
        )
    }

    /// Wraps an I/O error with the path it occurred on.
    ///
    /// Missing files become [`Error::NotFound`].
    pub fn io(path: impl Into<PathBuf>) -> impl FnOnce(std::io::Error) -> Self {
        let path = path.into();
        move |source| {
            if source.kind() == std::io::ErrorKind::NotFound {
                Self::NotFound(path)
            } else {
                Self::Io { path, source }
            }
        }
    }
}
