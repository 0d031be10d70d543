use std::path::PathBuf;

use thiserror::Error;

use crate::catalog::error::CatalogError;

#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("{0:?} is not a safe path component")]
    UnsafePathComponent(String),

    #[error("Download failed for {url}: {source}")]
    DownloadFailed {
        url: String,
        #[source]
        source: CatalogError,
    },

    #[error("Download failed for {url}: payload is empty")]
    EmptyPayload { url: String },

    #[error("IO error at {path:?}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to extract {path:?}: {source}")]
    Extract {
        path: PathBuf,
        #[source]
        source: zip::result::ZipError,
    },

    #[error("Failed to write installation instructions {path:?}: {source}")]
    Instructions {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Background task failed: {0}")]
    Task(String),
}

impl PipelineError {
    pub(crate) fn io(path: impl Into<PathBuf>) -> impl FnOnce(std::io::Error) -> Self {
        let path = path.into();
        move |source| PipelineError::Io { path, source }
    }
}
