use std::io;
use std::path::PathBuf;

use thiserror::Error;

/// Why a single record (sidecar, media file or album) did not reach its
/// normal disposition.
#[derive(Error, Debug)]
pub enum RecordError {
    #[error("malformed metadata {path}: {reason}")]
    MalformedMetadata { path: PathBuf, reason: String },

    #[error("no media file matches {declared}")]
    UnmatchedMedia { declared: PathBuf },

    #[error("cannot decode {path} for comparison")]
    UndecodableDuplicateCandidate { path: PathBuf },

    #[error("directory left in place, {remaining} entries remain: {path}")]
    DirectoryNotEmpty { path: PathBuf, remaining: usize },

    #[error("source vanished before it could be handled: {path}")]
    SourceVanished { path: PathBuf },

    #[error("no free name left for {path}")]
    SuffixExhausted { path: PathBuf },

    #[error("filesystem error on {path}: {source}")]
    Filesystem {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

impl RecordError {
    /// Map an I/O failure on `path`. A missing source is not an error for an
    /// idempotent re-run, so `NotFound` becomes `SourceVanished`.
    pub fn from_io(path: impl Into<PathBuf>, source: io::Error) -> Self {
        let path = path.into();
        if source.kind() == io::ErrorKind::NotFound {
            RecordError::SourceVanished { path }
        } else {
            RecordError::Filesystem { path, source }
        }
    }

    /// Only a broken filesystem aborts the run; everything else is recovered
    /// at record granularity.
    pub fn is_fatal(&self) -> bool {
        matches!(self, RecordError::Filesystem { .. })
    }
}

/// Errors raised while loading or validating a [`crate::Config`].
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("failed to read config {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("failed to parse config {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("invalid folder name for `{field}`: {value:?}")]
    InvalidFolderName { field: &'static str, value: String },

    #[error("root directory not found: {path}")]
    MissingRoot { path: PathBuf },
}
