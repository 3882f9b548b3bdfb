//! Error types for the storage layer.

use std::{error::Error, fmt, io};

use snafu::{Backtrace, IntoError, prelude::*};

/// Errors produced by the storage backend implementation.
///
/// Only the local filesystem is supported; backend-specific I/O errors are
/// wrapped here so higher layers can map them into StorageError variants
/// with path context.
#[derive(Debug)]
pub enum BackendError {
    /// A local filesystem I/O error.
    Local(io::Error),
}

impl fmt::Display for BackendError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BackendError::Local(e) => write!(f, "local I/O error: {e}"),
        }
    }
}

impl Error for BackendError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            BackendError::Local(e) => Some(e),
        }
    }
}

/// Errors that can occur during storage operations.
#[derive(Debug, Snafu)]
#[snafu(visibility(pub(crate)))]
pub enum StorageError {
    /// The specified path was not found.
    #[snafu(display("Path not found: {path}"))]
    NotFound {
        /// The path that was not found.
        path: String,
        /// Underlying backend error that caused the failure.
        source: BackendError,
        /// The backtrace at the time the error occurred.
        backtrace: Backtrace,
    },

    /// An I/O error occurred on the local filesystem.
    #[snafu(display("Local I/O error at {path}: {source}"))]
    OtherIo {
        /// The path where the I/O error occurred.
        path: String,
        /// Underlying backend I/O error with platform-specific details.
        source: BackendError,
        /// The backtrace at the time the error occurred.
        backtrace: Backtrace,
    },

    /// The target path has no file name component to stage next to.
    #[snafu(display("Target path has no file name: {path}"))]
    NoFileName {
        /// The offending target path.
        path: String,
        /// The backtrace captured when the error occurred.
        backtrace: Backtrace,
    },
}

impl StorageError {
    /// Classify an `io::Error` raised at `path`.
    pub(crate) fn from_io(path: &std::path::Path, e: io::Error) -> StorageError {
        let path = path.display().to_string();
        if e.kind() == io::ErrorKind::NotFound {
            NotFoundSnafu { path }.into_error(BackendError::Local(e))
        } else {
            OtherIoSnafu { path }.into_error(BackendError::Local(e))
        }
    }
}
