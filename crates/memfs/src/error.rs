// SPDX-FileCopyrightText: 2025 Caspar Water Company
//
// SPDX-License-Identifier: Apache-2.0

use std::io;

pub type Result<T> = std::result::Result<T, Error>;

/// Errors produced by filesystem operations.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("invalid path: {0}")]
    InvalidPath(String),

    #[error("no such file or directory: {0}")]
    NotExist(String),

    #[error("is a directory: {0}")]
    IsADirectory(String),

    #[error("not a directory: {0}")]
    NotADirectory(String),

    #[error("directory not empty: {0}")]
    DirectoryNotEmpty(String),

    #[error("file already closed")]
    Closed,

    #[error("storage limit exceeded: {requested} bytes requested, {used} of {limit} in use")]
    LimitExceeded { requested: u64, used: u64, limit: u64 },

    #[error("decryption failed: {0}")]
    DecryptionFailed(String),

    #[error("unsupported open flags: {0}")]
    Unsupported(String),

    #[error("invalid operation: {0}")]
    Invalid(String),

    #[error("encryption failed: {0}")]
    Encryption(String),

    #[error("snapshot error: {0}")]
    Snapshot(String),

    #[error("IO error: {0}")]
    Io(#[from] io::Error),
}

/// Error categories callers can branch on without matching message text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    InvalidPath,
    NotExist,
    IsADirectory,
    NotADirectory,
    DirectoryNotEmpty,
    Closed,
    LimitExceeded,
    DecryptionFailed,
    Unsupported,
    Invalid,
    Encryption,
    Snapshot,
    Io,
}

impl Error {
    pub fn invalid_path(path: impl Into<String>) -> Self {
        Self::InvalidPath(path.into())
    }

    pub fn not_exist(path: impl Into<String>) -> Self {
        Self::NotExist(path.into())
    }

    pub fn is_a_directory(path: impl Into<String>) -> Self {
        Self::IsADirectory(path.into())
    }

    pub fn not_a_directory(path: impl Into<String>) -> Self {
        Self::NotADirectory(path.into())
    }

    pub fn directory_not_empty(path: impl Into<String>) -> Self {
        Self::DirectoryNotEmpty(path.into())
    }

    pub fn decryption_failed(msg: impl Into<String>) -> Self {
        Self::DecryptionFailed(msg.into())
    }

    pub fn unsupported(msg: impl Into<String>) -> Self {
        Self::Unsupported(msg.into())
    }

    pub fn invalid(msg: impl Into<String>) -> Self {
        Self::Invalid(msg.into())
    }

    pub fn snapshot(msg: impl Into<String>) -> Self {
        Self::Snapshot(msg.into())
    }

    #[must_use]
    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::InvalidPath(_) => ErrorKind::InvalidPath,
            Error::NotExist(_) => ErrorKind::NotExist,
            Error::IsADirectory(_) => ErrorKind::IsADirectory,
            Error::NotADirectory(_) => ErrorKind::NotADirectory,
            Error::DirectoryNotEmpty(_) => ErrorKind::DirectoryNotEmpty,
            Error::Closed => ErrorKind::Closed,
            Error::LimitExceeded { .. } => ErrorKind::LimitExceeded,
            Error::DecryptionFailed(_) => ErrorKind::DecryptionFailed,
            Error::Unsupported(_) => ErrorKind::Unsupported,
            Error::Invalid(_) => ErrorKind::Invalid,
            Error::Encryption(_) => ErrorKind::Encryption,
            Error::Snapshot(_) => ErrorKind::Snapshot,
            Error::Io(_) => ErrorKind::Io,
        }
    }

    #[must_use]
    pub fn is_not_exist(&self) -> bool {
        self.kind() == ErrorKind::NotExist
    }

    /// Recovers a filesystem error that travelled through `std::io`
    /// (for example out of a `Read` impl). Other IO errors are wrapped.
    #[must_use]
    pub fn from_io(err: io::Error) -> Self {
        if !err.get_ref().is_some_and(|inner| inner.is::<Error>()) {
            return Error::Io(err);
        }
        let kind = err.kind();
        match err.into_inner().map(|inner| inner.downcast::<Error>()) {
            Some(Ok(e)) => *e,
            _ => Error::Io(io::Error::from(kind)),
        }
    }

    fn io_kind(&self) -> io::ErrorKind {
        match self {
            Error::InvalidPath(_) | Error::Invalid(_) => io::ErrorKind::InvalidInput,
            Error::NotExist(_) => io::ErrorKind::NotFound,
            Error::IsADirectory(_) => io::ErrorKind::IsADirectory,
            Error::NotADirectory(_) => io::ErrorKind::NotADirectory,
            Error::DirectoryNotEmpty(_) => io::ErrorKind::DirectoryNotEmpty,
            Error::Closed => io::ErrorKind::BrokenPipe,
            Error::LimitExceeded { .. } => io::ErrorKind::StorageFull,
            Error::DecryptionFailed(_) | Error::Snapshot(_) => io::ErrorKind::InvalidData,
            Error::Unsupported(_) => io::ErrorKind::Unsupported,
            Error::Encryption(_) => io::ErrorKind::Other,
            Error::Io(e) => e.kind(),
        }
    }
}

/// Convert Error to std::io::Error so handles can implement Read/Write/Seek.
impl From<Error> for io::Error {
    fn from(e: Error) -> Self {
        match e {
            Error::Io(inner) => inner,
            other => io::Error::new(other.io_kind(), other),
        }
    }
}
