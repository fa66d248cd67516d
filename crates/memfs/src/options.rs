// SPDX-FileCopyrightText: 2025 Caspar Water Company
//
// SPDX-License-Identifier: Apache-2.0

//! Construction-time configuration and open flags.

use std::sync::Arc;

use crate::error::{Error, Result};

/// Called on every read-open of a non-directory path with the path, the
/// content the open would have produced (already decrypted) and the error it
/// would have produced. `Ok(Some(bytes))` replaces the outcome, `Ok(None)`
/// keeps it unchanged and `Err` is returned to the caller.
pub type OpenHook =
    Arc<dyn Fn(&str, Option<&[u8]>, Option<&Error>) -> Result<Option<Vec<u8>>> + Send + Sync>;

/// Filesystem configuration, fixed at construction except for the
/// encryption key and storage limit which have explicit setters.
///
/// ```
/// use memfs::{MemFs, Options};
///
/// let fs = MemFs::with_options(
///     Options::new()
///         .with_max_storage(1 << 20)
///         .with_encryption("my-secret-encryption-key"),
/// );
/// assert_eq!(fs.max_storage(), Some(1 << 20));
/// ```
#[derive(Clone, Default)]
pub struct Options {
    pub(crate) max_storage: Option<u64>,
    pub(crate) encryption_key: Option<Vec<u8>>,
    pub(crate) open_hook: Option<OpenHook>,
}

impl Options {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Caps total stored bytes (post-encryption). Zero means unlimited.
    #[must_use]
    pub fn with_max_storage(mut self, bytes: u64) -> Self {
        self.max_storage = Some(bytes);
        self
    }

    /// Enables encryption at rest. The key may be any length; it is never
    /// stored with the filesystem or in snapshots.
    #[must_use]
    pub fn with_encryption(mut self, key: impl AsRef<[u8]>) -> Self {
        self.encryption_key = Some(key.as_ref().to_vec());
        self
    }

    #[must_use]
    pub fn with_open_hook<F>(mut self, hook: F) -> Self
    where
        F: Fn(&str, Option<&[u8]>, Option<&Error>) -> Result<Option<Vec<u8>>> + Send + Sync + 'static,
    {
        self.open_hook = Some(Arc::new(hook));
        self
    }
}

impl std::fmt::Debug for Options {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Options")
            .field("max_storage", &self.max_storage)
            .field("encryption", &self.encryption_key.is_some())
            .field("open_hook", &self.open_hook.is_some())
            .finish()
    }
}

/// Flags for [`MemFs::open_file`](crate::MemFs::open_file), in the manner
/// of `std::fs::OpenOptions`. `write` covers both write-only and read-write.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct OpenOptions {
    read: bool,
    write: bool,
    create: bool,
    truncate: bool,
    append: bool,
}

/// How an open request will be served.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Dispatch {
    /// Plain read-open, hook applied, directories allowed.
    Read,
    /// Create if missing, then read.
    CreateThenRead,
    /// Write handle on an existing file, optionally creating it first.
    Write { create: bool, truncate: bool },
}

impl OpenOptions {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn read_only() -> Self {
        Self::new().read(true)
    }

    #[must_use]
    pub fn read(mut self, read: bool) -> Self {
        self.read = read;
        self
    }

    #[must_use]
    pub fn write(mut self, write: bool) -> Self {
        self.write = write;
        self
    }

    #[must_use]
    pub fn create(mut self, create: bool) -> Self {
        self.create = create;
        self
    }

    #[must_use]
    pub fn truncate(mut self, truncate: bool) -> Self {
        self.truncate = truncate;
        self
    }

    /// Accepted alongside `write`; write handles always append to what the
    /// file holds at open time.
    #[must_use]
    pub fn append(mut self, append: bool) -> Self {
        self.append = append;
        self
    }

    /// Read access is implied by every open that is not a write; the flag
    /// is kept only so callers can round-trip what they asked for.
    #[must_use]
    pub fn is_read(&self) -> bool {
        self.read
    }

    #[must_use]
    pub fn is_write(&self) -> bool {
        self.write
    }

    pub(crate) fn dispatch(&self) -> Result<Dispatch> {
        match (self.write, self.create, self.truncate, self.append) {
            (true, create, truncate, _) => Ok(Dispatch::Write { create, truncate }),
            (false, false, false, false) => Ok(Dispatch::Read),
            (false, true, false, false) => Ok(Dispatch::CreateThenRead),
            _ => Err(Error::unsupported(format!("{self:?}"))),
        }
    }
}
