// SPDX-FileCopyrightText: 2025 Caspar Water Company
//
// SPDX-License-Identifier: Apache-2.0

//! MemFS - an in-memory hierarchical filesystem
//!
//! Files and directories live entirely in process memory, addressed by
//! clean slash-separated relative paths (`"."` is the root). On top of the
//! tree sit a shared storage limit, optional AES-256-GCM encryption at rest,
//! an optional hook that can rewrite what read-opens return, and
//! save/load of the whole tree as a (optionally zstd-compressed) snapshot.
//!
//! Set MEMFS_LOG environment variable to control logging (see the
//! `diagnostics` crate) and call [`init_diagnostics`] once at startup.

use std::sync::{Mutex, MutexGuard, PoisonError};

// Re-export diagnostics for convenience
pub use diagnostics::init_diagnostics;

pub mod cipher;
pub mod dir;
pub mod error;
pub mod file;
pub mod fs;
pub mod metadata;
pub mod node;
pub mod options;
pub mod path;
pub mod quota;
pub mod snapshot;

pub use cipher::Cipher;
pub use dir::DirReader;
pub use error::{Error, ErrorKind, Result};
pub use file::{FileReader, FileWriter};
pub use fs::{MemFs, OpenedFile};
pub use metadata::{DirEntry, EntryType, Metadata};
pub use options::{OpenHook, OpenOptions, Options};
pub use quota::Quota;
pub use snapshot::FORMAT_VERSION;

/// Takes a guard, recovering it if a previous holder panicked. No guarded
/// state is left half-updated by any operation in this crate.
pub(crate) fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

#[cfg(test)]
mod tests;
