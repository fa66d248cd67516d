// SPDX-FileCopyrightText: 2025 Caspar Water Company
//
// SPDX-License-Identifier: Apache-2.0

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Size reported for every directory.
pub const DIR_SIZE: u64 = 4096;

/// Node type identifiers for directory entries and snapshots
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EntryType {
    /// Regular file entry
    File,
    /// Directory entry
    Directory,
}

impl EntryType {
    pub fn as_str(&self) -> &'static str {
        match self {
            EntryType::File => "file",
            EntryType::Directory => "directory",
        }
    }

    #[must_use]
    pub fn is_dir(&self) -> bool {
        matches!(self, EntryType::Directory)
    }
}

impl std::fmt::Display for EntryType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Result of `stat` on a node or an open handle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Metadata {
    /// Base name; the root directory has an empty name
    pub name: String,
    /// Stored bytes for files (decrypted length for read handles), [`DIR_SIZE`] for directories
    pub size: u64,
    /// Permission bits, recorded but never enforced
    pub mode: u32,
    pub modified: DateTime<Utc>,
    pub entry_type: EntryType,
}

impl Metadata {
    #[must_use]
    pub fn is_dir(&self) -> bool {
        self.entry_type.is_dir()
    }

    #[must_use]
    pub fn is_file(&self) -> bool {
        !self.is_dir()
    }
}

/// One entry of a directory listing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DirEntry {
    metadata: Metadata,
}

impl DirEntry {
    pub(crate) fn new(metadata: Metadata) -> Self {
        Self { metadata }
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.metadata.name
    }

    #[must_use]
    pub fn is_dir(&self) -> bool {
        self.metadata.is_dir()
    }

    #[must_use]
    pub fn entry_type(&self) -> EntryType {
        self.metadata.entry_type
    }

    #[must_use]
    pub fn metadata(&self) -> &Metadata {
        &self.metadata
    }
}
