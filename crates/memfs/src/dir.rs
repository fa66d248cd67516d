// SPDX-FileCopyrightText: 2025 Caspar Water Company
//
// SPDX-License-Identifier: Apache-2.0

use std::sync::Arc;

use crate::error::{Error, Result};
use crate::metadata::{DirEntry, Metadata};
use crate::node::DirNode;

/// Handle for listing a directory in batches.
///
/// The cursor remembers the last name returned, so entries added or removed
/// between calls never cause an entry to be returned twice.
#[derive(Debug)]
pub struct DirReader {
    /// `None` once closed.
    dir: Option<Arc<DirNode>>,
    after: Option<String>,
}

impl DirReader {
    pub(crate) fn new(dir: Arc<DirNode>) -> Self {
        Self {
            dir: Some(dir),
            after: None,
        }
    }

    fn dir(&self) -> Result<&Arc<DirNode>> {
        self.dir.as_ref().ok_or(Error::Closed)
    }

    /// Returns up to `count` entries following those already returned, or
    /// all remaining entries when `count <= 0`. An empty batch means the
    /// listing is exhausted.
    pub fn read_dir(&mut self, count: isize) -> Result<Vec<DirEntry>> {
        let limit = usize::try_from(count).ok().filter(|&n| n > 0);
        let batch = self.dir()?.entries_after(self.after.as_deref(), limit);

        if let Some((last, _)) = batch.last() {
            self.after = Some(last.clone());
        }

        // Directory guard already released; per-file metadata is safe to read.
        Ok(batch
            .into_iter()
            .map(|(_, node)| DirEntry::new(node.metadata()))
            .collect())
    }

    pub fn stat(&self) -> Result<Metadata> {
        Ok(self.dir()?.metadata())
    }

    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.dir.is_none()
    }

    pub fn close(&mut self) -> Result<()> {
        self.dir.take().map(|_| ()).ok_or(Error::Closed)
    }
}
