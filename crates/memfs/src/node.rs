// SPDX-FileCopyrightText: 2025 Caspar Water Company
//
// SPDX-License-Identifier: Apache-2.0

//! Directory and file nodes.
//!
//! Every directory owns a guard over its own child mapping and nothing else.
//! Methods here take that guard for the duration of one call and never take
//! a second directory guard while holding it.

use std::collections::BTreeMap;
use std::sync::{Arc, Mutex, MutexGuard};

use chrono::{DateTime, Utc};

use crate::error::{Error, Result};
use crate::lock;
use crate::metadata::{DIR_SIZE, DirEntry, EntryType, Metadata};

/// Default mode for files made by `create`.
pub const DEFAULT_FILE_MODE: u32 = 0o666;
/// Mode of the root directory.
pub const ROOT_DIR_MODE: u32 = 0o755;

/// A child of a directory.
#[derive(Clone, Debug)]
pub enum Node {
    Directory(Arc<DirNode>),
    File(Arc<FileNode>),
}

impl Node {
    #[must_use]
    pub fn name(&self) -> &str {
        match self {
            Node::Directory(d) => d.name(),
            Node::File(f) => f.name(),
        }
    }

    #[must_use]
    pub fn entry_type(&self) -> EntryType {
        match self {
            Node::Directory(_) => EntryType::Directory,
            Node::File(_) => EntryType::File,
        }
    }

    #[must_use]
    pub fn metadata(&self) -> Metadata {
        match self {
            Node::Directory(d) => d.metadata(),
            Node::File(f) => f.metadata(),
        }
    }

    /// Identity comparison: the same node, not merely equal contents.
    #[must_use]
    pub fn same_node(&self, other: &Node) -> bool {
        match (self, other) {
            (Node::Directory(a), Node::Directory(b)) => Arc::ptr_eq(a, b),
            (Node::File(a), Node::File(b)) => Arc::ptr_eq(a, b),
            _ => false,
        }
    }
}

/// Mutable part of a file, behind the file's own guard.
#[derive(Debug)]
pub(crate) struct FileState {
    pub(crate) mode: u32,
    pub(crate) modified: DateTime<Utc>,
    pub(crate) content: Vec<u8>,
}

/// A file node. Content is whatever was last committed: ciphertext when a
/// key was active at commit time, plaintext otherwise.
#[derive(Debug)]
pub struct FileNode {
    name: String,
    state: Mutex<FileState>,
}

impl FileNode {
    pub(crate) fn new(name: impl Into<String>, mode: u32, content: Vec<u8>) -> Arc<Self> {
        Self::restore(name, mode, Utc::now(), content)
    }

    pub(crate) fn restore(
        name: impl Into<String>,
        mode: u32,
        modified: DateTime<Utc>,
        content: Vec<u8>,
    ) -> Arc<Self> {
        Arc::new(Self {
            name: name.into(),
            state: Mutex::new(FileState {
                mode,
                modified,
                content,
            }),
        })
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    pub(crate) fn state(&self) -> MutexGuard<'_, FileState> {
        lock(&self.state)
    }

    /// Length of the stored bytes.
    #[must_use]
    pub fn stored_size(&self) -> u64 {
        self.state().content.len() as u64
    }

    /// Copy of the stored bytes, exactly as held.
    #[must_use]
    pub fn stored_content(&self) -> Vec<u8> {
        self.state().content.clone()
    }

    #[must_use]
    pub fn metadata(&self) -> Metadata {
        let state = self.state();
        Metadata {
            name: self.name.clone(),
            size: state.content.len() as u64,
            mode: state.mode,
            modified: state.modified,
            entry_type: EntryType::File,
        }
    }
}

/// Child mapping of a directory plus what changes alongside it.
#[derive(Debug)]
pub(crate) struct DirState {
    pub(crate) entries: BTreeMap<String, Node>,
    pub(crate) modified: DateTime<Utc>,
    /// Set once the directory has been unlinked; it then accepts no children.
    pub(crate) unlinked: bool,
}

impl DirState {
    fn touch(&mut self) {
        self.modified = Utc::now();
    }
}

/// A directory node.
#[derive(Debug)]
pub struct DirNode {
    name: String,
    mode: u32,
    state: Mutex<DirState>,
}

/// What `DirNode::create_file` found under the requested name.
pub(crate) enum Created {
    New(Arc<FileNode>),
    Existing(Arc<FileNode>),
}

impl DirNode {
    pub(crate) fn new(name: impl Into<String>, mode: u32) -> Arc<Self> {
        Self::restore(name, mode, Utc::now(), BTreeMap::new())
    }

    pub(crate) fn new_root() -> Arc<Self> {
        Self::new("", ROOT_DIR_MODE)
    }

    /// Builds a directory around existing children, with a fresh guard.
    pub(crate) fn restore(
        name: impl Into<String>,
        mode: u32,
        modified: DateTime<Utc>,
        entries: BTreeMap<String, Node>,
    ) -> Arc<Self> {
        Arc::new(Self {
            name: name.into(),
            mode,
            state: Mutex::new(DirState {
                entries,
                modified,
                unlinked: false,
            }),
        })
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[must_use]
    pub fn mode(&self) -> u32 {
        self.mode
    }

    pub(crate) fn state(&self) -> MutexGuard<'_, DirState> {
        lock(&self.state)
    }

    #[must_use]
    pub fn metadata(&self) -> Metadata {
        Metadata {
            name: self.name.clone(),
            size: DIR_SIZE,
            mode: self.mode,
            modified: self.state().modified,
            entry_type: EntryType::Directory,
        }
    }

    #[must_use]
    pub fn get(&self, name: &str) -> Option<Node> {
        let state = self.state();
        if state.unlinked {
            return None;
        }
        state.entries.get(name).cloned()
    }

    /// Looks up a child directory during traversal. A missing child and a
    /// file in the way are both reported as `NotExist`.
    pub(crate) fn child_dir(&self, name: &str, path: &str) -> Result<Arc<DirNode>> {
        match self.get(name) {
            Some(Node::Directory(d)) => Ok(d),
            Some(Node::File(_)) | None => Err(Error::not_exist(path)),
        }
    }

    /// Returns the named child directory, creating it if missing.
    pub(crate) fn get_or_create_dir(&self, name: &str, mode: u32, path: &str) -> Result<Arc<DirNode>> {
        let mut state = self.state();
        if state.unlinked {
            return Err(Error::not_exist(path));
        }
        match state.entries.get(name) {
            Some(Node::Directory(d)) => Ok(d.clone()),
            Some(Node::File(_)) => Err(Error::not_a_directory(path)),
            None => {
                let dir = DirNode::new(name, mode);
                state
                    .entries
                    .insert(name.to_string(), Node::Directory(dir.clone()));
                state.touch();
                Ok(dir)
            }
        }
    }

    /// Inserts an empty file under `name`, or returns the file already there.
    /// A directory under that name is an error.
    pub(crate) fn create_file(&self, name: &str, mode: u32, path: &str) -> Result<Created> {
        let mut state = self.state();
        if state.unlinked {
            return Err(Error::not_exist(path));
        }
        match state.entries.get(name) {
            Some(Node::Directory(_)) => Err(Error::is_a_directory(path)),
            Some(Node::File(f)) => Ok(Created::Existing(f.clone())),
            None => {
                let file = FileNode::new(name, mode, Vec::new());
                state
                    .entries
                    .insert(name.to_string(), Node::File(file.clone()));
                state.touch();
                Ok(Created::New(file))
            }
        }
    }

    /// Unlinks `name` if it still refers to `expected`.
    pub(crate) fn unlink_if_same(&self, name: &str, expected: &Node) -> bool {
        let mut state = self.state();
        let same = !state.unlinked
            && state
                .entries
                .get(name)
                .is_some_and(|current| current.same_node(expected));
        if same {
            state.entries.remove(name);
            state.touch();
        }
        same
    }

    /// Unlinks `name` unconditionally, returning what was there.
    pub(crate) fn unlink(&self, name: &str) -> Option<Node> {
        let mut state = self.state();
        if state.unlinked {
            return None;
        }
        let removed = state.entries.remove(name);
        if removed.is_some() {
            state.touch();
        }
        removed
    }

    /// Marks this directory unlinked if it has no children. Returns false
    /// (and changes nothing) when it is not empty.
    pub(crate) fn seal_if_empty(&self) -> bool {
        let mut state = self.state();
        if !state.entries.is_empty() {
            return false;
        }
        state.unlinked = true;
        true
    }

    /// Takes every child out of this directory. An unlinked directory has
    /// none left to give.
    pub(crate) fn take_entries(&self) -> BTreeMap<String, Node> {
        let mut state = self.state();
        if state.unlinked {
            return BTreeMap::new();
        }
        state.touch();
        std::mem::take(&mut state.entries)
    }

    /// Up to `limit` entries whose names sort after `after`.
    pub(crate) fn entries_after(&self, after: Option<&str>, limit: Option<usize>) -> Vec<(String, Node)> {
        use std::ops::Bound;

        let state = self.state();
        if state.unlinked {
            return Vec::new();
        }
        let lower = match after {
            Some(name) => Bound::Excluded(name.to_string()),
            None => Bound::Unbounded,
        };
        let iter = state
            .entries
            .range((lower, Bound::Unbounded))
            .map(|(name, node)| (name.clone(), node.clone()));
        match limit {
            Some(n) => iter.take(n).collect(),
            None => iter.collect(),
        }
    }

    pub(crate) fn list(&self) -> Vec<DirEntry> {
        // Snapshot the children first so no file guard is taken under ours.
        let children: Vec<Node> = self
            .entries_after(None, None)
            .into_iter()
            .map(|(_, node)| node)
            .collect();
        children
            .iter()
            .map(|node| DirEntry::new(node.metadata()))
            .collect()
    }
}

/// Seals every directory of a detached subtree, empties it and sums its
/// stored bytes. Each directory guard is held only while its children are
/// taken out, so a directory already sealed by another caller yields nothing
/// and its bytes are counted once.
pub(crate) fn detach_subtree(node: &Node) -> u64 {
    match node {
        Node::File(f) => f.stored_size(),
        Node::Directory(d) => {
            let children: Vec<Node> = {
                let mut state = d.state();
                if state.unlinked {
                    return 0;
                }
                state.unlinked = true;
                std::mem::take(&mut state.entries).into_values().collect()
            };
            children.iter().map(detach_subtree).sum()
        }
    }
}

/// Sums stored bytes below a directory without modifying anything.
pub(crate) fn subtree_size(dir: &DirNode) -> u64 {
    let children: Vec<Node> = dir.state().entries.values().cloned().collect();
    children
        .iter()
        .map(|child| match child {
            Node::File(f) => f.stored_size(),
            Node::Directory(d) => subtree_size(d),
        })
        .sum()
}
