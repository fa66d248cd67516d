// SPDX-FileCopyrightText: 2025 Caspar Water Company
//
// SPDX-License-Identifier: Apache-2.0

use std::sync::{Arc, PoisonError, RwLock};

use chrono::{DateTime, Utc};
use diagnostics::*;

use crate::cipher::Cipher;
use crate::dir::DirReader;
use crate::error::{Error, Result};
use crate::file::{FileReader, FileWriter};
use crate::metadata::{DirEntry, Metadata};
use crate::node::{Created, DEFAULT_FILE_MODE, DirNode, FileNode, Node, detach_subtree};
use crate::options::{Dispatch, OpenHook, OpenOptions, Options};
use crate::path;
use crate::quota::Quota;

/// State shared by every view and every handle of one filesystem.
pub(crate) struct Shared {
    pub(crate) quota: Quota,
    cipher: RwLock<Arc<Cipher>>,
    open_hook: Option<OpenHook>,
}

impl Shared {
    pub(crate) fn new(quota: Quota, cipher: Cipher, open_hook: Option<OpenHook>) -> Self {
        Self {
            quota,
            cipher: RwLock::new(Arc::new(cipher)),
            open_hook,
        }
    }

    /// The cipher in effect right now. Callers keep using the returned one
    /// even if the key is swapped meanwhile.
    pub(crate) fn cipher(&self) -> Arc<Cipher> {
        self.cipher
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    fn set_cipher(&self, cipher: Cipher) {
        *self.cipher.write().unwrap_or_else(PoisonError::into_inner) = Arc::new(cipher);
    }
}

/// An in-memory filesystem, or a view of one of its subtrees.
///
/// Cloning is cheap and yields another handle on the same tree.
///
/// ```
/// use memfs::MemFs;
///
/// let fs = MemFs::new();
/// fs.mkdir_all("dir1/dir2", 0o777)?;
/// fs.write_file("dir1/dir2/f1.txt", b"incinerating-unsubstantial", 0o644)?;
/// assert_eq!(fs.read_file("dir1/dir2/f1.txt")?, b"incinerating-unsubstantial");
/// # Ok::<(), memfs::Error>(())
/// ```
#[derive(Clone)]
pub struct MemFs {
    root: Arc<DirNode>,
    shared: Arc<Shared>,
}

impl std::fmt::Debug for MemFs {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MemFs")
            .field("root", &self.root.name())
            .field("used_storage", &self.used_storage())
            .field("max_storage", &self.max_storage())
            .field("encrypted", &self.is_encrypted())
            .finish()
    }
}

/// What an [`MemFs::open_file`] call produced.
#[derive(Debug)]
pub enum OpenedFile {
    Reader(FileReader),
    Writer(FileWriter),
    Directory(DirReader),
}

impl OpenedFile {
    #[must_use]
    pub fn into_reader(self) -> Option<FileReader> {
        match self {
            OpenedFile::Reader(r) => Some(r),
            _ => None,
        }
    }

    #[must_use]
    pub fn into_writer(self) -> Option<FileWriter> {
        match self {
            OpenedFile::Writer(w) => Some(w),
            _ => None,
        }
    }

    #[must_use]
    pub fn into_dir(self) -> Option<DirReader> {
        match self {
            OpenedFile::Directory(d) => Some(d),
            _ => None,
        }
    }

    pub fn stat(&self) -> Result<Metadata> {
        match self {
            OpenedFile::Reader(r) => r.stat(),
            OpenedFile::Writer(w) => w.stat(),
            OpenedFile::Directory(d) => d.stat(),
        }
    }

    pub fn close(&mut self) -> Result<()> {
        match self {
            OpenedFile::Reader(r) => r.close(),
            OpenedFile::Writer(w) => w.close(),
            OpenedFile::Directory(d) => d.close(),
        }
    }
}

/// Content and attributes captured for a read handle.
struct Captured {
    name: String,
    mode: u32,
    modified: DateTime<Utc>,
    content: Vec<u8>,
}

impl Default for MemFs {
    fn default() -> Self {
        Self::new()
    }
}

impl MemFs {
    /// An empty filesystem: unlimited storage, no encryption, no hook.
    #[must_use]
    pub fn new() -> Self {
        Self::with_options(Options::default())
    }

    #[must_use]
    pub fn with_options(options: Options) -> Self {
        let cipher = options
            .encryption_key
            .as_deref()
            .map(Cipher::new)
            .unwrap_or_default();
        let shared = Shared::new(Quota::new(options.max_storage), cipher, options.open_hook);
        Self::from_parts(DirNode::new_root(), shared)
    }

    pub(crate) fn from_parts(root: Arc<DirNode>, shared: Shared) -> Self {
        Self {
            root,
            shared: Arc::new(shared),
        }
    }

    pub(crate) fn root(&self) -> &Arc<DirNode> {
        &self.root
    }

    /// Replaces the encryption key. Stored content is not touched: it will
    /// decrypt only if this key matches the one it was sealed with. An
    /// empty key disables encryption.
    pub fn set_encryption_key(&self, key: impl AsRef<[u8]>) {
        let cipher = Cipher::new(key.as_ref());
        let enabled = cipher.is_enabled();
        self.shared.set_cipher(cipher);
        info!("encryption key replaced, encryption enabled: {enabled}", enabled: enabled);
    }

    #[must_use]
    pub fn is_encrypted(&self) -> bool {
        self.shared.cipher().is_enabled()
    }

    /// Bytes currently stored across all files (ciphertext size where sealed).
    #[must_use]
    pub fn used_storage(&self) -> u64 {
        self.shared.quota.used()
    }

    #[must_use]
    pub fn max_storage(&self) -> Option<u64> {
        self.shared.quota.limit()
    }

    /// Sets or clears the storage ceiling. `None` or `Some(0)` is unlimited.
    pub fn set_max_storage(&self, limit: Option<u64>) {
        self.shared.quota.set_limit(limit);
        let limit = limit.unwrap_or(0);
        info!("storage limit set to {limit} bytes, 0 meaning unlimited", limit: limit);
    }

    fn resolve_dir(&self, segments: &[&str], path: &str) -> Result<Arc<DirNode>> {
        let mut current = self.root.clone();
        for segment in segments {
            // Only the current directory's guard is taken, inside child_dir.
            current = current.child_dir(segment, path)?;
        }
        Ok(current)
    }

    fn lookup(&self, path: &str) -> Result<Node> {
        if path::is_root(path) {
            return Ok(Node::Directory(self.root.clone()));
        }
        let (parent, name) = path::split_parent(path);
        self.resolve_dir(&parent, path)?
            .get(name)
            .ok_or_else(|| Error::not_exist(path))
    }

    /// Creates `path` and any missing parents. Existing directories are left
    /// as they are; a file anywhere along the path is an error.
    pub fn mkdir_all(&self, path: &str, perm: u32) -> Result<()> {
        path::validate(path)?;

        let mut current = self.root.clone();
        for segment in path::split(path) {
            current = current.get_or_create_dir(segment, perm, path)?;
        }
        debug!("mkdir_all {path}", path: path);
        Ok(())
    }

    /// Returns the file node at `path`, inserting an empty one if missing.
    fn create_node(&self, path: &str) -> Result<Arc<FileNode>> {
        if path::is_root(path) {
            return Err(Error::is_a_directory(path));
        }
        let (parent, name) = path::split_parent(path);
        let dir = self.resolve_dir(&parent, path)?;
        match dir.create_file(name, DEFAULT_FILE_MODE, path)? {
            Created::New(file) => {
                debug!("created {path}", path: path);
                Ok(file)
            }
            Created::Existing(file) => Ok(file),
        }
    }

    fn truncate(&self, file: &FileNode) {
        let mut state = file.state();
        self.shared.quota.release(state.content.len() as u64);
        state.content = Vec::new();
        state.modified = Utc::now();
    }

    /// Turns sealed content back into plaintext so a writer can append to it.
    fn unseal_in_place(&self, file: &FileNode, path: &str) -> Result<()> {
        let cipher = self.shared.cipher();
        if !cipher.is_enabled() {
            return Ok(());
        }
        let mut state = file.state();
        if state.content.is_empty() {
            return Ok(());
        }
        let plain = cipher.decrypt(&state.content).inspect_err(|_| {
            warn!("cannot reopen {path} for writing: decryption failed", path: path);
        })?;
        self.shared
            .quota
            .adjust(state.content.len() as u64, plain.len() as u64);
        state.content = plain;
        Ok(())
    }

    /// Creates or truncates the file at `path` and returns a writer on it.
    /// Truncating keeps the node, so handles already on it see the reset.
    pub fn create(&self, path: &str) -> Result<FileWriter> {
        path::validate(path)?;
        let file = self.create_node(path)?;
        self.truncate(&file);
        Ok(FileWriter::new(path, file, self.shared.clone()))
    }

    /// Replaces the content of `path` with `data` in one step, creating the
    /// file if needed. With a key active the whole buffer is sealed first.
    pub fn write_file(&self, path: &str, data: &[u8], perm: u32) -> Result<()> {
        path::validate(path)?;
        if path::is_root(path) {
            return Err(Error::is_a_directory(path));
        }

        let sealed = self.shared.cipher().encrypt(data)?;
        let new_len = sealed.len() as u64;

        let (parent, name) = path::split_parent(path);
        let dir = self.resolve_dir(&parent, path)?;

        let file = match dir.get(name) {
            Some(Node::Directory(_)) => return Err(Error::is_a_directory(path)),
            Some(Node::File(file)) => {
                let mut state = file.state();
                self.shared
                    .quota
                    .replace(state.content.len() as u64, new_len)?;
                state.content = sealed;
                state.mode = perm;
                state.modified = Utc::now();
                return Ok(());
            }
            None => {
                // Reserve before inserting so a refused write leaves no trace.
                self.shared.quota.reserve(new_len)?;
                match dir.create_file(name, perm, path) {
                    Ok(Created::New(file) | Created::Existing(file)) => file,
                    Err(e) => {
                        self.shared.quota.release(new_len);
                        return Err(e);
                    }
                }
            }
        };

        let mut state = file.state();
        // Non-zero only if another caller created the file meanwhile.
        self.shared.quota.release(state.content.len() as u64);
        state.content = sealed;
        state.mode = perm;
        state.modified = Utc::now();
        drop(state);

        debug!("wrote {len} bytes to {path}", len: new_len, path: path);
        Ok(())
    }

    fn capture(&self, file: &FileNode) -> Result<Captured> {
        let (mode, modified, stored) = {
            let state = file.state();
            (state.mode, state.modified, state.content.clone())
        };
        let content = self.shared.cipher().decrypt(&stored)?;
        Ok(Captured {
            name: file.name().to_string(),
            mode,
            modified,
            content,
        })
    }

    /// Opens `path` for reading. The handle holds a decrypted copy taken now;
    /// later writes to the file are not visible through it.
    pub fn open(&self, path: &str) -> Result<FileReader> {
        path::validate(path)?;

        let captured = match self.lookup(path) {
            Ok(Node::Directory(_)) => return Err(Error::is_a_directory(path)),
            Ok(Node::File(file)) => self.capture(&file),
            Err(e) => Err(e),
        };
        if let Err(Error::DecryptionFailed(_)) = &captured {
            warn!("decryption failed opening {path}", path: path);
        }

        let Some(hook) = &self.shared.open_hook else {
            let c = captured?;
            return Ok(FileReader::new(c.name, c.mode, c.modified, c.content));
        };

        let (content, err) = match &captured {
            Ok(c) => (Some(c.content.as_slice()), None),
            Err(e) => (None, Some(e)),
        };
        let Some(replaced) = hook(path, content, err)? else {
            let c = captured?;
            return Ok(FileReader::new(c.name, c.mode, c.modified, c.content));
        };

        Ok(match captured {
            Ok(c) => FileReader::new(c.name, c.mode, c.modified, replaced),
            Err(_) => FileReader::new(path::basename(path), DEFAULT_FILE_MODE, Utc::now(), replaced),
        })
    }

    /// Reads the whole file at `path`.
    pub fn read_file(&self, path: &str) -> Result<Vec<u8>> {
        let mut reader = self.open(path)?;
        let data = reader.read_remaining()?;
        reader.close()?;
        Ok(data)
    }

    /// The bytes stored for `path` exactly as held, without decryption or hook.
    pub fn read_stored(&self, path: &str) -> Result<Vec<u8>> {
        path::validate(path)?;
        match self.lookup(path)? {
            Node::File(file) => Ok(file.stored_content()),
            Node::Directory(_) => Err(Error::is_a_directory(path)),
        }
    }

    pub fn open_dir(&self, path: &str) -> Result<DirReader> {
        path::validate(path)?;
        match self.lookup(path)? {
            Node::Directory(dir) => Ok(DirReader::new(dir)),
            Node::File(_) => Err(Error::not_a_directory(path)),
        }
    }

    /// All entries of the directory at `path`.
    pub fn read_dir(&self, path: &str) -> Result<Vec<DirEntry>> {
        path::validate(path)?;
        match self.lookup(path)? {
            Node::Directory(dir) => Ok(dir.list()),
            Node::File(_) => Err(Error::not_a_directory(path)),
        }
    }

    pub fn stat(&self, path: &str) -> Result<Metadata> {
        path::validate(path)?;
        Ok(self.lookup(path)?.metadata())
    }

    /// Opens `path` according to `options`:
    ///
    /// * `write` (with or without `create`): a writer appending to the file,
    ///   emptied first when `truncate` is set; with `create` a missing file
    ///   is made first.
    /// * `create` alone: the file is made if missing, then opened for reading.
    /// * no flags beyond `read`: a plain read-open; directories give a
    ///   [`DirReader`].
    ///
    /// Any other combination is `Unsupported`. Directories cannot be opened
    /// for writing (`Invalid`).
    pub fn open_file(&self, path: &str, options: &OpenOptions) -> Result<OpenedFile> {
        path::validate(path)?;

        match options.dispatch()? {
            Dispatch::Read => match self.lookup(path) {
                Ok(Node::Directory(dir)) => Ok(OpenedFile::Directory(DirReader::new(dir))),
                _ => Ok(OpenedFile::Reader(self.open(path)?)),
            },
            Dispatch::CreateThenRead => {
                match self.lookup(path) {
                    Ok(Node::Directory(_)) => {
                        return Err(Error::invalid(format!("{path} is a directory")));
                    }
                    Ok(Node::File(_)) => {}
                    Err(e) if e.is_not_exist() => {
                        self.create_node(path)?;
                    }
                    Err(e) => return Err(e),
                }
                Ok(OpenedFile::Reader(self.open(path)?))
            }
            Dispatch::Write { create, truncate } => {
                let file = match self.lookup(path) {
                    Ok(Node::File(file)) => file,
                    Ok(Node::Directory(_)) => {
                        return Err(Error::invalid(format!("{path} is a directory")));
                    }
                    Err(e) if create && e.is_not_exist() => self.create_node(path)?,
                    Err(e) => return Err(e),
                };
                if truncate {
                    self.truncate(&file);
                } else {
                    self.unseal_in_place(&file, path)?;
                }
                Ok(OpenedFile::Writer(FileWriter::new(
                    path,
                    file,
                    self.shared.clone(),
                )))
            }
        }
    }

    /// Removes a file or an empty directory.
    pub fn remove(&self, path: &str) -> Result<()> {
        path::validate(path)?;
        if path::is_root(path) {
            return Err(Error::invalid_path(path));
        }

        let (parent, name) = path::split_parent(path);
        let dir = self.resolve_dir(&parent, path)?;
        let node = dir.get(name).ok_or_else(|| Error::not_exist(path))?;

        // The parent guard is released by now; seal the child under its own.
        if let Node::Directory(child) = &node {
            if !child.seal_if_empty() {
                return Err(Error::directory_not_empty(path));
            }
        }
        if !dir.unlink_if_same(name, &node) {
            return Err(Error::not_exist(path));
        }
        if let Node::File(file) = &node {
            self.shared.quota.release(file.stored_size());
        }

        debug!("removed {path}", path: path);
        Ok(())
    }

    /// Removes `path` and everything below it. A path that does not exist,
    /// or whose parent does not exist, is not an error. `"."` empties the
    /// view's root but keeps the root itself.
    pub fn remove_all(&self, path: &str) -> Result<()> {
        path::validate(path)?;

        let released: u64 = if path::is_root(path) {
            self.root
                .take_entries()
                .values()
                .map(detach_subtree)
                .sum()
        } else {
            let (parent, name) = path::split_parent(path);
            let dir = match self.resolve_dir(&parent, path) {
                Ok(dir) => dir,
                Err(e) if e.is_not_exist() => return Ok(()),
                Err(e) => return Err(e),
            };
            let Some(node) = dir.unlink(name) else {
                return Ok(());
            };
            detach_subtree(&node)
        };

        self.shared.quota.release(released);
        debug!("remove_all {path} released {bytes} bytes", path: path, bytes: released);
        Ok(())
    }

    /// A view rooted at the directory `path`. Both views share nodes, the
    /// storage counter, the encryption key and the open hook.
    pub fn sub(&self, path: &str) -> Result<MemFs> {
        path::validate(path)?;
        match self.lookup(path)? {
            Node::Directory(dir) => Ok(MemFs {
                root: dir,
                shared: self.shared.clone(),
            }),
            Node::File(_) => Err(Error::not_a_directory(path)),
        }
    }

    /// Visits `path` and, for directories, everything below it, parents
    /// before children and siblings in name order. Paths passed to
    /// `visit` are relative to this view's root.
    pub fn walk<F>(&self, path: &str, mut visit: F) -> Result<()>
    where
        F: FnMut(&str, &DirEntry) -> Result<()>,
    {
        path::validate(path)?;
        let node = self.lookup(path)?;
        walk_node(path, &node, &mut visit)
    }
}

fn walk_node<F>(path: &str, node: &Node, visit: &mut F) -> Result<()>
where
    F: FnMut(&str, &DirEntry) -> Result<()>,
{
    visit(path, &DirEntry::new(node.metadata()))?;
    if let Node::Directory(dir) = node {
        for (name, child) in dir.entries_after(None, None) {
            walk_node(&path::join(path, &name), &child, visit)?;
        }
    }
    Ok(())
}
