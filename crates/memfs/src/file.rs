// SPDX-FileCopyrightText: 2025 Caspar Water Company
//
// SPDX-License-Identifier: Apache-2.0

//! Open file handles.
//!
//! A [`FileReader`] owns a decrypted copy of the content taken at open time
//! and never observes later writes. A [`FileWriter`] appends straight into
//! the live node, so its bytes are visible to `stat` before close; with a
//! key active the whole buffer is sealed once when the writer closes.

use std::io::{self, Cursor, Read, Seek, SeekFrom, Write};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use diagnostics::*;

use crate::error::{Error, Result};
use crate::fs::Shared;
use crate::metadata::{EntryType, Metadata};
use crate::node::FileNode;

/// Read handle over a snapshot of a file's content.
#[derive(Debug)]
pub struct FileReader {
    name: String,
    mode: u32,
    modified: DateTime<Utc>,
    /// `None` once closed.
    cursor: Option<Cursor<Vec<u8>>>,
}

impl FileReader {
    pub(crate) fn new(name: impl Into<String>, mode: u32, modified: DateTime<Utc>, content: Vec<u8>) -> Self {
        Self {
            name: name.into(),
            mode,
            modified,
            cursor: Some(Cursor::new(content)),
        }
    }

    fn cursor(&mut self) -> Result<&mut Cursor<Vec<u8>>> {
        self.cursor.as_mut().ok_or(Error::Closed)
    }

    pub fn stat(&self) -> Result<Metadata> {
        let cursor = self.cursor.as_ref().ok_or(Error::Closed)?;
        Ok(Metadata {
            name: self.name.clone(),
            size: cursor.get_ref().len() as u64,
            mode: self.mode,
            modified: self.modified,
            entry_type: EntryType::File,
        })
    }

    /// Current offset of the cursor.
    pub fn position(&self) -> Result<u64> {
        Ok(self.cursor.as_ref().ok_or(Error::Closed)?.position())
    }

    /// Reads everything from the cursor to the end.
    pub fn read_remaining(&mut self) -> Result<Vec<u8>> {
        let mut out = Vec::new();
        self.cursor()?.read_to_end(&mut out)?;
        Ok(out)
    }

    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.cursor.is_none()
    }

    /// Closes the handle. A second close fails with `Closed`.
    pub fn close(&mut self) -> Result<()> {
        self.cursor.take().map(|_| ()).ok_or(Error::Closed)
    }
}

impl Read for FileReader {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.cursor()?.read(buf)
    }
}

impl Seek for FileReader {
    fn seek(&mut self, pos: SeekFrom) -> io::Result<u64> {
        self.cursor()?.seek(pos)
    }
}

/// Write handle appending into a live file node.
///
/// Bytes appended after the file was removed from the tree still count
/// against the storage limit and are never released.
pub struct FileWriter {
    path: String,
    file: Arc<FileNode>,
    shared: Arc<Shared>,
    closed: bool,
}

impl std::fmt::Debug for FileWriter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FileWriter")
            .field("path", &self.path)
            .field("closed", &self.closed)
            .finish()
    }
}

impl FileWriter {
    pub(crate) fn new(path: impl Into<String>, file: Arc<FileNode>, shared: Arc<Shared>) -> Self {
        Self {
            path: path.into(),
            file,
            shared,
            closed: false,
        }
    }

    #[must_use]
    pub fn path(&self) -> &str {
        &self.path
    }

    /// Appends `data` to the file. Each call is checked against the storage
    /// limit on its own: a refused call changes nothing and leaves the
    /// handle open, earlier appends stay committed.
    pub fn append(&mut self, data: &[u8]) -> Result<usize> {
        if self.closed {
            return Err(Error::Closed);
        }
        if data.is_empty() {
            return Ok(0);
        }

        let mut state = self.file.state();
        self.shared.quota.reserve(data.len() as u64)?;
        state.content.extend_from_slice(data);
        state.modified = Utc::now();
        Ok(data.len())
    }

    /// Metadata of the live node, including bytes appended so far.
    pub fn stat(&self) -> Result<Metadata> {
        if self.closed {
            return Err(Error::Closed);
        }
        Ok(self.file.metadata())
    }

    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.closed
    }

    /// Closes the handle, sealing the accumulated content when a key is
    /// active. A second close fails with `Closed` and does nothing else.
    pub fn close(&mut self) -> Result<()> {
        if self.closed {
            return Err(Error::Closed);
        }
        self.closed = true;
        self.seal()
    }

    fn seal(&self) -> Result<()> {
        let cipher = self.shared.cipher();
        if !cipher.is_enabled() {
            return Ok(());
        }

        let mut state = self.file.state();
        let sealed = cipher.encrypt(&state.content)?;
        let plain_len = state.content.len() as u64;
        let sealed_len = sealed.len() as u64;
        self.shared.quota.adjust(plain_len, sealed_len);
        state.content = sealed;
        drop(state);

        debug!(
            "sealed {path}: {plain_len} plaintext bytes stored as {sealed_len}",
            path: self.path.as_str(),
            plain_len: plain_len,
            sealed_len: sealed_len
        );
        Ok(())
    }
}

impl Write for FileWriter {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        Ok(self.append(buf)?)
    }

    fn flush(&mut self) -> io::Result<()> {
        if self.closed {
            return Err(Error::Closed.into());
        }
        Ok(())
    }
}

impl Drop for FileWriter {
    fn drop(&mut self) {
        if self.closed {
            return;
        }
        self.closed = true;
        if let Err(e) = self.seal() {
            let reason = e.to_string();
            error!(
                "writer for {path} dropped without close and could not be sealed: {reason}",
                path: self.path.as_str(),
                reason: reason.as_str()
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn reader(content: &[u8]) -> FileReader {
        FileReader::new("foo", 0o644, Utc::now(), content.to_vec())
    }

    #[test]
    fn test_sequential_read_and_seek() {
        let mut r = reader(b"0123456789");
        let mut buf = [0u8; 3];
        r.read_exact(&mut buf).unwrap();
        assert_eq!(&buf, b"012");
        r.read_exact(&mut buf).unwrap();
        assert_eq!(&buf, b"345");

        assert_eq!(r.seek(SeekFrom::Start(0)).unwrap(), 0);
        r.read_exact(&mut buf).unwrap();
        assert_eq!(&buf, b"012");

        assert_eq!(r.seek(SeekFrom::Current(2)).unwrap(), 5);
        assert_eq!(r.seek(SeekFrom::End(-2)).unwrap(), 8);
        assert_eq!(r.read_remaining().unwrap(), b"89");
    }

    #[test]
    fn test_seek_before_start_fails() {
        let mut r = reader(b"abc");
        let err = r.seek(SeekFrom::Current(-1)).unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::InvalidInput);
    }

    #[test]
    fn test_operations_after_close() {
        let mut r = reader(b"abc");
        assert_eq!(r.stat().unwrap().size, 3);
        r.close().unwrap();
        assert!(r.is_closed());
        assert!(matches!(r.close(), Err(Error::Closed)));
        assert!(matches!(r.stat(), Err(Error::Closed)));

        let mut buf = [0u8; 1];
        let err = r.read(&mut buf).unwrap_err();
        assert!(matches!(Error::from_io(err), Error::Closed));
        let err = r.seek(SeekFrom::Start(0)).unwrap_err();
        assert!(matches!(Error::from_io(err), Error::Closed));
    }
}
