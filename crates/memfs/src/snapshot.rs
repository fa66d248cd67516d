// SPDX-FileCopyrightText: 2025 Caspar Water Company
//
// SPDX-License-Identifier: Apache-2.0

//! Whole-tree snapshots.
//!
//! The tree is copied into plain serde types, encoded with postcard inside
//! a versioned envelope and optionally wrapped in a zstd stream. Stored file
//! bytes are written exactly as held, so sealed files stay sealed. Keys,
//! limits and hooks are never part of a snapshot.

use std::collections::BTreeMap;
use std::fs::File;
use std::io::{BufReader, BufWriter, Read, Write};
use std::path::Path;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use diagnostics::*;
use serde::{Deserialize, Serialize};

use crate::cipher::Cipher;
use crate::error::{Error, Result};
use crate::fs::{MemFs, Shared};
use crate::node::{DirNode, FileNode, Node, subtree_size};
use crate::quota::Quota;

/// Version written into every snapshot; loading any other version fails.
pub const FORMAT_VERSION: u32 = 1;

const ZSTD_LEVEL: i32 = 6;

#[derive(Debug, Serialize, Deserialize)]
struct Envelope {
    format_version: u32,
    root: SnapshotNode,
}

#[derive(Debug, Serialize, Deserialize)]
enum SnapshotNode {
    Directory {
        name: String,
        mode: u32,
        modified: DateTime<Utc>,
        children: Vec<SnapshotNode>,
    },
    File {
        name: String,
        mode: u32,
        modified: DateTime<Utc>,
        content: Vec<u8>,
    },
}

fn capture_dir(dir: &DirNode) -> SnapshotNode {
    let (modified, children) = {
        let state = dir.state();
        let children: Vec<Node> = state.entries.values().cloned().collect();
        (state.modified, children)
    };
    SnapshotNode::Directory {
        name: dir.name().to_string(),
        mode: dir.mode(),
        modified,
        children: children.iter().map(capture).collect(),
    }
}

fn capture(node: &Node) -> SnapshotNode {
    match node {
        Node::Directory(dir) => capture_dir(dir),
        Node::File(file) => {
            let state = file.state();
            SnapshotNode::File {
                name: file.name().to_string(),
                mode: state.mode,
                modified: state.modified,
                content: state.content.clone(),
            }
        }
    }
}

fn check_child_name(name: &str) -> Result<()> {
    if name.is_empty() || name == "." || name == ".." || name.contains('/') {
        return Err(Error::snapshot(format!("invalid entry name {name:?}")));
    }
    Ok(())
}

fn rebuild_dir(
    name: String,
    mode: u32,
    modified: DateTime<Utc>,
    children: Vec<SnapshotNode>,
) -> Result<Arc<DirNode>> {
    let mut entries = BTreeMap::new();
    for child in children {
        let node = rebuild(child)?;
        let child_name = node.name().to_string();
        check_child_name(&child_name)?;
        if entries.insert(child_name, node).is_some() {
            return Err(Error::snapshot(format!(
                "duplicate entry in directory {name:?}"
            )));
        }
    }
    Ok(DirNode::restore(name, mode, modified, entries))
}

fn rebuild(node: SnapshotNode) -> Result<Node> {
    Ok(match node {
        SnapshotNode::Directory {
            name,
            mode,
            modified,
            children,
        } => Node::Directory(rebuild_dir(name, mode, modified, children)?),
        SnapshotNode::File {
            name,
            mode,
            modified,
            content,
        } => Node::File(FileNode::restore(name, mode, modified, content)),
    })
}

fn encode(fs: &MemFs) -> Result<Vec<u8>> {
    let envelope = Envelope {
        format_version: FORMAT_VERSION,
        root: capture_dir(fs.root()),
    };
    postcard::to_stdvec(&envelope).map_err(|e| Error::snapshot(format!("encode: {e}")))
}

fn decode(bytes: &[u8]) -> Result<MemFs> {
    let envelope: Envelope =
        postcard::from_bytes(bytes).map_err(|e| Error::snapshot(format!("decode: {e}")))?;
    if envelope.format_version != FORMAT_VERSION {
        return Err(Error::snapshot(format!(
            "unsupported format version {} (expected {FORMAT_VERSION})",
            envelope.format_version
        )));
    }

    let SnapshotNode::Directory {
        name,
        mode,
        modified,
        children,
    } = envelope.root
    else {
        return Err(Error::snapshot("root entry is not a directory"));
    };
    let root = rebuild_dir(name, mode, modified, children)?;

    let used = subtree_size(&root);
    let shared = Shared::new(Quota::with_usage(None, used), Cipher::disabled(), None);
    Ok(MemFs::from_parts(root, shared))
}

impl MemFs {
    /// Writes a snapshot of this view's tree to `writer`.
    pub fn save_to<W: Write>(&self, mut writer: W) -> Result<()> {
        let bytes = encode(self)?;
        writer.write_all(&bytes)?;
        writer.flush()?;
        debug!("saved snapshot of {len} bytes", len: bytes.len());
        Ok(())
    }

    /// Reads a snapshot written by [`MemFs::save_to`]. The result has no
    /// encryption key, no hook and no storage limit.
    pub fn load_from<R: Read>(mut reader: R) -> Result<MemFs> {
        let mut bytes = Vec::new();
        reader.read_to_end(&mut bytes)?;
        let fs = decode(&bytes)?;
        debug!(
            "loaded snapshot of {len} bytes, {used} bytes stored",
            len: bytes.len(),
            used: fs.used_storage()
        );
        Ok(fs)
    }

    /// Like [`MemFs::save_to`], with the encoded snapshot zstd-compressed.
    pub fn compress_and_save_to<W: Write>(&self, writer: W) -> Result<()> {
        let bytes = encode(self)?;
        let mut encoder = zstd::stream::Encoder::new(writer, ZSTD_LEVEL)?;
        encoder.write_all(&bytes)?;
        let mut writer = encoder.finish()?;
        writer.flush()?;
        debug!("saved compressed snapshot of {len} bytes", len: bytes.len());
        Ok(())
    }

    /// Reads a snapshot written by [`MemFs::compress_and_save_to`].
    pub fn decompress_and_load_from<R: Read>(reader: R) -> Result<MemFs> {
        let bytes = zstd::stream::decode_all(reader)
            .map_err(|e| Error::snapshot(format!("decompress: {e}")))?;
        let fs = decode(&bytes)?;
        debug!(
            "loaded compressed snapshot of {len} bytes, {used} bytes stored",
            len: bytes.len(),
            used: fs.used_storage()
        );
        Ok(fs)
    }

    pub fn save_to_file(&self, path: impl AsRef<Path>) -> Result<()> {
        self.save_to(BufWriter::new(File::create(path)?))
    }

    pub fn load_from_file(path: impl AsRef<Path>) -> Result<MemFs> {
        Self::load_from(BufReader::new(File::open(path)?))
    }

    pub fn compress_and_save_to_file(&self, path: impl AsRef<Path>) -> Result<()> {
        self.compress_and_save_to(BufWriter::new(File::create(path)?))
    }

    pub fn decompress_and_load_from_file(path: impl AsRef<Path>) -> Result<MemFs> {
        Self::decompress_and_load_from(BufReader::new(File::open(path)?))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> MemFs {
        let fs = MemFs::new();
        fs.mkdir_all("a/b", 0o750).unwrap();
        fs.write_file("a/b/one.txt", b"one", 0o640).unwrap();
        fs.write_file("top.txt", b"top level", 0o600).unwrap();
        fs
    }

    #[test]
    fn test_envelope_roundtrip_preserves_attributes() {
        let fs = sample();
        let before = fs.stat("a/b/one.txt").unwrap();

        let loaded = decode(&encode(&fs).unwrap()).unwrap();
        let after = loaded.stat("a/b/one.txt").unwrap();
        assert_eq!(before, after);
        assert_eq!(loaded.stat("a/b").unwrap().mode, 0o750);
        assert_eq!(loaded.used_storage(), 12);
        assert_eq!(loaded.max_storage(), None);
        assert!(!loaded.is_encrypted());
    }

    #[test]
    fn test_unknown_version_rejected() {
        let envelope = Envelope {
            format_version: FORMAT_VERSION + 1,
            root: capture_dir(sample().root()),
        };
        let bytes = postcard::to_stdvec(&envelope).unwrap();
        assert!(matches!(decode(&bytes), Err(Error::Snapshot(_))));
    }

    #[test]
    fn test_file_root_rejected() {
        let envelope = Envelope {
            format_version: FORMAT_VERSION,
            root: SnapshotNode::File {
                name: "f".into(),
                mode: 0o644,
                modified: Utc::now(),
                content: vec![1, 2, 3],
            },
        };
        let bytes = postcard::to_stdvec(&envelope).unwrap();
        assert!(matches!(decode(&bytes), Err(Error::Snapshot(_))));
    }

    #[test]
    fn test_bad_child_names_rejected() {
        let file = |name: &str| SnapshotNode::File {
            name: name.into(),
            mode: 0o644,
            modified: Utc::now(),
            content: Vec::new(),
        };
        for children in [vec![file("x"), file("x")], vec![file("a/b")], vec![file("..")]] {
            let envelope = Envelope {
                format_version: FORMAT_VERSION,
                root: SnapshotNode::Directory {
                    name: String::new(),
                    mode: 0o755,
                    modified: Utc::now(),
                    children,
                },
            };
            let bytes = postcard::to_stdvec(&envelope).unwrap();
            assert!(matches!(decode(&bytes), Err(Error::Snapshot(_))));
        }
    }

    #[test]
    fn test_garbage_rejected() {
        assert!(matches!(decode(b"\xff\xff\xff\xff\xff"), Err(Error::Snapshot(_))));
        assert!(matches!(
            MemFs::decompress_and_load_from(&b"not zstd"[..]),
            Err(Error::Snapshot(_))
        ));
    }

    #[test]
    fn test_loaded_root_is_mutable() {
        let loaded = decode(&encode(&sample()).unwrap()).unwrap();
        loaded.write_file("a/new.txt", b"fresh", 0o644).unwrap();
        loaded.remove_all("a/b").unwrap();
        assert_eq!(loaded.used_storage(), 9 + 5);
        assert!(loaded.stat("a/b").unwrap_err().is_not_exist());
    }
}
