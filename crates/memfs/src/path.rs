// SPDX-FileCopyrightText: 2025 Caspar Water Company
//
// SPDX-License-Identifier: Apache-2.0

//! Path validation and decomposition.
//!
//! Paths are slash-separated and relative to the root of a view. The root
//! itself is spelled `"."`. Backslashes carry no meaning and are ordinary
//! name characters.

use crate::error::{Error, Result};

/// The path naming the root of a view.
pub const ROOT: &str = ".";

/// Reports whether `path` is a clean relative path or `"."`.
#[must_use]
pub fn is_valid(path: &str) -> bool {
    if path == ROOT {
        return true;
    }
    if path.is_empty() {
        return false;
    }
    path.split('/')
        .all(|segment| !segment.is_empty() && segment != "." && segment != "..")
}

/// Fails with `InvalidPath` unless `path` is clean: no leading or trailing
/// slash, no empty segment, no `.` or `..` segment.
pub fn validate(path: &str) -> Result<()> {
    if is_valid(path) {
        Ok(())
    } else {
        Err(Error::invalid_path(path))
    }
}

#[must_use]
pub fn is_root(path: &str) -> bool {
    path == ROOT
}

/// Splits a validated path into its segments. The root has none.
#[must_use]
pub fn split(path: &str) -> Vec<&str> {
    if is_root(path) {
        return Vec::new();
    }
    path.split('/').collect()
}

/// Splits a validated, non-root path into its parent segments and final name.
#[must_use]
pub fn split_parent(path: &str) -> (Vec<&str>, &str) {
    match path.rsplit_once('/') {
        Some((parent, name)) => (parent.split('/').collect(), name),
        None => (Vec::new(), path),
    }
}

/// Extracts the final component of a path; the root yields `"."`.
#[must_use]
pub fn basename(path: &str) -> &str {
    path.rsplit('/').next().unwrap_or(path)
}

/// Joins a child name onto a path, treating `"."` as the empty prefix.
#[must_use]
pub fn join(parent: &str, name: &str) -> String {
    if is_root(parent) || parent.is_empty() {
        name.to_string()
    } else {
        format!("{parent}/{name}")
    }
}
