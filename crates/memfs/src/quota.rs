// SPDX-FileCopyrightText: 2025 Caspar Water Company
//
// SPDX-License-Identifier: Apache-2.0

//! Storage accounting.
//!
//! One counter of committed bytes is shared by every view of a filesystem.
//! Its guard is never taken while a directory guard is held, and no
//! directory guard is taken while it is held. A file content guard may be
//! held while taking it, never the reverse.

use std::sync::Mutex;

use crate::error::{Error, Result};
use crate::lock;
use diagnostics::*;

#[derive(Debug)]
struct QuotaState {
    limit: Option<u64>,
    used: u64,
}

/// Tracks total stored bytes against an optional ceiling.
#[derive(Debug)]
pub struct Quota {
    state: Mutex<QuotaState>,
}

/// A configured limit of zero is the "unlimited" sentinel.
fn normalize(limit: Option<u64>) -> Option<u64> {
    limit.filter(|&l| l > 0)
}

impl Quota {
    #[must_use]
    pub fn new(limit: Option<u64>) -> Self {
        Self::with_usage(limit, 0)
    }

    #[must_use]
    pub fn with_usage(limit: Option<u64>, used: u64) -> Self {
        Self {
            state: Mutex::new(QuotaState {
                limit: normalize(limit),
                used,
            }),
        }
    }

    #[must_use]
    pub fn used(&self) -> u64 {
        lock(&self.state).used
    }

    #[must_use]
    pub fn limit(&self) -> Option<u64> {
        lock(&self.state).limit
    }

    /// Changes the ceiling. Usage already above a new, lower ceiling stays
    /// committed; only later growth is refused.
    pub fn set_limit(&self, limit: Option<u64>) {
        lock(&self.state).limit = normalize(limit);
    }

    /// Accounts for `additional` new bytes, refusing if the ceiling would be
    /// crossed. On refusal nothing changes.
    pub fn reserve(&self, additional: u64) -> Result<()> {
        self.replace(0, additional)
    }

    /// Accounts for content of `old` bytes being replaced by `new` bytes.
    /// Growth is checked against the ceiling; shrinking always succeeds.
    pub fn replace(&self, old: u64, new: u64) -> Result<()> {
        let mut state = lock(&self.state);
        let base = state.used.saturating_sub(old);
        let prospective = base.saturating_add(new);
        if new > old {
            if let Some(limit) = state.limit {
                if prospective > limit {
                    let used = state.used;
                    drop(state);
                    warn!(
                        "quota: refusing {requested} bytes, {used} of {limit} in use",
                        requested: new - old,
                        used: used,
                        limit: limit
                    );
                    return Err(Error::LimitExceeded {
                        requested: new - old,
                        used,
                        limit,
                    });
                }
            }
        }
        state.used = prospective;
        Ok(())
    }

    /// Unconditional correction, used where the bytes are already stored
    /// (close-time encryption, in-place decryption).
    pub fn adjust(&self, old: u64, new: u64) {
        let mut state = lock(&self.state);
        state.used = state.used.saturating_sub(old).saturating_add(new);
    }

    pub fn release(&self, bytes: u64) {
        if bytes == 0 {
            return;
        }
        let mut state = lock(&self.state);
        state.used = state.used.saturating_sub(bytes);
    }
}

impl Default for Quota {
    fn default() -> Self {
        Self::new(None)
    }
}
