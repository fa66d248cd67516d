// SPDX-FileCopyrightText: 2025 Caspar Water Company
//
// SPDX-License-Identifier: Apache-2.0

//! Logging setup shared by the memfs workspace.
//!
//! Usage:
//! - Set MEMFS_LOG=off (default) - no logs
//! - Set MEMFS_LOG=info - structural operations
//! - Set MEMFS_LOG=debug - every mutation, lookup and snapshot step
//! - MEMFS_LOG=warn / MEMFS_LOG=error narrow the output further

use std::sync::Once;

// Re-export emit so macros can use it
pub use emit;

/// Environment variable consulted by [`init_diagnostics`].
pub const LOG_ENV: &str = "MEMFS_LOG";

static INIT: Once = Once::new();

/// Maps a `MEMFS_LOG` value onto a minimum level. `None` means logging is off.
fn parse_level(value: &str) -> Option<emit::Level> {
    match value.trim().to_ascii_lowercase().as_str() {
        "off" | "" => None,
        "debug" => Some(emit::Level::Debug),
        "warn" => Some(emit::Level::Warn),
        "error" => Some(emit::Level::Error),
        // "info" and anything unrecognized
        _ => Some(emit::Level::Info),
    }
}

/// Initialize diagnostics based on the MEMFS_LOG environment variable.
///
/// Safe to call multiple times; only the first call has any effect.
pub fn init_diagnostics() {
    INIT.call_once(|| {
        let value = std::env::var(LOG_ENV).unwrap_or_else(|_| "off".to_string());

        let Some(level) = parse_level(&value) else {
            return;
        };

        let rt = emit::setup()
            .emit_to(emit_term::stderr())
            .emit_when(emit::level::min_filter(level))
            .init();

        if !matches!(
            value.trim().to_ascii_lowercase().as_str(),
            "info" | "debug" | "warn" | "error"
        ) {
            emit::warn!("Unknown {env} value '{value}', using 'info'", env: LOG_ENV, value: value.as_str());
        }

        // The runtime must outlive every caller; nothing ever tears it down.
        std::mem::forget(rt);
    });
}

/// Log basic operations (mkdir, remove, snapshot save/load).
#[macro_export]
macro_rules! log_info {
    ($($arg:tt)*) => {
        $crate::emit::info!($($arg)*)
    };
}

/// Log detailed diagnostics (lookups, byte counts, quota deltas).
#[macro_export]
macro_rules! log_debug {
    ($($arg:tt)*) => {
        $crate::emit::debug!($($arg)*)
    };
}

/// Log recoverable conditions worth noticing (quota rejections, bad keys).
#[macro_export]
macro_rules! log_warn {
    ($($arg:tt)*) => {
        $crate::emit::warn!($($arg)*)
    };
}

/// Log failures that cannot be reported to a caller any other way.
#[macro_export]
macro_rules! log_error {
    ($($arg:tt)*) => {
        $crate::emit::error!($($arg)*)
    };
}

/// Short form of [`log_info!`].
#[macro_export]
macro_rules! info {
    ($($arg:tt)*) => {
        $crate::emit::info!($($arg)*)
    };
}

/// Short form of [`log_debug!`].
#[macro_export]
macro_rules! debug {
    ($($arg:tt)*) => {
        $crate::emit::debug!($($arg)*)
    };
}

/// Short form of [`log_warn!`].
#[macro_export]
macro_rules! warn {
    ($($arg:tt)*) => {
        $crate::emit::warn!($($arg)*)
    };
}

/// Short form of [`log_error!`].
#[macro_export]
macro_rules! error {
    ($($arg:tt)*) => {
        $crate::emit::error!($($arg)*)
    };
}

/// Re-export the init function for convenience
pub use init_diagnostics as init;
