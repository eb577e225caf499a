// Copyright 2025 Contributors to the Veraison project.
// SPDX-License-Identifier: Apache-2.0

//! Persistence of check results and settings.
//!
//! Everything is kept in an [`IKeyValueStore`], one whole record per key.
//! [`VerdictStore`] owns the current [`VerdictSnapshot`] and publishes every
//! update to its subscribers.

pub use self::errors::Error;
pub use self::file_kvstore::FileKeyValueStore;
pub use self::ikvstore::IKeyValueStore;
pub use self::memo_kvstore::MemoKeyValueStore;
pub use self::settings::{Settings, SETTINGS_KEY};
pub use self::snapshot::{format_relative_time, OverallStatus, VerdictSnapshot};
pub use self::verdictstore::{now_millis, VerdictStore, SNAPSHOT_KEY, UNKNOWN_ERROR};

mod errors;
mod file_kvstore;
mod ikvstore;
mod memo_kvstore;
mod settings;
mod snapshot;
mod verdictstore;

#[cfg(test)]
pub(crate) mod testutil;
