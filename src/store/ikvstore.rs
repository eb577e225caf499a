// Copyright 2025 Contributors to the Veraison project.
// SPDX-License-Identifier: Apache-2.0

use super::errors::Error;
use async_trait::async_trait;

/// Interface to the byte-level persistent store backing verdict snapshots and
/// settings.  Each `set` replaces the whole value under a key: readers see
/// either the previous value or the new one, never a mix.
#[async_trait]
pub trait IKeyValueStore: Send + Sync {
    /// Fetch the value stored under `key`, if any
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>, Error>;

    /// Replace the value stored under `key`
    async fn set(&self, key: &str, value: Vec<u8>) -> Result<(), Error>;
}
