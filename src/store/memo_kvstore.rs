// Copyright 2025 Contributors to the Veraison project.
// SPDX-License-Identifier: Apache-2.0

use super::errors::Error;
use super::ikvstore::IKeyValueStore;
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::RwLock;

/// A volatile key-value store.  Values are lost when the store is dropped.
#[derive(Debug, Default)]
pub struct MemoKeyValueStore {
    p: RwLock<HashMap<String, Vec<u8>>>,
}

impl MemoKeyValueStore {
    /// Returns a new empty store
    pub fn new() -> Self {
        Self {
            p: Default::default(),
        }
    }
}

#[async_trait]
impl IKeyValueStore for MemoKeyValueStore {
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>, Error> {
        let p = self
            .p
            .read()
            .map_err(|e| Error::Unavailable(e.to_string()))?;

        Ok(p.get(key).cloned())
    }

    async fn set(&self, key: &str, value: Vec<u8>) -> Result<(), Error> {
        self.p
            .write()
            .map_err(|e| Error::Unavailable(e.to_string()))?
            .insert(key.to_string(), value);

        Ok(())
    }
}
