// Copyright 2025 Contributors to the Veraison project.
// SPDX-License-Identifier: Apache-2.0

use super::errors::Error;
use super::ikvstore::IKeyValueStore;
use super::memo_kvstore::MemoKeyValueStore;
use async_trait::async_trait;
use std::sync::atomic::{AtomicBool, Ordering};

/// An in-memory store that can be switched off to simulate outages
#[derive(Debug)]
pub struct FlakyKeyValueStore {
    inner: MemoKeyValueStore,
    available: AtomicBool,
}

impl Default for FlakyKeyValueStore {
    fn default() -> Self {
        Self {
            inner: MemoKeyValueStore::new(),
            available: AtomicBool::new(true),
        }
    }
}

impl FlakyKeyValueStore {
    pub fn set_available(&self, v: bool) {
        self.available.store(v, Ordering::SeqCst);
    }

    fn check(&self) -> Result<(), Error> {
        if self.available.load(Ordering::SeqCst) {
            Ok(())
        } else {
            Err(Error::Unavailable("simulated outage".to_string()))
        }
    }
}

#[async_trait]
impl IKeyValueStore for FlakyKeyValueStore {
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>, Error> {
        self.check()?;
        self.inner.get(key).await
    }

    async fn set(&self, key: &str, value: Vec<u8>) -> Result<(), Error> {
        self.check()?;
        self.inner.set(key, value).await
    }
}
