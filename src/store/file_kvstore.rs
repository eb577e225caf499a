// Copyright 2025 Contributors to the Veraison project.
// SPDX-License-Identifier: Apache-2.0

use super::errors::Error;
use super::ikvstore::IKeyValueStore;
use async_trait::async_trait;
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};
use tokio::{fs, task};
use tracing::debug;

/// A key-value store keeping one file per key in a directory.  Each `set`
/// writes a uniquely named temporary file next to the record and renames it
/// over the record, so a reader finds either the old or the new value in
/// full, and concurrent writers, even in other processes, never share a
/// temporary file.
#[derive(Debug, Clone)]
pub struct FileKeyValueStore {
    dir: PathBuf,
}

impl FileKeyValueStore {
    /// Returns a store rooted at `dir`.  The directory is created on the
    /// first write.
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn path_for(&self, key: &str) -> Result<PathBuf, Error> {
        if key.is_empty()
            || !key
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-')
        {
            return Err(Error::Syntax(format!("invalid key {:?}", key)));
        }

        Ok(self.dir.join(format!("{key}.json")))
    }
}

fn unavailable(path: &Path, e: std::io::Error) -> Error {
    Error::Unavailable(format!("{}: {}", path.display(), e))
}

#[async_trait]
impl IKeyValueStore for FileKeyValueStore {
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>, Error> {
        let path = self.path_for(key)?;

        match fs::read(&path).await {
            Ok(v) => Ok(Some(v)),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(unavailable(&path, e)),
        }
    }

    async fn set(&self, key: &str, value: Vec<u8>) -> Result<(), Error> {
        let path = self.path_for(key)?;
        let dir = self.dir.clone();
        let target = path.clone();
        let len = value.len();

        task::spawn_blocking(move || write_replace(&dir, &target, &value))
            .await
            .map_err(|e| Error::Unavailable(format!("{}: {}", path.display(), e)))??;

        debug!(path = %path.display(), len, "record written");

        Ok(())
    }
}

// a uniquely named temporary file, renamed over `target` once synced
fn write_replace(dir: &Path, target: &Path, value: &[u8]) -> Result<(), Error> {
    std::fs::create_dir_all(dir).map_err(|e| unavailable(dir, e))?;

    let mut tmp = tempfile::Builder::new()
        .prefix(".record-")
        .suffix(".tmp")
        .tempfile_in(dir)
        .map_err(|e| unavailable(dir, e))?;

    tmp.write_all(value).map_err(|e| unavailable(tmp.path(), e))?;
    tmp.as_file()
        .sync_all()
        .map_err(|e| unavailable(tmp.path(), e))?;

    tmp.persist(target).map_err(|e| unavailable(target, e.error))?;

    Ok(())
}
