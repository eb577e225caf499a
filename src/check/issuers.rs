// Copyright 2025 Contributors to the Veraison project.
// SPDX-License-Identifier: Apache-2.0

use super::surfaces::{BoxError, ITokenIssuer};
use async_trait::async_trait;
use std::ffi::OsString;
use std::path::PathBuf;
use tokio::process::Command;
use tracing::debug;

/// Reads a previously obtained token from a file.  The nonce is ignored, so
/// only statements that do not echo a nonce verify against it.
#[derive(Debug, Clone)]
pub struct FileTokenIssuer {
    path: PathBuf,
}

impl FileTokenIssuer {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

#[async_trait]
impl ITokenIssuer for FileTokenIssuer {
    async fn request_token(&self, _nonce: &str) -> Result<String, BoxError> {
        let token = tokio::fs::read_to_string(&self.path)
            .await
            .map_err(|e| format!("{}: {}", self.path.display(), e))?;

        Ok(token.trim().to_string())
    }
}

/// Runs an external program with the nonce as its only argument and takes
/// its standard output as the token
#[derive(Debug, Clone)]
pub struct CommandTokenIssuer {
    program: OsString,
}

impl CommandTokenIssuer {
    pub fn new(program: impl Into<OsString>) -> Self {
        Self {
            program: program.into(),
        }
    }
}

#[async_trait]
impl ITokenIssuer for CommandTokenIssuer {
    async fn request_token(&self, nonce: &str) -> Result<String, BoxError> {
        debug!(program = ?self.program, "requesting token");

        let out = Command::new(&self.program)
            .arg(nonce)
            .kill_on_drop(true)
            .output()
            .await?;

        if !out.status.success() {
            let stderr = String::from_utf8_lossy(&out.stderr);
            return Err(format!("issuer exited with {}: {}", out.status, stderr.trim()).into());
        }

        let token = String::from_utf8(out.stdout)?;
        let token = token.trim();

        if token.is_empty() {
            return Err("issuer returned an empty token".into());
        }

        Ok(token.to_string())
    }
}
