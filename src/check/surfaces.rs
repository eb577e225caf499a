// Copyright 2025 Contributors to the Veraison project.
// SPDX-License-Identifier: Apache-2.0

//! Interfaces to the collaborators a check talks to.

use super::detector::ChangeEvent;
use crate::store::VerdictSnapshot;
use async_trait::async_trait;

/// Opaque failure reported by a collaborator
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Source of integrity tokens
#[async_trait]
pub trait ITokenIssuer: Send + Sync {
    /// Obtain a token bound to `nonce`.  This is the network round-trip of a
    /// check and may be cancelled by dropping the future.
    async fn request_token(&self, nonce: &str) -> Result<String, BoxError>;
}

/// Something that renders the current snapshot
#[async_trait]
pub trait IDisplaySurface: Send + Sync {
    /// Redraw from `snapshot`.  Must be idempotent.
    async fn refresh(&self, snapshot: &VerdictSnapshot) -> Result<(), BoxError>;
}

/// User-facing alerts.  A notifier lacking permission to post should return
/// `Ok(())` without doing anything.
#[async_trait]
pub trait INotifier: Send + Sync {
    async fn notify_change(&self, event: &ChangeEvent) -> Result<(), BoxError>;

    async fn notify_failure(&self, message: &str) -> Result<(), BoxError>;
}
