// Copyright 2025 Contributors to the Veraison project.
// SPDX-License-Identifier: Apache-2.0

//! Integrity checks end to end.
//!
//! [`Orchestrator::run`] performs one check: fresh nonce, token request,
//! verification, persistence, change detection, notification and display
//! refresh.  [`Scheduler`] drives the orchestrator periodically and on
//! demand.  The collaborators a check needs are behind the [`ITokenIssuer`],
//! [`IDisplaySurface`] and [`INotifier`] traits.

pub use self::detector::{detect, diff, is_improvement, CategoryChange, ChangeEvent, CHANGE_TITLE};
pub use self::errors::Error;
pub use self::issuers::{CommandTokenIssuer, FileTokenIssuer};
pub use self::orchestrator::{CheckOutcome, Orchestrator};
pub use self::scheduler::{
    effective_interval, interval_label, Backoff, CheckInterval, Scheduler, SchedulerHandle,
    MIN_INTERVAL_MINUTES, SETTINGS_POLL,
};
pub use self::surfaces::{BoxError, IDisplaySurface, INotifier, ITokenIssuer};

mod detector;
mod errors;
mod issuers;
mod orchestrator;
mod scheduler;
mod surfaces;

#[cfg(test)]
pub(crate) mod testutil;
