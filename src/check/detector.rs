// Copyright 2025 Contributors to the Veraison project.
// SPDX-License-Identifier: Apache-2.0

use crate::store::{OverallStatus, VerdictSnapshot};
use crate::token::{AppVerdict, DeviceTier, LicensingVerdict, Verdicts};
use std::fmt;

/// Title of every change notification
pub const CHANGE_TITLE: &str = "Integrity Status Changed";

const NOT_AVAILABLE: &str = "N/A";

/// A change in one verdict category.  Device changes are reported by the
/// highest satisfied tier on either side, even when the tier is unchanged and
/// only lesser labels differ.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CategoryChange {
    Device {
        from: DeviceTier,
        to: DeviceTier,
    },
    App {
        from: Option<AppVerdict>,
        to: Option<AppVerdict>,
    },
    Licensing {
        from: Option<LicensingVerdict>,
        to: Option<LicensingVerdict>,
    },
}

impl fmt::Display for CategoryChange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fn label(v: Option<&'static str>) -> &'static str {
            v.unwrap_or(NOT_AVAILABLE)
        }

        match self {
            CategoryChange::Device { from, to } => write!(f, "Device: {from} -> {to}"),
            CategoryChange::App { from, to } => write!(
                f,
                "App: {} -> {}",
                label(from.as_ref().map(AppVerdict::as_str)),
                label(to.as_ref().map(AppVerdict::as_str))
            ),
            CategoryChange::Licensing { from, to } => write!(
                f,
                "License: {} -> {}",
                label(from.as_ref().map(LicensingVerdict::as_str)),
                label(to.as_ref().map(LicensingVerdict::as_str))
            ),
        }
    }
}

/// One notification describing everything that changed in a check
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChangeEvent {
    pub title: String,
    pub message: String,
    pub is_improvement: bool,
    pub changes: Vec<CategoryChange>,
}

/// Compare two sets of verdicts category by category.  Device verdicts are
/// compared as sets, the others by equality.
pub fn diff(prev: &Verdicts, new: &Verdicts) -> Vec<CategoryChange> {
    let mut changes = Vec::new();

    if prev.device != new.device {
        changes.push(CategoryChange::Device {
            from: prev.device_tier(),
            to: new.device_tier(),
        });
    }

    if prev.app != new.app {
        changes.push(CategoryChange::App {
            from: prev.app,
            to: new.app,
        });
    }

    if prev.licensing != new.licensing {
        changes.push(CategoryChange::Licensing {
            from: prev.licensing,
            to: new.licensing,
        });
    }

    changes
}

/// Whether moving from `prev` to a device set of tier `new` climbs the
/// integrity ladder.  Leaving `Error` or `Unknown` never counts.
pub fn is_improvement(prev: OverallStatus, new: DeviceTier) -> bool {
    match prev {
        OverallStatus::Failed => new >= DeviceTier::Basic,
        OverallStatus::Basic => new >= DeviceTier::Device,
        OverallStatus::Device => new == DeviceTier::Strong,
        OverallStatus::Strong | OverallStatus::Error | OverallStatus::Unknown => false,
    }
}

/// Decide whether the verdicts of a new check warrant a notification.
/// Nothing is reported against a snapshot that was never checked.
pub fn detect(prev: &VerdictSnapshot, new: &Verdicts) -> Option<ChangeEvent> {
    if !prev.has_baseline() {
        return None;
    }

    let changes = diff(&prev.verdicts, new);
    if changes.is_empty() {
        return None;
    }

    let message = changes
        .iter()
        .map(CategoryChange::to_string)
        .collect::<Vec<_>>()
        .join(", ");

    Some(ChangeEvent {
        title: CHANGE_TITLE.to_string(),
        message,
        is_improvement: is_improvement(prev.overall_status(), new.device_tier()),
        changes,
    })
}
