// Copyright 2025 Contributors to the Veraison project.
// SPDX-License-Identifier: Apache-2.0

use super::errors::Error;
use crate::token::{AppVerdict, DeviceTier, DeviceVerdict, LicensingVerdict, Verdicts};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;
use tracing::warn;

/// The durable record of the most recent check
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct VerdictSnapshot {
    /// Verdicts of the last successful check.  A failed check leaves them
    /// untouched.
    pub verdicts: Verdicts,
    /// Milliseconds since the epoch of the last attempt, 0 if never checked
    pub last_check_timestamp: i64,
    pub is_success: bool,
    /// Why the last attempt failed; `None` after a success
    pub error_message: Option<String>,
}

impl VerdictSnapshot {
    /// Whether any check was ever attempted
    pub fn has_baseline(&self) -> bool {
        self.last_check_timestamp != 0
    }

    pub fn overall_status(&self) -> OverallStatus {
        OverallStatus::of(self)
    }

    /// A one-line description for status displays
    pub fn summary(&self) -> String {
        let status = self.overall_status();

        match status {
            OverallStatus::Unknown => format!("{status}: never checked"),
            OverallStatus::Error => format!(
                "{status}: {}",
                self.error_message.as_deref().unwrap_or_default()
            ),
            _ => {
                let device = if self.verdicts.device.is_empty() {
                    "none".to_string()
                } else {
                    self.verdicts.device_labels().join(", ")
                };

                format!(
                    "{status}: device [{device}], app {}, license {}",
                    label_or_na(self.verdicts.app.as_ref().map(AppVerdict::as_str)),
                    label_or_na(
                        self.verdicts
                            .licensing
                            .as_ref()
                            .map(LicensingVerdict::as_str)
                    ),
                )
            }
        }
    }
}

fn label_or_na(label: Option<&str>) -> &str {
    label.unwrap_or("N/A")
}

/// A severity classification computed from a [`VerdictSnapshot`].  The four
/// integrity states are totally ordered (`Strong > Device > Basic > Failed`);
/// `Error` and `Unknown` compare equal only to themselves.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OverallStatus {
    Strong,
    Device,
    Basic,
    Failed,
    Error,
    Unknown,
}

impl OverallStatus {
    pub fn of(s: &VerdictSnapshot) -> OverallStatus {
        if !s.has_baseline() {
            return OverallStatus::Unknown;
        }

        if !s.is_success && s.error_message.as_deref().is_some_and(|m| !m.is_empty()) {
            return OverallStatus::Error;
        }

        match s.verdicts.device_tier() {
            DeviceTier::Strong => OverallStatus::Strong,
            DeviceTier::Device => OverallStatus::Device,
            DeviceTier::Basic => OverallStatus::Basic,
            DeviceTier::None => OverallStatus::Failed,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            OverallStatus::Strong => "STRONG",
            OverallStatus::Device => "DEVICE",
            OverallStatus::Basic => "BASIC",
            OverallStatus::Failed => "FAILED",
            OverallStatus::Error => "ERROR",
            OverallStatus::Unknown => "UNKNOWN",
        }
    }

    fn rank(&self) -> Option<u8> {
        match self {
            OverallStatus::Strong => Some(3),
            OverallStatus::Device => Some(2),
            OverallStatus::Basic => Some(1),
            OverallStatus::Failed => Some(0),
            OverallStatus::Error | OverallStatus::Unknown => None,
        }
    }
}

impl PartialOrd for OverallStatus {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        match (self.rank(), other.rank()) {
            (Some(a), Some(b)) => Some(a.cmp(&b)),
            _ if self == other => Some(Ordering::Equal),
            _ => None,
        }
    }
}

impl fmt::Display for OverallStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Render `timestamp` relative to `now` (both in milliseconds since the
/// epoch) the way status displays show it
pub fn format_relative_time(timestamp: i64, now: i64) -> String {
    const MINUTE: i64 = 60_000;
    const HOUR: i64 = 60 * MINUTE;
    const DAY: i64 = 24 * HOUR;

    if timestamp == 0 {
        return "Never".to_string();
    }

    match now - timestamp {
        d if d < MINUTE => "Just now".to_string(),
        d if d < HOUR => format!("{} min ago", d / MINUTE),
        d if d < DAY => format!("{} hr ago", d / HOUR),
        d => format!("{} days ago", d / DAY),
    }
}

// Stored layout.  Device verdicts are a comma-joined list of labels; the
// remaining fields are stored natively.
#[derive(Debug, Default, Serialize, Deserialize)]
#[serde(default)]
struct Record {
    last_device_verdict: String,
    last_app_verdict: Option<String>,
    last_licensing_verdict: Option<String>,
    last_check_timestamp: i64,
    last_check_success: bool,
    last_error_message: Option<String>,
}

const DEVICE_VERDICT_DELIMITER: &str = ",";

/// Serialise a snapshot into its stored form
pub fn encode(s: &VerdictSnapshot) -> Result<Vec<u8>, Error> {
    let r = Record {
        last_device_verdict: s
            .verdicts
            .device_labels()
            .join(DEVICE_VERDICT_DELIMITER),
        last_app_verdict: s.verdicts.app.map(|v| v.as_str().to_string()),
        last_licensing_verdict: s.verdicts.licensing.map(|v| v.as_str().to_string()),
        last_check_timestamp: s.last_check_timestamp,
        last_check_success: s.is_success,
        last_error_message: s.error_message.clone(),
    };

    serde_json::to_vec(&r).map_err(|e| Error::Syntax(e.to_string()))
}

// Labels written by a newer release may be unknown here: skip them rather
// than refusing the whole record.
fn stored_label<T: FromStr>(label: Option<&str>) -> Option<T> {
    let label = label.filter(|l| !l.is_empty())?;

    match label.parse::<T>() {
        Ok(v) => Some(v),
        Err(_) => {
            warn!(label, "ignoring unknown stored verdict");
            None
        }
    }
}

/// Parse a snapshot from its stored form
pub fn decode(buf: &[u8]) -> Result<VerdictSnapshot, Error> {
    let r: Record = serde_json::from_slice(buf).map_err(|e| Error::Syntax(e.to_string()))?;

    let device = r
        .last_device_verdict
        .split(DEVICE_VERDICT_DELIMITER)
        .filter_map(|l| stored_label::<DeviceVerdict>(Some(l.trim())))
        .collect();

    Ok(VerdictSnapshot {
        verdicts: Verdicts {
            device,
            app: stored_label(r.last_app_verdict.as_deref()),
            licensing: stored_label(r.last_licensing_verdict.as_deref()),
        },
        last_check_timestamp: r.last_check_timestamp,
        is_success: r.last_check_success,
        error_message: r.last_error_message.filter(|m| !m.is_empty()),
    })
}
