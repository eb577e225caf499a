// Copyright 2025 Contributors to the Veraison project.
// SPDX-License-Identifier: Apache-2.0

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;

/// Implements the label <-> variant mapping shared by all verdict enums
macro_rules! verdict_labels {
    ($t:ident { $($v:ident => $l:literal),+ $(,)? }) => {
        impl $t {
            /// Every variant, in declaration order
            pub const ALL: &'static [$t] = &[$($t::$v),+];

            /// The label used on the wire and in storage
            pub fn as_str(&self) -> &'static str {
                match self {
                    $($t::$v => $l),+
                }
            }
        }

        impl FromStr for $t {
            type Err = UnknownLabel;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                match s {
                    $($l => Ok($t::$v),)+
                    other => Err(UnknownLabel(other.to_string())),
                }
            }
        }

        impl fmt::Display for $t {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.as_str())
            }
        }
    };
}

/// A verdict label outside the known set
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnknownLabel(pub String);

impl fmt::Display for UnknownLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "unknown verdict label {}", self.0)
    }
}

impl std::error::Error for UnknownLabel {}

/// Device recognition verdicts.  Variants are declared strongest first so
/// that an ordered set iterates most-severe-first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DeviceVerdict {
    MeetsStrongIntegrity,
    MeetsDeviceIntegrity,
    MeetsBasicIntegrity,
    MeetsVirtualIntegrity,
    NoIntegrity,
}

verdict_labels!(DeviceVerdict {
    MeetsStrongIntegrity => "MEETS_STRONG_INTEGRITY",
    MeetsDeviceIntegrity => "MEETS_DEVICE_INTEGRITY",
    MeetsBasicIntegrity => "MEETS_BASIC_INTEGRITY",
    MeetsVirtualIntegrity => "MEETS_VIRTUAL_INTEGRITY",
    NoIntegrity => "NO_INTEGRITY",
});

/// App recognition verdicts
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AppVerdict {
    PlayRecognized,
    UnrecognizedVersion,
    Unevaluated,
}

verdict_labels!(AppVerdict {
    PlayRecognized => "PLAY_RECOGNIZED",
    UnrecognizedVersion => "UNRECOGNIZED_VERSION",
    Unevaluated => "UNEVALUATED",
});

/// App licensing verdicts
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum LicensingVerdict {
    Licensed,
    Unlicensed,
    Unevaluated,
}

verdict_labels!(LicensingVerdict {
    Licensed => "LICENSED",
    Unlicensed => "UNLICENSED",
    Unevaluated => "UNEVALUATED",
});

/// The highest device integrity tier satisfied by a set of device verdicts,
/// ordered weakest to strongest.  Virtual integrity does not count towards
/// any tier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum DeviceTier {
    None,
    Basic,
    Device,
    Strong,
}

impl DeviceTier {
    pub fn of(verdicts: &BTreeSet<DeviceVerdict>) -> DeviceTier {
        if verdicts.contains(&DeviceVerdict::MeetsStrongIntegrity) {
            DeviceTier::Strong
        } else if verdicts.contains(&DeviceVerdict::MeetsDeviceIntegrity) {
            DeviceTier::Device
        } else if verdicts.contains(&DeviceVerdict::MeetsBasicIntegrity) {
            DeviceTier::Basic
        } else {
            DeviceTier::None
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            DeviceTier::None => "NONE",
            DeviceTier::Basic => "BASIC",
            DeviceTier::Device => "DEVICE",
            DeviceTier::Strong => "STRONG",
        }
    }
}

impl fmt::Display for DeviceTier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The trust verdicts extracted from one authenticated statement
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Verdicts {
    pub device: BTreeSet<DeviceVerdict>,
    pub app: Option<AppVerdict>,
    pub licensing: Option<LicensingVerdict>,
}

impl Verdicts {
    pub fn device_tier(&self) -> DeviceTier {
        DeviceTier::of(&self.device)
    }

    /// Device verdict labels, most severe first
    pub fn device_labels(&self) -> Vec<&'static str> {
        self.device.iter().map(DeviceVerdict::as_str).collect()
    }
}
