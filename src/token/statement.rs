// Copyright 2025 Contributors to the Veraison project.
// SPDX-License-Identifier: Apache-2.0

use super::errors::Error;
use super::verdict::{AppVerdict, DeviceVerdict, LicensingVerdict, Verdicts};
use serde::{Deserialize, Deserializer, Serialize};
use std::collections::BTreeSet;
use std::str::FromStr;
use tracing::warn;

/// The authenticated payload of an integrity token.  Every section is
/// optional: the issuer omits what it did not evaluate.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IntegrityStatement {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub request_details: Option<RequestDetails>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub app_integrity: Option<AppIntegrity>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub device_integrity: Option<DeviceIntegrity>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub account_details: Option<AccountDetails>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RequestDetails {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub request_package_name: Option<String>,
    #[serde(
        default,
        deserialize_with = "string_or_number",
        skip_serializing_if = "Option::is_none"
    )]
    pub timestamp_millis: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub nonce: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub request_hash: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AppIntegrity {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub app_recognition_verdict: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub package_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub certificate_sha256_digest: Option<Vec<String>>,
    #[serde(
        default,
        deserialize_with = "string_or_number",
        skip_serializing_if = "Option::is_none"
    )]
    pub version_code: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeviceIntegrity {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub device_recognition_verdict: Option<Vec<String>>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AccountDetails {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub app_licensing_verdict: Option<String>,
}

// the issuer encodes 64-bit integers as JSON strings; accept both forms
fn string_or_number<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum StringOrNumber {
        S(String),
        N(serde_json::Number),
    }

    Ok(
        Option::<StringOrNumber>::deserialize(deserializer)?.map(|v| match v {
            StringOrNumber::S(s) => s,
            StringOrNumber::N(n) => n.to_string(),
        }),
    )
}

fn known<T: FromStr>(label: &str, what: &str) -> Option<T> {
    match label.parse::<T>() {
        Ok(v) => Some(v),
        Err(_) => {
            warn!(label, "ignoring unknown {what} verdict");
            None
        }
    }
}

impl IntegrityStatement {
    /// Decode the JSON statement carried by an authenticated token.  This
    /// does not make any trust decision: the caller must have obtained
    /// `payload` from [`super::unseal`].
    pub fn decode(payload: &[u8]) -> Result<IntegrityStatement, Error> {
        serde_json::from_slice(payload).map_err(|e| Error::PayloadParse(e.to_string()))
    }

    /// Extract the verdicts.  Missing sections and unknown labels both mean
    /// "nothing asserted".
    pub fn verdicts(&self) -> Verdicts {
        let device = self
            .device_integrity
            .as_ref()
            .and_then(|d| d.device_recognition_verdict.as_ref())
            .map(|labels| {
                labels
                    .iter()
                    .filter_map(|l| known::<DeviceVerdict>(l, "device"))
                    .collect::<BTreeSet<_>>()
            })
            .unwrap_or_default();

        let app = self
            .app_integrity
            .as_ref()
            .and_then(|a| a.app_recognition_verdict.as_deref())
            .and_then(|l| known::<AppVerdict>(l, "app"));

        let licensing = self
            .account_details
            .as_ref()
            .and_then(|a| a.app_licensing_verdict.as_deref())
            .and_then(|l| known::<LicensingVerdict>(l, "licensing"));

        Verdicts {
            device,
            app,
            licensing,
        }
    }

    /// The nonce echoed back by the issuer, if any
    pub fn nonce(&self) -> Option<&str> {
        self.request_details
            .as_ref()
            .and_then(|r| r.nonce.as_deref())
    }

    /// Make sure the statement answers the request identified by `expected`.
    /// Statements that do not echo a nonce are accepted.
    pub fn check_nonce(&self, expected: &str) -> Result<(), Error> {
        match self.nonce() {
            Some(n) if n.trim() != expected.trim() => Err(Error::NonceMismatch(
                "statement was issued for a different request".to_string(),
            )),
            _ => Ok(()),
        }
    }

    /// Package name the token was requested for, if any
    pub fn package_name(&self) -> Option<&str> {
        self.request_details
            .as_ref()
            .and_then(|r| r.request_package_name.as_deref())
    }
}
