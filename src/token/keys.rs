// Copyright 2025 Contributors to the Veraison project.
// SPDX-License-Identifier: Apache-2.0

use super::base64;
use super::errors::Error;
use jsonwebtoken::DecodingKey;
use openssl::nid::Nid;
use openssl::pkey::{Id, PKey};
use serde::Deserialize;

/// Environment variable holding the base64 encoded decryption key
pub const DECRYPTION_KEY_ENV: &str = "INTEGRITY_DECRYPTION_KEY";
/// Environment variable holding the base64 encoded verification key
pub const VERIFICATION_KEY_ENV: &str = "INTEGRITY_VERIFICATION_KEY";

/// Key material as provisioned out-of-band (e.g., copied from the Play
/// Console).  Both keys are standard base64: the decryption key is a raw AES
/// key, the verification key is a DER encoded SubjectPublicKeyInfo holding a
/// P-256 public key.
#[derive(Clone, Default, Deserialize)]
pub struct KeyConfig {
    #[serde(default)]
    pub decryption_key: Option<String>,
    #[serde(default)]
    pub verification_key: Option<String>,
}

impl std::fmt::Debug for KeyConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KeyConfig")
            .field("decryption_key", &redacted(&self.decryption_key))
            .field("verification_key", &redacted(&self.verification_key))
            .finish()
    }
}

fn redacted(v: &Option<String>) -> &'static str {
    match v {
        Some(s) if !s.trim().is_empty() => "<redacted>",
        _ => "<unset>",
    }
}

impl KeyConfig {
    /// Parse a key configuration from its JSON representation
    pub fn from_json(j: &str) -> Result<Self, Error> {
        serde_json::from_str(j).map_err(|e| Error::Key(format!("key configuration: {e}")))
    }

    /// Read the key configuration from [`DECRYPTION_KEY_ENV`] and
    /// [`VERIFICATION_KEY_ENV`]
    pub fn from_env() -> Self {
        Self {
            decryption_key: std::env::var(DECRYPTION_KEY_ENV).ok(),
            verification_key: std::env::var(VERIFICATION_KEY_ENV).ok(),
        }
    }

    /// Whether both keys have a non-empty value
    pub fn is_configured(&self) -> bool {
        present(&self.decryption_key).is_some() && present(&self.verification_key).is_some()
    }

    /// Decode and validate the configured key material.  Missing keys are
    /// reported before any decoding is attempted.
    pub fn load(&self) -> Result<VerificationKeys, Error> {
        let (dk, vk) = match (
            present(&self.decryption_key),
            present(&self.verification_key),
        ) {
            (Some(dk), Some(vk)) => (dk, vk),
            (None, Some(_)) => {
                return Err(Error::KeysNotConfigured(
                    "decryption key is missing".to_string(),
                ))
            }
            (Some(_), None) => {
                return Err(Error::KeysNotConfigured(
                    "verification key is missing".to_string(),
                ))
            }
            (None, None) => {
                return Err(Error::KeysNotConfigured(
                    "decryption and verification keys are missing".to_string(),
                ))
            }
        };

        let decryption_key = base64::decode_key(dk, "decryption key")?;

        if !matches!(decryption_key.len(), 16 | 24 | 32) {
            return Err(Error::Key(format!(
                "decryption key: expecting 16, 24 or 32 bytes, got {}",
                decryption_key.len()
            )));
        }

        let der = base64::decode_key(vk, "verification key")?;
        let verification_key = ec_p256_decoding_key(&der)?;

        Ok(VerificationKeys {
            decryption_key,
            verification_key,
        })
    }
}

fn present(v: &Option<String>) -> Option<&str> {
    v.as_deref().map(str::trim).filter(|s| !s.is_empty())
}

fn ec_p256_decoding_key(der: &[u8]) -> Result<DecodingKey, Error> {
    let pkey = PKey::public_key_from_der(der)
        .map_err(|e| Error::Key(format!("verification key: {e}")))?;

    if pkey.id() != Id::EC {
        return Err(Error::Key(format!(
            "verification key: expecting an EC key, got {:?}",
            pkey.id()
        )));
    }

    let curve = pkey
        .ec_key()
        .map_err(|e| Error::Key(format!("verification key: {e}")))?
        .group()
        .curve_name();

    if curve != Some(Nid::X9_62_PRIME256V1) {
        return Err(Error::Key(format!(
            "verification key: expecting a P-256 key, got {curve:?}"
        )));
    }

    // jsonwebtoken wants the bare EC point; going through PEM lets it strip
    // the SubjectPublicKeyInfo wrapping
    let pem = pkey
        .public_key_to_pem()
        .map_err(|e| Error::Key(format!("verification key: {e}")))?;

    DecodingKey::from_ec_pem(&pem).map_err(|e| Error::Key(format!("verification key: {e}")))
}

/// Validated key material used to open attestation tokens.  A value of this
/// type can only be obtained from a fully configured [`KeyConfig`].
#[derive(Clone)]
pub struct VerificationKeys {
    decryption_key: Vec<u8>,
    verification_key: DecodingKey,
}

impl VerificationKeys {
    /// Symmetric key used to unwrap (or directly decrypt) the JWE content
    pub fn decryption_key(&self) -> &[u8] {
        &self.decryption_key
    }

    /// Public key the inner JWS signature is checked against
    pub fn verification_key(&self) -> &DecodingKey {
        &self.verification_key
    }
}

impl std::fmt::Debug for VerificationKeys {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("VerificationKeys")
            .field("decryption_key_bits", &(self.decryption_key.len() * 8))
            .finish_non_exhaustive()
    }
}
