// Copyright 2025 Contributors to the Veraison project.
// SPDX-License-Identifier: Apache-2.0

//! The token module turns an opaque integrity token into trust verdicts.
//!
//! An integrity token is a JWE whose plaintext is a JWS.  [`unseal`] decrypts
//! the former with the symmetric decryption key and verifies the latter with
//! the ES256 verification key, yielding the authenticated statement bytes.
//! [`IntegrityStatement`] parses those bytes and extracts the [`Verdicts`].
//! Fresh request nonces come from [`nonce::generate`].
//!
//! # Example
//!
//! ```no_run
//! use integrity_watch::token::{self, IntegrityStatement, KeyConfig};
//!
//! let keys = KeyConfig::from_json(&std::fs::read_to_string("keys.json").unwrap())
//!     .expect("parsing key configuration")
//!     .load()
//!     .expect("loading keys");
//!
//! let nonce = token::nonce::generate(token::DEFAULT_NONCE_LENGTH).expect("generating nonce");
//!
//! // hand `nonce` to the token issuer and obtain the compact token
//! let compact = std::fs::read_to_string("token.jwe").unwrap();
//!
//! // decrypt the JWE, verify the inner JWS
//! let payload = token::unseal(&compact, &keys).expect("unsealing token");
//!
//! let statement = IntegrityStatement::decode(&payload).expect("decoding statement");
//! statement.check_nonce(&nonce).expect("binding statement to request");
//!
//! let verdicts = statement.verdicts();
//! println!("device tier: {}", verdicts.device_tier());
//! ```

pub use self::envelope::{unseal, Jwe, Jws};
pub use self::errors::Error;
pub use self::keys::{KeyConfig, VerificationKeys, DECRYPTION_KEY_ENV, VERIFICATION_KEY_ENV};
pub use self::nonce::DEFAULT_NONCE_LENGTH;
pub use self::statement::IntegrityStatement;
pub use self::statement::{AccountDetails, AppIntegrity, DeviceIntegrity, RequestDetails};
pub use self::verdict::{
    AppVerdict, DeviceTier, DeviceVerdict, LicensingVerdict, UnknownLabel, Verdicts,
};

mod base64;
mod envelope;
mod errors;
mod keys;
pub mod nonce;
mod statement;
mod verdict;

#[cfg(test)]
pub(crate) mod testutil;
