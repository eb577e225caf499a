// Copyright 2025 Contributors to the Veraison project.
// SPDX-License-Identifier: Apache-2.0

#[derive(thiserror::Error, PartialEq, Eq)]
pub enum Error {
    #[error("Keys not configured: {0}")]
    KeysNotConfigured(String),
    #[error("Invalid key: {0}")]
    Key(String),
    #[error("Malformed token: {0}")]
    MalformedToken(String),
    #[error("Decryption failed: {0}")]
    DecryptionFailed(String),
    #[error("Signature invalid: {0}")]
    SignatureInvalid(String),
    #[error("Payload parse error: {0}")]
    PayloadParse(String),
    #[error("Nonce mismatch: {0}")]
    NonceMismatch(String),
    #[error("Entropy source unavailable: {0}")]
    Entropy(String),
}

impl Error {
    /// Configuration errors will not go away by retrying.
    pub fn is_configuration(&self) -> bool {
        matches!(self, Error::KeysNotConfigured(_) | Error::Key(_))
    }
}

impl std::fmt::Debug for Error {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Error::KeysNotConfigured(e)
            | Error::Key(e)
            | Error::MalformedToken(e)
            | Error::DecryptionFailed(e)
            | Error::SignatureInvalid(e)
            | Error::PayloadParse(e)
            | Error::NonceMismatch(e)
            | Error::Entropy(e) => {
                write!(f, "{}", e)
            }
        }
    }
}
