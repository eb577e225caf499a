// Copyright 2025 Contributors to the Veraison project.
// SPDX-License-Identifier: Apache-2.0

use crate::{store, token};

#[derive(thiserror::Error, PartialEq, Eq)]
pub enum Error {
    #[error("Token acquisition failed: {0}")]
    TokenAcquisition(String),
    #[error(transparent)]
    Token(#[from] token::Error),
    #[error(transparent)]
    Store(#[from] store::Error),
}

impl Error {
    /// Whether a later attempt may succeed.  Only configuration problems are
    /// final; every other failure is worth retrying with a fresh nonce.
    pub fn is_retryable(&self) -> bool {
        !matches!(self, Error::Token(e) if e.is_configuration())
    }
}

impl std::fmt::Debug for Error {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Error::TokenAcquisition(e) => write!(f, "{}", e),
            Error::Token(e) => write!(f, "{:?}", e),
            Error::Store(e) => write!(f, "{:?}", e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn retry_policy() {
        assert!(Error::TokenAcquisition("offline".to_string()).is_retryable());
        assert!(Error::from(store::Error::Unavailable("locked".to_string())).is_retryable());

        for e in [
            token::Error::MalformedToken(String::new()),
            token::Error::DecryptionFailed(String::new()),
            token::Error::SignatureInvalid(String::new()),
            token::Error::PayloadParse(String::new()),
            token::Error::NonceMismatch(String::new()),
        ] {
            assert!(Error::from(e).is_retryable());
        }

        assert!(!Error::from(token::Error::KeysNotConfigured(String::new())).is_retryable());
        assert!(!Error::from(token::Error::Key(String::new())).is_retryable());
    }

    #[test]
    fn messages_carry_the_cause() {
        assert_eq!(
            Error::from(token::Error::DecryptionFailed("tag mismatch".to_string())).to_string(),
            "Decryption failed: tag mismatch"
        );
        assert_eq!(
            Error::TokenAcquisition("network unreachable".to_string()).to_string(),
            "Token acquisition failed: network unreachable"
        );
    }
}
