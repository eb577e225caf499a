// Copyright 2025 Contributors to the Veraison project.
// SPDX-License-Identifier: Apache-2.0

use super::errors::Error;
use base64::{engine::general_purpose, Engine as _};
use openssl::rand::rand_bytes;

/// Number of plaintext characters in a nonce unless the caller asks otherwise
pub const DEFAULT_NONCE_LENGTH: usize = 50;

const ALPHABET: &[u8; 62] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz0123456789";

// largest multiple of the alphabet size that fits in a byte
const REJECTION_BOUND: u8 = 248;

/// Produce a fresh request nonce: `length` characters drawn uniformly from
/// `[A-Za-z0-9]` using the OpenSSL CSPRNG, base64url (padded) encoded.
///
/// If the random source cannot be used this fails with [`Error::Entropy`];
/// there is no fallback generator.
pub fn generate(length: usize) -> Result<String, Error> {
    let mut plain = Vec::with_capacity(length);
    let mut buf = [0u8; 64];

    while plain.len() < length {
        rand_bytes(&mut buf).map_err(|e| Error::Entropy(e.to_string()))?;

        for b in buf.iter().filter(|b| **b < REJECTION_BOUND) {
            plain.push(ALPHABET[(*b as usize) % ALPHABET.len()]);

            if plain.len() == length {
                break;
            }
        }
    }

    Ok(general_purpose::URL_SAFE.encode(plain))
}
