// Copyright 2025 Contributors to the Veraison project.
// SPDX-License-Identifier: Apache-2.0

//! Nested JOSE envelope: a JWE (compact serialization) whose plaintext is a
//! JWS (compact serialization) carrying the attestation statement.
//!
//! Opening a token is a two step affair.  First the JWE is decrypted with the
//! symmetric decryption key (AES key wrap + AES-GCM); any authentication
//! failure stops processing.  Then the JWS found inside is checked against
//! the ES256 verification key.  Only the JWS payload of a token that passed
//! both steps is ever handed back to the caller.

use super::base64;
use super::errors::Error;
use super::keys::VerificationKeys;
use jsonwebtoken::{crypto, Algorithm, DecodingKey};
use openssl::aes::{unwrap_key, AesKey};
use openssl::symm::{decrypt_aead, Cipher};
use serde::Deserialize;

const JWE_SEGMENTS: usize = 5;
const JWS_SEGMENTS: usize = 3;

const GCM_IV_LEN: usize = 12;
const GCM_TAG_LEN: usize = 16;

// RFC 3394: a wrapped key is at least two 64-bit blocks plus the IV block
const MIN_WRAPPED_KEY_LEN: usize = 24;
const WRAP_BLOCK_LEN: usize = 8;

#[derive(Debug, Deserialize)]
struct JweHeader {
    alg: String,
    enc: String,
    #[serde(default)]
    zip: Option<String>,
}

#[derive(Debug, Deserialize)]
struct JwsHeader {
    alg: String,
    #[serde(default)]
    kid: Option<String>,
}

fn split_compact<'a>(token: &'a str, expected: usize, what: &str) -> Result<Vec<&'a str>, Error> {
    let parts: Vec<&str> = token.split('.').collect();

    if parts.len() != expected {
        return Err(Error::MalformedToken(format!(
            "expecting {expected} segments for {what}, got {}",
            parts.len()
        )));
    }

    Ok(parts)
}

fn parse_header<'de, T: Deserialize<'de>>(raw: &'de [u8], what: &str) -> Result<T, Error> {
    serde_json::from_slice(raw).map_err(|e| Error::MalformedToken(format!("{what}: {e}")))
}

/// An encrypted envelope in JWE compact serialization
#[derive(Debug)]
pub struct Jwe<'a> {
    header: JweHeader,
    /// base64url protected header, which doubles as AES-GCM additional data
    protected: &'a str,
    encrypted_key: Vec<u8>,
    iv: Vec<u8>,
    ciphertext: Vec<u8>,
    tag: Vec<u8>,
}

impl<'a> Jwe<'a> {
    /// Split and decode the five JWE segments.  No cryptographic operation is
    /// performed at this stage.
    pub fn parse(token: &'a str) -> Result<Self, Error> {
        let parts = split_compact(token.trim(), JWE_SEGMENTS, "JWE")?;

        let raw_header = base64::decode_segment(parts[0], "JWE protected header")?;
        let header: JweHeader = parse_header(&raw_header, "JWE protected header")?;

        Ok(Self {
            header,
            protected: parts[0],
            encrypted_key: base64::decode_segment(parts[1], "JWE encrypted key")?,
            iv: base64::decode_segment(parts[2], "JWE initialization vector")?,
            ciphertext: base64::decode_segment(parts[3], "JWE ciphertext")?,
            tag: base64::decode_segment(parts[4], "JWE authentication tag")?,
        })
    }

    /// Key management algorithm from the protected header
    pub fn alg(&self) -> &str {
        &self.header.alg
    }

    /// Content encryption algorithm from the protected header
    pub fn enc(&self) -> &str {
        &self.header.enc
    }

    /// Recover the content encryption key and decrypt the ciphertext.  Any
    /// unsupported algorithm or failed integrity check is reported as
    /// [`Error::DecryptionFailed`]; no partial plaintext is returned.
    pub fn decrypt(&self, key: &[u8]) -> Result<Vec<u8>, Error> {
        if let Some(zip) = &self.header.zip {
            return Err(Error::DecryptionFailed(format!(
                "unsupported compression {zip}"
            )));
        }

        let cipher = content_cipher(&self.header.enc)?;
        let cek = self.content_key(key)?;

        if cek.len() != cipher.key_len() {
            return Err(Error::DecryptionFailed(format!(
                "{} needs a {}-bit content key, got {} bits",
                self.header.enc,
                cipher.key_len() * 8,
                cek.len() * 8
            )));
        }

        if self.iv.len() != GCM_IV_LEN {
            return Err(Error::DecryptionFailed(format!(
                "expecting a {GCM_IV_LEN} bytes IV, got {}",
                self.iv.len()
            )));
        }

        if self.tag.len() != GCM_TAG_LEN {
            return Err(Error::DecryptionFailed(format!(
                "expecting a {GCM_TAG_LEN} bytes authentication tag, got {}",
                self.tag.len()
            )));
        }

        decrypt_aead(
            cipher,
            &cek,
            Some(self.iv.as_slice()),
            self.protected.as_bytes(),
            &self.ciphertext,
            &self.tag,
        )
        .map_err(|_| Error::DecryptionFailed("authentication tag mismatch".to_string()))
    }

    fn content_key(&self, key: &[u8]) -> Result<Vec<u8>, Error> {
        match self.header.alg.as_str() {
            "dir" => {
                if !self.encrypted_key.is_empty() {
                    return Err(Error::DecryptionFailed(
                        "direct encryption with a non-empty encrypted key".to_string(),
                    ));
                }
                Ok(key.to_vec())
            }
            "A128KW" => unwrap_content_key(key, 16, &self.encrypted_key),
            "A192KW" => unwrap_content_key(key, 24, &self.encrypted_key),
            "A256KW" => unwrap_content_key(key, 32, &self.encrypted_key),
            a => Err(Error::DecryptionFailed(format!(
                "unsupported key management algorithm {a}"
            ))),
        }
    }
}

fn content_cipher(enc: &str) -> Result<Cipher, Error> {
    match enc {
        "A128GCM" => Ok(Cipher::aes_128_gcm()),
        "A192GCM" => Ok(Cipher::aes_192_gcm()),
        "A256GCM" => Ok(Cipher::aes_256_gcm()),
        e => Err(Error::DecryptionFailed(format!(
            "unsupported content encryption algorithm {e}"
        ))),
    }
}

fn unwrap_content_key(kek: &[u8], kek_len: usize, wrapped: &[u8]) -> Result<Vec<u8>, Error> {
    if kek.len() != kek_len {
        return Err(Error::DecryptionFailed(format!(
            "key wrap needs a {}-bit key, got {} bits",
            kek_len * 8,
            kek.len() * 8
        )));
    }

    // openssl asserts on these, so check them upfront
    if wrapped.len() < MIN_WRAPPED_KEY_LEN || wrapped.len() % WRAP_BLOCK_LEN != 0 {
        return Err(Error::DecryptionFailed(format!(
            "wrapped key has invalid length {}",
            wrapped.len()
        )));
    }

    let kek = AesKey::new_decrypt(kek)
        .map_err(|e| Error::DecryptionFailed(format!("key wrap: {e:?}")))?;

    let mut cek = vec![0u8; wrapped.len() - WRAP_BLOCK_LEN];

    unwrap_key(&kek, None, &mut cek, wrapped)
        .map_err(|_| Error::DecryptionFailed("key unwrap integrity check failed".to_string()))?;

    Ok(cek)
}

/// A signed envelope in JWS compact serialization
#[derive(Debug)]
pub struct Jws<'a> {
    header: JwsHeader,
    /// `header.payload` exactly as received: the signed bytes
    signing_input: &'a str,
    payload: Vec<u8>,
    signature: &'a str,
}

impl<'a> Jws<'a> {
    /// Split and decode the three JWS segments without checking the signature
    pub fn parse(compact: &'a str) -> Result<Self, Error> {
        let parts = split_compact(compact.trim(), JWS_SEGMENTS, "JWS")?;

        let raw_header = base64::decode_segment(parts[0], "JWS protected header")?;
        let header: JwsHeader = parse_header(&raw_header, "JWS protected header")?;

        let payload = base64::decode_segment(parts[1], "JWS payload")?;
        base64::decode_segment(parts[2], "JWS signature")?;

        let trimmed = compact.trim();
        let signing_input = &trimmed[..parts[0].len() + 1 + parts[1].len()];

        Ok(Self {
            header,
            signing_input,
            payload,
            signature: parts[2],
        })
    }

    /// Signature algorithm from the protected header
    pub fn alg(&self) -> &str {
        &self.header.alg
    }

    /// Key identifier from the protected header, if any
    pub fn kid(&self) -> Option<&str> {
        self.header.kid.as_deref()
    }

    /// Check the ES256 signature over the signing input and, on success,
    /// return the payload.  Tokens announcing any other algorithm are refused.
    pub fn verify(&self, key: &DecodingKey) -> Result<&[u8], Error> {
        if self.header.alg != "ES256" {
            return Err(Error::SignatureInvalid(format!(
                "unsupported signature algorithm {}",
                self.header.alg
            )));
        }

        let valid = crypto::verify(
            self.signature,
            self.signing_input.as_bytes(),
            key,
            Algorithm::ES256,
        )
        .map_err(|e| Error::SignatureInvalid(e.to_string()))?;

        if !valid {
            return Err(Error::SignatureInvalid(
                "signature does not match the verification key".to_string(),
            ));
        }

        Ok(&self.payload)
    }
}

/// Decrypt the outer JWE, verify the inner JWS and return the authenticated
/// payload bytes.
///
/// Holding a [`VerificationKeys`] implies the key configuration has been
/// validated, so a missing key has already been reported as
/// [`Error::KeysNotConfigured`] by the time this is called.
pub fn unseal(token: &str, keys: &VerificationKeys) -> Result<Vec<u8>, Error> {
    let jwe = Jwe::parse(token)?;
    let plaintext = jwe.decrypt(keys.decryption_key())?;

    let compact = String::from_utf8(plaintext).map_err(|_| {
        Error::MalformedToken("JWE plaintext is not a compact JWS".to_string())
    })?;

    let jws = Jws::parse(&compact)?;
    let payload = jws.verify(keys.verification_key())?;

    Ok(payload.to_vec())
}
