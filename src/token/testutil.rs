// Copyright 2025 Contributors to the Veraison project.
// SPDX-License-Identifier: Apache-2.0

//! Test-only token sealing, mirroring what the issuer does on its side.

use super::base64;
use super::keys::{KeyConfig, VerificationKeys};
use jsonwebtoken::{crypto, Algorithm, EncodingKey};
use openssl::aes::{wrap_key, AesKey};
use openssl::rand::rand_bytes;
use openssl::symm::{encrypt_aead, Cipher};

pub const SIGNING_KEY_PEM: &str = include_str!("../../testdata/signing-key.pem");
pub const DECRYPTION_KEY_B64: &str = include_str!("../../testdata/decryption-key.b64");
pub const VERIFICATION_KEY_B64: &str = include_str!("../../testdata/verification-key.b64");

pub fn key_config() -> KeyConfig {
    KeyConfig {
        decryption_key: Some(DECRYPTION_KEY_B64.to_string()),
        verification_key: Some(VERIFICATION_KEY_B64.to_string()),
    }
}

pub fn keys() -> VerificationKeys {
    key_config().load().expect("loading test keys")
}

pub fn decryption_key() -> Vec<u8> {
    base64::decode_key(DECRYPTION_KEY_B64, "decryption key").unwrap()
}

/// ES256 compact JWS over `payload`
pub fn sign(payload: &[u8]) -> String {
    let header = base64::encode_segment(br#"{"alg":"ES256"}"#);
    let signing_input = format!("{header}.{}", base64::encode_segment(payload));

    let key = EncodingKey::from_ec_pem(SIGNING_KEY_PEM.as_bytes()).unwrap();
    let signature = crypto::sign(signing_input.as_bytes(), &key, Algorithm::ES256).unwrap();

    format!("{signing_input}.{signature}")
}

/// Compact JWE of `plaintext` under the test decryption key
pub fn encrypt(plaintext: &[u8], alg: &str, enc: &str) -> String {
    encrypt_with(&decryption_key(), plaintext, alg, enc)
}

pub fn encrypt_with(kek: &[u8], plaintext: &[u8], alg: &str, enc: &str) -> String {
    let header = base64::encode_segment(format!(r#"{{"alg":"{alg}","enc":"{enc}"}}"#).as_bytes());

    let cipher = match enc {
        "A128GCM" => Cipher::aes_128_gcm(),
        "A192GCM" => Cipher::aes_192_gcm(),
        _ => Cipher::aes_256_gcm(),
    };

    let (cek, encrypted_key) = if alg == "dir" {
        (kek.to_vec(), Vec::new())
    } else {
        let mut cek = vec![0u8; cipher.key_len()];
        rand_bytes(&mut cek).unwrap();

        let wrapping = AesKey::new_encrypt(kek).unwrap();
        let mut wrapped = vec![0u8; cek.len() + 8];
        wrap_key(&wrapping, None, &mut wrapped, &cek).unwrap();

        (cek, wrapped)
    };

    let mut iv = [0u8; 12];
    rand_bytes(&mut iv).unwrap();

    let mut tag = [0u8; 16];
    let ciphertext =
        encrypt_aead(cipher, &cek, Some(&iv[..]), header.as_bytes(), plaintext, &mut tag).unwrap();

    [
        header,
        base64::encode_segment(&encrypted_key),
        base64::encode_segment(&iv),
        base64::encode_segment(&ciphertext),
        base64::encode_segment(&tag),
    ]
    .join(".")
}

/// A production-shaped token: A256KW / A256GCM around an ES256 JWS
pub fn seal(payload: &[u8]) -> String {
    encrypt(sign(payload).as_bytes(), "A256KW", "A256GCM")
}

/// A statement JSON answering `nonce` with the given verdict labels
pub fn statement(
    nonce: Option<&str>,
    device: &[&str],
    app: Option<&str>,
    licensing: Option<&str>,
) -> Vec<u8> {
    let mut s = serde_json::json!({
        "requestDetails": { "requestPackageName": "com.example.integrity" },
        "deviceIntegrity": { "deviceRecognitionVerdict": device },
    });

    if let Some(n) = nonce {
        s["requestDetails"]["nonce"] = n.into();
    }
    if let Some(a) = app {
        s["appIntegrity"] = serde_json::json!({ "appRecognitionVerdict": a });
    }
    if let Some(l) = licensing {
        s["accountDetails"] = serde_json::json!({ "appLicensingVerdict": l });
    }

    serde_json::to_vec(&s).unwrap()
}
