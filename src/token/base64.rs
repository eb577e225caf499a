// Copyright 2025 Contributors to the Veraison project.
// SPDX-License-Identifier: Apache-2.0

use base64::{self, engine::general_purpose, Engine as _};

use super::errors::Error;

/// decodes bytes from a base64url-encoded (unpadded) JOSE segment
pub fn decode_segment(v: &str, what: &str) -> Result<Vec<u8>, Error> {
    general_purpose::URL_SAFE_NO_PAD
        .decode(v)
        .map_err(|e| Error::MalformedToken(format!("{what}: {e}")))
}

/// encodes bytes as a base64url (unpadded) JOSE segment
#[cfg(test)]
pub fn encode_segment(v: &[u8]) -> String {
    general_purpose::URL_SAFE_NO_PAD.encode(v)
}

/// decodes key material from standard base64, ignoring any embedded
/// whitespace (keys are usually pasted from a console, sometimes wrapped)
pub fn decode_key(v: &str, what: &str) -> Result<Vec<u8>, Error> {
    let compact: String = v.chars().filter(|c| !c.is_whitespace()).collect();

    general_purpose::STANDARD
        .decode(compact)
        .map_err(|e| Error::Key(format!("{what}: {e}")))
}

/// encodes key material as standard base64
#[cfg(test)]
pub fn encode_key(v: &[u8]) -> String {
    general_purpose::STANDARD.encode(v)
}
