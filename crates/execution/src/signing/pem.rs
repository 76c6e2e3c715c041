//! PEM private-key loading for the ES256 signer.
//!
//! CDP keys arrive either as SEC1 (`BEGIN EC PRIVATE KEY`) or PKCS#8
//! (`BEGIN PRIVATE KEY`). `ring` only loads PKCS#8, so both forms are parsed
//! as a P-256 secret key and re-encoded as PKCS#8 DER.

use p256::pkcs8::{DecodePrivateKey, EncodePrivateKey};
use p256::SecretKey;

use super::SigningError;

const SEC1_LABEL: &str = "EC PRIVATE KEY";
const PKCS8_LABEL: &str = "PRIVATE KEY";

/// Decode a PEM private key into PKCS#8 DER.
///
/// Literal `\n` sequences are treated as newlines, since keys pasted into
/// environment variables usually arrive escaped.
pub(crate) fn private_key_pkcs8(pem: &str) -> Result<Vec<u8>, SigningError> {
    let normalized = pem.replace("\\n", "\n");
    let normalized = normalized.trim();

    let key = match pem_label(normalized) {
        Some(SEC1_LABEL) => SecretKey::from_sec1_pem(normalized)
            .map_err(|e| SigningError::InvalidKey(format!("SEC1 key: {e}")))?,
        Some(PKCS8_LABEL) => SecretKey::from_pkcs8_pem(normalized)
            .map_err(|e| SigningError::InvalidKey(format!("PKCS#8 key: {e}")))?,
        Some(other) => return Err(SigningError::UnsupportedPem(other.to_string())),
        None => return Err(SigningError::InvalidKey("no PEM BEGIN line".to_string())),
    };

    let der = key
        .to_pkcs8_der()
        .map_err(|e| SigningError::InvalidKey(format!("PKCS#8 encoding: {e}")))?;
    Ok(der.as_bytes().to_vec())
}

/// Label of the first `-----BEGIN ...-----` line.
fn pem_label(pem: &str) -> Option<&str> {
    pem.lines().map(str::trim).find_map(|line| {
        line.strip_prefix("-----BEGIN ")
            .and_then(|rest| rest.strip_suffix("-----"))
    })
}
