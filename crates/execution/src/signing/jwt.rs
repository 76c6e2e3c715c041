//! ES256 bearer-JWT signing for the Coinbase Advanced Trade API.
//!
//! Each signed request carries a fresh token:
//!
//! ```text
//! header  = {"alg":"ES256","typ":"JWT","kid":<key name>,"nonce":<16 random bytes, hex>}
//! payload = {"sub":<key name>,"iss":"cdp","nbf":now,"exp":now+120,"uri":"<METHOD> <host><path>"}
//! token   = b64url(header) "." b64url(payload) "." b64url(r || s)
//! ```
//!
//! `ring` produces an ASN.1 DER signature which is reshaped into the 64-byte
//! JOSE form by [`der_to_jose`].

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use chrono::{DateTime, Utc};
use ring::rand::{SecureRandom, SystemRandom};
use ring::signature::{EcdsaKeyPair, ECDSA_P256_SHA256_ASN1_SIGNING};
use serde::Serialize;

use exrelay_core::error::ExchangeError;
use exrelay_core::types::{Credentials, HttpMethod, JwtCredentials, RequestIntent, SignedRequest};

use super::der::der_to_jose;
use super::{encode_pairs, join_url, merge_pairs, pem, split_endpoint, RequestSigner, SigningError};

/// Token lifetime. Fixed by the exchange.
pub const JWT_TTL_SECS: i64 = 120;

const JWT_ISSUER: &str = "cdp";
/// Byte width of each P-256 signature integer.
const ES256_HALF_LEN: usize = 32;
const NONCE_LEN: usize = 16;

#[derive(Serialize)]
struct JwtHeader<'a> {
    alg: &'static str,
    typ: &'static str,
    kid: &'a str,
    nonce: String,
}

#[derive(Serialize)]
struct JwtClaims<'a> {
    sub: &'a str,
    iss: &'static str,
    nbf: i64,
    exp: i64,
    uri: String,
}

/// Signer for the bearer-JWT scheme.
///
/// Paths under one of the public prefixes are sent as-is, without a token.
pub struct BearerJwtSigner {
    base_url: String,
    /// Base URL host (no scheme), as it appears in the `uri` claim.
    host: String,
    public_prefixes: Vec<String>,
    rng: SystemRandom,
}

impl BearerJwtSigner {
    pub fn new(base_url: impl Into<String>, public_prefixes: Vec<String>) -> Self {
        let base_url = base_url.into();
        let host = base_url
            .split_once("://")
            .map_or(base_url.as_str(), |(_, rest)| rest)
            .split('/')
            .next()
            .unwrap_or_default()
            .to_string();
        Self {
            base_url,
            host,
            public_prefixes,
            rng: SystemRandom::new(),
        }
    }

    pub fn host(&self) -> &str {
        &self.host
    }

    /// Whether `endpoint` bypasses signing.
    pub fn is_public_path(&self, endpoint: &str) -> bool {
        let path = endpoint.split('?').next().unwrap_or(endpoint);
        self.public_prefixes.iter().any(|p| path.starts_with(p.as_str()))
    }

    /// Build a compact ES256 JWT authorising `method path` as of `now`.
    pub fn build_jwt(
        &self,
        creds: &JwtCredentials,
        method: HttpMethod,
        path: &str,
        now: DateTime<Utc>,
    ) -> Result<String, SigningError> {
        let mut nonce = [0u8; NONCE_LEN];
        self.rng
            .fill(&mut nonce)
            .map_err(|_| SigningError::Crypto("nonce generation failed".to_string()))?;

        let header = JwtHeader {
            alg: "ES256",
            typ: "JWT",
            kid: &creds.api_key,
            nonce: hex::encode(nonce),
        };
        let nbf = now.timestamp();
        let claims = JwtClaims {
            sub: &creds.api_key,
            iss: JWT_ISSUER,
            nbf,
            exp: nbf + JWT_TTL_SECS,
            uri: format!("{} {}{}", method, self.host, path),
        };

        let header_json =
            serde_json::to_vec(&header).map_err(|e| SigningError::Encoding(e.to_string()))?;
        let claims_json =
            serde_json::to_vec(&claims).map_err(|e| SigningError::Encoding(e.to_string()))?;
        let signing_input = format!(
            "{}.{}",
            URL_SAFE_NO_PAD.encode(header_json),
            URL_SAFE_NO_PAD.encode(claims_json)
        );

        let pkcs8 = pem::private_key_pkcs8(&creds.private_key_pem)?;
        let key_pair = EcdsaKeyPair::from_pkcs8(&ECDSA_P256_SHA256_ASN1_SIGNING, &pkcs8, &self.rng)
            .map_err(|e| SigningError::InvalidKey(e.to_string()))?;
        let der = key_pair
            .sign(&self.rng, signing_input.as_bytes())
            .map_err(|_| SigningError::Crypto("ECDSA signing failed".to_string()))?;
        let jose = der_to_jose(der.as_ref(), ES256_HALF_LEN)?;

        Ok(format!("{signing_input}.{}", URL_SAFE_NO_PAD.encode(jose)))
    }
}

impl RequestSigner for BearerJwtSigner {
    fn sign(
        &self,
        intent: &RequestIntent,
        credentials: Option<&Credentials>,
        now: DateTime<Utc>,
    ) -> Result<SignedRequest, ExchangeError> {
        let (path, embedded) = split_endpoint(&intent.endpoint)?;
        let url = join_url(&self.base_url, path);
        let mut request = if intent.method.is_read() {
            let query = encode_pairs(&merge_pairs(embedded, intent))?;
            if query.is_empty() {
                SignedRequest::new(intent.method, url.clone())
            } else {
                SignedRequest::new(intent.method, format!("{url}?{query}"))
            }
        } else {
            let target = if embedded.is_empty() {
                url.clone()
            } else {
                format!("{url}?{}", encode_pairs(&embedded)?)
            };
            if intent.params.is_empty() {
                SignedRequest::new(intent.method, target)
            } else {
                let body = serde_json::to_string(&intent.params)
                    .map_err(|e| SigningError::Encoding(e.to_string()))?;
                SignedRequest::new(intent.method, target).with_body("application/json", body)
            }
        };

        if intent.is_public || self.is_public_path(path) {
            return Ok(request);
        }

        let creds = match credentials {
            Some(Credentials::Jwt(c)) => c,
            Some(Credentials::Hmac(_)) => {
                return Err(ExchangeError::Credential(
                    "JWT signing needs an API key name and EC private key, not an HMAC secret"
                        .to_string(),
                ))
            }
            None => {
                return Err(ExchangeError::Credential(
                    "API key and private key are required to sign this request".to_string(),
                ))
            }
        };

        let token = self.build_jwt(creds, intent.method, url_path(&url), now)?;
        request = request.with_header("Authorization", format!("Bearer {token}"));
        Ok(request)
    }
}

/// Path of `url` after its authority, without any query.
fn url_path(url: &str) -> &str {
    let rest = url.split_once("://").map_or(url, |(_, rest)| rest);
    let rest = rest.split('?').next().unwrap_or(rest);
    rest.find('/').map_or("/", |i| &rest[i..])
}
