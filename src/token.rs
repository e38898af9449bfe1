// Token model for counterfeit
// Decoded header/payload/signature plus re-encoding to the compact wire form

use base64::{engine::general_purpose, Engine as _};
use lazy_static::lazy_static;
use regex::Regex;
use serde_json::{Map, Value};

use crate::error::TokenError;

pub const PERIOD: char = '.';
const BEARER_PREFIX: &str = "Bearer ";

lazy_static! {
    // header.payload.signature, signature may be empty (alg "none")
    static ref COMPACT_JWT: Regex =
        Regex::new(r"^[A-Za-z0-9_-]{2,}\.[A-Za-z0-9_-]{2,}\.[A-Za-z0-9_-]*$").unwrap();
}

/// Key family a JWS `alg` value belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AlgorithmFamily {
    Hmac,
    Rsa,
    RsaPss,
    Ec,
    Octet,
    None,
    Unknown,
}

impl AlgorithmFamily {
    pub fn of(alg: &str) -> Self {
        if alg.eq_ignore_ascii_case("none") {
            AlgorithmFamily::None
        } else if alg.starts_with("HS") {
            AlgorithmFamily::Hmac
        } else if alg.starts_with("RS") {
            AlgorithmFamily::Rsa
        } else if alg.starts_with("PS") {
            AlgorithmFamily::RsaPss
        } else if alg.starts_with("ES") {
            AlgorithmFamily::Ec
        } else if alg == "EdDSA" || alg.starts_with("Ed") {
            AlgorithmFamily::Octet
        } else {
            AlgorithmFamily::Unknown
        }
    }
}

/// A decoded JWS in compact serialization.
///
/// Header and payload are kept as the exact JSON text that was decoded, so
/// re-encoding an unmodified token reproduces the original string.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TokenModel {
    header: String,
    payload: String,
    signature: Vec<u8>,
}

impl TokenModel {
    pub fn new(header: String, payload: String, signature: Vec<u8>) -> Self {
        Self { header, payload, signature }
    }

    pub fn parse(token: &str) -> Result<Self, TokenError> {
        let parts: Vec<&str> = token.split(PERIOD).collect();
        if parts.len() != 3 {
            return Err(TokenError::WrongPartCount(parts.len()));
        }

        let header = decode_json_part(parts[0], "header")?;
        let payload = decode_json_part(parts[1], "payload")?;
        let signature = decode_part(parts[2], "signature")?;

        Ok(Self { header, payload, signature })
    }

    pub fn header(&self) -> &str {
        &self.header
    }

    pub fn payload(&self) -> &str {
        &self.payload
    }

    pub fn signature(&self) -> &[u8] {
        &self.signature
    }

    /// The `alg` header value, if present and a string
    pub fn algorithm(&self) -> Option<String> {
        self.header_json()
            .ok()
            .and_then(|h| h.get("alg").and_then(Value::as_str).map(str::to_string))
    }

    pub fn family(&self) -> AlgorithmFamily {
        self.algorithm()
            .map(|alg| AlgorithmFamily::of(&alg))
            .unwrap_or(AlgorithmFamily::Unknown)
    }

    pub fn header_json(&self) -> Result<Map<String, Value>, TokenError> {
        parse_object(&self.header, "header")
    }

    pub fn payload_json(&self) -> Result<Map<String, Value>, TokenError> {
        parse_object(&self.payload, "payload")
    }

    pub fn with_header(&mut self, header: impl Into<String>) -> &mut Self {
        self.header = header.into();
        self
    }

    pub fn with_payload(&mut self, payload: impl Into<String>) -> &mut Self {
        self.payload = payload.into();
        self
    }

    pub fn with_signature(&mut self, signature: impl Into<Vec<u8>>) -> &mut Self {
        self.signature = signature.into();
        self
    }

    /// base64url(header) "." base64url(payload): the bytes a signer covers
    pub fn signing_input(&self) -> String {
        format!(
            "{}{}{}",
            encode_part(self.header.as_bytes()),
            PERIOD,
            encode_part(self.payload.as_bytes())
        )
    }

    pub fn encode(&self) -> String {
        format!("{}{}{}", self.signing_input(), PERIOD, encode_part(&self.signature))
    }
}

pub fn encode_part(bytes: &[u8]) -> String {
    general_purpose::URL_SAFE_NO_PAD.encode(bytes)
}

fn decode_part(part: &str, name: &'static str) -> Result<Vec<u8>, TokenError> {
    general_purpose::URL_SAFE_NO_PAD
        .decode(part)
        .map_err(|e| TokenError::Base64 { part: name, reason: e.to_string() })
}

fn decode_json_part(part: &str, name: &'static str) -> Result<String, TokenError> {
    let bytes = decode_part(part, name)?;
    let text = String::from_utf8(bytes).map_err(|_| TokenError::Utf8 { part: name })?;
    parse_object(&text, name)?;
    Ok(text)
}

fn parse_object(text: &str, name: &'static str) -> Result<Map<String, Value>, TokenError> {
    match serde_json::from_str::<Value>(text) {
        Ok(Value::Object(map)) => Ok(map),
        Ok(_) => Err(TokenError::Json { part: name, reason: "not an object".to_string() }),
        Err(e) => Err(TokenError::Json { part: name, reason: e.to_string() }),
    }
}

/// Quick check used before attempting a full parse of a parameter value
pub fn looks_like_jwt(value: &str) -> bool {
    let value = strip_bearer(value).0;
    if !COMPACT_JWT.is_match(value) {
        return false;
    }
    let header = value.split(PERIOD).next().unwrap_or_default();
    decode_json_part(header, "header")
        .ok()
        .and_then(|h| parse_object(&h, "header").ok())
        .map(|h| h.contains_key("alg"))
        .unwrap_or(false)
}

/// Split off an `Authorization`-style `Bearer ` prefix, returning
/// the bare token and whether a prefix was present.
pub fn strip_bearer(value: &str) -> (&str, bool) {
    match value.strip_prefix(BEARER_PREFIX) {
        Some(rest) => (rest.trim(), true),
        None => (value.trim(), false),
    }
}
