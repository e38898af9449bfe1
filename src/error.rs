// Error types for counterfeit
//
// One enum per concern. None of these unwind past a single attack module:
// every `execute_attack` catches what it calls and reports `false` instead.

use thiserror::Error;

/// Token could not be decoded into header, payload and signature
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TokenError {
    #[error("expected 3 dot-separated parts, got {0}")]
    WrongPartCount(usize),

    #[error("invalid base64url in {part}: {reason}")]
    Base64 { part: &'static str, reason: String },

    #[error("{part} is not UTF-8")]
    Utf8 { part: &'static str },

    #[error("{part} is not a JSON object: {reason}")]
    Json { part: &'static str, reason: String },
}

/// Key generation or signing failure
#[derive(Error, Debug)]
pub enum CryptoError {
    #[error("openssl: {0}")]
    OpenSsl(#[from] openssl::error::ErrorStack),

    #[error("unsupported algorithm: {0}")]
    UnsupportedAlgorithm(String),

    #[error("invalid HMAC key length")]
    InvalidKeyLength,

    #[error("key generation task failed: {0}")]
    Task(String),
}

/// Certificate store failures
#[derive(Error, Debug)]
pub enum KeyStoreError {
    #[error("unable to read key store {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("unable to parse key material for {alias}: {source}")]
    Parse {
        alias: String,
        #[source]
        source: openssl::error::ErrorStack,
    },

    #[error("unknown alias: {0}")]
    UnknownAlias(String),
}

/// Errors surfaced by the HTTP probe collaborator
#[derive(Error, Debug)]
pub enum ProbeError {
    /// The request could not be completed; counts as "not authenticated"
    #[error("transport error: {0}")]
    Transport(String),

    /// The candidate cannot be carried at this parameter location, so
    /// nothing was sent
    #[error("not deliverable: {0}")]
    Undeliverable(String),

    /// The probe cannot continue; aborts the current technique
    #[error("probe failure: {0}")]
    Fatal(String),
}

impl From<reqwest::Error> for ProbeError {
    fn from(err: reqwest::Error) -> Self {
        ProbeError::Transport(err.to_string())
    }
}

/// Invalid or unreadable configuration
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("unable to read config {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("malformed config: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("invalid value for {field}: {reason}")]
    Invalid { field: &'static str, reason: String },
}
