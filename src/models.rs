// Core data models for counterfeit

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;

/// Supported HTTP methods
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Method {
    GET,
    POST,
    PUT,
    DELETE,
    PATCH,
    OPTIONS,
    HEAD,
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Method::GET => write!(f, "GET"),
            Method::POST => write!(f, "POST"),
            Method::PUT => write!(f, "PUT"),
            Method::DELETE => write!(f, "DELETE"),
            Method::PATCH => write!(f, "PATCH"),
            Method::OPTIONS => write!(f, "OPTIONS"),
            Method::HEAD => write!(f, "HEAD"),
        }
    }
}

impl std::str::FromStr for Method {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "GET" => Ok(Method::GET),
            "POST" => Ok(Method::POST),
            "PUT" => Ok(Method::PUT),
            "DELETE" => Ok(Method::DELETE),
            "PATCH" => Ok(Method::PATCH),
            "OPTIONS" => Ok(Method::OPTIONS),
            "HEAD" => Ok(Method::HEAD),
            other => Err(format!("unsupported method: {}", other)),
        }
    }
}

/// Where the token travels in the request
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ParameterLocation {
    /// `Authorization: Bearer <token>`
    BearerHeader,
    /// Any other request header, value is the bare token
    Header,
    Cookie,
    Query,
    /// Top-level or nested field of a JSON body
    Body,
}

/// The original request (and optionally its baseline response) carrying the token
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct HttpMessage {
    pub method: Option<Method>,
    pub url: String,
    pub headers: HashMap<String, String>,
    pub body: Option<serde_json::Value>,
    pub location: Option<ParameterLocation>,
    pub response: Option<BaselineResponse>,
}

/// Response observed for the unmodified request
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BaselineResponse {
    pub status: u16,
    pub headers: Vec<(String, String)>,
    pub body: String,
}

impl HttpMessage {
    pub fn new(method: Method, url: impl Into<String>, location: ParameterLocation) -> Self {
        Self {
            method: Some(method),
            url: url.into(),
            location: Some(location),
            ..Default::default()
        }
    }

    pub fn method(&self) -> Method {
        self.method.unwrap_or(Method::GET)
    }

    pub fn location(&self) -> ParameterLocation {
        self.location.unwrap_or(ParameterLocation::BearerHeader)
    }

    /// All `Set-Cookie` values of the baseline response
    pub fn set_cookies(&self) -> Vec<&str> {
        self.response
            .iter()
            .flat_map(|r| r.headers.iter())
            .filter(|(name, _)| name.eq_ignore_ascii_case("set-cookie"))
            .map(|(_, value)| value.as_str())
            .collect()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Risk {
    Info,
    Low,
    Medium,
    High,
}

impl fmt::Display for Risk {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Risk::Info => write!(f, "INFO"),
            Risk::Low => write!(f, "LOW"),
            Risk::Medium => write!(f, "MEDIUM"),
            Risk::High => write!(f, "HIGH"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Confidence {
    Low,
    Medium,
    High,
    Confirmed,
}

impl fmt::Display for Confidence {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Confidence::Low => write!(f, "LOW"),
            Confidence::Medium => write!(f, "MEDIUM"),
            Confidence::High => write!(f, "HIGH"),
            Confidence::Confirmed => write!(f, "CONFIRMED"),
        }
    }
}

/// Kinds of weakness a successful forgery proves
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum VulnerabilityType {
    NoneAlgorithm,
    NullByte,
    AlgorithmConfusion,
    CustomPrivateKey,
    EmptyTokens,
    BruteForce,
    CustomFieldFuzz,
    CookieNoHttpOnly,
    CookieNoSecure,
    CookieNoSameSite,
    UrlExposure,
}

impl VulnerabilityType {
    /// Message catalog key fragment
    pub fn key(&self) -> &'static str {
        match self {
            VulnerabilityType::NoneAlgorithm => "nonealgorithm",
            VulnerabilityType::NullByte => "nullbyte",
            VulnerabilityType::AlgorithmConfusion => "algorithmconfusion",
            VulnerabilityType::CustomPrivateKey => "customprivatekey",
            VulnerabilityType::EmptyTokens => "emptytokens",
            VulnerabilityType::BruteForce => "bruteforce",
            VulnerabilityType::CustomFieldFuzz => "customfield",
            VulnerabilityType::CookieNoHttpOnly => "nohttponly",
            VulnerabilityType::CookieNoSecure => "nosecure",
            VulnerabilityType::CookieNoSameSite => "nosamesite",
            VulnerabilityType::UrlExposure => "urlexposure",
        }
    }
}

/// A verified weakness, handed to a `FindingSink` as soon as it is raised
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Finding {
    pub vulnerability: VulnerabilityType,
    pub technique: String,
    pub risk: Risk,
    pub confidence: Confidence,
    pub name: String,
    pub description: String,
    pub solution: String,
    pub reference: String,
    pub cwe_id: u32,
    pub wasc_id: u32,
    pub param: String,
    /// The forged token (or other payload) that the target accepted
    pub attack: String,
    pub other_info: Option<String>,
    pub method: String,
    pub url: String,
    pub timestamp: chrono::DateTime<chrono::Utc>,
}
