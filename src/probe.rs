// HTTP probe for counterfeit
// Substitutes a candidate token into the original request, sends it with
// reqwest and asks the verdict engine whether it was still authenticated

use async_trait::async_trait;
use reqwest::header::{HeaderValue, AUTHORIZATION, COOKIE};
use reqwest::{Client, RequestBuilder, Url};
use serde_json::Value;
use std::time::Duration;
use tracing::debug;

use crate::error::ProbeError;
use crate::models::{HttpMessage, ParameterLocation};
use crate::verdict::{decide_verdict, Verdict};

/// The single point where attacks talk to the target
#[async_trait]
pub trait Probe: Send + Sync {
    /// True if the request carrying `candidate` in place of `original_value`
    /// was judged authenticated.
    async fn probe(
        &self,
        message: &HttpMessage,
        param_name: &str,
        candidate: &str,
        original_value: &str,
    ) -> Result<bool, ProbeError>;
}

pub struct HttpProbe {
    pub client: Client,
}

impl HttpProbe {
    pub fn new(timeout: Duration) -> Result<Self, ProbeError> {
        let client = Client::builder()
            .pool_max_idle_per_host(10)
            .timeout(timeout)
            .build()
            .map_err(|e| ProbeError::Fatal(e.to_string()))?;
        Ok(Self { client })
    }

    pub fn build_request(
        &self,
        message: &HttpMessage,
        param_name: &str,
        candidate: &str,
        original_value: &str,
    ) -> Result<RequestBuilder, ProbeError> {
        let location = message.location();
        let mut url = Url::parse(&message.url).map_err(|e| ProbeError::Fatal(format!("bad url {}: {}", message.url, e)))?;
        if location == ParameterLocation::Query {
            substitute_query(&mut url, param_name, candidate);
        }

        let method = message
            .method()
            .to_string()
            .parse::<reqwest::Method>()
            .map_err(|e| ProbeError::Fatal(e.to_string()))?;
        let mut req = self.client.request(method, url);

        for (name, value) in &message.headers {
            let overridden = (location == ParameterLocation::BearerHeader && name.eq_ignore_ascii_case("authorization"))
                || (location == ParameterLocation::Header && name.eq_ignore_ascii_case(param_name))
                || (location == ParameterLocation::Cookie && name.eq_ignore_ascii_case("cookie"));
            if !overridden {
                req = req.header(name.as_str(), value.as_str());
            }
        }

        req = match location {
            ParameterLocation::BearerHeader => {
                let mut value = header_value(format!("Bearer {}", candidate))?;
                value.set_sensitive(true);
                req.header(AUTHORIZATION, value)
            }
            ParameterLocation::Header => {
                let value = if original_value.starts_with("Bearer ") {
                    format!("Bearer {}", candidate)
                } else {
                    candidate.to_string()
                };
                req.header(param_name, header_value(value)?)
            }
            ParameterLocation::Cookie => {
                let original = message
                    .headers
                    .iter()
                    .find(|(k, _)| k.eq_ignore_ascii_case("cookie"))
                    .map(|(_, v)| v.as_str())
                    .unwrap_or_default();
                let cookie = substitute_cookie(original, param_name, &percent_encode_controls(candidate));
                req.header(COOKIE, header_value(cookie)?)
            }
            ParameterLocation::Query => req,
            ParameterLocation::Body => {
                let mut body = message.body.clone().unwrap_or_else(|| Value::Object(Default::default()));
                substitute_params(&mut body, param_name, candidate);
                req.json(&body)
            }
        };

        if location != ParameterLocation::Body {
            if let Some(body) = &message.body {
                req = req.json(body);
            }
        }
        Ok(req)
    }
}

#[async_trait]
impl Probe for HttpProbe {
    async fn probe(
        &self,
        message: &HttpMessage,
        param_name: &str,
        candidate: &str,
        original_value: &str,
    ) -> Result<bool, ProbeError> {
        let req = self.build_request(message, param_name, candidate, original_value)?;
        let resp = req.send().await?;
        let status = resp.status().as_u16();
        let body = resp.text().await.unwrap_or_default();
        let verdict = decide_verdict(status, &body, message.response.as_ref());
        debug!("[JWT] probe {} {} -> {} {:?}", message.method(), message.url, status, verdict);
        Ok(verdict == Verdict::Authenticated)
    }
}

/// Header values cannot carry NUL, CR, LF or other control bytes
fn header_value(value: String) -> Result<HeaderValue, ProbeError> {
    HeaderValue::from_str(&value).map_err(|_| {
        ProbeError::Undeliverable(format!(
            "header value contains control characters: {}",
            value.escape_debug()
        ))
    })
}

/// Cookie values travel with control bytes as %XX, the way most servers
/// decode them
fn percent_encode_controls(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    for ch in value.chars() {
        if ch.is_ascii_control() {
            out.push_str(&format!("%{:02X}", ch as u32));
        } else {
            out.push(ch);
        }
    }
    out
}

/// Replace the value of `param_name` in the query string, appending it if absent
pub fn substitute_query(url: &mut Url, param_name: &str, candidate: &str) {
    let mut pairs: Vec<(String, String)> = url.query_pairs().into_owned().collect();
    let mut replaced = false;
    for (k, v) in pairs.iter_mut() {
        if k == param_name {
            *v = candidate.to_string();
            replaced = true;
        }
    }
    if !replaced {
        pairs.push((param_name.to_string(), candidate.to_string()));
    }
    url.query_pairs_mut().clear().extend_pairs(pairs);
}

/// Replace (or append) `param_name=...` inside a Cookie header value
pub fn substitute_cookie(cookie_header: &str, param_name: &str, candidate: &str) -> String {
    let mut found = false;
    let mut parts: Vec<String> = cookie_header
        .split(';')
        .map(str::trim)
        .filter(|p| !p.is_empty())
        .map(|p| match p.split_once('=') {
            Some((name, _)) if name.trim() == param_name => {
                found = true;
                format!("{}={}", param_name, candidate)
            }
            _ => p.to_string(),
        })
        .collect();
    if !found {
        parts.push(format!("{}={}", param_name, candidate));
    }
    parts.join("; ")
}

/// Replace every JSON field named `param_name`, at any depth
pub fn substitute_params(json: &mut Value, param_name: &str, candidate: &str) {
    match json {
        Value::Object(map) => {
            for (k, v) in map.iter_mut() {
                if k == param_name {
                    *v = Value::String(candidate.to_string());
                } else {
                    substitute_params(v, param_name, candidate);
                }
            }
        }
        Value::Array(arr) => {
            for v in arr.iter_mut() {
                substitute_params(v, param_name, candidate);
            }
        }
        _ => {}
    }
}
