// Client-side configuration checks
//
// Passive: looks at how the token reaches the client in the baseline
// exchange. Sends nothing, claims nothing, so several findings may come out
// of one parameter and the forgery techniques still run afterwards.

use std::sync::Arc;
use tracing::debug;

use super::{build_finding, AttackHelper};
use crate::context::AttackContext;
use crate::messages::CLIENT_PREFIX;
use crate::models::{Confidence, Finding, ParameterLocation, Risk, VulnerabilityType};

/// Security attributes present on one `Set-Cookie` value
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CookieAttributes {
    pub http_only: bool,
    pub secure: bool,
    pub same_site: bool,
}

/// Attributes of `set_cookie` if it sets the cookie called `name`
pub fn cookie_attributes(set_cookie: &str, name: &str) -> Option<CookieAttributes> {
    let mut parts = set_cookie.split(';').map(str::trim);
    let (cookie_name, _) = parts.next()?.split_once('=')?;
    if cookie_name.trim() != name {
        return None;
    }

    let mut attrs = CookieAttributes::default();
    for part in parts {
        let key = part.split('=').next().unwrap_or_default().trim();
        if key.eq_ignore_ascii_case("httponly") {
            attrs.http_only = true;
        } else if key.eq_ignore_ascii_case("secure") {
            attrs.secure = true;
        } else if key.eq_ignore_ascii_case("samesite") {
            attrs.same_site = true;
        }
    }
    Some(attrs)
}

pub struct ClientConfigurationCheck {
    helper: Arc<AttackHelper>,
}

impl ClientConfigurationCheck {
    pub fn new(helper: Arc<AttackHelper>) -> Self {
        Self { helper }
    }

    /// Every client-side weakness for the context's parameter
    pub fn findings(ctx: &AttackContext) -> Vec<Finding> {
        let mut findings = Vec::new();
        let finding = |vulnerability, risk, detail: String| {
            build_finding(
                CLIENT_PREFIX,
                vulnerability,
                risk,
                Confidence::Medium,
                &ctx.param_value,
                ctx,
                Some(detail),
            )
        };

        match ctx.message.location() {
            ParameterLocation::Query => {
                findings.push(finding(
                    VulnerabilityType::UrlExposure,
                    Risk::Low,
                    format!("Token sent in query parameter \"{}\"", ctx.param_name),
                ));
            }
            ParameterLocation::Cookie => {
                let cookies = ctx.message.set_cookies();
                for attrs in cookies.iter().filter_map(|c| cookie_attributes(c, &ctx.param_name)) {
                    let detail = |flag: &str| format!("Cookie \"{}\" is set without the {} flag", ctx.param_name, flag);
                    if !attrs.http_only {
                        findings.push(finding(VulnerabilityType::CookieNoHttpOnly, Risk::Medium, detail("HttpOnly")));
                    }
                    if !attrs.secure {
                        findings.push(finding(VulnerabilityType::CookieNoSecure, Risk::Low, detail("Secure")));
                    }
                    if !attrs.same_site {
                        findings.push(finding(VulnerabilityType::CookieNoSameSite, Risk::Low, detail("SameSite")));
                    }
                }
            }
            _ => {}
        }
        findings
    }

    /// Report every client-side finding; returns how many were raised
    pub fn run(&self, ctx: &AttackContext) -> usize {
        let findings = Self::findings(ctx);
        let count = findings.len();
        for finding in findings {
            self.helper.report(finding);
        }
        debug!("[JWT] {} client configuration findings for {}", count, ctx.param_name);
        count
    }
}
