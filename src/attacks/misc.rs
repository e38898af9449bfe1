// Degenerate token checks

use async_trait::async_trait;
use std::sync::Arc;
use tracing::warn;

use super::{AttackHelper, JwtAttack};
use crate::context::AttackContext;
use crate::messages::MISC_PREFIX;
use crate::models::{Confidence, Risk, VulnerabilityType};

/// Three empty parts, with and without trailing noise
pub const EMPTY_TOKENS: &[&str] = &["...", "...... "];

pub struct MiscAttack {
    helper: Arc<AttackHelper>,
}

impl MiscAttack {
    pub fn new(helper: Arc<AttackHelper>) -> Self {
        Self { helper }
    }
}

#[async_trait]
impl JwtAttack for MiscAttack {
    fn name(&self) -> &'static str {
        "misc"
    }

    async fn execute_attack(&self, ctx: &AttackContext) -> bool {
        for candidate in EMPTY_TOKENS {
            if ctx.is_stopped() {
                return false;
            }
            match self.helper.verify_token(candidate, ctx).await {
                Ok(true) => {
                    self.helper.raise_alert(
                        MISC_PREFIX,
                        VulnerabilityType::EmptyTokens,
                        Risk::High,
                        Confidence::Medium,
                        candidate,
                        ctx,
                        None,
                    );
                    return true;
                }
                Ok(false) => {}
                Err(e) => {
                    warn!("[JWT] empty token check aborted: {}", e);
                    return false;
                }
            }
        }
        false
    }
}
