// JWT Attack Modules
//
// Server-side forgery techniques plus HMAC secret recovery, each behind the
// common `JwtAttack` contract so the orchestrator can run them in order:
//
// - header:    "none" algorithm bypass (spelling x header template grid)
// - payload:   null byte after the token / inside string claims
// - signature: embedded-key forgery, RS->HS algorithm confusion, null byte signatures
// - misc:      degenerate tokens ("...")
// - fuzzer:    operator wordlists written into chosen header/claim fields
// - secret:    dictionary then permutation search for the HMAC secret
// - client:    cookie/URL exposure checks on the baseline (not a forgery)
//
// Architecture:
//   AttackHelper (probe + finding sink, shared by composition)
//       ↑
//   header.rs / payload.rs / signature.rs / misc.rs / fuzzer.rs / secret.rs
//       ↑
//   orchestrator.rs (fixed order, stop at first success)
//
// Every module swallows its own errors: `execute_attack` never fails, it
// returns false and logs instead.

pub mod client;
pub mod fuzzer;
pub mod header;
pub mod misc;
pub mod payload;
pub mod secret;
pub mod signature;

pub use client::*;
pub use fuzzer::*;
pub use header::*;
pub use misc::*;
pub use payload::*;
pub use secret::*;
pub use signature::*;

use async_trait::async_trait;
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::context::AttackContext;
use crate::error::ProbeError;
use crate::messages;
use crate::models::{Confidence, Finding, Risk, VulnerabilityType};
use crate::probe::Probe;
use crate::reporting::FindingSink;

/// Null byte plus a recognizable marker, appended by the truncation attacks
pub const NULL_BYTE_MARKER: &str = "\0counterfeit";

#[async_trait]
pub trait JwtAttack: Send + Sync {
    fn name(&self) -> &'static str;

    /// Runs the technique against one context; true on a verified forgery
    async fn execute_attack(&self, ctx: &AttackContext) -> bool;
}

/// Probe and sink access shared by every technique
pub struct AttackHelper {
    probe: Arc<dyn Probe>,
    sink: Arc<dyn FindingSink>,
}

impl AttackHelper {
    pub fn new(probe: Arc<dyn Probe>, sink: Arc<dyn FindingSink>) -> Self {
        Self { probe, sink }
    }

    /// Send `token` in place of the original parameter value.
    ///
    /// Transport failures count as a rejection; only a fatal probe error
    /// is returned, and it aborts the calling technique.
    pub async fn verify_token(&self, token: &str, ctx: &AttackContext) -> Result<bool, ProbeError> {
        match self
            .probe
            .probe(&ctx.message, &ctx.param_name, token, &ctx.param_value)
            .await
        {
            Ok(accepted) => Ok(accepted),
            Err(ProbeError::Transport(e)) => {
                debug!("[JWT] probe transport error, counting as rejected: {}", e);
                Ok(false)
            }
            Err(ProbeError::Undeliverable(e)) => {
                warn!(
                    "[JWT] technique not deliverable for this location ({:?} {}): {}",
                    ctx.message.location(),
                    ctx.param_name,
                    e
                );
                Ok(false)
            }
            Err(fatal) => Err(fatal),
        }
    }

    /// Report the context's one successful forgery and stop all other work.
    /// Later successes in the same context are dropped.
    #[allow(clippy::too_many_arguments)]
    pub fn raise_alert(
        &self,
        prefix: &str,
        vulnerability: VulnerabilityType,
        risk: Risk,
        confidence: Confidence,
        token: &str,
        ctx: &AttackContext,
        other_info: Option<String>,
    ) -> bool {
        if !ctx.claim_success() {
            debug!("[JWT] {}{} success already reported for this context", prefix, vulnerability.key());
            return false;
        }
        info!("[JWT] {} accepted by {}", vulnerability.key(), ctx.message.url);
        self.report(build_finding(prefix, vulnerability, risk, confidence, token, ctx, other_info));
        true
    }

    /// Hand a finding to the sink without claiming the context
    pub fn report(&self, finding: Finding) {
        self.sink.report(finding);
    }
}

pub fn build_finding(
    prefix: &str,
    vulnerability: VulnerabilityType,
    risk: Risk,
    confidence: Confidence,
    attack: &str,
    ctx: &AttackContext,
    other_info: Option<String>,
) -> Finding {
    let template = messages::lookup(prefix, vulnerability.key());
    Finding {
        vulnerability,
        technique: prefix.trim_end_matches('.').to_string(),
        risk,
        confidence,
        name: template.name.to_string(),
        description: template.description.to_string(),
        solution: template.solution.to_string(),
        reference: template.reference.to_string(),
        cwe_id: template.cwe_id,
        wasc_id: template.wasc_id,
        param: ctx.param_name.clone(),
        attack: attack.to_string(),
        other_info,
        method: ctx.message.method().to_string(),
        url: ctx.message.url.clone(),
        timestamp: chrono::Utc::now(),
    }
}

#[cfg(test)]
pub(crate) mod testing {
    use super::*;
    use crate::context::StopSignal;
    use crate::models::HttpMessage;
    use crate::reporting::CollectingSink;
    use crate::token::TokenModel;
    use std::sync::Mutex;

    type Oracle = Box<dyn Fn(&str) -> Result<bool, ProbeError> + Send + Sync>;

    /// Probe that records every candidate and answers from a closure
    pub struct ScriptedProbe {
        oracle: Oracle,
        pub seen: Mutex<Vec<String>>,
    }

    impl ScriptedProbe {
        pub fn new(oracle: impl Fn(&str) -> Result<bool, ProbeError> + Send + Sync + 'static) -> Arc<Self> {
            Arc::new(Self {
                oracle: Box::new(oracle),
                seen: Mutex::new(Vec::new()),
            })
        }

        pub fn rejecting() -> Arc<Self> {
            Self::new(|_| Ok(false))
        }

        pub fn seen(&self) -> Vec<String> {
            self.seen.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl Probe for ScriptedProbe {
        async fn probe(&self, _: &HttpMessage, _: &str, candidate: &str, _: &str) -> Result<bool, ProbeError> {
            self.seen.lock().unwrap().push(candidate.to_string());
            (self.oracle)(candidate)
        }
    }

    pub fn helper(probe: Arc<ScriptedProbe>) -> (Arc<AttackHelper>, Arc<CollectingSink>) {
        let sink = Arc::new(CollectingSink::new());
        (Arc::new(AttackHelper::new(probe, sink.clone())), sink)
    }

    pub fn context(token: &str) -> AttackContext {
        AttackContext::new(
            Arc::new(HttpMessage::default()),
            "Authorization",
            format!("Bearer {}", token),
            TokenModel::parse(token).unwrap(),
            StopSignal::new(),
        )
    }
}
