// HMAC secret recovery
//
// Offline: candidates are checked against the token's own signature, the
// target is never contacted. Dictionary first, then every alphanumeric
// string shorter than the configured maximum.

use async_trait::async_trait;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use tracing::{debug, info};

use super::{AttackHelper, JwtAttack};
use crate::context::{AttackContext, StopSignal};
use crate::dictionary::SecretSource;
use crate::keys::{hmac_matches, HmacAlgorithm};
use crate::messages::SECRET_PREFIX;
use crate::models::{Confidence, Risk, VulnerabilityType};
use crate::permutation;
use crate::runner::TaskRunner;
use crate::token::TokenModel;

/// Signature check shared by every worker; keeps the first matching secret
struct SecretCheck {
    alg: HmacAlgorithm,
    input: Vec<u8>,
    signature: Vec<u8>,
    tried: AtomicUsize,
    winner: Mutex<Option<String>>,
}

impl SecretCheck {
    fn new(alg: HmacAlgorithm, token: &TokenModel) -> Self {
        Self {
            alg,
            input: token.signing_input().into_bytes(),
            signature: token.signature().to_vec(),
            tried: AtomicUsize::new(0),
            winner: Mutex::new(None),
        }
    }

    fn matches(&self, secret: &str) -> bool {
        self.tried.fetch_add(1, Ordering::Relaxed);
        if !hmac_matches(self.alg, secret.as_bytes(), &self.input, &self.signature) {
            return false;
        }
        if let Ok(mut winner) = self.winner.lock() {
            winner.get_or_insert_with(|| secret.to_string());
        }
        true
    }

    fn winner(&self) -> Option<String> {
        self.winner.lock().ok().and_then(|w| w.clone())
    }

    fn tried(&self) -> usize {
        self.tried.load(Ordering::Relaxed)
    }
}

pub struct SecretKeySearch {
    helper: Arc<AttackHelper>,
    runner: TaskRunner,
    dictionary: Option<Arc<dyn SecretSource>>,
    max_key_length: usize,
}

impl SecretKeySearch {
    pub fn new(
        helper: Arc<AttackHelper>,
        runner: TaskRunner,
        dictionary: Option<Arc<dyn SecretSource>>,
        max_key_length: usize,
    ) -> Self {
        Self {
            helper,
            runner,
            dictionary,
            max_key_length,
        }
    }

    /// Dictionary, then permutations unless the dictionary already matched
    async fn recover(&self, check: &Arc<SecretCheck>, stop: &StopSignal) -> bool {
        let test = {
            let check = Arc::clone(check);
            move |secret: String| {
                let check = Arc::clone(&check);
                async move { check.matches(&secret) }
            }
        };

        if let Some(dictionary) = &self.dictionary {
            if stop.is_stopped() {
                return false;
            }
            info!(
                "[JWT] dictionary search for the {} secret on {} workers",
                check.alg.name(),
                self.runner.workers()
            );
            let source = Arc::clone(dictionary);
            let producer_stop = stop.clone();
            let produce = move |emit: &mut dyn FnMut(String) -> bool| {
                for candidate in source.candidates() {
                    if producer_stop.is_stopped() || !emit(candidate) {
                        return false;
                    }
                }
                true
            };
            if permutation::stream(produce, &self.runner, stop, test.clone()).await {
                return true;
            }
        }
        if stop.is_stopped() {
            return false;
        }
        info!(
            "[JWT] brute forcing {} secrets shorter than {} characters on {} workers",
            check.alg.name(),
            self.max_key_length,
            self.runner.workers()
        );
        permutation::search(self.max_key_length, &self.runner, stop, test).await
    }
}

#[async_trait]
impl JwtAttack for SecretKeySearch {
    fn name(&self) -> &'static str {
        "secret"
    }

    async fn execute_attack(&self, ctx: &AttackContext) -> bool {
        let Some(alg) = ctx.token.algorithm().as_deref().and_then(HmacAlgorithm::from_alg) else {
            return false;
        };
        let check = Arc::new(SecretCheck::new(alg, &ctx.token));
        if !self.recover(&check, ctx.stop_signal()).await {
            debug!("[JWT] secret not recovered after {} candidates", check.tried());
            return false;
        }

        let secret = check.winner().unwrap_or_default();
        self.helper.raise_alert(
            SECRET_PREFIX,
            VulnerabilityType::BruteForce,
            Risk::High,
            Confidence::High,
            &ctx.token.encode(),
            ctx,
            Some(format!("HMAC secret: {}", secret)),
        );
        true
    }
}
