// Custom field fuzzing
//
// Operator-driven: each configured fuzzer overwrites one JOSE header
// parameter or claim with every entry of its wordlist and replays the token.
// Without `signature_required` the original signature is kept, so any
// accepted value also shows the target skipped verification.

use async_trait::async_trait;
use serde_json::Value;
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use super::{sign_with_embedded_key, AttackHelper, JwtAttack};
use crate::config::CustomFieldFuzzer;
use crate::context::AttackContext;
use crate::dictionary::SecretSource;
use crate::error::{CryptoError, ProbeError, TokenError};
use crate::keys::{hmac_sign, ForgeryKey, HmacAlgorithm, KeySpec};
use crate::messages::FUZZER_PREFIX;
use crate::models::{Confidence, Risk, VulnerabilityType};
use crate::token::TokenModel;

const WORDLIST_CHANNEL_CAPACITY: usize = 64;

/// How each fuzzed token gets its signature
enum Resign {
    Keep,
    Hmac(HmacAlgorithm, Vec<u8>),
    Embedded(ForgeryKey),
}

impl Resign {
    fn apply(&self, token: TokenModel) -> Result<TokenModel, CryptoError> {
        match self {
            Resign::Keep => Ok(token),
            Resign::Hmac(alg, secret) => {
                let mut signed = token;
                let signature = hmac_sign(*alg, secret, signed.signing_input().as_bytes())?;
                signed.with_signature(signature);
                Ok(signed)
            }
            Resign::Embedded(key) => sign_with_embedded_key(&token, key),
        }
    }
}

/// Copy of `token` with the fuzzer's field set to `value`. The signature is
/// left untouched.
pub fn with_field(token: &TokenModel, fuzzer: &CustomFieldFuzzer, value: &str) -> Result<TokenModel, TokenError> {
    let mut forged = token.clone();
    if fuzzer.header_field {
        let mut header = token.header_json()?;
        header.insert(fuzzer.field_name.clone(), Value::String(value.to_string()));
        forged.with_header(Value::Object(header).to_string());
    } else {
        let mut claims = token.payload_json()?;
        claims.insert(fuzzer.field_name.clone(), Value::String(value.to_string()));
        forged.with_payload(Value::Object(claims).to_string());
    }
    Ok(forged)
}

pub struct CustomFieldAttack {
    helper: Arc<AttackHelper>,
    fuzzers: Vec<CustomFieldFuzzer>,
}

impl CustomFieldAttack {
    pub fn new(helper: Arc<AttackHelper>, fuzzers: Vec<CustomFieldFuzzer>) -> Self {
        Self { helper, fuzzers }
    }

    /// None when the fuzzer asks for a signature we cannot produce
    async fn resign_for(&self, fuzzer: &CustomFieldFuzzer, token: &TokenModel) -> Option<Resign> {
        if !fuzzer.signature_required {
            return Some(Resign::Keep);
        }
        let alg = token.algorithm()?;
        if let Some(hmac) = HmacAlgorithm::from_alg(&alg) {
            return match &fuzzer.signing_secret {
                Some(secret) => Some(Resign::Hmac(hmac, secret.as_bytes().to_vec())),
                None => {
                    warn!(
                        "[JWT] fuzzer for {} needs a signing_secret to re-sign {} tokens, skipping",
                        fuzzer.field_name, alg
                    );
                    None
                }
            };
        }

        let Some(spec) = KeySpec::for_algorithm(&alg).into_iter().next() else {
            warn!("[JWT] fuzzer for {} cannot sign {} tokens, skipping", fuzzer.field_name, alg);
            return None;
        };
        match tokio::task::spawn_blocking(move || spec.generate()).await {
            Ok(Ok(key)) => Some(Resign::Embedded(key)),
            Ok(Err(e)) => {
                warn!("[JWT] {} key generation failed: {}", alg, e);
                None
            }
            Err(e) => {
                warn!("[JWT] {} key generation task failed: {}", alg, e);
                None
            }
        }
    }

    async fn fuzz(&self, fuzzer: &CustomFieldFuzzer, ctx: &AttackContext) -> Result<bool, ProbeError> {
        let Some(resign) = self.resign_for(fuzzer, &ctx.token).await else {
            return Ok(false);
        };
        let location = if fuzzer.header_field { "header" } else { "payload" };
        info!(
            "[JWT] fuzzing {} field {} from {}",
            location,
            fuzzer.field_name,
            fuzzer.wordlist.path.display()
        );

        // wordlist reads block, keep them off the async workers
        let (tx, mut rx) = mpsc::channel::<String>(WORDLIST_CHANNEL_CAPACITY);
        let wordlist = fuzzer.wordlist.clone();
        let reader = tokio::task::spawn_blocking(move || {
            for value in wordlist.candidates() {
                if tx.blocking_send(value).is_err() {
                    return;
                }
            }
        });

        let mut found = false;
        while let Some(value) = rx.recv().await {
            if ctx.is_stopped() {
                break;
            }
            let forged = match with_field(&ctx.token, fuzzer, &value) {
                Ok(forged) => forged,
                Err(e) => {
                    debug!("[JWT] cannot rewrite {} field: {}", location, e);
                    break;
                }
            };
            let forged = match resign.apply(forged) {
                Ok(signed) => signed,
                Err(e) => {
                    warn!("[JWT] re-signing fuzzed token failed: {}", e);
                    break;
                }
            };
            let candidate = forged.encode();
            if self.helper.verify_token(&candidate, ctx).await? {
                self.helper.raise_alert(
                    FUZZER_PREFIX,
                    VulnerabilityType::CustomFieldFuzz,
                    Risk::Medium,
                    Confidence::Medium,
                    &candidate,
                    ctx,
                    Some(format!("{} field \"{}\" set to \"{}\"", location, fuzzer.field_name, value)),
                );
                found = true;
                break;
            }
        }

        drop(rx);
        if let Err(e) = reader.await {
            warn!("[JWT] wordlist reader failed: {}", e);
        }
        Ok(found)
    }
}

#[async_trait]
impl JwtAttack for CustomFieldAttack {
    fn name(&self) -> &'static str {
        "fuzzer"
    }

    async fn execute_attack(&self, ctx: &AttackContext) -> bool {
        for fuzzer in &self.fuzzers {
            if ctx.is_stopped() {
                return false;
            }
            match self.fuzz(fuzzer, ctx).await {
                Ok(true) => return true,
                Ok(false) => {}
                Err(e) => {
                    warn!("[JWT] fuzzer for {} aborted: {}", fuzzer.field_name, e);
                    return false;
                }
            }
        }
        false
    }
}
