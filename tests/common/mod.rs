#![allow(dead_code)]

use async_trait::async_trait;
use counterfeit::error::ProbeError;
use counterfeit::keys::{hmac_sign, HmacAlgorithm};
use counterfeit::models::HttpMessage;
use counterfeit::probe::Probe;
use counterfeit::token::TokenModel;
use openssl::bn::BigNum;
use openssl::ec::{EcGroup, EcKey};
use openssl::ecdsa::EcdsaSig;
use openssl::hash::{hash, MessageDigest};
use openssl::nid::Nid;
use openssl::pkey::{Id, PKey};
use openssl::rsa::Rsa;
use openssl::sign::Verifier;
use serde_json::Value;
use std::sync::{Arc, Mutex};

type Oracle = Box<dyn Fn(&str) -> bool + Send + Sync>;

/// Stands in for the target: records candidates, accepts by rule
pub struct ScriptedProbe {
    oracle: Oracle,
    seen: Mutex<Vec<String>>,
}

impl ScriptedProbe {
    pub fn new(oracle: impl Fn(&str) -> bool + Send + Sync + 'static) -> Arc<Self> {
        Arc::new(Self {
            oracle: Box::new(oracle),
            seen: Mutex::new(Vec::new()),
        })
    }

    pub fn rejecting() -> Arc<Self> {
        Self::new(|_| false)
    }

    pub fn seen(&self) -> Vec<String> {
        self.seen.lock().unwrap().clone()
    }
}

#[async_trait]
impl Probe for ScriptedProbe {
    async fn probe(&self, _: &HttpMessage, _: &str, candidate: &str, _: &str) -> Result<bool, ProbeError> {
        self.seen.lock().unwrap().push(candidate.to_string());
        Ok((self.oracle)(candidate))
    }
}

pub fn hs256_token(secret: &str) -> String {
    let mut token = TokenModel::new(
        r#"{"alg":"HS256","typ":"JWT"}"#.to_string(),
        r#"{"sub":"alice","role":"user"}"#.to_string(),
        Vec::new(),
    );
    let sig = hmac_sign(HmacAlgorithm::HS256, secret.as_bytes(), token.signing_input().as_bytes()).unwrap();
    token.with_signature(sig);
    token.encode()
}

/// Header/payload only; the signature is never checked by these tests
pub fn unsigned_token(alg: &str) -> String {
    let token = TokenModel::new(
        format!(r#"{{"alg":"{}","typ":"JWT"}}"#, alg),
        r#"{"sub":"alice","role":"user"}"#.to_string(),
        b"not-a-real-signature".to_vec(),
    );
    token.encode()
}

fn b64(value: &Value) -> Vec<u8> {
    use base64::{engine::general_purpose, Engine as _};
    general_purpose::URL_SAFE_NO_PAD
        .decode(value.as_str().unwrap_or_default())
        .unwrap_or_default()
}

/// True if the token's signature verifies under the public key in its own `jwk` header
pub fn verifies_with_embedded_jwk(candidate: &str) -> bool {
    let Ok(token) = TokenModel::parse(candidate) else {
        return false;
    };
    let Ok(header) = token.header_json() else {
        return false;
    };
    let Some(jwk) = header.get("jwk") else {
        return false;
    };
    let alg = header.get("alg").and_then(Value::as_str).unwrap_or_default();
    let input = token.signing_input();

    match jwk["kty"].as_str() {
        Some("RSA") => {
            let n = BigNum::from_slice(&b64(&jwk["n"])).unwrap();
            let e = BigNum::from_slice(&b64(&jwk["e"])).unwrap();
            let key = PKey::from_rsa(Rsa::from_public_components(n, e).unwrap()).unwrap();
            let mut verifier = Verifier::new(MessageDigest::sha256(), &key).unwrap();
            verifier.update(input.as_bytes()).unwrap();
            verifier.verify(token.signature()).unwrap_or(false)
        }
        Some("EC") => {
            let nid = match jwk["crv"].as_str() {
                Some("P-256") => Nid::X9_62_PRIME256V1,
                Some("P-384") => Nid::SECP384R1,
                Some("P-521") => Nid::SECP521R1,
                Some("secp256k1") => Nid::SECP256K1,
                _ => return false,
            };
            let digest = match alg {
                "ES384" => MessageDigest::sha384(),
                "ES512" => MessageDigest::sha512(),
                _ => MessageDigest::sha256(),
            };
            let group = EcGroup::from_curve_name(nid).unwrap();
            let x = BigNum::from_slice(&b64(&jwk["x"])).unwrap();
            let y = BigNum::from_slice(&b64(&jwk["y"])).unwrap();
            let key = EcKey::from_public_key_affine_coordinates(&group, &x, &y).unwrap();
            let sig = token.signature();
            let half = sig.len() / 2;
            let r = BigNum::from_slice(&sig[..half]).unwrap();
            let s = BigNum::from_slice(&sig[half..]).unwrap();
            let sig = EcdsaSig::from_private_components(r, s).unwrap();
            let digest = hash(digest, input.as_bytes()).unwrap();
            sig.verify(&digest, &key).unwrap_or(false)
        }
        Some("OKP") => {
            let id = match jwk["crv"].as_str() {
                Some("Ed25519") => Id::ED25519,
                Some("Ed448") => Id::ED448,
                _ => return false,
            };
            let key = PKey::public_key_from_raw_bytes(&b64(&jwk["x"]), id).unwrap();
            let mut verifier = Verifier::new_without_digest(&key).unwrap();
            verifier.verify_oneshot(token.signature(), input.as_bytes()).unwrap_or(false)
        }
        _ => false,
    }
}
