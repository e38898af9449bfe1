// Key generation and signing
//
// HMAC goes through the hmac/sha2 crates; everything asymmetric (fresh key
// pairs, public JWK rendering, RSA/PSS/ECDSA/EdDSA signatures) goes through
// openssl.

use hmac::{Hmac, Mac};
use openssl::bn::{BigNum, BigNumContext};
use openssl::ec::{EcGroup, EcKey, EcKeyRef};
use openssl::ecdsa::EcdsaSig;
use openssl::hash::{Hasher, MessageDigest};
use openssl::nid::Nid;
use openssl::pkey::{PKey, Private};
use openssl::rsa::{Padding, Rsa};
use openssl::sign::{RsaPssSaltlen, Signer};
use serde_json::{json, Value};
use sha2::{Sha256, Sha384, Sha512};

use crate::error::CryptoError;
use crate::token::encode_part;

const RSA_BITS: u32 = 2048;

/// JWS HMAC algorithms
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HmacAlgorithm {
    HS256,
    HS384,
    HS512,
}

impl HmacAlgorithm {
    pub fn from_alg(alg: &str) -> Option<Self> {
        match alg {
            "HS256" => Some(HmacAlgorithm::HS256),
            "HS384" => Some(HmacAlgorithm::HS384),
            "HS512" => Some(HmacAlgorithm::HS512),
            _ => None,
        }
    }

    /// HMAC counterpart of an RSA algorithm, for algorithm confusion
    pub fn confused_with(rsa_alg: &str) -> Option<Self> {
        match rsa_alg {
            "RS256" => Some(HmacAlgorithm::HS256),
            "RS384" => Some(HmacAlgorithm::HS384),
            "RS512" => Some(HmacAlgorithm::HS512),
            _ => None,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            HmacAlgorithm::HS256 => "HS256",
            HmacAlgorithm::HS384 => "HS384",
            HmacAlgorithm::HS512 => "HS512",
        }
    }
}

pub fn hmac_sign(alg: HmacAlgorithm, key: &[u8], input: &[u8]) -> Result<Vec<u8>, CryptoError> {
    let sig = match alg {
        HmacAlgorithm::HS256 => {
            let mut mac = Hmac::<Sha256>::new_from_slice(key).map_err(|_| CryptoError::InvalidKeyLength)?;
            mac.update(input);
            mac.finalize().into_bytes().to_vec()
        }
        HmacAlgorithm::HS384 => {
            let mut mac = Hmac::<Sha384>::new_from_slice(key).map_err(|_| CryptoError::InvalidKeyLength)?;
            mac.update(input);
            mac.finalize().into_bytes().to_vec()
        }
        HmacAlgorithm::HS512 => {
            let mut mac = Hmac::<Sha512>::new_from_slice(key).map_err(|_| CryptoError::InvalidKeyLength)?;
            mac.update(input);
            mac.finalize().into_bytes().to_vec()
        }
    };
    Ok(sig)
}

/// Constant-time check of `signature` against HMAC(key, input)
pub fn hmac_matches(alg: HmacAlgorithm, key: &[u8], input: &[u8], signature: &[u8]) -> bool {
    match alg {
        HmacAlgorithm::HS256 => Hmac::<Sha256>::new_from_slice(key)
            .map(|mut mac| {
                mac.update(input);
                mac.verify_slice(signature).is_ok()
            })
            .unwrap_or(false),
        HmacAlgorithm::HS384 => Hmac::<Sha384>::new_from_slice(key)
            .map(|mut mac| {
                mac.update(input);
                mac.verify_slice(signature).is_ok()
            })
            .unwrap_or(false),
        HmacAlgorithm::HS512 => Hmac::<Sha512>::new_from_slice(key)
            .map(|mut mac| {
                mac.update(input);
                mac.verify_slice(signature).is_ok()
            })
            .unwrap_or(false),
    }
}

/// Shape of a key pair to generate
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyKind {
    Rsa,
    RsaPss,
    Ec(Nid),
    Ed25519,
    Ed448,
}

/// One key pair the custom-key forgery can try for a given `alg`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeySpec {
    pub alg: String,
    pub kind: KeyKind,
}

impl KeySpec {
    /// Every key shape compatible with `alg`; one entry per curve for EC/OKP
    pub fn for_algorithm(alg: &str) -> Vec<KeySpec> {
        let kinds: Vec<KeyKind> = match alg {
            "RS256" | "RS384" | "RS512" => vec![KeyKind::Rsa],
            "PS256" | "PS384" | "PS512" => vec![KeyKind::RsaPss],
            "ES256" => vec![KeyKind::Ec(Nid::X9_62_PRIME256V1)],
            "ES256K" => vec![KeyKind::Ec(Nid::SECP256K1)],
            "ES384" => vec![KeyKind::Ec(Nid::SECP384R1)],
            "ES512" => vec![KeyKind::Ec(Nid::SECP521R1)],
            "EdDSA" => vec![KeyKind::Ed25519, KeyKind::Ed448],
            "Ed25519" => vec![KeyKind::Ed25519],
            "Ed448" => vec![KeyKind::Ed448],
            _ => Vec::new(),
        };
        kinds
            .into_iter()
            .map(|kind| KeySpec { alg: alg.to_string(), kind })
            .collect()
    }

    pub fn curve_name(&self) -> Option<&'static str> {
        match self.kind {
            KeyKind::Ec(Nid::X9_62_PRIME256V1) => Some("P-256"),
            KeyKind::Ec(Nid::SECP256K1) => Some("secp256k1"),
            KeyKind::Ec(Nid::SECP384R1) => Some("P-384"),
            KeyKind::Ec(Nid::SECP521R1) => Some("P-521"),
            KeyKind::Ed25519 => Some("Ed25519"),
            KeyKind::Ed448 => Some("Ed448"),
            _ => None,
        }
    }

    pub fn generate(&self) -> Result<ForgeryKey, CryptoError> {
        let pkey = match self.kind {
            KeyKind::Rsa | KeyKind::RsaPss => PKey::from_rsa(Rsa::generate(RSA_BITS)?)?,
            KeyKind::Ec(nid) => {
                let group = EcGroup::from_curve_name(nid)?;
                PKey::from_ec_key(EcKey::generate(&group)?)?
            }
            KeyKind::Ed25519 => PKey::generate_ed25519()?,
            KeyKind::Ed448 => PKey::generate_ed448()?,
        };
        Ok(ForgeryKey { spec: self.clone(), pkey })
    }
}

/// A freshly generated private key whose public half gets embedded in a token
pub struct ForgeryKey {
    spec: KeySpec,
    pkey: PKey<Private>,
}

impl ForgeryKey {
    /// RFC 7517 public JWK
    pub fn public_jwk(&self) -> Result<Value, CryptoError> {
        let jwk = match self.spec.kind {
            KeyKind::Rsa | KeyKind::RsaPss => {
                let rsa = self.pkey.rsa()?;
                json!({
                    "kty": "RSA",
                    "e": encode_part(&rsa.e().to_vec()),
                    "n": encode_part(&rsa.n().to_vec()),
                })
            }
            KeyKind::Ec(_) => {
                let ec = self.pkey.ec_key()?;
                let group = ec.group();
                let mut ctx = BigNumContext::new()?;
                let mut x = BigNum::new()?;
                let mut y = BigNum::new()?;
                ec.public_key().affine_coordinates(group, &mut x, &mut y, &mut ctx)?;
                let len = ((group.degree() + 7) / 8) as i32;
                json!({
                    "kty": "EC",
                    "crv": self.spec.curve_name().unwrap_or_default(),
                    "x": encode_part(&x.to_vec_padded(len)?),
                    "y": encode_part(&y.to_vec_padded(len)?),
                })
            }
            KeyKind::Ed25519 | KeyKind::Ed448 => json!({
                "kty": "OKP",
                "crv": self.spec.curve_name().unwrap_or_default(),
                "x": encode_part(&self.pkey.raw_public_key()?),
            }),
        };
        Ok(jwk)
    }

    /// JWS signature over `input` in the algorithm's wire format
    pub fn sign(&self, input: &[u8]) -> Result<Vec<u8>, CryptoError> {
        match self.spec.kind {
            KeyKind::Rsa => rsa_sign(digest_for(&self.spec.alg)?, &self.pkey, input, false),
            KeyKind::RsaPss => rsa_sign(digest_for(&self.spec.alg)?, &self.pkey, input, true),
            KeyKind::Ec(_) => ec_sign(digest_for(&self.spec.alg)?, self.pkey.ec_key()?.as_ref(), input),
            KeyKind::Ed25519 | KeyKind::Ed448 => {
                let mut signer = Signer::new_without_digest(&self.pkey)?;
                Ok(signer.sign_oneshot_to_vec(input)?)
            }
        }
    }
}

fn digest_for(alg: &str) -> Result<MessageDigest, CryptoError> {
    if alg.ends_with("256") || alg == "ES256K" {
        Ok(MessageDigest::sha256())
    } else if alg.ends_with("384") {
        Ok(MessageDigest::sha384())
    } else if alg.ends_with("512") {
        Ok(MessageDigest::sha512())
    } else {
        Err(CryptoError::UnsupportedAlgorithm(alg.to_string()))
    }
}

fn rsa_sign(digest: MessageDigest, key: &PKey<Private>, message: &[u8], pss: bool) -> Result<Vec<u8>, CryptoError> {
    let mut signer = Signer::new(digest, key)?;
    if pss {
        signer.set_rsa_padding(Padding::PKCS1_PSS)?;
        signer.set_rsa_pss_saltlen(RsaPssSaltlen::DIGEST_LENGTH)?;
    }
    signer.update(message)?;
    Ok(signer.sign_to_vec()?)
}

// JOSE wants r || s, each left-padded to the group order size
fn ec_sign(digest: MessageDigest, key: &EcKeyRef<Private>, message: &[u8]) -> Result<Vec<u8>, CryptoError> {
    let mut hasher = Hasher::new(digest)?;
    hasher.update(message)?;
    let hash = hasher.finish()?;

    let sig = EcdsaSig::sign(&hash, key)?;
    let len = ((key.group().order_bits() + 7) / 8) as i32;
    let mut out = sig.r().to_vec_padded(len)?;
    out.extend(sig.s().to_vec_padded(len)?);
    Ok(out)
}
