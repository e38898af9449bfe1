// Certificate store access for the algorithm confusion attack
//
// Each alias resolves to the DER-encoded SubjectPublicKeyInfo of a trusted
// RSA key: exactly the bytes a confused validator would feed to HMAC.
//
// Implementations:
//   PemDirectoryKeyStore  - directory of .pem/.crt/.cer files, alias = file stem
//   Pkcs12KeyStore        - password protected .p12/.pfx bundle
//   MemoryKeyStore        - alias -> DER map

use openssl::pkcs12::Pkcs12;
use openssl::pkey::{PKey, Public};
use openssl::x509::X509;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};
use walkdir::WalkDir;

use crate::error::KeyStoreError;

pub trait KeyStore: Send + Sync {
    fn aliases(&self) -> Vec<String>;
    fn public_key_der(&self, alias: &str) -> Result<Vec<u8>, KeyStoreError>;
}

#[derive(Debug, Clone, Default)]
pub struct MemoryKeyStore {
    keys: BTreeMap<String, Vec<u8>>,
}

impl MemoryKeyStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, alias: impl Into<String>, public_key_der: Vec<u8>) {
        self.keys.insert(alias.into(), public_key_der);
    }
}

impl KeyStore for MemoryKeyStore {
    fn aliases(&self) -> Vec<String> {
        self.keys.keys().cloned().collect()
    }

    fn public_key_der(&self, alias: &str) -> Result<Vec<u8>, KeyStoreError> {
        self.keys
            .get(alias)
            .cloned()
            .ok_or_else(|| KeyStoreError::UnknownAlias(alias.to_string()))
    }
}

/// Directory of PEM certificates or PEM public keys
#[derive(Debug, Clone)]
pub struct PemDirectoryKeyStore {
    files: BTreeMap<String, PathBuf>,
}

const PEM_EXTENSIONS: &[&str] = &["pem", "crt", "cer"];

impl PemDirectoryKeyStore {
    pub fn open(dir: impl AsRef<Path>) -> Result<Self, KeyStoreError> {
        let dir = dir.as_ref();
        if !dir.is_dir() {
            return Err(KeyStoreError::Io {
                path: dir.display().to_string(),
                source: std::io::Error::new(std::io::ErrorKind::NotFound, "not a directory"),
            });
        }

        let mut files = BTreeMap::new();
        for entry in WalkDir::new(dir).into_iter().filter_map(|e| e.ok()) {
            let path = entry.path();
            let is_pem = path
                .extension()
                .and_then(|e| e.to_str())
                .map(|e| PEM_EXTENSIONS.contains(&e.to_ascii_lowercase().as_str()))
                .unwrap_or(false);
            if !is_pem {
                continue;
            }
            if let Some(stem) = path.file_stem().and_then(|s| s.to_str()) {
                files.insert(stem.to_string(), path.to_path_buf());
            }
        }
        debug!("[JWT] key store {} has {} entries", dir.display(), files.len());
        Ok(Self { files })
    }
}

impl KeyStore for PemDirectoryKeyStore {
    fn aliases(&self) -> Vec<String> {
        self.files.keys().cloned().collect()
    }

    fn public_key_der(&self, alias: &str) -> Result<Vec<u8>, KeyStoreError> {
        let path = self
            .files
            .get(alias)
            .ok_or_else(|| KeyStoreError::UnknownAlias(alias.to_string()))?;
        let pem = std::fs::read(path).map_err(|source| KeyStoreError::Io {
            path: path.display().to_string(),
            source,
        })?;
        let key = match X509::from_pem(&pem) {
            Ok(cert) => cert.public_key(),
            Err(_) => PKey::<Public>::public_key_from_pem(&pem),
        }
        .map_err(|source| KeyStoreError::Parse { alias: alias.to_string(), source })?;
        key.public_key_to_der()
            .map_err(|source| KeyStoreError::Parse { alias: alias.to_string(), source })
    }
}

/// PKCS#12 bundle; aliases are `cert` plus `ca-<n>` for the chain
pub struct Pkcs12KeyStore {
    keys: MemoryKeyStore,
}

impl Pkcs12KeyStore {
    pub fn open(path: impl AsRef<Path>, password: &str) -> Result<Self, KeyStoreError> {
        let path = path.as_ref();
        let der = std::fs::read(path).map_err(|source| KeyStoreError::Io {
            path: path.display().to_string(),
            source,
        })?;
        let alias = path.display().to_string();
        let parse_err = |source| KeyStoreError::Parse { alias: alias.clone(), source };
        let parsed = Pkcs12::from_der(&der).and_then(|p| p.parse2(password)).map_err(parse_err)?;

        let mut keys = MemoryKeyStore::new();
        if let Some(cert) = parsed.cert {
            let der = cert.public_key().and_then(|k| k.public_key_to_der()).map_err(parse_err)?;
            keys.insert("cert", der);
        }
        for (i, ca) in parsed.ca.into_iter().flatten().enumerate() {
            match ca.public_key().and_then(|k| k.public_key_to_der()) {
                Ok(der) => keys.insert(format!("ca-{}", i), der),
                Err(e) => warn!("[JWT] skipping unreadable chain certificate {}: {}", i, e),
            }
        }
        Ok(Self { keys })
    }
}

impl KeyStore for Pkcs12KeyStore {
    fn aliases(&self) -> Vec<String> {
        self.keys.aliases()
    }

    fn public_key_der(&self, alias: &str) -> Result<Vec<u8>, KeyStoreError> {
        self.keys.public_key_der(alias)
    }
}

/// Pick a store implementation from the configured path
pub fn open_keystore(path: impl AsRef<Path>, password: Option<&str>) -> Result<Box<dyn KeyStore>, KeyStoreError> {
    let path = path.as_ref();
    if path.is_dir() {
        return Ok(Box::new(PemDirectoryKeyStore::open(path)?));
    }
    let is_pkcs12 = path
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| matches!(e.to_ascii_lowercase().as_str(), "p12" | "pfx"))
        .unwrap_or(false);
    if is_pkcs12 {
        Ok(Box::new(Pkcs12KeyStore::open(path, password.unwrap_or_default())?))
    } else {
        // single PEM file
        let alias = path
            .file_stem()
            .and_then(|s| s.to_str())
            .unwrap_or("key")
            .to_string();
        let mut files = BTreeMap::new();
        files.insert(alias, path.to_path_buf());
        Ok(Box::new(PemDirectoryKeyStore { files }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use openssl::asn1::Asn1Time;
    use openssl::hash::MessageDigest;
    use openssl::pkey::Private;
    use openssl::rsa::Rsa;
    use openssl::stack::Stack;
    use openssl::x509::X509NameBuilder;

    fn rsa_key() -> PKey<Private> {
        PKey::from_rsa(Rsa::generate(2048).unwrap()).unwrap()
    }

    fn self_signed(pkey: &PKey<Private>, cn: &str) -> X509 {
        let mut name = X509NameBuilder::new().unwrap();
        name.append_entry_by_text("CN", cn).unwrap();
        let name = name.build();
        let mut builder = X509::builder().unwrap();
        builder.set_version(2).unwrap();
        builder.set_subject_name(&name).unwrap();
        builder.set_issuer_name(&name).unwrap();
        builder.set_pubkey(pkey).unwrap();
        builder.set_not_before(&Asn1Time::days_from_now(0).unwrap()).unwrap();
        builder.set_not_after(&Asn1Time::days_from_now(1).unwrap()).unwrap();
        builder.sign(pkey, MessageDigest::sha256()).unwrap();
        builder.build()
    }

    fn temp_dir(name: &str) -> PathBuf {
        let dir = std::env::temp_dir().join(format!("counterfeit_ks_{}_{}", name, std::process::id()));
        let _ = std::fs::remove_dir_all(&dir);
        std::fs::create_dir_all(&dir).unwrap();
        dir
    }

    #[test]
    fn memory_store_lists_and_resolves() {
        let mut store = MemoryKeyStore::new();
        store.insert("b", vec![2]);
        store.insert("a", vec![1]);
        assert_eq!(store.aliases(), vec!["a", "b"]);
        assert_eq!(store.public_key_der("a").unwrap(), vec![1]);
        assert!(matches!(store.public_key_der("c"), Err(KeyStoreError::UnknownAlias(_))));
    }

    #[test]
    fn pem_directory_reads_public_keys() {
        let dir = temp_dir("pem");
        let rsa = Rsa::generate(2048).unwrap();
        let pkey = PKey::from_rsa(rsa).unwrap();
        std::fs::write(dir.join("api.pem"), pkey.public_key_to_pem().unwrap()).unwrap();
        std::fs::write(dir.join("notes.txt"), b"ignored").unwrap();

        let store = PemDirectoryKeyStore::open(&dir).unwrap();
        assert_eq!(store.aliases(), vec!["api"]);
        assert_eq!(store.public_key_der("api").unwrap(), pkey.public_key_to_der().unwrap());
        let _ = std::fs::remove_dir_all(dir);
    }

    #[test]
    fn pkcs12_bundle_exposes_cert_and_chain() {
        let dir = temp_dir("p12");
        let leaf_key = rsa_key();
        let ca_key = rsa_key();
        let mut chain = Stack::new().unwrap();
        chain.push(self_signed(&ca_key, "ca.test")).unwrap();
        let bundle = Pkcs12::builder()
            .name("api")
            .pkey(&leaf_key)
            .cert(&self_signed(&leaf_key, "api.test"))
            .ca(chain)
            .build2("changeit")
            .unwrap();
        let path = dir.join("trust.p12");
        std::fs::write(&path, bundle.to_der().unwrap()).unwrap();

        let store = open_keystore(&path, Some("changeit")).unwrap();
        assert_eq!(store.aliases(), vec!["ca-0", "cert"]);
        assert_eq!(store.public_key_der("cert").unwrap(), leaf_key.public_key_to_der().unwrap());
        assert_eq!(store.public_key_der("ca-0").unwrap(), ca_key.public_key_to_der().unwrap());

        assert!(matches!(
            Pkcs12KeyStore::open(&path, "wrong"),
            Err(KeyStoreError::Parse { .. })
        ));
        let _ = std::fs::remove_dir_all(dir);
    }

    #[test]
    fn single_pem_file_uses_file_stem_alias() {
        let dir = temp_dir("single");
        let key = rsa_key();
        let path = dir.join("signing.crt");
        std::fs::write(&path, self_signed(&key, "api.test").to_pem().unwrap()).unwrap();

        let store = open_keystore(&path, None).unwrap();
        assert_eq!(store.aliases(), vec!["signing"]);
        assert_eq!(store.public_key_der("signing").unwrap(), key.public_key_to_der().unwrap());
        let _ = std::fs::remove_dir_all(dir);
    }

    #[test]
    fn missing_directory_is_an_error() {
        assert!(PemDirectoryKeyStore::open("/nonexistent/counterfeit").is_err());
    }
}
