// Attack configuration
// Loaded from an optional JSON file; CLI flags override individual fields

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::dictionary::WordlistFile;
use crate::error::ConfigError;

pub const DEFAULT_THREAD_COUNT: usize = 2;
pub const DEFAULT_HMAC_MAX_KEY_LENGTH: usize = 26;
pub const DEFAULT_BATCH_TIMEOUT_SECS: u64 = 600;
pub const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 30;

/// Replays the token with one header or payload field set to each entry of
/// a wordlist
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct CustomFieldFuzzer {
    pub field_name: String,
    /// Field lives in the JOSE header rather than the claims
    pub header_field: bool,
    /// Re-sign every candidate. HMAC tokens use `signing_secret`, other
    /// algorithms a fresh key embedded as `jwk`.
    pub signature_required: bool,
    pub signing_secret: Option<String>,
    pub wordlist: WordlistFile,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AttackConfig {
    /// Size of the verification worker pool
    pub thread_count: usize,
    /// Exclusive upper bound on brute-forced secret length
    pub hmac_max_key_length: usize,
    /// Certificate store for the algorithm confusion attack
    pub trust_store_path: Option<PathBuf>,
    pub trust_store_password: Option<String>,
    /// Wordlist for the dictionary stage of secret recovery
    pub dictionary: Option<WordlistFile>,
    pub ignore_client_configuration_scan: bool,
    pub custom_field_fuzzers: Vec<CustomFieldFuzzer>,
    /// How long to wait for one round of verification tasks
    pub batch_timeout_secs: u64,
    pub request_timeout_secs: u64,
}

impl Default for AttackConfig {
    fn default() -> Self {
        Self {
            thread_count: DEFAULT_THREAD_COUNT,
            hmac_max_key_length: DEFAULT_HMAC_MAX_KEY_LENGTH,
            trust_store_path: None,
            trust_store_password: None,
            dictionary: None,
            ignore_client_configuration_scan: false,
            custom_field_fuzzers: Vec::new(),
            batch_timeout_secs: DEFAULT_BATCH_TIMEOUT_SECS,
            request_timeout_secs: DEFAULT_REQUEST_TIMEOUT_SECS,
        }
    }
}

impl AttackConfig {
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.display().to_string(),
            source,
        })?;
        let config: AttackConfig = serde_json::from_str(&text)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.thread_count == 0 {
            return Err(ConfigError::Invalid {
                field: "thread_count",
                reason: "must be at least 1".to_string(),
            });
        }
        if self.custom_field_fuzzers.iter().any(|f| f.field_name.trim().is_empty()) {
            return Err(ConfigError::Invalid {
                field: "custom_field_fuzzers",
                reason: "every fuzzer needs a field_name".to_string(),
            });
        }
        if self.batch_timeout_secs == 0 {
            return Err(ConfigError::Invalid {
                field: "batch_timeout_secs",
                reason: "must be at least 1".to_string(),
            });
        }
        Ok(())
    }

    pub fn batch_timeout(&self) -> Duration {
        Duration::from_secs(self.batch_timeout_secs)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}
