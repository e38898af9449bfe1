// Attack orchestration
//
// Runs the techniques in a fixed order against one token-carrying parameter
// and stops at the first verified forgery.

use std::fmt;
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::attacks::{
    AttackHelper, ClientConfigurationCheck, CustomFieldAttack, HeaderAttack, JwtAttack, MiscAttack, PayloadAttack,
    SecretKeySearch, SignatureAttack,
};
use crate::config::AttackConfig;
use crate::context::{AttackContext, StopSignal};
use crate::dictionary::SecretSource;
use crate::keystore::{open_keystore, KeyStore};
use crate::models::HttpMessage;
use crate::probe::Probe;
use crate::reporting::FindingSink;
use crate::runner::TaskRunner;
use crate::token::{looks_like_jwt, strip_bearer, AlgorithmFamily, TokenModel};

/// Lifecycle of one technique inside a run
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AttackState {
    Idle,
    Running,
    Succeeded,
    Exhausted,
    Cancelled,
}

impl fmt::Display for AttackState {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let s = match self {
            AttackState::Idle => "idle",
            AttackState::Running => "running",
            AttackState::Succeeded => "succeeded",
            AttackState::Exhausted => "exhausted",
            AttackState::Cancelled => "cancelled",
        };
        write!(f, "{}", s)
    }
}

pub struct AttackOrchestrator {
    modules: Vec<Box<dyn JwtAttack>>,
}

impl AttackOrchestrator {
    pub fn new(modules: Vec<Box<dyn JwtAttack>>) -> Self {
        Self { modules }
    }

    /// Header, payload, signature, misc, then the configured field fuzzers
    /// and (optionally) secret search
    pub fn standard(
        helper: Arc<AttackHelper>,
        config: &AttackConfig,
        keystore: Option<Arc<dyn KeyStore>>,
        dictionary: Option<Arc<dyn SecretSource>>,
        include_secret_search: bool,
    ) -> Self {
        let mut modules: Vec<Box<dyn JwtAttack>> = vec![
            Box::new(HeaderAttack::new(helper.clone())),
            Box::new(PayloadAttack::new(helper.clone())),
            Box::new(SignatureAttack::new(helper.clone(), keystore)),
            Box::new(MiscAttack::new(helper.clone())),
        ];
        if !config.custom_field_fuzzers.is_empty() {
            modules.push(Box::new(CustomFieldAttack::new(
                helper.clone(),
                config.custom_field_fuzzers.clone(),
            )));
        }
        if include_secret_search {
            let runner = TaskRunner::new(config.thread_count, config.batch_timeout());
            modules.push(Box::new(SecretKeySearch::new(
                helper,
                runner,
                dictionary,
                config.hmac_max_key_length,
            )));
        }
        Self::new(modules)
    }

    pub fn module_names(&self) -> Vec<&'static str> {
        self.modules.iter().map(|m| m.name()).collect()
    }

    /// True as soon as one module verifies a forgery; later modules never start
    pub async fn run(&self, ctx: &AttackContext) -> bool {
        let mut states = vec![AttackState::Idle; self.modules.len()];

        for (i, module) in self.modules.iter().enumerate() {
            if ctx.is_stopped() {
                info!("[JWT] attack on {} stopped before {}", ctx.param_name, module.name());
                return false;
            }
            states[i] = AttackState::Running;
            debug!("[JWT] {} -> {}", module.name(), states[i]);

            let found = module.execute_attack(ctx).await;
            states[i] = if found {
                AttackState::Succeeded
            } else if ctx.is_stopped() {
                AttackState::Cancelled
            } else {
                AttackState::Exhausted
            };
            debug!("[JWT] {} -> {}", module.name(), states[i]);

            if found {
                return true;
            }
        }
        false
    }
}

/// Everything needed to attack parameters: the shared helper plus the
/// optional trust store and dictionary, loaded once.
pub struct JwtScanner {
    helper: Arc<AttackHelper>,
    config: AttackConfig,
    keystore: Option<Arc<dyn KeyStore>>,
    dictionary: Option<Arc<dyn SecretSource>>,
}

impl JwtScanner {
    /// Opens the trust store and dictionary named in `config`. A trust store
    /// that cannot be opened only disables algorithm confusion.
    pub fn new(probe: Arc<dyn Probe>, sink: Arc<dyn FindingSink>, config: AttackConfig) -> Self {
        let keystore: Option<Arc<dyn KeyStore>> = config.trust_store_path.as_ref().and_then(|path| {
            match open_keystore(path, config.trust_store_password.as_deref()) {
                Ok(store) => Some(Arc::from(store)),
                Err(e) => {
                    warn!("[JWT] trust store unavailable: {}", e);
                    None
                }
            }
        });
        let dictionary = config
            .dictionary
            .clone()
            .map(|wordlist| Arc::new(wordlist) as Arc<dyn SecretSource>);

        Self {
            helper: Arc::new(AttackHelper::new(probe, sink)),
            config,
            keystore,
            dictionary,
        }
    }

    pub fn with_keystore(mut self, keystore: Arc<dyn KeyStore>) -> Self {
        self.keystore = Some(keystore);
        self
    }

    pub fn with_dictionary(mut self, dictionary: Arc<dyn SecretSource>) -> Self {
        self.dictionary = Some(dictionary);
        self
    }

    /// Attack one parameter value. Non-JWT values are ignored; true if any
    /// forgery was verified.
    pub async fn scan_parameter(
        &self,
        message: Arc<HttpMessage>,
        param_name: &str,
        param_value: &str,
        stop: StopSignal,
    ) -> bool {
        if !looks_like_jwt(param_value) {
            debug!("[JWT] {} does not carry a JWT", param_name);
            return false;
        }
        let (raw, _) = strip_bearer(param_value);
        let token = match TokenModel::parse(raw) {
            Ok(token) => token,
            Err(e) => {
                info!("[JWT] cannot attack {}: {}", param_name, e);
                return false;
            }
        };

        let family = token.family();
        let ctx = AttackContext::new(message, param_name, param_value, token, stop);
        if ctx.is_stopped() {
            info!("[JWT] scan of {} stopped before it started", param_name);
            return false;
        }
        if !self.config.ignore_client_configuration_scan {
            ClientConfigurationCheck::new(self.helper.clone()).run(&ctx);
        }

        let orchestrator = AttackOrchestrator::standard(
            self.helper.clone(),
            &self.config,
            self.keystore.clone(),
            self.dictionary.clone(),
            family == AlgorithmFamily::Hmac,
        );
        info!(
            "[JWT] attacking {} on {} with {:?}",
            param_name,
            ctx.message.url,
            orchestrator.module_names()
        );
        orchestrator.run(&ctx).await
    }
}
