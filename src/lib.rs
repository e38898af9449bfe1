pub mod attacks;
pub mod config;
pub mod context;
pub mod dictionary;
pub mod error;
pub mod keys;
pub mod keystore;
pub mod messages;
pub mod models;
pub mod orchestrator;
pub mod permutation;
pub mod probe;
pub mod reporting;
pub mod runner;
pub mod token;
pub mod verdict;

// Re-export commonly used items
pub use attacks::{AttackHelper, JwtAttack};
pub use config::{AttackConfig, CustomFieldFuzzer};
pub use context::{AttackContext, StopSignal};
pub use dictionary::{Charset, SecretSource, Wordlist, WordlistFile};
pub use error::*;
pub use keystore::{open_keystore, KeyStore, MemoryKeyStore};
pub use models::*;
pub use orchestrator::{AttackOrchestrator, AttackState, JwtScanner};
pub use probe::{HttpProbe, Probe};
pub use reporting::{export_csv, export_json, export_markdown, CollectingSink, FindingSink, LogSink, TeeSink};
pub use runner::TaskRunner;
pub use token::TokenModel;
pub use verdict::{decide_verdict, Verdict};
