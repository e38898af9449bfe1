// Attack context and cooperative cancellation

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use crate::models::HttpMessage;
use crate::token::TokenModel;

/// Shared "stop" flag.
///
/// Set permanently once any technique succeeds or the operator stops the
/// scan. Every component checks it cooperatively; nothing is force-killed.
#[derive(Debug, Clone, Default)]
pub struct StopSignal(Arc<AtomicBool>);

impl StopSignal {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns true if this call flipped the flag
    pub fn stop(&self) -> bool {
        !self.0.swap(true, Ordering::SeqCst)
    }

    pub fn is_stopped(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Everything a technique needs to attack one token-carrying parameter
#[derive(Debug)]
pub struct AttackContext {
    pub message: Arc<HttpMessage>,
    pub param_name: String,
    pub param_value: String,
    pub token: TokenModel,
    stop: StopSignal,
    reported: AtomicBool,
}

impl AttackContext {
    pub fn new(
        message: Arc<HttpMessage>,
        param_name: impl Into<String>,
        param_value: impl Into<String>,
        token: TokenModel,
        stop: StopSignal,
    ) -> Self {
        Self {
            message,
            param_name: param_name.into(),
            param_value: param_value.into(),
            token,
            stop,
            reported: AtomicBool::new(false),
        }
    }

    pub fn stop_signal(&self) -> &StopSignal {
        &self.stop
    }

    pub fn is_stopped(&self) -> bool {
        self.stop.is_stopped()
    }

    /// Claims the single finding slot of this context and stops all work.
    /// Only the first caller gets `true`.
    pub fn claim_success(&self) -> bool {
        let first = !self.reported.swap(true, Ordering::SeqCst);
        self.stop.stop();
        first
    }

    pub fn has_succeeded(&self) -> bool {
        self.reported.load(Ordering::SeqCst)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn context(stop: StopSignal) -> AttackContext {
        let token = TokenModel::parse("eyJhbGciOiJub25lIn0.e30.").unwrap();
        AttackContext::new(Arc::new(HttpMessage::default()), "token", "x", token, stop)
    }

    #[test]
    fn stop_reports_first_flip_only() {
        let stop = StopSignal::new();
        assert!(!stop.is_stopped());
        assert!(stop.stop());
        assert!(!stop.stop());
        assert!(stop.is_stopped());
    }

    #[test]
    fn clones_share_state() {
        let stop = StopSignal::new();
        let other = stop.clone();
        other.stop();
        assert!(stop.is_stopped());
    }

    #[test]
    fn claim_success_is_single_winner() {
        let stop = StopSignal::new();
        let ctx = context(stop.clone());
        assert!(ctx.claim_success());
        assert!(!ctx.claim_success());
        assert!(ctx.has_succeeded());
        assert!(stop.is_stopped());
    }

    #[test]
    fn operator_stop_does_not_claim_success() {
        let stop = StopSignal::new();
        let ctx = context(stop.clone());
        stop.stop();
        assert!(ctx.is_stopped());
        assert!(!ctx.has_succeeded());
    }
}
