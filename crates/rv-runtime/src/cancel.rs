use std::fmt;
use std::sync::{Arc, OnceLock};

use tokio_util::sync::CancellationToken;
use tokio_util::sync::WaitForCancellationFuture;

/// Why a supervisor was asked to stop.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StopReason {
    /// The rule no longer exists; its retained state must be deleted.
    RuleDeleted,
    /// Process shutdown or restart; state is kept for the next lifetime.
    Shutdown,
    /// Any other caller-defined cause. Treated like `Shutdown`.
    Other(String),
}

impl fmt::Display for StopReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::RuleDeleted => f.write_str("rule deleted"),
            Self::Shutdown => f.write_str("shutdown"),
            Self::Other(s) => f.write_str(s),
        }
    }
}

/// Cancellation token with an attachable cause.
///
/// The cause is written once, before the token fires, so any task that
/// observes cancellation also sees the cause. Cancelling the parent token
/// directly leaves the cause empty, which [`CancelScope::cause`] reports as
/// [`StopReason::Shutdown`].
#[derive(Clone)]
pub struct CancelScope {
    token: CancellationToken,
    cause: Arc<OnceLock<StopReason>>,
}

impl CancelScope {
    pub fn new() -> Self {
        Self::from_token(CancellationToken::new())
    }

    /// Scope that is also cancelled when `parent` is.
    pub fn child_of(parent: &CancellationToken) -> Self {
        Self::from_token(parent.child_token())
    }

    fn from_token(token: CancellationToken) -> Self {
        Self {
            token,
            cause: Arc::new(OnceLock::new()),
        }
    }

    /// Cancel with `reason`. The first recorded cause wins.
    pub fn cancel(&self, reason: StopReason) {
        let _ = self.cause.set(reason);
        self.token.cancel();
    }

    pub fn is_cancelled(&self) -> bool {
        self.token.is_cancelled()
    }

    pub fn cancelled(&self) -> WaitForCancellationFuture<'_> {
        self.token.cancelled()
    }

    /// Cause of cancellation, or `None` while the scope is still live.
    pub fn cause(&self) -> Option<StopReason> {
        if !self.token.is_cancelled() {
            return None;
        }
        Some(self.cause.get().cloned().unwrap_or(StopReason::Shutdown))
    }
}

impl Default for CancelScope {
    fn default() -> Self {
        Self::new()
    }
}
