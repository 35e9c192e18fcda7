//! Cancellation for long-running searches
//!
//! [`CancelToken`] wraps a [`CancellationToken`] with an optional deadline and
//! a recorded cause, so an interrupted search can say why it stopped. The
//! search loop polls [`CancelToken::is_cancelled`] once per attempt.

use parking_lot::Mutex;
use std::fmt;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio_util::sync::CancellationToken;

/// Why a token was cancelled
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CancelCause {
    /// `cancel()` was called without a reason
    Requested,
    /// The token's deadline passed
    DeadlineExceeded,
    /// Cancelled with an explicit reason
    Reason(String),
}

impl fmt::Display for CancelCause {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CancelCause::Requested => f.write_str("cancellation requested"),
            CancelCause::DeadlineExceeded => f.write_str("deadline exceeded"),
            CancelCause::Reason(reason) => f.write_str(reason),
        }
    }
}

/// Cloneable cancellation signal with an optional deadline
#[derive(Clone, Default)]
pub struct CancelToken {
    token: CancellationToken,
    cause: Arc<Mutex<Option<CancelCause>>>,
    deadline: Option<Instant>,
    parent: Option<Arc<CancelToken>>,
}

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    /// A token that also cancels itself once `deadline` passes
    pub fn with_deadline(deadline: Instant) -> Self {
        Self {
            deadline: Some(deadline),
            ..Self::default()
        }
    }

    pub fn with_timeout(timeout: Duration) -> Self {
        Self::with_deadline(Instant::now() + timeout)
    }

    /// A token cancelled together with this one, but cancellable on its own
    pub fn child_token(&self) -> Self {
        Self {
            token: self.token.child_token(),
            cause: Arc::new(Mutex::new(None)),
            deadline: None,
            parent: Some(Arc::new(self.clone())),
        }
    }

    pub fn cancel(&self) {
        self.cancel_with_cause(CancelCause::Requested);
    }

    pub fn cancel_with(&self, reason: impl Into<String>) {
        self.cancel_with_cause(CancelCause::Reason(reason.into()));
    }

    fn cancel_with_cause(&self, cause: CancelCause) {
        {
            let mut slot = self.cause.lock();
            if slot.is_none() {
                *slot = Some(cause);
            }
        }
        self.token.cancel();
    }

    pub fn is_cancelled(&self) -> bool {
        self.token.is_cancelled()
            || self.deadline_passed()
            || self.parent.as_ref().is_some_and(|parent| parent.is_cancelled())
    }

    /// The cause of cancellation, or `None` while the token is live
    pub fn cause(&self) -> Option<CancelCause> {
        if let Some(cause) = self.cause.lock().clone() {
            return Some(cause);
        }
        if self.deadline_passed() {
            return Some(CancelCause::DeadlineExceeded);
        }
        if let Some(cause) = self.parent.as_ref().and_then(|parent| parent.cause()) {
            return Some(cause);
        }
        self.token.is_cancelled().then_some(CancelCause::Requested)
    }

    /// Resolves once the token is cancelled explicitly or through a parent
    ///
    /// Deadlines are only observed by polling.
    pub async fn cancelled(&self) {
        self.token.cancelled().await
    }

    fn deadline_passed(&self) -> bool {
        self.deadline.is_some_and(|deadline| Instant::now() >= deadline)
    }
}

impl fmt::Debug for CancelToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CancelToken")
            .field("cancelled", &self.is_cancelled())
            .field("deadline", &self.deadline)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fresh_token_is_live() {
        let token = CancelToken::new();
        assert!(!token.is_cancelled());
        assert_eq!(token.cause(), None);
    }

    #[test]
    fn test_cancel_records_first_cause() {
        let token = CancelToken::new();
        let clone = token.clone();
        token.cancel_with("shutting down");
        clone.cancel();
        assert!(clone.is_cancelled());
        assert_eq!(
            clone.cause(),
            Some(CancelCause::Reason("shutting down".to_string()))
        );
    }

    #[test]
    fn test_deadline() {
        let token = CancelToken::with_timeout(Duration::ZERO);
        assert!(token.is_cancelled());
        assert_eq!(token.cause(), Some(CancelCause::DeadlineExceeded));

        let token = CancelToken::with_timeout(Duration::from_secs(3600));
        assert!(!token.is_cancelled());
    }

    #[test]
    fn test_child_follows_parent() {
        let parent = CancelToken::new();
        let child = parent.child_token();
        parent.cancel_with("parent stopped");
        assert!(child.is_cancelled());
        assert_eq!(
            child.cause(),
            Some(CancelCause::Reason("parent stopped".to_string()))
        );
    }

    #[test]
    fn test_child_cancel_leaves_parent_live() {
        let parent = CancelToken::new();
        let child = parent.child_token();
        child.cancel();
        assert!(child.is_cancelled());
        assert_eq!(child.cause(), Some(CancelCause::Requested));
        assert!(!parent.is_cancelled());
    }

    #[test]
    fn test_child_observes_parent_deadline() {
        let parent = CancelToken::with_timeout(Duration::ZERO);
        let child = parent.child_token();
        assert!(child.is_cancelled());
        assert_eq!(child.cause(), Some(CancelCause::DeadlineExceeded));
    }

    #[tokio::test]
    async fn test_cancelled_future_resolves() {
        let token = CancelToken::new();
        let waiter = token.clone();
        let handle = tokio::spawn(async move { waiter.cancelled().await });
        token.cancel();
        handle.await.unwrap();
    }
}
