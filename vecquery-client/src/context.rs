//! Per-call cancellation and deadline.

use std::future::Future;
use std::time::Duration;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use vecquery_core::{QueryError, QueryResult};

/// Bounds a single call: it ends when the token is cancelled or the
/// deadline passes, whichever comes first.
#[derive(Debug, Clone, Default)]
pub struct RequestContext {
    cancel: CancellationToken,
    deadline: Option<Instant>,
}

impl RequestContext {
    /// No cancellation source and no deadline.
    pub fn background() -> Self {
        Self::default()
    }

    /// Context driven by an existing token.
    pub fn with_cancellation(token: CancellationToken) -> Self {
        Self {
            cancel: token,
            deadline: None,
        }
    }

    /// Derive a context whose deadline is at most `timeout` from now.
    pub fn with_timeout(&self, timeout: Duration) -> Self {
        self.with_deadline(Instant::now() + timeout)
    }

    /// Derive a context with `deadline`; an earlier inherited deadline wins.
    pub fn with_deadline(&self, deadline: Instant) -> Self {
        let deadline = match self.deadline {
            Some(existing) if existing < deadline => existing,
            _ => deadline,
        };
        Self {
            cancel: self.cancel.child_token(),
            deadline: Some(deadline),
        }
    }

    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }

    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    pub fn token(&self) -> &CancellationToken {
        &self.cancel
    }

    /// Check the context before starting work.
    pub fn check(&self) -> QueryResult<()> {
        if self.is_cancelled() {
            return Err(QueryError::Cancelled);
        }
        if matches!(self.deadline, Some(deadline) if deadline <= Instant::now()) {
            return Err(QueryError::DeadlineExceeded);
        }
        Ok(())
    }

    /// Drive `fut` until it finishes, the token fires, or the deadline passes.
    /// The future is dropped on cancellation, aborting any in-flight I/O.
    pub async fn run<F, T>(&self, fut: F) -> QueryResult<T>
    where
        F: Future<Output = QueryResult<T>>,
    {
        self.check()?;
        let deadline = async {
            match self.deadline {
                Some(deadline) => tokio::time::sleep_until(deadline).await,
                None => std::future::pending::<()>().await,
            }
        };
        tokio::select! {
            biased;
            _ = self.cancel.cancelled() => Err(QueryError::Cancelled),
            _ = deadline => Err(QueryError::DeadlineExceeded),
            result = fut => result,
        }
    }
}
