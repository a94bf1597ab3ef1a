//! Cancellation context threaded through every pipeline stage.
//!
//! A [`Context`] is a [`CancellationToken`] plus an optional deadline. Every
//! stage receives one and watches [`Context::done`] at each suspension point;
//! cancellation is cooperative and never preempts user futures.

use std::time::Duration;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

use crate::error::Error;

/// Cancellation scope for one pipeline run.
///
/// Cloning a context is cheap and yields a handle to the same scope.
///
/// # Examples
///
/// ```rust
/// use channelweld::core::Context;
///
/// let ctx = Context::new();
/// let child = ctx.with_cancel();
///
/// ctx.cancel();
/// assert!(child.is_done());
/// ```
#[derive(Debug, Clone, Default)]
pub struct Context {
    token: CancellationToken,
    deadline: Option<Instant>,
    enforce_deadline: bool,
}

impl Context {
    /// Create a root context that is only done once [`cancel`](Self::cancel) is called.
    pub fn new() -> Self {
        Self::default()
    }

    /// Wrap an existing token.
    pub fn from_token(token: CancellationToken) -> Self {
        Self {
            token,
            deadline: None,
            enforce_deadline: false,
        }
    }

    /// Child context cancelled together with this one, or on its own.
    pub fn with_cancel(&self) -> Self {
        Self {
            token: self.token.child_token(),
            deadline: self.deadline,
            enforce_deadline: self.enforce_deadline,
        }
    }

    /// Child context that is also done once `timeout` elapses.
    pub fn with_timeout(&self, timeout: Duration) -> Self {
        self.with_deadline(Instant::now() + timeout)
    }

    /// Child context that is also done at `deadline`; an earlier inherited
    /// deadline still wins.
    pub fn with_deadline(&self, deadline: Instant) -> Self {
        let deadline = match self.deadline {
            Some(current) if self.enforce_deadline => current.min(deadline),
            _ => deadline,
        };

        Self {
            token: self.token.child_token(),
            deadline: Some(deadline),
            enforce_deadline: true,
        }
    }

    /// Detached context: same deadline value, but neither this context's
    /// cancellation nor that deadline ever marks it done.
    pub fn without_cancel(&self) -> Self {
        Self {
            token: CancellationToken::new(),
            deadline: self.deadline,
            enforce_deadline: false,
        }
    }

    /// Cancel this context and every context derived from it.
    pub fn cancel(&self) {
        self.token.cancel();
    }

    /// The deadline carried by this context, enforced or not.
    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    /// The underlying cancellation token.
    pub fn token(&self) -> &CancellationToken {
        &self.token
    }

    /// Whether the context is cancelled or past its deadline.
    pub fn is_done(&self) -> bool {
        self.err().is_some()
    }

    /// Why the context is done, if it is.
    pub fn err(&self) -> Option<Error> {
        if self.token.is_cancelled() {
            return Some(Error::Cancelled);
        }

        match self.deadline {
            Some(deadline) if self.enforce_deadline && Instant::now() >= deadline => {
                Some(Error::DeadlineExceeded)
            }
            _ => None,
        }
    }

    /// Completes once the context is cancelled or its deadline passes.
    pub async fn done(&self) {
        match self.deadline {
            Some(deadline) if self.enforce_deadline => {
                tokio::select! {
                    _ = self.token.cancelled() => {}
                    _ = tokio::time::sleep_until(deadline) => {}
                }
            }
            _ => self.token.cancelled().await,
        }
    }

    /// The error carried by a terminal cancellation item.
    pub(crate) fn cancellation_error(&self) -> Error {
        self.err().unwrap_or(Error::Cancelled)
    }
}
