//! Cooperative cancellation for blocking fabric operations.
//!
//! A [`Context`] is a cancellation token plus an optional deadline. Every
//! blocking call on an endpoint takes one; when it ends the call returns
//! [`NetError::Canceled`] or [`NetError::DeadlineExceeded`] and leaves
//! sequence counters and slot contents untouched.
//!
//! ```ignore
//! let ctx = Context::background().with_timeout(Duration::from_secs(1));
//! let msg = endpoint.receive(&ctx, RoleId(1)).await?;
//! ```

use crate::error::NetError;
use std::time::Duration;
use tokio::time::{sleep_until, Instant};
use tokio_util::sync::CancellationToken;

#[derive(Clone, Debug)]
pub struct Context {
    token: CancellationToken,
    deadline: Option<Instant>,
}

impl Context {
    /// A context that never ends unless cancelled explicitly.
    pub fn background() -> Self {
        Self {
            token: CancellationToken::new(),
            deadline: None,
        }
    }

    /// Derive a context that ends after `timeout`, or earlier if `self` ends.
    ///
    /// A timeout too large to represent adds no deadline of its own.
    pub fn with_timeout(&self, timeout: Duration) -> Self {
        match Instant::now().checked_add(timeout) {
            Some(deadline) => self.with_deadline(deadline),
            None => self.child(),
        }
    }

    /// Derive a context that ends at `deadline`, or earlier if `self` ends.
    pub fn with_deadline(&self, deadline: Instant) -> Self {
        let deadline = match self.deadline {
            Some(parent) => parent.min(deadline),
            None => deadline,
        };

        Self {
            token: self.token.child_token(),
            deadline: Some(deadline),
        }
    }

    /// Derive a context that can be cancelled without affecting `self`.
    pub fn child(&self) -> Self {
        Self {
            token: self.token.child_token(),
            deadline: self.deadline,
        }
    }

    /// Cancel this context and every context derived from it.
    pub fn cancel(&self) {
        self.token.cancel();
    }

    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    /// Why the context ended, or `None` while it is still live.
    pub fn err(&self) -> Option<NetError> {
        if self.token.is_cancelled() {
            return Some(NetError::Canceled);
        }

        match self.deadline {
            Some(deadline) if deadline <= Instant::now() => Some(NetError::DeadlineExceeded),
            _ => None,
        }
    }

    pub fn is_done(&self) -> bool {
        self.err().is_some()
    }

    /// Wait until the context ends and return the reason.
    pub async fn done(&self) -> NetError {
        match self.deadline {
            Some(deadline) => tokio::select! {
                biased;
                _ = self.token.cancelled() => NetError::Canceled,
                _ = sleep_until(deadline) => NetError::DeadlineExceeded,
            },
            None => {
                self.token.cancelled().await;
                NetError::Canceled
            }
        }
    }
}

impl Default for Context {
    fn default() -> Self {
        Self::background()
    }
}
