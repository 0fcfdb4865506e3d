//! Single-use rendezvous cell.
//!
//! A [`MessageSlot`] carries exactly one message for one
//! `(sender, receiver, sequence)` key. Its lifecycle is
//! `EMPTY --try_put--> FULL --try_take--> EMPTY`. The registry removes the
//! slot in the same critical section as the take, so each slot instance
//! carries at most one message.

use crate::context::Context;
use crate::error::Result;
use crate::role::RoleId;
use parking_lot::Mutex;
use std::fmt;
use tokio::sync::Notify;

/// Address of one message: the `seq`-th message sent from `from` to `to`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct SlotKey {
    pub from: RoleId,
    pub to: RoleId,
    pub seq: u64,
}

impl SlotKey {
    pub fn new(from: RoleId, to: RoleId, seq: u64) -> Self {
        Self { from, to, seq }
    }
}

impl fmt::Display for SlotKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}->{}#{}", self.from, self.to, self.seq)
    }
}

/// Capacity-one blocking cell.
#[derive(Debug)]
pub struct MessageSlot {
    key: SlotKey,
    message: Mutex<Option<Vec<u8>>>,
    filled: Notify,
    drained: Notify,
}

impl MessageSlot {
    pub fn new(key: SlotKey) -> Self {
        Self {
            key,
            message: Mutex::new(None),
            filled: Notify::new(),
            drained: Notify::new(),
        }
    }

    pub fn key(&self) -> SlotKey {
        self.key
    }

    pub fn is_full(&self) -> bool {
        self.message.lock().is_some()
    }

    /// Store `message` if the slot is empty, otherwise hand it back.
    pub fn try_put(&self, message: Vec<u8>) -> std::result::Result<(), Vec<u8>> {
        {
            let mut slot = self.message.lock();
            if slot.is_some() {
                return Err(message);
            }
            *slot = Some(message);
        }

        self.filled.notify_waiters();
        Ok(())
    }

    /// Remove the message if there is one.
    pub fn try_take(&self) -> Option<Vec<u8>> {
        let message = self.message.lock().take();
        if message.is_some() {
            self.drained.notify_waiters();
        }
        message
    }

    /// Wait until the slot holds a message.
    ///
    /// Returns the context error if `ctx` ends first. An already-ended context
    /// fails even when the message is present.
    pub async fn wait_full(&self, ctx: &Context) -> Result<()> {
        self.wait_until(ctx, &self.filled, true).await
    }

    /// Wait until the slot is empty.
    pub async fn wait_empty(&self, ctx: &Context) -> Result<()> {
        self.wait_until(ctx, &self.drained, false).await
    }

    async fn wait_until(&self, ctx: &Context, notify: &Notify, full: bool) -> Result<()> {
        if let Some(err) = ctx.err() {
            return Err(err);
        }

        loop {
            // Register interest before checking so a concurrent put or take
            // cannot slip its notification in between.
            let notified = notify.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();

            if self.is_full() == full {
                return Ok(());
            }

            tokio::select! {
                biased;
                err = ctx.done() => return Err(err),
                _ = notified.as_mut() => {}
            }
        }
    }
}
