//! Shared slot registry for one run.
//!
//! A [`Network`] owns every [`MessageSlot`] of one test or protocol run. It is
//! a cheap handle: clones share the same table, and endpoints obtained from it
//! keep it alive. Slots are created on first reference by either side and
//! removed as soon as their message has been awaited.

use crate::config::{NetConfig, OccupiedSlotPolicy};
use crate::context::Context;
use crate::endpoint::{Endpoint2P, EndpointMP};
use crate::error::{NetError, Result};
use crate::role::RoleId;
use crate::slot::MessageSlot;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

pub use crate::slot::SlotKey;

/// Counters describing traffic through a network.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct NetworkStats {
    pub messages_delivered: u64,
    pub messages_received: u64,
    pub cancellations: u64,
    pub occupied_slots: u64,
}

#[derive(Debug, Default)]
struct Counters {
    delivered: AtomicU64,
    received: AtomicU64,
    cancellations: AtomicU64,
    occupied: AtomicU64,
}

impl Counters {
    fn bump(counter: &AtomicU64) {
        counter.fetch_add(1, Ordering::Relaxed);
    }
}

#[derive(Debug)]
struct Inner {
    config: NetConfig,
    slots: Mutex<HashMap<SlotKey, Arc<MessageSlot>>>,
    counters: Counters,
}

/// In-memory network registry.
#[derive(Clone, Debug)]
pub struct Network(Arc<Inner>);

impl Network {
    pub fn new() -> Self {
        Self::with_config(NetConfig::default())
    }

    pub fn with_config(config: NetConfig) -> Self {
        Self(Arc::new(Inner {
            config,
            slots: Mutex::new(HashMap::new()),
            counters: Counters::default(),
        }))
    }

    pub fn config(&self) -> &NetConfig {
        &self.0.config
    }

    pub fn label(&self) -> &str {
        &self.0.config.label
    }

    /// Return the slot for `key`, creating it if absent.
    pub fn slot(&self, key: SlotKey) -> Arc<MessageSlot> {
        self.0
            .slots
            .lock()
            .entry(key)
            .or_insert_with(|| Arc::new(MessageSlot::new(key)))
            .clone()
    }

    /// Copy `payload` into the slot for `key`.
    ///
    /// The caller keeps ownership of its buffer; later changes to it are not
    /// observed by the receiver. If the slot still holds an unread message the
    /// call follows [`OccupiedSlotPolicy`]. If `ctx` ends first the context
    /// error is returned and the slot is left as it was.
    pub async fn deliver(&self, ctx: &Context, key: SlotKey, payload: &[u8]) -> Result<()> {
        if let Some(err) = ctx.err() {
            return Err(self.cancelled(key, err));
        }

        let mut message = payload.to_vec();
        let mut reported = false;

        loop {
            // Lookup and put happen under the table lock so they cannot
            // interleave with an await removing a drained slot.
            let slot = {
                let mut slots = self.0.slots.lock();
                let slot = slots
                    .entry(key)
                    .or_insert_with(|| Arc::new(MessageSlot::new(key)))
                    .clone();

                match slot.try_put(message) {
                    Ok(()) => {
                        Counters::bump(&self.0.counters.delivered);
                        tracing::trace!(net = %self.label(), slot = %key, len = payload.len(), "message delivered");
                        return Ok(());
                    }
                    Err(back) => message = back,
                }

                slot
            };

            if !reported {
                reported = true;
                Counters::bump(&self.0.counters.occupied);

                if self.0.config.occupied_slot == OccupiedSlotPolicy::Reject {
                    tracing::warn!(net = %self.label(), slot = %key, "slot already holds an undelivered message");
                    return Err(NetError::ProtocolMisuse(key));
                }

                tracing::warn!(
                    net = %self.label(),
                    slot = %key,
                    "slot already holds an undelivered message, waiting for it to drain"
                );
            }

            if let Err(err) = slot.wait_empty(ctx).await {
                return Err(self.cancelled(key, err));
            }
        }
    }

    /// Wait for the message addressed by `key` and remove its slot.
    ///
    /// If `ctx` ends first the context error is returned and the slot stays,
    /// so a later await for the same key still observes the message.
    pub async fn await_message(&self, ctx: &Context, key: SlotKey) -> Result<Vec<u8>> {
        loop {
            let slot = self.slot(key);

            if let Err(err) = slot.wait_full(ctx).await {
                return Err(self.cancelled(key, err));
            }

            let mut slots = self.0.slots.lock();
            if let Some(message) = slot.try_take() {
                if slots.get(&key).is_some_and(|current| Arc::ptr_eq(current, &slot)) {
                    slots.remove(&key);
                }
                drop(slots);

                Counters::bump(&self.0.counters.received);
                tracing::trace!(net = %self.label(), slot = %key, len = message.len(), "message received");
                return Ok(message);
            }
        }
    }

    /// Number of slots currently held by the registry.
    ///
    /// Counts undelivered messages as well as empty slots left behind by
    /// receives that were cancelled.
    pub fn pending_slots(&self) -> usize {
        self.0.slots.lock().len()
    }

    pub fn stats(&self) -> NetworkStats {
        let counters = &self.0.counters;
        NetworkStats {
            messages_delivered: counters.delivered.load(Ordering::Relaxed),
            messages_received: counters.received.load(Ordering::Relaxed),
            cancellations: counters.cancellations.load(Ordering::Relaxed),
            occupied_slots: counters.occupied.load(Ordering::Relaxed),
        }
    }

    /// Endpoint for `local` talking to exactly one `peer`.
    pub fn ep_2p(&self, local: impl Into<RoleId>, peer: impl Into<RoleId>) -> Endpoint2P {
        Endpoint2P::new(self.clone(), local.into(), peer.into())
    }

    /// Endpoint for `local` talking to a group. `local` itself is dropped from
    /// `peers` if present.
    pub fn ep_mp<I>(&self, local: impl Into<RoleId>, peers: I) -> EndpointMP
    where
        I: IntoIterator,
        I::Item: Into<RoleId>,
    {
        EndpointMP::new(self.clone(), local.into(), peers.into_iter().map(Into::into))
    }

    /// Two connected point-to-point endpoints.
    pub fn pair(&self, a: impl Into<RoleId>, b: impl Into<RoleId>) -> (Endpoint2P, Endpoint2P) {
        let (a, b) = (a.into(), b.into());
        (self.ep_2p(a, b), self.ep_2p(b, a))
    }

    /// One group endpoint per role, each peered with every other role.
    pub fn mesh(&self, roles: &[RoleId]) -> Vec<EndpointMP> {
        roles
            .iter()
            .map(|&local| self.ep_mp(local, roles.iter().copied()))
            .collect()
    }

    fn cancelled(&self, key: SlotKey, err: NetError) -> NetError {
        Counters::bump(&self.0.counters.cancellations);
        tracing::debug!(net = %self.label(), slot = %key, error = %err, "slot operation cancelled");
        err
    }
}

impl Default for Network {
    fn default() -> Self {
        Self::new()
    }
}
