//! Per-party sequencing and locking.

use crate::context::Context;
use crate::error::{NetError, Result};
use crate::network::Network;
use crate::role::RoleId;
use parking_lot::Mutex;
use std::collections::{BTreeMap, HashMap};
use tokio::sync::{Mutex as AsyncMutex, MutexGuard};

/// Locks serializing same-direction operations toward one peer.
#[derive(Debug, Default)]
struct PeerLocks {
    send: AsyncMutex<()>,
    recv: AsyncMutex<()>,
}

#[derive(Debug, Default, Clone, Copy)]
struct Sequences {
    send: u64,
    recv: u64,
}

/// Bookkeeping for one local role.
///
/// The peer table is fixed at construction. Sequence counters live behind
/// their own small lock so reading them never waits on a peer lock held by a
/// blocked send or receive.
#[derive(Debug)]
pub(crate) struct EndpointCore {
    net: Network,
    local: RoleId,
    peers: BTreeMap<RoleId, PeerLocks>,
    seqs: Mutex<HashMap<RoleId, Sequences>>,
}

impl EndpointCore {
    pub(crate) fn new(net: Network, local: RoleId, peers: impl IntoIterator<Item = RoleId>) -> Self {
        let peers: BTreeMap<RoleId, PeerLocks> = peers
            .into_iter()
            .filter(|&role| role != local)
            .map(|role| (role, PeerLocks::default()))
            .collect();

        let seqs = peers
            .keys()
            .map(|&role| (role, Sequences::default()))
            .collect();

        Self {
            net,
            local,
            peers,
            seqs: Mutex::new(seqs),
        }
    }

    pub(crate) fn network(&self) -> &Network {
        &self.net
    }

    pub(crate) fn local(&self) -> RoleId {
        self.local
    }

    /// Configured peers in ascending order.
    pub(crate) fn peer_roles(&self) -> Vec<RoleId> {
        self.peers.keys().copied().collect()
    }

    pub(crate) fn check_peer(&self, role: RoleId) -> Result<()> {
        if role == self.local {
            return Err(NetError::self_addressed(role));
        }
        if !self.peers.contains_key(&role) {
            return Err(NetError::unknown_peer(role));
        }
        Ok(())
    }

    pub(crate) async fn lock_send(&self, ctx: &Context, role: RoleId) -> Result<MutexGuard<'_, ()>> {
        let locks = self.locks(role)?;
        let guard = acquire(ctx, &locks.send).await?;
        tracing::trace!(local = %self.local, peer = %role, "send lock acquired");
        Ok(guard)
    }

    pub(crate) async fn lock_recv(&self, ctx: &Context, role: RoleId) -> Result<MutexGuard<'_, ()>> {
        let locks = self.locks(role)?;
        let guard = acquire(ctx, &locks.recv).await?;
        tracing::trace!(local = %self.local, peer = %role, "receive lock acquired");
        Ok(guard)
    }

    pub(crate) fn send_seq(&self, role: RoleId) -> Option<u64> {
        self.seqs.lock().get(&role).map(|seqs| seqs.send)
    }

    pub(crate) fn recv_seq(&self, role: RoleId) -> Option<u64> {
        self.seqs.lock().get(&role).map(|seqs| seqs.recv)
    }

    pub(crate) fn advance_send_seq(&self, role: RoleId) {
        if let Some(seqs) = self.seqs.lock().get_mut(&role) {
            seqs.send += 1;
            tracing::trace!(local = %self.local, peer = %role, next = seqs.send, "send seq advanced");
        }
    }

    pub(crate) fn advance_recv_seq(&self, role: RoleId) {
        if let Some(seqs) = self.seqs.lock().get_mut(&role) {
            seqs.recv += 1;
            tracing::trace!(local = %self.local, peer = %role, next = seqs.recv, "recv seq advanced");
        }
    }

    fn locks(&self, role: RoleId) -> Result<&PeerLocks> {
        self.check_peer(role)?;
        self.peers.get(&role).ok_or(NetError::unknown_peer(role))
    }
}

async fn acquire<'a>(ctx: &Context, lock: &'a AsyncMutex<()>) -> Result<MutexGuard<'a, ()>> {
    if let Some(err) = ctx.err() {
        return Err(err);
    }

    tokio::select! {
        biased;
        err = ctx.done() => Err(err),
        guard = lock.lock() => Ok(guard),
    }
}
