//! Role-scoped endpoints.
//!
//! An [`Endpoint`] is bound to one local role and a fixed set of peers. It
//! addresses the registry by `(from, to, seq)`: `send` writes the next slot
//! toward a peer and `receive` reads the next slot from it. Two
//! specialisations fix the peer set:
//!
//! - [`Endpoint2P`]: exactly one peer
//! - [`EndpointMP`]: an arbitrary group, for per-round barriers

mod state;

use crate::context::Context;
use crate::error::{NetError, Result};
use crate::network::{Network, SlotKey};
use crate::role::RoleId;
use crate::tracing_ext::{receive_all_span, receive_span, send_span};
use crate::transport::Transport;
use async_trait::async_trait;
use std::collections::{BTreeMap, BTreeSet};
use std::ops::Deref;
use tracing::Instrument;

use self::state::EndpointCore;

/// Send/receive API for one local role.
#[derive(Debug)]
pub struct Endpoint {
    core: EndpointCore,
}

impl Endpoint {
    fn new(net: Network, local: RoleId, peers: impl IntoIterator<Item = RoleId>) -> Self {
        Self {
            core: EndpointCore::new(net, local, peers),
        }
    }

    pub fn local_role(&self) -> RoleId {
        self.core.local()
    }

    /// Configured peers in ascending order.
    pub fn peers(&self) -> Vec<RoleId> {
        self.core.peer_roles()
    }

    pub fn network(&self) -> &Network {
        self.core.network()
    }

    /// Sequence number of the next message this endpoint will send to `peer`.
    pub fn send_seq(&self, peer: RoleId) -> Option<u64> {
        self.core.send_seq(peer)
    }

    /// Sequence number of the next message this endpoint expects from `peer`.
    pub fn recv_seq(&self, peer: RoleId) -> Option<u64> {
        self.core.recv_seq(peer)
    }

    /// Send `payload` to `to`.
    ///
    /// The payload is copied. On cancellation the send sequence is unchanged,
    /// so the call can be retried with a fresh context.
    pub async fn send(&self, ctx: &Context, to: RoleId, payload: &[u8]) -> Result<()> {
        self.core.check_peer(to)?;

        let local = self.core.local();
        let span = send_span(self.network().label(), local, to, payload.len());

        async {
            let _guard = self.core.lock_send(ctx, to).await?;
            let seq = self.core.send_seq(to).ok_or(NetError::unknown_peer(to))?;
            tracing::Span::current().record("seq", seq);

            self.network()
                .deliver(ctx, SlotKey::new(local, to, seq), payload)
                .await?;
            self.core.advance_send_seq(to);

            tracing::debug!("sent");
            Ok(())
        }
        .instrument(span)
        .await
    }

    /// Receive the next message from `from`.
    pub async fn receive(&self, ctx: &Context, from: RoleId) -> Result<Vec<u8>> {
        self.core.check_peer(from)?;

        let local = self.core.local();
        let span = receive_span(self.network().label(), from, local);

        async {
            let _guard = self.core.lock_recv(ctx, from).await?;
            let seq = self.core.recv_seq(from).ok_or(NetError::unknown_peer(from))?;
            tracing::Span::current().record("seq", seq);

            let message = self
                .network()
                .await_message(ctx, SlotKey::new(from, local, seq))
                .await?;
            self.core.advance_recv_seq(from);

            tracing::debug!(len = message.len(), "received");
            Ok(message)
        }
        .instrument(span)
        .await
    }

    /// Receive the next message from each role in `from`.
    ///
    /// The role list is validated before anything is locked: the local role
    /// or an unknown role fails with [`NetError::InvalidPeer`], a repeated
    /// role with [`NetError::DuplicateRole`]. Receive locks for all roles are
    /// then held for the whole call and messages are awaited in ascending role
    /// order, whatever the input order.
    ///
    /// Each successful await advances that peer's receive sequence
    /// immediately. On the first failure the remaining waits are abandoned,
    /// results gathered so far are discarded and the error is returned;
    /// sequences already advanced stay advanced.
    pub async fn receive_all(
        &self,
        ctx: &Context,
        from: &[RoleId],
    ) -> Result<BTreeMap<RoleId, Vec<u8>>> {
        let roles = self.normalize_roles(from)?;
        if roles.is_empty() {
            return Ok(BTreeMap::new());
        }

        let local = self.core.local();
        let span = receive_all_span(self.network().label(), local, roles.len());

        async {
            let mut guards = Vec::with_capacity(roles.len());
            for &role in &roles {
                guards.push(self.core.lock_recv(ctx, role).await?);
            }

            let mut out = BTreeMap::new();
            for &role in &roles {
                let seq = self.core.recv_seq(role).ok_or(NetError::unknown_peer(role))?;
                let message = self
                    .network()
                    .await_message(ctx, SlotKey::new(role, local, seq))
                    .await?;
                self.core.advance_recv_seq(role);

                tracing::trace!(from = %role, seq, len = message.len(), "group member received");
                out.insert(role, message);
            }

            tracing::debug!("received from all peers");
            Ok(out)
        }
        .instrument(span)
        .await
    }

    /// Validate a group receive request and return its roles in ascending
    /// order.
    fn normalize_roles(&self, from: &[RoleId]) -> Result<Vec<RoleId>> {
        let mut seen = BTreeSet::new();
        for &role in from {
            self.core.check_peer(role)?;
            if !seen.insert(role) {
                return Err(NetError::DuplicateRole(role));
            }
        }
        Ok(seen.into_iter().collect())
    }
}

/// Point-to-point endpoint with exactly one peer.
#[derive(Debug)]
pub struct Endpoint2P {
    inner: Endpoint,
    peer: RoleId,
}

impl Endpoint2P {
    pub(crate) fn new(net: Network, local: RoleId, peer: RoleId) -> Self {
        Self {
            inner: Endpoint::new(net, local, [peer]),
            peer,
        }
    }

    pub fn peer(&self) -> RoleId {
        self.peer
    }
}

impl Deref for Endpoint2P {
    type Target = Endpoint;

    fn deref(&self) -> &Endpoint {
        &self.inner
    }
}

/// Group endpoint peered with an arbitrary set of roles.
#[derive(Debug)]
pub struct EndpointMP {
    inner: Endpoint,
}

impl EndpointMP {
    pub(crate) fn new(net: Network, local: RoleId, peers: impl IntoIterator<Item = RoleId>) -> Self {
        Self {
            inner: Endpoint::new(net, local, peers),
        }
    }
}

impl Deref for EndpointMP {
    type Target = Endpoint;

    fn deref(&self) -> &Endpoint {
        &self.inner
    }
}

macro_rules! delegate_transport {
    ($ty:ty) => {
        #[async_trait]
        impl Transport for $ty {
            async fn send(&self, ctx: &Context, to: RoleId, payload: &[u8]) -> Result<()> {
                self.inner.send(ctx, to, payload).await
            }

            async fn receive(&self, ctx: &Context, from: RoleId) -> Result<Vec<u8>> {
                self.inner.receive(ctx, from).await
            }

            async fn receive_all(
                &self,
                ctx: &Context,
                from: &[RoleId],
            ) -> Result<BTreeMap<RoleId, Vec<u8>>> {
                self.inner.receive_all(ctx, from).await
            }

            fn local_role(&self) -> RoleId {
                self.inner.local_role()
            }

            fn peers(&self) -> Vec<RoleId> {
                self.inner.peers()
            }
        }
    };
}

delegate_transport!(Endpoint2P);
delegate_transport!(EndpointMP);
