//! Messaging contract consumed by protocol code.

use crate::context::Context;
use crate::error::Result;
use crate::role::RoleId;
use async_trait::async_trait;
use std::collections::BTreeMap;

/// Point-to-point and group messaging between protocol parties.
///
/// Protocol rounds are written against this trait so the in-memory endpoints
/// can stand in for a real network in tests.
///
/// Implementations must be safe to share between tasks. For `receive_all`
/// the returned map holds exactly one entry per requested role.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Send a payload to one peer.
    async fn send(&self, ctx: &Context, to: RoleId, payload: &[u8]) -> Result<()>;

    /// Receive the next payload from one peer.
    async fn receive(&self, ctx: &Context, from: RoleId) -> Result<Vec<u8>>;

    /// Receive the next payload from each of several peers.
    async fn receive_all(&self, ctx: &Context, from: &[RoleId])
        -> Result<BTreeMap<RoleId, Vec<u8>>>;

    /// Get the local role.
    fn local_role(&self) -> RoleId;

    /// Get all peer roles, ascending.
    fn peers(&self) -> Vec<RoleId>;

    /// Send the same payload to every peer, in ascending role order.
    ///
    /// Stops at the first failure; peers before it have already been sent to.
    async fn broadcast(&self, ctx: &Context, payload: &[u8]) -> Result<()> {
        for peer in self.peers() {
            self.send(ctx, peer, payload).await?;
        }
        Ok(())
    }

    /// One barrier round: broadcast `payload`, then receive one payload from
    /// every peer.
    async fn exchange(&self, ctx: &Context, payload: &[u8]) -> Result<BTreeMap<RoleId, Vec<u8>>> {
        self.broadcast(ctx, payload).await?;
        let peers = self.peers();
        self.receive_all(ctx, &peers).await
    }
}
