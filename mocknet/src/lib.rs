//! In-memory sequenced transport for multi-party protocols.
//!
//! `mocknet` drives interactive protocols (distributed key generation,
//! threshold signing, coin tossing) without a real network. Each party runs as
//! its own task and talks through an [`Endpoint`] obtained from a shared
//! [`Network`]. Delivery is reliable and strictly ordered per directed pair.
//!
//! # Architecture
//!
//! ```text
//!   party 0                 party 1                 party 2
//! ┌──────────┐            ┌──────────┐            ┌──────────┐
//! │EndpointMP│            │EndpointMP│            │EndpointMP│
//! │ seq/lock │            │ seq/lock │            │ seq/lock │
//! └────┬─────┘            └────┬─────┘            └────┬─────┘
//!      │   send (0,1,seq)      │   receive (0,1,seq)   │
//!      ▼                       ▼                       ▼
//! ┌────────────────────────────────────────────────────────────┐
//! │                 Network (slot registry)                     │
//! │   (from, to, seq) -> MessageSlot   EMPTY -> FULL -> removed │
//! └────────────────────────────────────────────────────────────┘
//! ```
//!
//! Every directed pair has its own sequence: the n-th `send` from A to B
//! fills slot `(A, B, n)` and the n-th `receive` by B from A drains it.
//! Blocking calls take a [`Context`] and return [`NetError::Canceled`] or
//! [`NetError::DeadlineExceeded`] without touching any state when it ends.
//!
//! # Quick Start
//!
//! ```ignore
//! use mocknet::{Context, Network, RoleId, Transport};
//! use std::time::Duration;
//!
//! let net = Network::new();
//! let roles = [RoleId(0), RoleId(1), RoleId(2)];
//! let parties = net.mesh(&roles);
//!
//! let ctx = Context::background().with_timeout(Duration::from_secs(1));
//! let handles: Vec<_> = parties
//!     .into_iter()
//!     .map(|ep| {
//!         let ctx = ctx.clone();
//!         tokio::spawn(async move {
//!             let me = ep.local_role().as_u32() as u8;
//!             ep.exchange(&ctx, &[me]).await
//!         })
//!     })
//!     .collect();
//! ```
//!
//! Real network I/O, payload encryption and fault injection are out of scope.

#![forbid(unsafe_code)]

pub mod config;
pub mod context;
pub mod endpoint;
pub mod error;
pub mod network;
pub mod role;
pub mod slot;
pub mod tracing_ext;
pub mod transport;

pub use config::{ConfigBuilder, NetConfig, OccupiedSlotPolicy};
pub use context::Context;
pub use endpoint::{Endpoint, Endpoint2P, EndpointMP};
pub use error::{NetError, PeerReason, Result};
pub use network::{Network, NetworkStats, SlotKey};
pub use role::{Role, RoleId};
pub use slot::MessageSlot;
pub use transport::Transport;
