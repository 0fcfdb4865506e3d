//! Error types for the transport fabric.

use crate::role::RoleId;
use crate::slot::SlotKey;
use std::fmt;
use thiserror::Error;

/// Why a role was refused as a peer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PeerReason {
    /// The operation addressed the endpoint's own role.
    SelfAddressed,
    /// The role is not part of the endpoint's configured peer set.
    NotConfigured,
}

impl fmt::Display for PeerReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PeerReason::SelfAddressed => f.write_str("addressed to self"),
            PeerReason::NotConfigured => f.write_str("unknown peer"),
        }
    }
}

/// Errors returned by endpoints and the network registry.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum NetError {
    /// Self-addressed operation, or a peer outside the configured set
    #[error("invalid peer {role}: {reason}")]
    InvalidPeer { role: RoleId, reason: PeerReason },

    /// The same role appeared twice in a group receive
    #[error("duplicate role {0}")]
    DuplicateRole(RoleId),

    /// The context was cancelled while the operation was pending
    #[error("context canceled")]
    Canceled,

    /// The context deadline passed while the operation was pending
    #[error("context deadline exceeded")]
    DeadlineExceeded,

    /// A second message was delivered to a slot that still holds one
    #[error("slot {0} already holds an undelivered message")]
    ProtocolMisuse(SlotKey),
}

impl NetError {
    pub(crate) fn self_addressed(role: RoleId) -> Self {
        Self::InvalidPeer {
            role,
            reason: PeerReason::SelfAddressed,
        }
    }

    pub(crate) fn unknown_peer(role: RoleId) -> Self {
        Self::InvalidPeer {
            role,
            reason: PeerReason::NotConfigured,
        }
    }

    /// Check if this error came from the caller's context ending
    pub fn is_cancellation(&self) -> bool {
        matches!(self, Self::Canceled | Self::DeadlineExceeded)
    }

    /// Check if this error is retryable.
    ///
    /// Only cancellation is transient: counters and slots are left as they
    /// were, so the same call with a fresh context observes the same state.
    pub fn is_retryable(&self) -> bool {
        self.is_cancellation()
    }
}

/// Result type for fabric operations
pub type Result<T> = std::result::Result<T, NetError>;
