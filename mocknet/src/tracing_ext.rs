//! Tracing span helpers for the fabric.
//!
//! Every endpoint operation runs inside one of these spans. Payload bytes are
//! never recorded, only their length.
//!
//! # Spans
//!
//! - `mocknet.send` - One `send` call
//! - `mocknet.receive` - One `receive` call
//! - `mocknet.receive_all` - One group receive

use crate::role::RoleId;
use tracing::{debug_span, Span};

/// Span names used by the fabric.
pub mod span_names {
    /// Point-to-point send.
    pub const SEND: &str = "mocknet.send";
    /// Point-to-point receive.
    pub const RECEIVE: &str = "mocknet.receive";
    /// Group receive.
    pub const RECEIVE_ALL: &str = "mocknet.receive_all";
}

/// Create a span for sending a message.
pub fn send_span(label: &str, from: RoleId, to: RoleId, len: usize) -> Span {
    debug_span!(
        target: "mocknet",
        "mocknet.send",
        net = %label,
        from = %from,
        to = %to,
        len,
        seq = tracing::field::Empty,
        otel.name = span_names::SEND,
    )
}

/// Create a span for receiving a message.
pub fn receive_span(label: &str, from: RoleId, to: RoleId) -> Span {
    debug_span!(
        target: "mocknet",
        "mocknet.receive",
        net = %label,
        from = %from,
        to = %to,
        seq = tracing::field::Empty,
        otel.name = span_names::RECEIVE,
    )
}

/// Create a span for a group receive.
pub fn receive_all_span(label: &str, to: RoleId, peers: usize) -> Span {
    debug_span!(
        target: "mocknet",
        "mocknet.receive_all",
        net = %label,
        to = %to,
        peers,
        otel.name = span_names::RECEIVE_ALL,
    )
}
