//! Configuration for a mock network run.

use serde::{Deserialize, Serialize};

/// Label attached to tracing spans when none is configured.
pub const DEFAULT_LABEL: &str = "mocknet";

/// What `deliver` does when the target slot still holds an unread message.
///
/// Under correct sequencing this never happens: each `(from, to, seq)` key is
/// written once. It only occurs when something bypasses the endpoint counters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum OccupiedSlotPolicy {
    /// Wait until the slot is drained (or the context ends).
    #[default]
    Block,
    /// Fail immediately with `NetError::ProtocolMisuse`.
    Reject,
}

/// Network configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct NetConfig {
    /// Run label recorded on every span, to tell concurrent runs apart.
    pub label: String,

    /// Behaviour on a second delivery to an occupied slot.
    pub occupied_slot: OccupiedSlotPolicy,
}

impl Default for NetConfig {
    fn default() -> Self {
        Self {
            label: DEFAULT_LABEL.to_owned(),
            occupied_slot: OccupiedSlotPolicy::default(),
        }
    }
}

impl NetConfig {
    pub fn builder() -> ConfigBuilder {
        ConfigBuilder::new()
    }
}

/// Builder for [`NetConfig`].
#[derive(Debug, Default)]
pub struct ConfigBuilder {
    config: NetConfig,
}

impl ConfigBuilder {
    pub fn new() -> Self {
        Self {
            config: NetConfig::default(),
        }
    }

    /// Set the run label.
    pub fn label(mut self, label: impl Into<String>) -> Self {
        self.config.label = label.into();
        self
    }

    /// Set the occupied-slot policy.
    pub fn occupied_slot(mut self, policy: OccupiedSlotPolicy) -> Self {
        self.config.occupied_slot = policy;
        self
    }

    /// Shorthand for `occupied_slot(OccupiedSlotPolicy::Reject)`.
    pub fn strict(self) -> Self {
        self.occupied_slot(OccupiedSlotPolicy::Reject)
    }

    pub fn build(self) -> NetConfig {
        self.config
    }
}
