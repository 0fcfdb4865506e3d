//! Party identities.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Identity of a party within one protocol run.
///
/// Values start at 0 and increase for additional parties. Ordering on
/// `RoleId` is the canonical order used by group receives.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct RoleId(pub u32);

impl RoleId {
    pub fn new(id: u32) -> Self {
        Self(id)
    }

    pub fn as_u32(self) -> u32 {
        self.0
    }
}

impl From<u32> for RoleId {
    fn from(id: u32) -> Self {
        Self(id)
    }
}

impl From<RoleId> for u32 {
    fn from(role: RoleId) -> Self {
        role.0
    }
}

impl From<Role> for RoleId {
    fn from(role: Role) -> Self {
        role.id()
    }
}

impl fmt::Display for RoleId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// The two fixed positions of a two-party protocol.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Role {
    P1,
    P2,
}

impl Role {
    /// Role id of this position (`P1` is 0, `P2` is 1).
    pub fn id(self) -> RoleId {
        match self {
            Role::P1 => RoleId(0),
            Role::P2 => RoleId(1),
        }
    }

    /// The opposite position.
    pub fn peer(self) -> Role {
        match self {
            Role::P1 => Role::P2,
            Role::P2 => Role::P1,
        }
    }
}

impl TryFrom<RoleId> for Role {
    type Error = RoleId;

    fn try_from(role: RoleId) -> std::result::Result<Self, Self::Error> {
        match role.0 {
            0 => Ok(Role::P1),
            1 => Ok(Role::P2),
            _ => Err(role),
        }
    }
}
