//! Where a vacant slot may be allocated from.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::types::{BuildingId, ParkId};

/// Facility scope searched when the caller does not name a slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "scope", content = "id", rename_all = "snake_case")]
pub enum AllocationScope {
    Building(BuildingId),
    Park(ParkId),
}

impl AllocationScope {
    /// Resource name used in lookups and error messages.
    pub const fn resource(self) -> &'static str {
        match self {
            Self::Building(_) => "building",
            Self::Park(_) => "park",
        }
    }

    /// Raw id of the scoped facility.
    pub const fn id(self) -> i64 {
        match self {
            Self::Building(id) => id.get(),
            Self::Park(id) => id.get(),
        }
    }
}

impl fmt::Display for AllocationScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.resource(), self.id())
    }
}
