//! Slot types and the occupancy state machine.
//!
//! A slot moves `vacant → occupied → vacant` through check-in and check-out.
//! `closed` is only ever entered or left by an operator; the billing flow never
//! produces it.

use std::fmt;
use std::str::FromStr;

use rusqlite::types::{FromSql, FromSqlError, FromSqlResult, ToSql, ToSqlOutput, ValueRef};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Kind of vehicle a slot accepts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum SlotType {
    #[default]
    Car,
    Motorcycle,
    Bicycle,
    Large,
    XLarge,
}

impl SlotType {
    pub const ALL: [Self; 5] = [
        Self::Car,
        Self::Motorcycle,
        Self::Bicycle,
        Self::Large,
        Self::XLarge,
    ];

    /// String representation for database storage.
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Car => "car",
            Self::Motorcycle => "motorcycle",
            Self::Bicycle => "bicycle",
            Self::Large => "large",
            Self::XLarge => "xlarge",
        }
    }
}

impl fmt::Display for SlotType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(self.as_str())
    }
}

impl FromStr for SlotType {
    type Err = UnknownSlotType;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "car" => Ok(Self::Car),
            "motorcycle" => Ok(Self::Motorcycle),
            "bicycle" => Ok(Self::Bicycle),
            "large" => Ok(Self::Large),
            "xlarge" => Ok(Self::XLarge),
            _ => Err(UnknownSlotType(s.to_string())),
        }
    }
}

/// Error type for unknown slot type strings.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown slot type: {0}")]
pub struct UnknownSlotType(String);

/// Occupancy status of a slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum SlotStatus {
    #[default]
    Vacant,
    Occupied,
    Closed,
}

impl SlotStatus {
    pub const ALL: [Self; 3] = [Self::Vacant, Self::Occupied, Self::Closed];

    /// String representation for database storage.
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Vacant => "vacant",
            Self::Occupied => "occupied",
            Self::Closed => "closed",
        }
    }

    /// Transition taken at check-in.
    ///
    /// Only a vacant slot can be occupied; the error says which state blocked it.
    pub const fn occupy(self) -> Result<Self, OccupancyConflict> {
        match self {
            Self::Vacant => Ok(Self::Occupied),
            Self::Occupied => Err(OccupancyConflict::Occupied),
            Self::Closed => Err(OccupancyConflict::Closed),
        }
    }

    /// Transition taken at check-out. Unconditional.
    pub const fn release(self) -> Self {
        Self::Vacant
    }
}

impl fmt::Display for SlotStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(self.as_str())
    }
}

impl FromStr for SlotStatus {
    type Err = UnknownSlotStatus;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "vacant" => Ok(Self::Vacant),
            "occupied" => Ok(Self::Occupied),
            "closed" => Ok(Self::Closed),
            _ => Err(UnknownSlotStatus(s.to_string())),
        }
    }
}

/// Error type for unknown slot status strings.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown slot status: {0}")]
pub struct UnknownSlotStatus(String);

/// Why a slot refused a check-in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum OccupancyConflict {
    #[error("slot occupied")]
    Occupied,
    #[error("slot closed")]
    Closed,
}

macro_rules! impl_text_enum {
    ($name:ident) => {
        impl Serialize for $name {
            fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
            where
                S: serde::Serializer,
            {
                serializer.serialize_str(self.as_str())
            }
        }

        impl<'de> Deserialize<'de> for $name {
            fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
            where
                D: serde::Deserializer<'de>,
            {
                let s = String::deserialize(deserializer)?;
                s.parse().map_err(serde::de::Error::custom)
            }
        }

        impl ToSql for $name {
            fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
                Ok(ToSqlOutput::from(self.as_str()))
            }
        }

        impl FromSql for $name {
            fn column_result(value: ValueRef<'_>) -> FromSqlResult<Self> {
                value
                    .as_str()?
                    .parse()
                    .map_err(|err| FromSqlError::Other(Box::new(err)))
            }
        }
    };
}

impl_text_enum!(SlotType);
impl_text_enum!(SlotStatus);
