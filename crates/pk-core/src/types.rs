//! Core type definitions with validation.

use std::fmt;
use std::str::FromStr;

use rusqlite::types::{FromSql, FromSqlResult, ToSql, ToSqlOutput, ValueRef};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Validation errors for core types.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ValidationError {
    /// The provided value was empty.
    #[error("{field} cannot be empty")]
    Empty { field: &'static str },

    /// A monetary value that must not be negative was negative.
    #[error("{field} must not be negative, got {value}")]
    NegativeAmount { field: &'static str, value: Decimal },

    /// A duration in minutes was negative.
    #[error("{field} must not be negative, got {value}")]
    NegativeMinutes { field: &'static str, value: i64 },

    /// An identifier could not be parsed.
    #[error("invalid {field}: {value}")]
    InvalidId { field: &'static str, value: String },
}

/// Generates an integer ID newtype backed by a SQLite `INTEGER PRIMARY KEY`.
macro_rules! define_int_id {
    (
        $(#[$meta:meta])*
        $name:ident, $field_name:literal
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(i64);

        impl $name {
            /// Wraps a raw row id.
            pub const fn new(id: i64) -> Self {
                Self(id)
            }

            /// Returns the raw row id.
            pub const fn get(self) -> i64 {
                self.0
            }
        }

        impl From<i64> for $name {
            fn from(id: i64) -> Self {
                Self(id)
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                fmt::Display::fmt(&self.0, f)
            }
        }

        impl FromStr for $name {
            type Err = ValidationError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                s.trim()
                    .parse::<i64>()
                    .map(Self)
                    .map_err(|_| ValidationError::InvalidId {
                        field: $field_name,
                        value: s.to_string(),
                    })
            }
        }

        impl ToSql for $name {
            fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
                Ok(ToSqlOutput::from(self.0))
            }
        }

        impl FromSql for $name {
            fn column_result(value: ValueRef<'_>) -> FromSqlResult<Self> {
                i64::column_result(value).map(Self)
            }
        }
    };
}

define_int_id!(
    /// Identifies a park, the top-level facility.
    ParkId, "park ID"
);

define_int_id!(
    /// Identifies a building within a park.
    BuildingId, "building ID"
);

define_int_id!(
    /// Identifies a single parking slot.
    ///
    /// Slot IDs are embedded, zero-padded, in bill codes.
    SlotId, "slot ID"
);

define_int_id!(
    /// Identifies a bill row. Callers address bills by their code instead.
    BillId, "bill ID"
);

/// A vehicle registration plate captured at check-in.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CarPlate {
    number: String,
    province: String,
}

impl CarPlate {
    /// Creates a plate after validation. Surrounding whitespace is trimmed.
    pub fn new(
        number: impl Into<String>,
        province: impl Into<String>,
    ) -> Result<Self, ValidationError> {
        let number = number.into().trim().to_string();
        let province = province.into().trim().to_string();
        if number.is_empty() {
            return Err(ValidationError::Empty {
                field: "car plate number",
            });
        }
        if province.is_empty() {
            return Err(ValidationError::Empty {
                field: "car plate province",
            });
        }
        Ok(Self { number, province })
    }

    pub fn number(&self) -> &str {
        &self.number
    }

    pub fn province(&self) -> &str {
        &self.province
    }
}

impl fmt::Display for CarPlate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.number, self.province)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ids_parse_and_display() {
        let id: SlotId = " 42 ".parse().expect("should parse");
        assert_eq!(id, SlotId::new(42));
        assert_eq!(id.to_string(), "42");
    }

    #[test]
    fn ids_reject_garbage() {
        let err = "abc".parse::<ParkId>().unwrap_err();
        assert_eq!(err.to_string(), "invalid park ID: abc");
    }

    #[test]
    fn ids_serialize_as_plain_integers() {
        let json = serde_json::to_string(&BuildingId::new(7)).unwrap();
        assert_eq!(json, "7");
    }

    #[test]
    fn plate_trims_and_validates() {
        let plate = CarPlate::new("  1กข 1234 ", "Bangkok").unwrap();
        assert_eq!(plate.number(), "1กข 1234");
        assert_eq!(plate.province(), "Bangkok");

        assert_eq!(
            CarPlate::new("", "Bangkok").unwrap_err(),
            ValidationError::Empty {
                field: "car plate number"
            }
        );
        assert_eq!(
            CarPlate::new("AB 1", "   ").unwrap_err(),
            ValidationError::Empty {
                field: "car plate province"
            }
        );
    }
}
