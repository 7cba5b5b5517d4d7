//! Core domain logic for parking facilities.
//!
//! This crate contains the fundamental types and rules for:
//! - Slot occupancy: the `vacant`/`occupied`/`closed` state machine
//! - Billing: fee computation and bill code generation
//! - Allocation: the scopes a vacant slot can be picked from
//! - Reporting: bucketing sessions into calendar periods in the billing time zone

pub mod allocation;
pub mod billing;
pub mod report;
pub mod slot;
pub mod types;

pub use allocation::AllocationScope;
pub use billing::{FeePolicy, bill_code, elapsed_minutes, money};
pub use report::{ReportBucket, ReportError, ReportPeriod, ReportableBill, aggregate};
pub use slot::{OccupancyConflict, SlotStatus, SlotType, UnknownSlotStatus, UnknownSlotType};
pub use types::{BillId, BuildingId, CarPlate, ParkId, SlotId, ValidationError};
