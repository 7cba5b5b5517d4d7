//! Storage layer for parking facilities.
//!
//! Provides persistence for parks, buildings, slots and bills using `rusqlite`,
//! and runs every occupancy change as a single SQLite transaction.
//!
//! # Thread Safety
//!
//! The [`Database`] type wraps a `rusqlite::Connection`, which is `Send` but not `Sync`.
//! A `Database` instance can be moved between threads but cannot be shared
//! across threads without external synchronization.
//!
//! For concurrent callers, open one `Database` per thread against the same file.
//! Check-in and check-out take the write lock up front (`BEGIN IMMEDIATE`), so
//! two racing check-ins on one slot are serialized: the second one sees the slot
//! `occupied` and fails with a conflict. Waiting writers retry for the configured
//! busy timeout.
//!
//! # Schema
//!
//! ## Timestamp Format
//!
//! Timestamps are stored as TEXT in RFC 3339 format with millisecond precision
//! (e.g., `2024-01-15T10:30:00.000Z`), so lexicographic ordering matches
//! chronological ordering.
//!
//! ## Money
//!
//! Amounts are stored as decimal TEXT with two fractional digits (e.g., `40.00`)
//! and summed in Rust, never with SQL arithmetic.
//!
//! ## Soft Deletion
//!
//! Parks, buildings, slots and bills carry a `deleted_at` column. Rows are never
//! physically removed; every query states `deleted_at IS NULL` for the tables it
//! filters.

mod facility;
mod ledger;
mod report;
mod slots;

use std::path::Path;
use std::time::Duration;

use chrono::{DateTime, SecondsFormat, Utc};
use pk_core::{
    AllocationScope, BillId, BuildingId, FeePolicy, ParkId, ReportError, ReportableBill, SlotId,
    SlotStatus, SlotType, ValidationError,
};
use rusqlite::{Connection, Row};
use rust_decimal::Decimal;
use serde::Serialize;
use thiserror::Error;

/// How long a connection waits for a competing writer before giving up.
pub const DEFAULT_BUSY_TIMEOUT: Duration = Duration::from_secs(5);

/// Database errors.
#[derive(Debug, Error)]
pub enum DbError {
    /// An error from the underlying database.
    #[error("sqlite error: {0}")]
    Sqlite(#[from] rusqlite::Error),
    /// A referenced entity does not exist or has been deleted.
    #[error("{resource} with {key} '{value}' cannot be found")]
    NotFound {
        resource: &'static str,
        key: &'static str,
        value: String,
    },
    /// Check-in on a slot that already hosts a session.
    #[error("slot with id {slot_id} is occupied")]
    SlotOccupied { slot_id: SlotId },
    /// Check-in on a slot taken out of service.
    #[error("slot with id {slot_id} is closed")]
    SlotClosed { slot_id: SlotId },
    /// Check-out of a bill that is already closed.
    #[error("bill with code {code} has already been checked-out")]
    AlreadyCheckedOut { code: String },
    /// No vacant slot of the requested type in the scope.
    #[error("unable to check-in: no vacant {slot_type} slot in {scope}")]
    NoVacantSlot {
        scope: AllocationScope,
        slot_type: SlotType,
    },
    /// A bill whose slot, building or park row is missing.
    #[error("bill {code} cannot be traced to a park")]
    BrokenOwnership { code: String },
    /// Check-out would not come after check-in.
    #[error("check-out at {check_out} is not after check-in at {check_in} for bill {code}")]
    CheckOutBeforeCheckIn {
        code: String,
        check_in: String,
        check_out: String,
    },
    /// Input rejected before touching the database.
    #[error(transparent)]
    Validation(#[from] ValidationError),
    /// Failed to parse a stored timestamp.
    #[error("invalid timestamp in {table} row {id}: {timestamp}")]
    TimestampParse {
        table: &'static str,
        id: i64,
        timestamp: String,
        #[source]
        source: chrono::ParseError,
    },
    /// Failed to parse a stored amount.
    #[error("invalid amount in {table} row {id}: {value}")]
    AmountParse {
        table: &'static str,
        id: i64,
        value: String,
        #[source]
        source: rust_decimal::Error,
    },
    /// Report bucketing failed.
    #[error(transparent)]
    Report(#[from] ReportError),
}

/// Coarse classification of a [`DbError`], as surfaced to callers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// The referenced resource does not exist.
    NotFound,
    /// The request is valid but the current state forbids it.
    Conflict,
    /// The input was rejected.
    Invalid,
    /// An invariant was violated or the store failed.
    Internal,
}

impl DbError {
    pub const fn kind(&self) -> ErrorKind {
        match self {
            Self::NotFound { .. } => ErrorKind::NotFound,
            Self::SlotOccupied { .. }
            | Self::SlotClosed { .. }
            | Self::AlreadyCheckedOut { .. } => ErrorKind::Conflict,
            Self::Validation(_) => ErrorKind::Invalid,
            Self::Sqlite(_)
            | Self::NoVacantSlot { .. }
            | Self::BrokenOwnership { .. }
            | Self::CheckOutBeforeCheckIn { .. }
            | Self::TimestampParse { .. }
            | Self::AmountParse { .. }
            | Self::Report(_) => ErrorKind::Internal,
        }
    }

    fn not_found(resource: &'static str, key: &'static str, value: impl ToString) -> Self {
        Self::NotFound {
            resource,
            key,
            value: value.to_string(),
        }
    }
}

/// Database connection wrapper.
///
/// See the [module documentation](self) for thread safety considerations.
pub struct Database {
    conn: Connection,
}

/// A park with its pricing.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Park {
    pub id: ParkId,
    pub name: String,
    pub description: Option<String>,
    pub latitude: f64,
    pub longitude: f64,
    pub cost_description: Option<String>,
    #[serde(flatten)]
    pub fee_policy: FeePolicy,
}

/// A park with its derived slot counts.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ParkSummary {
    #[serde(flatten)]
    pub park: Park,
    /// Slots that are not closed.
    pub capacity: i64,
    /// Slots that are vacant.
    pub vacancy: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Building {
    pub id: BuildingId,
    pub park_id: ParkId,
    pub name: String,
    pub description: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Slot {
    pub id: SlotId,
    pub building_id: BuildingId,
    pub label: String,
    pub floor: String,
    #[serde(rename = "type")]
    pub slot_type: SlotType,
    pub status: SlotStatus,
}

/// One occupancy session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Bill {
    pub id: BillId,
    pub code: String,
    pub slot_id: SlotId,
    pub check_in_time: DateTime<Utc>,
    pub check_out_time: Option<DateTime<Utc>>,
    pub car_plate_number: String,
    pub car_plate_province: String,
    /// Unset while the session is open.
    pub amount: Option<Decimal>,
    pub discount: Decimal,
}

impl Bill {
    pub const fn is_open(&self) -> bool {
        self.check_out_time.is_none()
    }
}

impl ReportableBill for Bill {
    fn check_in_time(&self) -> DateTime<Utc> {
        self.check_in_time
    }

    fn check_out_time(&self) -> Option<DateTime<Utc>> {
        self.check_out_time
    }

    fn amount(&self) -> Option<Decimal> {
        self.amount
    }
}

/// A freshly opened bill together with the slot it occupies.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BillWithSlot {
    #[serde(flatten)]
    pub bill: Bill,
    pub slot: Slot,
}

/// Input for a new park, optionally with buildings and slots.
#[derive(Debug, Clone, PartialEq)]
pub struct NewPark {
    pub name: String,
    pub description: Option<String>,
    pub latitude: f64,
    pub longitude: f64,
    pub cost_description: Option<String>,
    pub fee_policy: FeePolicy,
    pub buildings: Vec<NewBuilding>,
}

/// Input for a new building, optionally with slots.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewBuilding {
    pub name: String,
    pub description: Option<String>,
    pub slots: Vec<NewSlot>,
}

/// Input for a new slot. New slots always start vacant.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewSlot {
    pub label: String,
    pub floor: String,
    pub slot_type: SlotType,
}

/// Counts reported by the status command.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct OccupancySummary {
    pub parks: i64,
    pub buildings: i64,
    pub vacant_slots: i64,
    pub occupied_slots: i64,
    pub closed_slots: i64,
    pub open_bills: i64,
}

impl Database {
    /// Opens a database at the given path, creating it if necessary.
    ///
    /// The database schema is automatically initialized on first open.
    pub fn open(path: &Path) -> Result<Self, DbError> {
        Self::open_with_busy_timeout(path, DEFAULT_BUSY_TIMEOUT)
    }

    /// Opens a database, waiting up to `busy_timeout` for competing writers.
    pub fn open_with_busy_timeout(path: &Path, busy_timeout: Duration) -> Result<Self, DbError> {
        let conn = Connection::open(path)?;
        conn.busy_timeout(busy_timeout)?;
        let db = Self { conn };
        db.init()?;
        Ok(db)
    }

    /// Opens an in-memory database.
    ///
    /// Useful for testing. The database is destroyed when the connection closes.
    pub fn open_in_memory() -> Result<Self, DbError> {
        let conn = Connection::open_in_memory()?;
        let db = Self { conn };
        db.init()?;
        Ok(db)
    }

    /// Initializes the database schema.
    ///
    /// This is idempotent - safe to call on an already-initialized database.
    fn init(&self) -> Result<(), DbError> {
        self.conn.execute_batch("PRAGMA foreign_keys = ON;")?;
        self.conn.execute_batch(
            "
            CREATE TABLE IF NOT EXISTS parks (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                created_at TEXT NOT NULL,
                updated_at TEXT NOT NULL,
                deleted_at TEXT,
                name TEXT NOT NULL,
                description TEXT,
                latitude REAL NOT NULL,
                longitude REAL NOT NULL,
                cost_description TEXT,
                fixed_first_period INTEGER NOT NULL DEFAULT 0 CHECK (fixed_first_period >= 0),
                fixed_first_period_cost TEXT NOT NULL DEFAULT '0.00',
                hourly_cost TEXT NOT NULL DEFAULT '0.00'
            );

            CREATE TABLE IF NOT EXISTS buildings (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                created_at TEXT NOT NULL,
                updated_at TEXT NOT NULL,
                deleted_at TEXT,
                park_id INTEGER NOT NULL,
                name TEXT NOT NULL,
                description TEXT,
                FOREIGN KEY (park_id) REFERENCES parks(id)
            );

            CREATE INDEX IF NOT EXISTS idx_buildings_park ON buildings(park_id);

            -- type: one of car, motorcycle, bicycle, large, xlarge
            -- status: one of vacant, occupied, closed
            CREATE TABLE IF NOT EXISTS slots (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                created_at TEXT NOT NULL,
                updated_at TEXT NOT NULL,
                deleted_at TEXT,
                building_id INTEGER NOT NULL,
                label TEXT NOT NULL,
                floor TEXT NOT NULL DEFAULT '1',
                type TEXT NOT NULL DEFAULT 'car'
                    CHECK (type IN ('car', 'motorcycle', 'bicycle', 'large', 'xlarge')),
                status TEXT NOT NULL DEFAULT 'vacant'
                    CHECK (status IN ('vacant', 'occupied', 'closed')),
                FOREIGN KEY (building_id) REFERENCES buildings(id)
            );

            CREATE INDEX IF NOT EXISTS idx_slots_building ON slots(building_id);
            CREATE INDEX IF NOT EXISTS idx_slots_status_type ON slots(status, type);

            -- check_out_time, amount: NULL while the session is open
            CREATE TABLE IF NOT EXISTS bills (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                created_at TEXT NOT NULL,
                updated_at TEXT NOT NULL,
                deleted_at TEXT,
                slot_id INTEGER NOT NULL,
                code TEXT NOT NULL,
                check_in_time TEXT NOT NULL,
                check_out_time TEXT,
                car_plate_number TEXT NOT NULL,
                car_plate_province TEXT NOT NULL,
                amount TEXT,
                discount TEXT NOT NULL DEFAULT '0.00',
                CHECK (check_out_time IS NULL OR check_out_time > check_in_time),
                FOREIGN KEY (slot_id) REFERENCES slots(id)
            );

            CREATE INDEX IF NOT EXISTS idx_bills_slot ON bills(slot_id);
            CREATE UNIQUE INDEX IF NOT EXISTS idx_bills_code ON bills(code);
            CREATE UNIQUE INDEX IF NOT EXISTS idx_bills_open_slot
                ON bills(slot_id) WHERE check_out_time IS NULL AND deleted_at IS NULL;
            ",
        )?;
        Ok(())
    }

    /// Counts facilities, slots by status and open sessions.
    pub fn occupancy_summary(&self) -> Result<OccupancySummary, DbError> {
        let mut summary = OccupancySummary {
            parks: self.conn.query_row(
                "SELECT COUNT(*) FROM parks WHERE deleted_at IS NULL",
                [],
                |row| row.get(0),
            )?,
            buildings: self.conn.query_row(
                "SELECT COUNT(*) FROM buildings WHERE deleted_at IS NULL",
                [],
                |row| row.get(0),
            )?,
            open_bills: self.conn.query_row(
                "SELECT COUNT(*) FROM bills WHERE check_out_time IS NULL AND deleted_at IS NULL",
                [],
                |row| row.get(0),
            )?,
            ..OccupancySummary::default()
        };

        let mut stmt = self.conn.prepare(
            "
            SELECT status, COUNT(*)
            FROM slots
            WHERE deleted_at IS NULL
            GROUP BY status
            ",
        )?;
        let rows = stmt.query_map([], |row| {
            let status: SlotStatus = row.get(0)?;
            let count: i64 = row.get(1)?;
            Ok((status, count))
        })?;
        for row in rows {
            let (status, count) = row?;
            match status {
                SlotStatus::Vacant => summary.vacant_slots = count,
                SlotStatus::Occupied => summary.occupied_slots = count,
                SlotStatus::Closed => summary.closed_slots = count,
            }
        }
        Ok(summary)
    }
}

const SLOT_COLUMNS: &str =
    "slots.id, slots.building_id, slots.label, slots.floor, slots.type, slots.status";

fn slot_from_row(row: &Row<'_>) -> rusqlite::Result<Slot> {
    Ok(Slot {
        id: row.get(0)?,
        building_id: row.get(1)?,
        label: row.get(2)?,
        floor: row.get(3)?,
        slot_type: row.get(4)?,
        status: row.get(5)?,
    })
}

const BILL_COLUMNS: &str = "bills.id, bills.code, bills.slot_id, bills.check_in_time, \
    bills.check_out_time, bills.car_plate_number, bills.car_plate_province, bills.amount, \
    bills.discount";

/// A bill row as stored, before timestamps and amounts are parsed.
#[derive(Debug)]
struct BillRow {
    id: BillId,
    code: String,
    slot_id: SlotId,
    check_in_time: String,
    check_out_time: Option<String>,
    car_plate_number: String,
    car_plate_province: String,
    amount: Option<String>,
    discount: String,
}

impl BillRow {
    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get(0)?,
            code: row.get(1)?,
            slot_id: row.get(2)?,
            check_in_time: row.get(3)?,
            check_out_time: row.get(4)?,
            car_plate_number: row.get(5)?,
            car_plate_province: row.get(6)?,
            amount: row.get(7)?,
            discount: row.get(8)?,
        })
    }

    fn into_bill(self) -> Result<Bill, DbError> {
        let id = self.id.get();
        Ok(Bill {
            check_in_time: parse_timestamp(&self.check_in_time, "bills", id)?,
            check_out_time: self
                .check_out_time
                .as_deref()
                .map(|timestamp| parse_timestamp(timestamp, "bills", id))
                .transpose()?,
            amount: self
                .amount
                .as_deref()
                .map(|value| parse_amount(value, "bills", id))
                .transpose()?,
            discount: parse_amount(&self.discount, "bills", id)?,
            id: self.id,
            code: self.code,
            slot_id: self.slot_id,
            car_plate_number: self.car_plate_number,
            car_plate_province: self.car_plate_province,
        })
    }
}

fn collect_bills(
    rows: impl Iterator<Item = rusqlite::Result<BillRow>>,
) -> Result<Vec<Bill>, DbError> {
    let mut bills = Vec::new();
    for row in rows {
        bills.push(row?.into_bill()?);
    }
    Ok(bills)
}

fn parse_timestamp(
    timestamp: &str,
    table: &'static str,
    id: i64,
) -> Result<DateTime<Utc>, DbError> {
    DateTime::parse_from_rfc3339(timestamp)
        .map(|parsed| parsed.with_timezone(&Utc))
        .map_err(|source| DbError::TimestampParse {
            table,
            id,
            timestamp: timestamp.to_string(),
            source,
        })
}

fn format_timestamp(timestamp: DateTime<Utc>) -> String {
    timestamp.to_rfc3339_opts(SecondsFormat::Millis, true)
}

fn parse_amount(value: &str, table: &'static str, id: i64) -> Result<Decimal, DbError> {
    value
        .parse::<Decimal>()
        .map_err(|source| DbError::AmountParse {
            table,
            id,
            value: value.to_string(),
            source,
        })
}

fn format_amount(value: Decimal) -> String {
    pk_core::money(value).to_string()
}

#[cfg(test)]
pub(crate) mod fixtures {
    use chrono::{DateTime, TimeZone, Utc};
    use pk_core::{CarPlate, FeePolicy, SlotType};
    use rust_decimal_macros::dec;

    use crate::{Building, Database, NewBuilding, NewPark, NewSlot, Park, Slot};

    /// One park with two buildings: A holds car slots A1, A2 and motorcycle M1,
    /// B holds car slot B1.
    pub struct Seeded {
        pub park: Park,
        pub building_a: Building,
        pub building_b: Building,
        pub car_a1: Slot,
        pub car_a2: Slot,
        pub motorcycle_a: Slot,
        pub car_b1: Slot,
    }

    /// 20.00 for the first hour, then 10.00 per started hour.
    pub fn fee_policy() -> FeePolicy {
        FeePolicy::new(60, dec!(20), dec!(10)).unwrap()
    }

    pub fn new_slot(label: &str, slot_type: SlotType) -> NewSlot {
        NewSlot {
            label: label.to_string(),
            floor: "1".to_string(),
            slot_type,
        }
    }

    pub fn new_building(name: &str, slots: Vec<NewSlot>) -> NewBuilding {
        NewBuilding {
            name: name.to_string(),
            description: None,
            slots,
        }
    }

    pub fn new_park(name: &str, buildings: Vec<NewBuilding>) -> NewPark {
        NewPark {
            name: name.to_string(),
            description: Some("Downtown".to_string()),
            latitude: 13.7563,
            longitude: 100.5018,
            cost_description: Some("20 for the first hour".to_string()),
            fee_policy: fee_policy(),
            buildings,
        }
    }

    pub fn seed(db: &mut Database) -> Seeded {
        let park = db
            .create_park(&new_park(
                "Central",
                vec![
                    new_building(
                        "A",
                        vec![
                            new_slot("A1", SlotType::Car),
                            new_slot("A2", SlotType::Car),
                            new_slot("M1", SlotType::Motorcycle),
                        ],
                    ),
                    new_building("B", vec![new_slot("B1", SlotType::Car)]),
                ],
            ))
            .expect("create park");
        let buildings = db.list_buildings(park.id).expect("list buildings");
        let slots_a = db.list_slots(buildings[0].id).expect("list slots");
        let slots_b = db.list_slots(buildings[1].id).expect("list slots");
        Seeded {
            park,
            building_a: buildings[0].clone(),
            building_b: buildings[1].clone(),
            car_a1: slots_a[0].clone(),
            car_a2: slots_a[1].clone(),
            motorcycle_a: slots_a[2].clone(),
            car_b1: slots_b[0].clone(),
        }
    }

    pub fn plate() -> CarPlate {
        CarPlate::new("1กข 1234", "Bangkok").unwrap()
    }

    pub fn utc(year: i32, month: u32, day: u32, hour: u32, minute: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(year, month, day, hour, minute, 0).unwrap()
    }
}
