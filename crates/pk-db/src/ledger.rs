//! Bill ledger: check-in and check-out.
//!
//! Both operations run inside a `BEGIN IMMEDIATE` transaction. The slot status
//! and the bill row are updated together or not at all.

use chrono::{DateTime, Utc};
use pk_core::{
    AllocationScope, BuildingId, CarPlate, ParkId, SlotId, SlotType, bill_code, elapsed_minutes,
};
use rusqlite::{Connection, OptionalExtension, TransactionBehavior, params};
use rust_decimal::Decimal;

use crate::facility::{fee_policy_for_bill, query_building, query_park};
use crate::slots::{mark_occupied, mark_vacant, query_slot};
use crate::{
    BILL_COLUMNS, Bill, BillRow, BillWithSlot, Database, DbError, format_amount, format_timestamp,
};

impl Database {
    /// Opens a bill on a specific slot.
    pub fn check_in(&mut self, slot_id: SlotId, plate: &CarPlate) -> Result<BillWithSlot, DbError> {
        self.check_in_at(slot_id, plate, Utc::now())
    }

    /// Opens a bill on a specific slot, as of `now`.
    ///
    /// Fails with [`DbError::SlotOccupied`] or [`DbError::SlotClosed`] if the slot
    /// is not vacant, leaving everything unchanged.
    pub fn check_in_at(
        &mut self,
        slot_id: SlotId,
        plate: &CarPlate,
        now: DateTime<Utc>,
    ) -> Result<BillWithSlot, DbError> {
        tracing::debug!(%slot_id, %plate, "checking in");
        let tx = self
            .conn
            .transaction_with_behavior(TransactionBehavior::Immediate)?;

        let slot =
            query_slot(&tx, slot_id)?.ok_or_else(|| DbError::not_found("slot", "id", slot_id))?;
        let stamp = format_timestamp(now);
        let slot = mark_occupied(&tx, &slot, &stamp)?;
        if has_open_bill(&tx, slot_id)? {
            return Err(DbError::SlotOccupied { slot_id });
        }

        let code = bill_code(slot_id, now);
        tx.execute(
            "
            INSERT INTO bills
            (created_at, updated_at, slot_id, code, check_in_time,
             car_plate_number, car_plate_province, discount)
            VALUES (?1, ?1, ?2, ?3, ?1, ?4, ?5, ?6)
            ",
            params![
                stamp,
                slot_id,
                code,
                plate.number(),
                plate.province(),
                format_amount(Decimal::ZERO),
            ],
        )?;
        let bill =
            query_bill(&tx, &code)?.ok_or_else(|| DbError::not_found("bill", "code", &code))?;
        tx.commit()?;

        tracing::info!(code = %bill.code, %slot_id, %plate, "checked in");
        Ok(BillWithSlot { bill, slot })
    }

    /// Checks in to the first vacant slot of `slot_type` in a building.
    pub fn check_in_by_building(
        &mut self,
        building_id: BuildingId,
        slot_type: SlotType,
        plate: &CarPlate,
    ) -> Result<BillWithSlot, DbError> {
        self.check_in_by_building_at(building_id, slot_type, plate, Utc::now())
    }

    pub fn check_in_by_building_at(
        &mut self,
        building_id: BuildingId,
        slot_type: SlotType,
        plate: &CarPlate,
        now: DateTime<Utc>,
    ) -> Result<BillWithSlot, DbError> {
        if query_building(&self.conn, building_id)?.is_none() {
            return Err(DbError::not_found("building", "id", building_id));
        }
        self.check_in_within(AllocationScope::Building(building_id), slot_type, plate, now)
    }

    /// Checks in to the first vacant slot of `slot_type` anywhere in a park.
    pub fn check_in_by_park(
        &mut self,
        park_id: ParkId,
        slot_type: SlotType,
        plate: &CarPlate,
    ) -> Result<BillWithSlot, DbError> {
        self.check_in_by_park_at(park_id, slot_type, plate, Utc::now())
    }

    pub fn check_in_by_park_at(
        &mut self,
        park_id: ParkId,
        slot_type: SlotType,
        plate: &CarPlate,
        now: DateTime<Utc>,
    ) -> Result<BillWithSlot, DbError> {
        if query_park(&self.conn, park_id)?.is_none() {
            return Err(DbError::not_found("park", "id", park_id));
        }
        self.check_in_within(AllocationScope::Park(park_id), slot_type, plate, now)
    }

    fn check_in_within(
        &mut self,
        scope: AllocationScope,
        slot_type: SlotType,
        plate: &CarPlate,
        now: DateTime<Utc>,
    ) -> Result<BillWithSlot, DbError> {
        let slot = self
            .find_candidate(scope, slot_type)?
            .ok_or(DbError::NoVacantSlot { scope, slot_type })?;
        self.check_in_at(slot.id, plate, now)
    }

    /// Closes a bill, charging it under its park's fee policy.
    pub fn check_out(&mut self, code: &str, discount: Decimal) -> Result<Bill, DbError> {
        self.check_out_at(code, discount, Utc::now())
    }

    /// Closes a bill as of `now` and frees its slot.
    ///
    /// The amount is the park's charge for the elapsed whole minutes less
    /// `discount`, and may be negative.
    pub fn check_out_at(
        &mut self,
        code: &str,
        discount: Decimal,
        now: DateTime<Utc>,
    ) -> Result<Bill, DbError> {
        tracing::debug!(code, %discount, "checking out");
        let tx = self
            .conn
            .transaction_with_behavior(TransactionBehavior::Immediate)?;

        let bill = query_bill(&tx, code)?.ok_or_else(|| DbError::not_found("bill", "code", code))?;
        if !bill.is_open() {
            return Err(DbError::AlreadyCheckedOut {
                code: code.to_string(),
            });
        }
        let policy = fee_policy_for_bill(&tx, code)?.ok_or_else(|| DbError::BrokenOwnership {
            code: code.to_string(),
        })?;
        // Stored timestamps keep milliseconds, so compare at that precision.
        if now.timestamp_millis() <= bill.check_in_time.timestamp_millis() {
            return Err(DbError::CheckOutBeforeCheckIn {
                code: code.to_string(),
                check_in: format_timestamp(bill.check_in_time),
                check_out: format_timestamp(now),
            });
        }

        let elapsed = elapsed_minutes(bill.check_in_time, now);
        let amount = policy.amount(elapsed, discount);
        let stamp = format_timestamp(now);
        tx.execute(
            "
            UPDATE bills
            SET check_out_time = ?1, amount = ?2, discount = ?3, updated_at = ?1
            WHERE id = ?4 AND check_out_time IS NULL
            ",
            params![stamp, format_amount(amount), format_amount(discount), bill.id],
        )?;
        mark_vacant(&tx, bill.slot_id, &stamp)?;
        let closed =
            query_bill(&tx, code)?.ok_or_else(|| DbError::not_found("bill", "code", code))?;
        tx.commit()?;

        tracing::info!(code, elapsed_minutes = elapsed, %amount, "checked out");
        Ok(closed)
    }

    /// Returns a bill by its code, open or closed.
    pub fn get_bill(&self, code: &str) -> Result<Bill, DbError> {
        query_bill(&self.conn, code)?.ok_or_else(|| DbError::not_found("bill", "code", code))
    }
}

fn query_bill(conn: &Connection, code: &str) -> Result<Option<Bill>, DbError> {
    let sql = format!("SELECT {BILL_COLUMNS} FROM bills WHERE code = ? AND deleted_at IS NULL");
    conn.query_row(&sql, [code], BillRow::from_row)
        .optional()?
        .map(BillRow::into_bill)
        .transpose()
}

fn has_open_bill(conn: &Connection, slot_id: SlotId) -> Result<bool, DbError> {
    let open: i64 = conn.query_row(
        "
        SELECT COUNT(*) FROM bills
        WHERE slot_id = ? AND check_out_time IS NULL AND deleted_at IS NULL
        ",
        [slot_id],
        |row| row.get(0),
    )?;
    Ok(open > 0)
}
