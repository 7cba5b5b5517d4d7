//! Slot registry: creation, lookup, allocation and status transitions.

use chrono::Utc;
use pk_core::{
    AllocationScope, BuildingId, OccupancyConflict, SlotId, SlotStatus, SlotType,
    ValidationError,
};
use rusqlite::{Connection, OptionalExtension, TransactionBehavior, params};

use crate::facility::query_building;
use crate::{Database, DbError, NewSlot, SLOT_COLUMNS, Slot, format_timestamp, slot_from_row};

impl Database {
    /// Returns a live slot whose building and park are also live.
    pub fn get_slot(&self, slot_id: SlotId) -> Result<Slot, DbError> {
        query_slot(&self.conn, slot_id)?.ok_or_else(|| DbError::not_found("slot", "id", slot_id))
    }

    /// Lists a building's slots ordered by ID.
    pub fn list_slots(&self, building_id: BuildingId) -> Result<Vec<Slot>, DbError> {
        let sql = format!(
            "SELECT {SLOT_COLUMNS} FROM slots WHERE building_id = ? AND deleted_at IS NULL ORDER BY id ASC"
        );
        let mut stmt = self.conn.prepare(&sql)?;
        let rows = stmt.query_map([building_id], slot_from_row)?;
        let mut slots = Vec::new();
        for row in rows {
            slots.push(row?);
        }
        Ok(slots)
    }

    /// Adds vacant slots to an existing building.
    pub fn create_slots(
        &mut self,
        building_id: BuildingId,
        slots: &[NewSlot],
    ) -> Result<Vec<Slot>, DbError> {
        for slot in slots {
            if slot.label.trim().is_empty() {
                return Err(ValidationError::Empty { field: "slot label" }.into());
            }
            if slot.floor.trim().is_empty() {
                return Err(ValidationError::Empty { field: "slot floor" }.into());
            }
        }
        tracing::info!(%building_id, count = slots.len(), "creating slots");
        let now = format_timestamp(Utc::now());
        let tx = self.conn.transaction()?;
        if query_building(&tx, building_id)?.is_none() {
            return Err(DbError::not_found("building", "id", building_id));
        }
        let created = insert_slots(&tx, building_id, slots, &now)?;
        tx.commit()?;
        Ok(created)
    }

    /// First vacant slot of `slot_type` within the scope, lowest ID first.
    ///
    /// Only a hint: the slot may be taken before check-in runs, in which case
    /// check-in fails with a conflict.
    pub fn find_candidate(
        &self,
        scope: AllocationScope,
        slot_type: SlotType,
    ) -> Result<Option<Slot>, DbError> {
        let scope_filter = match scope {
            AllocationScope::Building(_) => "buildings.id = ?2",
            AllocationScope::Park(_) => "buildings.park_id = ?2",
        };
        let sql = format!(
            "
            SELECT {SLOT_COLUMNS}
            FROM slots
            JOIN buildings ON buildings.id = slots.building_id
            JOIN parks ON parks.id = buildings.park_id
            WHERE slots.status = 'vacant'
                AND slots.type = ?1
                AND {scope_filter}
                AND slots.deleted_at IS NULL
                AND buildings.deleted_at IS NULL
                AND parks.deleted_at IS NULL
            ORDER BY slots.id ASC
            LIMIT 1
            "
        );
        let candidate = self
            .conn
            .query_row(&sql, params![slot_type, scope.id()], slot_from_row)
            .optional()?;
        tracing::debug!(%scope, %slot_type, slot_id = ?candidate.as_ref().map(|s| s.id), "candidate lookup");
        Ok(candidate)
    }

    /// Puts a slot back into service as vacant.
    pub fn open_slot(&mut self, slot_id: SlotId) -> Result<Slot, DbError> {
        self.force_status(slot_id, SlotStatus::Vacant)
    }

    /// Takes a slot out of service.
    pub fn close_slot(&mut self, slot_id: SlotId) -> Result<Slot, DbError> {
        self.force_status(slot_id, SlotStatus::Closed)
    }

    /// Soft-deletes a slot. An open bill on it stays open.
    pub fn delete_slot(&mut self, slot_id: SlotId) -> Result<Slot, DbError> {
        tracing::info!(%slot_id, "deleting slot");
        let now = format_timestamp(Utc::now());
        let tx = self.conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
        let slot =
            query_slot(&tx, slot_id)?.ok_or_else(|| DbError::not_found("slot", "id", slot_id))?;
        if slot.status == SlotStatus::Occupied {
            tracing::warn!(%slot_id, "deleting an occupied slot");
        }
        tx.execute(
            "UPDATE slots SET deleted_at = ?1, updated_at = ?1 WHERE id = ?2",
            params![now, slot_id],
        )?;
        tx.commit()?;
        Ok(slot)
    }

    fn force_status(&mut self, slot_id: SlotId, status: SlotStatus) -> Result<Slot, DbError> {
        tracing::info!(%slot_id, %status, "setting slot status");
        let now = format_timestamp(Utc::now());
        let tx = self.conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
        let slot =
            query_slot(&tx, slot_id)?.ok_or_else(|| DbError::not_found("slot", "id", slot_id))?;
        if slot.status == SlotStatus::Occupied {
            tracing::warn!(%slot_id, %status, "overriding an occupied slot");
        }
        tx.execute(
            "UPDATE slots SET status = ?1, updated_at = ?2 WHERE id = ?3",
            params![status, now, slot_id],
        )?;
        tx.commit()?;
        Ok(Slot { status, ..slot })
    }
}

/// Inserts vacant slots for a building. The caller owns the transaction.
pub(crate) fn insert_slots(
    conn: &Connection,
    building_id: BuildingId,
    slots: &[NewSlot],
    now: &str,
) -> Result<Vec<Slot>, DbError> {
    let mut stmt = conn.prepare(
        "
        INSERT INTO slots (created_at, updated_at, building_id, label, floor, type, status)
        VALUES (?, ?, ?, ?, ?, ?, ?)
        ",
    )?;
    let mut created = Vec::with_capacity(slots.len());
    for slot in slots {
        stmt.execute(params![
            now,
            now,
            building_id,
            slot.label.trim(),
            slot.floor.trim(),
            slot.slot_type,
            SlotStatus::Vacant,
        ])?;
        created.push(Slot {
            id: SlotId::new(conn.last_insert_rowid()),
            building_id,
            label: slot.label.trim().to_string(),
            floor: slot.floor.trim().to_string(),
            slot_type: slot.slot_type,
            status: SlotStatus::Vacant,
        });
    }
    Ok(created)
}

/// Looks up a live slot in a live building and park.
pub(crate) fn query_slot(conn: &Connection, slot_id: SlotId) -> Result<Option<Slot>, DbError> {
    let sql = format!(
        "
        SELECT {SLOT_COLUMNS}
        FROM slots
        JOIN buildings ON buildings.id = slots.building_id
        JOIN parks ON parks.id = buildings.park_id
        WHERE slots.id = ?
            AND slots.deleted_at IS NULL
            AND buildings.deleted_at IS NULL
            AND parks.deleted_at IS NULL
        "
    );
    Ok(conn.query_row(&sql, [slot_id], slot_from_row).optional()?)
}

/// Marks a vacant slot occupied, or reports why it cannot be.
pub(crate) fn mark_occupied(conn: &Connection, slot: &Slot, now: &str) -> Result<Slot, DbError> {
    let status = slot.status.occupy().map_err(|conflict| match conflict {
        OccupancyConflict::Occupied => DbError::SlotOccupied { slot_id: slot.id },
        OccupancyConflict::Closed => DbError::SlotClosed { slot_id: slot.id },
    })?;
    let updated = conn.execute(
        "UPDATE slots SET status = ?1, updated_at = ?2 WHERE id = ?3 AND status = 'vacant'",
        params![status, now, slot.id],
    )?;
    if updated == 0 {
        return Err(DbError::SlotOccupied { slot_id: slot.id });
    }
    Ok(Slot {
        status,
        ..slot.clone()
    })
}

/// Releases a slot after check-out, whatever its current status.
pub(crate) fn mark_vacant(conn: &Connection, slot_id: SlotId, now: &str) -> Result<(), DbError> {
    conn.execute(
        "UPDATE slots SET status = ?1, updated_at = ?2 WHERE id = ?3",
        params![SlotStatus::Occupied.release(), now, slot_id],
    )?;
    Ok(())
}
