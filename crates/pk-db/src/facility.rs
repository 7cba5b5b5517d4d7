//! Parks and buildings.

use chrono::Utc;
use pk_core::{BuildingId, FeePolicy, ParkId, ValidationError};
use rusqlite::{Connection, OptionalExtension, Row, TransactionBehavior, params};

use crate::slots::insert_slots;
use crate::{
    Building, Database, DbError, NewBuilding, NewPark, Park, ParkSummary, format_amount,
    format_timestamp, parse_amount,
};

const PARK_COLUMNS: &str = "parks.id, parks.name, parks.description, parks.latitude, \
    parks.longitude, parks.cost_description, parks.fixed_first_period, \
    parks.fixed_first_period_cost, parks.hourly_cost";

/// Capacity ignores closed slots; vacancy counts vacant ones. Both skip deleted rows.
const PARK_COUNTS: &str = "
    (SELECT COUNT(*) FROM slots
        JOIN buildings ON buildings.id = slots.building_id
        WHERE buildings.park_id = parks.id
            AND buildings.deleted_at IS NULL
            AND slots.deleted_at IS NULL
            AND slots.status != 'closed') AS capacity,
    (SELECT COUNT(*) FROM slots
        JOIN buildings ON buildings.id = slots.building_id
        WHERE buildings.park_id = parks.id
            AND buildings.deleted_at IS NULL
            AND slots.deleted_at IS NULL
            AND slots.status = 'vacant') AS vacancy";

const BUILDING_COLUMNS: &str = "buildings.id, buildings.park_id, buildings.name, buildings.description";

#[derive(Debug)]
struct ParkRow {
    id: ParkId,
    name: String,
    description: Option<String>,
    latitude: f64,
    longitude: f64,
    cost_description: Option<String>,
    fixed_first_period: i64,
    fixed_first_period_cost: String,
    hourly_cost: String,
}

impl ParkRow {
    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get(0)?,
            name: row.get(1)?,
            description: row.get(2)?,
            latitude: row.get(3)?,
            longitude: row.get(4)?,
            cost_description: row.get(5)?,
            fixed_first_period: row.get(6)?,
            fixed_first_period_cost: row.get(7)?,
            hourly_cost: row.get(8)?,
        })
    }

    fn into_park(self) -> Result<Park, DbError> {
        let id = self.id.get();
        Ok(Park {
            fee_policy: FeePolicy {
                fixed_first_period: self.fixed_first_period,
                fixed_first_period_cost: parse_amount(&self.fixed_first_period_cost, "parks", id)?,
                hourly_cost: parse_amount(&self.hourly_cost, "parks", id)?,
            },
            id: self.id,
            name: self.name,
            description: self.description,
            latitude: self.latitude,
            longitude: self.longitude,
            cost_description: self.cost_description,
        })
    }
}

fn building_from_row(row: &Row<'_>) -> rusqlite::Result<Building> {
    Ok(Building {
        id: row.get(0)?,
        park_id: row.get(1)?,
        name: row.get(2)?,
        description: row.get(3)?,
    })
}

fn require_text(value: &str, field: &'static str) -> Result<(), ValidationError> {
    if value.trim().is_empty() {
        return Err(ValidationError::Empty { field });
    }
    Ok(())
}

fn validate_building(building: &NewBuilding) -> Result<(), ValidationError> {
    require_text(&building.name, "building name")?;
    for slot in &building.slots {
        require_text(&slot.label, "slot label")?;
        require_text(&slot.floor, "slot floor")?;
    }
    Ok(())
}

impl Database {
    /// Creates a park together with any nested buildings and slots.
    pub fn create_park(&mut self, park: &NewPark) -> Result<Park, DbError> {
        require_text(&park.name, "park name")?;
        park.fee_policy.validate()?;
        for building in &park.buildings {
            validate_building(building)?;
        }
        tracing::info!(name = %park.name, buildings = park.buildings.len(), "creating park");

        let now = format_timestamp(Utc::now());
        let tx = self.conn.transaction()?;
        tx.execute(
            "
            INSERT INTO parks
            (created_at, updated_at, name, description, latitude, longitude, cost_description,
             fixed_first_period, fixed_first_period_cost, hourly_cost)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            ",
            params![
                now,
                now,
                park.name.trim(),
                park.description,
                park.latitude,
                park.longitude,
                park.cost_description,
                park.fee_policy.fixed_first_period,
                format_amount(park.fee_policy.fixed_first_period_cost),
                format_amount(park.fee_policy.hourly_cost),
            ],
        )?;
        let park_id = ParkId::new(tx.last_insert_rowid());
        for building in &park.buildings {
            insert_building(&tx, park_id, building, &now)?;
        }
        let created = query_park(&tx, park_id)?
            .ok_or_else(|| DbError::not_found("park", "id", park_id))?;
        tx.commit()?;
        Ok(created)
    }

    /// Returns a park with its capacity and vacancy.
    pub fn get_park(&self, park_id: ParkId) -> Result<ParkSummary, DbError> {
        tracing::debug!(%park_id, "getting park");
        let sql = format!(
            "SELECT {PARK_COLUMNS}, {PARK_COUNTS} FROM parks WHERE parks.id = ? AND parks.deleted_at IS NULL"
        );
        let row = self
            .conn
            .query_row(&sql, [park_id], |row| {
                Ok((ParkRow::from_row(row)?, row.get(9)?, row.get(10)?))
            })
            .optional()?;
        let Some((park, capacity, vacancy)) = row else {
            return Err(DbError::not_found("park", "id", park_id));
        };
        Ok(ParkSummary {
            park: park.into_park()?,
            capacity,
            vacancy,
        })
    }

    /// Lists parks ordered by ID, optionally only those with a vacant slot.
    pub fn list_parks(&self, only_vacant: bool) -> Result<Vec<ParkSummary>, DbError> {
        tracing::debug!(only_vacant, "listing parks");
        let sql = format!(
            "SELECT {PARK_COLUMNS}, {PARK_COUNTS} FROM parks WHERE parks.deleted_at IS NULL ORDER BY parks.id ASC"
        );
        let mut stmt = self.conn.prepare(&sql)?;
        let rows = stmt.query_map([], |row| {
            Ok((ParkRow::from_row(row)?, row.get(9)?, row.get(10)?))
        })?;
        let mut parks = Vec::new();
        for row in rows {
            let (park, capacity, vacancy) = row?;
            if only_vacant && vacancy == 0 {
                continue;
            }
            parks.push(ParkSummary {
                park: park.into_park()?,
                capacity,
                vacancy,
            });
        }
        Ok(parks)
    }

    /// Deletes a park with its buildings and slots in one transaction.
    ///
    /// Returns the park as it was before deletion.
    pub fn delete_park(&mut self, park_id: ParkId) -> Result<Park, DbError> {
        tracing::info!(%park_id, "deleting park");
        let now = format_timestamp(Utc::now());
        let tx = self.conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
        let park = query_park(&tx, park_id)?
            .ok_or_else(|| DbError::not_found("park", "id", park_id))?;
        let slots = tx.execute(
            "
            UPDATE slots SET deleted_at = ?1, updated_at = ?1
            WHERE deleted_at IS NULL
                AND building_id IN (SELECT id FROM buildings WHERE park_id = ?2)
            ",
            params![now, park_id],
        )?;
        let buildings = tx.execute(
            "UPDATE buildings SET deleted_at = ?1, updated_at = ?1 WHERE park_id = ?2 AND deleted_at IS NULL",
            params![now, park_id],
        )?;
        tx.execute(
            "UPDATE parks SET deleted_at = ?1, updated_at = ?1 WHERE id = ?2",
            params![now, park_id],
        )?;
        tx.commit()?;
        tracing::debug!(%park_id, buildings, slots, "park deleted");
        Ok(park)
    }

    /// Adds a building, with any nested slots, to an existing park.
    pub fn create_building(
        &mut self,
        park_id: ParkId,
        building: &NewBuilding,
    ) -> Result<Building, DbError> {
        validate_building(building)?;
        tracing::info!(%park_id, name = %building.name, slots = building.slots.len(), "creating building");
        let now = format_timestamp(Utc::now());
        let tx = self.conn.transaction()?;
        if query_park(&tx, park_id)?.is_none() {
            return Err(DbError::not_found("park", "id", park_id));
        }
        let created = insert_building(&tx, park_id, building, &now)?;
        tx.commit()?;
        Ok(created)
    }

    pub fn get_building(&self, building_id: BuildingId) -> Result<Building, DbError> {
        query_building(&self.conn, building_id)?
            .ok_or_else(|| DbError::not_found("building", "id", building_id))
    }

    /// Lists a park's buildings ordered by ID.
    pub fn list_buildings(&self, park_id: ParkId) -> Result<Vec<Building>, DbError> {
        let sql = format!(
            "SELECT {BUILDING_COLUMNS} FROM buildings WHERE park_id = ? AND deleted_at IS NULL ORDER BY id ASC"
        );
        let mut stmt = self.conn.prepare(&sql)?;
        let rows = stmt.query_map([park_id], building_from_row)?;
        let mut buildings = Vec::new();
        for row in rows {
            buildings.push(row?);
        }
        Ok(buildings)
    }

    /// Deletes a building and its slots in one transaction.
    pub fn delete_building(&mut self, building_id: BuildingId) -> Result<Building, DbError> {
        tracing::info!(%building_id, "deleting building");
        let now = format_timestamp(Utc::now());
        let tx = self.conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
        let building = query_building(&tx, building_id)?
            .ok_or_else(|| DbError::not_found("building", "id", building_id))?;
        let slots = tx.execute(
            "UPDATE slots SET deleted_at = ?1, updated_at = ?1 WHERE building_id = ?2 AND deleted_at IS NULL",
            params![now, building_id],
        )?;
        tx.execute(
            "UPDATE buildings SET deleted_at = ?1, updated_at = ?1 WHERE id = ?2",
            params![now, building_id],
        )?;
        tx.commit()?;
        tracing::debug!(%building_id, slots, "building deleted");
        Ok(building)
    }
}

fn insert_building(
    conn: &Connection,
    park_id: ParkId,
    building: &NewBuilding,
    now: &str,
) -> Result<Building, DbError> {
    conn.execute(
        "
        INSERT INTO buildings (created_at, updated_at, park_id, name, description)
        VALUES (?, ?, ?, ?, ?)
        ",
        params![now, now, park_id, building.name.trim(), building.description],
    )?;
    let building_id = BuildingId::new(conn.last_insert_rowid());
    insert_slots(conn, building_id, &building.slots, now)?;
    query_building(conn, building_id)?
        .ok_or_else(|| DbError::not_found("building", "id", building_id))
}

/// Looks up a live park.
pub(crate) fn query_park(conn: &Connection, park_id: ParkId) -> Result<Option<Park>, DbError> {
    let sql = format!("SELECT {PARK_COLUMNS} FROM parks WHERE id = ? AND deleted_at IS NULL");
    conn.query_row(&sql, [park_id], ParkRow::from_row)
        .optional()?
        .map(ParkRow::into_park)
        .transpose()
}

/// Looks up a live building whose park is also live.
pub(crate) fn query_building(
    conn: &Connection,
    building_id: BuildingId,
) -> Result<Option<Building>, DbError> {
    let sql = format!(
        "
        SELECT {BUILDING_COLUMNS}
        FROM buildings
        JOIN parks ON parks.id = buildings.park_id
        WHERE buildings.id = ? AND buildings.deleted_at IS NULL AND parks.deleted_at IS NULL
        "
    );
    Ok(conn
        .query_row(&sql, [building_id], building_from_row)
        .optional()?)
}

/// Fee policy of the park a bill's slot belongs to.
///
/// Follows bill → slot → building → park without filtering deleted rows, so a
/// session left open on a deleted slot can still be closed.
pub(crate) fn fee_policy_for_bill(
    conn: &Connection,
    code: &str,
) -> Result<Option<FeePolicy>, DbError> {
    let row = conn
        .query_row(
            "
            SELECT parks.id, parks.fixed_first_period, parks.fixed_first_period_cost, parks.hourly_cost
            FROM bills
            JOIN slots ON slots.id = bills.slot_id
            JOIN buildings ON buildings.id = slots.building_id
            JOIN parks ON parks.id = buildings.park_id
            WHERE bills.code = ?
            ",
            [code],
            |row| {
                Ok((
                    row.get::<_, i64>(0)?,
                    row.get::<_, i64>(1)?,
                    row.get::<_, String>(2)?,
                    row.get::<_, String>(3)?,
                ))
            },
        )
        .optional()?;
    let Some((park_id, fixed_first_period, fixed_first_period_cost, hourly_cost)) = row else {
        return Ok(None);
    };
    Ok(Some(FeePolicy {
        fixed_first_period,
        fixed_first_period_cost: parse_amount(&fixed_first_period_cost, "parks", park_id)?,
        hourly_cost: parse_amount(&hourly_cost, "parks", park_id)?,
    }))
}
