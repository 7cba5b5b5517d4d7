//! Revenue reports over stored bills.

use pk_core::{ParkId, ReportBucket, ReportPeriod, aggregate};

use crate::facility::query_park;
use crate::{BILL_COLUMNS, Bill, BillRow, Database, DbError, collect_bills};

impl Database {
    /// Buckets a park's bills by `period`.
    ///
    /// An unknown or deleted park yields an empty report.
    pub fn generate_report(
        &self,
        park_id: ParkId,
        period: ReportPeriod,
    ) -> Result<Vec<ReportBucket>, DbError> {
        let Some(park) = query_park(&self.conn, park_id)? else {
            tracing::debug!(%park_id, "report for unknown park");
            return Ok(Vec::new());
        };
        let bills = self.park_bills(park_id)?;
        tracing::debug!(%park_id, %period, bills = bills.len(), "generating report");
        Ok(aggregate(park.id, &park.name, period, bills)?)
    }

    /// All live bills issued on the park's live slots, ordered by check-in.
    ///
    /// Deleting a slot or building drops its bills from reports.
    pub fn park_bills(&self, park_id: ParkId) -> Result<Vec<Bill>, DbError> {
        let sql = format!(
            "
            SELECT {BILL_COLUMNS}
            FROM bills
            JOIN slots ON slots.id = bills.slot_id
            JOIN buildings ON buildings.id = slots.building_id
            JOIN parks ON parks.id = buildings.park_id
            WHERE parks.id = ?
                AND parks.deleted_at IS NULL
                AND buildings.deleted_at IS NULL
                AND slots.deleted_at IS NULL
                AND bills.deleted_at IS NULL
            ORDER BY bills.check_in_time ASC, bills.id ASC
            "
        );
        let mut stmt = self.conn.prepare(&sql)?;
        let rows = stmt.query_map([park_id], BillRow::from_row)?;
        collect_bills(rows)
    }
}
