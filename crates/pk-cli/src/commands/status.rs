//! Status command for showing service health and occupancy counts.

use std::io::Write;
use std::path::Path;

use anyhow::Result;

use pk_db::Database;

pub fn run<W: Write>(writer: &mut W, db: &Database, database_path: &Path) -> Result<()> {
    let summary = db.occupancy_summary()?;

    writeln!(writer, "pk {}", env!("CARGO_PKG_VERSION"))?;
    writeln!(writer, "Status: OK")?;
    writeln!(writer, "Database: {}", database_path.display())?;
    writeln!(writer, "Parks: {}", summary.parks)?;
    writeln!(writer, "Buildings: {}", summary.buildings)?;
    writeln!(
        writer,
        "Slots: {} vacant, {} occupied, {} closed",
        summary.vacant_slots, summary.occupied_slots, summary.closed_slots
    )?;
    writeln!(writer, "Open bills: {}", summary.open_bills)?;

    Ok(())
}
