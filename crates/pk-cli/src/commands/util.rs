//! Shared formatting for CLI commands.

use std::io::Write;

use anyhow::Result;
use chrono::{DateTime, Utc};
use pk_core::report::billing_zone;
use pk_db::Bill;
use serde::Serialize;

/// Wall-clock time in the billing time zone, to the second.
pub fn format_local(timestamp: DateTime<Utc>) -> String {
    timestamp
        .with_timezone(&billing_zone())
        .format("%Y-%m-%d %H:%M:%S")
        .to_string()
}

/// Writes `value` as pretty-printed JSON followed by a newline.
pub fn write_json<W: Write, T: Serialize + ?Sized>(writer: &mut W, value: &T) -> Result<()> {
    writeln!(writer, "{}", serde_json::to_string_pretty(value)?)?;
    Ok(())
}

pub fn write_bill<W: Write>(writer: &mut W, bill: &Bill) -> Result<()> {
    writeln!(writer, "Bill {}", bill.code)?;
    writeln!(writer, "  Slot:      {}", bill.slot_id)?;
    writeln!(
        writer,
        "  Plate:     {} ({})",
        bill.car_plate_number, bill.car_plate_province
    )?;
    writeln!(writer, "  Check-in:  {}", format_local(bill.check_in_time))?;
    match (bill.check_out_time, bill.amount) {
        (Some(check_out), Some(amount)) => {
            writeln!(writer, "  Check-out: {}", format_local(check_out))?;
            writeln!(writer, "  Discount:  {}", bill.discount)?;
            writeln!(writer, "  Amount:    {amount}")?;
        }
        _ => writeln!(writer, "  Check-out: (open)")?,
    }
    Ok(())
}
