//! Check-out command: closes a bill and frees its slot.

use std::io::Write;

use anyhow::Result;
use chrono::{DateTime, Utc};
use clap::Args;
use pk_db::Database;
use rust_decimal::Decimal;

use super::util::{write_bill, write_json};

#[derive(Debug, Args)]
pub struct CheckOutArgs {
    /// Code printed at check-in.
    pub code: String,

    /// Amount taken off the charge.
    #[arg(long, default_value_t = Decimal::ZERO)]
    pub discount: Decimal,

    /// Output as JSON.
    #[arg(long)]
    pub json: bool,
}

pub fn run<W: Write>(writer: &mut W, db: &mut Database, args: &CheckOutArgs) -> Result<()> {
    run_at(writer, db, args, Utc::now())
}

pub(crate) fn run_at<W: Write>(
    writer: &mut W,
    db: &mut Database,
    args: &CheckOutArgs,
    now: DateTime<Utc>,
) -> Result<()> {
    let bill = db.check_out_at(args.code.trim(), args.discount, now)?;
    if args.json {
        return write_json(writer, &bill);
    }
    writeln!(writer, "Checked out")?;
    write_bill(writer, &bill)
}
