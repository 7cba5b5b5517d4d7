//! Revenue report command.

use std::io::Write;

use anyhow::Result;
use clap::Args;
use pk_core::{ParkId, ReportBucket, ReportPeriod, money};
use pk_db::Database;
use rust_decimal::Decimal;

use super::util::{format_local, write_json};

const RULE: &str = "───────────────────  ───────────────────  ──────────";

#[derive(Debug, Args)]
pub struct ReportArgs {
    /// Park to report on.
    pub park_id: ParkId,

    /// Calendar unit to group bills by.
    #[arg(long, default_value_t = ReportPeriod::Daily)]
    pub period: ReportPeriod,

    /// Output as JSON.
    #[arg(long)]
    pub json: bool,
}

pub fn run<W: Write>(writer: &mut W, db: &Database, args: &ReportArgs) -> Result<()> {
    let buckets = db.generate_report(args.park_id, args.period)?;
    if args.json {
        return write_json(writer, &buckets);
    }
    write_report(writer, args.park_id, args.period, &buckets)
}

fn write_report<W: Write>(
    writer: &mut W,
    park_id: ParkId,
    period: ReportPeriod,
    buckets: &[ReportBucket],
) -> Result<()> {
    let Some(first) = buckets.first() else {
        writeln!(writer, "No revenue recorded for park {park_id}.")?;
        return Ok(());
    };

    writeln!(writer, "Revenue for {} ({period})", first.park_name)?;
    writeln!(writer)?;
    writeln!(writer, "{:<19}  {:<19}  {:>10}", "Begin", "End", "Amount")?;
    writeln!(writer, "{RULE}")?;
    for bucket in buckets {
        writeln!(
            writer,
            "{:<19}  {:<19}  {:>10}",
            format_local(bucket.begin_date),
            format_local(bucket.end_date),
            bucket.amount
        )?;
    }
    writeln!(writer, "{RULE}")?;
    let total: Decimal = buckets.iter().map(|bucket| bucket.amount).sum();
    writeln!(writer, "{:<19}  {:<19}  {:>10}", "Total", "", money(total))?;
    Ok(())
}
