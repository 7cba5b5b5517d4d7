//! Revenue report bucketing.
//!
//! Sessions are grouped by the calendar year of their check-out and the
//! period-of-year (day of year, ISO week or month) of their check-in, both read
//! in the billing time zone. Taking the two halves of the key from different
//! instants is long-standing observable behavior and is kept as is: a session
//! checked in on 31 December and out on 1 January lands in December of the
//! following year.
//!
//! Open sessions have no check-out year. They form their own groups, bounded
//! using the year of the group's earliest check-in, and contribute no money.

use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;

use chrono::{
    DateTime, Datelike, Days, FixedOffset, Months, NaiveDate, Offset, Utc, Weekday,
};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::billing::money;
use crate::types::ParkId;

/// Offset of `Asia/Bangkok`, which observes no daylight saving time.
const BILLING_UTC_OFFSET_SECS: i32 = 7 * 60 * 60;

/// Time zone all report date arithmetic happens in.
pub fn billing_zone() -> FixedOffset {
    FixedOffset::east_opt(BILLING_UTC_OFFSET_SECS).unwrap_or_else(|| Utc.fix())
}

/// Calendar unit a report groups sessions by.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReportPeriod {
    #[default]
    Daily,
    Weekly,
    Monthly,
}

impl ReportPeriod {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Daily => "daily",
            Self::Weekly => "weekly",
            Self::Monthly => "monthly",
        }
    }

    /// Period-of-year index of a local date: day of year, ISO week or month.
    pub fn index_of<D: Datelike>(self, date: &D) -> u32 {
        match self {
            Self::Daily => date.ordinal(),
            Self::Weekly => date.iso_week().week(),
            Self::Monthly => date.month(),
        }
    }

    /// First and last instant of a bucket, from start of day to end of day in
    /// the billing time zone.
    ///
    /// Weekly buckets run Monday to Sunday. Indexes past the end of the year
    /// (day 366 or ISO week 53 in a short year) roll into the next year rather
    /// than failing.
    pub fn bounds(
        self,
        year: i32,
        index: u32,
    ) -> Result<(DateTime<Utc>, DateTime<Utc>), ReportError> {
        let invalid = || ReportError::InvalidBucket {
            period: self,
            year,
            index,
        };
        if index == 0 {
            return Err(invalid());
        }
        let offset = u64::from(index - 1);

        let (first, last) = match self {
            Self::Daily => {
                let day = NaiveDate::from_yo_opt(year, 1)
                    .and_then(|jan_1| jan_1.checked_add_days(Days::new(offset)))
                    .ok_or_else(invalid)?;
                (day, day)
            }
            Self::Weekly => {
                let monday = NaiveDate::from_isoywd_opt(year, 1, Weekday::Mon)
                    .and_then(|week_1| week_1.checked_add_days(Days::new(offset * 7)))
                    .ok_or_else(invalid)?;
                let sunday = monday
                    .checked_add_days(Days::new(6))
                    .ok_or_else(invalid)?;
                (monday, sunday)
            }
            Self::Monthly => {
                let first = NaiveDate::from_ymd_opt(year, index, 1).ok_or_else(invalid)?;
                let last = first
                    .checked_add_months(Months::new(1))
                    .and_then(|next| next.pred_opt())
                    .ok_or_else(invalid)?;
                (first, last)
            }
        };

        let zone = billing_zone();
        let begin = first
            .and_hms_opt(0, 0, 0)
            .and_then(|start| start.and_local_timezone(zone).single())
            .ok_or_else(invalid)?;
        let end = last
            .and_hms_milli_opt(23, 59, 59, 999)
            .and_then(|end| end.and_local_timezone(zone).single())
            .ok_or_else(invalid)?;
        Ok((begin.with_timezone(&Utc), end.with_timezone(&Utc)))
    }
}

impl fmt::Display for ReportPeriod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(self.as_str())
    }
}

impl FromStr for ReportPeriod {
    type Err = UnknownReportPeriod;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "daily" => Ok(Self::Daily),
            "weekly" => Ok(Self::Weekly),
            "monthly" => Ok(Self::Monthly),
            _ => Err(UnknownReportPeriod(s.to_string())),
        }
    }
}

/// Error type for unknown report period strings.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown report period: {0} (expected daily, weekly or monthly)")]
pub struct UnknownReportPeriod(String);

/// Report errors.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ReportError {
    /// A bucket key does not map onto a calendar date.
    #[error("no {period} bucket {index} in year {year}")]
    InvalidBucket {
        period: ReportPeriod,
        year: i32,
        index: u32,
    },
}

/// Revenue of one park over one calendar bucket.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReportBucket {
    pub park_id: ParkId,
    pub park_name: String,
    pub begin_date: DateTime<Utc>,
    pub end_date: DateTime<Utc>,
    pub amount: Decimal,
}

/// A billing session as seen by the report.
///
/// This trait lets aggregation work with stored bills as well as test fixtures.
pub trait ReportableBill {
    /// When the session started.
    fn check_in_time(&self) -> DateTime<Utc>;

    /// When the session ended, if it has.
    fn check_out_time(&self) -> Option<DateTime<Utc>>;

    /// Stored amount; `None` while the session is open.
    fn amount(&self) -> Option<Decimal>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
struct BucketKey {
    /// Calendar year of check-out; `None` for open sessions.
    year: Option<i32>,
    /// Period-of-year index of check-in.
    index: u32,
}

#[derive(Debug)]
struct BucketTotal {
    amount: Decimal,
    first_check_in: DateTime<FixedOffset>,
}

/// Groups one park's sessions into report buckets, ordered by begin date.
pub fn aggregate<B, I>(
    park_id: ParkId,
    park_name: &str,
    period: ReportPeriod,
    bills: I,
) -> Result<Vec<ReportBucket>, ReportError>
where
    B: ReportableBill,
    I: IntoIterator<Item = B>,
{
    let zone = billing_zone();
    let mut totals: HashMap<BucketKey, BucketTotal> = HashMap::new();

    for bill in bills {
        let check_in = bill.check_in_time().with_timezone(&zone);
        let key = BucketKey {
            year: bill
                .check_out_time()
                .map(|check_out| check_out.with_timezone(&zone).year()),
            index: period.index_of(&check_in),
        };
        let amount = bill.amount().unwrap_or_default();
        totals
            .entry(key)
            .and_modify(|total| {
                total.amount += amount;
                if check_in < total.first_check_in {
                    total.first_check_in = check_in;
                }
            })
            .or_insert(BucketTotal {
                amount,
                first_check_in: check_in,
            });
    }

    let mut buckets = Vec::with_capacity(totals.len());
    for (key, total) in totals {
        let year = key.year.unwrap_or_else(|| {
            tracing::trace!(index = key.index, "open sessions bounded by earliest check-in");
            total.first_check_in.year()
        });
        let (begin_date, end_date) = period.bounds(year, key.index)?;
        buckets.push((
            key.year.is_none(),
            ReportBucket {
                park_id,
                park_name: park_name.to_string(),
                begin_date,
                end_date,
                amount: money(total.amount),
            },
        ));
    }

    buckets.sort_by(|(a_open, a), (b_open, b)| {
        a.begin_date
            .cmp(&b.begin_date)
            .then_with(|| a.end_date.cmp(&b.end_date))
            .then_with(|| a_open.cmp(b_open))
    });
    Ok(buckets.into_iter().map(|(_, bucket)| bucket).collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    use chrono::TimeZone;
    use rust_decimal_macros::dec;

    struct TestBill {
        check_in: DateTime<Utc>,
        check_out: Option<DateTime<Utc>>,
        amount: Option<Decimal>,
    }

    impl ReportableBill for TestBill {
        fn check_in_time(&self) -> DateTime<Utc> {
            self.check_in
        }

        fn check_out_time(&self) -> Option<DateTime<Utc>> {
            self.check_out
        }

        fn amount(&self) -> Option<Decimal> {
            self.amount
        }
    }

    /// Instant from a wall-clock time in the billing zone.
    fn local(year: i32, month: u32, day: u32, hour: u32, minute: u32) -> DateTime<Utc> {
        billing_zone()
            .with_ymd_and_hms(year, month, day, hour, minute, 0)
            .unwrap()
            .with_timezone(&Utc)
    }

    fn closed(check_in: DateTime<Utc>, minutes: i64, amount: Decimal) -> TestBill {
        TestBill {
            check_in,
            check_out: Some(check_in + chrono::Duration::minutes(minutes)),
            amount: Some(amount),
        }
    }

    fn utc(s: &str) -> DateTime<Utc> {
        DateTime::parse_from_rfc3339(s).unwrap().with_timezone(&Utc)
    }

    #[test]
    fn monthly_bucket_spans_whole_month_in_billing_zone() {
        let bills = vec![
            closed(local(2025, 1, 5, 9, 0), 90, dec!(30)),
            closed(local(2025, 1, 28, 18, 0), 30, dec!(20)),
        ];

        let buckets = aggregate(ParkId::new(1), "Central", ReportPeriod::Monthly, bills).unwrap();

        assert_eq!(buckets.len(), 1);
        assert_eq!(buckets[0].park_id, ParkId::new(1));
        assert_eq!(buckets[0].park_name, "Central");
        assert_eq!(buckets[0].amount, dec!(50));
        assert_eq!(buckets[0].begin_date, utc("2024-12-31T17:00:00Z"));
        assert_eq!(buckets[0].end_date, utc("2025-01-31T16:59:59.999Z"));
    }

    #[test]
    fn check_in_is_read_in_billing_zone_not_utc() {
        // 18:00 UTC on 31 January is already 1 February in Bangkok.
        let bills = vec![closed(utc("2025-01-31T18:00:00Z"), 30, dec!(20))];

        let buckets = aggregate(ParkId::new(1), "Central", ReportPeriod::Monthly, bills).unwrap();

        assert_eq!(buckets.len(), 1);
        assert_eq!(buckets[0].begin_date, utc("2025-01-31T17:00:00Z"));
        assert_eq!(buckets[0].end_date, utc("2025-02-28T16:59:59.999Z"));
    }

    #[test]
    fn year_comes_from_check_out_and_period_from_check_in() {
        let check_in = local(2024, 12, 31, 23, 0);
        let bills = vec![closed(check_in, 120, dec!(30))];

        let buckets = aggregate(ParkId::new(1), "Central", ReportPeriod::Monthly, bills).unwrap();

        assert_eq!(buckets.len(), 1);
        assert_eq!(buckets[0].begin_date, local(2025, 12, 1, 0, 0));
    }

    #[test]
    fn daily_buckets_split_by_day_of_year() {
        let bills = vec![
            closed(local(2025, 3, 1, 8, 0), 30, dec!(20)),
            closed(local(2025, 3, 1, 22, 0), 30, dec!(20)),
            closed(local(2025, 3, 2, 0, 30), 30, dec!(15.5)),
        ];

        let buckets = aggregate(ParkId::new(2), "North", ReportPeriod::Daily, bills).unwrap();

        assert_eq!(buckets.len(), 2);
        assert_eq!(buckets[0].amount, dec!(40));
        assert_eq!(buckets[0].begin_date, local(2025, 3, 1, 0, 0));
        assert_eq!(buckets[0].end_date, utc("2025-03-01T16:59:59.999Z"));
        assert_eq!(buckets[1].amount, dec!(15.50));
        assert_eq!(buckets[1].begin_date, local(2025, 3, 2, 0, 0));
    }

    #[test]
    fn weekly_buckets_follow_iso_weeks() {
        // Monday 6 and Sunday 12 January 2025 share ISO week 2; Monday 13 starts week 3.
        let bills = vec![
            closed(local(2025, 1, 6, 10, 0), 30, dec!(20)),
            closed(local(2025, 1, 12, 10, 0), 30, dec!(20)),
            closed(local(2025, 1, 13, 10, 0), 30, dec!(20)),
        ];

        let buckets = aggregate(ParkId::new(1), "Central", ReportPeriod::Weekly, bills).unwrap();

        assert_eq!(buckets.len(), 2);
        assert_eq!(buckets[0].amount, dec!(40));
        assert_eq!(buckets[0].begin_date, local(2025, 1, 6, 0, 0));
        assert_eq!(buckets[0].end_date, utc("2025-01-12T16:59:59.999Z"));
        assert_eq!(buckets[1].amount, dec!(20));
        assert_eq!(buckets[1].begin_date, local(2025, 1, 13, 0, 0));
    }

    #[test]
    fn open_sessions_group_separately_and_contribute_nothing() {
        let bills = vec![
            closed(local(2025, 1, 5, 9, 0), 30, dec!(20)),
            TestBill {
                check_in: local(2025, 1, 6, 9, 0),
                check_out: None,
                amount: None,
            },
        ];

        let buckets = aggregate(ParkId::new(1), "Central", ReportPeriod::Monthly, bills).unwrap();

        assert_eq!(buckets.len(), 2);
        assert_eq!(buckets[0].amount, dec!(20));
        assert_eq!(buckets[1].amount, dec!(0));
        assert_eq!(buckets[0].begin_date, buckets[1].begin_date);
    }

    #[test]
    fn negative_amounts_are_summed_as_stored() {
        let bills = vec![
            closed(local(2025, 1, 5, 9, 0), 30, dec!(20)),
            closed(local(2025, 1, 6, 9, 0), 30, dec!(-980)),
        ];

        let buckets = aggregate(ParkId::new(1), "Central", ReportPeriod::Monthly, bills).unwrap();

        assert_eq!(buckets[0].amount, dec!(-960));
    }

    #[test]
    fn no_bills_yield_no_buckets() {
        let buckets =
            aggregate(ParkId::new(1), "Central", ReportPeriod::Daily, Vec::<TestBill>::new())
                .unwrap();
        assert!(buckets.is_empty());
    }

    #[test]
    fn out_of_year_indexes_roll_forward() {
        // 2025 has no day 366; it rolls to 1 January 2026.
        let (begin, _) = ReportPeriod::Daily.bounds(2025, 366).unwrap();
        assert_eq!(begin, local(2026, 1, 1, 0, 0));
    }

    #[test]
    fn zero_index_is_rejected() {
        assert_eq!(
            ReportPeriod::Monthly.bounds(2025, 0),
            Err(ReportError::InvalidBucket {
                period: ReportPeriod::Monthly,
                year: 2025,
                index: 0,
            })
        );
        assert!(ReportPeriod::Monthly.bounds(2025, 13).is_err());
    }

    #[test]
    fn period_parses_from_cli_strings() {
        assert_eq!("weekly".parse::<ReportPeriod>(), Ok(ReportPeriod::Weekly));
        assert!("yearly".parse::<ReportPeriod>().is_err());
    }
}
