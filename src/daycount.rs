use chrono::{Datelike, NaiveDate};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::calendar::is_leap_year;
use crate::decimal::{Money, Rate};
use crate::errors::{Result, ScheduleError};

const REGULAR_YEAR: i64 = 365;
const LEAP_YEAR: i64 = 366;

/// day counts of an interval, bucketed by the year length each day
/// accrues against under ACT/ACT
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct DaySplit {
    pub regular: i64,
    pub leap: i64,
}

impl DaySplit {
    pub fn total(&self) -> i64 {
        self.regular + self.leap
    }
}

fn jan_first(year: i32) -> NaiveDate {
    NaiveDate::from_ymd_opt(year, 1, 1).expect("january 1st is always a valid date")
}

/// bucket the days of `[start, end)` by year kind, splitting at the
/// 31 Dec / 1 Jan boundary when the interval crosses from a leap year
/// into a regular year or the reverse; adjacent years can never both
/// be leap, so an interval whose endpoints share a year kind lies in
/// one bucket entirely
pub fn span_days(start: NaiveDate, end: NaiveDate) -> Result<DaySplit> {
    let total = (end - start).num_days();
    if total <= 0 {
        return Ok(DaySplit::default());
    }

    let start_leap = is_leap_year(start.year());
    let end_leap = is_leap_year(end.year());

    if start_leap == end_leap {
        return Ok(if end_leap {
            DaySplit { regular: 0, leap: total }
        } else {
            DaySplit { regular: total, leap: 0 }
        });
    }

    let boundary = jan_first(start.year() + 1);
    let first_leg = (boundary - start).num_days();
    let second_leg = (end - boundary).num_days();
    if first_leg + second_leg != total {
        return Err(ScheduleError::DayCountInconsistency {
            start,
            end,
            regular_days: if start_leap { second_leg } else { first_leg },
            leap_days: if start_leap { first_leg } else { second_leg },
            total_days: total,
        });
    }

    Ok(if start_leap {
        DaySplit { regular: second_leg, leap: first_leg }
    } else {
        DaySplit { regular: first_leg, leap: second_leg }
    })
}

/// accrual context carried across rows between two rate-bearing
/// events: day counts of intermediate spans plus interest already
/// priced at a mid-period change, waiting for the next scheduled
/// installment to settle them
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct AccrualCarry {
    pub regular_days: i64,
    pub leap_days: i64,
    pub pending_interest: Money,
    deferred: bool,
}

impl AccrualCarry {
    /// fold an intermediate span's day counts into the carry
    pub fn absorb(&mut self, split: DaySplit) {
        self.regular_days += split.regular;
        self.leap_days += split.leap;
        self.deferred = true;
    }

    /// replace day carry with interest already priced at a mid-period
    /// change; day counters restart from the change date
    pub fn roll_into_pending(&mut self, accrued: Money) {
        self.regular_days = 0;
        self.leap_days = 0;
        self.pending_interest = accrued;
        self.deferred = true;
    }

    /// settle: a scheduled installment consumed the carried context
    pub fn clear(&mut self) {
        *self = AccrualCarry::default();
    }

    /// true when nothing is deferred
    pub fn is_empty(&self) -> bool {
        !self.deferred
    }
}

/// ACT/ACT accrued interest on `balance` over a bucketed interval,
/// carried day counts and pending interest included; unrounded, rows
/// round at materialization
pub fn accrued_interest(
    balance: Money,
    annual_rate: Rate,
    split: DaySplit,
    carry: &AccrualCarry,
) -> Money {
    let base = balance.as_decimal() * annual_rate.as_decimal();
    let regular = Decimal::from(split.regular + carry.regular_days);
    let leap = Decimal::from(split.leap + carry.leap_days);
    let interest =
        base * regular / Decimal::from(REGULAR_YEAR) + base * leap / Decimal::from(LEAP_YEAR);
    Money::from_decimal(interest) + carry.pending_interest
}
