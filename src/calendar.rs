use std::collections::BTreeSet;

use chrono::{Datelike, NaiveDate};
use serde::{Deserialize, Serialize};

use crate::events::LoanEvents;
use crate::terms::{LoanTerms, PaymentDay};

/// check if year is a leap year
pub fn is_leap_year(year: i32) -> bool {
    (year % 4 == 0 && year % 100 != 0) || (year % 400 == 0)
}

fn days_in_month(year: i32, month: u32) -> u32 {
    match month {
        1 | 3 | 5 | 7 | 8 | 10 | 12 => 31,
        4 | 6 | 9 | 11 => 30,
        2 => {
            if is_leap_year(year) {
                29
            } else {
                28
            }
        }
        _ => 30,
    }
}

/// shift a date by whole months, clamping the day to the target month length
pub(crate) fn add_months(date: NaiveDate, months: u32) -> NaiveDate {
    let total = date.year() * 12 + date.month() as i32 - 1 + months as i32;
    let year = total.div_euclid(12);
    let month = (total.rem_euclid(12) + 1) as u32;
    let day = date.day().min(days_in_month(year, month));
    NaiveDate::from_ymd_opt(year, month, day).expect("clamped day is always valid")
}

/// set the day of month, clamping to the month length
pub(crate) fn with_day_clamped(date: NaiveDate, day: u32) -> NaiveDate {
    let day = day.min(days_in_month(date.year(), date.month())).max(1);
    NaiveDate::from_ymd_opt(date.year(), date.month(), day).expect("clamped day is always valid")
}

fn last_day_of_month(date: NaiveDate) -> NaiveDate {
    with_day_clamped(date, 31)
}

/// scheduled installment dates implied by the loan terms: the first
/// payment date, then one date per period covering the full tenor plus
/// one extra period, so a first payment falling on the disbursement
/// date still leaves a complete schedule
pub fn scheduled_dates(terms: &LoanTerms) -> Vec<NaiveDate> {
    let start = terms.first_payment_date;
    let mut dates = vec![start];
    let months = terms.frequency.months_per_period();

    if months == 0 {
        // one-time payment, aligned to the contractual payment day
        dates.push(payment_date(start, 0, terms.payment_day));
        dates.sort();
        dates.dedup();
        return dates;
    }

    let mut i = 1;
    let mut period = 1;
    while period <= terms.term_months {
        dates.push(payment_date(start, months * i, terms.payment_day));
        period += months;
        i += 1;
    }
    dates.sort();
    dates.dedup();
    dates
}

fn payment_date(start: NaiveDate, months_ahead: u32, payment_day: PaymentDay) -> NaiveDate {
    match payment_day {
        PaymentDay::LastDayOfMonth => last_day_of_month(add_months(start, months_ahead)),
        PaymentDay::Day(day) => with_day_clamped(add_months(start, months_ahead), day as u32),
    }
}

/// sorted, deduplicated union of every date the schedule must visit:
/// scheduled installments plus all recorded lifecycle event dates
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EventCalendar {
    dates: Vec<NaiveDate>,
    scheduled: BTreeSet<NaiveDate>,
}

impl EventCalendar {
    pub fn build(terms: &LoanTerms, events: &LoanEvents) -> Self {
        let scheduled: BTreeSet<NaiveDate> = scheduled_dates(terms).into_iter().collect();

        let mut all: BTreeSet<NaiveDate> = scheduled.clone();
        all.insert(terms.disbursement_date);
        for tranche in &events.tranches {
            all.insert(tranche.date);
        }
        for change in &events.rate_changes {
            all.insert(change.effective_date);
        }
        for repayment in &events.early_repayments {
            all.insert(repayment.date);
        }
        for date in events.insurance_schedule().keys() {
            all.insert(*date);
        }
        for date in events.cost_schedule(terms).keys() {
            all.insert(*date);
        }

        EventCalendar {
            dates: all.into_iter().collect(),
            scheduled,
        }
    }

    /// every date the engine will emit a row for, ascending
    pub fn dates(&self) -> &[NaiveDate] {
        &self.dates
    }

    pub fn is_scheduled(&self, date: NaiveDate) -> bool {
        self.scheduled.contains(&date)
    }

    pub fn scheduled(&self) -> impl Iterator<Item = NaiveDate> + '_ {
        self.scheduled.iter().copied()
    }

    /// final scheduled date, the fallback "collateral established" boundary
    pub fn last_scheduled(&self) -> Option<NaiveDate> {
        self.scheduled.iter().next_back().copied()
    }
}
