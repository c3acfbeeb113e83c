use chrono::NaiveDate;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ScheduleError {
    /// tranche-based loan with no tranche on the disbursement date;
    /// the opening balance cannot be established
    #[error("no tranche coincides with the disbursement date {disbursement_date}; complete the tranche records first")]
    MissingInitialDisbursement { disbursement_date: NaiveDate },

    /// a leap-year interval split did not reconcile to the total day
    /// count, which indicates a date arithmetic bug
    #[error("day count mismatch over [{start}, {end}): {regular_days} regular + {leap_days} leap != {total_days} total")]
    DayCountInconsistency {
        start: NaiveDate,
        end: NaiveDate,
        regular_days: i64,
        leap_days: i64,
        total_days: i64,
    },

    /// one or more rows could not resolve an interest or installment
    /// value; fatal only to computations that need every column
    #[error("schedule has unresolved values; accrual carried past the last event on {last_date}")]
    IncompleteScheduleData { last_date: NaiveDate },

    /// an installment override was supplied for the policy not in
    /// force on this loan
    #[error("{record} dated {date} carries a {supplied} installment override, but the loan amortizes by {policy}")]
    InvalidOverrideCombination {
        record: &'static str,
        date: NaiveDate,
        supplied: &'static str,
        policy: &'static str,
    },
}

pub type Result<T> = std::result::Result<T, ScheduleError>;
