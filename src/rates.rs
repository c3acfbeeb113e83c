use std::collections::BTreeMap;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::calendar::EventCalendar;
use crate::decimal::Rate;
use crate::events::LoanEvents;
use crate::terms::LoanTerms;

/// dense all-in rate per calendar date the schedule visits, with the
/// collateral surcharge resolved in
///
/// rate changes communicated by the bank already include the surcharge
/// while it applies, so the timeline takes them as given; the only
/// adjustment the engine makes is dropping the surcharge from the
/// initial rate once collateral is actually established and no bank
/// rate has superseded it yet
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RateTimeline {
    rates: BTreeMap<NaiveDate, Rate>,
    surcharge_rate: Rate,
    surcharge_until: Option<NaiveDate>,
}

impl RateTimeline {
    pub fn build(terms: &LoanTerms, events: &LoanEvents, calendar: &EventCalendar) -> Self {
        let surcharge = if terms.collateral_required {
            terms.surcharge_rate
        } else {
            Rate::ZERO
        };
        let initial = terms.base_rate() + surcharge;

        // surcharge column boundary: the recorded establishment date,
        // or the last scheduled date when no record exists yet
        let collateral_date = events.collateral.as_ref().map(|c| c.established_date);
        let surcharge_until = if terms.collateral_required && surcharge.is_positive() {
            collateral_date.or_else(|| calendar.last_scheduled())
        } else {
            None
        };

        let mut changes: BTreeMap<NaiveDate, Rate> = BTreeMap::new();
        for change in &events.rate_changes {
            changes.insert(change.effective_date, change.rate);
        }
        let first_change = changes.keys().next().copied();

        // the initial rate sheds its surcharge only when collateral was
        // established before the bank's first communicated rate
        let correction_from = match (collateral_date, first_change) {
            (Some(collateral), Some(change)) if collateral < change => Some(collateral),
            (Some(collateral), None) => Some(collateral),
            _ => None,
        };

        let mut rates = BTreeMap::new();
        for &date in calendar.dates() {
            let explicit = changes.range(..=date).next_back().map(|(_, &rate)| rate);
            let rate = match explicit {
                Some(rate) => rate,
                None => match correction_from {
                    Some(from) if date >= from => initial - surcharge,
                    _ => initial,
                },
            };
            rates.insert(date, rate);
        }

        RateTimeline {
            rates,
            surcharge_rate: surcharge,
            surcharge_until,
        }
    }

    /// all-in annual rate in force on `date`; a change effective on
    /// `date` is already included, so accrual over an interval prices
    /// at the rate in force on the interval's start date
    pub fn rate_on(&self, date: NaiveDate) -> Rate {
        self.rates
            .range(..=date)
            .next_back()
            .map(|(_, &rate)| rate)
            .or_else(|| self.rates.values().next().copied())
            .unwrap_or(Rate::ZERO)
    }

    /// surcharge component reported on the row dated `date`
    pub fn surcharge_on(&self, date: NaiveDate) -> Rate {
        match self.surcharge_until {
            Some(until) if date < until => self.surcharge_rate,
            _ => Rate::ZERO,
        }
    }
}
