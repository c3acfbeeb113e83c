use std::collections::BTreeMap;

use chrono::NaiveDate;

use crate::calendar::EventCalendar;
use crate::decimal::Money;
use crate::events::LoanEvents;
use crate::terms::LoanTerms;

/// nominal installment amount due on each scheduled date, with the
/// overrides attached to lifecycle records resolved in
///
/// two timing rules apply: overrides riding on a tranche, an early
/// repayment or the collateral record take effect from the payment
/// after their date, while an override riding on a rate change takes
/// effect on the change date itself; when both kinds compete, the one
/// with the later effective date wins, next-period sources winning a
/// tie
pub fn resolve(
    terms: &LoanTerms,
    events: &LoanEvents,
    calendar: &EventCalendar,
) -> BTreeMap<NaiveDate, Money> {
    let policy = terms.policy;

    // next-period overrides keyed by their record date; insertion
    // order mirrors record precedence, later inserts win a shared date
    let mut next_period: BTreeMap<NaiveDate, Money> = BTreeMap::new();
    for tranche in &events.tranches {
        if let Some(amount) = tranche.installment_override(policy) {
            next_period.insert(tranche.date, amount);
        }
    }
    for repayment in &events.early_repayments {
        if let Some(amount) = repayment.installment_override(policy) {
            next_period.insert(repayment.date, amount);
        }
    }
    if let Some(collateral) = &events.collateral {
        if let Some(amount) = collateral.installment_override(policy) {
            next_period.insert(collateral.established_date, amount);
        }
    }

    let mut on_date: BTreeMap<NaiveDate, Money> = BTreeMap::new();
    for change in &events.rate_changes {
        if let Some(amount) = change.installment_override(policy) {
            on_date.insert(change.effective_date, amount);
        }
    }

    let nominal = terms.initial_installment();
    let mut installments: BTreeMap<NaiveDate, Money> = BTreeMap::new();
    for date in calendar.scheduled() {
        let next = next_period.range(..date).next_back();
        let exact = on_date.range(..=date).next_back();
        let amount = match (next, exact) {
            (Some((&da, &va)), Some((&db, &vb))) => {
                if db > da {
                    vb
                } else {
                    va
                }
            }
            (Some((_, &va)), None) => va,
            (None, Some((_, &vb))) => vb,
            (None, None) => nominal,
        };
        installments.insert(date, amount);
    }

    // grace periods zero out the leading scheduled installments
    for (i, amount) in installments.values_mut().enumerate() {
        if (i as u32) < terms.grace_periods {
            *amount = Money::ZERO;
        } else {
            break;
        }
    }

    installments
}
