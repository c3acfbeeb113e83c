use std::collections::BTreeSet;

use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::calendar::EventCalendar;
use crate::daycount::{accrued_interest, span_days, AccrualCarry};
use crate::decimal::{Money, Rate};
use crate::errors::{Result, ScheduleError};
use crate::events::LoanEvents;
use crate::installments;
use crate::rates::RateTimeline;
use crate::terms::{AmortizationPolicy, LoanTerms};

/// what a row represents in the balance walk
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RowKind {
    /// opening row on the first calendar date
    Initial,
    /// the balance was already settled before this date
    FullyRepaid,
    /// the payment extinguishing the remaining balance
    FinalInstallment,
    /// unscheduled date with no balance effect, days roll forward
    NonBalanceEvent,
    /// unscheduled disbursement, repayment or rate change; accrued
    /// interest is priced here and deferred to the next installment
    MidPeriodChange,
    /// a regular installment on a scheduled date
    ScheduledInstallment,
}

pub(crate) struct RowContext {
    pub first: bool,
    /// a disbursement occurred before this row
    pub funded: bool,
    pub scheduled: bool,
    pub prev_balance: Money,
    pub disbursed: Money,
    pub repayment: Money,
    pub rate_changed: bool,
    /// resolved nominal installment, zero on unscheduled dates
    pub installment_due: Money,
    /// interest accrued to this date, carry included
    pub interest: Money,
}

pub(crate) fn classify(policy: AmortizationPolicy, ctx: &RowContext) -> RowKind {
    if ctx.first {
        return RowKind::Initial;
    }
    // a zero balance only means repaid once funds were released;
    // costs dated before the disbursement must not settle the loan
    if ctx.funded && ctx.prev_balance.is_settled() {
        return RowKind::FullyRepaid;
    }
    let remaining = ctx.prev_balance + ctx.disbursed - ctx.repayment;
    if ctx.scheduled {
        let capital_due = match policy {
            AmortizationPolicy::ConstantTotal => ctx.installment_due - ctx.interest,
            AmortizationPolicy::ConstantCapital => ctx.installment_due,
        };
        if capital_due >= remaining {
            return RowKind::FinalInstallment;
        }
        return RowKind::ScheduledInstallment;
    }
    if remaining.is_settled() && ctx.repayment.is_positive() {
        return RowKind::FinalInstallment;
    }
    if ctx.disbursed.is_positive() || ctx.repayment.is_positive() || ctx.rate_changed {
        return RowKind::MidPeriodChange;
    }
    RowKind::NonBalanceEvent
}

/// one dated row of the amortization table; `interest_installment` is
/// `None` where the interest is deferred to a later installment
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScheduleRow {
    pub kind: RowKind,
    pub date: NaiveDate,
    /// days elapsed since the previous row
    pub days: i64,
    pub disbursed: Money,
    pub early_repayment: Money,
    pub interest_rate: Rate,
    pub surcharge_rate: Rate,
    pub interest_installment: Option<Money>,
    pub capital_installment: Money,
    pub total_installment: Option<Money>,
    pub balance: Money,
    /// outstanding balance over the asset's market value
    pub loan_to_value: Option<Decimal>,
    pub insurance: Money,
    pub other_costs: Money,
    /// everything paid out on this date, disbursements excluded
    pub total_payment: Money,
}

/// full amortization table for one loan
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoanSchedule {
    rows: Vec<ScheduleRow>,
    complete: bool,
}

impl LoanSchedule {
    /// walk every calendar date and materialize the amortization table
    pub fn build(terms: &LoanTerms, events: &LoanEvents) -> Result<LoanSchedule> {
        events.validate_overrides(terms.policy)?;
        let calendar = EventCalendar::build(terms, events);
        let timeline = RateTimeline::build(terms, events, &calendar);
        let installments = installments::resolve(terms, events, &calendar);
        let disbursements = events.disbursement_schedule(terms)?;
        let repayments = events.repayment_schedule();
        let insurances = events.insurance_schedule();
        let costs = events.cost_schedule(terms);
        let change_dates: BTreeSet<NaiveDate> = events
            .rate_changes
            .iter()
            .map(|c| c.effective_date)
            .collect();

        let mut rows = Vec::with_capacity(calendar.dates().len());
        let mut carry = AccrualCarry::default();
        let mut prev_balance = Money::ZERO;
        let mut prev_date: Option<NaiveDate> = None;
        let mut funded = false;

        for &date in calendar.dates() {
            let disbursed = disbursements.get(&date).copied().unwrap_or(Money::ZERO);
            let insurance = insurances.get(&date).copied().unwrap_or(Money::ZERO);
            let other_costs = costs.get(&date).copied().unwrap_or(Money::ZERO);
            // recorded repayments are clipped to what is outstanding
            let repayment = repayments
                .get(&date)
                .copied()
                .unwrap_or(Money::ZERO)
                .min(prev_balance + disbursed)
                .max(Money::ZERO);

            let split = match prev_date {
                Some(prev) => span_days(prev, date)?,
                None => Default::default(),
            };
            // between consecutive calendar dates the rate is constant,
            // so the interval prices at the rate in force at its start
            let accrual_rate = timeline.rate_on(prev_date.unwrap_or(date));
            let interest = accrued_interest(prev_balance, accrual_rate, split, &carry);

            let ctx = RowContext {
                first: !funded && disbursed.is_positive(),
                funded,
                scheduled: calendar.is_scheduled(date),
                prev_balance,
                disbursed,
                repayment,
                rate_changed: change_dates.contains(&date),
                installment_due: installments.get(&date).copied().unwrap_or(Money::ZERO),
                interest,
            };
            let kind = classify(terms.policy, &ctx);
            let remaining = prev_balance + disbursed - repayment;

            let (interest_due, capital, total, balance) = match kind {
                RowKind::Initial => {
                    // days before the funds were released accrue nothing
                    carry.clear();
                    (Some(Money::ZERO), Money::ZERO, Some(Money::ZERO), remaining)
                }
                RowKind::FullyRepaid => {
                    (Some(Money::ZERO), Money::ZERO, Some(Money::ZERO), Money::ZERO)
                }
                RowKind::NonBalanceEvent => {
                    carry.absorb(split);
                    (None, Money::ZERO, Some(Money::ZERO), prev_balance)
                }
                RowKind::MidPeriodChange => {
                    carry.roll_into_pending(interest);
                    (None, Money::ZERO, Some(Money::ZERO), remaining)
                }
                RowKind::FinalInstallment if !ctx.scheduled => {
                    // an early repayment extinguished the balance;
                    // interest accrued to this date settles with it and
                    // any sub-unit residual is written off
                    let interest_due = interest.round_dp(2);
                    carry.clear();
                    (
                        Some(interest_due),
                        Money::ZERO,
                        Some(interest_due),
                        Money::ZERO,
                    )
                }
                RowKind::FinalInstallment => {
                    let interest_due = interest.round_dp(2);
                    carry.clear();
                    (
                        Some(interest_due),
                        remaining,
                        Some(remaining + interest_due),
                        Money::ZERO,
                    )
                }
                RowKind::ScheduledInstallment => {
                    let interest_due = interest.round_dp(2);
                    carry.clear();
                    let capital = match terms.policy {
                        AmortizationPolicy::ConstantTotal => ctx.installment_due - interest_due,
                        AmortizationPolicy::ConstantCapital => ctx.installment_due,
                    };
                    let total = capital + interest_due;
                    (Some(interest_due), capital, Some(total), remaining - capital)
                }
            };

            let total_payment = total.unwrap_or(Money::ZERO)
                + repayment
                + insurance
                + other_costs;

            rows.push(ScheduleRow {
                kind,
                date,
                days: split.total(),
                disbursed,
                early_repayment: repayment,
                interest_rate: timeline.rate_on(date),
                surcharge_rate: timeline.surcharge_on(date),
                interest_installment: interest_due,
                capital_installment: capital,
                total_installment: total,
                balance,
                loan_to_value: terms.market_value.map(|value| {
                    (balance.as_decimal() / value.as_decimal()).round_dp(4)
                }),
                insurance,
                other_costs,
                total_payment,
            });

            prev_balance = balance;
            prev_date = Some(date);
            if disbursed.is_positive() {
                funded = true;
            }
        }

        Ok(LoanSchedule {
            rows,
            complete: carry.is_empty(),
        })
    }

    pub fn rows(&self) -> &[ScheduleRow] {
        &self.rows
    }

    /// true when every accrued amount was settled by the last row
    pub fn is_complete(&self) -> bool {
        self.complete
    }

    /// outstanding balance after the last row
    pub fn final_balance(&self) -> Money {
        self.rows.last().map(|row| row.balance).unwrap_or(Money::ZERO)
    }

    /// error out when accrual was carried past the last row; totals
    /// over such a table would understate interest
    pub fn require_complete(&self) -> Result<()> {
        if self.complete {
            Ok(())
        } else {
            Err(ScheduleError::IncompleteScheduleData {
                last_date: self.rows.last().map(|row| row.date).unwrap_or_default(),
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::{AdditionalCost, EarlyRepayment, RateChange, RepaymentEffect, Tranche};
    use crate::test_support::{capital_terms, fixed_rate_terms, no_events};
    use rust_decimal_macros::dec;

    fn d(y: i32, m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, day).unwrap()
    }

    #[test]
    fn test_plain_constant_total_amortizes_to_zero() {
        let terms = fixed_rate_terms();
        let schedule = LoanSchedule::build(&terms, &no_events()).unwrap();
        let rows = schedule.rows();

        assert!(schedule.is_complete());
        assert_eq!(rows[0].kind, RowKind::Initial);
        assert_eq!(rows[0].balance, terms.principal);

        // balance decreases on every installment row, never dips below
        // zero, and reaches exactly zero on the final one
        for w in rows.windows(2) {
            assert!(w[1].balance <= w[0].balance);
        }
        assert!(rows.iter().all(|row| !row.balance.is_negative()));
        assert_eq!(schedule.final_balance(), Money::ZERO);
        assert!(rows
            .iter()
            .any(|row| row.kind == RowKind::FinalInstallment));

        // the capital share of the constant total grows over time;
        // compare a year apart so month lengths match
        let installment_rows: Vec<&ScheduleRow> = rows
            .iter()
            .filter(|row| row.kind == RowKind::ScheduledInstallment)
            .collect();
        for w in installment_rows.windows(13) {
            assert!(w[12].capital_installment > w[0].capital_installment);
        }

        // same inputs, same table
        let again = LoanSchedule::build(&terms, &no_events()).unwrap();
        assert_eq!(again.rows(), rows);

        // every unit of principal comes back as capital
        let capital: Money = rows.iter().map(|row| row.capital_installment).sum();
        assert_eq!(capital, terms.principal);

        // interest is never negative and rates never move
        for row in rows {
            assert!(!row.interest_installment.unwrap().is_negative());
            assert_eq!(row.interest_rate.as_percent(), dec!(6));
        }
    }

    #[test]
    fn test_constant_capital_share_is_constant() {
        let terms = capital_terms();
        let schedule = LoanSchedule::build(&terms, &no_events()).unwrap();
        let rows = schedule.rows();

        // 60 payments of 1000 settle the 60000 principal; installment
        // rows carry the same capital share while totals decline
        let paying: Vec<&ScheduleRow> = rows
            .iter()
            .filter(|row| {
                matches!(
                    row.kind,
                    RowKind::ScheduledInstallment | RowKind::FinalInstallment
                )
            })
            .collect();
        assert_eq!(paying.len(), 60);
        assert!(paying
            .iter()
            .all(|row| row.capital_installment == Money::from_major(1_000)));
        for w in paying.windows(12) {
            // a year later the total installment is strictly smaller
            assert!(w[11].total_installment.unwrap() < w[0].total_installment.unwrap());
        }

        assert_eq!(schedule.final_balance(), Money::ZERO);
        assert_eq!(rows.last().unwrap().kind, RowKind::FullyRepaid);
        assert!(schedule.is_complete());
    }

    #[test]
    fn test_mid_period_tranche_defers_interest() {
        let mut terms = fixed_rate_terms();
        terms.tranches_based = true;
        terms.first_payment_date = d(2021, 3, 1);
        let mut events = no_events();
        events.tranches.push(Tranche {
            date: d(2021, 1, 1),
            amount: Money::from_major(30_000),
            total_installment: None,
            capital_installment: None,
        });
        events.tranches.push(Tranche {
            date: d(2021, 2, 14),
            amount: Money::from_major(30_000),
            total_installment: None,
            capital_installment: None,
        });

        let schedule = LoanSchedule::build(&terms, &events).unwrap();
        let rows = schedule.rows();

        let tranche_row = rows.iter().find(|row| row.date == d(2021, 2, 14)).unwrap();
        assert_eq!(tranche_row.kind, RowKind::MidPeriodChange);
        assert_eq!(tranche_row.interest_installment, None);
        assert_eq!(tranche_row.balance, Money::from_major(60_000));

        // 44 days on 30000 plus 15 days on 60000, both at 6%, all of
        // 2021 being a regular year
        let first_payment = rows.iter().find(|row| row.date == d(2021, 3, 1)).unwrap();
        assert_eq!(first_payment.kind, RowKind::ScheduledInstallment);
        assert_eq!(
            first_payment.interest_installment,
            Some(Money::from_decimal(dec!(364.93)))
        );
        assert!(schedule.is_complete());
    }

    #[test]
    fn test_early_full_repayment_settles_and_zeroes_the_tail() {
        let terms = fixed_rate_terms();
        let mut events = no_events();
        events.early_repayments.push(EarlyRepayment {
            date: d(2021, 6, 15),
            amount: Money::from_major(100_000),
            effect: RepaymentEffect::ShortenTenor,
            total_installment: None,
            capital_installment: None,
        });

        let schedule = LoanSchedule::build(&terms, &events).unwrap();
        let rows = schedule.rows();

        let settle = rows.iter().find(|row| row.date == d(2021, 6, 15)).unwrap();
        assert_eq!(settle.kind, RowKind::FinalInstallment);
        // the recorded amount clips to what was outstanding
        assert!(settle.early_repayment < Money::from_major(100_000));
        assert!(settle.interest_installment.unwrap().is_positive());
        assert!(settle.balance.is_settled());

        for row in rows.iter().filter(|row| row.date > d(2021, 6, 15)) {
            assert_eq!(row.kind, RowKind::FullyRepaid);
            assert_eq!(row.total_installment, Some(Money::ZERO));
            assert_eq!(row.capital_installment, Money::ZERO);
        }
        assert!(schedule.is_complete());
    }

    #[test]
    fn test_cost_before_disbursement_leaves_the_walk_intact() {
        let terms = fixed_rate_terms();
        let mut events = no_events();
        // an appraisal fee paid before the funds are released
        events.additional_costs.push(AdditionalCost {
            name: "appraisal".to_string(),
            amount: Money::from_major(300),
            date: d(2020, 12, 15),
        });

        let schedule = LoanSchedule::build(&terms, &events).unwrap();
        let rows = schedule.rows();

        assert_eq!(rows[0].date, d(2020, 12, 15));
        assert_eq!(rows[0].kind, RowKind::NonBalanceEvent);
        assert_eq!(rows[0].other_costs, Money::from_major(300));
        assert_eq!(rows[0].balance, Money::ZERO);

        let disbursement = rows.iter().find(|row| row.date == d(2021, 1, 1)).unwrap();
        assert_eq!(disbursement.kind, RowKind::Initial);
        assert_eq!(disbursement.balance, terms.principal);

        let capital: Money = rows.iter().map(|row| row.capital_installment).sum();
        assert_eq!(capital, terms.principal);
        assert!(schedule.is_complete());
    }

    #[test]
    fn test_sub_unit_residual_written_off_after_repayment() {
        let terms = fixed_rate_terms();
        let baseline = LoanSchedule::build(&terms, &no_events()).unwrap();
        let outstanding = baseline
            .rows()
            .iter()
            .find(|row| row.date == d(2021, 6, 1))
            .unwrap()
            .balance;

        // repay 30 groszy short of the outstanding balance
        let mut events = no_events();
        events.early_repayments.push(EarlyRepayment {
            date: d(2021, 6, 15),
            amount: outstanding - Money::from_decimal(dec!(0.30)),
            effect: RepaymentEffect::ShortenTenor,
            total_installment: None,
            capital_installment: None,
        });

        let schedule = LoanSchedule::build(&terms, &events).unwrap();
        let rows = schedule.rows();

        let settle = rows.iter().find(|row| row.date == d(2021, 6, 15)).unwrap();
        assert_eq!(settle.kind, RowKind::FinalInstallment);
        assert_eq!(settle.balance, Money::ZERO);

        let last = rows.last().unwrap();
        assert_eq!(last.kind, RowKind::FullyRepaid);
        assert_eq!(last.balance, Money::ZERO);
        assert!(schedule.is_complete());
    }

    #[test]
    fn test_rate_change_splits_the_accrual() {
        let terms = fixed_rate_terms();
        let mut events = no_events();
        events.rate_changes.push(RateChange {
            effective_date: d(2021, 2, 11),
            rate: Rate::from_percent(dec!(8)),
            total_installment: None,
            capital_installment: None,
            note: None,
        });

        let schedule = LoanSchedule::build(&terms, &events).unwrap();
        let rows = schedule.rows();

        let change_row = rows.iter().find(|row| row.date == d(2021, 2, 11)).unwrap();
        assert_eq!(change_row.kind, RowKind::MidPeriodChange);
        assert_eq!(change_row.interest_rate.as_percent(), dec!(8));
        assert_eq!(change_row.interest_installment, None);

        // 2021-02-01 installment at 6%, then the 2021-03-01 one blends
        // 10 days of pending 6% accrual with 18 days at 8%
        let feb = rows.iter().find(|row| row.date == d(2021, 2, 1)).unwrap();
        let expected_feb = Money::from_decimal(
            dec!(60000) * dec!(0.06) * dec!(31) / dec!(365),
        )
        .round_dp(2);
        assert_eq!(feb.interest_installment, Some(expected_feb));

        let balance_after_feb = feb.balance.as_decimal();
        let mar = rows.iter().find(|row| row.date == d(2021, 3, 1)).unwrap();
        let expected_mar = Money::from_decimal(
            balance_after_feb * dec!(0.06) * dec!(10) / dec!(365)
                + balance_after_feb * dec!(0.08) * dec!(18) / dec!(365),
        )
        .round_dp(2);
        assert_eq!(mar.interest_installment, Some(expected_mar));
    }

    #[test]
    fn test_accrual_past_last_installment_marks_incomplete() {
        let mut terms = fixed_rate_terms();
        // an installment too small to amortize leaves a balance after
        // the final scheduled date
        terms.total_installment = Money::from_major(100);
        let mut events = no_events();
        events.additional_costs.push(AdditionalCost {
            name: "account fee".to_string(),
            amount: Money::from_major(50),
            date: d(2026, 6, 1),
        });

        let schedule = LoanSchedule::build(&terms, &events).unwrap();
        assert!(!schedule.is_complete());
        let err = schedule.require_complete().unwrap_err();
        assert!(matches!(
            err,
            ScheduleError::IncompleteScheduleData { last_date } if last_date == d(2026, 6, 1)
        ));
    }

    #[test]
    fn test_loan_to_value_tracks_the_balance() {
        let mut terms = fixed_rate_terms();
        terms.market_value = Some(Money::from_major(120_000));
        let schedule = LoanSchedule::build(&terms, &no_events()).unwrap();
        let rows = schedule.rows();

        assert_eq!(rows[0].loan_to_value, Some(dec!(0.5)));
        assert_eq!(rows.last().unwrap().loan_to_value, Some(dec!(0)));
    }

    #[test]
    fn test_rows_serialize_to_json() {
        let terms = fixed_rate_terms();
        let schedule = LoanSchedule::build(&terms, &no_events()).unwrap();
        let json = serde_json::to_string(&schedule.rows()[1]).unwrap();
        let back: ScheduleRow = serde_json::from_str(&json).unwrap();
        assert_eq!(back, schedule.rows()[1]);
    }
}
