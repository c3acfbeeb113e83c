use chrono::NaiveDate;
use rust_decimal::{Decimal, MathematicalOps};
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};

use crate::decimal::{Money, Rate};
use crate::schedule::LoanSchedule;

const CONVERGENCE_THRESHOLD: Decimal = dec!(0.0000001);
const MAX_IRR_ITERATIONS: u32 = 100;
const DAYS_PER_YEAR: Decimal = dec!(365.25);
const MIN_RATE: Decimal = dec!(-0.99);
const MAX_RATE: Decimal = dec!(100);

/// column totals and the effective annual cost of the loan
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScheduleTotals {
    pub total_disbursed: Money,
    pub total_early_repayment: Money,
    pub total_interest: Money,
    pub total_capital: Money,
    pub total_installments: Money,
    pub total_insurance: Money,
    pub total_other_costs: Money,
    /// every amount paid out, disbursements excluded
    pub total_paid: Money,
    /// what the credit cost beyond the capital received
    pub net_cost: Money,
    /// annualized internal rate of the dated cash flows; `None` when
    /// the schedule is incomplete or the flows admit no rate
    pub xirr: Option<Rate>,
}

impl ScheduleTotals {
    pub fn from_schedule(schedule: &LoanSchedule) -> ScheduleTotals {
        let rows = schedule.rows();
        let total_disbursed: Money = rows.iter().map(|r| r.disbursed).sum();
        let total_paid: Money = rows.iter().map(|r| r.total_payment).sum();

        let flows: Vec<(NaiveDate, Decimal)> = rows
            .iter()
            .map(|r| (r.date, (r.disbursed - r.total_payment).as_decimal()))
            .filter(|(_, amount)| !amount.is_zero())
            .collect();
        let xirr = if schedule.is_complete() {
            xirr(&flows)
        } else {
            None
        };

        ScheduleTotals {
            total_disbursed,
            total_early_repayment: rows.iter().map(|r| r.early_repayment).sum(),
            total_interest: rows
                .iter()
                .map(|r| r.interest_installment.unwrap_or(Money::ZERO))
                .sum(),
            total_capital: rows.iter().map(|r| r.capital_installment).sum(),
            total_installments: rows
                .iter()
                .map(|r| r.total_installment.unwrap_or(Money::ZERO))
                .sum(),
            total_insurance: rows.iter().map(|r| r.insurance).sum(),
            total_other_costs: rows.iter().map(|r| r.other_costs).sum(),
            total_paid,
            net_cost: total_paid - total_disbursed,
            xirr,
        }
    }
}

/// internal rate of return over irregularly dated cash flows, solved
/// by Newton-Raphson; flows are signed from the borrower's side, money
/// received positive
pub fn xirr(flows: &[(NaiveDate, Decimal)]) -> Option<Rate> {
    if flows.len() < 2 {
        return None;
    }
    let has_inflow = flows.iter().any(|(_, amount)| amount.is_sign_positive());
    let has_outflow = flows.iter().any(|(_, amount)| amount.is_sign_negative());
    if !has_inflow || !has_outflow {
        return None;
    }

    let anchor = flows[0].0;
    let mut rate = dec!(0.10);

    for _ in 0..MAX_IRR_ITERATIONS {
        let base = Decimal::ONE + rate;
        let mut value = Decimal::ZERO;
        let mut derivative = Decimal::ZERO;
        for (date, amount) in flows {
            let years = Decimal::from((*date - anchor).num_days()) / DAYS_PER_YEAR;
            let discount = Decimal::ONE / base.checked_powd(years)?;
            value += amount * discount;
            derivative -= amount * years * discount / base;
        }

        if value.abs() < CONVERGENCE_THRESHOLD {
            return Some(Rate::from_decimal(rate));
        }
        if derivative.is_zero() {
            return None;
        }
        rate = (rate - value / derivative).clamp(MIN_RATE, MAX_RATE);
    }
    None
}
