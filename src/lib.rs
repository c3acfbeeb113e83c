pub mod calendar;
pub mod daycount;
pub mod decimal;
pub mod errors;
pub mod events;
pub mod installments;
pub mod rates;
pub mod schedule;
pub mod summary;
pub mod terms;

// re-export key types
pub use calendar::EventCalendar;
pub use daycount::{AccrualCarry, DaySplit};
pub use decimal::{Money, Rate};
pub use errors::{Result, ScheduleError};
pub use events::{
    AdditionalCost, Collateral, EarlyRepayment, Insurance, InsuranceKind, LoanEvents,
    RateChange, RepaymentEffect, Tranche,
};
pub use rates::RateTimeline;
pub use schedule::{LoanSchedule, RowKind, ScheduleRow};
pub use summary::ScheduleTotals;
pub use terms::{
    AmortizationPolicy, Currency, Frequency, LoanId, LoanTerms, PaymentDay, RateBasis,
};

// re-export external dependencies that users will need
pub use chrono;
pub use rust_decimal::Decimal;
pub use uuid::Uuid;

#[cfg(test)]
pub(crate) mod test_support {
    use chrono::NaiveDate;
    use rust_decimal_macros::dec;
    use uuid::Uuid;

    use crate::decimal::{Money, Rate};
    use crate::events::LoanEvents;
    use crate::terms::{
        AmortizationPolicy, Currency, Frequency, LoanTerms, PaymentDay, RateBasis,
    };

    /// 60 000 over 60 months at a fixed 6%, paid monthly on the 1st
    /// with a constant total installment
    pub fn fixed_rate_terms() -> LoanTerms {
        LoanTerms {
            id: Uuid::new_v4(),
            name: "apartment loan".to_string(),
            currency: Currency::PLN,
            principal: Money::from_major(60_000),
            market_value: None,
            term_months: 60,
            grace_periods: 0,
            policy: AmortizationPolicy::ConstantTotal,
            frequency: Frequency::Monthly,
            total_installment: Money::from_major(1_160),
            capital_installment: Money::ZERO,
            rate_basis: RateBasis::Fixed(Rate::from_percent(dec!(6))),
            disbursement_date: NaiveDate::from_ymd_opt(2021, 1, 1).unwrap(),
            first_payment_date: NaiveDate::from_ymd_opt(2021, 2, 1).unwrap(),
            payment_day: PaymentDay::Day(1),
            collateral_required: false,
            surcharge_rate: Rate::ZERO,
            tranches_based: false,
            origination_fee: Money::ZERO,
            fee_financed: false,
            life_insurance_first_year: None,
            property_insurance_first_year: None,
        }
    }

    /// same loan amortized by a constant 1 000 capital installment
    pub fn capital_terms() -> LoanTerms {
        let mut terms = fixed_rate_terms();
        terms.policy = AmortizationPolicy::ConstantCapital;
        terms.total_installment = Money::ZERO;
        terms.capital_installment = Money::from_major(1_000);
        terms
    }

    pub fn no_events() -> LoanEvents {
        LoanEvents::default()
    }
}
