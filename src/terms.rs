use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::decimal::{Money, Rate};

/// unique identifier for a loan
pub type LoanId = Uuid;

/// settlement currency, informational only
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Currency {
    PLN,
    EUR,
    USD,
    CHF,
    GBP,
    Other,
}

/// amortization policy for the life of the loan
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AmortizationPolicy {
    /// total installment held constant, capital share grows over time
    ConstantTotal,
    /// capital installment held constant, total amount declines over time
    ConstantCapital,
}

impl AmortizationPolicy {
    pub(crate) fn label(&self) -> &'static str {
        match self {
            AmortizationPolicy::ConstantTotal => "constant total installment",
            AmortizationPolicy::ConstantCapital => "constant capital installment",
        }
    }
}

/// installment payment frequency
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Frequency {
    Monthly,
    Quarterly,
    SemiAnnual,
    Annual,
    OneTime,
}

impl Frequency {
    /// months per period; zero marks a one-time payment
    pub fn months_per_period(&self) -> u32 {
        match self {
            Frequency::Monthly => 1,
            Frequency::Quarterly => 3,
            Frequency::SemiAnnual => 6,
            Frequency::Annual => 12,
            Frequency::OneTime => 0,
        }
    }
}

/// contractual day of month an installment falls due
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PaymentDay {
    /// last calendar day of the month
    LastDayOfMonth,
    /// fixed day, clamped to the month length (31 in april pays on the 30th)
    Day(u8),
}

/// rate composition agreed in the loan contract; exactly one form is
/// in force for the life of the loan
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RateBasis {
    /// all-in fixed rate, bank margin included
    Fixed(Rate),
    /// floating benchmark plus bank margin
    Floating { base: Rate, margin: Rate },
}

impl RateBasis {
    /// all-in annual rate before any collateral surcharge
    pub fn all_in(&self) -> Rate {
        match self {
            RateBasis::Fixed(rate) => *rate,
            RateBasis::Floating { base, margin } => *base + *margin,
        }
    }
}

/// static terms of a loan agreement, immutable per computation
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoanTerms {
    pub id: LoanId,
    pub name: String,
    pub currency: Currency,
    /// contractual principal, excluding financed fees and insurance
    pub principal: Money,
    /// market value of the financed asset, drives the loan-to-value column
    pub market_value: Option<Money>,
    /// loan tenor in months, grace period included
    pub term_months: u32,
    /// number of leading scheduled installments forced to zero
    pub grace_periods: u32,
    pub policy: AmortizationPolicy,
    pub frequency: Frequency,
    /// nominal total installment for constant-total loans, zero otherwise
    pub total_installment: Money,
    /// nominal capital installment for constant-capital loans, zero otherwise
    pub capital_installment: Money,
    pub rate_basis: RateBasis,
    /// date funds (or the first tranche) are released
    pub disbursement_date: NaiveDate,
    /// date the first installment falls due
    pub first_payment_date: NaiveDate,
    pub payment_day: PaymentDay,
    /// collateral must be established; surcharge applies until it is
    pub collateral_required: bool,
    pub surcharge_rate: Rate,
    /// principal is released in tranches rather than at once
    pub tranches_based: bool,
    /// origination fee, paid at disbursement
    pub origination_fee: Money,
    /// fee financed into the opening balance instead of paid in cash
    pub fee_financed: bool,
    /// first-year life insurance premium financed into the opening balance
    pub life_insurance_first_year: Option<Money>,
    /// first-year property insurance premium financed into the opening balance
    pub property_insurance_first_year: Option<Money>,
}

impl LoanTerms {
    /// all-in contractual rate before the collateral surcharge
    pub fn base_rate(&self) -> Rate {
        self.rate_basis.all_in()
    }

    /// fees and premiums financed into debt at disbursement
    pub fn financed_costs(&self) -> Money {
        let mut costs = Money::ZERO;
        if self.fee_financed && self.origination_fee.is_positive() {
            costs += self.origination_fee;
        }
        if let Some(premium) = self.life_insurance_first_year {
            costs += premium;
        }
        if let Some(premium) = self.property_insurance_first_year {
            costs += premium;
        }
        costs
    }

    /// nominal installment amount for the policy in force
    pub fn initial_installment(&self) -> Money {
        match self.policy {
            AmortizationPolicy::ConstantTotal => self.total_installment,
            AmortizationPolicy::ConstantCapital => self.capital_installment,
        }
    }
}
