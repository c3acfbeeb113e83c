use std::collections::BTreeMap;

use chrono::{Datelike, NaiveDate};
use serde::{Deserialize, Serialize};

use crate::calendar::{add_months, with_day_clamped};
use crate::decimal::{Money, Rate};
use crate::errors::{Result, ScheduleError};
use crate::terms::{AmortizationPolicy, Frequency, LoanTerms};

/// declared effect of an early repayment; informational for this
/// engine, the numeric effect is a balance reduction either way
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RepaymentEffect {
    ShortenTenor,
    LowerInstallment,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum InsuranceKind {
    Life,
    Property,
}

/// partial disbursement of principal at a specific date
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Tranche {
    pub date: NaiveDate,
    pub amount: Money,
    /// new total installment, effective the payment following the tranche
    pub total_installment: Option<Money>,
    /// new capital installment, effective the payment following the tranche
    pub capital_installment: Option<Money>,
}

/// all-in interest rate communicated by the bank
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RateChange {
    pub effective_date: NaiveDate,
    pub rate: Rate,
    /// new total installment, effective on the rate-change date itself
    pub total_installment: Option<Money>,
    /// new capital installment, effective on the rate-change date itself
    pub capital_installment: Option<Money>,
    pub note: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EarlyRepayment {
    pub date: NaiveDate,
    pub amount: Money,
    pub effect: RepaymentEffect,
    pub total_installment: Option<Money>,
    pub capital_installment: Option<Money>,
}

/// collateral establishment; its date ends the surcharge period
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Collateral {
    pub established_date: NaiveDate,
    pub value: Option<Money>,
    pub description: Option<String>,
    pub total_installment: Option<Money>,
    pub capital_installment: Option<Money>,
}

/// one-off or periodic premium paid in cash, never financed
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Insurance {
    pub kind: Option<InsuranceKind>,
    pub amount: Money,
    pub frequency: Frequency,
    pub start_date: NaiveDate,
    pub end_date: Option<NaiveDate>,
    /// number of periodic payments; a periodic premium without a count
    /// contributes only its first payment
    pub payment_count: Option<u32>,
}

/// any other cost tied to the loan; negative amounts are refunds
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AdditionalCost {
    pub name: String,
    pub amount: Money,
    pub date: NaiveDate,
}

/// every lifecycle record attached to one loan, as validated upstream
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LoanEvents {
    pub tranches: Vec<Tranche>,
    pub rate_changes: Vec<RateChange>,
    pub early_repayments: Vec<EarlyRepayment>,
    pub collateral: Option<Collateral>,
    pub insurances: Vec<Insurance>,
    pub additional_costs: Vec<AdditionalCost>,
}

fn override_for(
    policy: AmortizationPolicy,
    total: Option<Money>,
    capital: Option<Money>,
) -> Option<Money> {
    match policy {
        AmortizationPolicy::ConstantTotal => total,
        AmortizationPolicy::ConstantCapital => capital,
    }
    .filter(|amount| amount.is_positive())
}

impl Tranche {
    pub fn installment_override(&self, policy: AmortizationPolicy) -> Option<Money> {
        override_for(policy, self.total_installment, self.capital_installment)
    }
}

impl RateChange {
    pub fn installment_override(&self, policy: AmortizationPolicy) -> Option<Money> {
        override_for(policy, self.total_installment, self.capital_installment)
    }
}

impl EarlyRepayment {
    pub fn installment_override(&self, policy: AmortizationPolicy) -> Option<Money> {
        override_for(policy, self.total_installment, self.capital_installment)
    }
}

impl Collateral {
    pub fn installment_override(&self, policy: AmortizationPolicy) -> Option<Money> {
        override_for(policy, self.total_installment, self.capital_installment)
    }
}

impl LoanEvents {
    /// reject any installment override supplied for the policy not in
    /// force; upstream validation owns this rule, but the engine never
    /// silently misapplies an override
    pub fn validate_overrides(&self, policy: AmortizationPolicy) -> Result<()> {
        let off_policy = match policy {
            AmortizationPolicy::ConstantTotal => AmortizationPolicy::ConstantCapital,
            AmortizationPolicy::ConstantCapital => AmortizationPolicy::ConstantTotal,
        };
        let supplied = match off_policy {
            AmortizationPolicy::ConstantTotal => "total",
            AmortizationPolicy::ConstantCapital => "capital",
        };

        let check = |record: &'static str, date: NaiveDate, amount: Option<Money>| {
            if amount.is_some() {
                Err(ScheduleError::InvalidOverrideCombination {
                    record,
                    date,
                    supplied,
                    policy: policy.label(),
                })
            } else {
                Ok(())
            }
        };

        for tranche in &self.tranches {
            check(
                "tranche",
                tranche.date,
                tranche.installment_override(off_policy),
            )?;
        }
        for change in &self.rate_changes {
            check(
                "rate change",
                change.effective_date,
                change.installment_override(off_policy),
            )?;
        }
        for repayment in &self.early_repayments {
            check(
                "early repayment",
                repayment.date,
                repayment.installment_override(off_policy),
            )?;
        }
        if let Some(collateral) = &self.collateral {
            check(
                "collateral",
                collateral.established_date,
                collateral.installment_override(off_policy),
            )?;
        }
        Ok(())
    }

    /// amounts released by the bank per date: financed fees and
    /// premiums at disbursement, then the principal at once or per
    /// tranche; a tranche-based loan must open with a tranche on the
    /// disbursement date
    pub fn disbursement_schedule(&self, terms: &LoanTerms) -> Result<BTreeMap<NaiveDate, Money>> {
        let mut payments: BTreeMap<NaiveDate, Money> = BTreeMap::new();
        let financed = terms.financed_costs();
        if financed.is_positive() {
            payments.insert(terms.disbursement_date, financed);
        }

        if terms.tranches_based {
            if !self
                .tranches
                .iter()
                .any(|t| t.date == terms.disbursement_date)
            {
                return Err(ScheduleError::MissingInitialDisbursement {
                    disbursement_date: terms.disbursement_date,
                });
            }
            for tranche in &self.tranches {
                *payments.entry(tranche.date).or_insert(Money::ZERO) += tranche.amount;
            }
        } else {
            *payments
                .entry(terms.disbursement_date)
                .or_insert(Money::ZERO) += terms.principal;
        }
        Ok(payments)
    }

    /// early repayment amounts per date, as supplied by the user;
    /// the engine clips the final one to the outstanding balance
    pub fn repayment_schedule(&self) -> BTreeMap<NaiveDate, Money> {
        let mut repayments: BTreeMap<NaiveDate, Money> = BTreeMap::new();
        for repayment in &self.early_repayments {
            *repayments.entry(repayment.date).or_insert(Money::ZERO) += repayment.amount;
        }
        repayments
    }

    /// cash insurance payments per date; periodic premiums expand to
    /// `payment_count` dates aligned to the start day of month
    pub fn insurance_schedule(&self) -> BTreeMap<NaiveDate, Money> {
        let mut payments: BTreeMap<NaiveDate, Money> = BTreeMap::new();
        for insurance in &self.insurances {
            if !insurance.amount.is_positive() {
                continue;
            }
            *payments.entry(insurance.start_date).or_insert(Money::ZERO) += insurance.amount;

            let months = insurance.frequency.months_per_period();
            if months == 0 {
                continue;
            }
            if let Some(count) = insurance.payment_count {
                for i in 1..count {
                    let date = with_day_clamped(
                        add_months(insurance.start_date, months * i),
                        insurance.start_date.day(),
                    );
                    *payments.entry(date).or_insert(Money::ZERO) += insurance.amount;
                }
            }
        }
        payments
    }

    /// non-financed fees and other costs per date
    pub fn cost_schedule(&self, terms: &LoanTerms) -> BTreeMap<NaiveDate, Money> {
        let mut payments: BTreeMap<NaiveDate, Money> = BTreeMap::new();
        if !terms.fee_financed && terms.origination_fee.is_positive() {
            payments.insert(terms.disbursement_date, terms.origination_fee);
        }
        for cost in &self.additional_costs {
            *payments.entry(cost.date).or_insert(Money::ZERO) += cost.amount;
        }
        payments
    }
}
