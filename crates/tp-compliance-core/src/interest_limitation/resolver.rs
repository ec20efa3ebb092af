use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::classifier::InterestAnalysis;
use super::ebitda::EbitdaResult;
use super::ledger::{ledger_steps, CarryForwardLedger, LedgerPeriod, LedgerStep};
use super::rules::ExemptionRule;
use crate::types::*;

/// What happens to a brought-forward balance in a year the limitation does
/// not apply.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum InapplicablePeriodAging {
    /// Leave the ledger untouched; its expiry clock does not run this year.
    #[default]
    PreserveLedger,
    /// Expire deposits that reach their expiry year, without utilization.
    AgeLedger,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum LimitationOutcome {
    Exempt {
        exemption_code: String,
        reason: String,
        allowable_interest: Money,
        #[serde(skip_serializing_if = "Option::is_none")]
        ledger_aging: Option<LedgerStep>,
    },
    BelowThreshold {
        reason: String,
        covered_interest: Money,
        threshold: Money,
        allowable_interest: Money,
        #[serde(skip_serializing_if = "Option::is_none")]
        ledger_aging: Option<LedgerStep>,
    },
    Applicable {
        interest_cap: Money,
        covered_interest: Money,
        allowable_interest: Money,
        disallowed_interest: Money,
        /// Absent only when the assessment year could not be parsed.
        #[serde(skip_serializing_if = "Option::is_none")]
        carry_forward: Option<LedgerStep>,
    },
}

impl LimitationOutcome {
    pub fn is_applicable(&self) -> bool {
        matches!(self, LimitationOutcome::Applicable { .. })
    }

    pub fn allowable_interest(&self) -> Money {
        match self {
            LimitationOutcome::Exempt {
                allowable_interest, ..
            }
            | LimitationOutcome::BelowThreshold {
                allowable_interest, ..
            }
            | LimitationOutcome::Applicable {
                allowable_interest, ..
            } => *allowable_interest,
        }
    }

    pub fn disallowed_interest(&self) -> Money {
        match self {
            LimitationOutcome::Applicable {
                disallowed_interest,
                ..
            } => *disallowed_interest,
            _ => Decimal::ZERO,
        }
    }

    pub fn reason(&self) -> Option<&str> {
        match self {
            LimitationOutcome::Exempt { reason, .. }
            | LimitationOutcome::BelowThreshold { reason, .. } => Some(reason),
            LimitationOutcome::Applicable { .. } => None,
        }
    }

    /// The ledger movement recorded this year, whether from a full
    /// computation or from aging an inapplicable year.
    pub fn ledger_step(&self) -> Option<&LedgerStep> {
        match self {
            LimitationOutcome::Exempt { ledger_aging, .. }
            | LimitationOutcome::BelowThreshold { ledger_aging, .. } => ledger_aging.as_ref(),
            LimitationOutcome::Applicable { carry_forward, .. } => carry_forward.as_ref(),
        }
    }
}

pub struct ResolverInputs<'a> {
    pub assessment_year: Option<AssessmentYear>,
    pub exemption: Option<&'a ExemptionRule>,
    pub ebitda: &'a EbitdaResult,
    pub interest: &'a InterestAnalysis,
    /// Total interest expense reported in the financial statements.
    pub total_interest_expense: Money,
    pub carry_forward_years: u32,
    pub aging: InapplicablePeriodAging,
}

/// Run the eligibility gate and, when the limitation applies, the allowance
/// split and the ledger step. Gates are evaluated in a fixed order:
/// exemption, then threshold, then computation.
pub fn resolve_limitation(
    inputs: &ResolverInputs<'_>,
    ledger: &mut CarryForwardLedger,
) -> (LimitationOutcome, Vec<ComputationStep>) {
    let mut steps: Vec<ComputationStep> = Vec::new();

    if let Some(rule) = inputs.exemption {
        let ledger_aging = age_if_requested(inputs, ledger, &mut steps);
        steps.push(ComputationStep::new(
            "Allowable interest",
            format!("exempt entity ({}): full interest expense", rule.code),
            inputs.total_interest_expense,
        ));
        let outcome = LimitationOutcome::Exempt {
            exemption_code: rule.code.clone(),
            reason: format!("Exempt from interest limitation: {}", rule.description),
            allowable_interest: inputs.total_interest_expense,
            ledger_aging,
        };
        return (outcome, steps);
    }

    if !inputs.interest.exceeds_threshold {
        let ledger_aging = age_if_requested(inputs, ledger, &mut steps);
        steps.push(ComputationStep::new(
            "Allowable interest",
            format!(
                "covered interest {} does not exceed threshold {}: full interest expense",
                inputs.interest.covered_interest, inputs.interest.threshold
            ),
            inputs.total_interest_expense,
        ));
        let outcome = LimitationOutcome::BelowThreshold {
            reason: format!(
                "Covered interest {} does not exceed the threshold of {}",
                inputs.interest.covered_interest, inputs.interest.threshold
            ),
            covered_interest: inputs.interest.covered_interest,
            threshold: inputs.interest.threshold,
            allowable_interest: inputs.total_interest_expense,
            ledger_aging,
        };
        return (outcome, steps);
    }

    let cap = inputs.ebitda.interest_cap;
    let covered = inputs.interest.covered_interest;
    let allowable = cap.min(covered).max(Decimal::ZERO);
    let disallowed = (covered - allowable).max(Decimal::ZERO);
    let unused_cap = (cap - allowable).max(Decimal::ZERO);

    steps.push(ComputationStep::new(
        "Allowable interest",
        format!("max(0, min(cap {cap}, covered {covered}))"),
        allowable,
    ));
    steps.push(ComputationStep::new(
        "Disallowed interest",
        format!("max(0, covered {covered} - allowable {allowable})"),
        disallowed,
    ));

    let carry_forward = inputs.assessment_year.map(|year| {
        let step = ledger.apply_period(LedgerPeriod {
            assessment_year: year,
            available_cap: unused_cap,
            disallowance: disallowed,
            carry_forward_years: inputs.carry_forward_years,
        });
        steps.extend(ledger_steps(&step));
        step
    });

    let outcome = LimitationOutcome::Applicable {
        interest_cap: cap,
        covered_interest: covered,
        allowable_interest: allowable,
        disallowed_interest: disallowed,
        carry_forward,
    };
    (outcome, steps)
}

fn age_if_requested(
    inputs: &ResolverInputs<'_>,
    ledger: &mut CarryForwardLedger,
    steps: &mut Vec<ComputationStep>,
) -> Option<LedgerStep> {
    if inputs.aging != InapplicablePeriodAging::AgeLedger {
        return None;
    }
    let year = inputs.assessment_year?;
    let step = ledger.age(year);
    steps.push(ComputationStep::new(
        "Carry-forward expired",
        format!("inapplicable year {year}: expiry only"),
        step.expired,
    ));
    Some(step)
}
