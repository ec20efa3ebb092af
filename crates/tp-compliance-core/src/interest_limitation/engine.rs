use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::time::Instant;

use super::classifier::{classify_interest, interest_steps, InterestAnalysis, InterestLineItem};
use super::ebitda::{calculate_ebitda, ebitda_steps, EbitdaResult, FinancialPeriod};
use super::ledger::CarryForwardLedger;
use super::resolver::{
    resolve_limitation, InapplicablePeriodAging, LimitationOutcome, ResolverInputs,
};
use super::rules::RuleTables;
use super::validation::{
    check_amount_ranges, has_blocking_issues, validate_period, Severity, ValidationIssue,
};
use crate::error::ComplianceError;
use crate::types::*;
use crate::ComplianceResult;

// ---------------------------------------------------------------------------
// Input / Output types
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InterestLimitationInput {
    pub assessment_year: String,
    /// Required; `None` only arrives from incomplete caller documents and is
    /// rejected rather than defaulted.
    pub financials: Option<FinancialPeriod>,
    #[serde(default)]
    pub interest_lines: Vec<InterestLineItem>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub entity_exemption_code: Option<String>,
    #[serde(default)]
    pub prior_ledger: CarryForwardLedger,
    #[serde(default)]
    pub inapplicable_period_aging: InapplicablePeriodAging,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LimitationResult {
    pub assessment_year: String,
    pub is_applicable: bool,
    pub ebitda: EbitdaResult,
    pub interest: InterestAnalysis,
    pub outcome: LimitationOutcome,
    pub allowable_interest: Money,
    pub disallowed_interest: Money,
    /// Brought-forward interest absorbed this year.
    pub carry_forward_utilized: Money,
    /// Total interest expense less this year's disallowance plus the
    /// brought-forward amount absorbed.
    pub deductible_interest: Money,
    pub ledger: CarryForwardLedger,
    pub steps: Vec<ComputationStep>,
    pub issues: Vec<ValidationIssue>,
}

impl LimitationResult {
    pub fn has_blocking_issues(&self) -> bool {
        has_blocking_issues(&self.issues)
    }
}

// ---------------------------------------------------------------------------
// Engine
// ---------------------------------------------------------------------------

/// Stateless calculator bound to one set of rule tables. Callers construct
/// it explicitly and thread the carry-forward ledger between calls.
#[derive(Debug, Clone, Default)]
pub struct InterestLimitationEngine {
    rules: RuleTables,
}

impl InterestLimitationEngine {
    pub fn new(rules: RuleTables) -> ComplianceResult<Self> {
        rules.validate()?;
        Ok(Self { rules })
    }

    pub fn statutory() -> Self {
        Self::default()
    }

    pub fn rules(&self) -> &RuleTables {
        &self.rules
    }

    /// Evaluate one assessment year: validate, derive EBITDA and covered
    /// interest, resolve applicability and advance the ledger.
    pub fn compute_period(
        &self,
        input: &InterestLimitationInput,
    ) -> ComplianceResult<LimitationResult> {
        let financials = input.financials.as_ref().ok_or_else(|| {
            ComplianceError::InsufficientData(format!(
                "Financial data is required to compute interest limitation for {}",
                input.assessment_year
            ))
        })?;
        check_amount_ranges(input)?;

        let (year, mut issues) = validate_period(input, &self.rules);

        let ebitda = calculate_ebitda(financials, self.rules.cap_rate)?;
        let interest = classify_interest(&input.interest_lines, &self.rules);
        let exemption = input
            .entity_exemption_code
            .as_deref()
            .and_then(|code| self.rules.exemption_for(code));

        let mut ledger = input.prior_ledger.clone();
        let (outcome, resolver_steps) = resolve_limitation(
            &ResolverInputs {
                assessment_year: year,
                exemption,
                ebitda: &ebitda,
                interest: &interest,
                total_interest_expense: financials.total_interest_expense,
                carry_forward_years: self.rules.carry_forward_years,
                aging: input.inapplicable_period_aging,
            },
            &mut ledger,
        );

        if !outcome.is_applicable()
            && input.inapplicable_period_aging == InapplicablePeriodAging::PreserveLedger
            && ledger.closing_balance() > Decimal::ZERO
        {
            issues.push(ValidationIssue::new(
                Severity::Info,
                "prior_ledger",
                format!(
                    "Limitation not applicable in {}; carry-forward balance of {} carried through without aging",
                    input.assessment_year,
                    ledger.closing_balance()
                ),
            ));
        }

        if let Some(year) = year {
            if outcome.is_applicable() && input.prior_ledger.has_deposit_for(year) {
                issues.push(ValidationIssue::new(
                    Severity::Warning,
                    "prior_ledger",
                    format!("Ledger already holds a deposit originating in {year}; it may have been computed twice"),
                ));
            }
        }

        let mut steps = ebitda_steps(&ebitda);
        steps.extend(interest_steps(&interest));
        steps.extend(resolver_steps);

        let allowable_interest = outcome.allowable_interest();
        let disallowed_interest = outcome.disallowed_interest();
        let carry_forward_utilized = outcome
            .ledger_step()
            .map(|s| s.utilized)
            .unwrap_or(Decimal::ZERO);
        let deductible_interest =
            financials.total_interest_expense - disallowed_interest + carry_forward_utilized;
        steps.push(ComputationStep::new(
            "Deductible interest",
            format!(
                "expense {} - disallowed {} + brought forward {}",
                financials.total_interest_expense, disallowed_interest, carry_forward_utilized
            ),
            deductible_interest,
        ));

        Ok(LimitationResult {
            assessment_year: input.assessment_year.clone(),
            is_applicable: outcome.is_applicable(),
            ebitda,
            interest,
            outcome,
            allowable_interest,
            disallowed_interest,
            carry_forward_utilized,
            deductible_interest,
            ledger,
            steps,
            issues,
        })
    }
}

// ---------------------------------------------------------------------------
// Public API
// ---------------------------------------------------------------------------

/// Compute the interest limitation for one assessment year under the
/// statutory rule tables.
pub fn compute_period(
    input: &InterestLimitationInput,
) -> ComplianceResult<ComputationOutput<LimitationResult>> {
    compute_period_with_rules(input, &RuleTables::default())
}

/// As [`compute_period`], with caller-supplied rule tables.
pub fn compute_period_with_rules(
    input: &InterestLimitationInput,
    rules: &RuleTables,
) -> ComplianceResult<ComputationOutput<LimitationResult>> {
    let start = Instant::now();
    let engine = InterestLimitationEngine::new(rules.clone())?;
    let result = engine.compute_period(input)?;

    let warnings: Vec<String> = result.issues.iter().map(|i| i.to_string()).collect();
    let elapsed = start.elapsed().as_micros() as u64;
    Ok(with_metadata(
        "Interest limitation (s.94B): 30% EBITDA cap with FIFO carry-forward",
        &serde_json::json!({
            "assessment_year": input.assessment_year,
            "cap_rate": rules.cap_rate.to_string(),
            "threshold": rules.threshold.to_string(),
            "carry_forward_years": rules.carry_forward_years,
            "entity_exemption_code": input.entity_exemption_code,
            "inapplicable_period_aging": input.inapplicable_period_aging,
        }),
        warnings,
        elapsed,
        result,
    ))
}
