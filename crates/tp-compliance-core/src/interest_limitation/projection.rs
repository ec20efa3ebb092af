use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};
use std::time::Instant;

use super::classifier::InterestLineItem;
use super::ebitda::{calculate_ebitda, FinancialPeriod};
use super::engine::{InterestLimitationEngine, InterestLimitationInput};
use super::ledger::CarryForwardLedger;
use super::resolver::InapplicablePeriodAging;
use super::rules::{check_amount, RuleTables};
use super::validation::{Severity, ValidationIssue};
use crate::error::ComplianceError;
use crate::types::*;
use crate::ComplianceResult;

const MAX_PROJECTION_YEARS: u32 = 20;
const MAX_GROWTH_RATE: Rate = dec!(1);

// ---------------------------------------------------------------------------
// Input / Output types
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GrowthAssumptions {
    pub ebitda_growth: Rate,
    pub interest_growth: Rate,
    /// Defaults to the rule tables' assumed corporate rate.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tax_rate: Option<Rate>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProjectionInput {
    /// Last actual year; projection starts the year after.
    pub base_period: FinancialPeriod,
    #[serde(default)]
    pub interest_lines: Vec<InterestLineItem>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub entity_exemption_code: Option<String>,
    /// Ledger as it stands after the base period.
    #[serde(default)]
    pub opening_ledger: CarryForwardLedger,
    pub years: u32,
    pub growth: GrowthAssumptions,
    #[serde(default)]
    pub inapplicable_period_aging: InapplicablePeriodAging,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProjectionYear {
    pub year: u32,
    pub assessment_year: AssessmentYear,
    pub projected_ebitda: Money,
    pub interest_cap: Money,
    pub projected_interest: Money,
    pub covered_interest: Money,
    pub is_applicable: bool,
    pub allowable_interest: Money,
    pub disallowed_interest: Money,
    pub opening_carry_forward: Money,
    pub carry_forward_utilized: Money,
    pub carry_forward_expired: Money,
    pub closing_carry_forward: Money,
    /// Tax on (disallowed - utilized) at the assumed rate.
    pub tax_impact: Money,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MultiYearProjection {
    pub base_assessment_year: AssessmentYear,
    pub years: Vec<ProjectionYear>,
    pub total_disallowance: Money,
    pub total_utilized: Money,
    pub total_expired: Money,
    pub net_disallowance: Money,
    pub tax_rate: Rate,
    pub net_tax_impact: Money,
    pub closing_ledger: CarryForwardLedger,
    pub issues: Vec<ValidationIssue>,
}

// ---------------------------------------------------------------------------
// Validation
// ---------------------------------------------------------------------------

fn check_rate(field: &str, rate: Rate, max: Rate) -> ComplianceResult<()> {
    if rate < Decimal::ZERO || rate > max {
        return Err(ComplianceError::InvalidInput {
            field: field.into(),
            reason: format!("Must be between 0 and {max} (got {rate})"),
        });
    }
    Ok(())
}

fn validate_projection_input(input: &ProjectionInput) -> ComplianceResult<AssessmentYear> {
    if input.years == 0 || input.years > MAX_PROJECTION_YEARS {
        return Err(ComplianceError::InvalidInput {
            field: "years".into(),
            reason: format!("Must be between 1 and {MAX_PROJECTION_YEARS}"),
        });
    }
    check_rate("growth.ebitda_growth", input.growth.ebitda_growth, MAX_GROWTH_RATE)?;
    check_rate("growth.interest_growth", input.growth.interest_growth, MAX_GROWTH_RATE)?;
    if let Some(tax_rate) = input.growth.tax_rate {
        check_rate("growth.tax_rate", tax_rate, Decimal::ONE)?;
    }
    let base = &input.base_period;
    check_amount("base_period.profit_before_tax", base.profit_before_tax)?;
    check_amount("base_period.total_interest_expense", base.total_interest_expense)?;
    check_amount("base_period.depreciation", base.depreciation)?;
    check_amount("base_period.amortization", base.amortization)?;
    if let Some(exceptional) = base.exceptional_items {
        check_amount("base_period.exceptional_items", exceptional)?;
    }
    for (i, line) in input.interest_lines.iter().enumerate() {
        check_amount(&format!("interest_lines[{i}].amount"), line.amount)?;
        check_amount(&format!("interest_lines[{i}].principal"), line.principal)?;
    }

    let base_year: AssessmentYear = base.assessment_year.parse()?;
    let horizon = i32::try_from(input.years).unwrap_or(i32::MAX);
    base_year.checked_offset(horizon).map_err(|_| ComplianceError::InvalidInput {
        field: "years".into(),
        reason: format!("Projection from {base_year} runs past the last representable assessment year"),
    })?;
    Ok(base_year)
}

fn scale(field: &str, value: Money, factor: Decimal) -> ComplianceResult<Money> {
    value
        .checked_mul(factor)
        .ok_or_else(|| ComplianceError::InvalidInput {
            field: field.into(),
            reason: format!("{value} grown by {factor} exceeds the representable decimal range"),
        })
}

// ---------------------------------------------------------------------------
// Synthetic period construction
// ---------------------------------------------------------------------------

/// Scale the base year so EBITDA grows at `ebitda_factor` and interest at
/// `interest_factor`. Profit before tax is backed out of the target EBITDA,
/// which keeps the EBITDA identity exact.
fn synthesize_period(
    base: &FinancialPeriod,
    base_ebitda: Money,
    year: AssessmentYear,
    ebitda_factor: Decimal,
    interest_factor: Decimal,
) -> ComplianceResult<FinancialPeriod> {
    let target_ebitda = scale("base_period", base_ebitda, ebitda_factor)?;
    let interest = scale(
        "base_period.total_interest_expense",
        base.total_interest_expense,
        interest_factor,
    )?;
    let depreciation = scale("base_period.depreciation", base.depreciation, ebitda_factor)?;
    let amortization = scale("base_period.amortization", base.amortization, ebitda_factor)?;
    let exceptional_items = base
        .exceptional_items
        .map(|x| scale("base_period.exceptional_items", x, ebitda_factor))
        .transpose()?;
    let profit_before_tax = target_ebitda
        .checked_sub(interest)
        .and_then(|v| v.checked_sub(depreciation))
        .and_then(|v| v.checked_sub(amortization))
        .and_then(|v| v.checked_add(exceptional_items.unwrap_or(Decimal::ZERO)))
        .ok_or_else(|| ComplianceError::InvalidInput {
            field: "base_period.profit_before_tax".into(),
            reason: format!("Backed-out profit for {year} exceeds the representable decimal range"),
        })?;

    Ok(FinancialPeriod {
        assessment_year: year.to_string(),
        profit_before_tax,
        total_interest_expense: interest,
        depreciation,
        amortization,
        exceptional_items,
    })
}

fn synthesize_lines(
    lines: &[InterestLineItem],
    interest_factor: Decimal,
) -> ComplianceResult<Vec<InterestLineItem>> {
    lines
        .iter()
        .enumerate()
        .map(|(i, line)| {
            let principal = scale(
                &format!("interest_lines[{i}].principal"),
                line.principal,
                interest_factor,
            )?;
            let amount = scale(&format!("interest_lines[{i}].amount"), line.amount, interest_factor)?;
            Ok(InterestLineItem {
                principal,
                amount,
                ..line.clone()
            })
        })
        .collect()
}

// ---------------------------------------------------------------------------
// Simulation
// ---------------------------------------------------------------------------

impl InterestLimitationEngine {
    /// Re-run the period computation over `input.years` synthetic future
    /// years, threading the ledger from one year into the next.
    pub fn project_forward(&self, input: &ProjectionInput) -> ComplianceResult<MultiYearProjection> {
        let base_year = validate_projection_input(input)?;
        let tax_rate = input
            .growth
            .tax_rate
            .unwrap_or(self.rules().assumed_tax_rate);
        let base_ebitda = calculate_ebitda(&input.base_period, self.rules().cap_rate)?.ebitda;

        let ebitda_step = Decimal::ONE + input.growth.ebitda_growth;
        let interest_step = Decimal::ONE + input.growth.interest_growth;
        let mut ebitda_factor = Decimal::ONE;
        let mut interest_factor = Decimal::ONE;

        let mut ledger = input.opening_ledger.clone();
        let mut rows: Vec<ProjectionYear> = Vec::with_capacity(input.years as usize);
        let mut issues: Vec<ValidationIssue> = Vec::new();

        for (i, offset) in (1..=input.years).zip(1i32..) {
            ebitda_factor *= ebitda_step;
            interest_factor *= interest_step;
            let year = base_year.checked_offset(offset)?;

            let period_input = InterestLimitationInput {
                assessment_year: year.to_string(),
                financials: Some(synthesize_period(
                    &input.base_period,
                    base_ebitda,
                    year,
                    ebitda_factor,
                    interest_factor,
                )?),
                interest_lines: synthesize_lines(&input.interest_lines, interest_factor)?,
                entity_exemption_code: input.entity_exemption_code.clone(),
                prior_ledger: ledger,
                inapplicable_period_aging: input.inapplicable_period_aging,
            };
            let opening_carry_forward = period_input.prior_ledger.closing_balance();
            let result = self.compute_period(&period_input)?;

            issues.extend(
                result
                    .issues
                    .iter()
                    .filter(|issue| issue.severity >= Severity::Warning)
                    .map(|issue| ValidationIssue {
                        field: format!("{year}.{}", issue.field),
                        ..issue.clone()
                    }),
            );

            let (utilized, expired) = result
                .outcome
                .ledger_step()
                .map(|s| (s.utilized, s.expired))
                .unwrap_or((Decimal::ZERO, Decimal::ZERO));

            rows.push(ProjectionYear {
                year: i,
                assessment_year: year,
                projected_ebitda: result.ebitda.ebitda,
                interest_cap: result.ebitda.interest_cap,
                projected_interest: result.ebitda.interest_addback,
                covered_interest: result.interest.covered_interest,
                is_applicable: result.is_applicable,
                allowable_interest: result.allowable_interest,
                disallowed_interest: result.disallowed_interest,
                opening_carry_forward,
                carry_forward_utilized: utilized,
                carry_forward_expired: expired,
                closing_carry_forward: result.ledger.closing_balance(),
                tax_impact: (result.disallowed_interest - utilized) * tax_rate,
            });

            ledger = result.ledger;
        }

        let total_disallowance: Money = rows.iter().map(|r| r.disallowed_interest).sum();
        let total_utilized: Money = rows.iter().map(|r| r.carry_forward_utilized).sum();
        let total_expired: Money = rows.iter().map(|r| r.carry_forward_expired).sum();
        let net_disallowance = total_disallowance - total_utilized;

        Ok(MultiYearProjection {
            base_assessment_year: base_year,
            years: rows,
            total_disallowance,
            total_utilized,
            total_expired,
            net_disallowance,
            tax_rate,
            net_tax_impact: net_disallowance * tax_rate,
            closing_ledger: ledger,
            issues,
        })
    }
}

// ---------------------------------------------------------------------------
// Public API
// ---------------------------------------------------------------------------

/// Project the limitation and carry-forward ledger over future years under
/// the statutory rule tables.
pub fn project_forward(
    input: &ProjectionInput,
) -> ComplianceResult<ComputationOutput<MultiYearProjection>> {
    project_forward_with_rules(input, &RuleTables::default())
}

pub fn project_forward_with_rules(
    input: &ProjectionInput,
    rules: &RuleTables,
) -> ComplianceResult<ComputationOutput<MultiYearProjection>> {
    let start = Instant::now();
    let engine = InterestLimitationEngine::new(rules.clone())?;
    let result = engine.project_forward(input)?;

    let warnings: Vec<String> = result.issues.iter().map(|i| i.to_string()).collect();
    let elapsed = start.elapsed().as_micros() as u64;
    Ok(with_metadata(
        "Interest limitation projection: compounded synthetic years through the s.94B ledger",
        &serde_json::json!({
            "base_assessment_year": input.base_period.assessment_year,
            "years": input.years,
            "ebitda_growth": input.growth.ebitda_growth.to_string(),
            "interest_growth": input.growth.interest_growth.to_string(),
            "tax_rate": result.tax_rate.to_string(),
        }),
        warnings,
        elapsed,
        result,
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::interest_limitation::classifier::LenderClassification;
    use crate::interest_limitation::rules::InterestType;

    fn base_input(years: u32) -> ProjectionInput {
        ProjectionInput {
            base_period: FinancialPeriod {
                assessment_year: "2025-26".into(),
                profit_before_tax: dec!(15_000_000),
                total_interest_expense: dec!(15_000_000),
                depreciation: dec!(8_000_000),
                amortization: dec!(2_000_000),
                exceptional_items: None,
            },
            interest_lines: vec![InterestLineItem {
                lender_name: "Parent GmbH".into(),
                lender_classification: LenderClassification::NonResidentAssociate,
                lender_country: "DE".into(),
                principal: dec!(150_000_000),
                rate: dec!(0.10),
                amount: dec!(15_000_000),
                is_associated_enterprise: true,
                interest_type: InterestType::Interest,
            }],
            entity_exemption_code: None,
            opening_ledger: CarryForwardLedger::new(),
            years,
            growth: GrowthAssumptions {
                ebitda_growth: dec!(0.10),
                interest_growth: dec!(0.05),
                tax_rate: Some(dec!(0.25)),
            },
            inapplicable_period_aging: InapplicablePeriodAging::PreserveLedger,
        }
    }

    #[test]
    fn test_rows_and_years() {
        let engine = InterestLimitationEngine::statutory();
        let p = engine.project_forward(&base_input(3)).unwrap();
        assert_eq!(p.years.len(), 3);
        assert_eq!(p.years[0].assessment_year.to_string(), "2026-27");
        assert_eq!(p.years[2].assessment_year.to_string(), "2028-29");
    }

    #[test]
    fn test_compounding() {
        // Base EBITDA = 15 + 15 + 8 + 2 = 40M
        let engine = InterestLimitationEngine::statutory();
        let p = engine.project_forward(&base_input(2)).unwrap();
        assert_eq!(p.years[0].projected_ebitda, dec!(44_000_000));
        assert_eq!(p.years[1].projected_ebitda, dec!(48_400_000));
        assert_eq!(p.years[0].projected_interest, dec!(15_750_000));
        assert_eq!(p.years[0].covered_interest, dec!(15_750_000));
    }

    #[test]
    fn test_ledger_threads_between_years() {
        let engine = InterestLimitationEngine::statutory();
        let p = engine.project_forward(&base_input(3)).unwrap();
        for pair in p.years.windows(2) {
            assert_eq!(pair[1].opening_carry_forward, pair[0].closing_carry_forward);
        }
        assert_eq!(
            p.closing_ledger.closing_balance(),
            p.years[2].closing_carry_forward
        );
    }

    #[test]
    fn test_totals_and_tax_impact() {
        let engine = InterestLimitationEngine::statutory();
        let p = engine.project_forward(&base_input(1)).unwrap();
        // Year 1: cap = 44M * 0.3 = 13.2M, covered 15.75M, disallowed 2.55M
        assert_eq!(p.years[0].disallowed_interest, dec!(2_550_000));
        assert_eq!(p.total_disallowance, dec!(2_550_000));
        assert_eq!(p.net_tax_impact, dec!(637_500));
    }

    #[test]
    fn test_negative_growth_rejected() {
        let mut input = base_input(3);
        input.growth.ebitda_growth = dec!(-0.05);
        let err = InterestLimitationEngine::statutory()
            .project_forward(&input)
            .unwrap_err();
        assert!(matches!(err, ComplianceError::InvalidInput { .. }));
    }

    #[test]
    fn test_absurd_growth_and_horizon_rejected() {
        let mut input = base_input(3);
        input.growth.interest_growth = dec!(2.5);
        assert!(InterestLimitationEngine::statutory().project_forward(&input).is_err());

        let input = base_input(0);
        assert!(InterestLimitationEngine::statutory().project_forward(&input).is_err());

        let input = base_input(21);
        assert!(InterestLimitationEngine::statutory().project_forward(&input).is_err());
    }

    #[test]
    fn test_malformed_base_year_rejected() {
        let mut input = base_input(3);
        input.base_period.assessment_year = "2025".into();
        let err = InterestLimitationEngine::statutory()
            .project_forward(&input)
            .unwrap_err();
        assert!(matches!(err, ComplianceError::InvalidAssessmentYear(_)));
    }

    #[test]
    fn test_default_tax_rate_from_rules() {
        let mut input = base_input(1);
        input.growth.tax_rate = None;
        let p = InterestLimitationEngine::statutory().project_forward(&input).unwrap();
        assert_eq!(p.tax_rate, dec!(0.2517));
    }

    #[test]
    fn test_horizon_past_representable_years_rejected() {
        let mut input = base_input(5);
        input.base_period.assessment_year = "9995-96".into();
        let err = InterestLimitationEngine::statutory()
            .project_forward(&input)
            .unwrap_err();
        assert!(matches!(err, ComplianceError::InvalidInput { ref field, .. } if field == "years"));

        input.years = 3;
        let p = InterestLimitationEngine::statutory().project_forward(&input).unwrap();
        assert_eq!(p.years[2].assessment_year.to_string(), "9998-99");
        assert!(p.issues.iter().all(|i| i.severity < Severity::Critical));
    }

    #[test]
    fn test_out_of_range_base_figures_rejected() {
        let mut input = base_input(3);
        input.base_period.profit_before_tax = Decimal::MAX;
        input.base_period.total_interest_expense = Decimal::MAX;
        let err = InterestLimitationEngine::statutory()
            .project_forward(&input)
            .unwrap_err();
        assert!(matches!(err, ComplianceError::InvalidInput { .. }));
    }
}
