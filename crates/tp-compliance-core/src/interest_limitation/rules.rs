use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};

use crate::error::ComplianceError;
use crate::types::*;
use crate::ComplianceResult;

// ---------------------------------------------------------------------------
// Statutory constants (s.94B, Income-tax Act 1961)
// ---------------------------------------------------------------------------

/// Share of EBITDA allowed as covered interest.
pub const STATUTORY_CAP_RATE: Rate = dec!(0.30);

/// One crore rupees. Covered interest must exceed this for the cap to apply.
pub const STATUTORY_THRESHOLD: Money = dec!(10_000_000);

/// Assessment years a disallowance may be carried forward.
pub const STATUTORY_CARRY_FORWARD_YEARS: u32 = 8;

/// Longest carry-forward window accepted from overrides or callers.
pub const MAX_CARRY_FORWARD_YEARS: u32 = 20;

/// Largest magnitude accepted for any single monetary input. Keeps every
/// sum and growth-compounded product inside the decimal range.
pub const MAX_MONETARY_AMOUNT: Money = dec!(100_000_000_000_000_000_000);

/// First assessment year the limitation applies to (Finance Act 2017).
pub const STATUTORY_EFFECTIVE_FROM: AssessmentYear = AssessmentYear::from_leading_year(2018);

/// Corporate rate used to express disallowances as tax. s.115BAA base rate
/// of 22% with 10% surcharge and 4% cess.
pub const DEFAULT_ASSUMED_TAX_RATE: Rate = dec!(0.2517);

// ---------------------------------------------------------------------------
// Rule table types
// ---------------------------------------------------------------------------

/// Nature of the financing cost on an interest line.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum InterestType {
    #[default]
    Interest,
    /// Discount, premium or fees of an interest nature on debt.
    SimilarConsideration,
    Other,
}

/// An entity category the limitation does not apply to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExemptionRule {
    pub code: String,
    pub description: String,
}

fn default_exemptions() -> Vec<ExemptionRule> {
    [
        ("BANKING", "Indian company or permanent establishment engaged in banking business"),
        ("INSURANCE", "Indian company or permanent establishment engaged in insurance business"),
        ("NOTIFIED_NBFC", "Non-banking financial company of a class notified by the Central Government"),
        ("IFSC_FINANCE_COMPANY", "Finance company located in an International Financial Services Centre"),
    ]
    .into_iter()
    .map(|(code, description)| ExemptionRule {
        code: code.to_string(),
        description: description.to_string(),
    })
    .collect()
}

fn default_covered_types() -> Vec<InterestType> {
    vec![InterestType::Interest, InterestType::SimilarConsideration]
}

/// Reference data driving every stage of the engine.
///
/// `Default` yields the statutory tables; every field may be overridden from
/// a configuration document, missing fields falling back to the statute.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RuleTables {
    pub cap_rate: Rate,
    pub threshold: Money,
    pub carry_forward_years: u32,
    pub effective_from: AssessmentYear,
    pub assumed_tax_rate: Rate,
    pub exemptions: Vec<ExemptionRule>,
    pub covered_interest_types: Vec<InterestType>,
}

impl Default for RuleTables {
    fn default() -> Self {
        Self {
            cap_rate: STATUTORY_CAP_RATE,
            threshold: STATUTORY_THRESHOLD,
            carry_forward_years: STATUTORY_CARRY_FORWARD_YEARS,
            effective_from: STATUTORY_EFFECTIVE_FROM,
            assumed_tax_rate: DEFAULT_ASSUMED_TAX_RATE,
            exemptions: default_exemptions(),
            covered_interest_types: default_covered_types(),
        }
    }
}

/// Parameters in force for a single assessment year.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PeriodRules {
    pub assessment_year: AssessmentYear,
    pub in_force: bool,
    pub cap_rate: Rate,
    pub threshold: Money,
    pub carry_forward_years: u32,
    /// First assessment year in which a disallowance arising in this year can
    /// no longer be set off.
    pub carry_forward_expiry: AssessmentYear,
}

impl RuleTables {
    /// Case-insensitive lookup of an entity exemption code.
    pub fn exemption_for(&self, code: &str) -> Option<&ExemptionRule> {
        let code = code.trim();
        self.exemptions
            .iter()
            .find(|rule| rule.code.eq_ignore_ascii_case(code))
    }

    pub fn is_covered_type(&self, interest_type: InterestType) -> bool {
        self.covered_interest_types.contains(&interest_type)
    }

    pub fn for_year(&self, assessment_year: AssessmentYear) -> PeriodRules {
        PeriodRules {
            assessment_year,
            in_force: assessment_year >= self.effective_from,
            cap_rate: self.cap_rate,
            threshold: self.threshold,
            carry_forward_years: self.carry_forward_years,
            carry_forward_expiry: carry_forward_expiry(assessment_year, self.carry_forward_years),
        }
    }

    /// Rejects tables that would make the engine meaningless.
    pub fn validate(&self) -> ComplianceResult<()> {
        if self.cap_rate < Decimal::ZERO || self.cap_rate > Decimal::ONE {
            return Err(ComplianceError::InvalidInput {
                field: "rules.cap_rate".into(),
                reason: "Cap rate must be between 0 and 1".into(),
            });
        }
        if self.threshold < Decimal::ZERO {
            return Err(ComplianceError::InvalidInput {
                field: "rules.threshold".into(),
                reason: "Threshold must be non-negative".into(),
            });
        }
        check_carry_forward_years("rules.carry_forward_years", self.carry_forward_years)?;
        if self.assumed_tax_rate < Decimal::ZERO || self.assumed_tax_rate > Decimal::ONE {
            return Err(ComplianceError::InvalidInput {
                field: "rules.assumed_tax_rate".into(),
                reason: "Tax rate must be between 0 and 1".into(),
            });
        }
        Ok(())
    }
}

/// First assessment year in which a disallowance arising in `origin` can no
/// longer be set off.
pub fn carry_forward_expiry(origin: AssessmentYear, carry_forward_years: u32) -> AssessmentYear {
    origin.offset(i32::try_from(carry_forward_years).unwrap_or(i32::MAX))
}

pub(crate) fn check_amount(field: &str, value: Money) -> ComplianceResult<()> {
    if value.abs() > MAX_MONETARY_AMOUNT {
        return Err(ComplianceError::InvalidInput {
            field: field.into(),
            reason: format!("Magnitude exceeds {MAX_MONETARY_AMOUNT} (got {value})"),
        });
    }
    Ok(())
}

pub(crate) fn check_carry_forward_years(field: &str, years: u32) -> ComplianceResult<()> {
    if !(1..=MAX_CARRY_FORWARD_YEARS).contains(&years) {
        return Err(ComplianceError::InvalidInput {
            field: field.into(),
            reason: format!(
                "Carry-forward window must be between 1 and {MAX_CARRY_FORWARD_YEARS} years (got {years})"
            ),
        });
    }
    Ok(())
}
