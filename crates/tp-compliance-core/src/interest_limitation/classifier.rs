use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;

use super::rules::{InterestType, RuleTables};
use crate::types::*;

// ---------------------------------------------------------------------------
// Input Types
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum LenderClassification {
    ResidentNonAssociate,
    NonResidentAssociate,
    /// Non-associate lender whose loan is guaranteed by an associate.
    NonResidentGuaranteed,
    /// Resident lender funded by a matching deposit from an associate.
    ResidentFundedByAssociateDeposit,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InterestLineItem {
    pub lender_name: String,
    pub lender_classification: LenderClassification,
    pub lender_country: String,
    pub principal: Money,
    pub rate: Rate,
    pub amount: Money,
    pub is_associated_enterprise: bool,
    #[serde(default)]
    pub interest_type: InterestType,
}

// ---------------------------------------------------------------------------
// Output Types
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ExclusionReason {
    NotAssociatedEnterprise,
    ResidentNonAssociateLender,
    InterestTypeNotCovered,
}

impl fmt::Display for ExclusionReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            ExclusionReason::NotAssociatedEnterprise => "not an associated enterprise",
            ExclusionReason::ResidentNonAssociateLender => "resident non-associate lender",
            ExclusionReason::InterestTypeNotCovered => "interest type not covered",
        };
        f.write_str(text)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClassifiedInterestLine {
    pub lender_name: String,
    pub lender_classification: LenderClassification,
    pub lender_country: String,
    pub amount: Money,
    pub covered: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub exclusion_reason: Option<ExclusionReason>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InterestAnalysis {
    pub total_interest: Money,
    pub covered_interest: Money,
    pub not_covered_interest: Money,
    pub lines: Vec<ClassifiedInterestLine>,
    pub threshold: Money,
    pub exceeds_threshold: bool,
}

// ---------------------------------------------------------------------------
// Classification
// ---------------------------------------------------------------------------

/// Why a line falls outside the limitation, or `None` when it is covered.
/// Conditions are tested in a fixed order so the first failing one is reported.
pub fn exclusion_reason(line: &InterestLineItem, rules: &RuleTables) -> Option<ExclusionReason> {
    if !line.is_associated_enterprise {
        Some(ExclusionReason::NotAssociatedEnterprise)
    } else if line.lender_classification == LenderClassification::ResidentNonAssociate {
        Some(ExclusionReason::ResidentNonAssociateLender)
    } else if !rules.is_covered_type(line.interest_type) {
        Some(ExclusionReason::InterestTypeNotCovered)
    } else {
        None
    }
}

/// Partition interest lines into covered and not-covered, and test the
/// covered subtotal against the monetary threshold.
pub fn classify_interest(lines: &[InterestLineItem], rules: &RuleTables) -> InterestAnalysis {
    let mut covered_interest = Decimal::ZERO;
    let mut not_covered_interest = Decimal::ZERO;

    let classified: Vec<ClassifiedInterestLine> = lines
        .iter()
        .map(|line| {
            let reason = exclusion_reason(line, rules);
            if reason.is_none() {
                covered_interest += line.amount;
            } else {
                not_covered_interest += line.amount;
            }
            ClassifiedInterestLine {
                lender_name: line.lender_name.clone(),
                lender_classification: line.lender_classification,
                lender_country: line.lender_country.clone(),
                amount: line.amount,
                covered: reason.is_none(),
                exclusion_reason: reason,
            }
        })
        .collect();

    InterestAnalysis {
        total_interest: covered_interest + not_covered_interest,
        covered_interest,
        not_covered_interest,
        lines: classified,
        threshold: rules.threshold,
        exceeds_threshold: covered_interest > rules.threshold,
    }
}

pub(crate) fn interest_steps(analysis: &InterestAnalysis) -> Vec<ComputationStep> {
    let covered_count = analysis.lines.iter().filter(|l| l.covered).count();
    vec![
        ComputationStep::new(
            "Covered interest",
            format!(
                "sum of {} covered of {} lines",
                covered_count,
                analysis.lines.len()
            ),
            analysis.covered_interest,
        ),
        ComputationStep::new(
            "Threshold test",
            format!(
                "covered {} > threshold {} = {}",
                analysis.covered_interest, analysis.threshold, analysis.exceeds_threshold
            ),
            analysis.threshold,
        ),
    ]
}
