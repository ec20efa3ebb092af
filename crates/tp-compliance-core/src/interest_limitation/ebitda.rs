use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::error::ComplianceError;
use crate::types::*;
use crate::ComplianceResult;

/// Raw financial figures for one assessment year.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FinancialPeriod {
    /// Kept as text so a malformed year is reported rather than rejected.
    pub assessment_year: String,
    pub profit_before_tax: Money,
    pub total_interest_expense: Money,
    pub depreciation: Money,
    pub amortization: Money,
    /// Exceptional or extraordinary items deducted from EBITDA.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub exceptional_items: Option<Money>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EbitdaResult {
    pub profit_before_tax: Money,
    pub interest_addback: Money,
    pub depreciation_addback: Money,
    pub amortization_addback: Money,
    pub exceptional_adjustment: Money,
    pub ebitda: Money,
    pub cap_rate: Rate,
    /// May be negative; a negative cap allows no covered interest.
    pub interest_cap: Money,
}

/// EBITDA and the interest cap derived from it. Fails only when the figures
/// overflow the decimal range.
pub fn calculate_ebitda(period: &FinancialPeriod, cap_rate: Rate) -> ComplianceResult<EbitdaResult> {
    let exceptional_adjustment = period.exceptional_items.unwrap_or(Decimal::ZERO);
    let ebitda = period
        .profit_before_tax
        .checked_add(period.total_interest_expense)
        .and_then(|v| v.checked_add(period.depreciation))
        .and_then(|v| v.checked_add(period.amortization))
        .and_then(|v| v.checked_sub(exceptional_adjustment))
        .ok_or_else(|| overflow("financials", "EBITDA"))?;
    let interest_cap = ebitda
        .checked_mul(cap_rate)
        .ok_or_else(|| overflow("financials", "interest cap"))?;

    Ok(EbitdaResult {
        profit_before_tax: period.profit_before_tax,
        interest_addback: period.total_interest_expense,
        depreciation_addback: period.depreciation,
        amortization_addback: period.amortization,
        exceptional_adjustment,
        ebitda,
        cap_rate,
        interest_cap,
    })
}

fn overflow(field: &str, what: &str) -> ComplianceError {
    ComplianceError::InvalidInput {
        field: field.into(),
        reason: format!("{what} exceeds the representable decimal range"),
    }
}

pub(crate) fn ebitda_steps(result: &EbitdaResult) -> Vec<ComputationStep> {
    vec![
        ComputationStep::new(
            "EBITDA",
            format!(
                "PBT {} + interest {} + depreciation {} + amortization {} - exceptional {}",
                result.profit_before_tax,
                result.interest_addback,
                result.depreciation_addback,
                result.amortization_addback,
                result.exceptional_adjustment,
            ),
            result.ebitda,
        ),
        ComputationStep::new(
            "Interest cap",
            format!("EBITDA {} x {}", result.ebitda, result.cap_rate),
            result.interest_cap,
        ),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn period() -> FinancialPeriod {
        FinancialPeriod {
            assessment_year: "2025-26".into(),
            profit_before_tax: dec!(10_000_000),
            total_interest_expense: dec!(3_000_000),
            depreciation: dec!(2_000_000),
            amortization: dec!(500_000),
            exceptional_items: None,
        }
    }

    #[test]
    fn test_ebitda_and_cap() {
        let r = calculate_ebitda(&period(), dec!(0.30)).unwrap();
        assert_eq!(r.ebitda, dec!(15_500_000));
        assert_eq!(r.interest_cap, dec!(4_650_000));
    }

    #[test]
    fn test_exceptional_items_reduce_ebitda() {
        let mut p = period();
        p.exceptional_items = Some(dec!(1_500_000));
        let r = calculate_ebitda(&p, dec!(0.30)).unwrap();
        assert_eq!(r.exceptional_adjustment, dec!(1_500_000));
        assert_eq!(r.ebitda, dec!(14_000_000));
        assert_eq!(r.interest_cap, dec!(4_200_000));
    }

    #[test]
    fn test_negative_ebitda_propagates() {
        let mut p = period();
        p.profit_before_tax = dec!(-20_000_000);
        let r = calculate_ebitda(&p, dec!(0.30)).unwrap();
        assert_eq!(r.ebitda, dec!(-14_500_000));
        assert!(r.interest_cap < Decimal::ZERO);
    }

    #[test]
    fn test_steps_record_ebitda_and_cap() {
        let r = calculate_ebitda(&period(), dec!(0.30)).unwrap();
        let steps = ebitda_steps(&r);
        assert_eq!(steps.len(), 2);
        assert_eq!(steps[0].value, r.ebitda);
        assert_eq!(steps[1].value, r.interest_cap);
    }

    #[test]
    fn test_overflow_reported_not_panicking() {
        let mut p = period();
        p.profit_before_tax = Decimal::MAX;
        p.total_interest_expense = Decimal::MAX;
        assert!(matches!(
            calculate_ebitda(&p, dec!(0.30)),
            Err(ComplianceError::InvalidInput { .. })
        ));
    }
}
