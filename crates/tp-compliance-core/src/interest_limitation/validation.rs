use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;

use super::engine::InterestLimitationInput;
use super::rules::{check_amount, RuleTables};
use crate::types::*;
use crate::ComplianceResult;

/// Ordered from least to most severe.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Severity {
    Info,
    Warning,
    Error,
    Critical,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Severity::Info => "info",
            Severity::Warning => "warning",
            Severity::Error => "error",
            Severity::Critical => "critical",
        };
        f.write_str(label)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationIssue {
    pub severity: Severity,
    pub field: String,
    pub message: String,
}

impl ValidationIssue {
    pub fn new(severity: Severity, field: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            severity,
            field: field.into(),
            message: message.into(),
        }
    }
}

impl fmt::Display for ValidationIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}: {}", self.severity, self.field, self.message)
    }
}

/// True when any issue should stop a filing workflow.
pub fn has_blocking_issues(issues: &[ValidationIssue]) -> bool {
    issues.iter().any(|i| i.severity >= Severity::Error)
}

/// Hard range check on every monetary input. Figures beyond the ceiling
/// could overflow the decimal arithmetic downstream.
pub fn check_amount_ranges(input: &InterestLimitationInput) -> ComplianceResult<()> {
    if let Some(f) = &input.financials {
        check_amount("financials.profit_before_tax", f.profit_before_tax)?;
        check_amount("financials.total_interest_expense", f.total_interest_expense)?;
        check_amount("financials.depreciation", f.depreciation)?;
        check_amount("financials.amortization", f.amortization)?;
        if let Some(exceptional) = f.exceptional_items {
            check_amount("financials.exceptional_items", exceptional)?;
        }
    }
    for (i, line) in input.interest_lines.iter().enumerate() {
        check_amount(&format!("interest_lines[{i}].amount"), line.amount)?;
        check_amount(&format!("interest_lines[{i}].principal"), line.principal)?;
        check_amount(&format!("interest_lines[{i}].rate"), line.rate)?;
    }
    for deposit in &input.prior_ledger.deposits {
        let field = format!("prior_ledger[{}]", deposit.origin);
        check_amount(&field, deposit.original_amount)?;
        check_amount(&field, deposit.utilized)?;
        check_amount(&field, deposit.remaining)?;
    }
    Ok(())
}

/// Structural checks on a period input. Never fails: problems are returned
/// as issues next to the parsed assessment year, which is `None` when the
/// year is malformed.
pub fn validate_period(
    input: &InterestLimitationInput,
    rules: &RuleTables,
) -> (Option<AssessmentYear>, Vec<ValidationIssue>) {
    let mut issues: Vec<ValidationIssue> = Vec::new();

    let year = match input.assessment_year.parse::<AssessmentYear>() {
        Ok(year) => Some(year),
        Err(e) => {
            issues.push(ValidationIssue::new(
                Severity::Critical,
                "assessment_year",
                format!("{e}; carry-forward ledger not updated"),
            ));
            None
        }
    };

    if let Some(year) = year {
        if !rules.for_year(year).in_force {
            issues.push(ValidationIssue::new(
                Severity::Warning,
                "assessment_year",
                format!(
                    "Interest limitation applies from {}; {} computed under current parameters",
                    rules.effective_from, year
                ),
            ));
        }
    }

    if let Some(financials) = &input.financials {
        if financials.assessment_year.trim() != input.assessment_year.trim() {
            issues.push(ValidationIssue::new(
                Severity::Warning,
                "financials.assessment_year",
                format!(
                    "Financial period {} does not match computation year {}",
                    financials.assessment_year, input.assessment_year
                ),
            ));
        }
        let non_negative = [
            ("financials.total_interest_expense", financials.total_interest_expense),
            ("financials.depreciation", financials.depreciation),
            ("financials.amortization", financials.amortization),
        ];
        for (field, value) in non_negative {
            if value < Decimal::ZERO {
                issues.push(ValidationIssue::new(
                    Severity::Error,
                    field,
                    format!("Must be non-negative (got {value})"),
                ));
            }
        }
    }

    if input.interest_lines.is_empty() {
        issues.push(ValidationIssue::new(
            Severity::Warning,
            "interest_lines",
            "No interest line items supplied; covered interest treated as zero",
        ));
    }

    for (i, line) in input.interest_lines.iter().enumerate() {
        let checks = [
            ("amount", line.amount),
            ("principal", line.principal),
            ("rate", line.rate),
        ];
        for (name, value) in checks {
            if value < Decimal::ZERO {
                issues.push(ValidationIssue::new(
                    Severity::Error,
                    format!("interest_lines[{i}].{name}"),
                    format!("{} must be non-negative (got {value})", line.lender_name),
                ));
            }
        }
    }

    if let Some(financials) = &input.financials {
        if !input.interest_lines.is_empty() {
            let line_total: Money = input.interest_lines.iter().map(|l| l.amount).sum();
            if line_total != financials.total_interest_expense {
                issues.push(ValidationIssue::new(
                    Severity::Info,
                    "interest_lines",
                    format!(
                        "Line items total {} against reported interest expense {}",
                        line_total, financials.total_interest_expense
                    ),
                ));
            }
        }
    }

    if let Some(code) = &input.entity_exemption_code {
        if !code.trim().is_empty() && rules.exemption_for(code).is_none() {
            issues.push(ValidationIssue::new(
                Severity::Warning,
                "entity_exemption_code",
                format!("Unknown exemption code '{code}'; entity treated as not exempt"),
            ));
        }
    }

    for deposit in &input.prior_ledger.deposits {
        let field = format!("prior_ledger[{}]", deposit.origin);
        if !deposit.is_conserved() {
            issues.push(ValidationIssue::new(
                Severity::Error,
                field.clone(),
                format!(
                    "utilized {} + remaining {} does not equal original {}",
                    deposit.utilized, deposit.remaining, deposit.original_amount
                ),
            ));
        }
        if let Some(year) = year {
            if deposit.origin >= year {
                issues.push(ValidationIssue::new(
                    Severity::Warning,
                    field,
                    format!("Deposit originates in or after {year}; it will not be utilized"),
                ));
            }
        }
    }

    (year, issues)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::interest_limitation::classifier::{InterestLineItem, LenderClassification};
    use crate::interest_limitation::ebitda::FinancialPeriod;
    use crate::interest_limitation::ledger::{CarryForwardDeposit, CarryForwardLedger};
    use crate::interest_limitation::resolver::InapplicablePeriodAging;
    use crate::interest_limitation::rules::InterestType;
    use rust_decimal_macros::dec;

    fn clean_input() -> InterestLimitationInput {
        InterestLimitationInput {
            assessment_year: "2025-26".into(),
            financials: Some(FinancialPeriod {
                assessment_year: "2025-26".into(),
                profit_before_tax: dec!(10_000_000),
                total_interest_expense: dec!(3_000_000),
                depreciation: dec!(2_000_000),
                amortization: dec!(500_000),
                exceptional_items: None,
            }),
            interest_lines: vec![InterestLineItem {
                lender_name: "Parent BV".into(),
                lender_classification: LenderClassification::NonResidentAssociate,
                lender_country: "NL".into(),
                principal: dec!(30_000_000),
                rate: dec!(0.10),
                amount: dec!(3_000_000),
                is_associated_enterprise: true,
                interest_type: InterestType::Interest,
            }],
            entity_exemption_code: None,
            prior_ledger: CarryForwardLedger::new(),
            inapplicable_period_aging: InapplicablePeriodAging::PreserveLedger,
        }
    }

    #[test]
    fn test_clean_input_has_no_issues() {
        let (year, issues) = validate_period(&clean_input(), &RuleTables::default());
        assert_eq!(year.map(|y| y.to_string()), Some("2025-26".to_string()));
        assert!(issues.is_empty(), "unexpected issues: {issues:?}");
    }

    #[test]
    fn test_malformed_year_is_critical() {
        let mut input = clean_input();
        input.assessment_year = "FY2025".into();
        let (year, issues) = validate_period(&input, &RuleTables::default());
        assert!(year.is_none());
        assert!(issues.iter().any(|i| i.severity == Severity::Critical));
        assert!(has_blocking_issues(&issues));
    }

    #[test]
    fn test_negative_fields_are_errors() {
        let mut input = clean_input();
        if let Some(f) = input.financials.as_mut() {
            f.depreciation = dec!(-1);
        }
        input.interest_lines[0].rate = dec!(-0.01);
        let (_, issues) = validate_period(&input, &RuleTables::default());
        let errors: Vec<&ValidationIssue> =
            issues.iter().filter(|i| i.severity == Severity::Error).collect();
        assert_eq!(errors.len(), 2);
        assert!(errors.iter().any(|i| i.field == "financials.depreciation"));
        assert!(errors.iter().any(|i| i.field == "interest_lines[0].rate"));
    }

    #[test]
    fn test_empty_lines_is_warning_only() {
        let mut input = clean_input();
        input.interest_lines.clear();
        let (_, issues) = validate_period(&input, &RuleTables::default());
        assert_eq!(issues.len(), 1);
        assert_eq!(issues[0].severity, Severity::Warning);
        assert!(!has_blocking_issues(&issues));
    }

    #[test]
    fn test_unknown_exemption_code_warned() {
        let mut input = clean_input();
        input.entity_exemption_code = Some("SHIPPING".into());
        let (_, issues) = validate_period(&input, &RuleTables::default());
        assert!(issues.iter().any(|i| i.field == "entity_exemption_code"));
    }

    #[test]
    fn test_pre_effective_year_warned() {
        let mut input = clean_input();
        input.assessment_year = "2016-17".into();
        if let Some(f) = input.financials.as_mut() {
            f.assessment_year = "2016-17".into();
        }
        let (_, issues) = validate_period(&input, &RuleTables::default());
        assert_eq!(issues.len(), 1);
        assert!(issues[0].message.contains("2018-19"));
    }

    #[test]
    fn test_ledger_problems_reported() {
        let mut input = clean_input();
        let mut broken = CarryForwardDeposit::new("2020-21".parse().unwrap(), dec!(100), 8);
        broken.remaining = dec!(90);
        let future = CarryForwardDeposit::new("2026-27".parse().unwrap(), dec!(100), 8);
        input.prior_ledger = CarryForwardLedger::from_deposits(vec![broken, future]);
        let (_, issues) = validate_period(&input, &RuleTables::default());
        assert!(issues
            .iter()
            .any(|i| i.severity == Severity::Error && i.field == "prior_ledger[2020-21]"));
        assert!(issues
            .iter()
            .any(|i| i.severity == Severity::Warning && i.field == "prior_ledger[2026-27]"));
    }

    #[test]
    fn test_issue_display() {
        let issue = ValidationIssue::new(Severity::Warning, "interest_lines", "empty");
        assert_eq!(issue.to_string(), "[warning] interest_lines: empty");
    }

    #[test]
    fn test_amount_ceiling() {
        let mut input = clean_input();
        assert!(check_amount_ranges(&input).is_ok());

        if let Some(f) = input.financials.as_mut() {
            f.profit_before_tax = Decimal::MAX;
        }
        assert!(check_amount_ranges(&input).is_err());

        let mut input = clean_input();
        input.interest_lines[0].amount = -Decimal::MAX;
        let err = check_amount_ranges(&input).unwrap_err();
        assert!(err.to_string().contains("interest_lines[0].amount"));
    }
}
