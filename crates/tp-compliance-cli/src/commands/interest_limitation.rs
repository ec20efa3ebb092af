use clap::Args;
use rust_decimal::Decimal;
use serde_json::Value;

use tp_compliance_core::interest_limitation::classifier::{InterestLineItem, LenderClassification};
use tp_compliance_core::interest_limitation::ebitda::FinancialPeriod;
use tp_compliance_core::interest_limitation::rules::InterestType;
use tp_compliance_core::interest_limitation::{
    self, CarryForwardLedger, InapplicablePeriodAging, InterestLimitationInput,
    LedgerAdvanceInput, ProjectionInput, RuleTables,
};

use crate::input;

/// Arguments for a single-year interest limitation computation
#[derive(Args)]
#[command(allow_hyphen_values = true)]
pub struct LimitationArgs {
    /// Path to JSON or YAML input file (overrides individual flags)
    #[arg(long)]
    pub input: Option<String>,

    /// Assessment year, e.g. 2025-26
    #[arg(long)]
    pub assessment_year: Option<String>,

    /// Profit before tax
    #[arg(long)]
    pub pbt: Option<Decimal>,

    /// Total interest expense charged to profit
    #[arg(long)]
    pub interest: Option<Decimal>,

    /// Depreciation
    #[arg(long, default_value = "0")]
    pub depreciation: Decimal,

    /// Amortization
    #[arg(long, default_value = "0")]
    pub amortization: Decimal,

    /// Exceptional items already included in profit before tax
    #[arg(long)]
    pub exceptional: Option<Decimal>,

    /// Interest paid to non-resident associated enterprises; the rest of
    /// --interest is treated as paid to resident unrelated lenders
    #[arg(long, alias = "covered-interest")]
    pub ae_interest: Option<Decimal>,

    /// Entity exemption code (BANKING, INSURANCE, ...)
    #[arg(long)]
    pub exemption_code: Option<String>,

    /// Carry-forward ledger brought in from the prior year (JSON or YAML)
    #[arg(long)]
    pub ledger: Option<String>,

    /// Expire stale deposits even in years where the limitation does not apply
    #[arg(long)]
    pub age_ledger: bool,
}

/// Arguments for a multi-year projection
#[derive(Args)]
pub struct ProjectArgs {
    /// Path to JSON or YAML input file
    #[arg(long)]
    pub input: Option<String>,

    /// Override the number of projected years
    #[arg(long)]
    pub years: Option<u32>,

    /// Expire stale deposits even in years where the limitation does not apply
    #[arg(long)]
    pub age_ledger: bool,
}

/// Arguments for a standalone carry-forward ledger step
#[derive(Args)]
pub struct CarryForwardArgs {
    /// Path to JSON or YAML input file (overrides individual flags)
    #[arg(long)]
    pub input: Option<String>,

    /// Assessment year being applied
    #[arg(long)]
    pub assessment_year: Option<String>,

    /// Existing ledger document (JSON or YAML); empty when omitted
    #[arg(long)]
    pub ledger: Option<String>,

    /// Cap not consumed by the year's own covered interest
    #[arg(long, default_value = "0")]
    pub available_cap: Decimal,

    /// Interest disallowed in the year
    #[arg(long, default_value = "0")]
    pub disallowance: Decimal,

    /// Carry-forward window in years (rule tables when omitted)
    #[arg(long)]
    pub carry_forward_years: Option<u32>,
}

pub fn run_limitation(
    args: LimitationArgs,
    rules: &RuleTables,
) -> Result<Value, Box<dyn std::error::Error>> {
    let mut period_input: InterestLimitationInput = if let Some(ref path) = args.input {
        input::file::read_document(path)?
    } else if let Some(document) = input::stdin::read_stdin()? {
        document
    } else {
        limitation_from_flags(&args)?
    };
    if args.age_ledger {
        period_input.inapplicable_period_aging = InapplicablePeriodAging::AgeLedger;
    }

    let result = interest_limitation::compute_period_with_rules(&period_input, rules)?;
    Ok(serde_json::to_value(result)?)
}

fn limitation_from_flags(
    args: &LimitationArgs,
) -> Result<InterestLimitationInput, Box<dyn std::error::Error>> {
    let assessment_year = args
        .assessment_year
        .clone()
        .ok_or("--assessment-year is required (or provide --input)")?;
    let total_interest = args
        .interest
        .ok_or("--interest is required (or provide --input)")?;
    let ae_interest = args.ae_interest.unwrap_or(total_interest);
    if ae_interest > total_interest {
        return Err("--ae-interest cannot exceed --interest".into());
    }

    let mut interest_lines = vec![flag_line(
        "Associated enterprise lender",
        LenderClassification::NonResidentAssociate,
        ae_interest,
        true,
    )];
    let other_interest = total_interest - ae_interest;
    if other_interest > Decimal::ZERO {
        interest_lines.push(flag_line(
            "Resident lenders",
            LenderClassification::ResidentNonAssociate,
            other_interest,
            false,
        ));
    }

    let prior_ledger = match args.ledger {
        Some(ref path) => input::file::read_document::<CarryForwardLedger>(path)?,
        None => CarryForwardLedger::new(),
    };

    Ok(InterestLimitationInput {
        assessment_year: assessment_year.clone(),
        financials: Some(FinancialPeriod {
            assessment_year,
            profit_before_tax: args.pbt.ok_or("--pbt is required (or provide --input)")?,
            total_interest_expense: total_interest,
            depreciation: args.depreciation,
            amortization: args.amortization,
            exceptional_items: args.exceptional,
        }),
        interest_lines,
        entity_exemption_code: args.exemption_code.clone(),
        prior_ledger,
        inapplicable_period_aging: InapplicablePeriodAging::default(),
    })
}

fn flag_line(
    lender_name: &str,
    lender_classification: LenderClassification,
    amount: Decimal,
    is_associated_enterprise: bool,
) -> InterestLineItem {
    InterestLineItem {
        lender_name: lender_name.to_string(),
        lender_classification,
        lender_country: String::new(),
        principal: Decimal::ZERO,
        rate: Decimal::ZERO,
        amount,
        is_associated_enterprise,
        interest_type: InterestType::Interest,
    }
}

pub fn run_project(
    args: ProjectArgs,
    rules: &RuleTables,
) -> Result<Value, Box<dyn std::error::Error>> {
    let mut projection_input: ProjectionInput = if let Some(ref path) = args.input {
        input::file::read_document(path)?
    } else if let Some(document) = input::stdin::read_stdin()? {
        document
    } else {
        return Err("--input <file> or stdin required for projection".into());
    };
    if let Some(years) = args.years {
        projection_input.years = years;
    }
    if args.age_ledger {
        projection_input.inapplicable_period_aging = InapplicablePeriodAging::AgeLedger;
    }

    let result = interest_limitation::project_forward_with_rules(&projection_input, rules)?;
    Ok(serde_json::to_value(result)?)
}

pub fn run_carry_forward(
    args: CarryForwardArgs,
    rules: &RuleTables,
) -> Result<Value, Box<dyn std::error::Error>> {
    let advance_input: LedgerAdvanceInput = if let Some(ref path) = args.input {
        input::file::read_document(path)?
    } else if let Some(document) = input::stdin::read_stdin()? {
        document
    } else {
        let ledger = match args.ledger {
            Some(ref path) => input::file::read_document::<CarryForwardLedger>(path)?,
            None => CarryForwardLedger::new(),
        };
        LedgerAdvanceInput {
            assessment_year: args
                .assessment_year
                .ok_or("--assessment-year is required (or provide --input)")?,
            ledger,
            available_cap: args.available_cap,
            disallowance: args.disallowance,
            carry_forward_years: args.carry_forward_years,
        }
    };

    let result = interest_limitation::advance_ledger(&advance_input, rules)?;
    Ok(serde_json::to_value(result)?)
}
