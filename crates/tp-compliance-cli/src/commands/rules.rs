use clap::Args;
use serde_json::Value;
use std::time::Instant;

use tp_compliance_core::interest_limitation::RuleTables;
use tp_compliance_core::{with_metadata, AssessmentYear};

/// Arguments for printing the rule tables
#[derive(Args)]
pub struct RulesArgs {
    /// Assessment year to resolve (defaults to the current year)
    #[arg(long)]
    pub assessment_year: Option<String>,
}

pub fn run_rules(args: RulesArgs, rules: &RuleTables) -> Result<Value, Box<dyn std::error::Error>> {
    let start = Instant::now();
    let year = match args.assessment_year {
        Some(ref ay) => ay.parse::<AssessmentYear>()?,
        None => AssessmentYear::current(),
    };

    let period = rules.for_year(year);
    let mut warnings = Vec::new();
    if !period.in_force {
        warnings.push(format!(
            "{} precedes {}, the first year the limitation applies",
            year, rules.effective_from
        ));
    }

    let output = with_metadata(
        "Rule tables in force for one assessment year",
        rules,
        warnings,
        start.elapsed().as_micros() as u64,
        period,
    );
    Ok(serde_json::to_value(output)?)
}
