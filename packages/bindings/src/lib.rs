use napi::Result as NapiResult;
use napi_derive::napi;

use tp_compliance_core::interest_limitation::{
    self, InterestLimitationInput, LedgerAdvanceInput, ProjectionInput, RuleTables,
};

/// Convert any Display error into a napi::Error.
fn to_napi_error(e: impl std::fmt::Display) -> napi::Error {
    napi::Error::from_reason(e.to_string())
}

/// Statutory tables, or the caller's override document when supplied.
fn parse_rules(rules_json: Option<String>) -> NapiResult<RuleTables> {
    let rules = match rules_json {
        Some(json) => serde_json::from_str::<RuleTables>(&json).map_err(to_napi_error)?,
        None => RuleTables::default(),
    };
    rules.validate().map_err(to_napi_error)?;
    Ok(rules)
}

// ---------------------------------------------------------------------------
// Interest limitation
// ---------------------------------------------------------------------------

#[napi]
pub fn compute_period(input_json: String, rules_json: Option<String>) -> NapiResult<String> {
    let input: InterestLimitationInput =
        serde_json::from_str(&input_json).map_err(to_napi_error)?;
    let rules = parse_rules(rules_json)?;
    let output =
        interest_limitation::compute_period_with_rules(&input, &rules).map_err(to_napi_error)?;
    serde_json::to_string(&output).map_err(to_napi_error)
}

#[napi]
pub fn project_forward(input_json: String, rules_json: Option<String>) -> NapiResult<String> {
    let input: ProjectionInput = serde_json::from_str(&input_json).map_err(to_napi_error)?;
    let rules = parse_rules(rules_json)?;
    let output =
        interest_limitation::project_forward_with_rules(&input, &rules).map_err(to_napi_error)?;
    serde_json::to_string(&output).map_err(to_napi_error)
}

// ---------------------------------------------------------------------------
// Carry-forward ledger
// ---------------------------------------------------------------------------

#[napi]
pub fn advance_ledger(input_json: String, rules_json: Option<String>) -> NapiResult<String> {
    let input: LedgerAdvanceInput = serde_json::from_str(&input_json).map_err(to_napi_error)?;
    let rules = parse_rules(rules_json)?;
    let output = interest_limitation::advance_ledger(&input, &rules).map_err(to_napi_error)?;
    serde_json::to_string(&output).map_err(to_napi_error)
}

// ---------------------------------------------------------------------------
// Rule tables
// ---------------------------------------------------------------------------

/// Statutory rule tables, plus the per-year view when a year is given.
#[napi]
pub fn rule_tables(assessment_year: Option<String>) -> NapiResult<String> {
    let rules = RuleTables::default();
    let value = match assessment_year {
        Some(ay) => {
            let year = ay.parse().map_err(to_napi_error)?;
            serde_json::json!({ "rules": rules, "period": rules.for_year(year) })
        }
        None => serde_json::json!({ "rules": rules }),
    };
    serde_json::to_string(&value).map_err(to_napi_error)
}
