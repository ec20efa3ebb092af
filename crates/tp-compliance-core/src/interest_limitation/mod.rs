//! Interest limitation on associated-enterprise debt (s.94B) with a
//! multi-year carry-forward ledger.
//!
//! Data flows one way: [`rules`] feeds every stage, [`ebitda`] and
//! [`classifier`] feed [`resolver`], the resolver hands disallowances to
//! [`ledger`], and [`projection`] iterates the whole chain over synthetic
//! future years.

pub mod classifier;
pub mod ebitda;
pub mod engine;
pub mod ledger;
pub mod resolver;
pub mod rules;
pub mod validation;

#[cfg(feature = "projection")]
pub mod projection;

pub use engine::{
    compute_period, compute_period_with_rules, InterestLimitationEngine, InterestLimitationInput,
    LimitationResult,
};
pub use ledger::{
    advance_ledger, CarryForwardDeposit, CarryForwardLedger, LedgerAdvance, LedgerAdvanceInput,
    LedgerStep,
};
pub use resolver::{InapplicablePeriodAging, LimitationOutcome};
pub use rules::RuleTables;
pub use validation::{Severity, ValidationIssue};

#[cfg(feature = "projection")]
pub use projection::{
    project_forward, project_forward_with_rules, GrowthAssumptions, MultiYearProjection,
    ProjectionInput,
};
