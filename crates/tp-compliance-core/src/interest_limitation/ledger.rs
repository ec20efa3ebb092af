//! Carry-forward ledger of disallowed interest.
//!
//! Each assessment year that produces a disallowance appends one deposit.
//! Later years absorb deposits oldest-first against unused cap headroom, and
//! a deposit that reaches its expiry year is written off before any
//! utilization is attempted. Deposits are never removed; an exhausted or
//! expired deposit stays in the ledger at zero balance for audit.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::time::Instant;

use super::rules::{check_amount, check_carry_forward_years, carry_forward_expiry, RuleTables};
use crate::error::ComplianceError;
use crate::types::*;
use crate::ComplianceResult;

// ---------------------------------------------------------------------------
// Ledger state
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DepositUtilization {
    pub assessment_year: AssessmentYear,
    pub amount: Money,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CarryForwardDeposit {
    pub origin: AssessmentYear,
    pub original_amount: Money,
    pub utilized: Money,
    pub remaining: Money,
    pub expiry: AssessmentYear,
    #[serde(default)]
    pub expired: bool,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub utilizations: Vec<DepositUtilization>,
}

impl CarryForwardDeposit {
    pub fn new(origin: AssessmentYear, amount: Money, carry_forward_years: u32) -> Self {
        Self {
            origin,
            original_amount: amount,
            utilized: Decimal::ZERO,
            remaining: amount,
            expiry: carry_forward_expiry(origin, carry_forward_years),
            expired: false,
            utilizations: Vec::new(),
        }
    }

    /// `utilized + remaining == original` while live; zero remaining once expired.
    pub fn is_conserved(&self) -> bool {
        if self.expired {
            self.remaining.is_zero()
        } else {
            self.utilized + self.remaining == self.original_amount
        }
    }

    pub fn years_remaining(&self, current: AssessmentYear) -> u32 {
        current.years_until(self.expiry).max(0) as u32
    }

    fn expire(&mut self) -> Money {
        let written_off = self.remaining;
        self.remaining = Decimal::ZERO;
        self.expired = true;
        written_off
    }

    fn utilize(&mut self, assessment_year: AssessmentYear, amount: Money) {
        self.utilized += amount;
        self.remaining -= amount;
        self.utilizations.push(DepositUtilization {
            assessment_year,
            amount,
        });
    }
}

/// Caller-owned ledger threaded through successive periods.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CarryForwardLedger {
    #[serde(default)]
    pub deposits: Vec<CarryForwardDeposit>,
}

// ---------------------------------------------------------------------------
// Per-period movement report
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DepositStatus {
    Active,
    Exhausted,
    ExpiredThisPeriod,
    Expired,
    Created,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DepositMovement {
    pub origin: AssessmentYear,
    pub expiry: AssessmentYear,
    pub original_amount: Money,
    pub opening_remaining: Money,
    pub utilized_this_period: Money,
    pub expired_this_period: Money,
    pub closing_remaining: Money,
    pub status: DepositStatus,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FutureAvailability {
    pub origin: AssessmentYear,
    pub remaining: Money,
    pub expiry: AssessmentYear,
    pub years_remaining: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LedgerStep {
    pub assessment_year: AssessmentYear,
    pub opening_balance: Money,
    pub headroom: Money,
    pub utilized: Money,
    pub expired: Money,
    pub new_deposit: Money,
    pub closing_balance: Money,
    pub movements: Vec<DepositMovement>,
    pub available_for_future: Vec<FutureAvailability>,
}

/// Inputs for one ledger step.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LedgerPeriod {
    pub assessment_year: AssessmentYear,
    /// Cap capacity not consumed by the period's own covered interest.
    pub available_cap: Money,
    pub disallowance: Money,
    pub carry_forward_years: u32,
}

// ---------------------------------------------------------------------------
// Ledger operations
// ---------------------------------------------------------------------------

impl CarryForwardLedger {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_deposits(mut deposits: Vec<CarryForwardDeposit>) -> Self {
        deposits.sort_by_key(|d| d.origin);
        Self { deposits }
    }

    pub fn is_empty(&self) -> bool {
        self.deposits.is_empty()
    }

    pub fn live_deposits(&self) -> impl Iterator<Item = &CarryForwardDeposit> {
        self.deposits.iter().filter(|d| !d.expired)
    }

    /// Sum of remaining balances on deposits that have not expired.
    pub fn closing_balance(&self) -> Money {
        self.live_deposits().map(|d| d.remaining).sum()
    }

    pub fn has_deposit_for(&self, assessment_year: AssessmentYear) -> bool {
        self.deposits.iter().any(|d| d.origin == assessment_year)
    }

    /// Age, absorb and extend the ledger for one assessment year.
    pub fn apply_period(&mut self, period: LedgerPeriod) -> LedgerStep {
        let headroom = (period.available_cap - period.disallowance).max(Decimal::ZERO);
        let new_deposit = if period.disallowance > Decimal::ZERO {
            Some(CarryForwardDeposit::new(
                period.assessment_year,
                period.disallowance,
                period.carry_forward_years,
            ))
        } else {
            None
        };
        self.step(period.assessment_year, headroom, new_deposit)
    }

    /// Expire stale deposits without utilizing or adding anything.
    pub fn age(&mut self, assessment_year: AssessmentYear) -> LedgerStep {
        self.step(assessment_year, Decimal::ZERO, None)
    }

    fn step(
        &mut self,
        year: AssessmentYear,
        headroom: Money,
        new_deposit: Option<CarryForwardDeposit>,
    ) -> LedgerStep {
        let opening_balance = self.closing_balance();

        // Stable sort keeps insertion order among equal origins.
        self.deposits.sort_by_key(|d| d.origin);

        let n = self.deposits.len();
        let opening: Vec<Money> = self.deposits.iter().map(|d| d.remaining).collect();
        let previously_expired: Vec<bool> = self.deposits.iter().map(|d| d.expired).collect();
        let mut expired_now = vec![false; n];
        let mut expired_amounts = vec![Decimal::ZERO; n];
        let mut used = vec![Decimal::ZERO; n];

        // Expiry pass runs to completion before any utilization.
        let mut expired_total = Decimal::ZERO;
        for (i, deposit) in self.deposits.iter_mut().enumerate() {
            if !deposit.expired && year >= deposit.expiry {
                let written_off = deposit.expire();
                expired_now[i] = true;
                expired_amounts[i] = written_off;
                expired_total += written_off;
            }
        }

        // FIFO utilization against headroom.
        let mut remaining_headroom = headroom;
        let mut utilized_total = Decimal::ZERO;
        for (i, deposit) in self.deposits.iter_mut().enumerate() {
            if remaining_headroom <= Decimal::ZERO {
                break;
            }
            if deposit.expired || deposit.origin >= year || deposit.remaining <= Decimal::ZERO {
                continue;
            }
            let take = deposit.remaining.min(remaining_headroom);
            deposit.utilize(year, take);
            remaining_headroom -= take;
            used[i] = take;
            utilized_total += take;
        }

        let mut movements: Vec<DepositMovement> = self
            .deposits
            .iter()
            .enumerate()
            .map(|(i, d)| {
                let status = if previously_expired[i] {
                    DepositStatus::Expired
                } else if expired_now[i] {
                    DepositStatus::ExpiredThisPeriod
                } else if d.remaining.is_zero() {
                    DepositStatus::Exhausted
                } else {
                    DepositStatus::Active
                };
                DepositMovement {
                    origin: d.origin,
                    expiry: d.expiry,
                    original_amount: d.original_amount,
                    opening_remaining: opening[i],
                    utilized_this_period: used[i],
                    expired_this_period: expired_amounts[i],
                    closing_remaining: d.remaining,
                    status,
                }
            })
            .collect();

        let mut new_amount = Decimal::ZERO;
        if let Some(deposit) = new_deposit {
            new_amount = deposit.original_amount;
            movements.push(DepositMovement {
                origin: deposit.origin,
                expiry: deposit.expiry,
                original_amount: deposit.original_amount,
                opening_remaining: Decimal::ZERO,
                utilized_this_period: Decimal::ZERO,
                expired_this_period: Decimal::ZERO,
                closing_remaining: deposit.remaining,
                status: DepositStatus::Created,
            });
            self.deposits.push(deposit);
        }

        let available_for_future = self
            .live_deposits()
            .filter(|d| d.remaining > Decimal::ZERO)
            .map(|d| FutureAvailability {
                origin: d.origin,
                remaining: d.remaining,
                expiry: d.expiry,
                years_remaining: d.years_remaining(year),
            })
            .collect();

        LedgerStep {
            assessment_year: year,
            opening_balance,
            headroom,
            utilized: utilized_total,
            expired: expired_total,
            new_deposit: new_amount,
            closing_balance: self.closing_balance(),
            movements,
            available_for_future,
        }
    }
}

pub(crate) fn ledger_steps(step: &LedgerStep) -> Vec<ComputationStep> {
    vec![
        ComputationStep::new(
            "Carry-forward opening balance",
            format!("live deposits before {}", step.assessment_year),
            step.opening_balance,
        ),
        ComputationStep::new(
            "Headroom for brought-forward interest",
            "max(0, unused cap - current disallowance)",
            step.headroom,
        ),
        ComputationStep::new(
            "Carry-forward expired",
            "deposits reaching expiry this year",
            step.expired,
        ),
        ComputationStep::new(
            "Carry-forward utilized",
            "FIFO allocation of headroom, oldest deposit first",
            step.utilized,
        ),
        ComputationStep::new(
            "New carry-forward deposit",
            "current-year disallowance",
            step.new_deposit,
        ),
        ComputationStep::new(
            "Carry-forward closing balance",
            format!(
                "{} - {} - {} + {}",
                step.opening_balance, step.expired, step.utilized, step.new_deposit
            ),
            step.closing_balance,
        ),
    ]
}

// ---------------------------------------------------------------------------
// Standalone ledger step
// ---------------------------------------------------------------------------

/// One ledger step outside a full period computation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LedgerAdvanceInput {
    pub assessment_year: String,
    #[serde(default)]
    pub ledger: CarryForwardLedger,
    #[serde(default)]
    pub available_cap: Money,
    #[serde(default)]
    pub disallowance: Money,
    /// Falls back to the rule tables when absent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub carry_forward_years: Option<u32>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LedgerAdvance {
    pub step: LedgerStep,
    pub ledger: CarryForwardLedger,
    pub steps: Vec<ComputationStep>,
}

/// Apply a single year to a caller-held ledger.
pub fn advance_ledger(
    input: &LedgerAdvanceInput,
    rules: &RuleTables,
) -> ComplianceResult<ComputationOutput<LedgerAdvance>> {
    let start = Instant::now();
    let year: AssessmentYear = input.assessment_year.parse()?;

    for (field, value) in [
        ("available_cap", input.available_cap),
        ("disallowance", input.disallowance),
    ] {
        if value < Decimal::ZERO {
            return Err(ComplianceError::InvalidInput {
                field: field.into(),
                reason: format!("must be non-negative (got {value})"),
            });
        }
    }
    let carry_forward_years = input.carry_forward_years.unwrap_or(rules.carry_forward_years);
    check_amount("available_cap", input.available_cap)?;
    check_amount("disallowance", input.disallowance)?;
    for deposit in &input.ledger.deposits {
        let field = format!("ledger[{}]", deposit.origin);
        check_amount(&field, deposit.original_amount)?;
        check_amount(&field, deposit.remaining)?;
    }
    check_carry_forward_years("carry_forward_years", carry_forward_years)?;

    let mut warnings = Vec::new();
    if input.ledger.deposits.iter().any(|d| !d.is_conserved()) {
        warnings.push("Ledger holds deposits whose utilized and remaining amounts do not sum to the original".to_string());
    }
    if input.disallowance > Decimal::ZERO && input.ledger.has_deposit_for(year) {
        warnings.push(format!(
            "Ledger already holds a deposit originating in {year}; it may have been computed twice"
        ));
    }

    let mut ledger = input.ledger.clone();
    let step = ledger.apply_period(LedgerPeriod {
        assessment_year: year,
        available_cap: input.available_cap,
        disallowance: input.disallowance,
        carry_forward_years,
    });
    let steps = ledger_steps(&step);

    let elapsed = start.elapsed().as_micros() as u64;
    Ok(with_metadata(
        "Carry-forward ledger: expiry pass, then FIFO utilization against headroom",
        &serde_json::json!({
            "assessment_year": input.assessment_year,
            "carry_forward_years": carry_forward_years,
            "headroom": "max(0, available_cap - disallowance)",
        }),
        warnings,
        elapsed,
        LedgerAdvance {
            step,
            ledger,
            steps,
        },
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn ay(s: &str) -> AssessmentYear {
        s.parse().unwrap()
    }

    fn period(year: &str, available_cap: Decimal, disallowance: Decimal) -> LedgerPeriod {
        LedgerPeriod {
            assessment_year: ay(year),
            available_cap,
            disallowance,
            carry_forward_years: 8,
        }
    }

    fn two_deposit_ledger() -> CarryForwardLedger {
        CarryForwardLedger::from_deposits(vec![
            CarryForwardDeposit::new(ay("2021-22"), dec!(500), 8),
            CarryForwardDeposit::new(ay("2020-21"), dec!(300), 8),
        ])
    }

    #[test]
    fn test_empty_ledger_no_disallowance_is_noop() {
        let mut ledger = CarryForwardLedger::new();
        let step = ledger.apply_period(period("2025-26", dec!(1000), dec!(0)));
        assert!(ledger.is_empty());
        assert_eq!(step.closing_balance, Decimal::ZERO);
        assert!(step.movements.is_empty());
    }

    #[test]
    fn test_new_deposit_appended_with_expiry() {
        let mut ledger = CarryForwardLedger::new();
        let step = ledger.apply_period(period("2022-23", dec!(0), dec!(1_500_000)));
        assert_eq!(step.new_deposit, dec!(1_500_000));
        assert_eq!(step.closing_balance, dec!(1_500_000));
        assert_eq!(ledger.deposits[0].expiry, ay("2030-31"));
        assert_eq!(step.movements[0].status, DepositStatus::Created);
    }

    #[test]
    fn test_fifo_oldest_first() {
        let mut ledger = two_deposit_ledger();
        let step = ledger.apply_period(period("2024-25", dec!(400), dec!(0)));
        // 2020-21 (300) fully used before 2021-22 receives the last 100.
        assert_eq!(ledger.deposits[0].origin, ay("2020-21"));
        assert_eq!(ledger.deposits[0].remaining, Decimal::ZERO);
        assert_eq!(ledger.deposits[1].utilized, dec!(100));
        assert_eq!(ledger.deposits[1].remaining, dec!(400));
        assert_eq!(step.utilized, dec!(400));
        assert_eq!(step.closing_balance, dec!(400));
        assert_eq!(step.movements[0].status, DepositStatus::Exhausted);
    }

    #[test]
    fn test_headroom_limited_by_remaining() {
        let mut ledger = two_deposit_ledger();
        let step = ledger.apply_period(period("2024-25", dec!(10_000), dec!(0)));
        assert_eq!(step.utilized, dec!(800));
        assert_eq!(step.closing_balance, Decimal::ZERO);
    }

    #[test]
    fn test_current_disallowance_consumes_headroom() {
        let mut ledger = two_deposit_ledger();
        let step = ledger.apply_period(period("2024-25", dec!(100), dec!(250)));
        assert_eq!(step.headroom, Decimal::ZERO);
        assert_eq!(step.utilized, Decimal::ZERO);
        assert_eq!(step.closing_balance, dec!(1050));
    }

    #[test]
    fn test_expiry_precedes_utilization() {
        let mut ledger = two_deposit_ledger();
        // 2020-21 expires in 2028-29; headroom must skip it entirely.
        let step = ledger.apply_period(period("2028-29", dec!(1000), dec!(0)));
        assert_eq!(step.expired, dec!(300));
        assert_eq!(ledger.deposits[0].utilized, Decimal::ZERO);
        assert!(ledger.deposits[0].expired);
        assert_eq!(step.utilized, dec!(500));
        assert_eq!(step.movements[0].status, DepositStatus::ExpiredThisPeriod);
    }

    #[test]
    fn test_multiple_expiries_same_period() {
        let mut ledger = CarryForwardLedger::from_deposits(vec![
            CarryForwardDeposit::new(ay("2019-20"), dec!(100), 8),
            CarryForwardDeposit::new(ay("2020-21"), dec!(200), 7),
            CarryForwardDeposit::new(ay("2023-24"), dec!(50), 8),
        ]);
        let step = ledger.apply_period(period("2027-28", dec!(1000), dec!(0)));
        assert_eq!(step.expired, dec!(300));
        assert_eq!(step.utilized, dec!(50));
        assert_eq!(step.closing_balance, Decimal::ZERO);
    }

    #[test]
    fn test_expiry_is_monotonic() {
        let mut ledger = two_deposit_ledger();
        ledger.apply_period(period("2029-30", dec!(0), dec!(0)));
        let snapshot = ledger.clone();
        let step = ledger.apply_period(period("2029-30", dec!(5000), dec!(0)));
        assert!(ledger.deposits.iter().all(|d| d.expired));
        assert_eq!(ledger, snapshot);
        assert_eq!(step.expired, Decimal::ZERO);
        assert_eq!(step.movements[0].status, DepositStatus::Expired);
    }

    #[test]
    fn test_conservation_holds_through_steps() {
        let mut ledger = CarryForwardLedger::new();
        let script = [
            ("2020-21", dec!(0), dec!(700)),
            ("2021-22", dec!(0), dec!(400)),
            ("2022-23", dec!(350), dec!(0)),
            ("2023-24", dec!(200), dec!(0)),
            ("2028-29", dec!(100), dec!(0)),
            ("2029-30", dec!(1000), dec!(0)),
        ];
        for (year, cap, disallowed) in script {
            ledger.apply_period(period(year, cap, disallowed));
            assert!(ledger.deposits.iter().all(CarryForwardDeposit::is_conserved));
        }
        assert!(ledger.deposits.iter().all(|d| d.expired));
        assert_eq!(ledger.closing_balance(), Decimal::ZERO);
    }

    #[test]
    fn test_same_year_deposit_not_utilized() {
        let mut ledger =
            CarryForwardLedger::from_deposits(vec![CarryForwardDeposit::new(ay("2024-25"), dec!(100), 8)]);
        let step = ledger.apply_period(period("2024-25", dec!(1000), dec!(0)));
        assert_eq!(step.utilized, Decimal::ZERO);
    }

    #[test]
    fn test_years_remaining_clamped() {
        let mut ledger =
            CarryForwardLedger::from_deposits(vec![CarryForwardDeposit::new(ay("2022-23"), dec!(100), 8)]);
        let step = ledger.apply_period(period("2025-26", dec!(0), dec!(0)));
        assert_eq!(step.available_for_future[0].years_remaining, 5);
        assert_eq!(ledger.deposits[0].years_remaining(ay("2035-36")), 0);
    }

    #[test]
    fn test_age_only_expires() {
        let mut ledger = two_deposit_ledger();
        let step = ledger.age(ay("2028-29"));
        assert_eq!(step.expired, dec!(300));
        assert_eq!(step.utilized, Decimal::ZERO);
        assert_eq!(step.closing_balance, dec!(500));
    }

    #[test]
    fn test_utilization_history_recorded() {
        let mut ledger = two_deposit_ledger();
        ledger.apply_period(period("2023-24", dec!(100), dec!(0)));
        ledger.apply_period(period("2024-25", dec!(100), dec!(0)));
        let oldest = &ledger.deposits[0];
        assert_eq!(oldest.utilizations.len(), 2);
        assert_eq!(oldest.utilizations[1].assessment_year, ay("2024-25"));
        assert_eq!(oldest.utilized, dec!(200));
    }

    #[test]
    fn test_advance_ledger_envelope() {
        let input = LedgerAdvanceInput {
            assessment_year: "2025-26".into(),
            ledger: CarryForwardLedger::from_deposits(vec![CarryForwardDeposit::new(
                ay("2022-23"),
                dec!(500),
                8,
            )]),
            available_cap: dec!(300),
            disallowance: dec!(0),
            carry_forward_years: None,
        };
        let out = advance_ledger(&input, &RuleTables::default()).unwrap();
        assert_eq!(out.result.step.utilized, dec!(300));
        assert_eq!(out.result.ledger.closing_balance(), dec!(200));
        assert!(out.warnings.is_empty());
        assert!(!out.result.steps.is_empty());
    }

    #[test]
    fn test_advance_ledger_rejects_bad_input() {
        let mut input = LedgerAdvanceInput {
            assessment_year: "2025".into(),
            ledger: CarryForwardLedger::new(),
            available_cap: dec!(0),
            disallowance: dec!(10),
            carry_forward_years: None,
        };
        let rules = RuleTables::default();
        assert!(matches!(
            advance_ledger(&input, &rules),
            Err(ComplianceError::InvalidAssessmentYear(_))
        ));
        input.assessment_year = "2025-26".into();
        input.disallowance = dec!(-1);
        assert!(matches!(
            advance_ledger(&input, &rules),
            Err(ComplianceError::InvalidInput { .. })
        ));
        input.disallowance = dec!(10);
        input.carry_forward_years = Some(0);
        assert!(advance_ledger(&input, &rules).is_err());
    }

    #[test]
    fn test_advance_ledger_window_bounded() {
        let mut input = LedgerAdvanceInput {
            assessment_year: "2025-26".into(),
            ledger: CarryForwardLedger::new(),
            available_cap: dec!(0),
            disallowance: dec!(10),
            carry_forward_years: Some(9000),
        };
        let rules = RuleTables::default();
        for years in [9000, 21, u32::MAX] {
            input.carry_forward_years = Some(years);
            assert!(matches!(
                advance_ledger(&input, &rules),
                Err(ComplianceError::InvalidInput { .. })
            ));
        }

        input.carry_forward_years = Some(20);
        input.available_cap = Decimal::MAX;
        assert!(advance_ledger(&input, &rules).is_err());
        input.available_cap = dec!(0);
        let out = advance_ledger(&input, &rules).unwrap();
        let json = serde_json::to_string(&out.result.ledger).unwrap();
        let reread: CarryForwardLedger = serde_json::from_str(&json).unwrap();
        assert_eq!(reread, out.result.ledger);
        assert_eq!(reread.deposits[0].expiry, ay("2045-46"));

        let next = LedgerAdvanceInput {
            assessment_year: "2026-27".into(),
            ledger: reread,
            available_cap: dec!(4),
            disallowance: dec!(0),
            carry_forward_years: Some(20),
        };
        let out = advance_ledger(&next, &rules).unwrap();
        assert_eq!(out.result.step.utilized, dec!(4));
        assert_eq!(out.result.ledger.closing_balance(), dec!(6));
    }

    #[test]
    fn test_unbounded_window_saturates_instead_of_wrapping() {
        let deposit = CarryForwardDeposit::new(ay("2025-26"), dec!(100), u32::MAX);
        assert!(deposit.expiry > deposit.origin);
        let mut ledger = CarryForwardLedger::from_deposits(vec![deposit]);
        let step = ledger.apply_period(period("2026-27", dec!(0), dec!(0)));
        assert_eq!(step.expired, Decimal::ZERO);
        assert_eq!(ledger.closing_balance(), dec!(100));
    }
}
