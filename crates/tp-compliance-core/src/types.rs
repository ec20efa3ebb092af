use chrono::{Datelike, Local, NaiveDate};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::ComplianceError;

/// All monetary values (INR). Wraps Decimal to prevent accidental f64 usage.
pub type Money = Decimal;

/// Rates expressed as decimals (0.30 = 30%). Never as percentages.
pub type Rate = Decimal;

/// Indian assessment year, e.g. `2025-26`.
///
/// Stored as the leading calendar year so ordering and arithmetic are plain
/// integer operations. The string form is the only wire representation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct AssessmentYear(i32);

impl AssessmentYear {
    /// Bounds of the four-digit `YYYY-YY` form.
    pub const MIN_LEADING_YEAR: i32 = 1000;
    pub const MAX_LEADING_YEAR: i32 = 9998;

    pub fn new(start_year: i32) -> Result<Self, ComplianceError> {
        if !(Self::MIN_LEADING_YEAR..=Self::MAX_LEADING_YEAR).contains(&start_year) {
            return Err(ComplianceError::InvalidAssessmentYear(format!(
                "leading year {start_year} is outside {}-{}",
                Self::MIN_LEADING_YEAR,
                Self::MAX_LEADING_YEAR
            )));
        }
        Ok(Self(start_year))
    }

    /// Compile-time constructor for statutory constants.
    pub const fn from_leading_year(start_year: i32) -> Self {
        Self(start_year)
    }

    pub fn start_year(self) -> i32 {
        self.0
    }

    /// The assessment year `years` periods later (or earlier, if negative),
    /// saturating at the representable range so the result always
    /// round-trips through its string form.
    pub fn offset(self, years: i32) -> Self {
        Self(
            self.0
                .saturating_add(years)
                .clamp(Self::MIN_LEADING_YEAR, Self::MAX_LEADING_YEAR),
        )
    }

    /// As [`offset`](Self::offset), failing instead of saturating.
    pub fn checked_offset(self, years: i32) -> Result<Self, ComplianceError> {
        let start_year = self.0.checked_add(years).ok_or_else(|| {
            ComplianceError::InvalidAssessmentYear(format!("{self} offset by {years} overflows"))
        })?;
        Self::new(start_year)
    }

    /// Signed number of periods from `self` to `later`.
    pub fn years_until(self, later: AssessmentYear) -> i32 {
        later.0 - self.0
    }

    /// Assessment year for income earned on `date`. The Indian financial
    /// year runs April to March and is assessed in the following year.
    pub fn from_date(date: NaiveDate) -> Self {
        if date.month() >= 4 {
            Self(date.year() + 1)
        } else {
            Self(date.year())
        }
    }

    /// Assessment year for today's date. Display and defaults only.
    pub fn current() -> Self {
        Self::from_date(Local::now().date_naive())
    }
}

impl FromStr for AssessmentYear {
    type Err = ComplianceError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let bytes = s.as_bytes();
        let well_formed = bytes.len() == 7
            && bytes[4] == b'-'
            && bytes[..4].iter().all(u8::is_ascii_digit)
            && bytes[5..].iter().all(u8::is_ascii_digit);
        if !well_formed {
            return Err(ComplianceError::InvalidAssessmentYear(format!(
                "'{s}' does not match YYYY-YY"
            )));
        }

        let start: i32 = s[..4]
            .parse()
            .map_err(|_| ComplianceError::InvalidAssessmentYear(s.to_string()))?;
        let suffix: i32 = s[5..]
            .parse()
            .map_err(|_| ComplianceError::InvalidAssessmentYear(s.to_string()))?;

        if suffix != (start + 1) % 100 {
            return Err(ComplianceError::InvalidAssessmentYear(format!(
                "'{s}' is not a consecutive year pair"
            )));
        }
        AssessmentYear::new(start)
    }
}

impl TryFrom<String> for AssessmentYear {
    type Error = ComplianceError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<AssessmentYear> for String {
    fn from(ay: AssessmentYear) -> Self {
        ay.to_string()
    }
}

impl fmt::Display for AssessmentYear {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{:02}", self.0, (self.0 + 1) % 100)
    }
}

/// One line of the audit trail attached to a computation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ComputationStep {
    pub label: String,
    pub formula: String,
    pub value: Money,
}

impl ComputationStep {
    pub fn new(label: &str, formula: impl Into<String>, value: Money) -> Self {
        Self {
            label: label.to_string(),
            formula: formula.into(),
            value,
        }
    }
}

/// Standard computation output envelope
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ComputationOutput<T: Serialize> {
    pub result: T,
    pub methodology: String,
    pub assumptions: serde_json::Value,
    pub warnings: Vec<String>,
    pub metadata: ComputationMetadata,
}

/// Metadata for every computation
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ComputationMetadata {
    pub version: String,
    pub computation_time_us: u64,
    pub precision: String,
}

/// Helper to wrap computation results with metadata
pub fn with_metadata<T: Serialize>(
    methodology: &str,
    assumptions: &impl Serialize,
    warnings: Vec<String>,
    elapsed_us: u64,
    result: T,
) -> ComputationOutput<T> {
    ComputationOutput {
        result,
        methodology: methodology.to_string(),
        assumptions: serde_json::to_value(assumptions).unwrap_or_default(),
        warnings,
        metadata: ComputationMetadata {
            version: env!("CARGO_PKG_VERSION").to_string(),
            computation_time_us: elapsed_us,
            precision: "rust_decimal_128bit".to_string(),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_and_display_round_trip() {
        let ay: AssessmentYear = "2025-26".parse().unwrap();
        assert_eq!(ay.start_year(), 2025);
        assert_eq!(ay.to_string(), "2025-26");
    }

    #[test]
    fn test_century_boundary() {
        let ay: AssessmentYear = "2099-00".parse().unwrap();
        assert_eq!(ay.offset(1).to_string(), "2100-01");
    }

    #[test]
    fn test_malformed_years_rejected() {
        for bad in ["2025", "2025-2026", "25-26", "2025/26", "abcd-ef", "2025-27", ""] {
            assert!(
                bad.parse::<AssessmentYear>().is_err(),
                "expected '{bad}' to be rejected"
            );
        }
    }

    #[test]
    fn test_offset_stays_in_representable_range() {
        let late: AssessmentYear = "9990-91".parse().unwrap();
        let far = late.offset(9000);
        assert_eq!(far.to_string(), "9998-99");
        assert_eq!(far.to_string().parse::<AssessmentYear>().unwrap(), far);
        assert_eq!(late.offset(i32::MAX).start_year(), AssessmentYear::MAX_LEADING_YEAR);
        assert_eq!(late.offset(i32::MIN).start_year(), AssessmentYear::MIN_LEADING_YEAR);
    }

    #[test]
    fn test_checked_offset_rejects_escape() {
        let late: AssessmentYear = "9990-91".parse().unwrap();
        assert_eq!(late.checked_offset(8).unwrap().to_string(), "9998-99");
        assert!(matches!(
            late.checked_offset(9),
            Err(ComplianceError::InvalidAssessmentYear(_))
        ));
        assert!(late.checked_offset(i32::MAX).is_err());
    }

    #[test]
    fn test_offset_and_distance() {
        let origin: AssessmentYear = "2022-23".parse().unwrap();
        let expiry = origin.offset(8);
        assert_eq!(expiry.to_string(), "2030-31");
        assert_eq!(origin.years_until(expiry), 8);
        assert_eq!(expiry.years_until(origin), -8);
    }

    #[test]
    fn test_ordering_follows_leading_year() {
        let a: AssessmentYear = "2019-20".parse().unwrap();
        let b: AssessmentYear = "2024-25".parse().unwrap();
        assert!(a < b);
    }

    #[test]
    fn test_from_date_uses_april_to_march_year() {
        let june = NaiveDate::from_ymd_opt(2024, 6, 1).unwrap();
        let february = NaiveDate::from_ymd_opt(2025, 2, 1).unwrap();
        let march_end = NaiveDate::from_ymd_opt(2024, 3, 31).unwrap();
        assert_eq!(AssessmentYear::from_date(june).to_string(), "2025-26");
        assert_eq!(AssessmentYear::from_date(february).to_string(), "2025-26");
        assert_eq!(AssessmentYear::from_date(march_end).to_string(), "2024-25");
    }

    #[test]
    fn test_serde_uses_string_form() {
        let ay: AssessmentYear = "2030-31".parse().unwrap();
        let json = serde_json::to_string(&ay).unwrap();
        assert_eq!(json, "\"2030-31\"");
        let back: AssessmentYear = serde_json::from_str(&json).unwrap();
        assert_eq!(back, ay);
        assert!(serde_json::from_str::<AssessmentYear>("\"2030\"").is_err());
    }
}
