pub mod interest_limitation;
pub mod rules;
