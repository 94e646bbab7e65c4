//! Core domain types used across services

use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Generate a fresh record identifier
pub fn generate_id() -> String {
    Uuid::new_v4().to_string()
}

/// Phone number as typed by an operator.
///
/// The raw text is kept for display; comparisons go through the digit-only
/// form so `+212 661-001122` and `212661001122` refer to the same line.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PhoneNumber(String);

impl PhoneNumber {
    pub fn new(number: impl Into<String>) -> Self {
        Self(number.into().trim().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn digits(&self) -> String {
        self.0.chars().filter(|c| c.is_ascii_digit()).collect()
    }

    /// True when both numbers carry the same non-empty digit sequence
    pub fn same_line(&self, other: &PhoneNumber) -> bool {
        let digits = self.digits();
        !digits.is_empty() && digits == other.digits()
    }
}

impl PartialEq for PhoneNumber {
    fn eq(&self, other: &Self) -> bool {
        self.digits() == other.digits()
    }
}

impl Eq for PhoneNumber {}

impl fmt::Display for PhoneNumber {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_phone_number_same_line_ignores_formatting() {
        let a = PhoneNumber::new("+212 661-001122");
        let b = PhoneNumber::new("212661001122");
        assert!(a.same_line(&b));
        assert_eq!(a, b);
        assert_eq!(a.as_str(), "+212 661-001122");
    }

    #[test]
    fn test_phone_number_without_digits_matches_nothing() {
        let a = PhoneNumber::new("n/a");
        let b = PhoneNumber::new("unknown");
        assert!(!a.same_line(&b));
    }

    #[test]
    fn test_generate_id_is_unique() {
        assert_ne!(generate_id(), generate_id());
    }
}
