//! Int-or-percent values for surge and unavailability bounds.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::IntOrStringError;

/// An absolute count or a percentage string such as `"25%"`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum IntOrString {
    Int(i32),
    String(String),
}

impl IntOrString {
    /// Resolve against `total`.
    ///
    /// Integers are returned as-is. Percentages are scaled against `total`
    /// and rounded up or down depending on `round_up`.
    pub fn scaled_value(&self, total: u32, round_up: bool) -> Result<i64, IntOrStringError> {
        let percent = match self {
            Self::Int(v) => return Ok(i64::from(*v)),
            Self::String(s) => parse_percent(s)?,
        };

        let scaled = f64::from(percent) * f64::from(total) / 100.0;
        let value = if round_up {
            scaled.ceil()
        } else {
            scaled.floor()
        };
        Ok(value as i64)
    }

    /// Returns true if this is a percentage value.
    pub fn is_percent(&self) -> bool {
        matches!(self, Self::String(_))
    }
}

fn parse_percent(s: &str) -> Result<i32, IntOrStringError> {
    let Some(digits) = s.strip_suffix('%') else {
        return Err(IntOrStringError::NotAPercentage(s.to_string()));
    };

    digits
        .parse::<i32>()
        .map_err(|source| IntOrStringError::InvalidPercentage {
            value: s.to_string(),
            source,
        })
}

impl From<i32> for IntOrString {
    fn from(v: i32) -> Self {
        Self::Int(v)
    }
}

impl From<&str> for IntOrString {
    fn from(s: &str) -> Self {
        Self::String(s.to_string())
    }
}

impl fmt::Display for IntOrString {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Int(v) => write!(f, "{v}"),
            Self::String(s) => f.write_str(s),
        }
    }
}

#[cfg(test)]
mod tests {
    use rstest::rstest;

    use super::*;

    #[rstest]
    #[case(IntOrString::Int(2), 10, false, 2)]
    #[case(IntOrString::Int(2), 10, true, 2)]
    #[case("25%".into(), 10, false, 2)]
    #[case("25%".into(), 10, true, 3)]
    #[case("100%".into(), 7, false, 7)]
    #[case("0%".into(), 7, true, 0)]
    #[case("33%".into(), 0, true, 0)]
    fn test_scaled_value(
        #[case] value: IntOrString,
        #[case] total: u32,
        #[case] round_up: bool,
        #[case] expected: i64,
    ) {
        assert_eq!(value.scaled_value(total, round_up).unwrap(), expected);
    }

    #[test]
    fn test_string_without_percent_sign_is_rejected() {
        let err = IntOrString::from("3").scaled_value(10, false).unwrap_err();
        assert_eq!(err, IntOrStringError::NotAPercentage("3".to_string()));
    }

    #[test]
    fn test_malformed_percentage_is_rejected() {
        let err = IntOrString::from("abc%").scaled_value(10, false).unwrap_err();
        assert!(matches!(
            err,
            IntOrStringError::InvalidPercentage { ref value, .. } if value == "abc%"
        ));
    }

    #[test]
    fn test_deserialize_untagged() {
        let int: IntOrString = serde_json::from_str("1").unwrap();
        let pct: IntOrString = serde_json::from_str("\"20%\"").unwrap();
        assert_eq!(int, IntOrString::Int(1));
        assert_eq!(pct, IntOrString::String("20%".to_string()));
        assert!(pct.is_percent());
        assert_eq!(pct.to_string(), "20%");
    }
}
