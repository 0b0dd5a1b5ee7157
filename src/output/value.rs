//! Values of output tables, which may be infinite or missing.
use serde::{Deserialize, Serialize};

/// A value as written to an output file.
///
/// JSON has no representation for infinite numbers, so these are written as the strings `"inf"`
/// and `"-inf"`. Values without a solution are written as `null`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum OutputValue {
    /// A finite number
    Number(f64),
    /// An infinite number
    Infinite(Infinity),
    /// No value
    Missing,
}

/// The sign of an infinite value
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Infinity {
    /// Positive infinity
    #[serde(rename = "inf")]
    Positive,
    /// Negative infinity
    #[serde(rename = "-inf")]
    Negative,
}

impl OutputValue {
    /// The value as a number, if there is one
    pub fn as_f64(self) -> Option<f64> {
        match self {
            Self::Number(value) => Some(value),
            Self::Infinite(Infinity::Positive) => Some(f64::INFINITY),
            Self::Infinite(Infinity::Negative) => Some(f64::NEG_INFINITY),
            Self::Missing => None,
        }
    }
}

impl From<f64> for OutputValue {
    fn from(value: f64) -> Self {
        if value.is_nan() {
            Self::Missing
        } else if value == f64::INFINITY {
            Self::Infinite(Infinity::Positive)
        } else if value == f64::NEG_INFINITY {
            Self::Infinite(Infinity::Negative)
        } else {
            Self::Number(value)
        }
    }
}

impl From<Option<f64>> for OutputValue {
    fn from(value: Option<f64>) -> Self {
        value.map_or(Self::Missing, Self::from)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case(Some(1.5), "1.5")]
    #[case(Some(f64::INFINITY), r#""inf""#)]
    #[case(Some(f64::NEG_INFINITY), r#""-inf""#)]
    #[case(None, "null")]
    fn test_output_value_json(#[case] value: Option<f64>, #[case] json: &str) {
        let output = OutputValue::from(value);
        assert_eq!(serde_json::to_string(&output).unwrap(), json);
        let back: OutputValue = serde_json::from_str(json).unwrap();
        assert_eq!(back.as_f64(), value);
    }
}
