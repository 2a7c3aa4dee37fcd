//! Numeric normalization for on-chain amount fields
//!
//! Amounts reach the gateway as plain integers, wide integers, floats or
//! strings that are already canonical. Everything is normalized to a decimal
//! string before it is handed to the program client.

use std::fmt;

use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum NumericError {
    /// NaN or an infinity was supplied
    #[error("Numeric values must be finite.")]
    InvalidNumericValue,
}

/// A numeric-like input accepted by [`to_numeric_string`]
#[derive(Debug, Clone, PartialEq)]
pub enum NumericValue {
    Integer(i64),
    BigInteger(i128),
    Float(f64),
    Text(String),
}

impl From<i64> for NumericValue {
    fn from(value: i64) -> Self {
        NumericValue::Integer(value)
    }
}

impl From<u64> for NumericValue {
    fn from(value: u64) -> Self {
        NumericValue::BigInteger(value as i128)
    }
}

impl From<i128> for NumericValue {
    fn from(value: i128) -> Self {
        NumericValue::BigInteger(value)
    }
}

impl From<f64> for NumericValue {
    fn from(value: f64) -> Self {
        NumericValue::Float(value)
    }
}

impl From<&str> for NumericValue {
    fn from(value: &str) -> Self {
        NumericValue::Text(value.to_string())
    }
}

impl From<String> for NumericValue {
    fn from(value: String) -> Self {
        NumericValue::Text(value)
    }
}

impl fmt::Display for NumericValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NumericValue::Integer(v) => write!(f, "{}", v),
            NumericValue::BigInteger(v) => write!(f, "{}", v),
            NumericValue::Float(v) => write!(f, "{}", v),
            NumericValue::Text(v) => f.write_str(v),
        }
    }
}

/// Convert a numeric-like value into its canonical decimal string.
///
/// Strings pass through untouched. Floats must be finite; `-0` renders as `0`.
/// Floats use `f64`'s `Display`, which never switches to exponent notation:
/// `1e21` renders as `1000000000000000000000` and `1e-7` as `0.0000001`.
pub fn to_numeric_string(value: impl Into<NumericValue>) -> Result<String, NumericError> {
    match value.into() {
        NumericValue::Text(text) => Ok(text),
        NumericValue::Integer(v) => Ok(v.to_string()),
        NumericValue::BigInteger(v) => Ok(v.to_string()),
        NumericValue::Float(v) => {
            if !v.is_finite() {
                return Err(NumericError::InvalidNumericValue);
            }
            if v == 0.0 {
                return Ok("0".to_string());
            }
            Ok(v.to_string())
        }
    }
}
