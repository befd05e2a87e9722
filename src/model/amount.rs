//! Amount type for handling monetary values written in the Brazilian convention.
//!
//! Sheet cells hold values such as `R$ 1.234,56`: an optional currency symbol, dots as thousands
//! separators and a comma as the decimal separator. `Amount` wraps a `Decimal` and owns the rules
//! for reading those strings and for writing them back.

use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::fmt::{Debug, Display, Formatter};
use std::str::FromStr;
use tracing::trace;

/// The currency symbol used when displaying amounts.
const CURRENCY: &str = "R$";

/// The most integer digits an amount may have. Longer values are unparsable, which keeps every
/// sum over a sheet far from the `Decimal` range.
const MAX_INTEGER_DIGITS: usize = 15;

/// Represents a currency amount.
///
/// Parsing keeps only ASCII digits and commas, then treats the comma as the decimal point. This
/// means every dot is a thousands separator and is discarded, so `"1.234,56"` is `1234.56` and
/// `"1.234"` is `1234`. Signs are discarded too: amounts are never negative in source form.
/// Values with more than 15 integer digits are rejected.
///
/// # Examples
///
/// ```
/// # use household_finance::model::Amount;
/// # use std::str::FromStr;
/// let amount = Amount::from_str("R$ 1.234,56").unwrap();
/// assert_eq!(amount.to_string(), "R$ 1.234,56");
/// assert_eq!(amount.to_sheet_string(), "1234,56");
/// ```
///
/// Unparsable input normalizes to zero:
/// ```
/// # use household_finance::model::Amount;
/// assert!(Amount::normalize(Some("n/a")).is_zero());
/// assert!(Amount::normalize(None).is_zero());
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct Amount(Decimal);

impl Amount {
    pub const ZERO: Amount = Amount(Decimal::ZERO);

    pub const fn new(value: Decimal) -> Self {
        Self(value)
    }

    /// Returns the underlying Decimal value.
    pub fn value(&self) -> Decimal {
        self.0
    }

    pub fn is_zero(&self) -> bool {
        self.0.is_zero()
    }

    /// Returns true if the amount is greater than zero.
    pub fn is_positive(&self) -> bool {
        !self.is_zero() && self.0.is_sign_positive()
    }

    /// Normalizes a raw cell into an amount. Missing, empty and unparsable cells become zero.
    pub fn normalize(raw: Option<&str>) -> Self {
        match raw {
            None => Amount::ZERO,
            Some(s) => Amount::from_str(s).unwrap_or_else(|e| {
                trace!("Unable to parse amount '{s}', using zero: {e}");
                Amount::ZERO
            }),
        }
    }

    /// Formats the amount the way it is written to the sheet, e.g. `1234,56`.
    pub fn to_sheet_string(&self) -> String {
        let rounded = self.0.round_dp(2);
        format!("{rounded:.2}").replace('.', ",")
    }
}

/// An error that can occur when parsing strings into `Amount` values.
pub struct AmountError {
    input: String,
    reason: Reason,
}

#[derive(Debug)]
enum Reason {
    NoDigits,
    TooLarge,
    Decimal(rust_decimal::Error),
}

impl AmountError {
    fn new(input: &str, reason: Reason) -> Self {
        Self {
            input: input.to_string(),
            reason,
        }
    }
}

impl Debug for AmountError {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "AmountError({:?}, {:?})", self.input, self.reason)
    }
}

impl Display for AmountError {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match &self.reason {
            Reason::NoDigits => write!(f, "Invalid amount '{}': no digits found", self.input),
            Reason::TooLarge => write!(
                f,
                "Invalid amount '{}': more than {MAX_INTEGER_DIGITS} integer digits",
                self.input
            ),
            Reason::Decimal(e) => write!(f, "Invalid amount '{}': {e}", self.input),
        }
    }
}

impl std::error::Error for AmountError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match &self.reason {
            Reason::Decimal(e) => Some(e),
            _ => None,
        }
    }
}

impl FromStr for Amount {
    type Err = AmountError;

    /// Empty and whitespace-only input is zero. Input that has content but no digits is an error.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        if trimmed.is_empty() {
            return Ok(Amount::ZERO);
        }

        // Remove everything except digits and the decimal comma, then swap the comma for a point
        let kept: String = trimmed
            .chars()
            .filter(|c| c.is_ascii_digit() || *c == ',')
            .collect();
        if !kept.chars().any(|c| c.is_ascii_digit()) {
            return Err(AmountError::new(s, Reason::NoDigits));
        }
        let integer = kept.split(',').next().unwrap_or_default();
        if integer.trim_start_matches('0').len() > MAX_INTEGER_DIGITS {
            return Err(AmountError::new(s, Reason::TooLarge));
        }
        let normalized = kept.replace(',', ".");

        let value = Decimal::from_str(&normalized)
            .map_err(|e| AmountError::new(s, Reason::Decimal(e)))?;
        Ok(Amount(value))
    }
}

impl Display for Amount {
    /// Displays as `R$ 1.234,56`, or `-R$ 1.234,56` for negative totals.
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        let (sign, num) = if self.0.is_sign_negative() && !self.0.is_zero() {
            ("-", self.0.abs())
        } else {
            ("", self.0)
        };

        // format_num groups in the US convention, so swap the separators afterwards
        let us = format_num::format_num!(",.2", num.to_f64().unwrap_or_default());
        let br: String = us
            .chars()
            .map(|c| match c {
                ',' => '.',
                '.' => ',',
                other => other,
            })
            .collect();
        write!(f, "{sign}{CURRENCY} {br}")
    }
}

impl Serialize for Amount {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&self.to_sheet_string())
    }
}

impl<'de> Deserialize<'de> for Amount {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        Amount::from_str(&s).map_err(serde::de::Error::custom)
    }
}

impl From<Decimal> for Amount {
    fn from(value: Decimal) -> Self {
        Amount::new(value)
    }
}

impl From<Amount> for Decimal {
    fn from(amount: Amount) -> Self {
        amount.value()
    }
}
