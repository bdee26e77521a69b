//! Fixed-point token amounts.
//!
//! Amounts are unsigned 256-bit integers counting base units, with
//! [`DECIMALS`] implied decimal places. Every comparison between a requested
//! amount and an observed balance or allowance happens on this
//! representation; decimal strings only exist at the edges.

use std::fmt;
use std::str::FromStr;

use alloy_primitives::U256;
use stakeflow_interface::TOKEN_DECIMALS;
use thiserror::Error;

pub const DECIMALS: usize = TOKEN_DECIMALS;

/// 10^18 base units make one token.
pub const SCALE: U256 = U256::from_limbs([1_000_000_000_000_000_000, 0, 0, 0]);

#[non_exhaustive]
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AmountError {
  #[error("amount is empty")]
  Empty,
  #[error("amount must not be negative")]
  Negative,
  #[error("amount has no digits")]
  NoDigits,
  #[error("invalid character {0:?} in amount")]
  InvalidDigit(char),
  #[error("amount has more than one decimal point")]
  MultiplePoints,
  #[error("amount has more than 18 decimal places")]
  TooManyDecimals,
  #[error("amount does not fit in 256 bits")]
  Overflow,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Amount(U256);

impl Amount {
  pub const ZERO: Amount = Amount(U256::ZERO);

  pub const fn from_base_units(units: U256) -> Self {
    Amount(units)
  }

  /// An amount of whole tokens.
  pub fn from_tokens(tokens: u64) -> Self {
    Amount(U256::from(tokens) * SCALE)
  }

  pub const fn base_units(&self) -> U256 {
    self.0
  }

  pub fn is_zero(&self) -> bool {
    self.0.is_zero()
  }

  pub fn checked_sub(self, rhs: Amount) -> Option<Amount> {
    self.0.checked_sub(rhs.0).map(Amount)
  }

  pub fn saturating_sub(self, rhs: Amount) -> Amount {
    Amount(self.0.saturating_sub(rhs.0))
  }
}

impl From<U256> for Amount {
  fn from(units: U256) -> Self {
    Amount(units)
  }
}

impl From<Amount> for U256 {
  fn from(amount: Amount) -> Self {
    amount.0
  }
}

impl FromStr for Amount {
  type Err = AmountError;

  fn from_str(s: &str) -> Result<Self, Self::Err> {
    to_fixed_point(s)
  }
}

impl fmt::Display for Amount {
  fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
    f.write_str(&to_decimal_string(*self))
  }
}

/// Parses a human-entered decimal numeral such as `12`, `0.5`, `.5` or `3.`
/// into base units.
///
/// Signs, whitespace, exponents and separators are rejected. Trailing zeros
/// past the 18th decimal place are accepted since they carry no value; any
/// other digit there is an error rather than a silent truncation.
pub fn to_fixed_point(input: &str) -> Result<Amount, AmountError> {
  if input.is_empty() {
    return Err(AmountError::Empty);
  }
  if input.starts_with('-') {
    return Err(AmountError::Negative);
  }

  let (whole, fraction) = match input.split_once('.') {
    Some((_, fraction)) if fraction.contains('.') => return Err(AmountError::MultiplePoints),
    Some((whole, fraction)) => (whole, fraction),
    None => (input, ""),
  };
  if whole.is_empty() && fraction.is_empty() {
    return Err(AmountError::NoDigits);
  }
  if let Some(c) = whole.chars().chain(fraction.chars()).find(|c| !c.is_ascii_digit()) {
    return Err(AmountError::InvalidDigit(c));
  }

  let fraction = fraction.trim_end_matches('0');
  if fraction.len() > DECIMALS {
    return Err(AmountError::TooManyDecimals);
  }

  let ten = U256::from(10u8);
  let padding = std::iter::repeat(b'0').take(DECIMALS - fraction.len());
  let mut units = U256::ZERO;
  for digit in whole.bytes().chain(fraction.bytes()).chain(padding) {
    units = units
      .checked_mul(ten)
      .and_then(|v| v.checked_add(U256::from(digit - b'0')))
      .ok_or(AmountError::Overflow)?;
  }
  Ok(Amount(units))
}

/// Formats base units as a decimal string with the fraction trimmed of
/// trailing zeros but always at least one fractional digit, e.g. `5.0`,
/// `0.25`, `1.000000000000000001`.
pub fn to_decimal_string(amount: Amount) -> String {
  let whole = amount.0 / SCALE;
  // the remainder is below 10^18 and fits in the low limb
  let fraction = (amount.0 % SCALE).as_limbs()[0];
  let fraction = format!("{fraction:0width$}", width = DECIMALS);
  let fraction = fraction.trim_end_matches('0');
  if fraction.is_empty() {
    format!("{whole}.0")
  } else {
    format!("{whole}.{fraction}")
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use rand::Rng;

  fn units(s: &str) -> U256 {
    U256::from_str_radix(s, 10).unwrap()
  }

  #[test]
  fn parses_whole_and_fractional() {
    assert_eq!(to_fixed_point("5").unwrap(), Amount::from_tokens(5));
    assert_eq!(to_fixed_point("0.5").unwrap().base_units(), units("500000000000000000"));
    assert_eq!(to_fixed_point(".5").unwrap().base_units(), units("500000000000000000"));
    assert_eq!(to_fixed_point("3.").unwrap(), Amount::from_tokens(3));
    assert_eq!(to_fixed_point("0007.250").unwrap().base_units(), units("7250000000000000000"));
    assert_eq!(to_fixed_point("0.000000000000000001").unwrap().base_units(), U256::from(1u8));
    assert_eq!(to_fixed_point("0").unwrap(), Amount::ZERO);
  }

  #[test]
  fn trailing_zeros_past_scale_are_accepted() {
    assert_eq!(
      to_fixed_point("1.0000000000000000000000").unwrap(),
      Amount::from_tokens(1)
    );
  }

  #[test]
  fn rejects_malformed() {
    assert_eq!(to_fixed_point(""), Err(AmountError::Empty));
    assert_eq!(to_fixed_point("-1"), Err(AmountError::Negative));
    assert_eq!(to_fixed_point("."), Err(AmountError::NoDigits));
    assert_eq!(to_fixed_point("1.2.3"), Err(AmountError::MultiplePoints));
    assert_eq!(to_fixed_point("abc"), Err(AmountError::InvalidDigit('a')));
    assert_eq!(to_fixed_point(" 1"), Err(AmountError::InvalidDigit(' ')));
    assert_eq!(to_fixed_point("+1"), Err(AmountError::InvalidDigit('+')));
    assert_eq!(to_fixed_point("1e18"), Err(AmountError::InvalidDigit('e')));
    assert_eq!(to_fixed_point("1,5"), Err(AmountError::InvalidDigit(',')));
    assert_eq!(
      to_fixed_point("0.0000000000000000001"),
      Err(AmountError::TooManyDecimals)
    );
  }

  #[test]
  fn rejects_overflow() {
    let max_tokens = (U256::MAX / SCALE).to_string();
    assert!(to_fixed_point(&max_tokens).is_ok());
    let too_many = format!("{max_tokens}0");
    assert_eq!(to_fixed_point(&too_many), Err(AmountError::Overflow));
  }

  #[test]
  fn formats_canonically() {
    assert_eq!(to_decimal_string(Amount::ZERO), "0.0");
    assert_eq!(to_decimal_string(Amount::from_tokens(5)), "5.0");
    assert_eq!(to_decimal_string(to_fixed_point("0.25").unwrap()), "0.25");
    assert_eq!(
      to_decimal_string(Amount::from_base_units(SCALE + U256::from(1u8))),
      "1.000000000000000001"
    );
    assert_eq!(to_fixed_point("10.50").unwrap().to_string(), "10.5");
  }

  #[test]
  fn decimal_string_round_trips() {
    let mut rng = rand::thread_rng();
    for _ in 0..500 {
      let small = Amount::from_base_units(U256::from(rng.gen::<u128>()));
      let large = Amount::from_base_units(U256::from_limbs(rng.gen::<[u64; 4]>()));
      for amount in [small, large] {
        let text = to_decimal_string(amount);
        assert_eq!(to_fixed_point(&text), Ok(amount), "round trip of {text}");
      }
    }
    let max = Amount::from_base_units(U256::MAX);
    assert_eq!(to_fixed_point(&max.to_string()), Ok(max));
  }

  #[test]
  fn comparisons_use_base_units() {
    let a: Amount = "0.3".parse().unwrap();
    let b: Amount = "0.1".parse().unwrap();
    let c: Amount = "0.2".parse().unwrap();
    assert_eq!(b.base_units() + c.base_units(), a.base_units());
    assert!(a > c);
    assert_eq!(b.checked_sub(c), None);
    assert_eq!(a.saturating_sub(c), b);
  }
}
