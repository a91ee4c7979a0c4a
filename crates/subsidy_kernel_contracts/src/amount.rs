#![forbid(unsafe_code)]

use std::cmp::Ordering;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::ContractViolation;

/// Fixed-point scale of the subsidy token.
pub const TOKEN_DECIMALS: u32 = 18;

/// Unsigned token amount in base units, arbitrary precision.
///
/// Stored as a normalized decimal digit string (no leading zeros, `"0"` for zero) so that
/// ordering never goes through a float or a bounded integer.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct TokenAmount(String);

impl TokenAmount {
    pub fn zero() -> Self {
        Self("0".to_string())
    }

    pub fn from_base_units(raw: &str) -> Result<Self, ContractViolation> {
        let raw = raw.trim();
        if raw.is_empty() {
            return Err(ContractViolation::InvalidValue {
                field: "token_amount",
                reason: "must not be empty",
            });
        }
        if !raw.bytes().all(|b| b.is_ascii_digit()) {
            return Err(ContractViolation::InvalidValue {
                field: "token_amount",
                reason: "must be an unsigned integer string",
            });
        }
        let digits = raw.trim_start_matches('0');
        if digits.is_empty() {
            return Ok(Self::zero());
        }
        Ok(Self(digits.to_string()))
    }

    pub fn from_u128(value: u128) -> Self {
        Self(value.to_string())
    }

    /// Whole tokens, i.e. `tokens * 10^18` base units.
    pub fn from_whole_tokens(tokens: u64) -> Self {
        if tokens == 0 {
            return Self::zero();
        }
        Self(format!("{tokens}{}", "0".repeat(TOKEN_DECIMALS as usize)))
    }

    pub fn as_base_units(&self) -> &str {
        &self.0
    }

    pub fn is_zero(&self) -> bool {
        self.0 == "0"
    }

    /// Decimal-scaled value. Exact while the amount fits the 96-bit decimal mantissa;
    /// past that, trailing fractional base units are truncated. `None` only when the whole
    /// token part alone is out of decimal range.
    pub fn to_decimal(&self) -> Option<Decimal> {
        let len = self.0.len();
        for dropped in 0..=TOKEN_DECIMALS as usize {
            if dropped >= len && dropped > 0 {
                return Some(Decimal::ZERO);
            }
            let Ok(mantissa) = self.0[..len - dropped].parse::<i128>() else {
                continue;
            };
            let scale = TOKEN_DECIMALS - dropped as u32;
            if let Ok(d) = Decimal::try_from_i128_with_scale(mantissa, scale) {
                return Some(d.normalize());
            }
        }
        None
    }

    /// Exact comparison of the decimal-scaled amount against `threshold`.
    pub fn cmp_scaled(&self, threshold: &Decimal) -> Ordering {
        if threshold.is_sign_negative() && !threshold.is_zero() {
            return Ordering::Greater;
        }
        let scale = threshold.scale() as usize;
        let left = shifted_digits(&self.0, scale);
        let right = shifted_digits(
            &threshold.mantissa().unsigned_abs().to_string(),
            TOKEN_DECIMALS as usize,
        );
        cmp_digit_strings(&left, &right)
    }

    /// Exact human-readable token value, e.g. `"1.5"` for `1500000000000000000`.
    pub fn to_token_string(&self) -> String {
        let decimals = TOKEN_DECIMALS as usize;
        let padded = format!("{:0>width$}", self.0, width = decimals + 1);
        let (int_part, frac_part) = padded.split_at(padded.len() - decimals);
        let frac = frac_part.trim_end_matches('0');
        if frac.is_empty() {
            int_part.to_string()
        } else {
            format!("{int_part}.{frac}")
        }
    }
}

impl Default for TokenAmount {
    fn default() -> Self {
        Self::zero()
    }
}

impl Ord for TokenAmount {
    fn cmp(&self, other: &Self) -> Ordering {
        cmp_digit_strings(&self.0, &other.0)
    }
}

impl PartialOrd for TokenAmount {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl TryFrom<String> for TokenAmount {
    type Error = ContractViolation;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::from_base_units(&value)
    }
}

impl From<TokenAmount> for String {
    fn from(value: TokenAmount) -> Self {
        value.0
    }
}

fn shifted_digits(digits: &str, zeros: usize) -> String {
    if digits == "0" {
        return "0".to_string();
    }
    format!("{digits}{}", "0".repeat(zeros))
}

// Both inputs are normalized: no leading zeros unless the value is "0".
fn cmp_digit_strings(a: &str, b: &str) -> Ordering {
    a.len().cmp(&b.len()).then_with(|| a.cmp(b))
}

#[cfg(test)]
mod tests {
    use std::str::FromStr;

    use super::*;

    #[test]
    fn at_amount_01_normalizes_leading_zeros() {
        assert_eq!(TokenAmount::from_base_units("000120").unwrap().as_base_units(), "120");
        assert!(TokenAmount::from_base_units("0000").unwrap().is_zero());
        assert!(TokenAmount::from_base_units("-5").is_err());
        assert!(TokenAmount::from_base_units("1.5").is_err());
    }

    #[test]
    fn at_amount_02_orders_beyond_u128() {
        let huge = TokenAmount::from_base_units(&format!("9{}", "0".repeat(60))).unwrap();
        let big = TokenAmount::from_u128(u128::MAX);
        assert!(huge > big);
        assert!(TokenAmount::from_u128(9) < TokenAmount::from_u128(10));
    }

    #[test]
    fn at_amount_03_decimal_scaling() {
        let a = TokenAmount::from_base_units("1500000000000000000").unwrap();
        assert_eq!(a.to_decimal(), Some(Decimal::from_str("1.5").unwrap()));
        assert_eq!(a.to_token_string(), "1.5");
        assert_eq!(TokenAmount::from_u128(1).to_token_string(), "0.000000000000000001");
        assert_eq!(TokenAmount::zero().to_decimal(), Some(Decimal::ZERO));
    }

    #[test]
    fn at_amount_04_scaled_comparison_is_exact() {
        let fifty_k = TokenAmount::from_whole_tokens(50_000);
        let threshold = Decimal::from(50_000);
        assert_eq!(fifty_k.cmp_scaled(&threshold), Ordering::Equal);

        let just_over = TokenAmount::from_base_units("50000000000000000000001").unwrap();
        assert_eq!(just_over.cmp_scaled(&threshold), Ordering::Greater);

        let fractional = Decimal::from_str("0.5").unwrap();
        assert_eq!(
            TokenAmount::from_base_units("499999999999999999")
                .unwrap()
                .cmp_scaled(&fractional),
            Ordering::Less
        );
        assert_eq!(
            TokenAmount::zero().cmp_scaled(&Decimal::from(-1)),
            Ordering::Greater
        );
    }

    #[test]
    fn at_amount_05_very_large_amount_truncates_fraction() {
        let tokens = TokenAmount::from_base_units(&format!("{}{}", "7".repeat(20), "5".repeat(18)))
            .unwrap();
        let d = tokens.to_decimal().unwrap();
        assert!(d > Decimal::from_str("77777777777777777777").unwrap());
    }
}
