#![forbid(unsafe_code)]

use std::fmt;

use serde::{Deserialize, Serialize};
use sha3::{Digest, Keccak256};

use crate::ContractViolation;

const ADDRESS_HEX_LEN: usize = 40;

/// Canonical beneficiary account id: `0x` followed by 40 lowercase hex digits.
///
/// This is the join key between ledger events and profile rows. Values only exist in
/// canonical form; `parse` is the intake path that canonicalizes operator input,
/// `from_canonical` is the strict path used at storage and read boundaries.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct BeneficiaryAddress(String);

impl BeneficiaryAddress {
    /// Accepts all-lowercase, all-uppercase or EIP-55 checksummed input.
    /// Mixed case with a failing checksum is rejected rather than lowercased.
    pub fn parse(raw: &str) -> Result<Self, ContractViolation> {
        let trimmed = raw.trim();
        let hex = split_hex_body(trimmed)?;
        let has_lower = hex.chars().any(|c| c.is_ascii_lowercase());
        let has_upper = hex.chars().any(|c| c.is_ascii_uppercase());
        let lowered = hex.to_ascii_lowercase();
        if has_lower && has_upper && checksum_hex(&lowered) != hex {
            return Err(ContractViolation::InvalidValue {
                field: "beneficiary_address",
                reason: "mixed-case address fails EIP-55 checksum",
            });
        }
        Ok(Self(format!("0x{lowered}")))
    }

    pub fn from_canonical(raw: &str) -> Result<Self, ContractViolation> {
        let hex = split_hex_body(raw)?;
        if hex.chars().any(|c| c.is_ascii_uppercase()) {
            return Err(ContractViolation::InvalidValue {
                field: "beneficiary_address",
                reason: "must be lowercase canonical form",
            });
        }
        Ok(Self(raw.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// `0xabcde...vwxyz`, used where a row has no profile name.
    pub fn short_label(&self) -> String {
        format!("{}...{}", &self.0[..7], &self.0[self.0.len() - 5..])
    }

    /// `0xabcd...wxyz`, the tighter form used inline next to a name.
    pub fn compact_label(&self) -> String {
        format!("{}...{}", &self.0[..6], &self.0[self.0.len() - 4..])
    }

    pub fn checksummed(&self) -> String {
        format!("0x{}", checksum_hex(&self.0[2..]))
    }

    pub fn contains_ignore_case(&self, needle: &str) -> bool {
        self.0.contains(&needle.trim().to_ascii_lowercase())
    }
}

impl fmt::Display for BeneficiaryAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl TryFrom<String> for BeneficiaryAddress {
    type Error = ContractViolation;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::from_canonical(&value)
    }
}

impl From<BeneficiaryAddress> for String {
    fn from(value: BeneficiaryAddress) -> Self {
        value.0
    }
}

fn split_hex_body(raw: &str) -> Result<&str, ContractViolation> {
    let Some(hex) = raw.strip_prefix("0x") else {
        return Err(ContractViolation::InvalidValue {
            field: "beneficiary_address",
            reason: "must start with 0x",
        });
    };
    if hex.len() != ADDRESS_HEX_LEN {
        return Err(ContractViolation::InvalidValue {
            field: "beneficiary_address",
            reason: "must contain exactly 40 hex digits",
        });
    }
    if !hex.chars().all(|c| c.is_ascii_hexdigit()) {
        return Err(ContractViolation::InvalidValue {
            field: "beneficiary_address",
            reason: "must contain only hex digits",
        });
    }
    Ok(hex)
}

fn checksum_hex(lower_hex: &str) -> String {
    let digest = Keccak256::digest(lower_hex.as_bytes());
    lower_hex
        .chars()
        .enumerate()
        .map(|(i, c)| {
            let byte = digest[i / 2];
            let nibble = if i % 2 == 0 { byte >> 4 } else { byte & 0x0f };
            if c.is_ascii_alphabetic() && nibble >= 8 {
                c.to_ascii_uppercase()
            } else {
                c
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn at_addr_01_lowercase_input_is_kept() {
        let a = BeneficiaryAddress::parse("0x5aaeb6053f3e94c9b9a09f33669435e7ef1beaed").unwrap();
        assert_eq!(a.as_str(), "0x5aaeb6053f3e94c9b9a09f33669435e7ef1beaed");
    }

    #[test]
    fn at_addr_02_checksummed_input_is_canonicalized() {
        for raw in [
            "0x5aAeb6053F3E94C9b9A09f33669435E7Ef1BeAed",
            "0xfB6916095ca1df60bB79Ce92cE3Ea74c37c5d359",
            "0xdbF03B407c01E7cD3CBea99509d93f8DDDC8C6FB",
            "0xD1220A0cf47c7B9Be7A2E6BA89F429762e7b9aDb",
        ] {
            let a = BeneficiaryAddress::parse(raw).unwrap();
            assert_eq!(a.as_str(), raw.to_ascii_lowercase());
            assert_eq!(a.checksummed(), raw);
        }
    }

    #[test]
    fn at_addr_03_bad_checksum_fails() {
        assert!(BeneficiaryAddress::parse("0x5aAeb6053F3E94C9b9A09f33669435E7Ef1BeAeD").is_err());
    }

    #[test]
    fn at_addr_04_uppercase_body_is_accepted() {
        let a = BeneficiaryAddress::parse(" 0xABCDEF0123456789ABCDEF0123456789ABCDEF01 ").unwrap();
        assert_eq!(a.as_str(), "0xabcdef0123456789abcdef0123456789abcdef01");
    }

    #[test]
    fn at_addr_05_malformed_inputs_fail() {
        for raw in [
            "",
            "abcdef0123456789abcdef0123456789abcdef01",
            "0xabc",
            "0xzzcdef0123456789abcdef0123456789abcdef01",
            "0xabcdef0123456789abcdef0123456789abcdef0123",
        ] {
            assert!(BeneficiaryAddress::parse(raw).is_err(), "{raw}");
        }
    }

    #[test]
    fn at_addr_06_strict_path_rejects_non_canonical() {
        assert!(BeneficiaryAddress::from_canonical(
            "0xABCDEF0123456789ABCDEF0123456789ABCDEF01"
        )
        .is_err());
        let decoded: Result<BeneficiaryAddress, _> =
            serde_json::from_str("\"0xABCDEF0123456789ABCDEF0123456789ABCDEF01\"");
        assert!(decoded.is_err());
    }

    #[test]
    fn at_addr_07_labels() {
        let a = BeneficiaryAddress::parse("0xabcdef0123456789abcdef0123456789abcdef01").unwrap();
        assert_eq!(a.short_label(), "0xabcde...def01");
        assert_eq!(a.compact_label(), "0xabcd...ef01");
        assert!(a.contains_ignore_case("CDEF01"));
    }
}
