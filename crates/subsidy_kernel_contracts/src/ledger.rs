#![forbid(unsafe_code)]

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::address::BeneficiaryAddress;
use crate::amount::TokenAmount;
use crate::{ContractViolation, UnixTimeSec, Validate};

/// Indexed enrollment state of one beneficiary. Produced by the indexer; this system
/// never mutates it, it only triggers the contract calls that cause future events.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LedgerRecord {
    pub address: BeneficiaryAddress,
    pub date_added: UnixTimeSec,
    pub date_removed: Option<UnixTimeSec>,
    pub is_active: bool,
    pub total_claimed: TokenAmount,
}

impl LedgerRecord {
    pub fn v1(
        address: BeneficiaryAddress,
        date_added: UnixTimeSec,
        date_removed: Option<UnixTimeSec>,
        is_active: bool,
        total_claimed: TokenAmount,
    ) -> Result<Self, ContractViolation> {
        let r = Self {
            address,
            date_added,
            date_removed,
            is_active,
            total_claimed,
        };
        r.validate()?;
        Ok(r)
    }

    /// Key used to pick one record when the indexer reports the same address twice.
    pub fn recency_key(&self) -> (UnixTimeSec, UnixTimeSec, &TokenAmount, bool) {
        (
            self.date_added,
            self.date_removed.unwrap_or_default(),
            &self.total_claimed,
            self.is_active,
        )
    }
}

impl Validate for LedgerRecord {
    fn validate(&self) -> Result<(), ContractViolation> {
        if self.date_added.0 == 0 {
            return Err(ContractViolation::InvalidValue {
                field: "ledger_record.date_added",
                reason: "must be > 0",
            });
        }
        if let Some(removed) = self.date_removed {
            if removed.0 == 0 {
                return Err(ContractViolation::InvalidValue {
                    field: "ledger_record.date_removed",
                    reason: "must be > 0 when provided",
                });
            }
        }
        Ok(())
    }
}

/// Addresses that claimed on one day.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DailyClaimBatch {
    pub date: UnixTimeSec,
    pub beneficiaries: Vec<BeneficiaryAddress>,
}

impl DailyClaimBatch {
    pub fn v1(
        date: UnixTimeSec,
        beneficiaries: Vec<BeneficiaryAddress>,
    ) -> Result<Self, ContractViolation> {
        let b = Self {
            date,
            beneficiaries,
        };
        b.validate()?;
        Ok(b)
    }
}

impl Validate for DailyClaimBatch {
    fn validate(&self) -> Result<(), ContractViolation> {
        if self.date.0 == 0 {
            return Err(ContractViolation::InvalidValue {
                field: "daily_claim_batch.date",
                reason: "must be > 0",
            });
        }
        Ok(())
    }
}

/// The two contract calls an operator can trigger.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum LedgerMutationKind {
    Enroll,
    Remove,
}

impl LedgerMutationKind {
    pub const fn contract_function(self) -> &'static str {
        match self {
            Self::Enroll => "addBeneficiary",
            Self::Remove => "removeBeneficiary",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct LedgerMutation {
    pub kind: LedgerMutationKind,
    pub address: BeneficiaryAddress,
}

/// 32-byte transaction hash, lowercase hex with `0x`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct TxHash(String);

impl TxHash {
    pub fn new(raw: &str) -> Result<Self, ContractViolation> {
        let raw = raw.trim();
        let Some(hex) = raw.strip_prefix("0x") else {
            return Err(ContractViolation::InvalidValue {
                field: "tx_hash",
                reason: "must start with 0x",
            });
        };
        if hex.len() != 64 || !hex.chars().all(|c| c.is_ascii_hexdigit()) {
            return Err(ContractViolation::InvalidValue {
                field: "tx_hash",
                reason: "must contain exactly 64 hex digits",
            });
        }
        Ok(Self(raw.to_ascii_lowercase()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// `0x12345678...12345678`
    pub fn short_label(&self) -> String {
        format!("{}...{}", &self.0[..10], &self.0[self.0.len() - 8..])
    }

    pub fn explorer_url(&self, tx_base_url: &str) -> String {
        format!("{}{}", tx_base_url, self.0)
    }
}

impl fmt::Display for TxHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl TryFrom<String> for TxHash {
    type Error = ContractViolation;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(&value)
    }
}

impl From<TxHash> for String {
    fn from(value: TxHash) -> Self {
        value.0
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TxReceiptStatus {
    Success,
    Reverted,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TxReceipt {
    pub tx_hash: TxHash,
    pub status: TxReceiptStatus,
}
