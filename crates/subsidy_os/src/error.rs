#![forbid(unsafe_code)]

use subsidy_kernel_contracts::address::BeneficiaryAddress;
use subsidy_kernel_contracts::ledger::TxHash;
use subsidy_kernel_contracts::ContractViolation;

use crate::clients::{ClientError, MutationError, ProfileClientError};

/// Every failure a dashboard caller can observe.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum AdminError {
    /// Rejected locally, before any I/O.
    #[error("validation failed: {0}")]
    Validation(#[from] ContractViolation),
    #[error("not found: {0}")]
    NotFound(BeneficiaryAddress),
    /// Duplicate profile create; the caller may switch to update.
    #[error("profile already exists for {0}")]
    Conflict(BeneficiaryAddress),
    /// Terminal. No profile write was attempted.
    #[error("ledger mutation rejected: {0}")]
    MutationRejected(MutationError),
    /// Terminal. The ledger is authoritative; the profile store is stale until an operator
    /// retries the profile write by hand.
    #[error("ledger confirmed in {tx_hash} but the profile write for {address} failed: {cause}")]
    PartialFailure {
        tx_hash: TxHash,
        address: BeneficiaryAddress,
        cause: ProfileClientError,
    },
    /// The session already has an operation in flight for this address.
    #[error("an operation is already in flight for {0}")]
    OperationInFlight(BeneficiaryAddress),
    /// The profile store refused the write; retrying unchanged will fail again.
    #[error("rejected by the profile store: {0}")]
    Rejected(String),
    #[error(transparent)]
    Unavailable(#[from] ClientError),
}

impl From<ProfileClientError> for AdminError {
    fn from(err: ProfileClientError) -> Self {
        match err {
            ProfileClientError::Conflict(a) => AdminError::Conflict(a),
            ProfileClientError::NotFound(a) => AdminError::NotFound(a),
            ProfileClientError::Invalid(v) => AdminError::Validation(v),
            ProfileClientError::Rejected(detail) => AdminError::Rejected(detail),
            ProfileClientError::Transport(e) => AdminError::Unavailable(e),
        }
    }
}
