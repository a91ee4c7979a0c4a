#![forbid(unsafe_code)]

use std::sync::{Arc, Mutex};
use std::time::{SystemTime, UNIX_EPOCH};

use async_trait::async_trait;
use subsidy_kernel_contracts::address::BeneficiaryAddress;
use subsidy_kernel_contracts::ledger::{
    DailyClaimBatch, LedgerMutation, LedgerRecord, TxHash, TxReceipt,
};
use subsidy_kernel_contracts::profile::{ProfileDraft, ProfilePatch, ProfileRecord};
use subsidy_kernel_contracts::{ContractViolation, UnixTimeSec};
use subsidy_storage::profile_store::{ProfileStore, StorageError};
use subsidy_storage::repo::ProfileTablesRepo;

/// Transport or availability failure at a data-source boundary. A lookup miss is never
/// reported through this type.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ClientError {
    #[error("{service} unavailable: {detail}")]
    Unavailable {
        service: &'static str,
        detail: String,
    },
    #[error("{service} returned malformed data: {detail}")]
    Malformed {
        service: &'static str,
        detail: String,
    },
    /// The service answered and refused the request as invalid.
    #[error("{service} rejected the request: {detail}")]
    Rejected {
        service: &'static str,
        detail: String,
    },
}

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ProfileClientError {
    #[error("profile already exists for {0}")]
    Conflict(BeneficiaryAddress),
    #[error("no profile for {0}")]
    NotFound(BeneficiaryAddress),
    #[error("profile rejected: {0}")]
    Invalid(ContractViolation),
    /// Refused by the remote store's own validation.
    #[error("profile store rejected the write: {0}")]
    Rejected(String),
    #[error(transparent)]
    Transport(#[from] ClientError),
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum MutationError {
    #[error("submission rejected: {0}")]
    SubmissionRejected(String),
    #[error("transaction {0} reverted")]
    Reverted(TxHash),
    #[error("confirmation of {tx_hash} failed: {detail}")]
    ConfirmationFailed { tx_hash: TxHash, detail: String },
}

/// Read-only access to indexed enrollment, removal and claim events.
#[async_trait]
pub trait LedgerQueryClient: Send + Sync {
    async fn beneficiaries(&self) -> Result<Vec<LedgerRecord>, ClientError>;

    async fn beneficiary(
        &self,
        address: &BeneficiaryAddress,
    ) -> Result<Option<LedgerRecord>, ClientError>;

    async fn daily_claims(&self) -> Result<Vec<DailyClaimBatch>, ClientError>;
}

/// Off-chain profile CRUD keyed by canonical address.
#[async_trait]
pub trait ProfileStoreClient: Send + Sync {
    async fn fetch_all(&self) -> Result<Vec<ProfileRecord>, ClientError>;

    async fn fetch_one(
        &self,
        address: &BeneficiaryAddress,
    ) -> Result<Option<ProfileRecord>, ClientError>;

    async fn fetch_batch(
        &self,
        addresses: &[BeneficiaryAddress],
    ) -> Result<Vec<ProfileRecord>, ClientError>;

    async fn create(&self, draft: &ProfileDraft) -> Result<ProfileRecord, ProfileClientError>;

    async fn update(
        &self,
        address: &BeneficiaryAddress,
        patch: &ProfilePatch,
    ) -> Result<ProfileRecord, ProfileClientError>;

    async fn delete(&self, address: &BeneficiaryAddress) -> Result<(), ProfileClientError>;
}

/// Wallet-side boundary: submit a contract call, then wait for its receipt.
///
/// `await_receipt` may take an unbounded time; callers never wrap it in a timeout.
#[async_trait]
pub trait LedgerMutator: Send + Sync {
    async fn submit(&self, mutation: &LedgerMutation) -> Result<TxHash, MutationError>;

    async fn await_receipt(&self, tx_hash: &TxHash) -> Result<TxReceipt, MutationError>;
}

/// Best-effort usage telemetry for confirmed transactions.
#[async_trait]
pub trait UsageReporter: Send + Sync {
    async fn report_transaction(&self, tx_hash: &TxHash, chain_id: u64)
        -> Result<(), ClientError>;
}

#[derive(Debug, Default, Clone, Copy)]
pub struct NoopUsageReporter;

#[async_trait]
impl UsageReporter for NoopUsageReporter {
    async fn report_transaction(
        &self,
        _tx_hash: &TxHash,
        _chain_id: u64,
    ) -> Result<(), ClientError> {
        Ok(())
    }
}

pub fn system_now() -> UnixTimeSec {
    let secs = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0);
    UnixTimeSec(secs.max(1))
}

/// Profile client over an in-process `ProfileStore`.
#[derive(Debug, Clone)]
pub struct StoreBackedProfileClient {
    store: Arc<Mutex<ProfileStore>>,
    now: fn() -> UnixTimeSec,
}

impl StoreBackedProfileClient {
    pub fn new(store: Arc<Mutex<ProfileStore>>) -> Self {
        Self {
            store,
            now: system_now,
        }
    }

    pub fn with_clock(store: Arc<Mutex<ProfileStore>>, now: fn() -> UnixTimeSec) -> Self {
        Self { store, now }
    }

    fn locked(&self) -> Result<std::sync::MutexGuard<'_, ProfileStore>, ClientError> {
        self.store.lock().map_err(|_| ClientError::Unavailable {
            service: "profile_store",
            detail: "profile store lock poisoned".to_string(),
        })
    }
}

#[async_trait]
impl ProfileStoreClient for StoreBackedProfileClient {
    async fn fetch_all(&self) -> Result<Vec<ProfileRecord>, ClientError> {
        let store = self.locked()?;
        Ok(store
            .profile_rows_newest_first()
            .into_iter()
            .cloned()
            .collect())
    }

    async fn fetch_one(
        &self,
        address: &BeneficiaryAddress,
    ) -> Result<Option<ProfileRecord>, ClientError> {
        Ok(self.locked()?.profile_row(address).cloned())
    }

    async fn fetch_batch(
        &self,
        addresses: &[BeneficiaryAddress],
    ) -> Result<Vec<ProfileRecord>, ClientError> {
        let store = self.locked()?;
        Ok(store
            .profile_rows_for_addresses(addresses)
            .into_iter()
            .cloned()
            .collect())
    }

    async fn create(&self, draft: &ProfileDraft) -> Result<ProfileRecord, ProfileClientError> {
        let now = (self.now)();
        let mut store = self.locked()?;
        store
            .insert_profile_row(draft.clone(), now)
            .map_err(|e| storage_to_client_error(e, &draft.address))
    }

    async fn update(
        &self,
        address: &BeneficiaryAddress,
        patch: &ProfilePatch,
    ) -> Result<ProfileRecord, ProfileClientError> {
        let now = (self.now)();
        let mut store = self.locked()?;
        store
            .update_profile_row(address, patch, now)
            .map_err(|e| storage_to_client_error(e, address))
    }

    async fn delete(&self, address: &BeneficiaryAddress) -> Result<(), ProfileClientError> {
        let mut store = self.locked()?;
        store
            .delete_profile_row(address)
            .map(|_| ())
            .map_err(|e| storage_to_client_error(e, address))
    }
}

pub fn storage_to_client_error(
    err: StorageError,
    address: &BeneficiaryAddress,
) -> ProfileClientError {
    match err {
        StorageError::DuplicateKey { .. } => ProfileClientError::Conflict(address.clone()),
        StorageError::NotFound { .. } => ProfileClientError::NotFound(address.clone()),
        StorageError::ContractViolation(v) => ProfileClientError::Invalid(v),
    }
}
