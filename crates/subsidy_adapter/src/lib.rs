#![forbid(unsafe_code)]

pub mod bridges;
pub mod config;
pub mod journal;

use std::sync::{Arc, Mutex, MutexGuard};

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use subsidy_kernel_contracts::address::BeneficiaryAddress;
use subsidy_kernel_contracts::profile::{ProfileDraft, ProfilePatchBody, ProfileRecord};
use subsidy_kernel_contracts::{ContractViolation, UnixTimeSec};
use subsidy_os::clients::system_now;
use subsidy_storage::profile_store::{ProfileStore, StorageError};
use subsidy_storage::repo::ProfileTablesRepo;
use tracing::{error, warn};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;

use crate::journal::{JournalError, JournalOp, ProfileJournal};

pub const MSG_INVALID_ADDRESS: &str = "Invalid Ethereum address";
pub const MSG_ADDRESS_AND_NAME_REQUIRED: &str = "Address and name are required";
pub const MSG_ADDRESSES_NOT_ARRAY: &str = "Addresses must be an array";

/// Installs the process-wide subscriber. `RUST_LOG` overrides the `info` default.
pub fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_target(false))
        .try_init();
}

/// Request-level failure; rendered as `{ "error": "..." }`.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ApiError {
    #[error("{0}")]
    BadRequest(String),
    #[error("Beneficiary not found")]
    NotFound,
    #[error("Beneficiary with this address already exists")]
    Conflict,
    #[error("{0}")]
    Internal(&'static str),
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            Self::BadRequest(_) => StatusCode::BAD_REQUEST,
            Self::NotFound => StatusCode::NOT_FOUND,
            Self::Conflict => StatusCode::CONFLICT,
            Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn invalid_address() -> Self {
        Self::BadRequest(MSG_INVALID_ADDRESS.to_string())
    }

    fn from_violation(v: ContractViolation) -> Self {
        Self::BadRequest(v.to_string())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorBody {
    pub error: String,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = ErrorBody {
            error: self.to_string(),
        };
        (self.status(), Json(body)).into_response()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
}

/// `POST /api/beneficiaries` body. Address is operator input, not yet canonical.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateProfileRequest {
    #[serde(default)]
    pub address: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub phone_number: Option<String>,
    #[serde(default)]
    pub responsable: Option<String>,
}

/// `POST /api/beneficiaries/batch` body. `addresses` is checked for shape by the runtime.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BatchProfilesRequest {
    #[serde(default)]
    pub addresses: Value,
}

/// Profile table served over HTTP, optionally backed by an append-only journal.
#[derive(Debug, Clone)]
pub struct AdminRuntime {
    store: Arc<Mutex<ProfileStore>>,
    journal: Option<ProfileJournal>,
    now: fn() -> UnixTimeSec,
}

impl Default for AdminRuntime {
    fn default() -> Self {
        Self::new(Arc::new(Mutex::new(ProfileStore::new_in_memory())))
    }
}

impl AdminRuntime {
    pub fn new(store: Arc<Mutex<ProfileStore>>) -> Self {
        Self {
            store,
            journal: None,
            now: system_now,
        }
    }

    pub fn new_with_persistence(
        store: Arc<Mutex<ProfileStore>>,
        journal: ProfileJournal,
    ) -> Result<Self, JournalError> {
        {
            let mut guard = store.lock().unwrap_or_else(|p| p.into_inner());
            journal.replay_into(&mut guard)?;
        }
        Ok(Self {
            store,
            journal: Some(journal),
            now: system_now,
        })
    }

    pub fn with_clock(mut self, now: fn() -> UnixTimeSec) -> Self {
        self.now = now;
        self
    }

    pub fn store(&self) -> Arc<Mutex<ProfileStore>> {
        Arc::clone(&self.store)
    }

    pub fn health(&self) -> HealthResponse {
        HealthResponse {
            status: "ok".to_string(),
        }
    }

    pub fn list_profiles(&self) -> Result<Vec<ProfileRecord>, ApiError> {
        let store = self.locked("Failed to fetch beneficiaries")?;
        Ok(store.profile_rows_newest_first().into_iter().cloned().collect())
    }

    pub fn get_profile(&self, raw_address: &str) -> Result<ProfileRecord, ApiError> {
        let address = parse_address(raw_address)?;
        let store = self.locked("Failed to fetch beneficiary")?;
        store.profile_row(&address).cloned().ok_or(ApiError::NotFound)
    }

    pub fn create_profile(&self, request: CreateProfileRequest) -> Result<ProfileRecord, ApiError> {
        let (Some(raw_address), Some(name)) = (
            request.address.as_deref().filter(|a| !a.trim().is_empty()),
            request.name.as_deref().filter(|n| !n.trim().is_empty()),
        ) else {
            return Err(ApiError::BadRequest(MSG_ADDRESS_AND_NAME_REQUIRED.to_string()));
        };
        let address = parse_address(raw_address)?;
        let draft = ProfileDraft::v1(
            address,
            name,
            request.phone_number.as_deref(),
            request.responsable.as_deref(),
        )
        .map_err(ApiError::from_violation)?;

        const FAILED: &str = "Failed to create beneficiary";
        let now = (self.now)();
        let mut store = self.locked(FAILED)?;
        let record = store
            .insert_profile_row(draft, now)
            .map_err(|e| storage_to_api_error(e, FAILED))?;
        if let Err(err) = self.persist(JournalOp::Put {
            profile: record.clone(),
        }) {
            let _ = store.delete_profile_row(&record.address);
            return Err(journal_failure(err, FAILED));
        }
        Ok(record)
    }

    pub fn update_profile(
        &self,
        raw_address: &str,
        body: ProfilePatchBody,
    ) -> Result<ProfileRecord, ApiError> {
        let address = parse_address(raw_address)?;
        let patch = body.into_patch().map_err(ApiError::from_violation)?;

        const FAILED: &str = "Failed to update beneficiary";
        let now = (self.now)();
        let mut store = self.locked(FAILED)?;
        let previous = store.profile_row(&address).cloned().ok_or(ApiError::NotFound)?;
        let record = store
            .update_profile_row(&address, &patch, now)
            .map_err(|e| storage_to_api_error(e, FAILED))?;
        if let Err(err) = self.persist(JournalOp::Put {
            profile: record.clone(),
        }) {
            let _ = store.restore_profile(previous);
            return Err(journal_failure(err, FAILED));
        }
        Ok(record)
    }

    pub fn delete_profile(&self, raw_address: &str) -> Result<(), ApiError> {
        let address = parse_address(raw_address)?;

        const FAILED: &str = "Failed to delete beneficiary";
        let mut store = self.locked(FAILED)?;
        let removed = store
            .delete_profile_row(&address)
            .map_err(|e| storage_to_api_error(e, FAILED))?;
        if let Err(err) = self.persist(JournalOp::Delete { address }) {
            let _ = store.restore_profile(removed);
            return Err(journal_failure(err, FAILED));
        }
        Ok(())
    }

    /// Entries that are not valid addresses are skipped, not rejected.
    pub fn batch_profiles(
        &self,
        request: BatchProfilesRequest,
    ) -> Result<Vec<ProfileRecord>, ApiError> {
        let Value::Array(items) = request.addresses else {
            return Err(ApiError::BadRequest(MSG_ADDRESSES_NOT_ARRAY.to_string()));
        };
        let addresses: Vec<BeneficiaryAddress> = items
            .iter()
            .filter_map(Value::as_str)
            .filter_map(|raw| BeneficiaryAddress::parse(raw).ok())
            .collect();
        let store = self.locked("Failed to fetch beneficiaries")?;
        Ok(store
            .profile_rows_for_addresses(&addresses)
            .into_iter()
            .cloned()
            .collect())
    }

    fn persist(&self, change: JournalOp) -> Result<(), JournalError> {
        match &self.journal {
            Some(journal) => journal.append(change),
            None => Ok(()),
        }
    }

    fn locked(&self, failure: &'static str) -> Result<MutexGuard<'_, ProfileStore>, ApiError> {
        self.store.lock().map_err(|_| {
            error!("profile store lock poisoned");
            ApiError::Internal(failure)
        })
    }
}

fn parse_address(raw: &str) -> Result<BeneficiaryAddress, ApiError> {
    BeneficiaryAddress::parse(raw).map_err(|_| ApiError::invalid_address())
}

fn storage_to_api_error(err: StorageError, failure: &'static str) -> ApiError {
    match err {
        StorageError::DuplicateKey { .. } => ApiError::Conflict,
        StorageError::NotFound { .. } => ApiError::NotFound,
        StorageError::ContractViolation(v) => {
            warn!(error = %v, "{failure}");
            ApiError::from_violation(v)
        }
    }
}

fn journal_failure(err: JournalError, failure: &'static str) -> ApiError {
    error!(error = %err, "{failure}: journal append failed, change rolled back");
    ApiError::Internal(failure)
}
