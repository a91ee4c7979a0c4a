#![forbid(unsafe_code)]

use std::sync::Arc;

use async_trait::async_trait;
use subsidy_engines::profile_api::{ProfileApiError, ProfileApiRuntime};
use subsidy_engines::subgraph::SubgraphRuntime;
use subsidy_engines::EngineError;
use subsidy_kernel_contracts::address::BeneficiaryAddress;
use subsidy_kernel_contracts::ledger::{DailyClaimBatch, LedgerRecord, TxHash};
use subsidy_kernel_contracts::profile::{ProfileDraft, ProfilePatch, ProfileRecord};
use subsidy_os::clients::{
    ClientError, LedgerQueryClient, ProfileClientError, ProfileStoreClient, UsageReporter,
};
use tracing::info;

/// Runs a blocking engine call on the blocking pool.
async fn run_blocking<T, E, F>(service: &'static str, call: F) -> Result<T, E>
where
    F: FnOnce() -> Result<T, E> + Send + 'static,
    T: Send + 'static,
    E: From<ClientError> + Send + 'static,
{
    match tokio::task::spawn_blocking(call).await {
        Ok(result) => result,
        Err(err) => Err(E::from(ClientError::Unavailable {
            service,
            detail: format!("blocking task failed: {err}"),
        })),
    }
}

pub fn engine_to_client_error(err: EngineError) -> ClientError {
    let service = err.service();
    match err {
        EngineError::Decode { detail, .. } => ClientError::Malformed { service, detail },
        EngineError::Contract(v) => ClientError::Malformed {
            service,
            detail: v.to_string(),
        },
        other => ClientError::Unavailable {
            service,
            detail: other.to_string(),
        },
    }
}

fn profile_api_to_client_error(err: ProfileApiError) -> ClientError {
    match err {
        ProfileApiError::Engine(e) => engine_to_client_error(e),
        ProfileApiError::BadRequest(detail) => ClientError::Rejected {
            service: "profile_api",
            detail,
        },
        other => ClientError::Unavailable {
            service: "profile_api",
            detail: other.to_string(),
        },
    }
}

fn profile_api_to_profile_error(
    err: ProfileApiError,
    address: &BeneficiaryAddress,
) -> ProfileClientError {
    match err {
        ProfileApiError::NotFound => ProfileClientError::NotFound(address.clone()),
        ProfileApiError::Conflict => ProfileClientError::Conflict(address.clone()),
        ProfileApiError::BadRequest(detail) => ProfileClientError::Rejected(detail),
        other => ProfileClientError::Transport(profile_api_to_client_error(other)),
    }
}

/// `LedgerQueryClient` over the subgraph runtime.
#[derive(Debug, Clone)]
pub struct SubgraphLedgerClient {
    runtime: Arc<SubgraphRuntime>,
}

impl SubgraphLedgerClient {
    pub fn new(runtime: SubgraphRuntime) -> Self {
        Self {
            runtime: Arc::new(runtime),
        }
    }
}

#[async_trait]
impl LedgerQueryClient for SubgraphLedgerClient {
    async fn beneficiaries(&self) -> Result<Vec<LedgerRecord>, ClientError> {
        let rt = Arc::clone(&self.runtime);
        run_blocking("subgraph", move || {
            rt.beneficiaries().map_err(engine_to_client_error)
        })
        .await
    }

    async fn beneficiary(
        &self,
        address: &BeneficiaryAddress,
    ) -> Result<Option<LedgerRecord>, ClientError> {
        let rt = Arc::clone(&self.runtime);
        let address = address.clone();
        run_blocking("subgraph", move || {
            rt.beneficiary(&address).map_err(engine_to_client_error)
        })
        .await
    }

    async fn daily_claims(&self) -> Result<Vec<DailyClaimBatch>, ClientError> {
        let rt = Arc::clone(&self.runtime);
        run_blocking("subgraph", move || {
            rt.daily_claims().map_err(engine_to_client_error)
        })
        .await
    }
}

/// `ProfileStoreClient` over the remote profile REST API.
#[derive(Debug, Clone)]
pub struct RemoteProfileClient {
    runtime: Arc<ProfileApiRuntime>,
}

impl RemoteProfileClient {
    pub fn new(runtime: ProfileApiRuntime) -> Self {
        Self {
            runtime: Arc::new(runtime),
        }
    }
}

#[async_trait]
impl ProfileStoreClient for RemoteProfileClient {
    async fn fetch_all(&self) -> Result<Vec<ProfileRecord>, ClientError> {
        let rt = Arc::clone(&self.runtime);
        run_blocking("profile_api", move || {
            rt.list().map_err(profile_api_to_client_error)
        })
        .await
    }

    async fn fetch_one(
        &self,
        address: &BeneficiaryAddress,
    ) -> Result<Option<ProfileRecord>, ClientError> {
        let rt = Arc::clone(&self.runtime);
        let address = address.clone();
        run_blocking("profile_api", move || {
            rt.get(&address).map_err(profile_api_to_client_error)
        })
        .await
    }

    async fn fetch_batch(
        &self,
        addresses: &[BeneficiaryAddress],
    ) -> Result<Vec<ProfileRecord>, ClientError> {
        if addresses.is_empty() {
            return Ok(Vec::new());
        }
        let rt = Arc::clone(&self.runtime);
        let addresses = addresses.to_vec();
        run_blocking("profile_api", move || {
            rt.batch(&addresses).map_err(profile_api_to_client_error)
        })
        .await
    }

    async fn create(&self, draft: &ProfileDraft) -> Result<ProfileRecord, ProfileClientError> {
        let rt = Arc::clone(&self.runtime);
        let draft = draft.clone();
        run_blocking("profile_api", move || {
            rt.create(&draft)
                .map_err(|e| profile_api_to_profile_error(e, &draft.address))
        })
        .await
    }

    async fn update(
        &self,
        address: &BeneficiaryAddress,
        patch: &ProfilePatch,
    ) -> Result<ProfileRecord, ProfileClientError> {
        let rt = Arc::clone(&self.runtime);
        let address = address.clone();
        let patch = patch.clone();
        run_blocking("profile_api", move || {
            rt.update(&address, &patch)
                .map_err(|e| profile_api_to_profile_error(e, &address))
        })
        .await
    }

    async fn delete(&self, address: &BeneficiaryAddress) -> Result<(), ProfileClientError> {
        let rt = Arc::clone(&self.runtime);
        let address = address.clone();
        run_blocking("profile_api", move || {
            rt.delete(&address)
                .map_err(|e| profile_api_to_profile_error(e, &address))
        })
        .await
    }
}

/// Records confirmed transactions in the process log.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingUsageReporter;

#[async_trait]
impl UsageReporter for TracingUsageReporter {
    async fn report_transaction(&self, tx_hash: &TxHash, chain_id: u64) -> Result<(), ClientError> {
        info!(tx = tx_hash.as_str(), chain_id, "usage: confirmed transaction");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use subsidy_kernel_contracts::ContractViolation;

    use super::*;

    fn addr() -> BeneficiaryAddress {
        BeneficiaryAddress::parse("0x1111111111111111111111111111111111111111").unwrap()
    }

    #[test]
    fn at_bridge_01_engine_errors_map_to_client_kinds() {
        assert!(matches!(
            engine_to_client_error(EngineError::Transport {
                service: "subgraph",
                kind: "timeout",
            }),
            ClientError::Unavailable {
                service: "subgraph",
                ..
            }
        ));
        assert!(matches!(
            engine_to_client_error(EngineError::Decode {
                service: "subgraph",
                detail: "eof".to_string(),
            }),
            ClientError::Malformed { .. }
        ));
        assert!(matches!(
            engine_to_client_error(EngineError::Contract(ContractViolation::InvalidValue {
                field: "beneficiary_address",
                reason: "must be lowercase canonical form",
            })),
            ClientError::Malformed {
                service: "contract",
                ..
            }
        ));
    }

    #[test]
    fn at_bridge_02_profile_api_outcomes_keep_their_meaning() {
        let a = addr();
        assert_eq!(
            profile_api_to_profile_error(ProfileApiError::Conflict, &a),
            ProfileClientError::Conflict(a.clone())
        );
        assert_eq!(
            profile_api_to_profile_error(ProfileApiError::NotFound, &a),
            ProfileClientError::NotFound(a.clone())
        );
        assert!(matches!(
            profile_api_to_profile_error(
                ProfileApiError::Engine(EngineError::Status {
                    service: "profile_api",
                    status: 500,
                    message: None,
                }),
                &a
            ),
            ProfileClientError::Transport(ClientError::Unavailable { .. })
        ));
        let rejected = profile_api_to_profile_error(
            ProfileApiError::BadRequest("Invalid Ethereum address".to_string()),
            &a,
        );
        assert_eq!(
            rejected,
            ProfileClientError::Rejected("Invalid Ethereum address".to_string())
        );
        assert!(matches!(
            subsidy_os::AdminError::from(rejected),
            subsidy_os::AdminError::Rejected(_)
        ));
        assert!(matches!(
            profile_api_to_client_error(ProfileApiError::BadRequest("bad".to_string())),
            ClientError::Rejected {
                service: "profile_api",
                ..
            }
        ));
    }

    #[tokio::test]
    async fn at_bridge_03_blocking_task_panic_is_unavailable() {
        let out: Result<(), ClientError> =
            run_blocking("subgraph", || -> Result<(), ClientError> { panic!("boom") }).await;
        assert!(matches!(
            out,
            Err(ClientError::Unavailable {
                service: "subgraph",
                ..
            })
        ));
    }
}
