#![forbid(unsafe_code)]

use std::collections::BTreeMap;
use std::sync::{Arc, Mutex, MutexGuard};

use subsidy_kernel_contracts::address::BeneficiaryAddress;
use subsidy_kernel_contracts::ledger::LedgerMutationKind;
use subsidy_kernel_contracts::profile::ProfileDraft;
use subsidy_kernel_contracts::Validate;
use tokio::sync::oneshot;
use tracing::{error, info, warn};

use crate::clients::ClientError;
use crate::coordinator::{TerminalOutcome, WriteCoordinator, WriteReport};
use crate::error::AdminError;

/// Receives terminal reports nobody is waiting for any more.
pub trait OperationNotifier: Send + Sync {
    fn notify(&self, report: &WriteReport);
}

#[derive(Debug, Default, Clone, Copy)]
pub struct LogNotifier;

impl OperationNotifier for LogNotifier {
    fn notify(&self, report: &WriteReport) {
        match &report.outcome {
            TerminalOutcome::FullSuccess { .. } => info!(
                op = report.operation_id.as_str(),
                address = %report.address,
                title = %report.status.title,
                "abandoned operation finished"
            ),
            TerminalOutcome::LedgerOnly { .. } => error!(
                op = report.operation_id.as_str(),
                address = %report.address,
                title = %report.status.title,
                detail = %report.status.detail,
                "abandoned operation finished with a partial failure"
            ),
            TerminalOutcome::MutationRejected { .. } => warn!(
                op = report.operation_id.as_str(),
                address = %report.address,
                detail = %report.status.detail,
                "abandoned operation was rejected"
            ),
        }
    }
}

#[derive(Debug)]
struct InFlight {
    kind: LedgerMutationKind,
    // What the operator typed; shown while the operation is pending. Cleared on abandon.
    pending: Option<ProfileDraft>,
    abandoned: bool,
}

type InFlightMap = BTreeMap<BeneficiaryAddress, InFlight>;

/// Caller side of one submitted operation.
#[derive(Debug)]
pub struct OperationHandle {
    address: BeneficiaryAddress,
    receiver: oneshot::Receiver<Result<WriteReport, AdminError>>,
}

impl OperationHandle {
    pub fn address(&self) -> &BeneficiaryAddress {
        &self.address
    }

    /// Waits for the terminal report. Confirmation is not time-bounded.
    pub async fn wait(self) -> Result<WriteReport, AdminError> {
        match self.receiver.await {
            Ok(result) => result,
            Err(_) => Err(AdminError::Unavailable(ClientError::Unavailable {
                service: "write_coordinator",
                detail: "operation task ended without a report".to_string(),
            })),
        }
    }
}

/// Per-operator session: at most one operation in flight per address.
pub struct AdminSession {
    coordinator: Arc<WriteCoordinator>,
    notifier: Arc<dyn OperationNotifier>,
    in_flight: Arc<Mutex<InFlightMap>>,
}

impl AdminSession {
    pub fn new(coordinator: Arc<WriteCoordinator>, notifier: Arc<dyn OperationNotifier>) -> Self {
        Self {
            coordinator,
            notifier,
            in_flight: Arc::new(Mutex::new(BTreeMap::new())),
        }
    }

    pub fn submit_add(&self, draft: ProfileDraft) -> Result<OperationHandle, AdminError> {
        draft.validate()?;
        let address = draft.address.clone();
        self.claim(&address, LedgerMutationKind::Enroll, Some(draft.clone()))?;
        let coordinator = Arc::clone(&self.coordinator);
        Ok(self.launch(address, async move { coordinator.run_add(draft).await }))
    }

    pub fn submit_remove(
        &self,
        address: BeneficiaryAddress,
    ) -> Result<OperationHandle, AdminError> {
        self.claim(&address, LedgerMutationKind::Remove, None)?;
        let coordinator = Arc::clone(&self.coordinator);
        let target = address.clone();
        Ok(self.launch(address, async move { coordinator.run_remove(target).await }))
    }

    /// Operator walked away before the terminal state. The pending payload is discarded
    /// here; the detached operation still finishes and reports through the notifier.
    pub fn abandon(&self, handle: OperationHandle) {
        let mut map = lock_map(&self.in_flight);
        if let Some(entry) = map.get_mut(&handle.address) {
            entry.pending = None;
            entry.abandoned = true;
            info!(address = %handle.address, kind = ?entry.kind, "operation abandoned by operator");
        }
        drop(map);
        drop(handle);
    }

    pub fn is_busy(&self, address: &BeneficiaryAddress) -> bool {
        lock_map(&self.in_flight).contains_key(address)
    }

    pub fn pending_profile(&self, address: &BeneficiaryAddress) -> Option<ProfileDraft> {
        lock_map(&self.in_flight)
            .get(address)
            .and_then(|e| e.pending.clone())
    }

    fn claim(
        &self,
        address: &BeneficiaryAddress,
        kind: LedgerMutationKind,
        pending: Option<ProfileDraft>,
    ) -> Result<(), AdminError> {
        let mut map = lock_map(&self.in_flight);
        if map.contains_key(address) {
            return Err(AdminError::OperationInFlight(address.clone()));
        }
        map.insert(
            address.clone(),
            InFlight {
                kind,
                pending,
                abandoned: false,
            },
        );
        Ok(())
    }

    fn launch<F>(&self, address: BeneficiaryAddress, operation: F) -> OperationHandle
    where
        F: std::future::Future<Output = Result<WriteReport, AdminError>> + Send + 'static,
    {
        let (sender, receiver) = oneshot::channel();
        let in_flight = Arc::clone(&self.in_flight);
        let notifier = Arc::clone(&self.notifier);
        let key = address.clone();
        tokio::spawn(async move {
            let result = operation.await;
            let abandoned = lock_map(&in_flight)
                .remove(&key)
                .map(|e| e.abandoned)
                .unwrap_or(false);
            if abandoned {
                if let Ok(report) = &result {
                    notifier.notify(report);
                }
                return;
            }
            if let Err(Ok(report)) = sender.send(result) {
                notifier.notify(&report);
            }
        });
        OperationHandle { address, receiver }
    }
}

fn lock_map(map: &Mutex<InFlightMap>) -> MutexGuard<'_, InFlightMap> {
    map.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}
