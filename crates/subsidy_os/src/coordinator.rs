#![forbid(unsafe_code)]

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use serde::Serialize;
use sha2::{Digest, Sha256};
use subsidy_kernel_contracts::address::BeneficiaryAddress;
use subsidy_kernel_contracts::ledger::{
    LedgerMutation, LedgerMutationKind, TxHash, TxReceiptStatus,
};
use subsidy_kernel_contracts::profile::ProfileDraft;
use subsidy_kernel_contracts::{ReasonCodeId, Validate};
use tracing::{error, info, warn};

use crate::clients::{
    LedgerMutator, MutationError, NoopUsageReporter, ProfileClientError, ProfileStoreClient,
    UsageReporter,
};
use crate::editor::{write_profile, ProfileWriteKind};
use crate::error::AdminError;

pub mod reason_codes {
    use subsidy_kernel_contracts::ReasonCodeId;

    // Write-coordinator reason-code namespace.
    pub const WC_FULL_SUCCESS: ReasonCodeId = ReasonCodeId(0x5743_0001);
    pub const WC_REMOVE_CONFIRMED: ReasonCodeId = ReasonCodeId(0x5743_0002);
    pub const WC_SUBMISSION_REJECTED: ReasonCodeId = ReasonCodeId(0x5743_0003);
    pub const WC_MUTATION_REVERTED: ReasonCodeId = ReasonCodeId(0x5743_0004);
    pub const WC_CONFIRMATION_FAILED: ReasonCodeId = ReasonCodeId(0x5743_0005);
    pub const WC_PROFILE_PERSIST_FAILED: ReasonCodeId = ReasonCodeId(0x5743_0006);
}

pub const CELO_MAINNET_CHAIN_ID: u64 = 42_220;
pub const CELOSCAN_TX_BASE_URL: &str = "https://celoscan.io/tx/";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum SagaPhase {
    Idle,
    MutationSubmitted,
    MutationConfirmed,
    ProfilePersisted,
    MutationRejected,
    ProfilePersistFailed,
}

impl SagaPhase {
    pub fn can_advance_to(self, next: SagaPhase) -> bool {
        use SagaPhase::*;
        matches!(
            (self, next),
            (Idle, MutationSubmitted)
                | (Idle, MutationRejected)
                | (MutationSubmitted, MutationConfirmed)
                | (MutationSubmitted, MutationRejected)
                | (MutationConfirmed, ProfilePersisted)
                | (MutationConfirmed, ProfilePersistFailed)
        )
    }

    /// Terminal for an enrollment. A removal also ends at `MutationConfirmed`; use
    /// `is_terminal_for` when the operation kind is known.
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            SagaPhase::ProfilePersisted
                | SagaPhase::MutationRejected
                | SagaPhase::ProfilePersistFailed
        )
    }

    pub fn is_terminal_for(self, kind: LedgerMutationKind) -> bool {
        match kind {
            LedgerMutationKind::Enroll => self.is_terminal(),
            LedgerMutationKind::Remove => {
                matches!(self, SagaPhase::MutationConfirmed | SagaPhase::MutationRejected)
            }
        }
    }
}

/// Exactly one per finished operation.
#[derive(Debug, Clone, PartialEq)]
pub enum TerminalOutcome {
    FullSuccess {
        tx_hash: TxHash,
        profile_write: Option<ProfileWriteKind>,
    },
    /// Ledger confirmed, profile write failed. Never retried automatically.
    LedgerOnly {
        tx_hash: TxHash,
        cause: ProfileClientError,
    },
    MutationRejected {
        cause: MutationError,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum StatusSeverity {
    Success,
    Warning,
    Error,
}

/// What the operator is shown once an operation ends.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OperatorStatus {
    pub severity: StatusSeverity,
    pub title: String,
    pub detail: String,
    #[serde(skip)]
    pub reason_code: ReasonCodeId,
    pub tx_label: Option<String>,
    pub explorer_url: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct OperationId(String);

impl OperationId {
    fn derive(kind: LedgerMutationKind, address: &BeneficiaryAddress, seq: u64) -> Self {
        let mut hasher = Sha256::new();
        hasher.update(kind.contract_function().as_bytes());
        hasher.update(address.as_str().as_bytes());
        hasher.update(seq.to_be_bytes());
        let digest = hasher.finalize();
        let hex: String = digest[..8].iter().map(|b| format!("{b:02x}")).collect();
        Self(format!("op_{hex}"))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct WriteReport {
    pub operation_id: OperationId,
    pub kind: LedgerMutationKind,
    pub address: BeneficiaryAddress,
    pub phases: Vec<SagaPhase>,
    pub outcome: TerminalOutcome,
    pub status: OperatorStatus,
}

impl WriteReport {
    pub fn final_phase(&self) -> SagaPhase {
        self.phases.last().copied().unwrap_or(SagaPhase::Idle)
    }

    /// True once the trail ends in a terminal phase for this operation's kind.
    pub fn is_complete(&self) -> bool {
        self.final_phase().is_terminal_for(self.kind)
    }

    pub fn tx_hash(&self) -> Option<&TxHash> {
        match &self.outcome {
            TerminalOutcome::FullSuccess { tx_hash, .. }
            | TerminalOutcome::LedgerOnly { tx_hash, .. } => Some(tx_hash),
            TerminalOutcome::MutationRejected { cause } => match cause {
                MutationError::Reverted(h) => Some(h),
                MutationError::ConfirmationFailed { tx_hash, .. } => Some(tx_hash),
                MutationError::SubmissionRejected(_) => None,
            },
        }
    }

    /// The error view of a non-successful outcome.
    pub fn failure(&self) -> Option<AdminError> {
        match &self.outcome {
            TerminalOutcome::FullSuccess { .. } => None,
            TerminalOutcome::LedgerOnly { tx_hash, cause } => Some(AdminError::PartialFailure {
                tx_hash: tx_hash.clone(),
                address: self.address.clone(),
                cause: cause.clone(),
            }),
            TerminalOutcome::MutationRejected { cause } => {
                Some(AdminError::MutationRejected(cause.clone()))
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CoordinatorConfig {
    pub explorer_tx_base_url: String,
    pub chain_id: u64,
}

impl CoordinatorConfig {
    pub fn mvp_v1() -> Self {
        Self {
            explorer_tx_base_url: CELOSCAN_TX_BASE_URL.to_string(),
            chain_id: CELO_MAINNET_CHAIN_ID,
        }
    }
}

impl Default for CoordinatorConfig {
    fn default() -> Self {
        Self::mvp_v1()
    }
}

// Profile payload captured at submission; owned by exactly one operation and dropped at
// its terminal state.
struct PendingWrite {
    draft: ProfileDraft,
}

struct PhaseTrail {
    phases: Vec<SagaPhase>,
}

impl PhaseTrail {
    fn start() -> Self {
        Self {
            phases: vec![SagaPhase::Idle],
        }
    }

    fn current(&self) -> SagaPhase {
        self.phases.last().copied().unwrap_or(SagaPhase::Idle)
    }

    fn advance(&mut self, next: SagaPhase) {
        debug_assert!(self.current().can_advance_to(next));
        self.phases.push(next);
    }
}

/// Sequences a ledger mutation and, for enrollments, the dependent profile write.
pub struct WriteCoordinator {
    config: CoordinatorConfig,
    mutator: Arc<dyn LedgerMutator>,
    profiles: Arc<dyn ProfileStoreClient>,
    usage: Arc<dyn UsageReporter>,
    seq: AtomicU64,
}

impl WriteCoordinator {
    pub fn new(
        config: CoordinatorConfig,
        mutator: Arc<dyn LedgerMutator>,
        profiles: Arc<dyn ProfileStoreClient>,
    ) -> Self {
        Self {
            config,
            mutator,
            profiles,
            usage: Arc::new(NoopUsageReporter),
            seq: AtomicU64::new(0),
        }
    }

    pub fn with_usage_reporter(mut self, usage: Arc<dyn UsageReporter>) -> Self {
        self.usage = usage;
        self
    }

    pub fn config(&self) -> &CoordinatorConfig {
        &self.config
    }

    fn next_operation_id(
        &self,
        kind: LedgerMutationKind,
        address: &BeneficiaryAddress,
    ) -> OperationId {
        let seq = self.seq.fetch_add(1, Ordering::Relaxed);
        OperationId::derive(kind, address, seq)
    }

    /// Enroll on the ledger, then persist the profile once the receipt confirms.
    ///
    /// `Err` only for local validation; every outcome after submission is a report.
    pub async fn run_add(&self, draft: ProfileDraft) -> Result<WriteReport, AdminError> {
        draft.validate()?;
        let pending = PendingWrite { draft };
        let address = pending.draft.address.clone();
        let op = self.next_operation_id(LedgerMutationKind::Enroll, &address);
        let mut trail = PhaseTrail::start();
        info!(op = op.as_str(), address = %address, "enrollment started");

        let tx_hash = match self.mutate(LedgerMutationKind::Enroll, &address, &mut trail).await {
            Ok(h) => h,
            Err(cause) => {
                return Ok(self.rejected(op, LedgerMutationKind::Enroll, address, trail, cause));
            }
        };

        let report = match write_profile(self.profiles.as_ref(), &pending.draft).await {
            Ok((_, write)) => {
                trail.advance(SagaPhase::ProfilePersisted);
                info!(
                    op = op.as_str(),
                    address = %address,
                    tx = %tx_hash,
                    ?write,
                    "enrollment complete"
                );
                WriteReport {
                    status: self.status_full_success(LedgerMutationKind::Enroll, &tx_hash),
                    operation_id: op,
                    kind: LedgerMutationKind::Enroll,
                    address,
                    phases: trail.phases,
                    outcome: TerminalOutcome::FullSuccess {
                        tx_hash: tx_hash.clone(),
                        profile_write: Some(write),
                    },
                }
            }
            Err(cause) => {
                trail.advance(SagaPhase::ProfilePersistFailed);
                error!(
                    op = op.as_str(),
                    address = %address,
                    tx = %tx_hash,
                    error = %cause,
                    "ledger confirmed but profile write failed; manual update required"
                );
                WriteReport {
                    status: self.status_ledger_only(&tx_hash, &cause),
                    operation_id: op,
                    kind: LedgerMutationKind::Enroll,
                    address,
                    phases: trail.phases,
                    outcome: TerminalOutcome::LedgerOnly {
                        tx_hash: tx_hash.clone(),
                        cause,
                    },
                }
            }
        };
        drop(pending);

        self.report_usage(&tx_hash).await;
        Ok(report)
    }

    /// Ledger-only removal; the profile row is kept. The final phase is
    /// `MutationConfirmed` since no profile write follows.
    pub async fn run_remove(&self, address: BeneficiaryAddress) -> Result<WriteReport, AdminError> {
        let op = self.next_operation_id(LedgerMutationKind::Remove, &address);
        let mut trail = PhaseTrail::start();
        info!(op = op.as_str(), address = %address, "removal started");

        let tx_hash = match self.mutate(LedgerMutationKind::Remove, &address, &mut trail).await {
            Ok(h) => h,
            Err(cause) => {
                return Ok(self.rejected(op, LedgerMutationKind::Remove, address, trail, cause));
            }
        };
        info!(op = op.as_str(), address = %address, tx = %tx_hash, "removal complete");
        self.report_usage(&tx_hash).await;
        Ok(WriteReport {
            status: self.status_full_success(LedgerMutationKind::Remove, &tx_hash),
            operation_id: op,
            kind: LedgerMutationKind::Remove,
            address,
            phases: trail.phases,
            outcome: TerminalOutcome::FullSuccess {
                tx_hash,
                profile_write: None,
            },
        })
    }

    async fn mutate(
        &self,
        kind: LedgerMutationKind,
        address: &BeneficiaryAddress,
        trail: &mut PhaseTrail,
    ) -> Result<TxHash, MutationError> {
        let mutation = LedgerMutation {
            kind,
            address: address.clone(),
        };
        let tx_hash = self.mutator.submit(&mutation).await?;
        trail.advance(SagaPhase::MutationSubmitted);
        info!(
            function = kind.contract_function(),
            address = %address,
            tx = %tx_hash,
            "mutation submitted; awaiting receipt"
        );

        // No timeout: confirmation may take arbitrarily long.
        let receipt = self.mutator.await_receipt(&tx_hash).await?;
        if receipt.status == TxReceiptStatus::Reverted {
            return Err(MutationError::Reverted(tx_hash));
        }
        trail.advance(SagaPhase::MutationConfirmed);
        Ok(tx_hash)
    }

    async fn report_usage(&self, tx_hash: &TxHash) {
        if let Err(e) = self
            .usage
            .report_transaction(tx_hash, self.config.chain_id)
            .await
        {
            warn!(tx = %tx_hash, error = %e, "usage report failed");
        }
    }

    fn rejected(
        &self,
        op: OperationId,
        kind: LedgerMutationKind,
        address: BeneficiaryAddress,
        mut trail: PhaseTrail,
        cause: MutationError,
    ) -> WriteReport {
        trail.advance(SagaPhase::MutationRejected);
        warn!(
            op = op.as_str(),
            function = kind.contract_function(),
            address = %address,
            error = %cause,
            "ledger mutation rejected"
        );
        WriteReport {
            status: self.status_rejected(&cause),
            operation_id: op,
            kind,
            address,
            phases: trail.phases,
            outcome: TerminalOutcome::MutationRejected { cause },
        }
    }

    fn tx_links(&self, tx_hash: &TxHash) -> (Option<String>, Option<String>) {
        (
            Some(tx_hash.short_label()),
            Some(tx_hash.explorer_url(&self.config.explorer_tx_base_url)),
        )
    }

    fn status_full_success(&self, kind: LedgerMutationKind, tx_hash: &TxHash) -> OperatorStatus {
        let (tx_label, explorer_url) = self.tx_links(tx_hash);
        let (title, reason_code) = match kind {
            LedgerMutationKind::Enroll => (
                "Beneficiary added successfully",
                reason_codes::WC_FULL_SUCCESS,
            ),
            LedgerMutationKind::Remove => (
                "Beneficiary removed successfully",
                reason_codes::WC_REMOVE_CONFIRMED,
            ),
        };
        OperatorStatus {
            severity: StatusSeverity::Success,
            title: title.to_string(),
            detail: "Transaction confirmed".to_string(),
            reason_code,
            tx_label,
            explorer_url,
        }
    }

    fn status_ledger_only(&self, tx_hash: &TxHash, cause: &ProfileClientError) -> OperatorStatus {
        let (tx_label, explorer_url) = self.tx_links(tx_hash);
        OperatorStatus {
            severity: StatusSeverity::Warning,
            title: "Beneficiary added to blockchain but failed to save to database".to_string(),
            detail: format!("Please update the information manually ({cause})"),
            reason_code: reason_codes::WC_PROFILE_PERSIST_FAILED,
            tx_label,
            explorer_url,
        }
    }

    fn status_rejected(&self, cause: &MutationError) -> OperatorStatus {
        let (reason_code, tx) = match cause {
            MutationError::SubmissionRejected(_) => (reason_codes::WC_SUBMISSION_REJECTED, None),
            MutationError::Reverted(h) => (reason_codes::WC_MUTATION_REVERTED, Some(h)),
            MutationError::ConfirmationFailed { tx_hash, .. } => {
                (reason_codes::WC_CONFIRMATION_FAILED, Some(tx_hash))
            }
        };
        let (tx_label, explorer_url) = match tx {
            Some(h) => self.tx_links(h),
            None => (None, None),
        };
        OperatorStatus {
            severity: StatusSeverity::Error,
            title: "Transaction failed".to_string(),
            detail: cause.to_string(),
            reason_code,
            tx_label,
            explorer_url,
        }
    }
}
