#![forbid(unsafe_code)]

use subsidy_kernel_contracts::ledger::DailyClaimBatch;
use tracing::debug;

use crate::clients::{LedgerQueryClient, ProfileStoreClient};
use crate::error::AdminError;
use crate::reconcile::{
    ledger_view, reconcile, ReconciledRow, ReconciledView, RowFilter, SortState,
};
use crate::report::{summarize, DashboardSummary};

/// One load of both sources. Recomputed on every refresh, never cached.
#[derive(Debug, Clone)]
pub struct DashboardSnapshot {
    pub view: ReconciledView,
    pub claims: Vec<DailyClaimBatch>,
    pub summary: DashboardSummary,
}

impl DashboardSnapshot {
    pub fn table(&self, sort: Option<SortState>, filter: &RowFilter) -> Vec<&ReconciledRow> {
        ledger_view(&self.view, sort, filter)
    }
}

pub async fn load_dashboard(
    ledger: &dyn LedgerQueryClient,
    profiles: &dyn ProfileStoreClient,
) -> Result<DashboardSnapshot, AdminError> {
    let (records, profile_rows, claims) = tokio::try_join!(
        ledger.beneficiaries(),
        profiles.fetch_all(),
        ledger.daily_claims(),
    )?;
    debug!(
        ledger = records.len(),
        profiles = profile_rows.len(),
        claim_days = claims.len(),
        "dashboard sources loaded"
    );
    let view = reconcile(&records, &profile_rows);
    let summary = summarize(&view, &claims);
    Ok(DashboardSnapshot {
        view,
        claims,
        summary,
    })
}
