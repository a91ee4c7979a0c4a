#![forbid(unsafe_code)]

use std::collections::{BTreeMap, BTreeSet};

use rust_decimal::Decimal;
use serde::Serialize;
use subsidy_kernel_contracts::address::BeneficiaryAddress;
use subsidy_kernel_contracts::amount::TokenAmount;
use subsidy_kernel_contracts::ledger::DailyClaimBatch;
use subsidy_kernel_contracts::UnixTimeSec;
use tracing::warn;

use crate::reconcile::{ReconciledRow, ReconciledView};

pub const LEADERBOARD_SIZE: usize = 5;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LeaderboardEntry {
    pub rank: usize,
    pub address: BeneficiaryAddress,
    pub label: String,
    pub total_claimed: TokenAmount,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DashboardSummary {
    pub active_count: usize,
    pub average_claimed: Decimal,
    /// `None` when no address has two distinct claim days with a non-zero mean gap.
    pub most_common_interval_days: Option<u64>,
    pub leaderboard: Vec<LeaderboardEntry>,
}

pub fn active_count(rows: &[&ReconciledRow]) -> usize {
    rows.iter().filter(|r| r.is_active()).count()
}

/// Mean of the token-scaled `totalClaimed`; zero for an empty set.
pub fn average_claimed(rows: &[&ReconciledRow]) -> Decimal {
    let amounts: Vec<&TokenAmount> = rows
        .iter()
        .filter_map(|r| r.ledger.as_ref().map(|l| &l.total_claimed))
        .collect();
    if amounts.is_empty() {
        return Decimal::ZERO;
    }

    let mut sum = Decimal::ZERO;
    for amount in &amounts {
        let value = amount.to_decimal().unwrap_or_else(|| {
            warn!(amount = amount.as_base_units(), "claimed amount exceeds decimal range");
            Decimal::MAX
        });
        sum = match sum.checked_add(value) {
            Some(s) => s,
            None => {
                warn!("claimed total saturated while averaging");
                Decimal::MAX
            }
        };
    }
    (sum / Decimal::from(amounts.len())).normalize()
}

/// Mode of the per-address mean claim gap in whole days.
///
/// Each address needs at least two distinct claim days. Its gap is
/// `(last - first) / (n - 1)` rounded half-up; a zero-day gap is discarded. Equal
/// frequencies go to the shorter interval.
pub fn most_common_claim_interval(claims: &[DailyClaimBatch]) -> Option<u64> {
    let mut dates: BTreeMap<&BeneficiaryAddress, BTreeSet<UnixTimeSec>> = BTreeMap::new();
    for batch in claims {
        for address in &batch.beneficiaries {
            dates.entry(address).or_default().insert(batch.date);
        }
    }

    let mut frequency: BTreeMap<u64, usize> = BTreeMap::new();
    for days in dates.values() {
        let (Some(first), Some(last)) = (days.first(), days.last()) else {
            continue;
        };
        if days.len() < 2 {
            continue;
        }
        let span = u128::from(last.0 - first.0);
        let denom = (days.len() as u128 - 1) * u128::from(UnixTimeSec::SECONDS_PER_DAY);
        let rounded = (2 * span + denom) / (2 * denom);
        if rounded == 0 {
            continue;
        }
        let interval = u64::try_from(rounded).unwrap_or(u64::MAX);
        *frequency.entry(interval).or_default() += 1;
    }

    let mut best: Option<(u64, usize)> = None;
    for (&interval, &count) in &frequency {
        if best.map_or(true, |(_, c)| count > c) {
            best = Some((interval, count));
        }
    }
    best.map(|(interval, _)| interval)
}

/// Top rows by `totalClaimed`; equal amounts keep reconciled order.
pub fn leaderboard(rows: &[&ReconciledRow]) -> Vec<LeaderboardEntry> {
    let mut ranked: Vec<&ReconciledRow> = rows
        .iter()
        .copied()
        .filter(|r| r.ledger.is_some())
        .collect();
    ranked.sort_by(|a, b| {
        let left = a.ledger.as_ref().map(|l| &l.total_claimed);
        let right = b.ledger.as_ref().map(|l| &l.total_claimed);
        right.cmp(&left)
    });
    ranked
        .into_iter()
        .take(LEADERBOARD_SIZE)
        .enumerate()
        .map(|(i, r)| LeaderboardEntry {
            rank: i + 1,
            address: r.address.clone(),
            label: r.label(),
            total_claimed: r
                .ledger
                .as_ref()
                .map(|l| l.total_claimed.clone())
                .unwrap_or_default(),
        })
        .collect()
}

pub fn summarize(view: &ReconciledView, claims: &[DailyClaimBatch]) -> DashboardSummary {
    let rows = view.ledger_rows();
    DashboardSummary {
        active_count: active_count(&rows),
        average_claimed: average_claimed(&rows),
        most_common_interval_days: most_common_claim_interval(claims),
        leaderboard: leaderboard(&rows),
    }
}
