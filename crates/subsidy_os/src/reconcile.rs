#![forbid(unsafe_code)]

use std::cmp::Ordering;
use std::collections::btree_map::Entry;
use std::collections::BTreeMap;

use rust_decimal::Decimal;
use serde::Serialize;
use subsidy_kernel_contracts::address::BeneficiaryAddress;
use subsidy_kernel_contracts::amount::TokenAmount;
use subsidy_kernel_contracts::ledger::LedgerRecord;
use subsidy_kernel_contracts::profile::ProfileRecord;
use subsidy_kernel_contracts::{ContractViolation, UnixTimeSec};

pub const PLACEHOLDER: &str = "-";

/// One address after the join. At least one side is always present.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ReconciledRow {
    pub address: BeneficiaryAddress,
    pub ledger: Option<LedgerRecord>,
    pub profile: Option<ProfileRecord>,
}

impl ReconciledRow {
    pub fn display_name(&self) -> &str {
        self.profile
            .as_ref()
            .map(|p| p.name.as_str())
            .unwrap_or(PLACEHOLDER)
    }

    pub fn display_phone(&self) -> &str {
        self.profile
            .as_ref()
            .and_then(|p| p.phone_number.as_deref())
            .unwrap_or(PLACEHOLDER)
    }

    pub fn display_responsable(&self) -> &str {
        self.profile
            .as_ref()
            .and_then(|p| p.responsable.as_deref())
            .unwrap_or(PLACEHOLDER)
    }

    /// Profile name, else the shortened address.
    pub fn label(&self) -> String {
        match &self.profile {
            Some(p) => p.name.clone(),
            None => self.address.short_label(),
        }
    }

    pub fn is_active(&self) -> bool {
        self.ledger.as_ref().is_some_and(|l| l.is_active)
    }
}

/// Result of one merge. Rows are in canonical address order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReconciledView {
    rows: Vec<ReconciledRow>,
    index: BTreeMap<BeneficiaryAddress, usize>,
}

impl ReconciledView {
    pub fn rows(&self) -> &[ReconciledRow] {
        &self.rows
    }

    /// Rows backed by a ledger record; profile-only rows are left out.
    pub fn ledger_rows(&self) -> Vec<&ReconciledRow> {
        self.rows.iter().filter(|r| r.ledger.is_some()).collect()
    }

    /// Direct lookup, including profile-only addresses.
    pub fn lookup(&self, address: &BeneficiaryAddress) -> Option<&ReconciledRow> {
        self.index.get(address).map(|&i| &self.rows[i])
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

/// Full outer join of ledger and profile records by canonical address.
pub fn reconcile(ledger: &[LedgerRecord], profiles: &[ProfileRecord]) -> ReconciledView {
    let mut merged: BTreeMap<BeneficiaryAddress, ReconciledRow> = BTreeMap::new();

    for record in ledger {
        match merged.entry(record.address.clone()) {
            Entry::Vacant(v) => {
                v.insert(ReconciledRow {
                    address: record.address.clone(),
                    ledger: Some(record.clone()),
                    profile: None,
                });
            }
            Entry::Occupied(mut o) => {
                let row = o.get_mut();
                let newer = match &row.ledger {
                    Some(current) => record.recency_key() > current.recency_key(),
                    None => true,
                };
                if newer {
                    row.ledger = Some(record.clone());
                }
            }
        }
    }

    for profile in profiles {
        let row = merged
            .entry(profile.address.clone())
            .or_insert_with(|| ReconciledRow {
                address: profile.address.clone(),
                ledger: None,
                profile: None,
            });
        // The store holds one row per address; on a duplicate keep the later edit.
        let replace = match &row.profile {
            Some(current) => {
                (profile.updated_at, profile.created_at) > (current.updated_at, current.created_at)
            }
            None => true,
        };
        if replace {
            row.profile = Some(profile.clone());
        }
    }

    let rows: Vec<ReconciledRow> = merged.into_values().collect();
    let index = rows
        .iter()
        .enumerate()
        .map(|(i, r)| (r.address.clone(), i))
        .collect();
    ReconciledView { rows, index }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum SortField {
    Address,
    DateAdded,
    DateRemoved,
    IsActive,
    TotalClaimed,
    Name,
    PhoneNumber,
    Responsable,
}

impl SortField {
    pub fn parse(raw: &str) -> Result<Self, ContractViolation> {
        match raw.trim() {
            "address" | "id" => Ok(Self::Address),
            "dateAdded" => Ok(Self::DateAdded),
            "dateRemoved" => Ok(Self::DateRemoved),
            "isActive" => Ok(Self::IsActive),
            "totalClaimed" => Ok(Self::TotalClaimed),
            "name" => Ok(Self::Name),
            "phoneNumber" => Ok(Self::PhoneNumber),
            "responsable" => Ok(Self::Responsable),
            _ => Err(ContractViolation::InvalidValue {
                field: "sort_field",
                reason: "unknown sort field",
            }),
        }
    }

    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Address => "address",
            Self::DateAdded => "dateAdded",
            Self::DateRemoved => "dateRemoved",
            Self::IsActive => "isActive",
            Self::TotalClaimed => "totalClaimed",
            Self::Name => "name",
            Self::PhoneNumber => "phoneNumber",
            Self::Responsable => "responsable",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum SortDirection {
    Ascending,
    Descending,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SortState {
    pub field: SortField,
    pub direction: SortDirection,
}

impl SortState {
    /// Column-header click: a new field starts descending, the same field toggles.
    pub fn select(previous: Option<SortState>, field: SortField) -> SortState {
        let direction = match previous {
            Some(p) if p.field == field => match p.direction {
                SortDirection::Descending => SortDirection::Ascending,
                SortDirection::Ascending => SortDirection::Descending,
            },
            _ => SortDirection::Descending,
        };
        SortState { field, direction }
    }
}

fn cmp_text_ignore_case(a: &str, b: &str) -> Ordering {
    a.chars()
        .flat_map(char::to_lowercase)
        .cmp(b.chars().flat_map(char::to_lowercase))
}

fn profile_text<'a>(row: &'a ReconciledRow, field: SortField) -> &'a str {
    let Some(p) = &row.profile else {
        return "";
    };
    match field {
        SortField::Name => p.name.as_str(),
        SortField::PhoneNumber => p.phone_number.as_deref().unwrap_or(""),
        SortField::Responsable => p.responsable.as_deref().unwrap_or(""),
        _ => "",
    }
}

/// Ascending comparison on one field.
pub fn compare_rows(a: &ReconciledRow, b: &ReconciledRow, field: SortField) -> Ordering {
    match field {
        SortField::Address => a.address.cmp(&b.address),
        SortField::DateAdded => date_added(a).cmp(&date_added(b)),
        SortField::DateRemoved => date_removed(a).cmp(&date_removed(b)),
        SortField::IsActive => a.is_active().cmp(&b.is_active()),
        SortField::TotalClaimed => {
            let zero = TokenAmount::zero();
            let left = a.ledger.as_ref().map_or(&zero, |l| &l.total_claimed);
            let right = b.ledger.as_ref().map_or(&zero, |l| &l.total_claimed);
            left.cmp(right)
        }
        SortField::Name | SortField::PhoneNumber | SortField::Responsable => {
            cmp_text_ignore_case(profile_text(a, field), profile_text(b, field))
        }
    }
}

fn date_added(row: &ReconciledRow) -> UnixTimeSec {
    row.ledger.as_ref().map(|l| l.date_added).unwrap_or_default()
}

fn date_removed(row: &ReconciledRow) -> UnixTimeSec {
    row.ledger
        .as_ref()
        .and_then(|l| l.date_removed)
        .unwrap_or_default()
}

/// Stable: rows with equal keys keep their incoming relative order in both directions.
pub fn sort_rows(rows: &mut [&ReconciledRow], state: SortState) {
    rows.sort_by(|a, b| {
        let ord = compare_rows(a, b, state.field);
        match state.direction {
            SortDirection::Ascending => ord,
            SortDirection::Descending => ord.reverse(),
        }
    });
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum StatusFilter {
    #[default]
    All,
    Active,
    Inactive,
}

impl StatusFilter {
    pub fn parse(raw: &str) -> Result<Self, ContractViolation> {
        match raw.trim() {
            "" | "all" => Ok(Self::All),
            "active" => Ok(Self::Active),
            "inactive" => Ok(Self::Inactive),
            _ => Err(ContractViolation::InvalidValue {
                field: "status_filter",
                reason: "must be all, active or inactive",
            }),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AmountComparison {
    GreaterThan,
    LessThan,
}

/// Strict comparison against a token-denominated amount, e.g. `> 50000`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ClaimedThreshold {
    pub comparison: AmountComparison,
    pub amount: Decimal,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RowFilter {
    pub address_contains: Option<String>,
    pub status: StatusFilter,
    pub added_from: Option<UnixTimeSec>,
    pub added_to: Option<UnixTimeSec>,
    pub claimed: Option<ClaimedThreshold>,
}

impl RowFilter {
    pub fn matches(&self, row: &ReconciledRow) -> bool {
        if let Some(needle) = self.address_contains.as_deref() {
            if !row.address.contains_ignore_case(needle) {
                return false;
            }
        }
        match self.status {
            StatusFilter::All => {}
            StatusFilter::Active if !row.is_active() => return false,
            StatusFilter::Inactive if row.is_active() => return false,
            _ => {}
        }
        let added = date_added(row);
        if self.added_from.is_some_and(|from| added < from) {
            return false;
        }
        if self.added_to.is_some_and(|to| added > to) {
            return false;
        }
        if let Some(threshold) = &self.claimed {
            let Some(ledger) = &row.ledger else {
                return false;
            };
            let ord = ledger.total_claimed.cmp_scaled(&threshold.amount);
            let pass = match threshold.comparison {
                AmountComparison::GreaterThan => ord == Ordering::Greater,
                AmountComparison::LessThan => ord == Ordering::Less,
            };
            if !pass {
                return false;
            }
        }
        true
    }
}

/// Ledger-backed rows, sorted over the full set and then filtered.
pub fn ledger_view<'a>(
    view: &'a ReconciledView,
    sort: Option<SortState>,
    filter: &RowFilter,
) -> Vec<&'a ReconciledRow> {
    let mut rows = view.ledger_rows();
    if let Some(state) = sort {
        sort_rows(&mut rows, state);
    }
    rows.retain(|r| filter.matches(r));
    rows
}

#[cfg(test)]
mod tests {
    use std::str::FromStr;

    use super::*;

    fn addr(n: u8) -> BeneficiaryAddress {
        BeneficiaryAddress::parse(&format!("0x{}", format!("{n:02x}").repeat(20))).unwrap()
    }

    fn ledger(n: u8, added: u64, active: bool, claimed_tokens: u64) -> LedgerRecord {
        LedgerRecord::v1(
            addr(n),
            UnixTimeSec(added),
            if active { None } else { Some(UnixTimeSec(added + 1)) },
            active,
            TokenAmount::from_whole_tokens(claimed_tokens),
        )
        .unwrap()
    }

    fn profile(n: u8, name: &str) -> ProfileRecord {
        ProfileRecord {
            address: addr(n),
            name: name.to_string(),
            phone_number: None,
            responsable: None,
            created_at: UnixTimeSec(1),
            updated_at: UnixTimeSec(1),
        }
    }

    #[test]
    fn at_reconcile_01_full_outer_join_one_row_per_address() {
        let l = vec![ledger(1, 10, true, 1), ledger(2, 20, false, 2)];
        let p = vec![profile(2, "Bea"), profile(3, "Cam")];
        let view = reconcile(&l, &p);

        assert_eq!(view.len(), 3);
        assert_eq!(view.ledger_rows().len(), 2);
        assert_eq!(view.lookup(&addr(1)).unwrap().display_name(), PLACEHOLDER);
        assert_eq!(view.lookup(&addr(2)).unwrap().display_name(), "Bea");
        let orphan = view.lookup(&addr(3)).unwrap();
        assert!(orphan.ledger.is_none());
        assert!(view
            .ledger_rows()
            .iter()
            .all(|r| r.address != addr(3)));
    }

    #[test]
    fn at_reconcile_02_merge_is_idempotent_and_order_independent() {
        let l = vec![
            ledger(3, 30, true, 3),
            ledger(1, 10, true, 1),
            ledger(2, 20, false, 2),
        ];
        let p = vec![profile(2, "Bea"), profile(1, "Ana")];
        let first = reconcile(&l, &p);

        let mut l_rev = l.clone();
        l_rev.reverse();
        let mut p_rev = p.clone();
        p_rev.reverse();
        let second = reconcile(&l_rev, &p_rev);

        assert_eq!(first, second);
        assert_eq!(first, reconcile(&l, &p));
    }

    #[test]
    fn at_reconcile_03_duplicate_ledger_entries_collapse_to_most_recent() {
        let old = ledger(1, 10, false, 5);
        let newer = ledger(1, 50, true, 7);
        let a = reconcile(&[old.clone(), newer.clone()], &[]);
        let b = reconcile(&[newer.clone(), old], &[]);
        assert_eq!(a.len(), 1);
        assert_eq!(a.rows()[0].ledger.as_ref(), Some(&newer));
        assert_eq!(a, b);
    }

    #[test]
    fn at_reconcile_04_row_count_equals_distinct_ledger_addresses() {
        let l = vec![
            ledger(1, 10, true, 1),
            ledger(2, 10, true, 1),
            ledger(1, 11, true, 1),
            ledger(4, 10, true, 1),
        ];
        let view = reconcile(&l, &[]);
        assert_eq!(view.ledger_rows().len(), 3);
    }

    #[test]
    fn at_reconcile_05_new_field_starts_descending_then_toggles() {
        let s1 = SortState::select(None, SortField::TotalClaimed);
        assert_eq!(s1.direction, SortDirection::Descending);
        let s2 = SortState::select(Some(s1), SortField::TotalClaimed);
        assert_eq!(s2.direction, SortDirection::Ascending);
        let s3 = SortState::select(Some(s2), SortField::TotalClaimed);
        assert_eq!(s3.direction, SortDirection::Descending);
        let s4 = SortState::select(Some(s3), SortField::Name);
        assert_eq!(s4.direction, SortDirection::Descending);
        assert_eq!(s4.field, SortField::Name);
    }

    #[test]
    fn at_reconcile_06_desc_is_reverse_of_asc_with_stable_ties() {
        let l = vec![
            ledger(1, 10, true, 5),
            ledger(2, 10, true, 9),
            ledger(3, 10, true, 5),
            ledger(4, 10, true, 1),
        ];
        let view = reconcile(&l, &[]);
        let desc = ledger_view(
            &view,
            Some(SortState {
                field: SortField::TotalClaimed,
                direction: SortDirection::Descending,
            }),
            &RowFilter::default(),
        );
        let asc = ledger_view(
            &view,
            Some(SortState {
                field: SortField::TotalClaimed,
                direction: SortDirection::Ascending,
            }),
            &RowFilter::default(),
        );
        let d: Vec<_> = desc.iter().map(|r| r.address.clone()).collect();
        let a: Vec<_> = asc.iter().map(|r| r.address.clone()).collect();
        assert_eq!(d, vec![addr(2), addr(1), addr(3), addr(4)]);
        assert_eq!(a, vec![addr(4), addr(1), addr(3), addr(2)]);
    }

    #[test]
    fn at_reconcile_07_text_sort_is_case_insensitive_and_missing_is_empty() {
        let l = vec![
            ledger(1, 10, true, 1),
            ledger(2, 10, true, 1),
            ledger(3, 10, true, 1),
        ];
        let p = vec![profile(1, "beto"), profile(2, "Ana")];
        let view = reconcile(&l, &p);
        let rows = ledger_view(
            &view,
            Some(SortState {
                field: SortField::Name,
                direction: SortDirection::Ascending,
            }),
            &RowFilter::default(),
        );
        let names: Vec<&str> = rows.iter().map(|r| r.display_name()).collect();
        assert_eq!(names, vec![PLACEHOLDER, "Ana", "beto"]);
    }

    #[test]
    fn at_reconcile_08_claimed_sort_uses_exact_integer_order() {
        let mut big = ledger(1, 10, true, 0);
        big.total_claimed =
            TokenAmount::from_base_units(&format!("1{}", "0".repeat(40))).unwrap();
        let mut small = ledger(2, 10, true, 0);
        small.total_claimed = TokenAmount::from_base_units(&"9".repeat(39)).unwrap();
        let view = reconcile(&[small, big], &[]);
        let rows = ledger_view(
            &view,
            Some(SortState::select(None, SortField::TotalClaimed)),
            &RowFilter::default(),
        );
        assert_eq!(rows[0].address, addr(1));
    }

    #[test]
    fn at_reconcile_09_active_and_over_threshold_filter() {
        let l = vec![
            ledger(1, 10, true, 60_000),
            ledger(2, 10, false, 70_000),
            ledger(3, 10, true, 50_000),
            ledger(4, 10, true, 10),
        ];
        let view = reconcile(&l, &[]);
        let filter = RowFilter {
            status: StatusFilter::Active,
            claimed: Some(ClaimedThreshold {
                comparison: AmountComparison::GreaterThan,
                amount: Decimal::from_str("50000").unwrap(),
            }),
            ..RowFilter::default()
        };
        let rows = ledger_view(&view, None, &filter);
        let addrs: Vec<_> = rows.iter().map(|r| r.address.clone()).collect();
        assert_eq!(addrs, vec![addr(1)]);
    }

    #[test]
    fn at_reconcile_10_address_and_date_range_filters() {
        let l = vec![
            ledger(0xab, 100, true, 1),
            ledger(0xcd, 200, true, 1),
            ledger(0xef, 300, true, 1),
        ];
        let view = reconcile(&l, &[]);

        let by_addr = RowFilter {
            address_contains: Some("CDCD".to_string()),
            ..RowFilter::default()
        };
        assert_eq!(ledger_view(&view, None, &by_addr).len(), 1);

        let by_date = RowFilter {
            added_from: Some(UnixTimeSec(100)),
            added_to: Some(UnixTimeSec(200)),
            ..RowFilter::default()
        };
        assert_eq!(ledger_view(&view, None, &by_date).len(), 2);

        let inactive = RowFilter {
            status: StatusFilter::Inactive,
            ..RowFilter::default()
        };
        assert!(ledger_view(&view, None, &inactive).is_empty());
    }

    #[test]
    fn at_reconcile_11_sort_field_names_round_trip() {
        for f in [
            SortField::Address,
            SortField::DateAdded,
            SortField::DateRemoved,
            SortField::IsActive,
            SortField::TotalClaimed,
            SortField::Name,
            SortField::PhoneNumber,
            SortField::Responsable,
        ] {
            assert_eq!(SortField::parse(f.as_str()).unwrap(), f);
        }
        assert!(SortField::parse("balance").is_err());
    }
}
