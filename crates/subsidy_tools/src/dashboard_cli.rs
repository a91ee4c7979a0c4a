#![forbid(unsafe_code)]

use std::fmt::Write as _;
use std::str::FromStr;

use rust_decimal::Decimal;
use subsidy_kernel_contracts::UnixTimeSec;
use subsidy_os::dashboard::DashboardSnapshot;
use subsidy_os::reconcile::{
    AmountComparison, ClaimedThreshold, RowFilter, SortDirection, SortField, SortState,
    StatusFilter,
};

pub const DASHBOARD_USAGE: &str = "usage: subsidy dashboard [--sort <field>[:asc|:desc]] \
     [--search <text>] [--status <all|active|inactive>] [--claimed <gt|lt>:<amount>] \
     [--added-from <unix_secs>] [--added-to <unix_secs>] [--json]";

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DashboardArgs {
    pub sort: Option<SortState>,
    pub filter: RowFilter,
    pub json: bool,
}

pub fn parse_dashboard_args(args: &[String]) -> Result<DashboardArgs, String> {
    let mut out = DashboardArgs::default();
    let mut it = args.iter();
    while let Some(flag) = it.next() {
        if flag == "--json" {
            out.json = true;
            continue;
        }
        let value = it
            .next()
            .ok_or_else(|| format!("missing value for {flag}. {DASHBOARD_USAGE}"))?;
        match flag.as_str() {
            "--sort" => out.sort = Some(parse_sort(value)?),
            "--search" => {
                out.filter.address_contains =
                    Some(value.trim().to_string()).filter(|v| !v.is_empty());
            }
            "--status" => {
                out.filter.status = StatusFilter::parse(value).map_err(|e| e.to_string())?;
            }
            "--claimed" => out.filter.claimed = Some(parse_claimed(value)?),
            "--added-from" => out.filter.added_from = Some(parse_unix_secs(flag, value)?),
            "--added-to" => out.filter.added_to = Some(parse_unix_secs(flag, value)?),
            _ => return Err(format!("unknown flag {flag}. {DASHBOARD_USAGE}")),
        }
    }
    Ok(out)
}

fn parse_sort(raw: &str) -> Result<SortState, String> {
    let (field, direction) = match raw.split_once(':') {
        Some((field, "asc")) => (field, SortDirection::Ascending),
        Some((field, "desc")) => (field, SortDirection::Descending),
        Some((_, other)) => return Err(format!("unknown sort direction '{other}'")),
        None => (raw, SortDirection::Descending),
    };
    let field = SortField::parse(field).map_err(|e| e.to_string())?;
    Ok(SortState { field, direction })
}

fn parse_claimed(raw: &str) -> Result<ClaimedThreshold, String> {
    let (op, amount) = raw
        .split_once(':')
        .ok_or_else(|| format!("claimed filter must look like gt:50000, got '{raw}'"))?;
    let comparison = match op {
        "gt" => AmountComparison::GreaterThan,
        "lt" => AmountComparison::LessThan,
        other => return Err(format!("unknown comparison '{other}', expected gt or lt")),
    };
    let amount = Decimal::from_str(amount.trim())
        .map_err(|e| format!("invalid claimed amount '{amount}': {e}"))?;
    Ok(ClaimedThreshold { comparison, amount })
}

fn parse_unix_secs(flag: &str, raw: &str) -> Result<UnixTimeSec, String> {
    raw.trim()
        .parse::<u64>()
        .map(UnixTimeSec)
        .map_err(|_| format!("{flag} expects unix seconds, got '{raw}'"))
}

pub fn render_dashboard(snapshot: &DashboardSnapshot, args: &DashboardArgs) -> String {
    let summary = &snapshot.summary;
    let mut out = String::new();
    let _ = writeln!(out, "Active beneficiaries: {}", summary.active_count);
    let _ = writeln!(
        out,
        "Average claimed: {}",
        summary.average_claimed.round_dp(2).normalize()
    );
    match summary.most_common_interval_days {
        Some(days) => {
            let _ = writeln!(out, "Most common claim interval: {days} days");
        }
        None => {
            let _ = writeln!(out, "Most common claim interval: undetermined");
        }
    }
    let _ = writeln!(out, "\nTop claimers:");
    for entry in &summary.leaderboard {
        let _ = writeln!(
            out,
            "  {}. {} {}",
            entry.rank,
            entry.label,
            entry.total_claimed.to_token_string()
        );
    }

    let rows = snapshot.table(args.sort, &args.filter);
    let _ = writeln!(out, "\nBeneficiaries ({} shown):", rows.len());
    for row in rows {
        let (added, claimed) = match &row.ledger {
            Some(l) => (l.date_added.0.to_string(), l.total_claimed.to_token_string()),
            None => ("-".to_string(), "-".to_string()),
        };
        let _ = writeln!(
            out,
            "  {}  {:<24} {:<18} {:<20} {:<8} {:>12} {}",
            row.address.short_label(),
            row.display_name(),
            row.display_phone(),
            row.display_responsable(),
            if row.is_active() { "active" } else { "inactive" },
            added,
            claimed
        );
    }
    out
}

#[cfg(test)]
mod tests {
    use subsidy_kernel_contracts::address::BeneficiaryAddress;
    use subsidy_kernel_contracts::amount::TokenAmount;
    use subsidy_kernel_contracts::ledger::LedgerRecord;
    use subsidy_os::reconcile::reconcile;
    use subsidy_os::report::summarize;

    use super::*;

    fn args(raw: &[&str]) -> Vec<String> {
        raw.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn at_dash_cli_01_flags_parse_into_sort_and_filter() {
        let parsed = parse_dashboard_args(&args(&[
            "--sort",
            "totalClaimed:asc",
            "--status",
            "active",
            "--claimed",
            "gt:50000",
            "--search",
            " 0xAB ",
            "--json",
        ]))
        .unwrap();
        assert_eq!(
            parsed.sort,
            Some(SortState {
                field: SortField::TotalClaimed,
                direction: SortDirection::Ascending,
            })
        );
        assert_eq!(parsed.filter.status, StatusFilter::Active);
        assert_eq!(
            parsed.filter.claimed,
            Some(ClaimedThreshold {
                comparison: AmountComparison::GreaterThan,
                amount: Decimal::from(50_000),
            })
        );
        assert_eq!(parsed.filter.address_contains.as_deref(), Some("0xAB"));
        assert!(parsed.json);

        let default_dir = parse_dashboard_args(&args(&["--sort", "name"])).unwrap();
        assert_eq!(
            default_dir.sort.map(|s| s.direction),
            Some(SortDirection::Descending)
        );
    }

    #[test]
    fn at_dash_cli_02_bad_flags_are_reported() {
        assert!(parse_dashboard_args(&args(&["--sort"])).is_err());
        assert!(parse_dashboard_args(&args(&["--sort", "name:up"])).is_err());
        assert!(parse_dashboard_args(&args(&["--claimed", "eq:5"])).is_err());
        assert!(parse_dashboard_args(&args(&["--status", "paused"])).is_err());
        assert!(parse_dashboard_args(&args(&["--verbose", "1"])).is_err());
    }

    #[test]
    fn at_dash_cli_03_render_reports_undetermined_interval() {
        let a = BeneficiaryAddress::parse("0x1111111111111111111111111111111111111111").unwrap();
        let records = vec![LedgerRecord::v1(
            a,
            UnixTimeSec(1_700_000_000),
            None,
            true,
            TokenAmount::from_whole_tokens(12),
        )
        .unwrap()];
        let view = reconcile(&records, &[]);
        let summary = summarize(&view, &[]);
        let snapshot = DashboardSnapshot {
            view,
            claims: vec![],
            summary,
        };
        let text = render_dashboard(&snapshot, &DashboardArgs::default());
        assert!(text.contains("Active beneficiaries: 1"));
        assert!(text.contains("Average claimed: 12"));
        assert!(text.contains("Most common claim interval: undetermined"));
        assert!(text.contains("Beneficiaries (1 shown):"));
        assert!(text.contains("0x11111...11111"));
    }
}
