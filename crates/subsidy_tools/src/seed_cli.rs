#![forbid(unsafe_code)]

use std::fs;
use std::path::Path;

use serde::Deserialize;
use subsidy_kernel_contracts::address::BeneficiaryAddress;
use subsidy_kernel_contracts::profile::{present_or_null, ProfileDraft, ProfilePatch};
use subsidy_os::clients::ProfileStoreClient;
use subsidy_os::editor::{upsert_profile, ProfileWriteKind};
use subsidy_os::AdminError;

pub const DEFAULT_SEED_FILE: &str = "beneficiaries.json";

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SeedEntry {
    address: String,
    name: String,
    #[serde(default, deserialize_with = "present_or_null")]
    phone_number: Option<Option<String>>,
    #[serde(default, deserialize_with = "present_or_null")]
    responsable: Option<Option<String>>,
}

/// One seed row. `draft` is used when the address is new; `update` when it exists, and
/// keeps any contact field the entry omitted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SeedProfile {
    pub draft: ProfileDraft,
    pub update: ProfilePatch,
}

/// `BENEFICIARIES_DATA` wins over the file; neither present is an error.
pub fn load_seed_profiles(
    env_data: Option<&str>,
    file: &Path,
) -> Result<Vec<SeedProfile>, String> {
    let raw = match env_data.map(str::trim).filter(|v| !v.is_empty()) {
        Some(data) => data.to_string(),
        None if file.exists() => fs::read_to_string(file)
            .map_err(|e| format!("failed to read seed file '{}': {e}", file.display()))?,
        None => {
            return Err(format!(
                "no beneficiaries data found. set BENEFICIARIES_DATA or create {}",
                file.display()
            ))
        }
    };
    parse_seed_profiles(&raw)
}

pub fn parse_seed_profiles(raw: &str) -> Result<Vec<SeedProfile>, String> {
    let entries: Vec<SeedEntry> =
        serde_json::from_str(raw).map_err(|e| format!("failed to parse beneficiaries data: {e}"))?;
    entries
        .iter()
        .enumerate()
        .map(|(i, e)| {
            let context = |err: &dyn std::fmt::Display| format!("entry {i} ({}): {err}", e.address);
            let address = BeneficiaryAddress::parse(&e.address).map_err(|err| context(&err))?;
            let phone = e.phone_number.as_ref().map(|v| v.as_deref());
            let responsable = e.responsable.as_ref().map(|v| v.as_deref());
            let draft = ProfileDraft::v1(address, &e.name, phone.flatten(), responsable.flatten())
                .map_err(|err| context(&err))?;
            let update = ProfilePatch::v1(Some(e.name.as_str()), phone, responsable)
                .map_err(|err| context(&err))?;
            Ok(SeedProfile { draft, update })
        })
        .collect()
}

/// Upserts each entry in order and returns one report line per entry.
pub async fn seed_profiles(
    client: &dyn ProfileStoreClient,
    seeds: &[SeedProfile],
) -> Result<Vec<String>, AdminError> {
    let mut lines = Vec::with_capacity(seeds.len() + 1);
    for seed in seeds {
        let (record, kind) = upsert_profile(client, &seed.draft, &seed.update).await?;
        let verb = match kind {
            ProfileWriteKind::Created => "created",
            ProfileWriteKind::Updated => "updated",
        };
        lines.push(format!("{verb} {} ({})", record.name, record.address));
    }
    lines.push(format!("seeding completed: {} beneficiaries", seeds.len()));
    Ok(lines)
}
