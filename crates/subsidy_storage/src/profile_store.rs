#![forbid(unsafe_code)]

use std::collections::{BTreeMap, BTreeSet};

use subsidy_kernel_contracts::address::BeneficiaryAddress;
use subsidy_kernel_contracts::profile::{ProfileDraft, ProfilePatch, ProfileRecord};
use subsidy_kernel_contracts::{ContractViolation, UnixTimeSec, Validate};

const PROFILES_TABLE: &str = "beneficiary_profiles";

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum StorageError {
    #[error("duplicate key in {table}: {key}")]
    DuplicateKey { table: &'static str, key: String },
    #[error("no row in {table} for key {key}")]
    NotFound { table: &'static str, key: String },
    #[error(transparent)]
    ContractViolation(#[from] ContractViolation),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ProfileUpsertOutcome {
    Inserted,
    Updated,
}

/// Off-chain beneficiary profile table. `address` is the sole uniqueness constraint.
#[derive(Debug, Clone, Default)]
pub struct ProfileStore {
    profiles: BTreeMap<BeneficiaryAddress, ProfileRecord>,
}

impl ProfileStore {
    pub fn new_in_memory() -> Self {
        Self {
            profiles: BTreeMap::new(),
        }
    }

    pub fn insert_profile(
        &mut self,
        draft: ProfileDraft,
        now: UnixTimeSec,
    ) -> Result<ProfileRecord, StorageError> {
        draft.validate()?;
        if self.profiles.contains_key(&draft.address) {
            return Err(StorageError::DuplicateKey {
                table: PROFILES_TABLE,
                key: draft.address.to_string(),
            });
        }
        let record = ProfileRecord::from_draft_v1(draft, now)?;
        self.profiles.insert(record.address.clone(), record.clone());
        Ok(record)
    }

    pub fn update_profile(
        &mut self,
        address: &BeneficiaryAddress,
        patch: &ProfilePatch,
        now: UnixTimeSec,
    ) -> Result<ProfileRecord, StorageError> {
        patch.validate()?;
        let Some(current) = self.profiles.get_mut(address) else {
            return Err(StorageError::NotFound {
                table: PROFILES_TABLE,
                key: address.to_string(),
            });
        };
        // Apply to a copy so a rejected patch leaves the stored row untouched.
        let mut next = current.clone();
        next.apply_patch(patch, now)?;
        next.validate()?;
        *current = next.clone();
        Ok(next)
    }

    pub fn delete_profile(
        &mut self,
        address: &BeneficiaryAddress,
    ) -> Result<ProfileRecord, StorageError> {
        self.profiles
            .remove(address)
            .ok_or_else(|| StorageError::NotFound {
                table: PROFILES_TABLE,
                key: address.to_string(),
            })
    }

    /// Seed path: create when absent, otherwise overwrite every field from the draft.
    pub fn upsert_profile(
        &mut self,
        draft: ProfileDraft,
        now: UnixTimeSec,
    ) -> Result<(ProfileRecord, ProfileUpsertOutcome), StorageError> {
        if self.profiles.contains_key(&draft.address) {
            let patch = draft.as_full_patch();
            let record = self.update_profile(&draft.address, &patch, now)?;
            return Ok((record, ProfileUpsertOutcome::Updated));
        }
        let record = self.insert_profile(draft, now)?;
        Ok((record, ProfileUpsertOutcome::Inserted))
    }

    /// Replay path: places a previously persisted row as-is.
    pub fn restore_profile(&mut self, record: ProfileRecord) -> Result<(), StorageError> {
        record.validate()?;
        self.profiles.insert(record.address.clone(), record);
        Ok(())
    }

    pub fn get_profile(&self, address: &BeneficiaryAddress) -> Option<&ProfileRecord> {
        self.profiles.get(address)
    }

    pub fn profile_rows(&self) -> &BTreeMap<BeneficiaryAddress, ProfileRecord> {
        &self.profiles
    }

    /// Newest first by `created_at`; same-second rows fall back to address order.
    pub fn profiles_newest_first(&self) -> Vec<&ProfileRecord> {
        let mut rows: Vec<&ProfileRecord> = self.profiles.values().collect();
        rows.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        rows
    }

    pub fn profiles_for_addresses(&self, addresses: &[BeneficiaryAddress]) -> Vec<&ProfileRecord> {
        let mut seen = BTreeSet::new();
        addresses
            .iter()
            .filter(|a| seen.insert(*a))
            .filter_map(|a| self.profiles.get(a))
            .collect()
    }
}
