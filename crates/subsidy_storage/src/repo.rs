#![forbid(unsafe_code)]

use std::collections::BTreeMap;

use subsidy_kernel_contracts::address::BeneficiaryAddress;
use subsidy_kernel_contracts::profile::{ProfileDraft, ProfilePatch, ProfileRecord};
use subsidy_kernel_contracts::UnixTimeSec;

use crate::profile_store::{ProfileStore, ProfileUpsertOutcome, StorageError};

/// Typed repository interface for the `beneficiary_profiles` table.
pub trait ProfileTablesRepo {
    fn insert_profile_row(
        &mut self,
        draft: ProfileDraft,
        now: UnixTimeSec,
    ) -> Result<ProfileRecord, StorageError>;
    fn update_profile_row(
        &mut self,
        address: &BeneficiaryAddress,
        patch: &ProfilePatch,
        now: UnixTimeSec,
    ) -> Result<ProfileRecord, StorageError>;
    fn delete_profile_row(
        &mut self,
        address: &BeneficiaryAddress,
    ) -> Result<ProfileRecord, StorageError>;
    fn upsert_profile_row(
        &mut self,
        draft: ProfileDraft,
        now: UnixTimeSec,
    ) -> Result<(ProfileRecord, ProfileUpsertOutcome), StorageError>;

    fn profile_row(&self, address: &BeneficiaryAddress) -> Option<&ProfileRecord>;
    fn profile_rows(&self) -> &BTreeMap<BeneficiaryAddress, ProfileRecord>;
    fn profile_rows_newest_first(&self) -> Vec<&ProfileRecord>;
    fn profile_rows_for_addresses(&self, addresses: &[BeneficiaryAddress])
        -> Vec<&ProfileRecord>;
}

impl ProfileTablesRepo for ProfileStore {
    fn insert_profile_row(
        &mut self,
        draft: ProfileDraft,
        now: UnixTimeSec,
    ) -> Result<ProfileRecord, StorageError> {
        self.insert_profile(draft, now)
    }

    fn update_profile_row(
        &mut self,
        address: &BeneficiaryAddress,
        patch: &ProfilePatch,
        now: UnixTimeSec,
    ) -> Result<ProfileRecord, StorageError> {
        self.update_profile(address, patch, now)
    }

    fn delete_profile_row(
        &mut self,
        address: &BeneficiaryAddress,
    ) -> Result<ProfileRecord, StorageError> {
        self.delete_profile(address)
    }

    fn upsert_profile_row(
        &mut self,
        draft: ProfileDraft,
        now: UnixTimeSec,
    ) -> Result<(ProfileRecord, ProfileUpsertOutcome), StorageError> {
        self.upsert_profile(draft, now)
    }

    fn profile_row(&self, address: &BeneficiaryAddress) -> Option<&ProfileRecord> {
        self.get_profile(address)
    }

    fn profile_rows(&self) -> &BTreeMap<BeneficiaryAddress, ProfileRecord> {
        ProfileStore::profile_rows(self)
    }

    fn profile_rows_newest_first(&self) -> Vec<&ProfileRecord> {
        self.profiles_newest_first()
    }

    fn profile_rows_for_addresses(
        &self,
        addresses: &[BeneficiaryAddress],
    ) -> Vec<&ProfileRecord> {
        self.profiles_for_addresses(addresses)
    }
}
