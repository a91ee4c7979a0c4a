#![forbid(unsafe_code)]

use subsidy_kernel_contracts::address::BeneficiaryAddress;
use subsidy_kernel_contracts::profile::{ProfileDraft, ProfilePatch};
use subsidy_kernel_contracts::{ContractViolation, UnixTimeSec};
use subsidy_storage::profile_store::{ProfileStore, ProfileUpsertOutcome, StorageError};
use subsidy_storage::repo::ProfileTablesRepo;

fn addr(n: u8) -> BeneficiaryAddress {
    BeneficiaryAddress::parse(&format!("0x{}", format!("{n:02x}").repeat(20))).unwrap()
}

fn draft(n: u8, name: &str) -> ProfileDraft {
    ProfileDraft::v1(addr(n), name, Some("3001234567"), None).unwrap()
}

#[test]
fn at_profile_db_01_insert_then_duplicate_is_rejected() {
    let mut s = ProfileStore::new_in_memory();
    let created = s.insert_profile_row(draft(1, "Ana"), UnixTimeSec(10)).unwrap();
    assert_eq!(created.created_at, UnixTimeSec(10));
    assert_eq!(created.updated_at, UnixTimeSec(10));

    let dup = s.insert_profile_row(draft(1, "Ana again"), UnixTimeSec(11));
    assert!(matches!(
        dup,
        Err(StorageError::DuplicateKey {
            table: "beneficiary_profiles",
            ..
        })
    ));
    assert_eq!(s.profile_row(&addr(1)).unwrap().name, "Ana");
}

#[test]
fn at_profile_db_02_update_and_delete_miss_report_not_found() {
    let mut s = ProfileStore::new_in_memory();
    let patch = ProfilePatch::v1(Some("Bea"), None, None).unwrap();
    assert!(matches!(
        s.update_profile_row(&addr(2), &patch, UnixTimeSec(5)),
        Err(StorageError::NotFound { .. })
    ));
    assert!(matches!(
        s.delete_profile_row(&addr(2)),
        Err(StorageError::NotFound { .. })
    ));
}

#[test]
fn at_profile_db_03_update_is_in_place_and_keeps_created_at() {
    let mut s = ProfileStore::new_in_memory();
    s.insert_profile_row(draft(3, "Carla"), UnixTimeSec(100))
        .unwrap();
    let patch = ProfilePatch::v1(None, Some(None), Some(Some("Don Jose"))).unwrap();
    let updated = s
        .update_profile_row(&addr(3), &patch, UnixTimeSec(200))
        .unwrap();
    assert_eq!(updated.name, "Carla");
    assert_eq!(updated.phone_number, None);
    assert_eq!(updated.responsable.as_deref(), Some("Don Jose"));
    assert_eq!(updated.created_at, UnixTimeSec(100));
    assert_eq!(updated.updated_at, UnixTimeSec(200));
    assert_eq!(s.profile_rows().len(), 1);
}

#[test]
fn at_profile_db_04_invalid_draft_is_a_contract_violation() {
    let mut s = ProfileStore::new_in_memory();
    let mut bad = draft(4, "Dora");
    bad.name = "  ".to_string();
    assert!(matches!(
        s.insert_profile_row(bad, UnixTimeSec(1)),
        Err(StorageError::ContractViolation(
            ContractViolation::InvalidValue { .. }
        ))
    ));
    assert!(s.profile_rows().is_empty());
}

#[test]
fn at_profile_db_05_upsert_inserts_then_overwrites() {
    let mut s = ProfileStore::new_in_memory();
    let (_, first) = s.upsert_profile_row(draft(5, "Eva"), UnixTimeSec(1)).unwrap();
    assert_eq!(first, ProfileUpsertOutcome::Inserted);

    let replacement = ProfileDraft::v1(addr(5), "Eva Maria", None, Some("Luz")).unwrap();
    let (row, second) = s.upsert_profile_row(replacement, UnixTimeSec(2)).unwrap();
    assert_eq!(second, ProfileUpsertOutcome::Updated);
    assert_eq!(row.name, "Eva Maria");
    assert_eq!(row.phone_number, None);
    assert_eq!(row.responsable.as_deref(), Some("Luz"));
}

#[test]
fn at_profile_db_06_listing_is_newest_first_and_batch_skips_misses() {
    let mut s = ProfileStore::new_in_memory();
    s.insert_profile_row(draft(6, "Old"), UnixTimeSec(1)).unwrap();
    s.insert_profile_row(draft(7, "New"), UnixTimeSec(9)).unwrap();
    s.insert_profile_row(draft(8, "Mid"), UnixTimeSec(5)).unwrap();

    let names: Vec<&str> = s
        .profile_rows_newest_first()
        .into_iter()
        .map(|r| r.name.as_str())
        .collect();
    assert_eq!(names, vec!["New", "Mid", "Old"]);

    let batch = s.profile_rows_for_addresses(&[addr(8), addr(99), addr(8), addr(6)]);
    let names: Vec<&str> = batch.into_iter().map(|r| r.name.as_str()).collect();
    assert_eq!(names, vec!["Mid", "Old"]);
}

#[test]
fn at_profile_db_07_deleted_row_can_be_recreated() {
    let mut s = ProfileStore::new_in_memory();
    s.insert_profile_row(draft(9, "Ines"), UnixTimeSec(1)).unwrap();
    let removed = s.delete_profile_row(&addr(9)).unwrap();
    assert_eq!(removed.name, "Ines");
    assert!(s.profile_row(&addr(9)).is_none());
    s.insert_profile_row(draft(9, "Ines"), UnixTimeSec(2)).unwrap();
    assert_eq!(s.profile_row(&addr(9)).unwrap().created_at, UnixTimeSec(2));
}
