#![forbid(unsafe_code)]

use std::sync::Arc;

use serde::Serialize;
use subsidy_kernel_contracts::address::BeneficiaryAddress;
use subsidy_kernel_contracts::profile::{ProfileDraft, ProfilePatch, ProfileRecord};
use tracing::info;

use crate::clients::{ProfileClientError, ProfileStoreClient};
use crate::error::AdminError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ProfileWriteKind {
    Created,
    Updated,
}

/// Create-or-update: update when a profile exists, otherwise create. A `Conflict` on
/// create means another writer got there first, so the draft is applied as an update.
pub async fn write_profile(
    client: &dyn ProfileStoreClient,
    draft: &ProfileDraft,
) -> Result<(ProfileRecord, ProfileWriteKind), ProfileClientError> {
    upsert_profile(client, draft, &draft.as_full_patch()).await
}

/// Like `write_profile`, but an existing row receives `patch` instead of the full draft,
/// so fields the patch leaves as `None` keep their stored values.
pub async fn upsert_profile(
    client: &dyn ProfileStoreClient,
    draft: &ProfileDraft,
    patch: &ProfilePatch,
) -> Result<(ProfileRecord, ProfileWriteKind), ProfileClientError> {
    let address = &draft.address;
    if client.fetch_one(address).await?.is_some() {
        let record = client.update(address, patch).await?;
        return Ok((record, ProfileWriteKind::Updated));
    }
    match client.create(draft).await {
        Ok(record) => Ok((record, ProfileWriteKind::Created)),
        Err(ProfileClientError::Conflict(_)) => {
            info!(address = %address, "profile created concurrently; applying as update");
            let record = client.update(address, patch).await?;
            Ok((record, ProfileWriteKind::Updated))
        }
        Err(e) => Err(e),
    }
}

/// Manual profile edits from the dashboard, independent of any ledger mutation. This is
/// the operator's recovery path after a partial failure.
#[derive(Clone)]
pub struct ProfileEditor {
    profiles: Arc<dyn ProfileStoreClient>,
}

impl ProfileEditor {
    pub fn new(profiles: Arc<dyn ProfileStoreClient>) -> Self {
        Self { profiles }
    }

    pub async fn lookup(&self, raw_address: &str) -> Result<Option<ProfileRecord>, AdminError> {
        let address = BeneficiaryAddress::parse(raw_address)?;
        Ok(self.profiles.fetch_one(&address).await?)
    }

    pub async fn save(
        &self,
        raw_address: &str,
        name: &str,
        phone_number: Option<&str>,
        responsable: Option<&str>,
    ) -> Result<(ProfileRecord, ProfileWriteKind), AdminError> {
        let address = BeneficiaryAddress::parse(raw_address)?;
        let draft = ProfileDraft::v1(address, name, phone_number, responsable)?;
        let (record, kind) = write_profile(self.profiles.as_ref(), &draft).await?;
        info!(address = %record.address, ?kind, "profile saved");
        Ok((record, kind))
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use async_trait::async_trait;
    use subsidy_kernel_contracts::UnixTimeSec;
    use subsidy_storage::profile_store::ProfileStore;

    use super::*;
    use crate::clients::{ClientError, StoreBackedProfileClient};

    const ADDR: &str = "0x5aAeb6053F3E94C9b9A09f33669435E7Ef1BeAed";

    fn clock() -> UnixTimeSec {
        UnixTimeSec(1_000)
    }

    fn store_client() -> (Arc<Mutex<ProfileStore>>, Arc<StoreBackedProfileClient>) {
        let store = Arc::new(Mutex::new(ProfileStore::new_in_memory()));
        let client = Arc::new(StoreBackedProfileClient::with_clock(store.clone(), clock));
        (store, client)
    }

    // Reports "absent" on lookup even though the row exists, as a racing creator would.
    struct StaleLookupClient {
        inner: StoreBackedProfileClient,
    }

    #[async_trait]
    impl ProfileStoreClient for StaleLookupClient {
        async fn fetch_all(&self) -> Result<Vec<ProfileRecord>, ClientError> {
            self.inner.fetch_all().await
        }
        async fn fetch_one(
            &self,
            _address: &BeneficiaryAddress,
        ) -> Result<Option<ProfileRecord>, ClientError> {
            Ok(None)
        }
        async fn fetch_batch(
            &self,
            addresses: &[BeneficiaryAddress],
        ) -> Result<Vec<ProfileRecord>, ClientError> {
            self.inner.fetch_batch(addresses).await
        }
        async fn create(&self, draft: &ProfileDraft) -> Result<ProfileRecord, ProfileClientError> {
            self.inner.create(draft).await
        }
        async fn update(
            &self,
            address: &BeneficiaryAddress,
            patch: &ProfilePatch,
        ) -> Result<ProfileRecord, ProfileClientError> {
            self.inner.update(address, patch).await
        }
        async fn delete(&self, address: &BeneficiaryAddress) -> Result<(), ProfileClientError> {
            self.inner.delete(address).await
        }
    }

    #[tokio::test]
    async fn at_editor_01_save_creates_then_updates() {
        let (_, client) = store_client();
        let editor = ProfileEditor::new(client);

        let (first, kind) = editor.save(ADDR, "Lucia", Some("300"), None).await.unwrap();
        assert_eq!(kind, ProfileWriteKind::Created);
        assert_eq!(first.address.as_str(), ADDR.to_ascii_lowercase());

        let (second, kind) = editor
            .save(ADDR, "Lucia P", None, Some("Marta"))
            .await
            .unwrap();
        assert_eq!(kind, ProfileWriteKind::Updated);
        assert_eq!(second.name, "Lucia P");
        assert_eq!(second.phone_number, None);
        assert_eq!(second.responsable.as_deref(), Some("Marta"));
    }

    #[tokio::test]
    async fn at_editor_02_validation_happens_before_io() {
        let (store, client) = store_client();
        let editor = ProfileEditor::new(client);
        assert!(matches!(
            editor.save("0x1234", "Ana", None, None).await,
            Err(AdminError::Validation(_))
        ));
        assert!(matches!(
            editor.save(ADDR, "   ", None, None).await,
            Err(AdminError::Validation(_))
        ));
        assert!(store.lock().unwrap().profile_rows().is_empty());
        assert_eq!(editor.lookup(ADDR).await.unwrap(), None);
    }

    #[tokio::test]
    async fn at_editor_03_conflict_on_create_switches_to_update() {
        let (store, _) = store_client();
        let inner = StoreBackedProfileClient::with_clock(store.clone(), clock);
        let address = BeneficiaryAddress::parse(ADDR).unwrap();
        inner
            .create(&ProfileDraft::v1(address.clone(), "First", None, None).unwrap())
            .await
            .unwrap();

        let racing = StaleLookupClient { inner };
        let draft = ProfileDraft::v1(address.clone(), "Second", None, None).unwrap();
        let (record, kind) = write_profile(&racing, &draft).await.unwrap();
        assert_eq!(kind, ProfileWriteKind::Updated);
        assert_eq!(record.name, "Second");
        assert_eq!(store.lock().unwrap().profile_rows().len(), 1);
    }
}
