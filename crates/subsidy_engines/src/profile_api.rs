#![forbid(unsafe_code)]

use serde_json::json;
use subsidy_kernel_contracts::address::BeneficiaryAddress;
use subsidy_kernel_contracts::profile::{
    ProfileDraft, ProfilePatch, ProfilePatchBody, ProfileRecord,
};

use crate::http::{
    build_http_agent, decode_json, engine_error_from_ureq, validate_base_url, EngineError,
    HttpClientConfig,
};

const SERVICE: &str = "profile_api";

pub const DEFAULT_PROFILE_API_URL: &str = "http://localhost:3001";

/// Outcome classes of the profile REST API. 404 and 409 are results, not faults.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ProfileApiError {
    #[error("profile not found")]
    NotFound,
    #[error("profile already exists")]
    Conflict,
    #[error("request rejected: {0}")]
    BadRequest(String),
    #[error(transparent)]
    Engine(#[from] EngineError),
}

impl ProfileApiError {
    fn from_ureq(err: ureq::Error) -> Self {
        match engine_error_from_ureq(SERVICE, err) {
            EngineError::Status { status: 404, .. } => Self::NotFound,
            EngineError::Status { status: 409, .. } => Self::Conflict,
            EngineError::Status {
                status: 400,
                message,
                ..
            } => Self::BadRequest(message.unwrap_or_else(|| "bad request".to_string())),
            other => Self::Engine(other),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProfileApiConfig {
    pub base_url: String,
    pub http: HttpClientConfig,
}

/// Blocking client for the profile REST API served by `subsidy_adapter_http`.
#[derive(Debug, Clone)]
pub struct ProfileApiRuntime {
    base_url: String,
    agent: ureq::Agent,
}

impl ProfileApiRuntime {
    pub fn new(config: &ProfileApiConfig) -> Result<Self, EngineError> {
        Ok(Self {
            base_url: validate_base_url(SERVICE, &config.base_url)?,
            agent: build_http_agent(SERVICE, &config.http)?,
        })
    }

    pub fn list(&self) -> Result<Vec<ProfileRecord>, ProfileApiError> {
        let response = self
            .agent
            .get(&self.collection_url())
            .call()
            .map_err(ProfileApiError::from_ureq)?;
        Ok(decode_json(SERVICE, response)?)
    }

    pub fn get(
        &self,
        address: &BeneficiaryAddress,
    ) -> Result<Option<ProfileRecord>, ProfileApiError> {
        match self.agent.get(&self.item_url(address)).call() {
            Ok(response) => Ok(Some(decode_json(SERVICE, response)?)),
            Err(e) => match ProfileApiError::from_ureq(e) {
                ProfileApiError::NotFound => Ok(None),
                other => Err(other),
            },
        }
    }

    pub fn batch(
        &self,
        addresses: &[BeneficiaryAddress],
    ) -> Result<Vec<ProfileRecord>, ProfileApiError> {
        let addresses: Vec<&str> = addresses.iter().map(BeneficiaryAddress::as_str).collect();
        let response = self
            .agent
            .post(&format!("{}/batch", self.collection_url()))
            .send_json(json!({ "addresses": addresses }))
            .map_err(ProfileApiError::from_ureq)?;
        Ok(decode_json(SERVICE, response)?)
    }

    pub fn create(&self, draft: &ProfileDraft) -> Result<ProfileRecord, ProfileApiError> {
        let response = self
            .agent
            .post(&self.collection_url())
            .send_json(draft)
            .map_err(ProfileApiError::from_ureq)?;
        Ok(decode_json(SERVICE, response)?)
    }

    pub fn update(
        &self,
        address: &BeneficiaryAddress,
        patch: &ProfilePatch,
    ) -> Result<ProfileRecord, ProfileApiError> {
        let response = self
            .agent
            .put(&self.item_url(address))
            .send_json(ProfilePatchBody::from(patch))
            .map_err(ProfileApiError::from_ureq)?;
        Ok(decode_json(SERVICE, response)?)
    }

    pub fn delete(&self, address: &BeneficiaryAddress) -> Result<(), ProfileApiError> {
        self.agent
            .delete(&self.item_url(address))
            .call()
            .map_err(ProfileApiError::from_ureq)?;
        Ok(())
    }

    fn collection_url(&self) -> String {
        format!("{}/api/beneficiaries", self.base_url)
    }

    fn item_url(&self, address: &BeneficiaryAddress) -> String {
        format!("{}/api/beneficiaries/{}", self.base_url, address.as_str())
    }
}
