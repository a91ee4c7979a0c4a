#![forbid(unsafe_code)]

use serde::{Deserialize, Deserializer, Serialize};

use crate::address::BeneficiaryAddress;
use crate::{ContractViolation, UnixTimeSec, Validate};

pub const PROFILE_NAME_MAX_LEN: usize = 128;
pub const PROFILE_PHONE_MAX_LEN: usize = 32;
pub const PROFILE_RESPONSABLE_MAX_LEN: usize = 128;

/// Payload for a first profile write. Also the shape held as the pending write while a
/// ledger enrollment is in flight.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProfileDraft {
    pub address: BeneficiaryAddress,
    pub name: String,
    pub phone_number: Option<String>,
    pub responsable: Option<String>,
}

impl ProfileDraft {
    /// Trims every field; blank optional fields become `None`.
    pub fn v1(
        address: BeneficiaryAddress,
        name: &str,
        phone_number: Option<&str>,
        responsable: Option<&str>,
    ) -> Result<Self, ContractViolation> {
        let d = Self {
            address,
            name: name.trim().to_string(),
            phone_number: normalize_optional(phone_number),
            responsable: normalize_optional(responsable),
        };
        d.validate()?;
        Ok(d)
    }

    /// Patch that overwrites every field with this draft's values.
    pub fn as_full_patch(&self) -> ProfilePatch {
        ProfilePatch {
            name: Some(self.name.clone()),
            phone_number: Some(self.phone_number.clone()),
            responsable: Some(self.responsable.clone()),
        }
    }
}

impl Validate for ProfileDraft {
    fn validate(&self) -> Result<(), ContractViolation> {
        validate_name("profile_draft.name", &self.name)?;
        validate_optional(
            "profile_draft.phone_number",
            self.phone_number.as_deref(),
            PROFILE_PHONE_MAX_LEN,
        )?;
        validate_optional(
            "profile_draft.responsable",
            self.responsable.as_deref(),
            PROFILE_RESPONSABLE_MAX_LEN,
        )?;
        Ok(())
    }
}

/// In-place update. `name` changes only when given and non-blank; for the optional
/// contact fields `None` keeps the stored value and `Some(None)` clears it.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProfilePatch {
    pub name: Option<String>,
    pub phone_number: Option<Option<String>>,
    pub responsable: Option<Option<String>>,
}

impl ProfilePatch {
    pub fn v1(
        name: Option<&str>,
        phone_number: Option<Option<&str>>,
        responsable: Option<Option<&str>>,
    ) -> Result<Self, ContractViolation> {
        let p = Self {
            name: name
                .map(str::trim)
                .filter(|n| !n.is_empty())
                .map(str::to_string),
            phone_number: phone_number.map(normalize_optional),
            responsable: responsable.map(normalize_optional),
        };
        p.validate()?;
        Ok(p)
    }

    pub fn is_empty(&self) -> bool {
        self.name.is_none() && self.phone_number.is_none() && self.responsable.is_none()
    }
}

/// JSON shape of a `PUT` body. An absent key keeps the stored value, `null` clears it.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProfilePatchBody {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(
        default,
        deserialize_with = "present_or_null",
        skip_serializing_if = "Option::is_none"
    )]
    pub phone_number: Option<Option<String>>,
    #[serde(
        default,
        deserialize_with = "present_or_null",
        skip_serializing_if = "Option::is_none"
    )]
    pub responsable: Option<Option<String>>,
}

impl ProfilePatchBody {
    pub fn into_patch(self) -> Result<ProfilePatch, ContractViolation> {
        ProfilePatch::v1(
            self.name.as_deref(),
            self.phone_number.as_ref().map(|v| v.as_deref()),
            self.responsable.as_ref().map(|v| v.as_deref()),
        )
    }
}

impl From<&ProfilePatch> for ProfilePatchBody {
    fn from(patch: &ProfilePatch) -> Self {
        Self {
            name: patch.name.clone(),
            phone_number: patch.phone_number.clone(),
            responsable: patch.responsable.clone(),
        }
    }
}

/// Serde helper for `Option<Option<String>>` fields: a present key (value or `null`)
/// becomes `Some`; pair with `#[serde(default)]` so a missing key stays `None`.
pub fn present_or_null<'de, D>(deserializer: D) -> Result<Option<Option<String>>, D::Error>
where
    D: Deserializer<'de>,
{
    Option::<String>::deserialize(deserializer).map(Some)
}

impl Validate for ProfilePatch {
    fn validate(&self) -> Result<(), ContractViolation> {
        if let Some(name) = &self.name {
            validate_name("profile_patch.name", name)?;
        }
        if let Some(phone) = &self.phone_number {
            validate_optional(
                "profile_patch.phone_number",
                phone.as_deref(),
                PROFILE_PHONE_MAX_LEN,
            )?;
        }
        if let Some(responsable) = &self.responsable {
            validate_optional(
                "profile_patch.responsable",
                responsable.as_deref(),
                PROFILE_RESPONSABLE_MAX_LEN,
            )?;
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProfileRecord {
    pub address: BeneficiaryAddress,
    pub name: String,
    pub phone_number: Option<String>,
    pub responsable: Option<String>,
    pub created_at: UnixTimeSec,
    pub updated_at: UnixTimeSec,
}

impl ProfileRecord {
    pub fn from_draft_v1(draft: ProfileDraft, now: UnixTimeSec) -> Result<Self, ContractViolation> {
        draft.validate()?;
        let r = Self {
            address: draft.address,
            name: draft.name,
            phone_number: draft.phone_number,
            responsable: draft.responsable,
            created_at: now,
            updated_at: now,
        };
        r.validate()?;
        Ok(r)
    }

    pub fn apply_patch(
        &mut self,
        patch: &ProfilePatch,
        now: UnixTimeSec,
    ) -> Result<(), ContractViolation> {
        patch.validate()?;
        if let Some(name) = &patch.name {
            self.name = name.clone();
        }
        if let Some(phone) = &patch.phone_number {
            self.phone_number = phone.clone();
        }
        if let Some(responsable) = &patch.responsable {
            self.responsable = responsable.clone();
        }
        self.updated_at = now.max(self.created_at);
        Ok(())
    }
}

impl Validate for ProfileRecord {
    fn validate(&self) -> Result<(), ContractViolation> {
        validate_name("profile_record.name", &self.name)?;
        validate_optional(
            "profile_record.phone_number",
            self.phone_number.as_deref(),
            PROFILE_PHONE_MAX_LEN,
        )?;
        validate_optional(
            "profile_record.responsable",
            self.responsable.as_deref(),
            PROFILE_RESPONSABLE_MAX_LEN,
        )?;
        if self.updated_at < self.created_at {
            return Err(ContractViolation::InvalidValue {
                field: "profile_record.updated_at",
                reason: "must be >= created_at",
            });
        }
        Ok(())
    }
}

fn normalize_optional(value: Option<&str>) -> Option<String> {
    value
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
}

fn validate_name(field: &'static str, name: &str) -> Result<(), ContractViolation> {
    if name.trim().is_empty() {
        return Err(ContractViolation::InvalidValue {
            field,
            reason: "must not be empty",
        });
    }
    if name.chars().count() > PROFILE_NAME_MAX_LEN {
        return Err(ContractViolation::InvalidValue {
            field,
            reason: "must be <= 128 chars",
        });
    }
    Ok(())
}

fn validate_optional(
    field: &'static str,
    value: Option<&str>,
    max_len: usize,
) -> Result<(), ContractViolation> {
    let Some(v) = value else {
        return Ok(());
    };
    if v.trim().is_empty() {
        return Err(ContractViolation::InvalidValue {
            field,
            reason: "must not be blank when provided",
        });
    }
    if v.chars().count() > max_len {
        return Err(ContractViolation::InvalidValue {
            field,
            reason: "exceeds maximum length",
        });
    }
    Ok(())
}
