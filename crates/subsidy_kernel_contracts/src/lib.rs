#![forbid(unsafe_code)]

pub mod address;
pub mod amount;
pub mod common;
pub mod ledger;
pub mod profile;

pub use common::{ContractViolation, ReasonCodeId, SchemaVersion, UnixTimeSec, Validate};
