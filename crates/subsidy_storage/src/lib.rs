#![forbid(unsafe_code)]

pub mod profile_store;
pub mod repo;
