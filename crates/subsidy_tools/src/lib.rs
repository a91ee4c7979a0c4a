#![forbid(unsafe_code)]

pub mod dashboard_cli;
pub mod seed_cli;
