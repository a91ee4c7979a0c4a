#![forbid(unsafe_code)]

pub mod clients;
pub mod coordinator;
pub mod dashboard;
pub mod editor;
pub mod error;
pub mod reconcile;
pub mod report;
pub mod session;

pub use error::AdminError;
