#![forbid(unsafe_code)]

pub mod http;
pub mod profile_api;
pub mod subgraph;

pub use http::EngineError;
