#![forbid(unsafe_code)]

use std::net::SocketAddr;
use std::path::PathBuf;

use subsidy_engines::http::{HttpClientConfig, MAX_TIMEOUT_MS, MIN_TIMEOUT_MS};
use subsidy_engines::profile_api::{ProfileApiConfig, DEFAULT_PROFILE_API_URL};
use subsidy_engines::subgraph::SubgraphConfig;
use subsidy_os::coordinator::{CoordinatorConfig, CELOSCAN_TX_BASE_URL, CELO_MAINNET_CHAIN_ID};

pub const DEFAULT_HTTP_BIND: &str = "127.0.0.1:3001";
pub const DEFAULT_PROFILE_STORE_PATH: &str = ".subsidy/profiles.jsonl";

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConfigError {
    #[error("{var} is invalid: {detail}")]
    Invalid { var: &'static str, detail: String },
    #[error("{0} must be set")]
    Missing(&'static str),
}

/// Process configuration read from `SUBSIDY_*` environment variables.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AdminConfig {
    pub http_bind: SocketAddr,
    pub profile_store_path: PathBuf,
    pub subgraph_url: Option<String>,
    pub profile_api_url: String,
    pub explorer_tx_base_url: String,
    pub chain_id: u64,
    pub http: HttpClientConfig,
}

impl AdminConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_env_var_map(|key| std::env::var(key).ok())
    }

    pub fn from_env_var_map<F>(mut env_getter: F) -> Result<Self, ConfigError>
    where
        F: FnMut(&str) -> Option<String>,
    {
        let mut var = |key: &str| {
            env_getter(key)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };

        let bind = var("SUBSIDY_HTTP_BIND").unwrap_or_else(|| DEFAULT_HTTP_BIND.to_string());
        let http_bind = bind.parse::<SocketAddr>().map_err(|err| ConfigError::Invalid {
            var: "SUBSIDY_HTTP_BIND",
            detail: format!("{bind:?}: {err}"),
        })?;

        let chain_id = match var("SUBSIDY_CHAIN_ID") {
            Some(raw) => raw.parse::<u64>().map_err(|_| ConfigError::Invalid {
                var: "SUBSIDY_CHAIN_ID",
                detail: format!("{raw:?} is not an unsigned integer"),
            })?,
            None => CELO_MAINNET_CHAIN_ID,
        };

        let timeout_ms = var("SUBSIDY_HTTP_TIMEOUT_MS")
            .and_then(|v| v.parse::<u32>().ok())
            .filter(|v| (MIN_TIMEOUT_MS..=MAX_TIMEOUT_MS).contains(v));

        Ok(Self {
            http_bind,
            profile_store_path: var("SUBSIDY_PROFILE_STORE_PATH")
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from(DEFAULT_PROFILE_STORE_PATH)),
            subgraph_url: var("SUBSIDY_SUBGRAPH_URL"),
            profile_api_url: var("SUBSIDY_PROFILE_API_URL")
                .unwrap_or_else(|| DEFAULT_PROFILE_API_URL.to_string()),
            explorer_tx_base_url: var("SUBSIDY_EXPLORER_TX_BASE_URL")
                .unwrap_or_else(|| CELOSCAN_TX_BASE_URL.to_string()),
            chain_id,
            http: HttpClientConfig {
                timeout_ms: timeout_ms.unwrap_or(HttpClientConfig::mvp_v1().timeout_ms),
                ..HttpClientConfig::mvp_v1()
            },
        })
    }

    pub fn subgraph(&self) -> Result<SubgraphConfig, ConfigError> {
        let endpoint = self
            .subgraph_url
            .clone()
            .ok_or(ConfigError::Missing("SUBSIDY_SUBGRAPH_URL"))?;
        Ok(SubgraphConfig {
            endpoint,
            http: self.http.clone(),
        })
    }

    pub fn profile_api(&self) -> ProfileApiConfig {
        ProfileApiConfig {
            base_url: self.profile_api_url.clone(),
            http: self.http.clone(),
        }
    }

    pub fn coordinator(&self) -> CoordinatorConfig {
        CoordinatorConfig {
            explorer_tx_base_url: self.explorer_tx_base_url.clone(),
            chain_id: self.chain_id,
        }
    }
}
