#![forbid(unsafe_code)]

use std::time::Duration;

use serde::Deserialize;
use subsidy_kernel_contracts::ContractViolation;

pub const DEFAULT_TIMEOUT_MS: u32 = 10_000;
pub const MIN_TIMEOUT_MS: u32 = 100;
pub const MAX_TIMEOUT_MS: u32 = 60_000;
pub const DEFAULT_USER_AGENT: &str = concat!("subsidy-admin/", env!("CARGO_PKG_VERSION"));

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum EngineError {
    #[error("invalid {service} configuration: {detail}")]
    Config {
        service: &'static str,
        detail: String,
    },
    #[error("{service} transport failure ({kind})")]
    Transport {
        service: &'static str,
        kind: &'static str,
    },
    #[error("{service} returned HTTP {status}{}", message_suffix(.message))]
    Status {
        service: &'static str,
        status: u16,
        message: Option<String>,
    },
    #[error("{service} response could not be decoded: {detail}")]
    Decode {
        service: &'static str,
        detail: String,
    },
    #[error("{service} query failed: {message}")]
    Query {
        service: &'static str,
        message: String,
    },
    #[error(transparent)]
    Contract(#[from] ContractViolation),
}

fn message_suffix(message: &Option<String>) -> String {
    message
        .as_deref()
        .map(|m| format!(": {m}"))
        .unwrap_or_default()
}

impl EngineError {
    pub fn service(&self) -> &'static str {
        match self {
            Self::Config { service, .. }
            | Self::Transport { service, .. }
            | Self::Status { service, .. }
            | Self::Decode { service, .. }
            | Self::Query { service, .. } => service,
            Self::Contract(_) => "contract",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpClientConfig {
    pub timeout_ms: u32,
    pub user_agent: String,
}

impl HttpClientConfig {
    pub fn mvp_v1() -> Self {
        Self {
            timeout_ms: DEFAULT_TIMEOUT_MS,
            user_agent: DEFAULT_USER_AGENT.to_string(),
        }
    }
}

impl Default for HttpClientConfig {
    fn default() -> Self {
        Self::mvp_v1()
    }
}

pub(crate) fn build_http_agent(
    service: &'static str,
    config: &HttpClientConfig,
) -> Result<ureq::Agent, EngineError> {
    if config.timeout_ms == 0 {
        return Err(EngineError::Config {
            service,
            detail: "timeout must be > 0".to_string(),
        });
    }
    let timeout = Duration::from_millis(u64::from(
        config.timeout_ms.clamp(MIN_TIMEOUT_MS, MAX_TIMEOUT_MS),
    ));
    Ok(ureq::AgentBuilder::new()
        .timeout_connect(timeout)
        .timeout_read(timeout)
        .timeout_write(timeout)
        .user_agent(&config.user_agent)
        .try_proxy_from_env(false)
        .build())
}

pub(crate) fn validate_base_url(service: &'static str, raw: &str) -> Result<String, EngineError> {
    let trimmed = raw.trim().trim_end_matches('/');
    if !(trimmed.starts_with("http://") || trimmed.starts_with("https://")) {
        return Err(EngineError::Config {
            service,
            detail: format!("url must start with http:// or https://, got {trimmed:?}"),
        });
    }
    Ok(trimmed.to_string())
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    error: Option<String>,
}

pub(crate) fn engine_error_from_ureq(service: &'static str, err: ureq::Error) -> EngineError {
    match err {
        ureq::Error::Status(status, response) => {
            let message = response
                .into_string()
                .ok()
                .and_then(|body| serde_json::from_str::<ErrorBody>(&body).ok())
                .and_then(|b| b.error);
            EngineError::Status {
                service,
                status,
                message,
            }
        }
        ureq::Error::Transport(transport) => {
            let combined = format!("{:?} {}", transport.kind(), transport);
            EngineError::Transport {
                service,
                kind: classify_transport_error_kind(&combined),
            }
        }
    }
}

pub(crate) fn decode_json<T: serde::de::DeserializeOwned>(
    service: &'static str,
    response: ureq::Response,
) -> Result<T, EngineError> {
    response.into_json::<T>().map_err(|e| EngineError::Decode {
        service,
        detail: e.to_string(),
    })
}

fn classify_transport_error_kind(raw: &str) -> &'static str {
    let lower = raw.to_ascii_lowercase();
    if lower.contains("timeout") || lower.contains("timed out") {
        "timeout"
    } else if lower.contains("tls") || lower.contains("ssl") {
        "tls"
    } else if lower.contains("dns") {
        "dns"
    } else if lower.contains("connection") || lower.contains("connect") {
        "connection"
    } else {
        "transport"
    }
}
