//! Hostkit HTTP - outbound HTTP client for automation scripts
//!
//! Scripts driven by a host orchestration process use this crate to talk to
//! remote services. Requests honor the standard proxy environment variables,
//! follow redirects without silently downgrading to plain HTTP, retry
//! idempotent calls on gateway errors and decode JSON into typed results.
//!
//! # Example
//!
//! ```no_run
//! use hostkit_http::{HttpClient, HttpClientConfig, Result};
//! use serde::Deserialize;
//!
//! #[derive(Deserialize)]
//! struct Release {
//!     tag_name: String,
//! }
//!
//! async fn latest() -> Result<Option<String>> {
//!     let client = HttpClient::new(
//!         Some("release-checker".to_string()),
//!         Vec::new(),
//!         HttpClientConfig::new().with_retries(2),
//!     )?;
//!     let res = client
//!         .get_json::<Release>("https://api.github.com/repos/rust-lang/rust/releases/latest", None)
//!         .await?;
//!     Ok(res.result.map(|release| release.tag_name))
//! }
//! ```

pub mod error;
pub mod http;

pub use error::{Error, Result};
pub use http::{
    check_bypass, get_proxy_url, is_https, Agent, AgentKind, AuthHandler, BasicCredentialHandler,
    BearerCredentialHandler, ClientResponse, HttpClient, HttpClientConfig, HttpClientError,
    Method, PersonalAccessTokenCredentialHandler, ProxySettings, RequestData, StatusCode,
    TypedResponse,
};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
