//! Outbound HTTP client for automation scripts
//!
//! This module provides:
//! - Proxy resolution from the conventional environment variables
//! - Connection agents (direct, tunneled, dispatcher) with a keep-alive cache
//! - Credential handlers (Basic, Bearer, personal access token)
//! - A request pipeline with redirect following and retry backoff
//! - Typed JSON calls

pub mod agent;
pub mod auth;
pub mod client;
pub mod config;
pub mod error;
pub mod json;
pub mod proxy;
pub mod request;
pub mod response;
pub mod retry;

pub use agent::{Agent, AgentKind, AgentOptions, ProxyOptions, TunnelKind};
pub use auth::{
    AuthHandler, BasicCredentialHandler, BearerCredentialHandler,
    PersonalAccessTokenCredentialHandler,
};
pub use client::{is_https, HttpClient};
pub use config::HttpClientConfig;
pub use error::HttpClientError;
pub use json::TypedResponse;
pub use proxy::{check_bypass, get_proxy_url, ProxySettings};
pub use request::{RequestData, RequestInfo, RequestOptions, StreamBody};
pub use response::ClientResponse;
pub use retry::{RetryDecision, RetryPolicy};

// Status codes and verbs
pub use reqwest::{Method, StatusCode};

/// Header names set by the JSON layer
pub mod headers {
    pub use reqwest::header::{ACCEPT, CONTENT_TYPE};
}

pub mod media_types {
    pub const APPLICATION_JSON: &str = "application/json";
}
