//! Client request options
//!
//! One [`HttpClientConfig`] is fixed per client instance.

use std::collections::HashMap;
use std::time::Duration;

use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use serde::{Deserialize, Deserializer, Serialize};

use crate::http::proxy::ProxySettings;
use crate::{Error, Result};

/// Socket timeout used when none is configured
pub const DEFAULT_SOCKET_TIMEOUT: Duration = Duration::from_secs(180);

/// Redirect budget used when none is configured
pub const DEFAULT_MAX_REDIRECTS: u32 = 50;

/// Request options shared by every call of a client
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HttpClientConfig {
    /// Skip certificate verification for TLS targets
    pub ignore_ssl_error: bool,
    /// Time to wait for a response before aborting; `None` means 180 s
    pub socket_timeout: Option<Duration>,
    pub allow_redirects: bool,
    /// Allow an https request to follow a redirect onto plain http
    pub allow_redirect_downgrade: bool,
    #[serde(deserialize_with = "clamped_count")]
    pub max_redirects: u32,
    /// Reuse connection agents across calls
    pub keep_alive: bool,
    pub allow_retries: bool,
    pub max_retries: u32,
    /// Default headers sent with every request; call headers win on conflict
    pub headers: HashMap<String, String>,
    /// Connection pool size override
    pub max_sockets: Option<usize>,
    /// Normalize ISO-8601 strings in JSON responses
    pub deserialize_dates: bool,
    /// Fixed proxy settings; `None` reads the environment per request
    pub proxy: Option<ProxySettings>,
}

impl Default for HttpClientConfig {
    fn default() -> Self {
        Self {
            ignore_ssl_error: false,
            socket_timeout: None,
            allow_redirects: true,
            allow_redirect_downgrade: false,
            max_redirects: DEFAULT_MAX_REDIRECTS,
            keep_alive: false,
            allow_retries: false,
            max_retries: 1,
            headers: HashMap::new(),
            max_sockets: None,
            deserialize_dates: false,
            proxy: None,
        }
    }
}

impl HttpClientConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_ignore_ssl_error(mut self, ignore: bool) -> Self {
        self.ignore_ssl_error = ignore;
        self
    }

    pub fn with_socket_timeout(mut self, timeout: Duration) -> Self {
        self.socket_timeout = Some(timeout);
        self
    }

    pub fn with_allow_redirects(mut self, allow: bool) -> Self {
        self.allow_redirects = allow;
        self
    }

    pub fn with_allow_redirect_downgrade(mut self, allow: bool) -> Self {
        self.allow_redirect_downgrade = allow;
        self
    }

    /// Set the redirect budget, clamping negative values to zero
    pub fn with_max_redirects(mut self, max: i64) -> Self {
        self.max_redirects = clamp_count(max);
        self
    }

    pub fn with_keep_alive(mut self, keep_alive: bool) -> Self {
        self.keep_alive = keep_alive;
        self
    }

    /// Enable retries with the given budget
    pub fn with_retries(mut self, max_retries: u32) -> Self {
        self.allow_retries = true;
        self.max_retries = max_retries;
        self
    }

    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(name.into(), value.into());
        self
    }

    pub fn with_max_sockets(mut self, max: usize) -> Self {
        self.max_sockets = Some(max);
        self
    }

    pub fn with_deserialize_dates(mut self, enabled: bool) -> Self {
        self.deserialize_dates = enabled;
        self
    }

    pub fn with_proxy(mut self, proxy: ProxySettings) -> Self {
        self.proxy = Some(proxy);
        self
    }

    /// Effective socket timeout
    pub fn socket_timeout(&self) -> Duration {
        self.socket_timeout.unwrap_or(DEFAULT_SOCKET_TIMEOUT)
    }

    /// Proxy settings in effect for the next request
    pub fn proxy_settings(&self) -> ProxySettings {
        self.proxy.clone().unwrap_or_else(ProxySettings::from_env)
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<()> {
        if self.max_sockets == Some(0) {
            return Err(Error::configuration("max_sockets cannot be zero", None));
        }
        if self.socket_timeout.is_some_and(|timeout| timeout.is_zero()) {
            return Err(Error::configuration("socket_timeout cannot be zero", None));
        }
        Ok(())
    }

    /// Default headers with lower-cased names
    pub fn default_header_map(&self) -> Result<HeaderMap> {
        let mut map = HeaderMap::with_capacity(self.headers.len());
        for (name, value) in &self.headers {
            let (name, value) = parse_header(name, value)?;
            map.insert(name, value);
        }
        Ok(map)
    }
}

/// Parse a header pair; names are normalized to lower case
pub(crate) fn parse_header(name: &str, value: &str) -> Result<(HeaderName, HeaderValue)> {
    let header_name = HeaderName::from_bytes(name.to_lowercase().as_bytes()).map_err(|e| {
        Error::configuration(format!("Invalid header name '{}'", name), Some(anyhow::Error::new(e)))
    })?;
    let header_value = HeaderValue::from_str(value).map_err(|e| {
        Error::configuration(
            format!("Invalid value for header '{}'", name),
            Some(anyhow::Error::new(e)),
        )
    })?;
    Ok((header_name, header_value))
}

fn clamp_count(value: i64) -> u32 {
    value.clamp(0, i64::from(u32::MAX)) as u32
}

fn clamped_count<'de, D>(deserializer: D) -> std::result::Result<u32, D::Error>
where
    D: Deserializer<'de>,
{
    i64::deserialize(deserializer).map(clamp_count)
}
