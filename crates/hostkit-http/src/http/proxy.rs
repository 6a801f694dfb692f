//! Proxy selection and no-proxy bypass matching
//!
//! Settings come from the conventional environment variables:
//! - `https_proxy` / `HTTPS_PROXY` for https targets
//! - `http_proxy` / `HTTP_PROXY` for every other target
//! - `no_proxy` / `NO_PROXY` for the comma-separated bypass list
//!
//! Lower-case names win over upper-case ones and empty values count as unset.
//! Loopback hosts (`localhost`, `127.*`) are never proxied. IPv6 loopback
//! literals are not recognized as loopback.

use serde::{Deserialize, Serialize};
use url::Url;

use crate::{Error, Result};

/// Snapshot of proxy configuration
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProxySettings {
    /// Proxy used for plain http targets
    pub http_proxy: Option<String>,
    /// Proxy used for https targets
    pub https_proxy: Option<String>,
    /// Comma-separated bypass list
    pub no_proxy: Option<String>,
}

impl ProxySettings {
    /// Settings with no proxy at all
    pub fn new() -> Self {
        Self::default()
    }

    /// Read the current process environment
    pub fn from_env() -> Self {
        Self {
            http_proxy: env_var("http_proxy", "HTTP_PROXY"),
            https_proxy: env_var("https_proxy", "HTTPS_PROXY"),
            no_proxy: env_var("no_proxy", "NO_PROXY"),
        }
    }

    /// Set the proxy for plain http targets
    pub fn with_http_proxy(mut self, proxy: impl Into<String>) -> Self {
        self.http_proxy = Some(proxy.into());
        self
    }

    /// Set the proxy for https targets
    pub fn with_https_proxy(mut self, proxy: impl Into<String>) -> Self {
        self.https_proxy = Some(proxy.into());
        self
    }

    /// Set the bypass list
    pub fn with_no_proxy(mut self, no_proxy: impl Into<String>) -> Self {
        self.no_proxy = Some(no_proxy.into());
        self
    }

    /// Proxy URL to use for `target`, or `None` when the request goes direct.
    pub fn resolve(&self, target: &Url) -> Option<Url> {
        if self.is_bypassed(target) {
            return None;
        }

        let raw = if target.scheme() == "https" {
            self.https_proxy.as_deref()
        } else {
            self.http_proxy.as_deref()
        };

        raw.map(str::trim)
            .filter(|value| !value.is_empty())
            .and_then(parse_proxy_url)
    }

    /// Whether `target` matches the loopback rule or an entry of the bypass list.
    pub fn is_bypassed(&self, target: &Url) -> bool {
        let host = match target.host_str() {
            Some(host) if !host.is_empty() => host,
            _ => return false,
        };

        if is_loopback_address(host) {
            return true;
        }

        let no_proxy = match self.no_proxy.as_deref() {
            Some(value) if !value.trim().is_empty() => value,
            _ => return false,
        };

        let upper_host = host.to_uppercase();
        let mut candidates = vec![upper_host.clone()];
        if let Some(port) = request_port(target) {
            candidates.push(format!("{}:{}", upper_host, port));
        }

        no_proxy
            .split(',')
            .map(|entry| entry.trim().to_uppercase())
            .filter(|entry| !entry.is_empty())
            .any(|entry| entry == "*" || candidates.iter().any(|c| matches_entry(c, &entry)))
    }
}

/// Returns the proxy URL for `server_url` from the environment, or an empty
/// string when no proxy applies.
pub fn get_proxy_url(server_url: &str) -> Result<String> {
    let parsed = Url::parse(server_url).map_err(|source| Error::InvalidUrl {
        url: server_url.to_string(),
        source,
    })?;

    Ok(ProxySettings::from_env()
        .resolve(&parsed)
        .map(|proxy| proxy.to_string())
        .unwrap_or_default())
}

/// Whether `target` bypasses the proxy according to the environment.
pub fn check_bypass(target: &Url) -> bool {
    ProxySettings::from_env().is_bypassed(target)
}

fn matches_entry(candidate: &str, entry: &str) -> bool {
    // Leading-dot entries are kept as-is: ".example.com" covers subdomains only.
    candidate == entry
        || candidate.ends_with(&format!(".{}", entry))
        || (entry.starts_with('.') && candidate.ends_with(entry))
}

fn request_port(target: &Url) -> Option<u16> {
    match (target.port(), target.scheme()) {
        (Some(port), _) => Some(port),
        (None, "http") => Some(80),
        (None, "https") => Some(443),
        _ => None,
    }
}

fn is_loopback_address(host: &str) -> bool {
    let host = host.to_lowercase();
    host == "localhost" || host.starts_with("127.")
}

fn parse_proxy_url(value: &str) -> Option<Url> {
    let candidate = if value.contains("://") {
        value.to_string()
    } else {
        format!("http://{}", value)
    };

    match Url::parse(&candidate) {
        Ok(url) => Some(url),
        Err(err) => {
            tracing::debug!(error = %err, "ignoring unparseable proxy setting");
            None
        }
    }
}

fn env_var(lower: &str, upper: &str) -> Option<String> {
    [lower, upper]
        .iter()
        .filter_map(|name| std::env::var(name).ok())
        .find(|value| !value.is_empty())
}
