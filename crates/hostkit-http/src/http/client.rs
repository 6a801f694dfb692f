//! HTTP client with redirect, retry and authentication handling
//!
//! Every call goes through [`HttpClient::request`]:
//! 1. Headers are merged, an agent is selected and auth handlers decorate the request
//! 2. A 401 is handed to the first handler that claims it, or returned as-is
//! 3. Redirects are followed within the redirect budget
//! 4. Idempotent verbs are retried on 502/503/504 with exponential backoff

use std::io;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use bytes::Bytes;
use futures_util::stream::Stream;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue, AUTHORIZATION, LOCATION, USER_AGENT};
use reqwest::{Method, StatusCode};
use url::Url;

use crate::http::agent::{Agent, AgentCache, AgentKey, AgentOptions, Route};
use crate::http::auth::AuthHandler;
use crate::http::config::HttpClientConfig;
use crate::http::request::{RequestData, RequestInfo, RequestOptions};
use crate::http::response::ClientResponse;
use crate::http::retry::{is_redirect_status, RetryDecision, RetryHandler, RetryPolicy};
use crate::{Error, Result};

/// HTTP client owning its configuration and connection agents
#[derive(Debug)]
pub struct HttpClient {
    user_agent: Option<String>,
    handlers: Vec<Arc<dyn AuthHandler>>,
    config: HttpClientConfig,
    default_headers: HeaderMap,
    agents: AgentCache,
    disposed: AtomicBool,
}

impl Default for HttpClient {
    fn default() -> Self {
        Self {
            user_agent: None,
            handlers: Vec::new(),
            config: HttpClientConfig::default(),
            default_headers: HeaderMap::new(),
            agents: AgentCache::default(),
            disposed: AtomicBool::new(false),
        }
    }
}

impl HttpClient {
    /// Create a client; fails if the configuration is invalid
    pub fn new(
        user_agent: Option<String>,
        handlers: Vec<Arc<dyn AuthHandler>>,
        config: HttpClientConfig,
    ) -> Result<Self> {
        config.validate()?;
        let default_headers = config.default_header_map()?;

        Ok(Self {
            user_agent,
            handlers,
            config,
            default_headers,
            agents: AgentCache::default(),
            disposed: AtomicBool::new(false),
        })
    }

    /// Client with a user agent and default options
    pub fn with_user_agent(user_agent: impl Into<String>) -> Self {
        Self {
            user_agent: Some(user_agent.into()),
            ..Default::default()
        }
    }

    pub fn user_agent(&self) -> Option<&str> {
        self.user_agent.as_deref()
    }

    pub fn config(&self) -> &HttpClientConfig {
        &self.config
    }

    pub async fn options(&self, url: &str, headers: Option<HeaderMap>) -> Result<ClientResponse> {
        self.request(Method::OPTIONS, url, RequestData::Empty, headers).await
    }

    pub async fn get(&self, url: &str, headers: Option<HeaderMap>) -> Result<ClientResponse> {
        self.request(Method::GET, url, RequestData::Empty, headers).await
    }

    pub async fn del(&self, url: &str, headers: Option<HeaderMap>) -> Result<ClientResponse> {
        self.request(Method::DELETE, url, RequestData::Empty, headers).await
    }

    pub async fn post(
        &self,
        url: &str,
        data: impl Into<RequestData>,
        headers: Option<HeaderMap>,
    ) -> Result<ClientResponse> {
        self.request(Method::POST, url, data.into(), headers).await
    }

    pub async fn patch(
        &self,
        url: &str,
        data: impl Into<RequestData>,
        headers: Option<HeaderMap>,
    ) -> Result<ClientResponse> {
        self.request(Method::PATCH, url, data.into(), headers).await
    }

    pub async fn put(
        &self,
        url: &str,
        data: impl Into<RequestData>,
        headers: Option<HeaderMap>,
    ) -> Result<ClientResponse> {
        self.request(Method::PUT, url, data.into(), headers).await
    }

    pub async fn head(&self, url: &str, headers: Option<HeaderMap>) -> Result<ClientResponse> {
        self.request(Method::HEAD, url, RequestData::Empty, headers).await
    }

    /// Send a streamed body; the stream is transmitted at most once
    pub async fn send_stream<S>(
        &self,
        verb: Method,
        url: &str,
        stream: S,
        headers: Option<HeaderMap>,
    ) -> Result<ClientResponse>
    where
        S: Stream<Item = io::Result<Bytes>> + Send + Sync + 'static,
    {
        self.request(verb, url, RequestData::stream(stream), headers).await
    }

    /// Run one logical call through the auth, redirect and retry pipeline.
    ///
    /// Retryable statuses left after the budget is spent are returned, not
    /// turned into errors.
    pub async fn request(
        &self,
        verb: Method,
        url: &str,
        data: RequestData,
        headers: Option<HeaderMap>,
    ) -> Result<ClientResponse> {
        if self.is_disposed() {
            return Err(Error::ClientDisposed);
        }

        let original_url = parse_url(url)?;
        let mut headers = headers.unwrap_or_default();
        let mut info = self.prepare_request(verb.clone(), &original_url, &headers)?;
        let mut retry = RetryHandler::new(RetryPolicy::for_request(&self.config, &verb));

        loop {
            let mut response = self.request_raw(&info, &data).await?;

            if response.status() == StatusCode::UNAUTHORIZED {
                return match self
                    .handlers
                    .iter()
                    .find(|handler| handler.can_handle_authentication(&response))
                {
                    Some(handler) => handler.handle_authentication(self, &info, &data).await,
                    None => Ok(response),
                };
            }

            let mut redirects_remaining = self.config.max_redirects;
            while is_redirect_status(response.status())
                && self.config.allow_redirects
                && redirects_remaining > 0
            {
                let location = response.header(&LOCATION).map(str::to_string);
                let target = self.redirect_target(&original_url, &info.parsed_url, location.as_deref())?;
                let target = match target {
                    Some(target) => target,
                    None => break,
                };

                response.drain().await?;

                if target.host_str() != original_url.host_str() {
                    headers.remove(AUTHORIZATION);
                }

                tracing::debug!(
                    from = %info.parsed_url,
                    to = %target,
                    remaining = redirects_remaining - 1,
                    "following redirect"
                );
                info = self.prepare_request(verb.clone(), &target, &headers)?;
                response = self.request_raw(&info, &data).await?;
                redirects_remaining -= 1;
            }

            match retry.record_attempt(response.status()) {
                RetryDecision::NoRetry => return Ok(response),
                RetryDecision::Retry { delay } => {
                    response.drain().await?;
                    log::warn!(
                        "Request {} {} returned a retryable status (attempt {}), retrying after {:?}",
                        verb,
                        info.parsed_url,
                        retry.attempts(),
                        delay
                    );
                    tokio::time::sleep(delay).await;
                }
            }
        }
    }

    /// Issue exactly one request for a prepared descriptor.
    ///
    /// Fails with `RequestTimeout` when no response arrives within the
    /// socket timeout, and with `Network` for any other transport error.
    pub async fn request_raw(&self, info: &RequestInfo, data: &RequestData) -> Result<ClientResponse> {
        let agent = match &info.options.agent {
            Some(agent) => agent.clone(),
            None => self.agent_for(&info.parsed_url)?,
        };

        let mut builder = agent
            .client()
            .request(info.options.method.clone(), info.parsed_url.clone())
            .headers(info.options.headers.clone().unwrap_or_default());
        if let Some(body) = data.to_body() {
            builder = builder.body(body);
        }

        tracing::debug!(method = %info.options.method, host = %info.options.host, path = %info.options.path, "sending request");

        let timeout = self.config.socket_timeout();
        let response = match tokio::time::timeout(timeout, builder.send()).await {
            Err(_) => {
                return Err(Error::RequestTimeout {
                    path: info.options.path.clone(),
                })
            }
            Ok(Err(err)) if err.is_timeout() => {
                return Err(Error::RequestTimeout {
                    path: info.options.path.clone(),
                })
            }
            Ok(Err(err)) => return Err(Error::network(err)),
            Ok(Ok(response)) => response,
        };

        tracing::debug!(status = response.status().as_u16(), path = %info.options.path, "received response");
        Ok(ClientResponse::new(response))
    }

    /// Stop accepting calls and release cached agents
    pub fn dispose(&self) {
        self.disposed.store(true, Ordering::SeqCst);
        tracing::debug!(agents = self.agents.len(), "client disposed");
        self.agents.clear();
    }

    pub fn is_disposed(&self) -> bool {
        self.disposed.load(Ordering::SeqCst)
    }

    /// Agent that would carry a request to `server_url`
    pub fn get_agent(&self, server_url: &str) -> Result<Agent> {
        self.agent_for(&parse_url(server_url)?)
    }

    /// Dispatcher-style proxy agent for `server_url`, or `None` when the
    /// request would not be proxied
    pub fn get_agent_dispatcher(&self, server_url: &str) -> Result<Option<Agent>> {
        let parsed = parse_url(server_url)?;
        let proxy_url = match self.config.proxy_settings().resolve(&parsed) {
            Some(proxy_url) => proxy_url,
            None => return Ok(None),
        };

        let options = self.agent_options(&parsed);
        let build = || Agent::dispatcher(&proxy_url, options);
        let agent = if self.config.keep_alive {
            let key = AgentKey {
                route: Route::Dispatcher,
                tls: options.tls,
            };
            self.agents.get_or_try_insert(key, build)?
        } else {
            build()?
        };
        Ok(Some(agent))
    }

    /// Build the descriptor for one attempt against `url`
    pub fn prepare_request(&self, method: Method, url: &Url, headers: &HeaderMap) -> Result<RequestInfo> {
        let mut options = RequestOptions::for_url(method, url);
        let mut merged = self.merge_headers(headers);
        if let Some(user_agent) = &self.user_agent {
            let value = HeaderValue::from_str(user_agent).map_err(|e| {
                Error::configuration("Invalid user agent", Some(anyhow::Error::new(e)))
            })?;
            merged.insert(USER_AGENT, value);
        }
        options.headers = Some(merged);
        options.agent = Some(self.agent_for(url)?);

        for handler in &self.handlers {
            handler.prepare_request(&mut options)?;
        }

        Ok(RequestInfo {
            parsed_url: url.clone(),
            options,
        })
    }

    /// Client default headers overlaid with `headers`; call values win.
    pub fn merge_headers(&self, headers: &HeaderMap) -> HeaderMap {
        let mut merged = self.default_headers.clone();
        for name in headers.keys() {
            merged.remove(name);
            for value in headers.get_all(name) {
                merged.append(name.clone(), value.clone());
            }
        }
        merged
    }

    /// Call header if present, else the client default, else `default`
    pub fn existing_or_default_header(
        &self,
        additional: &HeaderMap,
        name: &HeaderName,
        default: &'static str,
    ) -> HeaderValue {
        additional
            .get(name)
            .or_else(|| self.default_headers.get(name))
            .cloned()
            .unwrap_or_else(|| HeaderValue::from_static(default))
    }

    fn redirect_target(
        &self,
        original_url: &Url,
        current_url: &Url,
        location: Option<&str>,
    ) -> Result<Option<Url>> {
        let location = match location {
            Some(location) if !location.is_empty() => location,
            _ => return Ok(None),
        };

        let target = current_url.join(location).map_err(|source| Error::InvalidUrl {
            url: location.to_string(),
            source,
        })?;

        if original_url.scheme() == "https"
            && target.scheme() != "https"
            && !self.config.allow_redirect_downgrade
        {
            return Err(Error::RedirectDowngrade {
                from: original_url.to_string(),
                to: target.to_string(),
            });
        }

        Ok(Some(target))
    }

    fn agent_options(&self, url: &Url) -> AgentOptions {
        let tls = url.scheme() == "https";
        AgentOptions {
            keep_alive: self.config.keep_alive,
            max_sockets: self.config.max_sockets,
            reject_unauthorized: !(tls && self.config.ignore_ssl_error),
            tls,
        }
    }

    fn agent_for(&self, url: &Url) -> Result<Agent> {
        let options = self.agent_options(url);
        let proxy_url = self.config.proxy_settings().resolve(url);

        let route = if proxy_url.is_some() { Route::Proxied } else { Route::Direct };
        let build = || match &proxy_url {
            Some(proxy_url) => Agent::tunnel(proxy_url, options),
            None => Agent::direct(options),
        };

        if self.config.keep_alive {
            let key = AgentKey {
                route,
                tls: options.tls,
            };
            self.agents.get_or_try_insert(key, build)
        } else {
            build()
        }
    }
}

/// Whether `request_url` uses https
pub fn is_https(request_url: &str) -> Result<bool> {
    Ok(parse_url(request_url)?.scheme() == "https")
}

fn parse_url(url: &str) -> Result<Url> {
    Url::parse(url).map_err(|source| Error::InvalidUrl {
        url: url.to_string(),
        source,
    })
}
