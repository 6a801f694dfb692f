//! Credential handlers applied to outgoing requests
//!
//! Supports three pre-authorization schemes:
//! - Basic (`username:password`)
//! - Bearer tokens
//! - Personal access tokens (Basic with a fixed `PAT` user)
//!
//! Handlers also expose a 401-challenge hook. None of the shipped handlers
//! claim a challenge, so the hook only reports `Unimplemented` if reached.

use std::fmt;

use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use reqwest::header::{HeaderValue, AUTHORIZATION};

use crate::http::client::HttpClient;
use crate::http::request::{RequestData, RequestInfo, RequestOptions};
use crate::http::response::ClientResponse;
use crate::{Error, Result};

mod sealed {
    pub trait Sealed {}

    impl Sealed for super::BasicCredentialHandler {}
    impl Sealed for super::BearerCredentialHandler {}
    impl Sealed for super::PersonalAccessTokenCredentialHandler {}
}

/// Trait for decorating requests with credentials
#[async_trait]
pub trait AuthHandler: sealed::Sealed + Send + Sync + fmt::Debug {
    /// Add credentials to the outgoing request
    fn prepare_request(&self, options: &mut RequestOptions) -> Result<()>;

    /// Whether this handler can answer a 401 challenge
    fn can_handle_authentication(&self, _response: &ClientResponse) -> bool {
        false
    }

    /// Answer a 401 challenge by re-issuing the request
    async fn handle_authentication(
        &self,
        _client: &HttpClient,
        _info: &RequestInfo,
        _data: &RequestData,
    ) -> Result<ClientResponse> {
        Err(Error::Unimplemented {
            message: "authentication challenge handling is not supported".to_string(),
            feature: Some("handle_authentication".to_string()),
        })
    }
}

/// Basic authentication with a username and password
#[derive(Clone)]
pub struct BasicCredentialHandler {
    username: String,
    password: String,
}

impl BasicCredentialHandler {
    pub fn new(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            password: password.into(),
        }
    }
}

impl fmt::Debug for BasicCredentialHandler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BasicCredentialHandler")
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .finish()
    }
}

#[async_trait]
impl AuthHandler for BasicCredentialHandler {
    fn prepare_request(&self, options: &mut RequestOptions) -> Result<()> {
        set_authorization(options, &basic_value(&self.username, &self.password))
    }
}

/// Bearer token authentication
#[derive(Clone)]
pub struct BearerCredentialHandler {
    token: String,
}

impl BearerCredentialHandler {
    pub fn new(token: impl Into<String>) -> Self {
        Self { token: token.into() }
    }
}

impl fmt::Debug for BearerCredentialHandler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BearerCredentialHandler")
            .field("token", &"<redacted>")
            .finish()
    }
}

#[async_trait]
impl AuthHandler for BearerCredentialHandler {
    fn prepare_request(&self, options: &mut RequestOptions) -> Result<()> {
        set_authorization(options, &format!("Bearer {}", self.token))
    }
}

/// Personal access token sent as Basic credentials for the `PAT` user
#[derive(Clone)]
pub struct PersonalAccessTokenCredentialHandler {
    token: String,
}

impl PersonalAccessTokenCredentialHandler {
    pub fn new(token: impl Into<String>) -> Self {
        Self { token: token.into() }
    }
}

impl fmt::Debug for PersonalAccessTokenCredentialHandler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PersonalAccessTokenCredentialHandler")
            .field("token", &"<redacted>")
            .finish()
    }
}

#[async_trait]
impl AuthHandler for PersonalAccessTokenCredentialHandler {
    fn prepare_request(&self, options: &mut RequestOptions) -> Result<()> {
        set_authorization(options, &basic_value("PAT", &self.token))
    }
}

fn basic_value(username: &str, password: &str) -> String {
    format!("Basic {}", STANDARD.encode(format!("{}:{}", username, password)))
}

fn set_authorization(options: &mut RequestOptions, value: &str) -> Result<()> {
    let headers = options.headers.as_mut().ok_or_else(|| Error::MalformedRequest {
        message: "The request has no headers".to_string(),
    })?;

    let mut value = HeaderValue::from_str(value).map_err(|e| {
        Error::configuration(
            "Credential contains characters not allowed in a header",
            Some(anyhow::Error::new(e)),
        )
    })?;
    value.set_sensitive(true);
    headers.insert(AUTHORIZATION, value);
    Ok(())
}
