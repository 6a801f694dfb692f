//! Response handle returned by every call
//!
//! The handle owns the unread body. Reading it consumes the handle, so a
//! body can be read at most once.

use bytes::Bytes;
use reqwest::header::{HeaderMap, HeaderName};
use reqwest::StatusCode;
use url::Url;

use crate::{Error, Result};

/// In-flight HTTP response
#[derive(Debug)]
pub struct ClientResponse {
    status: StatusCode,
    headers: HeaderMap,
    url: Url,
    inner: reqwest::Response,
}

impl ClientResponse {
    pub(crate) fn new(inner: reqwest::Response) -> Self {
        Self {
            status: inner.status(),
            headers: inner.headers().clone(),
            url: inner.url().clone(),
            inner,
        }
    }

    /// Response status
    pub fn status(&self) -> StatusCode {
        self.status
    }

    /// Response status as a number
    pub fn status_code(&self) -> u16 {
        self.status.as_u16()
    }

    /// Response headers
    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    /// Value of a header if it is present and valid text
    pub fn header(&self, name: &HeaderName) -> Option<&str> {
        self.headers.get(name).and_then(|value| value.to_str().ok())
    }

    /// URL that produced this response
    pub fn url(&self) -> &Url {
        &self.url
    }

    /// Read the whole body as text (invalid UTF-8 is replaced).
    pub async fn read_body(self) -> Result<String> {
        let bytes = self.read_body_buffer().await?;
        Ok(String::from_utf8_lossy(&bytes).into_owned())
    }

    /// Read the whole body as raw bytes.
    pub async fn read_body_buffer(self) -> Result<Bytes> {
        self.inner.bytes().await.map_err(Error::network)
    }

    /// Consume and discard the body so the connection can be released.
    pub(crate) async fn drain(self) -> Result<()> {
        let status = self.status;
        let drained = self.read_body_buffer().await?;
        tracing::trace!(status = %status, bytes = drained.len(), "drained discarded response");
        Ok(())
    }
}
