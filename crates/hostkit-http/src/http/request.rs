//! Per-attempt request descriptors and request bodies

use std::fmt;
use std::io;
use std::pin::Pin;
use std::sync::{Arc, Mutex, MutexGuard};

use bytes::Bytes;
use futures_util::stream::Stream;
use reqwest::header::HeaderMap;
use reqwest::Method;
use url::Url;

use crate::http::agent::Agent;

/// Transport-level options of a single attempt
///
/// `headers` is optional so that auth handlers can reject requests that
/// were built without a headers container.
#[derive(Debug, Clone)]
pub struct RequestOptions {
    /// Target host name
    pub host: String,
    /// Target port, defaulted from the scheme
    pub port: u16,
    /// Path plus query string
    pub path: String,
    /// HTTP verb
    pub method: Method,
    /// Outgoing headers (lower-case names)
    pub headers: Option<HeaderMap>,
    /// Connection agent chosen for this target
    pub agent: Option<Agent>,
}

impl RequestOptions {
    /// Options for `method` against `url` with an empty headers container
    pub fn for_url(method: Method, url: &Url) -> Self {
        let port = url
            .port()
            .unwrap_or(if url.scheme() == "https" { 443 } else { 80 });
        let path = match url.query() {
            Some(query) => format!("{}?{}", url.path(), query),
            None => url.path().to_string(),
        };

        Self {
            host: url.host_str().unwrap_or_default().to_string(),
            port,
            path,
            method,
            headers: Some(HeaderMap::new()),
            agent: None,
        }
    }
}

/// Descriptor of one attempt, rebuilt for every redirect hop
#[derive(Debug, Clone)]
pub struct RequestInfo {
    /// Parsed target URL
    pub parsed_url: Url,
    /// Options handed to the transport
    pub options: RequestOptions,
}

impl RequestInfo {
    /// Whether the attempt goes over TLS
    pub fn uses_tls(&self) -> bool {
        self.parsed_url.scheme() == "https"
    }
}

/// Body of a logical call
///
/// Text bodies are resent on every attempt. A stream can only be sent once;
/// later attempts of the same call go out with an empty body.
#[derive(Debug, Clone, Default)]
pub enum RequestData {
    /// No body
    #[default]
    Empty,
    /// UTF-8 body with an exact `Content-Length`
    Text(String),
    /// Chunked body piped from a stream
    Stream(StreamBody),
}

impl RequestData {
    /// Wrap a byte stream
    pub fn stream<S>(stream: S) -> Self
    where
        S: Stream<Item = io::Result<Bytes>> + Send + Sync + 'static,
    {
        RequestData::Stream(StreamBody::new(stream))
    }

    pub(crate) fn to_body(&self) -> Option<reqwest::Body> {
        match self {
            RequestData::Empty => None,
            RequestData::Text(text) => Some(reqwest::Body::from(text.clone())),
            RequestData::Stream(stream) => match stream.take() {
                Some(inner) => Some(reqwest::Body::wrap_stream(inner)),
                None => {
                    tracing::warn!("stream body already sent, resending with an empty body");
                    Some(reqwest::Body::from(Vec::new()))
                }
            },
        }
    }
}

impl From<String> for RequestData {
    fn from(text: String) -> Self {
        RequestData::Text(text)
    }
}

impl From<&str> for RequestData {
    fn from(text: &str) -> Self {
        RequestData::Text(text.to_string())
    }
}

impl From<Option<String>> for RequestData {
    fn from(text: Option<String>) -> Self {
        text.map_or(RequestData::Empty, RequestData::Text)
    }
}

type ByteStream = Pin<Box<dyn Stream<Item = io::Result<Bytes>> + Send + Sync + 'static>>;

/// One-shot stream body shared between the attempts of a call
#[derive(Clone)]
pub struct StreamBody {
    inner: Arc<Mutex<Option<ByteStream>>>,
}

impl StreamBody {
    /// Wrap a byte stream
    pub fn new<S>(stream: S) -> Self
    where
        S: Stream<Item = io::Result<Bytes>> + Send + Sync + 'static,
    {
        Self {
            inner: Arc::new(Mutex::new(Some(Box::pin(stream)))),
        }
    }

    /// Whether the stream has already been handed to the transport
    pub fn is_consumed(&self) -> bool {
        self.lock().is_none()
    }

    fn take(&self) -> Option<ByteStream> {
        self.lock().take()
    }

    fn lock(&self) -> MutexGuard<'_, Option<ByteStream>> {
        self.inner.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl fmt::Debug for StreamBody {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StreamBody")
            .field("consumed", &self.is_consumed())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures_util::stream;

    #[test]
    fn test_options_default_ports() {
        let https = RequestOptions::for_url(Method::GET, &Url::parse("https://a.test/x?y=1").unwrap());
        assert_eq!(https.port, 443);
        assert_eq!(https.path, "/x?y=1");
        assert_eq!(https.host, "a.test");

        let http = RequestOptions::for_url(Method::GET, &Url::parse("http://a.test:8080").unwrap());
        assert_eq!(http.port, 8080);
        assert_eq!(http.path, "/");
        assert!(http.headers.is_some());
    }

    #[test]
    fn test_text_body_is_reusable() {
        let data = RequestData::from("payload");
        assert!(data.to_body().is_some());
        assert!(data.to_body().is_some());
    }

    #[test]
    fn test_empty_body() {
        assert!(RequestData::Empty.to_body().is_none());
        assert!(matches!(RequestData::from(None), RequestData::Empty));
    }

    #[test]
    fn test_stream_body_sent_once() {
        let data = RequestData::stream(stream::iter(vec![Ok(Bytes::from_static(b"chunk"))]));
        let shared = data.clone();

        assert!(data.to_body().is_some());
        match &shared {
            RequestData::Stream(body) => assert!(body.is_consumed()),
            other => panic!("unexpected body {:?}", other),
        }
        // later attempts still get a (now empty) body
        assert!(shared.to_body().is_some());
    }
}
