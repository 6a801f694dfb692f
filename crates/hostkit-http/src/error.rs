//! Error types for the hostkit HTTP client
//!
//! Every failure a call can surface is one variant of [`Error`]. Response
//! bodies that fail to parse as JSON are not errors; the typed JSON layer
//! leaves the result empty instead.

use thiserror::Error;

use crate::http::error::HttpClientError;

/// Main error type for client operations
#[derive(Error, Debug)]
pub enum Error {
    /// A request reached an auth handler without a headers container
    #[error("Malformed request: {message}")]
    MalformedRequest {
        message: String,
    },

    /// A reserved extension point was invoked
    #[error("Not implemented: {message}")]
    Unimplemented {
        message: String,
        feature: Option<String>,
    },

    /// A redirect tried to move an HTTPS request onto plain HTTP
    #[error(
        "Redirect from HTTPS to HTTP protocol ({from} -> {to}). This downgrade is not allowed for \
         security reasons. If you want to allow this behavior, set allow_redirect_downgrade to true."
    )]
    RedirectDowngrade {
        from: String,
        to: String,
    },

    /// No response arrived before the socket timeout elapsed
    #[error("Request timeout: {path}")]
    RequestTimeout {
        path: String,
    },

    /// Transport-level failure (connect, TLS, broken stream)
    #[error("Network error: {message}")]
    Network {
        message: String,
        #[source]
        source: Option<reqwest::Error>,
    },

    /// The typed JSON layer received a status above 299
    #[error(transparent)]
    Http(#[from] HttpClientError),

    /// The client was used after `dispose`
    #[error("Client has already been disposed.")]
    ClientDisposed,

    /// A request or redirect URL could not be parsed
    #[error("Invalid URL '{url}': {source}")]
    InvalidUrl {
        url: String,
        #[source]
        source: url::ParseError,
    },

    /// A request body could not be serialized
    #[error("JSON error: {message}")]
    Json {
        message: String,
        #[source]
        source: serde_json::Error,
    },

    /// Invalid client configuration, header or agent setup
    #[error("Configuration error: {message}")]
    Configuration {
        message: String,
        #[source]
        source: Option<anyhow::Error>,
    },
}

/// Convenience type alias for Results using our Error type
pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    /// HTTP status code carried by the error, if any
    pub fn status_code(&self) -> Option<u16> {
        match self {
            Error::Http(err) => Some(err.status_code),
            _ => None,
        }
    }

    /// Wrap a transport error
    pub(crate) fn network(err: reqwest::Error) -> Self {
        Error::Network {
            message: err.to_string(),
            source: Some(err),
        }
    }

    /// Build a configuration error from any displayable cause
    pub(crate) fn configuration(message: impl Into<String>, source: Option<anyhow::Error>) -> Self {
        Error::Configuration {
            message: message.into(),
            source,
        }
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Error::Json {
            message: err.to_string(),
            source: err,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = Error::MalformedRequest {
            message: "The request has no headers".to_string(),
        };
        assert_eq!(err.to_string(), "Malformed request: The request has no headers");

        let err = Error::RequestTimeout {
            path: "/slow?x=1".to_string(),
        };
        assert_eq!(err.to_string(), "Request timeout: /slow?x=1");
    }

    #[test]
    fn test_disposed_message() {
        assert_eq!(Error::ClientDisposed.to_string(), "Client has already been disposed.");
    }

    #[test]
    fn test_status_code_only_for_http_errors() {
        let err: Error = HttpClientError::new("Not Found", 404).into();
        assert_eq!(err.status_code(), Some(404));
        assert_eq!(Error::ClientDisposed.status_code(), None);
    }

    #[test]
    fn test_downgrade_mentions_option() {
        let err = Error::RedirectDowngrade {
            from: "https://a.test/".to_string(),
            to: "http://a.test/".to_string(),
        };
        assert!(err.to_string().contains("allow_redirect_downgrade"));
    }
}
