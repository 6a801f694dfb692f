//! Typed JSON calls on top of the request pipeline
//!
//! A 404 yields an empty result instead of an error. Bodies that are not
//! valid JSON (or do not fit `T`) also leave the result empty. Any other
//! status above 299 becomes an [`HttpClientError`].

use std::sync::OnceLock;

use chrono::{DateTime, NaiveDate, NaiveDateTime, SecondsFormat, Utc};
use regex::Regex;
use reqwest::header::{HeaderMap, ACCEPT, CONTENT_TYPE};
use reqwest::{Method, StatusCode};
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;

use crate::http::client::HttpClient;
use crate::http::error::HttpClientError;
use crate::http::media_types::APPLICATION_JSON;
use crate::http::request::RequestData;
use crate::http::response::ClientResponse;
use crate::Result;

/// Outcome of a typed JSON call
#[derive(Debug, Clone)]
pub struct TypedResponse<T> {
    pub status_code: u16,
    /// `None` for a 404, an empty body or a body that failed to parse
    pub result: Option<T>,
    pub headers: HeaderMap,
}

impl HttpClient {
    pub async fn get_json<T>(&self, url: &str, headers: Option<HeaderMap>) -> Result<TypedResponse<T>>
    where
        T: DeserializeOwned,
    {
        let mut headers = headers.unwrap_or_default();
        let accept = self.existing_or_default_header(&headers, &ACCEPT, APPLICATION_JSON);
        headers.insert(ACCEPT, accept);

        let res = self.get(url, Some(headers)).await?;
        process_response(res, self.config().deserialize_dates).await
    }

    pub async fn post_json<T, B>(&self, url: &str, obj: &B, headers: Option<HeaderMap>) -> Result<TypedResponse<T>>
    where
        T: DeserializeOwned,
        B: Serialize + ?Sized,
    {
        self.send_json(Method::POST, url, obj, headers).await
    }

    pub async fn put_json<T, B>(&self, url: &str, obj: &B, headers: Option<HeaderMap>) -> Result<TypedResponse<T>>
    where
        T: DeserializeOwned,
        B: Serialize + ?Sized,
    {
        self.send_json(Method::PUT, url, obj, headers).await
    }

    pub async fn patch_json<T, B>(&self, url: &str, obj: &B, headers: Option<HeaderMap>) -> Result<TypedResponse<T>>
    where
        T: DeserializeOwned,
        B: Serialize + ?Sized,
    {
        self.send_json(Method::PATCH, url, obj, headers).await
    }

    async fn send_json<T, B>(
        &self,
        verb: Method,
        url: &str,
        obj: &B,
        headers: Option<HeaderMap>,
    ) -> Result<TypedResponse<T>>
    where
        T: DeserializeOwned,
        B: Serialize + ?Sized,
    {
        let data = serde_json::to_string_pretty(obj)?;

        let mut headers = headers.unwrap_or_default();
        let accept = self.existing_or_default_header(&headers, &ACCEPT, APPLICATION_JSON);
        let content_type = self.existing_or_default_header(&headers, &CONTENT_TYPE, APPLICATION_JSON);
        headers.insert(ACCEPT, accept);
        headers.insert(CONTENT_TYPE, content_type);

        let res = self.request(verb, url, RequestData::Text(data), Some(headers)).await?;
        process_response(res, self.config().deserialize_dates).await
    }
}

/// Turn a finished response into a typed result
pub async fn process_response<T>(res: ClientResponse, deserialize_dates: bool) -> Result<TypedResponse<T>>
where
    T: DeserializeOwned,
{
    let status_code = res.status_code();
    if res.status() == StatusCode::NOT_FOUND {
        return Ok(TypedResponse {
            status_code,
            result: None,
            headers: HeaderMap::new(),
        });
    }

    let headers = res.headers().clone();
    let contents = match res.read_body().await {
        Ok(contents) => contents,
        Err(err) => {
            tracing::debug!(error = %err, "failed to read response body");
            String::new()
        }
    };

    let parsed = parse_body(&contents, deserialize_dates);

    if status_code > 299 {
        return Err(HttpClientError::from_body(status_code, parsed, &contents).into());
    }

    let result = parsed.and_then(|value| match serde_json::from_value::<T>(value) {
        Ok(result) => Some(result),
        Err(err) => {
            tracing::debug!(error = %err, "response body does not match the expected type");
            None
        }
    });

    Ok(TypedResponse {
        status_code,
        result,
        headers,
    })
}

fn parse_body(contents: &str, deserialize_dates: bool) -> Option<Value> {
    if contents.is_empty() {
        return None;
    }

    match serde_json::from_str::<Value>(contents) {
        Ok(mut value) => {
            if deserialize_dates {
                revive_dates(&mut value);
            }
            Some(value)
        }
        Err(err) => {
            tracing::debug!(error = %err, "response body is not JSON");
            None
        }
    }
}

/// Rewrite ISO-8601 date strings as RFC 3339 UTC timestamps with millisecond
/// precision. Values without an offset are taken as UTC.
pub fn revive_dates(value: &mut Value) {
    match value {
        Value::String(text) => {
            if let Some(date) = parse_date(text) {
                *text = date.to_rfc3339_opts(SecondsFormat::Millis, true);
            }
        }
        Value::Array(items) => items.iter_mut().for_each(revive_dates),
        Value::Object(map) => map.values_mut().for_each(revive_dates),
        _ => {}
    }
}

fn iso_date_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"^\d{4}-\d{2}-\d{2}(?:[T ]\d{2}:\d{2}(?::\d{2}(?:\.\d+)?)?(?:Z|z|[+-]\d{2}:?\d{2})?)?$")
            .unwrap()
    })
}

fn parse_date(text: &str) -> Option<DateTime<Utc>> {
    if !iso_date_pattern().is_match(text) {
        return None;
    }

    if let Ok(date) = DateTime::parse_from_rfc3339(text) {
        return Some(date.with_timezone(&Utc));
    }
    for format in ["%Y-%m-%dT%H:%M:%S%.f%z", "%Y-%m-%d %H:%M:%S%.f%z"] {
        if let Ok(date) = DateTime::parse_from_str(text, format) {
            return Some(date.with_timezone(&Utc));
        }
    }
    for format in ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f", "%Y-%m-%dT%H:%M", "%Y-%m-%d %H:%M"] {
        if let Ok(naive) = NaiveDateTime::parse_from_str(text, format) {
            return Some(naive.and_utc());
        }
    }
    NaiveDate::parse_from_str(text, "%Y-%m-%d")
        .ok()
        .and_then(|date| date.and_hms_opt(0, 0, 0))
        .map(|naive| naive.and_utc())
}
