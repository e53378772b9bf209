//! The HTTP execution seam.
//!
//! [`Transport`] is all the client needs from an HTTP stack: execute one
//! prepared request and hand back the completed exchange. [`ReqwestTransport`]
//! is the default, built on `reqwest::blocking`. Deadlines belong to the
//! transport; the client itself never times out or retries.

use crate::request::PreparedRequest;
use crate::response::Response;
use crate::{Error, Result};
use std::time::Duration;

/// Executes prepared requests.
///
/// Implementations return `Ok` for every completed exchange, whatever its
/// status, and `Err` only when no response was obtained.
pub trait Transport: Send + Sync {
    /// Sends `request` and returns the response with its body unread.
    fn execute(&self, request: PreparedRequest) -> Result<Response>;
}

/// Blocking transport backed by a `reqwest::blocking::Client`.
#[derive(Debug, Clone)]
pub struct ReqwestTransport {
    client: reqwest::blocking::Client,
}

impl ReqwestTransport {
    /// Creates a transport with reqwest's default settings and no timeout.
    pub fn new() -> Result<Self> {
        Self::build(None)
    }

    /// Creates a transport whose requests fail after `timeout`.
    pub fn with_timeout(timeout: Duration) -> Result<Self> {
        Self::build(Some(timeout))
    }

    /// Wraps an existing reqwest client.
    pub fn from_client(client: reqwest::blocking::Client) -> Self {
        Self { client }
    }

    fn build(timeout: Option<Duration>) -> Result<Self> {
        let client = reqwest::blocking::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| Error::InvalidArgument(format!("failed to build HTTP client: {}", e)))?;
        Ok(Self { client })
    }
}

impl Transport for ReqwestTransport {
    fn execute(&self, request: PreparedRequest) -> Result<Response> {
        let PreparedRequest {
            method,
            url,
            headers,
            body,
            content_length,
        } = request;

        let mut builder = self.client.request(method, url).headers(headers);

        if let Some(body) = body {
            let body = match content_length {
                Some(length) => reqwest::blocking::Body::sized(body, length),
                None => reqwest::blocking::Body::new(body),
            };
            builder = builder.body(body);
        }

        let response = builder.send()?;
        let status = response.status();
        let headers = response.headers().clone();
        let reason = reason_phrase(response.extensions());

        let mut classified = Response::new(status, headers, Box::new(response));
        if let Some(reason) = reason {
            classified = classified.with_reason(reason);
        }
        Ok(classified)
    }
}

/// The non-canonical reason phrase hyper recorded for an HTTP/1 response.
fn reason_phrase(extensions: &http::Extensions) -> Option<String> {
    extensions
        .get::<hyper::ext::ReasonPhrase>()
        .map(|phrase| String::from_utf8_lossy(phrase.as_bytes()).into_owned())
}
