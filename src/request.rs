//! Request options and request construction.
//!
//! [`RequestOptions`] carries the per-call query parameters, headers and body.
//! [`prepare`] turns a verb, a base URL, a relative path and those options into
//! a [`PreparedRequest`] that a [`Transport`](crate::Transport) can execute.
//! Nothing in this module touches the network.

use crate::{Error, Result};
use http::{HeaderMap, HeaderName, HeaderValue, Method};
use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::io::Read;
use url::Url;

/// Query parameter key the session token is sent under.
pub const TOKEN_PARAM: &str = "access_token";

/// A request or response body as a readable byte stream.
///
/// A body is consumed by reading it and released by dropping it; it cannot be
/// replayed.
pub type Body = Box<dyn Read + Send>;

/// Per-call options for a request.
///
/// Options are taken by value, so the parameter map cannot change once a call
/// has started.
///
/// # Examples
///
/// ```
/// use atlas_client::RequestOptions;
///
/// let options = RequestOptions::new()
///     .with_param("q", "ubuntu")
///     .with_header("Accept", "application/json")
///     .unwrap();
///
/// assert_eq!(options.params.get("q").map(String::as_str), Some("ubuntu"));
/// ```
#[derive(Default)]
pub struct RequestOptions {
    /// Query parameters, merged into the URL's query string.
    pub params: HashMap<String, String>,

    /// Headers added to the request on top of the transport defaults.
    pub headers: HeaderMap,

    /// Optional request body.
    pub body: Option<Body>,

    /// Declared body length in bytes. Zero means unknown.
    pub body_length: u64,
}

impl RequestOptions {
    /// Creates empty options.
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a query parameter, replacing any previous value for `key`.
    pub fn with_param(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.params.insert(key.into(), value.into());
        self
    }

    /// Adds multiple query parameters.
    pub fn with_params(mut self, params: impl IntoIterator<Item = (String, String)>) -> Self {
        self.params.extend(params);
        self
    }

    /// Adds a header. Repeated names are appended, not replaced.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidArgument`] if the header name or value is invalid.
    pub fn with_header(mut self, name: impl AsRef<str>, value: impl AsRef<str>) -> Result<Self> {
        let name = HeaderName::try_from(name.as_ref())
            .map_err(|e| Error::InvalidArgument(format!("invalid header name: {}", e)))?;
        let value = HeaderValue::try_from(value.as_ref())
            .map_err(|e| Error::InvalidArgument(format!("invalid header value: {}", e)))?;
        self.headers.append(name, value);
        Ok(self)
    }

    /// Sets the request body and its length in bytes (zero if unknown).
    pub fn with_body(mut self, body: impl Read + Send + 'static, length: u64) -> Self {
        self.body = Some(Box::new(body));
        self.body_length = length;
        self
    }
}

impl fmt::Debug for RequestOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RequestOptions")
            .field("params", &self.params.keys().collect::<Vec<_>>())
            .field("headers", &self.headers)
            .field("body", &self.body.as_ref().map(|_| "<stream>"))
            .field("body_length", &self.body_length)
            .finish()
    }
}

/// A fully resolved request, ready for a transport to execute.
pub struct PreparedRequest {
    /// The HTTP method.
    pub method: Method,

    /// The absolute URL, query string included.
    pub url: Url,

    /// Caller-supplied headers.
    pub headers: HeaderMap,

    /// The body, if any.
    pub body: Option<Body>,

    /// Explicit content length, set when the caller declared a positive length.
    pub content_length: Option<u64>,
}

impl fmt::Debug for PreparedRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PreparedRequest")
            .field("method", &self.method)
            .field("path", &self.url.path())
            .field("headers", &self.headers)
            .field("body", &self.body.as_ref().map(|_| "<stream>"))
            .field("content_length", &self.content_length)
            .finish()
    }
}

/// Builds a request for `path` relative to `base`, carrying `token` if non-empty.
///
/// The token is written under [`TOKEN_PARAM`] after the caller's parameters
/// are in place, so it always replaces a caller-supplied value for that key.
///
/// # Errors
///
/// Returns [`Error::InvalidArgument`] for an empty or malformed verb, or when
/// `base` cannot carry a path.
pub fn prepare(
    verb: &str,
    base: &Url,
    path: &str,
    token: &str,
    mut options: RequestOptions,
) -> Result<PreparedRequest> {
    let url = resolve(base, path)?;
    inject_token(&mut options, token);
    build(verb, url, options)
}

/// Writes a non-empty `token` into the options under [`TOKEN_PARAM`].
pub(crate) fn inject_token(options: &mut RequestOptions, token: &str) {
    if token.is_empty() {
        return;
    }
    if options.params.contains_key(TOKEN_PARAM) {
        tracing::debug!("Replacing caller-supplied {} with client token", TOKEN_PARAM);
    }
    options
        .params
        .insert(TOKEN_PARAM.to_string(), token.to_string());
}

/// Builds a request against an already absolute URL.
///
/// Any query string on `url` is replaced by the encoded `options.params`,
/// sorted by key.
///
/// # Errors
///
/// Returns [`Error::InvalidArgument`] for an empty or malformed verb.
pub fn build(verb: &str, mut url: Url, options: RequestOptions) -> Result<PreparedRequest> {
    if verb.is_empty() {
        return Err(Error::InvalidArgument("missing verb".to_string()));
    }
    let method = Method::from_bytes(verb.as_bytes())
        .map_err(|e| Error::InvalidArgument(format!("invalid verb {:?}: {}", verb, e)))?;

    url.set_query(None);
    if !options.params.is_empty() {
        let sorted: BTreeMap<_, _> = options.params.iter().collect();
        let mut query = url.query_pairs_mut();
        for (key, value) in sorted {
            query.append_pair(key, value);
        }
    }

    let content_length = match (&options.body, options.body_length) {
        (Some(_), length) if length > 0 => Some(length),
        _ => None,
    };

    Ok(PreparedRequest {
        method,
        url,
        headers: options.headers,
        body: options.body,
        content_length,
    })
}

/// Parses an absolute URL string.
///
/// # Errors
///
/// Returns [`Error::InvalidArgument`] if `raw` is empty or not a valid URL.
pub fn parse_url(raw: &str) -> Result<Url> {
    if raw.is_empty() {
        return Err(Error::InvalidArgument("missing url".to_string()));
    }
    Url::parse(raw).map_err(|e| Error::InvalidArgument(format!("invalid url {:?}: {}", raw, e)))
}

/// Returns `base` with `path` joined onto its path.
fn resolve(base: &Url, path: &str) -> Result<Url> {
    if base.cannot_be_a_base() {
        return Err(Error::InvalidArgument(format!(
            "url {:?} cannot carry a path",
            base.as_str()
        )));
    }
    let mut url = base.clone();
    url.set_path(&join_path(base.path(), path));
    Ok(url)
}

/// Joins two slash-separated paths and cleans the result lexically.
///
/// Empty and `.` segments are dropped, `..` removes the previous segment but
/// never climbs above the root, and trailing slashes are removed.
///
/// ```
/// use atlas_client::request::join_path;
///
/// assert_eq!(join_path("/api", "/v1/things"), "/api/v1/things");
/// assert_eq!(join_path("/api/", "v1//things/"), "/api/v1/things");
/// assert_eq!(join_path("/api", "../../etc"), "/etc");
/// ```
pub fn join_path(base: &str, relative: &str) -> String {
    let joined = match (base.is_empty(), relative.is_empty()) {
        (true, true) => return String::new(),
        (false, true) => base.to_string(),
        (true, false) => relative.to_string(),
        (false, false) => format!("{}/{}", base, relative),
    };

    let rooted = joined.starts_with('/');
    let mut segments: Vec<&str> = Vec::new();
    for segment in joined.split('/') {
        match segment {
            "" | "." => {}
            ".." => {
                if segments.last().is_some_and(|last| *last != "..") {
                    segments.pop();
                } else if !rooted {
                    segments.push("..");
                }
            }
            other => segments.push(other),
        }
    }

    let cleaned = segments.join("/");
    match (rooted, cleaned.is_empty()) {
        (true, _) => format!("/{}", cleaned),
        (false, true) => ".".to_string(),
        (false, false) => cleaned,
    }
}
