//! Atlas API client and its builder.
//!
//! The [`Client`] type is the main entry point. It holds the endpoint, the
//! session token and the [`Transport`] used to execute requests. Use
//! [`ClientBuilder`] to configure one.

use crate::{
    request::{self, PreparedRequest, RequestOptions},
    response::{self, Response},
    transport::{ReqwestTransport, Transport},
    Result,
};
use serde::de::DeserializeOwned;
use std::io::Read;
use std::sync::{Arc, PoisonError, RwLock};
use std::time::Duration;
use url::Url;

/// Production endpoint used when no base URL is configured.
pub const DEFAULT_ENDPOINT: &str = "https://atlas.hashicorp.com";

/// Environment variable a token is read from when none is configured.
pub const TOKEN_ENV_VAR: &str = "ATLAS_TOKEN";

/// A blocking client for the Atlas API.
///
/// Clones share the endpoint, the token and the transport. The token sits
/// behind a lock, so a [`login`](Client::login) never interleaves with a
/// request reading it.
///
/// # Examples
///
/// ```no_run
/// use atlas_client::{Client, RequestOptions};
///
/// # fn example() -> Result<(), atlas_client::Error> {
/// let client = Client::builder()
///     .base_url("https://atlas.example.com")?
///     .build()?;
///
/// client.login("alice", "s3cret")?;
///
/// let boxes: serde_json::Value = client.request_json(
///     "GET",
///     "/api/v1/user/alice/boxes",
///     RequestOptions::new().with_param("page", "2"),
/// )?;
/// println!("{}", boxes);
/// # Ok(())
/// # }
/// ```
#[derive(Clone)]
pub struct Client {
    inner: Arc<ClientInner>,
}

struct ClientInner {
    transport: Box<dyn Transport>,
    endpoint: RwLock<Url>,
    token: RwLock<String>,
    debug: bool,
}

impl Client {
    /// Creates a new `ClientBuilder` for configuring a client.
    pub fn builder() -> ClientBuilder {
        ClientBuilder::new()
    }

    /// Creates a client for `url` with default settings.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidArgument`](crate::Error::InvalidArgument) if
    /// `url` is empty or cannot be parsed.
    pub fn new(url: &str) -> Result<Self> {
        Self::builder().base_url(url)?.build()
    }

    /// Creates a client for the production endpoint.
    pub fn default_client() -> Result<Self> {
        Self::builder().build()
    }

    /// Returns the base endpoint.
    pub fn endpoint(&self) -> Url {
        read(&self.inner.endpoint)
    }

    /// Replaces the base endpoint.
    pub fn set_endpoint(&self, url: &str) -> Result<()> {
        let url = request::parse_url(url)?;
        *self
            .inner
            .endpoint
            .write()
            .unwrap_or_else(PoisonError::into_inner) = url;
        Ok(())
    }

    /// Returns the current token. Empty means unauthenticated.
    pub fn token(&self) -> String {
        read(&self.inner.token)
    }

    /// Replaces the current token.
    pub fn set_token(&self, token: impl Into<String>) {
        *self
            .inner
            .token
            .write()
            .unwrap_or_else(PoisonError::into_inner) = token.into();
    }

    /// Returns `true` if decoded bodies are logged.
    pub fn debug(&self) -> bool {
        self.inner.debug
    }

    /// Builds the request for `verb` and `path` without sending it.
    ///
    /// `path` is joined onto the endpoint's path, and the token, if any, is
    /// added to the query string.
    pub fn build_request(
        &self,
        verb: &str,
        path: &str,
        options: RequestOptions,
    ) -> Result<PreparedRequest> {
        let endpoint = self.endpoint();
        let token = self.inner.token.read().unwrap_or_else(PoisonError::into_inner);
        request::prepare(verb, &endpoint, path, &token, options)
    }

    /// Sends a request and classifies the response.
    ///
    /// Success responses are returned with their body unread.
    pub fn request(&self, verb: &str, path: &str, options: RequestOptions) -> Result<Response> {
        let request = self.build_request(verb, path, options)?;
        self.execute(request)
    }

    /// Sends a request and decodes a successful response body as JSON.
    pub fn request_json<T>(&self, verb: &str, path: &str, options: RequestOptions) -> Result<T>
    where
        T: DeserializeOwned,
    {
        let response = self.request(verb, path, options)?;
        self.decode(response, "response body")
    }

    /// Decodes a response body as JSON, logging it when debug is enabled.
    pub fn decode<T>(&self, response: Response, context: &'static str) -> Result<T>
    where
        T: DeserializeOwned,
    {
        response::decode_json(response, context, self.inner.debug)
    }

    /// Uploads `size` bytes from `body` with a PUT to the absolute `url`.
    ///
    /// The URL is used as given, without joining it onto the endpoint, but any
    /// query string it carries is replaced. The token is added only when `url`
    /// has the same origin as the endpoint; uploads to other hosts go out
    /// without it.
    pub fn put_resource(&self, url: &str, body: impl Read + Send + 'static, size: u64) -> Result<()> {
        let url = request::parse_url(url)?;
        let mut options = RequestOptions::new().with_body(body, size);
        if url.origin() == self.endpoint().origin() {
            let token = self.inner.token.read().unwrap_or_else(PoisonError::into_inner);
            request::inject_token(&mut options, &token);
        } else {
            tracing::debug!(host = ?url.host_str(), "Uploading to foreign origin without token");
        }
        let request = request::build("PUT", url, options)?;
        self.execute(request)?;
        Ok(())
    }

    fn execute(&self, request: PreparedRequest) -> Result<Response> {
        let method = request.method.clone();
        let path = request.url.path().to_string();

        tracing::debug!(method = %method, path = %path, "Executing HTTP request");

        let outcome = self.inner.transport.execute(request);
        match &outcome {
            Ok(response) => tracing::info!(
                method = %method,
                path = %path,
                status = response.status.as_u16(),
                "Received HTTP response"
            ),
            Err(e) => tracing::warn!(
                error = %e,
                method = %method,
                path = %path,
                "Request failed"
            ),
        }

        response::classify(outcome, self.inner.debug)
    }
}

impl std::fmt::Debug for Client {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Client")
            .field("endpoint", &self.endpoint().as_str())
            .field("authenticated", &!self.token().is_empty())
            .field("debug", &self.inner.debug)
            .finish_non_exhaustive()
    }
}

fn read<T: Clone>(lock: &RwLock<T>) -> T {
    lock.read().unwrap_or_else(PoisonError::into_inner).clone()
}

/// Builder for configuring and creating a [`Client`].
///
/// # Examples
///
/// ```no_run
/// use atlas_client::ClientBuilder;
/// use std::time::Duration;
///
/// # fn example() -> Result<(), atlas_client::Error> {
/// let client = ClientBuilder::new()
///     .base_url("https://atlas.example.com")?
///     .token("preissued-token")
///     .timeout(Duration::from_secs(30))
///     .debug(true)
///     .build()?;
/// # Ok(())
/// # }
/// ```
pub struct ClientBuilder {
    base_url: Option<Url>,
    token: Option<String>,
    debug: bool,
    timeout: Option<Duration>,
    transport: Option<Box<dyn Transport>>,
}

impl ClientBuilder {
    /// Creates a new `ClientBuilder` with default settings.
    pub fn new() -> Self {
        Self {
            base_url: None,
            token: None,
            debug: false,
            timeout: None,
            transport: None,
        }
    }

    /// Sets the base endpoint. Defaults to [`DEFAULT_ENDPOINT`].
    ///
    /// # Errors
    ///
    /// Returns an error if the URL is empty or invalid.
    pub fn base_url(mut self, url: impl AsRef<str>) -> Result<Self> {
        self.base_url = Some(request::parse_url(url.as_ref())?);
        Ok(self)
    }

    /// Sets the token. Defaults to the value of [`TOKEN_ENV_VAR`], if set.
    pub fn token(mut self, token: impl Into<String>) -> Self {
        self.token = Some(token.into());
        self
    }

    /// Logs every decoded response body at debug level.
    pub fn debug(mut self, enabled: bool) -> Self {
        self.debug = enabled;
        self
    }

    /// Sets a request timeout on the default transport.
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Uses `transport` instead of the default reqwest transport.
    pub fn transport(mut self, transport: impl Transport + 'static) -> Self {
        self.transport = Some(Box::new(transport));
        self
    }

    /// Builds the configured `Client`.
    ///
    /// # Errors
    ///
    /// Returns an error if the default endpoint or transport cannot be set up.
    pub fn build(self) -> Result<Client> {
        let endpoint = match self.base_url {
            Some(url) => url,
            None => request::parse_url(DEFAULT_ENDPOINT)?,
        };

        let token = resolve_token(self.token, |name| std::env::var(name).ok());

        let transport = match self.transport {
            Some(transport) => {
                if self.timeout.is_some() {
                    tracing::warn!("Timeout is ignored when a custom transport is configured");
                }
                transport
            }
            None => {
                let transport = match self.timeout {
                    Some(timeout) => ReqwestTransport::with_timeout(timeout)?,
                    None => ReqwestTransport::new()?,
                };
                Box::new(transport)
            }
        };

        Ok(Client {
            inner: Arc::new(ClientInner {
                transport,
                endpoint: RwLock::new(endpoint),
                token: RwLock::new(token),
                debug: self.debug,
            }),
        })
    }
}

/// Picks the configured token, falling back to [`TOKEN_ENV_VAR`] via `lookup`.
fn resolve_token(
    configured: Option<String>,
    lookup: impl FnOnce(&str) -> Option<String>,
) -> String {
    configured.unwrap_or_else(|| lookup(TOKEN_ENV_VAR).unwrap_or_default())
}

impl Default for ClientBuilder {
    fn default() -> Self {
        Self::new()
    }
}
