//! Error types for Atlas API calls.
//!
//! Every failure the client can surface is a variant of [`Error`]. The two
//! well-known HTTP failures (401 and 404) are plain variants, so callers can
//! match on them exhaustively instead of comparing against shared instances.

use http::StatusCode;
use serde::Deserialize;
use std::collections::BTreeMap;
use std::fmt;

/// The main error type for Atlas API calls.
///
/// # Examples
///
/// ```no_run
/// use atlas_client::{Client, Error, RequestOptions};
///
/// # fn example() -> Result<(), Error> {
/// let client = Client::builder().build()?;
///
/// match client.request("GET", "/api/v1/boxes", RequestOptions::new()) {
///     Ok(response) => println!("status: {}", response.status),
///     Err(Error::AuthenticationFailed) => eprintln!("log in first"),
///     Err(Error::NotFound) => eprintln!("no such resource"),
///     Err(Error::Validation(errors)) => eprintln!("rejected: {}", errors),
///     Err(e) => eprintln!("other error: {}", e),
/// }
/// # Ok(())
/// # }
/// ```
#[derive(thiserror::Error, Debug)]
pub enum Error {
    /// Malformed caller input, detected before any network call.
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    /// The server answered 401. The body is never decoded.
    #[error("authentication failed")]
    AuthenticationFailed,

    /// The server answered 404. The body is never decoded.
    #[error("resource not found")]
    NotFound,

    /// The server answered 400 with a field-to-messages payload.
    #[error("{0}")]
    Validation(ValidationError),

    /// A response body was not valid JSON or did not have the expected shape.
    ///
    /// `context` names the decode attempt that failed.
    #[error("Failed to decode {context}: {source}")]
    Decode {
        /// Which body was being decoded
        context: &'static str,
        /// The underlying parse failure
        #[source]
        source: serde_json::Error,
    },

    /// The server answered with a status outside the handled set.
    ///
    /// Carries the raw status line, e.g. `500 Internal Server Error`.
    #[error("Unexpected response status: {0}")]
    UnexpectedStatus(String),

    /// A connection or I/O failure below the HTTP layer. Never reclassified.
    #[error("Transport error: {0}")]
    Transport(#[source] Box<dyn std::error::Error + Send + Sync>),
}

impl Error {
    /// Returns the HTTP status this error was classified from, if any.
    ///
    /// ```
    /// use atlas_client::Error;
    /// use http::StatusCode;
    ///
    /// assert_eq!(Error::NotFound.status(), Some(StatusCode::NOT_FOUND));
    /// assert_eq!(Error::InvalidArgument("x".into()).status(), None);
    /// ```
    pub fn status(&self) -> Option<StatusCode> {
        match self {
            Error::AuthenticationFailed => Some(StatusCode::UNAUTHORIZED),
            Error::NotFound => Some(StatusCode::NOT_FOUND),
            Error::Validation(_) => Some(StatusCode::BAD_REQUEST),
            Error::UnexpectedStatus(line) => line
                .split_whitespace()
                .next()
                .and_then(|code| code.parse::<u16>().ok())
                .and_then(|code| StatusCode::from_u16(code).ok()),
            Error::InvalidArgument(_) | Error::Decode { .. } | Error::Transport(_) => None,
        }
    }

    /// Returns the validation payload for a 400 response.
    pub fn validation(&self) -> Option<&ValidationError> {
        match self {
            Error::Validation(errors) => Some(errors),
            _ => None,
        }
    }
}

impl From<reqwest::Error> for Error {
    fn from(err: reqwest::Error) -> Self {
        Error::Transport(Box::new(err))
    }
}

impl From<std::io::Error> for Error {
    fn from(err: std::io::Error) -> Self {
        Error::Transport(Box::new(err))
    }
}

/// Field-level validation messages returned by the server with a 400.
///
/// The wire shape is `{"errors": {"<field>": ["<message>", ...]}}`. Fields are
/// kept sorted by name so the rendered message is stable. A `null` in place
/// of the map or of a field's list reads as empty.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct ValidationError {
    /// Messages keyed by field name, in server order within a field.
    #[serde(default, deserialize_with = "nullable_errors")]
    pub errors: BTreeMap<String, Vec<String>>,
}

fn nullable_errors<'de, D>(
    deserializer: D,
) -> std::result::Result<BTreeMap<String, Vec<String>>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let errors: Option<BTreeMap<String, Option<Vec<String>>>> =
        Option::deserialize(deserializer)?;
    Ok(errors
        .unwrap_or_default()
        .into_iter()
        .map(|(field, messages)| (field, messages.unwrap_or_default()))
        .collect())
}

impl ValidationError {
    /// Iterates every `(field, message)` pair in rendering order.
    pub fn messages(&self) -> impl Iterator<Item = (&str, &str)> {
        self.errors.iter().flat_map(|(field, messages)| {
            messages
                .iter()
                .map(move |message| (field.as_str(), message.as_str()))
        })
    }
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, (field, message)) in self.messages().enumerate() {
            if i > 0 {
                f.write_str(", ")?;
            }
            write!(f, "{}: {}", field, message)?;
        }
        Ok(())
    }
}

impl std::error::Error for ValidationError {}

/// A specialized `Result` type for Atlas API calls.
pub type Result<T> = std::result::Result<T, Error>;
