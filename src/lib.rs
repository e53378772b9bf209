//! # atlas-client - a blocking client for the Atlas REST API
//!
//! The crate authenticates a user, builds token-carrying requests against a
//! base endpoint, and turns server failures into typed errors.
//!
//! ## Quick Start
//!
//! ```no_run
//! use atlas_client::{Client, RequestOptions};
//! use serde::Deserialize;
//!
//! #[derive(Deserialize)]
//! struct BoxInfo {
//!     name: String,
//! }
//!
//! fn main() -> Result<(), atlas_client::Error> {
//!     // Endpoint defaults to the production service; the token to $ATLAS_TOKEN.
//!     let client = Client::builder().build()?;
//!
//!     if client.token().is_empty() {
//!         client.login("alice", "s3cret")?;
//!     }
//!
//!     let info: BoxInfo = client.request_json(
//!         "GET",
//!         "/api/v1/box/alice/precise64",
//!         RequestOptions::new(),
//!     )?;
//!     println!("Box: {}", info.name);
//!     Ok(())
//! }
//! ```
//!
//! ## Error Handling
//!
//! Every status outside 200, 201, 202 and 204 becomes an [`Error`]:
//!
//! ```no_run
//! use atlas_client::{Client, Error, RequestOptions};
//!
//! # fn example() -> Result<(), Error> {
//! # let client = Client::builder().build()?;
//! let options = RequestOptions::new().with_param("box[name]", "");
//! match client.request("POST", "/api/v1/boxes", options) {
//!     Ok(_) => println!("created"),
//!     Err(Error::Validation(errors)) => {
//!         for (field, message) in errors.messages() {
//!             eprintln!("{}: {}", field, message);
//!         }
//!     }
//!     Err(Error::AuthenticationFailed) => eprintln!("bad or missing token"),
//!     Err(Error::NotFound) => eprintln!("no such resource"),
//!     Err(e) => eprintln!("request failed: {}", e),
//! }
//! # Ok(())
//! # }
//! ```
//!
//! ## Logging
//!
//! Requests and responses are reported through `tracing`. Request URLs are
//! logged by path only, so the token never reaches the logs. Enable
//! [`ClientBuilder::debug`] to also log every decoded response body.

mod auth;
mod client;
mod error;
pub mod request;
pub mod response;
pub mod transport;

pub use auth::{CLIENT_DESCRIPTION, LOGIN_PATH};
pub use client::{Client, ClientBuilder, DEFAULT_ENDPOINT, TOKEN_ENV_VAR};
pub use error::{Error, Result, ValidationError};
pub use request::{Body, PreparedRequest, RequestOptions};
pub use response::{classify, decode_json, Response};
pub use transport::{ReqwestTransport, Transport};
