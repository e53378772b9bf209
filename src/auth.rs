//! Username/password login.

use crate::{Client, Error, RequestOptions, Result};
use serde::Deserialize;
use std::io::Cursor;

/// Path of the login exchange, relative to the endpoint.
pub const LOGIN_PATH: &str = "/api/v1/authenticate";

/// Description the server records for tokens issued to this client.
pub const CLIENT_DESCRIPTION: &str = "Created by the Atlas Rust Client";

#[derive(Deserialize)]
struct TokenResponse {
    #[serde(rename = "Token", alias = "token")]
    token: String,
}

impl Client {
    /// Exchanges a username and password for a session token.
    ///
    /// On success the token is stored on the client, so every later request
    /// carries it, and returned. On failure the stored token is unchanged.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidArgument`] if either credential is empty,
    /// without contacting the server. Classified failures such as
    /// [`Error::AuthenticationFailed`] are returned as-is, and a success body
    /// without a token is an [`Error::Decode`].
    pub fn login(&self, username: &str, password: &str) -> Result<String> {
        if username.is_empty() {
            return Err(Error::InvalidArgument("missing username".to_string()));
        }
        if password.is_empty() {
            return Err(Error::InvalidArgument("missing password".to_string()));
        }

        let form = url::form_urlencoded::Serializer::new(String::new())
            .append_pair("user[description]", CLIENT_DESCRIPTION)
            .append_pair("user[login]", username)
            .append_pair("user[password]", password)
            .finish();
        let length = form.len() as u64;

        let options = RequestOptions::new()
            .with_header("Content-Type", "application/x-www-form-urlencoded")?
            .with_body(Cursor::new(form.into_bytes()), length);

        let response = self.request("POST", LOGIN_PATH, options)?;
        let TokenResponse { token } = self.decode(response, "token response")?;

        tracing::info!(username = username, "Authenticated");
        self.set_token(token.clone());
        Ok(token)
    }
}

#[cfg(test)]
mod tests {
    use crate::client::tests::{client_with, StubTransport};
    use crate::Error;

    #[test]
    fn login_stores_and_returns_token() {
        let stub = StubTransport::replying(&[(200, r#"{"Token":"tok-1"}"#)]);
        let client = client_with(&stub, "");

        let token = client.login("alice", "s3cret").unwrap();

        assert_eq!(token, "tok-1");
        assert_eq!(client.token(), "tok-1");
        assert_eq!(stub.tracker.closed(), 1);
    }

    #[test]
    fn login_posts_form_to_authenticate_path() {
        let stub = StubTransport::replying(&[(200, r#"{"Token":"tok-1"}"#)]);
        let client = client_with(&stub, "");

        client.login("alice", "p&ss word").unwrap();

        let recorded = stub.recorded();
        assert_eq!(recorded.len(), 1);
        assert_eq!(recorded[0].method, "POST");
        assert_eq!(recorded[0].url.path(), "/api/api/v1/authenticate");
        assert_eq!(
            recorded[0].headers.get("content-type").unwrap(),
            "application/x-www-form-urlencoded"
        );

        let body = recorded[0].body.clone().unwrap();
        assert_eq!(recorded[0].content_length, Some(body.len() as u64));
        let fields: Vec<(String, String)> = url::form_urlencoded::parse(body.as_bytes())
            .into_owned()
            .collect();
        assert_eq!(
            fields,
            vec![
                (
                    "user[description]".to_string(),
                    "Created by the Atlas Rust Client".to_string()
                ),
                ("user[login]".to_string(), "alice".to_string()),
                ("user[password]".to_string(), "p&ss word".to_string()),
            ]
        );
    }

    #[test]
    fn login_accepts_lowercase_token_field() {
        let stub = StubTransport::replying(&[(201, r#"{"token":"tok-2"}"#)]);
        let client = client_with(&stub, "");

        assert_eq!(client.login("alice", "pw").unwrap(), "tok-2");
    }

    #[test]
    fn empty_credentials_fail_before_any_request() {
        let stub = StubTransport::replying(&[]);
        let client = client_with(&stub, "");

        assert!(matches!(client.login("", "pw"), Err(Error::InvalidArgument(_))));
        assert!(matches!(client.login("alice", ""), Err(Error::InvalidArgument(_))));
        assert!(stub.recorded().is_empty());
    }

    #[test]
    fn rejected_login_leaves_token_unchanged() {
        let stub = StubTransport::replying(&[(401, "")]);
        let client = client_with(&stub, "previous");

        assert!(matches!(
            client.login("alice", "wrong"),
            Err(Error::AuthenticationFailed)
        ));
        assert_eq!(client.token(), "previous");
    }

    #[test]
    fn validation_failure_is_propagated() {
        let stub = StubTransport::replying(&[(400, r#"{"errors":{"login":["is unknown"]}}"#)]);
        let client = client_with(&stub, "");

        let err = client.login("ghost", "pw").unwrap_err();
        assert_eq!(err.to_string(), "login: is unknown");
        assert_eq!(client.token(), "");
    }

    #[test]
    fn undecodable_success_body_is_an_error() {
        let stub = StubTransport::replying(&[(200, "<html>maintenance</html>")]);
        let client = client_with(&stub, "previous");

        let result = client.login("alice", "pw");
        assert!(matches!(
            result,
            Err(Error::Decode {
                context: "token response",
                ..
            })
        ));
        assert_eq!(client.token(), "previous");
    }
}
