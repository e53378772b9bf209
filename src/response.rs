//! Completed HTTP exchanges and the status policy applied to them.
//!
//! [`classify`] decides whether a [`Response`] is a success or one of the
//! typed failures in [`Error`]. [`decode_json`] is the single place response
//! bodies are read and parsed. Both take the response by value, so its body
//! is released exactly once, when they return.

use crate::error::ValidationError;
use crate::request::Body;
use crate::{Error, Result};
use http::{HeaderMap, StatusCode};
use serde::de::DeserializeOwned;
use std::fmt;
use std::io::Read;

/// A completed HTTP exchange with an unread body.
pub struct Response {
    /// The HTTP status code.
    pub status: StatusCode,

    /// The response headers.
    pub headers: HeaderMap,

    /// The body stream. Dropping the response closes it.
    pub body: Body,

    /// Reason phrase sent by the server, when it differs from the canonical one.
    pub reason: Option<String>,
}

impl Response {
    /// Creates a new `Response`.
    pub fn new(status: StatusCode, headers: HeaderMap, body: Body) -> Self {
        Self {
            status,
            headers,
            body,
            reason: None,
        }
    }

    /// Sets the reason phrase the server sent with the status.
    pub fn with_reason(mut self, reason: impl Into<String>) -> Self {
        self.reason = Some(reason.into());
        self
    }

    /// Returns the status line, e.g. `404 Not Found`.
    ///
    /// Uses the server's own reason phrase when the transport captured one,
    /// otherwise the canonical phrase for the code.
    pub fn status_line(&self) -> String {
        match self.reason.as_deref().or(self.status.canonical_reason()) {
            Some(reason) if !reason.is_empty() => format!("{} {}", self.status.as_str(), reason),
            _ => self.status.as_str().to_string(),
        }
    }

    /// Returns a reference to a header value by name.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name)?.to_str().ok()
    }
}

impl fmt::Debug for Response {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Response")
            .field("status", &self.status)
            .field("reason", &self.reason)
            .field("headers", &self.headers)
            .finish_non_exhaustive()
    }
}

/// Applies the status policy to the outcome of a transport call.
///
/// Transport failures pass through untouched. 200, 201, 202 and 204 return
/// the response unchanged; 400 decodes the validation payload; 401 and 404
/// map to their fixed variants without reading the body; anything else is
/// [`Error::UnexpectedStatus`]. `debug` is passed on to [`decode_json`].
///
/// # Examples
///
/// ```
/// use atlas_client::{classify, Error, Response};
/// use http::{HeaderMap, StatusCode};
///
/// let response = Response::new(StatusCode::NOT_FOUND, HeaderMap::new(), Box::new(&b""[..]));
/// assert!(matches!(classify(Ok(response), false), Err(Error::NotFound)));
/// ```
pub fn classify(outcome: Result<Response>, debug: bool) -> Result<Response> {
    let response = outcome?;

    match response.status.as_u16() {
        200 | 201 | 202 | 204 => Ok(response),
        400 => {
            let errors: ValidationError = decode_json(response, "error body", debug)?;
            tracing::warn!(errors = %errors, "Request rejected with validation errors");
            Err(Error::Validation(errors))
        }
        401 => Err(Error::AuthenticationFailed),
        404 => Err(Error::NotFound),
        _ => {
            let line = response.status_line();
            tracing::error!(status = %line, "Unexpected response status");
            Err(Error::UnexpectedStatus(line))
        }
    }
}

/// Reads the whole body of `response` and decodes it as JSON.
///
/// `context` names the body in a [`Error::Decode`]. When `debug` is set the
/// raw body is logged at debug level after decoding, whatever the outcome.
///
/// # Errors
///
/// Returns [`Error::Transport`] if the body cannot be read and
/// [`Error::Decode`] if it is not valid JSON of the expected shape.
pub fn decode_json<T>(mut response: Response, context: &'static str, debug: bool) -> Result<T>
where
    T: DeserializeOwned,
{
    let mut raw = Vec::new();
    response.body.read_to_end(&mut raw)?;
    drop(response);

    let mut deserializer = serde_json::Deserializer::from_slice(&raw);
    let decoded = <T as serde::Deserialize>::deserialize(&mut deserializer)
        .map_err(|source| Error::Decode { context, source });

    if debug {
        tracing::debug!(
            context = context,
            body = %String::from_utf8_lossy(&raw),
            "Decoded response body"
        );
    }

    decoded
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use serde::Deserialize;
    use std::io::{self, Cursor};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::{Arc, Mutex};

    /// Body that counts how often it is read from and dropped.
    pub(crate) struct TrackedBody {
        inner: Cursor<Vec<u8>>,
        reads: Arc<AtomicUsize>,
        drops: Arc<AtomicUsize>,
    }

    #[derive(Clone, Default)]
    pub(crate) struct BodyTracker {
        pub reads: Arc<AtomicUsize>,
        pub drops: Arc<AtomicUsize>,
    }

    impl BodyTracker {
        pub(crate) fn body(&self, content: &str) -> Body {
            Box::new(TrackedBody {
                inner: Cursor::new(content.as_bytes().to_vec()),
                reads: self.reads.clone(),
                drops: self.drops.clone(),
            })
        }

        pub(crate) fn was_read(&self) -> bool {
            self.reads.load(Ordering::SeqCst) > 0
        }

        pub(crate) fn closed(&self) -> usize {
            self.drops.load(Ordering::SeqCst)
        }
    }

    impl Read for TrackedBody {
        fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
            self.reads.fetch_add(1, Ordering::SeqCst);
            self.inner.read(buf)
        }
    }

    impl Drop for TrackedBody {
        fn drop(&mut self) {
            self.drops.fetch_add(1, Ordering::SeqCst);
        }
    }

    /// Log sink shared between a test and its subscriber.
    #[derive(Clone, Default)]
    struct CapturedLogs(Arc<Mutex<Vec<u8>>>);

    impl io::Write for CapturedLogs {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            self.0.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    /// Runs `f` under a debug-level subscriber and returns its result and output.
    fn with_logs<T>(f: impl FnOnce() -> T) -> (T, String) {
        let logs = CapturedLogs::default();
        let writer = logs.clone();
        let subscriber = tracing_subscriber::fmt()
            .with_max_level(tracing::Level::DEBUG)
            .with_ansi(false)
            .with_writer(move || writer.clone())
            .finish();

        let result = tracing::subscriber::with_default(subscriber, f);
        let output = String::from_utf8_lossy(&logs.0.lock().unwrap()).into_owned();
        (result, output)
    }

    fn response(status: u16, tracker: &BodyTracker, body: &str) -> Response {
        Response::new(
            StatusCode::from_u16(status).unwrap(),
            HeaderMap::new(),
            tracker.body(body),
        )
    }

    #[test]
    fn success_statuses_pass_through_unread() {
        for status in [200, 201, 202, 204] {
            let tracker = BodyTracker::default();
            let classified = classify(Ok(response(status, &tracker, "{\"ok\":true}")), false).unwrap();

            assert_eq!(classified.status.as_u16(), status);
            assert!(!tracker.was_read());
            assert_eq!(tracker.closed(), 0);

            let value: serde_json::Value = decode_json(classified, "body", false).unwrap();
            assert_eq!(value["ok"], true);
            assert_eq!(tracker.closed(), 1);
        }
    }

    #[test]
    fn unauthorized_is_authentication_failed_without_reading() {
        let tracker = BodyTracker::default();
        let result = classify(Ok(response(401, &tracker, "{\"errors\":{\"x\":[\"y\"]}}")), false);

        assert!(matches!(result, Err(Error::AuthenticationFailed)));
        assert!(!tracker.was_read());
        assert_eq!(tracker.closed(), 1);
    }

    #[test]
    fn not_found_is_not_found_without_reading() {
        let tracker = BodyTracker::default();
        let result = classify(Ok(response(404, &tracker, "not json at all")), false);

        assert!(matches!(result, Err(Error::NotFound)));
        assert!(!tracker.was_read());
        assert_eq!(tracker.closed(), 1);
    }

    #[test]
    fn bad_request_decodes_validation_errors() {
        let tracker = BodyTracker::default();
        let body = r#"{"errors":{"name":["is required"],"email":["is invalid","is taken"]}}"#;
        let err = classify(Ok(response(400, &tracker, body)), false).unwrap_err();

        let message = err.to_string();
        let segments: Vec<&str> = message.split(", ").collect();
        assert_eq!(segments.len(), 3);
        assert!(segments.contains(&"name: is required"));
        assert!(segments.contains(&"email: is invalid"));
        assert!(segments.contains(&"email: is taken"));

        let invalid = segments.iter().position(|s| *s == "email: is invalid").unwrap();
        let taken = segments.iter().position(|s| *s == "email: is taken").unwrap();
        assert_eq!(taken, invalid + 1);

        assert_eq!(err.validation().unwrap().errors.len(), 2);
        assert_eq!(tracker.closed(), 1);
    }

    #[test]
    fn bad_request_with_null_errors_is_empty_validation_error() {
        let tracker = BodyTracker::default();
        let err = classify(Ok(response(400, &tracker, r#"{"errors":null}"#)), false).unwrap_err();

        let errors = err.validation().expect("validation error");
        assert!(errors.errors.is_empty());
        assert_eq!(err.to_string(), "");
        assert_eq!(tracker.closed(), 1);
    }

    #[test]
    fn bad_request_with_null_field_messages_keeps_other_fields() {
        let body = r#"{"errors":{"x":null,"name":["is required"]}}"#;
        let err = classify(Ok(response(400, &BodyTracker::default(), body)), false).unwrap_err();

        let errors = err.validation().expect("validation error");
        assert_eq!(errors.errors["x"], Vec::<String>::new());
        assert_eq!(err.to_string(), "name: is required");
    }

    #[test]
    fn bad_request_with_unparsable_body_is_decode_error() {
        let tracker = BodyTracker::default();
        let err = classify(Ok(response(400, &tracker, "<html>oops</html>")), false).unwrap_err();

        match err {
            Error::Decode { context, .. } => assert_eq!(context, "error body"),
            other => panic!("Expected Decode, got {:?}", other),
        }
        assert_eq!(tracker.closed(), 1);
    }

    #[test]
    fn other_statuses_carry_the_status_line() {
        let tracker = BodyTracker::default();
        let err = classify(Ok(response(500, &tracker, "boom")), false).unwrap_err();

        match &err {
            Error::UnexpectedStatus(line) => assert_eq!(line, "500 Internal Server Error"),
            other => panic!("Expected UnexpectedStatus, got {:?}", other),
        }
        assert!(err.to_string().contains("500 Internal Server Error"));
        assert_eq!(tracker.closed(), 1);

        let err = classify(Ok(response(302, &BodyTracker::default(), "")), false).unwrap_err();
        assert!(matches!(err, Error::UnexpectedStatus(line) if line == "302 Found"));
    }

    #[test]
    fn transport_errors_pass_through() {
        let err = io::Error::new(io::ErrorKind::TimedOut, "deadline elapsed");
        let result = classify(Err(err.into()), false);
        match result {
            Err(Error::Transport(source)) => assert!(source.to_string().contains("deadline")),
            other => panic!("Expected Transport, got {:?}", other),
        }
    }

    #[test]
    fn decode_closes_body_on_failure() {
        let tracker = BodyTracker::default();
        let result: Result<serde_json::Value> =
            decode_json(response(200, &tracker, "not json"), "body", true);

        assert!(matches!(result, Err(Error::Decode { context: "body", .. })));
        assert_eq!(tracker.closed(), 1);
    }

    #[test]
    fn decode_result_is_the_same_with_debug_enabled() {
        #[derive(Deserialize, Debug, PartialEq)]
        struct Item {
            id: u32,
        }

        let quiet: Item =
            decode_json(response(200, &BodyTracker::default(), r#"{"id":7}"#), "item", false)
                .unwrap();
        let verbose: Item =
            decode_json(response(200, &BodyTracker::default(), r#"{"id":7}"#), "item", true)
                .unwrap();
        assert_eq!(quiet, verbose);
    }

    #[test]
    fn debug_logs_raw_body_after_decoding() {
        let body = r#"{"id":7,"marker":"raw-body-marker"}"#;
        let (decoded, output) = with_logs(|| {
            decode_json::<serde_json::Value>(response(200, &BodyTracker::default(), body), "item", true)
        });

        assert_eq!(decoded.unwrap()["id"], 7);
        assert!(output.contains("raw-body-marker"), "missing body in logs: {}", output);
        assert!(output.contains("Decoded response body"));
    }

    #[test]
    fn debug_logs_body_even_when_decoding_fails() {
        let (decoded, output) = with_logs(|| {
            decode_json::<serde_json::Value>(
                response(200, &BodyTracker::default(), "<html>raw-body-marker</html>"),
                "item",
                true,
            )
        });

        assert!(decoded.is_err());
        assert!(output.contains("raw-body-marker"));
    }

    #[test]
    fn body_is_not_logged_without_debug() {
        let body = r#"{"id":7,"marker":"raw-body-marker"}"#;
        let (decoded, output) = with_logs(|| {
            decode_json::<serde_json::Value>(response(200, &BodyTracker::default(), body), "item", false)
        });

        assert!(decoded.is_ok());
        assert!(!output.contains("raw-body-marker"));
    }

    #[test]
    fn status_line_prefers_server_reason() {
        let tracker = BodyTracker::default();
        let response = response(500, &tracker, "").with_reason("Backend Exploded");
        assert_eq!(response.status_line(), "500 Backend Exploded");

        let err = classify(Ok(response), false).unwrap_err();
        assert!(matches!(err, Error::UnexpectedStatus(line) if line == "500 Backend Exploded"));
    }

    #[test]
    fn status_line_without_canonical_reason() {
        let response = response(599, &BodyTracker::default(), "");
        assert_eq!(response.status_line(), "599");
    }
}
